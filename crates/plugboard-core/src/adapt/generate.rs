//! Mapping generation: combinatorial assembly of complete assignments.
//!
//! Draws permutations (without replacement) from the flat instruction
//! registry, one instruction per interface method in a fixed method order,
//! and keeps the assignments that fill every slot.  Brute force and
//! exponential in the worst case; acceptable because interface arity is
//! small in practice, and bounded by [`MAX_GENERATED_MAPPINGS`].

use indexmap::IndexMap;
use tracing::warn;

use crate::adapt::guards::MAX_GENERATED_MAPPINGS;
use crate::models::{class_of, AdaptationInstruction, AdaptationTable, InterfaceSpec, Mapping, MappingSlot};
use crate::runtime::registry::FailedCandidates;

/// Knobs for one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Retention limit: keep only the lowest-distance prefix when set.
    pub max_mappings: Option<usize>,
}

/// Assemble, score, and rank complete mappings from an adaptations table.
pub fn generate(
    table: &AdaptationTable,
    interface: &InterfaceSpec,
    options: &GenerateOptions,
    failed: &FailedCandidates,
) -> Vec<Mapping> {
    if interface.methods.is_empty() {
        return Vec::new();
    }

    let mut search = Search {
        table,
        interface,
        failed,
        used: vec![false; table.registry.len()],
        chosen: Vec::with_capacity(interface.methods.len()),
        out: Vec::new(),
        truncated: false,
    };
    search.fill(0);
    if search.truncated {
        warn!(
            limit = MAX_GENERATED_MAPPINGS,
            "mapping generation hit the output ceiling, results truncated"
        );
    }

    let mut mappings = search.out;
    // Stable sort: ties keep generation order.
    mappings.sort_by_key(|m| m.total_distance);
    if let Some(limit) = options.max_mappings {
        mappings.truncate(limit);
    }
    mappings
}

struct Search<'a> {
    table: &'a AdaptationTable,
    interface: &'a InterfaceSpec,
    failed: &'a FailedCandidates,
    used: Vec<bool>,
    chosen: Vec<usize>,
    out: Vec<Mapping>,
    truncated: bool,
}

impl Search<'_> {
    /// Fill interface-method slot `slot` with every acceptable unused
    /// registry instruction, in registry order, recursing to the next slot.
    fn fill(&mut self, slot: usize) {
        if self.out.len() >= MAX_GENERATED_MAPPINGS {
            self.truncated = true;
            return;
        }
        if slot == self.interface.methods.len() {
            self.out.push(self.build());
            return;
        }
        let wanted = self.interface.methods[slot].name.clone();
        for index in 0..self.table.registry.len() {
            if self.used[index] {
                continue;
            }
            if !self.accepts(&wanted, &self.table.registry[index]) {
                continue;
            }
            self.used[index] = true;
            self.chosen.push(index);
            self.fill(slot + 1);
            self.chosen.pop();
            self.used[index] = false;
        }
    }

    fn accepts(&self, wanted: &str, instruction: &AdaptationInstruction) -> bool {
        if instruction.id.method_name != wanted {
            return false;
        }
        if self.failed.contains(&instruction.id.qualified_name) {
            return false;
        }
        if !self.table.pair_viable(wanted, &instruction.id.qualified_name) {
            return false;
        }
        if let Some(class) = class_of(&instruction.id.qualified_name) {
            if self.failed.contains(class) || self.table.constructor_for(class).is_none() {
                return false;
            }
        }
        true
    }

    fn build(&self) -> Mapping {
        let slots: Vec<MappingSlot> = self
            .chosen
            .iter()
            .map(|&index| {
                let instruction = self.table.registry[index].clone();
                MappingSlot {
                    method_name: instruction.id.method_name.clone(),
                    qualified_name: instruction.id.qualified_name.clone(),
                    instruction,
                }
            })
            .collect();
        let mut constructors: IndexMap<String, AdaptationInstruction> = IndexMap::new();
        for slot in &slots {
            if let Some(class) = class_of(&slot.qualified_name) {
                if !constructors.contains_key(class) {
                    // accepts() guarantees a viable constructor list.
                    let list = self.table.constructor_for(class).expect("viable constructor");
                    constructors.insert(class.to_string(), list[0].clone());
                }
            }
        }
        Mapping::from_slots(slots, constructors)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::identify::{identify, IdentifyOptions};
    use crate::kinds::TypeKind::Int;
    use crate::kinds::{KindTable, TypeKind};
    use crate::models::{CandidateFunction, CandidateModule, MethodSignature};

    fn calculator_interface() -> InterfaceSpec {
        InterfaceSpec::new(
            "Calculator",
            Some(MethodSignature::new("Calculator", &[Int], None)),
            vec![MethodSignature::new("add", &[Int, Int], Some(Int))],
        )
    }

    fn generate_for(
        interface: &InterfaceSpec,
        module: &CandidateModule,
        options: &GenerateOptions,
    ) -> Vec<Mapping> {
        let table = identify(
            interface,
            module,
            &KindTable::default(),
            &IdentifyOptions::default(),
        );
        generate(&table, interface, options, &FailedCandidates::default())
    }

    #[test]
    fn test_calculator_against_free_function() {
        let module = CandidateModule::new("arith")
            .with_function(CandidateFunction::function("add", &[Int, Int], Int));
        let mappings = generate_for(&calculator_interface(), &module, &GenerateOptions::default());
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].total_distance, 0);
        // No owning class, so no constructor rows apply.
        assert!(mappings[0].constructors.is_empty());
        assert!(mappings[0].classes.is_empty());
    }

    #[test]
    fn test_total_distance_matches_recomputed_slots() {
        let module = CandidateModule::new("arith")
            .with_function(CandidateFunction::function("plus", &[Int, Int], Int))
            .with_function(CandidateFunction::function("add", &[Int, Int], Int));
        let mappings = generate_for(&calculator_interface(), &module, &GenerateOptions::default());
        assert!(!mappings.is_empty());
        for mapping in &mappings {
            let recomputed: usize = mapping.slots.iter().map(|s| s.instruction.distance()).sum();
            assert_eq!(mapping.total_distance, recomputed);
        }
    }

    #[test]
    fn test_ranking_and_retention() {
        let module = CandidateModule::new("arith")
            .with_function(CandidateFunction::function("plus", &[Int, Int], Int))
            .with_function(CandidateFunction::function("add", &[Int, Int], Int))
            .with_function(CandidateFunction::function("sum", &[Int, Int], Int));
        let all = generate_for(&calculator_interface(), &module, &GenerateOptions::default());
        assert_eq!(all.len(), 3);
        // Exact-name candidate ranks first.
        assert_eq!(all[0].slots[0].qualified_name, "add");
        assert!(all.windows(2).all(|w| w[0].total_distance <= w[1].total_distance));

        let kept = generate_for(
            &calculator_interface(),
            &module,
            &GenerateOptions {
                max_mappings: Some(2),
            },
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].slots[0].qualified_name, all[0].slots[0].qualified_name);
        assert_eq!(kept[1].slots[0].qualified_name, all[1].slots[0].qualified_name);
    }

    #[test]
    fn test_ties_keep_generation_order() {
        // Both candidates need exactly one rename adaptation with the same
        // edit distance, so their distances tie.
        let interface = InterfaceSpec::new(
            "I",
            None,
            vec![MethodSignature::new("ff", &[Int], Some(Int))],
        );
        let module = CandidateModule::new("m")
            .with_function(CandidateFunction::function("fa", &[Int], Int))
            .with_function(CandidateFunction::function("fb", &[Int], Int));
        let mappings = generate_for(&interface, &module, &GenerateOptions::default());
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].total_distance, mappings[1].total_distance);
        assert_eq!(mappings[0].slots[0].qualified_name, "fa");
        assert_eq!(mappings[1].slots[0].qualified_name, "fb");
    }

    #[test]
    fn test_failed_candidates_are_skipped() {
        let module = CandidateModule::new("arith")
            .with_function(CandidateFunction::function("add", &[Int, Int], Int))
            .with_function(CandidateFunction::function("plus", &[Int, Int], Int));
        let interface = calculator_interface();
        let table = identify(
            &interface,
            &module,
            &KindTable::default(),
            &IdentifyOptions::default(),
        );
        let mut failed = FailedCandidates::default();
        failed.mark("add");
        let mappings = generate(&table, &interface, &GenerateOptions::default(), &failed);
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].slots[0].qualified_name, "plus");
    }

    #[test]
    fn test_class_without_viable_constructor_rejects_mapping() {
        let interface = calculator_interface();
        // Explicit constructor with mismatched arity and substitution
        // disabled: no viable constructor instruction.
        let module = CandidateModule::new("m")
            .with_function(CandidateFunction::method("Calc", "add", &[Int, Int], Int))
            .with_constructor(
                "Calc",
                Some(CandidateFunction::method(
                    "Calc",
                    "Calc",
                    &[TypeKind::Str, Int],
                    TypeKind::None,
                )),
            );
        let table = identify(
            &interface,
            &module,
            &KindTable::default(),
            &IdentifyOptions {
                allow_standard_values: false,
                ..IdentifyOptions::default()
            },
        );
        let mappings = generate(
            &table,
            &interface,
            &GenerateOptions::default(),
            &FailedCandidates::default(),
        );
        assert!(mappings.is_empty());
    }

    #[test]
    fn test_two_method_interface_assembles_both_slots() {
        let interface = InterfaceSpec::new(
            "Stack",
            Some(MethodSignature::new("Stack", &[], None)),
            vec![
                MethodSignature::new("push", &[Int], Some(TypeKind::None)),
                MethodSignature::new("pop", &[], Some(Int)),
            ],
        );
        let module = CandidateModule::new("stack")
            .with_function(CandidateFunction::method("Pile", "push", &[Int], TypeKind::None))
            .with_function(CandidateFunction::method("Pile", "pop", &[], Int));
        let mappings = generate_for(&interface, &module, &GenerateOptions::default());
        assert_eq!(mappings.len(), 1);
        let mapping = &mappings[0];
        assert_eq!(mapping.slots.len(), 2);
        assert_eq!(mapping.slots[0].method_name, "push");
        assert_eq!(mapping.slots[1].method_name, "pop");
        assert!(mapping.constructors.contains_key("Pile"));
        assert!(mapping.constructors["Pile"].empty_constructor);
    }
}
