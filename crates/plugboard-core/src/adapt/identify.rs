//! Adaptation identification: per-pair transformation instructions.
//!
//! For every (interface method, candidate function) pair this module decides
//! whether the candidate can stand in for the method and, if so, which
//! transformations are needed: name rewrite, return conversion, smart
//! parameter reorder, positional parameter conversions, or a blind
//! raw-permutation fallback.  Constructors run through the same machinery
//! keyed by class name, with two extra strategies (no-argument constructor,
//! standard-value substitution).

use tracing::{debug, warn};

use crate::adapt::guards::clamp_permutation_tries;
use crate::adapt::permute::IndexPermutations;
use crate::errors::{PlugboardError, PlugboardResult};
use crate::kinds::{KindTable, TypeKind};
use crate::models::{
    AdaptationId, AdaptationInstruction, AdaptationTable, CandidateFunction, CandidateModule,
    InterfaceSpec, MethodSignature,
};

/// Knobs for one identification run.
#[derive(Debug, Clone)]
pub struct IdentifyOptions {
    /// Reject pairs whose kinds differ without a legal conversion path.
    pub strict_types: bool,
    /// Upper bound on instructions per pair; the base instruction counts,
    /// the rest are blind-permutation fallbacks.
    pub max_param_permutation_tries: usize,
    /// Allow constructor standard-value substitution on parameter-count
    /// mismatch.
    pub allow_standard_values: bool,
}

impl Default for IdentifyOptions {
    fn default() -> Self {
        IdentifyOptions {
            strict_types: false,
            max_param_permutation_tries: 1,
            allow_standard_values: true,
        }
    }
}

/// Compute the adaptations table for one (interface, module) pair.
pub fn identify(
    interface: &InterfaceSpec,
    module: &CandidateModule,
    kinds: &KindTable,
    options: &IdentifyOptions,
) -> AdaptationTable {
    let tries = clamp_permutation_tries(options.max_param_permutation_tries);
    let mut table = AdaptationTable::new();

    for method in &interface.methods {
        for function in &module.functions {
            let qualified = function.qualified_name();
            let instructions = if method.params.len() != function.params.len() {
                debug!(
                    method = %method.name,
                    candidate = %qualified,
                    "parameter counts differ, pair not adaptable"
                );
                None
            } else {
                adapt_signatures(
                    method,
                    &function.name,
                    &function.params,
                    function.returns,
                    &qualified,
                    kinds,
                    options,
                    tries,
                )
            };
            table.record_pair(&method.name, &qualified, instructions);
        }
    }

    let ctor = interface.constructor_or_default();
    for (class, explicit) in &module.constructors {
        let instructions = adapt_constructor(&ctor, class, explicit.as_ref(), kinds, options, tries);
        table.record_constructor(class, instructions);
    }

    table
}

/// Shared identification core for equal-arity signatures.
#[allow(clippy::too_many_arguments)]
fn adapt_signatures(
    wanted: &MethodSignature,
    have_name: &str,
    have_params: &[TypeKind],
    have_returns: TypeKind,
    key: &str,
    kinds: &KindTable,
    options: &IdentifyOptions,
    tries: usize,
) -> Option<Vec<AdaptationInstruction>> {
    let mut base = AdaptationInstruction::new(AdaptationId::new(&wanted.name, key, 0));

    if wanted.name != have_name {
        base.rename = Some(wanted.name.clone());
    }

    if let Some(want) = wanted.returns {
        if want != TypeKind::Any && want != have_returns {
            if options.strict_types && !kinds.can_convert(have_returns, want) {
                debug!(
                    method = %wanted.name,
                    candidate = %key,
                    from = %have_returns,
                    to = %want,
                    "no legal return conversion, pair not adaptable"
                );
                return None;
            }
            base.convert_return = Some(want);
        }
    }

    if multiset_eq(&wanted.params, have_params) {
        if wanted.params != have_params {
            match match_permutation(&wanted.params, have_params) {
                Ok(perm) => base.reorder_matched = Some(perm),
                Err(err) => {
                    // Equal multisets preclude this; bail on the pair rather
                    // than poison the whole run.
                    warn!(method = %wanted.name, candidate = %key, %err, "inconsistent kind matching");
                    return None;
                }
            }
        }
    } else {
        if options.strict_types {
            for (want, have) in wanted.params.iter().zip(have_params) {
                if !kinds.can_convert(*want, *have) {
                    debug!(
                        method = %wanted.name,
                        candidate = %key,
                        from = %want,
                        to = %have,
                        "no legal parameter conversion, pair not adaptable"
                    );
                    return None;
                }
            }
        }
        base.convert_params = Some(have_params.to_vec());
    }

    let mut out = vec![base.clone()];
    let mut additional = 0;
    for perm in IndexPermutations::new(have_params.len()) {
        if additional + 1 >= tries {
            break;
        }
        // Skip the smart permutation's image; the next available permutation
        // keeps the try budget filled when possible.
        if base.reorder_matched.as_deref() == Some(perm.as_slice()) {
            continue;
        }
        let mut fallback = base.clone();
        fallback.id.iteration = additional + 1;
        fallback.reorder_matched = None;
        fallback.reorder_blind = Some(perm);
        out.push(fallback);
        additional += 1;
    }

    Some(out)
}

/// Constructor identification for one class.
fn adapt_constructor(
    ctor: &MethodSignature,
    class: &str,
    explicit: Option<&CandidateFunction>,
    kinds: &KindTable,
    options: &IdentifyOptions,
    tries: usize,
) -> Option<Vec<AdaptationInstruction>> {
    let Some(signature) = explicit else {
        // No explicit constructor: always the no-argument strategy.
        let mut instruction = AdaptationInstruction::new(AdaptationId::new(&ctor.name, class, 0));
        instruction.empty_constructor = true;
        return Some(vec![instruction]);
    };

    if signature.params.len() == ctor.params.len() {
        return adapt_signatures(
            ctor,
            &signature.name,
            &signature.params,
            signature.returns,
            class,
            kinds,
            options,
            tries,
        );
    }

    if !options.allow_standard_values {
        debug!(%class, "constructor arity mismatch and substitution disabled");
        return None;
    }

    // Substitute per-kind defaults for the required prefix: parameters at
    // and after the first defaulted one are trimmed.
    let required = signature.first_default.unwrap_or(signature.params.len());
    let values = signature.params[..required.min(signature.params.len())]
        .iter()
        .map(|kind| kinds.default_value(*kind))
        .collect();
    let mut instruction = AdaptationInstruction::new(AdaptationId::new(&ctor.name, class, 0));
    instruction.standard_values = Some(values);
    Some(vec![instruction])
}

fn multiset_eq(a: &[TypeKind], b: &[TypeKind]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

/// Stable first-available matching: for each wanted kind, the next unused
/// candidate index carrying the same kind.  Equal multisets guarantee a
/// match for every position.
fn match_permutation(wanted: &[TypeKind], have: &[TypeKind]) -> PlugboardResult<Vec<usize>> {
    let mut used = vec![false; have.len()];
    let mut perm = Vec::with_capacity(wanted.len());
    for kind in wanted {
        let found = have
            .iter()
            .enumerate()
            .find(|(i, h)| !used[*i] && *h == kind)
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                perm.push(i);
            }
            None => {
                return Err(PlugboardError::Internal(format!(
                    "no unused candidate parameter of kind {kind}"
                )))
            }
        }
    }
    Ok(perm)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::distance::edit_distance;
    use crate::kinds::Value;
    use crate::kinds::TypeKind::{Any, Float, Int, List, Str};
    use crate::models::CandidateFunction;

    fn options() -> IdentifyOptions {
        IdentifyOptions::default()
    }

    fn single_pair(
        method: MethodSignature,
        function: CandidateFunction,
        options: &IdentifyOptions,
    ) -> Option<Vec<AdaptationInstruction>> {
        let interface = InterfaceSpec::new("I", None, vec![method.clone()]);
        let module = CandidateModule::new("m").with_function(function.clone());
        let table = identify(&interface, &module, &KindTable::default(), options);
        table.pairs[&(method.name.clone(), function.qualified_name())].clone()
    }

    #[test]
    fn test_exact_match_yields_identity_instruction() {
        let list = single_pair(
            MethodSignature::new("add", &[Int, Int], Some(Int)),
            CandidateFunction::function("add", &[Int, Int], Int),
            &options(),
        )
        .unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].is_identity());
        assert_eq!(list[0].distance(), 0);
    }

    #[test]
    fn test_name_mismatch_sets_rename() {
        let list = single_pair(
            MethodSignature::new("add", &[Int, Int], Some(Int)),
            CandidateFunction::function("plus", &[Int, Int], Int),
            &options(),
        )
        .unwrap();
        assert_eq!(list[0].rename.as_deref(), Some("add"));
        assert_eq!(list[0].distance(), edit_distance("add", "plus") + 1);
    }

    #[test]
    fn test_parameter_count_mismatch_is_not_adaptable() {
        let entry = single_pair(
            MethodSignature::new("add", &[Int, Int], Some(Int)),
            CandidateFunction::function("add", &[Int], Int),
            &options(),
        );
        assert!(entry.is_none());
    }

    #[test]
    fn test_smart_permutation_reorders_into_interface_order() {
        let method = MethodSignature::new("f", &[Int, Str, Float], Some(Int));
        let function = CandidateFunction::function("f", &[Str, Float, Int], Int);
        let list = single_pair(method.clone(), function.clone(), &options()).unwrap();
        let perm = list[0].reorder_matched.clone().unwrap();
        // Applying the permutation to the candidate's declared order yields
        // exactly the interface's order.
        let reordered: Vec<TypeKind> = perm.iter().map(|&i| function.params[i]).collect();
        assert_eq!(reordered, method.params);
        assert!(list[0].convert_params.is_none());
    }

    #[test]
    fn test_smart_permutation_duplicate_kinds_stable() {
        let method = MethodSignature::new("f", &[Int, Int, Str], None);
        let function = CandidateFunction::function("f", &[Str, Int, Int], Int);
        let list = single_pair(method, function, &options()).unwrap();
        assert_eq!(list[0].reorder_matched, Some(vec![1, 2, 0]));
    }

    #[test]
    fn test_kind_mismatch_strict_rejects_without_conversion_path() {
        let strict = IdentifyOptions {
            strict_types: true,
            ..options()
        };
        let entry = single_pair(
            MethodSignature::new("icubed", &[List], Some(Any)),
            CandidateFunction::function("cubed", &[Int], Int),
            &strict,
        );
        assert!(entry.is_none());
    }

    #[test]
    fn test_kind_mismatch_lenient_records_conversions() {
        let list = single_pair(
            MethodSignature::new("icubed", &[List], Some(Any)),
            CandidateFunction::function("cubed", &[Int], Int),
            &options(),
        )
        .unwrap();
        let base = &list[0];
        assert_eq!(base.rename.as_deref(), Some("icubed"));
        assert_eq!(base.convert_params, Some(vec![Int]));
        // Return target `any` costs nothing.
        assert!(base.convert_return.is_none());
        assert_eq!(base.distance(), edit_distance("icubed", "cubed") + 2);
    }

    #[test]
    fn test_return_conversion_recorded_when_legal() {
        let list = single_pair(
            MethodSignature::new("f", &[Int], Some(Str)),
            CandidateFunction::function("f", &[Int], Int),
            &IdentifyOptions {
                strict_types: true,
                ..options()
            },
        )
        .unwrap();
        assert_eq!(list[0].convert_return, Some(Str));
    }

    #[test]
    fn test_return_conversion_strict_rejects_illegal() {
        let entry = single_pair(
            MethodSignature::new("f", &[Int], Some(Int)),
            CandidateFunction::function("f", &[Int], List),
            &IdentifyOptions {
                strict_types: true,
                ..options()
            },
        );
        assert!(entry.is_none());
    }

    #[test]
    fn test_blind_permutations_fill_try_budget() {
        let opts = IdentifyOptions {
            max_param_permutation_tries: 3,
            ..options()
        };
        let list = single_pair(
            MethodSignature::new("f", &[Int, Str], Some(Int)),
            CandidateFunction::function("f", &[Int, Str], Int),
            &opts,
        )
        .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1].reorder_blind, Some(vec![0, 1]));
        assert_eq!(list[2].reorder_blind, Some(vec![1, 0]));
        assert_eq!(list[1].id.iteration, 1);
        assert_eq!(list[2].id.iteration, 2);
        assert!(list.iter().all(|i| {
            !(i.reorder_matched.is_some() && i.reorder_blind.is_some())
        }));
    }

    #[test]
    fn test_blind_permutations_skip_smart_image() {
        let opts = IdentifyOptions {
            max_param_permutation_tries: 3,
            ..options()
        };
        // Smart permutation is [1, 0]; only [0, 1] remains for the fallback,
        // so the budget cannot be met.
        let list = single_pair(
            MethodSignature::new("f", &[Int, Str], Some(Int)),
            CandidateFunction::function("f", &[Str, Int], Int),
            &opts,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].reorder_matched, Some(vec![1, 0]));
        assert_eq!(list[1].reorder_blind, Some(vec![0, 1]));
    }

    #[test]
    fn test_constructor_without_explicit_uses_empty_strategy() {
        let interface = InterfaceSpec::new(
            "Calculator",
            Some(MethodSignature::new("Calculator", &[Int], None)),
            vec![],
        );
        let module = CandidateModule::new("m").with_constructor("Calc", None);
        let table = identify(&interface, &module, &KindTable::default(), &options());
        let list = table.constructor_for("Calc").unwrap();
        assert!(list[0].empty_constructor);
        assert!(list[0].standard_values.is_none());
    }

    #[test]
    fn test_constructor_arity_mismatch_substitutes_standard_values() {
        let interface = InterfaceSpec::new(
            "Calculator",
            Some(MethodSignature::new("Calculator", &[Int], None)),
            vec![],
        );
        let module = CandidateModule::new("m").with_constructor(
            "Store",
            Some(CandidateFunction::method(
                "Store",
                "Store",
                &[Str, Int],
                TypeKind::None,
            )),
        );
        let table = identify(&interface, &module, &KindTable::default(), &options());
        let list = table.constructor_for("Store").unwrap();
        assert_eq!(
            list[0].standard_values,
            Some(vec![Value::Str(String::new()), Value::Int(1)])
        );
    }

    #[test]
    fn test_constructor_substitution_respects_first_default() {
        let interface = InterfaceSpec::new(
            "Calculator",
            Some(MethodSignature::new("Calculator", &[Int], None)),
            vec![],
        );
        let ctor = CandidateFunction::method("Store", "Store", &[Str, Int, Float], TypeKind::None)
            .with_first_default(2);
        let module = CandidateModule::new("m").with_constructor("Store", Some(ctor));
        let table = identify(&interface, &module, &KindTable::default(), &options());
        let list = table.constructor_for("Store").unwrap();
        assert_eq!(
            list[0].standard_values,
            Some(vec![Value::Str(String::new()), Value::Int(1)])
        );
    }

    #[test]
    fn test_constructor_substitution_disabled_rejects() {
        let interface = InterfaceSpec::new(
            "Calculator",
            Some(MethodSignature::new("Calculator", &[Int], None)),
            vec![],
        );
        let module = CandidateModule::new("m").with_constructor(
            "Store",
            Some(CandidateFunction::method(
                "Store",
                "Store",
                &[Str, Int],
                TypeKind::None,
            )),
        );
        let opts = IdentifyOptions {
            allow_standard_values: false,
            ..options()
        };
        let table = identify(&interface, &module, &KindTable::default(), &opts);
        assert!(table.constructor_for("Store").is_none());
    }
}
