//! Materializes one mapping into live, invocable adapted callables.
//!
//! Each interface-method slot resolves its candidate through the
//! [`CallableResolver`] capability, instantiates the owning class at most
//! once per mapping, and wraps the callable in the fixed transform pipeline:
//! smart reorder, blind reorder, parameter conversions, the call itself,
//! return conversion.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::{PlugboardError, PlugboardResult};
use crate::kinds::{KindTable, TypeKind, Value};
use crate::models::{class_of, AdaptationId, AdaptationInstruction, Mapping};
use crate::runtime::convert::{apply_param_conversions, apply_reorder, apply_return_conversion};
use crate::runtime::registry::{
    CallableResolver, FailedCandidates, NativeFunction, NativeMethod, ResolvedCallable,
};

/// Which constructor-argument path produced the cached instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorPath {
    Adapted,
    Original,
}

enum CallTarget {
    Function(NativeFunction),
    Method {
        instance: Rc<RefCell<Value>>,
        method: NativeMethod,
    },
}

/// One synthesized, invocable interface method.
pub struct AdaptedCallable {
    interface_name: String,
    qualified_name: String,
    adaptation: AdaptationId,
    reorder_matched: Option<Vec<usize>>,
    reorder_blind: Option<Vec<usize>>,
    convert_params: Option<Vec<TypeKind>>,
    convert_return: Option<TypeKind>,
    target: CallTarget,
}

impl AdaptedCallable {
    /// Run the transform pipeline around the underlying callable.
    pub fn invoke(&self, args: &[Value], kinds: &KindTable) -> PlugboardResult<Value> {
        let mut argv = args.to_vec();
        if let Some(perm) = &self.reorder_matched {
            argv = apply_reorder(&argv, perm)?;
        }
        if let Some(perm) = &self.reorder_blind {
            argv = apply_reorder(&argv, perm)?;
        }
        if let Some(targets) = &self.convert_params {
            argv = apply_param_conversions(argv, targets, kinds)?;
        }
        let raw = match &self.target {
            CallTarget::Function(f) => f(&argv),
            CallTarget::Method { instance, method } => {
                let mut state = instance.borrow_mut();
                method(&mut state, &argv)
            }
        }
        .map_err(PlugboardError::Invocation)?;
        apply_return_conversion(raw, self.convert_return, kinds)
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn adaptation(&self) -> &AdaptationId {
        &self.adaptation
    }
}

/// The live callables synthesized for one mapping, bound under interface
/// method names, plus the per-class instances backing them.
#[derive(Default)]
pub struct CallableSet {
    callables: IndexMap<String, AdaptedCallable>,
    instances: IndexMap<String, Rc<RefCell<Value>>>,
    constructor_paths: IndexMap<String, ConstructorPath>,
}

impl CallableSet {
    pub fn get(&self, interface_name: &str) -> Option<&AdaptedCallable> {
        self.callables.get(interface_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.callables.keys().map(String::as_str)
    }

    pub fn instance(&self, class: &str) -> Option<Rc<RefCell<Value>>> {
        self.instances.get(class).cloned()
    }

    /// First instantiated class instance, if any class was touched.
    pub fn primary_instance(&self) -> Option<Rc<RefCell<Value>>> {
        self.instances.values().next().cloned()
    }

    pub fn constructor_path(&self, class: &str) -> Option<ConstructorPath> {
        self.constructor_paths.get(class).copied()
    }
}

/// Synthesize every slot of a mapping into an invocable callable set.
///
/// Success is recorded on the mapping; an unsuccessful mapping stays in the
/// ranked list so its failure is observable, but is excluded from execution
/// by the caller.
pub fn synthesize(
    mapping: &mut Mapping,
    resolver: &dyn CallableResolver,
    kinds: &KindTable,
    instantiation_inputs: &[Value],
    failed: &mut FailedCandidates,
) -> PlugboardResult<CallableSet> {
    match synthesize_inner(mapping, resolver, kinds, instantiation_inputs, failed) {
        Ok(set) => {
            mapping.synthesized_ok = Some(true);
            Ok(set)
        }
        Err(err) => {
            mapping.synthesized_ok = Some(false);
            Err(err)
        }
    }
}

fn synthesize_inner(
    mapping: &mut Mapping,
    resolver: &dyn CallableResolver,
    kinds: &KindTable,
    instantiation_inputs: &[Value],
    failed: &mut FailedCandidates,
) -> PlugboardResult<CallableSet> {
    let mut set = CallableSet::default();

    for index in 0..mapping.slots.len() {
        let slot = mapping.slots[index].clone();
        let class = class_of(&slot.qualified_name).map(str::to_string);

        if let Some(class) = &class {
            if !set.instances.contains_key(class) {
                instantiate_class(class, mapping, resolver, kinds, instantiation_inputs, failed, &mut set)?;
            }
        }

        if failed.contains(&slot.qualified_name) {
            return Err(PlugboardError::Resolution(format!(
                "candidate `{}` previously failed",
                slot.qualified_name
            )));
        }
        let Some(resolved) = resolver.resolve_function(&slot.qualified_name) else {
            failed.mark(&slot.qualified_name);
            return Err(PlugboardError::Resolution(format!(
                "candidate `{}` could not be resolved",
                slot.qualified_name
            )));
        };

        let target = match resolved {
            ResolvedCallable::Function(f) => CallTarget::Function(f),
            ResolvedCallable::Method(method) => {
                let Some(class) = &class else {
                    failed.mark(&slot.qualified_name);
                    return Err(PlugboardError::Resolution(format!(
                        "candidate `{}` resolved to a method without an owning class",
                        slot.qualified_name
                    )));
                };
                CallTarget::Method {
                    instance: set.instances[class].clone(),
                    method,
                }
            }
        };

        let instruction = &slot.instruction;
        set.callables.insert(
            slot.method_name.clone(),
            AdaptedCallable {
                interface_name: slot.method_name.clone(),
                qualified_name: slot.qualified_name.clone(),
                adaptation: instruction.id.clone(),
                reorder_matched: instruction.reorder_matched.clone(),
                reorder_blind: instruction.reorder_blind.clone(),
                convert_params: instruction.convert_params.clone(),
                convert_return: instruction.convert_return,
                target,
            },
        );
    }

    Ok(set)
}

#[allow(clippy::too_many_arguments)]
fn instantiate_class(
    class: &str,
    mapping: &mut Mapping,
    resolver: &dyn CallableResolver,
    kinds: &KindTable,
    instantiation_inputs: &[Value],
    failed: &mut FailedCandidates,
    set: &mut CallableSet,
) -> PlugboardResult<()> {
    if failed.contains(class) {
        return Err(PlugboardError::Resolution(format!(
            "class `{class}` previously failed"
        )));
    }
    let Some(constructor) = resolver.resolve_class(class) else {
        failed.mark(class);
        return Err(PlugboardError::Resolution(format!(
            "class `{class}` could not be resolved"
        )));
    };

    let needs_adaptation = mapping
        .constructors
        .get(class)
        .is_some_and(|ins| !ins.is_identity());

    let mut path = ConstructorPath::Original;
    let attempt = if needs_adaptation {
        match adapt_constructor_inputs(&mapping.constructors[class], instantiation_inputs, kinds) {
            Ok(adapted) => match constructor(&adapted) {
                Ok(state) => {
                    path = ConstructorPath::Adapted;
                    Ok(state)
                }
                Err(err) => {
                    debug!(%class, %err, "adapted constructor inputs failed, retrying unadapted");
                    constructor(instantiation_inputs)
                }
            },
            Err(err) => {
                debug!(%class, %err, "constructor input adaptation failed, trying unadapted");
                constructor(instantiation_inputs)
            }
        }
    } else {
        constructor(instantiation_inputs)
    };

    let state = match attempt {
        Ok(state) => state,
        Err(err) => {
            failed.mark(class);
            return Err(PlugboardError::Resolution(format!(
                "class `{class}` could not be instantiated: {err}"
            )));
        }
    };

    if needs_adaptation && path == ConstructorPath::Original {
        // The unadapted path worked: the recorded adaptation was unnecessary.
        if let Some(instruction) = mapping.constructors.get_mut(class) {
            instruction.clear_adaptations();
        }
    }

    set.instances
        .insert(class.to_string(), Rc::new(RefCell::new(state)));
    set.constructor_paths.insert(class.to_string(), path);
    Ok(())
}

/// Apply a constructor instruction to the externally supplied instantiation
/// inputs, in the fixed order: empty constructor, reorder, conversions,
/// standard-value full replacement.
fn adapt_constructor_inputs(
    instruction: &AdaptationInstruction,
    inputs: &[Value],
    kinds: &KindTable,
) -> PlugboardResult<Vec<Value>> {
    if instruction.empty_constructor {
        return Ok(Vec::new());
    }
    let mut args = inputs.to_vec();
    if let Some(perm) = &instruction.reorder_matched {
        args = apply_reorder(&args, perm)?;
    }
    if let Some(perm) = &instruction.reorder_blind {
        args = apply_reorder(&args, perm)?;
    }
    if let Some(targets) = &instruction.convert_params {
        args = apply_param_conversions(args, targets, kinds)?;
    }
    if let Some(values) = &instruction.standard_values {
        // Full replacement, not a composition.
        args = values.clone();
    }
    Ok(args)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
