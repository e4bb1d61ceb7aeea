//! Argument and return transforms applied around adapted calls.
//!
//! Each step is a pure function; the synthesizer composes them in a fixed
//! order (reorder, then parameter conversions, then the call, then the
//! return conversion) instead of rebinding anything dynamically.

use crate::errors::{PlugboardError, PlugboardResult};
use crate::kinds::{KindTable, TypeKind, Value};

/// Scatter caller arguments into candidate positions: output position
/// `perm[i]` receives caller argument `i`.
pub fn apply_reorder(args: &[Value], perm: &[usize]) -> PlugboardResult<Vec<Value>> {
    if perm.len() != args.len() {
        return Err(PlugboardError::Internal(format!(
            "permutation length {} does not match argument count {}",
            perm.len(),
            args.len()
        )));
    }
    let mut out = vec![Value::None; args.len()];
    let mut seen = vec![false; args.len()];
    for (i, &target) in perm.iter().enumerate() {
        if target >= args.len() || seen[target] {
            return Err(PlugboardError::Internal(format!(
                "invalid permutation {perm:?} for {} arguments",
                args.len()
            )));
        }
        seen[target] = true;
        out[target] = args[i].clone();
    }
    Ok(out)
}

/// Convert each argument to its positional target kind.  Positions whose
/// target is `any` are left untouched; surplus positions on either side
/// pass through unconverted.
pub fn apply_param_conversions(
    args: Vec<Value>,
    targets: &[TypeKind],
    kinds: &KindTable,
) -> PlugboardResult<Vec<Value>> {
    let mut out = Vec::with_capacity(args.len());
    for (i, value) in args.into_iter().enumerate() {
        match targets.get(i) {
            Some(TypeKind::Any) | None => out.push(value),
            Some(target) => out.push(kinds.convert(&value, *target)?),
        }
    }
    Ok(out)
}

/// Convert a return value to its target kind; `any` (or no target) is a
/// pass-through.
pub fn apply_return_conversion(
    value: Value,
    target: Option<TypeKind>,
    kinds: &KindTable,
) -> PlugboardResult<Value> {
    match target {
        Some(TypeKind::Any) | None => Ok(value),
        Some(target) => kinds.convert(&value, target),
    }
}
