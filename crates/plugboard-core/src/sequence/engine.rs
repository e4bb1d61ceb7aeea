//! Sequence execution: replays a sheet against one mapping's callables.
//!
//! Statements run strictly in sheet order.  Reference resolution happens
//! first for every statement; `create` statements either construct built-in
//! kinds directly, refresh the synthesized callable set, or are skipped when
//! they name an unsupported origin; dunder probes evaluate against the
//! active instance; ordinary calls go through the adapted callables with
//! errors captured per row.  The sheet's mutable state is reset after the
//! run so the next mapping starts pristine.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::kinds::{KindTable, TypeKind, Value};
use crate::models::Mapping;
use crate::runtime::instrument::Instrumentation;
use crate::runtime::registry::{CallableResolver, FailedCandidates};
use crate::runtime::synthesize::{synthesize, CallableSet};
use crate::sequence::records::{RowRecord, SequenceRun};
use crate::sequence::sheet::{SequenceSheet, BUILTIN_NAMESPACE, CREATE_METHOD};

/// Execute one sheet against one mapping.
pub fn execute(
    sheet: &mut SequenceSheet,
    mapping: &mut Mapping,
    resolver: &dyn CallableResolver,
    kinds: &KindTable,
    failed: &mut FailedCandidates,
    instrumentation: &mut dyn Instrumentation,
    interface_name: &str,
) -> SequenceRun {
    let mut rows: Vec<RowRecord> = Vec::with_capacity(sheet.len());
    let mut callables: Option<CallableSet> = None;
    let mut active: Option<Rc<RefCell<Value>>> = None;
    let mut created = false;

    for index in 0..sheet.len() {
        let statement = sheet.statements()[index].clone();
        // Reference resolution runs first, every statement.
        let oracle = statement.oracle.as_ref().map(|v| sheet.resolve(v));
        let instance = sheet.resolve(&statement.instance);
        let inputs: Vec<Value> = statement.inputs.iter().map(|v| sheet.resolve(v)).collect();

        let mut record = RowRecord::new(statement.position, &statement.method);
        record.inputs = inputs.clone();
        record.instance = Some(instance.clone());
        record.oracle = oracle;

        if statement.method == CREATE_METHOD {
            let token = match &statement.instance {
                Value::Str(token) => token.clone(),
                other => {
                    record.error = Some(format!(
                        "create statement expects a name token, got `{other}`"
                    ));
                    rows.push(record);
                    continue;
                }
            };
            if let Some((namespace, kind_name)) = token.split_once('.') {
                let builtin = (namespace == BUILTIN_NAMESPACE)
                    .then(|| TypeKind::parse(kind_name))
                    .flatten()
                    .filter(TypeKind::is_container);
                let Some(kind) = builtin else {
                    // Unsupported origin: not applicable, not a failure.
                    warn!(%token, row = statement.position, "skipping create statement with unsupported origin");
                    continue;
                };
                match kinds.construct(kind, inputs) {
                    Ok(value) => {
                        record.success = true;
                        record.output = Some(value.clone());
                        sheet.statement_mut(index).output = Some(value);
                    }
                    Err(err) => record.error = Some(err.to_string()),
                }
            } else {
                // Build (or refresh) the callable set for this mapping; the
                // statement's inputs are the instantiation inputs.
                match synthesize(mapping, resolver, kinds, &inputs, failed) {
                    Ok(set) => {
                        active = set.instance(&token).or_else(|| set.primary_instance());
                        let snapshot = active
                            .as_ref()
                            .map(|i| i.borrow().clone())
                            .unwrap_or(Value::None);
                        callables = Some(set);
                        created = true;
                        record.success = true;
                        record.output = Some(snapshot.clone());
                        sheet.statement_mut(index).output = Some(snapshot);
                    }
                    Err(err) => record.error = Some(err.to_string()),
                }
            }
            finish_row(&mut record);
            rows.push(record);
            continue;
        }

        if is_dunder(&statement.method) {
            match eval_dunder(&statement.method, &inputs, active.as_ref()) {
                Ok(value) => {
                    record.success = true;
                    record.output = Some(value.clone());
                    sheet.statement_mut(index).output = Some(value);
                }
                Err(err) => record.error = Some(err),
            }
            finish_row(&mut record);
            rows.push(record);
            continue;
        }

        // Ordinary call: needs a prior successful create.
        if !created {
            record.error = Some("no successful create statement precedes this row".to_string());
            rows.push(record);
            continue;
        }
        let callable = callables
            .as_ref()
            .and_then(|set| set.get(&statement.method));
        let Some(callable) = callable else {
            record.error = Some(format!(
                "interface method `{}` is not part of this mapping",
                statement.method
            ));
            rows.push(record);
            continue;
        };

        record.operation = callable.qualified_name().to_string();
        record.adaptation = Some(callable.adaptation().clone());
        instrumentation.start_span(callable.qualified_name());
        let result = callable.invoke(&inputs, kinds);
        record.metrics = instrumentation.stop_span(callable.qualified_name());
        match result {
            Ok(value) => {
                record.success = true;
                record.output = Some(value.clone());
                sheet.statement_mut(index).output = Some(value);
            }
            Err(err) => record.error = Some(err.to_string()),
        }
        finish_row(&mut record);
        rows.push(record);
    }

    sheet.reset();
    SequenceRun {
        interface: interface_name.to_string(),
        sheet: sheet.name().to_string(),
        mapping_id: mapping.id.clone(),
        rows,
    }
}

fn finish_row(record: &mut RowRecord) {
    if record.success {
        record.oracle_matched = record
            .oracle
            .as_ref()
            .map(|oracle| record.output.as_ref() == Some(oracle));
    }
}

fn is_dunder(method: &str) -> bool {
    method.len() > 4 && method.starts_with("__") && method.ends_with("__")
}

/// Fixed built-in semantics for reserved dunder probes, evaluated directly
/// against the active instance.
fn eval_dunder(
    method: &str,
    inputs: &[Value],
    active: Option<&Rc<RefCell<Value>>>,
) -> Result<Value, String> {
    let Some(instance) = active else {
        return Err("no active instance for built-in probe".to_string());
    };
    let state = instance.borrow();
    match method {
        "__len__" => match &*state {
            Value::List(v) | Value::Tuple(v) | Value::Set(v) => Ok(Value::Int(v.len() as i64)),
            Value::Dict(m) => Ok(Value::Int(m.len() as i64)),
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            other => Err(format!("value of kind {} has no length", other.kind())),
        },
        "__getitem__" => {
            let key = inputs
                .first()
                .ok_or_else(|| "missing index argument".to_string())?;
            match (&*state, key) {
                (Value::List(v) | Value::Tuple(v) | Value::Set(v), Value::Int(i)) => {
                    usize::try_from(*i)
                        .ok()
                        .and_then(|i| v.get(i).cloned())
                        .ok_or_else(|| format!("index {i} out of range"))
                }
                (Value::Dict(m), Value::Str(k)) => m
                    .get(k)
                    .cloned()
                    .ok_or_else(|| format!("missing key `{k}`")),
                (Value::Str(s), Value::Int(i)) => usize::try_from(*i)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or_else(|| format!("index {i} out of range")),
                (state, key) => Err(format!(
                    "cannot index {} with {}",
                    state.kind(),
                    key.kind()
                )),
            }
        }
        "__contains__" => {
            let needle = inputs
                .first()
                .ok_or_else(|| "missing membership argument".to_string())?;
            match &*state {
                Value::List(v) | Value::Tuple(v) | Value::Set(v) => {
                    Ok(Value::Bool(v.contains(needle)))
                }
                Value::Dict(m) => match needle {
                    Value::Str(k) => Ok(Value::Bool(m.contains_key(k))),
                    other => Ok(Value::Bool(m.contains_key(&other.to_string()))),
                },
                Value::Str(s) => match needle {
                    Value::Str(sub) => Ok(Value::Bool(s.contains(sub.as_str()))),
                    other => Err(format!("cannot search str for {}", other.kind())),
                },
                other => Err(format!(
                    "value of kind {} supports no membership test",
                    other.kind()
                )),
            }
        }
        other => Err(format!("unsupported built-in probe `{other}`")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
