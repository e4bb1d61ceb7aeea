//! Sequence-sheet model: the tabular call script replayed per mapping.
//!
//! The sheet reader is an external collaborator; this module consumes the
//! already-parsed rows (column 0 = oracle, column 1 = method name, column
//! 2 = instance token, columns 3+ = inputs with nulls dropped) and owns the
//! mutable per-run state: recorded outputs and spreadsheet-style cell
//! reference resolution.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{PlugboardError, PlugboardResult};
use crate::kinds::Value;

/// Reserved method name opening a sequence.
pub const CREATE_METHOD: &str = "create";

/// Namespace prefix naming built-in kinds in `create` statements.
pub const BUILTIN_NAMESPACE: &str = "builtins";

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][0-9]+$").unwrap());

/// One sheet row.  `output` is the only mutable field; it is cleared between
/// mapping runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStatement {
    /// 1-based sheet row, the row component of cell references.
    pub position: usize,
    pub oracle: Option<Value>,
    pub method: String,
    pub instance: Value,
    pub inputs: Vec<Value>,
    pub output: Option<Value>,
}

/// An ordered sequence specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSheet {
    name: String,
    statements: Vec<SequenceStatement>,
}

impl SequenceSheet {
    /// Build a sheet from parsed tabular rows.
    ///
    /// Fails when a row lacks a method name or when the sheet contains no
    /// `create` statement at all; the latter is a configuration error
    /// checked once here, not per mapping.
    pub fn from_rows(name: &str, rows: &[Vec<Option<Value>>]) -> PlugboardResult<SequenceSheet> {
        let mut statements = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let position = index + 1;
            let method = match row.get(1).cloned().flatten() {
                Some(Value::Str(s)) if !s.is_empty() => s,
                Some(other) => {
                    return Err(PlugboardError::Sheet(format!(
                        "row {position}: method cell must be a string, got `{other}`"
                    )))
                }
                _ => {
                    return Err(PlugboardError::Sheet(format!(
                        "row {position}: missing method name"
                    )))
                }
            };
            let oracle = row.first().cloned().flatten();
            let instance = row
                .get(2)
                .cloned()
                .flatten()
                .unwrap_or_else(|| Value::Str(String::new()));
            let inputs: Vec<Value> = row.iter().skip(3).filter_map(Clone::clone).collect();
            statements.push(SequenceStatement {
                position,
                oracle,
                method,
                instance,
                inputs,
                output: None,
            });
        }
        if !statements.iter().any(|s| s.method == CREATE_METHOD) {
            return Err(PlugboardError::Sheet(format!(
                "sheet `{name}` contains no create statement"
            )));
        }
        Ok(SequenceSheet {
            name: name.to_string(),
            statements,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[SequenceStatement] {
        &self.statements
    }

    pub fn statement_mut(&mut self, index: usize) -> &mut SequenceStatement {
        &mut self.statements[index]
    }

    /// Clear recorded outputs so the next mapping starts from pristine
    /// statements.
    pub fn reset(&mut self) {
        for statement in &mut self.statements {
            statement.output = None;
        }
    }

    /// Input cells of the first `create` statement; these double as the
    /// instantiation inputs handed to the synthesizer.
    pub fn first_create_inputs(&self) -> Vec<Value> {
        self.statements
            .iter()
            .find(|s| s.method == CREATE_METHOD)
            .map(|s| s.inputs.clone())
            .unwrap_or_default()
    }

    /// Resolve a cell value that may be a spreadsheet-style reference.
    ///
    /// Tokens of the form uppercase-letter-plus-digits (`A2`) look up the
    /// referenced row's recorded output (column A), method name (B),
    /// instance parameter (C), or input parameter (D..).  Anything
    /// unresolved, including out-of-range rows and columns, passes through
    /// unchanged as a literal token.
    pub fn resolve(&self, value: &Value) -> Value {
        let Value::Str(token) = value else {
            return value.clone();
        };
        if !REFERENCE_RE.is_match(token) {
            return value.clone();
        }
        let column = (token.as_bytes()[0] - b'A') as usize;
        let Ok(row) = token[1..].parse::<usize>() else {
            return value.clone();
        };
        let Some(statement) = self.statements.iter().find(|s| s.position == row) else {
            return value.clone();
        };
        match column {
            0 => statement.output.clone().unwrap_or_else(|| value.clone()),
            1 => Value::Str(statement.method.clone()),
            2 => statement.instance.clone(),
            n => statement
                .inputs
                .get(n - 3)
                .cloned()
                .unwrap_or_else(|| value.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(value: Value) -> Option<Value> {
        Some(value)
    }

    fn token(s: &str) -> Option<Value> {
        Some(Value::Str(s.to_string()))
    }

    fn sheet() -> SequenceSheet {
        // Row 1 creates, row 2 calls with two inputs, row 3 references row 2.
        let rows = vec![
            vec![None, token("create"), token("Calculator"), cell(Value::Int(5))],
            vec![
                cell(Value::Int(7)),
                token("add"),
                None,
                cell(Value::Int(3)),
                cell(Value::Int(4)),
            ],
            vec![None, token("add"), None, token("A2"), cell(Value::Int(1))],
        ];
        SequenceSheet::from_rows("demo", &rows).unwrap()
    }

    #[test]
    fn test_from_rows_shapes_statements() {
        let sheet = sheet();
        assert_eq!(sheet.len(), 3);
        let first = &sheet.statements()[0];
        assert_eq!(first.position, 1);
        assert_eq!(first.method, "create");
        assert_eq!(first.instance, Value::Str("Calculator".to_string()));
        assert_eq!(first.inputs, vec![Value::Int(5)]);
        let second = &sheet.statements()[1];
        assert_eq!(second.oracle, Some(Value::Int(7)));
        assert_eq!(second.inputs.len(), 2);
    }

    #[test]
    fn test_nulls_are_dropped_from_inputs() {
        let rows = vec![vec![
            None,
            token("create"),
            token("C"),
            cell(Value::Int(1)),
            None,
            cell(Value::Int(2)),
        ]];
        let sheet = SequenceSheet::from_rows("s", &rows).unwrap();
        assert_eq!(
            sheet.statements()[0].inputs,
            vec![Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn test_missing_method_is_a_sheet_error() {
        let rows = vec![vec![None, None, token("C")]];
        let err = SequenceSheet::from_rows("s", &rows).unwrap_err();
        assert!(matches!(err, PlugboardError::Sheet(_)));
    }

    #[test]
    fn test_sheet_without_create_is_a_configuration_error() {
        let rows = vec![vec![None, token("add"), None, cell(Value::Int(1))]];
        let err = SequenceSheet::from_rows("s", &rows).unwrap_err();
        assert!(matches!(err, PlugboardError::Sheet(_)));
    }

    #[test]
    fn test_resolve_output_reference() {
        let mut sheet = sheet();
        sheet.statement_mut(1).output = Some(Value::Int(7));
        let resolved = sheet.resolve(&Value::Str("A2".to_string()));
        assert_eq!(resolved, Value::Int(7));
    }

    #[test]
    fn test_resolve_output_reference_without_output_is_literal() {
        let sheet = sheet();
        let resolved = sheet.resolve(&Value::Str("A2".to_string()));
        assert_eq!(resolved, Value::Str("A2".to_string()));
    }

    #[test]
    fn test_out_of_range_reference_is_literal() {
        let sheet = sheet();
        assert_eq!(
            sheet.resolve(&Value::Str("Z99".to_string())),
            Value::Str("Z99".to_string())
        );
    }

    #[test]
    fn test_method_and_input_columns_resolve() {
        let sheet = sheet();
        assert_eq!(
            sheet.resolve(&Value::Str("B1".to_string())),
            Value::Str("create".to_string())
        );
        assert_eq!(sheet.resolve(&Value::Str("D2".to_string())), Value::Int(3));
        assert_eq!(sheet.resolve(&Value::Str("E2".to_string())), Value::Int(4));
        assert_eq!(
            sheet.resolve(&Value::Str("C1".to_string())),
            Value::Str("Calculator".to_string())
        );
    }

    #[test]
    fn test_non_reference_values_pass_through() {
        let sheet = sheet();
        assert_eq!(sheet.resolve(&Value::Int(9)), Value::Int(9));
        assert_eq!(
            sheet.resolve(&Value::Str("a2".to_string())),
            Value::Str("a2".to_string())
        );
        assert_eq!(
            sheet.resolve(&Value::Str("AB2".to_string())),
            Value::Str("AB2".to_string())
        );
    }

    #[test]
    fn test_reset_clears_outputs() {
        let mut sheet = sheet();
        sheet.statement_mut(0).output = Some(Value::None);
        sheet.statement_mut(1).output = Some(Value::Int(7));
        sheet.reset();
        assert!(sheet.statements().iter().all(|s| s.output.is_none()));
    }

    #[test]
    fn test_first_create_inputs() {
        assert_eq!(sheet().first_create_inputs(), vec![Value::Int(5)]);
    }
}
