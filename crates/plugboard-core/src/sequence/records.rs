//! Execution records: per-statement outcomes and composite cache keys.
//!
//! Records are plain serializable data; persisting them is an external
//! collaborator's concern, keyed by the composite [`CacheKey`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::kinds::Value;
use crate::models::AdaptationId;
use crate::runtime::instrument::InvocationMetrics;

/// Outcome of one executed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub position: usize,
    /// Resolved function name for real invocations, the statement's method
    /// name otherwise.
    pub operation: String,
    /// Adaptation applied, for rows that went through an adapted callable.
    pub adaptation: Option<AdaptationId>,
    pub inputs: Vec<Value>,
    /// Resolved instance parameter.
    pub instance: Option<Value>,
    pub output: Option<Value>,
    pub success: bool,
    pub error: Option<String>,
    pub oracle: Option<Value>,
    pub oracle_matched: Option<bool>,
    pub metrics: Option<InvocationMetrics>,
}

impl RowRecord {
    pub fn new(position: usize, operation: &str) -> Self {
        RowRecord {
            position,
            operation: operation.to_string(),
            adaptation: None,
            inputs: Vec::new(),
            instance: None,
            output: None,
            success: false,
            error: None,
            oracle: None,
            oracle_matched: None,
            metrics: None,
        }
    }
}

/// All row records for one (mapping, sheet) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRun {
    pub interface: String,
    pub sheet: String,
    pub mapping_id: Option<String>,
    pub rows: Vec<RowRecord>,
}

impl SequenceRun {
    pub fn successful_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.success).count()
    }

    pub fn failed_rows(&self) -> usize {
        self.rows.len() - self.successful_rows()
    }

    /// Cache key for one field of one recorded cell.
    pub fn cache_key(
        &self,
        execution_id: &str,
        row: &RowRecord,
        column: usize,
        field: RecordField,
    ) -> CacheKey {
        CacheKey {
            execution_id: execution_id.to_string(),
            interface: self.interface.clone(),
            sheet: self.sheet.clone(),
            mapping_id: self.mapping_id.clone().unwrap_or_default(),
            adaptation_id: row
                .adaptation
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            row: row.position,
            column,
            field,
        }
    }
}

/// Which record field a persisted cell carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    Operation,
    Input,
    Instance,
    Output,
    Error,
    Metrics,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordField::Operation => "operation",
            RecordField::Input => "input",
            RecordField::Instance => "instance",
            RecordField::Output => "output",
            RecordField::Error => "error",
            RecordField::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

/// Composite identifier for persisting one record field externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub execution_id: String,
    pub interface: String,
    pub sheet: String,
    pub mapping_id: String,
    pub adaptation_id: String,
    pub row: usize,
    pub column: usize,
    pub field: RecordField,
}

impl CacheKey {
    /// Deterministic short id: SHA-256 of the display form, first 16 hex
    /// characters.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.execution_id,
            self.interface,
            self.sheet,
            self.mapping_id,
            self.adaptation_id,
            self.row,
            self.column,
            self.field
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
