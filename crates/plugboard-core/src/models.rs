//! Shared typed models used across identification, generation, synthesis,
//! and sequence execution.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::adapt::distance::edit_distance;
use crate::kinds::{TypeKind, Value};

// ---------------------------------------------------------------------------
// Interface side
// ---------------------------------------------------------------------------

/// One method signature declared by a caller-side interface specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    /// Declared return kind; `None` means the method declares no return.
    pub returns: Option<TypeKind>,
    pub params: Vec<TypeKind>,
}

impl MethodSignature {
    pub fn new(name: &str, params: &[TypeKind], returns: Option<TypeKind>) -> Self {
        MethodSignature {
            name: name.to_string(),
            returns,
            params: params.to_vec(),
        }
    }
}

/// A parsed interface specification: a name, an optional constructor
/// signature, and the method signatures a candidate must satisfy.
///
/// Produced by an external parser; read-only for the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub name: String,
    pub constructor: Option<MethodSignature>,
    pub methods: Vec<MethodSignature>,
}

impl InterfaceSpec {
    pub fn new(name: &str, constructor: Option<MethodSignature>, methods: Vec<MethodSignature>) -> Self {
        InterfaceSpec {
            name: name.to_string(),
            constructor,
            methods,
        }
    }

    /// The declared constructor, or a zero-parameter one named after the
    /// interface when none is declared.
    pub fn constructor_or_default(&self) -> MethodSignature {
        self.constructor
            .clone()
            .unwrap_or_else(|| MethodSignature::new(&self.name, &[], None))
    }
}

// ---------------------------------------------------------------------------
// Candidate side
// ---------------------------------------------------------------------------

/// One function or method exposed by a candidate module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFunction {
    pub name: String,
    pub returns: TypeKind,
    pub params: Vec<TypeKind>,
    /// Owning class; `None` means a free function.
    pub class_name: Option<String>,
    /// Index of the first parameter carrying a default value.  Parameters at
    /// and after this index may be trimmed when substituting standard values.
    pub first_default: Option<usize>,
}

impl CandidateFunction {
    /// A free function.
    pub fn function(name: &str, params: &[TypeKind], returns: TypeKind) -> Self {
        CandidateFunction {
            name: name.to_string(),
            returns,
            params: params.to_vec(),
            class_name: None,
            first_default: None,
        }
    }

    /// A method owned by `class`.
    pub fn method(class: &str, name: &str, params: &[TypeKind], returns: TypeKind) -> Self {
        CandidateFunction {
            class_name: Some(class.to_string()),
            ..CandidateFunction::function(name, params, returns)
        }
    }

    pub fn with_first_default(mut self, index: usize) -> Self {
        self.first_default = Some(index);
        self
    }

    /// Class-qualified name for owned methods, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.class_name {
            Some(class) => format!("{class}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Owning-class component of a qualified name, if any.
pub fn class_of(qualified_name: &str) -> Option<&str> {
    qualified_name.rsplit_once('.').map(|(class, _)| class)
}

/// Simple-name component of a qualified name.
pub fn simple_name(qualified_name: &str) -> &str {
    qualified_name
        .rsplit_once('.')
        .map_or(qualified_name, |(_, name)| name)
}

/// A parsed candidate module: its functions plus, per class, its explicit
/// constructor signature (`None` = no explicit constructor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateModule {
    pub name: String,
    pub functions: Vec<CandidateFunction>,
    pub constructors: IndexMap<String, Option<CandidateFunction>>,
}

impl CandidateModule {
    pub fn new(name: &str) -> Self {
        CandidateModule {
            name: name.to_string(),
            functions: Vec::new(),
            constructors: IndexMap::new(),
        }
    }

    pub fn with_function(mut self, function: CandidateFunction) -> Self {
        if let Some(class) = &function.class_name {
            // Classes surface in the constructor map even without an
            // explicit constructor.
            self.constructors.entry(class.clone()).or_insert(None);
        }
        self.functions.push(function);
        self
    }

    pub fn with_constructor(mut self, class: &str, constructor: Option<CandidateFunction>) -> Self {
        self.constructors.insert(class.to_string(), constructor);
        self
    }
}

// ---------------------------------------------------------------------------
// Adaptation instructions
// ---------------------------------------------------------------------------

/// Identity of one adaptation instruction: the interface method it serves,
/// the candidate it targets, and the permutation-iteration index (0 = base
/// instruction, 1.. = blind-permutation fallbacks).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdaptationId {
    pub method_name: String,
    pub qualified_name: String,
    pub iteration: usize,
}

impl AdaptationId {
    pub fn new(method_name: &str, qualified_name: &str, iteration: usize) -> Self {
        AdaptationId {
            method_name: method_name.to_string(),
            qualified_name: qualified_name.to_string(),
            iteration,
        }
    }
}

impl fmt::Display for AdaptationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}@{}",
            self.method_name, self.qualified_name, self.iteration
        )
    }
}

/// The transformations needed to make one candidate function interchangeable
/// with one interface method.  Every field is unset by default; at most one
/// of the two reorder fields is ever set on a single instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationInstruction {
    pub id: AdaptationId,
    /// Candidate must be exposed under this (interface) name.
    pub rename: Option<String>,
    /// Convert the candidate's return value to this kind.
    pub convert_return: Option<TypeKind>,
    /// Parameter reorder derived by type matching.
    pub reorder_matched: Option<Vec<usize>>,
    /// Arbitrary raw-index permutation fallback.
    pub reorder_blind: Option<Vec<usize>>,
    /// Per-position conversion targets (the candidate's parameter kinds).
    pub convert_params: Option<Vec<TypeKind>>,
    /// Constructor-only: full replacement argument list of per-kind defaults.
    pub standard_values: Option<Vec<Value>>,
    /// Constructor-only: call the no-argument constructor.
    pub empty_constructor: bool,
}

impl AdaptationInstruction {
    pub fn new(id: AdaptationId) -> Self {
        AdaptationInstruction {
            id,
            rename: None,
            convert_return: None,
            reorder_matched: None,
            reorder_blind: None,
            convert_params: None,
            standard_values: None,
            empty_constructor: false,
        }
    }

    /// Number of set adaptation fields.  Constructor-only fields count like
    /// any other: any needed adaptation costs 1.
    pub fn adaptation_count(&self) -> usize {
        let mut count = 0;
        count += usize::from(self.rename.is_some());
        count += usize::from(self.convert_return.is_some());
        count += usize::from(self.reorder_matched.is_some());
        count += usize::from(self.reorder_blind.is_some());
        count += usize::from(self.convert_params.is_some());
        count += usize::from(self.standard_values.is_some());
        count += usize::from(self.empty_constructor);
        count
    }

    /// Ranking distance: name edit distance plus the adaptation count.
    pub fn distance(&self) -> usize {
        edit_distance(&self.id.method_name, simple_name(&self.id.qualified_name))
            + self.adaptation_count()
    }

    /// Whether the instruction requires no transformation at all.
    pub fn is_identity(&self) -> bool {
        self.adaptation_count() == 0
    }

    /// Drop every adaptation field, keeping the identity.  Used when the
    /// unadapted constructor path turned out to work.
    pub fn clear_adaptations(&mut self) {
        self.rename = None;
        self.convert_return = None;
        self.reorder_matched = None;
        self.reorder_blind = None;
        self.convert_params = None;
        self.standard_values = None;
        self.empty_constructor = false;
    }
}

// ---------------------------------------------------------------------------
// Adaptation table
// ---------------------------------------------------------------------------

/// Output of identification: per-pair instruction lists (`None` = pair is
/// not adaptable), a flat insertion-ordered registry used for combinatorial
/// assembly, and per-class constructor instructions.
#[derive(Debug, Clone, Default)]
pub struct AdaptationTable {
    pub pairs: IndexMap<(String, String), Option<Vec<AdaptationInstruction>>>,
    pub registry: Vec<AdaptationInstruction>,
    pub constructors: IndexMap<String, Option<Vec<AdaptationInstruction>>>,
}

impl AdaptationTable {
    pub fn new() -> Self {
        AdaptationTable::default()
    }

    pub fn record_pair(
        &mut self,
        method_name: &str,
        qualified_name: &str,
        instructions: Option<Vec<AdaptationInstruction>>,
    ) {
        if let Some(list) = &instructions {
            self.registry.extend(list.iter().cloned());
        }
        self.pairs
            .insert((method_name.to_string(), qualified_name.to_string()), instructions);
    }

    pub fn record_constructor(
        &mut self,
        class: &str,
        instructions: Option<Vec<AdaptationInstruction>>,
    ) {
        self.constructors.insert(class.to_string(), instructions);
    }

    /// Whether the (method, candidate) pair was recorded as adaptable.
    pub fn pair_viable(&self, method_name: &str, qualified_name: &str) -> bool {
        self.pairs
            .get(&(method_name.to_string(), qualified_name.to_string()))
            .is_some_and(|entry| entry.is_some())
    }

    /// Constructor instructions for a class, when any are viable.
    pub fn constructor_for(&self, class: &str) -> Option<&[AdaptationInstruction]> {
        match self.constructors.get(class) {
            Some(Some(list)) if !list.is_empty() => Some(list.as_slice()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// One filled interface-method slot of a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSlot {
    pub method_name: String,
    pub qualified_name: String,
    pub instruction: AdaptationInstruction,
}

/// A complete, scored assignment of every interface method (and every
/// touched class constructor) to adapted candidate functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub slots: Vec<MappingSlot>,
    pub constructors: IndexMap<String, AdaptationInstruction>,
    pub classes: IndexSet<String>,
    pub total_distance: usize,
    /// Assigned after successful synthesis; retained across re-ranking.
    pub id: Option<String>,
    /// `None` until synthesis has been attempted.
    pub synthesized_ok: Option<bool>,
}

impl Mapping {
    pub fn from_slots(
        slots: Vec<MappingSlot>,
        constructors: IndexMap<String, AdaptationInstruction>,
    ) -> Self {
        let total_distance = slots.iter().map(|s| s.instruction.distance()).sum();
        let classes: IndexSet<String> = slots
            .iter()
            .filter_map(|s| class_of(&s.qualified_name).map(str::to_string))
            .collect();
        Mapping {
            slots,
            constructors,
            classes,
            total_distance,
            id: None,
            synthesized_ok: None,
        }
    }

    /// Deterministic identity derived from the interface name and the slot
    /// assignments: SHA-256, first 16 hex characters.
    pub fn assign_id(&mut self, interface_name: &str) {
        if self.id.is_some() {
            return;
        }
        let mut hasher = Sha256::new();
        hasher.update(interface_name.as_bytes());
        for slot in &self.slots {
            hasher.update(b"|");
            hasher.update(slot.instruction.id.to_string().as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        self.id = Some(digest[..16].to_string());
    }

    /// Slot for an interface method name, if present.
    pub fn slot(&self, method_name: &str) -> Option<&MappingSlot> {
        self.slots.iter().find(|s| s.method_name == method_name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
