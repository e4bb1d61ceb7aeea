//! Plugboard core library — adapter discovery, synthesis, and scripted
//! execution for interface-driven code reuse.
//!
//! Given a caller-declared interface specification and a parsed candidate
//! module whose API does not exactly match it (wrong name, wrong parameter
//! order, wrong types, wrong arity-with-defaults), this crate identifies the
//! transformations that reconcile each interface method with a candidate
//! function, assembles and ranks complete mappings, materializes the best
//! mappings into live adapted callables, and replays a tabular call
//! sequence against each one, recording per-statement evidence.

pub mod adapt;
pub mod errors;
pub mod kinds;
pub mod models;
pub mod pass;
pub mod runtime;
pub mod sequence;

pub use adapt::generate::{generate, GenerateOptions};
pub use adapt::identify::{identify, IdentifyOptions};
pub use errors::{PlugboardError, PlugboardResult};
pub use kinds::{KindTable, TypeKind, Value};
pub use models::{
    AdaptationId, AdaptationInstruction, AdaptationTable, CandidateFunction, CandidateModule,
    InterfaceSpec, Mapping, MethodSignature,
};
pub use pass::{run_pass, PassOptions, PassReport};
pub use runtime::registry::{CallableResolver, FailedCandidates, RegistryCatalog, StaticRegistry};
pub use runtime::synthesize::{synthesize, CallableSet};
pub use sequence::engine::execute;
pub use sequence::records::{CacheKey, RecordField, RowRecord, SequenceRun};
pub use sequence::sheet::SequenceSheet;
