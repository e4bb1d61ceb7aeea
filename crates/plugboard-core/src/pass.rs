//! Execution-pass orchestration for one (interface, module) pair.
//!
//! Identification and generation run once; synthesis and sequence execution
//! run once per retained mapping, each with fresh per-mapping state.  The
//! failed-candidate set is the only state shared across mappings and is
//! owned here, not by any module-level singleton.

use tracing::{info, warn};

use crate::adapt::generate::{generate, GenerateOptions};
use crate::adapt::identify::{identify, IdentifyOptions};
use crate::errors::PlugboardResult;
use crate::kinds::KindTable;
use crate::models::{CandidateModule, InterfaceSpec, Mapping};
use crate::runtime::instrument::{Instrumentation, NoopInstrumentation, WallClockInstrumentation};
use crate::runtime::registry::{FailedCandidates, RegistryCatalog};
use crate::runtime::synthesize::synthesize;
use crate::sequence::engine::execute;
use crate::sequence::records::SequenceRun;
use crate::sequence::sheet::SequenceSheet;

/// Knobs for one execution pass.
#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    pub identify: IdentifyOptions,
    pub generate: GenerateOptions,
    /// Collect wall-clock instrumentation around real invocations.
    pub collect_metrics: bool,
}

/// Everything one pass surfaces: the ranked mappings (success flags
/// included), the per-mapping sequence runs, and the final failed-candidate
/// set, so partial success is distinguishable from total failure.
#[derive(Debug)]
pub struct PassReport {
    pub mappings: Vec<Mapping>,
    pub runs: Vec<SequenceRun>,
    pub failed: FailedCandidates,
}

/// Run one full pass: identify, generate, then synthesize and execute each
/// retained mapping against the sheet.
///
/// A module that cannot be loaded at all aborts the pass immediately.
pub fn run_pass(
    interface: &InterfaceSpec,
    module: &CandidateModule,
    catalog: &RegistryCatalog,
    sheet: &mut SequenceSheet,
    kinds: &KindTable,
    options: &PassOptions,
) -> PlugboardResult<PassReport> {
    let resolver = catalog.load(&module.name)?;

    let table = identify(interface, module, kinds, &options.identify);
    let mut failed = FailedCandidates::default();
    let mut mappings = generate(&table, interface, &options.generate, &failed);
    info!(
        interface = %interface.name,
        module = %module.name,
        mappings = mappings.len(),
        instructions = table.registry.len(),
        "generated ranked mappings"
    );

    let instantiation_inputs = sheet.first_create_inputs();
    let mut runs = Vec::new();
    for mapping in &mut mappings {
        match synthesize(
            mapping,
            resolver.as_ref(),
            kinds,
            &instantiation_inputs,
            &mut failed,
        ) {
            Ok(_) => {
                mapping.assign_id(&interface.name);
                let mut noop = NoopInstrumentation;
                let mut clock = WallClockInstrumentation::default();
                let instrumentation: &mut dyn Instrumentation = if options.collect_metrics {
                    &mut clock
                } else {
                    &mut noop
                };
                runs.push(execute(
                    sheet,
                    mapping,
                    resolver.as_ref(),
                    kinds,
                    &mut failed,
                    instrumentation,
                    &interface.name,
                ));
            }
            Err(err) => {
                // The mapping stays in the ranked list with its failure
                // flag; only execution is skipped.
                warn!(%err, distance = mapping.total_distance, "mapping synthesis failed");
            }
        }
    }

    Ok(PassReport {
        mappings,
        runs,
        failed,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
