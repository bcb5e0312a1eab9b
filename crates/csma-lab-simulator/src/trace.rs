use csma_lab_abstract::SimConfig;
use serde::Serialize;

use crate::stats::SimulationSummary;

/// Parameters and results of a run, as written to a report file.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub summary: SimulationSummary,
}
