use crate::CausalCache;
use tracing::info;

impl CausalCache {
    /// Spec §4.11: periodically reports this node's key-set sizes so a
    /// membership/monitoring service can track cache load. Routing the
    /// report itself to a membership service is outside this crate's scope
    /// (spec non-goal); here it surfaces as a structured log line, which is
    /// what the rest of the pipeline's nodes do for the same kind of
    /// periodic self-report.
    pub(crate) fn run_report_tick(&mut self) -> bool {
        info!(
            tick = self.tick,
            causal_cut_keys = self.causal_cut.len(),
            unmerged_keys = self.unmerged.len(),
            in_preparation_heads = self.in_prep.len(),
            pending_cross = self.pending_cross.len(),
            pending_single = self.pending_single.len(),
            "periodic key-set report"
        );
        true
    }
}
