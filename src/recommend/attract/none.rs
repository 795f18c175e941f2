// NoAttract: every pair scores 0, only the bookkeeping runs
use tracing::trace;

use crate::core::types::NodeId;
use crate::recommend::attract::{AttractBase, AttractContext, AttractFunction};
use crate::recommend::config::{AttractFunctionConfig, NO_ATTRACT};
use crate::recommend::error::RecommendResult;
use crate::recommend::handling::ChangeType;

/// Baseline strategy. Useful to drive a session without recommendations.
#[derive(Debug)]
pub struct NoAttract {
    base: AttractBase,
}

impl NoAttract {
    pub fn new(config: &AttractFunctionConfig) -> Self {
        Self { base: AttractBase::new(config) }
    }

    pub fn boxed(config: &AttractFunctionConfig) -> RecommendResult<Box<dyn AttractFunction>> {
        Ok(Box::new(Self::new(config)))
    }
}

impl AttractFunction for NoAttract {
    fn name(&self) -> &'static str {
        NO_ATTRACT
    }

    fn base(&self) -> &AttractBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AttractBase {
        &mut self.base
    }

    fn attraction_value(&self, ctx: &AttractContext<'_>, candidate: NodeId, cluster: NodeId) -> RecommendResult<f64> {
        ctx.graph.node(candidate)?;
        ctx.graph.node(cluster)?;
        Ok(0.0)
    }

    fn handle_changed_candidate(
        &mut self,
        ctx: &AttractContext<'_>,
        cluster: NodeId,
        changed: NodeId,
        change: ChangeType,
    ) -> RecommendResult<()> {
        if self.base.handling_required(changed, change, true) {
            trace!(cluster, candidate = changed, %change, "no attract");
            self.base.add_cluster_to_update(ctx, cluster);
            match change {
                ChangeType::Addition => self.base.prune_mapped_candidates(ctx),
                ChangeType::Removal => self.base.add_candidate_to_update(ctx, changed),
            }
        }
        Ok(())
    }

    fn dump_training_data(&self) -> String {
        String::new()
    }

    fn empty_training_data(&self) -> bool {
        true
    }
}
