// classification logic
use tracing::debug;

use crate::core::graph::{GraphError, ReflexionGraph};
use crate::core::state::{EdgeChange, EdgeState};
use crate::core::types::{EdgeId, SubgraphKind};

impl ReflexionGraph {
    //Run a full reflexion analysis from scratch:
    // - Resets architecture states/counters
    // - Classifies + lifts every impl edge against the live mapping
    // - Finalizes arch edge states (Absent/Convergent normalization)
    //
    //Returns the implementation edges whose state differs from before the run.
    pub fn run_from_scratch(&mut self) -> Result<Vec<EdgeChange>, GraphError> {
        self.init_states();

        let impl_edge_ids: Vec<EdgeId> = self
            .edge_ids()
            .into_iter()
            .filter(|eid| self.edges.get(eid).is_some_and(|e| e.subgraph == SubgraphKind::Implementation))
            .collect();

        let mut changes = Vec::new();
        for eid in impl_edge_ids {
            let (state, allowing) = self.classify_and_lift(&*self, eid)?;

            if let Some(arch_eid) = allowing {
                if let Some(ae) = self.edges.get_mut(&arch_eid) {
                    ae.counter += 1;
                    ae.state = EdgeState::Convergent;
                }
            }

            if let Some(ie) = self.edges.get_mut(&eid) {
                if ie.state != state {
                    changes.push(EdgeChange { edge: eid, old_state: ie.state, new_state: state });
                    ie.state = state;
                }
            }
        }

        self.finalize_architecture_states();
        debug!(changed = changes.len(), violations = self.count_violations(), "reflexion analysis finished");
        Ok(changes)
    }

    //architecture edges go back to Specified with a zero counter; impl edges keep
    //their state so the next run can report what changed
    pub fn init_states(&mut self) {
        for e in self.edges.values_mut() {
            if e.subgraph == SubgraphKind::Architecture {
                e.state = EdgeState::Specified;
                e.counter = 0;
            }
        }
    }

    // Normalize final architecture edge states after lifting:
    // - Specified + counter==0  -> Absent
    // - Specified + counter>0   -> Convergent
    pub fn finalize_architecture_states(&mut self) {
        for e in self.edges.values_mut() {
            if e.subgraph != SubgraphKind::Architecture {
                continue;
            }

            if matches!(e.state, EdgeState::Specified) && e.counter == 0 {
                e.state = EdgeState::Absent;
            } else if matches!(e.state, EdgeState::Specified) && e.counter > 0 {
                e.state = EdgeState::Convergent;
            }
        }
    }

    pub fn count_violations(&self) -> usize {
        self.edges.values().filter(|e| e.state.is_violation()).count()
    }
}
