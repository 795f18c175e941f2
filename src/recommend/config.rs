// attract function configuration (TOON text form)
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::recommend::error::{RecommendError, RecommendResult};

pub const COUNT_ATTRACT: &str = "CountAttract";
pub const NO_ATTRACT: &str = "NoAttract";

/// Parameter name of the CountAttract discount factor.
pub const PHI: &str = "phi";

/// Everything needed to build an attract function.
///
/// `attract_function` selects the constructor in the `AttractRegistry`;
/// `parameters` carries strategy specific values such as `phi`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttractFunctionConfig {
    pub attract_function: String,
    pub candidate_type: String,
    pub cluster_type: String,
    pub edge_weights: BTreeMap<String, f64>,
    pub parameters: BTreeMap<String, f64>,
}

impl Default for AttractFunctionConfig {
    fn default() -> Self {
        Self {
            attract_function: COUNT_ATTRACT.to_string(),
            candidate_type: "Class".to_string(),
            cluster_type: "Cluster".to_string(),
            edge_weights: BTreeMap::new(),
            parameters: BTreeMap::new(),
        }
    }
}

impl AttractFunctionConfig {
    pub fn new(attract_function: impl Into<String>, candidate_type: impl Into<String>, cluster_type: impl Into<String>) -> Self {
        Self {
            attract_function: attract_function.into(),
            candidate_type: candidate_type.into(),
            cluster_type: cluster_type.into(),
            ..Self::default()
        }
    }

    pub fn count_attract(candidate_type: impl Into<String>, cluster_type: impl Into<String>, phi: f64) -> Self {
        Self::new(COUNT_ATTRACT, candidate_type, cluster_type).with_parameter(PHI, phi)
    }

    pub fn with_edge_weight(mut self, edge_type: impl Into<String>, weight: f64) -> Self {
        self.edge_weights.insert(edge_type.into(), weight);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    pub fn from_toon(text: &str) -> RecommendResult<Self> {
        let config: Self = toon_format::decode_default(text).map_err(|e| RecommendError::Config {
            message: format!("cannot parse attract function config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toon(&self) -> RecommendResult<String> {
        toon_format::encode_default(self).map_err(|e| RecommendError::Config {
            message: format!("cannot encode attract function config: {e}"),
        })
    }

    /// Rejects empty type tags and negative or non-finite edge weights.
    pub fn validate(&self) -> RecommendResult<()> {
        if self.candidate_type.is_empty() || self.cluster_type.is_empty() {
            return Err(RecommendError::Config {
                message: "candidate_type and cluster_type must not be empty".to_string(),
            });
        }
        for (edge_type, &weight) in &self.edge_weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RecommendError::InvalidParameter {
                    name: format!("edge_weights.{edge_type}"),
                    value: weight,
                    reason: "edge weights must be finite and non-negative".to_string(),
                });
            }
        }
        Ok(())
    }
}
