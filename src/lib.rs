// incremental mapping recommendations for reflexion analysis
pub mod core;
pub mod recommend;

pub use crate::core::graph::{Edge, GraphError, Node, ReflexionGraph};
pub use crate::core::state::{EdgeChange, EdgeState};
pub use crate::core::types::{EdgeId, EdgeKind, NodeId, SubgraphKind};
pub use crate::recommend::attract::{AttractContext, AttractFunction};
pub use crate::recommend::config::AttractFunctionConfig;
pub use crate::recommend::error::RecommendError;
pub use crate::recommend::registry::AttractRegistry;
pub use crate::recommend::session::{MappingPair, RecommendationSession};
