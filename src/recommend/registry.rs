// discriminator -> attract function constructor
use std::collections::BTreeMap;

use tracing::debug;

use crate::recommend::attract::{AttractContext, AttractFunction, CountAttract, NoAttract};
use crate::recommend::config::{AttractFunctionConfig, COUNT_ATTRACT, NO_ATTRACT};
use crate::recommend::error::{RecommendError, RecommendResult};

pub type AttractConstructor = fn(&AttractFunctionConfig) -> RecommendResult<Box<dyn AttractFunction>>;

/// Open table of attract function constructors.
///
/// New strategies are added with [`AttractRegistry::register`]; `create`
/// never needs to know them in advance.
#[derive(Debug, Clone)]
pub struct AttractRegistry {
    constructors: BTreeMap<String, AttractConstructor>,
}

impl Default for AttractRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(COUNT_ATTRACT, CountAttract::boxed);
        registry.register(NO_ATTRACT, NoAttract::boxed);
        registry
    }
}

impl AttractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry without any strategy.
    pub fn empty() -> Self {
        Self { constructors: BTreeMap::new() }
    }

    /// Registers `constructor` under `name`, returning the one it replaces.
    pub fn register(&mut self, name: impl Into<String>, constructor: AttractConstructor) -> Option<AttractConstructor> {
        self.constructors.insert(name.into(), constructor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.constructors.keys().map(String::as_str)
    }

    /// Builds the configured strategy and marks every cluster and every
    /// unmapped candidate as stale.
    pub fn create(&self, config: &AttractFunctionConfig, ctx: &AttractContext<'_>) -> RecommendResult<Box<dyn AttractFunction>> {
        config.validate()?;
        let constructor = self
            .constructors
            .get(&config.attract_function)
            .ok_or_else(|| RecommendError::UnknownStrategy(config.attract_function.clone()))?;

        let mut function = constructor(config)?;
        function.add_all_cluster_to_update(ctx);
        function.add_all_candidates_to_update(ctx);
        debug!(
            attract_function = function.name(),
            clusters = function.clusters_to_update().len(),
            candidates = function.candidates_to_update().len(),
            "attract function created"
        );
        Ok(function)
    }
}
