use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{LifecycleError, Result};
use crate::scene::{NodeId, NodeSpec};

/// What the factory gets to work with when rebuilding a node.
#[derive(Debug, Clone, Copy)]
pub struct FactoryContext<'a> {
    pub container: Option<NodeId>,
    pub container_key: Option<&'a str>,
    pub type_name: &'a str,
    pub key: &'a str,
    pub args: Option<&'a Value>,
}

/// Builds nodes by type identifier.
pub trait NodeFactory {
    fn create(&self, ctx: &FactoryContext<'_>) -> Result<NodeSpec>;
}

/// Builder closure registered for one type.
pub type NodeBuilder = Arc<dyn Fn(&FactoryContext<'_>) -> NodeSpec + Send + Sync>;

/// Map of type names to builders.
#[derive(Default, Clone)]
pub struct FactoryRegistry {
    builders: HashMap<String, NodeBuilder>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, type_name: impl Into<String>, builder: F)
    where
        F: Fn(&FactoryContext<'_>) -> NodeSpec + Send + Sync + 'static,
    {
        self.builders.insert(type_name.into(), Arc::new(builder));
    }

    pub fn with<F>(mut self, type_name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&FactoryContext<'_>) -> NodeSpec + Send + Sync + 'static,
    {
        self.register(type_name, builder);
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

impl NodeFactory for FactoryRegistry {
    fn create(&self, ctx: &FactoryContext<'_>) -> Result<NodeSpec> {
        let builder = self
            .builders
            .get(ctx.type_name)
            .ok_or_else(|| LifecycleError::UnknownNodeType(ctx.type_name.to_string()))?;
        Ok(builder(ctx))
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.type_names().collect();
        names.sort_unstable();
        f.debug_struct("FactoryRegistry")
            .field("types", &names)
            .finish()
    }
}
