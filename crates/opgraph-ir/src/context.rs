// Engine context
//
// Explicit ambient state for building graphs: the registry operations are
// declared into, the engine configuration, and the evaluator used for
// refinement and eager calls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use opgraph_error::{GraphError, GraphResult};
use opgraph_ops::{type_categories, OpDeclaration, OpRegistry};
use opgraph_types::{Type, TypeCategory, TypeHints, Value};

use crate::call::{Arg, Called, OpCall};
use crate::config::EngineConfig;
use crate::evaluator::Evaluator;
use crate::node::Node;
use crate::stitch::{analyze, StitchGraph};

#[derive(Clone)]
pub struct Context {
    registry: Arc<OpRegistry>,
    config: EngineConfig,
    evaluator: Option<Arc<dyn Evaluator>>,
    hints: TypeHints,
}

impl Context {
    pub fn new(registry: Arc<OpRegistry>) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            evaluator: None,
            hints: TypeHints::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Type hints used to resolve annotations of declared resolvers
    pub fn with_hints(mut self, hints: TypeHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn registry(&self) -> &Arc<OpRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluator(&self) -> Option<&Arc<dyn Evaluator>> {
        self.evaluator.as_ref()
    }

    pub fn hints(&self) -> &TypeHints {
        &self.hints
    }

    /// Declare an operation and return a handle for calling it.
    pub fn declare(&self, declaration: OpDeclaration) -> GraphResult<OpCall> {
        let op = declaration.declare(&self.registry, &self.hints)?;
        Ok(OpCall::new(self.clone(), op.name()))
    }

    /// Handle for calling an already registered operation.
    pub fn op(&self, name: &str) -> GraphResult<OpCall> {
        let op = self.registry.get(name)?;
        Ok(OpCall::new(self.clone(), op.name()))
    }

    /// A free variable exposing the methods registered for `ty`.
    pub fn var(&self, name: impl Into<String>, ty: Type) -> GraphResult<Node> {
        let capabilities = self.registry.capabilities_for(&ty)?;
        Ok(Node::var(name, ty).with_capabilities(capabilities))
    }

    /// A literal exposing the methods registered for its type.
    pub fn constant(&self, value: impl Into<Value>) -> GraphResult<Node> {
        let node = Node::constant(value);
        let capabilities = self.registry.capabilities_for(node.ty())?;
        Ok(node.with_capabilities(capabilities))
    }

    /// Call `method` with `node` as its first argument.
    ///
    /// Fails with `UnsupportedMethod` unless the node's type exposes the
    /// method. The call itself is dispatched like any other.
    pub fn call_method(
        &self,
        node: &Node,
        method: &str,
        args: impl IntoIterator<Item = Arg>,
        kwargs: BTreeMap<String, Arg>,
    ) -> GraphResult<Called> {
        let unsupported = || GraphError::UnsupportedMethod {
            method: method.to_string(),
            ty: node.ty().to_string(),
        };
        if !node.has_capability(method) {
            return Err(unsupported());
        }

        let mut categories = type_categories(node.ty());
        categories.push(TypeCategory::Unknown);
        let candidates = self.registry.ops_with_common_name(method)?;
        let op = candidates
            .iter()
            .find(|op| {
                op.input_type()
                    .first_param()
                    .map_or(false, |(_, ty)| {
                        type_categories(ty).iter().any(|c| categories.contains(c))
                    })
            })
            .or_else(|| candidates.first())
            .ok_or_else(unsupported)?;

        let args = std::iter::once(Arg::Node(node.clone())).chain(args);
        OpCall::new(self.clone(), op.name()).call_with(args, kwargs)
    }

    /// Tag lineage of the graph reachable from `roots`.
    pub fn analyze(&self, roots: &[Node]) -> GraphResult<StitchGraph> {
        analyze(&self.registry, roots)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("has_evaluator", &self.evaluator.is_some())
            .finish()
    }
}
