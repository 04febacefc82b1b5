// Call API
//
// A declared operation is called with a mix of nodes and literal values. In
// lazy mode the call records an output node; in eager mode the node is handed
// straight to the evaluator.

use std::collections::BTreeMap;

use opgraph_error::{DispatchError, GraphError, GraphResult};
use opgraph_ops::{dispatch, DispatchMiss, DispatchStatus};
use opgraph_types::{Type, Value};

use crate::builder::make_output_node;
use crate::config::ExecutionMode;
use crate::context::Context;
use crate::node::Node;

/// An argument at a call site.
#[derive(Debug, Clone)]
pub enum Arg {
    Node(Node),
    Value(Value),
}

impl Arg {
    fn into_node(self) -> Node {
        match self {
            Arg::Node(node) => node,
            Arg::Value(value) => Node::constant(value),
        }
    }
}

impl From<Node> for Arg {
    fn from(node: Node) -> Self {
        Arg::Node(node)
    }
}

impl From<&Node> for Arg {
    fn from(node: &Node) -> Self {
        Arg::Node(node.clone())
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Value(Value::Int(value))
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Value(Value::from(value))
    }
}

/// What a call produced.
#[derive(Debug, Clone)]
pub enum CallOutput {
    Node(Node),
    Value(Value),
}

/// Result of a call, with the dispatch status of the op that was chosen.
#[derive(Debug, Clone)]
pub struct Called {
    pub output: CallOutput,
    pub status: DispatchStatus,
}

impl Called {
    pub fn node(&self) -> Option<&Node> {
        match &self.output {
            CallOutput::Node(node) => Some(node),
            CallOutput::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.output {
            CallOutput::Value(value) => Some(value),
            CallOutput::Node(_) => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self.output {
            CallOutput::Node(node) => Some(node),
            CallOutput::Value(_) => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self.status, DispatchStatus::Fallback(_))
    }

    pub fn miss(&self) -> Option<&DispatchMiss> {
        match &self.status {
            DispatchStatus::Fallback(miss) => Some(miss),
            DispatchStatus::Exact => None,
        }
    }
}

/// Callable handle for a registered operation.
#[derive(Debug, Clone)]
pub struct OpCall {
    ctx: Context,
    name: String,
}

impl OpCall {
    pub(crate) fn new(ctx: Context, name: impl Into<String>) -> Self {
        Self {
            ctx,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call<A: Into<Arg>>(&self, args: impl IntoIterator<Item = A>) -> GraphResult<Called> {
        self.call_with(args, BTreeMap::new())
    }

    /// Call with positional and keyword arguments.
    ///
    /// The variant is dispatched on the argument types under the configured
    /// policy, so the op that runs may differ from the one this handle names.
    pub fn call_with<A: Into<Arg>>(
        &self,
        args: impl IntoIterator<Item = A>,
        kwargs: BTreeMap<String, Arg>,
    ) -> GraphResult<Called> {
        let args: Vec<Node> = args.into_iter().map(|a| a.into().into_node()).collect();
        let kwargs: BTreeMap<String, Node> = kwargs
            .into_iter()
            .map(|(name, arg)| (name, arg.into_node()))
            .collect();

        let arg_types: Vec<Type> = args.iter().map(|n| n.ty().clone()).collect();
        let kwarg_types: BTreeMap<String, Type> = kwargs
            .iter()
            .map(|(name, n)| (name.clone(), n.ty().clone()))
            .collect();

        let dispatched = dispatch(
            self.ctx.registry(),
            &self.name,
            &arg_types,
            &kwarg_types,
            self.ctx.config().dispatch.policy,
        )?;
        let op = dispatched.op;

        let bound: Vec<(String, Node)> = op
            .input_type()
            .bind(&args, &kwargs)
            .ok_or_else(|| DispatchError::Bind {
                op: op.name().to_string(),
                reason: format!(
                    "{} positional and {} keyword arguments do not fit ({})",
                    args.len(),
                    kwargs.len(),
                    op.input_type().param_names().join(", ")
                ),
            })?
            .into_iter()
            .map(|(name, node)| (name, node.clone()))
            .collect();

        let node = make_output_node(&self.ctx, &op, bound)?;

        let output = match self.ctx.config().execution_mode {
            ExecutionMode::Lazy => CallOutput::Node(node),
            ExecutionMode::Eager => {
                let evaluator = self
                    .ctx
                    .evaluator()
                    .ok_or_else(|| GraphError::NoEvaluator(op.name().to_string()))?;
                let value = evaluator
                    .evaluate(&node)
                    .map_err(|e| GraphError::evaluation(op.name(), e))?;
                CallOutput::Value(value)
            }
        };

        Ok(Called {
            output,
            status: dispatched.status,
        })
    }
}
