// Output node construction
//
// Resolves the output type of a dispatched call and attaches the capability
// set for that type. The node is only returned once every step succeeded.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use opgraph_error::{GraphError, GraphResult};
use opgraph_ops::{ArgTypes, OpDef, OutputType};
use opgraph_types::Type;

use crate::context::Context;
use crate::node::Node;
use crate::traversal::expr_vars;

/// Build the output node for `op` applied to `bound`.
///
/// The output type comes from the op's refiner when one is declared, refining
/// is enabled, and no input depends on a free variable. Otherwise a computed
/// output type is evaluated on the input types, with literal inputs elevated
/// to `const` types, and a fixed output type is used as declared. A type that
/// cannot be computed becomes `unknown`.
pub fn make_output_node(ctx: &Context, op: &OpDef, bound: Vec<(String, Node)>) -> GraphResult<Node> {
    let refined = match op.refine_output_type() {
        Some(refiner) if ctx.config().refine.enabled && !has_free_vars(&bound) => {
            refine(ctx, op, refiner, &bound)?
        }
        _ => None,
    };
    let output = match refined {
        Some(ty) => ty,
        None => declared_output_type(op, &bound),
    };
    let output = tag_output(ctx, op, &bound, output)?;
    let capabilities = ctx.registry().capabilities_for(&output)?;
    Ok(Node::output(op.name(), bound, output, capabilities))
}

fn has_free_vars(bound: &[(String, Node)]) -> bool {
    bound.iter().any(|(_, node)| !expr_vars(node).is_empty())
}

fn declared_output_type(op: &OpDef, bound: &[(String, Node)]) -> Type {
    match op.output_type() {
        OutputType::Fixed(ty) => ty.clone(),
        computed @ OutputType::Computed(_) => {
            let arg_types: ArgTypes = bound
                .iter()
                .map(|(name, node)| (name.clone(), const_elevated(node)))
                .collect();
            computed.resolve(&arg_types).unwrap_or_else(|_| {
                tracing::debug!(op = op.name(), "output type not computable, deferring");
                Type::Unknown
            })
        }
    }
}

/// Literal inputs are seen as `const` so type functions can use their value.
fn const_elevated(node: &Node) -> Type {
    match (node.const_value(), node.ty()) {
        (_, ty @ Type::Const { .. }) => ty.clone(),
        (Some(value), ty) => Type::constant(ty.clone(), value.clone()),
        (None, ty) => ty.clone(),
    }
}

//-----------------------------------------------------------------------------
// Refinement
//-----------------------------------------------------------------------------

/// Run the refiner for `op` through the evaluator and return the refined type.
/// `None` when no evaluator is configured.
fn refine(
    ctx: &Context,
    op: &OpDef,
    refiner: &str,
    bound: &[(String, Node)],
) -> GraphResult<Option<Type>> {
    let Some(evaluator) = ctx.evaluator().cloned() else {
        tracing::debug!(op = op.name(), refiner, "no evaluator, keeping declared type");
        return Ok(None);
    };
    // Fails before anything is spawned if the refiner was never declared
    let refiner_op = ctx.registry().get(refiner)?;
    let refine_node = Node::output(
        refiner_op.name(),
        bound.to_vec(),
        Type::Unknown,
        BTreeSet::new(),
    );

    tracing::debug!(op = op.name(), refiner, "refining output type");
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("refine-{}", op.common_name()))
        .spawn(move || {
            // The receiver is gone once the call timed out
            let _ = tx.send(evaluator.evaluate_type(&refine_node));
        })
        .map_err(|e| GraphError::evaluation(refiner, e))?;

    match rx.recv_timeout(ctx.config().refine_timeout()) {
        Ok(Ok(ty)) => Ok(Some(ty)),
        Ok(Err(e)) => Err(GraphError::evaluation(refiner, e)),
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(
                op = op.name(),
                refiner,
                timeout_ms = ctx.config().refine.timeout_ms,
                "refiner timed out"
            );
            Err(GraphError::RefineTimeout {
                op: op.name().to_string(),
                timeout_ms: ctx.config().refine.timeout_ms,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(GraphError::evaluation(
            refiner,
            "refiner exited without a result",
        )),
    }
}

//-----------------------------------------------------------------------------
// Tagging
//-----------------------------------------------------------------------------

/// Tag the output of ops that propagate their first input as a tag. Mapped
/// variants of such ops tag every element.
fn tag_output(ctx: &Context, op: &OpDef, bound: &[(String, Node)], output: Type) -> GraphResult<Type> {
    if output == Type::Unknown {
        return Ok(output);
    }
    let Some((first_name, first)) = bound.first() else {
        return Ok(output);
    };
    if op.tags_output() {
        return Ok(with_tag(first_name, first.ty(), output));
    }
    let tagging_base = ctx
        .registry()
        .mapped_base(op)?
        .map_or(false, |base| base.tags_output());
    if !tagging_base {
        return Ok(output);
    }
    match (first.ty().element_type(), output.element_type()) {
        (Ok(input_element), Ok(output_element)) => Ok(Type::list(with_tag(
            first_name,
            &input_element,
            output_element,
        ))),
        _ => Ok(output),
    }
}

fn with_tag(name: &str, input: &Type, output: Type) -> Type {
    let mut tags = input.tags();
    tags.insert(name.to_string(), input.untagged().clone());
    Type::tagged(tags, output)
}
