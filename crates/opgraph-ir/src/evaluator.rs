// Evaluator seam
//
// Running a graph is left to an external collaborator. The engine only calls
// into it to refine output types and to serve eager-mode calls.

use opgraph_types::{type_of, Type, Value};

use crate::node::Node;

/// Runs expression graph nodes.
pub trait Evaluator: Send + Sync {
    /// Compute the value of `node`.
    fn evaluate(&self, node: &Node) -> anyhow::Result<Value>;

    /// Compute the type of the value of `node`. Refiners are evaluated with
    /// this; by default a refiner returns a sample shaped like the refined
    /// output.
    fn evaluate_type(&self, node: &Node) -> anyhow::Result<Type> {
        Ok(type_of(&self.evaluate(node)?))
    }
}
