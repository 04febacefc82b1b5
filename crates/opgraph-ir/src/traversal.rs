// Traversals over the expression graph

use std::collections::HashSet;

use crate::node::{Node, NodeId};

/// Free variables reachable from `node`, in first-occurrence order.
///
/// Lambda bodies are not entered: their variables are bound by the lambda.
pub fn expr_vars(node: &Node) -> Vec<Node> {
    let mut seen = HashSet::new();
    let mut vars = Vec::new();
    let mut stack = vec![node.clone()];
    while let Some(current) = stack.pop() {
        if !seen.insert(current.id()) {
            continue;
        }
        if current.is_var() {
            vars.push(current);
            continue;
        }
        // Reversed so that the first input is visited first
        for (_, input) in current.inputs().iter().rev() {
            stack.push(input.clone());
        }
    }
    vars
}

/// Every node reachable from `roots`, inputs before the nodes consuming them.
/// Lambda bodies are visited before the lambda itself.
pub fn walk(roots: &[Node]) -> Vec<Node> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut order = Vec::new();
    for root in roots {
        visit(root, &mut visited, &mut order);
    }
    order
}

fn visit(node: &Node, visited: &mut HashSet<NodeId>, order: &mut Vec<Node>) {
    if !visited.insert(node.id()) {
        return;
    }
    if let Some(body) = node.lambda_body() {
        visit(body, visited, order);
    }
    for (_, input) in node.inputs() {
        visit(input, visited, order);
    }
    order.push(node.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use opgraph_types::Type;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn add(lhs: Node, rhs: Node) -> Node {
        Node::output(
            "number-add",
            vec![("lhs".into(), lhs), ("rhs".into(), rhs)],
            Type::Int,
            BTreeSet::new(),
        )
    }

    #[test]
    fn expr_vars_in_order_without_duplicates() {
        let x = Node::var("x", Type::Int);
        let y = Node::var("y", Type::Int);
        let expr = add(add(x.clone(), y.clone()), x.clone());
        assert_eq!(expr_vars(&expr), vec![x, y]);
    }

    #[test]
    fn expr_vars_skips_lambda_bodies() {
        let row = Node::var("row", Type::Int);
        let lambda = Node::lambda(add(row, Node::constant(1i64)));
        let table = Node::var("table", Type::list(Type::Int));
        let mapped = Node::output(
            "map",
            vec![("arr".into(), table.clone()), ("fn".into(), lambda)],
            Type::list(Type::Int),
            BTreeSet::new(),
        );
        assert_eq!(expr_vars(&mapped), vec![table]);
    }

    #[test]
    fn walk_is_post_order_and_unique() {
        let x = Node::var("x", Type::Int);
        let one = Node::constant(1i64);
        let inner = add(x.clone(), one.clone());
        let outer = add(inner.clone(), inner.clone());
        let order = walk(&[outer.clone()]);
        assert_eq!(order, vec![x, one, inner, outer]);
    }
}
