// Expression graph nodes
//
// A Node is a cheap, shareable handle to an immutable vertex of the expression
// graph. Its identity is the content hash of what it computes, so two
// structurally identical nodes built independently are the same vertex.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use opgraph_types::{type_of, Type, Value};

use crate::traversal::expr_vars;

//-----------------------------------------------------------------------------
// Node identity
//-----------------------------------------------------------------------------

/// Content hash identifying a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 32]);

impl NodeId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &self.to_hex()[..12])
    }
}

/// Length-prefixed writes so that adjacent fields cannot run together.
struct IdHasher(blake3::Hasher);

impl IdHasher {
    fn new(kind: &str) -> Self {
        let mut hasher = IdHasher(blake3::Hasher::new());
        hasher.str(kind);
        hasher
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.0.update(&(bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn value(&mut self, value: &Value) {
        self.str(value.kind());
        match value {
            Value::None => {}
            Value::Bool(b) => self.bytes(&[u8::from(*b)]),
            Value::Int(i) => self.bytes(&i.to_le_bytes()),
            Value::Float(x) => self.bytes(&x.to_bits().to_le_bytes()),
            Value::String(s) => self.str(s),
            Value::Timestamp(t) => self.str(&t.to_rfc3339()),
            Value::Timedelta(d) => {
                self.bytes(&d.num_seconds().to_le_bytes());
                self.bytes(&d.subsec_nanos().to_le_bytes());
            }
            Value::List(items) | Value::Array(items) => {
                self.bytes(&(items.len() as u64).to_le_bytes());
                for item in items {
                    self.value(item);
                }
            }
            Value::Dict(fields) => {
                self.bytes(&(fields.len() as u64).to_le_bytes());
                for (key, item) in fields {
                    self.str(key);
                    self.value(item);
                }
            }
        }
    }

    fn finish(self) -> NodeId {
        NodeId(*self.0.finalize().as_bytes())
    }
}

//-----------------------------------------------------------------------------
// Node definition
//-----------------------------------------------------------------------------

/// Literal carried by a const node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    Value(Value),
    /// A sub-graph applied later, e.g. per element by a mapper.
    Lambda(Node),
}

/// Shape of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A free variable placeholder.
    Var { name: String },
    /// A literal.
    Const { value: ConstValue },
    /// The result of applying an operation to named input nodes.
    Output {
        op: String,
        inputs: Vec<(String, Node)>,
    },
}

#[derive(Debug)]
struct NodeData {
    id: NodeId,
    ty: Type,
    kind: NodeKind,
    /// Common names of the methods this node exposes. Not part of identity.
    capabilities: BTreeSet<String>,
}

/// A vertex of the expression graph.
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl Node {
    /// A free variable of type `ty`.
    pub fn var(name: impl Into<String>, ty: Type) -> Self {
        let name = name.into();
        let mut hasher = IdHasher::new("var");
        hasher.str(&name);
        hasher.str(&ty.to_string());
        Self::from_parts(hasher.finish(), ty, NodeKind::Var { name }, BTreeSet::new())
    }

    /// A literal, typed by its runtime value.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = type_of(&value);
        Self::constant_typed(value, ty)
    }

    /// A literal with an explicit type.
    pub fn constant_typed(value: Value, ty: Type) -> Self {
        let mut hasher = IdHasher::new("const");
        hasher.value(&value);
        hasher.str(&ty.to_string());
        Self::from_parts(
            hasher.finish(),
            ty,
            NodeKind::Const {
                value: ConstValue::Value(value),
            },
            BTreeSet::new(),
        )
    }

    /// A lambda whose parameters are the free variables of `body`.
    pub fn lambda(body: Node) -> Self {
        let inputs: Vec<(String, Type)> = expr_vars(&body)
            .iter()
            .filter_map(|var| var.var_name().map(|name| (name.to_string(), var.ty().clone())))
            .collect();
        let ty = Type::function(inputs, body.ty().clone());
        let mut hasher = IdHasher::new("lambda");
        hasher.bytes(body.id().as_bytes());
        Self::from_parts(
            hasher.finish(),
            ty,
            NodeKind::Const {
                value: ConstValue::Lambda(body),
            },
            BTreeSet::new(),
        )
    }

    /// The result of applying `op` to `inputs`. Identity covers the operation
    /// name and the ordered inputs only.
    pub fn output(
        op: impl Into<String>,
        inputs: Vec<(String, Node)>,
        ty: Type,
        capabilities: BTreeSet<String>,
    ) -> Self {
        let op = op.into();
        let mut hasher = IdHasher::new("output");
        hasher.str(&op);
        for (name, input) in &inputs {
            hasher.str(name);
            hasher.bytes(input.id().as_bytes());
        }
        Self::from_parts(hasher.finish(), ty, NodeKind::Output { op, inputs }, capabilities)
    }

    /// The same node exposing `capabilities`.
    pub fn with_capabilities(&self, capabilities: BTreeSet<String>) -> Self {
        Self::from_parts(self.id(), self.ty().clone(), self.kind().clone(), capabilities)
    }

    fn from_parts(id: NodeId, ty: Type, kind: NodeKind, capabilities: BTreeSet<String>) -> Self {
        Node(Arc::new(NodeData {
            id,
            ty,
            kind,
            capabilities,
        }))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// The node's type. Never the invalid sentinel.
    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.0.capabilities
    }

    pub fn has_capability(&self, method: &str) -> bool {
        self.0.capabilities.contains(method)
    }

    pub fn is_var(&self) -> bool {
        matches!(self.0.kind, NodeKind::Var { .. })
    }

    pub fn var_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Var { name } => Some(name),
            _ => None,
        }
    }

    /// Name of the operation that produced this node.
    pub fn op_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Output { op, .. } => Some(op),
            _ => None,
        }
    }

    /// Bound inputs of an output node, in parameter order. Empty otherwise.
    pub fn inputs(&self) -> &[(String, Node)] {
        match &self.0.kind {
            NodeKind::Output { inputs, .. } => inputs,
            _ => &[],
        }
    }

    pub fn input(&self, name: &str) -> Option<&Node> {
        self.inputs().iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    pub fn const_value(&self) -> Option<&Value> {
        match &self.0.kind {
            NodeKind::Const {
                value: ConstValue::Value(value),
            } => Some(value),
            _ => None,
        }
    }

    /// Body of a lambda const.
    pub fn lambda_body(&self) -> Option<&Node> {
        match &self.0.kind {
            NodeKind::Const {
                value: ConstValue::Lambda(body),
            } => Some(body),
            _ => None,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Var { name } => write!(f, "{}", name),
            NodeKind::Const {
                value: ConstValue::Value(value),
            } => write!(f, "{}", value),
            NodeKind::Const {
                value: ConstValue::Lambda(body),
            } => write!(f, "(fn => {})", body),
            NodeKind::Output { op, inputs } => {
                write!(f, "{}(", op)?;
                for (i, (_, input)) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", input)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row() -> Node {
        Node::var("row", Type::typed_dict([("a", Type::Int)]))
    }

    #[test]
    fn structurally_equal_outputs_share_identity() {
        let a = Node::output(
            "pick",
            vec![("obj".into(), row()), ("key".into(), Node::constant("a"))],
            Type::Int,
            BTreeSet::new(),
        );
        let b = Node::output(
            "pick",
            vec![("obj".into(), row()), ("key".into(), Node::constant("a"))],
            Type::Unknown,
            ["count".to_string()].into_iter().collect(),
        );
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());

        let c = Node::output(
            "pick",
            vec![("obj".into(), row()), ("key".into(), Node::constant("b"))],
            Type::Int,
            BTreeSet::new(),
        );
        assert_ne!(a, c);
    }

    #[test]
    fn constants_differ_by_value_shape() {
        let list = Node::constant(Value::List(vec![Value::Int(1)]));
        let array = Node::constant(Value::Array(vec![Value::Int(1)]));
        assert_ne!(list, array);
        assert_eq!(list, Node::constant(Value::List(vec![Value::Int(1)])));
        assert_ne!(Node::constant(Value::Int(1)), Node::constant(Value::from("1")));
    }

    #[test]
    fn durations_keep_sub_millisecond_identity() {
        let micros = |n| Node::constant(Value::Timedelta(chrono::Duration::microseconds(n)));
        assert_ne!(micros(1), micros(2));
        assert_eq!(micros(1), micros(1));
        assert_ne!(
            Node::constant(Value::Timedelta(chrono::Duration::nanoseconds(-1))),
            Node::constant(Value::Timedelta(chrono::Duration::nanoseconds(1)))
        );
    }

    #[test]
    fn lambdas_are_typed_by_their_free_variables() {
        let body = Node::output(
            "pick",
            vec![("obj".into(), row()), ("key".into(), Node::constant("a"))],
            Type::Int,
            BTreeSet::new(),
        );
        let lambda = Node::lambda(body.clone());
        assert_eq!(
            lambda.ty(),
            &Type::function([("row", Type::typed_dict([("a", Type::Int)]))], Type::Int)
        );
        assert_eq!(lambda.lambda_body(), Some(&body));
        assert_eq!(lambda.to_string(), "(fn => pick(row, \"a\"))");
    }

    #[test]
    fn node_ids_render_as_hex() {
        let id = Node::constant(Value::Int(1)).id();
        assert_eq!(id.to_hex().len(), 64);
        assert_eq!(id.to_string(), id.to_hex());
    }
}
