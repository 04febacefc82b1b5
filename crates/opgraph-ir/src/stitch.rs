// Tag lineage analysis
//
// Connects tag getters to the nodes that actually provide the tag they read.
// A dependency graph is built over the nodes reachable from a set of roots,
// then walked from the roots upward. Each node collects the tag getters
// downstream of it, and a node that provides a tag hands its subscribers over
// to the inputs the tag really originates from.

use std::collections::{BTreeMap, BTreeSet};

use opgraph_error::{GraphError, GraphResult};
use opgraph_ops::{common_name, OpRegistry};

use crate::node::Node;
use crate::traversal::expr_vars;

const GROUP_KEY: &str = "groupKey";
const JOIN_KEY: &str = "joinKey";

//-----------------------------------------------------------------------------
// Operation shapes
//-----------------------------------------------------------------------------

fn op_common_name(node: &Node) -> Option<&str> {
    node.op_name().map(common_name)
}

/// Operations applying their second input, a lambda, to every element.
fn is_mapper(node: &Node) -> bool {
    matches!(op_common_name(node), Some("map") | Some("mapEach"))
}

/// Body of the lambda passed as input `index` of `node`.
fn lambda_input(node: &Node, index: usize) -> GraphResult<&Node> {
    node.inputs()
        .get(index)
        .and_then(|(_, input)| input.lambda_body())
        .ok_or_else(|| {
            GraphError::malformed(format!(
                "{} expects a lambda as input {}",
                node.op_name().unwrap_or("<non-output node>"),
                index
            ))
        })
}

/// Tag read by `node` when it is a tag getter or the mapped variant of one.
fn gets_tag_by_name(registry: &OpRegistry, node: &Node) -> GraphResult<Option<String>> {
    let Some(op_name) = node.op_name() else {
        return Ok(None);
    };
    let op = registry.get(op_name)?;
    if let Some(tag) = op.gets_tag_by_name() {
        return Ok(Some(tag.to_string()));
    }
    Ok(registry
        .mapped_base(&op)?
        .and_then(|base| base.gets_tag_by_name().map(str::to_string)))
}

/// A tag provided by a node, and the inputs the tag comes from.
struct ProvidedTag {
    tag: String,
    providers: Vec<Node>,
}

fn provides_tag(registry: &OpRegistry, node: &Node) -> GraphResult<Option<ProvidedTag>> {
    let Some(op_name) = node.op_name() else {
        return Ok(None);
    };
    let op = registry.get(op_name)?;
    let tagging_base = registry
        .mapped_base(&op)?
        .map_or(false, |base| base.tags_output());

    if op.tags_output() || tagging_base {
        let (name, first) = node.inputs().first().ok_or_else(|| {
            GraphError::malformed(format!("{} tags its output but has no inputs", op_name))
        })?;
        return Ok(Some(ProvidedTag {
            tag: name.clone(),
            providers: vec![first.clone()],
        }));
    }

    let provided = match op.common_name() {
        name if name.eq_ignore_ascii_case("groupby") => ProvidedTag {
            tag: GROUP_KEY.to_string(),
            providers: vec![lambda_input(node, 1)?.clone()],
        },
        "joinAll" => ProvidedTag {
            tag: JOIN_KEY.to_string(),
            providers: vec![lambda_input(node, 1)?.clone()],
        },
        "join" => ProvidedTag {
            tag: JOIN_KEY.to_string(),
            providers: vec![lambda_input(node, 2)?.clone(), lambda_input(node, 3)?.clone()],
        },
        _ => return Ok(None),
    };
    Ok(Some(provided))
}

//-----------------------------------------------------------------------------
// Dependency graph
//-----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DependencyGraph {
    input_to_output: BTreeMap<Node, BTreeSet<Node>>,
    output_to_input: BTreeMap<Node, BTreeSet<Node>>,
    /// Nodes whose inputs have already been added
    built: BTreeSet<Node>,
}

impl DependencyGraph {
    fn add_node(&mut self, node: &Node) -> GraphResult<()> {
        if !self.built.insert(node.clone()) {
            return Ok(());
        }
        let inputs = node.inputs();
        for (index, (_, input)) in inputs.iter().enumerate() {
            // A getter applied inside the mapped lambda reads the same tag as
            // one applied to the mapped result
            if is_mapper(input) {
                let body = lambda_input(input, 1)?.clone();
                self.add_edge(&body, node);
            }
            self.add_edge(input, node);
            self.add_node(input)?;

            // Every variable of a lambda may depend on any earlier argument
            if let Some(body) = input.lambda_body() {
                self.add_node(body)?;
                for var in expr_vars(body) {
                    for (_, earlier) in &inputs[..index] {
                        self.add_edge(earlier, &var);
                    }
                }
            }
        }
        Ok(())
    }

    fn add_edge(&mut self, input: &Node, output: &Node) {
        self.input_to_output
            .entry(input.clone())
            .or_default()
            .insert(output.clone());
        self.output_to_input
            .entry(output.clone())
            .or_default()
            .insert(input.clone());
    }

    fn outputs_of(&self, node: &Node) -> BTreeSet<Node> {
        self.input_to_output.get(node).cloned().unwrap_or_default()
    }

    fn inputs_of(&self, node: &Node) -> BTreeSet<Node> {
        self.output_to_input.get(node).cloned().unwrap_or_default()
    }

    fn edge_count(&self) -> usize {
        self.input_to_output.values().map(BTreeSet::len).sum()
    }
}

//-----------------------------------------------------------------------------
// Tag subscriptions
//-----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TagSubscriptions {
    /// Node -> tag -> getters downstream of the node reading that tag
    downstream: BTreeMap<Node, BTreeMap<String, BTreeSet<Node>>>,

    /// Provider -> getters that read a tag it provides
    provides_for: BTreeMap<Node, BTreeSet<Node>>,
}

impl TagSubscriptions {
    fn subscribe(&mut self, node: &Node, tag: String, getters: impl IntoIterator<Item = Node>) {
        self.downstream
            .entry(node.clone())
            .or_default()
            .entry(tag)
            .or_default()
            .extend(getters);
    }

    fn merge_from(&mut self, node: &Node, successor: &Node) {
        let Some(tags) = self.downstream.get(successor).cloned() else {
            return;
        };
        for (tag, getters) in tags {
            self.subscribe(node, tag, getters);
        }
    }

    fn take(&mut self, node: &Node, tag: &str) -> BTreeSet<Node> {
        self.downstream
            .get_mut(node)
            .and_then(|tags| tags.get_mut(tag))
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn rollup(
        &mut self,
        registry: &OpRegistry,
        node: &Node,
        successors: &BTreeSet<Node>,
        graph: &DependencyGraph,
    ) -> GraphResult<()> {
        for successor in successors {
            match gets_tag_by_name(registry, successor)? {
                Some(tag) => self.subscribe(node, tag, [successor.clone()]),
                None => self.merge_from(node, successor),
            }
        }

        let Some(provided) = provides_tag(registry, node)? else {
            return Ok(());
        };
        let getters = self.take(node, &provided.tag);
        for provider in &provided.providers {
            for getter in &getters {
                self.provides_for
                    .entry(provider.clone())
                    .or_default()
                    .insert(getter.clone());
                // The tag originates above the provider, so the getter's
                // other inputs contribute their subscriptions there
                self.rollup(registry, provider, &graph.inputs_of(getter), graph)?;
            }
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
// Analysis
//-----------------------------------------------------------------------------

/// Lineage of a graph: direct consumers plus tag subscriptions.
#[derive(Debug)]
pub struct StitchGraph {
    graph: DependencyGraph,
    subscriptions: TagSubscriptions,
}

impl StitchGraph {
    /// Nodes consuming `node` directly, plus tag getters reading a tag that
    /// `node` provides.
    pub fn combined_outputs(&self, node: &Node) -> BTreeSet<Node> {
        let mut outputs = self.graph.outputs_of(node);
        if let Some(getters) = self.subscriptions.provides_for.get(node) {
            outputs.extend(getters.iter().cloned());
        }
        outputs
    }

    pub fn outputs(&self, node: &Node) -> BTreeSet<Node> {
        self.graph.outputs_of(node)
    }

    pub fn inputs(&self, node: &Node) -> BTreeSet<Node> {
        self.graph.inputs_of(node)
    }

    /// Getters for `tag` downstream of `node` that no provider claimed.
    pub fn tag_subscribers(&self, node: &Node, tag: &str) -> BTreeSet<Node> {
        self.subscriptions
            .downstream
            .get(node)
            .and_then(|tags| tags.get(tag))
            .cloned()
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.built.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Analyze the graph reachable from `roots`.
///
/// Fails with `MalformedGraph` when a mapper, grouping or join node lacks the
/// lambda inputs the analysis reads, and with a registry error when a node
/// names an unregistered operation.
pub fn analyze(registry: &OpRegistry, roots: &[Node]) -> GraphResult<StitchGraph> {
    let mut graph = DependencyGraph::default();
    for root in roots {
        graph.add_node(root)?;
    }

    let mut subscriptions = TagSubscriptions::default();
    let mut frontier: Vec<Node> = roots.to_vec();
    let mut visited: BTreeSet<Node> = BTreeSet::new();
    while let Some(node) = frontier.pop() {
        if !visited.insert(node.clone()) {
            continue;
        }

        // Inputs become ready once every node consuming them was visited
        for input in graph.inputs_of(&node) {
            if graph.outputs_of(&input).iter().all(|o| visited.contains(o)) {
                frontier.push(input);
            }
        }
        if let Some(body) = node.lambda_body() {
            if graph.outputs_of(body).iter().all(|o| visited.contains(o)) {
                frontier.push(body.clone());
            }
        }

        subscriptions.rollup(registry, &node, &graph.outputs_of(&node), &graph)?;
    }

    tracing::debug!(
        roots = roots.len(),
        nodes = graph.built.len(),
        edges = graph.edge_count(),
        visited = visited.len(),
        "stitched graph"
    );
    Ok(StitchGraph {
        graph,
        subscriptions,
    })
}
