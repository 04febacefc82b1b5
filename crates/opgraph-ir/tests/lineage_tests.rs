//! Tag lineage over graphs built with the call API

use std::collections::BTreeSet;
use std::sync::Arc;

use opgraph_error::GraphError;
use opgraph_ir::{walk, Arg, Context, Node};
use opgraph_ops::{derive_mapped, OpArgs, OpDef, OpRegistry, OutputType, ResolverFn};
use opgraph_types::{Type, Value};
use pretty_assertions::assert_eq;

fn noop() -> ResolverFn {
    Arc::new(|_: &[Value]| -> anyhow::Result<Value> { Ok(Value::None) })
}

fn op(name: &str, params: Vec<(&str, Type)>, output: Type) -> OpDef {
    OpDef::new(name, OpArgs::named(params), OutputType::Fixed(output), noop())
}

fn row_type() -> Type {
    Type::typed_dict([("a", Type::Int), ("id", Type::String)])
}

/// Grouping, joining, field access and the key getters.
fn context() -> Context {
    let registry = Arc::new(OpRegistry::new());
    let any = || Type::Unknown;
    for def in [
        op("pick", vec![("obj", row_type()), ("key", Type::String)], any()),
        op(
            "list-groupby",
            vec![("arr", Type::list(any())), ("groupByFn", any())],
            Type::list(Type::list(any())),
        ),
        op(
            "list-join",
            vec![
                ("arr1", Type::list(any())),
                ("arr2", Type::list(any())),
                ("joinFn1", any()),
                ("joinFn2", any()),
            ],
            Type::list(any()),
        ),
        op("group-groupkey", vec![("obj", any())], any()).with_gets_tag_by_name("groupKey"),
        op("joined-joinkey", vec![("obj", any())], any()).with_gets_tag_by_name("joinKey"),
        op("list-count", vec![("arr", Type::list(any()))], Type::Int),
    ] {
        registry.register(def).unwrap();
    }
    Context::new(registry)
}

fn call(ctx: &Context, name: &str, args: Vec<Arg>) -> Node {
    ctx.op(name).unwrap().call(args).unwrap().into_node().unwrap()
}

/// `pick(<var>, key)` wrapped in a lambda; returns (lambda, body).
fn key_fn(ctx: &Context, var: &str, key: &str) -> (Node, Node) {
    let row = ctx.var(var, row_type()).unwrap();
    let body = call(ctx, "pick", vec![Arg::from(&row), Arg::from(key)]);
    (Node::lambda(body.clone()), body)
}

fn set(nodes: &[&Node]) -> BTreeSet<Node> {
    nodes.iter().map(|n| (*n).clone()).collect()
}

#[test]
fn group_key_originates_in_the_grouping_function() {
    let ctx = context();
    let table = ctx.var("table", Type::list(row_type())).unwrap();
    let (group_fn, group_body) = key_fn(&ctx, "row", "a");
    let grouped = call(&ctx, "list-groupby", vec![Arg::from(&table), Arg::from(group_fn)]);
    let key = call(&ctx, "group-groupkey", vec![Arg::from(&grouped)]);

    let stitched = ctx.analyze(&[key.clone()]).unwrap();
    assert!(stitched.combined_outputs(&group_body).contains(&key));
    // The grouped node hands its subscription over to the key function
    assert!(stitched.tag_subscribers(&grouped, "groupKey").is_empty());
    assert_eq!(stitched.combined_outputs(&grouped), set(&[&key]));
}

#[test]
fn join_key_originates_in_both_key_functions() {
    let ctx = context();
    let left = ctx.var("left", Type::list(row_type())).unwrap();
    let right = ctx.var("right", Type::list(row_type())).unwrap();
    let (left_fn, left_body) = key_fn(&ctx, "l", "id");
    let (right_fn, right_body) = key_fn(&ctx, "r", "id");
    let joined = call(
        &ctx,
        "list-join",
        vec![
            Arg::from(&left),
            Arg::from(&right),
            Arg::from(left_fn),
            Arg::from(right_fn),
        ],
    );
    let key = call(&ctx, "joined-joinkey", vec![Arg::from(&joined)]);

    let stitched = ctx.analyze(&[key.clone()]).unwrap();
    assert!(stitched.combined_outputs(&left_body).contains(&key));
    assert!(stitched.combined_outputs(&right_body).contains(&key));
    assert!(!stitched.combined_outputs(&left).contains(&key));
}

#[test]
fn lambda_variables_depend_on_earlier_arguments() {
    let ctx = context();
    let left = ctx.var("left", Type::list(row_type())).unwrap();
    let right = ctx.var("right", Type::list(row_type())).unwrap();
    let l = ctx.var("l", row_type()).unwrap();
    let r = ctx.var("r", row_type()).unwrap();
    let left_fn = Node::lambda(call(&ctx, "pick", vec![Arg::from(&l), Arg::from("id")]));
    let right_fn = Node::lambda(call(&ctx, "pick", vec![Arg::from(&r), Arg::from("id")]));
    let joined = call(
        &ctx,
        "list-join",
        vec![
            Arg::from(&left),
            Arg::from(&right),
            Arg::from(left_fn.clone()),
            Arg::from(right_fn),
        ],
    );

    let stitched = ctx.analyze(&[joined.clone()]).unwrap();
    assert_eq!(stitched.inputs(&l), set(&[&left, &right]));
    // The second key function also sees the first one as an earlier argument
    assert_eq!(stitched.inputs(&r), set(&[&left, &right, &left_fn]));
}

#[test]
fn analysis_is_repeatable() {
    let ctx = context();
    let table = ctx.var("table", Type::list(row_type())).unwrap();
    let (group_fn, _) = key_fn(&ctx, "row", "a");
    let grouped = call(&ctx, "list-groupby", vec![Arg::from(&table), Arg::from(group_fn)]);
    let key = call(&ctx, "group-groupkey", vec![Arg::from(&grouped)]);
    let count = call(&ctx, "list-count", vec![Arg::from(&grouped)]);
    let roots = [key, count];

    let first = ctx.analyze(&roots).unwrap();
    let second = ctx.analyze(&roots).unwrap();
    for node in walk(&roots) {
        assert_eq!(first.combined_outputs(&node), second.combined_outputs(&node));
    }
    assert_eq!(first.node_count(), second.node_count());
    assert_eq!(first.edge_count(), second.edge_count());
}

#[test]
fn mapped_getters_subscribe_like_their_base() {
    let registry = Arc::new(OpRegistry::new());
    registry
        .register(
            op("project-runs", vec![("project", Type::Unknown)], Type::list(Type::Unknown))
                .with_tags_output(true),
        )
        .unwrap();
    let getter = registry
        .register(
            op("tag-project", vec![("obj", Type::Unknown)], Type::Unknown)
                .with_gets_tag_by_name("project"),
        )
        .unwrap();
    derive_mapped(&registry, &getter).unwrap();
    let ctx = Context::new(registry);

    let project = ctx.var("project", Type::Unknown).unwrap();
    let runs = call(&ctx, "project-runs", vec![Arg::from(&project)]);
    let projects = call(&ctx, "mapped_tag-project", vec![Arg::from(&runs)]);

    let stitched = ctx.analyze(&[projects.clone()]).unwrap();
    assert_eq!(stitched.combined_outputs(&project), set(&[&runs, &projects]));
}

#[test]
fn grouping_without_a_lambda_is_malformed() {
    let ctx = context();
    let table = ctx.var("table", Type::list(row_type())).unwrap();
    let grouped = call(&ctx, "list-groupby", vec![Arg::from(&table), Arg::from("a")]);
    let err = ctx.analyze(&[grouped]).unwrap_err();
    assert!(matches!(err, GraphError::MalformedGraph(_)));
}
