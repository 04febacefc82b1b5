// Operation definitions
//
// An OpDef is the immutable description of a registered operation: its name,
// input and output types, resolver and the markers the graph builder and the
// stitcher look at.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use opgraph_types::{AssignMode, Type, TypeOutcome, Value};

/// Types of the arguments bound to an operation, by parameter name.
pub type ArgTypes = BTreeMap<String, Type>;

/// The computation behind an operation. Opaque to the graph layer.
pub type ResolverFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Output type computed from the types of the bound arguments.
pub type OutputTypeFn = Arc<dyn Fn(&ArgTypes) -> TypeOutcome + Send + Sync>;

/// Mutation hook: receives the inputs of the producing call and the new value.
pub type SetterFn = Arc<dyn Fn(&[Value], Value) -> anyhow::Result<()> + Send + Sync>;

/// Prefix of the namespace used for names derived from a declaration site.
pub const OP_URI_SCHEME: &str = "op://";

//-----------------------------------------------------------------------------
// Input and output types
//-----------------------------------------------------------------------------

/// Input type specification of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpArgs {
    /// Ordered named parameters.
    Named(Vec<(String, Type)>),
    /// Any number of arguments of one type.
    Varargs(Type),
}

impl OpArgs {
    pub fn named<K: Into<String>>(params: impl IntoIterator<Item = (K, Type)>) -> Self {
        OpArgs::Named(params.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    /// Parameter names in declaration order. Empty for varargs.
    pub fn param_names(&self) -> Vec<&str> {
        match self {
            OpArgs::Named(params) => params.iter().map(|(name, _)| name.as_str()).collect(),
            OpArgs::Varargs(_) => Vec::new(),
        }
    }

    pub fn first_param(&self) -> Option<(&str, &Type)> {
        match self {
            OpArgs::Named(params) => params.first().map(|(name, ty)| (name.as_str(), ty)),
            OpArgs::Varargs(_) => None,
        }
    }

    pub fn param_type(&self, name: &str) -> Option<&Type> {
        match self {
            OpArgs::Named(params) => params.iter().find(|(n, _)| n == name).map(|(_, t)| t),
            OpArgs::Varargs(ty) => Some(ty),
        }
    }

    /// Pair each supplied argument with its parameter name: positionals first,
    /// then keywords. `None` when an argument has no parameter, a parameter is
    /// bound twice, or a named parameter is left unbound.
    pub fn bind<'a, T>(
        &self,
        args: &'a [T],
        kwargs: &'a BTreeMap<String, T>,
    ) -> Option<Vec<(String, &'a T)>> {
        match self {
            OpArgs::Named(params) => {
                if args.len() > params.len() {
                    return None;
                }
                let mut bound: Vec<Option<&T>> = vec![None; params.len()];
                for (slot, arg) in bound.iter_mut().zip(args) {
                    *slot = Some(arg);
                }
                for (name, arg) in kwargs {
                    let index = params.iter().position(|(n, _)| n == name)?;
                    if bound[index].is_some() {
                        return None;
                    }
                    bound[index] = Some(arg);
                }
                params
                    .iter()
                    .zip(bound)
                    .map(|((name, _), arg)| arg.map(|a| (name.clone(), a)))
                    .collect()
            }
            OpArgs::Varargs(_) => Some(
                args.iter()
                    .enumerate()
                    .map(|(i, a)| (i.to_string(), a))
                    .chain(kwargs.iter().map(|(k, a)| (k.clone(), a)))
                    .collect(),
            ),
        }
    }

    /// Whether arguments of the given types can be passed to this operation.
    pub fn accepts(&self, args: &[Type], kwargs: &BTreeMap<String, Type>, mode: AssignMode) -> bool {
        let Some(bound) = self.bind(args, kwargs) else {
            return false;
        };
        bound.iter().all(|(name, arg)| {
            self.param_type(name)
                .map_or(false, |declared| declared.assign_type_with(arg, mode))
        })
    }
}

/// Output type of an operation: fixed, or computed from argument types.
#[derive(Clone)]
pub enum OutputType {
    Fixed(Type),
    Computed(OutputTypeFn),
}

impl OutputType {
    pub fn computed(f: impl Fn(&ArgTypes) -> TypeOutcome + Send + Sync + 'static) -> Self {
        OutputType::Computed(Arc::new(f))
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, OutputType::Computed(_))
    }

    /// Resolve against the bound argument types.
    pub fn resolve(&self, arg_types: &ArgTypes) -> TypeOutcome {
        match self {
            OutputType::Fixed(ty) => Ok(ty.clone()),
            OutputType::Computed(f) => f(arg_types),
        }
    }
}

impl fmt::Debug for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Fixed(ty) => f.debug_tuple("Fixed").field(ty).finish(),
            OutputType::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

//-----------------------------------------------------------------------------
// Resolver signatures
//-----------------------------------------------------------------------------

/// A resolver parameter as written at the declaration site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSignature {
    pub name: String,
    /// Annotation string, if the parameter was annotated.
    pub hint: Option<String>,
}

/// Declaration-site description of a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSignature {
    pub module: String,
    pub fn_name: String,
    pub params: Vec<ParamSignature>,
    pub returns: Option<String>,
}

impl ResolverSignature {
    pub fn new(module: impl Into<String>, fn_name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            fn_name: fn_name.into(),
            params: Vec::new(),
            returns: None,
        }
    }

    /// Add an annotated parameter.
    pub fn param(mut self, name: impl Into<String>, hint: impl Into<String>) -> Self {
        self.params.push(ParamSignature {
            name: name.into(),
            hint: Some(hint.into()),
        });
        self
    }

    /// Add a parameter with no annotation.
    pub fn untyped_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSignature {
            name: name.into(),
            hint: None,
        });
        self
    }

    pub fn returns(mut self, hint: impl Into<String>) -> Self {
        self.returns = Some(hint.into());
        self
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// Name derived from the declaration site, `op://<module>.<fn>`.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}{}.{}", OP_URI_SCHEME, self.module, self.fn_name)
    }
}

/// A resolver with its declaration-site signature.
#[derive(Clone)]
pub struct Resolver {
    pub signature: ResolverSignature,
    pub body: ResolverFn,
}

impl Resolver {
    pub fn new(
        signature: ResolverSignature,
        body: impl Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            signature,
            body: Arc::new(body),
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

//-----------------------------------------------------------------------------
// OpDef
//-----------------------------------------------------------------------------

/// Strip any namespace from an operation name.
///
/// `op://pkg::ops.add`, `number-add` and `mapped_number-add` all have the
/// common name `add`.
pub fn common_name(name: &str) -> &str {
    let name = match name.find("://") {
        Some(scheme_end) => {
            let rest = &name[scheme_end + 3..];
            rest.rsplit('.').next().unwrap_or(rest)
        }
        None => name,
    };
    let name = name.strip_prefix("mapped_").unwrap_or(name);
    name.rsplit('-').next().unwrap_or(name)
}

/// A registered operation.
#[derive(Clone)]
pub struct OpDef {
    name: String,
    input_type: OpArgs,
    output_type: OutputType,
    resolver: ResolverFn,
    setter: Option<SetterFn>,
    refine_output_type: Option<String>,
    derived_from: Option<String>,
    is_builtin: bool,
    pure: bool,
    gets_tag_by_name: Option<String>,
    tags_output: bool,
}

impl OpDef {
    pub fn new(
        name: impl Into<String>,
        input_type: OpArgs,
        output_type: OutputType,
        resolver: ResolverFn,
    ) -> Self {
        Self {
            name: name.into(),
            input_type,
            output_type,
            resolver,
            setter: None,
            refine_output_type: None,
            derived_from: None,
            is_builtin: false,
            pure: true,
            gets_tag_by_name: None,
            tags_output: false,
        }
    }

    pub fn with_setter(mut self, setter: SetterFn) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Name of the operation that refines this one's output type.
    pub fn with_refiner(mut self, refiner: impl Into<String>) -> Self {
        self.refine_output_type = Some(refiner.into());
        self
    }

    pub fn with_derived_from(mut self, base: impl Into<String>) -> Self {
        self.derived_from = Some(base.into());
        self
    }

    pub fn with_builtin(mut self, is_builtin: bool) -> Self {
        self.is_builtin = is_builtin;
        self
    }

    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Mark this operation as reading the tag `tag` off its input.
    pub fn with_gets_tag_by_name(mut self, tag: impl Into<String>) -> Self {
        self.gets_tag_by_name = Some(tag.into());
        self
    }

    /// Mark this operation as tagging its output with its first input.
    pub fn with_tags_output(mut self, tags_output: bool) -> Self {
        self.tags_output = tags_output;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn common_name(&self) -> &str {
        common_name(&self.name)
    }

    pub fn input_type(&self) -> &OpArgs {
        &self.input_type
    }

    pub fn output_type(&self) -> &OutputType {
        &self.output_type
    }

    pub fn resolver(&self) -> &ResolverFn {
        &self.resolver
    }

    pub fn refine_output_type(&self) -> Option<&str> {
        self.refine_output_type.as_deref()
    }

    pub fn derived_from(&self) -> Option<&str> {
        self.derived_from.as_deref()
    }

    pub fn is_builtin(&self) -> bool {
        self.is_builtin
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub fn gets_tag_by_name(&self) -> Option<&str> {
        self.gets_tag_by_name.as_deref()
    }

    pub fn tags_output(&self) -> bool {
        self.tags_output
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    /// Run the resolver on concrete argument values.
    pub fn resolve(&self, args: &[Value]) -> anyhow::Result<Value> {
        (self.resolver)(args)
    }

    /// Run the setter with the inputs of the producing call and the new value.
    pub fn apply_setter(&self, inputs: &[Value], value: Value) -> anyhow::Result<()> {
        match &self.setter {
            Some(setter) => setter(inputs, value),
            None => anyhow::bail!("op {} has no setter", self.name),
        }
    }
}

impl fmt::Debug for OpDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpDef")
            .field("name", &self.name)
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .field("refine_output_type", &self.refine_output_type)
            .field("derived_from", &self.derived_from)
            .field("gets_tag_by_name", &self.gets_tag_by_name)
            .field("tags_output", &self.tags_output)
            .finish_non_exhaustive()
    }
}
