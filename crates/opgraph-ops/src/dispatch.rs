// Dispatch
//
// Selects the registered variant of an operation whose declared input types
// best match the types of the arguments at a call site.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use opgraph_error::{DispatchError, DispatchResult, RegistryResult};
use opgraph_types::{AssignMode, Type};
use serde::{Deserialize, Serialize};

use crate::op_def::{common_name, OpArgs, OpDef};
use crate::registry::OpRegistry;

/// Common name of the element-access operation.
pub const GETITEM: &str = "__getitem__";

/// Common name of the named-field-access operation tried when element access
/// finds no match.
pub const PICK: &str = "pick";

/// What to do when no variant statically accepts the arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// Fall back to `pick` or the declared operation and report the miss.
    #[default]
    Permissive,
    /// Fail with `DispatchError::Miss`.
    Strict,
}

/// How a fallback operation was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissKind {
    /// Element access had no match; a `pick` variant accepted the arguments.
    PickFallback,
    /// Nothing matched; the operation named at the call site is used as is.
    Declared,
}

/// A call site for which no variant of the requested operation matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMiss {
    pub kind: MissKind,
    /// Operation named at the call site
    pub requested: String,
    /// Rendered argument types
    pub arg_types: String,
}

impl fmt::Display for DispatchMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            MissKind::PickFallback => "fell back to pick",
            MissKind::Declared => "fell back to declared op",
        };
        write!(f, "{} with ({}): {}", self.requested, self.arg_types, kind)
    }
}

/// Whether the chosen operation is statically known to accept the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Exact,
    Fallback(DispatchMiss),
}

/// Outcome of dispatching a call.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub op: Arc<OpDef>,
    pub status: DispatchStatus,
}

impl Dispatched {
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

//-----------------------------------------------------------------------------
// Scoring
//-----------------------------------------------------------------------------

/// How narrowly a declared type constrains its argument. Containers score
/// their contents too, so `list<int>` ranks above `list<unknown>`.
fn narrowness(ty: &Type) -> u32 {
    let fields = |fields: &BTreeMap<String, Type>| fields.values().map(narrowness).sum::<u32>();
    match ty {
        Type::Unknown => 0,
        Type::Union(_) => 1,
        Type::Const { base, .. } => 3 + narrowness(base),
        Type::List(element) | Type::Array(element) | Type::Run(element) => 2 + narrowness(element),
        Type::TypedDict(properties) | Type::Object { properties, .. } => 2 + fields(properties),
        Type::Function { inputs, output } => {
            2 + inputs.iter().map(|(_, t)| narrowness(t)).sum::<u32>() + narrowness(output)
        }
        Type::Tagged { value, .. } => narrowness(value),
        _ => 2,
    }
}

fn specificity(args: &OpArgs) -> u32 {
    match args {
        OpArgs::Named(params) => params.iter().map(|(_, t)| narrowness(t)).sum(),
        OpArgs::Varargs(t) => narrowness(t),
    }
}

/// A mapped variant ranks above the others only when the first argument is a
/// container whose element type the base's first parameter accepts.
fn mapped_bonus(registry: &OpRegistry, op: &OpDef, args: &[Type]) -> RegistryResult<bool> {
    let Some(base) = registry.mapped_base(op)? else {
        return Ok(false);
    };
    let (Some(first_arg), Some((_, base_first))) = (args.first(), base.input_type().first_param())
    else {
        return Ok(false);
    };
    Ok(first_arg
        .element_type()
        .map_or(false, |element| base_first.assign_type(&element)))
}

fn render_arg_types(args: &[Type], kwargs: &BTreeMap<String, Type>) -> String {
    args.iter()
        .map(ToString::to_string)
        .chain(kwargs.iter().map(|(k, t)| format!("{}={}", k, t)))
        .collect::<Vec<_>>()
        .join(", ")
}

//-----------------------------------------------------------------------------
// Dispatch
//-----------------------------------------------------------------------------

/// Best variant sharing the common name of `name` that accepts the argument
/// types, if any.
///
/// `unknown` arguments are accepted, since call sites inside lambdas are typed
/// before their variables are known. Candidates are ranked by the mapped
/// preference, then by how narrowly they are typed, then by registration order.
pub fn find_op(
    registry: &OpRegistry,
    name: &str,
    args: &[Type],
    kwargs: &BTreeMap<String, Type>,
) -> RegistryResult<Option<Arc<OpDef>>> {
    let mut best: Option<((bool, u32), Arc<OpDef>)> = None;
    for candidate in registry.ops_with_common_name(common_name(name))? {
        if !candidate
            .input_type()
            .accepts(args, kwargs, AssignMode::Permissive)
        {
            continue;
        }
        let score = (
            mapped_bonus(registry, &candidate, args)?,
            specificity(candidate.input_type()),
        );
        // Strictly greater, so the earliest registration wins ties
        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((score, candidate));
        }
    }
    Ok(best.map(|(_, op)| op))
}

/// Choose the operation to call for `name` with the given argument types.
///
/// Element access with no match is retried as a `pick`. Anything else with no
/// match resolves to the operation registered under `name` itself. Both
/// fallbacks are flagged as a miss, and a strict `policy` rejects them.
pub fn dispatch(
    registry: &OpRegistry,
    name: &str,
    args: &[Type],
    kwargs: &BTreeMap<String, Type>,
    policy: DispatchPolicy,
) -> DispatchResult<Dispatched> {
    if let Some(op) = find_op(registry, name, args, kwargs)? {
        tracing::trace!(requested = name, op = op.name(), "dispatched");
        return Ok(Dispatched {
            op,
            status: DispatchStatus::Exact,
        });
    }

    let arg_types = render_arg_types(args, kwargs);

    if common_name(name) == GETITEM {
        if let Some(op) = find_op(registry, PICK, args, kwargs)? {
            tracing::warn!(
                requested = name,
                op = op.name(),
                arg_types = %arg_types,
                "no element access op matched, using pick"
            );
            if policy == DispatchPolicy::Strict {
                return Err(DispatchError::Miss {
                    op: name.to_string(),
                    arg_types,
                });
            }
            return Ok(Dispatched {
                op,
                status: DispatchStatus::Fallback(DispatchMiss {
                    kind: MissKind::PickFallback,
                    requested: name.to_string(),
                    arg_types,
                }),
            });
        }
    }

    tracing::warn!(
        requested = name,
        arg_types = %arg_types,
        "unable to find a valid op"
    );
    if policy == DispatchPolicy::Strict {
        return Err(DispatchError::Miss {
            op: name.to_string(),
            arg_types,
        });
    }
    let op = registry.get(name)?;
    Ok(Dispatched {
        op,
        status: DispatchStatus::Fallback(DispatchMiss {
            kind: MissKind::Declared,
            requested: name.to_string(),
            arg_types,
        }),
    })
}
