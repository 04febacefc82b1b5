//! Structural Type System
//!
//! This module provides the [`Type`] enum describing the shape of data flowing
//! through an expression graph, together with the assignability relation used
//! by operation declaration and dispatch.
//!
//! ## Assignability
//!
//! `target.assign_type(candidate)` asks whether a value statically typed
//! `candidate` may be used wherever `target` is expected:
//!
//! - identical types are mutually assignable
//! - `unknown` accepts anything; as a candidate it is only accepted by an
//!   `unknown`-accepting slot, unless [`AssignMode::Permissive`] is requested
//! - a union candidate is accepted only if every member is accepted
//! - a union target accepts a candidate accepted by any member
//! - containers are covariant over their element type
//! - typed mappings are structural: every target field must be present and
//!   assignable in the candidate (optional fields may be absent), extra
//!   candidate fields are permitted
//! - object types compare by name, then property by property
//! - tags are transparent to untagged targets
//!
//! ## Invalid
//!
//! Type-level computations that can fail (e.g. "what is the element type of
//! this") return [`TypeOutcome`], whose error side is the [`Invalid`] sentinel.
//! `Invalid` is not a `Type` and can never be stored where a `Type` is expected.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

//-----------------------------------------------------------------------------
// Type Definition
//-----------------------------------------------------------------------------

/// Defines the structure of values in an expression graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Not yet known; accepts anything.
    Unknown,
    NoneType,
    Bool,
    Int,
    Float,
    String,
    Timestamp,
    Timedelta,
    /// A list of elements of a single type.
    List(Box<Type>),
    /// A mapping with named fields.
    TypedDict(BTreeMap<String, Type>),
    /// A generic array of elements of a single type.
    Array(Box<Type>),
    /// A union of member types. Build with [`Type::union`] so members are
    /// flattened, deduplicated and ordered canonically.
    Union(Vec<Type>),
    /// A literal value together with its base type.
    Const { base: Box<Type>, value: Value },
    /// A function from named argument types to a result type.
    Function {
        inputs: Vec<(String, Type)>,
        output: Box<Type>,
    },
    /// A user-defined object type with named properties.
    Object {
        name: String,
        properties: BTreeMap<String, Type>,
    },
    /// The eventual result of an asynchronous operation.
    Run(Box<Type>),
    /// A value carrying out-of-band tags.
    Tagged {
        tags: BTreeMap<String, Type>,
        value: Box<Type>,
    },
}

/// Sentinel returned by type-level computations that have no valid answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Invalid;

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid")
    }
}

/// Result of a type-level computation.
pub type TypeOutcome = Result<Type, Invalid>;

/// How `unknown` candidates are treated by [`Type::assign_type_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssignMode {
    /// `unknown` is only accepted by `unknown`-accepting slots.
    #[default]
    Strict,
    /// `unknown` is accepted anywhere. Used while inferring types.
    Permissive,
}

/// Coarse classification of types, used to key capability lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCategory {
    Unknown,
    None,
    Bool,
    Int,
    Float,
    String,
    Timestamp,
    Timedelta,
    List,
    TypedDict,
    Array,
    Union,
    Function,
    Object(String),
    Run,
}

//-----------------------------------------------------------------------------
// Constructors
//-----------------------------------------------------------------------------

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn run(output: Type) -> Self {
        Type::Run(Box::new(output))
    }

    pub fn typed_dict<K: Into<String>>(fields: impl IntoIterator<Item = (K, Type)>) -> Self {
        Type::TypedDict(fields.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    pub fn object<K: Into<String>>(
        name: impl Into<String>,
        properties: impl IntoIterator<Item = (K, Type)>,
    ) -> Self {
        Type::Object {
            name: name.into(),
            properties: properties.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        }
    }

    pub fn function<K: Into<String>>(
        inputs: impl IntoIterator<Item = (K, Type)>,
        output: Type,
    ) -> Self {
        Type::Function {
            inputs: inputs.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            output: Box::new(output),
        }
    }

    /// Literal type for `value`, based on `base`.
    pub fn constant(base: Type, value: Value) -> Self {
        match base {
            // Already a literal; keep the innermost base
            Type::Const { base, .. } => Type::Const { base, value },
            base => Type::Const {
                base: Box::new(base),
                value,
            },
        }
    }

    pub fn tagged<K: Into<String>>(tags: impl IntoIterator<Item = (K, Type)>, value: Type) -> Self {
        Type::Tagged {
            tags: tags.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            value: Box::new(value),
        }
    }

    /// `union(T, none)`.
    pub fn optional(inner: Type) -> Self {
        Type::union([inner, Type::NoneType])
    }

    /// Canonical union of `members`: nested unions are flattened, duplicates
    /// removed and members ordered by their rendering. A single member
    /// collapses to itself; no members yields `unknown`.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            match member {
                Type::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => Type::Unknown,
            1 => flat.remove(0),
            _ => {
                flat.sort_by_cached_key(|t| t.to_string());
                Type::Union(flat)
            }
        }
    }
}

//-----------------------------------------------------------------------------
// Assignability
//-----------------------------------------------------------------------------

impl Type {
    /// Whether a value of type `other` may be used where `self` is expected.
    pub fn assign_type(&self, other: &Type) -> bool {
        self.assign_type_with(other, AssignMode::Strict)
    }

    /// [`Type::assign_type`] with explicit treatment of `unknown` candidates.
    pub fn assign_type_with(&self, other: &Type, mode: AssignMode) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Unknown, _) => true,
            (_, Type::Union(members)) => members.iter().all(|m| self.assign_type_with(m, mode)),
            (Type::Union(members), _) => members.iter().any(|m| m.assign_type_with(other, mode)),
            (_, Type::Unknown) => mode == AssignMode::Permissive,

            (
                Type::Tagged { tags, value },
                Type::Tagged {
                    tags: other_tags,
                    value: other_value,
                },
            ) => {
                tags.iter().all(|(name, t)| {
                    other_tags
                        .get(name)
                        .map_or(false, |o| t.assign_type_with(o, mode))
                }) && value.assign_type_with(other_value, mode)
            }
            (Type::Tagged { .. }, _) => false,
            (_, Type::Tagged { value, .. }) => self.assign_type_with(value, mode),

            // A literal target only accepts the identical literal
            (Type::Const { .. }, _) => false,
            (_, Type::Const { base, .. }) => self.assign_type_with(base, mode),

            (Type::List(a), Type::List(b))
            | (Type::Array(a), Type::Array(b))
            | (Type::Run(a), Type::Run(b)) => a.assign_type_with(b, mode),

            (Type::TypedDict(fields), Type::TypedDict(other_fields)) => {
                fields.iter().all(|(name, t)| match other_fields.get(name) {
                    Some(o) => t.assign_type_with(o, mode),
                    None => t.accepts_none(),
                })
            }

            (
                Type::Function { inputs, output },
                Type::Function {
                    inputs: other_inputs,
                    output: other_output,
                },
            ) => {
                inputs.len() == other_inputs.len()
                    && inputs.iter().zip(other_inputs).all(|((name, t), (other_name, o))| {
                        // Parameters are contravariant
                        name == other_name && o.assign_type_with(t, mode)
                    })
                    && output.assign_type_with(other_output, mode)
            }

            (
                Type::Object { name, properties },
                Type::Object {
                    name: other_name,
                    properties: other_properties,
                },
            ) => {
                name == other_name
                    && properties.iter().all(|(prop, t)| {
                        other_properties
                            .get(prop)
                            .map_or(false, |o| t.assign_type_with(o, mode))
                    })
            }

            _ => false,
        }
    }

    /// Whether a `none` value fits this type.
    pub fn accepts_none(&self) -> bool {
        self.assign_type(&Type::NoneType)
    }
}

//-----------------------------------------------------------------------------
// Queries and type-level computations
//-----------------------------------------------------------------------------

impl Type {
    /// True for a union that includes `none` alongside at least one other member.
    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Union(members) if members.contains(&Type::NoneType))
    }

    /// This type with `none` removed from a union.
    pub fn non_none(&self) -> Type {
        match self {
            Type::Union(members) => Type::union(
                members
                    .iter()
                    .filter(|m| **m != Type::NoneType)
                    .cloned(),
            ),
            other => other.clone(),
        }
    }

    /// The base type of a literal, or the type itself.
    pub fn without_const(&self) -> &Type {
        match self {
            Type::Const { base, .. } => base,
            other => other,
        }
    }

    /// The literal carried by a const type.
    pub fn const_value(&self) -> Option<&Value> {
        match self {
            Type::Const { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The value type with tags stripped.
    pub fn untagged(&self) -> &Type {
        match self {
            Type::Tagged { value, .. } => value.untagged(),
            other => other,
        }
    }

    /// Tags carried by this type. Empty for untagged types.
    pub fn tags(&self) -> BTreeMap<String, Type> {
        match self {
            Type::Tagged { tags, value } => {
                let mut all = value.tags();
                all.extend(tags.iter().map(|(k, t)| (k.clone(), t.clone())));
                all
            }
            _ => BTreeMap::new(),
        }
    }

    /// Element type of a list or array.
    pub fn element_type(&self) -> TypeOutcome {
        match self {
            Type::List(element) | Type::Array(element) => Ok((**element).clone()),
            Type::Const { base, .. } => base.element_type(),
            Type::Tagged { value, .. } => value.element_type(),
            _ => Err(Invalid),
        }
    }

    /// Whether this type is a list or array (possibly tagged or literal).
    pub fn is_container(&self) -> bool {
        self.element_type().is_ok()
    }

    /// Type of the named field of a typed mapping or object property.
    pub fn field_type(&self, field: &str) -> TypeOutcome {
        match self.untagged().without_const() {
            Type::TypedDict(fields) => fields.get(field).cloned().ok_or(Invalid),
            Type::Object { properties, .. } => properties.get(field).cloned().ok_or(Invalid),
            Type::Unknown => Ok(Type::Unknown),
            _ => Err(Invalid),
        }
    }

    /// Whether `unknown` appears anywhere within this type.
    pub fn contains_unknown(&self) -> bool {
        match self {
            Type::Unknown => true,
            Type::List(t) | Type::Array(t) | Type::Run(t) => t.contains_unknown(),
            Type::Const { base, .. } => base.contains_unknown(),
            Type::Union(members) => members.iter().any(Type::contains_unknown),
            Type::TypedDict(fields) => fields.values().any(Type::contains_unknown),
            Type::Object { properties, .. } => properties.values().any(Type::contains_unknown),
            Type::Function { inputs, output } => {
                inputs.iter().any(|(_, t)| t.contains_unknown()) || output.contains_unknown()
            }
            Type::Tagged { tags, value } => {
                tags.values().any(Type::contains_unknown) || value.contains_unknown()
            }
            _ => false,
        }
    }

    /// The category used to look up capabilities for this type. Literals,
    /// tags and optional wrappers are looked through.
    pub fn category(&self) -> TypeCategory {
        match self {
            Type::Unknown => TypeCategory::Unknown,
            Type::NoneType => TypeCategory::None,
            Type::Bool => TypeCategory::Bool,
            Type::Int => TypeCategory::Int,
            Type::Float => TypeCategory::Float,
            Type::String => TypeCategory::String,
            Type::Timestamp => TypeCategory::Timestamp,
            Type::Timedelta => TypeCategory::Timedelta,
            Type::List(_) => TypeCategory::List,
            Type::TypedDict(_) => TypeCategory::TypedDict,
            Type::Array(_) => TypeCategory::Array,
            Type::Function { .. } => TypeCategory::Function,
            Type::Object { name, .. } => TypeCategory::Object(name.clone()),
            Type::Run(_) => TypeCategory::Run,
            Type::Const { base, .. } => base.category(),
            Type::Tagged { value, .. } => value.category(),
            Type::Union(_) => match self.non_none() {
                Type::Union(_) => TypeCategory::Union,
                inner if self.is_optional() => inner.category(),
                _ => TypeCategory::Union,
            },
        }
    }
}

//-----------------------------------------------------------------------------
// Display Implementation
//-----------------------------------------------------------------------------

fn write_fields<'a>(
    f: &mut fmt::Formatter<'_>,
    fields: impl Iterator<Item = (&'a String, &'a Type)>,
) -> fmt::Result {
    for (i, (name, ty)) in fields.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", name, ty)?;
    }
    Ok(())
}

/// Provides a human-readable string representation of types.
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "unknown"),
            Type::NoneType => write!(f, "none"),
            Type::Bool => write!(f, "boolean"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::String => write!(f, "string"),
            Type::Timestamp => write!(f, "timestamp"),
            Type::Timedelta => write!(f, "timedelta"),
            Type::List(inner) => write!(f, "list<{}>", inner),
            Type::Array(inner) => write!(f, "array<{}>", inner),
            Type::Run(inner) => write!(f, "run<{}>", inner),
            Type::TypedDict(fields) => {
                write!(f, "typedDict{{")?;
                write_fields(f, fields.iter())?;
                write!(f, "}}")
            }
            Type::Union(members) => {
                write!(f, "union<")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, ">")
            }
            Type::Const { base, value } => write!(f, "const<{}, {}>", base, value),
            Type::Function { inputs, output } => {
                write!(f, "function(")?;
                write_fields(f, inputs.iter().map(|(k, t)| (k, t)))?;
                write!(f, ") -> {}", output)
            }
            Type::Object { name, properties } => {
                write!(f, "{}{{", name)?;
                write_fields(f, properties.iter())?;
                write!(f, "}}")
            }
            Type::Tagged { tags, value } => {
                write!(f, "tagged<{{")?;
                write_fields(f, tags.iter())?;
                write!(f, "}}, {}>", value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn primitives_are_only_self_assignable() {
        assert!(Type::Int.assign_type(&Type::Int));
        assert!(!Type::Int.assign_type(&Type::Float));
        assert!(!Type::String.assign_type(&Type::Int));
    }

    #[test]
    fn unknown_accepts_everything_but_is_accepted_only_permissively() {
        assert!(Type::Unknown.assign_type(&Type::list(Type::Int)));
        assert!(!Type::Int.assign_type(&Type::Unknown));
        assert!(Type::Int.assign_type_with(&Type::Unknown, AssignMode::Permissive));
    }

    #[test]
    fn union_rules() {
        let int_or_str = Type::union([Type::Int, Type::String]);
        assert!(int_or_str.assign_type(&Type::Int));
        assert!(int_or_str.assign_type(&Type::String));
        assert!(!int_or_str.assign_type(&Type::Float));
        // A union value is only usable where every member is
        assert!(!Type::Int.assign_type(&int_or_str));
        assert!(Type::union([Type::Int, Type::String, Type::Float]).assign_type(&int_or_str));
    }

    #[test]
    fn union_is_canonical() {
        assert_eq!(
            Type::union([Type::String, Type::Int]),
            Type::union([Type::Int, Type::union([Type::String, Type::Int])])
        );
        assert_eq!(Type::union([Type::Int, Type::Int]), Type::Int);
    }

    #[test]
    fn optional_is_union_with_none() {
        let opt = Type::optional(Type::Int);
        assert!(opt.is_optional());
        assert!(opt.accepts_none());
        assert!(opt.assign_type(&Type::Int));
        assert_eq!(opt.non_none(), Type::Int);
        assert_eq!(opt.category(), TypeCategory::Int);
    }

    #[test]
    fn containers_are_covariant() {
        let any_list = Type::list(Type::union([Type::Int, Type::String]));
        assert!(any_list.assign_type(&Type::list(Type::Int)));
        assert!(!Type::list(Type::Int).assign_type(&any_list));
        assert!(!Type::list(Type::Int).assign_type(&Type::array(Type::Int)));
    }

    #[test]
    fn typed_dicts_are_structural() {
        let target = Type::typed_dict([("a", Type::Int)]);
        let wider = Type::typed_dict([("a", Type::Int), ("b", Type::String)]);
        assert!(target.assign_type(&wider));
        assert!(!wider.assign_type(&target));

        let optional_field = Type::typed_dict([("a", Type::Int), ("c", Type::optional(Type::Int))]);
        assert!(optional_field.assign_type(&target));
    }

    #[test]
    fn object_types_compare_by_name_then_properties() {
        let run = Type::object("Run", [("id", Type::String)]);
        let run_wider = Type::object("Run", [("id", Type::String), ("n", Type::Int)]);
        let other = Type::object("Project", [("id", Type::String)]);
        assert!(run.assign_type(&run_wider));
        assert!(!run.assign_type(&other));
    }

    #[test]
    fn consts_fall_back_to_base() {
        let lit = Type::constant(Type::String, Value::from("a"));
        assert!(Type::String.assign_type(&lit));
        assert!(!lit.assign_type(&Type::String));
        assert_eq!(lit.const_value(), Some(&Value::from("a")));
    }

    #[test]
    fn tags_are_transparent_to_untagged_targets() {
        let tagged = Type::tagged([("run", Type::String)], Type::Int);
        assert!(Type::Int.assign_type(&tagged));
        assert!(!tagged.assign_type(&Type::Int));
        assert_eq!(tagged.untagged(), &Type::Int);
    }

    #[test]
    fn element_type_of_non_container_is_invalid() {
        assert_eq!(Type::list(Type::Int).element_type(), Ok(Type::Int));
        assert_eq!(Type::Int.element_type(), Err(Invalid));
        assert_eq!(Type::Int.field_type("a"), Err(Invalid));
    }

    #[test]
    fn display() {
        let t = Type::list(Type::typed_dict([("a", Type::optional(Type::Int))]));
        assert_eq!(t.to_string(), "list<typedDict{a: union<int | none>}>");
    }
}
