//! Type hints
//!
//! Resolver signatures carry their parameter and return annotations as plain
//! strings, the way they appear at the declaration site (`int`,
//! `list[str]`, `Optional[int]`, `{a: int, b: str}`, `int | None`). This
//! module parses those strings with `nom` and resolves the resulting
//! expression against the primitive names plus any registered object types.

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, recognize},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, separated_pair},
    IResult,
};
use opgraph_error::{TypesError, TypesResult};

use crate::ty::Type;

//-----------------------------------------------------------------------------
// Hint expressions
//-----------------------------------------------------------------------------

/// Parsed, not yet resolved, type hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintExpr {
    /// A bare name such as `int` or `Run`
    Name(String),
    /// A subscripted name such as `list[int]`
    Generic { name: String, args: Vec<HintExpr> },
    /// An inline mapping of named fields
    Fields(Vec<(String, HintExpr)>),
    /// `a | b`
    Union(Vec<HintExpr>),
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
    ))(input)
}

fn fields(input: &str) -> IResult<&str, HintExpr> {
    map(
        delimited(
            ws(char('{')),
            separated_list0(
                ws(char(',')),
                separated_pair(ws(ident), char(':'), hint_expr),
            ),
            ws(char('}')),
        ),
        |fields| {
            HintExpr::Fields(
                fields
                    .into_iter()
                    .map(|(name, hint)| (name.to_string(), hint))
                    .collect(),
            )
        },
    )(input)
}

fn named(input: &str) -> IResult<&str, HintExpr> {
    map(
        pair(
            ws(ident),
            opt(delimited(
                ws(char('[')),
                separated_list1(ws(char(',')), hint_expr),
                ws(char(']')),
            )),
        ),
        |(name, args)| match args {
            Some(args) => HintExpr::Generic {
                name: name.to_string(),
                args,
            },
            None => HintExpr::Name(name.to_string()),
        },
    )(input)
}

fn hint_expr(input: &str) -> IResult<&str, HintExpr> {
    map(
        separated_list1(ws(char('|')), alt((fields, named))),
        |mut members| {
            if members.len() == 1 {
                members.remove(0)
            } else {
                HintExpr::Union(members)
            }
        },
    )(input)
}

/// Parse a hint string into a [`HintExpr`].
pub fn parse_hint(hint: &str) -> TypesResult<HintExpr> {
    all_consuming(hint_expr)(hint)
        .map(|(_, expr)| expr)
        .map_err(|e| TypesError::hint_parse(hint, e.to_string()))
}

//-----------------------------------------------------------------------------
// Resolution
//-----------------------------------------------------------------------------

/// Resolves type hints to [`Type`]s.
///
/// Object types declared by the host are registered by name. Primitive names
/// cannot be shadowed by a registered object.
#[derive(Debug, Clone, Default)]
pub struct TypeHints {
    objects: BTreeMap<String, Type>,
}

impl TypeHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolvable to `ty`.
    pub fn register_object(&mut self, name: impl Into<String>, ty: Type) {
        self.objects.insert(name.into(), ty);
    }

    /// Parse and resolve a hint string.
    pub fn resolve_str(&self, hint: &str) -> TypesResult<Type> {
        let expr = parse_hint(hint)?;
        self.resolve(&expr)
    }

    pub fn resolve(&self, expr: &HintExpr) -> TypesResult<Type> {
        match expr {
            HintExpr::Name(name) => self.resolve_name(name),
            HintExpr::Generic { name, args } => self.resolve_generic(name, args),
            HintExpr::Fields(fields) => {
                let mut resolved = BTreeMap::new();
                for (name, hint) in fields {
                    resolved.insert(name.clone(), self.resolve(hint)?);
                }
                Ok(Type::TypedDict(resolved))
            }
            HintExpr::Union(members) => {
                let members = members
                    .iter()
                    .map(|m| self.resolve(m))
                    .collect::<TypesResult<Vec<_>>>()?;
                Ok(Type::union(members))
            }
        }
    }

    fn resolve_name(&self, name: &str) -> TypesResult<Type> {
        let ty = match name {
            "int" => Type::Int,
            "float" => Type::Float,
            "str" | "string" => Type::String,
            "bool" => Type::Bool,
            "None" | "NoneType" | "none" => Type::NoneType,
            "datetime" | "datetime.datetime" | "timestamp" => Type::Timestamp,
            "timedelta" | "datetime.timedelta" => Type::Timedelta,
            "unknown" | "Any" | "typing.Any" => Type::Unknown,
            "list" | "List" | "typing.List" => Type::list(Type::Unknown),
            "dict" | "Dict" => Type::TypedDict(BTreeMap::new()),
            other => {
                return self.objects.get(other).cloned().ok_or_else(|| {
                    tracing::debug!(hint = other, "no type registered for host type");
                    TypesError::UnregisteredHostType(other.to_string())
                })
            }
        };
        Ok(ty)
    }

    fn resolve_generic(&self, name: &str, args: &[HintExpr]) -> TypesResult<Type> {
        let single = |ctor: fn(Type) -> Type| -> TypesResult<Type> {
            match args {
                [arg] => Ok(ctor(self.resolve(arg)?)),
                _ => Err(TypesError::hint_parse(
                    name,
                    format!("expected 1 type argument, found {}", args.len()),
                )),
            }
        };
        match name {
            "list" | "List" | "typing.List" => single(Type::list),
            "array" | "Array" => single(Type::array),
            "Optional" | "typing.Optional" => single(Type::optional),
            "Run" => single(Type::run),
            "Union" | "typing.Union" => {
                let members = args
                    .iter()
                    .map(|a| self.resolve(a))
                    .collect::<TypesResult<Vec<_>>>()?;
                Ok(Type::union(members))
            }
            other => Err(TypesError::UnregisteredHostType(other.to_string())),
        }
    }
}
