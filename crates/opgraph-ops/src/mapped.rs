// Mapped operations
//
// A scalar operation can be lifted to work element-wise over a list passed as
// its first argument. The lifted variant is registered under `mapped_<base>`
// and linked to its base with the `mapped` derivation kind.

use std::sync::Arc;

use opgraph_error::{DeclarationError, DeclarationResult};
use opgraph_types::{Type, Value};

use crate::op_def::{OpArgs, OpDef, OutputType};
use crate::registry::{OpRegistry, MAPPED};

/// Name of the mapped variant of `base`.
pub fn mapped_name(base: &str) -> String {
    format!("mapped_{}", base)
}

/// Register the element-wise variant of `base` and link it.
pub fn derive_mapped(registry: &OpRegistry, base: &Arc<OpDef>) -> DeclarationResult<Arc<OpDef>> {
    let mapped = registry.register(mapped_def(base)?)?;
    registry.link_derived(base.name(), MAPPED, mapped.name())?;
    Ok(mapped)
}

/// Element-wise variant of `base`, not yet registered.
///
/// The first parameter `T` becomes `list<T>` and the output `O` becomes
/// `list<O>`; other parameters are unchanged. Computed outputs are evaluated
/// on the element type of the first argument. A `none` element maps to
/// `none` without calling the base resolver.
pub fn mapped_def(base: &OpDef) -> DeclarationResult<OpDef> {
    let invalid = |reason: &str| DeclarationError::InvalidDerivation {
        op: base.name().to_string(),
        kind: MAPPED.to_string(),
        reason: reason.to_string(),
    };

    let OpArgs::Named(params) = base.input_type() else {
        return Err(invalid("variadic operations cannot be mapped"));
    };
    let Some((first_name, first_type)) = params.first().cloned() else {
        return Err(invalid("no named first parameter to map over"));
    };

    let mut mapped_params = params.clone();
    mapped_params[0].1 = Type::list(first_type);

    let output_type = match base.output_type() {
        OutputType::Fixed(output) => OutputType::Fixed(Type::list(output.clone())),
        OutputType::Computed(compute) => {
            let compute = compute.clone();
            OutputType::computed(move |arg_types| {
                let mut element_types = arg_types.clone();
                if let Some(list_type) = arg_types.get(&first_name) {
                    element_types.insert(first_name.clone(), list_type.element_type()?);
                }
                compute(&element_types).map(Type::list)
            })
        }
    };

    let base_resolver = base.resolver().clone();
    let base_name = base.name().to_string();
    let resolver = Arc::new(move |args: &[Value]| -> anyhow::Result<Value> {
        let Some((first, rest)) = args.split_first() else {
            anyhow::bail!("mapped op {} called without arguments", base_name);
        };
        let Some(items) = first.as_list() else {
            anyhow::bail!("mapped op {} expects a list, got {}", base_name, first.kind());
        };
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            if *item == Value::None {
                results.push(Value::None);
                continue;
            }
            let mut call_args = Vec::with_capacity(args.len());
            call_args.push(item.clone());
            call_args.extend_from_slice(rest);
            results.push(base_resolver(&call_args)?);
        }
        Ok(Value::List(results))
    });

    Ok(OpDef::new(
        mapped_name(base.name()),
        OpArgs::Named(mapped_params),
        output_type,
        resolver,
    )
    .with_derived_from(base.name())
    .with_builtin(base.is_builtin())
    .with_pure(base.is_pure()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_def::ArgTypes;
    use opgraph_types::Invalid;
    use pretty_assertions::assert_eq;

    fn register_add(registry: &OpRegistry) -> Arc<OpDef> {
        registry
            .register(OpDef::new(
                "number-add",
                OpArgs::named([("lhs", Type::Int), ("rhs", Type::Int)]),
                OutputType::Fixed(Type::Int),
                Arc::new(|args: &[Value]| -> anyhow::Result<Value> {
                    match args {
                        [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a + b)),
                        _ => anyhow::bail!("expected two ints"),
                    }
                }),
            ))
            .unwrap()
    }

    #[test]
    fn lifts_first_parameter_and_output() {
        let registry = OpRegistry::new();
        let base = register_add(&registry);
        let mapped = derive_mapped(&registry, &base).unwrap();

        assert_eq!(mapped.name(), "mapped_number-add");
        assert_eq!(mapped.common_name(), "add");
        assert_eq!(mapped.derived_from(), Some("number-add"));
        assert_eq!(
            mapped.input_type(),
            &OpArgs::named([("lhs", Type::list(Type::Int)), ("rhs", Type::Int)])
        );
        assert_eq!(
            mapped.output_type().resolve(&ArgTypes::new()),
            Ok(Type::list(Type::Int))
        );
        assert_eq!(
            registry.derived_op("number-add", MAPPED).unwrap().map(|o| o.name().to_string()),
            Some("mapped_number-add".to_string())
        );
    }

    #[test]
    fn resolver_applies_base_per_element() {
        let registry = OpRegistry::new();
        let base = register_add(&registry);
        let mapped = derive_mapped(&registry, &base).unwrap();

        let out = mapped
            .resolve(&[
                Value::List(vec![Value::Int(1), Value::None, Value::Int(3)]),
                Value::Int(10),
            ])
            .unwrap();
        assert_eq!(
            out,
            Value::List(vec![Value::Int(11), Value::None, Value::Int(13)])
        );
        assert!(mapped.resolve(&[Value::Int(1), Value::Int(2)]).is_err());
    }

    #[test]
    fn computed_outputs_see_element_types() {
        let registry = OpRegistry::new();
        let base = registry
            .register(OpDef::new(
                "typedDict-keys",
                OpArgs::named([("obj", Type::TypedDict(Default::default()))]),
                OutputType::computed(|args: &ArgTypes| match args.get("obj") {
                    Some(Type::TypedDict(fields)) => Ok(Type::list(Type::union(
                        fields.keys().map(|_| Type::String),
                    ))),
                    _ => Err(Invalid),
                }),
                Arc::new(|_: &[Value]| -> anyhow::Result<Value> { Ok(Value::None) }),
            ))
            .unwrap();
        let mapped = derive_mapped(&registry, &base).unwrap();

        let mut args = ArgTypes::new();
        args.insert(
            "obj".into(),
            Type::list(Type::typed_dict([("a", Type::Int)])),
        );
        assert_eq!(
            mapped.output_type().resolve(&args),
            Ok(Type::list(Type::list(Type::String)))
        );

        args.insert("obj".into(), Type::Int);
        assert!(mapped.output_type().resolve(&args).is_err());
    }

    #[test]
    fn variadic_operations_are_rejected() {
        let registry = OpRegistry::new();
        let base = registry
            .register(OpDef::new(
                "concat",
                OpArgs::Varargs(Type::String),
                OutputType::Fixed(Type::String),
                Arc::new(|_: &[Value]| -> anyhow::Result<Value> { Ok(Value::None) }),
            ))
            .unwrap();
        assert!(matches!(
            derive_mapped(&registry, &base),
            Err(DeclarationError::InvalidDerivation { .. })
        ));
    }
}
