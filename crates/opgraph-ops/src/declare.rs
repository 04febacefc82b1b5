// Operation declaration
//
// Validates an operation's declared types against the types inferred from its
// resolver signature, then registers it. A declaration that fails validation
// registers nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use opgraph_error::{DeclarationError, DeclarationResult, TypesError};
use opgraph_types::{Type, TypeHints};

use crate::mapped::mapped_def;
use crate::op_def::{OpArgs, OpDef, OutputType, Resolver, SetterFn};
use crate::registry::{OpRegistry, MAPPED};

/// Builder for declaring an operation.
///
/// ```ignore
/// let add = OpDeclaration::new(resolver)
///     .name("number-add")
///     .output_type(Type::Int)
///     .declare(&registry, &hints)?;
/// ```
#[derive(Clone)]
pub struct OpDeclaration {
    resolver: Resolver,
    input_type: Option<OpArgs>,
    output_type: Option<OutputType>,
    name: Option<String>,
    setter: Option<SetterFn>,
    refiner: Option<String>,
    pure: bool,
    is_builtin: bool,
    gets_tag_by_name: Option<String>,
    tags_output: bool,
    mappable: bool,
}

impl OpDeclaration {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            input_type: None,
            output_type: None,
            name: None,
            setter: None,
            refiner: None,
            pure: true,
            is_builtin: false,
            gets_tag_by_name: None,
            tags_output: false,
            mappable: false,
        }
    }

    pub fn input_type(mut self, input_type: OpArgs) -> Self {
        self.input_type = Some(input_type);
        self
    }

    pub fn output_type(mut self, output_type: Type) -> Self {
        self.output_type = Some(OutputType::Fixed(output_type));
        self
    }

    pub fn computed_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    /// Explicit fully-qualified name, instead of one derived from the
    /// resolver's declaration site.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn setter(mut self, setter: SetterFn) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Name of a registered operation that refines the output type from live
    /// data.
    pub fn refiner(mut self, refiner: impl Into<String>) -> Self {
        self.refiner = Some(refiner.into());
        self
    }

    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    pub fn builtin(mut self) -> Self {
        self.is_builtin = true;
        self
    }

    pub fn gets_tag_by_name(mut self, tag: impl Into<String>) -> Self {
        self.gets_tag_by_name = Some(tag.into());
        self
    }

    pub fn tags_output(mut self) -> Self {
        self.tags_output = true;
        self
    }

    /// Also register the element-wise variant of this operation.
    pub fn mappable(mut self) -> Self {
        self.mappable = true;
        self
    }

    /// Validate and register.
    pub fn declare(self, registry: &OpRegistry, hints: &TypeHints) -> DeclarationResult<Arc<OpDef>> {
        let signature = &self.resolver.signature;
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| signature.fully_qualified_name());

        // Input type

        let mut inferred_inputs = BTreeMap::new();
        for param in &signature.params {
            if let Some(hint) = &param.hint {
                inferred_inputs.insert(param.name.clone(), (hint.as_str(), hints.resolve_str(hint)?));
            }
        }

        let input_type = match self.input_type {
            None => {
                let mut params = Vec::with_capacity(signature.params.len());
                for param in &signature.params {
                    let Some((hint, ty)) = inferred_inputs.get(&param.name) else {
                        return Err(DeclarationError::MissingTypeAnnotation {
                            op: name,
                            param: param.name.clone(),
                        });
                    };
                    // Without a declared type, an annotation that says nothing
                    // about the argument is as good as none
                    if *ty == Type::Unknown {
                        return Err(TypesError::UnregisteredHostType(hint.to_string()).into());
                    }
                    params.push((param.name.clone(), ty.clone()));
                }
                OpArgs::Named(params)
            }
            Some(OpArgs::Named(declared)) => {
                let mut declared_names: Vec<&str> = declared.iter().map(|(n, _)| n.as_str()).collect();
                let mut resolver_names = signature.param_names();
                declared_names.sort_unstable();
                resolver_names.sort_unstable();
                if declared_names != resolver_names {
                    return Err(DeclarationError::ParameterMismatch {
                        op: name,
                        declared: declared.iter().map(|(n, _)| n.clone()).collect(),
                        resolver: signature.param_names().iter().map(|n| n.to_string()).collect(),
                    });
                }
                for (param, declared_type) in &declared {
                    if let Some((_, inferred)) = inferred_inputs.get(param) {
                        if !declared_type.assign_type(inferred) {
                            return Err(DeclarationError::IncompatibleInputType {
                                op: name,
                                param: param.clone(),
                                declared: declared_type.to_string(),
                                inferred: inferred.to_string(),
                            });
                        }
                    }
                }
                OpArgs::Named(declared)
            }
            // Annotations of a variadic resolver are not checked
            Some(varargs @ OpArgs::Varargs(_)) => varargs,
        };

        // Output type

        let inferred_output = match &signature.returns {
            Some(hint) => hints.resolve_str(hint)?,
            None => Type::Unknown,
        };
        let output_type = match self.output_type {
            None => OutputType::Fixed(inferred_output),
            Some(OutputType::Fixed(declared)) => {
                if inferred_output != Type::Unknown && !declared.assign_type(&inferred_output) {
                    return Err(DeclarationError::IncompatibleOutputType {
                        op: name,
                        declared: declared.to_string(),
                        inferred: inferred_output.to_string(),
                    });
                }
                OutputType::Fixed(declared)
            }
            Some(computed @ OutputType::Computed(_)) => {
                if let Some(hint) = &signature.returns {
                    return Err(DeclarationError::ComputedOutputWithReturnHint {
                        op: name,
                        hint: hint.clone(),
                    });
                }
                computed
            }
        };
        if matches!(&output_type, OutputType::Fixed(Type::Unknown)) {
            return Err(DeclarationError::UndeclaredOutputType { op: name });
        }

        // Registration

        if self.mappable && input_type.first_param().is_none() {
            return Err(DeclarationError::InvalidDerivation {
                op: name,
                kind: MAPPED.to_string(),
                reason: "no named first parameter to map over".to_string(),
            });
        }

        let mut op = OpDef::new(name, input_type, output_type, self.resolver.body.clone())
            .with_pure(self.pure)
            .with_builtin(self.is_builtin)
            .with_tags_output(self.tags_output);
        if let Some(setter) = self.setter {
            op = op.with_setter(setter);
        }
        if let Some(refiner) = self.refiner {
            op = op.with_refiner(refiner);
        }
        if let Some(tag) = self.gets_tag_by_name {
            op = op.with_gets_tag_by_name(tag);
        }

        if self.mappable {
            let mapped = mapped_def(&op)?;
            let (op, _) = registry.register_linked(op, MAPPED, mapped)?;
            return Ok(op);
        }
        Ok(registry.register(op)?)
    }
}
