use indexmap::IndexMap;
use prism_core::{ClassLikeId, ConstantId, FunctionLikeId};
use prism_types::TypeFacet;

use crate::const_eval::{ClassScope, ConstEvaluator, ConstValue};
use crate::error::{ReflectError, Result};
use crate::hook::{ClassHook, ConstantHook, FunctionHook};
use crate::keys;
use crate::model::{Diagnostic, EnumCase, Location};
use crate::record::TypedMap;
use crate::session::ReflectionSession;

/// Evaluates constant initializers and default values into the `inferred` observation.
///
/// A constant whose value cannot be computed is an error: its record would be
/// incomplete. Property and parameter defaults only contribute a type, so a failed
/// evaluation there is recorded as a diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantInferenceHook;

impl ConstantInferenceHook {
    pub const PRIORITY: i32 = -100;
}

impl ClassHook for ConstantInferenceHook {
    fn name(&self) -> &'static str {
        "constant-inference"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn process(
        &self,
        id: &ClassLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        let context = session.class_context(id, &record);
        let class = id.type_name();
        let constants = record.value::<keys::Constants>();
        let properties = record.value::<keys::Properties>();
        let methods = record.value::<keys::Methods>();
        let file = record
            .get::<keys::Location>()
            .and_then(|location| location.file.clone());

        let mut evaluator = ConstEvaluator::new(&context, session)
            .with_class_scope(ClassScope {
                class: class.clone(),
                ancestors: ClassScope::declared_ancestors(&record),
                constants: &constants,
            })
            .in_file(file.as_deref());

        let mut constant_updates = IndexMap::new();
        for (name, constant) in &constants {
            let update = if constant.contains::<keys::EnumCase>() {
                let backing = match constant.get::<keys::DefaultExpr>() {
                    Some(expr) => Some(evaluator.evaluate(expr)?),
                    None => None,
                };
                let value = ConstValue::EnumCase {
                    class: class.clone(),
                    name: name.clone(),
                };
                TypedMap::new()
                    .with::<keys::TypeInfo>(TypeFacet::inferred(value.inferred_type()))
                    .with::<keys::Value>(value)
                    .with::<keys::EnumCase>(EnumCase { backing })
            } else {
                let value = evaluator
                    .scoped_constant(name)
                    .map_err(|err| in_declaration(err, &format!("{class}::{name}")))?;
                TypedMap::new()
                    .with::<keys::TypeInfo>(TypeFacet::inferred(value.inferred_type()))
                    .with::<keys::Value>(value)
            };
            constant_updates.insert(name.clone(), update);
        }

        let mut property_updates = IndexMap::new();
        for (name, property) in &properties {
            if let Some(update) = default_update(&mut evaluator, property)? {
                property_updates.insert(name.clone(), update);
            }
        }

        let mut method_updates = IndexMap::new();
        for (name, method) in &methods {
            let mut params = IndexMap::new();
            for (param_name, param) in method.value::<keys::Parameters>() {
                if let Some(update) = default_update(&mut evaluator, &param)? {
                    params.insert(param_name, update);
                }
            }
            if !params.is_empty() {
                method_updates.insert(name.clone(), TypedMap::new().with::<keys::Parameters>(params));
            }
        }
        Ok(record
            .with::<keys::Constants>(constant_updates)
            .with::<keys::Properties>(property_updates)
            .with::<keys::Methods>(method_updates))
    }
}

impl FunctionHook for ConstantInferenceHook {
    fn name(&self) -> &'static str {
        "constant-inference"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn process(
        &self,
        id: &FunctionLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        let context = session.function_context(id, &record);
        let file = file_of(&record);
        let mut evaluator = ConstEvaluator::new(&context, session).in_file(file.as_deref());

        let mut params = IndexMap::new();
        for (name, param) in record.value::<keys::Parameters>() {
            if let Some(update) = default_update(&mut evaluator, &param)? {
                params.insert(name, update);
            }
        }
        Ok(record.with::<keys::Parameters>(params))
    }
}

impl ConstantHook for ConstantInferenceHook {
    fn name(&self) -> &'static str {
        "constant-inference"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn process(
        &self,
        id: &ConstantId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        let Some(expr) = record.get::<keys::DefaultExpr>().cloned() else {
            return Ok(record);
        };
        let context = session.plain_context(&record);
        let file = file_of(&record);
        let value = ConstEvaluator::new(&context, session)
            .in_file(file.as_deref())
            .evaluate(&expr)
            .map_err(|err| in_declaration(err, id.name.as_str()))?;
        Ok(record
            .with::<keys::TypeInfo>(TypeFacet::inferred(value.inferred_type()))
            .with::<keys::Value>(value))
    }
}

fn file_of(record: &TypedMap) -> Option<std::path::PathBuf> {
    record
        .get::<keys::Location>()
        .and_then(|location: &Location| location.file.clone())
}

/// The inferred type of a property or parameter default, or a diagnostic when the
/// default cannot be evaluated.
fn default_update(evaluator: &mut ConstEvaluator<'_>, member: &TypedMap) -> Result<Option<TypedMap>> {
    let Some(expr) = member.get::<keys::DefaultExpr>() else {
        return Ok(None);
    };
    match evaluator.evaluate(expr) {
        Ok(value) => Ok(Some(
            TypedMap::new().with::<keys::TypeInfo>(TypeFacet::inferred(value.inferred_type())),
        )),
        Err(ReflectError::ConstantEvaluation { message }) => Ok(Some(
            TypedMap::new().with::<keys::Diagnostics>(vec![Diagnostic::new("unresolved-default", message)]),
        )),
        Err(err) => Err(err),
    }
}

fn in_declaration(err: ReflectError, declaration: &str) -> ReflectError {
    match err {
        ReflectError::ConstantEvaluation { message } => ReflectError::ConstantEvaluation {
            message: format!("{declaration}: {message}"),
        },
        other => other,
    }
}

