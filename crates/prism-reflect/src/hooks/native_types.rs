use indexmap::IndexMap;
use prism_core::{ClassLikeId, FunctionLikeId, Name};
use prism_types::{Type, TypeFacet};

use crate::context::TypeContext;
use crate::decl::Expr;
use crate::error::Result;
use crate::hook::{ClassHook, FunctionHook};
use crate::keys;
use crate::record::TypedMap;
use crate::session::ReflectionSession;

/// Resolves native signature types into the `native` (or `tentative`) observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTypesHook;

impl NativeTypesHook {
    pub const PRIORITY: i32 = -300;
}

impl ClassHook for NativeTypesHook {
    fn name(&self) -> &'static str {
        "native-types"
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
        let mut record = record;

        if let Some(backing) = record.get::<keys::NativeTypeExpr>() {
            let backing = context.resolve_type_expr(&backing.expr)?;
            record = record.with::<keys::BackingType>(backing);
        }

        let methods = typed_members(&record.value::<keys::Methods>(), |method| {
            let mut update = native_facet(method, &context)?;
            let params = typed_members(&method.value::<keys::Parameters>(), |param| {
                parameter_facet(param, &context)
            })?;
            if !params.is_empty() {
                update = update.with::<keys::Parameters>(params);
            }
            Ok(update)
        })?;
        let properties = typed_members(&record.value::<keys::Properties>(), |property| {
            native_facet(property, &context)
        })?;
        let constants = typed_members(&record.value::<keys::Constants>(), |constant| {
            native_facet(constant, &context)
        })?;

        Ok(record
            .with::<keys::Methods>(methods)
            .with::<keys::Properties>(properties)
            .with::<keys::Constants>(constants))
    }
}

impl FunctionHook for NativeTypesHook {
    fn name(&self) -> &'static str {
        "native-types"
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
        let update = native_facet(&record, &context)?;
        let params = typed_members(&record.value::<keys::Parameters>(), |param| {
            parameter_facet(param, &context)
        })?;
        Ok(record.merge(&update).with::<keys::Parameters>(params))
    }
}

/// Build a per-member update map, skipping members the closure has nothing to say about.
pub(crate) fn typed_members(
    members: &IndexMap<Name, TypedMap>,
    mut update: impl FnMut(&TypedMap) -> Result<TypedMap>,
) -> Result<IndexMap<Name, TypedMap>> {
    let mut updates = IndexMap::new();
    for (name, member) in members {
        let record = update(member)?;
        if !record.is_empty() {
            updates.insert(name.clone(), record);
        }
    }
    Ok(updates)
}

fn native_facet(member: &TypedMap, context: &TypeContext) -> Result<TypedMap> {
    let Some(native) = member.get::<keys::NativeTypeExpr>() else {
        return Ok(TypedMap::new());
    };
    let ty = context.resolve_type_expr(&native.expr)?;
    let facet = if native.tentative {
        TypeFacet::tentative(ty)
    } else {
        TypeFacet::native(ty)
    };
    Ok(TypedMap::new().with::<keys::TypeInfo>(facet))
}

/// A `null` default makes a parameter's native type implicitly nullable.
fn parameter_facet(param: &TypedMap, context: &TypeContext) -> Result<TypedMap> {
    let Some(native) = param.get::<keys::NativeTypeExpr>() else {
        return Ok(TypedMap::new());
    };
    let mut ty = context.resolve_type_expr(&native.expr)?;
    if matches!(param.get::<keys::DefaultExpr>(), Some(Expr::Null)) {
        ty = Type::nullable(ty);
    }
    Ok(TypedMap::new().with::<keys::TypeInfo>(TypeFacet::native(ty)))
}
