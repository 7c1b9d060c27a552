use prism_core::{ClassLikeId, DeclId, FunctionLikeId, Name};

use crate::collab::DocCommentParser;
use crate::const_eval::{ClassScope, ConstEvaluator, ConstValue, ConstantLookup};
use crate::context::{ResolverChain, TypeContext};
use crate::error::{ReflectError, Result};
use crate::keys;
use crate::record::TypedMap;
use crate::reflector::Reflector;

/// How a resolution was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    /// Any lookup: a caller, a hook, a constant expression.
    Reference,
    /// A class reflected to supply members to the class below it on the stack.
    Ancestor,
}

#[derive(Debug)]
struct Frame {
    id: DeclId,
    key: DeclId,
    edge: Edge,
}

/// One call chain of resolutions.
///
/// Hooks receive the session and use it to reflect other declarations. The session
/// tracks which ids are being resolved on the current chain; asking for one of them
/// again fails with [`ReflectError::CyclicResolution`] instead of recursing. Ids are
/// compared by [`DeclId::same_declaration`], so `Foo` and `FOO` are one frame.
pub struct ReflectionSession<'r> {
    reflector: &'r Reflector,
    stack: Vec<Frame>,
    /// Class constants being evaluated from their declaration alone.
    declared: Vec<DeclId>,
}

impl<'r> ReflectionSession<'r> {
    pub(crate) fn new(reflector: &'r Reflector) -> Self {
        Self {
            reflector,
            stack: Vec::new(),
            declared: Vec::new(),
        }
    }

    pub fn reflector(&self) -> &'r Reflector {
        self.reflector
    }

    pub fn reflect(&mut self, id: &DeclId) -> Result<TypedMap> {
        let reflector = self.reflector;
        reflector.resolve(self, id, Edge::Reference)
    }

    /// Reflect a class as an ancestor of the class on top of the stack.
    pub(crate) fn reflect_ancestor(&mut self, id: &DeclId) -> Result<TypedMap> {
        let reflector = self.reflector;
        reflector.resolve(self, id, Edge::Ancestor)
    }

    pub fn reflect_class(&mut self, name: &Name) -> Result<TypedMap> {
        self.reflect(&DeclId::class(name.clone()))
    }

    /// Like [`ReflectionSession::reflect_class`], with unknown classes mapped to `None`.
    pub fn try_reflect_class(&mut self, name: &Name) -> Result<Option<TypedMap>> {
        optional(self.reflect_class(name))
    }

    pub fn reflect_function(&mut self, name: &Name) -> Result<TypedMap> {
        self.reflect(&DeclId::function(name.clone()))
    }

    pub fn reflect_constant(&mut self, name: &Name) -> Result<TypedMap> {
        self.reflect(&DeclId::constant(name.clone()))
    }

    pub fn try_reflect_constant(&mut self, name: &Name) -> Result<Option<TypedMap>> {
        optional(self.reflect_constant(name))
    }

    pub fn in_progress(&self, id: &DeclId) -> bool {
        let key = id.normalized();
        self.stack.iter().any(|frame| frame.key == key)
    }

    /// Ids being resolved on this chain, outermost first.
    pub fn stack(&self) -> impl Iterator<Item = &DeclId> + '_ {
        self.stack.iter().map(|frame| &frame.id)
    }

    /// The class chain of a structural inheritance loop closed by reflecting `id` as an
    /// ancestor of the top frame, or `None` when `id` is not in progress or some frame
    /// above it was entered by anything but inheritance.
    pub(crate) fn inheritance_cycle(&self, id: &DeclId) -> Option<Vec<Name>> {
        let key = id.normalized();
        let start = self.stack.iter().rposition(|frame| frame.key == key)?;
        let structural = self.stack[start + 1..]
            .iter()
            .all(|frame| frame.edge == Edge::Ancestor);
        if !structural {
            return None;
        }
        let mut chain: Vec<Name> = self.stack[start..]
            .iter()
            .filter_map(|frame| match &frame.id {
                DeclId::Class(class) => Some(class.type_name()),
                _ => None,
            })
            .collect();
        if let DeclId::Class(class) = id {
            chain.push(class.type_name());
        }
        Some(chain)
    }

    /// The error for re-entering `id` while it is in progress.
    pub(crate) fn cyclic_resolution(&self, id: &DeclId) -> ReflectError {
        let key = id.normalized();
        let start = self
            .stack
            .iter()
            .position(|frame| frame.key == key)
            .unwrap_or(self.stack.len());
        let mut chain: Vec<String> = self.stack[start..].iter().map(|frame| frame.id.encode()).collect();
        chain.push(id.encode());
        ReflectError::CyclicResolution { chain }
    }

    pub fn doc_parser(&self) -> &'r dyn DocCommentParser {
        self.reflector.doc_parser()
    }

    pub fn resolvers(&self) -> ResolverChain {
        self.reflector.resolvers()
    }

    pub fn class_context(&self, id: &ClassLikeId, record: &TypedMap) -> TypeContext {
        TypeContext::for_class(record, id, self.resolvers())
    }

    pub fn function_context(&self, id: &FunctionLikeId, record: &TypedMap) -> TypeContext {
        TypeContext::for_function(record, id, self.resolvers())
    }

    /// A context for code outside any class (global constants).
    pub fn plain_context(&self, record: &TypedMap) -> TypeContext {
        TypeContext::new(record.value::<keys::Namespace>(), record.value::<keys::Imports>())
            .with_resolvers(self.resolvers())
    }

    /// Run `f` with `id` marked in progress. The mark is removed even when `f` fails.
    pub(crate) fn guarded<T>(
        &mut self,
        id: &DeclId,
        edge: Edge,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.in_progress(id) {
            return Err(self.cyclic_resolution(id));
        }
        self.stack.push(Frame {
            id: id.clone(),
            key: id.normalized(),
            edge,
        });
        let result = f(self);
        self.stack.pop();
        result
    }

    /// `class::name` evaluated from the class's declaration alone, without inheritance
    /// or hooks. Used while the class's full record cannot be built yet. Constants the
    /// class does not declare are looked up in its declared ancestors.
    fn declared_class_constant(&mut self, class: &Name, name: &Name) -> Result<Option<ConstValue>> {
        let key = DeclId::class_constant(class.clone(), name.clone()).normalized();
        if let Some(start) = self.declared.iter().position(|entry| *entry == key) {
            let mut chain: Vec<String> = self.declared[start..].iter().map(DeclId::encode).collect();
            chain.push(key.encode());
            return Err(ReflectError::CyclicResolution { chain });
        }
        self.declared.push(key);
        let result = self.evaluate_declared(class, name);
        self.declared.pop();
        result
    }

    fn evaluate_declared(&mut self, class: &Name, name: &Name) -> Result<Option<ConstValue>> {
        let reflector = self.reflector;
        let (id, record) = match reflector.seed_class(&ClassLikeId::named(class.clone())) {
            Ok(seeded) => seeded,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let constants = record.value::<keys::Constants>();
        let ancestors = ClassScope::declared_ancestors(&record);

        if !constants.contains_key(name) {
            for ancestor in &ancestors {
                if let Some(value) = self.class_constant(ancestor, name)? {
                    return Ok(Some(value));
                }
            }
            return Ok(None);
        }

        tracing::trace!(
            target: "prism.reflect",
            class = %class,
            constant = %name,
            "evaluating class constant from its declaration"
        );
        let context = self.class_context(&id, &record);
        let file = record
            .get::<keys::Location>()
            .and_then(|location| location.file.clone());
        let value = ConstEvaluator::new(&context, self)
            .with_class_scope(ClassScope {
                class: id.type_name(),
                ancestors,
                constants: &constants,
            })
            .in_file(file.as_deref())
            .scoped_constant(name)?;
        Ok(Some(value))
    }
}

fn optional(result: Result<TypedMap>) -> Result<Option<TypedMap>> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

impl ConstantLookup for ReflectionSession<'_> {
    /// Reads the class's full record when it can be built. A class that is in progress
    /// on this chain, or whose resolution leads back into one, has its constant
    /// evaluated from the declaration instead.
    fn class_constant(&mut self, class: &Name, name: &Name) -> Result<Option<ConstValue>> {
        if !self.in_progress(&DeclId::class(class.clone())) {
            match self.try_reflect_class(class) {
                Ok(None) => return Ok(None),
                Ok(Some(record)) => {
                    return Ok(record
                        .get::<keys::Constants>()
                        .and_then(|constants| constants.get(name))
                        .and_then(|constant| constant.get::<keys::Value>())
                        .cloned())
                }
                Err(ReflectError::CyclicResolution { chain }) => {
                    tracing::trace!(
                        target: "prism.reflect",
                        class = %class,
                        chain = %chain.join(" -> "),
                        "class depends on a declaration in progress"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        self.declared_class_constant(class, name)
    }

    fn global_constant(&mut self, name: &Name) -> Result<Option<ConstValue>> {
        Ok(self
            .try_reflect_constant(name)?
            .and_then(|record| record.get::<keys::Value>().cloned()))
    }
}
