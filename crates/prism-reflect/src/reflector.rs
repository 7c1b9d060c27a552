//! The reflector: turns declaration ids into fully resolved attribute records.
//!
//! Resolving an id runs in four steps:
//!
//! 1. **Cache lookup.** A staged or persisted record whose change detector still reports
//!    "fresh" is returned as is.
//! 2. **Location and extraction.** The [`SourceProvider`] finds the source, the
//!    [`DeclarationExtractor`] turns it into structural declarations, and the matching
//!    declaration is seeded into an initial record.
//! 3. **Hooks.** The record flows through the hook pipeline for its declaration kind.
//!    Hooks may reflect other declarations through the session; re-entering an id that
//!    is still being resolved fails with [`ReflectError::CyclicResolution`].
//! 4. **Staging.** The result is staged in the cache. It reaches the backend on
//!    [`Reflector::commit`].
//!
//! Member ids (methods, properties, class constants, parameters, aliases, templates)
//! are answered from their owner's record, so the owner is always resolved first.

use std::sync::Arc;

use prism_cache::{CacheBackend, CacheStats, ChangeAwareCache, DiskBackend, MemoryBackend};
use prism_config::PrismConfig;
use prism_core::{
    AliasId, ClassLikeId, ConstantId, DeclId, FunctionLikeId, Name, TemplateId, TemplateSite,
};
use prism_types::TypeFacet;

use crate::collab::{DeclarationExtractor, DocCommentParser, NullDocParser, Source, SourceProvider, SymbolRef};
use crate::context::{CustomTypeResolver, ResolverChain};
use crate::decl::FileDeclarations;
use crate::error::{ReflectError, Result};
use crate::hook::{ClassHook, ConstantHook, FunctionHook, HookPipeline};
use crate::hooks;
use crate::keys;
use crate::record::{Key, TypedMap};
use crate::seed;
use crate::session::{Edge, ReflectionSession};

#[derive(Default)]
pub struct ReflectorBuilder {
    provider: Option<Arc<dyn SourceProvider>>,
    extractor: Option<Arc<dyn DeclarationExtractor>>,
    doc_parser: Option<Arc<dyn DocCommentParser>>,
    backend: Option<Arc<dyn CacheBackend>>,
    class_hooks: Vec<Arc<dyn ClassHook>>,
    function_hooks: Vec<Arc<dyn FunctionHook>>,
    constant_hooks: Vec<Arc<dyn ConstantHook>>,
    resolvers: Vec<Arc<dyn CustomTypeResolver>>,
    config: PrismConfig,
}

impl ReflectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source_provider(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn DeclarationExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn with_doc_parser(mut self, parser: Arc<dyn DocCommentParser>) -> Self {
        self.doc_parser = Some(parser);
        self
    }

    /// Overrides the backend the configuration would select.
    #[must_use]
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_class_hook(mut self, hook: Arc<dyn ClassHook>) -> Self {
        self.class_hooks.push(hook);
        self
    }

    #[must_use]
    pub fn with_function_hook(mut self, hook: Arc<dyn FunctionHook>) -> Self {
        self.function_hooks.push(hook);
        self
    }

    #[must_use]
    pub fn with_constant_hook(mut self, hook: Arc<dyn ConstantHook>) -> Self {
        self.constant_hooks.push(hook);
        self
    }

    /// Resolvers are consulted in registration order; the first match wins.
    #[must_use]
    pub fn with_custom_type_resolver(mut self, resolver: Arc<dyn CustomTypeResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PrismConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Reflector> {
        let provider = self
            .provider
            .ok_or_else(|| anyhow::anyhow!("a source provider is required"))?;
        let extractor = self
            .extractor
            .ok_or_else(|| anyhow::anyhow!("a declaration extractor is required"))?;
        let doc_parser = self.doc_parser.unwrap_or_else(|| Arc::new(NullDocParser));

        let cache_config = &self.config.cache;
        let backend: Arc<dyn CacheBackend> = match (self.backend, &cache_config.dir) {
            (Some(backend), _) => backend,
            (None, Some(dir)) => Arc::new(DiskBackend::new(dir)?),
            (None, None) => Arc::new(MemoryBackend::new()),
        };
        let mode = cache_config.effective_mode();
        let cache = ChangeAwareCache::new(backend, cache_config.prefix.clone(), cache_config.format_version)
            .with_mode(mode);

        let (mut class_hooks, mut function_hooks, mut constant_hooks) = if self.config.reflection.builtin_hooks {
            (hooks::class_hooks(), hooks::function_hooks(), hooks::constant_hooks())
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };
        class_hooks.extend(self.class_hooks);
        function_hooks.extend(self.function_hooks);
        constant_hooks.extend(self.constant_hooks);

        let reflector = Reflector {
            provider,
            extractor,
            doc_parser,
            cache,
            class_hooks: HookPipeline::new(class_hooks),
            function_hooks: HookPipeline::new(function_hooks),
            constant_hooks: HookPipeline::new(constant_hooks),
            resolvers: Arc::from(self.resolvers),
            config: self.config,
        };
        tracing::debug!(
            target: "prism.reflect",
            mode = ?mode,
            class_hooks = ?reflector.class_hooks,
            function_hooks = ?reflector.function_hooks,
            constant_hooks = ?reflector.constant_hooks,
            "reflector ready"
        );
        Ok(reflector)
    }
}

pub struct Reflector {
    provider: Arc<dyn SourceProvider>,
    extractor: Arc<dyn DeclarationExtractor>,
    doc_parser: Arc<dyn DocCommentParser>,
    cache: ChangeAwareCache<TypedMap>,
    class_hooks: HookPipeline<dyn ClassHook>,
    function_hooks: HookPipeline<dyn FunctionHook>,
    constant_hooks: HookPipeline<dyn ConstantHook>,
    resolvers: ResolverChain,
    config: PrismConfig,
}

impl std::fmt::Debug for Reflector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reflector")
            .field("cache", &self.cache)
            .field("class_hooks", &self.class_hooks)
            .field("function_hooks", &self.function_hooks)
            .field("constant_hooks", &self.constant_hooks)
            .field("resolvers", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}

impl Reflector {
    pub fn builder() -> ReflectorBuilder {
        ReflectorBuilder::new()
    }

    /// A session for resolving several ids on one in-flight stack.
    pub fn session(&self) -> ReflectionSession<'_> {
        ReflectionSession::new(self)
    }

    pub fn reflect(&self, id: &DeclId) -> Result<TypedMap> {
        self.session().reflect(id)
    }

    pub fn reflect_class(&self, name: impl Into<Name>) -> Result<TypedMap> {
        self.session().reflect_class(&name.into())
    }

    /// `Ok(None)` when no such class-like exists; other failures still propagate.
    pub fn try_reflect_class(&self, name: impl Into<Name>) -> Result<Option<TypedMap>> {
        self.session().try_reflect_class(&name.into())
    }

    pub fn reflect_function(&self, name: impl Into<Name>) -> Result<TypedMap> {
        self.session().reflect_function(&name.into())
    }

    pub fn reflect_constant(&self, name: impl Into<Name>) -> Result<TypedMap> {
        self.session().reflect_constant(&name.into())
    }

    /// Persist every record resolved since the last commit. Returns how many were written.
    pub fn commit(&self) -> Result<usize> {
        Ok(self.cache.commit()?)
    }

    /// Forget every record resolved since the last commit.
    pub fn discard(&self) {
        self.cache.discard_staged();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn config(&self) -> &PrismConfig {
        &self.config
    }

    pub fn doc_parser(&self) -> &dyn DocCommentParser {
        self.doc_parser.as_ref()
    }

    pub fn resolvers(&self) -> ResolverChain {
        self.resolvers.clone()
    }

    pub(crate) fn resolve(
        &self,
        session: &mut ReflectionSession<'_>,
        id: &DeclId,
        edge: Edge,
    ) -> Result<TypedMap> {
        // `Foo` and `FOO` share one cache entry.
        let key = id.normalized();
        if !session.in_progress(id) {
            if let Some(record) = self.cache.get(&key) {
                tracing::trace!(target: "prism.reflect", id = %id, "cache hit");
                return Ok(record.as_ref().clone());
            }
        }

        let record = session.guarded(id, edge, |session| self.build(session, id))?;
        self.cache.stage_resolved(&key, Arc::new(record.clone()));
        Ok(record)
    }

    fn build(&self, session: &mut ReflectionSession<'_>, id: &DeclId) -> Result<TypedMap> {
        tracing::debug!(target: "prism.reflect", id = %id, "resolving declaration");
        match id {
            DeclId::Class(class) => self.build_class(session, class),
            DeclId::Function(FunctionLikeId::Method(method)) | DeclId::Method(method) => {
                let owner = session.reflect(&DeclId::Class(method.class.clone()))?;
                member_of::<keys::Methods>(&owner, &method.name, true).ok_or_else(|| ReflectError::not_found(id))
            }
            DeclId::Function(function) => self.build_function(session, function),
            DeclId::Constant(constant) => self.build_constant(session, constant),
            DeclId::Property(property) => {
                let owner = session.reflect(&DeclId::Class(property.class.clone()))?;
                member_of::<keys::Properties>(&owner, &property.name, false)
                    .ok_or_else(|| ReflectError::not_found(id))
            }
            DeclId::ClassConstant(constant) => {
                let owner = session.reflect(&DeclId::Class(constant.class.clone()))?;
                member_of::<keys::Constants>(&owner, &constant.name, false)
                    .ok_or_else(|| ReflectError::not_found(id))
            }
            DeclId::Parameter(parameter) => {
                let owner = session.reflect(&DeclId::Function(parameter.function.clone()))?;
                member_of::<keys::Parameters>(&owner, &parameter.name, false)
                    .ok_or_else(|| ReflectError::not_found(id))
            }
            DeclId::Alias(alias) => self.build_alias(session, alias),
            DeclId::Template(template) => self.build_template(session, template),
        }
    }

    fn build_class(&self, session: &mut ReflectionSession<'_>, id: &ClassLikeId) -> Result<TypedMap> {
        let (id, record) = self.seed_class(id)?;
        self.class_hooks.run(&id, record, session)
    }

    /// Locate a class and seed its record, without running any hook. Named classes come
    /// back under their declared name, whatever the case of the requested one.
    pub(crate) fn seed_class(&self, id: &ClassLikeId) -> Result<(ClassLikeId, TypedMap)> {
        let source = match id {
            ClassLikeId::Named(named) => self.provider.locate(&SymbolRef::Class(named.name.clone()))?,
            ClassLikeId::Anonymous(anonymous) => Some(self.provider.load_file(&anonymous.file)?),
        };
        let Some(source) = source else {
            return Err(ReflectError::not_found(id.encode()));
        };
        let declarations = self.extract(&source)?;
        let decl = declarations.classes.iter().find(|decl| match id {
            ClassLikeId::Named(named) => decl
                .qualified_name()
                .is_some_and(|name| Name::new(name).eq_ignore_case(&named.name)),
            ClassLikeId::Anonymous(anonymous) => {
                decl.name.is_none()
                    && decl.position.line == anonymous.line
                    && anonymous.column.map_or(true, |column| decl.position.column == Some(column))
            }
        });
        let Some(decl) = decl else {
            return Err(ReflectError::not_found(id.encode()));
        };

        let declared = match (id, decl.qualified_name()) {
            (ClassLikeId::Named(_), Some(name)) => ClassLikeId::named(name),
            _ => id.clone(),
        };
        let record = seed::class(decl, &declared, &source);
        Ok((declared, record))
    }

    fn build_function(&self, session: &mut ReflectionSession<'_>, id: &FunctionLikeId) -> Result<TypedMap> {
        let source = match id {
            FunctionLikeId::Named(named) => self.provider.locate(&SymbolRef::Function(named.name.clone()))?,
            FunctionLikeId::Anonymous(anonymous) => Some(self.provider.load_file(&anonymous.file)?),
            FunctionLikeId::Method(_) => None,
        };
        let Some(source) = source else {
            return Err(ReflectError::not_found(id.encode()));
        };
        let declarations = self.extract(&source)?;
        let decl = declarations.functions.iter().find(|decl| match id {
            FunctionLikeId::Named(named) => decl
                .qualified_name()
                .is_some_and(|name| Name::new(name).eq_ignore_case(&named.name)),
            FunctionLikeId::Anonymous(anonymous) => {
                decl.name.is_none()
                    && decl.position.line == anonymous.line
                    && anonymous.column.map_or(true, |column| decl.position.column == Some(column))
            }
            FunctionLikeId::Method(_) => false,
        });
        let Some(decl) = decl else {
            return Err(ReflectError::not_found(id.encode()));
        };

        let declared = match (id, decl.qualified_name()) {
            (FunctionLikeId::Named(_), Some(name)) => FunctionLikeId::named(name),
            _ => id.clone(),
        };
        let record = seed::function(decl, &source);
        self.function_hooks.run(&declared, record, session)
    }

    /// Constant names are case-sensitive.
    fn build_constant(&self, session: &mut ReflectionSession<'_>, id: &ConstantId) -> Result<TypedMap> {
        let Some(source) = self.provider.locate(&SymbolRef::Constant(id.name.clone()))? else {
            return Err(ReflectError::not_found(&id.name));
        };
        let declarations = self.extract(&source)?;
        let Some(decl) = declarations
            .constants
            .iter()
            .find(|decl| decl.qualified_name() == id.name.as_str())
        else {
            return Err(ReflectError::not_found(&id.name));
        };

        let record = seed::constant(decl, &source);
        self.constant_hooks.run(id, record, session)
    }

    /// An alias as a declaration of its own: its definition as the annotated type.
    fn build_alias(&self, session: &mut ReflectionSession<'_>, id: &AliasId) -> Result<TypedMap> {
        let owner = session.reflect(&DeclId::Class(id.class.clone()))?;
        let Some(ty) = owner.value::<keys::Aliases>().get(&id.name).cloned() else {
            return Err(ReflectError::not_found(DeclId::Alias(id.clone())));
        };
        let record = TypedMap::new()
            .with::<keys::TypeInfo>(TypeFacet::annotated(ty))
            .with::<keys::DeclaringClass>(id.class.type_name());
        Ok(inherit_scope(record, &owner))
    }

    /// A template parameter as a declaration: its bound (or `mixed`) and its variance.
    fn build_template(&self, session: &mut ReflectionSession<'_>, id: &TemplateId) -> Result<TypedMap> {
        let owner = match &id.site {
            TemplateSite::Class(class) => session.reflect(&DeclId::Class(class.clone()))?,
            TemplateSite::Function(function) => session.reflect(&DeclId::Function(function.clone()))?,
        };
        let Some(param) = owner.value::<keys::Templates>().get(&id.name).cloned() else {
            return Err(ReflectError::not_found(DeclId::Template(id.clone())));
        };
        let record = TypedMap::new()
            .with::<keys::TypeInfo>(TypeFacet::annotated(param.fallback()))
            .with::<keys::TemplateVariance>(param.variance);
        Ok(inherit_scope(record, &owner))
    }

    fn extract(&self, source: &Source) -> Result<FileDeclarations> {
        let declarations = self.extractor.extract(source)?;
        tracing::trace!(
            target: "prism.reflect",
            file = ?source.file,
            classes = declarations.classes.len(),
            functions = declarations.functions.len(),
            constants = declarations.constants.len(),
            "extracted declarations"
        );
        Ok(declarations)
    }
}

/// A member record standing on its own, carrying its owner's scope and detector.
fn member_of<K>(owner: &TypedMap, name: &Name, case_insensitive: bool) -> Option<TypedMap>
where
    K: Key<Value = indexmap::IndexMap<Name, TypedMap>>,
{
    let members = owner.get::<K>()?;
    let member = match members.get(name) {
        Some(member) => member,
        None if case_insensitive => members
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_case(name))
            .map(|(_, member)| member)?,
        None => return None,
    };
    Some(inherit_scope(member.clone(), owner))
}

fn inherit_scope(record: TypedMap, owner: &TypedMap) -> TypedMap {
    let mut record = record;
    if let Some(namespace) = owner.get::<keys::Namespace>() {
        record = record.with::<keys::Namespace>(namespace.clone());
    }
    if let Some(detector) = owner.get::<keys::Detector>() {
        record = record.with::<keys::Detector>(detector.clone());
    }
    if !record.contains::<keys::Location>() {
        if let Some(location) = owner.get::<keys::Location>() {
            record = record.with::<keys::Location>(location.clone());
        }
    }
    record
}
