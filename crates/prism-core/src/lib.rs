//! Core shared types for prism.
//!
//! This crate is intentionally small: names and the declaration identity
//! family ([`DeclId`]) used as stable keys by every other prism crate.

mod id;
mod name;

pub use id::{
    AliasId, AnonymousClassId, AnonymousFunctionId, ClassConstantId, ClassLikeId, ConstantId,
    DeclId, FunctionLikeId, MethodId, NamedClassId, NamedFunctionId, ParameterId, PropertyId,
    TemplateId, TemplateSite,
};
pub use name::Name;

/// Version of prism recorded alongside persisted artifacts.
pub const PRISM_VERSION: &str = env!("CARGO_PKG_VERSION");
