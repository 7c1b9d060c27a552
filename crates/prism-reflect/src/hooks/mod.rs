//! The built-in hooks, in pipeline order:
//!
//! | hook                     | priority | adds                                          |
//! |--------------------------|----------|-----------------------------------------------|
//! | [`NativeTypesHook`]      | -300     | `native`/`tentative` types, enum backing type |
//! | [`DocCommentHook`]       | -200     | `annotated` types, templates, aliases         |
//! | [`ConstantInferenceHook`]| -100     | constant values, `inferred` types             |
//! | [`InheritanceHook`]      | 100      | inherited members, `Parents`, `Interfaces`    |
//! | [`TypeNormalizationHook`]| 300      | expanded aliases, normalized unions           |
//!
//! User hooks slot in anywhere by priority. Priorities between -100 and 100 see every
//! member-local fact but only the class's own members.

use std::sync::Arc;

use crate::hook::{ClassHook, ConstantHook, FunctionHook};

mod constant_inference;
mod doc_comment;
mod inheritance;
mod native_types;
mod normalize;

pub use constant_inference::ConstantInferenceHook;
pub use doc_comment::DocCommentHook;
pub use inheritance::InheritanceHook;
pub use native_types::NativeTypesHook;
pub use normalize::TypeNormalizationHook;

pub fn class_hooks() -> Vec<Arc<dyn ClassHook>> {
    vec![
        Arc::new(NativeTypesHook),
        Arc::new(DocCommentHook),
        Arc::new(ConstantInferenceHook),
        Arc::new(InheritanceHook),
        Arc::new(TypeNormalizationHook),
    ]
}

pub fn function_hooks() -> Vec<Arc<dyn FunctionHook>> {
    vec![
        Arc::new(NativeTypesHook),
        Arc::new(DocCommentHook),
        Arc::new(ConstantInferenceHook),
        Arc::new(TypeNormalizationHook),
    ]
}

pub fn constant_hooks() -> Vec<Arc<dyn ConstantHook>> {
    vec![
        Arc::new(DocCommentHook),
        Arc::new(ConstantInferenceHook),
        Arc::new(TypeNormalizationHook),
    ]
}
