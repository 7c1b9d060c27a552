use prism_core::ClassLikeId;

use crate::error::Result;
use crate::hook::ClassHook;
use crate::inheritance::InheritanceResolver;
use crate::record::TypedMap;
use crate::session::ReflectionSession;

/// Completes member maps with what parents, interfaces and traits contribute.
///
/// Runs after the member-local hooks so that inherited members arrive fully typed.
#[derive(Debug, Default, Clone, Copy)]
pub struct InheritanceHook;

impl InheritanceHook {
    pub const PRIORITY: i32 = 100;
}

impl ClassHook for InheritanceHook {
    fn name(&self) -> &'static str {
        "inheritance"
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
        InheritanceResolver::new(session).resolve(id, record)
    }
}
