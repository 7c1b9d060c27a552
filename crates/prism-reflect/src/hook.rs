//! Pluggable resolution stages.
//!
//! A hook receives the record built so far and returns the next version of it. Hooks
//! run in ascending [`priority`](ClassHook::priority) order; hooks with equal priority
//! run in registration order. The record is threaded through sequentially, so each
//! hook sees everything recorded by the hooks before it.

use std::fmt;
use std::sync::Arc;

use prism_core::{ClassLikeId, ConstantId, FunctionLikeId};

use crate::error::Result;
use crate::record::TypedMap;
use crate::session::ReflectionSession;

pub trait ClassHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    /// Hooks that return `false` are skipped for `id`.
    fn handles(&self, _id: &ClassLikeId) -> bool {
        true
    }

    fn process(
        &self,
        id: &ClassLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap>;
}

/// Runs for free functions and closures. Methods are part of their class record and
/// are handled by class hooks.
pub trait FunctionHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn handles(&self, _id: &FunctionLikeId) -> bool {
        true
    }

    fn process(
        &self,
        id: &FunctionLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap>;
}

pub trait ConstantHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn handles(&self, _id: &ConstantId) -> bool {
        true
    }

    fn process(
        &self,
        id: &ConstantId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap>;
}

pub trait Prioritized {
    fn hook_name(&self) -> &'static str;
    fn hook_priority(&self) -> i32;
}

impl Prioritized for dyn ClassHook {
    fn hook_name(&self) -> &'static str {
        self.name()
    }

    fn hook_priority(&self) -> i32 {
        self.priority()
    }
}

impl Prioritized for dyn FunctionHook {
    fn hook_name(&self) -> &'static str {
        self.name()
    }

    fn hook_priority(&self) -> i32 {
        self.priority()
    }
}

impl Prioritized for dyn ConstantHook {
    fn hook_name(&self) -> &'static str {
        self.name()
    }

    fn hook_priority(&self) -> i32 {
        self.priority()
    }
}

/// An ordered hook list, sorted once at construction.
pub struct HookPipeline<H: ?Sized> {
    hooks: Vec<Arc<H>>,
}

impl<H: ?Sized + Prioritized> HookPipeline<H> {
    pub fn new(mut hooks: Vec<Arc<H>>) -> Self {
        // `sort_by_key` is stable: ties keep registration order.
        hooks.sort_by_key(|hook| hook.hook_priority());
        Self { hooks }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|hook| hook.hook_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl<H: ?Sized + Prioritized> fmt::Debug for HookPipeline<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<H: ?Sized> Default for HookPipeline<H> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl HookPipeline<dyn ClassHook> {
    pub fn run(
        &self,
        id: &ClassLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        self.hooks
            .iter()
            .filter(|hook| hook.handles(id))
            .try_fold(record, |record, hook| {
                tracing::trace!(target: "prism.reflect", hook = hook.name(), id = %id, "running class hook");
                hook.process(id, record, session)
            })
    }
}

impl HookPipeline<dyn FunctionHook> {
    pub fn run(
        &self,
        id: &FunctionLikeId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        self.hooks
            .iter()
            .filter(|hook| hook.handles(id))
            .try_fold(record, |record, hook| {
                tracing::trace!(target: "prism.reflect", hook = hook.name(), id = %id, "running function hook");
                hook.process(id, record, session)
            })
    }
}

impl HookPipeline<dyn ConstantHook> {
    pub fn run(
        &self,
        id: &ConstantId,
        record: TypedMap,
        session: &mut ReflectionSession<'_>,
    ) -> Result<TypedMap> {
        self.hooks
            .iter()
            .filter(|hook| hook.handles(id))
            .try_fold(record, |record, hook| {
                tracing::trace!(target: "prism.reflect", hook = hook.name(), id = %id.name, "running constant hook");
                hook.process(id, record, session)
            })
    }
}
