//! The attribute record: a heterogeneous map from typed keys to facts.
//!
//! Keys are zero-sized marker types implementing [`Key`]; the key decides the value
//! type, so reading a fact can never produce a value of the wrong shape. Storage is a
//! tagged union ([`Fact`]) behind an `Arc`, which makes cloning a record cheap and every
//! update copy-on-write: a hook can never mutate a record it did not receive.
//!
//! Every key carries a [`MergePolicy`]. [`TypedMap::with`] honours it; for additive
//! keys the new value is merged into the existing one instead of replacing it.
//! [`TypedMap::replace`] is the explicit escape hatch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use prism_cache::{Cacheable, ChangeDetector};
use prism_core::Name;
use prism_types::TypeFacet;
use serde::{Deserialize, Serialize};

use crate::error::{ReflectError, Result};
use crate::keys::{self, Fact};
use crate::model::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// A later write replaces the earlier value.
    Overwrite,
    /// A later write is merged into the earlier value.
    Additive,
}

pub trait Key: 'static {
    type Value: Clone + fmt::Debug;

    const NAME: &'static str;
    const POLICY: MergePolicy;

    fn wrap(value: Self::Value) -> Fact;

    fn unwrap(fact: &Fact) -> Option<&Self::Value>;

    fn merge(previous: Self::Value, later: Self::Value) -> Self::Value;
}

/// Explicit merge for additive facts. Merging a value with itself must be a no-op.
pub trait Merge {
    #[must_use]
    fn merge(self, later: Self) -> Self;
}

impl Merge for ChangeDetector {
    fn merge(self, later: Self) -> Self {
        ChangeDetector::composite([self, later])
    }
}

impl Merge for TypeFacet {
    fn merge(self, later: Self) -> Self {
        TypeFacet::merge(self, later)
    }
}

/// Member maps merge entry by entry; entries are never dropped.
impl Merge for IndexMap<Name, TypedMap> {
    fn merge(mut self, later: Self) -> Self {
        for (name, record) in later {
            match self.get_mut(&name) {
                Some(existing) => {
                    let previous = std::mem::take(existing);
                    *existing = previous.merge(&record);
                }
                None => {
                    self.insert(name, record);
                }
            }
        }
        self
    }
}

impl Merge for Vec<Diagnostic> {
    fn merge(mut self, later: Self) -> Self {
        for diagnostic in later {
            if !self.contains(&diagnostic) {
                self.push(diagnostic);
            }
        }
        self
    }
}

/// Generates the key marker types, the [`Fact`] union and their [`Key`] impls.
macro_rules! facts {
    (@merge Overwrite, $previous:ident, $later:ident) => {{
        let _ = $previous;
        $later
    }};
    (@merge Additive, $previous:ident, $later:ident) => {
        $crate::record::Merge::merge($previous, $later)
    };
    ($( $(#[$meta:meta])* $key:ident: $value:ty => $policy:ident; )*) => {
        /// One stored fact; the variant names the key it belongs to.
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub enum Fact {
            $( $key($value), )*
        }

        impl Fact {
            pub fn key_name(&self) -> &'static str {
                match self {
                    $( Fact::$key(_) => stringify!($key), )*
                }
            }

            /// Combine `later` into `previous` under the key's merge policy.
            pub(crate) fn merged(previous: Fact, later: Fact) -> Fact {
                match (previous, later) {
                    $(
                        (Fact::$key(previous), Fact::$key(later)) => {
                            Fact::$key(facts!(@merge $policy, previous, later))
                        }
                    )*
                    (_, later) => later,
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            pub struct $key;

            impl $crate::record::Key for $key {
                type Value = $value;

                const NAME: &'static str = stringify!($key);
                const POLICY: $crate::record::MergePolicy = $crate::record::MergePolicy::$policy;

                fn wrap(value: $value) -> Fact {
                    Fact::$key(value)
                }

                #[allow(unreachable_patterns)]
                fn unwrap(fact: &Fact) -> Option<&$value> {
                    match fact {
                        Fact::$key(value) => Some(value),
                        _ => None,
                    }
                }

                fn merge(previous: $value, later: $value) -> $value {
                    facts!(@merge $policy, previous, later)
                }
            }
        )*
    };
}

pub(crate) use facts;

/// All known facts about one declaration.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Fact>", into = "Vec<Fact>")]
pub struct TypedMap {
    facts: Arc<BTreeMap<&'static str, Fact>>,
}

impl TypedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<K: Key>(&self) -> Option<&K::Value> {
        self.facts.get(K::NAME).and_then(K::unwrap)
    }

    /// The fact, or the value type's default when absent.
    pub fn value<K: Key>(&self) -> K::Value
    where
        K::Value: Default,
    {
        self.get::<K>().cloned().unwrap_or_default()
    }

    /// For facts a completed pipeline stage guarantees.
    pub fn require<K: Key>(&self) -> Result<&K::Value> {
        self.get::<K>()
            .ok_or(ReflectError::MissingFact { key: K::NAME })
    }

    pub fn contains<K: Key>(&self) -> bool {
        self.facts.contains_key(K::NAME)
    }

    /// Record `value` under `K`, merging with an existing value for additive keys.
    #[must_use]
    pub fn with<K: Key>(mut self, value: K::Value) -> Self {
        let facts = Arc::make_mut(&mut self.facts);
        let value = match facts.remove(K::NAME) {
            Some(existing) => match K::unwrap(&existing) {
                Some(previous) => K::merge(previous.clone(), value),
                None => value,
            },
            None => value,
        };
        facts.insert(K::NAME, K::wrap(value));
        self
    }

    /// Record `value` under `K`, discarding whatever was there.
    #[must_use]
    pub fn replace<K: Key>(mut self, value: K::Value) -> Self {
        Arc::make_mut(&mut self.facts).insert(K::NAME, K::wrap(value));
        self
    }

    #[must_use]
    pub fn without<K: Key>(mut self) -> Self {
        if self.contains::<K>() {
            Arc::make_mut(&mut self.facts).remove(K::NAME);
        }
        self
    }

    /// Apply every fact of `later` on top of `self`, each under its key's policy.
    #[must_use]
    pub fn merge(mut self, later: &TypedMap) -> Self {
        if later.is_empty() {
            return self;
        }
        let facts = Arc::make_mut(&mut self.facts);
        for (name, fact) in later.facts.iter() {
            let merged = match facts.remove(name) {
                Some(previous) => Fact::merged(previous, fact.clone()),
                None => fact.clone(),
            };
            facts.insert(name, merged);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values()
    }

    pub fn key_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.facts.keys().copied()
    }
}

impl fmt::Debug for TypedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.facts.values()).finish()
    }
}

impl From<Vec<Fact>> for TypedMap {
    fn from(facts: Vec<Fact>) -> Self {
        Self {
            facts: Arc::new(facts.into_iter().map(|fact| (fact.key_name(), fact)).collect()),
        }
    }
}

impl From<TypedMap> for Vec<Fact> {
    fn from(record: TypedMap) -> Self {
        match Arc::try_unwrap(record.facts) {
            Ok(facts) => facts.into_values().collect(),
            Err(shared) => shared.values().cloned().collect(),
        }
    }
}

impl Cacheable for TypedMap {
    fn change_detector(&self) -> Option<&ChangeDetector> {
        self.get::<keys::Detector>()
    }
}
