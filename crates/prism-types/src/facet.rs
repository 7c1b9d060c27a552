use serde::{Deserialize, Serialize};

use crate::rewrite::{rewrite_all, TypeRewriter};
use crate::Type;

/// The independent type observations recorded for one typed declaration.
///
/// - `native`: from the language's own signature grammar.
/// - `annotated`: from a doc-comment type hint.
/// - `tentative`: a native type explicitly marked provisional.
/// - `inferred`: derived from a literal/constant expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeFacet {
    pub native: Option<Type>,
    pub annotated: Option<Type>,
    pub tentative: Option<Type>,
    pub inferred: Option<Type>,
}

impl TypeFacet {
    pub fn native(ty: Type) -> Self {
        Self {
            native: Some(ty),
            ..Self::default()
        }
    }

    pub fn annotated(ty: Type) -> Self {
        Self {
            annotated: Some(ty),
            ..Self::default()
        }
    }

    pub fn inferred(ty: Type) -> Self {
        Self {
            inferred: Some(ty),
            ..Self::default()
        }
    }

    pub fn tentative(ty: Type) -> Self {
        Self {
            tentative: Some(ty),
            ..Self::default()
        }
    }

    /// The most trusted observation: annotated, then native, then inferred.
    ///
    /// Tentative types are recorded for consumers that care, but are never consulted here.
    pub fn effective(&self) -> Option<&Type> {
        self.annotated
            .as_ref()
            .or(self.native.as_ref())
            .or(self.inferred.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_none()
            && self.annotated.is_none()
            && self.tentative.is_none()
            && self.inferred.is_none()
    }

    /// Combine with observations made by a later stage.
    ///
    /// Each observation is refined independently: a later non-null value replaces the
    /// earlier one, a later `None` never erases what was already recorded.
    #[must_use]
    pub fn merge(self, later: TypeFacet) -> TypeFacet {
        TypeFacet {
            native: later.native.or(self.native),
            annotated: later.annotated.or(self.annotated),
            tentative: later.tentative.or(self.tentative),
            inferred: later.inferred.or(self.inferred),
        }
    }

    /// Apply `rewriters` in sequence to every present observation.
    #[must_use]
    pub fn rewrite(&self, rewriters: &[&dyn TypeRewriter]) -> TypeFacet {
        let apply = |ty: &Option<Type>| ty.as_ref().map(|ty| rewrite_all(ty, rewriters));
        TypeFacet {
            native: apply(&self.native),
            annotated: apply(&self.annotated),
            tentative: apply(&self.tentative),
            inferred: apply(&self.inferred),
        }
    }
}
