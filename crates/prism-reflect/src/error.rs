use prism_cache::CacheError;
use prism_core::Name;

pub type Result<T, E = ReflectError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    /// The id does not correspond to any known declaration. Callers decide the fallback.
    #[error("declaration not found: {id}")]
    NotFound { id: String },

    /// A declaration's resolution depends on itself.
    #[error("cyclic resolution: {}", .chain.join(" -> "))]
    CyclicResolution { chain: Vec<String> },

    #[error("cyclic inheritance in {class}: {}", join_names(.chain, " -> "))]
    CyclicInheritance { class: Name, chain: Vec<Name> },

    #[error("{class} inherits conflicting definitions of {member} from traits {}", join_names(.traits, ", "))]
    ConflictingInheritance {
        class: Name,
        member: Name,
        traits: Vec<Name>,
    },

    #[error("record has no `{key}` fact")]
    MissingFact { key: &'static str },

    #[error("invalid type `{ty}`: {message}")]
    InvalidType { ty: String, message: String },

    #[error("constant evaluation failed: {message}")]
    ConstantEvaluation { message: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Failure reported by a collaborator (source provider, extractor, doc parser).
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl ReflectError {
    pub(crate) fn not_found(id: impl ToString) -> Self {
        ReflectError::NotFound { id: id.to_string() }
    }

    pub(crate) fn constant(message: impl Into<String>) -> Self {
        ReflectError::ConstantEvaluation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReflectError::NotFound { .. })
    }
}

fn join_names(names: &[Name], separator: &str) -> String {
    names
        .iter()
        .map(Name::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}
