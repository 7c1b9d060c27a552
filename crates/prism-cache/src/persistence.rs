use serde::{Deserialize, Serialize};

/// Controls whether the cache may consult and/or update its persistent backend.
///
/// The staging tier is always active; this only gates backend traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistenceMode {
    /// Never read from or write to the backend.
    Disabled,
    /// Backend reads are allowed; commits drop staged records instead of writing them.
    ReadOnly,
    #[default]
    ReadWrite,
}

impl PersistenceMode {
    pub fn allows_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn allows_write(self) -> bool {
        matches!(self, Self::ReadWrite)
    }

    /// Parse a mode from its textual form, accepting the usual synonyms.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "0" | "off" | "disabled" | "false" | "no" => Some(Self::Disabled),
            "ro" | "read-only" | "readonly" => Some(Self::ReadOnly),
            "rw" | "read-write" | "readwrite" | "on" | "enabled" | "true" | "1" => {
                Some(Self::ReadWrite)
            }
            _ => None,
        }
    }

    /// `PRISM_PERSISTENCE=off|ro|rw`, falling back to `fallback` when unset or unrecognized.
    pub fn from_env_or(fallback: Self) -> Self {
        let Some(raw) = std::env::var_os("PRISM_PERSISTENCE") else {
            return fallback;
        };
        let raw = raw.to_string_lossy();
        match Self::parse(&raw) {
            Some(mode) => mode,
            None => {
                tracing::warn!(
                    target: "prism.cache",
                    value = %raw,
                    "unrecognized PRISM_PERSISTENCE value; keeping configured mode"
                );
                fallback
            }
        }
    }
}
