use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A (possibly namespace-qualified) declaration name such as `App\Model\User`.
///
/// Names never carry a leading `\`; [`Name::new`] strips it.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(SmolStr);

impl Name {
    pub fn new(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        Self(SmolStr::new(text.strip_prefix('\\').unwrap_or(text)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The last `\`-separated segment.
    pub fn short(&self) -> &str {
        match self.0.rfind('\\') {
            Some(idx) => &self.0[idx + 1..],
            None => self.0.as_str(),
        }
    }

    /// Everything before the last `\`, or `None` for names in the global namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.0.rfind('\\').map(|idx| &self.0[..idx])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this name carries a namespace qualifier.
    pub fn is_qualified(&self) -> bool {
        self.0.contains('\\')
    }

    /// Join `self` (a namespace) with `tail`.
    pub fn join(&self, tail: &str) -> Self {
        if self.0.is_empty() {
            return Self::new(tail);
        }
        Self(SmolStr::new(format!("{}\\{}", self.0, tail)))
    }

    /// Class-like and function names are compared case-insensitively by the language.
    pub fn eq_ignore_case(&self, other: &Name) -> bool {
        self.0.eq_ignore_ascii_case(other.as_str())
    }

    /// The ASCII-lowercased form, for keys of case-insensitive names.
    pub fn to_ascii_lowercase(&self) -> Self {
        if !self.0.bytes().any(|byte| byte.is_ascii_uppercase()) {
            return self.clone();
        }
        Self(SmolStr::new(self.0.to_ascii_lowercase()))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_str(), f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&String> for Name {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
