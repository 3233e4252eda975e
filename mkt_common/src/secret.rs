//! Credentials that must never end up in a log line: API keys, signing secrets and the admin token.
use std::{
    env,
    fmt::{self, Debug, Display},
};

const REDACTED: &str = "****";
const NOT_SET: &str = "<not set>";

/// Wraps a credential so that `{}` and `{:?}` print a placeholder instead of the value.
///
/// Use [`Secret::reveal`] at the one place the value is actually needed, such as building an `Authorization` header.
#[derive(Clone, Default)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn reveal(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl Secret<String> {
    /// Reads the environment variable `name`. Unset and blank variables both give `None`.
    pub fn from_env(name: &str) -> Option<Self> {
        env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).map(Self)
    }

    /// An empty secret is one that was never configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares `candidate` with the secret without short-circuiting on the first differing byte, so response times
    /// say nothing about how much of a guess was right. An empty secret matches nothing.
    pub fn matches(&self, candidate: &str) -> bool {
        let (a, b) = (self.0.as_bytes(), candidate.as_bytes());
        !a.is_empty() && a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    fn placeholder(&self) -> &'static str {
        if self.is_empty() {
            NOT_SET
        } else {
            REDACTED
        }
    }
}

impl Debug for Secret<String> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.placeholder())
    }
}

impl Display for Secret<String> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder())
    }
}
