//! Snapshot of environment configuration.

use std::collections::HashMap;

/// Environment variables captured once at startup.
///
/// Everything downstream reads from this snapshot instead of calling
/// `std::env::var`, so resolution stays a pure function of loaded state.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Loads `.env` (if present) and captures the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Builds a source from explicit pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Returns the trimmed value of `key`, treating blank values as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_are_unset() {
        let env = EnvSource::from_pairs([("A", "  value "), ("B", "   ")]);
        assert_eq!(env.get("A"), Some("value"));
        assert_eq!(env.get("B"), None);
        assert_eq!(env.get("C"), None);
    }

    #[test]
    fn test_set_overrides() {
        let mut env = EnvSource::default();
        env.set("A", "1");
        env.set("A", "2");
        assert_eq!(env.get("A"), Some("2"));
    }
}
