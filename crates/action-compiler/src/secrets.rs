//! Secret lookup for fill values

use std::collections::BTreeMap;
use std::env;
use std::fmt;

/// Resolves a secret reference to its value at execution time
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

pub const SECRET_ENV_PREFIX: &str = "STEPWRIGHT_SECRET_";

/// Reads `STEPWRIGHT_SECRET_<NAME>`; the name is upper-cased and every
/// character outside `[A-Z0-9]` becomes `_`.
#[derive(Debug, Clone)]
pub struct EnvSecretResolver {
    prefix: String,
}

impl Default for EnvSecretResolver {
    fn default() -> Self {
        Self {
            prefix: SECRET_ENV_PREFIX.to_string(),
        }
    }
}

impl EnvSecretResolver {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_for(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

impl SecretResolver for EnvSecretResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        env::var(self.variable_for(name)).ok()
    }
}

/// Fixed in-memory secrets, for hosts that fetch them up front
#[derive(Clone, Default)]
pub struct StaticSecrets {
    values: BTreeMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl fmt::Debug for StaticSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSecrets")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SecretResolver for StaticSecrets {
    fn resolve(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_variable_names_are_normalized() {
        let resolver = EnvSecretResolver::default();
        assert_eq!(
            resolver.variable_for("shop.password-1"),
            "STEPWRIGHT_SECRET_SHOP_PASSWORD_1"
        );
    }

    #[test]
    fn test_reads_from_environment() {
        let resolver = EnvSecretResolver::with_prefix("STEPWRIGHT_TEST_SECRETS_RESOLVER_");
        env::set_var("STEPWRIGHT_TEST_SECRETS_RESOLVER_PIN", "1234");
        assert_eq!(resolver.resolve("pin").as_deref(), Some("1234"));
        assert_eq!(resolver.resolve("absent"), None);
    }

    #[test]
    fn test_static_secrets_do_not_debug_values() {
        let secrets = StaticSecrets::new().with("pin", "9876");
        assert_eq!(secrets.resolve("pin").as_deref(), Some("9876"));
        assert!(!format!("{secrets:?}").contains("9876"));
    }
}
