//! API key resolution
//!
//! [`resolve_api_key`] checks sources in this order:
//! 1. Environment variable (e.g., `ANTHROPIC_API_KEY`)
//! 2. Config file value

use tracing::debug;

/// Where a resolved key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from the process environment
    EnvVar,
    /// Read from the configuration file
    Config,
}

/// Resolve an API key from `env_var`, falling back to `config_key`.
///
/// Empty values are treated as absent. Returns `(key, source)` or `None`.
pub fn resolve_api_key(
    env_var: &str,
    config_key: Option<&str>,
) -> Option<(String, CredentialSource)> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim();
        if !value.is_empty() {
            debug!("Resolved API key from env var {}", env_var);
            return Some((value.to_string(), CredentialSource::EnvVar));
        }
    }

    config_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            debug!("Resolved API key from config (env var {} unset)", env_var);
            (key.to_string(), CredentialSource::Config)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VAR: &str = "SHELFMARK_TEST_API_KEY";

    #[test]
    #[serial]
    fn test_env_var_takes_priority() {
        std::env::set_var(VAR, "from-env");
        let resolved = resolve_api_key(VAR, Some("from-config"));
        std::env::remove_var(VAR);

        assert_eq!(
            resolved,
            Some(("from-env".to_string(), CredentialSource::EnvVar))
        );
    }

    #[test]
    #[serial]
    fn test_falls_back_to_config() {
        std::env::remove_var(VAR);
        assert_eq!(
            resolve_api_key(VAR, Some("from-config")),
            Some(("from-config".to_string(), CredentialSource::Config))
        );
    }

    #[test]
    #[serial]
    fn test_blank_values_are_absent() {
        std::env::set_var(VAR, "   ");
        let resolved = resolve_api_key(VAR, Some(""));
        std::env::remove_var(VAR);

        assert_eq!(resolved, None);
    }
}
