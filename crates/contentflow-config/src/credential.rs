use std::fmt;

use contentflow_utils::error::ConfigError;

/// An opaque provider credential.
///
/// Resolved from the environment when the provider set is built. It has no
/// `Serialize` impl and its `Debug`/`Display` output is redacted, so it
/// cannot end up in a run record, a log line or `contentflow config`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Read the credential named by `env`.
    ///
    /// # Errors
    /// `MissingCredential` if the variable is unset or empty.
    pub fn from_env(provider: &str, env: &str) -> Result<Self, ConfigError> {
        match std::env::var(env) {
            Ok(value) if !value.trim().is_empty() => Ok(Self(value)),
            _ => Err(ConfigError::MissingCredential {
                provider: provider.to_string(),
                env: env.to_string(),
            }),
        }
    }

    /// The secret, for placing into an outgoing request header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let cred = Credential::new("sk-live-123");
        assert_eq!(format!("{cred:?}"), "Credential([REDACTED])");
        assert_eq!(cred.to_string(), "[REDACTED]");
        assert_eq!(cred.expose(), "sk-live-123");
    }

    #[test]
    #[serial]
    fn test_from_env_missing_and_present() {
        let var = "CONTENTFLOW_TEST_CREDENTIAL_ENV";
        unsafe { std::env::remove_var(var) };
        let err = Credential::from_env("audio", var).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));

        unsafe { std::env::set_var(var, "token-value") };
        let cred = Credential::from_env("audio", var).unwrap();
        assert_eq!(cred.expose(), "token-value");
        unsafe { std::env::remove_var(var) };
    }
}
