//! # Authentication Stage
//!
//! Validates the bearer credential carried by a request. The validation
//! predicate is pluggable behind the `CredentialValidator` trait; the
//! built-in `MinLengthValidator` is a deliberate stand-in for real
//! signature/JWT verification, kept so a production validator can be
//! swapped in without touching the pipeline.
//!
//! All outcomes are values. Nothing panics or escapes this boundary.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::GatewayError;

/// Pluggable credential validation predicate
///
/// Async so a real implementation can call out to a token introspection
/// endpoint or key store.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Validate a non-empty credential, returning the rejection reason on
    /// failure
    async fn validate(&self, credential: &str) -> Result<(), String>;
}

/// Accepts credentials strictly longer than `min_length` characters
///
/// A placeholder for real token verification; length is the only property
/// checked.
#[derive(Debug, Clone)]
pub struct MinLengthValidator {
    min_length: usize,
}

impl MinLengthValidator {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }
}

#[async_trait]
impl CredentialValidator for MinLengthValidator {
    async fn validate(&self, credential: &str) -> Result<(), String> {
        if credential.len() > self.min_length {
            Ok(())
        } else {
            Err(format!(
                "credential shorter than {} characters",
                self.min_length + 1
            ))
        }
    }
}

/// Outcome of an authentication check
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// The stage was disabled by configuration; the bypass is still audited
    Bypassed,
    /// The credential validated
    Granted,
    /// The credential was missing or failed validation
    Denied(GatewayError),
}

impl AuthOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }

    /// Human-readable detail for the audit trail
    pub fn detail(&self) -> String {
        match self {
            Self::Bypassed => "disabled".to_string(),
            Self::Granted => "credential accepted".to_string(),
            Self::Denied(err) => err.to_string(),
        }
    }
}

/// The authentication stage
pub struct Authenticator {
    validator: Arc<dyn CredentialValidator>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Build an authenticator with the built-in minimum-length validator
    pub fn new(min_credential_length: usize) -> Self {
        Self {
            validator: Arc::new(MinLengthValidator::new(min_credential_length)),
        }
    }

    /// Build an authenticator with a custom validation predicate
    pub fn with_validator(validator: Arc<dyn CredentialValidator>) -> Self {
        Self { validator }
    }

    /// Check a credential
    ///
    /// When `enabled` is false the check is bypassed entirely. Otherwise an
    /// absent or empty credential is `MissingCredential` and a failing
    /// predicate is `InvalidCredential`.
    pub async fn check(&self, credential: Option<&str>, enabled: bool) -> AuthOutcome {
        if !enabled {
            return AuthOutcome::Bypassed;
        }

        let credential = match credential {
            Some(c) if !c.is_empty() => c,
            _ => {
                debug!("authentication failed: no credential provided");
                return AuthOutcome::Denied(GatewayError::MissingCredential);
            }
        };

        match self.validator.validate(credential).await {
            Ok(()) => {
                debug!("authentication successful");
                AuthOutcome::Granted
            }
            Err(reason) => {
                debug!(%reason, "authentication failed");
                AuthOutcome::Denied(GatewayError::InvalidCredential { reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_bypasses_and_is_audited_as_such() {
        let auth = Authenticator::new(10);
        let outcome = auth.check(None, false).await;
        assert_eq!(outcome, AuthOutcome::Bypassed);
        assert!(outcome.is_ok());
        assert_eq!(outcome.detail(), "disabled");
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let auth = Authenticator::new(10);
        assert_eq!(
            auth.check(None, true).await,
            AuthOutcome::Denied(GatewayError::MissingCredential)
        );
        // Empty string counts as missing, not invalid
        assert_eq!(
            auth.check(Some(""), true).await,
            AuthOutcome::Denied(GatewayError::MissingCredential)
        );
    }

    #[tokio::test]
    async fn test_short_credential_rejected() {
        let auth = Authenticator::new(10);
        let outcome = auth.check(Some("short"), true).await;
        match outcome {
            AuthOutcome::Denied(GatewayError::InvalidCredential { .. }) => {}
            other => panic!("expected InvalidCredential, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_boundary_length_rejected() {
        // Validation requires strictly more than min_length characters
        let auth = Authenticator::new(10);
        assert!(!auth.check(Some("0123456789"), true).await.is_ok());
        assert!(auth.check(Some("0123456789a"), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_custom_validator() {
        struct PrefixValidator;

        #[async_trait]
        impl CredentialValidator for PrefixValidator {
            async fn validate(&self, credential: &str) -> Result<(), String> {
                if credential.starts_with("Bearer ") {
                    Ok(())
                } else {
                    Err("missing Bearer prefix".to_string())
                }
            }
        }

        let auth = Authenticator::with_validator(Arc::new(PrefixValidator));
        assert!(auth.check(Some("Bearer abc"), true).await.is_ok());
        assert!(!auth.check(Some("abc"), true).await.is_ok());
    }
}
