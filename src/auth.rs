//! Authentication adapter.
//!
//! Maps HTTP Basic credentials onto either the shared service identity
//! (checked locally against a stored hash) or an impersonated database
//! user, resolved by calling the `impersonation.authenticate` helper
//! function on the database over an existing service session. No new Bolt
//! connection is opened per request.

use std::collections::HashMap;
use std::sync::Once;

use sha2::{Digest, Sha256};

use boltr::types::BoltValue;

use crate::driver::{SessionOptions, SessionRouter};
use crate::errors::GatewayError;

const IMPERSONATION_PROBE: &str =
    "RETURN impersonation.authenticate($username, $password) = 'SUCCESS' AS value";

/// The authenticated identity of one request.
///
/// Credentials are only present for impersonated users and live no longer
/// than the request that carried them.
#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
    pub credentials: Option<Vec<u8>>,
}

impl Principal {
    pub fn service(username: impl Into<String>) -> Self {
        Principal {
            username: username.into(),
            credentials: None,
        }
    }

    pub fn impersonated(username: impl Into<String>, password: &str) -> Self {
        Principal {
            username: username.into(),
            credentials: Some(password.as_bytes().to_vec()),
        }
    }
}

pub struct AuthAdapter {
    service_username: String,
    service_password_hash: [u8; 32],
    missing_helper_warning: Once,
}

impl AuthAdapter {
    pub fn new(service_username: impl Into<String>, service_password: &str) -> Self {
        AuthAdapter {
            service_username: service_username.into(),
            service_password_hash: hash_password(service_password),
            missing_helper_warning: Once::new(),
        }
    }

    /// Validates Basic credentials and produces the request's principal.
    pub async fn authenticate(
        &self,
        router: &SessionRouter,
        username: &str,
        password: &str,
    ) -> Result<Principal, GatewayError> {
        if self.matches_service_identity(username, password) {
            return Ok(Principal::service(username));
        }

        let mut parameters = HashMap::new();
        parameters.insert(
            "username".to_string(),
            BoltValue::String(username.to_string()),
        );
        parameters.insert(
            "password".to_string(),
            BoltValue::String(password.to_string()),
        );

        match router
            .run_eager(&SessionOptions::system_read(), IMPERSONATION_PROBE, parameters)
            .await
        {
            Ok(outcome) => {
                let accepted = matches!(
                    outcome.records.first().and_then(|record| record.first()),
                    Some(BoltValue::Boolean(true))
                );
                if accepted {
                    Ok(Principal::impersonated(username, password))
                } else {
                    Err(GatewayError::Auth)
                }
            }
            Err(GatewayError::Database(e)) if e.is_syntax_error() => {
                // The helper function is not installed on this database.
                self.missing_helper_warning.call_once(|| {
                    log::warn!(
                        "impersonation.authenticate is not available on the database; \
                         only the service identity can log in"
                    );
                });
                Err(GatewayError::Auth)
            }
            Err(GatewayError::Database(e)) => {
                log::debug!("impersonation probe rejected: {}", e);
                Err(GatewayError::Auth)
            }
            Err(e) => Err(e),
        }
    }

    fn matches_service_identity(&self, username: &str, password: &str) -> bool {
        if username != self.service_username {
            return false;
        }
        constant_time_eq(&hash_password(password), &self.service_password_hash)
    }
}

fn hash_password(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Compares digests without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
