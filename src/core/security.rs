use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Tokens are issued by the platform's auth service; only `sub` is used here, as the user id.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) exp: i64,
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)?;

    if claims.sub.trim().is_empty() {
        return Err(SecurityError::JwtDecoding);
    }

    Ok(claims)
}

pub(crate) fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use time::Duration;

    async fn test_settings() -> (tokio::sync::OwnedMutexGuard<()>, Settings) {
        let guard = test_support::env_lock().await;
        test_support::set_test_env();
        (guard, Settings::load().expect("settings"))
    }

    #[tokio::test]
    async fn valid_token_yields_its_subject() {
        let (_guard, settings) = test_settings().await;

        let token = test_support::sign_token("user-123", &settings, Duration::minutes(1));
        let claims = verify_token(&token, &settings).expect("claims");

        assert_eq!(claims.sub, "user-123");
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (_guard, settings) = test_settings().await;

        let token = test_support::sign_token("user-123", &settings, Duration::minutes(-10));
        assert!(verify_token(&token, &settings).is_err());
    }

    #[tokio::test]
    async fn blank_subject_is_rejected() {
        let (_guard, settings) = test_settings().await;

        let token = test_support::sign_token(" ", &settings, Duration::minutes(5));
        assert!(matches!(verify_token(&token, &settings), Err(SecurityError::JwtDecoding)));
    }
}
