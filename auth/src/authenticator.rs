use chrono::Duration;

use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::password::PasswordError;
use crate::password::PasswordHasher;
use crate::password::PasswordPolicy;
use crate::password::PasswordRule;

/// Authentication coordinator.
///
/// Combines password hashing, the password composition policy and signing of
/// session cookies behind one handle owned by the application state.
pub struct Authenticator {
    password_hasher: PasswordHasher,
    password_policy: PasswordPolicy,
    jwt_handler: JwtHandler,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),
}

impl Authenticator {
    /// Create an authenticator with default hashing cost and policy.
    ///
    /// # Arguments
    /// * `secret_key` - Application secret used to sign session cookies
    pub fn new(secret_key: &[u8]) -> Self {
        Self {
            password_hasher: PasswordHasher::new(),
            password_policy: PasswordPolicy::default(),
            jwt_handler: JwtHandler::new(secret_key),
        }
    }

    pub fn with_password_hasher(mut self, password_hasher: PasswordHasher) -> Self {
        self.password_hasher = password_hasher;
        self
    }

    pub fn with_password_policy(mut self, password_policy: PasswordPolicy) -> Self {
        self.password_policy = password_policy;
        self
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    /// Check a candidate password against the composition policy.
    ///
    /// # Errors
    /// The first violated rule.
    pub fn check_policy(&self, password: &str) -> Result<(), PasswordRule> {
        self.password_policy.validate(password)
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Verify a password against its stored hash.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `PasswordError` - Stored hash is unreadable
    pub fn verify_password(
        &self,
        password: &str,
        stored_hash: &str,
    ) -> Result<(), AuthenticationError> {
        if self.password_hasher.verify(password, stored_hash)? {
            Ok(())
        } else {
            Err(AuthenticationError::InvalidCredentials)
        }
    }

    /// Reject a login for an account that does not exist.
    ///
    /// Spends one hashing round so the response time matches a wrong
    /// password for an existing account.
    pub fn reject_unknown_account(&self, password: &str) -> AuthenticationError {
        let _ = self.password_hasher.hash(password);
        AuthenticationError::InvalidCredentials
    }

    /// Sign a session cookie value naming `session_id`.
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn sign_session(&self, session_id: &str, lifetime: Duration) -> Result<String, JwtError> {
        self.jwt_handler
            .encode(&Claims::for_session(session_id, lifetime))
    }

    /// Verify a session cookie value and return the session id it names.
    ///
    /// # Errors
    /// * `JwtError` - Tampered, malformed or expired cookie
    pub fn open_session(&self, cookie_value: &str) -> Result<String, JwtError> {
        let claims: Claims = self.jwt_handler.decode(cookie_value)?;
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(b"test_secret_key_at_least_32_bytes!")
            .with_password_hasher(PasswordHasher::with_params(1024, 1, 1).unwrap())
    }

    #[test]
    fn test_verify_password_success() {
        let authenticator = authenticator();
        let hash = authenticator
            .hash_password("Correct-Horse-42")
            .expect("Failed to hash password");

        assert!(authenticator
            .verify_password("Correct-Horse-42", &hash)
            .is_ok());
    }

    #[test]
    fn test_verify_password_invalid() {
        let authenticator = authenticator();
        let hash = authenticator.hash_password("Correct-Horse-42").unwrap();

        let result = authenticator.verify_password("wrong_password", &hash);
        assert!(matches!(
            result,
            Err(AuthenticationError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_unknown_account_matches_wrong_password() {
        let authenticator = authenticator();
        let hash = authenticator.hash_password("Correct-Horse-42").unwrap();

        let wrong_password = authenticator
            .verify_password("wrong_password", &hash)
            .unwrap_err();
        let unknown = authenticator.reject_unknown_account("wrong_password");

        assert_eq!(wrong_password.to_string(), unknown.to_string());
    }

    #[test]
    fn test_session_cookie_round_trip() {
        let authenticator = authenticator();

        let cookie = authenticator
            .sign_session("session-1", Duration::hours(1))
            .expect("Failed to sign session");
        let session_id = authenticator
            .open_session(&cookie)
            .expect("Failed to open session");

        assert_eq!(session_id, "session-1");
    }

    #[test]
    fn test_session_cookie_rejected_with_other_key() {
        let signer = authenticator();
        let other = Authenticator::new(b"another_secret_key_at_least_32_by!");

        let cookie = signer.sign_session("session-1", Duration::hours(1)).unwrap();
        assert!(other.open_session(&cookie).is_err());
    }

    #[test]
    fn test_check_policy_uses_configured_policy() {
        let authenticator = authenticator().with_password_policy(PasswordPolicy::new(20));

        assert_eq!(
            authenticator.check_policy("Correct-Horse-42"),
            Err(PasswordRule::Length { min: 20 })
        );
    }
}
