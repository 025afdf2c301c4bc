//! Authentication utilities library
//!
//! Provides the credential and session primitives used by the account service:
//! - Password hashing (Argon2id, configurable cost)
//! - Password composition policy
//! - Signed session cookie values
//! - Random tokens and constant-time token comparison
//!
//! # Examples
//!
//! ## Password Policy
//! ```
//! use auth::{PasswordPolicy, PasswordRule};
//!
//! let policy = PasswordPolicy::default();
//! assert_eq!(policy.validate("short"), Err(PasswordRule::Length { min: 12 }));
//! assert!(policy.validate("Correct-Horse-42").is_ok());
//! ```
//!
//! ## Login Flow
//! ```
//! use auth::Authenticator;
//! use chrono::Duration;
//!
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!");
//!
//! // Register: hash password
//! let hash = auth.hash_password("Correct-Horse-42").unwrap();
//!
//! // Login: verify and sign a session cookie
//! auth.verify_password("Correct-Horse-42", &hash).unwrap();
//! let cookie = auth.sign_session("session-id", Duration::days(30)).unwrap();
//! assert_eq!(auth.open_session(&cookie).unwrap(), "session-id");
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;
pub mod token;

// Re-export commonly used items
pub use authenticator::AuthenticationError;
pub use authenticator::Authenticator;
pub use jwt::JwtError;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use password::PasswordPolicy;
pub use password::PasswordRule;
pub use token::generate_token;
pub use token::tokens_match;
