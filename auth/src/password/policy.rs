use std::fmt;

/// Symbols accepted as the "special character" class.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()-_=+{};:,<.>";

/// Composition rules a password can violate, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordRule {
    Length { min: usize },
    Uppercase,
    Lowercase,
    Digit,
    Special,
}

impl PasswordRule {
    /// Stable identifier for logs and form error keys.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Length { .. } => "length",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Digit => "digit",
            Self::Special => "special",
        }
    }
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { min } => {
                write!(f, "Password must be at least {} characters long.", min)
            }
            Self::Uppercase => f.write_str("Password must contain at least one uppercase letter."),
            Self::Lowercase => f.write_str("Password must contain at least one lowercase letter."),
            Self::Digit => f.write_str("Password must contain at least one number."),
            Self::Special => f.write_str("Password must contain at least one special character."),
        }
    }
}

impl std::error::Error for PasswordRule {}

/// Password composition policy.
///
/// Pure and stateless: the same policy is applied at registration and on
/// profile password changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    min_length: usize,
}

impl PasswordPolicy {
    pub const DEFAULT_MIN_LENGTH: usize = 12;

    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Every rule the candidate violates, in evaluation order.
    pub fn violations(&self, password: &str) -> Vec<PasswordRule> {
        let mut violated = Vec::new();

        if password.chars().count() < self.min_length {
            violated.push(PasswordRule::Length {
                min: self.min_length,
            });
        }
        if !password.chars().any(char::is_uppercase) {
            violated.push(PasswordRule::Uppercase);
        }
        if !password.chars().any(char::is_lowercase) {
            violated.push(PasswordRule::Lowercase);
        }
        if !password.chars().any(char::is_numeric) {
            violated.push(PasswordRule::Digit);
        }
        if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
            violated.push(PasswordRule::Special);
        }

        violated
    }

    /// Validate a candidate password.
    ///
    /// # Errors
    /// The first violated rule (length, uppercase, lowercase, digit, special).
    pub fn validate(&self, password: &str) -> Result<(), PasswordRule> {
        match self.violations(password).into_iter().next() {
            Some(rule) => Err(rule),
            None => Ok(()),
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_LENGTH)
    }
}
