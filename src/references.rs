//! Short human-friendly references derived from primary keys.
//!
//! The mapping is deterministic and looks random, so references never need
//! a uniqueness check as long as the key fits in the reference space.

use axum::{http::StatusCode, response::IntoResponse, Json};

/// Digits plus uppercase consonants, without `AEIOUY`.
pub const DEFAULT_CHAR_SET: &str = "0123456789BCDFGHJKLMNPQRSTVWXZ";
pub const DEFAULT_REFERENCE_LENGTH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimeSet {
    Default,
    Assessment,
    System,
    Organisation,
}

impl PrimeSet {
    fn primes(&self) -> (u64, u64) {
        match self {
            Self::Default => (60013, 104729),
            Self::Assessment => (11547, 492761),
            Self::System => (97103, 907757),
            Self::Organisation => (94327, 747811),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("Key {pk} is too large for a {num_chars}-character reference")]
    KeyTooLarge { pk: u64, num_chars: u32 },
    #[error("Invalid reference parameters: {0}")]
    InvalidParameters(String),
}

impl IntoResponse for ReferenceError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceGenerator<'a> {
    pub num_chars: u32,
    pub prime_set: PrimeSet,
    pub char_set: &'a str,
    pub skip_size_check: bool,
}

impl Default for ReferenceGenerator<'static> {
    fn default() -> Self {
        Self {
            num_chars: DEFAULT_REFERENCE_LENGTH,
            prime_set: PrimeSet::Default,
            char_set: DEFAULT_CHAR_SET,
            skip_size_check: false,
        }
    }
}

impl<'a> ReferenceGenerator<'a> {
    pub fn with_prime_set(mut self, prime_set: PrimeSet) -> Self {
        self.prime_set = prime_set;
        self
    }

    pub fn generate(&self, pk: u64) -> Result<String, ReferenceError> {
        let chars: Vec<char> = self.char_set.chars().collect();
        if chars.is_empty() || self.num_chars == 0 {
            return Err(ReferenceError::InvalidParameters(
                "character set and length must be non-empty".to_string(),
            ));
        }
        let base = chars.len() as u128;
        let space = base
            .checked_pow(self.num_chars)
            .ok_or_else(|| ReferenceError::InvalidParameters("reference space overflows".to_string()))?;

        if !self.skip_size_check && u128::from(pk) >= space {
            return Err(ReferenceError::KeyTooLarge {
                pk,
                num_chars: self.num_chars,
            });
        }

        let (p1, p2) = self.prime_set.primes();
        let mut value =
            (u128::from(pk) * u128::from(p1) + u128::from(p2)) % space + base.pow(self.num_chars - 1);

        let mut reference = String::with_capacity(self.num_chars as usize);
        for _ in 0..self.num_chars {
            reference.push(chars[(value % base) as usize]);
            value /= base;
        }
        Ok(reference)
    }
}

pub fn generate_reference(pk: u64) -> Result<String, ReferenceError> {
    ReferenceGenerator::default().generate(pk)
}

pub fn generate_reference_with(pk: u64, prime_set: PrimeSet) -> Result<String, ReferenceError> {
    ReferenceGenerator::default().with_prime_set(prime_set).generate(pk)
}
