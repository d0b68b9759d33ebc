//! Value generation and validation for the supported symbologies.
//!
//! Everything here is pure: no storage, no rendering. `generate` produces a
//! value that always passes `validate` for the same symbology.

mod checksum;

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use checksum::{parse_digits, weighted_check_digit};

pub const UPC_A_LEN: usize = 12;
pub const EAN_13_LEN: usize = 13;
pub const CODE128_MIN_LEN: usize = 6;
pub const CODE128_MAX_LEN: usize = 13;
pub const CODE128_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "UPC_A", alias = "UPC")]
    UpcA,
    #[serde(rename = "EAN_13", alias = "EAN13")]
    Ean13,
    #[serde(rename = "CODE128")]
    Code128,
}

impl Symbology {
    pub const ALL: [Symbology; 3] = [Symbology::UpcA, Symbology::Ean13, Symbology::Code128];

    /// Wire name, also used for search matching.
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::UpcA => "UPC_A",
            Symbology::Ean13 => "EAN_13",
            Symbology::Code128 => "CODE128",
        }
    }

    /// Total length of a value including its check digit, for the fixed-width schemes.
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            Symbology::UpcA => Some(UPC_A_LEN),
            Symbology::Ean13 => Some(EAN_13_LEN),
            Symbology::Code128 => None,
        }
    }

    fn weights(&self) -> Option<(u32, u32)> {
        match self {
            Symbology::UpcA => Some((3, 1)),
            Symbology::Ean13 => Some((1, 3)),
            Symbology::Code128 => None,
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = ValidationError;

    /// Accepts the wire names plus the loose spellings people type
    /// (`upc-a`, `UPC`, `ean13`, `code-128`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "UPCA" | "UPC" => Ok(Symbology::UpcA),
            "EAN13" | "EAN" => Ok(Symbology::Ean13),
            "CODE128" => Ok(Symbology::Code128),
            _ => Err(ValidationError::UnknownSymbology(raw.to_string())),
        }
    }
}

/// Generate a random value using the thread-local RNG.
pub fn generate(symbology: Symbology) -> String {
    generate_with(&mut rand::thread_rng(), symbology)
}

/// Generate a random value from an injected RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, symbology: Symbology) -> String {
    match (symbology.fixed_len(), symbology.weights()) {
        (Some(len), Some((even, odd))) => {
            let payload: Vec<u8> = (0..len - 1).map(|_| rng.gen_range(0..10u8)).collect();
            let check = weighted_check_digit(&payload, even, odd);
            payload
                .iter()
                .chain(std::iter::once(&check))
                .map(|digit| char::from(b'0' + digit))
                .collect()
        }
        _ => {
            let len = rng.gen_range(CODE128_MIN_LEN..=CODE128_MAX_LEN);
            (0..len)
                .map(|_| char::from(CODE128_ALPHABET[rng.gen_range(0..CODE128_ALPHABET.len())]))
                .collect()
        }
    }
}

/// Shape check only: digit count and charset for UPC-A/EAN-13, non-empty for
/// CODE128. The check digit of externally supplied values is not recomputed
/// here; see [`has_valid_check_digit`] for that.
pub fn validate(value: &str, symbology: Symbology) -> bool {
    match symbology.fixed_len() {
        Some(len) => value.len() == len && value.bytes().all(|byte| byte.is_ascii_digit()),
        None => !value.is_empty(),
    }
}

/// [`validate`] for values that may be missing entirely.
pub fn validate_opt(value: Option<&str>, symbology: Symbology) -> bool {
    value.is_some_and(|value| validate(value, symbology))
}

/// Check digit for a payload without its trailing digit (11 digits for UPC-A,
/// 12 for EAN-13). `None` for CODE128 or a malformed payload.
pub fn check_digit(payload: &str, symbology: Symbology) -> Option<u8> {
    let (len, (even, odd)) = (symbology.fixed_len()?, symbology.weights()?);
    if payload.len() != len - 1 {
        return None;
    }
    let digits = parse_digits(payload)?;
    Some(weighted_check_digit(&digits, even, odd))
}

/// Shape check plus the checksum law. CODE128 values carry no check digit, so
/// for them this is the same as [`validate`].
pub fn has_valid_check_digit(value: &str, symbology: Symbology) -> bool {
    if !validate(value, symbology) {
        return false;
    }
    if symbology == Symbology::Code128 {
        return true;
    }

    let (payload, last) = value.split_at(value.len() - 1);
    match (check_digit(payload, symbology), last.bytes().next()) {
        (Some(expected), Some(actual)) => actual - b'0' == expected,
        _ => false,
    }
}

/// Validate and hand the value back, for call sites that want a `Result`.
pub fn ensure_valid(value: &str, symbology: Symbology) -> Result<(), ValidationError> {
    if validate(value, symbology) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            symbology,
            value: value.to_string(),
        })
    }
}
