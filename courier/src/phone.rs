//! Phone number canonicalization
//!
//! Local ten-digit numbers are assumed to belong to the default region; any
//! other input is trusted as international and only gets a leading `+`.
//! Nothing is validated here: a malformed number surfaces later as a failed
//! delivery, not as a normalization error.

use serde::Serialize;
use std::fmt;

/// A dialable identifier: `+` followed by the digits of the number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedPhone(String);

impl NormalizedPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedPhone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes raw phone fields with a fixed default country code.
#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    country_code: String,
}

impl PhoneNormalizer {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
        }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedPhone {
        let mut phone = raw.trim();
        // spreadsheets hand numeric cells over as floats
        if let Some(stripped) = phone.strip_suffix(".0") {
            phone = stripped.trim_end();
        }

        if phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()) {
            return NormalizedPhone(format!("+{}{}", self.country_code, phone));
        }
        if !phone.starts_with('+') {
            return NormalizedPhone(format!("+{phone}"));
        }
        NormalizedPhone(phone.to_string())
    }
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COUNTRY_CODE)
    }
}

/// Normalize with the default country code.
pub fn normalize(raw: &str) -> NormalizedPhone {
    PhoneNormalizer::default().normalize(raw)
}
