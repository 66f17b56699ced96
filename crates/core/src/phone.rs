//! Target phone number validation for outbound calls.

use std::fmt;
use std::str::FromStr;

/// Reasons a target number is refused before any call is placed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Phone number must be without + (1234567890)")]
    LeadingPlus,
    #[error("Phone number must contain only digits")]
    NotNumeric,
    #[error("Only EU and US numbers supported")]
    UnsupportedRegion,
}

/// Numbering plans we are willing to dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Country codes starting with 3 or 4.
    Eea,
    /// North American numbering plan, country code 1.
    Us,
}

/// A validated target number: digits only, no leading `+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    digits: String,
    region: Region,
}

impl PhoneNumber {
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// The number in E.164 form, as the telephony REST API expects it.
    pub fn e164(&self) -> String {
        format!("+{}", self.digits)
    }
}

impl FromStr for PhoneNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('+') {
            return Err(ValidationError::LeadingPlus);
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::NotNumeric);
        }
        let region = match s.as_bytes()[0] {
            b'3' | b'4' => Region::Eea,
            b'1' => Region::Us,
            _ => return Err(ValidationError::UnsupportedRegion),
        };
        Ok(Self {
            digits: s.to_string(),
            region,
        })
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_plus_is_rejected_regardless_of_region() {
        assert_eq!(
            "+1234567890".parse::<PhoneNumber>(),
            Err(ValidationError::LeadingPlus)
        );
        assert_eq!(
            "+71234567890".parse::<PhoneNumber>(),
            Err(ValidationError::LeadingPlus)
        );
    }

    #[test]
    fn unsupported_region_is_rejected() {
        assert_eq!(
            "71234567890".parse::<PhoneNumber>(),
            Err(ValidationError::UnsupportedRegion)
        );
    }

    #[test]
    fn us_and_eu_numbers_are_accepted() {
        let us: PhoneNumber = "14155551234".parse().unwrap();
        assert_eq!(us.region(), Region::Us);
        assert_eq!(us.e164(), "+14155551234");

        let uk: PhoneNumber = "447911123456".parse().unwrap();
        assert_eq!(uk.region(), Region::Eea);
        assert_eq!(uk.to_string(), "447911123456");
    }

    #[test]
    fn non_digits_are_rejected() {
        assert_eq!("".parse::<PhoneNumber>(), Err(ValidationError::NotNumeric));
        assert_eq!(
            "1 415 555".parse::<PhoneNumber>(),
            Err(ValidationError::NotNumeric)
        );
    }

    #[test]
    fn messages_match_call_outcome_text() {
        assert_eq!(
            ValidationError::LeadingPlus.to_string(),
            "Phone number must be without + (1234567890)"
        );
        assert_eq!(
            ValidationError::UnsupportedRegion.to_string(),
            "Only EU and US numbers supported"
        );
    }
}
