//! Raw caller input to typed values.

use ftl_types::{Amount, BookingId, ParticipantId, TokenId};

use crate::error::{RecorderError, RecorderResult};

fn invalid(field: &str, reason: impl std::fmt::Display) -> RecorderError {
    RecorderError::Validation(format!("{field}: {reason}"))
}

pub fn participant(field: &str, raw: &str) -> RecorderResult<ParticipantId> {
    ParticipantId::parse(raw).map_err(|e| invalid(field, e))
}

pub fn token(field: &str, raw: &str) -> RecorderResult<TokenId> {
    TokenId::parse(raw).map_err(|e| invalid(field, e))
}

/// Amounts moved by an operation must be positive.
pub fn positive_amount(field: &str, amount: Amount) -> RecorderResult<Amount> {
    if amount == 0 {
        return Err(invalid(field, "must be positive"));
    }
    Ok(amount)
}

pub fn booking_id(raw: &str) -> RecorderResult<BookingId> {
    BookingId::parse(raw).map_err(|e| invalid("booking_id", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_the_field() {
        let err = participant("from", "").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("from:"), "{err}");

        let err = token("token", " FRT").unwrap_err();
        assert!(err.to_string().starts_with("validation failed: token:"));
    }

    #[test]
    fn amounts_must_be_positive() {
        assert_eq!(positive_amount("amount", 5).unwrap(), 5);
        assert!(positive_amount("amount", 0).unwrap_err().is_validation());
    }

    #[test]
    fn booking_ids() {
        assert_eq!(booking_id("BK-1042").unwrap().as_str(), "BK-1042");
        let err = booking_id("").unwrap_err();
        assert!(err.to_string().contains("booking_id:"), "{err}");
        assert!(booking_id("BK 1\n").is_err());
        assert!(booking_id(&"x".repeat(129)).is_err());
    }
}
