use thiserror::Error;

use crate::address::AddressKey;
use crate::identifier::{AddressId, IdWidth};

/// A row that cannot be read as the sixteen Price Paid fields.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedRecordError {
    #[error("line {line_number}: expected {expected} fields, found {found}")]
    FieldCount {
        line_number: usize,
        expected: usize,
        found: usize,
        raw: String,
    },
    #[error("line {line_number}: field {field} is not valid UTF-8")]
    InvalidUtf8 {
        line_number: usize,
        field: usize,
        raw: String,
    },
}

impl MalformedRecordError {
    pub fn line_number(&self) -> usize {
        match self {
            MalformedRecordError::FieldCount { line_number, .. }
            | MalformedRecordError::InvalidUtf8 { line_number, .. } => *line_number,
        }
    }

    /// The row as read, with invalid bytes replaced.
    pub fn raw(&self) -> &str {
        match self {
            MalformedRecordError::FieldCount { raw, .. }
            | MalformedRecordError::InvalidUtf8 { raw, .. } => raw,
        }
    }
}

/// A well-formed record whose typed fields could not be parsed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("line {line_number}, transaction {transaction_id}: invalid price {value:?}: {reason}")]
    Price {
        line_number: usize,
        transaction_id: String,
        value: String,
        reason: String,
    },
    #[error("line {line_number}, transaction {transaction_id}: invalid transfer date {value:?}: {reason}")]
    TransferDate {
        line_number: usize,
        transaction_id: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error(
    "address id {id} ({width}) assigned to both \"{existing}\" and \"{incoming}\"; rerun with a wider --id-width"
)]
pub struct IdentifierCollision {
    pub id: AddressId,
    pub width: IdWidth,
    pub existing: AddressKey,
    pub incoming: AddressKey,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed record: {0}")]
    Malformed(#[from] MalformedRecordError),
    #[error("identifier collision: {0}")]
    IdentifierCollision(#[from] IdentifierCollision),
    #[error("{count} address group(s) failed, first \"{first_key}\": {reason}")]
    FailedGroups {
        count: usize,
        first_key: AddressKey,
        reason: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error during CSV processing: {0}")]
    Csv(#[from] csv::Error),
    #[error("error during JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Location;

    fn key(paon: &str) -> AddressKey {
        AddressKey::from_location(&Location {
            paon: paon.into(),
            street: "S".into(),
            ..Default::default()
        })
    }

    #[test]
    fn failed_groups_message_shows_the_plain_key() {
        let err = PipelineError::FailedGroups {
            count: 2,
            first_key: key("10"),
            reason: "bad price".into(),
        };

        let message = err.to_string();
        assert_eq!(key("10").as_str(), "10  S    ");
        assert_eq!(message, "2 address group(s) failed, first \"10  S    \": bad price");
        assert!(!message.contains("AddressKey("));
    }

    #[test]
    fn collision_message_names_both_keys() {
        let err = IdentifierCollision {
            id: crate::identifier::address_id(&key("1"), IdWidth::Bits64),
            width: IdWidth::Bits64,
            existing: key("1"),
            incoming: key("2"),
        };

        let message = err.to_string();
        assert!(message.contains("(64-bit) assigned to both \"1  S    \" and \"2  S    \""));
        assert!(!message.contains("AddressKey("));
    }
}
