/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the seqfix session engine.
//!
//! This module provides a unified error hierarchy using `thiserror` for typed,
//! domain-specific errors across all seqfix operations. Protocol faults that
//! the original FIX engines model as checked exceptions (reject logon,
//! incorrect tag value, unsupported message type, ...) are expressed here as
//! explicit [`SessionError`] variants; the session dispatch matches on them
//! and converts each kind into the corresponding outbound Reject or Logout.

use thiserror::Error;

/// Result type alias using [`FixError`] as the error type.
pub type Result<T> = std::result::Result<T, FixError>;

/// Top-level error type for all seqfix operations.
#[derive(Debug, Error)]
pub enum FixError {
    /// Error during message decoding.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error during message encoding.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Error in session layer operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error in message store operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error from underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur during FIX message decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Message buffer is incomplete, need more data.
    #[error("incomplete message, need more data")]
    Incomplete,

    /// Invalid BeginString field (tag 8).
    #[error("invalid begin string: expected 8=FIX.x.y")]
    InvalidBeginString,

    /// Missing BodyLength field (tag 9).
    #[error("missing body length field (tag 9)")]
    MissingBodyLength,

    /// Invalid BodyLength value.
    #[error("invalid body length value")]
    InvalidBodyLength,

    /// Missing MsgType field (tag 35).
    #[error("missing msg type field (tag 35)")]
    MissingMsgType,

    /// Checksum mismatch between calculated and declared values.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum value.
        calculated: u8,
        /// Declared checksum value in message.
        declared: u8,
    },

    /// Invalid tag format (not a valid integer).
    #[error("invalid tag format: {0}")]
    InvalidTag(String),

    /// Missing required field.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Invalid field value for the expected type.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },

    /// Invalid UTF-8 in string field.
    #[error("invalid utf-8 in field: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Errors that occur during FIX message encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Missing required field during encoding.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Invalid field value for encoding.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },
}

/// Errors in FIX session layer operations.
///
/// The first group of variants mirrors the protocol fault taxonomy: each one
/// maps to a specific outbound recovery (Reject, BusinessMessageReject,
/// Logout, disconnect) applied by the session dispatch. Application callbacks
/// return the same variants to reject inbound messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The counterparty's Logon is unacceptable.
    #[error("logon rejected: {reason}")]
    RejectLogon {
        /// Reason for rejection, included in the outbound Logout.
        reason: String,
    },

    /// Syntactic field error in an otherwise-parsed message.
    #[error("incorrect data format for tag {tag}: {reason}")]
    IncorrectDataFormat {
        /// The offending tag.
        tag: u32,
        /// Description of the fault.
        reason: String,
    },

    /// Enumerated value violation.
    #[error("incorrect tag value for tag {tag}")]
    IncorrectTagValue {
        /// The offending tag.
        tag: u32,
    },

    /// Message type is not supported by the application.
    #[error("unsupported message type: {msg_type}")]
    UnsupportedMessageType {
        /// The unsupported MsgType value.
        msg_type: String,
    },

    /// BeginString does not match the session's configured version.
    #[error("unsupported version: expected {expected}, received {received}")]
    UnsupportedVersion {
        /// The session's BeginString.
        expected: String,
        /// The received BeginString.
        received: String,
    },

    /// Received sequence number is lower than expected and not a duplicate.
    #[error("MsgSeqNum too low, expecting {expected} but received {received}")]
    SequenceTooLow {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// The counterparty expects a sequence number we have not yet assigned.
    #[error(
        "tag 789 (NextExpectedMsgSeqNum) is higher than expected: expected {expected}, received {received}"
    )]
    NextExpectedTooHigh {
        /// Our next sender sequence number.
        expected: u64,
        /// The counterparty's claimed expectation.
        received: u64,
    },

    /// Message type is not valid in the current logon state.
    #[error("logon state is not valid for message (MsgType={msg_type})")]
    InvalidLogonState {
        /// The offending MsgType value.
        msg_type: String,
    },

    /// Tried to send a session-level Reject while not logged on.
    #[error("tried to send a reject while not logged on: {reason}")]
    RejectWhileNotLoggedOn {
        /// Reason of the suppressed reject.
        reason: String,
    },

    /// No session registered under the given identifier.
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// The unresolved session identifier.
        session_id: String,
    },

    /// Session configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Errors in message store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to store message.
    #[error("failed to store message seq={seq_num}: {reason}")]
    StoreFailed {
        /// Sequence number of the message.
        seq_num: u64,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to retrieve messages.
    #[error("failed to retrieve messages {begin}..{end}: {reason}")]
    RetrieveFailed {
        /// Begin sequence number of the requested range.
        begin: u64,
        /// End sequence number of the requested range.
        end: u64,
        /// Reason for failure.
        reason: String,
    },

    /// Store is corrupted.
    #[error("store corrupted: {reason}")]
    Corrupted {
        /// Description of the corruption.
        reason: String,
    },

    /// I/O error in persistent store.
    #[error("store i/o error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::SequenceTooLow {
            expected: 20,
            received: 15,
        };
        assert_eq!(
            err.to_string(),
            "MsgSeqNum too low, expecting 20 but received 15"
        );
    }

    #[test]
    fn test_fix_error_from_session() {
        let session_err = SessionError::RejectLogon {
            reason: "bad credentials".to_string(),
        };
        let fix_err: FixError = session_err.into();
        assert!(matches!(
            fix_err,
            FixError::Session(SessionError::RejectLogon { .. })
        ));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::ChecksumMismatch {
            calculated: 100,
            declared: 200,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: calculated 100, declared 200"
        );
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::RetrieveFailed {
            begin: 5,
            end: 9,
            reason: "disk gone".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to retrieve messages 5..9: disk gone"
        );
    }
}
