/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Field vocabulary for the session layer.
//!
//! This module provides:
//! - [`tags`]: the numeric tags the session engine reads and writes
//! - [`SessionRejectReason`]: session-level reject reasons (tag 373)
//! - [`BusinessRejectReason`]: business-level reject reasons (tag 380)
//! - [`EncryptMethod`]: encryption method advertised at logon (tag 98)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric field tags used by the session layer.
pub mod tags {
    /// BeginSeqNo (7).
    pub const BEGIN_SEQ_NO: u32 = 7;
    /// BeginString (8).
    pub const BEGIN_STRING: u32 = 8;
    /// BodyLength (9).
    pub const BODY_LENGTH: u32 = 9;
    /// CheckSum (10).
    pub const CHECK_SUM: u32 = 10;
    /// EndSeqNo (16).
    pub const END_SEQ_NO: u32 = 16;
    /// MsgSeqNum (34).
    pub const MSG_SEQ_NUM: u32 = 34;
    /// MsgType (35).
    pub const MSG_TYPE: u32 = 35;
    /// NewSeqNo (36).
    pub const NEW_SEQ_NO: u32 = 36;
    /// PossDupFlag (43).
    pub const POSS_DUP_FLAG: u32 = 43;
    /// RefSeqNum (45).
    pub const REF_SEQ_NUM: u32 = 45;
    /// SenderCompID (49).
    pub const SENDER_COMP_ID: u32 = 49;
    /// SenderSubID (50).
    pub const SENDER_SUB_ID: u32 = 50;
    /// SendingTime (52).
    pub const SENDING_TIME: u32 = 52;
    /// TargetCompID (56).
    pub const TARGET_COMP_ID: u32 = 56;
    /// TargetSubID (57).
    pub const TARGET_SUB_ID: u32 = 57;
    /// Text (58).
    pub const TEXT: u32 = 58;
    /// EncryptMethod (98).
    pub const ENCRYPT_METHOD: u32 = 98;
    /// HeartBtInt (108).
    pub const HEART_BT_INT: u32 = 108;
    /// TestReqID (112).
    pub const TEST_REQ_ID: u32 = 112;
    /// OrigSendingTime (122).
    pub const ORIG_SENDING_TIME: u32 = 122;
    /// GapFillFlag (123).
    pub const GAP_FILL_FLAG: u32 = 123;
    /// ResetSeqNumFlag (141).
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    /// SenderLocationID (142).
    pub const SENDER_LOCATION_ID: u32 = 142;
    /// TargetLocationID (143).
    pub const TARGET_LOCATION_ID: u32 = 143;
    /// LastMsgSeqNumProcessed (369).
    pub const LAST_MSG_SEQ_NUM_PROCESSED: u32 = 369;
    /// RefTagID (371).
    pub const REF_TAG_ID: u32 = 371;
    /// RefMsgType (372).
    pub const REF_MSG_TYPE: u32 = 372;
    /// SessionRejectReason (373).
    pub const SESSION_REJECT_REASON: u32 = 373;
    /// BusinessRejectReason (380).
    pub const BUSINESS_REJECT_REASON: u32 = 380;
    /// NextExpectedMsgSeqNum (789).
    pub const NEXT_EXPECTED_MSG_SEQ_NUM: u32 = 789;
    /// ApplVerID (1128).
    pub const APPL_VER_ID: u32 = 1128;
    /// DefaultApplVerID (1137).
    pub const DEFAULT_APPL_VER_ID: u32 = 1137;
    /// MemberName (5183), exchange extension echoed back at logon.
    pub const MEMBER_NAME: u32 = 5183;
}

/// Session-level reject reason (tag 373).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionRejectReason {
    /// Invalid tag number (0).
    InvalidTagNumber = 0,
    /// Required tag missing (1).
    RequiredTagMissing = 1,
    /// Tag not defined for this message type (2).
    TagNotDefinedForMessage = 2,
    /// Undefined tag (3).
    UndefinedTag = 3,
    /// Tag specified without a value (4).
    TagSpecifiedWithoutValue = 4,
    /// Value is incorrect (out of range) for this tag (5).
    ValueIsIncorrect = 5,
    /// Incorrect data format for value (6).
    IncorrectDataFormat = 6,
    /// Decryption problem (7).
    DecryptionProblem = 7,
    /// Signature problem (8).
    SignatureProblem = 8,
    /// CompID problem (9).
    CompIdProblem = 9,
    /// SendingTime accuracy problem (10).
    SendingTimeAccuracyProblem = 10,
    /// Invalid MsgType (11).
    InvalidMsgType = 11,
}

impl SessionRejectReason {
    /// Returns the numeric reject reason value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self as u64
    }

    /// Returns the standard descriptive text for this reason.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::InvalidTagNumber => "Invalid tag number",
            Self::RequiredTagMissing => "Required tag missing",
            Self::TagNotDefinedForMessage => "Tag not defined for this message type",
            Self::UndefinedTag => "Undefined tag",
            Self::TagSpecifiedWithoutValue => "Tag specified without a value",
            Self::ValueIsIncorrect => "Value is incorrect (out of range) for this tag",
            Self::IncorrectDataFormat => "Incorrect data format for value",
            Self::DecryptionProblem => "Decryption problem",
            Self::SignatureProblem => "Signature problem",
            Self::CompIdProblem => "CompID problem",
            Self::SendingTimeAccuracyProblem => "SendingTime accuracy problem",
            Self::InvalidMsgType => "Invalid MsgType",
        }
    }
}

impl fmt::Display for SessionRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Business-level reject reason (tag 380).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BusinessRejectReason {
    /// Other (0).
    Other = 0,
    /// Unknown ID (1).
    UnknownId = 1,
    /// Unknown security (2).
    UnknownSecurity = 2,
    /// Unsupported message type (3).
    UnsupportedMessageType = 3,
    /// Application not available (4).
    ApplicationNotAvailable = 4,
    /// Conditionally required field missing (5).
    ConditionallyRequiredFieldMissing = 5,
}

impl BusinessRejectReason {
    /// Returns the numeric reject reason value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self as u64
    }

    /// Returns the standard descriptive text for this reason.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::Other => "Other",
            Self::UnknownId => "Unknown ID",
            Self::UnknownSecurity => "Unknown security",
            Self::UnsupportedMessageType => "Unsupported Message Type",
            Self::ApplicationNotAvailable => "Application not available",
            Self::ConditionallyRequiredFieldMissing => "Conditionally required field missing",
        }
    }
}

impl fmt::Display for BusinessRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Encryption method advertised at logon (tag 98).
///
/// The session layer only ever advertises `None`; encryption negotiation is
/// delegated to the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptMethod {
    /// No encryption (0).
    #[default]
    None = 0,
}

impl EncryptMethod {
    /// Returns the numeric encrypt method value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self as u64
    }
}
