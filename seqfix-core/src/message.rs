/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message types for the FIX session layer.
//!
//! This module provides:
//! - [`MsgType`]: enumeration of FIX message types
//! - [`FieldMap`]: ordered tag → value mapping with typed accessors
//! - [`Message`]: a logical FIX message with addressable header and body
//!
//! The session engine stamps headers, persists rendered bytes and re-parses
//! stored messages on resend, so [`Message`] is a mutable field map rather
//! than a zero-copy view. [`Message::encode`] produces the standard
//! `8=...|9=...|35=...|...|10=...` tag=value framing and [`Message::parse`]
//! validates it.

use crate::checksum::{calculate_checksum, format_checksum, parse_checksum};
use crate::error::{DecodeError, EncodeError};
use crate::fields::tags;
use crate::types::Timestamp;
use bytes::{BufMut, BytesMut};
use memchr::memchr_iter;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// Header tags recognized when routing parsed fields.
const HEADER_TAGS: &[u32] = &[
    tags::BEGIN_STRING,
    tags::BODY_LENGTH,
    tags::MSG_SEQ_NUM,
    tags::MSG_TYPE,
    tags::POSS_DUP_FLAG,
    tags::SENDER_COMP_ID,
    tags::SENDER_SUB_ID,
    tags::SENDING_TIME,
    tags::TARGET_COMP_ID,
    tags::TARGET_SUB_ID,
    tags::ORIG_SENDING_TIME,
    tags::SENDER_LOCATION_ID,
    tags::TARGET_LOCATION_ID,
    tags::LAST_MSG_SEQ_NUM_PROCESSED,
    tags::APPL_VER_ID,
];

/// FIX message types handled by the session layer.
///
/// The administrative set is complete; application message types beyond the
/// common ones are represented as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MsgType {
    /// Heartbeat (0) - session level.
    #[default]
    Heartbeat,
    /// Test Request (1) - session level.
    TestRequest,
    /// Resend Request (2) - session level.
    ResendRequest,
    /// Reject (3) - session level.
    Reject,
    /// Sequence Reset (4) - session level.
    SequenceReset,
    /// Logout (5) - session level.
    Logout,
    /// Logon (A) - session level.
    Logon,
    /// Execution Report (8).
    ExecutionReport,
    /// News (B).
    News,
    /// New Order Single (D).
    NewOrderSingle,
    /// Order Cancel Request (F).
    OrderCancelRequest,
    /// Business Message Reject (j).
    BusinessMessageReject,
    /// Any other message type.
    Custom(String),
}

impl FromStr for MsgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "A" => Self::Logon,
            "8" => Self::ExecutionReport,
            "B" => Self::News,
            "D" => Self::NewOrderSingle,
            "F" => Self::OrderCancelRequest,
            "j" => Self::BusinessMessageReject,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire representation of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::Logon => "A",
            Self::ExecutionReport => "8",
            Self::News => "B",
            Self::NewOrderSingle => "D",
            Self::OrderCancelRequest => "F",
            Self::BusinessMessageReject => "j",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns true if this is an administrative message.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::TestRequest
                | Self::ResendRequest
                | Self::Reject
                | Self::SequenceReset
                | Self::Logout
                | Self::Logon
        )
    }

    /// Returns true if this is an application message.
    #[must_use]
    pub fn is_app(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered tag → value mapping with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: BTreeMap<u32, String>,
}

impl FieldMap {
    /// Creates an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the field value as a string slice.
    #[inline]
    #[must_use]
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.fields.get(&tag).map(String::as_str)
    }

    /// Returns the field value parsed as an unsigned integer.
    #[must_use]
    pub fn get_u64(&self, tag: u32) -> Option<u64> {
        self.get_str(tag)?.parse().ok()
    }

    /// Returns the field value parsed as a signed integer.
    #[must_use]
    pub fn get_i64(&self, tag: u32) -> Option<i64> {
        self.get_str(tag)?.parse().ok()
    }

    /// Returns the field value parsed as a FIX boolean (Y/N).
    #[must_use]
    pub fn get_bool(&self, tag: u32) -> Option<bool> {
        match self.get_str(tag)? {
            "Y" => Some(true),
            "N" => Some(false),
            _ => None,
        }
    }

    /// Returns the field value parsed as a FIX UTC timestamp.
    #[must_use]
    pub fn get_timestamp(&self, tag: u32) -> Option<Timestamp> {
        Timestamp::parse_fix(self.get_str(tag)?)
    }

    /// Sets a string field.
    pub fn set_str(&mut self, tag: u32, value: impl Into<String>) {
        self.fields.insert(tag, value.into());
    }

    /// Sets an unsigned integer field.
    pub fn set_u64(&mut self, tag: u32, value: u64) {
        let mut buf = itoa::Buffer::new();
        self.fields.insert(tag, buf.format(value).to_string());
    }

    /// Sets a signed integer field.
    pub fn set_i64(&mut self, tag: u32, value: i64) {
        let mut buf = itoa::Buffer::new();
        self.fields.insert(tag, buf.format(value).to_string());
    }

    /// Sets a FIX boolean field (Y/N).
    pub fn set_bool(&mut self, tag: u32, value: bool) {
        self.fields
            .insert(tag, if value { "Y" } else { "N" }.to_string());
    }

    /// Sets a FIX UTC timestamp field.
    ///
    /// # Arguments
    /// * `tag` - The field tag number
    /// * `value` - The timestamp value
    /// * `millis` - Whether to include the millisecond part
    pub fn set_timestamp(&mut self, tag: u32, value: Timestamp, millis: bool) {
        let rendered = if millis {
            value.format_millis().to_string()
        } else {
            value.format_seconds().to_string()
        };
        self.fields.insert(tag, rendered);
    }

    /// Removes a field, returning its previous value if present.
    pub fn remove(&mut self, tag: u32) -> Option<String> {
        self.fields.remove(&tag)
    }

    /// Returns true if the field is present.
    #[inline]
    #[must_use]
    pub fn is_set(&self, tag: u32) -> bool {
        self.fields.contains_key(&tag)
    }

    /// Returns the number of fields.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the map has no fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.fields.iter().map(|(tag, value)| (*tag, value.as_str()))
    }
}

/// A logical FIX message with an addressable header and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Standard header fields (BeginString, MsgSeqNum, CompIDs, ...).
    pub header: FieldMap,
    /// Body fields.
    pub body: FieldMap,
}

impl Message {
    /// Creates a new message of the given type.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        let mut header = FieldMap::new();
        header.set_str(tags::MSG_TYPE, msg_type.as_str());
        Self {
            header,
            body: FieldMap::new(),
        }
    }

    /// Returns the message type, if the MsgType field is set.
    #[must_use]
    pub fn msg_type(&self) -> Option<MsgType> {
        self.header
            .get_str(tags::MSG_TYPE)
            .map(|s| s.parse().expect("MsgType parse is infallible"))
    }

    /// Returns true if this is an administrative message.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.msg_type().is_some_and(|t| t.is_admin())
    }

    /// Returns true if PossDupFlag (43) is set to Y.
    #[must_use]
    pub fn is_poss_dup(&self) -> bool {
        self.header.get_bool(tags::POSS_DUP_FLAG).unwrap_or(false)
    }

    /// Encodes the message to tag=value wire format.
    ///
    /// BodyLength (9) and CheckSum (10) are computed; the header must carry
    /// BeginString (8) and MsgType (35).
    ///
    /// # Errors
    /// Returns `EncodeError::MissingRequiredField` if BeginString or MsgType
    /// is absent.
    pub fn encode(&self) -> Result<BytesMut, EncodeError> {
        let begin_string =
            self.header
                .get_str(tags::BEGIN_STRING)
                .ok_or(EncodeError::MissingRequiredField {
                    tag: tags::BEGIN_STRING,
                })?;
        let msg_type = self
            .header
            .get_str(tags::MSG_TYPE)
            .ok_or(EncodeError::MissingRequiredField {
                tag: tags::MSG_TYPE,
            })?;

        let mut body = BytesMut::with_capacity(256);
        put_field(&mut body, tags::MSG_TYPE, msg_type);
        for (tag, value) in self.header.iter() {
            if matches!(
                tag,
                tags::BEGIN_STRING | tags::BODY_LENGTH | tags::CHECK_SUM | tags::MSG_TYPE
            ) {
                continue;
            }
            put_field(&mut body, tag, value);
        }
        for (tag, value) in self.body.iter() {
            if tag == tags::CHECK_SUM {
                continue;
            }
            put_field(&mut body, tag, value);
        }

        let mut message = BytesMut::with_capacity(body.len() + begin_string.len() + 24);
        message.put_slice(b"8=");
        message.put_slice(begin_string.as_bytes());
        message.put_u8(SOH);
        message.put_slice(b"9=");
        let mut len_buf = itoa::Buffer::new();
        message.put_slice(len_buf.format(body.len()).as_bytes());
        message.put_u8(SOH);
        message.put_slice(&body);

        let checksum = calculate_checksum(&message);
        message.put_slice(b"10=");
        message.put_slice(&format_checksum(checksum));
        message.put_u8(SOH);

        Ok(message)
    }

    /// Parses a complete tag=value message, validating the framing.
    ///
    /// # Arguments
    /// * `data` - One complete message, from `8=` through the checksum SOH
    ///
    /// # Errors
    /// Returns `DecodeError` when the framing is malformed, the declared
    /// BodyLength or CheckSum does not match, or MsgType is absent.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 2 || &data[0..2] != b"8=" {
            return Err(DecodeError::InvalidBeginString);
        }
        if data.last() != Some(&SOH) {
            return Err(DecodeError::Incomplete);
        }

        let mut raw_fields: SmallVec<[(u32, &str); 32]> = SmallVec::new();
        let mut start = 0;
        for soh in memchr_iter(SOH, data) {
            let field = &data[start..soh];
            start = soh + 1;
            let eq = memchr::memchr(b'=', field).ok_or_else(|| {
                DecodeError::InvalidTag(String::from_utf8_lossy(field).into_owned())
            })?;
            let tag: u32 = std::str::from_utf8(&field[..eq])?
                .parse()
                .map_err(|_| DecodeError::InvalidTag(String::from_utf8_lossy(field).into_owned()))?;
            let value = std::str::from_utf8(&field[eq + 1..])?;
            raw_fields.push((tag, value));
        }

        if raw_fields.len() < 3 {
            return Err(DecodeError::Incomplete);
        }
        if raw_fields[1].0 != tags::BODY_LENGTH {
            return Err(DecodeError::MissingBodyLength);
        }
        let declared_len: usize = raw_fields[1]
            .1
            .parse()
            .map_err(|_| DecodeError::InvalidBodyLength)?;

        let (last_tag, last_value) = raw_fields[raw_fields.len() - 1];
        if last_tag != tags::CHECK_SUM {
            return Err(DecodeError::Incomplete);
        }

        // The checksum field is "10=XXX" + SOH, 7 bytes.
        let checksum_start = data.len() - 7;
        let header_len = 2 + raw_fields[0].1.len() + 1 + 2 + raw_fields[1].1.len() + 1;
        if header_len + declared_len + 7 != data.len() {
            return Err(DecodeError::InvalidBodyLength);
        }

        let declared_checksum =
            parse_checksum(last_value.as_bytes()).ok_or(DecodeError::InvalidBodyLength)?;
        let calculated = calculate_checksum(&data[..checksum_start]);
        if calculated != declared_checksum {
            return Err(DecodeError::ChecksumMismatch {
                calculated,
                declared: declared_checksum,
            });
        }

        let mut message = Message::default();
        for &(tag, value) in &raw_fields {
            if matches!(tag, tags::BODY_LENGTH | tags::CHECK_SUM) {
                continue;
            }
            if HEADER_TAGS.contains(&tag) {
                message.header.set_str(tag, value);
            } else {
                message.body.set_str(tag, value);
            }
        }

        if !message.header.is_set(tags::MSG_TYPE) {
            return Err(DecodeError::MissingMsgType);
        }

        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(bytes) => {
                for &b in bytes.iter() {
                    if b == SOH {
                        f.write_str("|")?;
                    } else {
                        write!(f, "{}", b as char)?;
                    }
                }
                Ok(())
            }
            Err(_) => f.write_str("<unencodable message>"),
        }
    }
}

#[inline]
fn put_field(buf: &mut BytesMut, tag: u32, value: &str) {
    let mut tag_buf = itoa::Buffer::new();
    buf.put_slice(tag_buf.format(tag).as_bytes());
    buf.put_u8(b'=');
    buf.put_slice(value.as_bytes());
    buf.put_u8(SOH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FixVersion;

    fn sample_logon() -> Message {
        let mut msg = Message::new(MsgType::Logon);
        msg.header
            .set_str(tags::BEGIN_STRING, FixVersion::Fix44.as_str());
        msg.header.set_str(tags::SENDER_COMP_ID, "CLIENT");
        msg.header.set_str(tags::TARGET_COMP_ID, "SERVER");
        msg.header.set_u64(tags::MSG_SEQ_NUM, 1);
        msg.header
            .set_timestamp(tags::SENDING_TIME, Timestamp::from_millis(0), true);
        msg.body.set_u64(tags::ENCRYPT_METHOD, 0);
        msg.body.set_u64(tags::HEART_BT_INT, 30);
        msg
    }

    #[test]
    fn test_msg_type_classification() {
        assert!(MsgType::Logon.is_admin());
        assert!(MsgType::SequenceReset.is_admin());
        assert!(!MsgType::NewOrderSingle.is_admin());
        assert!(MsgType::Custom("AE".to_string()).is_app());
    }

    #[test]
    fn test_msg_type_round_trip() {
        for t in ["0", "1", "2", "3", "4", "5", "A", "j", "D"] {
            let parsed: MsgType = t.parse().unwrap();
            assert_eq!(parsed.as_str(), t);
        }
    }

    #[test]
    fn test_field_map_typed_access() {
        let mut map = FieldMap::new();
        map.set_u64(34, 42);
        map.set_bool(43, true);
        map.set_str(58, "hello");

        assert_eq!(map.get_u64(34), Some(42));
        assert_eq!(map.get_bool(43), Some(true));
        assert_eq!(map.get_str(58), Some("hello"));
        assert_eq!(map.get_u64(99), None);

        assert_eq!(map.remove(58), Some("hello".to_string()));
        assert!(!map.is_set(58));
    }

    #[test]
    fn test_encode_parse_round_trip() {
        let msg = sample_logon();
        let bytes = msg.encode().unwrap();
        let parsed = Message::parse(&bytes).unwrap();

        assert_eq!(parsed.msg_type(), Some(MsgType::Logon));
        assert_eq!(parsed.header.get_str(tags::SENDER_COMP_ID), Some("CLIENT"));
        assert_eq!(parsed.header.get_u64(tags::MSG_SEQ_NUM), Some(1));
        assert_eq!(parsed.body.get_u64(tags::HEART_BT_INT), Some(30));
    }

    #[test]
    fn test_encode_orders_msg_type_first() {
        let bytes = sample_logon().encode().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let after_length = text.split('\x01').nth(2).unwrap();
        assert_eq!(after_length, "35=A");
    }

    #[test]
    fn test_encode_missing_begin_string() {
        let msg = Message::new(MsgType::Heartbeat);
        assert!(matches!(
            msg.encode(),
            Err(EncodeError::MissingRequiredField { tag: 8 })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let mut bytes = sample_logon().encode().unwrap().to_vec();
        // Corrupt the trailing checksum digit.
        let n = bytes.len();
        bytes[n - 2] = if bytes[n - 2] == b'9' { b'8' } else { b'9' };
        assert!(matches!(
            Message::parse(&bytes),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_begin_string() {
        assert!(matches!(
            Message::parse(b"9=FIX.4.4\x01"),
            Err(DecodeError::InvalidBeginString)
        ));
    }

    #[test]
    fn test_parse_rejects_truncated() {
        let bytes = sample_logon().encode().unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(Message::parse(truncated).is_err());
    }

    #[test]
    fn test_poss_dup_flag() {
        let mut msg = sample_logon();
        assert!(!msg.is_poss_dup());
        msg.header.set_bool(tags::POSS_DUP_FLAG, true);
        assert!(msg.is_poss_dup());
    }

    #[test]
    fn test_display_uses_pipe_separators() {
        let rendered = sample_logon().to_string();
        assert!(rendered.starts_with("8=FIX.4.4|"));
        assert!(rendered.contains("|35=A|"));
    }
}
