/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core types for FIX session operations.
//!
//! This module provides fundamental types used throughout the seqfix engine:
//! - [`FixVersion`]: ordered BeginString enumeration
//! - [`CompId`]: component identifier (SenderCompID, TargetCompID)
//! - [`Timestamp`]: FIX-formatted UTC timestamp
//! - [`SessionId`]: the immutable session identity tuple

use arrayvec::ArrayString;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// FIX protocol version, identified by the BeginString (tag 8).
///
/// The enum order matches the protocol version order, so `>=` comparisons
/// express version gates ("FIX.4.2 and above uses 0 as the open resend
/// bound", "SessionRejectReason exists from FIX.4.2", ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum FixVersion {
    /// FIX.4.0
    Fix40,
    /// FIX.4.1
    Fix41,
    /// FIX.4.2
    Fix42,
    /// FIX.4.3
    Fix43,
    /// FIX.4.4
    #[default]
    Fix44,
    /// FIXT.1.1 (transport dialect, application version carried separately)
    Fixt11,
}

impl FixVersion {
    /// Returns the BeginString literal for this version.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fix40 => "FIX.4.0",
            Self::Fix41 => "FIX.4.1",
            Self::Fix42 => "FIX.4.2",
            Self::Fix43 => "FIX.4.3",
            Self::Fix44 => "FIX.4.4",
            Self::Fixt11 => "FIXT.1.1",
        }
    }

    /// Returns true if this is the FIXT transport dialect.
    #[inline]
    #[must_use]
    pub const fn is_fixt(self) -> bool {
        matches!(self, Self::Fixt11)
    }
}

impl FromStr for FixVersion {
    type Err = crate::error::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIX.4.0" => Ok(Self::Fix40),
            "FIX.4.1" => Ok(Self::Fix41),
            "FIX.4.2" => Ok(Self::Fix42),
            "FIX.4.3" => Ok(Self::Fix43),
            "FIX.4.4" => Ok(Self::Fix44),
            "FIXT.1.1" => Ok(Self::Fixt11),
            _ => Err(crate::error::DecodeError::InvalidBeginString),
        }
    }
}

impl fmt::Display for FixVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Component identifier for FIX sessions.
///
/// Used for SenderCompID (tag 49), TargetCompID (tag 56), and related fields.
/// Maximum length is 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompId from a string slice.
    ///
    /// # Arguments
    /// * `s` - The component identifier string
    ///
    /// # Returns
    /// `Some(CompId)` if the string fits within the maximum length, `None` otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the CompId as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the length of the CompId in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the CompId is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

/// FIX protocol UTC timestamp.
///
/// Timestamps in FIX are formatted as `YYYYMMDD-HH:MM:SS` or, from FIX.4.2,
/// `YYYYMMDD-HH:MM:SS.sss` with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Milliseconds since Unix epoch (1970-01-01 00:00:00 UTC).
    millis_since_epoch: i64,
}

impl Timestamp {
    /// Creates a timestamp from milliseconds since Unix epoch.
    ///
    /// # Arguments
    /// * `millis` - Milliseconds since 1970-01-01 00:00:00 UTC
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            millis_since_epoch: millis,
        }
    }

    /// Returns the current UTC timestamp.
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        Self {
            millis_since_epoch: Utc::now().timestamp_millis(),
        }
    }

    /// Returns milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.millis_since_epoch
    }

    /// Converts to a chrono `DateTime<Utc>`.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis_since_epoch).unwrap_or_default()
    }

    /// Formats the timestamp in FIX format with millisecond precision.
    ///
    /// Format: `YYYYMMDD-HH:MM:SS.sss`
    #[must_use]
    pub fn format_millis(self) -> ArrayString<21> {
        let dt = self.to_datetime();
        let mut buf = ArrayString::new();
        let _ = std::fmt::write(
            &mut buf,
            format_args!("{}", dt.format("%Y%m%d-%H:%M:%S%.3f")),
        );
        buf
    }

    /// Formats the timestamp in FIX format with second precision.
    ///
    /// Format: `YYYYMMDD-HH:MM:SS`
    #[must_use]
    pub fn format_seconds(self) -> ArrayString<17> {
        let dt = self.to_datetime();
        let mut buf = ArrayString::new();
        let _ = std::fmt::write(&mut buf, format_args!("{}", dt.format("%Y%m%d-%H:%M:%S")));
        buf
    }

    /// Parses a FIX timestamp, with or without a fractional-second part.
    ///
    /// # Arguments
    /// * `s` - The timestamp string, e.g. `20260127-09:30:00.123`
    ///
    /// # Returns
    /// `Some(Timestamp)` if the string is a valid FIX UTC timestamp.
    #[must_use]
    pub fn parse_fix(s: &str) -> Option<Self> {
        let dt = NaiveDateTime::parse_from_str(s, "%Y%m%d-%H:%M:%S%.f").ok()?;
        Some(Self {
            millis_since_epoch: dt.and_utc().timestamp_millis(),
        })
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            millis_since_epoch: dt.timestamp_millis(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_millis())
    }
}

/// Immutable session identity tuple.
///
/// A session is identified by (BeginString, SenderCompID, TargetCompID) plus
/// optional sub/location components and an optional qualifier used to
/// distinguish otherwise-identical sessions. Equality over the full tuple
/// defines the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// BeginString (FIX version).
    pub begin_string: FixVersion,
    /// SenderCompID (tag 49).
    pub sender_comp_id: CompId,
    /// TargetCompID (tag 56).
    pub target_comp_id: CompId,
    /// Optional SenderSubID (tag 50).
    pub sender_sub_id: Option<String>,
    /// Optional SenderLocationID (tag 142).
    pub sender_location_id: Option<String>,
    /// Optional TargetSubID (tag 57).
    pub target_sub_id: Option<String>,
    /// Optional TargetLocationID (tag 143).
    pub target_location_id: Option<String>,
    /// Optional session qualifier.
    pub qualifier: Option<String>,
}

impl SessionId {
    /// Creates a new session ID from the mandatory components.
    ///
    /// # Arguments
    /// * `begin_string` - The FIX version
    /// * `sender_comp_id` - The sender CompID
    /// * `target_comp_id` - The target CompID
    #[must_use]
    pub const fn new(
        begin_string: FixVersion,
        sender_comp_id: CompId,
        target_comp_id: CompId,
    ) -> Self {
        Self {
            begin_string,
            sender_comp_id,
            target_comp_id,
            sender_sub_id: None,
            sender_location_id: None,
            target_sub_id: None,
            target_location_id: None,
            qualifier: None,
        }
    }

    /// Sets the sender sub ID.
    #[must_use]
    pub fn with_sender_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.sender_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the target sub ID.
    #[must_use]
    pub fn with_target_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.target_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the sender location ID.
    #[must_use]
    pub fn with_sender_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.sender_location_id = Some(location_id.into());
        self
    }

    /// Sets the target location ID.
    #[must_use]
    pub fn with_target_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.target_location_id = Some(location_id.into());
        self
    }

    /// Sets the session qualifier.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Returns true if this session uses the FIXT transport dialect.
    #[inline]
    #[must_use]
    pub const fn is_fixt(&self) -> bool {
        self.begin_string.is_fixt()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, ":{qualifier}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_version_ordering() {
        assert!(FixVersion::Fix42 >= FixVersion::Fix42);
        assert!(FixVersion::Fix44 > FixVersion::Fix41);
        assert!(FixVersion::Fix41 < FixVersion::Fix42);
        assert!(FixVersion::Fixt11 > FixVersion::Fix44);
    }

    #[test]
    fn test_fix_version_round_trip() {
        for v in [
            FixVersion::Fix40,
            FixVersion::Fix42,
            FixVersion::Fix44,
            FixVersion::Fixt11,
        ] {
            assert_eq!(v.as_str().parse::<FixVersion>().unwrap(), v);
        }
        assert!("FIX.9.9".parse::<FixVersion>().is_err());
    }

    #[test]
    fn test_comp_id() {
        let id = CompId::new("SENDER").unwrap();
        assert_eq!(id.as_str(), "SENDER");
        assert_eq!(id.len(), 6);
        assert!(!id.is_empty());
    }

    #[test]
    fn test_comp_id_too_long() {
        let long_str = "A".repeat(COMP_ID_MAX_LEN + 1);
        assert!(CompId::new(&long_str).is_none());
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Timestamp::from_millis(0);
        assert_eq!(&ts.format_millis()[..], "19700101-00:00:00.000");
        assert_eq!(&ts.format_seconds()[..], "19700101-00:00:00");
    }

    #[test]
    fn test_timestamp_parse_round_trip() {
        let ts = Timestamp::from_millis(1_700_000_000_123);
        let parsed = Timestamp::parse_fix(&ts.format_millis()).unwrap();
        assert_eq!(parsed, ts);

        let seconds_only = Timestamp::parse_fix("20260127-09:30:00").unwrap();
        assert_eq!(&seconds_only.format_seconds()[..], "20260127-09:30:00");
    }

    #[test]
    fn test_timestamp_parse_invalid() {
        assert!(Timestamp::parse_fix("not a timestamp").is_none());
        assert!(Timestamp::parse_fix("2026-01-27 09:30:00").is_none());
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new(
            FixVersion::Fix44,
            CompId::new("SENDER").unwrap(),
            CompId::new("TARGET").unwrap(),
        );
        assert_eq!(id.to_string(), "FIX.4.4:SENDER->TARGET");

        let qualified = id.clone().with_qualifier("backup");
        assert_eq!(qualified.to_string(), "FIX.4.4:SENDER->TARGET:backup");
        assert_ne!(id, qualified);
    }

    #[test]
    fn test_session_id_equality_includes_sub_ids() {
        let base = SessionId::new(
            FixVersion::Fix44,
            CompId::new("A").unwrap(),
            CompId::new("B").unwrap(),
        );
        let with_sub = base.clone().with_sender_sub_id("TRADER1");
        assert_ne!(base, with_sub);
    }
}
