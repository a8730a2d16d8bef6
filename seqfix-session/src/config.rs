/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! All behavior switches of the session engine live here, one field per
//! configuration key. Fields are public; the `with_*` methods exist for
//! fluent construction of the commonly-changed ones.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

/// Default maximum accepted SendingTime divergence, in seconds.
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_secs(120);

/// Default fraction of the heartbeat interval after which a quiet peer
/// triggers a test request.
pub const DEFAULT_TEST_REQUEST_DELAY_MULTIPLIER: f64 = 0.5;

/// Configuration for a FIX session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether this side initiates the logon handshake.
    pub initiator: bool,
    /// Heartbeat interval (HeartBtInt). Zero disables liveness.
    pub heart_bt_int: Duration,
    /// Whether to check SendingTime accuracy (CheckLatency).
    pub check_latency: bool,
    /// Maximum accepted SendingTime divergence (MaxLatency).
    pub max_latency: Duration,
    /// Whether inbound CompIDs must mirror the session identity (CheckCompID).
    pub check_comp_id: bool,
    /// Fraction of the heartbeat interval after which a quiet peer triggers
    /// a test request (TestRequestDelayMultiplier), in (0, 1].
    pub test_request_delay_multiplier: f64,
    /// Reset sequence numbers when initiating a logon (ResetOnLogon).
    pub reset_on_logon: bool,
    /// Reset sequence numbers on logout (ResetOnLogout).
    pub reset_on_logout: bool,
    /// Reset sequence numbers on disconnect (ResetOnDisconnect).
    pub reset_on_disconnect: bool,
    /// Reset the session when an application-path error occurs (ResetOnError).
    pub reset_on_error: bool,
    /// Disconnect when an application-path error occurs (DisconnectOnError).
    pub disconnect_on_error: bool,
    /// Refresh state from the message store on logon (RefreshOnLogon).
    pub refresh_on_logon: bool,
    /// Persist outgoing messages (PersistMessages). When off, every resend
    /// request is answered with a gap fill.
    pub persist_messages: bool,
    /// Allow re-requesting ranges already covered by a pending resend
    /// (SendRedundantResendRequests).
    pub send_redundant_resend_requests: bool,
    /// Use the literal end of the gap instead of the open-range sentinel in
    /// resend requests (ClosedResendInterval).
    pub closed_resend_interval: bool,
    /// Include milliseconds in SendingTime from FIX.4.2
    /// (MillisecondsInTimeStamp).
    pub milliseconds_in_timestamp: bool,
    /// Check inbound sequence numbers (ValidateSequenceNumbers).
    pub validate_sequence_numbers: bool,
    /// Validate inbound messages at all (ValidateIncomingMessage).
    pub validate_incoming_message: bool,
    /// Reject instead of warn on recoverable message faults
    /// (RejectInvalidMessage).
    pub reject_invalid_message: bool,
    /// Answer resend requests with synthesized heartbeats when the store is
    /// unreadable (ForceResendWhenCorruptedStore).
    pub force_resend_when_corrupted_store: bool,
    /// Tolerate unknown fields in inbound messages (AllowUnknownMsgFields).
    pub allow_unknown_msg_fields: bool,
    /// Log instead of disconnect on heartbeat timeout
    /// (DisableHeartBeatCheck).
    pub disable_heart_beat_check: bool,
    /// Stamp tag 369 on outgoing messages (EnableLastMsgSeqNumProcessed).
    pub enable_last_msg_seq_num_processed: bool,
    /// Exchange tag 789 at logon (EnableNextExpectedMsgSeqNum).
    pub enable_next_expected_msg_seq_num: bool,
    /// How long to wait for a logon response (LogonTimeout).
    pub logon_timeout: Duration,
    /// How long to wait for a logout response (LogoutTimeout).
    pub logout_timeout: Duration,
    /// Cap on a single resend request's span (ResendRequestChunkSize).
    /// Zero means unlimited.
    pub resend_request_chunk_size: u64,
    /// Accepted peer addresses (AllowedRemoteAddresses). Empty accepts all.
    pub allowed_remote_addresses: HashSet<IpAddr>,
    /// Logon retry backoff table in seconds (LogonIntervals).
    pub logon_intervals: Vec<u64>,
    /// DefaultApplVerID advertised at logon for FIXT sessions.
    pub default_appl_ver_id: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initiator: false,
            heart_bt_int: Duration::from_secs(30),
            check_latency: true,
            max_latency: DEFAULT_MAX_LATENCY,
            check_comp_id: true,
            test_request_delay_multiplier: DEFAULT_TEST_REQUEST_DELAY_MULTIPLIER,
            reset_on_logon: false,
            reset_on_logout: false,
            reset_on_disconnect: false,
            reset_on_error: false,
            disconnect_on_error: false,
            refresh_on_logon: false,
            persist_messages: true,
            send_redundant_resend_requests: false,
            closed_resend_interval: false,
            milliseconds_in_timestamp: true,
            validate_sequence_numbers: true,
            validate_incoming_message: true,
            reject_invalid_message: false,
            force_resend_when_corrupted_store: false,
            allow_unknown_msg_fields: false,
            disable_heart_beat_check: false,
            enable_last_msg_seq_num_processed: false,
            enable_next_expected_msg_seq_num: false,
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(2),
            resend_request_chunk_size: 0,
            allowed_remote_addresses: HashSet::new(),
            logon_intervals: vec![5],
            default_appl_ver_id: None,
        }
    }
}

impl SessionConfig {
    /// Creates an acceptor configuration with default settings.
    #[must_use]
    pub fn acceptor() -> Self {
        Self::default()
    }

    /// Creates an initiator configuration with default settings.
    #[must_use]
    pub fn initiator() -> Self {
        Self {
            initiator: true,
            ..Self::default()
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub const fn with_heart_bt_int(mut self, interval: Duration) -> Self {
        self.heart_bt_int = interval;
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets whether to reset sequence numbers on logout.
    #[must_use]
    pub const fn with_reset_on_logout(mut self, reset: bool) -> Self {
        self.reset_on_logout = reset;
        self
    }

    /// Sets the SendingTime latency check.
    #[must_use]
    pub const fn with_check_latency(mut self, check: bool, max_latency: Duration) -> Self {
        self.check_latency = check;
        self.max_latency = max_latency;
        self
    }

    /// Sets whether outgoing messages are persisted.
    #[must_use]
    pub const fn with_persist_messages(mut self, persist: bool) -> Self {
        self.persist_messages = persist;
        self
    }

    /// Sets the resend request chunk size. Zero means unlimited.
    #[must_use]
    pub const fn with_resend_request_chunk_size(mut self, chunk: u64) -> Self {
        self.resend_request_chunk_size = chunk;
        self
    }

    /// Sets the logon and logout timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, logon: Duration, logout: Duration) -> Self {
        self.logon_timeout = logon;
        self.logout_timeout = logout;
        self
    }

    /// Sets the logon retry backoff table, in seconds.
    #[must_use]
    pub fn with_logon_intervals(mut self, intervals: Vec<u64>) -> Self {
        self.logon_intervals = intervals;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(!config.initiator);
        assert_eq!(config.heart_bt_int, Duration::from_secs(30));
        assert!(config.check_latency);
        assert_eq!(config.max_latency, Duration::from_secs(120));
        assert!(config.persist_messages);
        assert!(config.validate_sequence_numbers);
        assert_eq!(config.test_request_delay_multiplier, 0.5);
        assert_eq!(config.resend_request_chunk_size, 0);
        assert_eq!(config.logon_intervals, vec![5]);
        assert!(config.allowed_remote_addresses.is_empty());
    }

    #[test]
    fn test_builder_style() {
        let config = SessionConfig::initiator()
            .with_heart_bt_int(Duration::from_secs(5))
            .with_reset_on_logon(true)
            .with_resend_request_chunk_size(100);

        assert!(config.initiator);
        assert_eq!(config.heart_bt_int, Duration::from_secs(5));
        assert!(config.reset_on_logon);
        assert_eq!(config.resend_request_chunk_size, 100);
    }
}
