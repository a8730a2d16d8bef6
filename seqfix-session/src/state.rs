/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Mutable per-session state.
//!
//! [`SessionState`] is the single record guarded by the session mutex: logon
//! and logout flags, liveness timing marks, the out-of-order inbound queue
//! and the pending resend range. Sequence counters are NOT mirrored here;
//! every read and write delegates to the owned [`MessageStore`], which is the
//! authority across restarts.

use seqfix_core::error::StoreError;
use seqfix_core::message::Message;
use seqfix_store::MessageStore;
use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

/// Heartbeat multiple after which a silent peer is considered dead.
const HEARTBEAT_TIMEOUT_FACTOR: f64 = 2.4;

/// Pending resend range `(begin, end, chunk_end)`; `(0, 0, 0)` means none.
pub type ResendRange = (u64, u64, u64);

/// The mutable state of one FIX session.
pub struct SessionState {
    store: Box<dyn MessageStore>,
    initiator: bool,

    pub(crate) logon_sent: bool,
    pub(crate) logon_received: bool,
    pub(crate) logout_sent: bool,
    pub(crate) logout_received: bool,
    pub(crate) reset_sent: bool,
    pub(crate) reset_received: bool,
    pub(crate) logout_reason: Option<String>,

    pub(crate) test_request_counter: u64,
    pub(crate) last_sent_time: Instant,
    pub(crate) last_received_time: Instant,
    pub(crate) heart_beat_interval: Duration,
    pub(crate) test_request_delay_multiplier: f64,
    pub(crate) logon_timeout: Duration,
    pub(crate) logout_timeout: Duration,

    pub(crate) logon_attempts: u32,
    pub(crate) last_session_logon: Option<Instant>,

    resend_range: ResendRange,
    queue: BTreeMap<u64, Message>,
}

impl SessionState {
    /// Creates session state owning the given store.
    ///
    /// # Arguments
    /// * `store` - The authoritative message store
    /// * `initiator` - Whether this side initiates the logon handshake
    /// * `heart_beat_interval` - Negotiated heartbeat interval
    /// * `test_request_delay_multiplier` - Test request trigger fraction
    /// * `logon_timeout` - Logon response timeout
    /// * `logout_timeout` - Logout response timeout
    #[must_use]
    pub fn new(
        store: Box<dyn MessageStore>,
        initiator: bool,
        heart_beat_interval: Duration,
        test_request_delay_multiplier: f64,
        logon_timeout: Duration,
        logout_timeout: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            store,
            initiator,
            logon_sent: false,
            logon_received: false,
            logout_sent: false,
            logout_received: false,
            reset_sent: false,
            reset_received: false,
            logout_reason: None,
            test_request_counter: 0,
            last_sent_time: now,
            last_received_time: now,
            heart_beat_interval,
            test_request_delay_multiplier,
            logon_timeout,
            logout_timeout,
            logon_attempts: 0,
            last_session_logon: None,
            resend_range: (0, 0, 0),
            queue: BTreeMap::new(),
        }
    }

    /// Returns true if this side initiates the logon handshake.
    #[inline]
    #[must_use]
    pub const fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// Returns true if an initiator still needs to send its Logon.
    #[must_use]
    pub const fn is_logon_send_needed(&self) -> bool {
        self.initiator && !self.logon_sent
    }

    /// Returns true if an initiator has sent its Logon.
    #[must_use]
    pub const fn is_logon_already_sent(&self) -> bool {
        self.initiator && self.logon_sent
    }

    /// Returns true if a sent Logon has gone unanswered past the timeout.
    #[must_use]
    pub fn is_logon_timed_out(&self) -> bool {
        self.logon_sent && self.last_received_time.elapsed() >= self.logon_timeout
    }

    /// Returns true if a sent Logout has gone unanswered past the timeout.
    #[must_use]
    pub fn is_logout_timed_out(&self) -> bool {
        self.logout_sent && self.last_sent_time.elapsed() >= self.logout_timeout
    }

    /// Returns true if traffic flowed recently enough in both directions
    /// that no liveness action is needed.
    #[must_use]
    pub fn is_within_heart_beat(&self) -> bool {
        self.last_sent_time.elapsed() < self.heart_beat_interval
            && self.last_received_time.elapsed() < self.heart_beat_interval
    }

    /// Returns true if the peer has been silent past the hard timeout
    /// (2.4 heartbeat intervals).
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.last_received_time.elapsed()
            >= self.heart_beat_interval.mul_f64(HEARTBEAT_TIMEOUT_FACTOR)
    }

    /// Returns true if the peer has been silent long enough to escalate
    /// with a test request. Each unanswered test request pushes the next
    /// trigger further out.
    #[must_use]
    pub fn is_test_request_needed(&self) -> bool {
        let factor = 1.0 + self.test_request_delay_multiplier * (self.test_request_counter + 1) as f64;
        self.last_received_time.elapsed() >= self.heart_beat_interval.mul_f64(factor)
    }

    /// Returns true if we have been quiet long enough to owe a heartbeat.
    #[must_use]
    pub fn is_heart_beat_needed(&self) -> bool {
        self.last_sent_time.elapsed() >= self.heart_beat_interval
    }

    /// Returns true if a resend range is pending.
    #[must_use]
    pub fn is_resend_requested(&self) -> bool {
        self.resend_range != (0, 0, 0)
    }

    /// Returns the pending resend range.
    #[inline]
    #[must_use]
    pub const fn resend_range(&self) -> ResendRange {
        self.resend_range
    }

    /// Records (or clears, with all-zero arguments) the pending resend range.
    pub fn set_resend_range(&mut self, begin: u64, end: u64, chunk_end: u64) {
        self.resend_range = (begin, end, chunk_end);
    }

    /// Queues an out-of-order message under its sequence number.
    pub fn enqueue(&mut self, seq: u64, message: Message) {
        self.queue.insert(seq, message);
    }

    /// Removes and returns the queued message with the given sequence number.
    pub fn dequeue(&mut self, seq: u64) -> Option<Message> {
        self.queue.remove(&seq)
    }

    /// Discards all queued messages.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Returns the number of queued out-of-order messages.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Returns the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be read.
    pub fn next_sender_msg_seq_num(&self) -> Result<u64, StoreError> {
        self.store.next_sender_msg_seq_num()
    }

    /// Returns the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be read.
    pub fn next_target_msg_seq_num(&self) -> Result<u64, StoreError> {
        self.store.next_target_msg_seq_num()
    }

    /// Sets the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be written.
    pub fn set_next_sender_msg_seq_num(&mut self, seq: u64) -> Result<(), StoreError> {
        self.store.set_next_sender_msg_seq_num(seq)
    }

    /// Sets the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be written.
    pub fn set_next_target_msg_seq_num(&mut self, seq: u64) -> Result<(), StoreError> {
        self.store.set_next_target_msg_seq_num(seq)
    }

    /// Advances the outgoing sequence counter.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be written.
    pub fn incr_next_sender_msg_seq_num(&mut self) -> Result<(), StoreError> {
        self.store.incr_next_sender_msg_seq_num()
    }

    /// Advances the expected incoming sequence counter.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be written.
    pub fn incr_next_target_msg_seq_num(&mut self) -> Result<(), StoreError> {
        self.store.incr_next_target_msg_seq_num()
    }

    /// Persists an outgoing message under its sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be written.
    pub fn set(&mut self, seq: u64, message: &[u8]) -> Result<(), StoreError> {
        self.store.set(seq, message)
    }

    /// Fetches persisted messages in `[begin, end]`.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be read.
    pub fn get_range(
        &self,
        begin: u64,
        end: u64,
        out: &mut Vec<bytes::Bytes>,
    ) -> Result<(), StoreError> {
        self.store.get_range(begin, end, out)
    }

    /// Refreshes state from the backing store.
    ///
    /// # Errors
    /// Returns `StoreError` if the refresh fails.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.store.refresh()
    }

    /// Returns the instant the current session window began.
    #[must_use]
    pub fn creation_time(&self) -> SystemTime {
        self.store.creation_time()
    }

    /// Releases store resources.
    ///
    /// # Errors
    /// Returns `StoreError` if the close fails.
    pub fn close(&self) -> Result<(), StoreError> {
        self.store.close()
    }

    /// Resets the session state: counters back to 1, store cleared, all
    /// flags and queues dropped, creation time renewed.
    ///
    /// # Errors
    /// Returns `StoreError` if the store reset fails.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.store.reset()?;
        self.logon_sent = false;
        self.logon_received = false;
        self.logout_sent = false;
        self.logout_received = false;
        self.reset_sent = false;
        self.reset_received = false;
        self.logout_reason = None;
        self.test_request_counter = 0;
        self.resend_range = (0, 0, 0);
        self.queue.clear();
        let now = Instant::now();
        self.last_sent_time = now;
        self.last_received_time = now;
        Ok(())
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("initiator", &self.initiator)
            .field("logon_sent", &self.logon_sent)
            .field("logon_received", &self.logon_received)
            .field("logout_sent", &self.logout_sent)
            .field("logout_received", &self.logout_received)
            .field("resend_range", &self.resend_range)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}
