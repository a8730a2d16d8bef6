/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The FIX session state machine.
//!
//! [`Session`] is the primary abstraction for sequenced message exchange
//! with one counterparty. It performs sequencing and error recovery and
//! represents a communication channel that is independent of any specific
//! connection: a session starts at sequence number 1, survives transport
//! reconnects, and ends only when it is reset.
//!
//! Inbound flow: parsed [`Message`]s enter through [`Session::receive`],
//! which dispatches by MsgType. Every administrative handler first runs the
//! central `verify` gate (timing, identity, sequence checks), then applies
//! its protocol semantics and may answer through the send pipeline. Timer
//! ticks enter through [`Session::next`] (see the liveness module); user
//! traffic enters through [`Session::send`] (see the send module).

use crate::application::Application;
use crate::config::SessionConfig;
use crate::listener::{Listeners, SessionStateListener};
use crate::responder::Responder;
use crate::schedule::SessionSchedule;
use crate::state::SessionState;
use chrono::Utc;
use parking_lot::Mutex;
use seqfix_core::error::{DecodeError, FixError, SessionError};
use seqfix_core::fields::{BusinessRejectReason, SessionRejectReason, tags};
use seqfix_core::message::{Message, MsgType};
use seqfix_core::types::{FixVersion, SessionId, Timestamp};
use seqfix_store::MessageStore;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

/// A sequenced, recoverable conversation with one counterparty.
pub struct Session {
    pub(crate) session_id: SessionId,
    pub(crate) config: SessionConfig,
    pub(crate) application: Arc<dyn Application>,
    pub(crate) schedule: Arc<dyn SessionSchedule>,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) responder: Mutex<Option<Arc<dyn Responder>>>,
    pub(crate) listeners: Listeners,
    pub(crate) enabled: AtomicBool,
}

impl Session {
    /// Creates a session around the given store and callback sink.
    ///
    /// If the store's creation time falls outside the current schedule
    /// window, state is reset immediately so the session starts fresh.
    ///
    /// # Arguments
    /// * `session_id` - The immutable session identity
    /// * `config` - Behavior switches
    /// * `store` - The authoritative message store
    /// * `application` - Callback sink
    /// * `schedule` - Session window predicate
    #[must_use]
    pub fn new(
        session_id: SessionId,
        config: SessionConfig,
        store: Box<dyn MessageStore>,
        application: Arc<dyn Application>,
        schedule: Arc<dyn SessionSchedule>,
    ) -> Self {
        let state = SessionState::new(
            store,
            config.initiator,
            config.heart_bt_int,
            config.test_request_delay_multiplier,
            config.logon_timeout,
            config.logout_timeout,
        );
        let session = Self {
            session_id,
            config,
            application,
            schedule,
            state: Mutex::new(state),
            responder: Mutex::new(None),
            listeners: Listeners::new(),
            enabled: AtomicBool::new(true),
        };

        {
            let mut state = session.state.lock();
            let creation = state.creation_time().into();
            if !session.schedule.is_same_session(Utc::now(), creation) {
                info!(session_id = %session.session_id, "Session state is not current; resetting");
                if let Err(e) = state.reset() {
                    error!(session_id = %session.session_id, "error during session construction: {e}");
                }
            }
        }

        info!(session_id = %session.session_id, "Created session");
        session
    }

    /// Returns the session identity.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns true if the session wants to be (or stay) logged on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Requests a logon; the next timer tick initiates it for initiators.
    pub fn logon(&self) {
        self.state.lock().logout_reason = None;
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Requests a graceful logout; the next timer tick emits it.
    pub fn logout(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Requests a graceful logout with a reason to carry in the Logout text.
    pub fn logout_with_reason(&self, reason: impl Into<String>) {
        self.state.lock().logout_reason = Some(reason.into());
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Returns true if a logon message has been sent.
    #[must_use]
    pub fn sent_logon(&self) -> bool {
        self.state.lock().logon_sent
    }

    /// Returns true if a logon message has been received.
    #[must_use]
    pub fn received_logon(&self) -> bool {
        self.state.lock().logon_received
    }

    /// Returns true if a logout message has been sent.
    #[must_use]
    pub fn sent_logout(&self) -> bool {
        self.state.lock().logout_sent
    }

    /// Returns true if a logout message has been received.
    #[must_use]
    pub fn received_logout(&self) -> bool {
        self.state.lock().logout_received
    }

    /// Returns true if the logon handshake has completed in both directions.
    #[must_use]
    pub fn is_logged_on(&self) -> bool {
        let state = self.state.lock();
        self.is_logged_on_locked(&state)
    }

    pub(crate) fn is_logged_on_locked(&self, state: &SessionState) -> bool {
        state.logon_sent && state.logon_received
    }

    /// Attaches or detaches the transport responder.
    pub fn set_responder(&self, responder: Option<Arc<dyn Responder>>) {
        let mut slot = self.responder.lock();
        let connected = responder.is_some();
        *slot = responder;
        drop(slot);
        if connected {
            self.listeners.notify(|l| l.on_connect());
        } else {
            self.listeners.notify(|l| l.on_disconnect());
        }
    }

    /// Returns true if a responder is attached.
    #[must_use]
    pub fn has_responder(&self) -> bool {
        self.responder.lock().is_some()
    }

    /// Returns true if the remote address is acceptable for this session.
    /// An empty allow-list accepts every address.
    #[must_use]
    pub fn is_allowed_for_session(&self, remote: IpAddr) -> bool {
        self.config.allowed_remote_addresses.is_empty()
            || self.config.allowed_remote_addresses.contains(&remote)
    }

    /// Returns the next outgoing sequence number, or 0 if the store fails.
    #[must_use]
    pub fn expected_sender_num(&self) -> u64 {
        self.state.lock().next_sender_msg_seq_num().unwrap_or(0)
    }

    /// Returns the next expected incoming sequence number, or 0 if the
    /// store fails.
    #[must_use]
    pub fn expected_target_num(&self) -> u64 {
        self.state.lock().next_target_msg_seq_num().unwrap_or(0)
    }

    /// Sets the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn set_next_sender_msg_seq_num(&self, seq: u64) -> Result<(), FixError> {
        Ok(self.state.lock().set_next_sender_msg_seq_num(seq)?)
    }

    /// Sets the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn set_next_target_msg_seq_num(&self, seq: u64) -> Result<(), FixError> {
        Ok(self.state.lock().set_next_target_msg_seq_num(seq)?)
    }

    /// Registers a state listener.
    pub fn add_state_listener(&self, listener: Arc<dyn SessionStateListener>) {
        self.listeners.add(listener);
    }

    /// Removes a state listener.
    pub fn remove_state_listener(&self, listener: &Arc<dyn SessionStateListener>) {
        self.listeners.remove(listener);
    }

    /// Processes one inbound message.
    ///
    /// # Errors
    /// Store and transport faults surface as errors; protocol faults are
    /// answered on the wire (Reject, Logout, disconnect) and return `Ok`.
    pub fn receive(&self, message: Message) -> Result<(), FixError> {
        let mut state = self.state.lock();
        self.on_message(&mut state, message)
    }

    /// Logs out (if connected) and resets sequence numbers and state.
    ///
    /// # Errors
    /// Returns an error if the store reset fails.
    pub fn reset(&self) -> Result<(), FixError> {
        let mut state = self.state.lock();
        self.reset_locked(&mut state)
    }

    /// Drops the connection, clears connection-scoped state and notifies
    /// the application.
    ///
    /// # Errors
    /// Returns an error if a state-reset required by configuration fails.
    pub fn disconnect(&self, reason: &str, log_error: bool) -> Result<(), FixError> {
        let mut state = self.state.lock();
        self.disconnect_locked(&mut state, reason, log_error)
    }

    /// Releases session resources (the message store).
    ///
    /// # Errors
    /// Returns an error if the store close fails.
    pub fn close(&self) -> Result<(), FixError> {
        Ok(self.state.lock().close()?)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    pub(crate) fn on_message(
        &self,
        state: &mut SessionState,
        message: Message,
    ) -> Result<(), FixError> {
        let msg_type = message.msg_type().ok_or(DecodeError::MissingMsgType)?;

        if !message.header.is_set(tags::MSG_SEQ_NUM) {
            self.generate_logout(state, Some("Received message without MsgSeqNum"), None)?;
            self.disconnect_locked(
                state,
                &format!("Received message without MsgSeqNum: {message}"),
                true,
            )?;
            return Ok(());
        }

        let begin_string = message
            .header
            .get_str(tags::BEGIN_STRING)
            .unwrap_or_default()
            .to_string();
        if begin_string != self.session_id.begin_string.as_str() {
            self.handle_unsupported_version(state, &message, &msg_type, &begin_string)?;
            return Ok(());
        }

        let result = if msg_type == MsgType::Logon
            && message
                .body
                .get_i64(tags::HEART_BT_INT)
                .is_some_and(|v| v < 0)
        {
            Err(SessionError::RejectLogon {
                reason: "HeartBtInt must not be negative".to_string(),
            }
            .into())
        } else {
            match msg_type {
                MsgType::Logon => self.handle_logon(state, &message),
                MsgType::Heartbeat => self.handle_heartbeat(state, &message),
                MsgType::TestRequest => self.handle_test_request(state, &message),
                MsgType::SequenceReset => self.handle_sequence_reset(state, &message),
                MsgType::Logout => self.handle_logout(state, &message),
                MsgType::ResendRequest => self.handle_resend_request(state, &message),
                MsgType::Reject => self.handle_reject(state, &message),
                _ => self.handle_application_message(state, &message),
            }
        };

        if let Err(err) = result {
            self.handle_dispatch_error(state, &message, err)?;
        }

        self.drain_queue(state)?;
        if self.is_logged_on_locked(state) {
            self.next_locked(state)?;
        }
        Ok(())
    }

    fn handle_unsupported_version(
        &self,
        state: &mut SessionState,
        message: &Message,
        msg_type: &MsgType,
        received: &str,
    ) -> Result<(), FixError> {
        error!(
            session_id = %self.session_id,
            "Rejecting message with incorrect BeginString {received}: {message}"
        );
        if *msg_type == MsgType::Logout {
            return self.handle_logout(state, message);
        }
        if self.reset_or_disconnect_if_required(state, Some(message))? {
            return Ok(());
        }
        self.generate_logout(state, Some("Incorrect BeginString"), None)?;
        state.incr_next_target_msg_seq_num()?;
        self.disconnect_locked(state, &format!("Incorrect BeginString: {received}"), true)
    }

    /// Converts a protocol fault raised by a handler into the matching
    /// outbound recovery.
    fn handle_dispatch_error(
        &self,
        state: &mut SessionState,
        message: &Message,
        err: FixError,
    ) -> Result<(), FixError> {
        match err {
            FixError::Session(SessionError::RejectLogon { reason }) => {
                error!(session_id = %self.session_id, "Logon rejected: {reason}");
                self.generate_logout(state, Some(&reason), None)?;
                state.incr_next_target_msg_seq_num()?;
                self.disconnect_locked(state, &format!("Logon rejected: {reason}"), true)
            }
            FixError::Session(SessionError::IncorrectDataFormat { tag, reason }) => {
                error!(
                    session_id = %self.session_id,
                    "Rejecting invalid message (tag {tag}: {reason}): {message}"
                );
                if self.reset_or_disconnect_if_required(state, Some(message))? {
                    return Ok(());
                }
                self.generate_reject(state, message, SessionRejectReason::IncorrectDataFormat, tag)
            }
            FixError::Session(SessionError::IncorrectTagValue { tag }) => {
                error!(
                    session_id = %self.session_id,
                    "Rejecting invalid message (incorrect value for tag {tag}): {message}"
                );
                self.generate_reject(state, message, SessionRejectReason::ValueIsIncorrect, tag)
            }
            FixError::Session(SessionError::UnsupportedMessageType { msg_type }) => {
                error!(
                    session_id = %self.session_id,
                    "Rejecting message with unsupported type {msg_type}: {message}"
                );
                if self.reset_or_disconnect_if_required(state, Some(message))? {
                    return Ok(());
                }
                if self.session_id.begin_string >= FixVersion::Fix42 {
                    self.generate_business_reject(
                        state,
                        message,
                        BusinessRejectReason::UnsupportedMessageType,
                        0,
                    )
                } else {
                    self.generate_reject_text(state, message, "Unsupported message type")
                }
            }
            FixError::Store(store_err) => {
                error!(
                    session_id = %self.session_id,
                    "Error processing message: {store_err}: {message}"
                );
                self.reset_or_disconnect_if_required(state, Some(message))?;
                Ok(())
            }
            // Sequence faults already answered with a Logout surface to the
            // caller, as do internal faults.
            other => Err(other),
        }
    }

    // ------------------------------------------------------------------
    // verify - the central inbound gate
    // ------------------------------------------------------------------

    /// Runs the inbound acceptance checks in protocol order and delivers
    /// the message to the application on success.
    ///
    /// Returns `Ok(true)` when the caller should apply its handler
    /// semantics, `Ok(false)` when the message was fully handled here
    /// (queued, rejected or dropped).
    pub(crate) fn verify(
        &self,
        state: &mut SessionState,
        message: &Message,
        check_too_high: bool,
        check_too_low: bool,
    ) -> Result<bool, FixError> {
        state.last_received_time = Instant::now();
        state.test_request_counter = 0;

        let msg_type = message.msg_type().ok_or(DecodeError::MissingMsgType)?;
        let msg_seq_num = message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);

        if !self.valid_logon_state(state, &msg_type) {
            error!(
                session_id = %self.session_id,
                "Logon state is not valid for message (MsgType={msg_type})"
            );
            self.disconnect_locked(
                state,
                &format!("Verifying message failed: logon state is not valid for MsgType={msg_type}"),
                true,
            )?;
            return Ok(false);
        }

        let Some(sending_time) = message.header.get_timestamp(tags::SENDING_TIME) else {
            error!(session_id = %self.session_id, "Missing or malformed SendingTime: {message}");
            self.disconnect_locked(
                state,
                "Verifying message failed: missing or malformed SendingTime (52)",
                true,
            )?;
            return Ok(false);
        };

        if !self.is_good_time(sending_time) {
            if let Err(err) = self.do_bad_time(state, message) {
                self.on_verify_fault(state, err)?;
            }
            return Ok(false);
        }

        if !self.is_correct_comp_id(message) {
            if let Err(err) = self.do_bad_comp_id(state, message) {
                self.on_verify_fault(state, err)?;
            }
            return Ok(false);
        }

        if check_too_high && self.is_target_too_high(state, msg_seq_num)? {
            self.do_target_too_high(state, message)?;
            return Ok(false);
        } else if check_too_low && self.is_target_too_low(state, msg_seq_num)? {
            self.do_target_too_low(state, message)?;
            return Ok(false);
        }

        if msg_type == MsgType::Logon
            && check_too_low
            && self.config.enable_next_expected_msg_seq_num
            && let Some(next_expected) = message.body.get_u64(tags::NEXT_EXPECTED_MSG_SEQ_NUM)
        {
            let next_sender = state.next_sender_msg_seq_num()?;
            if next_expected > next_sender {
                if !message.is_poss_dup() {
                    let text = format!(
                        "Tag 789 (NextExpectedMsgSeqNum) is higher than expected. Expected {next_sender}, Received {next_expected}"
                    );
                    self.generate_logout(state, Some(&text), None)?;
                    return Err(SessionError::NextExpectedTooHigh {
                        expected: next_sender,
                        received: next_expected,
                    }
                    .into());
                }
                if !self.validate_poss_dup(state, message)? {
                    return Ok(false);
                }
            }
        }

        if message.is_poss_dup() && !self.validate_poss_dup(state, message)? {
            return Ok(false);
        }

        if (check_too_high || check_too_low) && state.is_resend_requested() {
            let range = state.resend_range();
            if msg_seq_num >= range.1 {
                info!(
                    session_id = %self.session_id,
                    "ResendRequest for messages FROM {} TO {} has been satisfied.", range.0, range.1
                );
                state.set_resend_range(0, 0, 0);
            } else if range.2 > 0 && msg_seq_num >= range.2 {
                self.send_resend_request(state, msg_seq_num + 1, range.1)?;
            }
        }

        self.from_callback(state, &msg_type, message)?;
        Ok(true)
    }

    fn from_callback(
        &self,
        _state: &mut SessionState,
        msg_type: &MsgType,
        message: &Message,
    ) -> Result<(), FixError> {
        // A callback error prevents the target counter from advancing, so a
        // fixed application can reprocess the message via resend on the next
        // connection.
        let result = if msg_type.is_admin() {
            self.application.from_admin(message, &self.session_id)
        } else {
            self.application.from_app(message, &self.session_id)
        };
        result.map_err(FixError::from)
    }

    fn valid_logon_state(&self, state: &SessionState, msg_type: &MsgType) -> bool {
        match msg_type {
            MsgType::Logon => !state.logon_received || state.reset_sent || state.reset_received,
            MsgType::Logout => state.logon_sent,
            MsgType::SequenceReset | MsgType::Reject => true,
            _ => state.logon_received,
        }
    }

    fn is_good_time(&self, sending_time: Timestamp) -> bool {
        if !self.config.check_latency {
            return true;
        }
        let delta_millis = (Utc::now().timestamp_millis() - sending_time.as_millis()).unsigned_abs();
        delta_millis <= self.config.max_latency.as_millis() as u64
    }

    fn is_correct_comp_id(&self, message: &Message) -> bool {
        if !self.config.check_comp_id {
            return true;
        }
        let sender = message.header.get_str(tags::SENDER_COMP_ID).unwrap_or("");
        let target = message.header.get_str(tags::TARGET_COMP_ID).unwrap_or("");
        sender == self.session_id.target_comp_id.as_str()
            && target == self.session_id.sender_comp_id.as_str()
    }

    pub(crate) fn is_target_too_high(
        &self,
        state: &SessionState,
        seq: u64,
    ) -> Result<bool, FixError> {
        Ok(seq > state.next_target_msg_seq_num()?)
    }

    pub(crate) fn is_target_too_low(
        &self,
        state: &SessionState,
        seq: u64,
    ) -> Result<bool, FixError> {
        Ok(seq < state.next_target_msg_seq_num()?)
    }

    /// A check that should have answered with a Reject could not (typically
    /// because no logon completed); the session cannot be trusted further.
    fn on_verify_fault(&self, state: &mut SessionState, err: FixError) -> Result<(), FixError> {
        if let FixError::Session(SessionError::RejectWhileNotLoggedOn { reason }) = &err {
            error!(session_id = %self.session_id, "{reason}");
            self.disconnect_locked(state, &format!("Verifying message failed: {reason}"), true)?;
            return Ok(());
        }
        Err(err)
    }

    fn do_bad_time(&self, state: &mut SessionState, message: &Message) -> Result<(), FixError> {
        match self.generate_reject(
            state,
            message,
            SessionRejectReason::SendingTimeAccuracyProblem,
            0,
        ) {
            Ok(()) => self.generate_logout(state, None, None),
            Err(FixError::Session(SessionError::RejectWhileNotLoggedOn { reason })) => {
                self.generate_logout(state, Some(&reason), None)?;
                Err(SessionError::RejectWhileNotLoggedOn { reason }.into())
            }
            Err(other) => Err(other),
        }
    }

    fn do_bad_comp_id(&self, state: &mut SessionState, message: &Message) -> Result<(), FixError> {
        self.generate_reject(state, message, SessionRejectReason::CompIdProblem, 0)?;
        self.generate_logout(state, None, None)
    }

    /// Too-low sequence number: a genuine duplicate is validated and
    /// dropped; anything else ends the session.
    fn do_target_too_low(&self, state: &mut SessionState, message: &Message) -> Result<(), FixError> {
        if !message.is_poss_dup() {
            let expected = state.next_target_msg_seq_num()?;
            let received = message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);
            let text = format!("MsgSeqNum too low, expecting {expected} but received {received}");
            self.generate_logout(state, Some(&text), None)?;
            return Err(SessionError::SequenceTooLow { expected, received }.into());
        }
        self.validate_poss_dup(state, message)?;
        Ok(())
    }

    /// Validates a PossDup message: OrigSendingTime must be present (unless
    /// tolerated) and must not postdate SendingTime.
    fn validate_poss_dup(
        &self,
        state: &mut SessionState,
        message: &Message,
    ) -> Result<bool, FixError> {
        if message.msg_type() == Some(MsgType::SequenceReset) {
            return Ok(true);
        }
        match message.header.get_timestamp(tags::ORIG_SENDING_TIME) {
            Some(orig_sending_time) => {
                let sending_time = message
                    .header
                    .get_timestamp(tags::SENDING_TIME)
                    .unwrap_or(orig_sending_time);
                if orig_sending_time > sending_time {
                    self.generate_reject(
                        state,
                        message,
                        SessionRejectReason::SendingTimeAccuracyProblem,
                        0,
                    )?;
                    self.generate_logout(state, None, None)?;
                    return Ok(false);
                }
            }
            None => {
                if self.config.reject_invalid_message {
                    self.generate_reject(
                        state,
                        message,
                        SessionRejectReason::RequiredTagMissing,
                        tags::ORIG_SENDING_TIME,
                    )?;
                    return Ok(false);
                }
                warn!(
                    session_id = %self.session_id,
                    "Possible duplicate message without OrigSendingTime: {message}"
                );
            }
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Admin handlers
    // ------------------------------------------------------------------

    fn handle_logon(&self, state: &mut SessionState, message: &Message) -> Result<(), FixError> {
        if !self
            .schedule
            .is_same_session(Utc::now(), state.creation_time().into())
        {
            return Err(SessionError::RejectLogon {
                reason: "Logon attempt not within session time".to_string(),
            }
            .into());
        }

        if self.config.refresh_on_logon && !state.is_initiator() {
            info!(session_id = %self.session_id, "Refreshing message/state store at logon");
            state.refresh()?;
            self.listeners.notify(|l| l.on_refresh());
        }

        if let Some(reset_flag) = message.body.get_bool(tags::RESET_SEQ_NUM_FLAG) {
            state.reset_received = reset_flag;
        } else if state.reset_sent && message.header.get_u64(tags::MSG_SEQ_NUM) == Some(1) {
            info!(
                session_id = %self.session_id,
                "Inferring ResetSeqNumFlag as sequence number is 1 in response to reset request"
            );
            state.reset_received = true;
        }

        if state.reset_received {
            info!(
                session_id = %self.session_id,
                "Logon contains ResetSeqNumFlag=Y, resetting sequence numbers to 1"
            );
            if !state.reset_sent {
                self.reset_state(state)?;
            }
        }

        if state.is_logon_send_needed() && !state.reset_received {
            self.disconnect_locked(state, "Received logon response before sending request", true)?;
            return Ok(());
        }

        if !state.is_initiator() && self.config.reset_on_logon {
            self.reset_state(state)?;
        }

        if !self.verify(state, message, false, self.config.validate_sequence_numbers)? {
            return Ok(());
        }

        state.logout_received = false;
        state.logout_sent = false;
        state.logon_received = true;
        state.logon_attempts = 0;
        state.last_session_logon = None;

        let sequence = message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);

        info!(session_id = %self.session_id, "Received logon");
        if !state.is_initiator() {
            self.generate_responding_logon(state, message)?;
            info!(session_id = %self.session_id, "Responding to logon request");
        }

        if state.reset_sent && !state.reset_received {
            self.disconnect_locked(state, "Received logon response before sending request", true)?;
        }

        state.reset_sent = false;
        state.reset_received = false;

        if self.config.validate_sequence_numbers
            && self.is_target_too_high(state, sequence)?
            && !self.config.reset_on_logon
        {
            self.do_target_too_high(state, message)?;
        } else {
            // Either in sync, or sequence validation is off, or the store
            // was reset above.
            state.incr_next_target_msg_seq_num()?;
            self.drain_queue(state)?;
        }

        // The peer told us what it expects next from us; replay anything it
        // is missing before application traffic resumes.
        if let Some(next_expected) = message.body.get_u64(tags::NEXT_EXPECTED_MSG_SEQ_NUM) {
            let end_seq_no = state.next_sender_msg_seq_num()?.saturating_sub(1);
            if end_seq_no >= next_expected {
                info!(
                    session_id = %self.session_id,
                    "Peer is missing messages FROM: {next_expected} TO: {end_seq_no}"
                );
                if let Err(e) = self.manage_gap_fill(state, message, next_expected, end_seq_no) {
                    error!(
                        session_id = %self.session_id,
                        "Synchronization on logon message failed: {e}"
                    );
                }
            }
        }

        if self.is_logged_on_locked(state) {
            self.application.on_logon(&self.session_id);
            self.listeners.notify(|l| l.on_logon());
        }
        Ok(())
    }

    fn handle_logout(&self, state: &mut SessionState, message: &Message) -> Result<(), FixError> {
        if !self.verify(state, message, false, false)? {
            return Ok(());
        }

        let reason;
        if !state.logout_sent {
            reason = "Received logout request";
            info!(session_id = %self.session_id, "{reason}");
            self.generate_logout(state, None, Some(message))?;
            info!(session_id = %self.session_id, "Sent logout response");
        } else {
            reason = "Received logout response";
            info!(session_id = %self.session_id, "{reason}");
        }

        if let Some(text) = message.body.get_str(tags::TEXT)
            && let Some(expected) = extract_expected_sequence_number(text)
        {
            warn!(
                session_id = %self.session_id,
                "Logout text reports the peer expects sequence number {expected}"
            );
        }

        state.logout_received = true;
        state.incr_next_target_msg_seq_num()?;
        if self.config.reset_on_logout {
            self.reset_state(state)?;
        }

        self.disconnect_locked(state, reason, false)
    }

    fn handle_heartbeat(&self, state: &mut SessionState, message: &Message) -> Result<(), FixError> {
        if !self.verify(
            state,
            message,
            self.config.validate_sequence_numbers,
            self.config.validate_sequence_numbers,
        )? {
            return Ok(());
        }
        state.incr_next_target_msg_seq_num()?;
        self.drain_queue(state)
    }

    fn handle_test_request(
        &self,
        state: &mut SessionState,
        message: &Message,
    ) -> Result<(), FixError> {
        if !self.verify(
            state,
            message,
            self.config.validate_sequence_numbers,
            self.config.validate_sequence_numbers,
        )? {
            return Ok(());
        }
        self.generate_heartbeat(state, Some(message))?;
        state.incr_next_target_msg_seq_num()?;
        self.drain_queue(state)
    }

    fn handle_reject(&self, state: &mut SessionState, message: &Message) -> Result<(), FixError> {
        if !self.verify(state, message, false, self.config.validate_sequence_numbers)? {
            return Ok(());
        }
        state.incr_next_target_msg_seq_num()?;
        self.drain_queue(state)
    }

    fn handle_sequence_reset(
        &self,
        state: &mut SessionState,
        message: &Message,
    ) -> Result<(), FixError> {
        let is_gap_fill = message.body.get_bool(tags::GAP_FILL_FLAG).unwrap_or(false)
            && self.config.validate_sequence_numbers;

        if !self.verify(state, message, is_gap_fill, is_gap_fill)? {
            return Ok(());
        }

        if self.config.validate_sequence_numbers
            && let Some(new_sequence) = message.body.get_u64(tags::NEW_SEQ_NO)
        {
            let expected = state.next_target_msg_seq_num()?;
            info!(
                session_id = %self.session_id,
                "Received SequenceReset FROM: {expected} TO: {new_sequence}"
            );
            if new_sequence > expected {
                let range = state.resend_range();
                if range.2 > 0 {
                    // A chunked resend is in flight; the reset may only
                    // cover the current chunk.
                    if new_sequence >= range.1 {
                        state.set_next_target_msg_seq_num(new_sequence)?;
                    } else if new_sequence >= range.2 {
                        state.set_next_target_msg_seq_num(new_sequence + 1)?;
                        self.send_resend_request(state, new_sequence + 1, range.1)?;
                    }
                } else {
                    state.set_next_target_msg_seq_num(new_sequence)?;
                }
            } else if new_sequence < expected {
                error!(
                    session_id = %self.session_id,
                    "Invalid SequenceReset: newSequence={new_sequence} < expected={expected}"
                );
                if self.reset_or_disconnect_if_required(state, Some(message))? {
                    return Ok(());
                }
                self.generate_reject(
                    state,
                    message,
                    SessionRejectReason::ValueIsIncorrect,
                    tags::NEW_SEQ_NO,
                )?;
            }
        }
        Ok(())
    }

    fn handle_application_message(
        &self,
        state: &mut SessionState,
        message: &Message,
    ) -> Result<(), FixError> {
        if !self.verify(
            state,
            message,
            self.config.validate_sequence_numbers,
            self.config.validate_sequence_numbers,
        )? {
            return Ok(());
        }
        state.incr_next_target_msg_seq_num()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reject generation
    // ------------------------------------------------------------------

    pub(crate) fn generate_reject(
        &self,
        state: &mut SessionState,
        message: &Message,
        reason: SessionRejectReason,
        ref_tag: u32,
    ) -> Result<(), FixError> {
        let reason_text = reason.text();
        if !state.logon_received {
            return Err(SessionError::RejectWhileNotLoggedOn {
                reason: format!("{reason_text} (field {ref_tag})"),
            }
            .into());
        }

        let begin_string = self.session_id.begin_string;
        let mut reject = Message::new(MsgType::Reject);
        let msg_type = message
            .header
            .get_str(tags::MSG_TYPE)
            .unwrap_or_default()
            .to_string();
        let msg_seq_num = message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);

        if msg_seq_num > 0 {
            reject.body.set_u64(tags::REF_SEQ_NUM, msg_seq_num);
        }
        if begin_string >= FixVersion::Fix42 {
            if !msg_type.is_empty() {
                reject.body.set_str(tags::REF_MSG_TYPE, msg_type.as_str());
            }
            if begin_string > FixVersion::Fix42
                || reason.value() <= SessionRejectReason::InvalidMsgType.value()
            {
                reject.body.set_u64(tags::SESSION_REJECT_REASON, reason.value());
            }
        }

        if msg_type != MsgType::Logon.as_str()
            && msg_type != MsgType::SequenceReset.as_str()
            && (msg_seq_num == state.next_target_msg_seq_num()? || !message.is_poss_dup())
        {
            state.incr_next_target_msg_seq_num()?;
        }

        if ref_tag > 0 || reason == SessionRejectReason::InvalidTagNumber {
            if begin_string >= FixVersion::Fix42 {
                reject.body.set_u64(tags::REF_TAG_ID, u64::from(ref_tag));
                reject.body.set_str(tags::TEXT, reason_text);
            } else {
                reject
                    .body
                    .set_str(tags::TEXT, format!("{reason_text} ({ref_tag})"));
            }
            error!(
                session_id = %self.session_id,
                "Reject sent for message {msg_seq_num}: {reason_text}: tag={ref_tag}"
            );
        } else {
            reject.body.set_str(tags::TEXT, reason_text);
            error!(
                session_id = %self.session_id,
                "Reject sent for message {msg_seq_num}: {reason_text}"
            );
        }

        if self.config.enable_last_msg_seq_num_processed {
            reject
                .header
                .set_u64(tags::LAST_MSG_SEQ_NUM_PROCESSED, msg_seq_num);
        }

        self.send_raw(state, reject, 0)?;
        Ok(())
    }

    /// Free-text session Reject used for protocol faults predating
    /// SessionRejectReason.
    fn generate_reject_text(
        &self,
        state: &mut SessionState,
        message: &Message,
        text: &str,
    ) -> Result<(), FixError> {
        let mut reject = Message::new(MsgType::Reject);
        let msg_type = message
            .header
            .get_str(tags::MSG_TYPE)
            .unwrap_or_default()
            .to_string();
        let msg_seq_num = message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);

        if self.session_id.begin_string >= FixVersion::Fix42 && !msg_type.is_empty() {
            reject.body.set_str(tags::REF_MSG_TYPE, msg_type.as_str());
        }
        reject.body.set_u64(tags::REF_SEQ_NUM, msg_seq_num);

        if msg_type != MsgType::Logon.as_str()
            && msg_type != MsgType::SequenceReset.as_str()
            && !message.is_poss_dup()
        {
            state.incr_next_target_msg_seq_num()?;
        }

        reject.body.set_str(tags::TEXT, text);
        self.send_raw(state, reject, 0)?;
        error!(
            session_id = %self.session_id,
            "Reject sent for message {msg_seq_num}: {text}"
        );
        Ok(())
    }

    fn generate_business_reject(
        &self,
        state: &mut SessionState,
        message: &Message,
        reason: BusinessRejectReason,
        ref_tag: u32,
    ) -> Result<(), FixError> {
        let mut reject = Message::new(MsgType::BusinessMessageReject);
        let msg_type = message
            .header
            .get_str(tags::MSG_TYPE)
            .unwrap_or_default()
            .to_string();
        let msg_seq_num = message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);
        reject.body.set_str(tags::REF_MSG_TYPE, msg_type.as_str());
        reject.body.set_u64(tags::REF_SEQ_NUM, msg_seq_num);
        reject.body.set_u64(tags::BUSINESS_REJECT_REASON, reason.value());
        state.incr_next_target_msg_seq_num()?;

        let reason_text = reason.text();
        if ref_tag > 0 {
            reject
                .body
                .set_str(tags::TEXT, format!("{reason_text} ({ref_tag})"));
        } else {
            reject.body.set_str(tags::TEXT, reason_text);
        }
        error!(
            session_id = %self.session_id,
            "BusinessMessageReject sent for message {msg_seq_num}: {reason_text}"
        );

        self.send_raw(state, reject, 0)?;
        Ok(())
    }

    pub(crate) fn generate_logout(
        &self,
        state: &mut SessionState,
        text: Option<&str>,
        reply_to: Option<&Message>,
    ) -> Result<(), FixError> {
        let mut logout = Message::new(MsgType::Logout);
        if let Some(text) = text
            && !text.is_empty()
        {
            logout.body.set_str(tags::TEXT, text);
        }
        if self.config.enable_last_msg_seq_num_processed
            && let Some(reply_to) = reply_to
            && let Some(seq) = reply_to.header.get_u64(tags::MSG_SEQ_NUM)
        {
            logout.header.set_u64(tags::LAST_MSG_SEQ_NUM_PROCESSED, seq);
        }
        self.send_raw(state, logout, 0)?;
        state.logout_sent = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queue draining, disconnect, reset
    // ------------------------------------------------------------------

    pub(crate) fn drain_queue(&self, state: &mut SessionState) -> Result<(), FixError> {
        loop {
            let expected = state.next_target_msg_seq_num()?;
            let Some(message) = state.dequeue(expected) else {
                return Ok(());
            };
            info!(
                session_id = %self.session_id,
                "Processing queued message: {expected}"
            );
            let msg_type = message.msg_type();
            if msg_type == Some(MsgType::Logon) || msg_type == Some(MsgType::ResendRequest) {
                // Replaying these from the queue would re-trigger the
                // handshake; accounting for them is enough.
                state.incr_next_target_msg_seq_num()?;
            } else {
                self.on_message(state, message)?;
            }
        }
    }

    pub(crate) fn reset_or_disconnect_if_required(
        &self,
        state: &mut SessionState,
        message: Option<&Message>,
    ) -> Result<bool, FixError> {
        if !self.config.reset_on_error && !self.config.disconnect_on_error {
            return Ok(false);
        }
        if !self.is_logged_on_locked(state) {
            return Ok(false);
        }
        if message.is_some_and(Message::is_admin) {
            return Ok(false);
        }
        if self.config.reset_on_error {
            error!(session_id = %self.session_id, "Auto reset");
            self.reset_locked(state)?;
            return Ok(true);
        }
        self.disconnect_locked(state, "Auto disconnect", false)?;
        Ok(true)
    }

    pub(crate) fn reset_locked(&self, state: &mut SessionState) -> Result<(), FixError> {
        if self.has_responder() {
            self.application.on_before_session_reset(&self.session_id);
            self.generate_logout(state, None, None)?;
            self.disconnect_locked(state, "Session reset", false)?;
        }
        self.reset_state(state)
    }

    pub(crate) fn reset_state(&self, state: &mut SessionState) -> Result<(), FixError> {
        state.reset()?;
        self.listeners.notify(|l| l.on_reset());
        Ok(())
    }

    pub(crate) fn disconnect_locked(
        &self,
        state: &mut SessionState,
        reason: &str,
        log_error: bool,
    ) -> Result<(), FixError> {
        {
            let mut slot = self.responder.lock();
            match slot.take() {
                None => {
                    info!(session_id = %self.session_id, "Already disconnected: {reason}");
                    return Ok(());
                }
                Some(responder) => {
                    if log_error {
                        error!(session_id = %self.session_id, "Disconnecting: {reason}");
                    } else {
                        info!(session_id = %self.session_id, "Disconnecting: {reason}");
                    }
                    responder.disconnect();
                }
            }
        }
        self.listeners.notify(|l| l.on_disconnect());

        if state.logon_received || state.logon_sent {
            state.logon_received = false;
            state.logon_sent = false;
            self.application.on_logout(&self.session_id);
            self.listeners.notify(|l| l.on_logout());
        }

        state.logout_sent = false;
        state.logout_received = false;
        state.reset_sent = false;
        state.reset_received = false;

        state.clear_queue();
        state.logout_reason = None;
        state.set_resend_range(0, 0, 0);

        if self.config.reset_on_disconnect {
            self.reset_state(state)?;
        }
        // Acceptors become eligible for the next inbound logon immediately.
        if !state.is_initiator() {
            self.enabled.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[in:{},out:{}]",
            self.session_id,
            self.expected_target_num(),
            self.expected_sender_num()
        )
    }
}

/// Best-effort extraction of the "expecting N" sequence number a peer
/// reports in Logout or Reject text.
///
/// The text format is not standardized; this recognizes the common
/// "expecting N" / "expected N" phrasings and returns the first number
/// following the keyword. Callers must treat the result as a hint only.
#[must_use]
pub fn extract_expected_sequence_number(text: &str) -> Option<u64> {
    let pos = text
        .find("expecting")
        .map(|p| p + "expecting".len())
        .or_else(|| text.find("expected").map(|p| p + "expected".len()))?;
    let rest = &text[pos..];
    let digits: String = rest
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_expected_sequence_number() {
        assert_eq!(
            extract_expected_sequence_number("MsgSeqNum too low, expecting 20 but received 15"),
            Some(20)
        );
        assert_eq!(
            extract_expected_sequence_number("expected 7, received 9"),
            Some(7)
        );
        assert_eq!(extract_expected_sequence_number("no numbers here"), None);
        assert_eq!(extract_expected_sequence_number("expecting nothing"), None);
    }
}
