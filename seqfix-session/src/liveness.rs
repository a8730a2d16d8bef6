/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Timer-driven liveness.
//!
//! [`Session::next`] is invoked from the timer thread, typically once per
//! second. It walks the escalation ladder: generate the initiator Logon
//! (with retry backoff), time out an unanswered Logon or Logout, emit
//! heartbeats when we have been quiet, escalate a quiet peer with a test
//! request, and finally disconnect a dead connection after 2.4 heartbeat
//! intervals of silence.

use crate::session::Session;
use crate::state::SessionState;
use chrono::Utc;
use seqfix_core::error::FixError;
use seqfix_core::fields::{EncryptMethod, tags};
use seqfix_core::message::{Message, MsgType};
use seqfix_core::types::FixVersion;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

impl Session {
    /// Timer tick. Drives logon generation, heartbeat emission,
    /// test-request escalation and timeout-based disconnects.
    ///
    /// # Errors
    /// Store and transport faults surface as errors.
    pub fn next(&self) -> Result<(), FixError> {
        let mut state = self.state.lock();
        self.next_locked(&mut state)
    }

    pub(crate) fn next_locked(&self, state: &mut SessionState) -> Result<(), FixError> {
        if !self.is_enabled() {
            if self.is_logged_on_locked(state) {
                if !state.logout_sent {
                    info!(session_id = %self.session_id, "Initiated logout request");
                    let reason = state.logout_reason.clone();
                    self.generate_logout(state, reason.as_deref(), None)?;
                }
            } else {
                return Ok(());
            }
        }

        if !self
            .schedule
            .is_same_session(Utc::now(), state.creation_time().into())
        {
            self.reset_locked(state)?;
            return Ok(());
        }

        if !self.has_responder() {
            return Ok(());
        }

        if !state.logon_received {
            if state.is_logon_send_needed() {
                if self.is_time_to_generate_logon(state) {
                    if self.application.can_logon(&self.session_id) {
                        if self.generate_logon(state)? {
                            info!(session_id = %self.session_id, "Initiated logon request");
                        } else {
                            error!(
                                session_id = %self.session_id,
                                "Error during logon request initiation"
                            );
                        }
                    } else {
                        info!(
                            session_id = %self.session_id,
                            "Do not initiate logon, application cannot logon"
                        );
                    }
                }
            } else if state.is_logon_already_sent() && state.is_logon_timed_out() {
                self.disconnect_locked(state, "Timed out waiting for logon response", true)?;
            }
            return Ok(());
        }

        if state.heart_beat_interval.is_zero() {
            return Ok(());
        }

        if state.is_logout_timed_out() {
            self.disconnect_locked(state, "Timed out waiting for logout response", true)?;
        }

        if state.is_within_heart_beat() {
            return Ok(());
        }

        if state.is_timed_out() {
            if self.config.disable_heart_beat_check {
                warn!(
                    session_id = %self.session_id,
                    "Heartbeat failure detected but deactivated"
                );
            } else {
                self.disconnect_locked(state, "Timed out waiting for heartbeat", true)?;
                self.listeners.notify(|l| l.on_heartbeat_timeout());
            }
        } else if state.is_test_request_needed() {
            self.generate_test_request(state, "TEST")?;
            info!(session_id = %self.session_id, "Sent test request TEST");
            self.listeners.notify(|l| l.on_missed_heartbeat());
        } else if state.is_heart_beat_needed() {
            self.generate_heartbeat(state, None)?;
        }
        Ok(())
    }

    /// Backoff delay before the next logon attempt, from the configured
    /// interval table.
    fn compute_next_logon_delay(&self, state: &SessionState) -> Duration {
        let intervals = &self.config.logon_intervals;
        if intervals.is_empty() {
            return Duration::from_secs(5);
        }
        let index = (state.logon_attempts.saturating_sub(1) as usize).min(intervals.len() - 1);
        Duration::from_secs(intervals[index])
    }

    fn is_time_to_generate_logon(&self, state: &SessionState) -> bool {
        match state.last_session_logon {
            None => true,
            Some(last) => last.elapsed() >= self.compute_next_logon_delay(state),
        }
    }

    /// Generates the initiator Logon.
    pub(crate) fn generate_logon(&self, state: &mut SessionState) -> Result<bool, FixError> {
        let mut logon = Message::new(MsgType::Logon);
        logon
            .body
            .set_u64(tags::ENCRYPT_METHOD, EncryptMethod::None.value());
        logon
            .body
            .set_u64(tags::HEART_BT_INT, state.heart_beat_interval.as_secs());
        if self.session_id.is_fixt()
            && let Some(appl_ver_id) = &self.config.default_appl_ver_id
        {
            logon.body.set_str(tags::DEFAULT_APPL_VER_ID, appl_ver_id.as_str());
        }

        if self.config.reset_on_logon {
            self.reset_state(state)?;
        }
        if self.is_reset_needed(state)? {
            logon.body.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
        }

        state.last_received_time = Instant::now();
        state.test_request_counter = 0;
        state.logon_sent = true;
        state.logon_attempts += 1;
        state.last_session_logon = Some(Instant::now());

        if self.config.enable_next_expected_msg_seq_num {
            logon.body.set_u64(
                tags::NEXT_EXPECTED_MSG_SEQ_NUM,
                state.next_target_msg_seq_num()?,
            );
        }
        self.send_raw(state, logon, 0)
    }

    /// Generates the acceptor's Logon response, echoing the negotiated
    /// heartbeat interval.
    pub(crate) fn generate_responding_logon(
        &self,
        state: &mut SessionState,
        other_logon: &Message,
    ) -> Result<(), FixError> {
        let mut logon = Message::new(MsgType::Logon);
        logon
            .body
            .set_u64(tags::ENCRYPT_METHOD, EncryptMethod::None.value());
        if state.reset_received {
            logon.body.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
        }
        if let Some(interval) = other_logon.body.get_u64(tags::HEART_BT_INT) {
            logon.body.set_u64(tags::HEART_BT_INT, interval);
            state.heart_beat_interval = Duration::from_secs(interval);
        }
        if let Some(member_name) = other_logon.body.get_str(tags::MEMBER_NAME) {
            let member_name = member_name.to_string();
            logon.body.set_str(tags::MEMBER_NAME, member_name);
        }
        if self.session_id.is_fixt()
            && let Some(appl_ver_id) = &self.config.default_appl_ver_id
        {
            logon.body.set_str(tags::DEFAULT_APPL_VER_ID, appl_ver_id.as_str());
        }
        if self.config.enable_last_msg_seq_num_processed
            && let Some(seq) = other_logon.header.get_u64(tags::MSG_SEQ_NUM)
        {
            logon.header.set_u64(tags::LAST_MSG_SEQ_NUM_PROCESSED, seq);
        }
        if self.config.enable_next_expected_msg_seq_num {
            // The expected target number advances once the peer's logon
            // finishes processing.
            logon.body.set_u64(
                tags::NEXT_EXPECTED_MSG_SEQ_NUM,
                state.next_target_msg_seq_num()? + 1,
            );
        }
        self.send_raw(state, logon, 0)?;
        state.logon_sent = true;
        Ok(())
    }

    /// Generates a Heartbeat, echoing the TestReqID when answering a
    /// TestRequest.
    pub(crate) fn generate_heartbeat(
        &self,
        state: &mut SessionState,
        test_request: Option<&Message>,
    ) -> Result<(), FixError> {
        let mut heartbeat = Message::new(MsgType::Heartbeat);
        if let Some(test_request) = test_request {
            if let Some(test_req_id) = test_request.body.get_str(tags::TEST_REQ_ID) {
                let test_req_id = test_req_id.to_string();
                heartbeat.body.set_str(tags::TEST_REQ_ID, test_req_id);
            }
            if self.config.enable_last_msg_seq_num_processed
                && let Some(seq) = test_request.header.get_u64(tags::MSG_SEQ_NUM)
            {
                heartbeat
                    .header
                    .set_u64(tags::LAST_MSG_SEQ_NUM_PROCESSED, seq);
            }
        }
        self.send_raw(state, heartbeat, 0)?;
        Ok(())
    }

    /// Generates a TestRequest and bumps the unanswered-test-request
    /// counter that paces further escalation.
    pub(crate) fn generate_test_request(
        &self,
        state: &mut SessionState,
        id: &str,
    ) -> Result<(), FixError> {
        state.test_request_counter += 1;
        let mut test_request = Message::new(MsgType::TestRequest);
        test_request.body.set_str(tags::TEST_REQ_ID, id);
        self.send_raw(state, test_request, 0)?;
        Ok(())
    }

    /// A reset-on-* session advertises ResetSeqNumFlag on its Logon when
    /// both directions are already at 1.
    fn is_reset_needed(&self, state: &SessionState) -> Result<bool, FixError> {
        Ok(self.session_id.begin_string >= FixVersion::Fix41
            && (self.config.reset_on_logon
                || self.config.reset_on_logout
                || self.config.reset_on_disconnect)
            && state.next_sender_msg_seq_num()? == 1
            && state.next_target_msg_seq_num()? == 1)
    }
}
