/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The outbound send pipeline.
//!
//! Every outgoing message funnels through [`Session::send_raw`] while the
//! session lock is held: header stamping, sequence assignment, application
//! callbacks, the logged-on send gate and the persist-then-increment
//! discipline all happen in one critical section so concurrent senders can
//! never interleave them.

use crate::session::Session;
use crate::state::SessionState;
use seqfix_core::error::FixError;
use seqfix_core::fields::tags;
use seqfix_core::message::{FieldMap, Message, MsgType};
use seqfix_core::types::{FixVersion, Timestamp};
use std::time::Instant;
use tracing::{debug, info};

impl Session {
    /// Sends an application or administrative message to the counterparty.
    ///
    /// Sequence number, identity fields and SendingTime are stamped
    /// automatically, overwriting anything already present; a stale
    /// PossDupFlag or OrigSendingTime is stripped. The returned flag means
    /// the bytes were queued for network I/O, not that they were delivered.
    pub fn send(&self, mut message: Message) -> bool {
        message.header.remove(tags::POSS_DUP_FLAG);
        message.header.remove(tags::ORIG_SENDING_TIME);
        let mut state = self.state.lock();
        self.send_raw(&mut state, message, 0).unwrap_or(false)
    }

    /// The single outbound funnel.
    ///
    /// With `override_seq == 0` a fresh sequence number is assigned, the
    /// rendered bytes are persisted and the sender counter advances. A
    /// nonzero `override_seq` re-sends under an existing number (resend
    /// path) and leaves counters and the store untouched.
    pub(crate) fn send_raw(
        &self,
        state: &mut SessionState,
        mut message: Message,
        override_seq: u64,
    ) -> Result<bool, FixError> {
        let msg_type = message.msg_type();
        self.initialize_header(state, &mut message.header)?;
        if override_seq > 0 {
            message.header.set_u64(tags::MSG_SEQ_NUM, override_seq);
        }

        if self.config.enable_last_msg_seq_num_processed
            && !message.header.is_set(tags::LAST_MSG_SEQ_NUM_PROCESSED)
        {
            let last_processed = state.next_target_msg_seq_num()?.saturating_sub(1);
            message
                .header
                .set_u64(tags::LAST_MSG_SEQ_NUM_PROCESSED, last_processed);
        }

        let mut result = false;
        let bytes;
        if message.is_admin() {
            let mut to_send = message;
            self.application.to_admin(&mut to_send, &self.session_id);

            if msg_type == Some(MsgType::Logon) && !state.reset_received {
                let reset_seq_num_flag = to_send
                    .body
                    .get_bool(tags::RESET_SEQ_NUM_FLAG)
                    .unwrap_or(false);
                if reset_seq_num_flag {
                    self.reset_state(state)?;
                    to_send
                        .header
                        .set_u64(tags::MSG_SEQ_NUM, state.next_sender_msg_seq_num()?);
                }
                state.reset_sent = reset_seq_num_flag;
            }

            bytes = to_send.encode()?;
            let always_allowed = matches!(
                msg_type,
                Some(
                    MsgType::Logon | MsgType::Logout | MsgType::ResendRequest | MsgType::SequenceReset
                )
            );
            if always_allowed || self.is_logged_on_locked(state) {
                result = self.send_to_responder(&bytes);
            }
        } else {
            let mut to_send = message;
            if self.application.to_app(&mut to_send, &self.session_id).is_err() {
                // DoNotSend: the sequence number was never consumed.
                return Ok(false);
            }
            bytes = to_send.encode()?;
            if self.is_logged_on_locked(state) {
                result = self.send_to_responder(&bytes);
            }
        }

        if override_seq == 0 {
            let assigned = state.next_sender_msg_seq_num()?;
            if self.config.persist_messages {
                state.set(assigned, &bytes)?;
            }
            state.incr_next_sender_msg_seq_num()?;
        }

        Ok(result)
    }

    /// Stamps the standard header: identity, fresh sequence number and
    /// SendingTime.
    pub(crate) fn initialize_header(
        &self,
        state: &mut SessionState,
        header: &mut FieldMap,
    ) -> Result<(), FixError> {
        state.last_sent_time = Instant::now();
        header.set_str(tags::BEGIN_STRING, self.session_id.begin_string.as_str());
        header.set_str(tags::SENDER_COMP_ID, self.session_id.sender_comp_id.as_str());
        if let Some(sub_id) = &self.session_id.sender_sub_id {
            header.set_str(tags::SENDER_SUB_ID, sub_id.as_str());
        }
        if let Some(location_id) = &self.session_id.sender_location_id {
            header.set_str(tags::SENDER_LOCATION_ID, location_id.as_str());
        }
        header.set_str(tags::TARGET_COMP_ID, self.session_id.target_comp_id.as_str());
        if let Some(sub_id) = &self.session_id.target_sub_id {
            header.set_str(tags::TARGET_SUB_ID, sub_id.as_str());
        }
        if let Some(location_id) = &self.session_id.target_location_id {
            header.set_str(tags::TARGET_LOCATION_ID, location_id.as_str());
        }
        header.set_u64(tags::MSG_SEQ_NUM, state.next_sender_msg_seq_num()?);
        self.insert_sending_time(header);
        Ok(())
    }

    pub(crate) fn insert_sending_time(&self, header: &mut FieldMap) {
        let include_millis = self.session_id.begin_string >= FixVersion::Fix42
            && self.config.milliseconds_in_timestamp;
        header.set_timestamp(tags::SENDING_TIME, Timestamp::now(), include_millis);
    }

    /// Pushes rendered bytes through the attached responder, if any.
    pub(crate) fn send_to_responder(&self, data: &[u8]) -> bool {
        let responder = self.responder.lock();
        match responder.as_ref() {
            None => {
                info!(
                    session_id = %self.session_id,
                    "No responder, not sending message"
                );
                false
            }
            Some(responder) => {
                debug!(
                    session_id = %self.session_id,
                    "outgoing: {}",
                    String::from_utf8_lossy(data).replace('\x01', "|")
                );
                responder.send(data)
            }
        }
    }
}
