/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Gap fill and resend handling.
//!
//! Two directions live here. Answering a peer's ResendRequest: replay
//! persisted application messages with PossDupFlag=Y, folding administrative
//! messages and application messages the callback refuses into
//! SequenceReset-GapFill runs. Recovering our own gaps: queue the too-high
//! message and ask the peer to resend the missing range, chunked when
//! configured.

use crate::session::Session;
use crate::state::SessionState;
use bytes::Bytes;
use seqfix_core::error::{DecodeError, FixError};
use seqfix_core::fields::tags;
use seqfix_core::message::{Message, MsgType};
use seqfix_core::types::{FixVersion, Timestamp};
use tracing::{error, info};

/// Open-range EndSeqNo sentinel used by FIX.4.1 and below.
const LEGACY_OPEN_RANGE_SENTINEL: u64 = 999_999;

impl Session {
    pub(crate) fn handle_resend_request(
        &self,
        state: &mut SessionState,
        message: &Message,
    ) -> Result<(), FixError> {
        if !self.verify(state, message, false, false)? {
            return Ok(());
        }

        let begin_seq_no =
            message
                .body
                .get_u64(tags::BEGIN_SEQ_NO)
                .ok_or(DecodeError::MissingRequiredField {
                    tag: tags::BEGIN_SEQ_NO,
                })?;
        let end_seq_no =
            message
                .body
                .get_u64(tags::END_SEQ_NO)
                .ok_or(DecodeError::MissingRequiredField {
                    tag: tags::END_SEQ_NO,
                })?;
        info!(
            session_id = %self.session_id,
            "Received ResendRequest FROM: {begin_seq_no} TO: {}",
            format_end_seq_num(end_seq_no)
        );
        self.manage_gap_fill(state, message, begin_seq_no, end_seq_no)
    }

    /// Answers a request (explicit ResendRequest, or inferred at logon) to
    /// fill `[begin_seq_no, end_seq_no]` of our outbound stream.
    pub(crate) fn manage_gap_fill(
        &self,
        state: &mut SessionState,
        received: &Message,
        begin_seq_no: u64,
        mut end_seq_no: u64,
    ) -> Result<(), FixError> {
        let begin_string = self.session_id.begin_string;
        let expected_sender_num = state.next_sender_msg_seq_num()?;

        // Normalize the open-range sentinel of either protocol generation.
        if (begin_string >= FixVersion::Fix42 && end_seq_no == 0)
            || (begin_string <= FixVersion::Fix41 && end_seq_no == LEGACY_OPEN_RANGE_SENTINEL)
            || end_seq_no >= expected_sender_num
        {
            end_seq_no = expected_sender_num - 1;
        }

        if !self.config.persist_messages {
            let new_seq_no = (end_seq_no + 1).min(expected_sender_num);
            self.generate_sequence_reset(state, Some(received), begin_seq_no, new_seq_no)?;
        } else {
            let mut stored: Vec<Bytes> = Vec::new();
            if let Err(store_err) = state.get_range(begin_seq_no, end_seq_no, &mut stored) {
                if !self.config.force_resend_when_corrupted_store {
                    return Err(store_err.into());
                }
                error!(
                    session_id = %self.session_id,
                    "Cannot read messages from store, resending heartbeats: {store_err}"
                );
                stored.clear();
                for seq in begin_seq_no..end_seq_no {
                    let mut heartbeat = Message::new(MsgType::Heartbeat);
                    self.initialize_header(state, &mut heartbeat.header)?;
                    heartbeat.header.set_u64(tags::MSG_SEQ_NUM, seq);
                    stored.push(heartbeat.encode()?.freeze());
                }
            }

            let mut msg_seq_num = 0u64;
            let mut gap_begin = 0u64;
            let mut current = begin_seq_no;

            for raw in &stored {
                let mut msg = Message::parse(raw)?;
                msg_seq_num =
                    msg.header
                        .get_u64(tags::MSG_SEQ_NUM)
                        .ok_or(DecodeError::MissingRequiredField {
                            tag: tags::MSG_SEQ_NUM,
                        })?;

                // A hole in the store starts (or extends) a gap.
                if current != msg_seq_num && gap_begin == 0 {
                    gap_begin = current;
                }

                if msg.is_admin() && !self.config.force_resend_when_corrupted_store {
                    if gap_begin == 0 {
                        gap_begin = msg_seq_num;
                    }
                } else {
                    self.initialize_resend_fields(&mut msg);
                    if self.resend_approved(&mut msg) {
                        if gap_begin != 0 {
                            self.generate_sequence_reset(
                                state,
                                Some(received),
                                gap_begin,
                                msg_seq_num,
                            )?;
                        }
                        info!(session_id = %self.session_id, "Resending message: {msg_seq_num}");
                        self.send_to_responder(&msg.encode()?);
                        gap_begin = 0;
                    } else if gap_begin == 0 {
                        gap_begin = msg_seq_num;
                    }
                }
                current = msg_seq_num + 1;
            }

            if gap_begin != 0 {
                self.generate_sequence_reset(state, Some(received), gap_begin, msg_seq_num + 1)?;
            }

            if end_seq_no > msg_seq_num {
                let new_seq_no = (end_seq_no + 1).min(state.next_sender_msg_seq_num()?);
                self.generate_sequence_reset(state, Some(received), begin_seq_no, new_seq_no)?;
            }
        }

        let request_seq_num = received.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);
        if !self.is_target_too_high(state, request_seq_num)?
            && !self.is_target_too_low(state, request_seq_num)?
        {
            state.incr_next_target_msg_seq_num()?;
        }
        Ok(())
    }

    /// Emits a SequenceReset-GapFill covering `[begin_seq_no, new_seq_no)`.
    ///
    /// The message reuses `begin_seq_no` as its own MsgSeqNum, so neither
    /// counters nor the store move.
    pub(crate) fn generate_sequence_reset(
        &self,
        state: &mut SessionState,
        received: Option<&Message>,
        begin_seq_no: u64,
        new_seq_no: u64,
    ) -> Result<(), FixError> {
        let mut sequence_reset = Message::new(MsgType::SequenceReset);
        sequence_reset.header.set_bool(tags::POSS_DUP_FLAG, true);
        let include_millis = self.session_id.begin_string >= FixVersion::Fix42
            && self.config.milliseconds_in_timestamp;
        sequence_reset
            .header
            .set_timestamp(tags::ORIG_SENDING_TIME, Timestamp::now(), include_millis);
        sequence_reset.body.set_u64(tags::NEW_SEQ_NO, new_seq_no);
        sequence_reset.body.set_bool(tags::GAP_FILL_FLAG, true);
        if self.config.enable_last_msg_seq_num_processed
            && let Some(received) = received
            && let Some(seq) = received.header.get_u64(tags::MSG_SEQ_NUM)
        {
            sequence_reset
                .header
                .set_u64(tags::LAST_MSG_SEQ_NUM_PROCESSED, seq);
        }
        self.send_raw(state, sequence_reset, begin_seq_no)?;
        info!(session_id = %self.session_id, "Sent SequenceReset TO: {new_seq_no}");
        Ok(())
    }

    /// Marks a stored message as a retransmission: PossDupFlag=Y,
    /// OrigSendingTime carries the original SendingTime, SendingTime is
    /// re-stamped to now.
    fn initialize_resend_fields(&self, message: &mut Message) {
        if let Some(original_sending_time) = message.header.get_str(tags::SENDING_TIME) {
            let original = original_sending_time.to_string();
            message.header.set_str(tags::ORIG_SENDING_TIME, original);
        }
        message.header.set_bool(tags::POSS_DUP_FLAG, true);
        self.insert_sending_time(&mut message.header);
    }

    /// Asks the application whether a stored message may be retransmitted.
    fn resend_approved(&self, message: &mut Message) -> bool {
        self.application.to_app(message, &self.session_id).is_ok()
    }

    /// Target sequence number ran ahead of us: queue the message and request
    /// the missing range.
    pub(crate) fn do_target_too_high(
        &self,
        state: &mut SessionState,
        message: &Message,
    ) -> Result<(), FixError> {
        let msg_seq_num = message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0);
        let expected = state.next_target_msg_seq_num()?;
        error!(
            session_id = %self.session_id,
            "MsgSeqNum too high, expecting {expected} but received {msg_seq_num}"
        );

        if self.reset_or_disconnect_if_required(state, Some(message))? {
            return Ok(());
        }

        state.enqueue(msg_seq_num, message.clone());
        info!(session_id = %self.session_id, "Enqueued at pos {msg_seq_num}: {message}");

        if state.is_resend_requested() {
            let range = state.resend_range();
            if !self.config.send_redundant_resend_requests && msg_seq_num >= range.0 {
                info!(
                    session_id = %self.session_id,
                    "Already sent ResendRequest FROM: {} TO: {}. Not sending another.",
                    range.0,
                    range.1
                );
                return Ok(());
            }
        }

        self.send_resend_request(state, expected, msg_seq_num - 1)
    }

    /// Emits a ResendRequest for `[begin_seq_no, end_seq_no]` and records
    /// the pending range.
    ///
    /// When a chunk size is configured only the first chunk is requested;
    /// the follow-up chunks are triggered as replayed messages arrive. On
    /// the wire, a request that reaches the real end of the gap uses the
    /// version's open-range sentinel unless closed ranges are forced.
    pub(crate) fn send_resend_request(
        &self,
        state: &mut SessionState,
        begin_seq_no: u64,
        end_seq_no: u64,
    ) -> Result<(), FixError> {
        let chunk = self.config.resend_request_chunk_size;
        let mut last_end_seq_no = if chunk == 0 {
            end_seq_no
        } else {
            begin_seq_no + chunk - 1
        };
        if last_end_seq_no > end_seq_no {
            last_end_seq_no = end_seq_no;
        }

        let wire_end_seq_no = if last_end_seq_no == end_seq_no && !self.config.closed_resend_interval
        {
            if self.session_id.begin_string >= FixVersion::Fix42 {
                0
            } else {
                LEGACY_OPEN_RANGE_SENTINEL
            }
        } else {
            last_end_seq_no
        };

        let mut resend_request = Message::new(MsgType::ResendRequest);
        resend_request.body.set_u64(tags::BEGIN_SEQ_NO, begin_seq_no);
        resend_request.body.set_u64(tags::END_SEQ_NO, wire_end_seq_no);
        self.send_raw(state, resend_request, 0)?;
        info!(
            session_id = %self.session_id,
            "Sent ResendRequest FROM: {begin_seq_no} TO: {last_end_seq_no}"
        );
        state.set_resend_range(
            begin_seq_no,
            end_seq_no,
            if chunk == 0 { 0 } else { last_end_seq_no },
        );
        Ok(())
    }
}

fn format_end_seq_num(seq: u64) -> String {
    if seq == 0 {
        "infinity".to_string()
    } else {
        seq.to_string()
    }
}
