/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! End-to-end session scenarios against a capturing responder and an
//! in-memory store.

use crate::application::{Application, DoNotSend};
use crate::config::SessionConfig;
use crate::responder::Responder;
use crate::schedule::NonStopSchedule;
use crate::session::Session;
use chrono::Utc;
use parking_lot::Mutex;
use seqfix_core::error::{FixError, SessionError};
use seqfix_core::fields::tags;
use seqfix_core::message::{Message, MsgType};
use seqfix_core::types::{CompId, FixVersion, SessionId, Timestamp};
use seqfix_store::MemoryStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct MockResponder {
    sent: Mutex<Vec<Vec<u8>>>,
    disconnected: AtomicBool,
}

impl MockResponder {
    fn sent(&self) -> Vec<Message> {
        self.sent
            .lock()
            .iter()
            .map(|bytes| Message::parse(bytes).expect("sent message should parse"))
            .collect()
    }

    fn sent_of_type(&self, msg_type: &MsgType) -> Vec<Message> {
        self.sent()
            .into_iter()
            .filter(|m| m.msg_type().as_ref() == Some(msg_type))
            .collect()
    }

    fn clear(&self) {
        self.sent.lock().clear();
    }

    fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl Responder for MockResponder {
    fn send(&self, data: &[u8]) -> bool {
        self.sent.lock().push(data.to_vec());
        true
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingApp {
    from_app_seqs: Mutex<Vec<u64>>,
    from_admin_types: Mutex<Vec<String>>,
    logons: AtomicUsize,
    logouts: AtomicUsize,
    veto_app_sends: AtomicBool,
}

impl Application for RecordingApp {
    fn to_admin(&self, _message: &mut Message, _session_id: &SessionId) {}

    fn to_app(&self, _message: &mut Message, _session_id: &SessionId) -> Result<(), DoNotSend> {
        if self.veto_app_sends.load(Ordering::SeqCst) {
            Err(DoNotSend)
        } else {
            Ok(())
        }
    }

    fn from_admin(&self, message: &Message, _session_id: &SessionId) -> Result<(), SessionError> {
        if let Some(msg_type) = message.header.get_str(tags::MSG_TYPE) {
            self.from_admin_types.lock().push(msg_type.to_string());
        }
        Ok(())
    }

    fn from_app(&self, message: &Message, _session_id: &SessionId) -> Result<(), SessionError> {
        self.from_app_seqs
            .lock()
            .push(message.header.get_u64(tags::MSG_SEQ_NUM).unwrap_or(0));
        Ok(())
    }

    fn on_logon(&self, _session_id: &SessionId) {
        self.logons.fetch_add(1, Ordering::SeqCst);
    }

    fn on_logout(&self, _session_id: &SessionId) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    session: Session,
    responder: Arc<MockResponder>,
    app: Arc<RecordingApp>,
}

fn fixture(config: SessionConfig) -> Fixture {
    let session_id = SessionId::new(
        FixVersion::Fix44,
        CompId::new("SERVER").unwrap(),
        CompId::new("CLIENT").unwrap(),
    );
    let app = Arc::new(RecordingApp::default());
    let session = Session::new(
        session_id,
        config,
        Box::new(MemoryStore::new()),
        app.clone(),
        Arc::new(NonStopSchedule),
    );
    let responder = Arc::new(MockResponder::default());
    session.set_responder(Some(responder.clone()));
    Fixture {
        session,
        responder,
        app,
    }
}

fn acceptor() -> Fixture {
    fixture(SessionConfig::acceptor())
}

/// Builds an inbound message carrying the peer's identity and a fresh
/// SendingTime.
fn inbound(msg_type: MsgType, seq: u64) -> Message {
    let mut message = Message::new(msg_type);
    message
        .header
        .set_str(tags::BEGIN_STRING, FixVersion::Fix44.as_str());
    message.header.set_str(tags::SENDER_COMP_ID, "CLIENT");
    message.header.set_str(tags::TARGET_COMP_ID, "SERVER");
    message.header.set_u64(tags::MSG_SEQ_NUM, seq);
    message
        .header
        .set_timestamp(tags::SENDING_TIME, Timestamp::now(), true);
    message
}

fn inbound_logon(seq: u64, heart_bt_int: u64) -> Message {
    let mut logon = inbound(MsgType::Logon, seq);
    logon.body.set_u64(tags::ENCRYPT_METHOD, 0);
    logon.body.set_u64(tags::HEART_BT_INT, heart_bt_int);
    logon
}

fn logged_on_acceptor() -> Fixture {
    let f = acceptor();
    f.session.receive(inbound_logon(1, 30)).unwrap();
    assert!(f.session.is_logged_on());
    f.responder.clear();
    f
}

// ----------------------------------------------------------------------
// Logon / logout lifecycle
// ----------------------------------------------------------------------

#[test]
fn test_acceptor_logon_handshake() {
    let f = acceptor();

    f.session.receive(inbound_logon(1, 30)).unwrap();

    let logons = f.responder.sent_of_type(&MsgType::Logon);
    assert_eq!(logons.len(), 1);
    let response = &logons[0];
    assert_eq!(response.header.get_u64(tags::MSG_SEQ_NUM), Some(1));
    assert_eq!(response.header.get_str(tags::SENDER_COMP_ID), Some("SERVER"));
    assert_eq!(response.header.get_str(tags::TARGET_COMP_ID), Some("CLIENT"));
    assert_eq!(response.body.get_u64(tags::ENCRYPT_METHOD), Some(0));
    assert_eq!(response.body.get_u64(tags::HEART_BT_INT), Some(30));

    assert!(f.session.is_logged_on());
    assert_eq!(f.session.expected_target_num(), 2);
    assert_eq!(f.app.logons.load(Ordering::SeqCst), 1);
}

#[test]
fn test_logon_with_reset_seq_num_flag_resets_counters() {
    let f = acceptor();
    f.session.set_next_sender_msg_seq_num(42).unwrap();
    f.session.set_next_target_msg_seq_num(37).unwrap();

    let mut logon = inbound_logon(1, 30);
    logon.body.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
    f.session.receive(logon).unwrap();

    assert!(f.session.is_logged_on());
    let response = &f.responder.sent_of_type(&MsgType::Logon)[0];
    assert_eq!(response.body.get_bool(tags::RESET_SEQ_NUM_FLAG), Some(true));
    // Counters restarted from 1: the logon response consumed 1, the peer's
    // logon consumed theirs.
    assert_eq!(f.session.expected_sender_num(), 2);
    assert_eq!(f.session.expected_target_num(), 2);
}

#[test]
fn test_first_message_must_be_logon() {
    let f = acceptor();

    f.session.receive(inbound(MsgType::News, 1)).unwrap();

    // Invalid logon state: the session hangs up without answering.
    assert!(f.responder.sent().is_empty());
    assert!(f.responder.is_disconnected());
}

#[test]
fn test_logout_handshake() {
    let f = logged_on_acceptor();

    f.session.receive(inbound(MsgType::Logout, 2)).unwrap();

    assert_eq!(f.responder.sent_of_type(&MsgType::Logout).len(), 1);
    assert!(f.responder.is_disconnected());
    assert!(!f.session.is_logged_on());
    assert_eq!(f.app.logouts.load(Ordering::SeqCst), 1);
    assert_eq!(f.session.expected_target_num(), 3);
}

#[test]
fn test_requested_logout_is_emitted_on_tick() {
    let f = logged_on_acceptor();

    f.session.logout_with_reason("end of day");
    f.session.next().unwrap();

    let logouts = f.responder.sent_of_type(&MsgType::Logout);
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].body.get_str(tags::TEXT), Some("end of day"));
    assert!(f.session.sent_logout());

    // The peer's logout response closes the conversation.
    f.session.receive(inbound(MsgType::Logout, 2)).unwrap();
    assert!(f.responder.is_disconnected());
}

#[test]
fn test_reset_on_logout() {
    let f = fixture(SessionConfig::acceptor().with_reset_on_logout(true));
    f.session.receive(inbound_logon(1, 30)).unwrap();
    f.session.send(Message::new(MsgType::News));
    assert!(f.session.expected_sender_num() > 1);

    f.session.receive(inbound(MsgType::Logout, 2)).unwrap();

    assert_eq!(f.session.expected_sender_num(), 1);
    assert_eq!(f.session.expected_target_num(), 1);
}

// ----------------------------------------------------------------------
// Gap detection and recovery
// ----------------------------------------------------------------------

#[test]
fn test_gap_detection_queues_and_requests_resend() {
    let f = logged_on_acceptor();
    f.session.set_next_target_msg_seq_num(5).unwrap();

    f.session.receive(inbound(MsgType::News, 8)).unwrap();

    let requests = f.responder.sent_of_type(&MsgType::ResendRequest);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.get_u64(tags::BEGIN_SEQ_NO), Some(5));
    assert_eq!(requests[0].body.get_u64(tags::END_SEQ_NO), Some(0));

    // Not delivered yet, still queued.
    assert!(f.app.from_app_seqs.lock().is_empty());
    assert_eq!(f.session.expected_target_num(), 5);
}

#[test]
fn test_gap_drains_queue_when_filled_with_real_messages() {
    let f = logged_on_acceptor();
    f.session.set_next_target_msg_seq_num(5).unwrap();
    f.session.receive(inbound(MsgType::News, 8)).unwrap();

    for seq in 5..=7 {
        f.session.receive(inbound(MsgType::News, seq)).unwrap();
    }

    assert_eq!(*f.app.from_app_seqs.lock(), vec![5, 6, 7, 8]);
    assert_eq!(f.session.expected_target_num(), 9);
}

#[test]
fn test_gap_drains_queue_when_filled_with_gap_fill() {
    let f = logged_on_acceptor();
    f.session.set_next_target_msg_seq_num(5).unwrap();
    f.session.receive(inbound(MsgType::News, 8)).unwrap();

    let mut reset = inbound(MsgType::SequenceReset, 5);
    reset.header.set_bool(tags::POSS_DUP_FLAG, true);
    reset
        .header
        .set_timestamp(tags::ORIG_SENDING_TIME, Timestamp::now(), true);
    reset.body.set_bool(tags::GAP_FILL_FLAG, true);
    reset.body.set_u64(tags::NEW_SEQ_NO, 8);
    f.session.receive(reset).unwrap();

    assert_eq!(*f.app.from_app_seqs.lock(), vec![8]);
    assert_eq!(f.session.expected_target_num(), 9);
}

#[test]
fn test_no_redundant_resend_request() {
    let f = logged_on_acceptor();
    f.session.set_next_target_msg_seq_num(5).unwrap();

    f.session.receive(inbound(MsgType::News, 8)).unwrap();
    f.session.receive(inbound(MsgType::News, 9)).unwrap();

    assert_eq!(f.responder.sent_of_type(&MsgType::ResendRequest).len(), 1);
}

#[test]
fn test_chunked_resend_requests() {
    let f = fixture(SessionConfig::acceptor().with_resend_request_chunk_size(2));
    f.session.receive(inbound_logon(1, 30)).unwrap();
    f.responder.clear();

    f.session.receive(inbound(MsgType::News, 8)).unwrap();

    let requests = f.responder.sent_of_type(&MsgType::ResendRequest);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.get_u64(tags::BEGIN_SEQ_NO), Some(2));
    assert_eq!(requests[0].body.get_u64(tags::END_SEQ_NO), Some(3));

    // Filling the first chunk triggers the next one.
    f.session.receive(inbound(MsgType::News, 2)).unwrap();
    f.session.receive(inbound(MsgType::News, 3)).unwrap();

    let requests = f.responder.sent_of_type(&MsgType::ResendRequest);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].body.get_u64(tags::BEGIN_SEQ_NO), Some(4));
    assert_eq!(requests[1].body.get_u64(tags::END_SEQ_NO), Some(5));
}

// ----------------------------------------------------------------------
// Answering peer resend requests
// ----------------------------------------------------------------------

#[test]
fn test_peer_resend_of_persisted_range() {
    let f = logged_on_acceptor();
    for i in 0..5 {
        let mut msg = Message::new(MsgType::News);
        msg.body.set_str(tags::TEXT, format!("news {i}"));
        assert!(f.session.send(msg));
    }
    assert_eq!(f.session.expected_sender_num(), 7);
    f.responder.clear();

    let mut request = inbound(MsgType::ResendRequest, 2);
    request.body.set_u64(tags::BEGIN_SEQ_NO, 2);
    request.body.set_u64(tags::END_SEQ_NO, 0);
    f.session.receive(request).unwrap();

    let replayed = f.responder.sent();
    assert_eq!(replayed.len(), 5);
    for (i, msg) in replayed.iter().enumerate() {
        assert_eq!(msg.msg_type(), Some(MsgType::News));
        assert_eq!(msg.header.get_u64(tags::MSG_SEQ_NUM), Some(2 + i as u64));
        assert_eq!(msg.header.get_bool(tags::POSS_DUP_FLAG), Some(true));
        assert!(msg.header.is_set(tags::ORIG_SENDING_TIME));
    }
    assert!(f.responder.sent_of_type(&MsgType::SequenceReset).is_empty());
    // The request itself was accounted for.
    assert_eq!(f.session.expected_target_num(), 3);
}

#[test]
fn test_peer_resend_folds_admin_messages_into_gap_fill() {
    let f = logged_on_acceptor();
    // Seq 2 is an admin heartbeat, seq 3 an application message.
    {
        let mut state = f.session.state.lock();
        f.session.generate_heartbeat(&mut state, None).unwrap();
    }
    f.session.send(Message::new(MsgType::News));
    f.responder.clear();

    let mut request = inbound(MsgType::ResendRequest, 2);
    request.body.set_u64(tags::BEGIN_SEQ_NO, 2);
    request.body.set_u64(tags::END_SEQ_NO, 0);
    f.session.receive(request).unwrap();

    let sent = f.responder.sent();
    assert_eq!(sent.len(), 2);
    // The heartbeat is covered by a gap fill 2 -> 3.
    assert_eq!(sent[0].msg_type(), Some(MsgType::SequenceReset));
    assert_eq!(sent[0].header.get_u64(tags::MSG_SEQ_NUM), Some(2));
    assert_eq!(sent[0].body.get_u64(tags::NEW_SEQ_NO), Some(3));
    assert_eq!(sent[0].body.get_bool(tags::GAP_FILL_FLAG), Some(true));
    // The application message is replayed.
    assert_eq!(sent[1].msg_type(), Some(MsgType::News));
    assert_eq!(sent[1].header.get_u64(tags::MSG_SEQ_NUM), Some(3));
}

#[test]
fn test_resend_without_persistence_answers_with_gap_fill() {
    let f = fixture(SessionConfig::acceptor().with_persist_messages(false));
    f.session.receive(inbound_logon(1, 30)).unwrap();
    f.session.send(Message::new(MsgType::News));
    f.session.send(Message::new(MsgType::News));
    f.responder.clear();

    let mut request = inbound(MsgType::ResendRequest, 2);
    request.body.set_u64(tags::BEGIN_SEQ_NO, 1);
    request.body.set_u64(tags::END_SEQ_NO, 0);
    f.session.receive(request).unwrap();

    let sent = f.responder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].msg_type(), Some(MsgType::SequenceReset));
    assert_eq!(sent[0].header.get_u64(tags::MSG_SEQ_NUM), Some(1));
    assert_eq!(sent[0].body.get_u64(tags::NEW_SEQ_NO), Some(4));
}

#[test]
fn test_do_not_send_folds_replay_into_gap_fill() {
    let f = logged_on_acceptor();
    f.session.send(Message::new(MsgType::News));
    f.app.veto_app_sends.store(true, Ordering::SeqCst);
    f.responder.clear();

    let mut request = inbound(MsgType::ResendRequest, 2);
    request.body.set_u64(tags::BEGIN_SEQ_NO, 2);
    request.body.set_u64(tags::END_SEQ_NO, 0);
    f.session.receive(request).unwrap();

    let sent = f.responder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].msg_type(), Some(MsgType::SequenceReset));
    assert_eq!(sent[0].body.get_u64(tags::NEW_SEQ_NO), Some(3));
}

// ----------------------------------------------------------------------
// Sequence reset
// ----------------------------------------------------------------------

#[test]
fn test_sequence_reset_advances_target() {
    let f = logged_on_acceptor();

    let mut reset = inbound(MsgType::SequenceReset, 2);
    reset.body.set_bool(tags::GAP_FILL_FLAG, true);
    reset.body.set_u64(tags::NEW_SEQ_NO, 10);
    f.session.receive(reset).unwrap();

    assert_eq!(f.session.expected_target_num(), 10);
}

#[test]
fn test_sequence_reset_backwards_is_rejected() {
    let f = logged_on_acceptor();
    f.session.set_next_target_msg_seq_num(5).unwrap();

    let mut reset = inbound(MsgType::SequenceReset, 5);
    reset.body.set_bool(tags::GAP_FILL_FLAG, true);
    reset.body.set_u64(tags::NEW_SEQ_NO, 2);
    f.session.receive(reset).unwrap();

    let rejects = f.responder.sent_of_type(&MsgType::Reject);
    assert_eq!(rejects.len(), 1);
    assert_eq!(
        rejects[0].body.get_u64(tags::SESSION_REJECT_REASON),
        Some(5) // value is incorrect
    );
    assert_eq!(rejects[0].body.get_u64(tags::REF_TAG_ID), Some(36));
}

// ----------------------------------------------------------------------
// Duplicates and sequence faults
// ----------------------------------------------------------------------

#[test]
fn test_poss_dup_too_low_is_dropped_silently() {
    let f = logged_on_acceptor();
    f.session.set_next_target_msg_seq_num(20).unwrap();

    let mut dup = inbound(MsgType::News, 15);
    dup.header.set_bool(tags::POSS_DUP_FLAG, true);
    dup.header.set_timestamp(
        tags::ORIG_SENDING_TIME,
        Timestamp::from_millis(Utc::now().timestamp_millis() - 1_000),
        true,
    );
    f.session.receive(dup).unwrap();

    assert!(f.responder.sent_of_type(&MsgType::Logout).is_empty());
    assert!(f.app.from_app_seqs.lock().is_empty());
    assert_eq!(f.session.expected_target_num(), 20);
}

#[test]
fn test_receiving_same_poss_dup_twice_advances_once() {
    let f = logged_on_acceptor();

    let mut msg = inbound(MsgType::News, 2);
    msg.header.set_bool(tags::POSS_DUP_FLAG, true);
    msg.header.set_timestamp(
        tags::ORIG_SENDING_TIME,
        Timestamp::from_millis(Utc::now().timestamp_millis() - 1_000),
        true,
    );
    f.session.receive(msg.clone()).unwrap();
    assert_eq!(f.session.expected_target_num(), 3);

    // The second delivery is now too low and gets dropped.
    f.session.receive(msg).unwrap();
    assert_eq!(f.session.expected_target_num(), 3);
    assert_eq!(*f.app.from_app_seqs.lock(), vec![2]);
}

#[test]
fn test_too_low_without_poss_dup_logs_out() {
    let f = logged_on_acceptor();

    let result = f.session.receive(inbound(MsgType::News, 1));

    assert!(matches!(
        result,
        Err(FixError::Session(SessionError::SequenceTooLow {
            expected: 2,
            received: 1
        }))
    ));
    let logouts = f.responder.sent_of_type(&MsgType::Logout);
    assert_eq!(logouts.len(), 1);
    assert_eq!(
        logouts[0].body.get_str(tags::TEXT),
        Some("MsgSeqNum too low, expecting 2 but received 1")
    );
}

#[test]
fn test_poss_dup_with_backdated_orig_sending_time_rejected() {
    let f = logged_on_acceptor();

    let mut dup = inbound(MsgType::News, 2);
    dup.header.set_bool(tags::POSS_DUP_FLAG, true);
    // OrigSendingTime after SendingTime is a contradiction.
    dup.header.set_timestamp(
        tags::ORIG_SENDING_TIME,
        Timestamp::from_millis(Utc::now().timestamp_millis() + 60_000),
        true,
    );
    f.session.receive(dup).unwrap();

    let rejects = f.responder.sent_of_type(&MsgType::Reject);
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].body.get_u64(tags::SESSION_REJECT_REASON), Some(10));
    assert_eq!(f.responder.sent_of_type(&MsgType::Logout).len(), 1);
}

#[test]
fn test_stale_sending_time_rejects_and_logs_out() {
    let f = logged_on_acceptor();

    let mut stale = inbound(MsgType::News, 2);
    stale.header.set_timestamp(
        tags::SENDING_TIME,
        Timestamp::from_millis(Utc::now().timestamp_millis() - 300_000),
        true,
    );
    f.session.receive(stale).unwrap();

    let sent = f.responder.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].msg_type(), Some(MsgType::Reject));
    assert_eq!(sent[0].body.get_u64(tags::SESSION_REJECT_REASON), Some(10));
    assert_eq!(sent[1].msg_type(), Some(MsgType::Logout));
}

#[test]
fn test_comp_id_mismatch_rejects_and_logs_out() {
    let f = logged_on_acceptor();

    let mut wrong = inbound(MsgType::News, 2);
    wrong.header.set_str(tags::SENDER_COMP_ID, "INTRUDER");
    f.session.receive(wrong).unwrap();

    let sent = f.responder.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].msg_type(), Some(MsgType::Reject));
    assert_eq!(sent[0].body.get_u64(tags::SESSION_REJECT_REASON), Some(9));
    assert_eq!(sent[1].msg_type(), Some(MsgType::Logout));
}

#[test]
fn test_wrong_begin_string_disconnects() {
    let f = logged_on_acceptor();

    let mut wrong = inbound(MsgType::News, 2);
    wrong.header.set_str(tags::BEGIN_STRING, "FIX.4.2");
    f.session.receive(wrong).unwrap();

    let logouts = f.responder.sent_of_type(&MsgType::Logout);
    assert_eq!(logouts.len(), 1);
    assert_eq!(
        logouts[0].body.get_str(tags::TEXT),
        Some("Incorrect BeginString")
    );
    assert!(f.responder.is_disconnected());
}

#[test]
fn test_missing_msg_seq_num_disconnects() {
    let f = logged_on_acceptor();

    let mut message = inbound(MsgType::News, 2);
    message.header.remove(tags::MSG_SEQ_NUM);
    f.session.receive(message).unwrap();

    let logouts = f.responder.sent_of_type(&MsgType::Logout);
    assert_eq!(logouts.len(), 1);
    assert_eq!(
        logouts[0].body.get_str(tags::TEXT),
        Some("Received message without MsgSeqNum")
    );
    assert!(f.responder.is_disconnected());
}

// ----------------------------------------------------------------------
// Heartbeat / test request
// ----------------------------------------------------------------------

#[test]
fn test_test_request_is_answered_with_heartbeat() {
    let f = logged_on_acceptor();

    let mut request = inbound(MsgType::TestRequest, 2);
    request.body.set_str(tags::TEST_REQ_ID, "PING-7");
    f.session.receive(request).unwrap();

    let heartbeats = f.responder.sent_of_type(&MsgType::Heartbeat);
    assert_eq!(heartbeats.len(), 1);
    assert_eq!(heartbeats[0].body.get_str(tags::TEST_REQ_ID), Some("PING-7"));
    assert_eq!(f.session.expected_target_num(), 3);
}

#[test]
fn test_liveness_escalation_and_timeout() {
    let config = SessionConfig::initiator().with_heart_bt_int(Duration::from_millis(50));
    let f = fixture(config);

    // First tick initiates the logon.
    f.session.next().unwrap();
    assert_eq!(f.responder.sent_of_type(&MsgType::Logon).len(), 1);

    f.session.receive(inbound_logon(1, 30)).unwrap();
    assert!(f.session.is_logged_on());
    f.responder.clear();

    // Past 1.5 intervals of silence: exactly one test request.
    std::thread::sleep(Duration::from_millis(80));
    f.session.next().unwrap();
    let test_requests = f.responder.sent_of_type(&MsgType::TestRequest);
    assert_eq!(test_requests.len(), 1);
    assert_eq!(test_requests[0].body.get_str(tags::TEST_REQ_ID), Some("TEST"));
    assert!(!f.responder.is_disconnected());

    // Past 2.4 intervals of silence: the connection is declared dead.
    std::thread::sleep(Duration::from_millis(60));
    f.session.next().unwrap();
    assert!(f.responder.is_disconnected());
    assert!(!f.session.is_logged_on());
}

#[test]
fn test_heartbeat_emitted_when_quiet() {
    let config = SessionConfig::initiator().with_heart_bt_int(Duration::from_millis(30));
    let f = fixture(config);
    f.session.next().unwrap();
    f.session.receive(inbound_logon(1, 30)).unwrap();
    f.responder.clear();

    // We are quiet but the peer keeps talking, so only a heartbeat goes out.
    std::thread::sleep(Duration::from_millis(40));
    f.session.receive(inbound(MsgType::News, 2)).unwrap();

    assert_eq!(f.responder.sent_of_type(&MsgType::Heartbeat).len(), 1);
    assert!(f.responder.sent_of_type(&MsgType::TestRequest).is_empty());
}

#[test]
fn test_disabled_heartbeat_check_only_warns() {
    let mut config = SessionConfig::initiator().with_heart_bt_int(Duration::from_millis(30));
    config.disable_heart_beat_check = true;
    let f = fixture(config);
    f.session.next().unwrap();
    f.session.receive(inbound_logon(1, 30)).unwrap();

    std::thread::sleep(Duration::from_millis(90));
    f.session.next().unwrap();

    assert!(!f.responder.is_disconnected());
}

// ----------------------------------------------------------------------
// Send pipeline
// ----------------------------------------------------------------------

#[test]
fn test_send_assigns_increasing_sequence_numbers() {
    let f = logged_on_acceptor();

    assert!(f.session.send(Message::new(MsgType::News)));
    assert!(f.session.send(Message::new(MsgType::News)));

    let sent = f.responder.sent();
    assert_eq!(sent[0].header.get_u64(tags::MSG_SEQ_NUM), Some(2));
    assert_eq!(sent[1].header.get_u64(tags::MSG_SEQ_NUM), Some(3));
    assert_eq!(f.session.expected_sender_num(), 4);
}

#[test]
fn test_send_strips_poss_dup_markers() {
    let f = logged_on_acceptor();

    let mut message = Message::new(MsgType::News);
    message.header.set_bool(tags::POSS_DUP_FLAG, true);
    message
        .header
        .set_timestamp(tags::ORIG_SENDING_TIME, Timestamp::now(), true);
    f.session.send(message);

    let sent = f.responder.sent();
    assert!(!sent[0].header.is_set(tags::POSS_DUP_FLAG));
    assert!(!sent[0].header.is_set(tags::ORIG_SENDING_TIME));
}

#[test]
fn test_do_not_send_aborts_without_consuming_sequence() {
    let f = logged_on_acceptor();
    f.app.veto_app_sends.store(true, Ordering::SeqCst);

    assert!(!f.session.send(Message::new(MsgType::News)));

    assert_eq!(f.session.expected_sender_num(), 2);
    assert!(f.responder.sent().is_empty());
}

#[test]
fn test_app_messages_not_transmitted_before_logon() {
    let f = acceptor();

    assert!(!f.session.send(Message::new(MsgType::News)));

    // Nothing on the wire, but the number is consumed and recoverable.
    assert!(f.responder.sent().is_empty());
    assert_eq!(f.session.expected_sender_num(), 2);
}

// ----------------------------------------------------------------------
// Reset and schedule
// ----------------------------------------------------------------------

#[test]
fn test_reset_restores_initial_state() {
    let f = logged_on_acceptor();
    f.session.send(Message::new(MsgType::News));

    f.session.reset().unwrap();

    assert_eq!(f.session.expected_sender_num(), 1);
    assert_eq!(f.session.expected_target_num(), 1);
    assert!(!f.session.is_logged_on());
    assert!(!f.session.sent_logon());
    // The live connection was torn down gracefully.
    assert!(f.responder.is_disconnected());
    assert_eq!(f.responder.sent_of_type(&MsgType::Logout).len(), 1);
}

#[test]
fn test_next_expected_seq_num_triggers_replay_at_logon() {
    let f = logged_on_acceptor();
    f.session.send(Message::new(MsgType::News));
    f.session.send(Message::new(MsgType::News));
    // Simulate a reconnect: the peer logs on again claiming it only got
    // our first two messages (logon response + first news).
    f.session.disconnect("test reconnect", false).unwrap();
    let responder = Arc::new(MockResponder::default());
    f.session.set_responder(Some(responder.clone()));

    let mut logon = inbound_logon(2, 30);
    logon.body.set_u64(tags::NEXT_EXPECTED_MSG_SEQ_NUM, 3);
    f.session.receive(logon).unwrap();

    let replayed: Vec<Message> = responder
        .sent()
        .into_iter()
        .filter(|m| m.msg_type() == Some(MsgType::News))
        .collect();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].header.get_u64(tags::MSG_SEQ_NUM), Some(3));
    assert_eq!(replayed[0].header.get_bool(tags::POSS_DUP_FLAG), Some(true));
}
