/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Application callback interface.
//!
//! This module defines the callback seam between the session engine and user
//! code, following the QuickFIX pattern. Inbound callbacks reject messages by
//! returning the matching [`SessionError`] variant; the session converts each
//! kind into the corresponding outbound protocol message.
//!
//! Callbacks are invoked from I/O, timer or user threads while the session
//! lock is held, so implementations must be thread-safe and must not call
//! back into the same session synchronously.

use seqfix_core::error::SessionError;
use seqfix_core::message::Message;
use seqfix_core::types::SessionId;

/// Signal from [`Application::to_app`] that a message must not be sent.
///
/// During a resend, a `DoNotSend` answer makes the engine cover the message
/// with an administrative SequenceReset-GapFill instead of retransmitting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoNotSend;

/// Application callback interface for session events and message traffic.
///
/// The capability methods [`can_logon`](Application::can_logon) and
/// [`on_before_session_reset`](Application::on_before_session_reset) have
/// default implementations so that simple applications only implement the
/// message path.
pub trait Application: Send + Sync {
    /// Called before an administrative message is sent, allowing the
    /// application to decorate it (e.g. credentials on Logon).
    ///
    /// # Arguments
    /// * `message` - The outgoing message (mutable)
    /// * `session_id` - The session identifier
    fn to_admin(&self, message: &mut Message, session_id: &SessionId);

    /// Called before an application message is sent.
    ///
    /// # Arguments
    /// * `message` - The outgoing message (mutable)
    /// * `session_id` - The session identifier
    ///
    /// # Errors
    /// Returns [`DoNotSend`] to veto transmission of this message.
    fn to_app(&self, message: &mut Message, session_id: &SessionId) -> Result<(), DoNotSend>;

    /// Called when an administrative message is accepted.
    ///
    /// # Arguments
    /// * `message` - The received message
    /// * `session_id` - The session identifier
    ///
    /// # Errors
    /// Returns `SessionError::RejectLogon` to refuse a Logon, or one of
    /// `IncorrectDataFormat` / `IncorrectTagValue` / `UnsupportedMessageType`
    /// to have the engine reject the message.
    fn from_admin(&self, message: &Message, session_id: &SessionId) -> Result<(), SessionError>;

    /// Called when an application message is accepted, in ascending
    /// MsgSeqNum order.
    ///
    /// # Arguments
    /// * `message` - The received message
    /// * `session_id` - The session identifier
    ///
    /// # Errors
    /// Returns one of `IncorrectDataFormat` / `IncorrectTagValue` /
    /// `UnsupportedMessageType` to have the engine reject the message.
    fn from_app(&self, message: &Message, session_id: &SessionId) -> Result<(), SessionError>;

    /// Called when the session completes a logon handshake.
    fn on_logon(&self, session_id: &SessionId);

    /// Called when the session logs out or the connection drops.
    fn on_logout(&self, session_id: &SessionId);

    /// Asked before an initiator generates a Logon; returning false defers
    /// the logon to a later timer tick.
    fn can_logon(&self, _session_id: &SessionId) -> bool {
        true
    }

    /// Called before the session resets state while a connection is live.
    fn on_before_session_reset(&self, _session_id: &SessionId) {}
}

/// Default no-op application implementation.
#[derive(Debug, Default)]
pub struct NoOpApplication;

impl Application for NoOpApplication {
    fn to_admin(&self, _message: &mut Message, _session_id: &SessionId) {}

    fn to_app(&self, _message: &mut Message, _session_id: &SessionId) -> Result<(), DoNotSend> {
        Ok(())
    }

    fn from_admin(&self, _message: &Message, _session_id: &SessionId) -> Result<(), SessionError> {
        Ok(())
    }

    fn from_app(&self, _message: &Message, _session_id: &SessionId) -> Result<(), SessionError> {
        Ok(())
    }

    fn on_logon(&self, _session_id: &SessionId) {}

    fn on_logout(&self, _session_id: &SessionId) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqfix_core::message::MsgType;
    use seqfix_core::types::{CompId, FixVersion};

    fn session_id() -> SessionId {
        SessionId::new(
            FixVersion::Fix44,
            CompId::new("SENDER").unwrap(),
            CompId::new("TARGET").unwrap(),
        )
    }

    #[test]
    fn test_noop_application() {
        let app = NoOpApplication;
        let id = session_id();
        let mut msg = Message::new(MsgType::Heartbeat);

        app.to_admin(&mut msg, &id);
        assert!(app.to_app(&mut msg, &id).is_ok());
        assert!(app.from_admin(&msg, &id).is_ok());
        assert!(app.from_app(&msg, &id).is_ok());
        assert!(app.can_logon(&id));
        app.on_before_session_reset(&id);
    }
}
