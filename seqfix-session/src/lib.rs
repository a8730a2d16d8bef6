/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # seqfix Session
//!
//! FIX session layer protocol implementation for the seqfix engine.
//!
//! This crate provides:
//! - **[`Session`]**: the per-counterparty state machine for sequenced,
//!   recoverable message exchange
//! - **Gap fill**: ResendRequest handling in both directions, with
//!   SequenceReset-GapFill emission and chunked recovery
//! - **Liveness**: heartbeat emission, test-request escalation and
//!   timeout-based disconnect
//! - **Seams**: [`Application`], [`Responder`], [`SessionSchedule`] and
//!   [`SessionStateListener`] traits
//! - **Configuration**: [`SessionConfig`] with every session setting

pub mod application;
pub mod config;
pub mod listener;
pub mod liveness;
pub mod resend;
pub mod responder;
pub mod schedule;
pub mod send;
pub mod session;
pub mod state;

pub use application::{Application, DoNotSend, NoOpApplication};
pub use config::SessionConfig;
pub use listener::{Listeners, SessionStateListener};
pub use responder::Responder;
pub use schedule::{NonStopSchedule, SessionSchedule, WeeklySchedule};
pub use session::{Session, extract_expected_sequence_number};
pub use state::SessionState;

#[cfg(test)]
mod tests;
