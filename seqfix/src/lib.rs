/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # seqfix
//!
//! A FIX session engine: the per-counterparty state machine that enforces
//! sequenced, reliable, ordered message exchange over an arbitrary
//! bidirectional byte transport.
//!
//! This facade re-exports the workspace crates:
//! - [`core`](seqfix_core): field vocabulary, message representation,
//!   errors, identity types
//! - [`store`](seqfix_store): the message store seam and the in-memory
//!   implementation
//! - [`session`](seqfix_session): the session state machine, gap fill,
//!   liveness and the application/responder/schedule seams
//! - [`engine`](seqfix_engine): the session registry and liveness ticker
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use seqfix::prelude::*;
//!
//! let session_id = SessionId::new(
//!     FixVersion::Fix44,
//!     CompId::new("SERVER").unwrap(),
//!     CompId::new("CLIENT").unwrap(),
//! );
//! let session = Session::new(
//!     session_id,
//!     SessionConfig::acceptor(),
//!     Box::new(MemoryStore::new()),
//!     Arc::new(NoOpApplication),
//!     Arc::new(NonStopSchedule),
//! );
//! assert_eq!(session.expected_sender_num(), 1);
//! assert!(!session.is_logged_on());
//! ```

pub use seqfix_core as core;
pub use seqfix_engine as engine;
pub use seqfix_session as session;
pub use seqfix_store as store;

/// Commonly used types, re-exported in one place.
pub mod prelude {
    pub use seqfix_core::{
        CompId, FieldMap, FixError, FixVersion, Message, MsgType, SessionId, Timestamp, tags,
    };
    pub use seqfix_engine::{Engine, EngineBuilder, SessionManager};
    pub use seqfix_session::{
        Application, DoNotSend, NoOpApplication, NonStopSchedule, Responder, Session,
        SessionConfig, SessionSchedule, SessionStateListener, WeeklySchedule,
    };
    pub use seqfix_store::{MemoryStore, MessageStore};
}
