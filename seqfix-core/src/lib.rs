/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # seqfix Core
//!
//! Core types, field vocabulary and error definitions for the seqfix FIX
//! session engine.
//!
//! This crate provides the fundamental building blocks used across all
//! seqfix crates:
//! - **Error types**: unified error handling with `thiserror`
//! - **Field vocabulary**: session-layer tags, reject reasons
//! - **Message types**: [`FieldMap`], [`Message`], [`MsgType`]
//! - **Core types**: [`FixVersion`], [`CompId`], [`Timestamp`], [`SessionId`]

pub mod checksum;
pub mod error;
pub mod fields;
pub mod message;
pub mod types;

pub use error::{DecodeError, EncodeError, FixError, Result, SessionError, StoreError};
pub use fields::{BusinessRejectReason, EncryptMethod, SessionRejectReason, tags};
pub use message::{FieldMap, Message, MsgType, SOH};
pub use types::{CompId, FixVersion, SessionId, Timestamp};
