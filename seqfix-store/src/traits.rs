/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message store trait definition.
//!
//! This module defines the abstract interface for message storage
//! implementations. The store is the authority for both sequence counters:
//! the session persists an outgoing message *before* advancing the sender
//! counter, so a crash between the two is recoverable on restart.

use bytes::Bytes;
use seqfix_core::error::StoreError;
use std::time::SystemTime;

/// Abstract interface for FIX message and sequence-number storage.
///
/// Implementations provide durable storage of outgoing messages (to answer
/// resend requests) and of the per-direction sequence counters. A store
/// instance is owned by exactly one session; it is not a coordination point
/// between sessions.
pub trait MessageStore: Send + Sync {
    /// Returns the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be read.
    fn next_sender_msg_seq_num(&self) -> Result<u64, StoreError>;

    /// Returns the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be read.
    fn next_target_msg_seq_num(&self) -> Result<u64, StoreError>;

    /// Sets the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be written.
    fn set_next_sender_msg_seq_num(&self, seq: u64) -> Result<(), StoreError>;

    /// Sets the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be written.
    fn set_next_target_msg_seq_num(&self, seq: u64) -> Result<(), StoreError>;

    /// Increments the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be written.
    fn incr_next_sender_msg_seq_num(&self) -> Result<(), StoreError>;

    /// Increments the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be written.
    fn incr_next_target_msg_seq_num(&self) -> Result<(), StoreError>;

    /// Stores an outgoing message for potential resend.
    ///
    /// # Arguments
    /// * `seq` - The message sequence number
    /// * `message` - The rendered message bytes
    ///
    /// # Errors
    /// Returns `StoreError` if the message cannot be stored.
    fn set(&self, seq: u64, message: &[u8]) -> Result<(), StoreError>;

    /// Retrieves stored messages in `[begin, end]`, appending them to `out`
    /// in ascending sequence order. Sequence numbers with no stored message
    /// are simply absent from the result; the caller treats them as gaps.
    ///
    /// # Arguments
    /// * `begin` - Begin sequence number (inclusive)
    /// * `end` - End sequence number (inclusive)
    /// * `out` - Output vector messages are appended to
    ///
    /// # Errors
    /// Returns `StoreError` if messages cannot be retrieved.
    fn get_range(&self, begin: u64, end: u64, out: &mut Vec<Bytes>) -> Result<(), StoreError>;

    /// Resets the store: clears all messages, resets both counters to 1 and
    /// updates the creation time.
    ///
    /// # Errors
    /// Returns `StoreError` if the reset fails.
    fn reset(&self) -> Result<(), StoreError>;

    /// Refreshes counters and messages from the backing storage, discarding
    /// any cached state. Supports simple failover for acceptors.
    ///
    /// # Errors
    /// Returns `StoreError` if the refresh fails.
    fn refresh(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Returns the instant the current session window began.
    fn creation_time(&self) -> SystemTime;

    /// Releases store resources.
    ///
    /// # Errors
    /// Returns `StoreError` if the close fails.
    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
