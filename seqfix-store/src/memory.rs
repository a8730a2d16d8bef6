/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory message store implementation.
//!
//! This module provides a simple in-memory message store suitable for
//! testing and for sessions that reset sequence numbers daily. All data is
//! lost when the process exits.

use crate::traits::MessageStore;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use seqfix_core::error::StoreError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// In-memory message store.
///
/// Stores messages in a `BTreeMap` for efficient range queries.
#[derive(Debug)]
pub struct MemoryStore {
    /// Stored messages indexed by sequence number.
    messages: RwLock<BTreeMap<u64, Bytes>>,
    /// Next outgoing sequence number.
    next_sender_seq: AtomicU64,
    /// Next expected incoming sequence number.
    next_target_seq: AtomicU64,
    /// Instant the current session window began; updated on reset.
    creation_time: Mutex<SystemTime>,
}

impl MemoryStore {
    /// Creates a new empty memory store with both counters at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(BTreeMap::new()),
            next_sender_seq: AtomicU64::new(1),
            next_target_seq: AtomicU64::new(1),
            creation_time: Mutex::new(SystemTime::now()),
        }
    }

    /// Creates a new memory store with initial sequence numbers.
    ///
    /// # Arguments
    /// * `sender_seq` - Initial sender sequence number
    /// * `target_seq` - Initial target sequence number
    #[must_use]
    pub fn with_initial_seqs(sender_seq: u64, target_seq: u64) -> Self {
        Self {
            messages: RwLock::new(BTreeMap::new()),
            next_sender_seq: AtomicU64::new(sender_seq),
            next_target_seq: AtomicU64::new(target_seq),
            creation_time: Mutex::new(SystemTime::now()),
        }
    }

    /// Returns the number of stored messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.read().len()
    }

    /// Checks if a message with the given sequence number exists.
    #[must_use]
    pub fn contains(&self, seq: u64) -> bool {
        self.messages.read().contains_key(&seq)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for MemoryStore {
    fn next_sender_msg_seq_num(&self) -> Result<u64, StoreError> {
        Ok(self.next_sender_seq.load(Ordering::SeqCst))
    }

    fn next_target_msg_seq_num(&self) -> Result<u64, StoreError> {
        Ok(self.next_target_seq.load(Ordering::SeqCst))
    }

    fn set_next_sender_msg_seq_num(&self, seq: u64) -> Result<(), StoreError> {
        self.next_sender_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    fn set_next_target_msg_seq_num(&self, seq: u64) -> Result<(), StoreError> {
        self.next_target_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    fn incr_next_sender_msg_seq_num(&self) -> Result<(), StoreError> {
        self.next_sender_seq.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn incr_next_target_msg_seq_num(&self) -> Result<(), StoreError> {
        self.next_target_seq.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set(&self, seq: u64, message: &[u8]) -> Result<(), StoreError> {
        self.messages
            .write()
            .insert(seq, Bytes::copy_from_slice(message));
        Ok(())
    }

    fn get_range(&self, begin: u64, end: u64, out: &mut Vec<Bytes>) -> Result<(), StoreError> {
        let messages = self.messages.read();
        out.extend(messages.range(begin..=end).map(|(_, bytes)| bytes.clone()));
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.messages.write().clear();
        self.next_sender_seq.store(1, Ordering::SeqCst);
        self.next_target_seq.store(1, Ordering::SeqCst);
        *self.creation_time.lock() = SystemTime::now();
        Ok(())
    }

    fn creation_time(&self) -> SystemTime {
        *self.creation_time.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_new() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sender_msg_seq_num().unwrap(), 1);
        assert_eq!(store.next_target_msg_seq_num().unwrap(), 1);
        assert_eq!(store.message_count(), 0);
    }

    #[test]
    fn test_store_and_retrieve() {
        let store = MemoryStore::new();

        store.set(1, b"message1").unwrap();
        store.set(2, b"message2").unwrap();
        store.set(3, b"message3").unwrap();

        assert_eq!(store.message_count(), 3);
        assert!(store.contains(2));
        assert!(!store.contains(4));

        let mut out = Vec::new();
        store.get_range(1, 3, &mut out).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(&out[0][..], b"message1");
    }

    #[test]
    fn test_get_range_skips_holes() {
        let store = MemoryStore::new();

        store.set(1, b"msg1").unwrap();
        store.set(2, b"msg2").unwrap();
        store.set(5, b"msg5").unwrap();

        let mut out = Vec::new();
        store.get_range(1, 5, &mut out).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(&out[2][..], b"msg5");
    }

    #[test]
    fn test_sequence_counters() {
        let store = MemoryStore::new();

        store.set_next_sender_msg_seq_num(10).unwrap();
        store.set_next_target_msg_seq_num(20).unwrap();
        store.incr_next_sender_msg_seq_num().unwrap();

        assert_eq!(store.next_sender_msg_seq_num().unwrap(), 11);
        assert_eq!(store.next_target_msg_seq_num().unwrap(), 20);
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = MemoryStore::with_initial_seqs(100, 200);
        store.set(1, b"msg1").unwrap();
        let created_before = store.creation_time();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.reset().unwrap();

        assert_eq!(store.message_count(), 0);
        assert_eq!(store.next_sender_msg_seq_num().unwrap(), 1);
        assert_eq!(store.next_target_msg_seq_num().unwrap(), 1);
        assert!(store.creation_time() > created_before);
    }
}
