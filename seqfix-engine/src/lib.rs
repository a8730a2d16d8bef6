/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # seqfix Engine
//!
//! High-level engine facade for the seqfix FIX session implementation.
//!
//! This crate provides:
//! - **[`SessionManager`]**: the owned session registry (no global state)
//! - **[`EngineBuilder`] / [`Engine`]**: fluent assembly plus the tokio
//!   liveness ticker driving every session's timer path

pub mod builder;
pub mod manager;

pub use builder::{Engine, EngineBuilder};
pub use manager::SessionManager;
