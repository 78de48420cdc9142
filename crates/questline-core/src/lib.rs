//! Questline Core — shared abstractions for quest progress tracking.
//!
//! This crate defines the identifiers, the clock seam and the persistence
//! boundary that the progress context and its adapters depend on. It contains
//! no infrastructure code.

pub mod clock;
pub mod error;
pub mod ids;
pub mod repository;
