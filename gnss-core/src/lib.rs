//! Core types and utilities for the GNSS receiver link
//!
//! This crate provides the error type and result alias shared by every
//! layer of the receiver link.

pub mod error;

pub use error::{GnssError, GnssResult};
