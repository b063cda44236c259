//! Error types for the transport layer

pub use gnss_core::{GnssError, GnssResult};
