//! Transport layer module for the GNSS receiver link
//!
//! This crate establishes the byte-stream channel between the driver and a
//! GNSS receiver (or a recording of one). Four transports are provided:
//! TCP, Serial (with incremental baud rate negotiation), SBF file replay
//! and pcap capture replay. All of them implement the same [`Transport`]
//! trait, so downstream decoding is transport-agnostic.

pub mod baud;
pub mod config;
pub mod error;
pub mod file;
pub mod pcap;
pub mod serial;
pub mod stream;
pub mod tcp;

pub use baud::BAUD_RATES;
pub use config::{create_transport, TransportConfig};
pub use error::{GnssError, GnssResult};
pub use file::{FileReplaySettings, FileReplayTransport};
pub use pcap::{PcapReplaySettings, PcapReplayTransport};
pub use serial::{SerialSettings, SerialTransport};
pub use stream::{RxStream, Transport, TransportKind};
pub use tcp::{TcpSettings, TcpTransport};
