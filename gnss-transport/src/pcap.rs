//! pcap capture replay transport implementation
//!
//! Opens a recorded network capture for offline replay and exposes its
//! packet records, in file order, as the same byte-stream abstraction the
//! other transports provide, so downstream decoding stays
//! transport-agnostic. Packet bytes are not interpreted here.

use crate::error::{GnssError, GnssResult};
use crate::stream::{RxStream, Transport, TransportKind};
use async_trait::async_trait;
use bytes::{Buf, Bytes};
use pcap_file::pcap::PcapReader;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

/// pcap capture replay settings
#[derive(Debug, Clone)]
pub struct PcapReplaySettings {
    pub path: PathBuf,
    pub timeout: Option<Duration>,
}

impl PcapReplaySettings {
    /// Create new pcap replay settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: None,
        }
    }
}

/// Read-only replay of a recorded pcap capture
///
/// Capture files are local and small relative to live link rates, so record
/// reads are performed inline rather than through a blocking pool.
pub struct PcapReplayTransport {
    reader: Option<PcapReader<File>>,
    /// Unconsumed remainder of the current packet record
    buffer: Bytes,
    settings: PcapReplaySettings,
}

impl PcapReplayTransport {
    /// Create a new pcap replay transport
    pub fn new(settings: PcapReplaySettings) -> Self {
        Self {
            reader: None,
            buffer: Bytes::new(),
            settings,
        }
    }

    /// Pull packet records until the buffer holds data or the capture is
    /// exhausted
    fn fill_buffer(&mut self) -> GnssResult<()> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => {
                return Err(GnssError::Connection(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "pcap capture not opened",
                )))
            }
        };
        while self.buffer.is_empty() {
            match reader.next_packet() {
                Some(Ok(packet)) => {
                    self.buffer = Bytes::copy_from_slice(&packet.data);
                }
                Some(Err(e)) => {
                    return Err(GnssError::Replay(format!("Reading pcap record failed: {e}")))
                }
                // Capture exhausted; report EOF through an empty buffer.
                None => break,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for PcapReplayTransport {
    async fn connect(&mut self) -> GnssResult<()> {
        self.reader = None;
        self.buffer = Bytes::new();

        log::info!(
            "Opening pcap file stream {}...",
            self.settings.path.display()
        );
        let file = File::open(&self.settings.path).map_err(|e| {
            log::error!(
                "Opening pcap file {} failed: {e}",
                self.settings.path.display()
            );
            GnssError::Connection(e)
        })?;
        let reader = PcapReader::new(file).map_err(|e| {
            log::error!(
                "Capture {} has no readable pcap header: {e}",
                self.settings.path.display()
            );
            GnssError::Replay(format!("Invalid pcap capture: {e}"))
        })?;
        self.reader = Some(reader);
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Pcap
    }
}

#[async_trait]
impl RxStream for PcapReplayTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> GnssResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> GnssResult<usize> {
        if self.buffer.is_empty() {
            self.fill_buffer()?;
        }
        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.advance(n);
        Ok(n)
    }

    async fn write(&mut self, _buf: &[u8]) -> GnssResult<usize> {
        Err(GnssError::Replay(
            "pcap replay is a read-only channel".to_string(),
        ))
    }

    async fn flush(&mut self) -> GnssResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    async fn close(&mut self) {
        // Release the capture handle first, then the buffered remainder.
        self.reader = None;
        self.buffer = Bytes::new();
    }
}
