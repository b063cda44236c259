//! Stream accessor trait for the transport layer

use crate::error::{GnssError, GnssResult};
use async_trait::async_trait;
use std::time::Duration;

/// Kind of channel a transport provides, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Serial,
    SbfFile,
    Pcap,
}

/// Stream accessor interface to access the byte stream of a receiver
#[async_trait]
pub trait RxStream: Send + Sync {
    /// Set the read timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> GnssResult<()>;

    /// Read data from the stream
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to read into
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> GnssResult<usize>;

    /// Read exact number of bytes from the stream
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to read into, will be filled completely
    ///
    /// # Returns
    ///
    /// Returns error if unable to read the exact number of bytes
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> GnssResult<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(GnssError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Failed to read exact number of bytes",
                )));
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Write data to the stream
    ///
    /// Replay transports are read-only and reject writes.
    async fn write(&mut self, buf: &[u8]) -> GnssResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> GnssResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(GnssError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> GnssResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    ///
    /// Idempotent: closing an already-closed transport is a no-op. Release
    /// failures are logged and never escalated.
    async fn close(&mut self);
}

/// Transport trait that extends RxStream with connection establishment
#[async_trait]
pub trait Transport: RxStream {
    /// Establish the channel described by the transport's settings
    ///
    /// Repeated calls re-open: any previously established stream is dropped
    /// first. On error no partial connection state is retained.
    async fn connect(&mut self) -> GnssResult<()>;

    /// The kind of channel this transport provides
    fn kind(&self) -> TransportKind;
}
