//! SBF file replay transport implementation
//!
//! Plays a previously recorded raw-message (SBF) file back as if it were a
//! live receiver stream. A missing replay file is a configuration error,
//! not a transient condition, so there is no retry.

use crate::error::{GnssError, GnssResult};
use crate::stream::{RxStream, Transport, TransportKind};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// SBF file replay settings
#[derive(Debug, Clone)]
pub struct FileReplaySettings {
    pub path: PathBuf,
    pub timeout: Option<Duration>,
}

impl FileReplaySettings {
    /// Create new file replay settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: None,
        }
    }
}

/// Read-only replay of a recorded SBF file
pub struct FileReplayTransport {
    file: Option<File>,
    settings: FileReplaySettings,
}

impl FileReplayTransport {
    /// Create a new SBF file replay transport
    pub fn new(settings: FileReplaySettings) -> Self {
        Self {
            file: None,
            settings,
        }
    }
}

#[async_trait]
impl Transport for FileReplayTransport {
    async fn connect(&mut self) -> GnssResult<()> {
        self.file = None;

        log::info!("Opening SBF file stream {}...", self.settings.path.display());
        let file = File::open(&self.settings.path).await.map_err(|e| {
            log::error!("Opening SBF file {} failed: {e}", self.settings.path.display());
            GnssError::Connection(e)
        })?;
        self.file = Some(file);
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::SbfFile
    }
}

#[async_trait]
impl RxStream for FileReplayTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> GnssResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> GnssResult<usize> {
        let file = self.file.as_mut().ok_or_else(|| {
            GnssError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "SBF file not opened",
            ))
        })?;
        file.read(buf).await.map_err(GnssError::Connection)
    }

    async fn write(&mut self, _buf: &[u8]) -> GnssResult<usize> {
        Err(GnssError::Replay(
            "SBF file replay is a read-only channel".to_string(),
        ))
    }

    async fn flush(&mut self) -> GnssResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    async fn close(&mut self) {
        // Dropping the handle releases the descriptor.
        self.file = None;
    }
}
