//! Transport selection from configuration
//!
//! The owning driver selects exactly one transport at startup; everything
//! downstream only sees `Box<dyn Transport>`.

use crate::file::{FileReplaySettings, FileReplayTransport};
use crate::pcap::{PcapReplaySettings, PcapReplayTransport};
use crate::serial::{SerialSettings, SerialTransport};
use crate::stream::Transport;
use crate::tcp::{TcpSettings, TcpTransport};
use tokio_util::sync::CancellationToken;

/// Connection target, one variant per transport kind
#[derive(Debug, Clone)]
pub enum TransportConfig {
    Tcp(TcpSettings),
    Serial(SerialSettings),
    SbfFile(FileReplaySettings),
    Pcap(PcapReplaySettings),
}

/// Build the transport described by `config`
///
/// `shutdown` interrupts the serial open-retry loop; the other transports
/// never block long enough to need it.
pub fn create_transport(config: TransportConfig, shutdown: CancellationToken) -> Box<dyn Transport> {
    match config {
        TransportConfig::Tcp(settings) => Box::new(TcpTransport::new(settings)),
        TransportConfig::Serial(settings) => {
            Box::new(SerialTransport::with_shutdown(settings, shutdown))
        }
        TransportConfig::SbfFile(settings) => Box::new(FileReplayTransport::new(settings)),
        TransportConfig::Pcap(settings) => Box::new(PcapReplayTransport::new(settings)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::TransportKind;

    #[test]
    fn test_selects_the_configured_kind() {
        let cases = [
            (
                TransportConfig::Tcp(TcpSettings::new("192.168.3.1", 28784)),
                TransportKind::Tcp,
            ),
            (
                TransportConfig::Serial(SerialSettings::new("/dev/ttyACM0", 921600)),
                TransportKind::Serial,
            ),
            (
                TransportConfig::SbfFile(FileReplaySettings::new("rover.sbf")),
                TransportKind::SbfFile,
            ),
            (
                TransportConfig::Pcap(PcapReplaySettings::new("rover.pcap")),
                TransportKind::Pcap,
            ),
        ];
        for (config, kind) in cases {
            let transport = create_transport(config, CancellationToken::new());
            assert_eq!(transport.kind(), kind);
            assert!(transport.is_closed());
        }
    }
}
