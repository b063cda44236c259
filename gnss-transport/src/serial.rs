//! Serial port transport implementation
//!
//! Opens the receiver's device node, configures the line discipline and
//! negotiates the operator-requested baud rate. Device open is the one
//! place in the system with an unbounded retry: a freshly power-cycled
//! receiver may take an unbounded but short time to expose its device node,
//! and the caller has no better recovery path than to keep trying. The loop
//! is cancellable through a shutdown token.

use crate::baud::negotiate_baud_rate;
use crate::error::{GnssError, GnssResult};
use crate::stream::{RxStream, Transport, TransportKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time;
use tokio_serial::{DataBits, FlowControl, Parity, SerialStream, StopBits};
use tokio_util::sync::CancellationToken;

/// Backoff between attempts to open a missing device node
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Serial port transport layer settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Device node path, e.g. `/dev/ttyACM0`
    pub device: String,
    /// Operator-requested baud rate
    pub baud_rate: u32,
    /// `"RTS|CTS"` enables hardware flow control; anything else disables it
    pub hw_flow_control: String,
    pub timeout: Option<Duration>,
}

impl SerialSettings {
    /// Create new serial settings: no flow control, no read timeout
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            hw_flow_control: String::new(),
            timeout: None,
        }
    }

    /// Select the flow control mode from its configuration string
    pub fn with_flow_control(mut self, mode: impl Into<String>) -> Self {
        self.hw_flow_control = mode.into();
        self
    }

    fn flow_control(&self) -> FlowControl {
        if self.hw_flow_control == "RTS|CTS" {
            FlowControl::Hardware
        } else {
            FlowControl::None
        }
    }
}

/// Serial transport to a receiver's COM port
pub struct SerialTransport {
    stream: Option<SerialStream>,
    settings: SerialSettings,
    shutdown: CancellationToken,
}

impl SerialTransport {
    /// Create a new serial transport that can only be interrupted by
    /// process termination
    pub fn new(settings: SerialSettings) -> Self {
        Self::with_shutdown(settings, CancellationToken::new())
    }

    /// Create a new serial transport whose open-retry loop stops when
    /// `shutdown` is cancelled
    pub fn with_shutdown(settings: SerialSettings, shutdown: CancellationToken) -> Self {
        Self {
            stream: None,
            settings,
            shutdown,
        }
    }

    fn stream_mut(&mut self) -> GnssResult<&mut SerialStream> {
        self.stream.as_mut().ok_or_else(|| {
            GnssError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Serial stream not connected",
            ))
        })
    }
}

/// Retry `attempt` with a fixed backoff until it succeeds or `shutdown` is
/// cancelled
///
/// Each failed attempt is logged. The loop has no other exit: a missing
/// device node is treated as transient, not as a configuration error.
pub(crate) async fn open_with_retry<T, E, F>(
    shutdown: &CancellationToken,
    mut attempt: F,
) -> GnssResult<T>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    loop {
        match attempt() {
            Ok(opened) => return Ok(opened),
            Err(e) => {
                log::error!("Could not open serial port: {e}. Will retry every second.");
            }
        }
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Shutdown requested, giving up on serial port.");
                return Err(GnssError::Cancelled);
            }
            _ = time::sleep(OPEN_RETRY_DELAY) => {}
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> GnssResult<()> {
        // Re-connect drops any previous stream first.
        self.stream = None;

        log::info!(
            "Connecting serially to device {}, targeted baudrate: {}",
            self.settings.device,
            self.settings.baud_rate
        );

        // No parity, 8 data bits, 1 stop bit; the backend opens the port in
        // raw non-canonical mode with software flow control off.
        let builder = tokio_serial::new(&self.settings.device, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(self.settings.flow_control());

        let mut stream =
            open_with_retry(&self.shutdown, || SerialStream::open(&builder)).await?;

        #[cfg(target_os = "linux")]
        if let Err(e) = low_latency::set_low_latency(&stream) {
            log::warn!("Could not set the low latency flag: {e}");
        }

        let effective = negotiate_baud_rate(&mut stream, self.settings.baud_rate).await?;
        log::debug!("Line configured, effective baudrate {effective}");

        self.stream = Some(stream);
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }
}

#[async_trait]
impl RxStream for SerialTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> GnssResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> GnssResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        let n = if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| GnssError::Timeout)?
                .map_err(GnssError::Connection)?
        } else {
            stream.read(buf).await.map_err(GnssError::Connection)?
        };
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> GnssResult<usize> {
        let stream = self.stream_mut()?;
        stream.write(buf).await.map_err(GnssError::Connection)
    }

    async fn flush(&mut self) -> GnssResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(GnssError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.flush().await {
                log::warn!("Serial flush on close failed: {e}");
            }
        }
    }
}

/// `ASYNC_LOW_LATENCY` hint for the UART driver
#[cfg(target_os = "linux")]
mod low_latency {
    use nix::libc::{c_char, c_int, c_uchar, c_uint, c_ulong, c_ushort};
    use nix::{ioctl_read_bad, ioctl_write_ptr_bad};
    use std::os::fd::AsRawFd;

    // struct serial_struct from linux/serial.h
    #[repr(C)]
    #[derive(Clone, Copy)]
    struct SerialStruct {
        type_: c_int,
        line: c_int,
        port: c_uint,
        irq: c_int,
        flags: c_int,
        xmit_fifo_size: c_int,
        custom_divisor: c_int,
        baud_base: c_int,
        close_delay: c_ushort,
        io_type: c_char,
        reserved_char: [c_char; 1],
        hub6: c_int,
        closing_wait: c_ushort,
        closing_wait2: c_ushort,
        iomem_base: *mut c_uchar,
        iomem_reg_shift: c_ushort,
        port_high: c_uint,
        iomap_base: c_ulong,
    }

    const ASYNC_LOW_LATENCY: c_int = 1 << 13;

    ioctl_read_bad!(tiocgserial, nix::libc::TIOCGSERIAL, SerialStruct);
    ioctl_write_ptr_bad!(tiocsserial, nix::libc::TIOCSSERIAL, SerialStruct);

    /// Set the low latency flag on an open serial device. Not every UART
    /// driver implements the ioctl pair; callers treat failure as a hint
    /// that was not taken.
    pub(super) fn set_low_latency<F: AsRawFd>(port: &F) -> nix::Result<()> {
        let fd = port.as_raw_fd();
        let mut info: SerialStruct = unsafe { std::mem::zeroed() };
        unsafe { tiocgserial(fd, &mut info) }?;
        info.flags |= ASYNC_LOW_LATENCY;
        unsafe { tiocsserial(fd, &info) }?;
        Ok(())
    }
}
