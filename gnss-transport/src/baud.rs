//! Baud rate table and incremental negotiation
//!
//! Receivers typically power up at a default baud rate different from the
//! operator-requested one, and some receiver firmwares reject large
//! single-step baud changes. The negotiation walks the supported rate table
//! upward, letting the UART re-lock after every step, until the line reports
//! the requested rate.

use crate::error::{GnssError, GnssResult};
use std::time::Duration;
use tokio::time;

/// Possible baud rates for the receiver, ascending
pub const BAUD_RATES: [u32; 21] = [
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 500000, 576000, 921600,
    1000000, 1152000, 1500000, 2000000, 2500000, 3000000, 3500000, 4000000,
];

/// Wait after each rate change, allowing the receiver's UART to re-lock
/// before the rate in effect is read back.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Get/set access to the baud rate of an open serial line
///
/// The seam between the negotiation algorithm and the OS serial attribute
/// calls; implemented by the live serial stream and by test fakes.
pub trait BaudLine {
    /// Read the baud rate currently in effect
    fn baud_rate(&self) -> tokio_serial::Result<u32>;

    /// Request a new baud rate
    ///
    /// The line may not adopt exactly the requested value; callers must
    /// read the rate back to learn what is actually in effect.
    fn set_baud_rate(&mut self, baud: u32) -> tokio_serial::Result<()>;
}

impl BaudLine for tokio_serial::SerialStream {
    fn baud_rate(&self) -> tokio_serial::Result<u32> {
        tokio_serial::SerialPort::baud_rate(self)
    }

    fn set_baud_rate(&mut self, baud: u32) -> tokio_serial::Result<()> {
        tokio_serial::SerialPort::set_baud_rate(self, baud)
    }
}

/// Step the line from its current baud rate to `target`, incrementally
///
/// Walks [`BAUD_RATES`] from the start. Entries the line has already passed
/// are skipped while the target is still above them; every other entry is
/// set, followed by a [`SETTLE_DELAY`] and a read-back of the rate actually
/// in effect. The target can be lower or higher than the current rate; the
/// loop handles both.
///
/// If the table is exhausted without reaching the target, the last observed
/// rate is accepted as the effective rate (receiver firmware baud support
/// varies) and the call still succeeds. A failure of the underlying get/set
/// attribute call is a hard error, returned immediately.
///
/// # Returns
///
/// The baud rate in effect when negotiation stopped.
pub async fn negotiate_baud_rate<L: BaudLine + ?Sized>(
    line: &mut L,
    target: u32,
) -> GnssResult<u32> {
    let mut current = line
        .baud_rate()
        .map_err(|e| GnssError::Negotiation(format!("reading current baud rate failed: {e}")))?;
    log::debug!("Current baud rate is {current}, gradually stepping to {target}");

    for &rate in BAUD_RATES.iter() {
        if current == target {
            break;
        }
        if current >= rate && target > rate {
            continue;
        }
        line.set_baud_rate(rate)
            .map_err(|e| GnssError::Negotiation(format!("setting baud rate {rate} failed: {e}")))?;
        time::sleep(SETTLE_DELAY).await;
        current = line
            .baud_rate()
            .map_err(|e| GnssError::Negotiation(format!("reading baud rate back failed: {e}")))?;
        log::debug!("Line reports {current} baud");
    }

    log::info!("Serial line settled at {current} baud");
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scriptable line: adopts every requested rate up to `max_rate`,
    /// ignores requests above it, and records each set call.
    struct FakeLine {
        current: u32,
        max_rate: u32,
        sets: Vec<u32>,
        fail_get: bool,
        fail_set: bool,
    }

    impl FakeLine {
        fn at(current: u32) -> Self {
            Self {
                current,
                max_rate: u32::MAX,
                sets: Vec::new(),
                fail_get: false,
                fail_set: false,
            }
        }
    }

    impl BaudLine for FakeLine {
        fn baud_rate(&self) -> tokio_serial::Result<u32> {
            if self.fail_get {
                return Err(tokio_serial::Error::new(
                    tokio_serial::ErrorKind::Io(std::io::ErrorKind::Other),
                    "tcgetattr failed",
                ));
            }
            Ok(self.current)
        }

        fn set_baud_rate(&mut self, baud: u32) -> tokio_serial::Result<()> {
            if self.fail_set {
                return Err(tokio_serial::Error::new(
                    tokio_serial::ErrorKind::Io(std::io::ErrorKind::Other),
                    "tcsetattr failed",
                ));
            }
            self.sets.push(baud);
            if baud <= self.max_rate {
                self.current = baud;
            }
            Ok(())
        }
    }

    #[test]
    fn test_table_strictly_increasing() {
        for pair in BAUD_RATES.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_at_target_performs_no_sets() {
        let mut line = FakeLine::at(115200);
        let rate = negotiate_baud_rate(&mut line, 115200).await.unwrap();
        assert_eq!(rate, 115200);
        assert!(line.sets.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_up_from_9600_to_115200() {
        let mut line = FakeLine::at(9600);
        let rate = negotiate_baud_rate(&mut line, 115200).await.unwrap();
        assert_eq!(rate, 115200);
        // Entries at or below the starting rate are skipped; the rest are
        // stepped through in ascending order up to the target.
        assert_eq!(line.sets, vec![19200, 38400, 57600, 115200]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_down_to_lower_target() {
        let mut line = FakeLine::at(115200);
        let rate = negotiate_baud_rate(&mut line, 9600).await.unwrap();
        assert_eq!(rate, 9600);
        assert_eq!(line.sets, vec![9600]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_entries_already_passed() {
        let mut line = FakeLine::at(57600);
        negotiate_baud_rate(&mut line, 460800).await.unwrap();
        for &set in &line.sets {
            assert!(
                set > 57600,
                "selected {set}, which the line had already passed"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_table_target_accepts_last_observed_rate() {
        // 250000 is not a table entry; the walk runs to the end of the
        // table and the final read-back is accepted, still a success.
        let mut line = FakeLine::at(9600);
        let rate = negotiate_baud_rate(&mut line, 250000).await.unwrap();
        assert_eq!(rate, *BAUD_RATES.last().unwrap());
        assert!(line.sets.len() <= BAUD_RATES.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_rates_terminate_with_best_effort() {
        // The line refuses everything above 115200; negotiation must still
        // terminate within one table pass and report what was achieved.
        let mut line = FakeLine::at(9600);
        line.max_rate = 115200;
        let rate = negotiate_baud_rate(&mut line, 230400).await.unwrap();
        assert_eq!(rate, 115200);
        assert!(line.sets.len() <= BAUD_RATES.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_failure_is_hard_error() {
        let mut line = FakeLine::at(9600);
        line.fail_get = true;
        let err = negotiate_baud_rate(&mut line, 115200).await.unwrap_err();
        assert!(matches!(err, GnssError::Negotiation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_failure_is_hard_error() {
        let mut line = FakeLine::at(9600);
        line.fail_set = true;
        let err = negotiate_baud_rate(&mut line, 115200).await.unwrap_err();
        assert!(matches!(err, GnssError::Negotiation(_)));
        assert!(line.sets.is_empty());
    }
}
