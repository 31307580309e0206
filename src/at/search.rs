//! Searching the modem replies for a pattern

use embedded_hal::delay::DelayNs;

use ::log::*;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::private::cstr::*;
use crate::transport::Transport;

use super::{AtPort, RX_SCRATCH_SIZE};

const ERROR: &[u8] = b"ERROR";

/// How a message is matched against the searched pattern.
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SearchMode {
    /// The message starts with the pattern.
    Equal = 0,
    /// The pattern is anywhere in the message.
    Relaxed = 1,
    /// The message starts with the pattern, same as `Equal`.
    Strict = 2,
    /// `Equal`, giving up as soon as `ERROR` is received.
    EqualOrError = 3,
    /// `Relaxed`, giving up as soon as `ERROR` is received.
    RelaxedOrError = 4,
    /// `Strict`, giving up as soon as `ERROR` is received.
    StrictOrError = 5,
}

impl SearchMode {
    pub fn or_error(self) -> bool {
        matches!(
            self,
            Self::EqualOrError | Self::RelaxedOrError | Self::StrictOrError
        )
    }

    pub fn matches(self, message: &[u8], pattern: &[u8]) -> bool {
        match self {
            Self::Relaxed | Self::RelaxedOrError => contains(message, pattern),
            Self::Equal | Self::EqualOrError | Self::Strict | Self::StrictOrError => {
                message.starts_with(pattern)
            }
        }
    }
}

impl<T, D> AtPort<T, D>
where
    T: Transport,
    D: DelayNs,
{
    /// Search for a pattern in the messages from the modem.
    ///
    /// Up to `count` messages (at least one) are read, each one waited for
    /// at most a second, until one matches `pattern` according to `mode`.
    ///
    /// With `extbuf` the matching message is left there for the caller,
    /// otherwise a scratch buffer as large as the receive buffer is used.
    pub fn search_for(
        &mut self,
        pattern: &str,
        count: u8,
        extbuf: Option<&mut [u8]>,
        mode: SearchMode,
    ) -> bool {
        let mut scratch = [0u8; RX_SCRATCH_SIZE];

        let buf = match extbuf {
            Some(buf) => buf,
            None => {
                let size = self.transport.rx_capacity().min(RX_SCRATCH_SIZE);
                &mut scratch[..size]
            }
        };

        trace!("?: {} [{}/{}]", pattern, count, self.pending_lines());

        if let Some(first) = buf.first_mut() {
            *first = 0;
        }

        let mut found = false;

        for _ in 0..count.max(1) {
            if self.read_message(buf, 1) == 0 {
                continue;
            }

            let message = from_cstr(buf);

            if mode.matches(message, pattern.as_bytes()) {
                found = true;
                break;
            }

            // ERROR is not what we were looking for, stop here
            if mode.or_error() && message == ERROR {
                break;
            }
        }

        if found {
            trace!(" -[*]-");
        } else {
            debug!(
                " -[NOTFOUND!]- {} B[{}]",
                pattern,
                Printable(self.transport.rx_contents())
            );
        }

        found
    }
}
