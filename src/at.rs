//! AT command port
//!
//! Replies from the modem come framed as `[CR][LF]<text>[CR][LF]`, which the
//! transport queues as two lines: an empty one and the text. The empty ones
//! are noise and get dropped by [`AtPort::read_message`].
//!
//! Commands MUST be terminated with `\r`, never `\n`. With echo enabled the
//! modem sends the command back terminated by `\r` only, which does not
//! close a line, so [`AtPort::send_at`] injects a `\n` to get the echo framed.
//! A reply arriving before the injected `\n` ends up glued to the echo.

use embedded_hal::delay::DelayNs;

use ::log::*;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::private::cstr::*;
use crate::transport::Transport;

pub mod search;

pub use search::SearchMode;

/// Upper bound for the scratch buffers the port allocates on the stack.
pub const RX_SCRATCH_SIZE: usize = 128;

/// Poll period of [`AtPort::read_message`]; 100 ticks make a second.
const TICK_MS: u32 = 10;
const TICKS_PER_SEC: u32 = 1000 / TICK_MS;

/// Time given to the modem to echo the command, and to process it.
const SETTLE_MS: u32 = 100;

/// Response contract of a command sent with [`AtPort::send_at`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Reply {
    /// No answer expected.
    None = 0,
    /// `OK`
    Ok = 1,
    /// `<message>` then `OK`
    MessageOk = 2,
    /// `<message>` only, anything after it has to be searched by the caller
    Message = 3,
}

/// The modem side of the serial link.
pub struct AtPort<T, D> {
    pub(crate) transport: T,
    pub(crate) delay: D,
    echo: bool,
}

impl<T, D> AtPort<T, D>
where
    T: Transport,
    D: DelayNs,
{
    pub fn new(transport: T, delay: D) -> Self {
        Self {
            transport,
            delay,
            echo: false,
        }
    }

    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Whether the modem is expected to echo commands back.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Drop whatever garbage is left in the receive buffer.
    pub fn clear_rx(&mut self) {
        self.transport.clear_rx();
    }

    pub fn suspend(&mut self) {
        self.transport.suspend();
    }

    pub fn resume(&mut self) {
        self.transport.resume();
    }

    pub fn pending_lines(&self) -> usize {
        self.transport.pending_lines()
    }

    /// Attempt budget for a search: the lines already queued plus one.
    pub(crate) fn budget(&self) -> u8 {
        self.pending_lines().saturating_add(1).min(u8::MAX as usize) as u8
    }

    /// Send raw text to the modem.
    pub fn send(&mut self, s: &str) -> Result<(), T::Error> {
        debug!("-> {:?}", s);

        self.transport.write(s.as_bytes()).map_err(|e| {
            warn!("Write of {:?} failed: {:?}", s, e);
            e
        })
    }

    /// Get a message from the modem.
    ///
    /// Waits up to `timeout` seconds for a complete line and copies it into
    /// `buf`, terminating it over the trailing `[CR][LF]`. Lines made only
    /// of the framing are ignored and the wait goes on.
    ///
    /// Returns the received length, framing included, or 0 on timeout. A
    /// `buf` shorter than the line gets a truncated message.
    pub fn read_message(&mut self, buf: &mut [u8], timeout: u8) -> usize {
        let mut len = 0;

        for _ in 0..u32::from(timeout) * TICKS_PER_SEC {
            self.delay.delay_ms(TICK_MS);

            if self.transport.pending_lines() > 0 {
                len = match self.transport.read_line(buf) {
                    Ok(len) => len,
                    Err(e) => {
                        warn!("Read failed: {:?}", e);
                        0
                    }
                };

                // Ignore messages made only of [CR][LF]
                if len < 3 {
                    len = 0;
                } else {
                    break;
                }
            }
        }

        if len > 0 {
            buf[len - 2] = 0;
            debug!("<- {}", to_str(buf));
        }

        len
    }

    /// Wait up to `timeout` seconds for the char `c`.
    pub fn wait_for_char(&mut self, c: u8, timeout: u8) -> bool {
        let mut byte = [0u8; 1];

        for _ in 0..timeout {
            if matches!(self.transport.read(&mut byte), Ok(1)) && byte[0] == c {
                return true;
            }

            self.delay.delay_ms(1000);
        }

        false
    }

    /// Send an AT command and check its response.
    ///
    /// The command is terminated with `\r`. With echo enabled the echo is
    /// searched first; a missing echo fails the command but the reply is
    /// still consumed. For [`Reply::MessageOk`] the `OK` is only searched
    /// once the message arrived.
    ///
    /// `msg` receives the message of [`Reply::MessageOk`] and
    /// [`Reply::Message`]; without it the message is read into a scratch
    /// buffer and thrown away.
    pub fn send_at(&mut self, cmd: &str, msg: Option<&mut [u8]>, reply: Reply) -> bool {
        let mut ok = self.send(cmd).is_ok() && self.send("\r").is_ok();

        if self.echo {
            // The [LF] turns the echoed command into a complete line
            ok = self.send("\n").is_ok() && ok;

            self.delay.delay_ms(SETTLE_MS);

            let count = self.budget();
            ok = self.search_for(cmd, count, None, SearchMode::EqualOrError) && ok;
        }

        self.delay.delay_ms(SETTLE_MS);

        let mut scratch = [0u8; RX_SCRATCH_SIZE];
        let msg = msg.unwrap_or(&mut scratch[..]);

        match reply {
            Reply::None => (),
            Reply::Ok => ok = self.expect_ok() && ok,
            Reply::MessageOk => {
                let timeout = self.budget();
                let got = self.read_message(msg, timeout) > 0;
                ok = got && self.expect_ok() && ok;
            }
            Reply::Message => {
                let timeout = self.budget();
                ok = self.read_message(msg, timeout) > 0 && ok;
            }
        }

        ok
    }

    fn expect_ok(&mut self) -> bool {
        let count = self.budget();

        self.search_for("OK", count, None, SearchMode::EqualOrError)
    }
}
