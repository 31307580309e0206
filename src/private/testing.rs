//! Test doubles: a scripted modem on the serial side, the power key and time

extern crate std;

use core::convert::Infallible;

use std::collections::{HashMap, VecDeque};
use std::string::{String, ToString};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::modem::{Sim9, Sim9Conf};
use crate::transport::Transport;

const ESCAPE: &[u8] = b"+++";

/// A modem answering CR-terminated commands from a script.
///
/// Replies are framed the way the modem does it, `\r\n<text>\r\n`, and land
/// in a byte buffer which the transport splits on `\n`. With echo on, every
/// byte written is echoed back first, so an echoed command stays an
/// incomplete line until a `\n` is written.
pub struct ScriptedModem {
    echo: bool,
    rx: VecDeque<u8>,
    written: Vec<u8>,
    command: Vec<u8>,
    commands: Vec<String>,
    script: HashMap<String, VecDeque<Vec<String>>>,
    suspended: bool,
    capacity: usize,
}

impl ScriptedModem {
    pub fn new() -> Self {
        Self {
            echo: false,
            rx: VecDeque::new(),
            written: Vec::new(),
            command: Vec::new(),
            commands: Vec::new(),
            script: HashMap::new(),
            suspended: true,
            capacity: 64,
        }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Answer `command` with `replies`, every time it is sent.
    pub fn on(&mut self, command: &str, replies: &[&str]) {
        self.on_each(command, &[replies]);
    }

    /// Answer `command` with the next set of replies each time it is sent;
    /// the last set is repeated once the others are used up.
    pub fn on_each(&mut self, command: &str, replies: &[&[&str]]) {
        let sets = replies
            .iter()
            .map(|set| set.iter().map(|r| r.to_string()).collect())
            .collect();

        self.script.insert(command.to_string(), sets);
    }

    /// Queue `text` framed as a reply: `\r\n<text>\r\n`.
    pub fn push_reply(&mut self, text: &str) {
        self.push_raw(b"\r\n");
        self.push_line(text);
    }

    /// Queue `text` followed by `\r\n`.
    pub fn push_line(&mut self, text: &str) {
        self.push_raw(text.as_bytes());
        self.push_raw(b"\r\n");
    }

    pub fn push_raw(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Every byte written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Every command received so far, the escape sequence included.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// How many times `command` was received.
    pub fn count(&self, command: &str) -> usize {
        self.commands.iter().filter(|c| *c == command).count()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn received(&mut self, byte: u8) {
        self.written.push(byte);

        if self.echo {
            self.rx.push_back(byte);
        }

        match byte {
            b'\r' => {
                let command = String::from_utf8_lossy(&self.command).into_owned();
                self.command.clear();
                self.execute(command);
            }
            b'\n' => (),
            _ => {
                self.command.push(byte);

                if self.command == ESCAPE {
                    self.command.clear();
                    self.execute("+++".to_string());
                }
            }
        }
    }

    fn execute(&mut self, command: String) {
        if command.is_empty() {
            return;
        }

        let replies = match self.script.get_mut(&command) {
            Some(sets) if sets.len() > 1 => sets.pop_front(),
            Some(sets) => sets.front().cloned(),
            None => None,
        };

        self.commands.push(command);

        for reply in replies.unwrap_or_default() {
            self.push_reply(&reply);
        }
    }
}

impl Default for ScriptedModem {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ScriptedModem {
    type Error = Infallible;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for byte in bytes {
            self.received(*byte);
        }

        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut len = 0;

        while len < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => {
                    buf[len] = byte;
                    len += 1;
                }
                None => break,
            }
        }

        Ok(len)
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(end) = self.rx.iter().position(|b| *b == b'\n') else {
            return Ok(0);
        };

        let line: Vec<u8> = self.rx.drain(..=end).collect();
        let len = line.len().min(buf.len());

        buf[..len].copy_from_slice(&line[..len]);

        Ok(len)
    }

    fn pending_lines(&self) -> usize {
        self.rx.iter().filter(|b| **b == b'\n').count()
    }

    fn clear_rx(&mut self) {
        self.rx.clear();
    }

    fn rx_capacity(&self) -> usize {
        self.capacity
    }

    fn suspend(&mut self) {
        self.suspended = true;
    }

    fn resume(&mut self) {
        self.suspended = false;
    }
}

/// The power key, remembering every level it was driven to.
#[derive(Default)]
pub struct MockPin {
    pub levels: Vec<bool>,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}

/// Time that only passes on paper.
#[derive(Default)]
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_ns += u64::from(us) * 1_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ns += u64::from(ms) * 1_000_000;
    }
}

/// A session on a scripted modem, with echo off.
pub fn sim9(modem: ScriptedModem) -> Sim9<ScriptedModem, MockPin, MockDelay> {
    let conf = Sim9Conf {
        echo: false,
        apn: Default::default(),
    };

    Sim9::new(modem, MockPin::default(), MockDelay::new(), conf)
}
