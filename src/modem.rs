//! SIM900 modem session
//!
//! [`Sim9`] owns the serial port, the power key and the delay provider, and
//! walks the modem through its bring-up:
//!
//! `PoweredOff -> PoweredOn -> BaudAndUrcConfigured -> FactoryReset ->
//! EchoConfigured -> PinVerified -> ImeiRetrieved -> NetworkRegistered`
//!
//! and then, with [`Sim9::tcpip_on`], up to `AddressAssigned`. Every step
//! after power-on is skipped once any error flag is set, leaving the modem
//! partially configured and the flags telling where it stopped.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use ::log::*;

use crate::at::{AtPort, Reply, SearchMode};
use crate::errors::{ErrorFlag, Errors, Sim9Error};
use crate::private::cstr::*;
use crate::status::{Stage, Status};
use crate::transport::Transport;

pub mod gprs;
pub mod gps;

pub const IMEI_SIZE: usize = 18;
pub const GPS_LAT_SIZE: usize = 12;
pub const GPS_LON_SIZE: usize = 12;

const TX_BUF_SIZE: usize = 64;

const PIN_READY: &[u8] = b"+CPIN: READY";
const HOME_NETWORK: &[u8] = b"+CGREG: 0,1";

const IMEI_RETRIES: u8 = 10;
const NETREG_RETRIES: u8 = 5;
const ESCAPE_RETRIES: u8 = 3;

/// Status LED blink pattern, plus the LED itself.
const NET_LIGHT: [&str; 4] = [
    "AT+SLEDS=1,53,790",
    "AT+SLEDS=2,53,2990",
    "AT+SLEDS=3,53,287",
    "AT+CNETLIGHT=1",
];

/// Credentials for operators without a built-in APN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnConf {
    pub site: &'static str,
    pub user: &'static str,
    pub password: &'static str,
}

impl Default for ApnConf {
    fn default() -> Self {
        Self {
            site: option_env!("SIM9_APN_OP").unwrap_or("internet"),
            user: option_env!("SIM9_APN_USER").unwrap_or(""),
            password: option_env!("SIM9_APN_PASSWORD").unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sim9Conf {
    /// Run the modem with command echo on (`ATE1`)
    pub echo: bool,
    pub apn: ApnConf,
}

impl Default for Sim9Conf {
    fn default() -> Self {
        Self {
            echo: cfg!(feature = "echo"),
            apn: Default::default(),
        }
    }
}

pub struct Sim9<T, P, D> {
    port: AtPort<T, D>,
    power: P,
    status: Status,
    errors: Errors,
    stage: Stage,
    imei: heapless::String<IMEI_SIZE>,
    gps_lat: heapless::String<GPS_LAT_SIZE>,
    gps_lon: heapless::String<GPS_LON_SIZE>,
    tx_buf: [u8; TX_BUF_SIZE],
    conf: Sim9Conf,
}

impl<T, P, D> Sim9<T, P, D>
where
    T: Transport,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(transport: T, power: P, delay: D, conf: Sim9Conf) -> Self {
        Self {
            port: AtPort::new(transport, delay),
            power,
            status: Status::new(),
            errors: Errors::empty(),
            stage: Stage::PoweredOff,
            imei: heapless::String::new(),
            gps_lat: heapless::String::new(),
            gps_lon: heapless::String::new(),
            tx_buf: [0; TX_BUF_SIZE],
            conf,
        }
    }

    /// Get the session in `slot`, creating it with `make` only when there
    /// is none yet.
    pub fn init<F>(slot: &mut Option<Self>, make: F) -> &mut Self
    where
        F: FnOnce() -> Self,
    {
        slot.get_or_insert_with(make)
    }

    /// Shut the session down, suspending the serial port and giving back
    /// what it was built from.
    pub fn release(mut self) -> (T, P, D) {
        self.port.suspend();

        let (transport, delay) = self.port.release();

        (transport, self.power, delay)
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn errors(&self) -> Errors {
        self.errors
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The IMEI, empty until [`Sim9::read_imei`] succeeds.
    pub fn imei(&self) -> &str {
        &self.imei
    }

    pub fn conf(&self) -> &Sim9Conf {
        &self.conf
    }

    /// `Err` with every error flag set, if any.
    pub fn check(&self) -> Result<(), Sim9Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Sim9Error(self.errors))
        }
    }

    /// Use the TCP/IP transparent mode on the next [`Sim9::tcpip_on`].
    pub fn set_transparent_mode(&mut self, transparent: bool) {
        self.status.transparent = transparent;
    }

    /// Direct access to the AT port, for commands not covered here.
    pub fn port(&mut self) -> &mut AtPort<T, D> {
        &mut self.port
    }

    /// Power the modem up and bring it to the network.
    ///
    /// Status and errors are cleared first. Takes from 11 to 16 seconds
    /// on a healthy modem, and much longer on a failing one.
    pub fn power_on(&mut self) {
        info!("Powering on");

        self.status = Status::new();
        self.errors = Errors::empty();
        self.stage = Stage::PoweredOff;

        self.port.set_echo(false);
        self.port.resume();

        if let Err(e) = self.power_key_pulse() {
            warn!("Power key failed: {:?}", e);
            self.errors |= ErrorFlag::Init;
        }

        // The modem may require 3 secs to start
        self.port.delay_ms(4000);
        self.port.clear_rx();

        if self.errors.is_empty() {
            self.stage = Stage::PoweredOn;
        }

        // All AT must be uppercase
        self.port.send_at("AT", None, Reply::Ok);
        self.port.send_at("AT+IPR=9600", None, Reply::Ok);
        self.port.send_at("AT+CIURC=1", None, Reply::Ok);

        if self.errors.is_empty() {
            self.stage = Stage::BaudAndUrcConfigured;
        }

        if !self
            .port
            .search_for("Call Ready", 60, None, SearchMode::Relaxed)
        {
            warn!("No Call Ready from the modem");
        }

        self.port.clear_rx();

        if self.port.send_at("AT&F&C0&D0", None, Reply::Ok) {
            if self.errors.is_empty() {
                self.stage = Stage::FactoryReset;
            }
        } else {
            warn!("Factory reset failed");
            self.errors |= ErrorFlag::Init;
        }

        self.configure_echo(self.conf.echo);

        for cmd in NET_LIGHT {
            self.port.send_at(cmd, None, Reply::Ok);
        }

        if self.errors.is_empty() {
            self.pin_check();
        }

        if self.errors.is_empty() {
            self.read_imei();
        }

        if self.errors.is_empty() {
            // Some time to register on the network
            self.port.delay_ms(5000);
            self.network_registered();
        }

        match self.check() {
            Ok(()) => info!("Powered on, IMEI {}", self.imei),
            Err(e) => warn!("Power on incomplete at {:?}: {}", self.stage, e),
        }
    }

    /// Power the modem down.
    pub fn power_off(&mut self) {
        info!("Powering off");

        let _ = self.port.send("AT+CPOWD=1\r");

        if self
            .port
            .search_for("NORMAL POWER DOWN", 5, None, SearchMode::Relaxed)
        {
            self.status.ready = false;
            self.errors.remove(ErrorFlag::Off);
            self.stage = Stage::PoweredOff;
        } else {
            warn!("Power down not confirmed");
            self.errors |= ErrorFlag::Off;
        }
    }

    /// Check the SIM is not waiting for a PIN.
    pub fn pin_check(&mut self) {
        let mut buf = [0u8; 20];

        if self
            .port
            .send_at("AT+CPIN?", Some(&mut buf[..]), Reply::MessageOk)
            && buf.starts_with(PIN_READY)
        {
            self.errors.remove(ErrorFlag::Pin);
            self.stage = Stage::PinVerified;
        } else {
            warn!("SIM not ready: {}", to_str(&buf));
            self.errors |= ErrorFlag::Pin;
        }
    }

    /// Read the IMEI, 15 to 17 digits.
    pub fn read_imei(&mut self) {
        // Room for the longest IMEI and its [CR][LF]
        let mut buf = [0u8; IMEI_SIZE + 2];

        self.imei.clear();
        self.errors |= ErrorFlag::Imei;
        self.port.clear_rx();

        for _ in 0..IMEI_RETRIES {
            if !self
                .port
                .send_at("AT+CGSN", Some(&mut buf[..]), Reply::MessageOk)
            {
                continue;
            }

            let imei = to_str(&buf);

            if imei.len() > 14 && self.imei.push_str(imei).is_ok() {
                self.errors.remove(ErrorFlag::Imei);
                self.stage = Stage::ImeiRetrieved;
                break;
            }
        }

        if self.errors.contains(ErrorFlag::Imei) {
            warn!("IMEI unreadable");
        }
    }

    /// Wait to be registered on the home network.
    pub fn network_registered(&mut self) {
        let mut buf = [0u8; 20];

        self.errors |= ErrorFlag::NetReg;

        for _ in 0..NETREG_RETRIES {
            // Registering takes a while
            self.port.delay_ms(2000);

            if self
                .port
                .send_at("AT+CGREG?", Some(&mut buf[..]), Reply::MessageOk)
                && buf.starts_with(HOME_NETWORK)
            {
                self.errors.remove(ErrorFlag::NetReg);
                self.status.ready = true;
                self.stage = Stage::NetworkRegistered;
                break;
            }
        }

        if self.errors.contains(ErrorFlag::NetReg) {
            warn!("Not registered on the home network: {}", to_str(&buf));
        }
    }

    /// Switch from data to command mode.
    ///
    /// The modem wants 1s of silence before `+++`, 0.5s after it and no
    /// more than 0.5s between the `+`.
    pub fn escape(&mut self) {
        for _ in 0..ESCAPE_RETRIES {
            if self.status.connected {
                self.port.delay_ms(1000);
                let _ = self.port.send("+++");
                self.port.delay_ms(500);

                if self.status.echo {
                    // Frame the echoed +++ as a line
                    let _ = self.port.send("\r\n");
                    self.port.search_for("+++", 30, None, SearchMode::Equal);
                } else {
                    // Long delays may happen
                    self.port.delay_ms(1000);
                }
            }

            if self.port.send_at("AT", None, Reply::Ok) {
                self.status.connected = false;
                break;
            }

            self.status.connected = true;
        }

        if self.status.connected {
            warn!("Still on line after the escape sequence");
            self.errors |= ErrorFlag::Escape;
        } else {
            self.errors.remove(ErrorFlag::Escape);
        }
    }

    /// Go back on line after an [`Sim9::escape`].
    pub fn connect(&mut self) -> bool {
        self.port.send_at("ATO", None, Reply::None);

        if self
            .port
            .search_for("CONNECT", 5, None, SearchMode::RelaxedOrError)
        {
            self.status.connected = true;
            self.errors.remove(ErrorFlag::Connect);
        } else {
            warn!("ATO failed");
            self.errors |= ErrorFlag::Connect;
        }

        self.status.connected
    }

    /// Leave the data mode and close the IP connection.
    pub fn disconnect(&mut self) {
        self.errors.remove(ErrorFlag::Disconnect);

        self.escape();

        let closed = !self.errors.contains(ErrorFlag::Escape)
            && self.port.send_at("AT+CIPSHUT", None, Reply::None)
            && self
                .port
                .search_for("SHUT OK", 5, None, SearchMode::RelaxedOrError);

        if closed {
            self.status.tcpip = 0;
            self.stage = self.stage.min(Stage::GprsAttached);
        } else {
            warn!("Disconnect failed");
            self.errors |= ErrorFlag::Disconnect;
        }
    }

    fn configure_echo(&mut self, echo: bool) {
        // After the factory reset the modem echoes, expect it
        self.status.echo = echo;
        self.port.set_echo(echo);

        let cmd = if echo { "ATE1" } else { "ATE0" };

        if self.port.send_at(cmd, None, Reply::Ok) && self.errors.is_empty() {
            self.stage = Stage::EchoConfigured;
        }
    }

    /// Start the modem with a 1 sec pulse __|--|__
    fn power_key_pulse(&mut self) -> Result<(), P::Error> {
        self.power.set_low()?;
        self.port.delay_ms(1000);
        self.power.set_high()?;
        self.port.delay_ms(1000);
        self.power.set_low()
    }
}
