//! GPRS attach and TCP/IP stack bring-up

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use ::log::*;

use at_commands::{builder::CommandBuilder, parser::CommandParser};

use crate::at::{Reply, SearchMode};
use crate::errors::ErrorFlag;
use crate::private::cstr::*;
use crate::status::{Provider, Stage, TcpipStage};
use crate::transport::Transport;

use super::Sim9;

const ATTACHED: &[u8] = b"+CGATT: 1";
const CGATT_POLLS: u8 = 5;

const COPS_SIZE: usize = 30;
const CIFSR_SIZE: usize = 30;
const CIPSTATUS_SIZE: usize = 40;

const VODAFONE_APN: &str = "web.omnitel.it";
const TIM_APN: &str = "ibox.tim.it";

/// Tell the operator from an `AT+COPS?` reply, `+COPS: 0,0,"I TIM"`.
///
/// Only the two operators with a built-in APN are recognized, by the name
/// at its fixed position in the reply.
pub fn provider_from_cops(cops: &[u8]) -> Provider {
    if cops.get(12..17) == Some(b"I TIM".as_slice()) {
        Provider::Tim
    } else if cops.get(13..18) == Some(b"odafo".as_slice()) {
        // [V,v]odafone
        Provider::Vodafone
    } else {
        Provider::Other
    }
}

impl<T, P, D> Sim9<T, P, D>
where
    T: Transport,
    P: OutputPin,
    D: DelayNs,
{
    /// Query the GPRS attach state into `status.gprs`.
    pub fn check_cgatt(&mut self) {
        let mut buf = [0u8; 15];

        if self
            .port
            .send_at("AT+CGATT?", Some(&mut buf[..]), Reply::MessageOk)
        {
            self.status.gprs = buf.starts_with(ATTACHED);
        } else {
            self.errors |= ErrorFlag::Gprs;
        }
    }

    /// Attach to the GPRS network.
    pub fn gprs_connect(&mut self) {
        self.gprs_attach(true);

        if self.status.gprs && self.errors.is_empty() {
            self.stage = self.stage.max(Stage::GprsAttached);
        }
    }

    /// Detach from the GPRS network.
    pub fn gprs_disconnect(&mut self) {
        self.gprs_attach(false);

        if !self.status.gprs {
            self.stage = self.stage.min(Stage::NetworkRegistered);
        }
    }

    /// Detect the operator, from the `AT+COPS?` reply.
    pub fn apn_setup(&mut self) {
        let mut buf = [0u8; COPS_SIZE];

        self.port.send_at("AT+COPS?", None, Reply::None);

        if self
            .port
            .search_for("+COPS:", 5, Some(&mut buf[..]), SearchMode::Relaxed)
        {
            self.status.provider = provider_from_cops(from_cstr(&buf));
            self.port.search_for("OK", 5, None, SearchMode::Relaxed);

            info!("Operator {:?}", self.status.provider);
        } else {
            warn!("Operator unknown");
            self.status.provider = Provider::None;
            self.errors |= ErrorFlag::Apn;
        }
    }

    /// Start the task with the APN of the detected operator.
    pub fn apn_select(&mut self) {
        if !self.errors.is_empty() {
            return;
        }

        let apn = &self.conf.apn;

        let (site, login) = match self.status.provider {
            Provider::Other => (apn.site, Some((apn.user, apn.password))),
            Provider::Vodafone => (VODAFONE_APN, None),
            Provider::Tim => (TIM_APN, None),
            Provider::None => {
                warn!("No operator, no APN");
                self.errors |= ErrorFlag::Apn;
                return;
            }
        };

        let builder = CommandBuilder::create_set(&mut self.tx_buf[..], true)
            .named("+CSTT")
            .with_string_parameter(site);

        let builder = match login {
            Some((user, password)) => builder
                .with_string_parameter(user)
                .with_string_parameter(password),
            None => builder,
        };

        // Terminated by the port
        let Some(cmd) = builder
            .finish_with(b"")
            .ok()
            .and_then(|cmd| core::str::from_utf8(cmd).ok())
        else {
            warn!("APN {} too long", site);
            self.errors |= ErrorFlag::Apn;
            return;
        };

        if self.port.send_at(cmd, None, Reply::Ok) {
            self.stage = self.stage.max(Stage::ApnSelected);
        }
    }

    /// Bring up the wireless connection.
    pub fn gprs_wireless_connection(&mut self) {
        if self.port.send_at("AT+CIICR", None, Reply::Ok) {
            self.stage = self.stage.max(Stage::WirelessConnected);
        } else {
            warn!("Wireless connection failed");
            self.errors |= ErrorFlag::Tcpip;
        }
    }

    /// Activate the TCP/IP stack: attach, select the APN, connect and get
    /// an address.
    ///
    /// The transparent mode is taken from [`Sim9::set_transparent_mode`].
    /// Nothing is sent while an earlier failure is pending.
    pub fn tcpip_on(&mut self) {
        self.errors
            .remove_all(ErrorFlag::Tcpip | ErrorFlag::Gprs | ErrorFlag::Apn);

        if let Err(e) = self.check() {
            warn!("TCP/IP not started: {}", e);
            return;
        }

        info!("Starting TCP/IP");

        self.port.send_at("AT+CIPCCFG?", None, Reply::Ok);

        let mode = if self.status.transparent {
            "AT+CIPMODE=1"
        } else {
            "AT+CIPMODE=0"
        };

        self.port.send_at(mode, None, Reply::Ok);

        self.gprs_connect();

        if self.status.gprs {
            self.apn_setup();
        }

        self.apn_select();

        if self.errors.is_empty() {
            self.gprs_wireless_connection();
        }

        if self.errors.is_empty() {
            let mut buf = [0u8; CIFSR_SIZE];

            if self
                .port
                .send_at("AT+CIFSR", Some(&mut buf[..]), Reply::Message)
            {
                info!("Address {}", to_str(&buf));
                self.stage = self.stage.max(Stage::AddressAssigned);
            }
        }

        if let Err(e) = self.check() {
            warn!("TCP/IP not started at {:?}: {}", self.stage, e);
        }
    }

    /// Query the IP connection state into `status.tcpip`.
    pub fn tcpip_status(&mut self) -> Option<TcpipStage> {
        let mut buf = [0u8; CIPSTATUS_SIZE];

        if !self.port.send_at("AT+CIPSTATUS", None, Reply::Ok)
            || !self
                .port
                .search_for("STATE:", 5, Some(&mut buf[..]), SearchMode::Relaxed)
        {
            return None;
        }

        let stage = CommandParser::parse(to_str(&buf).as_bytes())
            .expect_identifier(b"STATE: ")
            .expect_raw_string()
            .finish()
            .ok()
            .and_then(|(name,)| TcpipStage::from_state_name(name));

        match stage {
            Some(stage) => self.status.tcpip = stage.into(),
            None => warn!("Unknown IP state: {}", to_str(&buf)),
        }

        stage
    }

    /// Is the IP connection in `stage`.
    pub fn check_connection(&mut self, stage: TcpipStage) -> bool {
        self.tcpip_status() == Some(stage)
    }

    fn gprs_attach(&mut self, attach: bool) {
        self.errors.remove(ErrorFlag::Gprs);

        let cmd = if attach { "AT+CGATT=1" } else { "AT+CGATT=0" };

        if self.port.send_at(cmd, None, Reply::Ok) {
            for _ in 0..CGATT_POLLS {
                self.check_cgatt();

                if self.status.gprs == attach {
                    break;
                }
            }
        } else {
            warn!("{} failed", cmd);
            self.errors |= ErrorFlag::Gprs;
        }
    }
}
