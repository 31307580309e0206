use core::fmt::{self, Display, Formatter};

use embedded_svc::io::{Error, ErrorKind};

use enumset::{EnumSet, EnumSetType};

/// One independent failure condition of the modem session.
///
/// Flags are sticky: they stay set until the operation owning them runs
/// again, or until [`crate::modem::Sim9::power_on`] clears them all.
#[derive(EnumSetType, Debug)]
pub enum ErrorFlag {
    /// Factory reset, or the power key, failed during power-on
    Init,
    /// The modem did not confirm the power down
    Off,
    /// SIM PIN not ready
    Pin,
    /// IMEI unreadable
    Imei,
    /// Provider undetectable or no APN for it
    Apn,
    /// IP stack bring-up failed
    Tcpip,
    /// Not registered on the home network
    NetReg,
    /// Closing the data connection failed
    Disconnect,
    /// GPRS attach/detach failed
    Gprs,
    /// The `+++` escape sequence failed
    Escape,
    /// The `ATO` command failed
    Connect,
    /// No GPS fix available
    GpsNoFix,
}

impl Display for ErrorFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "initialization",
            Self::Off => "power off",
            Self::Pin => "SIM PIN",
            Self::Imei => "IMEI",
            Self::Apn => "APN",
            Self::Tcpip => "TCP/IP",
            Self::NetReg => "network registration",
            Self::Disconnect => "disconnect",
            Self::Gprs => "GPRS",
            Self::Escape => "escape sequence",
            Self::Connect => "connect",
            Self::GpsNoFix => "GPS no fix",
        };

        f.write_str(s)
    }
}

/// The error record of a modem session.
pub type Errors = EnumSet<ErrorFlag>;

/// Result-shaped view of a non-empty [`Errors`] record.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Sim9Error(pub Errors);

impl Sim9Error {
    pub fn flags(&self) -> Errors {
        self.0
    }

    pub fn contains(&self, flag: ErrorFlag) -> bool {
        self.0.contains(flag)
    }
}

impl Error for Sim9Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<ErrorFlag> for Sim9Error {
    fn from(flag: ErrorFlag) -> Self {
        Sim9Error(EnumSet::only(flag))
    }
}

impl Display for Sim9Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "modem failure:")?;

        for (index, flag) in self.0.iter().enumerate() {
            let sep = if index == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, flag)?;
        }

        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Sim9Error {}
