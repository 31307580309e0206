//! GPS position, on the modems of the family having a receiver (SIM908)

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use ::log::*;

use at_commands::parser::CommandParser;

use crate::at::Reply;
use crate::errors::ErrorFlag;
use crate::private::cstr::*;
use crate::transport::Transport;

use super::Sim9;

const CGPSINF_SIZE: usize = 96;

/// A coordinate is unset while the receiver reports only zeroes.
fn is_fix(coordinate: &str) -> bool {
    coordinate.bytes().any(|c| c.is_ascii_digit() && c != b'0')
}

fn store<const N: usize>(dst: &mut heapless::String<N>, src: &str) {
    dst.clear();

    for c in src.chars() {
        if dst.push(c).is_err() {
            break;
        }
    }
}

impl<T, P, D> Sim9<T, P, D>
where
    T: Transport,
    P: OutputPin,
    D: DelayNs,
{
    /// Latitude and longitude of the last fix, if any.
    pub fn gps_position(&self) -> Option<(&str, &str)> {
        if self.gps_lat.is_empty() || self.gps_lon.is_empty() {
            None
        } else {
            Some((self.gps_lat.as_str(), self.gps_lon.as_str()))
        }
    }

    /// Power the GPS receiver on.
    pub fn gps_on(&mut self) -> bool {
        self.port.send_at("AT+CGPSPWR=1", None, Reply::Ok)
    }

    /// Read the current position.
    ///
    /// The reply is `+CGPSINF: <mode>,<longitude>,<latitude>,...`, with
    /// zeroed coordinates when there is no fix.
    pub fn gps_fix(&mut self) {
        let mut buf = [0u8; CGPSINF_SIZE];

        self.gps_lat.clear();
        self.gps_lon.clear();

        if self
            .port
            .send_at("AT+CGPSINF=0", Some(&mut buf[..]), Reply::MessageOk)
        {
            let parsed = CommandParser::parse(to_str(&buf).as_bytes())
                .expect_identifier(b"+CGPSINF: ")
                .expect_int_parameter()
                .expect_raw_string()
                .finish();

            if let Ok((_mode, fix)) = parsed {
                // Decimal fields are beyond the parser, they come back raw
                let mut fields = fix.split(',');

                if let (Some(lon), Some(lat)) = (fields.next(), fields.next()) {
                    if is_fix(lon) && is_fix(lat) {
                        store(&mut self.gps_lon, lon);
                        store(&mut self.gps_lat, lat);
                    }
                }
            }
        }

        if self.gps_position().is_some() {
            debug!("GPS fix {},{}", self.gps_lat, self.gps_lon);
            self.errors.remove(ErrorFlag::GpsNoFix);
        } else {
            self.errors |= ErrorFlag::GpsNoFix;
        }
    }
}
