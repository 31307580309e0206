//! Driver for the SIM900 family of cellular modems
//!
//! The modem is driven with AT commands over a serial link, provided by a
//! [`transport::Transport`]. [`at::AtPort`] frames the replies and matches
//! them to the commands sent; [`modem::Sim9`] sequences the modem from power
//! on to an IP address, keeping track of what it reached in
//! [`status::Status`] and of what failed in [`errors::Errors`].

#![cfg_attr(not(feature = "std"), no_std)]

pub mod at;
pub mod errors;
#[cfg(feature = "std")]
pub mod log;
pub mod modem;
pub mod status;
pub mod transport;

mod private;
