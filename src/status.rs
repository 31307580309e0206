//! Operational status of the modem

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Network operator, as detected from `AT+COPS?`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Provider {
    #[default]
    None = 0,
    /// Any operator without a hard-coded APN
    Other = 1,
    Vodafone = 2,
    Tim = 3,
}

/// IP connection stage reported by `AT+CIPSTATUS`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TcpipStage {
    IpInitial = 0,
    IpStart = 1,
    IpConfig = 2,
    IpGprsAct = 3,
    IpStatus = 4,
    TcpConnecting = 5,
    ConnectOk = 6,
    TcpClosing = 7,
    TcpClosed = 8,
    PdpDeact = 9,
}

impl TcpipStage {
    const NAMES: [(&'static str, TcpipStage); 10] = [
        ("IP INITIAL", TcpipStage::IpInitial),
        ("IP START", TcpipStage::IpStart),
        ("IP CONFIG", TcpipStage::IpConfig),
        ("IP GPRSACT", TcpipStage::IpGprsAct),
        ("IP STATUS", TcpipStage::IpStatus),
        ("TCP CONNECTING", TcpipStage::TcpConnecting),
        ("CONNECT OK", TcpipStage::ConnectOk),
        ("TCP CLOSING", TcpipStage::TcpClosing),
        ("TCP CLOSED", TcpipStage::TcpClosed),
        ("PDP DEACT", TcpipStage::PdpDeact),
    ];

    /// Parse the state name following `STATE: `.
    pub fn from_state_name(name: &str) -> Option<Self> {
        let name = name.trim();

        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, stage)| *stage)
    }
}

/// How far the bring-up sequence got.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd)]
pub enum Stage {
    #[default]
    PoweredOff,
    PoweredOn,
    BaudAndUrcConfigured,
    FactoryReset,
    EchoConfigured,
    PinVerified,
    ImeiRetrieved,
    NetworkRegistered,
    GprsAttached,
    ApnSelected,
    WirelessConnected,
    AddressAssigned,
}

/// What the modem currently is.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Status {
    /// PIN ok and registered on the network
    pub ready: bool,
    /// GPRS attached
    pub gprs: bool,
    pub cid: bool,
    /// Bearer enabled
    pub sapbr: bool,
    /// HTTP stack enabled
    pub http: bool,
    pub provider: Provider,
    /// TCP/IP transparent mode
    pub transparent: bool,
    /// Last `AT+CIPSTATUS` stage code (0-9), advisory only
    pub tcpip: u8,
    /// Command echo
    pub echo: bool,
    /// On line (data mode)
    pub connected: bool,
}

impl Status {
    pub const fn new() -> Self {
        Self {
            ready: false,
            gprs: false,
            cid: false,
            sapbr: false,
            http: false,
            provider: Provider::None,
            transparent: false,
            tcpip: 0,
            echo: false,
            connected: false,
        }
    }

    pub fn tcpip_stage(&self) -> Option<TcpipStage> {
        TcpipStage::try_from(self.tcpip).ok()
    }
}
