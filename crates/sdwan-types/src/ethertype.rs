//! Ethernet payload protocol identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ethernet type field, used as the tunnel payload protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EtherType(u16);

impl EtherType {
    pub const ARP: EtherType = EtherType(0x0806);
    pub const IPV4: EtherType = EtherType(0x0800);
    pub const IPV6: EtherType = EtherType(0x86dd);
    pub const MPLS_UNICAST: EtherType = EtherType(0x8847);

    /// Creates an ethertype from its raw value.
    pub const fn new(value: u16) -> Self {
        EtherType(value)
    }

    /// Returns the raw 16-bit value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the symbolic name for well-known ethertypes.
    pub const fn name(&self) -> Option<&'static str> {
        match self.0 {
            0x0806 => Some("arp"),
            0x0800 => Some("ipv4"),
            0x86dd => Some("ipv6"),
            0x8847 => Some("mpls"),
            _ => None,
        }
    }

    /// Returns true if the value is not one of the well-known names.
    pub const fn is_novel(&self) -> bool {
        self.name().is_none()
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}(0x{:04x})", name, self.0),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

impl FromStr for EtherType {
    type Err = ParseError;

    /// Accepts `arp`, `ipv4`, `ipv6`, `mpls` (any case, surrounding
    /// whitespace ignored), a `0x` hex value or a decimal value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "arp" => return Ok(EtherType::ARP),
            "ipv4" => return Ok(EtherType::IPV4),
            "ipv6" => return Ok(EtherType::IPV6),
            "mpls" => return Ok(EtherType::MPLS_UNICAST),
            _ => {}
        }

        let parsed = match value.strip_prefix("0x") {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => value.parse::<u16>(),
        };
        parsed
            .map(EtherType)
            .map_err(|_| ParseError::InvalidEtherType(s.to_string()))
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        EtherType(value)
    }
}

impl From<EtherType> for u16 {
    fn from(eth: EtherType) -> u16 {
        eth.0
    }
}
