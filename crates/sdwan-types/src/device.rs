//! Device, port and connect point types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque device identifier, e.g. `of:0000000000000001`.
///
/// The identifier is never interpreted; it only has to be non-empty and
/// must not contain the `/` separator used by [`ConnectPoint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new device identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty, contains whitespace or
    /// contains a `/`.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
            return Err(ParseError::InvalidDeviceId(id));
        }
        Ok(DeviceId(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceId::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DeviceId::new(s)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> String {
        id.0
    }
}

/// Port number on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(u32);

impl PortNumber {
    /// Creates a port number.
    pub const fn new(port: u32) -> Self {
        PortNumber(port)
    }

    /// Returns the port number as a u32.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only plain decimal digits; `u32::from_str` would also accept a leading '+'.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidPortNumber(s.to_string()));
        }
        s.parse::<u32>()
            .map(PortNumber)
            .map_err(|_| ParseError::InvalidPortNumber(s.to_string()))
    }
}

impl From<u32> for PortNumber {
    fn from(port: u32) -> Self {
        PortNumber(port)
    }
}

/// A device + port pair.
///
/// Tunnel sites and link endpoints are both connect points. The textual form
/// is `"<deviceId>/<port>"` with exactly one separator.
///
/// # Examples
///
/// ```
/// use sdwan_types::ConnectPoint;
///
/// let cp: ConnectPoint = "of:0000000000000001/1".parse().unwrap();
/// assert_eq!(cp.device_id().as_str(), "of:0000000000000001");
/// assert_eq!(cp.port().as_u32(), 1);
///
/// assert!("of:1".parse::<ConnectPoint>().is_err());
/// assert!("of:1/1/1".parse::<ConnectPoint>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectPoint {
    device_id: DeviceId,
    port: PortNumber,
}

impl ConnectPoint {
    /// Creates a connect point from its parts.
    pub fn new(device_id: DeviceId, port: PortNumber) -> Self {
        Self { device_id, port }
    }

    /// Returns the device identifier.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the port number.
    pub fn port(&self) -> PortNumber {
        self.port
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.port)
    }
}

impl FromStr for ConnectPoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let (Some(device), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseError::InvalidConnectPoint(s.to_string()));
        };

        let device_id =
            DeviceId::new(device).map_err(|_| ParseError::InvalidConnectPoint(s.to_string()))?;
        let port = port
            .parse::<PortNumber>()
            .map_err(|_| ParseError::InvalidConnectPoint(s.to_string()))?;

        Ok(ConnectPoint::new(device_id, port))
    }
}

impl TryFrom<String> for ConnectPoint {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConnectPoint> for String {
    fn from(cp: ConnectPoint) -> String {
        cp.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_connect_point() {
        let cp: ConnectPoint = "of:0000000000000001/1".parse().unwrap();
        assert_eq!(cp.device_id().as_str(), "of:0000000000000001");
        assert_eq!(cp.port(), PortNumber::new(1));
    }

    #[test]
    fn test_parse_connect_point_rejects_bad_shapes() {
        for bad in ["of:1", "of:1/1/1", "/1", "of:1/", "of:1/x", "of:1/-1", "of:1/+1", ""] {
            assert_eq!(
                bad.parse::<ConnectPoint>(),
                Err(ParseError::InvalidConnectPoint(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_connect_point_display_round_trip() {
        let cp: ConnectPoint = "of:2/17".parse().unwrap();
        assert_eq!(cp.to_string(), "of:2/17");
    }

    #[test]
    fn test_device_id_validation() {
        assert!(DeviceId::new("of:1").is_ok());
        assert!(DeviceId::new("").is_err());
        assert!(DeviceId::new("of:1/2").is_err());
        assert!(DeviceId::new("of 1").is_err());
    }

    #[test]
    fn test_port_number_parse() {
        assert_eq!("42".parse::<PortNumber>().unwrap().as_u32(), 42);
        assert!("4294967296".parse::<PortNumber>().is_err());
        assert!("eth0".parse::<PortNumber>().is_err());
    }

    #[test]
    fn test_connect_point_serde() {
        let cp: ConnectPoint = serde_json::from_str("\"of:3/4\"").unwrap();
        assert_eq!(cp.device_id().as_str(), "of:3");
        assert_eq!(serde_json::to_string(&cp).unwrap(), "\"of:3/4\"");
        assert!(serde_json::from_str::<ConnectPoint>("\"of:3\"").is_err());
    }
}
