//! Common SD-WAN types for label-switched tunnel orchestration.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the tunnel orchestrator and its collaborators:
//!
//! - [`DeviceId`]: opaque device identifier (e.g. `of:0000000000000001`)
//! - [`PortNumber`]: device port number
//! - [`ConnectPoint`]: a device + port pair, parsed from `"<device>/<port>"`
//! - [`Link`] and [`Path`]: directed links and the paths built from them
//! - [`MplsLabel`]: 20-bit MPLS / segment-routing transport label
//! - [`EtherType`]: payload protocol identifier

mod device;
mod ethertype;
mod label;
mod link;

pub use device::{ConnectPoint, DeviceId, PortNumber};
pub use ethertype::EtherType;
pub use label::MplsLabel;
pub use link::{Link, Path};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid device id: {0:?}")]
    InvalidDeviceId(String),

    #[error("invalid port number: {0:?}")]
    InvalidPortNumber(String),

    #[error("invalid connect point {0:?} (expected <deviceId>/<port>)")]
    InvalidConnectPoint(String),

    #[error("invalid MPLS label: {0} (must be 0-1048575)")]
    InvalidMplsLabel(i64),

    #[error("invalid ethertype: {0:?}")]
    InvalidEtherType(String),
}
