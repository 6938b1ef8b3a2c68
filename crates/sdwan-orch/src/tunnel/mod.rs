//! Tunnel entity and builder.
//!
//! A [`Tunnel`] can only be obtained from [`TunnelBuilder::build`], which
//! checks every invariant up front. Update operations re-run the same checks
//! and leave the tunnel untouched on failure.

mod types;

pub use types::{Tunnel, TunnelBuilder, TunnelDirection};

use crate::flow::Direction;
use sdwan_types::{DeviceId, MplsLabel};
use thiserror::Error;

/// Broken tunnel invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunnelError {
    #[error("tenant name is empty")]
    EmptyTenant,

    #[error("source site is not set")]
    MissingSrcSite,

    #[error("destination site is not set")]
    MissingDstSite,

    #[error("protocol is not set")]
    MissingProtocol,

    #[error("path is not set")]
    MissingPath,

    #[error("{direction} label is not assigned")]
    MissingLabel { direction: Direction },

    #[error("{direction} label {label} is outside 0-1048575")]
    LabelOutOfRange { direction: Direction, label: i64 },

    #[error("forward and backward labels are both {label}")]
    DuplicateLabel { label: MplsLabel },

    #[error("path is empty but {src} and {dst} are not the same device")]
    InconsistentEmptyPath { src: DeviceId, dst: DeviceId },

    #[error("path starts at {found}, expected source device {expected}")]
    PathSourceMismatch { expected: DeviceId, found: DeviceId },

    #[error("path ends at {found}, expected destination device {expected}")]
    PathDestinationMismatch { expected: DeviceId, found: DeviceId },

    #[error("path links are not contiguous")]
    DisconnectedPath,
}
