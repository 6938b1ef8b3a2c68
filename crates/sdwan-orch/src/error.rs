//! Error types for tunnel provisioning.
//!
//! [`SdwanError`] is the discriminated result of every orchestrator entry
//! point, so callers can tell "no route" from "label exhaustion" from "device
//! rejected the rule". Each provisioning step maps to exactly one variant.

use crate::flow::Direction;
use crate::label::LabelAllocError;
use crate::tunnel::TunnelError;
use sdwan_types::{DeviceId, MplsLabel};
use std::io;
use thiserror::Error;

/// Result type alias for orchestrator operations.
pub type SdwanResult<T> = Result<T, SdwanError>;

/// Errors that can occur while provisioning or tearing down tunnels.
#[derive(Debug, Error)]
pub enum SdwanError {
    /// Site descriptor is not `<deviceId>/<port>`.
    #[error("Malformed site descriptor '{descriptor}', expected <deviceId>/<port> e.g. of:0000000000000001/1")]
    MalformedSiteDescriptor {
        /// The descriptor as given by the caller.
        descriptor: String,
    },

    /// Path provider returned nothing, failed or timed out.
    #[error("No route found from {src} to {dst}: {reason}")]
    NoRouteFound {
        src: DeviceId,
        dst: DeviceId,
        reason: String,
    },

    /// Label allocator could not find a free label.
    #[error("Label allocation exhausted, please retry: {0}")]
    AllocationExhausted(#[from] LabelAllocError),

    /// Path has no links but the sites are on different devices.
    #[error("Path is empty but {src} and {dst} are not the same device")]
    InconsistentEmptyPath { src: DeviceId, dst: DeviceId },

    /// A tunnel invariant does not hold.
    #[error("Tunnel validation failed: {0}")]
    Validation(TunnelError),

    /// Hop sequence and path links disagree.
    #[error("Topology inconsistency: {0}")]
    TopologyInconsistency(String),

    /// Flow rule batch for one direction was not confirmed.
    #[error("Failed to install {direction} flow rules: {reason}")]
    InstallationFailure { direction: Direction, reason: String },

    /// Flow rules for one direction could not be withdrawn.
    #[error("Failed to remove {direction} flow rules: {reason}")]
    RemovalFailure { direction: Direction, reason: String },

    /// Teardown was requested for a tunnel that is not registered.
    #[error("Tunnel not found for tenant '{tenant}' (labels {forward_label}/{backward_label})")]
    TunnelNotFound {
        tenant: String,
        forward_label: MplsLabel,
        backward_label: MplsLabel,
    },

    /// Application-wide flow rule removal failed during shutdown.
    #[error("Failed to remove application flow rules: {0}")]
    Deactivation(String),

    /// Host platform refused to register the application.
    #[error("Application registration failed for '{name}': {reason}")]
    Registration { name: String, reason: String },

    /// Configuration file is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SdwanError {
    /// Creates a malformed site descriptor error.
    pub fn malformed_site(descriptor: impl Into<String>) -> Self {
        Self::MalformedSiteDescriptor {
            descriptor: descriptor.into(),
        }
    }

    /// Creates a no route error.
    pub fn no_route(src: &DeviceId, dst: &DeviceId, reason: impl Into<String>) -> Self {
        Self::NoRouteFound {
            src: src.clone(),
            dst: dst.clone(),
            reason: reason.into(),
        }
    }

    /// Creates a topology inconsistency error.
    pub fn topology(message: impl Into<String>) -> Self {
        Self::TopologyInconsistency(message.into())
    }

    /// Creates an installation failure error.
    pub fn installation(direction: Direction, reason: impl Into<String>) -> Self {
        Self::InstallationFailure {
            direction,
            reason: reason.into(),
        }
    }

    /// Creates a removal failure error.
    pub fn removal(direction: Direction, reason: impl Into<String>) -> Self {
        Self::RemovalFailure {
            direction,
            reason: reason.into(),
        }
    }

    /// Returns a short stable name for the error kind, used in logs and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            SdwanError::MalformedSiteDescriptor { .. } => "malformed_site_descriptor",
            SdwanError::NoRouteFound { .. } => "no_route_found",
            SdwanError::AllocationExhausted(_) => "allocation_exhausted",
            SdwanError::InconsistentEmptyPath { .. } => "inconsistent_empty_path",
            SdwanError::Validation(_) => "validation_error",
            SdwanError::TopologyInconsistency(_) => "topology_inconsistency",
            SdwanError::InstallationFailure { .. } => "installation_failure",
            SdwanError::RemovalFailure { .. } => "removal_failure",
            SdwanError::TunnelNotFound { .. } => "tunnel_not_found",
            SdwanError::Deactivation(_) => "deactivation_failure",
            SdwanError::Registration { .. } => "registration_failure",
            SdwanError::Configuration(_) => "configuration_error",
            SdwanError::Io(_) => "io_error",
        }
    }

    /// Returns true if repeating the same request may succeed.
    ///
    /// Nothing is retried internally; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SdwanError::NoRouteFound { .. }
                | SdwanError::AllocationExhausted(_)
                | SdwanError::InstallationFailure { .. }
                | SdwanError::RemovalFailure { .. }
                | SdwanError::Deactivation(_)
        )
    }
}

impl From<TunnelError> for SdwanError {
    fn from(err: TunnelError) -> Self {
        match err {
            TunnelError::InconsistentEmptyPath { src, dst } => {
                SdwanError::InconsistentEmptyPath { src, dst }
            }
            other => SdwanError::Validation(other),
        }
    }
}
