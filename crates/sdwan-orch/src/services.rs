//! Host platform collaborators.
//!
//! The orchestrator never talks to devices or computes paths itself. These
//! traits are the seams to the controller that does; errors come back as
//! plain strings and are mapped into [`SdwanError`](crate::SdwanError) by the
//! caller.

use crate::flow::{ApplicationId, FlowRule, OwnerTag};
use async_trait::async_trait;
use sdwan_types::{DeviceId, Link, Path};

/// Point-in-time view of the network, handed back to the path lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    pub links: Vec<Link>,
}

impl TopologySnapshot {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }
}

/// Application registration with the host platform.
#[async_trait]
pub trait CoreService: Send + Sync {
    /// Registers `name` and returns the identifier used to tag its flow rules.
    async fn register_application(&self, name: &str) -> Result<ApplicationId, String>;
}

/// Topology and path computation.
#[async_trait]
pub trait TopologyService: Send + Sync {
    async fn current_topology(&self) -> Result<TopologySnapshot, String>;

    /// Returns candidate paths from `src` to `dst`, best first. An empty
    /// list means no route.
    async fn get_paths(
        &self,
        topology: &TopologySnapshot,
        src: &DeviceId,
        dst: &DeviceId,
    ) -> Result<Vec<Path>, String>;
}

/// Flow rule installation on devices.
#[async_trait]
pub trait FlowRuleService: Send + Sync {
    /// Installs all rules or none of them.
    async fn apply_batch(&self, rules: &[FlowRule], tag: &OwnerTag) -> Result<(), String>;

    /// Removes every rule carrying `tag`. Returns the number removed.
    async fn remove_by_owner_tag(&self, tag: &OwnerTag) -> Result<usize, String>;

    /// Removes every rule installed by the application.
    async fn remove_by_app_id(&self, app_id: ApplicationId) -> Result<usize, String>;
}
