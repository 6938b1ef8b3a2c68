//! Configuration file support.
//!
//! Loads orchestrator settings and the static topology used by the
//! command-line tool from TOML. Every field has a default, so an empty or
//! missing file yields a working configuration with no links.
//!
//! ```toml
//! [orch]
//! app_name = "org.sdwan.vpn"
//! flow_priority = 33333
//!
//! [topology]
//! bidirectional = true
//! links = [
//!     { src = "of:0000000000000001/2", dst = "of:0000000000000002/1" },
//! ]
//! ```

use crate::error::{SdwanError, SdwanResult};
use crate::memory::StaticTopology;
use crate::orch::SdwanOrchConfig;
use sdwan_types::{Link, MplsLabel};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrchSection {
    /// Name registered with the host platform
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Priority of every installed flow rule
    #[serde(default = "default_flow_priority")]
    pub flow_priority: u16,

    /// Flow table rules are installed into
    #[serde(default = "default_flow_table")]
    pub flow_table: u8,

    /// Random restarts before label allocation gives up
    #[serde(default = "default_label_alloc_rounds")]
    pub label_alloc_rounds: u32,

    /// Labels probed past each random candidate
    #[serde(default = "default_label_probe_window")]
    pub label_probe_window: u32,

    /// Path lookup timeout in milliseconds
    #[serde(default = "default_path_timeout")]
    pub path_timeout_ms: u64,

    /// Per-direction install/remove timeout in milliseconds
    #[serde(default = "default_install_timeout")]
    pub install_timeout_ms: u64,
}

/// Static topology for running without a controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopologySection {
    /// Add every link in both directions
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,

    #[serde(default)]
    pub links: Vec<Link>,
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SdwanConfig {
    #[serde(default)]
    pub orch: OrchSection,

    #[serde(default)]
    pub topology: TopologySection,
}

fn default_app_name() -> String {
    "org.sdwan.vpn".to_string()
}

fn default_flow_priority() -> u16 {
    33333
}

fn default_flow_table() -> u8 {
    0
}

fn default_label_alloc_rounds() -> u32 {
    3
}

fn default_label_probe_window() -> u32 {
    10
}

fn default_path_timeout() -> u64 {
    5000
}

fn default_install_timeout() -> u64 {
    5000
}

fn default_bidirectional() -> bool {
    true
}

impl Default for OrchSection {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            flow_priority: default_flow_priority(),
            flow_table: default_flow_table(),
            label_alloc_rounds: default_label_alloc_rounds(),
            label_probe_window: default_label_probe_window(),
            path_timeout_ms: default_path_timeout(),
            install_timeout_ms: default_install_timeout(),
        }
    }
}

impl Default for TopologySection {
    fn default() -> Self {
        Self {
            bidirectional: default_bidirectional(),
            links: Vec::new(),
        }
    }
}

impl SdwanConfig {
    /// Default configuration file location.
    pub const DEFAULT_PATH: &'static str = "/etc/sdwan/sdwan.toml";

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> SdwanResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| {
                SdwanError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(SdwanError::Io(e)),
        }
    }

    /// Parses a TOML document.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn path_timeout(&self) -> Duration {
        Duration::from_millis(self.orch.path_timeout_ms)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_millis(self.orch.install_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> SdwanResult<()> {
        if self.orch.app_name.trim().is_empty() {
            return Err(SdwanError::Configuration(
                "app_name must not be empty".to_string(),
            ));
        }

        if self.orch.label_alloc_rounds == 0 {
            return Err(SdwanError::Configuration(
                "label_alloc_rounds must be > 0".to_string(),
            ));
        }

        if self.orch.label_probe_window > MplsLabel::MAX {
            return Err(SdwanError::Configuration(format!(
                "label_probe_window must be <= {}",
                MplsLabel::MAX
            )));
        }

        if self.orch.path_timeout_ms == 0 || self.orch.install_timeout_ms == 0 {
            return Err(SdwanError::Configuration(
                "timeouts must be > 0".to_string(),
            ));
        }

        if let Some(link) = self
            .topology
            .links
            .iter()
            .find(|l| l.src.device_id() == l.dst.device_id())
        {
            return Err(SdwanError::Configuration(format!(
                "link {} connects a device to itself",
                link
            )));
        }

        Ok(())
    }

    /// Orchestrator settings with durations resolved.
    pub fn orch_config(&self) -> SdwanOrchConfig {
        SdwanOrchConfig {
            app_name: self.orch.app_name.clone(),
            flow_priority: self.orch.flow_priority,
            flow_table: self.orch.flow_table,
            label_alloc_rounds: self.orch.label_alloc_rounds,
            label_probe_window: self.orch.label_probe_window,
            path_timeout: self.path_timeout(),
            install_timeout: self.install_timeout(),
        }
    }

    /// Builds the static topology described by `[topology]`.
    pub fn static_topology(&self) -> StaticTopology {
        StaticTopology::new(self.topology.links.clone(), self.topology.bidirectional)
    }
}
