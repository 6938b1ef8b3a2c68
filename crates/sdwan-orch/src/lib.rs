//! SD-WAN label-switched VPN tunnel orchestration.
//!
//! Provisions bidirectional tunnels between two sites on behalf of a
//! tenant. Each tunnel gets one transport label per direction; the entry
//! device pushes it, transit devices forward on it and the exit device pops
//! it, restoring the payload protocol.
//!
//! ```text
//! create_vpn ─> site::resolve (x2) ─> TopologyService::get_paths
//!            ─> LabelAllocator::allocate (x2) ─> Tunnel::builder
//!            ─> FlowRuleSynthesizer + FlowRuleService::apply_batch (fwd, bwd)
//!            ─> VpnRegistry::register
//! ```
//!
//! # Key Components
//!
//! - [`SdwanOrch`]: provisioning entry point, teardown and lifecycle
//! - [`label`]: process-wide transport label allocation
//! - [`Tunnel`] and [`TunnelBuilder`]: validated tunnel entity
//! - [`flow`]: flow rule types and per-direction synthesis
//! - [`VpnRegistry`]: tenant to tunnel mapping
//! - [`services`]: controller collaborators (topology, flow rules, core)
//! - [`memory`]: in-process collaborators for the CLI and tests

pub mod audit;
pub mod config;
pub mod error;
pub mod flow;
pub mod label;
pub mod memory;
pub mod orch;
pub mod registry;
pub mod services;
pub mod site;
pub mod tunnel;

pub use config::SdwanConfig;
pub use error::{SdwanError, SdwanResult};
pub use flow::{ApplicationId, Direction, FlowRule, FlowRuleSynthesizer, OwnerTag};
pub use label::{LabelAllocError, LabelAllocator, LowestFreeAllocator, RandomProbeAllocator};
pub use orch::{SdwanOrch, SdwanOrchConfig, SdwanOrchStats};
pub use registry::VpnRegistry;
pub use services::{CoreService, FlowRuleService, TopologyService, TopologySnapshot};
pub use site::Site;
pub use tunnel::{Tunnel, TunnelBuilder, TunnelDirection, TunnelError};
