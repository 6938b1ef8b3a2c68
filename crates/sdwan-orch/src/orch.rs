//! Tunnel provisioning orchestrator.
//!
//! [`SdwanOrch::create_vpn`] runs a small saga: resolve sites, look up a
//! path, reserve two labels, build the tunnel, install the forward rules,
//! install the backward rules, then register. A failure at any step undoes
//! what the earlier steps did and is reported as exactly one [`SdwanError`].
//!
//! Allocator and registry state live in the orchestrator and are guarded by
//! locks that are never held across a collaborator call.

use crate::error::{SdwanError, SdwanResult};
use crate::flow::{ApplicationId, Direction, FlowRuleSynthesizer, OwnerTag};
use crate::label::{LabelAllocator, RandomProbeAllocator};
use crate::registry::VpnRegistry;
use crate::services::{CoreService, FlowRuleService, TopologyService};
use crate::site::{self, Site};
use crate::tunnel::Tunnel;
use crate::{
    audit::{AuditCategory, AuditOutcome, AuditRecord},
    audit_log,
};
use parking_lot::Mutex;
use sdwan_types::{EtherType, MplsLabel, Path};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SOURCE: &str = "SdwanOrch";

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdwanOrchConfig {
    pub app_name: String,
    pub flow_priority: u16,
    pub flow_table: u8,
    pub label_alloc_rounds: u32,
    pub label_probe_window: u32,
    pub path_timeout: Duration,
    pub install_timeout: Duration,
}

impl Default for SdwanOrchConfig {
    fn default() -> Self {
        Self {
            app_name: "org.sdwan.vpn".to_string(),
            flow_priority: crate::flow::DEFAULT_PRIORITY,
            flow_table: crate::flow::DEFAULT_TABLE,
            label_alloc_rounds: RandomProbeAllocator::DEFAULT_ROUNDS,
            label_probe_window: RandomProbeAllocator::DEFAULT_WINDOW,
            path_timeout: Duration::from_secs(5),
            install_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdwanOrchStats {
    pub tunnels_created: u64,
    pub tunnels_removed: u64,
    pub create_failures: u64,
    pub rollbacks: u64,
    pub teardown_failures: u64,
}

/// Provisions and tears down label-switched tunnels.
pub struct SdwanOrch {
    config: SdwanOrchConfig,
    app_id: ApplicationId,
    synthesizer: FlowRuleSynthesizer,
    labels: Arc<dyn LabelAllocator>,
    registry: VpnRegistry,
    topology: Arc<dyn TopologyService>,
    flow_rules: Arc<dyn FlowRuleService>,
    stats: Mutex<SdwanOrchStats>,
}

impl SdwanOrch {
    /// Registers the application with the host platform and returns a
    /// ready orchestrator with an empty registry.
    pub async fn activate(
        config: SdwanOrchConfig,
        core: &dyn CoreService,
        topology: Arc<dyn TopologyService>,
        flow_rules: Arc<dyn FlowRuleService>,
    ) -> SdwanResult<Self> {
        let app_id = core
            .register_application(&config.app_name)
            .await
            .map_err(|reason| {
                let err = SdwanError::Registration {
                    name: config.app_name.clone(),
                    reason,
                };
                audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "activate")
                    .with_object_id(config.app_name.clone())
                    .with_object_type("application")
                    .with_error(err.to_string()));
                err
            })?;

        let synthesizer = FlowRuleSynthesizer::new(app_id)
            .with_priority(config.flow_priority)
            .with_table(config.flow_table);
        let labels = Arc::new(
            RandomProbeAllocator::new()
                .with_limits(config.label_alloc_rounds, config.label_probe_window),
        );

        info!(app = %config.app_name, app_id = %app_id, "Started");
        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "activate")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(config.app_name.clone())
            .with_object_type("application")
            .with_details(serde_json::json!({ "app_id": app_id.as_u16() })));

        Ok(Self {
            config,
            app_id,
            synthesizer,
            labels,
            registry: VpnRegistry::new(),
            topology,
            flow_rules,
            stats: Mutex::new(SdwanOrchStats::default()),
        })
    }

    /// Replaces the label allocator. Only meaningful before the first
    /// tunnel is created.
    pub fn with_label_allocator(mut self, labels: Arc<dyn LabelAllocator>) -> Self {
        self.labels = labels;
        self
    }

    pub fn config(&self) -> &SdwanOrchConfig {
        &self.config
    }

    pub fn app_id(&self) -> ApplicationId {
        self.app_id
    }

    pub fn registry(&self) -> &VpnRegistry {
        &self.registry
    }

    pub fn label_allocator(&self) -> &dyn LabelAllocator {
        self.labels.as_ref()
    }

    pub fn stats(&self) -> SdwanOrchStats {
        self.stats.lock().clone()
    }

    /// Tunnels registered for `tenant`, in creation order.
    pub fn list_by_tenant(&self, tenant: &str) -> Vec<Tunnel> {
        self.registry.list_by_tenant(tenant)
    }

    /// Tag carried by every rule of one direction of `tunnel`.
    pub fn owner_tag(&self, tunnel: &Tunnel, direction: Direction) -> OwnerTag {
        OwnerTag::new(self.app_id, tunnel.label(direction))
    }

    /// Provisions a bidirectional tunnel between two site descriptors.
    ///
    /// The tunnel is registered only once both directions are installed. On
    /// failure every direction that was attempted is withdrawn again and
    /// both labels are free, except that a label whose rules could not be
    /// withdrawn stays reserved because they may still be on the devices.
    pub async fn create_vpn(
        &self,
        tenant: &str,
        src: &str,
        dst: &str,
        protocol: EtherType,
    ) -> SdwanResult<Tunnel> {
        info!(tenant, src, dst, protocol = %protocol, "Creating VPN");

        match self.provision(tenant, src, dst, protocol).await {
            Ok(tunnel) => {
                self.stats.lock().tunnels_created += 1;
                info!(
                    tenant,
                    forward_label = %tunnel.forward_label(),
                    backward_label = %tunnel.backward_label(),
                    hops = tunnel.forward_hops().len(),
                    "VPN created"
                );
                audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, SOURCE, "create_vpn")
                    .with_outcome(AuditOutcome::Success)
                    .with_object_id(tenant)
                    .with_object_type("tunnel")
                    .with_details(serde_json::json!({
                        "src": tunnel.src().to_string(),
                        "dst": tunnel.dst().to_string(),
                        "protocol": tunnel.protocol().as_u16(),
                        "forward_label": tunnel.forward_label().as_u32(),
                        "backward_label": tunnel.backward_label().as_u32(),
                    })));
                Ok(tunnel)
            }
            Err(err) => {
                self.stats.lock().create_failures += 1;
                warn!(tenant, src, dst, kind = err.kind(), error = %err, "VPN creation failed");
                audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, SOURCE, "create_vpn")
                    .with_object_id(tenant)
                    .with_object_type("tunnel")
                    .with_error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn provision(
        &self,
        tenant: &str,
        src: &str,
        dst: &str,
        protocol: EtherType,
    ) -> SdwanResult<Tunnel> {
        let src_site = site::resolve(src)?;
        let dst_site = site::resolve(dst)?;

        let path = self.find_path(&src_site, &dst_site).await?;

        let forward_label = self.labels.allocate()?;
        let backward_label = match self.labels.allocate() {
            Ok(label) => label,
            Err(err) => {
                self.labels.release(forward_label);
                return Err(err.into());
            }
        };

        let tunnel = Tunnel::builder()
            .tenant(tenant)
            .src(src_site)
            .dst(dst_site)
            .protocol(protocol)
            .path(path)
            .forward_label(forward_label.as_u32())
            .backward_label(backward_label.as_u32())
            .build()
            .map_err(|err| {
                self.release_labels(&[forward_label, backward_label]);
                SdwanError::from(err)
            })?;

        for direction in Direction::ALL {
            if let Err(err) = self.install(&tunnel, direction).await {
                self.rollback(&tunnel, direction).await;
                return Err(err);
            }
        }

        self.registry.register(tunnel.clone());
        Ok(tunnel)
    }

    /// First path from the provider, or an empty path when both sites are
    /// on one device.
    async fn find_path(&self, src: &Site, dst: &Site) -> SdwanResult<Path> {
        let (src_dev, dst_dev) = (src.device_id(), dst.device_id());
        if src_dev == dst_dev {
            debug!(device = %src_dev, "Sites share a device, using empty path");
            return Ok(Path::empty());
        }

        let lookup = async {
            match self.topology.current_topology().await {
                Ok(snapshot) => self.topology.get_paths(&snapshot, src_dev, dst_dev).await,
                Err(reason) => Err(reason),
            }
        };

        let paths = match tokio::time::timeout(self.config.path_timeout, lookup).await {
            Ok(Ok(paths)) => paths,
            Ok(Err(reason)) => return Err(SdwanError::no_route(src_dev, dst_dev, reason)),
            Err(_) => {
                return Err(SdwanError::no_route(
                    src_dev,
                    dst_dev,
                    format!("path lookup timed out after {:?}", self.config.path_timeout),
                ))
            }
        };

        let path = paths
            .into_iter()
            .next()
            .ok_or_else(|| SdwanError::no_route(src_dev, dst_dev, "no paths in current topology"))?;
        debug!(path = %path, "Selected path");
        Ok(path)
    }

    async fn install(&self, tunnel: &Tunnel, direction: Direction) -> SdwanResult<()> {
        let rules = self.synthesizer.synthesize(&tunnel.direction(direction))?;
        let tag = self.owner_tag(tunnel, direction);

        match tokio::time::timeout(self.config.install_timeout, self.flow_rules.apply_batch(&rules, &tag))
            .await
        {
            Ok(Ok(())) => {
                debug!(%direction, %tag, rules = rules.len(), "Installed flow rules");
                Ok(())
            }
            Ok(Err(reason)) => Err(SdwanError::installation(direction, reason)),
            Err(_) => Err(SdwanError::installation(
                direction,
                format!("timed out after {:?}", self.config.install_timeout),
            )),
        }
    }

    async fn withdraw(&self, tunnel: &Tunnel, direction: Direction) -> SdwanResult<usize> {
        let tag = self.owner_tag(tunnel, direction);

        match tokio::time::timeout(self.config.install_timeout, self.flow_rules.remove_by_owner_tag(&tag))
            .await
        {
            Ok(Ok(removed)) => {
                debug!(%direction, %tag, removed, "Withdrew flow rules");
                Ok(removed)
            }
            Ok(Err(reason)) => Err(SdwanError::removal(direction, reason)),
            Err(_) => Err(SdwanError::removal(
                direction,
                format!("timed out after {:?}", self.config.install_timeout),
            )),
        }
    }

    /// Undoes a partial install after `failed` could not be installed.
    ///
    /// A batch that timed out may still have reached the devices, so the
    /// failed direction is withdrawn along with the ones before it. Each
    /// label is freed only once its rules are gone. Labels of directions
    /// never attempted are freed directly.
    async fn rollback(&self, tunnel: &Tunnel, failed: Direction) {
        self.stats.lock().rollbacks += 1;

        let attempted: &[Direction] = match failed {
            Direction::Forward => {
                self.labels.release(tunnel.backward_label());
                &[Direction::Forward]
            }
            Direction::Backward => &[Direction::Backward, Direction::Forward],
        };

        let mut kept = Vec::new();
        let mut last_error = None;
        for &direction in attempted {
            let label = tunnel.label(direction);
            match self.withdraw(tunnel, direction).await {
                Ok(_) => {
                    self.labels.release(label);
                }
                Err(err) => {
                    error!(
                        tenant = tunnel.tenant(),
                        %direction,
                        %label,
                        error = %err,
                        "Rollback could not withdraw flow rules, keeping label reserved"
                    );
                    kept.push(label.as_u32());
                    last_error = Some(err);
                }
            }
        }

        let record = AuditRecord::new(AuditCategory::Rollback, SOURCE, "create_vpn")
            .with_object_id(tunnel.tenant())
            .with_object_type("tunnel")
            .with_details(serde_json::json!({
                "failed_direction": failed.as_str(),
                "forward_label": tunnel.forward_label().as_u32(),
                "backward_label": tunnel.backward_label().as_u32(),
                "labels_kept": kept,
            }));
        match last_error {
            None => audit_log!(record.with_outcome(AuditOutcome::Success)),
            Some(err) => audit_log!(record.with_error(err.to_string())),
        }
    }

    fn release_labels(&self, labels: &[MplsLabel]) {
        for label in labels {
            self.labels.release(*label);
        }
    }

    /// Withdraws both directions of a registered tunnel and frees its labels.
    ///
    /// The tunnel is taken out of the registry before anything is withdrawn,
    /// so of two concurrent teardowns only one touches the flow rules.
    ///
    /// # Errors
    ///
    /// - [`SdwanError::TunnelNotFound`] if the tunnel is not registered.
    /// - [`SdwanError::RemovalFailure`] if either direction could not be
    ///   withdrawn. The tunnel then stays registered with its labels
    ///   reserved, so teardown can be repeated.
    pub async fn teardown_vpn(&self, tunnel: &Tunnel) -> SdwanResult<()> {
        let Some(position) = self.registry.take(tunnel) else {
            return Err(SdwanError::TunnelNotFound {
                tenant: tunnel.tenant().to_string(),
                forward_label: tunnel.forward_label(),
                backward_label: tunnel.backward_label(),
            });
        };

        let mut failure = None;
        for direction in Direction::ALL {
            if let Err(err) = self.withdraw(tunnel, direction).await {
                warn!(tenant = tunnel.tenant(), %direction, error = %err, "Teardown removal failed");
                failure.get_or_insert(err);
            }
        }

        if let Some(err) = failure {
            self.registry.restore(tunnel.clone(), position);
            self.stats.lock().teardown_failures += 1;
            audit_log!(AuditRecord::new(AuditCategory::ResourceDelete, SOURCE, "teardown_vpn")
                .with_object_id(tunnel.tenant())
                .with_object_type("tunnel")
                .with_error(err.to_string()));
            return Err(err);
        }

        self.release_labels(&[tunnel.forward_label(), tunnel.backward_label()]);
        self.stats.lock().tunnels_removed += 1;

        info!(
            tenant = tunnel.tenant(),
            forward_label = %tunnel.forward_label(),
            backward_label = %tunnel.backward_label(),
            "VPN removed"
        );
        audit_log!(AuditRecord::new(AuditCategory::ResourceDelete, SOURCE, "teardown_vpn")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(tunnel.tenant())
            .with_object_type("tunnel")
            .with_details(serde_json::json!({
                "forward_label": tunnel.forward_label().as_u32(),
                "backward_label": tunnel.backward_label().as_u32(),
            })));
        Ok(())
    }

    /// Removes every rule the application installed and forgets all tunnels.
    ///
    /// Returns the number of rules removed. On failure the registry and
    /// label state are left untouched.
    pub async fn deactivate(&self) -> SdwanResult<usize> {
        let removed = match tokio::time::timeout(
            self.config.install_timeout,
            self.flow_rules.remove_by_app_id(self.app_id),
        )
        .await
        {
            Ok(Ok(removed)) => removed,
            Ok(Err(reason)) => return Err(self.deactivation_failed(reason)),
            Err(_) => {
                return Err(self.deactivation_failed(format!(
                    "timed out after {:?}",
                    self.config.install_timeout
                )))
            }
        };

        let tunnels = self.registry.len();
        self.registry.clear();
        self.labels.clear();

        info!(app = %self.config.app_name, tunnels, rules = removed, "Stopped");
        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "deactivate")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(self.config.app_name.clone())
            .with_object_type("application")
            .with_details(serde_json::json!({ "tunnels": tunnels, "rules_removed": removed })));
        Ok(removed)
    }

    fn deactivation_failed(&self, reason: String) -> SdwanError {
        let err = SdwanError::Deactivation(reason);
        error!(app = %self.config.app_name, error = %err, "Deactivation failed");
        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "deactivate")
            .with_object_id(self.config.app_name.clone())
            .with_object_type("application")
            .with_error(err.to_string()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::LowestFreeAllocator;
    use crate::memory::{InMemoryFlowRuleStore, LocalCoreService, StaticTopology};
    use pretty_assertions::assert_eq;
    use sdwan_types::Link;

    fn link(src: &str, dst: &str) -> Link {
        Link::new(src.parse().unwrap(), dst.parse().unwrap())
    }

    async fn orch_with(links: Vec<Link>) -> (SdwanOrch, Arc<InMemoryFlowRuleStore>) {
        let store = Arc::new(InMemoryFlowRuleStore::new());
        let orch = SdwanOrch::activate(
            SdwanOrchConfig::default(),
            &LocalCoreService::new(),
            Arc::new(StaticTopology::new(links, true)),
            store.clone(),
        )
        .await
        .unwrap()
        .with_label_allocator(Arc::new(LowestFreeAllocator::new()));
        (orch, store)
    }

    #[tokio::test]
    async fn test_create_two_device_vpn() {
        let (orch, store) = orch_with(vec![link("of:1/3", "of:2/3")]).await;

        let tunnel = orch
            .create_vpn("ACME", "of:1/1", "of:2/2", EtherType::IPV4)
            .await
            .unwrap();

        assert_eq!(tunnel.forward_label().as_u32(), 0);
        assert_eq!(tunnel.backward_label().as_u32(), 1);
        assert_eq!(store.rule_count(), 4);
        assert_eq!(store.rules_for(&orch.owner_tag(&tunnel, Direction::Forward)).len(), 2);
        assert_eq!(orch.list_by_tenant("ACME"), vec![tunnel]);
        assert_eq!(orch.stats().tunnels_created, 1);
    }

    #[tokio::test]
    async fn test_malformed_site_reserves_nothing() {
        let (orch, store) = orch_with(vec![]).await;
        let err = orch
            .create_vpn("ACME", "of:1", "of:2/2", EtherType::IPV4)
            .await
            .unwrap_err();
        assert!(matches!(err, SdwanError::MalformedSiteDescriptor { .. }));
        assert_eq!(orch.label_allocator().allocated_count(), 0);
        assert_eq!(store.rule_count(), 0);
        assert_eq!(orch.stats().create_failures, 1);
    }

    #[tokio::test]
    async fn test_empty_tenant_releases_labels() {
        let (orch, _store) = orch_with(vec![]).await;
        let err = orch
            .create_vpn("", "of:1/1", "of:1/2", EtherType::IPV4)
            .await
            .unwrap_err();
        assert!(matches!(err, SdwanError::Validation(_)));
        assert_eq!(orch.label_allocator().allocated_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_and_deactivate() {
        let (orch, store) = orch_with(vec![link("of:1/3", "of:2/3")]).await;
        let a = orch.create_vpn("ACME", "of:1/1", "of:2/2", EtherType::IPV4).await.unwrap();
        let _b = orch.create_vpn("ACME", "of:1/4", "of:2/4", EtherType::ARP).await.unwrap();
        assert_eq!(orch.label_allocator().allocated_count(), 4);

        orch.teardown_vpn(&a).await.unwrap();
        assert_eq!(orch.label_allocator().allocated_count(), 2);
        assert_eq!(store.rule_count(), 4);
        assert!(matches!(
            orch.teardown_vpn(&a).await,
            Err(SdwanError::TunnelNotFound { .. })
        ));

        assert_eq!(orch.deactivate().await.unwrap(), 4);
        assert!(orch.registry().is_empty());
        assert_eq!(orch.label_allocator().allocated_count(), 0);
        assert_eq!(store.rule_count(), 0);
    }
}
