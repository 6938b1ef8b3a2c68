//! Tenant to tunnel registry.

use crate::tunnel::Tunnel;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory mapping from tenant name to that tenant's tunnels, in
/// registration order.
#[derive(Debug, Default)]
pub struct VpnRegistry {
    tunnels: RwLock<HashMap<String, Vec<Tunnel>>>,
}

impl VpnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tunnel to its tenant's list.
    pub fn register(&self, tunnel: Tunnel) {
        self.tunnels
            .write()
            .entry(tunnel.tenant().to_string())
            .or_default()
            .push(tunnel);
    }

    /// Returns a snapshot of the tenant's tunnels. Unknown tenants yield an
    /// empty list.
    pub fn list_by_tenant(&self, tenant: &str) -> Vec<Tunnel> {
        self.tunnels.read().get(tenant).cloned().unwrap_or_default()
    }

    pub fn contains(&self, tunnel: &Tunnel) -> bool {
        self.tunnels
            .read()
            .get(tunnel.tenant())
            .is_some_and(|list| list.contains(tunnel))
    }

    /// Removes a tunnel. Returns false if it was not registered.
    ///
    /// A tenant whose last tunnel is removed is dropped from the map.
    pub fn deregister(&self, tunnel: &Tunnel) -> bool {
        self.take(tunnel).is_some()
    }

    /// Removes a tunnel and returns its position in the tenant's list, or
    /// `None` if it was not registered. Only one of several concurrent
    /// callers for the same tunnel gets `Some`.
    pub fn take(&self, tunnel: &Tunnel) -> Option<usize> {
        let mut tunnels = self.tunnels.write();
        let list = tunnels.get_mut(tunnel.tenant())?;
        let pos = list.iter().position(|t| t == tunnel)?;
        list.remove(pos);
        if list.is_empty() {
            tunnels.remove(tunnel.tenant());
        }
        Some(pos)
    }

    /// Puts back a tunnel removed by [`take`](Self::take). Positions past
    /// the end of the list append.
    pub fn restore(&self, tunnel: Tunnel, position: usize) {
        let mut tunnels = self.tunnels.write();
        let list = tunnels.entry(tunnel.tenant().to_string()).or_default();
        let position = position.min(list.len());
        list.insert(position, tunnel);
    }

    /// Returns the tenants that own at least one tunnel, sorted.
    pub fn tenants(&self) -> Vec<String> {
        let mut tenants: Vec<_> = self.tunnels.read().keys().cloned().collect();
        tenants.sort();
        tenants
    }

    /// Returns every tunnel, grouped by tenant in sorted tenant order.
    pub fn all(&self) -> Vec<Tunnel> {
        let tunnels = self.tunnels.read();
        let mut tenants: Vec<_> = tunnels.keys().collect();
        tenants.sort();
        tenants
            .into_iter()
            .flat_map(|tenant| tunnels[tenant].iter().cloned())
            .collect()
    }

    /// Returns the number of registered tunnels.
    pub fn len(&self) -> usize {
        self.tunnels.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.read().is_empty()
    }

    pub fn clear(&self) {
        self.tunnels.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdwan_types::{EtherType, Path};
    use std::sync::Arc;

    fn tunnel(tenant: &str, fwd: u32, bwd: u32) -> Tunnel {
        Tunnel::builder()
            .tenant(tenant)
            .src("of:1/1".parse().unwrap())
            .dst("of:1/2".parse().unwrap())
            .protocol(EtherType::IPV4)
            .path(Path::empty())
            .forward_label(fwd)
            .backward_label(bwd)
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_preserves_order() {
        let registry = VpnRegistry::new();
        registry.register(tunnel("ACME", 1, 2));
        registry.register(tunnel("ACME", 3, 4));
        registry.register(tunnel("Globex", 5, 6));

        let acme = registry.list_by_tenant("ACME");
        assert_eq!(acme.len(), 2);
        assert_eq!(acme[0].forward_label().as_u32(), 1);
        assert_eq!(acme[1].forward_label().as_u32(), 3);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.tenants(), vec!["ACME".to_string(), "Globex".to_string()]);
        assert_eq!(registry.all().len(), 3);
    }

    #[test]
    fn test_unknown_tenant_is_empty() {
        let registry = VpnRegistry::new();
        assert!(registry.list_by_tenant("nobody").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_deregister() {
        let registry = VpnRegistry::new();
        let a = tunnel("ACME", 1, 2);
        let b = tunnel("ACME", 3, 4);
        registry.register(a.clone());
        registry.register(b.clone());

        assert!(registry.deregister(&a));
        assert!(!registry.deregister(&a));
        assert!(!registry.contains(&a));
        assert!(registry.contains(&b));
        assert_eq!(registry.list_by_tenant("ACME"), vec![b.clone()]);

        assert!(registry.deregister(&b));
        assert!(registry.tenants().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_take_and_restore_keep_order() {
        let registry = VpnRegistry::new();
        let a = tunnel("ACME", 1, 2);
        let b = tunnel("ACME", 3, 4);
        let c = tunnel("ACME", 5, 6);
        registry.register(a.clone());
        registry.register(b.clone());
        registry.register(c.clone());

        let pos = registry.take(&b).unwrap();
        assert_eq!(pos, 1);
        assert_eq!(registry.take(&b), None);
        registry.restore(b.clone(), pos);
        assert_eq!(registry.list_by_tenant("ACME"), vec![a.clone(), b.clone(), c.clone()]);

        let pos = registry.take(&c).unwrap();
        assert!(registry.deregister(&a));
        registry.restore(c.clone(), pos);
        assert_eq!(registry.list_by_tenant("ACME"), vec![b, c]);
    }

    #[test]
    fn test_concurrent_take_single_winner() {
        let registry = Arc::new(VpnRegistry::new());
        let t = tunnel("ACME", 7, 8);
        registry.register(t.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let t = t.clone();
                std::thread::spawn(move || registry.take(&t).is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register() {
        let registry = Arc::new(VpnRegistry::new());
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50u32 {
                        let base = (t * 50 + i) * 2;
                        registry.register(tunnel("ACME", base, base + 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.list_by_tenant("ACME").len(), 200);
    }

    #[test]
    fn test_clear() {
        let registry = VpnRegistry::new();
        registry.register(tunnel("ACME", 1, 2));
        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
