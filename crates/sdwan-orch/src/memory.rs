//! In-process collaborators.
//!
//! Used by the command-line tool, which runs without a controller, and by
//! tests. The topology is a fixed link list from configuration; flow rules
//! are kept in a map keyed by owner tag.

use crate::flow::{ApplicationId, FlowRule, OwnerTag};
use crate::services::{CoreService, FlowRuleService, TopologyService, TopologySnapshot};
use async_trait::async_trait;
use parking_lot::Mutex;
use sdwan_types::{DeviceId, Link, Path};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Fixed topology answering path queries with a breadth-first search.
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    links: Vec<Link>,
}

impl StaticTopology {
    /// Creates a topology from directed links. With `bidirectional` every
    /// link is also added in reverse.
    pub fn new(links: Vec<Link>, bidirectional: bool) -> Self {
        let mut all = Vec::with_capacity(if bidirectional { links.len() * 2 } else { links.len() });
        for link in links {
            if bidirectional {
                let back = link.reversed();
                all.push(link);
                if !all.contains(&back) {
                    all.push(back);
                }
            } else {
                all.push(link);
            }
        }
        Self { links: all }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }
}

/// Fewest-links path from `src` to `dst`. Ties go to the link listed first.
fn shortest_path(links: &[Link], src: &DeviceId, dst: &DeviceId) -> Option<Path> {
    if src == dst {
        return Some(Path::empty());
    }

    let mut adjacency: HashMap<&DeviceId, Vec<&Link>> = HashMap::new();
    for link in links {
        adjacency.entry(link.src.device_id()).or_default().push(link);
    }

    let mut via: HashMap<&DeviceId, &Link> = HashMap::new();
    let mut visited: HashSet<&DeviceId> = HashSet::from([src]);
    let mut queue = VecDeque::from([src]);

    while let Some(device) = queue.pop_front() {
        for &link in adjacency.get(device).into_iter().flatten() {
            let next = link.dst.device_id();
            if !visited.insert(next) {
                continue;
            }
            via.insert(next, link);
            if next == dst {
                let mut hops = Vec::new();
                let mut cursor = dst;
                while let Some(link) = via.get(cursor) {
                    hops.push((*link).clone());
                    cursor = link.src.device_id();
                }
                hops.reverse();
                return Some(Path::new(hops));
            }
            queue.push_back(next);
        }
    }
    None
}

#[async_trait]
impl TopologyService for StaticTopology {
    async fn current_topology(&self) -> Result<TopologySnapshot, String> {
        Ok(TopologySnapshot::new(self.links.clone()))
    }

    async fn get_paths(
        &self,
        topology: &TopologySnapshot,
        src: &DeviceId,
        dst: &DeviceId,
    ) -> Result<Vec<Path>, String> {
        Ok(shortest_path(&topology.links, src, dst).into_iter().collect())
    }
}

/// Flow rule table held in memory.
#[derive(Debug, Default)]
pub struct InMemoryFlowRuleStore {
    rules: Mutex<HashMap<OwnerTag, Vec<FlowRule>>>,
}

impl InMemoryFlowRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules installed under `tag`.
    pub fn rules_for(&self, tag: &OwnerTag) -> Vec<FlowRule> {
        self.rules.lock().get(tag).cloned().unwrap_or_default()
    }

    /// Returns every installed rule.
    pub fn rules(&self) -> Vec<FlowRule> {
        self.rules.lock().values().flatten().cloned().collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.lock().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl FlowRuleService for InMemoryFlowRuleStore {
    async fn apply_batch(&self, rules: &[FlowRule], tag: &OwnerTag) -> Result<(), String> {
        if let Some(stray) = rules.iter().find(|r| r.owner_tag() != *tag) {
            return Err(format!(
                "rule for {} carries {} instead of {}",
                stray.device_id,
                stray.owner_tag(),
                tag
            ));
        }
        self.rules
            .lock()
            .entry(*tag)
            .or_default()
            .extend(rules.iter().cloned());
        debug!(%tag, count = rules.len(), "Stored flow rules");
        Ok(())
    }

    async fn remove_by_owner_tag(&self, tag: &OwnerTag) -> Result<usize, String> {
        Ok(self.rules.lock().remove(tag).map_or(0, |r| r.len()))
    }

    async fn remove_by_app_id(&self, app_id: ApplicationId) -> Result<usize, String> {
        let mut rules = self.rules.lock();
        let mut removed = 0;
        rules.retain(|tag, batch| {
            if tag.app_id == app_id {
                removed += batch.len();
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

/// Hands out sequential application ids. Registering a name twice returns
/// the same id.
#[derive(Debug)]
pub struct LocalCoreService {
    apps: Mutex<HashMap<String, ApplicationId>>,
    next_id: Mutex<u16>,
}

impl LocalCoreService {
    pub fn new() -> Self {
        Self {
            apps: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }
}

impl Default for LocalCoreService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoreService for LocalCoreService {
    async fn register_application(&self, name: &str) -> Result<ApplicationId, String> {
        let mut apps = self.apps.lock();
        if let Some(id) = apps.get(name) {
            return Ok(*id);
        }

        let mut next_id = self.next_id.lock();
        let id = ApplicationId::new(*next_id);
        *next_id = next_id
            .checked_add(1)
            .ok_or_else(|| "application id space exhausted".to_string())?;
        apps.insert(name.to_string(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Instruction, TrafficSelector};
    use pretty_assertions::assert_eq;
    use sdwan_types::{MplsLabel, PortNumber};

    fn link(src: &str, dst: &str) -> Link {
        Link::new(src.parse().unwrap(), dst.parse().unwrap())
    }

    fn dev(s: &str) -> DeviceId {
        DeviceId::new(s).unwrap()
    }

    fn line_topology() -> StaticTopology {
        StaticTopology::new(
            vec![
                link("of:1/2", "of:2/1"),
                link("of:2/2", "of:3/1"),
                link("of:3/2", "of:4/1"),
            ],
            true,
        )
    }

    #[test]
    fn test_bidirectional_links() {
        let topo = StaticTopology::new(vec![link("of:1/2", "of:2/1")], true);
        assert_eq!(
            topo.links(),
            &[link("of:1/2", "of:2/1"), link("of:2/1", "of:1/2")]
        );
        let one_way = StaticTopology::new(vec![link("of:1/2", "of:2/1")], false);
        assert_eq!(one_way.links().len(), 1);
    }

    #[test]
    fn test_shortest_path_line() {
        let topo = line_topology();
        let path = shortest_path(topo.links(), &dev("of:1"), &dev("of:4")).unwrap();
        assert_eq!(
            path,
            Path::new(vec![
                link("of:1/2", "of:2/1"),
                link("of:2/2", "of:3/1"),
                link("of:3/2", "of:4/1"),
            ])
        );

        let back = shortest_path(topo.links(), &dev("of:4"), &dev("of:1")).unwrap();
        assert_eq!(back, path.reversed());
    }

    #[test]
    fn test_shortest_path_prefers_fewer_links() {
        let links = vec![
            link("of:1/2", "of:2/1"),
            link("of:2/2", "of:3/1"),
            link("of:1/3", "of:3/3"),
        ];
        let path = shortest_path(&links, &dev("of:1"), &dev("of:3")).unwrap();
        assert_eq!(path, Path::new(vec![link("of:1/3", "of:3/3")]));
    }

    #[test]
    fn test_shortest_path_unreachable() {
        let topo = StaticTopology::new(vec![link("of:1/2", "of:2/1")], false);
        assert_eq!(shortest_path(topo.links(), &dev("of:2"), &dev("of:1")), None);
        assert_eq!(shortest_path(topo.links(), &dev("of:1"), &dev("of:9")), None);
        assert_eq!(
            shortest_path(topo.links(), &dev("of:1"), &dev("of:1")),
            Some(Path::empty())
        );
    }

    #[tokio::test]
    async fn test_topology_service() {
        let topo = line_topology();
        let snapshot = topo.current_topology().await.unwrap();
        let paths = topo.get_paths(&snapshot, &dev("of:1"), &dev("of:3")).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 2);

        let none = topo.get_paths(&snapshot, &dev("of:1"), &dev("of:7")).await.unwrap();
        assert!(none.is_empty());
    }

    fn rule(app: u16, label: u32, device: &str) -> FlowRule {
        let label = MplsLabel::new(label).unwrap();
        FlowRule {
            device_id: dev(device),
            table: 0,
            priority: 33333,
            permanent: true,
            app_id: ApplicationId::new(app),
            cookie: label.as_cookie(),
            selector: TrafficSelector::mpls(label),
            treatment: vec![Instruction::Output(PortNumber::new(1))],
        }
    }

    #[tokio::test]
    async fn test_flow_store_apply_and_remove() {
        let store = InMemoryFlowRuleStore::new();
        let a = vec![rule(1, 10, "of:1"), rule(1, 10, "of:2")];
        let b = vec![rule(1, 11, "of:2"), rule(1, 11, "of:1")];
        let other = vec![rule(2, 10, "of:1")];

        store.apply_batch(&a, &a[0].owner_tag()).await.unwrap();
        store.apply_batch(&b, &b[0].owner_tag()).await.unwrap();
        store.apply_batch(&other, &other[0].owner_tag()).await.unwrap();
        assert_eq!(store.rule_count(), 5);
        assert_eq!(store.rules_for(&a[0].owner_tag()), a);

        assert_eq!(store.remove_by_owner_tag(&a[0].owner_tag()).await.unwrap(), 2);
        assert_eq!(store.remove_by_owner_tag(&a[0].owner_tag()).await.unwrap(), 0);
        assert_eq!(store.remove_by_app_id(ApplicationId::new(1)).await.unwrap(), 2);
        assert_eq!(store.rules(), other);
    }

    #[tokio::test]
    async fn test_flow_store_rejects_mismatched_tag() {
        let store = InMemoryFlowRuleStore::new();
        let batch = vec![rule(1, 10, "of:1"), rule(1, 12, "of:2")];
        let result = store.apply_batch(&batch, &batch[0].owner_tag()).await;
        assert!(result.is_err());
        assert_eq!(store.rule_count(), 0);
    }

    #[tokio::test]
    async fn test_core_service_ids() {
        let core = LocalCoreService::new();
        let a = core.register_application("org.sdwan.vpn").await.unwrap();
        let b = core.register_application("org.other").await.unwrap();
        assert_eq!(a, ApplicationId::new(1));
        assert_eq!(b, ApplicationId::new(2));
        assert_eq!(core.register_application("org.sdwan.vpn").await.unwrap(), a);
    }
}
