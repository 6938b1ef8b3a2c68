//! Tunnel types.

use super::TunnelError;
use crate::flow::Direction;
use crate::site::Site;
use sdwan_types::{ConnectPoint, DeviceId, EtherType, MplsLabel, Path};
use serde::Serialize;

/// A provisioned bidirectional label-switched circuit owned by a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tunnel {
    tenant: String,
    src: Site,
    dst: Site,
    protocol: EtherType,
    path: Path,
    forward_hops: Vec<DeviceId>,
    backward_hops: Vec<DeviceId>,
    forward_label: MplsLabel,
    backward_label: MplsLabel,
}

impl Tunnel {
    pub fn builder() -> TunnelBuilder {
        TunnelBuilder::default()
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn src(&self) -> &Site {
        &self.src
    }

    pub fn dst(&self) -> &Site {
        &self.dst
    }

    pub fn protocol(&self) -> EtherType {
        self.protocol
    }

    /// Forward path. The backward direction walks it reversed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn forward_hops(&self) -> &[DeviceId] {
        &self.forward_hops
    }

    pub fn backward_hops(&self) -> &[DeviceId] {
        &self.backward_hops
    }

    pub fn forward_label(&self) -> MplsLabel {
        self.forward_label
    }

    pub fn backward_label(&self) -> MplsLabel {
        self.backward_label
    }

    pub fn label(&self, direction: Direction) -> MplsLabel {
        match direction {
            Direction::Forward => self.forward_label,
            Direction::Backward => self.backward_label,
        }
    }

    /// Returns true if both sites are on the same device.
    pub fn is_local(&self) -> bool {
        self.src.device_id() == self.dst.device_id()
    }

    /// Returns everything needed to program one direction.
    pub fn direction(&self, direction: Direction) -> TunnelDirection {
        match direction {
            Direction::Forward => TunnelDirection {
                direction,
                hops: self.forward_hops.clone(),
                path: self.path.clone(),
                entry: self.src.clone(),
                exit: self.dst.clone(),
                label: self.forward_label,
                protocol: self.protocol,
            },
            Direction::Backward => TunnelDirection {
                direction,
                hops: self.backward_hops.clone(),
                path: self.path.reversed(),
                entry: self.dst.clone(),
                exit: self.src.clone(),
                label: self.backward_label,
                protocol: self.protocol,
            },
        }
    }

    /// Replaces the forward label.
    ///
    /// # Errors
    ///
    /// Fails if the label is the sentinel, out of range, or equal to the
    /// backward label.
    pub fn update_forward_label(&mut self, label: i64) -> Result<(), TunnelError> {
        let label = checked_label(Direction::Forward, label)?;
        check_distinct(label, self.backward_label)?;
        self.forward_label = label;
        Ok(())
    }

    /// Replaces the backward label.
    ///
    /// # Errors
    ///
    /// Fails if the label is the sentinel, out of range, or equal to the
    /// forward label.
    pub fn update_backward_label(&mut self, label: i64) -> Result<(), TunnelError> {
        let label = checked_label(Direction::Backward, label)?;
        check_distinct(self.forward_label, label)?;
        self.backward_label = label;
        Ok(())
    }

    /// Replaces the path and re-derives both hop sequences.
    pub fn update_path(&mut self, path: Path) -> Result<(), TunnelError> {
        let forward_hops = derive_hops(&self.src, &self.dst, &path)?;
        self.backward_hops = forward_hops.iter().rev().cloned().collect();
        self.forward_hops = forward_hops;
        self.path = path;
        Ok(())
    }
}

/// One direction of a tunnel, as handed to the flow rule synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelDirection {
    pub direction: Direction,
    pub hops: Vec<DeviceId>,
    /// Links walked in this direction, so `path.links()[i]` goes from
    /// `hops[i]` to `hops[i + 1]`.
    pub path: Path,
    pub entry: ConnectPoint,
    pub exit: ConnectPoint,
    pub label: MplsLabel,
    pub protocol: EtherType,
}

/// Fail-fast builder for [`Tunnel`].
///
/// Labels are taken as raw integers so the unassigned sentinel
/// ([`MplsLabel::INVALID`]) and out-of-range values are reported as
/// validation errors rather than silently truncated.
#[derive(Debug, Clone)]
pub struct TunnelBuilder {
    tenant: Option<String>,
    src: Option<Site>,
    dst: Option<Site>,
    protocol: Option<EtherType>,
    path: Option<Path>,
    forward_label: i64,
    backward_label: i64,
}

impl Default for TunnelBuilder {
    fn default() -> Self {
        Self {
            tenant: None,
            src: None,
            dst: None,
            protocol: None,
            path: None,
            forward_label: MplsLabel::INVALID,
            backward_label: MplsLabel::INVALID,
        }
    }
}

impl TunnelBuilder {
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn src(mut self, site: Site) -> Self {
        self.src = Some(site);
        self
    }

    pub fn dst(mut self, site: Site) -> Self {
        self.dst = Some(site);
        self
    }

    pub fn protocol(mut self, protocol: EtherType) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn path(mut self, path: Path) -> Self {
        self.path = Some(path);
        self
    }

    pub fn forward_label(mut self, label: impl Into<i64>) -> Self {
        self.forward_label = label.into();
        self
    }

    pub fn backward_label(mut self, label: impl Into<i64>) -> Self {
        self.backward_label = label.into();
        self
    }

    /// Validates every field and derives the hop sequences.
    pub fn build(self) -> Result<Tunnel, TunnelError> {
        let tenant = self
            .tenant
            .filter(|t| !t.is_empty())
            .ok_or(TunnelError::EmptyTenant)?;
        let src = self.src.ok_or(TunnelError::MissingSrcSite)?;
        let dst = self.dst.ok_or(TunnelError::MissingDstSite)?;
        let protocol = self.protocol.ok_or(TunnelError::MissingProtocol)?;
        let path = self.path.ok_or(TunnelError::MissingPath)?;

        let forward_label = checked_label(Direction::Forward, self.forward_label)?;
        let backward_label = checked_label(Direction::Backward, self.backward_label)?;
        check_distinct(forward_label, backward_label)?;

        let forward_hops = derive_hops(&src, &dst, &path)?;
        let backward_hops = forward_hops.iter().rev().cloned().collect();

        Ok(Tunnel {
            tenant,
            src,
            dst,
            protocol,
            path,
            forward_hops,
            backward_hops,
            forward_label,
            backward_label,
        })
    }
}

fn checked_label(direction: Direction, raw: i64) -> Result<MplsLabel, TunnelError> {
    if raw == MplsLabel::INVALID {
        return Err(TunnelError::MissingLabel { direction });
    }
    MplsLabel::try_from(raw).map_err(|_| TunnelError::LabelOutOfRange {
        direction,
        label: raw,
    })
}

fn check_distinct(forward: MplsLabel, backward: MplsLabel) -> Result<(), TunnelError> {
    if forward == backward {
        return Err(TunnelError::DuplicateLabel { label: forward });
    }
    Ok(())
}

/// Source device of the first link, then the destination device of every
/// link. A path without links yields the single shared device.
fn derive_hops(src: &Site, dst: &Site, path: &Path) -> Result<Vec<DeviceId>, TunnelError> {
    let (Some(first), Some(last)) = (path.src_device(), path.dst_device()) else {
        if src.device_id() != dst.device_id() {
            return Err(TunnelError::InconsistentEmptyPath {
                src: src.device_id().clone(),
                dst: dst.device_id().clone(),
            });
        }
        return Ok(vec![src.device_id().clone()]);
    };

    if first != src.device_id() {
        return Err(TunnelError::PathSourceMismatch {
            expected: src.device_id().clone(),
            found: first.clone(),
        });
    }
    if last != dst.device_id() {
        return Err(TunnelError::PathDestinationMismatch {
            expected: dst.device_id().clone(),
            found: last.clone(),
        });
    }
    if !path.is_contiguous() {
        return Err(TunnelError::DisconnectedPath);
    }

    let mut hops = Vec::with_capacity(path.len() + 1);
    hops.push(first.clone());
    hops.extend(path.links().iter().map(|l| l.dst.device_id().clone()));
    Ok(hops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sdwan_types::Link;

    fn site(s: &str) -> Site {
        s.parse().unwrap()
    }

    fn dev(s: &str) -> DeviceId {
        DeviceId::new(s).unwrap()
    }

    fn link(src: &str, dst: &str) -> Link {
        Link::new(site(src), site(dst))
    }

    fn three_hop_path() -> Path {
        Path::new(vec![link("of:1/2", "of:2/1"), link("of:2/3", "of:3/1")])
    }

    fn builder() -> TunnelBuilder {
        Tunnel::builder()
            .tenant("ACME")
            .src(site("of:1/1"))
            .dst(site("of:3/2"))
            .protocol(EtherType::IPV4)
            .path(three_hop_path())
            .forward_label(100)
            .backward_label(200)
    }

    #[test]
    fn test_build_derives_hops() {
        let tunnel = builder().build().unwrap();
        assert_eq!(tunnel.forward_hops(), &[dev("of:1"), dev("of:2"), dev("of:3")]);
        assert_eq!(tunnel.backward_hops(), &[dev("of:3"), dev("of:2"), dev("of:1")]);
        assert_eq!(tunnel.forward_label().as_u32(), 100);
        assert_eq!(tunnel.backward_label().as_u32(), 200);
        assert!(!tunnel.is_local());
    }

    #[test]
    fn test_build_same_device_empty_path() {
        let tunnel = builder()
            .dst(site("of:1/2"))
            .path(Path::empty())
            .build()
            .unwrap();
        assert_eq!(tunnel.forward_hops(), &[dev("of:1")]);
        assert_eq!(tunnel.backward_hops(), &[dev("of:1")]);
        assert!(tunnel.is_local());
    }

    #[test]
    fn test_build_empty_path_different_devices() {
        let err = builder().path(Path::empty()).build().unwrap_err();
        assert_eq!(
            err,
            TunnelError::InconsistentEmptyPath {
                src: dev("of:1"),
                dst: dev("of:3"),
            }
        );
    }

    #[test]
    fn test_build_rejects_missing_fields() {
        assert_eq!(
            TunnelBuilder::default().build().unwrap_err(),
            TunnelError::EmptyTenant
        );
        assert_eq!(builder().tenant("").build().unwrap_err(), TunnelError::EmptyTenant);

        let no_src = TunnelBuilder {
            src: None,
            ..builder()
        };
        assert_eq!(no_src.build().unwrap_err(), TunnelError::MissingSrcSite);

        let no_path = TunnelBuilder {
            path: None,
            ..builder()
        };
        assert_eq!(no_path.build().unwrap_err(), TunnelError::MissingPath);
    }

    #[test]
    fn test_build_rejects_bad_labels() {
        let err = builder().forward_label(MplsLabel::INVALID).build().unwrap_err();
        assert_eq!(
            err,
            TunnelError::MissingLabel {
                direction: Direction::Forward
            }
        );

        let err = builder().backward_label(1_048_576).build().unwrap_err();
        assert_eq!(
            err,
            TunnelError::LabelOutOfRange {
                direction: Direction::Backward,
                label: 1_048_576,
            }
        );

        let err = builder().forward_label(-7).build().unwrap_err();
        assert!(matches!(err, TunnelError::LabelOutOfRange { label: -7, .. }));

        let err = builder().backward_label(100).build().unwrap_err();
        assert!(matches!(err, TunnelError::DuplicateLabel { .. }));
    }

    #[test]
    fn test_build_rejects_path_not_starting_at_source() {
        let err = builder().src(site("of:9/1")).build().unwrap_err();
        assert_eq!(
            err,
            TunnelError::PathSourceMismatch {
                expected: dev("of:9"),
                found: dev("of:1"),
            }
        );
    }

    #[test]
    fn test_build_rejects_path_not_ending_at_destination() {
        let err = builder().dst(site("of:2/5")).build().unwrap_err();
        assert!(matches!(err, TunnelError::PathDestinationMismatch { .. }));
    }

    #[test]
    fn test_build_rejects_disconnected_path() {
        let path = Path::new(vec![link("of:1/2", "of:2/1"), link("of:4/3", "of:3/1")]);
        let err = builder().path(path).build().unwrap_err();
        assert_eq!(err, TunnelError::DisconnectedPath);
    }

    #[test]
    fn test_direction_views() {
        let tunnel = builder().build().unwrap();

        let fwd = tunnel.direction(Direction::Forward);
        assert_eq!(fwd.entry, site("of:1/1"));
        assert_eq!(fwd.exit, site("of:3/2"));
        assert_eq!(fwd.path, three_hop_path());
        assert_eq!(fwd.label.as_u32(), 100);

        let bwd = tunnel.direction(Direction::Backward);
        assert_eq!(bwd.entry, site("of:3/2"));
        assert_eq!(bwd.exit, site("of:1/1"));
        assert_eq!(bwd.hops, tunnel.backward_hops());
        assert_eq!(bwd.path.links()[0], link("of:3/1", "of:2/3"));
        assert_eq!(bwd.label.as_u32(), 200);
    }

    #[test]
    fn test_update_labels_revalidate() {
        let mut tunnel = builder().build().unwrap();

        tunnel.update_forward_label(300).unwrap();
        assert_eq!(tunnel.forward_label().as_u32(), 300);

        assert!(matches!(
            tunnel.update_backward_label(300),
            Err(TunnelError::DuplicateLabel { .. })
        ));
        assert!(tunnel.update_forward_label(MplsLabel::INVALID).is_err());
        assert_eq!(tunnel.forward_label().as_u32(), 300);
        assert_eq!(tunnel.backward_label().as_u32(), 200);
    }

    #[test]
    fn test_update_path_rederives_hops() {
        let mut tunnel = builder().build().unwrap();
        let direct = Path::new(vec![link("of:1/5", "of:3/5")]);

        tunnel.update_path(direct.clone()).unwrap();
        assert_eq!(tunnel.path(), &direct);
        assert_eq!(tunnel.forward_hops(), &[dev("of:1"), dev("of:3")]);
        assert_eq!(tunnel.backward_hops(), &[dev("of:3"), dev("of:1")]);

        assert!(tunnel.update_path(Path::empty()).is_err());
        assert_eq!(tunnel.path(), &direct);
    }
}
