//! Flow rule types.

use sdwan_types::{DeviceId, EtherType, MplsLabel, PortNumber};
use serde::Serialize;
use std::fmt;

/// Tunnel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Source site to destination site.
    Forward,
    /// Destination site back to source site.
    Backward,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Forward, Direction::Backward];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier the host platform assigned to this application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ApplicationId(u16);

impl ApplicationId {
    pub const fn new(id: u16) -> Self {
        ApplicationId(id)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag attached to every rule of one tunnel direction so the whole batch can
/// be withdrawn at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OwnerTag {
    pub app_id: ApplicationId,
    pub cookie: u64,
}

impl OwnerTag {
    pub fn new(app_id: ApplicationId, label: MplsLabel) -> Self {
        Self {
            app_id,
            cookie: label.as_cookie(),
        }
    }
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app={} cookie={}", self.app_id, self.cookie)
    }
}

/// Packet match criteria. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrafficSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_type: Option<EtherType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpls_label: Option<MplsLabel>,
}

impl TrafficSelector {
    /// Matches customer traffic arriving on a site port.
    pub fn in_port(port: PortNumber) -> Self {
        Self {
            in_port: Some(port),
            ..Self::default()
        }
    }

    /// Matches MPLS unicast frames carrying `label`.
    pub fn mpls(label: MplsLabel) -> Self {
        Self {
            eth_type: Some(EtherType::MPLS_UNICAST),
            mpls_label: Some(label),
            ..Self::default()
        }
    }

    pub fn with_eth_type(mut self, eth_type: EtherType) -> Self {
        self.eth_type = Some(eth_type);
        self
    }
}

/// Immediate action applied to a matched packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Instruction {
    PushMpls,
    SetMplsLabel(MplsLabel),
    /// Pops the label, restoring the payload ethertype.
    PopMpls(EtherType),
    Output(PortNumber),
}

/// A per-device match/action forwarding instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowRule {
    pub device_id: DeviceId,
    pub table: u8,
    pub priority: u16,
    pub permanent: bool,
    pub app_id: ApplicationId,
    pub cookie: u64,
    pub selector: TrafficSelector,
    pub treatment: Vec<Instruction>,
}

impl FlowRule {
    pub fn owner_tag(&self) -> OwnerTag {
        OwnerTag {
            app_id: self.app_id,
            cookie: self.cookie,
        }
    }

    /// Returns true if the treatment pushes a label.
    pub fn pushes_label(&self) -> bool {
        self.treatment.contains(&Instruction::PushMpls)
    }

    /// Returns true if the treatment pops a label.
    pub fn pops_label(&self) -> bool {
        self.treatment
            .iter()
            .any(|i| matches!(i, Instruction::PopMpls(_)))
    }

    /// Returns the output port, if any.
    pub fn output_port(&self) -> Option<PortNumber> {
        self.treatment.iter().find_map(|i| match i {
            Instruction::Output(port) => Some(*port),
            _ => None,
        })
    }
}
