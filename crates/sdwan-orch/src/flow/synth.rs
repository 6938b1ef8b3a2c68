//! Flow rule synthesis for one tunnel direction.
//!
//! Labels are static per direction: the entry device pushes the label, every
//! transit device matches the same label and forwards it unchanged, and the
//! exit device pops it and restores the payload ethertype. A tunnel whose
//! sites share a device becomes a single crossconnect rule with no label.

use super::types::{ApplicationId, FlowRule, Instruction, TrafficSelector};
use crate::error::{SdwanError, SdwanResult};
use crate::tunnel::TunnelDirection;
use sdwan_types::DeviceId;
use tracing::debug;

/// Default rule priority.
pub const DEFAULT_PRIORITY: u16 = 33333;

/// Default flow table.
pub const DEFAULT_TABLE: u8 = 0;

/// Turns device-hop sequences into ordered flow rules.
#[derive(Debug, Clone)]
pub struct FlowRuleSynthesizer {
    app_id: ApplicationId,
    priority: u16,
    table: u8,
}

impl FlowRuleSynthesizer {
    pub fn new(app_id: ApplicationId) -> Self {
        Self {
            app_id,
            priority: DEFAULT_PRIORITY,
            table: DEFAULT_TABLE,
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_table(mut self, table: u8) -> Self {
        self.table = table;
        self
    }

    pub fn app_id(&self) -> ApplicationId {
        self.app_id
    }

    /// Produces the rules for one direction, entry first and exit last.
    ///
    /// # Errors
    ///
    /// - [`SdwanError::TopologyInconsistency`] if there are no hops or the
    ///   path links do not join consecutive hops.
    /// - [`SdwanError::InconsistentEmptyPath`] if a single-device direction
    ///   has entry and exit ports on different devices.
    pub fn synthesize(&self, dir: &TunnelDirection) -> SdwanResult<Vec<FlowRule>> {
        let rules = match dir.hops.as_slice() {
            [] => {
                return Err(SdwanError::topology(format!(
                    "{} direction has no hops",
                    dir.direction
                )))
            }
            [device] => vec![self.crossconnect(device, dir)?],
            hops => self.label_switched(hops, dir)?,
        };

        debug!(
            direction = %dir.direction,
            label = %dir.label,
            rules = rules.len(),
            "Synthesized flow rules"
        );
        Ok(rules)
    }

    fn crossconnect(&self, device: &DeviceId, dir: &TunnelDirection) -> SdwanResult<FlowRule> {
        if dir.entry.device_id() != device || dir.exit.device_id() != device {
            return Err(SdwanError::InconsistentEmptyPath {
                src: dir.entry.device_id().clone(),
                dst: dir.exit.device_id().clone(),
            });
        }

        Ok(self.rule(
            device,
            dir,
            TrafficSelector::in_port(dir.entry.port()).with_eth_type(dir.protocol),
            vec![Instruction::Output(dir.exit.port())],
        ))
    }

    fn label_switched(&self, hops: &[DeviceId], dir: &TunnelDirection) -> SdwanResult<Vec<FlowRule>> {
        let links = dir.path.links();
        if links.len() != hops.len() - 1 {
            return Err(SdwanError::topology(format!(
                "{} direction has {} hops but {} links",
                dir.direction,
                hops.len(),
                links.len()
            )));
        }
        for (i, link) in links.iter().enumerate() {
            if link.src.device_id() != &hops[i] || link.dst.device_id() != &hops[i + 1] {
                return Err(SdwanError::topology(format!(
                    "link {} does not join hop {} ({}) to hop {} ({})",
                    link,
                    i,
                    hops[i],
                    i + 1,
                    hops[i + 1]
                )));
            }
        }
        if dir.entry.device_id() != &hops[0] {
            return Err(SdwanError::topology(format!(
                "entry site {} is not on first hop {}",
                dir.entry, hops[0]
            )));
        }
        let last = &hops[hops.len() - 1];
        if dir.exit.device_id() != last {
            return Err(SdwanError::topology(format!(
                "exit site {} is not on last hop {}",
                dir.exit, last
            )));
        }

        let mut rules = Vec::with_capacity(hops.len());

        rules.push(self.rule(
            &hops[0],
            dir,
            TrafficSelector::in_port(dir.entry.port()),
            vec![
                Instruction::PushMpls,
                Instruction::SetMplsLabel(dir.label),
                Instruction::Output(links[0].src.port()),
            ],
        ));

        for (hop, link) in hops[1..hops.len() - 1].iter().zip(&links[1..]) {
            rules.push(self.rule(
                hop,
                dir,
                TrafficSelector::mpls(dir.label),
                vec![Instruction::Output(link.src.port())],
            ));
        }

        rules.push(self.rule(
            last,
            dir,
            TrafficSelector::mpls(dir.label),
            vec![
                Instruction::PopMpls(dir.protocol),
                Instruction::Output(dir.exit.port()),
            ],
        ));

        Ok(rules)
    }

    fn rule(
        &self,
        device: &DeviceId,
        dir: &TunnelDirection,
        selector: TrafficSelector,
        treatment: Vec<Instruction>,
    ) -> FlowRule {
        FlowRule {
            device_id: device.clone(),
            table: self.table,
            priority: self.priority,
            permanent: true,
            app_id: self.app_id,
            cookie: dir.label.as_cookie(),
            selector,
            treatment,
        }
    }
}
