//! Forwarding instructions and their synthesis from tunnel hops.

mod synth;
mod types;

pub use synth::{FlowRuleSynthesizer, DEFAULT_PRIORITY, DEFAULT_TABLE};
pub use types::{ApplicationId, Direction, FlowRule, Instruction, OwnerTag, TrafficSelector};
