//! Deterministic lowest-free label allocator.

use super::{LabelAllocError, LabelAllocator};
use parking_lot::Mutex;
use sdwan_types::MplsLabel;
use std::collections::BTreeSet;

/// Always hands out the smallest label not in use.
///
/// Unlike [`RandomProbeAllocator`](super::RandomProbeAllocator) it only
/// fails when the whole label space is taken.
#[derive(Debug, Default)]
pub struct LowestFreeAllocator {
    in_use: Mutex<BTreeSet<MplsLabel>>,
}

impl LowestFreeAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LabelAllocator for LowestFreeAllocator {
    fn allocate(&self) -> Result<MplsLabel, LabelAllocError> {
        let mut in_use = self.in_use.lock();

        // The set is ordered, so the first index that differs from its
        // label is the lowest gap.
        let mut next = MplsLabel::MIN;
        for used in in_use.iter() {
            if used.as_u32() != next {
                break;
            }
            next += 1;
        }

        let label = MplsLabel::new(next).map_err(|_| LabelAllocError::SpaceFull {
            in_use: in_use.len(),
        })?;
        in_use.insert(label);
        Ok(label)
    }

    fn release(&self, label: MplsLabel) -> bool {
        self.in_use.lock().remove(&label)
    }

    fn is_allocated(&self, label: MplsLabel) -> bool {
        self.in_use.lock().contains(&label)
    }

    fn allocated_count(&self) -> usize {
        self.in_use.lock().len()
    }

    fn clear(&self) {
        self.in_use.lock().clear();
    }
}
