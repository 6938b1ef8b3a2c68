//! Transport label allocation.
//!
//! One allocator instance owns the in-use label set for the whole process:
//! every tunnel of every tenant draws its two labels from the same pool.
//! Implementations must make "pick a free label" and "mark it in use" a
//! single critical section so concurrent provisioning never hands out the
//! same label twice.

mod lowest_free;
mod random_probe;

pub use lowest_free::LowestFreeAllocator;
pub use random_probe::RandomProbeAllocator;

use sdwan_types::MplsLabel;
use thiserror::Error;

/// Label allocation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelAllocError {
    /// Every probe of every random restart hit an in-use label.
    #[error("no free label found after {rounds} random probe rounds")]
    Exhausted { rounds: u32 },

    /// All 2^20 labels are in use.
    #[error("label space is full ({in_use} labels in use)")]
    SpaceFull { in_use: usize },
}

/// Process-wide transport label pool.
pub trait LabelAllocator: Send + Sync {
    /// Picks a free label and marks it in use.
    fn allocate(&self) -> Result<MplsLabel, LabelAllocError>;

    /// Returns a label to the pool.
    ///
    /// Returns false if the label was not in use.
    fn release(&self, label: MplsLabel) -> bool;

    /// Returns true if the label is currently in use.
    fn is_allocated(&self, label: MplsLabel) -> bool;

    /// Returns the number of labels in use.
    fn allocated_count(&self) -> usize;

    /// Releases every label.
    fn clear(&self);
}
