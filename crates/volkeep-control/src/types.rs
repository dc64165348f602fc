//! Types passed between the reconciliation stages.

use std::time::Duration;

use volkeep_core::VolumeInstance;

/// The actions one reconciliation cycle decided on.
///
/// Recomputed every cycle and discarded after execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionBatch {
    /// Desired volumes missing from the cluster.
    pub create: Vec<VolumeInstance>,
    /// Expired volumes to remove.
    pub purge: Vec<VolumeInstance>,
    /// Existing volumes whose access expressions must be reapplied.
    pub ace_mod: Vec<VolumeInstance>,
}

impl ActionBatch {
    /// Returns true if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.purge.is_empty() && self.ace_mod.is_empty()
    }

    /// Total number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.create.len() + self.purge.len() + self.ace_mod.len()
    }
}

/// Outcome counts of executing an [`ActionBatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Volumes removed.
    pub purged: usize,
    /// Volumes created, whether or not every follow-up step succeeded.
    pub created: usize,
    /// Access policies reapplied.
    pub policies_updated: usize,
    /// Items with at least one failed step.
    pub failed: usize,
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Inventory was fetched and the batch executed.
    Reconciled {
        /// Size of the prepared batch.
        planned: usize,
        /// Execution outcome.
        report: ExecutionReport,
        /// Wall time spent.
        elapsed: Duration,
    },
    /// Inventory could not be fetched; nothing was changed.
    Skipped {
        /// Why the cycle was skipped.
        reason: String,
    },
}

impl CycleReport {
    /// Returns true if the cycle reached the executor.
    #[must_use]
    pub const fn is_reconciled(&self) -> bool {
        matches!(self, Self::Reconciled { .. })
    }
}
