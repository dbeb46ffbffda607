//! Instance mutation outcomes.

use chrono::{DateTime, Utc};

use crate::aggregates::instance::InstanceStatus;

/// What changed when an instance was mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceUpdate {
    ProgressAdded {
        amount: u32,
        from: u32,
        to: u32,
        objective_reached: bool,
    },
    Armed {
        at: DateTime<Utc>,
    },
    Completed {
        at: DateTime<Utc>,
        from: InstanceStatus,
        success: bool,
    },
    Cancelled {
        at: DateTime<Utc>,
        from: InstanceStatus,
    },
}

impl InstanceUpdate {
    pub fn objective_reached(&self) -> bool {
        matches!(
            self,
            InstanceUpdate::ProgressAdded {
                objective_reached: true,
                ..
            }
        )
    }
}
