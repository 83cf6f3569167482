//! Mission state machine states.

use std::fmt;

/// Where the mission loop currently is.
///
/// `Seeking` carries the index of the goal being driven to; the final goal
/// sits at the last index of the plan's goal list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissionState {
    #[default]
    Initializing,
    Seeking { goal_index: usize },
    /// Short low-speed correction after arriving at the final goal
    FinalApproach,
    /// Backing off a bumper contact
    CollisionRecovery,
    Succeeded,
    Failed,
}

impl MissionState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionState::Succeeded | MissionState::Failed)
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionState::Initializing => write!(f, "initializing"),
            MissionState::Seeking { goal_index } => write!(f, "seeking goal {}", goal_index),
            MissionState::FinalApproach => write!(f, "final approach"),
            MissionState::CollisionRecovery => write!(f, "collision recovery"),
            MissionState::Succeeded => write!(f, "succeeded"),
            MissionState::Failed => write!(f, "failed"),
        }
    }
}
