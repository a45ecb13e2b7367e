//! Per-unit stage and state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The stages a design unit moves through, in order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UnitStage {
    /// Discovered, nothing done yet.
    #[default]
    Pending,
    /// Listing content generated and validated.
    ContentGenerated,
    /// Source image (and mockups) hosted.
    Uploaded,
    /// Product created on the commerce API.
    Synced,
}

impl fmt::Display for UnitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::ContentGenerated => write!(f, "content_generated"),
            Self::Uploaded => write!(f, "uploaded"),
            Self::Synced => write!(f, "synced"),
        }
    }
}

impl UnitStage {
    /// All stages in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::ContentGenerated,
        Self::Uploaded,
        Self::Synced,
    ];

    /// The stage reached after this one succeeds, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::ContentGenerated),
            Self::ContentGenerated => Some(Self::Uploaded),
            Self::Uploaded => Some(Self::Synced),
            Self::Synced => None,
        }
    }
}

/// State of a design unit within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    /// The unit has reached `stage` and has not failed.
    Reached {
        /// Furthest stage completed.
        stage: UnitStage,
    },
    /// The unit failed while attempting `stage`.
    Failed {
        /// Stage that could not be reached.
        stage: UnitStage,
        /// Failure description.
        reason: String,
    },
}

impl Default for UnitState {
    fn default() -> Self {
        Self::Reached {
            stage: UnitStage::Pending,
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reached { stage } => write!(f, "{stage}"),
            Self::Failed { stage, reason } => write!(f, "failed({stage}): {reason}"),
        }
    }
}

impl UnitState {
    /// Advances to the next stage. Failed and synced states do not move.
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::Reached { stage } => Self::Reached {
                stage: stage.next().unwrap_or(stage),
            },
            failed @ Self::Failed { .. } => failed,
        }
    }

    /// Marks the unit failed at the stage it was attempting.
    #[must_use]
    pub fn fail(self, reason: impl Into<String>) -> Self {
        match self {
            Self::Reached { stage } => Self::Failed {
                stage: stage.next().unwrap_or(stage),
                reason: reason.into(),
            },
            failed @ Self::Failed { .. } => failed,
        }
    }

    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Reached {
                stage: UnitStage::Synced
            } | Self::Failed { .. }
        )
    }

    /// Returns true if the unit was synced.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Reached {
                stage: UnitStage::Synced
            }
        )
    }

    /// Returns true if the unit failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The stage reached, or the stage that failed.
    #[must_use]
    pub fn stage(&self) -> UnitStage {
        match self {
            Self::Reached { stage } | Self::Failed { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_stage_display() {
        assert_eq!(UnitStage::Pending.to_string(), "pending");
        assert_eq!(UnitStage::ContentGenerated.to_string(), "content_generated");
        assert_eq!(UnitStage::Uploaded.to_string(), "uploaded");
        assert_eq!(UnitStage::Synced.to_string(), "synced");
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(UnitStage::Pending.next(), Some(UnitStage::ContentGenerated));
        assert_eq!(UnitStage::Uploaded.next(), Some(UnitStage::Synced));
        assert_eq!(UnitStage::Synced.next(), None);
        assert!(UnitStage::Pending < UnitStage::Synced);
    }

    #[test]
    fn test_happy_path_transitions() {
        let state = UnitState::default();
        assert!(!state.is_terminal());

        let state = state.advance().advance().advance();
        assert!(state.is_terminal());
        assert!(state.is_success());
        assert_eq!(state.stage(), UnitStage::Synced);

        // synced is absorbing
        assert_eq!(state.clone().advance(), state);
    }

    #[test]
    fn test_failure_names_attempted_stage() {
        let state = UnitState::default().advance().advance().fail("rejected");
        assert_eq!(
            state,
            UnitState::Failed {
                stage: UnitStage::Synced,
                reason: "rejected".to_string()
            }
        );
        assert!(state.is_terminal());
        assert!(state.is_failure());

        let again = state.clone().fail("other").advance();
        assert_eq!(again, state);
    }

    #[test]
    fn test_failure_at_first_stage() {
        let state = UnitState::default().fail("bad json");
        assert_eq!(state.stage(), UnitStage::ContentGenerated);
        assert_eq!(state.to_string(), "failed(content_generated): bad json");
    }

    #[test]
    fn test_unit_state_serialize() {
        let state = UnitState::Failed {
            stage: UnitStage::Uploaded,
            reason: "too big".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "failed", "stage": "uploaded", "reason": "too big"})
        );

        let back: UnitState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
