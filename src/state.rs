//! Caller-facing lifecycle states
//!
//! Cloud Director walks a VM through
//! `UNRESOLVED -> POWERED_OFF -> PARTIALLY_POWERED_OFF -> POWERED_ON` while
//! deploying and `POWERED_ON -> PARTIALLY_POWERED_OFF -> POWERED_OFF ->
//! DELETING -> UNKNOWN` while deleting. The two powered-off statuses occur
//! on both paths, so they are withheld instead of reported.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Creating,
    Running,
    Deleting,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Creating => write!(f, "creating"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Deleting => write!(f, "deleting"),
        }
    }
}

/// Outcome of classifying a provider status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Report(LifecycleState),
    /// Transitional status, direction unknown
    Withhold,
    /// Status outside the known lifecycle
    Unexpected,
}

impl Classification {
    pub fn state(&self) -> Option<LifecycleState> {
        match self {
            Classification::Report(state) => Some(*state),
            Classification::Withhold | Classification::Unexpected => None,
        }
    }
}

pub fn classify(status: &str) -> Classification {
    match status {
        "UNRESOLVED" => Classification::Report(LifecycleState::Creating),
        "POWERED_ON" => Classification::Report(LifecycleState::Running),
        "UNKNOWN" => Classification::Report(LifecycleState::Deleting),
        "POWERED_OFF" | "PARTIALLY_POWERED_OFF" => Classification::Withhold,
        _ => Classification::Unexpected,
    }
}

/// State of one VM as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    pub id: String,
    pub state: LifecycleState,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub members: Vec<MemberState>,
    /// Every VM in the vApp, reported or not
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::status_name;

    #[test]
    fn test_classify_table() {
        assert_eq!(classify("UNRESOLVED"), Classification::Report(LifecycleState::Creating));
        assert_eq!(classify("POWERED_ON"), Classification::Report(LifecycleState::Running));
        assert_eq!(classify("UNKNOWN"), Classification::Report(LifecycleState::Deleting));
        assert_eq!(classify("POWERED_OFF"), Classification::Withhold);
        assert_eq!(classify("PARTIALLY_POWERED_OFF"), Classification::Withhold);
        assert_eq!(classify("SUSPENDED"), Classification::Unexpected);
        assert_eq!(classify(""), Classification::Unexpected);
        assert_eq!(classify("powered_on"), Classification::Unexpected);
    }

    #[test]
    fn test_powered_off_never_reported() {
        for code in -1..=22 {
            let status = status_name(code);
            let state = classify(status).state();
            if matches!(status, "POWERED_OFF" | "PARTIALLY_POWERED_OFF") {
                assert_eq!(state, None);
            }
            // Deterministic
            assert_eq!(classify(status), classify(status));
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Creating.to_string(), "creating");
        assert_eq!(
            serde_json::to_string(&LifecycleState::Running).unwrap(),
            "\"running\""
        );
    }
}
