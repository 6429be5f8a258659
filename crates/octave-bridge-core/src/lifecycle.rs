use crate::CoreError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Unset,
    ContainerizedActive,
    LocalActive,
    Failed,
}

impl ManagerState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::ContainerizedActive | Self::LocalActive)
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unset => "unset",
            Self::ContainerizedActive => "containerized",
            Self::LocalActive => "local",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// An active manager never switches backend; only an explicit teardown
/// returns it to `Unset`.
pub fn validate_transition(from: ManagerState, to: ManagerState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            ManagerState::Unset | ManagerState::Failed,
            ManagerState::ContainerizedActive | ManagerState::LocalActive | ManagerState::Failed
        ) | (
            ManagerState::ContainerizedActive | ManagerState::LocalActive,
            ManagerState::Unset
        )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
