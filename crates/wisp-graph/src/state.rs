//! Per-module build state machine.
//!
//! ```text
//! Unbuilt ──► Built ──► Stale ──► Rebuilding ──► Built
//!                ▲                     │
//!                └──── Stale ◄── Error ◄┘
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::module_id::ModuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    #[default]
    Unbuilt,
    Built,
    Stale,
    Rebuilding,
    Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid build state transition: {from} -> {to}")]
    InvalidTransition { from: BuildState, to: BuildState },

    #[error("module is not in the graph: {0}")]
    UnknownModule(ModuleId),
}

impl BuildState {
    /// A watched file changed. Already-stale modules stay stale; a module
    /// mid-rebuild is superseded.
    pub fn mark_stale(self) -> Result<Self, StateError> {
        match self {
            Self::Built | Self::Stale | Self::Rebuilding | Self::Error => Ok(Self::Stale),
            Self::Unbuilt => Err(self.invalid(Self::Stale)),
        }
    }

    pub fn begin_rebuild(self) -> Result<Self, StateError> {
        match self {
            Self::Stale => Ok(Self::Rebuilding),
            other => Err(other.invalid(Self::Rebuilding)),
        }
    }

    /// Transform and resolution succeeded.
    pub fn complete(self) -> Result<Self, StateError> {
        match self {
            Self::Unbuilt | Self::Rebuilding => Ok(Self::Built),
            other => Err(other.invalid(Self::Built)),
        }
    }

    /// Transform or resolution failed.
    pub fn fail(self) -> Result<Self, StateError> {
        match self {
            Self::Unbuilt | Self::Rebuilding => Ok(Self::Error),
            other => Err(other.invalid(Self::Error)),
        }
    }

    pub fn is_servable(self) -> bool {
        matches!(self, Self::Built)
    }

    fn invalid(self, to: BuildState) -> StateError {
        StateError::InvalidTransition { from: self, to }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbuilt => "unbuilt",
            Self::Built => "built",
            Self::Stale => "stale",
            Self::Rebuilding => "rebuilding",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
