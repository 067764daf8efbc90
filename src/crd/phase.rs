//! # Status Phase
//!
//! The installation state machine shared by products, stages and the installation.

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Point in a product's or stage's installation state machine
///
/// Phases are ordered from `None` to `Completed`. `Failed` sits outside the order:
/// it can be entered from any unfinished phase and left again by retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusPhase {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "creating subscription")]
    CreatingSubscription,
    #[serde(rename = "awaiting operator")]
    AwaitingOperator,
    #[serde(rename = "awaiting cloud resources")]
    AwaitingCloudResources,
    #[serde(rename = "creating components")]
    CreatingComponents,
    #[serde(rename = "awaiting components")]
    AwaitingComponents,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl StatusPhase {
    /// Every phase, in state machine order with `Failed` last
    pub const ALL: [StatusPhase; 10] = [
        StatusPhase::None,
        StatusPhase::Accepted,
        StatusPhase::CreatingSubscription,
        StatusPhase::AwaitingOperator,
        StatusPhase::AwaitingCloudResources,
        StatusPhase::CreatingComponents,
        StatusPhase::AwaitingComponents,
        StatusPhase::InProgress,
        StatusPhase::Completed,
        StatusPhase::Failed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            StatusPhase::None => "",
            StatusPhase::Accepted => "accepted",
            StatusPhase::CreatingSubscription => "creating subscription",
            StatusPhase::AwaitingOperator => "awaiting operator",
            StatusPhase::AwaitingCloudResources => "awaiting cloud resources",
            StatusPhase::CreatingComponents => "creating components",
            StatusPhase::AwaitingComponents => "awaiting components",
            StatusPhase::InProgress => "in progress",
            StatusPhase::Completed => "completed",
            StatusPhase::Failed => "failed",
        }
    }

    /// Position in the forward order, `None` for `Failed`
    pub const fn rank(self) -> Option<u8> {
        match self {
            StatusPhase::None => Some(0),
            StatusPhase::Accepted => Some(1),
            StatusPhase::CreatingSubscription => Some(2),
            StatusPhase::AwaitingOperator => Some(3),
            StatusPhase::AwaitingCloudResources => Some(4),
            StatusPhase::CreatingComponents => Some(5),
            StatusPhase::AwaitingComponents => Some(6),
            StatusPhase::InProgress => Some(7),
            StatusPhase::Completed => Some(8),
            StatusPhase::Failed => None,
        }
    }

    pub const fn is_completed(self) -> bool {
        matches!(self, StatusPhase::Completed)
    }

    pub const fn is_failed(self) -> bool {
        matches!(self, StatusPhase::Failed)
    }

    /// Whether moving from `self` to `next` respects the state machine
    ///
    /// Forward moves and staying put are allowed. `Failed` is reachable from any
    /// unfinished phase, and a failed phase may restart anywhere.
    pub const fn can_transition_to(self, next: StatusPhase) -> bool {
        match (self.rank(), next.rank()) {
            (None, _) => true,
            (Some(_), None) => !self.is_completed(),
            (Some(current), Some(next)) => next >= current,
        }
    }

    /// Label value used for metrics (`none` instead of the empty string)
    pub const fn metric_label(self) -> &'static str {
        match self {
            StatusPhase::None => "none",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for StatusPhase {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("StatusPhase")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let values: Vec<&str> = StatusPhase::ALL.iter().map(|p| p.as_str()).collect();
        schemars::json_schema!({
            "type": "string",
            "enum": values,
        })
    }
}
