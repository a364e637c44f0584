// ABOUTME: Domain types for projects and versioned workflow stages
// ABOUTME: Defines the fixed stage order and the status enums persisted in SQLite

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Error returned when a string does not name a known enum variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Workflow stage kinds.
///
/// The first seven form the ordered workflow. `Prototype` is an auxiliary
/// stage that hangs off `Features` and never moves the project pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    Idea,
    Direction,
    Platform,
    Features,
    Demo,
    Prd,
    Testcases,
    Prototype,
}

/// The fixed workflow order
pub const STAGE_ORDER: [StageType; 7] = [
    StageType::Idea,
    StageType::Direction,
    StageType::Platform,
    StageType::Features,
    StageType::Demo,
    StageType::Prd,
    StageType::Testcases,
];

impl StageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Idea => "idea",
            StageType::Direction => "direction",
            StageType::Platform => "platform",
            StageType::Features => "features",
            StageType::Demo => "demo",
            StageType::Prd => "prd",
            StageType::Testcases => "testcases",
            StageType::Prototype => "prototype",
        }
    }

    /// Position in the ordered workflow, `None` for auxiliary stages
    pub fn position(&self) -> Option<usize> {
        STAGE_ORDER.iter().position(|t| t == self)
    }

    pub fn is_auxiliary(&self) -> bool {
        self.position().is_none()
    }

    /// Stage whose latest version must be completed or confirmed before this one can be generated
    pub fn prerequisite(&self) -> Option<StageType> {
        match self {
            StageType::Prototype => Some(StageType::Features),
            other => match other.position() {
                Some(0) | None => None,
                Some(idx) => Some(STAGE_ORDER[idx - 1]),
            },
        }
    }

    /// Successor in the ordered workflow, `None` for the terminal and auxiliary stages
    pub fn next(&self) -> Option<StageType> {
        self.position()
            .and_then(|idx| STAGE_ORDER.get(idx + 1))
            .copied()
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idea" => Ok(StageType::Idea),
            "direction" => Ok(StageType::Direction),
            "platform" => Ok(StageType::Platform),
            "features" => Ok(StageType::Features),
            "demo" => Ok(StageType::Demo),
            "prd" => Ok(StageType::Prd),
            "testcases" => Ok(StageType::Testcases),
            "prototype" => Ok(StageType::Prototype),
            _ => Err(ParseEnumError {
                kind: "stage type",
                value: s.to_string(),
            }),
        }
    }
}

/// Status of a single stage version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Generating,
    Completed,
    Confirmed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Generating => "generating",
            StageStatus::Completed => "completed",
            StageStatus::Confirmed => "confirmed",
        }
    }

    /// Completed or confirmed; the state downstream stages may build on
    pub fn is_settled(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Confirmed)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StageStatus::Pending),
            "generating" => Ok(StageStatus::Generating),
            "completed" => Ok(StageStatus::Completed),
            "confirmed" => Ok(StageStatus::Confirmed),
            _ => Err(ParseEnumError {
                kind: "stage status",
                value: s.to_string(),
            }),
        }
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
    Deleted,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "archived" => Ok(ProjectStatus::Archived),
            "deleted" => Ok(ProjectStatus::Deleted),
            _ => Err(ParseEnumError {
                kind: "project status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub current_stage: StageType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One version of one stage of a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub status: StageStatus,
    pub input_data: Option<Value>,
    pub output_data: Option<Value>,
    pub selected_option: Option<Value>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithStages {
    #[serde(flatten)]
    pub project: Project,
    pub stages: Vec<Stage>,
}
