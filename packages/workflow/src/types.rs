// ABOUTME: Typed payloads for stage inputs, outputs and selections
// ABOUTME: Unknown model-produced fields are preserved through flattened maps

use pmstation_core::StageType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, WorkflowError};

/// Accepts integer ids and numeric strings; anything else is treated as absent.
/// Model output is normalised first, which moves non-numeric ids to `original_id`.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts strings and numbers as page ids
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaInput {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positioning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_users: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_proposition: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsOutput {
    pub directions: Vec<Direction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Target platform of a product or a demo platform entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[serde(alias = "web", alias = "desktop", alias = "PC")]
    Pc,
    #[serde(alias = "app", alias = "h5", alias = "ios", alias = "android")]
    Mobile,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Pc => "pc",
            PlatformKind::Mobile => "mobile",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform stage selection, stored as both output and selected option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSelection {
    pub platforms: Vec<PlatformKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_type: Option<String>,
}

impl PlatformSelection {
    /// Non-empty subset of {pc, mobile}, without duplicates
    pub fn validate(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(WorkflowError::InvalidSelection(
                "at least one platform must be selected".to_string(),
            ));
        }
        let mut seen = Vec::with_capacity(2);
        for p in &self.platforms {
            if seen.contains(p) {
                return Err(WorkflowError::InvalidSelection(format!(
                    "platform {} selected twice",
                    p
                )));
            }
            seen.push(*p);
        }
        Ok(())
    }

    pub fn includes(&self, kind: PlatformKind) -> bool {
        self.platforms.contains(&kind)
    }

    /// PC role, "N/A" when PC is not targeted
    pub fn pc_role(&self) -> String {
        if self.includes(PlatformKind::Pc) {
            self.pc_type.clone().unwrap_or_else(|| "full".to_string())
        } else {
            "N/A".to_string()
        }
    }

    /// Mobile role, "N/A" when mobile is not targeted
    pub fn mobile_role(&self) -> String {
        if self.includes(PlatformKind::Mobile) {
            self.mobile_type.clone().unwrap_or_else(|| "user".to_string())
        } else {
            "N/A".to_string()
        }
    }

    pub fn labels(&self) -> String {
        self.platforms
            .iter()
            .map(PlatformKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Node of the feature tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureModule {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_features: Option<Vec<FeatureModule>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureModule {
    pub fn children(&self) -> &[FeatureModule] {
        self.sub_features.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesOutput {
    pub modules: Vec<FeatureModule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    pub selected_ids: Vec<i64>,
}

/// Lifecycle of a single demo page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Error,
    Skipped,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Pending => "pending",
            PageStatus::Generating => "generating",
            PageStatus::Completed => "completed",
            PageStatus::Error => "error",
            PageStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default)]
    pub trigger: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub target_page_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_changes: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoPlatform {
    #[serde(rename = "type")]
    pub kind: PlatformKind,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Output document of the demo stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoStructure {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub platforms: Vec<DemoPlatform>,
    #[serde(default)]
    pub shared_state: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DemoStructure {
    pub fn total_pages(&self) -> usize {
        self.platforms.iter().map(|p| p.pages.len()).sum()
    }

    pub fn find_page(&self, page_id: &str) -> Option<(PlatformKind, &Page)> {
        self.platforms.iter().find_map(|platform| {
            platform
                .pages
                .iter()
                .find(|page| page.id == page_id)
                .map(|page| (platform.kind, page))
        })
    }

    pub fn find_page_mut(&mut self, page_id: &str) -> Option<(PlatformKind, &mut Page)> {
        self.platforms.iter_mut().find_map(|platform| {
            let kind = platform.kind;
            platform
                .pages
                .iter_mut()
                .find(|page| page.id == page_id)
                .map(|page| (kind, page))
        })
    }

    /// Copy of the structure with every page's code removed
    pub fn without_code(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(platforms) = value.get_mut("platforms").and_then(Value::as_array_mut) {
            for platform in platforms {
                if let Some(pages) = platform.get_mut("pages").and_then(Value::as_array_mut) {
                    for page in pages {
                        if let Some(obj) = page.as_object_mut() {
                            obj.remove("code");
                        }
                    }
                }
            }
        }
        value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrdFeature {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrdModule {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<PrdFeature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrdDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub modules: Vec<PrdModule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestcasesOutput {
    #[serde(default)]
    pub test_suites: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeOutput {
    #[serde(default)]
    pub screens: Vec<Screen>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stage document, one variant per stage type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StagePayload {
    Idea(IdeaInput),
    Direction(DirectionsOutput),
    Platform(PlatformSelection),
    Features(FeaturesOutput),
    Demo(DemoStructure),
    Prd(PrdDocument),
    Testcases(TestcasesOutput),
    Prototype(PrototypeOutput),
}

impl StagePayload {
    pub fn stage_type(&self) -> StageType {
        match self {
            StagePayload::Idea(_) => StageType::Idea,
            StagePayload::Direction(_) => StageType::Direction,
            StagePayload::Platform(_) => StageType::Platform,
            StagePayload::Features(_) => StageType::Features,
            StagePayload::Demo(_) => StageType::Demo,
            StagePayload::Prd(_) => StageType::Prd,
            StagePayload::Testcases(_) => StageType::Testcases,
            StagePayload::Prototype(_) => StageType::Prototype,
        }
    }

    /// Decode a stored document as the payload for `stage_type`
    pub fn from_document(stage_type: StageType, document: Value) -> Result<Self> {
        let decoded = match stage_type {
            StageType::Idea => serde_json::from_value(document).map(StagePayload::Idea),
            StageType::Direction => serde_json::from_value(document).map(StagePayload::Direction),
            StageType::Platform => serde_json::from_value(document).map(StagePayload::Platform),
            StageType::Features => serde_json::from_value(document).map(StagePayload::Features),
            StageType::Demo => serde_json::from_value(document).map(StagePayload::Demo),
            StageType::Prd => serde_json::from_value(document).map(StagePayload::Prd),
            StageType::Testcases => serde_json::from_value(document).map(StagePayload::Testcases),
            StageType::Prototype => serde_json::from_value(document).map(StagePayload::Prototype),
        };
        decoded.map_err(|e| WorkflowError::decode(stage_type, e))
    }

    /// Untagged document as persisted in the stage row
    pub fn to_document(&self) -> Result<Value> {
        let encoded = match self {
            StagePayload::Idea(p) => serde_json::to_value(p),
            StagePayload::Direction(p) => serde_json::to_value(p),
            StagePayload::Platform(p) => serde_json::to_value(p),
            StagePayload::Features(p) => serde_json::to_value(p),
            StagePayload::Demo(p) => serde_json::to_value(p),
            StagePayload::Prd(p) => serde_json::to_value(p),
            StagePayload::Testcases(p) => serde_json::to_value(p),
            StagePayload::Prototype(p) => serde_json::to_value(p),
        };
        encoded.map_err(|e| WorkflowError::decode(self.stage_type(), e))
    }
}

/// Body of the generic select operation; exactly one field must be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionInput {
    #[serde(default)]
    pub selected_id: Option<i64>,
    #[serde(default)]
    pub selected_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Single(i64),
    Many(Vec<i64>),
}

impl SelectionInput {
    pub fn into_selection(self) -> Result<Selection> {
        match (self.selected_id, self.selected_ids) {
            (Some(id), None) => Ok(Selection::Single(id)),
            (None, Some(ids)) => Ok(Selection::Many(ids)),
            (Some(_), Some(_)) => Err(WorkflowError::InvalidSelection(
                "provide exactly one of selected_id and selected_ids, not both".to_string(),
            )),
            (None, None) => Err(WorkflowError::InvalidSelection(
                "either selected_id or selected_ids must be provided".to_string(),
            )),
        }
    }
}
