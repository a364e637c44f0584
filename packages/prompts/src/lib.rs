// ABOUTME: Prompt template management for the workflow agents
// ABOUTME: Templates ship as JSON files embedded at compile time, with {{param}} substitution

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Failed to read prompt file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse prompt JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid prompt format: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, PromptError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub version: String,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub name: String,
    pub category: String,
    pub template: String,
    pub parameters: Vec<String>,
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PromptMetadata>,
}

pub const STAGE_CATEGORY: &str = "stage";
pub const SYSTEM_CATEGORY: &str = "system";

const EMBEDDED: &[&str] = &[
    include_str!("../prompts/stage/direction.json"),
    include_str!("../prompts/stage/features.json"),
    include_str!("../prompts/stage/demo_structure.json"),
    include_str!("../prompts/stage/demo_page.json"),
    include_str!("../prompts/stage/demo_modify.json"),
    include_str!("../prompts/stage/prd.json"),
    include_str!("../prompts/stage/testcases.json"),
    include_str!("../prompts/stage/prototype.json"),
    include_str!("../prompts/stage/prototype_image.json"),
    include_str!("../prompts/system/direction.json"),
    include_str!("../prompts/system/features.json"),
    include_str!("../prompts/system/demo_structure.json"),
    include_str!("../prompts/system/demo_page.json"),
    include_str!("../prompts/system/demo_modify.json"),
    include_str!("../prompts/system/prd.json"),
    include_str!("../prompts/system/testcases.json"),
    include_str!("../prompts/system/prototype.json"),
];

/// Read-only prompt catalogue keyed by (category, id)
#[derive(Debug, Clone)]
pub struct PromptManager {
    prompts: HashMap<(String, String), Prompt>,
}

impl PromptManager {
    /// Catalogue built from the templates compiled into the binary
    pub fn embedded() -> Result<Self> {
        let mut manager = Self {
            prompts: HashMap::new(),
        };
        for source in EMBEDDED {
            manager.insert(parse_prompt(source, "embedded prompt")?);
        }
        Ok(manager)
    }

    /// Embedded catalogue with any `<category>/<id>.json` files under `dir` replacing the defaults
    pub fn with_overrides(dir: &Path) -> Result<Self> {
        let mut manager = Self::embedded()?;
        for category in [STAGE_CATEGORY, SYSTEM_CATEGORY] {
            let category_dir = dir.join(category);
            if !category_dir.exists() {
                continue;
            }
            for entry in fs::read_dir(&category_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|s| s.to_str()) != Some("json") {
                    continue;
                }
                let content = fs::read_to_string(&path)?;
                manager.insert(parse_prompt(&content, &path.display().to_string())?);
            }
        }
        Ok(manager)
    }

    fn insert(&mut self, prompt: Prompt) {
        self.prompts
            .insert((prompt.category.clone(), prompt.id.clone()), prompt);
    }

    /// Render a stage prompt with parameter substitution
    pub fn get_prompt(&self, prompt_id: &str, parameters: &[(&str, &str)]) -> Result<String> {
        let prompt = self.lookup(STAGE_CATEGORY, prompt_id)?;
        substitute_parameters(&prompt.template, parameters, &prompt.parameters)
    }

    /// Get a system instruction by id
    pub fn get_system_prompt(&self, prompt_id: &str) -> Result<String> {
        Ok(self.lookup(SYSTEM_CATEGORY, prompt_id)?.template.clone())
    }

    /// Output schema declared by a stage prompt, if any
    pub fn output_schema(&self, prompt_id: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.lookup(STAGE_CATEGORY, prompt_id)?.output_schema.clone())
    }

    /// List all prompt ids in a category
    pub fn list_prompts(&self, category: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .prompts
            .keys()
            .filter(|(c, _)| c == category)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn lookup(&self, category: &str, prompt_id: &str) -> Result<&Prompt> {
        self.prompts
            .get(&(category.to_string(), prompt_id.to_string()))
            .ok_or_else(|| PromptError::NotFound(format!("{}/{}", category, prompt_id)))
    }
}

fn parse_prompt(content: &str, origin: &str) -> Result<Prompt> {
    let prompt: Prompt = serde_json::from_str(content)?;

    if prompt.id.is_empty() || prompt.template.is_empty() || prompt.category.is_empty() {
        return Err(PromptError::InvalidFormat(format!(
            "Invalid prompt format in {}",
            origin
        )));
    }

    Ok(prompt)
}

/// Substitute `{{key}}` placeholders after checking every required parameter is present.
///
/// The template is scanned once, so placeholders that appear inside a
/// substituted value are left as written. Unknown placeholders are kept.
fn substitute_parameters(
    template: &str,
    parameters: &[(&str, &str)],
    required_params: &[String],
) -> Result<String> {
    let param_map: HashMap<&str, &str> = parameters.iter().copied().collect();

    for required in required_params {
        if !param_map.contains_key(required.as_str()) {
            return Err(PromptError::MissingParameter(required.clone()));
        }
    }

    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            result.push_str(&rest[open..]);
            return Ok(result);
        };
        match param_map.get(&after[..close]) {
            Some(value) => result.push_str(value),
            None => result.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after[close + 2..];
    }
    result.push_str(rest);

    Ok(result)
}
