// ABOUTME: Upstream stage data as seen by agents and the demo pipeline
// ABOUTME: Loads the latest version of each stage once and decodes fields on demand

use std::collections::{HashMap, HashSet};

use pmstation_core::{Stage, StageType};
use pmstation_storage::StageStorage;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, WorkflowError};
use crate::feature_tree;
use crate::types::{
    DemoStructure, Direction, DirectionsOutput, FeatureModule, FeatureSelection, FeaturesOutput,
    IdeaInput, PlatformSelection, PrdDocument, PrototypeOutput, Screen,
};

/// Latest version of every stage of one project
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project_id: String,
    latest: HashMap<StageType, Stage>,
}

impl ProjectContext {
    pub async fn load(stages: &StageStorage, project_id: &str) -> Result<Self> {
        let mut latest: HashMap<StageType, Stage> = HashMap::new();
        for stage in stages.list_stages(project_id).await? {
            let newer = latest
                .get(&stage.stage_type)
                .map_or(true, |current| stage.version > current.version);
            if newer {
                latest.insert(stage.stage_type, stage);
            }
        }
        Ok(Self {
            project_id: project_id.to_string(),
            latest,
        })
    }

    pub fn latest(&self, stage_type: StageType) -> Option<&Stage> {
        self.latest.get(&stage_type)
    }

    pub fn idea(&self) -> Result<String> {
        let input = self
            .latest(StageType::Idea)
            .and_then(|s| s.input_data.clone())
            .ok_or_else(|| WorkflowError::missing(StageType::Idea, "content"))?;
        let idea: IdeaInput = decode(StageType::Idea, input)?;
        Ok(idea.content)
    }

    /// The direction the user picked.
    ///
    /// A multi-id selection resolves to the first selected id that exists in
    /// the generated directions.
    pub fn selected_direction(&self) -> Result<Direction> {
        let stage = self
            .latest(StageType::Direction)
            .ok_or_else(|| WorkflowError::missing(StageType::Direction, "stage"))?;
        let selected = stage
            .selected_option
            .clone()
            .ok_or_else(|| WorkflowError::missing(StageType::Direction, "selection"))?;

        if let Some(ids) = selected.get("selected_ids") {
            let ids: FeatureSelection = decode(
                StageType::Direction,
                serde_json::json!({ "selected_ids": ids }),
            )?;
            let output = stage
                .output_data
                .clone()
                .ok_or_else(|| WorkflowError::missing(StageType::Direction, "output"))?;
            let directions: DirectionsOutput = decode(StageType::Direction, output)?;
            return directions
                .directions
                .into_iter()
                .find(|d| d.id.is_some_and(|id| ids.selected_ids.contains(&id)))
                .ok_or_else(|| WorkflowError::missing(StageType::Direction, "selection"));
        }

        decode(StageType::Direction, selected)
    }

    pub fn platform_selection(&self) -> Result<PlatformSelection> {
        let selected = self
            .latest(StageType::Platform)
            .and_then(|s| s.selected_option.clone())
            .ok_or_else(|| WorkflowError::missing(StageType::Platform, "selection"))?;
        decode(StageType::Platform, selected)
    }

    pub fn features(&self) -> Result<FeaturesOutput> {
        let output = self
            .latest(StageType::Features)
            .and_then(|s| s.output_data.clone())
            .ok_or_else(|| WorkflowError::missing(StageType::Features, "output"))?;
        decode(StageType::Features, output)
    }

    /// Feature tree filtered by the user's selection; all modules when nothing was selected
    pub fn selected_modules(&self) -> Result<Vec<FeatureModule>> {
        let features = self.features()?;
        let selection = self
            .latest(StageType::Features)
            .and_then(|s| s.selected_option.clone())
            .map(|value| decode::<FeatureSelection>(StageType::Features, value))
            .transpose()?;

        match selection {
            Some(selection) if !selection.selected_ids.is_empty() => {
                let ids: HashSet<i64> = selection.selected_ids.into_iter().collect();
                Ok(feature_tree::filter_selected(&features.modules, &ids))
            }
            _ => Ok(features.modules),
        }
    }

    /// Prototype screens if a prototype has been generated
    pub fn prototype_screens(&self) -> Result<Vec<Screen>> {
        match self
            .latest(StageType::Prototype)
            .and_then(|s| s.output_data.clone())
        {
            Some(output) => Ok(decode::<PrototypeOutput>(StageType::Prototype, output)?.screens),
            None => Ok(Vec::new()),
        }
    }

    pub fn prd(&self) -> Result<PrdDocument> {
        let output = self
            .latest(StageType::Prd)
            .and_then(|s| s.output_data.clone())
            .ok_or_else(|| WorkflowError::missing(StageType::Prd, "output"))?;
        decode(StageType::Prd, output)
    }

    /// Latest demo structure and the id of the version holding it
    pub fn demo(&self) -> Result<(String, DemoStructure)> {
        let stage = self
            .latest(StageType::Demo)
            .ok_or(WorkflowError::StageNotFound(StageType::Demo))?;
        let output = stage
            .output_data
            .clone()
            .ok_or(WorkflowError::StageNotFound(StageType::Demo))?;
        Ok((stage.id.clone(), decode(StageType::Demo, output)?))
    }

    /// "Target platforms: pc, mobile", or empty when no platform was chosen
    pub fn platform_info(&self) -> String {
        match self.platform_selection() {
            Ok(selection) if !selection.platforms.is_empty() => {
                format!("Target platforms: {}", selection.labels())
            }
            _ => String::new(),
        }
    }
}

fn decode<T: DeserializeOwned>(stage: StageType, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| WorkflowError::decode(stage, e))
}
