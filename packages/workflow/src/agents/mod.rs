// ABOUTME: Stage agents that turn upstream stage data into a new stage document
// ABOUTME: Shared dependencies, per-stage generation profiles and the agent registry

pub mod demo;
pub mod direction;
pub mod features;
pub mod prd;
pub mod prototype;
pub mod testcases;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pmstation_ai::{GatewayRegistry, GenerationRequest, LlmGateway, ModelTier};
use pmstation_core::StageType;
use pmstation_prompts::PromptManager;
use pmstation_storage::StageStorage;

use crate::context::ProjectContext;
use crate::error::Result;
use crate::types::StagePayload;

pub use demo::{DemoAgent, DemoContext};
pub use direction::DirectionAgent;
pub use features::FeaturesAgent;
pub use prd::PrdAgent;
pub use prototype::PrototypeAgent;
pub use testcases::TestcasesAgent;

/// Model tier and sampling parameters for one kind of call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationProfile {
    pub tier: ModelTier,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationProfile {
    const fn new(tier: ModelTier, temperature: f32, max_tokens: u32) -> Self {
        Self {
            tier,
            temperature,
            max_tokens,
        }
    }
}

pub const DIRECTION_PROFILE: GenerationProfile = GenerationProfile::new(ModelTier::Pro, 0.8, 8192);
pub const FEATURES_PROFILE: GenerationProfile = GenerationProfile::new(ModelTier::Pro, 0.7, 8192);
pub const DEMO_STRUCTURE_PROFILE: GenerationProfile =
    GenerationProfile::new(ModelTier::Flash, 0.7, 4096);
pub const DEMO_PAGE_PROFILE: GenerationProfile = GenerationProfile::new(ModelTier::Pro, 0.6, 8192);
pub const PRD_PROFILE: GenerationProfile = GenerationProfile::new(ModelTier::Pro, 0.6, 32768);
pub const TESTCASES_PROFILE: GenerationProfile =
    GenerationProfile::new(ModelTier::Flash, 0.5, 8192);
pub const PROTOTYPE_PROFILE: GenerationProfile = GenerationProfile::new(ModelTier::Pro, 0.7, 8192);

/// Aspect ratio requested for prototype screen images
pub const PROTOTYPE_ASPECT_RATIO: &str = "9:16";

/// Everything an agent needs to read upstream stages and call a model
#[derive(Clone)]
pub struct AgentDeps {
    pub stages: StageStorage,
    pub prompts: Arc<PromptManager>,
    pub gateways: GatewayRegistry,
}

impl AgentDeps {
    pub fn new(stages: StageStorage, prompts: Arc<PromptManager>, gateways: GatewayRegistry) -> Self {
        Self {
            stages,
            prompts,
            gateways,
        }
    }

    pub async fn context(&self, project_id: &str) -> Result<ProjectContext> {
        ProjectContext::load(&self.stages, project_id).await
    }

    pub fn gateway(&self, profile: GenerationProfile) -> Arc<dyn LlmGateway> {
        self.gateways.get(profile.tier)
    }

    /// Render a stage prompt with its system instruction and declared output schema
    pub fn request(
        &self,
        prompt_id: &str,
        parameters: &[(&str, &str)],
        profile: GenerationProfile,
    ) -> Result<GenerationRequest> {
        let prompt = self.prompts.get_prompt(prompt_id, parameters)?;
        let system = self.prompts.get_system_prompt(prompt_id)?;

        let mut request = GenerationRequest::new(prompt)
            .system(system)
            .temperature(profile.temperature)
            .max_tokens(profile.max_tokens);
        if let Some(schema) = self.prompts.output_schema(prompt_id)? {
            request = request.schema(schema);
        }
        Ok(request)
    }
}

impl fmt::Debug for AgentDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDeps").finish_non_exhaustive()
    }
}

/// Produces the output document of one stage type.
///
/// Agents never recover from failures locally; the orchestrator discards the
/// version they were generating.
#[async_trait]
pub trait StageAgent: Send + Sync {
    fn stage_type(&self) -> StageType;

    async fn generate(&self, project_id: &str) -> Result<StagePayload>;
}

/// Stage type to agent lookup
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<StageType, Arc<dyn StageAgent>>,
}

impl AgentRegistry {
    /// One agent per generated stage type
    pub fn standard(deps: &AgentDeps) -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(DirectionAgent::new(deps.clone())));
        registry.register(Arc::new(FeaturesAgent::new(deps.clone())));
        registry.register(Arc::new(DemoAgent::new(deps.clone())));
        registry.register(Arc::new(PrdAgent::new(deps.clone())));
        registry.register(Arc::new(TestcasesAgent::new(deps.clone())));
        registry.register(Arc::new(PrototypeAgent::new(deps.clone())));
        registry
    }

    /// Add or replace the agent for its stage type
    pub fn register(&mut self, agent: Arc<dyn StageAgent>) {
        self.agents.insert(agent.stage_type(), agent);
    }

    pub fn get(&self, stage_type: StageType) -> Option<Arc<dyn StageAgent>> {
        self.agents.get(&stage_type).cloned()
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.agents.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        f.debug_struct("AgentRegistry").field("stages", &types).finish()
    }
}
