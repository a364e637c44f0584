// ABOUTME: Model-tier registry handing out shared gateway instances
// ABOUTME: Built once at startup and injected into agents and the demo pipeline

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::AIServiceResult;
use crate::gateway::LlmGateway;
use crate::gemini::{GeminiClient, GeminiSettings};

/// Quality/speed tiers the workflow chooses between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    /// Higher quality, slower
    Pro,
    /// Faster, cheaper
    Flash,
    /// Image output
    Image,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelTier::Pro => "pro",
            ModelTier::Flash => "flash",
            ModelTier::Image => "image",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct GatewayRegistry {
    pro: Arc<dyn LlmGateway>,
    flash: Arc<dyn LlmGateway>,
    image: Arc<dyn LlmGateway>,
}

impl GatewayRegistry {
    pub fn new(
        pro: Arc<dyn LlmGateway>,
        flash: Arc<dyn LlmGateway>,
        image: Arc<dyn LlmGateway>,
    ) -> Self {
        Self { pro, flash, image }
    }

    /// Every tier served by the same gateway
    pub fn single(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            pro: gateway.clone(),
            flash: gateway.clone(),
            image: gateway,
        }
    }

    /// Gemini clients for each tier
    pub fn gemini(settings: &GeminiSettings) -> AIServiceResult<Self> {
        info!(
            pro = %settings.pro_model,
            flash = %settings.flash_model,
            image = %settings.image_model,
            "Initializing Gemini gateways"
        );
        Ok(Self {
            pro: Arc::new(GeminiClient::from_settings(settings, &settings.pro_model)?),
            flash: Arc::new(GeminiClient::from_settings(settings, &settings.flash_model)?),
            image: Arc::new(GeminiClient::from_settings(settings, &settings.image_model)?),
        })
    }

    pub fn get(&self, tier: ModelTier) -> Arc<dyn LlmGateway> {
        match tier {
            ModelTier::Pro => self.pro.clone(),
            ModelTier::Flash => self.flash.clone(),
            ModelTier::Image => self.image.clone(),
        }
    }
}

impl fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayRegistry").finish_non_exhaustive()
    }
}
