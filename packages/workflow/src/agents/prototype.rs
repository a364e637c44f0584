// ABOUTME: Prototype agent describing UI screens and rendering a mockup image for each
// ABOUTME: Images are requested in sequential batches of three concurrent calls

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::join_all;
use pmstation_ai::ModelTier;
use pmstation_core::StageType;
use serde_json::Value;
use tracing::{info, warn};

use super::{AgentDeps, StageAgent, PROTOTYPE_ASPECT_RATIO, PROTOTYPE_PROFILE};
use crate::error::Result;
use crate::feature_tree::format_outline;
use crate::normalize::normalize_prototype;
use crate::types::{Screen, StagePayload};

/// Concurrent image requests per batch
pub const IMAGE_BATCH_SIZE: usize = 3;

const MAX_IMAGE_COMPONENTS: usize = 8;

pub struct PrototypeAgent {
    deps: AgentDeps,
}

impl PrototypeAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }

    fn image_prompt(&self, screen: &Screen) -> Result<String> {
        let layout = screen
            .layout
            .as_ref()
            .and_then(|l| l.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("standard");
        let components = describe_components(&screen.components);

        Ok(self.deps.prompts.get_prompt(
            "prototype_image",
            &[
                ("screen_name", &screen.name),
                ("screen_description", &screen.description),
                ("layout", layout),
                ("components", &components),
            ],
        )?)
    }

    /// Attach base64 images to screens; a failed image leaves its screen untouched
    async fn attach_images(&self, project_id: &str, screens: &mut [Screen]) -> Result<()> {
        let gateway = self.deps.gateways.get(ModelTier::Image);

        for batch in screens.chunks_mut(IMAGE_BATCH_SIZE) {
            let prompts = batch
                .iter()
                .map(|screen| self.image_prompt(screen))
                .collect::<Result<Vec<_>>>()?;

            let images = join_all(prompts.iter().map(|prompt| {
                let gateway = gateway.clone();
                async move { gateway.generate_image(prompt, PROTOTYPE_ASPECT_RATIO).await }
            }))
            .await;

            for (screen, image) in batch.iter_mut().zip(images) {
                match image {
                    Some(bytes) => screen.image_data = Some(BASE64.encode(bytes)),
                    None => warn!(
                        project_id = %project_id,
                        screen = %screen.name,
                        "Image generation failed for screen"
                    ),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StageAgent for PrototypeAgent {
    fn stage_type(&self) -> StageType {
        StageType::Prototype
    }

    async fn generate(&self, project_id: &str) -> Result<StagePayload> {
        let context = self.deps.context(project_id).await?;
        let idea = context.idea()?;
        let direction = context.selected_direction()?;
        let modules = format_outline(&context.selected_modules()?);

        let request = self.deps.request(
            "prototype",
            &[
                ("idea", &idea),
                ("direction", &direction.title),
                ("target_users", direction.target_users.as_deref().unwrap_or("")),
                ("modules", &modules),
            ],
            PROTOTYPE_PROFILE,
        )?;
        let raw = self
            .deps
            .gateway(PROTOTYPE_PROFILE)
            .generate_structured(request)
            .await?;

        let mut output = normalize_prototype(raw)?;
        self.attach_images(project_id, &mut output.screens).await?;

        info!(
            project_id = %project_id,
            screens = output.screens.len(),
            images = output.screens.iter().filter(|s| s.image_data.is_some()).count(),
            "Generated prototype"
        );
        Ok(StagePayload::Prototype(output))
    }
}

/// "- type: name - description" lines for the first few named components
fn describe_components(components: &[Value]) -> String {
    let lines: Vec<String> = components
        .iter()
        .filter_map(|component| {
            let name = str_field(component, "name");
            let description = str_field(component, "description");
            if name.is_empty() && description.is_empty() {
                return None;
            }
            let kind = match str_field(component, "type") {
                "" => "element",
                kind => kind,
            };
            Some(format!("- {}: {} - {}", kind, name, description))
        })
        .take(MAX_IMAGE_COMPONENTS)
        .collect();

    if lines.is_empty() {
        "- Standard UI elements".to_string()
    } else {
        lines.join("\n")
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}
