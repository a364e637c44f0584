// ABOUTME: Stage workflow for PMStation: agents, demo pipeline and orchestrator
// ABOUTME: Turns an idea into directions, features, a streamed demo, a PRD and test cases

pub mod agents;
pub mod context;
pub mod demo;
pub mod error;
pub mod feature_tree;
mod guards;
pub mod normalize;
pub mod orchestrator;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use agents::{AgentDeps, AgentRegistry, GenerationProfile, StageAgent};
pub use context::ProjectContext;
pub use demo::{DemoEvent, DemoEventStream, DemoPipeline, DemoStatusSummary};
pub use error::{Result, WorkflowError};
pub use orchestrator::StageOrchestrator;
pub use types::{
    DemoStructure, Direction, FeatureModule, FeatureSelection, Page, PageStatus, PlatformKind,
    PlatformSelection, SelectionInput, StagePayload,
};
