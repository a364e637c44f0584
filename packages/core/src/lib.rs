// ABOUTME: Core types, traits, and utilities for PMStation
// ABOUTME: Foundational package providing the workflow vocabulary shared by every other package

pub mod constants;
pub mod types;
pub mod utils;

// Re-export main types
pub use types::{
    ParseEnumError, Project, ProjectStatus, ProjectWithStages, Stage, StageStatus, StageType,
    STAGE_ORDER,
};

// Re-export constants
pub use constants::{default_database_path, pmstation_dir};

// Re-export utilities
pub use utils::{generate_id, generate_project_id};
