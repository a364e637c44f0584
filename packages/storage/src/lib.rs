// ABOUTME: Data layer and persistence for PMStation
// ABOUTME: SQLite pool setup, migrations, project and versioned stage storage

use thiserror::Error;

pub mod db;
pub mod projects;
pub mod stages;

pub use db::{init_memory_pool, init_pool};
pub use projects::{NewProject, ProjectStorage, ProjectUpdate};
pub use stages::{NewStage, StageStorage};

pub use sqlx::SqlitePool;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
