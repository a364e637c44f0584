// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across PMStation

// Server Configuration
pub const PORT: &str = "PORT";
pub const CORS_ORIGIN: &str = "CORS_ORIGIN";
pub const PMSTATION_DATABASE_PATH: &str = "PMSTATION_DATABASE_PATH";
pub const PMSTATION_PROMPTS_DIR: &str = "PMSTATION_PROMPTS_DIR";

// Gemini Gateway
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const GEMINI_API_BASE_URL: &str = "GEMINI_API_BASE_URL";
pub const PMSTATION_PRO_MODEL: &str = "PMSTATION_PRO_MODEL";
pub const PMSTATION_FLASH_MODEL: &str = "PMSTATION_FLASH_MODEL";
pub const PMSTATION_IMAGE_MODEL: &str = "PMSTATION_IMAGE_MODEL";

// Gateway Retry Policy
pub const PMSTATION_LLM_MAX_ATTEMPTS: &str = "PMSTATION_LLM_MAX_ATTEMPTS";
pub const PMSTATION_LLM_RETRY_BASE_MS: &str = "PMSTATION_LLM_RETRY_BASE_MS";
pub const PMSTATION_LLM_RETRY_MAX_MS: &str = "PMSTATION_LLM_RETRY_MAX_MS";

// SSE Stream Configuration
pub const PMSTATION_SSE_MAX_CONNECTIONS_PER_IP: &str = "PMSTATION_SSE_MAX_CONNECTIONS_PER_IP";

// Defaults
pub const DEFAULT_PORT: u16 = 4100;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_PRO_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_FLASH_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_LLM_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LLM_RETRY_BASE_MS: u64 = 2000;
pub const DEFAULT_LLM_RETRY_MAX_MS: u64 = 10000;
pub const DEFAULT_SSE_MAX_CONNECTIONS_PER_IP: usize = 3;
