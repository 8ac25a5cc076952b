use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub anthropic_api_key: String,
    pub claude_model: String,

    // Document store
    pub docstore_url: String,
    pub docstore_api_key: Option<String>,

    // Analytical warehouse
    pub warehouse_database_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            docstore_url: required_env("DOCSTORE_URL"),
            docstore_api_key: env::var("DOCSTORE_API_KEY").ok(),
            warehouse_database_url: required_env("WAREHOUSE_DATABASE_URL"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
