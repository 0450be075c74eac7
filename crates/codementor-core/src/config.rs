use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a Coding Instructor AI that specializes in helping with programming and Data Structures & Algorithms questions. Follow these rules:
1. Only answer coding/programming/DSA related questions
2. If asked non-coding questions, reply: \"I specialize in programming questions. Ask me about algorithms, data structures, or coding problems.\"
3. Provide clear, concise explanations with examples
4. Include visual analogies for DSA concepts when helpful
5. Format code with proper syntax highlighting
6. For algorithms, explain time/space complexity
7. Use bullet points for step-by-step explanations
8. Provide real-world analogies for complex concepts";

pub const WELCOME_MESSAGE: &str = "Here are some DSA topics you can ask about:

- `Binary search implementation`
- `Time complexity of merge sort`
- `How hash tables work`
- `DFS vs BFS differences`
- `Dynamic programming examples`";

/// Injectable settings for the request lifecycle and the client around it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub timeout_ms: u64,
    pub show_welcome: bool,
    pub transcript_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            temperature: 0.5,
            top_k: 40,
            top_p: 0.95,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            show_welcome: true,
            transcript_path: None,
        }
    }
}

/// Per-call request parameters, built fresh for every send
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub prompt: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub timeout_ms: u64,
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {:?}: {}", path, e))?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Environment variable first, then the stored key
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }

    /// Reject settings the endpoint would refuse anyway
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("temperature must be within 0.0..=2.0, got {}", self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(anyhow!("top_p must be within 0.0..=1.0, got {}", self.top_p));
        }
        if self.top_k == 0 {
            return Err(anyhow!("top_k must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `{endpoint}/models/{model}:generateContent`
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    pub fn request_for(&self, prompt: &str) -> RequestConfig {
        RequestConfig {
            prompt: prompt.to_string(),
            system_instruction: self.system_instruction.clone(),
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("codementor"))
    }
}
