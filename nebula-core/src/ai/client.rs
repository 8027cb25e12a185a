//! AI Client Module
//!
//! Handles communication with Claude via the CLI.

use crate::ai::prompts::{self, DraftRequest};
use crate::ai::responses::{self, RequirementDraft, SubsystemSuggestion};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Env var that turns AI drafting off regardless of what is installed
pub const AI_DISABLED_ENV: &str = "NEBULA_AI_DISABLED";

/// Errors that can occur during AI operations
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Claude CLI not found at {0}")]
    CliNotFound(PathBuf),

    #[error("Claude CLI execution failed: {0}")]
    CliExecFailed(String),

    #[error("Invalid response from AI: {0}")]
    InvalidResponse(String),

    #[error("AI integration not available")]
    NotAvailable,
}

/// Something that turns a prompt into candidate requirements.
///
/// Implementations never fail: any collaborator error yields an empty list.
pub trait DraftGenerator {
    fn generate(&self, request: &DraftRequest) -> Vec<RequirementDraft>;

    fn suggest_subsystems(&self, system_name: &str, description: &str) -> Vec<SubsystemSuggestion>;
}

/// AI operation mode
#[derive(Debug, Clone, Default)]
pub enum AiMode {
    /// Use Claude CLI with --print flag
    ClaudeCli { path: PathBuf },
    /// AI features disabled
    #[default]
    Disabled,
}

/// AI Client for interacting with Claude
#[derive(Debug, Clone)]
pub struct AiClient {
    mode: AiMode,
}

impl Default for AiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AiClient {
    /// Create a new AI client with auto-detected mode
    pub fn new() -> Self {
        let mode = Self::detect_mode();
        Self { mode }
    }

    /// Create a client with a specific mode
    pub fn with_mode(mode: AiMode) -> Self {
        Self { mode }
    }

    fn detect_mode() -> AiMode {
        let disabled = std::env::var(AI_DISABLED_ENV).ok();
        Self::mode_for(disabled.as_deref(), Self::find_claude_cli)
    }

    /// `disabled` is the value of `NEBULA_AI_DISABLED`; anything but empty or "0" turns AI off
    fn mode_for(disabled: Option<&str>, find_cli: impl FnOnce() -> Option<PathBuf>) -> AiMode {
        if disabled.is_some_and(|v| !v.is_empty() && v != "0") {
            return AiMode::Disabled;
        }

        match find_cli() {
            Some(path) => AiMode::ClaudeCli { path },
            None => AiMode::Disabled,
        }
    }

    /// Find the claude CLI executable
    fn find_claude_cli() -> Option<PathBuf> {
        if let Ok(output) = Command::new("which").arg("claude").output() {
            if output.status.success() {
                let path_str = String::from_utf8_lossy(&output.stdout);
                let path = PathBuf::from(path_str.trim());
                if path.exists() {
                    return Some(path);
                }
            }
        }

        let mut candidates = vec![
            PathBuf::from("/usr/local/bin/claude"),
            PathBuf::from("/usr/bin/claude"),
        ];
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".npm-global/bin/claude"));
            candidates.push(home.join(".local/bin/claude"));
        }

        candidates.into_iter().find(|p| p.exists())
    }

    /// Check if AI features are available
    pub fn is_available(&self) -> bool {
        match &self.mode {
            AiMode::ClaudeCli { path } => path.exists(),
            AiMode::Disabled => false,
        }
    }

    pub fn mode(&self) -> &AiMode {
        &self.mode
    }

    /// Get a description of the current mode
    pub fn mode_description(&self) -> String {
        match &self.mode {
            AiMode::ClaudeCli { path } => format!("Claude CLI ({})", path.display()),
            AiMode::Disabled => "Disabled".to_string(),
        }
    }

    /// Draft requirements for a feature, surfacing errors to the caller
    pub fn try_generate(&self, request: &DraftRequest) -> Result<Vec<RequirementDraft>, AiError> {
        let prompt = prompts::build_requirements_prompt(request);
        let response = self.send_request(&prompt)?;
        responses::parse_requirement_drafts(&response)
    }

    /// Suggest subsystems for a system, surfacing errors to the caller
    pub fn try_suggest_subsystems(
        &self,
        system_name: &str,
        description: &str,
    ) -> Result<Vec<SubsystemSuggestion>, AiError> {
        let prompt = prompts::build_subsystem_prompt(system_name, description);
        let response = self.send_request(&prompt)?;
        responses::parse_subsystem_suggestions(&response)
    }

    /// Send a request to the AI
    fn send_request(&self, prompt: &str) -> Result<String, AiError> {
        match &self.mode {
            AiMode::ClaudeCli { path } => self.send_cli_request(path, prompt),
            AiMode::Disabled => Err(AiError::NotAvailable),
        }
    }

    /// Send request via Claude CLI
    fn send_cli_request(&self, cli_path: &Path, prompt: &str) -> Result<String, AiError> {
        if !cli_path.exists() {
            return Err(AiError::CliNotFound(cli_path.to_path_buf()));
        }
        debug!("sending {} byte prompt to {}", prompt.len(), cli_path.display());

        let output = Command::new(cli_path)
            .arg("--print")
            .arg("-p")
            .arg(prompt)
            .output()
            .map_err(|e| AiError::CliExecFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AiError::CliExecFailed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).to_string();

        if response.trim().is_empty() {
            return Err(AiError::InvalidResponse("Empty response from CLI".to_string()));
        }

        Ok(response)
    }
}

impl DraftGenerator for AiClient {
    fn generate(&self, request: &DraftRequest) -> Vec<RequirementDraft> {
        self.try_generate(request).unwrap_or_else(|e| {
            warn!("requirement generation failed: {}", e);
            Vec::new()
        })
    }

    fn suggest_subsystems(&self, system_name: &str, description: &str) -> Vec<SubsystemSuggestion> {
        self.try_suggest_subsystems(system_name, description)
            .unwrap_or_else(|e| {
                warn!("subsystem suggestion failed: {}", e);
                Vec::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_env_wins_over_installed_cli() {
        let cli = || Some(PathBuf::from("/usr/local/bin/claude"));

        assert!(matches!(AiClient::mode_for(Some("1"), cli), AiMode::Disabled));
        assert!(matches!(AiClient::mode_for(Some("true"), cli), AiMode::Disabled));
        assert!(matches!(
            AiClient::mode_for(Some("0"), cli),
            AiMode::ClaudeCli { .. }
        ));
        assert!(matches!(AiClient::mode_for(Some(""), cli), AiMode::ClaudeCli { .. }));
        assert!(matches!(AiClient::mode_for(None, cli), AiMode::ClaudeCli { .. }));
        assert!(matches!(AiClient::mode_for(None, || None), AiMode::Disabled));
    }

    #[test]
    fn test_detect_mode_reads_disabled_env() {
        std::env::set_var(AI_DISABLED_ENV, "1");
        let client = AiClient::new();
        std::env::remove_var(AI_DISABLED_ENV);

        assert!(matches!(client.mode(), AiMode::Disabled));
        assert!(!client.is_available());
    }

    #[test]
    fn test_disabled_mode() {
        let client = AiClient::with_mode(AiMode::Disabled);
        assert!(!client.is_available());
        assert_eq!(client.mode_description(), "Disabled");
    }

    #[test]
    fn test_disabled_generator_returns_nothing() {
        let client = AiClient::with_mode(AiMode::Disabled);
        let request = DraftRequest {
            context: "System: Shop".into(),
            documentation: String::new(),
            prompt: "Payments".into(),
        };

        assert!(matches!(client.try_generate(&request), Err(AiError::NotAvailable)));
        assert!(client.generate(&request).is_empty());
        assert!(client.suggest_subsystems("Shop", "Retail").is_empty());
    }

    #[test]
    fn test_missing_cli_path_is_reported() {
        let client = AiClient::with_mode(AiMode::ClaudeCli {
            path: PathBuf::from("/nonexistent/claude"),
        });
        assert!(!client.is_available());
        let err = client.try_suggest_subsystems("Shop", "").unwrap_err();
        assert!(matches!(err, AiError::CliNotFound(_)));
    }
}
