use crate::llm::Provider;
use std::fmt;

/// Where a generation call went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Http,
    Blocked,
    Decode,
    EmptyText,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Http => "http",
            FailureStage::Blocked => "blocked",
            FailureStage::Decode => "decode",
            FailureStage::EmptyText => "empty_text",
        }
    }
}

/// Provider failure with enough context to debug from a log line.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: FailureStage,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl LlmDiagnosticsError {
    pub fn new(provider: Provider, stage: FailureStage, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation failed (provider={:?}, stage={}): {}",
            self.provider,
            self.stage.as_str(),
            self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_stage() {
        let err = LlmDiagnosticsError::new(Provider::Gemini, FailureStage::Blocked, "SAFETY")
            .with_raw_output("{}");
        assert_eq!(
            err.to_string(),
            "generation failed (provider=Gemini, stage=blocked): SAFETY"
        );
        assert_eq!(err.raw_output.as_deref(), Some("{}"));
    }

    #[test]
    fn survives_anyhow_downcast() {
        let err: anyhow::Error =
            LlmDiagnosticsError::new(Provider::Gemini, FailureStage::Http, "status=503").into();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, FailureStage::Http);
    }
}
