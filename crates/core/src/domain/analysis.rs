use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ANALYSIS_FAILURE_TEXT: &str =
    "Analysis could not be completed right now. Please try again in a moment.";

const BULLISH_KEYWORDS: [&str; 3] = ["buy", "invest", "bullish"];
const BEARISH_KEYWORDS: [&str; 2] = ["sell", "bearish"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Quick,
    Deep,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Quick => "quick",
            AnalysisMode::Deep => "deep",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(AnalysisMode::Quick),
            "deep" => Ok(AnalysisMode::Deep),
            other => anyhow::bail!("unknown analysis mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    /// Keyword rule over the finished text. Bullish words are checked first.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if BULLISH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Sentiment::Bullish
        } else if BEARISH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }
}

/// A web source the generation service reports having used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub mode: AnalysisMode,
    pub text: String,
    pub sentiment: Sentiment,
    pub sources: Vec<Source>,
}

impl AnalysisResult {
    pub fn failed(symbol: impl Into<String>, mode: AnalysisMode) -> Self {
        Self {
            symbol: symbol.into(),
            mode,
            text: ANALYSIS_FAILURE_TEXT.to_string(),
            sentiment: Sentiment::Neutral,
            sources: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.text == ANALYSIS_FAILURE_TEXT
    }
}
