use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    #[serde(alias = "Bearish", alias = "BEARISH", alias = "bear")]
    Bearish,
    #[serde(alias = "Base", alias = "BASE")]
    Base,
    #[serde(alias = "Bullish", alias = "BULLISH", alias = "bull")]
    Bullish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastScenario {
    pub kind: ScenarioKind,
    pub price_target: f64,
    /// Percent, 0..=100.
    pub probability: f64,
    pub rationale: String,
}

/// Three-scenario outlook. Holds exactly one scenario per [`ScenarioKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub symbol: String,
    pub timeframe: String,
    pub current_price: Option<f64>,
    pub scenarios: Vec<ForecastScenario>,
    /// Percent, 0..=100.
    pub confidence_score: f64,
}

impl Forecast {
    pub fn scenario(&self, kind: ScenarioKind) -> Option<&ForecastScenario> {
        self.scenarios.iter().find(|s| s.kind == kind)
    }

    pub fn probability_total(&self) -> f64 {
        self.scenarios.iter().map(|s| s.probability).sum()
    }
}
