use crate::domain::forecast::{Forecast, ForecastScenario, ScenarioKind};
use crate::domain::quote::PriceQuote;
use crate::domain::recommendation::{Action, Recommendation, RiskLevel};
use anyhow::ensure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPriceQuote {
    pub price: f64,
    pub currency: String,
    pub exchange: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmForecast {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    pub confidence_score: f64,
    pub scenarios: Vec<LlmScenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmScenario {
    #[serde(rename = "type")]
    pub kind: ScenarioKind,
    pub price_target: f64,
    pub probability: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRecommendation {
    pub symbol: String,
    pub name: String,
    pub price: String,
    pub currency: String,
    pub action: Action,
    pub reasoning: String,
    pub risk_level: RiskLevel,
    pub potential_upside: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl LlmPriceQuote {
    pub fn validate_and_into_quote(
        self,
        symbol: &str,
        fetched_at: DateTime<Utc>,
    ) -> anyhow::Result<PriceQuote> {
        ensure!(
            self.price.is_finite() && self.price > 0.0,
            "price must be positive (got {})",
            self.price
        );

        let currency = self.currency.trim().to_ascii_uppercase();
        ensure!(
            currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()),
            "currency must be a 3-letter code (got {:?})",
            self.currency
        );

        let exchange = self.exchange.trim().to_string();
        ensure!(!exchange.is_empty(), "exchange must be non-empty");

        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price: self.price,
            currency,
            exchange,
            fetched_at,
        })
    }
}

impl LlmForecast {
    /// Checks shape and ranges. Probabilities are not required to sum to 100.
    pub fn validate_and_into_forecast(self, expected_symbol: &str) -> anyhow::Result<Forecast> {
        ensure!(
            self.scenarios.len() == 3,
            "forecast must contain exactly 3 scenarios (got {})",
            self.scenarios.len()
        );
        ensure!(
            (0.0..=100.0).contains(&self.confidence_score),
            "confidenceScore must be between 0 and 100 (got {})",
            self.confidence_score
        );

        let mut seen = BTreeSet::<ScenarioKind>::new();
        let mut scenarios = Vec::with_capacity(3);
        for s in self.scenarios {
            ensure!(seen.insert(s.kind), "duplicate scenario type: {:?}", s.kind);
            ensure!(
                s.price_target.is_finite() && s.price_target > 0.0,
                "priceTarget must be positive (got {})",
                s.price_target
            );
            ensure!(
                (0.0..=100.0).contains(&s.probability),
                "probability must be between 0 and 100 (got {})",
                s.probability
            );
            scenarios.push(ForecastScenario {
                kind: s.kind,
                price_target: s.price_target,
                probability: s.probability,
                rationale: s.reasoning.trim().to_string(),
            });
        }

        if let Some(symbol) = self.symbol.as_deref().map(str::trim) {
            if !symbol.is_empty() && !symbol.eq_ignore_ascii_case(expected_symbol) {
                tracing::debug!(
                    expected = expected_symbol,
                    got = symbol,
                    "forecast symbol differs from request; keeping requested symbol"
                );
            }
        }

        Ok(Forecast {
            symbol: expected_symbol.to_string(),
            timeframe: self
                .timeframe
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "12 months".to_string()),
            current_price: self.current_price.filter(|p| p.is_finite() && *p > 0.0),
            scenarios,
            confidence_score: self.confidence_score,
        })
    }
}

impl LlmRecommendation {
    pub fn validate_and_into_recommendation(self) -> anyhow::Result<Recommendation> {
        let symbol = self.symbol.trim().to_ascii_uppercase();
        ensure!(!symbol.is_empty(), "symbol must be non-empty");

        let name = self.name.trim().to_string();
        ensure!(!name.is_empty(), "name must be non-empty");

        let sources = self
            .sources
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Recommendation {
            symbol,
            name,
            price: self.price.trim().to_string(),
            currency: self.currency.trim().to_ascii_uppercase(),
            action: self.action,
            risk_level: self.risk_level,
            rationale: self.reasoning.trim().to_string(),
            upside: self.potential_upside.trim().to_string(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap()
    }

    fn quote(price: f64, currency: &str) -> LlmPriceQuote {
        LlmPriceQuote {
            price,
            currency: currency.to_string(),
            exchange: "NASDAQ".to_string(),
        }
    }

    #[test]
    fn quote_normalizes_currency() {
        let q = quote(123.45, " usd ").validate_and_into_quote("NVDA", now()).unwrap();
        assert_eq!(q.currency, "USD");
        assert_eq!(q.symbol, "NVDA");
        assert_eq!(q.fetched_at, now());
    }

    #[test]
    fn quote_rejects_non_positive_price() {
        assert!(quote(0.0, "USD").validate_and_into_quote("X", now()).is_err());
        assert!(quote(-3.0, "USD").validate_and_into_quote("X", now()).is_err());
        assert!(quote(f64::NAN, "USD").validate_and_into_quote("X", now()).is_err());
    }

    #[test]
    fn quote_rejects_bad_currency() {
        assert!(quote(10.0, "US").validate_and_into_quote("X", now()).is_err());
        assert!(quote(10.0, "US$").validate_and_into_quote("X", now()).is_err());
        assert!(quote(10.0, "DOLLAR").validate_and_into_quote("X", now()).is_err());
    }

    fn forecast_json(kinds: [&str; 3], probabilities: [f64; 3]) -> serde_json::Value {
        let scenarios: Vec<_> = kinds
            .iter()
            .zip(probabilities)
            .enumerate()
            .map(|(i, (kind, p))| {
                json!({
                    "type": kind,
                    "priceTarget": 100.0 + (i as f64) * 20.0,
                    "probability": p,
                    "reasoning": format!(" case {i} "),
                })
            })
            .collect();
        json!({
            "symbol": "MSFT",
            "timeframe": "12 months",
            "currentPrice": 410.5,
            "confidenceScore": 72,
            "scenarios": scenarios,
        })
    }

    #[test]
    fn forecast_accepts_one_of_each_kind_in_any_order() {
        let v = forecast_json(["bullish", "bearish", "base"], [30.0, 20.0, 50.0]);
        let parsed: LlmForecast = serde_json::from_value(v).unwrap();
        let f = parsed.validate_and_into_forecast("MSFT").unwrap();
        let kinds: BTreeSet<_> = f.scenarios.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            BTreeSet::from([ScenarioKind::Bearish, ScenarioKind::Base, ScenarioKind::Bullish])
        );
        assert_eq!(f.scenario(ScenarioKind::Bullish).unwrap().rationale, "case 0");
        assert_eq!(f.current_price, Some(410.5));
    }

    #[test]
    fn forecast_does_not_require_probabilities_to_sum_to_100() {
        let v = forecast_json(["bearish", "base", "bullish"], [10.0, 10.0, 10.0]);
        let parsed: LlmForecast = serde_json::from_value(v).unwrap();
        let f = parsed.validate_and_into_forecast("MSFT").unwrap();
        assert_eq!(f.probability_total(), 30.0);
    }

    #[test]
    fn forecast_rejects_duplicate_kind() {
        let v = forecast_json(["bearish", "bearish", "bullish"], [30.0, 40.0, 30.0]);
        let parsed: LlmForecast = serde_json::from_value(v).unwrap();
        assert!(parsed.validate_and_into_forecast("MSFT").is_err());
    }

    #[test]
    fn forecast_rejects_probability_out_of_range() {
        let v = forecast_json(["bearish", "base", "bullish"], [30.0, 140.0, 30.0]);
        let parsed: LlmForecast = serde_json::from_value(v).unwrap();
        assert!(parsed.validate_and_into_forecast("MSFT").is_err());
    }

    #[test]
    fn forecast_rejects_wrong_scenario_count() {
        let v = json!({
            "confidenceScore": 50,
            "scenarios": [
                {"type": "base", "priceTarget": 10.0, "probability": 100, "reasoning": "only"}
            ],
        });
        let parsed: LlmForecast = serde_json::from_value(v).unwrap();
        assert!(parsed.validate_and_into_forecast("MSFT").is_err());
    }

    #[test]
    fn recommendation_trims_and_uppercases() {
        let v = json!({
            "symbol": " amd ",
            "name": "Advanced Micro Devices",
            "price": "162.10",
            "currency": "usd",
            "action": "Strong Buy",
            "reasoning": " AI accelerator ramp ",
            "riskLevel": "High",
            "potentialUpside": "+18%",
            "sources": ["Reuters", " "],
        });
        let parsed: LlmRecommendation = serde_json::from_value(v).unwrap();
        let r = parsed.validate_and_into_recommendation().unwrap();
        assert_eq!(r.symbol, "AMD");
        assert_eq!(r.currency, "USD");
        assert_eq!(r.action, Action::StrongBuy);
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.rationale, "AI accelerator ramp");
        assert_eq!(r.sources, vec!["Reuters".to_string()]);
    }
}
