use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    #[serde(rename = "Strong Buy", alias = "StrongBuy", alias = "STRONG BUY")]
    StrongBuy,
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub name: String,
    /// Display string as returned by the model, e.g. "182.40".
    pub price: String,
    pub currency: String,
    pub action: Action,
    pub risk_level: RiskLevel,
    pub rationale: String,
    /// Display string, e.g. "+12%".
    pub upside: String,
    pub sources: Vec<String>,
}

/// Screening strategy picked from a free-text holding timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Momentum,
    Swing,
    Trend,
    Growth,
    Value,
    Balanced,
}

/// True for a 4-6 month window ("4-6 Months", "4 to 6 months", "6 months"), matched on whole
/// words so "14-16 months" or "36 months" do not count.
fn is_growth_range(tf: &str) -> bool {
    let tf = tf.replace('–', "-").replace(" to ", "-");
    let words: Vec<&str> = tf
        .split(|c: char| c.is_whitespace() || c == '+' || c == '(' || c == ')')
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().any(|w| {
        w.strip_prefix("4-6")
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("month"))
    }) || words
            .windows(2)
            .any(|pair| pair[0] == "6" && pair[1].starts_with("month"))
}

impl Strategy {
    pub fn from_timeframe(timeframe: &str) -> Self {
        let tf = timeframe.to_lowercase();
        if tf.contains("day") || tf.contains("intraday") {
            Strategy::Momentum
        } else if tf.contains("week") {
            Strategy::Swing
        } else if tf.contains("month") {
            if is_growth_range(&tf) {
                Strategy::Growth
            } else {
                Strategy::Trend
            }
        } else if tf.contains("year") {
            Strategy::Value
        } else {
            Strategy::Balanced
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Momentum => "Momentum & Intraday Volatility",
            Strategy::Swing => "Swing Trading & Short-term Catalysts",
            Strategy::Trend => "Short-term Trend Following (1-3 Months)",
            Strategy::Growth => "Growth & Earnings Momentum (4-6 Months)",
            Strategy::Value => "Long-term Value & Compounders",
            Strategy::Balanced => "Balanced Growth & Value",
        }
    }

    /// Screening focus handed to the model alongside the label.
    pub fn focus(&self) -> &'static str {
        match self {
            Strategy::Momentum => {
                "high relative volume, intraday volatility, pre-market gaps and news catalysts"
            }
            Strategy::Swing => {
                "technical breakouts, upcoming catalysts within days, and strong short-term relative strength"
            }
            Strategy::Trend => {
                "established uptrends, moving-average support and positive earnings revisions"
            }
            Strategy::Growth => {
                "revenue and earnings acceleration, margin expansion and upcoming product cycles"
            }
            Strategy::Value => {
                "durable competitive advantages, reasonable valuations and consistent free cash flow"
            }
            Strategy::Balanced => {
                "a blend of reasonably priced quality growth and undervalued established companies"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_timeframes_to_strategies() {
        assert_eq!(Strategy::from_timeframe("Intraday"), Strategy::Momentum);
        assert_eq!(Strategy::from_timeframe("1 Day"), Strategy::Momentum);
        assert_eq!(Strategy::from_timeframe("1-2 Weeks"), Strategy::Swing);
        assert_eq!(Strategy::from_timeframe("1-3 Months"), Strategy::Trend);
        assert_eq!(Strategy::from_timeframe("1–3 months"), Strategy::Trend);
        assert_eq!(Strategy::from_timeframe("4-6 Months"), Strategy::Growth);
        assert_eq!(Strategy::from_timeframe("4–6 months"), Strategy::Growth);
        assert_eq!(Strategy::from_timeframe("1 Year+"), Strategy::Value);
    }

    #[test]
    fn growth_range_matches_whole_numbers_only() {
        assert_eq!(Strategy::from_timeframe("4 to 6 months"), Strategy::Growth);
        assert_eq!(Strategy::from_timeframe("6 Months"), Strategy::Growth);
        assert_eq!(Strategy::from_timeframe("4-6months"), Strategy::Growth);
        assert_eq!(Strategy::from_timeframe("16 months"), Strategy::Trend);
        assert_eq!(Strategy::from_timeframe("36 Months"), Strategy::Trend);
        assert_eq!(Strategy::from_timeframe("14-16 months"), Strategy::Trend);
    }

    #[test]
    fn unmatched_timeframe_falls_back_to_balanced() {
        assert_eq!(Strategy::from_timeframe(""), Strategy::Balanced);
        assert_eq!(Strategy::from_timeframe("whenever"), Strategy::Balanced);
        assert_eq!(Strategy::Balanced.label(), "Balanced Growth & Value");
    }

    #[test]
    fn action_accepts_model_spellings() {
        let a: Action = serde_json::from_str("\"Strong Buy\"").unwrap();
        assert_eq!(a, Action::StrongBuy);
        let b: Action = serde_json::from_str("\"StrongBuy\"").unwrap();
        assert_eq!(b, Action::StrongBuy);
        assert!(serde_json::from_str::<Action>("\"Sell\"").is_err());
    }
}
