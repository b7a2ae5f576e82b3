use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest known price for a symbol. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    /// ISO 4217 code, always three upper-case ASCII letters.
    pub currency: String,
    pub exchange: String,
    pub fetched_at: DateTime<Utc>,
}
