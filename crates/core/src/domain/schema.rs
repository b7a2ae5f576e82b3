//! Response schemas handed to the generation service, in its `responseSchema` dialect.
//! Field names match the contract types in [`crate::domain::contract`].

use serde_json::{json, Value};

pub fn price_quote() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "price": {"type": "NUMBER", "description": "Latest traded price"},
            "currency": {"type": "STRING", "description": "ISO 4217 code, e.g. USD"},
            "exchange": {"type": "STRING", "description": "Primary listing exchange"}
        },
        "required": ["price", "currency", "exchange"]
    })
}

pub fn forecast() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "symbol": {"type": "STRING"},
            "timeframe": {"type": "STRING"},
            "currentPrice": {"type": "NUMBER"},
            "confidenceScore": {"type": "NUMBER", "description": "0 to 100"},
            "scenarios": {
                "type": "ARRAY",
                "minItems": 3,
                "maxItems": 3,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "type": {"type": "STRING", "enum": ["bearish", "base", "bullish"]},
                        "priceTarget": {"type": "NUMBER"},
                        "probability": {"type": "NUMBER", "description": "0 to 100"},
                        "reasoning": {"type": "STRING"}
                    },
                    "required": ["type", "priceTarget", "probability", "reasoning"]
                }
            }
        },
        "required": ["symbol", "timeframe", "currentPrice", "confidenceScore", "scenarios"]
    })
}

pub fn recommendations() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "symbol": {"type": "STRING"},
                "name": {"type": "STRING"},
                "price": {"type": "STRING"},
                "currency": {"type": "STRING"},
                "action": {"type": "STRING", "enum": ["Buy", "Strong Buy", "Watch"]},
                "reasoning": {"type": "STRING"},
                "riskLevel": {"type": "STRING", "enum": ["High", "Medium", "Low"]},
                "potentialUpside": {"type": "STRING"},
                "sources": {"type": "ARRAY", "items": {"type": "STRING"}}
            },
            "required": [
                "symbol", "name", "price", "currency", "action",
                "reasoning", "riskLevel", "potentialUpside", "sources"
            ]
        }
    })
}
