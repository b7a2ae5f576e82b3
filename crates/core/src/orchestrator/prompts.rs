use crate::domain::analysis::AnalysisMode;
use crate::domain::recommendation::Strategy;

const DEFAULT_QUICK_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_DEEP_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_DEEP_THINKING_BUDGET: u32 = 8192;
const DEFAULT_PICKS_COUNT: usize = 6;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Model for quick analysis and every structured lookup.
    pub quick_model: String,
    pub deep_model: String,
    pub deep_thinking_budget: u32,
    /// How many picks to ask for per screen.
    pub picks_count: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            quick_model: DEFAULT_QUICK_MODEL.to_string(),
            deep_model: DEFAULT_DEEP_MODEL.to_string(),
            deep_thinking_budget: DEFAULT_DEEP_THINKING_BUDGET,
            picks_count: DEFAULT_PICKS_COUNT,
        }
    }
}

impl OrchestratorOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("TICKERLENS_QUICK_MODEL") {
            if !s.trim().is_empty() {
                out.quick_model = s.trim().to_string();
            }
        }

        if let Ok(s) = std::env::var("TICKERLENS_DEEP_MODEL") {
            if !s.trim().is_empty() {
                out.deep_model = s.trim().to_string();
            }
        }

        if let Ok(s) = std::env::var("TICKERLENS_DEEP_THINKING_BUDGET") {
            if let Ok(n) = s.parse::<u32>() {
                out.deep_thinking_budget = n;
            }
        }

        if let Ok(s) = std::env::var("TICKERLENS_PICKS_COUNT") {
            if let Ok(n) = s.parse::<usize>() {
                out.picks_count = n.clamp(1, 20);
            }
        }

        out
    }

    pub fn profile(&self, mode: AnalysisMode) -> ModeProfile {
        match mode {
            AnalysisMode::Quick => ModeProfile {
                model: self.quick_model.clone(),
                system_instruction: QUICK_PERSONA,
                temperature: 0.7,
                thinking_budget: None,
                web_search: true,
            },
            AnalysisMode::Deep => ModeProfile {
                model: self.deep_model.clone(),
                system_instruction: DEEP_PERSONA,
                temperature: 0.4,
                thinking_budget: Some(self.deep_thinking_budget),
                web_search: true,
            },
        }
    }
}

/// Fixed per-mode request settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeProfile {
    pub model: String,
    pub system_instruction: &'static str,
    pub temperature: f32,
    pub thinking_budget: Option<u32>,
    pub web_search: bool,
}

const QUICK_PERSONA: &str = "You are a sharp equity analyst writing for busy retail investors. \
Be concise, concrete and current. Use markdown headings and short bullet points. \
Always ground price and news statements in fresh web results.";

const DEEP_PERSONA: &str = "You are a senior buy-side strategist preparing an investment memo. \
Reason carefully about fundamentals, valuation, competitive position, catalysts and risks before \
concluding. Use markdown with clear sections and cite what you relied on.";

pub fn analysis_prompt(symbol: &str, mode: AnalysisMode) -> String {
    match mode {
        AnalysisMode::Quick => format!(
            "Give a quick market snapshot of {symbol}.\n\n\
Cover, in under 250 words:\n\
- What moved the stock recently (news, earnings, sector moves)\n\
- Key levels and momentum\n\
- A one-line verdict: buy, hold or sell, and why"
        ),
        AnalysisMode::Deep => format!(
            "Write a deep-dive analysis of {symbol}.\n\n\
Sections:\n\
1. Business overview and competitive moat\n\
2. Recent financial performance and guidance\n\
3. Valuation versus peers and history\n\
4. Catalysts over the next 12 months\n\
5. Key risks\n\
6. Verdict: a clear buy, hold or sell recommendation with reasoning"
        ),
    }
}

pub fn quote_prompt(symbol: &str) -> String {
    format!(
        "Search the web for the latest trading price of the stock {symbol}.\n\
Return ONLY a JSON object with keys: price (number), currency (ISO 4217 code), \
exchange (primary listing exchange name). No markdown, no prose."
    )
}

pub fn forecast_context_prompt(symbol: &str) -> String {
    format!(
        "Search the web and summarize the current price context for {symbol}: latest price, \
52-week range, recent trend, analyst price targets, and upcoming catalysts. Plain text, \
under 200 words."
    )
}

pub fn forecast_prompt(symbol: &str, context: &str) -> String {
    format!(
        "Using the market context below, build a 12-month price forecast for {symbol}.\n\n\
Return exactly three scenarios with type \"bearish\", \"base\" and \"bullish\". Each scenario \
needs a priceTarget, a probability between 0 and 100, and short reasoning. The three \
probabilities should sum to 100. Also return currentPrice, timeframe and a confidenceScore \
between 0 and 100.\n\n\
Market context:\n{context}"
    )
}

pub fn picks_prompt(market: &str, timeframe: &str, strategy: Strategy, count: usize) -> String {
    format!(
        "Act as a stock screener for the {market} market.\n\
Strategy: {label}. Holding timeframe: {timeframe}.\n\
Focus on {focus}.\n\n\
Search the web for current data and return {count} stock ideas as a JSON array. For each give \
symbol, name, current price and currency, action (one of \"Buy\", \"Strong Buy\", \"Watch\"), \
reasoning, riskLevel (\"High\", \"Medium\" or \"Low\"), potentialUpside (e.g. \"+15%\") and the \
sources you used.",
        label = strategy.label(),
        focus = strategy.focus(),
    )
}
