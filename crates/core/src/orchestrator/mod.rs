pub mod prompts;

use crate::config::Settings;
use crate::domain::analysis::{AnalysisMode, AnalysisResult, Sentiment, Source};
use crate::domain::contract::{LlmForecast, LlmPriceQuote, LlmRecommendation};
use crate::domain::forecast::Forecast;
use crate::domain::quote::PriceQuote;
use crate::domain::recommendation::{Recommendation, Strategy};
use crate::domain::schema;
use crate::llm::error::{FailureStage, LlmDiagnosticsError};
use crate::llm::gemini::GeminiClient;
use crate::llm::json;
use crate::llm::{
    ChunkStream, GenerateRequest, GenerateResponse, GenerationClient, GenerationConfig,
    ResponseFormat,
};
use futures::stream::{self, BoxStream, StreamExt};
use prompts::OrchestratorOptions;
use std::fmt;
use std::sync::Arc;

const DEFAULT_MARKET: &str = "US";

/// One step of a streamed analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    /// Everything received so far.
    Partial(String),
    Done(AnalysisResult),
}

/// Turns dashboard requests into generation calls and typed results.
///
/// Every operation is attempt-once and fail-soft: errors are logged and mapped to an empty
/// sentinel (`None`, an empty list, or a failed [`AnalysisResult`]), never returned.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn GenerationClient>,
    options: Arc<OrchestratorOptions>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn GenerationClient>, options: OrchestratorOptions) -> Self {
        Self {
            client,
            options: Arc::new(options),
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = GeminiClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(client), OrchestratorOptions::from_env()))
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub async fn fetch_quote(&self, symbol: &str) -> Option<PriceQuote> {
        let Some(symbol) = normalize_symbol(symbol) else {
            tracing::warn!("price lookup skipped: empty symbol");
            return None;
        };

        match self.try_fetch_quote(&symbol).await {
            Ok(quote) => {
                tracing::debug!(%symbol, price = quote.price, currency = %quote.currency, "price lookup ok");
                Some(quote)
            }
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "price lookup failed; no price available");
                None
            }
        }
    }

    async fn try_fetch_quote(&self, symbol: &str) -> anyhow::Result<PriceQuote> {
        let req = GenerateRequest {
            model: self.options.quick_model.clone(),
            prompt: prompts::quote_prompt(symbol),
            system_instruction: None,
            config: GenerationConfig {
                web_search: true,
                temperature: Some(0.1),
                response_format: Some(ResponseFormat::json(schema::price_quote())),
                thinking_budget: None,
            },
        };

        let text = self.generate_text(req).await?;
        let parsed = json::parse_object::<LlmPriceQuote>(&text)?;
        parsed.validate_and_into_quote(symbol, chrono::Utc::now())
    }

    /// Streams an analysis as it is generated.
    ///
    /// Yields a `Partial` for every chunk that carries text, then exactly one `Done`. Dropping
    /// the stream cancels the upstream request.
    pub fn analysis_events(
        &self,
        symbol: &str,
        mode: AnalysisMode,
    ) -> BoxStream<'static, AnalysisEvent> {
        let Some(symbol) = normalize_symbol(symbol) else {
            tracing::warn!(%mode, "analysis skipped: empty symbol");
            return stream::iter([AnalysisEvent::Done(AnalysisResult::failed("", mode))]).boxed();
        };

        let profile = self.options.profile(mode);
        let req = GenerateRequest {
            model: profile.model,
            prompt: prompts::analysis_prompt(&symbol, mode),
            system_instruction: Some(profile.system_instruction.to_string()),
            config: GenerationConfig {
                web_search: profile.web_search,
                temperature: Some(profile.temperature),
                response_format: None,
                thinking_budget: profile.thinking_budget,
            },
        };

        let state = AnalysisState::Pending {
            client: Arc::clone(&self.client),
            req,
            buffer: AnalysisBuffer::new(symbol, mode),
        };

        stream::unfold(state, |state| async move {
            let (mut chunks, mut buffer) = match state {
                AnalysisState::Pending {
                    client,
                    req,
                    buffer,
                } => match client.generate_stream(req).await {
                    Ok(chunks) => (chunks, buffer),
                    Err(err) => {
                        tracing::warn!(symbol = %buffer.symbol, mode = %buffer.mode, error = %err, "analysis stream failed to open");
                        let failed = AnalysisResult::failed(buffer.symbol, buffer.mode);
                        return Some((AnalysisEvent::Done(failed), AnalysisState::Finished));
                    }
                },
                AnalysisState::Streaming { chunks, buffer } => (chunks, buffer),
                AnalysisState::Finished => return None,
            };

            loop {
                match chunks.next().await {
                    Some(Ok(chunk)) => {
                        if buffer.push(chunk) {
                            let partial = AnalysisEvent::Partial(buffer.text.clone());
                            return Some((partial, AnalysisState::Streaming { chunks, buffer }));
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(symbol = %buffer.symbol, mode = %buffer.mode, error = %err, "analysis stream interrupted");
                        let failed = AnalysisResult::failed(buffer.symbol, buffer.mode);
                        return Some((AnalysisEvent::Done(failed), AnalysisState::Finished));
                    }
                    None => {
                        let result = buffer.finish();
                        return Some((AnalysisEvent::Done(result), AnalysisState::Finished));
                    }
                }
            }
        })
        .boxed()
    }

    /// Runs an analysis to completion, calling `on_partial` with the text so far after each chunk.
    pub async fn run_analysis<F>(
        &self,
        symbol: &str,
        mode: AnalysisMode,
        mut on_partial: F,
    ) -> AnalysisResult
    where
        F: FnMut(&str),
    {
        let mut events = self.analysis_events(symbol, mode);
        while let Some(event) = events.next().await {
            match event {
                AnalysisEvent::Partial(text) => on_partial(&text),
                AnalysisEvent::Done(result) => return result,
            }
        }
        AnalysisResult::failed(symbol.trim().to_ascii_uppercase(), mode)
    }

    /// Quote lookup and streamed analysis, started together and joined.
    pub async fn analyze_with_quote<F>(
        &self,
        symbol: &str,
        mode: AnalysisMode,
        on_partial: F,
    ) -> (Option<PriceQuote>, AnalysisResult)
    where
        F: FnMut(&str),
    {
        tokio::join!(
            self.fetch_quote(symbol),
            self.run_analysis(symbol, mode, on_partial)
        )
    }

    pub async fn compute_forecast(&self, symbol: &str) -> Option<Forecast> {
        let Some(symbol) = normalize_symbol(symbol) else {
            tracing::warn!("forecast skipped: empty symbol");
            return None;
        };

        match self.try_compute_forecast(&symbol).await {
            Ok(forecast) => Some(forecast),
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "forecast failed");
                None
            }
        }
    }

    async fn try_compute_forecast(&self, symbol: &str) -> anyhow::Result<Forecast> {
        let context_req = GenerateRequest {
            model: self.options.quick_model.clone(),
            prompt: prompts::forecast_context_prompt(symbol),
            system_instruction: None,
            config: GenerationConfig {
                web_search: true,
                temperature: Some(0.2),
                response_format: None,
                thinking_budget: None,
            },
        };
        let context = self.generate_text(context_req).await?;

        let forecast_req = GenerateRequest {
            model: self.options.quick_model.clone(),
            prompt: prompts::forecast_prompt(symbol, context.trim()),
            system_instruction: None,
            config: GenerationConfig {
                web_search: false,
                temperature: Some(0.3),
                response_format: Some(ResponseFormat::json(schema::forecast())),
                thinking_budget: None,
            },
        };
        let text = self.generate_text(forecast_req).await?;
        let forecast = json::parse_object::<LlmForecast>(&text)?.validate_and_into_forecast(symbol)?;

        let total = forecast.probability_total();
        if (total - 100.0).abs() > 1.0 {
            tracing::debug!(%symbol, total, "forecast probabilities do not sum to 100");
        }
        Ok(forecast)
    }

    pub async fn screen_picks(
        &self,
        market: &str,
        timeframe: &str,
    ) -> (Vec<Recommendation>, Strategy) {
        let strategy = Strategy::from_timeframe(timeframe);
        let market = match market.trim() {
            "" => DEFAULT_MARKET,
            m => m,
        };

        match self.try_screen_picks(market, timeframe.trim(), strategy).await {
            Ok(picks) => {
                tracing::debug!(%market, strategy = strategy.label(), count = picks.len(), "screen ok");
                (picks, strategy)
            }
            Err(err) => {
                tracing::warn!(%market, %timeframe, error = %err, "stock screen failed");
                (Vec::new(), strategy)
            }
        }
    }

    async fn try_screen_picks(
        &self,
        market: &str,
        timeframe: &str,
        strategy: Strategy,
    ) -> anyhow::Result<Vec<Recommendation>> {
        let req = GenerateRequest {
            model: self.options.quick_model.clone(),
            prompt: prompts::picks_prompt(market, timeframe, strategy, self.options.picks_count),
            system_instruction: None,
            config: GenerationConfig {
                web_search: true,
                temperature: Some(0.7),
                response_format: Some(ResponseFormat::json(schema::recommendations())),
                thinking_budget: None,
            },
        };

        let text = self.generate_text(req).await?;
        let items = json::parse_array::<LlmRecommendation>(&text)?;

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item.validate_and_into_recommendation() {
                Ok(rec) => out.push(rec),
                Err(err) => tracing::warn!(%market, error = %err, "dropping invalid recommendation"),
            }
        }
        Ok(out)
    }

    async fn generate_text(&self, req: GenerateRequest) -> anyhow::Result<String> {
        let res = self.client.generate(req).await?;
        if res.text.trim().is_empty() {
            return Err(LlmDiagnosticsError::new(
                self.client.provider(),
                FailureStage::EmptyText,
                "response carried no text",
            )
            .into());
        }
        Ok(res.text)
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.client.provider())
            .field("options", &self.options)
            .finish()
    }
}

fn normalize_symbol(symbol: &str) -> Option<String> {
    let s = symbol.trim().to_ascii_uppercase();
    (!s.is_empty()).then_some(s)
}

enum AnalysisState {
    Pending {
        client: Arc<dyn GenerationClient>,
        req: GenerateRequest,
        buffer: AnalysisBuffer,
    },
    Streaming {
        chunks: ChunkStream,
        buffer: AnalysisBuffer,
    },
    Finished,
}

struct AnalysisBuffer {
    symbol: String,
    mode: AnalysisMode,
    text: String,
    sources: Vec<Source>,
}

impl AnalysisBuffer {
    fn new(symbol: String, mode: AnalysisMode) -> Self {
        Self {
            symbol,
            mode,
            text: String::new(),
            sources: Vec::new(),
        }
    }

    /// Returns true when the chunk added text.
    fn push(&mut self, chunk: GenerateResponse) -> bool {
        if !chunk.citations.is_empty() {
            // Latest chunk carrying citations wins.
            let mut sources: Vec<Source> = Vec::with_capacity(chunk.citations.len());
            for c in chunk.citations {
                if !sources.iter().any(|s| s.uri == c.uri) {
                    sources.push(c);
                }
            }
            self.sources = sources;
        }

        if chunk.text.is_empty() {
            return false;
        }
        self.text.push_str(&chunk.text);
        true
    }

    fn finish(self) -> AnalysisResult {
        if self.text.trim().is_empty() {
            tracing::warn!(symbol = %self.symbol, mode = %self.mode, "analysis stream ended without text");
            return AnalysisResult::failed(self.symbol, self.mode);
        }

        AnalysisResult {
            sentiment: Sentiment::classify(&self.text),
            symbol: self.symbol,
            mode: self.mode,
            text: self.text,
            sources: self.sources,
        }
    }
}
