use crate::config::Settings;
use crate::domain::analysis::Source;
use crate::llm::error::{FailureStage, LlmDiagnosticsError};
use crate::llm::sse::SseDecoder;
use crate::llm::{ChunkStream, GenerateRequest, GenerateResponse, GenerationClient, Provider};
use anyhow::Context;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_key, base_url, Duration::from_secs(timeout_secs))
    }

    pub fn new(api_key: String, base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/{API_VERSION}/models/{model}:{method}",
            self.base_url.trim_end_matches('/')
        )
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).context("API key is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post(
        &self,
        url: String,
        body: &GenerateContentRequest,
        query: &[(&str, &str)],
    ) -> anyhow::Result<reqwest::Response> {
        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .query(query)
            .json(body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                FailureStage::Http,
                format!("status={status}"),
            )
            .with_raw_output(text)
            .into());
        }
        Ok(res)
    }
}

#[async_trait::async_trait]
impl GenerationClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, request: GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let body = GenerateContentRequest::from_request(&request);
        let res = self
            .post(self.url(&request.model, "generateContent"), &body, &[])
            .await?;

        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        let parsed = serde_json::from_str::<GenerateContentResponse>(&text).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Gemini, FailureStage::Decode, e.to_string())
                .with_raw_output(text.clone())
        })?;

        parsed.into_response()
    }

    async fn generate_stream(&self, request: GenerateRequest) -> anyhow::Result<ChunkStream> {
        let body = GenerateContentRequest::from_request(&request);
        let res = self
            .post(
                self.url(&request.model, "streamGenerateContent"),
                &body,
                &[("alt", "sse")],
            )
            .await?;

        tracing::debug!(model = %request.model, "Gemini stream opened");
        Ok(decode_event_stream(res.bytes_stream().boxed()))
    }
}

struct EventStreamState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    exhausted: bool,
}

pub(crate) fn decode_event_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = EventStreamState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                let item = parse_stream_payload(&payload);
                return Some((item, state));
            }
            if state.exhausted {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.exhausted = true;
                    let err = anyhow::Error::new(err).context("Gemini stream interrupted");
                    return Some((Err(err), state));
                }
                None => {
                    state.exhausted = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
    .boxed()
}

fn parse_stream_payload(payload: &str) -> anyhow::Result<GenerateResponse> {
    let parsed = serde_json::from_str::<GenerateContentResponse>(payload).map_err(|e| {
        LlmDiagnosticsError::new(Provider::Gemini, FailureStage::Decode, e.to_string())
            .with_raw_output(payload)
    })?;
    parsed.into_response()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: WireGenerationConfig,
}

impl GenerateContentRequest {
    fn from_request(req: &GenerateRequest) -> Self {
        let tools = if req.config.web_search {
            vec![Tool {
                google_search: serde_json::Map::new(),
            }]
        } else {
            Vec::new()
        };

        let mut prompt = req.prompt.clone();
        let (response_mime_type, response_schema) = match &req.config.response_format {
            // The search tool cannot be combined with structured output, so the schema rides
            // in the prompt and the caller extracts JSON from free text.
            Some(fmt) if req.config.web_search => {
                prompt.push_str("\n\nRespond with JSON only, matching this schema:\n");
                prompt.push_str(&fmt.schema.to_string());
                (None, None)
            }
            Some(fmt) => (Some(fmt.mime_type), Some(fmt.schema.clone())),
            None => (None, None),
        };

        Self {
            contents: vec![Content::text(Some("user"), &prompt)],
            system_instruction: req
                .system_instruction
                .as_deref()
                .map(|s| Content::text(None, s)),
            tools,
            generation_config: WireGenerationConfig {
                temperature: req.config.temperature,
                response_mime_type,
                response_schema,
                thinking_config: req.config.thinking_budget.map(|thinking_budget| {
                    ThinkingConfig { thinking_budget }
                }),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
                thought: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    /// Set instead of candidates when the service fails mid-stream.
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "service error (code={}, status={}): {}",
            self.code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            self.status.as_deref().unwrap_or("-"),
            self.message.as_deref().unwrap_or("no message")
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl GenerateContentResponse {
    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    fn text(&self) -> String {
        let mut out = String::new();
        let parts = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();
        for part in parts {
            // Thought summaries are not part of the answer.
            if part.thought == Some(true) {
                continue;
            }
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }
        out
    }

    fn citations(&self) -> Vec<Source> {
        let chunks = self
            .candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|g| g.grounding_chunks.as_slice())
            .unwrap_or_default();

        chunks
            .iter()
            .filter_map(|chunk| chunk.web.as_ref())
            .filter_map(|web| {
                let uri = web.uri.as_deref()?.trim();
                if uri.is_empty() {
                    return None;
                }
                let title = web
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(uri);
                Some(Source {
                    title: title.to_string(),
                    uri: uri.to_string(),
                })
            })
            .collect()
    }

    fn check_error(&self) -> anyhow::Result<()> {
        if let Some(err) = &self.error {
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                FailureStage::Http,
                err.to_string(),
            )
            .into());
        }
        Ok(())
    }

    fn check_blocked(&self) -> anyhow::Result<()> {
        if let Some(reason) = self.block_reason() {
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                FailureStage::Blocked,
                format!("prompt blocked: {reason}"),
            )
            .into());
        }
        Ok(())
    }

    fn into_response(self) -> anyhow::Result<GenerateResponse> {
        self.check_error()?;
        self.check_blocked()?;
        Ok(GenerateResponse {
            text: self.text(),
            citations: self.citations(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationConfig, ResponseFormat};
    use serde_json::json;

    fn request(config: GenerationConfig) -> GenerateRequest {
        GenerateRequest {
            model: "gemini-2.5-flash".to_string(),
            prompt: "price of NVDA".to_string(),
            system_instruction: Some("be brief".to_string()),
            config,
        }
    }

    #[test]
    fn serializes_full_config() {
        let req = request(GenerationConfig {
            web_search: false,
            temperature: Some(0.5),
            response_format: Some(ResponseFormat::json(json!({"type": "OBJECT"}))),
            thinking_budget: Some(1024),
        });
        let v = serde_json::to_value(GenerateContentRequest::from_request(&req)).unwrap();
        assert_eq!(
            v,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "price of NVDA"}]}],
                "systemInstruction": {"parts": [{"text": "be brief"}]},
                "generationConfig": {
                    "temperature": 0.5,
                    "responseMimeType": "application/json",
                    "responseSchema": {"type": "OBJECT"},
                    "thinkingConfig": {"thinkingBudget": 1024}
                }
            })
        );
    }

    #[test]
    fn search_requests_move_schema_into_prompt() {
        let req = request(GenerationConfig {
            web_search: true,
            temperature: Some(0.1),
            response_format: Some(ResponseFormat::json(json!({"type": "OBJECT"}))),
            thinking_budget: None,
        });
        let v = serde_json::to_value(GenerateContentRequest::from_request(&req)).unwrap();
        assert_eq!(v["tools"], json!([{"googleSearch": {}}]));
        assert!(v["generationConfig"].get("responseMimeType").is_none());
        assert!(v["generationConfig"].get("responseSchema").is_none());

        let prompt = v["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.starts_with("price of NVDA"));
        assert!(prompt.contains(r#"{"type":"OBJECT"}"#));
    }

    #[test]
    fn omits_unset_options() {
        let mut req = request(GenerationConfig::default());
        req.system_instruction = None;
        let v = serde_json::to_value(GenerateContentRequest::from_request(&req)).unwrap();
        assert!(v.get("tools").is_none());
        assert!(v.get("systemInstruction").is_none());
        assert_eq!(v["generationConfig"], json!({}));
    }

    #[test]
    fn joins_text_parts_and_skips_thoughts() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "planning...", "thought": true},
                    {"text": "NVDA "},
                    {"text": "at 120"}
                ]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://example.com/a", "title": "Example A"}},
                    {"web": {"uri": "https://example.com/b"}},
                    {"web": {"title": "no uri"}},
                    {}
                ]}
            }]
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let res = parsed.into_response().unwrap();
        assert_eq!(res.text, "NVDA at 120");
        assert_eq!(
            res.citations,
            vec![
                Source {
                    title: "Example A".to_string(),
                    uri: "https://example.com/a".to_string()
                },
                Source {
                    title: "https://example.com/b".to_string(),
                    uri: "https://example.com/b".to_string()
                },
            ]
        );
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let parsed: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        let err = parsed.into_response().unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, FailureStage::Blocked);
    }

    #[test]
    fn service_error_payload_is_an_error() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
        }))
        .unwrap();
        let err = parsed.into_response().unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, FailureStage::Http);
        assert!(diag.detail.contains("503"));
        assert!(diag.detail.contains("overloaded"));
    }

    #[tokio::test]
    async fn error_event_mid_stream_surfaces_as_err() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Strong buy because \"}]}}]}\n\n",
            "data: {\"error\":{\"code\":503,\"message\":\"The model is overloaded.\",\"status\":\"UNAVAILABLE\"}}\n\n"
        );
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![Ok(body.as_bytes().to_vec())];
        let chunks: Vec<_> = decode_event_stream(stream::iter(parts)).collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().text, "Strong buy because ");
        let err = chunks[1].as_ref().unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, FailureStage::Http);
    }

    #[tokio::test]
    async fn decodes_sse_body_into_chunks() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"NVDA looks \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"strong.\"}]},",
            "\"groundingMetadata\":{\"groundingChunks\":[{\"web\":{\"uri\":\"https://x.test\",\"title\":\"X\"}}]}}]}\r\n\r\n"
        );
        // Split the body mid-payload to exercise buffering.
        let (a, b) = body.as_bytes().split_at(40);
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![Ok(a.to_vec()), Ok(b.to_vec())];
        let chunks: Vec<_> = decode_event_stream(stream::iter(parts))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "NVDA looks ");
        assert_eq!(chunks[1].text, "strong.");
        assert_eq!(chunks[1].citations[0].uri, "https://x.test");
    }
}
