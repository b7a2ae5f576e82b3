use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickerlens_core::domain::analysis::{AnalysisMode, AnalysisResult};
use tickerlens_core::domain::forecast::Forecast;
use tickerlens_core::domain::quote::PriceQuote;
use tickerlens_core::domain::recommendation::{Recommendation, Strategy};
use tickerlens_core::orchestrator::{AnalysisEvent, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tickerlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let orchestrator = match Orchestrator::from_settings(&settings) {
        Ok(orchestrator) => {
            tracing::info!(options = ?orchestrator.options(), "generation client ready");
            Some(orchestrator)
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "generation client unavailable; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState { orchestrator });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/quote/:symbol", get(get_quote))
        .route("/analysis/:symbol", get(stream_analysis))
        .route("/overview/:symbol", get(get_overview))
        .route("/forecast/:symbol", get(get_forecast))
        .route("/picks", get(get_picks))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    orchestrator: Option<Orchestrator>,
}

impl AppState {
    fn orchestrator(&self) -> Result<&Orchestrator, StatusCode> {
        self.orchestrator
            .as_ref()
            .ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[derive(Debug, Deserialize)]
struct ModeQuery {
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PicksQuery {
    market: Option<String>,
    timeframe: Option<String>,
}

#[derive(Debug, Serialize)]
struct Overview {
    quote: Option<PriceQuote>,
    analysis: AnalysisResult,
}

#[derive(Debug, Serialize)]
struct Picks {
    strategy: Strategy,
    strategy_label: &'static str,
    recommendations: Vec<Recommendation>,
}

fn parse_mode(mode: Option<&str>) -> Result<AnalysisMode, StatusCode> {
    match mode {
        None => Ok(AnalysisMode::Quick),
        Some(s) => s.parse().map_err(|_| StatusCode::BAD_REQUEST),
    }
}

async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<PriceQuote>, StatusCode> {
    let orchestrator = state.orchestrator()?;
    orchestrator
        .fetch_quote(&symbol)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn stream_analysis(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<ModeQuery>,
) -> Result<Sse<BoxStream<'static, Result<Event, axum::Error>>>, StatusCode> {
    let orchestrator = state.orchestrator()?;
    let mode = parse_mode(query.mode.as_deref())?;

    // The stream is dropped when the client disconnects, which cancels the upstream call.
    let events = orchestrator
        .analysis_events(&symbol, mode)
        .map(|event| {
            let (name, payload) = event_payload(event);
            Event::default().event(name).json_data(payload)
        })
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn event_payload(event: AnalysisEvent) -> (&'static str, serde_json::Value) {
    match event {
        AnalysisEvent::Partial(text) => ("partial", serde_json::json!({ "text": text })),
        AnalysisEvent::Done(result) => (
            "done",
            serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
        ),
    }
}

async fn get_overview(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<ModeQuery>,
) -> Result<Json<Overview>, StatusCode> {
    let orchestrator = state.orchestrator()?;
    let mode = parse_mode(query.mode.as_deref())?;

    let (quote, analysis) = orchestrator
        .analyze_with_quote(&symbol, mode, |_| {})
        .await;

    Ok(Json(Overview { quote, analysis }))
}

async fn get_forecast(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Forecast>, StatusCode> {
    let orchestrator = state.orchestrator()?;
    orchestrator
        .compute_forecast(&symbol)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_picks(
    State(state): State<AppState>,
    Query(query): Query<PicksQuery>,
) -> Result<Json<Picks>, StatusCode> {
    let orchestrator = state.orchestrator()?;
    let market = query.market.unwrap_or_default();
    let timeframe = query.timeframe.unwrap_or_default();

    let (recommendations, strategy) = orchestrator.screen_picks(&market, &timeframe).await;

    Ok(Json(Picks {
        strategy,
        strategy_label: strategy.label(),
        recommendations,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &tickerlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
