//! Tracing setup and request-scoped trace identifiers.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{extract::Request, middleware::Next, response::Response};
use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing::Instrument;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Header used to propagate a caller-supplied request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Trace context containing request correlation ID.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

impl TraceContext {
    /// Build a context from an incoming header value, generating one when absent or unusable.
    pub fn from_header(value: Option<&str>) -> Self {
        let trace_id = value
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= 128 && v.is_ascii())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        Self { trace_id }
    }
}

task_local! {
    static ACTIVE_TRACE_CONTEXT: TraceContext;
}

/// Errors that can occur while initializing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize global tracing/logging exactly once, wiring `log::` macros into the tracing pipeline.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    // SeaORM and sqlx log through `log::`; bridge them before the subscriber goes in.
    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!(
                "Warning: Failed to install log tracer bridge: {}. `log::` records will not reach the tracing subscriber.",
                err
            );
        }
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!(
            "Warning: Failed to set global tracing subscriber: {}. Default subscriber remains in effect.",
            err
        );
    }

    Ok(())
}

/// Execute `future` within the provided trace context, making it available through task-local
/// storage for the duration of the request.
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    ACTIVE_TRACE_CONTEXT.scope(context, future).await
}

/// Get the currently active trace ID, if one has been set for the running task.
pub fn current_trace_id() -> Option<String> {
    ACTIVE_TRACE_CONTEXT
        .try_with(|ctx| ctx.trace_id.clone())
        .ok()
}

/// Middleware that assigns every request a trace id and echoes it back in the response.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let context = TraceContext::from_header(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    request.extensions_mut().insert(context.clone());

    let span = tracing::info_span!(
        "request",
        trace_id = %context.trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let trace_id = context.trace_id.clone();

    let mut response = with_trace_context(context, next.run(request).instrument(span)).await;
    if let Ok(value) = trace_id.parse() {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_header_keeps_caller_id() {
        let ctx = TraceContext::from_header(Some("abc-123"));
        assert_eq!(ctx.trace_id, "abc-123");
    }

    #[test]
    fn from_header_generates_when_missing_or_blank() {
        let generated = TraceContext::from_header(None);
        assert_eq!(generated.trace_id.len(), 32);

        let blank = TraceContext::from_header(Some("   "));
        assert_eq!(blank.trace_id.len(), 32);
    }

    #[tokio::test]
    async fn current_trace_id_visible_inside_scope_only() {
        assert!(current_trace_id().is_none());

        let seen = with_trace_context(
            TraceContext {
                trace_id: "scoped".to_string(),
            },
            async { current_trace_id() },
        )
        .await;

        assert_eq!(seen.as_deref(), Some("scoped"));
    }
}
