//! Tracing configuration for structured logging
//!
//! The server binary configures the subscriber; the library only emits
//! spans and events through the helpers below.

#[cfg(feature = "server")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors
    Console,
    /// Compact output without ANSI colors, for CI and containers
    Compact,
    /// JSON structured logging for production
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Instance id logged at startup for correlation
    pub instance_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            instance_id: None,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn with_instance_id<S: Into<String>>(mut self, instance_id: S) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: requests and provider outcomes
            1 => "debug", // -v: provider calls, stale responses
            _ => "trace", // -vv+: every instruction chain
        }
    }

    /// Initialize the global subscriber
    #[cfg(feature = "server")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = if let Some(env_filter) = &self.env_filter {
            EnvFilter::try_new(env_filter)?
        } else {
            EnvFilter::try_new(self.verbosity_to_filter())?
        };

        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },

            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },

            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(instance_id) = &self.instance_id {
            tracing::info!(instance_id = %instance_id, "🚀 Imaginarium starting");
        }

        Ok(())
    }
}

/// Initialize tracing with server defaults
#[cfg(feature = "server")]
pub fn init_server_tracing(verbosity: u8, format: TracingFormat) -> anyhow::Result<()> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_instance_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span for one HTTP request
    pub fn request(method: &str, path: &str) -> Span {
        tracing::span!(Level::INFO, "request", method = %method, path = %path)
    }

    /// Span for building a preview from composition inputs
    pub fn composition(background: &str, subject: &str, ticket: u64) -> Span {
        tracing::span!(
            Level::DEBUG,
            "composition",
            background = %background,
            subject = %subject,
            ticket = ticket
        )
    }

    /// Span for a call to an external provider
    pub fn upstream_call(service: &str, operation: &str) -> Span {
        tracing::span!(
            Level::DEBUG,
            "upstream_call",
            service = %service,
            operation = %operation
        )
    }

    /// Span for a stored-image action
    pub fn image_action(action: &str, user_id: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "image_action",
            action = %action,
            user_id = %user_id
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use tracing::{debug, info, warn};

    /// A preview response arrived after a newer request was issued
    pub fn stale_response(ticket: u64, latest: u64) {
        debug!(ticket, latest, "Discarding stale preview response");
    }

    /// A provider call failed and the error was surfaced to the user
    pub fn upstream_failure(error: &dyn std::error::Error, context: &str) {
        warn!(error = %error, context = %context, "❌ Provider call failed");
    }

    /// A user's credit balance changed
    pub fn credits_changed(user_id: &str, delta: i64, balance: i64) {
        info!(user_id = %user_id, delta, balance, "💳 Credits updated");
    }

    /// Log performance metrics
    pub fn performance_metric(operation: &str, duration_ms: u64) {
        debug!(operation = %operation, duration_ms, "⏱️  Performance metric");
    }
}
