//! Middleware stack shared by every route.

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::{
    limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::parse::parse_size;

/// Request handling limits.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Largest accepted request body, in bytes
    pub max_request_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024,
        }
    }
}

impl HttpConfig {
    /// - `MAX_REQUEST_SIZE`: e.g. "1MB", "512KB" (default: "1MB")
    pub fn from_env() -> Self {
        Self {
            max_request_size: std::env::var("MAX_REQUEST_SIZE")
                .ok()
                .and_then(|s| parse_size(&s))
                .unwrap_or_else(|| Self::default().max_request_size),
        }
    }
}

/// Extension trait wrapping a router with the HTTP layers.
pub trait HttpLayers {
    /// Layers, outermost first:
    /// 1. TraceLayer
    /// 2. Response headers (clickjacking, MIME sniffing, caching of
    ///    patient data)
    /// 3. Request body limit
    fn with_http_layers(self, config: &HttpConfig) -> Self;
}

impl<S> HttpLayers for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_http_layers(self, config: &HttpConfig) -> Self {
        self.layer(RequestBodyLimitLayer::new(config.max_request_size))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            // Pages carry patient records
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            ))
            .layer(TraceLayer::new_for_http())
    }
}
