//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the forwarding handler
//! - Wire up middleware (tracing, timeout, header rewrite)
//! - Forward every request to the configured upstream
//! - Swap in recompiled rewrite rules when the config changes

use std::str::FromStr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::middleware::{rewrite_headers_middleware, RewriteState};
use crate::rewrite::RuleSet;

/// Application state injected into the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    /// `None` when the configured address did not parse.
    pub upstream: Option<Authority>,
}

/// HTTP server for the rewrite proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    rewrites: RewriteState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and compiled rules.
    pub fn new(config: ProxyConfig, rules: RuleSet) -> Self {
        let upstream = match Authority::from_str(&config.upstream.address) {
            Ok(authority) => Some(authority),
            Err(e) => {
                tracing::error!(
                    upstream = %config.upstream.address,
                    error = %e,
                    "Invalid upstream address, every request will fail"
                );
                None
            }
        };

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState { client, upstream };
        let rewrites = RewriteState::new(rules);
        let router = Self::build_router(&config, state, rewrites.clone());

        Self {
            router,
            config,
            rewrites,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The rewrite middleware is innermost so it sees the upstream's final headers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState, rewrites: RewriteState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                rewrites,
                rewrite_headers_middleware,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// `config_updates` delivers validated configs from the file watcher;
    /// their rewrites replace the running rules. The server stops when
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            rules = self.rewrites.current().len(),
            "HTTP server starting"
        );

        let rewrites = self.rewrites.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match RuleSet::compile(&config.rewrites) {
                    Ok(rules) => {
                        tracing::info!(rules = rules.len(), "Rewrite rules reloaded");
                        rewrites.store(rules);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected rewrite reload, keeping current rules");
                    }
                }
            }
        });

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn rewrites(&self) -> &RewriteState {
        &self.rewrites
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Forwards the request to the upstream and streams the response back.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some(authority) = state.upstream.clone() else {
        return (StatusCode::BAD_GATEWAY, "Upstream address is invalid").into_response();
    };

    let (mut parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Could not build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };
    // The upstream connection is plain HTTP/1.1 regardless of the client's protocol.
    parts.version = Version::HTTP_11;

    tracing::debug!(method = %method, path = %path, "Forwarding request");

    let upstream: Result<hyper::Response<Incoming>, _> =
        state.client.request(Request::from_parts(parts, body)).await;

    match upstream {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(method = %method, path = %path, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
