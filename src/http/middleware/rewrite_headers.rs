//! Response header rewrite middleware for axum routers.
//!
//! In a value-returning pipeline the status is committed when the inner
//! service hands back its `Response`, so that is where the rules run. The
//! body and extensions (including upgrade handles) are passed through as-is.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::handler::request_host;
use crate::rewrite::RuleSet;

/// Shared, hot-swappable rule set for the middleware.
#[derive(Clone)]
pub struct RewriteState {
    rules: Arc<ArcSwap<RuleSet>>,
}

impl RewriteState {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(ArcSwap::from_pointee(rules)),
        }
    }

    /// The rules new requests will see.
    pub fn current(&self) -> Arc<RuleSet> {
        self.rules.load_full()
    }

    /// Replace the rule set. In-flight requests keep their snapshot.
    pub fn store(&self, rules: RuleSet) {
        self.rules.store(Arc::new(rules));
    }
}

pub async fn rewrite_headers_middleware(
    State(state): State<RewriteState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let host = request_host(&req).to_owned();
    let rules = state.current();

    let mut response = next.run(req).await;

    if !rules.is_empty() {
        rules.apply(response.headers_mut(), &host);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteConfig;
    use axum::{
        http::{header, HeaderValue, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn redirect() -> impl IntoResponse {
        (
            StatusCode::FOUND,
            [
                (header::LOCATION, "http://backend.internal/page?query=1"),
                (header::LINK, "<http://backend.internal/a>"),
            ],
            "http://backend.internal/ in the body",
        )
    }

    fn app(state: RewriteState) -> Router {
        Router::new()
            .route("/", get(redirect))
            .layer(middleware::from_fn_with_state(state, rewrite_headers_middleware))
    }

    fn rules() -> RuleSet {
        RuleSet::compile(&[RewriteConfig::new(
            "Location",
            "^http://(.+?)/(.+)$",
            "https://{RequestHost}/$2",
        )])
        .unwrap()
    }

    fn get_request(host: &'static str) -> Request<Body> {
        Request::builder()
            .uri("/")
            .header(header::HOST, HeaderValue::from_static(host))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rewrites_response_headers() {
        let response = app(RewriteState::new(rules()))
            .oneshot(get_request("127.0.0.1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://127.0.0.1/page?query=1"
        );
        assert_eq!(response.headers()[header::LINK], "<http://backend.internal/a>");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"http://backend.internal/ in the body");
    }

    #[tokio::test]
    async fn empty_rule_set_passes_through() {
        let response = app(RewriteState::new(RuleSet::default()))
            .oneshot(get_request("127.0.0.1"))
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::LOCATION],
            "http://backend.internal/page?query=1"
        );
    }

    #[tokio::test]
    async fn stored_rules_apply_to_later_requests() {
        let state = RewriteState::new(RuleSet::default());
        let app = app(state.clone());

        state.store(rules());
        let response = app.oneshot(get_request("edge.test")).await.unwrap();

        assert_eq!(
            response.headers()[header::LOCATION],
            "https://edge.test/page?query=1"
        );
    }

    #[tokio::test]
    async fn response_extensions_survive() {
        #[derive(Clone, Debug, PartialEq)]
        struct Marker(u8);

        async fn with_extension() -> Response {
            let mut response = Response::new(Body::empty());
            response.extensions_mut().insert(Marker(7));
            response
        }

        let app = Router::new()
            .route("/", get(with_extension))
            .layer(middleware::from_fn_with_state(
                RewriteState::new(rules()),
                rewrite_headers_middleware,
            ));

        let response = app.oneshot(get_request("h")).await.unwrap();
        assert_eq!(response.extensions().get::<Marker>(), Some(&Marker(7)));
    }
}
