//! HTTP API
//!
//! `GET /api/risk-summary` always answers 200 with a [`RiskSummary`], even
//! when it is a fallback.

use crate::error::Result;
use crate::service::RiskService;
use crate::types::RiskSummary;
use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Current risk summary
async fn get_risk_summary(State(service): State<Arc<RiskService>>) -> Json<RiskSummary> {
    Json(service.current_summary().await)
}

/// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Create API router
pub fn create_router(service: Arc<RiskService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/risk-summary", get(get_risk_summary))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve the API until the listener fails
pub async fn start_server(service: Arc<RiskService>, addr: &str) -> Result<()> {
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Risk API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SummaryCache;
    use crate::client::{GammaMarket, MockMarketSource, OutcomePrices};
    use crate::error::TreasuryError;
    use crate::risk::RiskCalculator;
    use crate::testing::ManualClock;
    use crate::types::MarketConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tower::ServiceExt;

    fn service(source: MockMarketSource) -> Arc<RiskService> {
        let calculator = RiskCalculator::new(
            Arc::new(source),
            vec![
                MarketConfig::binary("a", "market-a", dec!(0.40)),
                MarketConfig::binary("b", "market-b", dec!(0.35)),
                MarketConfig::binary("c", "market-c", dec!(0.25)),
            ],
        );
        Arc::new(RiskService::new(
            calculator,
            SummaryCache::new(Duration::from_secs(60)),
            Arc::new(ManualClock::default()),
        ))
    }

    fn healthy_source() -> MockMarketSource {
        let mut source = MockMarketSource::new();
        source.expect_market_by_slug().returning(|slug| {
            let yes = match slug {
                "market-a" => "0.80",
                "market-b" => "0.70",
                _ => "0.60",
            };
            Ok(GammaMarket {
                question: format!("{}?", slug),
                outcome_prices: Some(OutcomePrices::Encoded(format!("[\"{}\", \"0\"]", yes))),
                active: true,
                ..Default::default()
            })
        });
        source
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(service(healthy_source()));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_risk_summary_json_shape() {
        let app = create_router(service(healthy_source()));
        let (status, body) = get_json(app, "/api/risk-summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["riskScore"], 72);
        assert_eq!(body["regime"], "Defensive");
        assert_eq!(body["recommendedBasePct"], 70);
        assert_eq!(body["recommendedSolanaPct"], 30);
        assert_eq!(body["cacheHit"], false);
        assert_eq!(body["explanations"].as_array().unwrap().len(), 3);
        assert!(body["timestamp"].is_string());

        let first = &body["markets"][0];
        assert_eq!(first["key"], "a");
        assert_eq!(first["slug"], "market-a");
        assert_eq!(first["status"], "active");
        assert_eq!(first["probability"], 0.8);
        assert_eq!(first["weight"], 0.4);
        assert_eq!(first["reading"]["source"], "observed");
    }

    #[tokio::test]
    async fn test_second_request_is_cache_hit() {
        let svc = service(healthy_source());

        let (_, first) = get_json(create_router(svc.clone()), "/api/risk-summary").await;
        let (_, second) = get_json(create_router(svc), "/api/risk-summary").await;

        assert_eq!(first["cacheHit"], false);
        assert_eq!(second["cacheHit"], true);
        assert_eq!(first["timestamp"], second["timestamp"]);
    }

    #[tokio::test]
    async fn test_upstream_outage_is_still_ok() {
        let mut source = MockMarketSource::new();
        source
            .expect_market_by_slug()
            .returning(|slug| Err(TreasuryError::MarketNotFound(slug.to_string())));

        let app = create_router(service(source));
        let (status, body) = get_json(app, "/api/risk-summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["riskScore"], 50);
        assert_eq!(body["regime"], "Neutral");
        assert_eq!(body["recommendedBasePct"], 50);
        assert_eq!(body["recommendedSolanaPct"], 50);

        let markets = body["markets"].as_array().unwrap();
        assert_eq!(markets.len(), 3);
        assert!(markets.iter().all(|m| m["status"] == "error"));
        assert!(markets.iter().all(|m| m["reading"]["source"] == "defaulted"));
        assert_eq!(
            body["explanations"][0],
            "market-a: Market data unavailable, using neutral (50%)"
        );
    }

    #[tokio::test]
    async fn test_fallback_is_still_ok() {
        let calculator = RiskCalculator::new(Arc::new(MockMarketSource::new()), vec![]);
        let svc = Arc::new(RiskService::new(
            calculator,
            SummaryCache::new(Duration::from_secs(60)),
            Arc::new(ManualClock::default()),
        ));

        let (status, body) = get_json(create_router(svc), "/api/risk-summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["riskScore"], 50);
        assert_eq!(body["regime"], "Neutral");
        assert_eq!(body["markets"].as_array().unwrap().len(), 0);
        assert_eq!(
            body["explanations"][0],
            "Error fetching market data. Using neutral fallback."
        );
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = create_router(service(healthy_source()));
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/risk-summary")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
