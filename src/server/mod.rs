pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// HTTP + WS surface for the display client.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/instruments", get(routes::get_instruments))
        .route("/api/history/{id}", get(routes::get_history))
        .route("/api/quote", post(routes::post_quote))
        .route("/api/replay", get(routes::get_replay))
        .route("/api/replay/start", post(routes::post_replay_start))
        .route("/api/replay/stop", post(routes::post_replay_stop))
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::feeds::tests::StaticHistory;
    use crate::models::black_scholes::BlackScholesEuropean;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use portable_atomic::Ordering;
    use tower::ServiceExt;

    fn app_with(provider: StaticHistory) -> (Arc<AppState>, Router) {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(provider),
            Arc::new(BlackScholesEuropean::new()),
        );
        (state.clone(), router(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn quote_body(option_type: &str, strike: f64) -> serde_json::Value {
        serde_json::json!({
            "instrument": "samsung",
            "option_type": option_type,
            "strike": strike,
            "days_to_expiry": 30,
            "investment_amount": 1_000_000.0,
        })
    }

    #[tokio::test]
    async fn test_quote_ok() {
        let (state, app) = app_with(StaticHistory::with_days(60));
        let (status, json) = send(&app, "POST", "/api/quote", quote_body("call", 105.0)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["instrument"], "samsung");
        assert_eq!(json["result"]["option_type"], "call");
        assert!(json["result"]["theoretical_price"].as_f64().unwrap() > 0.0);
        assert_eq!(json["curve"]["points"].as_array().unwrap().len(), 201);
        assert!(json["warning"].is_null());
        let range = json["payoff_range"].as_array().unwrap();
        assert!(range[0].as_f64().unwrap() < range[1].as_f64().unwrap());
        assert_eq!(state.counters.quotes_served.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_quote_rejects_unknown_option_type() {
        let (state, app) = app_with(StaticHistory::with_days(60));
        let (status, json) = send(&app, "POST", "/api/quote", quote_body("straddle", 100.0)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("option type"));
        assert_eq!(state.counters.errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_mistyped_body_is_invalid_input() {
        let (state, app) = app_with(StaticHistory::with_days(60));
        let mut body = quote_body("call", 100.0);
        body["days_to_expiry"] = serde_json::json!(-3.5);
        let (status, json) = send(&app, "POST", "/api/quote", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("invalid input"));
        assert_eq!(state.counters.errors.load(Ordering::Relaxed), 1);

        let replay = serde_json::json!({ "instrument": "sk", "option_type": "call", "strike": "high" });
        let (status, json) = send(&app, "POST", "/api/replay/start", replay).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
        assert_eq!(state.counters.errors.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (_, app) = app_with(StaticHistory::with_days(10));
        let (status, _) = send(&app, "GET", "/index.html", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_zero_priced_quote_warns() {
        let (_, app) = app_with(StaticHistory::with_days(60));
        let mut body = quote_body("call", 10_000.0);
        body["days_to_expiry"] = serde_json::json!(1);
        let (status, json) = send(&app, "POST", "/api/quote", body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"]["theoretical_price"].as_f64().unwrap(), 0.0);
        assert_eq!(json["result"]["contracts_implied"].as_f64().unwrap(), 0.0);
        assert!(json["warning"].as_str().unwrap().starts_with("option price is zero"));

        let points = json["curve"]["points"].as_array().unwrap();
        assert!(points.iter().all(|p| p["net_payoff"].as_f64().unwrap() == -1_000_000.0));
        assert_eq!(json["payoff_range"], serde_json::json!([-1_000_000.0, -1_000_000.0]));
    }

    #[tokio::test]
    async fn test_invalid_input_checked_before_fetch() {
        let provider = StaticHistory::with_days(60);
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(provider),
            Arc::new(BlackScholesEuropean::new()),
        );
        let app = router(state.clone());
        let (status, _) = send(&app, "POST", "/api/quote", quote_body("put", -5.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.cache.get("samsung").is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_no_data() {
        let (_, app) = app_with(StaticHistory::failing());
        let (status, json) = send(&app, "POST", "/api/quote", quote_body("call", 100.0)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].as_str().unwrap().starts_with("no data available"));
    }

    #[tokio::test]
    async fn test_empty_history_rejected() {
        let (_, app) = app_with(StaticHistory::with_days(0));
        let body = serde_json::json!({
            "instrument": "lg", "option_type": "call", "strike": 100.0, "days_to_expiry": 30,
        });
        let (status, _) = send(&app, "POST", "/api/replay/start", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_history_and_strike_bounds() {
        let (_, app) = app_with(StaticHistory::with_days(10));
        let (status, json) = send(&app, "GET", "/api/history/sk", serde_json::Value::Null).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["series"]["points"].as_array().unwrap().len(), 10);
        let last = json["last_close"].as_f64().unwrap();
        assert_eq!(json["strike_bounds"]["default"].as_f64().unwrap(), last.round());

        let (status, _) = send(&app, "GET", "/api/history/tsla", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_replay_start_conflict_and_stop() {
        let (_, app) = app_with(StaticHistory::with_days(10));
        let body = serde_json::json!({
            "instrument": "samsung", "option_type": "put", "strike": 100.0, "days_to_expiry": 20,
        });

        let (status, json) = send(&app, "POST", "/api/replay/start", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "running");
        assert_eq!(json["total_steps"], 10);

        let (status, _) = send(&app, "POST", "/api/replay/start", body.clone()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, json) = send(&app, "POST", "/api/replay/stop", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "idle");

        let (status, _) = send(&app, "POST", "/api/replay/stop", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(&app, "GET", "/api/replay", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "idle");
    }

    #[tokio::test]
    async fn test_history_is_cached() {
        let provider = Arc::new(StaticHistory::with_days(10));
        let state = AppState::new(
            AppConfig::default(),
            provider.clone(),
            Arc::new(BlackScholesEuropean::new()),
        );
        let app = router(state);
        for _ in 0..3 {
            let (status, _) = send(&app, "GET", "/api/history/lg", serde_json::Value::Null).await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(provider.fetches.load(Ordering::Relaxed), 1);
    }
}
