use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{history, plans, profiles, recipes};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(plans::router())
                .merge(profiles::router())
                .merge(history::router())
                .merge(recipes::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::extractors::bearer_for;
    use crate::gemini::client::fakes::ScriptedClient;
    use crate::gemini::GenerateContentResponse;

    const PLAN: &str = r#"{"mealPlans": [{"day": 1, "meals": {"breakfast": "Poha", "lunch": "Thali", "dinner": "Khichdi", "snacks": ["Chaat"]}}]}"#;

    fn state() -> AppState {
        AppState::fake_with(Arc::new(ScriptedClient::always(Ok(
            GenerateContentResponse::from_text(PLAN),
        ))))
    }

    fn profile_json(days: u32) -> Value {
        json!({
            "age": 30, "height": 170, "weight": 65,
            "dietaryPreference": "vegetarian",
            "cuisinePreference": "both",
            "allergies": [],
            "days": days
        })
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(a) = auth {
            req = req.header(header::AUTHORIZATION, a);
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, value)
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = build_app(state());
        let (status, _, _) = call(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn plan_routes_require_a_token() {
        let app = build_app(state());
        let (status, _, _) = call(&app, Method::GET, "/api/v1/plans", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn generate_then_fetch_list_and_delete() {
        let st = state();
        let auth = bearer_for(&st, "u1");
        let app = build_app(st);

        let (status, headers, body) = call(
            &app,
            Method::POST,
            "/api/v1/plans/generate",
            Some(&auth),
            Some(profile_json(2)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["source"], "model");
        let plan_id = body["plan"]["planId"].as_str().unwrap().to_string();
        assert_eq!(
            headers[header::LOCATION],
            format!("/api/v1/plans/{plan_id}").as_str()
        );
        let days = body["plan"]["mealPlans"].as_array().unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[1]["day"], 2);

        let uri = format!("/api/v1/plans/{plan_id}");
        let (status, _, got) = call(&app, Method::GET, &uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got["userData"]["days"], 2);

        let (_, _, list) = call(&app, Method::GET, "/api/v1/plans", Some(&auth), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let fav = format!("/api/v1/plans/{plan_id}/favorite");
        let (status, _, toggled) = call(&app, Method::POST, &fav, Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["favorite"], true);

        let (status, _, _) = call(&app, Method::DELETE, &uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = call(&app, Method::GET, &uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, _, summary) =
            call(&app, Method::GET, "/api/v1/history/summary", Some(&auth), None).await;
        assert_eq!(summary["created"], 1);
        assert_eq!(summary["viewed"], 1);
        assert_eq!(summary["favorited"], 1);
        assert_eq!(summary["deleted"], 1);

        let (_, _, profile) = call(&app, Method::GET, "/api/v1/profile", Some(&auth), None).await;
        assert_eq!(profile["days"], 2);
        assert_eq!(profile["email"], "u1@example.com");
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected_before_generation() {
        let st = state();
        let auth = bearer_for(&st, "u1");
        let app = build_app(st);
        let (status, _, _) = call(
            &app,
            Method::POST,
            "/api/v1/plans/generate",
            Some(&auth),
            Some(profile_json(0)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = call(&app, Method::PUT, "/api/v1/profile", Some(&auth), Some(profile_json(45))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn plans_of_other_users_are_not_found() {
        let st = state();
        let owner = bearer_for(&st, "owner");
        let other = bearer_for(&st, "other");
        let app = build_app(st);

        let (_, _, body) = call(
            &app,
            Method::POST,
            "/api/v1/plans/generate",
            Some(&owner),
            Some(profile_json(1)),
        )
        .await;
        let uri = format!("/api/v1/plans/{}", body["plan"]["planId"].as_str().unwrap());
        let (status, _, _) = call(&app, Method::GET, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = call(&app, Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn recent_plans_and_profile_history_routes() {
        let st = state();
        let auth = bearer_for(&st, "u1");
        let app = build_app(st);

        let (_, _, body) = call(
            &app,
            Method::POST,
            "/api/v1/plans/generate",
            Some(&auth),
            Some(profile_json(1)),
        )
        .await;
        let plan_id = body["plan"]["planId"].as_str().unwrap().to_string();

        let (status, _, recent) =
            call(&app, Method::GET, "/api/v1/plans/recent", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recent[0]["planId"], plan_id.as_str());

        let mut custom = profile_json(3);
        custom["cuisinePreference"] = json!("gujarati");
        let (status, _, saved) =
            call(&app, Method::PUT, "/api/v1/profile", Some(&auth), Some(custom)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["cuisinePreference"], "gujarati");

        let (status, _, history) =
            call(&app, Method::GET, "/api/v1/profile/history", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["profile"]["cuisinePreference"], "gujarati");
        assert_eq!(history[1]["profile"]["days"], 1);
    }

    #[tokio::test]
    async fn recipe_without_dish_is_bad_request() {
        let st = state();
        let auth = bearer_for(&st, "u1");
        let app = build_app(st);
        let (status, _, _) =
            call(&app, Method::GET, "/api/v1/recipes?dish=%20", Some(&auth), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
