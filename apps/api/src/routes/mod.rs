pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::auth::handlers as auth;
use crate::credits::handlers as credits;
use crate::payments::handlers as payments;
use crate::profiles::handlers as profiles;
use crate::state::AppState;
use crate::storage::handlers as storage;
use crate::storage::validation::MAX_RESUME_BYTES;

/// Room for the multipart framing and the job description on top of the file.
const BODY_LIMIT: usize = MAX_RESUME_BYTES + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/signup", post(auth::handle_sign_up))
        .route("/api/v1/auth/signin", post(auth::handle_sign_in))
        .route("/api/v1/auth/signout", post(auth::handle_sign_out))
        .route("/api/v1/auth/oauth/:provider", get(auth::handle_oauth_url))
        // Profile
        .route(
            "/api/v1/profile",
            get(profiles::handle_get_profile).patch(profiles::handle_update_profile),
        )
        // Credits
        .route("/api/v1/credits", get(credits::handle_get_balance))
        .route(
            "/api/v1/credits/transactions",
            get(credits::handle_list_transactions),
        )
        .route("/api/v1/credits/packages", get(credits::handle_list_packages))
        // Payments
        .route("/api/v1/payments", get(payments::handle_list_payments))
        .route("/api/v1/payments/orders", post(payments::handle_create_order))
        .route("/api/v1/payments/verify", post(payments::handle_verify_payment))
        .route("/api/v1/payments/failed", post(payments::handle_payment_failed))
        // Resumes
        .route(
            "/api/v1/resumes",
            get(storage::handle_list_resumes).post(storage::handle_upload_resume),
        )
        .route("/api/v1/resumes/latest", get(storage::handle_latest_resume))
        .route(
            "/api/v1/resumes/:id/download-url",
            get(storage::handle_download_url),
        )
        .route(
            "/api/v1/resumes/:id",
            delete(storage::handle_delete_resume),
        )
        // Analyses
        .route("/api/v1/analyses", post(analysis::handle_run_analysis))
        .route(
            "/api/v1/analyses/current",
            get(analysis::handle_current_analysis),
        )
        .route("/api/v1/tools/score", post(analysis::handle_score))
        .route("/api/v1/tools/suggestions", post(analysis::handle_suggestions))
        .route("/api/v1/tools/keywords", post(analysis::handle_keywords))
        // Job descriptions
        .route(
            "/api/v1/job-descriptions",
            get(storage::handle_list_job_descriptions).post(storage::handle_create_job_description),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::analysis_client::testing::FakeAnalyzer;
    use crate::auth::testing::{far_future, token_for};
    use crate::credits::ledger::testing::MemoryLedger;
    use crate::session::{AnalysisCache, MemoryAnalysisCache, SessionAnalysis};

    const BOUNDARY: &str = "careerleap-test-boundary";

    fn app(analyzer: Arc<FakeAnalyzer>, ledger: Arc<MemoryLedger>) -> Router {
        build_router(AppState::for_tests(analyzer, ledger))
    }

    /// An app whose session cache already holds an analysis for `user`.
    async fn app_with_session(user: Uuid) -> (Router, Arc<MemoryAnalysisCache>) {
        let cache = Arc::new(MemoryAnalysisCache::default());
        cache
            .put(
                user,
                &SessionAnalysis {
                    resume_id: Uuid::new_v4(),
                    record: crate::analysis::record::AnalysisRecord {
                        ats_score: Some(crate::analysis_client::testing::sample_score(85)),
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();
        let state = AppState::for_tests_with_cache(
            Arc::new(FakeAnalyzer::healthy()),
            Arc::new(MemoryLedger::default()),
            cache.clone(),
        );
        (build_router(state), cache)
    }

    fn bearer(user: Uuid) -> String {
        let secret = crate::config::Config::for_tests().jwt_secret;
        format!("Bearer {}", token_for(user, &secret, far_future()))
    }

    fn pdf_upload(user: Uuid) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"resume\"; filename=\"cv.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.7 test\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/v1/analyses")
            .header(header::AUTHORIZATION, bearer(user))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(
            Arc::new(FakeAnalyzer::healthy()),
            Arc::new(MemoryLedger::default()),
        );
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_account_routes_require_token() {
        let app = app(
            Arc::new(FakeAnalyzer::healthy()),
            Arc::new(MemoryLedger::default()),
        );
        let response = app
            .oneshot(
                Request::get("/api/v1/analyses/current")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_packages_are_public() {
        let app = app(
            Arc::new(FakeAnalyzer::healthy()),
            Arc::new(MemoryLedger::default()),
        );
        let response = app
            .oneshot(
                Request::get("/api/v1/credits/packages")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body.as_array().unwrap().len(), 5);
        assert_eq!(body[2]["id"], "pack_50");
    }

    #[tokio::test]
    async fn test_analysis_without_credits_is_refused_before_calling_api() {
        let user = Uuid::new_v4();
        let analyzer = Arc::new(FakeAnalyzer::healthy());
        let ledger = Arc::new(MemoryLedger::with_balance(user, 0));

        let response = app(analyzer.clone(), ledger.clone())
            .oneshot(pdf_upload(user))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            json_body(response).await["error"]["code"],
            "INSUFFICIENT_CREDITS"
        );
        assert_eq!(analyzer.calls(), 0);
        assert_eq!(ledger.deduction_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_analyzer_costs_nothing() {
        let user = Uuid::new_v4();
        let analyzer = Arc::new(FakeAnalyzer::down());
        let ledger = Arc::new(MemoryLedger::with_balance(user, 3));

        let response = app(analyzer.clone(), ledger.clone())
            .oneshot(pdf_upload(user))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ledger.deduction_count(), 0);
        assert_eq!(ledger.balance_of(user), 3);
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_rejected() {
        let user = Uuid::new_v4();
        let analyzer = Arc::new(FakeAnalyzer::healthy());
        let ledger = Arc::new(MemoryLedger::with_balance(user, 3));
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"resume\"; filename=\"cv.docx\"\r\n\
             Content-Type: application/vnd.openxmlformats-officedocument.wordprocessingml.document\r\n\r\n\
             PK\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = Request::post("/api/v1/analyses")
            .header(header::AUTHORIZATION, bearer(user))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app(analyzer.clone(), ledger.clone())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(analyzer.calls(), 0);
        assert_eq!(ledger.deduction_count(), 0);
    }

    #[tokio::test]
    async fn test_score_tool_is_free() {
        let user = Uuid::new_v4();
        let ledger = Arc::new(MemoryLedger::with_balance(user, 1));
        let request = Request::post("/api/v1/tools/score")
            .header(header::AUTHORIZATION, bearer(user))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"resume_text": "Rust engineer, 5 years", "job_description": ""}"#,
            ))
            .unwrap();

        let response = app(Arc::new(FakeAnalyzer::healthy()), ledger.clone())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["overall_score"], 84);
        assert_eq!(ledger.deduction_count(), 0);
    }

    #[tokio::test]
    async fn test_keywords_tool_needs_only_job_description() {
        let user = Uuid::new_v4();
        let request = Request::post("/api/v1/tools/keywords")
            .header(header::AUTHORIZATION, bearer(user))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"job_description": "Senior Rust engineer with Kubernetes"}"#,
            ))
            .unwrap();

        let response = app(
            Arc::new(FakeAnalyzer::healthy()),
            Arc::new(MemoryLedger::default()),
        )
        .oneshot(request)
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["job_description_keywords"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_keywords_tool_requires_job_description() {
        let user = Uuid::new_v4();
        let request = Request::post("/api/v1/tools/keywords")
            .header(header::AUTHORIZATION, bearer(user))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"resume_text": "Rust engineer, 5 years"}"#))
            .unwrap();

        let response = app(
            Arc::new(FakeAnalyzer::healthy()),
            Arc::new(MemoryLedger::default()),
        )
        .oneshot(request)
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"]["message"],
            "Job description is required"
        );
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_analysis() {
        let user = Uuid::new_v4();
        let (app, cache) = app_with_session(user).await;
        let request = Request::post("/api/v1/auth/signout")
            .header(header::AUTHORIZATION, bearer(user))
            .body(Body::empty())
            .unwrap();

        // The identity provider is unreachable here; the session goes anyway.
        app.oneshot(request).await.unwrap();

        assert!(cache.get(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_resume_clears_session_analysis() {
        let user = Uuid::new_v4();
        let (app, cache) = app_with_session(user).await;
        let request = Request::delete(format!("/api/v1/resumes/{}", Uuid::new_v4()))
            .header(header::AUTHORIZATION, bearer(user))
            .body(Body::empty())
            .unwrap();

        app.oneshot(request).await.unwrap();

        assert!(cache.get(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_users_session_survives_sign_out() {
        let owner = Uuid::new_v4();
        let (app, cache) = app_with_session(owner).await;
        let request = Request::post("/api/v1/auth/signout")
            .header(header::AUTHORIZATION, bearer(Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();

        app.oneshot(request).await.unwrap();

        assert!(cache.get(owner).await.unwrap().is_some());
    }
}
