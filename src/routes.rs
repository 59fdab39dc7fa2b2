// src/routes.rs - URL layout shared by the server and endpoint tests

use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

use crate::auth::jwt_middleware;
use crate::auth_handlers::{create_user, get_profile, login};
use crate::batch_handlers::{
    batch_details, batch_ledger, batch_suggestions, create_batch, create_child_component,
    get_child_components,
};
use crate::handlers::health_check;
use crate::production_handlers::{add_tags, batch_remaining_qty, bulk_add, process_sequence};

pub fn configure(cfg: &mut web::ServiceConfig) {
    let auth_middleware = HttpAuthentication::bearer(jwt_middleware);

    cfg
        // Health check (no auth)
        .route("/health", web::get().to(health_check))

        // Auth endpoints (no authentication required)
        .service(
            web::scope("/auth")
                .route("/login", web::post().to(login))
        )

        // Protected API endpoints
        .service(
            web::scope("/api/v1")
                .wrap(auth_middleware)
                .service(
                    web::scope("/auth")
                        .route("/profile", web::get().to(get_profile))
                        .route("/users", web::post().to(create_user))
                )

                // Batch lookup and master data
                .route("/batch_details/", web::get().to(batch_details))
                .route("/get_child_components/", web::get().to(get_child_components))
                .route("/issuebatch/suggestions/", web::get().to(batch_suggestions))
                .route("/batch_ledger/", web::get().to(batch_ledger))
                .route("/batches/", web::post().to(create_batch))
                .route("/child_components/", web::post().to(create_child_component))

                // Department ledger
                .route("/batch_remaining_qty/{department}/", web::get().to(batch_remaining_qty))
                .route("/process_sequence/{department}/", web::get().to(process_sequence))
                .route("/tags/", web::post().to(add_tags))
                .route("/{department}/bulk-add/", web::post().to(bulk_add))
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App, HttpServer};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::auth::{AuthService, CreateUserRequest, User};
    use crate::client::{EntrySession, LedgerApi, LedgerClient, RequestContext};
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::ledger::{Department, LedgerError, Process, ProductionStatus, TolerancePolicy};
    use crate::models::ProductionEntry;
    use crate::AppState;

    const PASSWORD: &str = "Passw0rd1";

    async fn setup() -> (Arc<AppState>, Arc<AuthService>) {
        let pool = test_pool().await;
        let state = Arc::new(AppState::new(pool, Config::default()).unwrap());
        let auth = Arc::new(AuthService::new("test_secret_123456789012345678901234567890", 1, 4));
        (state, auth)
    }

    async fn token(state: &AppState, auth: &AuthService, username: &str, role: &str, department: Option<Department>) -> String {
        let user = User::create(
            &state.db_pool,
            CreateUserRequest {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                role: role.to_string(),
                department,
            },
            auth,
        )
        .await
        .unwrap();
        auth.generate_token(&user).unwrap()
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    fn forging_row(batch_id: &str, quantity: i64) -> Value {
        json!({
            "batch_id": batch_id,
            "date": "2024-03-01",
            "shift": "A",
            "quantity_produced": quantity,
            "status": "ok",
            "verified_by": "QA",
            "next_process": "heat_treatment",
            "measurements": {"die": "D-4"}
        })
    }

    macro_rules! app {
        ($state:expr, $auth:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .app_data(web::Data::new($auth.clone()))
                    .configure(configure),
            )
            .await
        };
    }

    macro_rules! issue_batch {
        ($app:expr, $admin:expr, $batch_id:expr, $max_qty:expr) => {{
            let req = test::TestRequest::post()
                .uri("/api/v1/batches/")
                .insert_header(bearer($admin))
                .set_json(json!({
                    "batch_id": $batch_id,
                    "component": "SHAFT",
                    "grade": "EN8",
                    "heat_no": "H-77",
                    "max_qty": $max_qty
                }))
                .to_request();
            let resp = test::call_service(&$app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }};
    }

    #[actix_rt::test]
    async fn test_health_needs_no_token() {
        let (state, auth) = setup().await;
        let app = app!(state, auth);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["database"], true);
    }

    #[actix_rt::test]
    async fn test_api_requires_bearer_token() {
        let (state, auth) = setup().await;
        let app = app!(state, auth);

        let req = test::TestRequest::get().uri("/api/v1/batch_details/?batch_id=B-1").to_request();
        let status = match test::try_call_service(&app, req).await {
            Ok(resp) => resp.status(),
            Err(err) => err.as_response_error().status_code(),
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_login_then_profile() {
        let (state, auth) = setup().await;
        token(&state, &auth, "heat-op", "operator", Some(Department::HeatTreatment)).await;
        let app = app!(state, auth);

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"username": "heat-op", "password": "wrong-Passw0rd"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"username": "heat-op", "password": PASSWORD}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let issued = body["data"]["token"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["expires_in"], 3600);

        let req = test::TestRequest::get()
            .uri("/api/v1/auth/profile")
            .insert_header(bearer(&issued))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["username"], "heat-op");
        assert_eq!(body["data"]["department"], "heat_treatment");
    }

    #[actix_rt::test]
    async fn test_chain_of_custody_over_http() {
        let (state, auth) = setup().await;
        let admin = token(&state, &auth, "admin", "admin", None).await;
        let forging = token(&state, &auth, "forge-op", "operator", Some(Department::Forging)).await;
        let app = app!(state, auth);
        issue_batch!(app, &admin, "B-1", 500);

        let req = test::TestRequest::get()
            .uri("/api/v1/batch_details/?batch_id=B-1")
            .insert_header(bearer(&forging))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["max_qty"], 500);
        assert_eq!(body["data"]["heat_no"], "H-77");

        let req = test::TestRequest::post()
            .uri("/api/v1/forging/bulk-add/")
            .insert_header(bearer(&forging))
            .set_json(json!({"rows": [forging_row("B-1", 300), forging_row("B-1", 200)]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["recorded"], 2);

        let req = test::TestRequest::get()
            .uri("/api/v1/batch_remaining_qty/ht/?batch_id=B-1")
            .insert_header(bearer(&forging))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["department"], "heat_treatment");
        assert_eq!(body["data"]["upstream_supply"], 500);
        assert_eq!(body["data"]["remaining_qty"], 500);

        // forging has used up the batch
        let req = test::TestRequest::post()
            .uri("/api/v1/forging/bulk-add/")
            .insert_header(bearer(&forging))
            .set_json(json!({"rows": [forging_row("B-1", 1)]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["row"], 0);
        assert_eq!(body["errors"][0]["code"], "no_remaining_quantity");

        let req = test::TestRequest::get()
            .uri("/api/v1/batch_ledger/?batch_id=B-1")
            .insert_header(bearer(&admin))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["stages"][0]["process"], "forging");
        assert_eq!(body["data"]["stages"][0]["ok"], 500);
    }

    #[actix_rt::test]
    async fn test_departments_and_roles_are_enforced() {
        let (state, auth) = setup().await;
        let admin = token(&state, &auth, "admin", "admin", None).await;
        let forging = token(&state, &auth, "forge-op", "operator", Some(Department::Forging)).await;
        let viewer = token(&state, &auth, "viewer", "viewer", None).await;
        let app = app!(state, auth);
        issue_batch!(app, &admin, "B-1", 100);

        let req = test::TestRequest::post()
            .uri("/api/v1/cnc/bulk-add/")
            .insert_header(bearer(&forging))
            .set_json(json!({"rows": [forging_row("B-1", 1)]}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/api/v1/forging/bulk-add/")
            .insert_header(bearer(&viewer))
            .set_json(json!({"rows": [forging_row("B-1", 1)]}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/api/v1/batches/")
            .insert_header(bearer(&forging))
            .set_json(json!({"batch_id": "B-2", "component": "SHAFT", "max_qty": 10}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/api/v1/batch_remaining_qty/painting/?batch_id=B-1")
            .insert_header(bearer(&forging))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/v1/batch_remaining_qty/forging/?batch_id=B-404")
            .insert_header(bearer(&forging))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "not_found");
        assert_eq!(body["field"], "batch_id");
    }

    #[actix_rt::test]
    async fn test_sequence_children_and_tags() {
        let (state, auth) = setup().await;
        let admin = token(&state, &auth, "admin", "admin", None).await;
        let cnc = token(&state, &auth, "cnc-op", "operator", Some(Department::Cnc)).await;
        let app = app!(state, auth);
        issue_batch!(app, &admin, "B-1", 100);

        let req = test::TestRequest::get()
            .uri("/api/v1/process_sequence/cnc/")
            .insert_header(bearer(&cnc))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["current"], "machining");
        assert_eq!(body["data"]["allowed_next"], json!(["final_inspection", "marking", "visual", "dispatch"]));

        for child in ["SHAFT-R", "SHAFT-L"] {
            let req = test::TestRequest::post()
                .uri("/api/v1/child_components/")
                .insert_header(bearer(&admin))
                .set_json(json!({"parent_component": "SHAFT", "child_component": child}))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get()
            .uri("/api/v1/get_child_components/?parent_component=SHAFT")
            .insert_header(bearer(&cnc))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"], json!(["SHAFT-L", "SHAFT-R"]));

        let req = test::TestRequest::get()
            .uri("/api/v1/issuebatch/suggestions/?q=B-")
            .insert_header(bearer(&cnc))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"], json!([{"batch_id": "B-1"}]));

        let tag = |next: &str| json!({"tags": [{
            "batch_id": "B-1",
            "component": "SHAFT-L",
            "current_process": "machining",
            "next_process": next,
            "qty": 4,
            "status": "ok"
        }]});

        let req = test::TestRequest::post()
            .uri("/api/v1/tags/")
            .insert_header(bearer(&cnc))
            .set_json(tag("heat_treatment"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["errors"][0]["code"], "invalid_transition");

        let req = test::TestRequest::post()
            .uri("/api/v1/tags/")
            .insert_header(bearer(&cnc))
            .set_json(tag("final_inspection"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    fn client_row(batch_id: &str, quantity: f64) -> ProductionEntry {
        ProductionEntry {
            batch_id: batch_id.to_string(),
            component: None,
            date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            shift: "B".to_string(),
            quantity_produced: quantity,
            status: ProductionStatus::Ok,
            verified_by: None,
            next_process: Some(Process::HeatTreatment),
            measurements: json!({}),
        }
    }

    #[actix_rt::test]
    async fn test_client_against_running_server() {
        let (state, auth) = setup().await;
        let admin = token(&state, &auth, "admin", "admin", None).await;
        let forging = token(&state, &auth, "forge-op", "operator", Some(Department::Forging)).await;
        state
            .store
            .create_batch(
                &crate::models::CreateBatchRequest {
                    batch_id: "B-7".to_string(),
                    component: "SHAFT".to_string(),
                    grade: Some("EN8".to_string()),
                    heat_no: Some("H-9".to_string()),
                    customer: None,
                    supplier: None,
                    max_qty: 50,
                    slug_weight: None,
                },
                "admin",
            )
            .await
            .unwrap();

        let (server_state, server_auth) = (state.clone(), auth.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(server_state.clone()))
                .app_data(web::Data::new(server_auth.clone()))
                .configure(configure)
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        let base = format!("http://{}", addr);
        let client = Arc::new(LedgerClient::new(Duration::from_secs(5)).unwrap());
        let ctx = RequestContext::new(base.as_str()).with_token(forging);

        let details = client.batch_details(&ctx, "B-7").await.unwrap();
        assert_eq!(details.heat_no.as_deref(), Some("H-9"));

        let err = client.batch_details(&ctx, "B-404").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "batch", .. }));

        let mut session = EntrySession::new(
            client.clone(),
            ctx.clone(),
            Department::Forging,
            Process::Forging,
            &TolerancePolicy::none(),
        )
        .unwrap();
        session.select_batch("B-7").await.unwrap();
        assert_eq!(session.remaining(), Some(50));

        session.add_row(client_row("", 30.0));
        assert_eq!(session.submit().await.unwrap(), Some(1));
        assert_eq!(session.remaining(), Some(20));

        // the server re-checks what the form let through
        let err = client.bulk_add(&ctx, Process::Forging, &[client_row("B-7", 21.0)]).await.unwrap_err();
        match err {
            LedgerError::RowsRejected(rows) => assert_eq!(rows[0].code, "quantity_exceeded"),
            other => panic!("unexpected {:?}", other),
        }

        // admin records at any stage through the stage's own URLs
        let admin_ctx = RequestContext::new(base.as_str()).with_token(admin);
        let mut admin_session = EntrySession::new(
            client.clone(),
            admin_ctx.clone(),
            Department::Admin,
            Process::Forging,
            &TolerancePolicy::none(),
        )
        .unwrap();
        admin_session.select_batch("B-7").await.unwrap();
        assert_eq!(admin_session.remaining(), Some(20));
        admin_session.add_row(client_row("", 5.0));
        assert_eq!(admin_session.submit().await.unwrap(), Some(1));
        assert_eq!(admin_session.remaining(), Some(15));

        let remaining = client
            .remaining(&admin_ctx, Process::HeatTreatment, "B-7", None)
            .await
            .unwrap();
        assert_eq!(remaining.remaining_qty, 35);

        handle.stop(true).await;
    }
}
