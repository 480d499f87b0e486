use std::sync::Arc;

use editorial_importer::auth::{AuthConfig, AuthState, Role};
use editorial_importer::board::RawCard;
use editorial_importer::import::ImportMappings;
use editorial_importer::routes::import::{ImportContext, import_board, preview_import};
use editorial_importer::test_support::TestRocketBuilder;
use editorial_importer::test_support::memory::{MemoryBoard, MemorySink, StaticLookups, card};
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;
use rocket::routes;
use serde_json::{Value, json};
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "test-import-secret";
const BRIEF_LIST: &str = "66f358dc6c4988996773f6d8";
const DRAFT_LIST: &str = "66f358e065cc3ec20689f1be";

fn auth_state() -> AuthState {
    let config = AuthConfig {
        issuer: "https://editorial.test".into(),
        audience: "editorial-api".into(),
        access_token_ttl_secs: 900,
        jwt_secret: TEST_JWT_SECRET.into(),
        jwt_kid: Some("test-kid".into()),
    };
    AuthState::from_config(config).expect("auth state")
}

fn bearer(state: &AuthState, role: Role) -> Header<'static> {
    let token = state
        .jwt_service
        .issue_access_token(Uuid::new_v4(), &format!("{}@example.com", role.as_str()), role)
        .expect("issue token");
    Header::new("Authorization", format!("Bearer {}", token.token))
}

fn cards() -> Vec<RawCard> {
    vec![
        card("c-1", BRIEF_LIST, "Best hearing aids 2025", ""),
        card("c-2", DRAFT_LIST, "Battery drain guide", "**Slug:** battery-drain"),
        card("c-3", "unmapped", "Someday", ""),
    ]
}

fn client_with(board: MemoryBoard, sink: Arc<MemorySink>) -> (Client, AuthState) {
    let state = auth_state();
    let context = ImportContext {
        board: Arc::new(board),
        lookups: Arc::new(StaticLookups::seeded(&[])),
        sink,
        mappings: Arc::new(ImportMappings::default()),
        default_board_id: "board".into(),
    };

    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![import_board, preview_import])
        .manage_import_context(context)
        .manage_auth_state(state.clone())
        .blocking_client();

    (client, state)
}

fn client(sink: Arc<MemorySink>) -> (Client, AuthState) {
    client_with(MemoryBoard::with_cards(cards()), sink)
}

#[test]
fn import_requires_a_bearer_token() {
    let sink = Arc::new(MemorySink::new());
    let (client, _) = client(sink.clone());

    let response = client.post("/api/v1/import/board").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(sink.write_count(), 0);
}

#[test]
fn invalid_token_is_unauthorized() {
    let (client, _) = client(Arc::new(MemorySink::new()));

    let response = client
        .post("/api/v1/import/board")
        .header(Header::new("Authorization", "Bearer not-a-jwt"))
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn non_admin_is_forbidden() {
    let sink = Arc::new(MemorySink::new());
    let (client, state) = client(sink.clone());

    for role in [Role::Editor, Role::Author] {
        let response = client
            .post("/api/v1/import/board")
            .header(bearer(&state, role))
            .dispatch();
        assert_eq!(response.status(), Status::Forbidden);
    }
    assert_eq!(sink.write_count(), 0);
}

#[test]
fn admin_dry_run_reports_without_writing() {
    let sink = Arc::new(MemorySink::new());
    let (client, state) = client(sink.clone());

    let response = client
        .post("/api/v1/import/board")
        .header(bearer(&state, Role::Admin))
        .header(ContentType::JSON)
        .body(json!({ "dryRun": true }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["dryRun"], true);
    assert_eq!(body["summary"]["totalCards"], 3);
    assert_eq!(body["summary"]["imported"], 2);
    assert_eq!(body["summary"]["skipped"], 1);
    assert_eq!(body["summary"]["errors"], 0);
    assert_eq!(body["results"][0]["entityId"], -1);
    assert_eq!(body["results"][2]["skipReason"], "List not mapped");
    assert_eq!(sink.write_count(), 0);
}

#[test]
fn admin_import_without_body_uses_defaults() {
    let sink = Arc::new(MemorySink::new());
    let (client, state) = client(sink.clone());

    let response = client
        .post("/api/v1/import/board")
        .header(bearer(&state, Role::Admin))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["dryRun"], false);
    assert_eq!(body["summary"]["imported"], 2);
    assert_eq!(sink.rows().len(), 2);

    // skipExisting defaults to true, so a repeat run inserts nothing.
    let repeat: Value = client
        .post("/api/v1/import/board")
        .header(bearer(&state, Role::Admin))
        .header(ContentType::JSON)
        .body("{}")
        .dispatch()
        .into_json()
        .expect("json body");
    assert_eq!(repeat["summary"]["skipped"], 3);
    assert_eq!(sink.rows().len(), 2);
}

#[test]
fn malformed_dry_run_body_is_rejected_without_writing() {
    let sink = Arc::new(MemorySink::new());
    let (client, state) = client(sink.clone());

    let response = client
        .post("/api/v1/import/board")
        .header(bearer(&state, Role::Admin))
        .header(ContentType::JSON)
        .body(json!({ "dryRun": true, "listFilter": BRIEF_LIST }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["error"], "BadRequest");
    assert_eq!(sink.write_count(), 0);

    let truncated = client
        .post("/api/v1/import/board")
        .header(bearer(&state, Role::Admin))
        .header(ContentType::JSON)
        .body(r#"{"dryRun": tru"#)
        .dispatch();
    assert_eq!(truncated.status(), Status::BadRequest);
    assert_eq!(sink.write_count(), 0);
}

#[test]
fn list_filter_is_honored() {
    let sink = Arc::new(MemorySink::new());
    let (client, state) = client(sink.clone());

    let body: Value = client
        .post("/api/v1/import/board")
        .header(bearer(&state, Role::Admin))
        .header(ContentType::JSON)
        .body(json!({ "listFilter": [DRAFT_LIST] }).to_string())
        .dispatch()
        .into_json()
        .expect("json body");

    assert_eq!(body["summary"]["totalCards"], 1);
    assert_eq!(body["results"][0]["cardId"], "c-2");
    assert_eq!(body["results"][0]["stage"], "content");
}

#[test]
fn preview_counts_would_import_and_would_skip() {
    let sink = Arc::new(MemorySink::new());
    let (client, state) = client(sink.clone());

    let response = client
        .get("/api/v1/import/board/preview")
        .header(bearer(&state, Role::Admin))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["summary"]["totalCards"], 3);
    assert_eq!(body["summary"]["wouldImport"], 2);
    assert_eq!(body["summary"]["wouldSkip"], 1);
    assert_eq!(sink.write_count(), 0);
}

#[test]
fn board_failure_maps_to_bad_gateway() {
    let sink = Arc::new(MemorySink::new());
    let (client, state) = client_with(MemoryBoard::failing(503), sink.clone());

    let response = client
        .post("/api/v1/import/board")
        .header(bearer(&state, Role::Admin))
        .dispatch();
    assert_eq!(response.status(), Status::BadGateway);

    let body: Value = response.into_json().expect("json body");
    assert_eq!(body["error"], "UpstreamError");
    assert_eq!(sink.write_count(), 0);
}
