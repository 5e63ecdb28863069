use std::sync::Arc;

use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::test::request;

use food_diary::cache::{LocalCache, MemoryStore, SyncSettings};
use food_diary::diary::{Diary, Remote};
use food_diary::environment::Environment;
use food_diary::routes;
use food_diary::store::mock::{memory_connector, MemoryGrid};

const SERVICE_ACCOUNT: &str = "diary@example.iam.gserviceaccount.com";

struct Server {
    grid: Arc<MemoryGrid>,
    environment: Environment,
}

fn server(sync_enabled: bool) -> Server {
    let logger = Arc::new(log::discard_logger());
    let grid = Arc::new(MemoryGrid::with_id("test-sheet"));
    let cache = LocalCache::new(Arc::new(MemoryStore::new()), logger.clone());

    cache
        .save_settings(&SyncSettings {
            enabled: sync_enabled,
            spreadsheet_id: "test-sheet".to_owned(),
        })
        .expect("save settings");

    let diary = Diary::new(logger.clone(), cache).with_remote(Remote::new(
        memory_connector(grid.clone()),
        Some(SERVICE_ACCOUNT.to_owned()),
    ));

    Server {
        grid,
        environment: Environment::new(logger, Arc::new(diary)),
    }
}

fn breakfast(foods: &str) -> Value {
    json!({
        "date": "2024-01-15",
        "time": "08:30",
        "mealType": "breakfast",
        "foods": foods,
        "hasComplaints": true,
        "complaintTypes": ["nausea"],
        "complaintSeverities": { "nausea": 2 },
    })
}

async fn call(server: &Server, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let api = routes::make_api(server.environment.clone());

    let mut builder = request().method(method).path(path);
    if let Some(body) = body {
        builder = builder.json(&body);
    }

    let response = builder.reply(&api).await;
    let status = response.status();
    let body = serde_json::from_slice(response.body()).expect("parse response body");

    (status, body)
}

#[tokio::test]
async fn entries_can_be_created_edited_and_deleted() {
    let s = server(true);

    let (status, created) = call(&s, "POST", "/entries", Some(breakfast("oatmeal"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["remote"], json!({ "status": "mirrored" }));
    assert_eq!(created["entry"]["foods"], "oatmeal");
    assert_eq!(s.grid.appends().len(), 1);

    let id = created["entry"]["id"].as_str().expect("entry ID").to_owned();

    let mut edited = created["entry"].clone();
    edited["foods"] = json!("oatmeal with honey");
    let (status, body) = call(&s, "PUT", &format!("/entries/{}", id), Some(edited)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["foods"], "oatmeal with honey");
    assert_eq!(s.grid.data_rows()[0][4], "oatmeal with honey");

    let (status, listed) = call(&s, "GET", "/entries?search=HONEY", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, body) = call(&s, "DELETE", &format!("/entries/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": id, "remote": { "status": "mirrored" } }));
    assert!(s.grid.data_rows().is_empty());

    let (_, listed) = call(&s, "GET", "/entries", None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn remote_failures_do_not_undo_local_changes() {
    let s = server(true);
    s.grid.fail_all();

    let (status, created) = call(&s, "POST", "/entries", Some(breakfast("toast"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["remote"]["status"], "failed");

    let (_, listed) = call(&s, "GET", "/entries", None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn invalid_requests_are_explained() {
    let s = server(false);

    let (status, body) = call(&s, "POST", "/entries", Some(breakfast("  "))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "operation": "create", "message": "missing required field foods" })
    );

    let (status, body) = call(&s, "DELETE", "/entries/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["operation"], "delete");
    assert_eq!(body["id"], "missing");

    let (_, created) = call(&s, "POST", "/entries", Some(breakfast("rice"))).await;
    let (status, body) = call(&s, "PUT", "/entries/other", Some(created["entry"].clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["operation"], "edit");

    let (status, body) = call(&s, "POST", "/sync", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "remote sync is disabled");
}

#[tokio::test]
async fn sync_replaces_local_entries_with_remote_ones() {
    let s = server(true);

    call(&s, "POST", "/entries", Some(breakfast("soup"))).await;

    let (status, body) = call(&s, "POST", "/sync", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], json!({ "kind": "remote", "count": 1 }));
    assert_eq!(body["entries"][0]["foods"], "soup");
    assert_eq!(body["entries"][0]["complaintSeverities"], json!({ "nausea": 2 }));
}

#[tokio::test]
async fn settings_accept_spreadsheet_urls() {
    let s = server(false);

    let (status, body) = call(
        &s,
        "PUT",
        "/settings",
        Some(json!({
            "enabled": true,
            "spreadsheetId": "https://docs.google.com/spreadsheets/d/1AbC_d-9/edit#gid=0",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "enabled": true, "spreadsheetId": "1AbC_d-9" }));

    let (_, body) = call(&s, "GET", "/settings", None).await;
    assert_eq!(body["spreadsheetId"], "1AbC_d-9");
}

#[tokio::test]
async fn settings_reject_malformed_spreadsheet_ids() {
    let s = server(false);

    let (status, body) = call(
        &s,
        "PUT",
        "/settings",
        Some(json!({ "enabled": true, "spreadsheetId": "abc#x" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["operation"], "updateSettings");

    let (_, body) = call(&s, "GET", "/settings", None).await;
    assert_eq!(body, json!({ "enabled": false, "spreadsheetId": "test-sheet" }));
}

#[tokio::test]
async fn connection_tests_suggest_sharing_on_permission_errors() {
    let s = server(false);

    let (status, body) = call(&s, "GET", "/connection", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["sheetTitle"], "In-memory grid test-sheet");

    s.grid.fail_with(403, "The caller does not have permission");

    let (_, body) = call(&s, "GET", "/connection", None).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["serviceAccount"], SERVICE_ACCOUNT);
    assert_eq!(
        body["troubleshooting"],
        format!("Share your spreadsheet with this email: {}", SERVICE_ACCOUNT)
    );
}

#[tokio::test]
async fn analytics_are_null_without_entries() {
    let s = server(false);

    let (status, body) = call(&s, "GET", "/analytics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    call(&s, "POST", "/entries", Some(breakfast("eggs"))).await;

    let (_, body) = call(&s, "GET", "/analytics", None).await;
    assert_eq!(body["totalEntries"], 1);
    assert_eq!(body["sortedComplaints"][0]["name"], "Hányinger");
}

#[tokio::test]
async fn reference_tables_are_served() {
    let s = server(false);

    let (_, meals) = call(&s, "GET", "/meal-types", None).await;
    assert_eq!(meals[0], json!({ "id": "breakfast", "label": "Reggeli" }));

    let (_, severities) = call(&s, "GET", "/severity-levels", None).await;
    assert_eq!(severities.as_array().map(Vec::len), Some(4));

    let (_, complaints) = call(&s, "GET", "/complaint-types", None).await;
    assert_eq!(complaints[0]["id"], "nausea");
}

#[tokio::test]
async fn exports_are_csv_attachments() {
    let s = server(false);
    call(&s, "POST", "/entries", Some(breakfast("pancakes, syrup"))).await;

    let api = routes::make_api(s.environment.clone());
    let response = request().method("GET").path("/export").reply(&api).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
    assert!(response.headers()["content-disposition"]
        .to_str()
        .expect("read disposition")
        .contains("etkezesi-naplo-"));
    assert!(response.headers().contains_key("server-timing"));

    let body = String::from_utf8(response.body().to_vec()).expect("decode CSV");
    assert!(body.starts_with("Dátum,Időpont,"));
    assert!(body.contains("\"pancakes, syrup\""));

    let response = request().method("GET").path("/export?format=sheet").reply(&api).await;
    let body = String::from_utf8(response.body().to_vec()).expect("decode CSV");
    assert!(body.starts_with("ID,Dátum,"));
}

#[tokio::test]
async fn healthz_reports_the_version() {
    let s = server(false);
    let route = routes::admin::make_healthz_route(s.environment.clone());

    let response = request().method("GET").path("/healthz").reply(&route).await;
    let body: Value = serde_json::from_slice(response.body()).expect("parse healthz");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["version"], info::VERSION);
}
