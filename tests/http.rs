use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct ActivityRecord {
    id: String,
    title: String,
    category: String,
    minutes: u32,
}

#[derive(Debug, Deserialize)]
struct DayLedger {
    total_minutes: u32,
    activities: BTreeMap<String, ActivityRecord>,
}

#[derive(Debug, Deserialize)]
struct DayResponse {
    ledger: Option<DayLedger>,
    remaining_minutes: u32,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
    ledger: DayLedger,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
    remaining_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CategoryTotal {
    category: String,
    minutes: u32,
    share_percent: f64,
}

#[derive(Debug, Deserialize)]
struct DaySummary {
    total_minutes: u32,
    remaining_minutes: u32,
    activity_count: usize,
    categories: Vec<CategoryTotal>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));
static USER_SEQ: AtomicUsize = AtomicUsize::new(0);

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("day_ledger_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

/// Every test works on its own user so they can share one server.
fn unique_user() -> String {
    format!("user-{}", USER_SEQ.fetch_add(1, Ordering::SeqCst))
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/healthz")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_day_ledger"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

fn day_url(server: &TestServer, user: &str, date: &str) -> String {
    format!("{}/api/users/{user}/days/{date}", server.base_url)
}

async fn read_day(client: &Client, server: &TestServer, user: &str, date: &str) -> DayResponse {
    client
        .get(day_url(server, user, date))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn add(
    client: &Client,
    server: &TestServer,
    user: &str,
    date: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/activities", day_url(server, user, date)))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_add_creates_fresh_day() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    let before = read_day(&client, &server, &user, "2024-01-01").await;
    assert!(before.ledger.is_none());
    assert_eq!(before.remaining_minutes, 1440);

    let response = add(
        &client,
        &server,
        &user,
        "2024-01-01",
        serde_json::json!({ "title": "Read", "category": "Leisure", "minutes": 30 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: CreatedResponse = response.json().await.unwrap();
    assert_eq!(created.ledger.total_minutes, 30);

    let day = read_day(&client, &server, &user, "2024-01-01").await;
    let ledger = day.ledger.expect("ledger created");
    assert_eq!(ledger.total_minutes, 30);
    assert_eq!(ledger.activities.len(), 1);
    let activity = &ledger.activities[&created.id];
    assert_eq!(activity.id, created.id);
    assert_eq!(activity.title, "Read");
    assert_eq!(activity.category, "Leisure");
    assert_eq!(activity.minutes, 30);
    assert_eq!(day.remaining_minutes, 1410);
}

#[tokio::test]
async fn http_over_budget_add_is_rejected() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    let response = add(
        &client,
        &server,
        &user,
        "2024-01-02",
        serde_json::json!({ "title": "Work", "minutes": 1400 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = add(
        &client,
        &server,
        &user,
        "2024-01-02",
        serde_json::json!({ "title": "Gym", "minutes": 50 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "budget_exceeded");
    assert_eq!(body.remaining_minutes, Some(40));
    assert_eq!(body.message, "Cannot add. Only 40 minutes left");

    let ledger = read_day(&client, &server, &user, "2024-01-02")
        .await
        .ledger
        .unwrap();
    assert_eq!(ledger.total_minutes, 1400);
    assert_eq!(ledger.activities.len(), 1);
}

#[tokio::test]
async fn http_edit_rechecks_budget() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    add(
        &client,
        &server,
        &user,
        "2024-01-03",
        serde_json::json!({ "title": "Work", "minutes": 1400 }),
    )
    .await;
    let created: CreatedResponse = add(
        &client,
        &server,
        &user,
        "2024-01-03",
        serde_json::json!({ "title": "Walk", "minutes": 30 }),
    )
    .await
    .json()
    .await
    .unwrap();

    let activity_url = format!(
        "{}/activities/{}",
        day_url(&server, &user, "2024-01-03"),
        created.id
    );
    let response = client
        .patch(&activity_url)
        .json(&serde_json::json!({ "minutes": 50 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.remaining_minutes, Some(10));

    let response = client
        .patch(&activity_url)
        .json(&serde_json::json!({ "title": "Long walk", "minutes": 40 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ledger = read_day(&client, &server, &user, "2024-01-03")
        .await
        .ledger
        .unwrap();
    assert_eq!(ledger.total_minutes, 1440);
    assert_eq!(ledger.activities[&created.id].title, "Long walk");
}

#[tokio::test]
async fn http_delete_keeps_empty_day() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    let a: CreatedResponse = add(
        &client,
        &server,
        &user,
        "2024-01-04",
        serde_json::json!({ "title": "A", "minutes": 20 }),
    )
    .await
    .json()
    .await
    .unwrap();
    let b: CreatedResponse = add(
        &client,
        &server,
        &user,
        "2024-01-04",
        serde_json::json!({ "title": "B", "minutes": 30 }),
    )
    .await
    .json()
    .await
    .unwrap();

    for id in [&a.id, &b.id] {
        let response = client
            .delete(format!(
                "{}/activities/{id}",
                day_url(&server, &user, "2024-01-04")
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let day = read_day(&client, &server, &user, "2024-01-04").await;
    let ledger = day.ledger.expect("empty ledger is retained");
    assert_eq!(ledger.total_minutes, 0);
    assert!(ledger.activities.is_empty());

    let response = client
        .delete(format!(
            "{}/activities/{}",
            day_url(&server, &user, "2024-01-04"),
            a.id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_invalid_input_creates_nothing() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    for body in [
        serde_json::json!({ "title": "", "minutes": 30 }),
        serde_json::json!({ "title": "Read", "minutes": 0 }),
        serde_json::json!({ "title": "Read" }),
        serde_json::json!({ "title": "Read", "minutes": "lots" }),
    ] {
        let response = add(&client, &server, &user, "2024-01-05", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.error, "validation");
    }

    assert!(read_day(&client, &server, &user, "2024-01-05")
        .await
        .ledger
        .is_none());
}

#[tokio::test]
async fn http_edit_unknown_day_is_not_found() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    let response = client
        .patch(format!(
            "{}/activities/missing",
            day_url(&server, &user, "2024-01-06")
        ))
        .json(&serde_json::json!({ "minutes": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.message, "No data for day");
}

#[tokio::test]
async fn http_concurrent_adds_admit_only_one() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    let body = serde_json::json!({ "title": "Shift", "minutes": 800 });
    let (first, second) = tokio::join!(
        add(&client, &server, &user, "2024-01-07", body.clone()),
        add(&client, &server, &user, "2024-01-07", body.clone()),
    );

    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();
    assert_eq!(
        statuses,
        vec![StatusCode::CREATED, StatusCode::UNPROCESSABLE_ENTITY]
    );

    let ledger = read_day(&client, &server, &user, "2024-01-07")
        .await
        .ledger
        .unwrap();
    assert_eq!(ledger.total_minutes, 800);
    assert_eq!(ledger.activities.len(), 1);
}

#[tokio::test]
async fn http_summary_breaks_down_categories() {
    let server = shared_server().await;
    let client = Client::new();
    let user = unique_user();

    for body in [
        serde_json::json!({ "title": "Code", "category": "Work", "minutes": 60 }),
        serde_json::json!({ "title": "Review", "category": "Work", "minutes": 30 }),
        serde_json::json!({ "title": "Read", "category": "Leisure", "minutes": 30 }),
    ] {
        let response = add(&client, &server, &user, "2024-01-08", body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let summary: DaySummary = client
        .get(format!("{}/summary", day_url(&server, &user, "2024-01-08")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(summary.total_minutes, 120);
    assert_eq!(summary.remaining_minutes, 1320);
    assert_eq!(summary.activity_count, 3);
    assert_eq!(summary.categories[0].category, "Work");
    assert_eq!(summary.categories[0].minutes, 90);
    assert_eq!(summary.categories[0].share_percent, 75.0);
    assert_eq!(summary.categories[1].category, "Leisure");
}

#[tokio::test]
async fn http_undecodable_path_gets_json_error() {
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/users/%FF/days/2024-01-09", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("application/json"));

    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "validation");
    assert!(body.message.contains("user_id"));
    assert_eq!(body.remaining_minutes, None);
}
