//! API REST sur un vrai socket local

use loginwatch_devkit::{Reply, TestHarness};
use loginwatch_kernel::http::{build_router, AppState};
use serde_json::Value;
use tokio::net::TcpListener;

const KEY: &str = "test-key";

async fn serve(h: &TestHarness, api_key: Option<&str>) -> String {
    let app = build_router(AppState::new(h.watch.clone(), api_key.map(str::to_string)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_health_is_open() {
    let h = TestHarness::new(TestHarness::hosts(1));
    let base = serve(&h, Some(KEY)).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_api_key_required() {
    let h = TestHarness::new(TestHarness::hosts(1));
    let base = serve(&h, Some(KEY)).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/hosts")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client.get(format!("{base}/hosts")).header("x-api-key", "wrong").send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client.get(format!("{base}/hosts")).header("x-api-key", KEY).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_api_closed_without_configured_key() {
    let h = TestHarness::new(TestHarness::hosts(1));
    let base = serve(&h, None).await;

    let resp = reqwest::Client::new()
        .get(format!("{base}/system/health"))
        .header("x-api-key", "")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_refresh_then_read_hosts() {
    let h = TestHarness::new(TestHarness::hosts(2));
    h.prober.set("srv-02", Reply::sessions(&["alice"]));
    let base = serve(&h, Some(KEY)).await;
    let client = reqwest::Client::new();

    let report: Value = client
        .post(format!("{base}/refresh"))
        .header("x-api-key", KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["dirty"], serde_json::json!(["srv-02"]));
    assert_eq!(report["panel"], "no_panel");

    let hosts: Value = client
        .get(format!("{base}/hosts"))
        .header("x-api-key", KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hosts[0]["status"], "free");
    assert_eq!(hosts[1]["status"], "occupied");
    assert_eq!(hosts[1]["last_users"][0], "alice");

    let one = client
        .get(format!("{base}/hosts/srv-02"))
        .header("x-api-key", KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(one.status(), 200);

    let missing = client
        .get(format!("{base}/hosts/nope"))
        .header("x-api-key", KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_create_panel_route() {
    let h = TestHarness::new(TestHarness::hosts(1));
    let base = serve(&h, Some(KEY)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/panel"))
        .header("x-api-key", KEY)
        .json(&serde_json::json!({ "target": "C0PANEL" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let location: Value = resp.json().await.unwrap();
    assert_eq!(location["target"], "C0PANEL");
    assert_eq!(h.sink.posts().len(), 1);

    let panel: Value = client
        .get(format!("{base}/panel"))
        .header("x-api-key", KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(panel["location"]["message_id"], location["message_id"]);
    assert_eq!(panel["payload"]["blocks"][0]["type"], "header");

    let resp = client
        .post(format!("{base}/panel"))
        .header("x-api-key", KEY)
        .json(&serde_json::json!({ "target": " " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    h.sink.fail_posts(true);
    let resp = client
        .post(format!("{base}/panel"))
        .header("x-api-key", KEY)
        .json(&serde_json::json!({ "target": "C0OTHER" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
}
