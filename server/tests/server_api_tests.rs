use pretty_assertions::assert_eq;
use quickapi_api::HttpConfig;
use quickapi_db::Database;
use quickapi_server::{build_app, demo};
use serde_json::{json, Value};

/// Spin up the demo app on an OS-assigned port, returning the base URL.
async fn spawn_test_server() -> String {
    let db = Database::open_in_memory().unwrap();
    let app = build_app(&db, &demo::entities(), HttpConfig::default()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

async fn send(req: reqwest::RequestBuilder) -> (u16, Value) {
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    let bytes = resp.bytes().await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_ann(client: &reqwest::Client, base: &str) -> Value {
    let (status, body) = send(client.post(format!("{base}/persons")).json(&json!({
        "name": "Ann",
        "age": 30,
        "pets": [
            {"name": "Rex", "alive": true},
            {"name": "Tom", "alive": false}
        ]
    })))
    .await;
    assert_eq!(status, 201);
    body
}

// ── Persons ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_person_with_pets() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();
    let ann = create_ann(&client, &base).await;

    assert_eq!(ann["id"], 1);
    assert!(ann["cas"].as_i64().is_some());
    let pets = ann["pets"].as_array().unwrap();
    assert_eq!(pets.len(), 2);
    assert_eq!(pets[0]["person_id"], 1);
}

#[tokio::test]
async fn person_validation_is_400() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let (status, _) = send(client.post(format!("{base}/persons")).json(&json!({"name": "", "age": 3}))).await;
    assert_eq!(status, 400);

    let (status, _) = send(client.post(format!("{base}/persons")).json(&json!({"name": "Bo", "age": -3}))).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn preload_aliases_select_pets() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();
    create_ann(&client, &base).await;

    let (_, plain) = send(client.get(format!("{base}/persons/1")).query(&[("preload[plain]", "1")])).await;
    assert_eq!(plain["pets"].as_array().unwrap().len(), 2);

    let (_, alive) = send(client.get(format!("{base}/persons/1")).query(&[("preload[status]", "true")])).await;
    let alive = alive["pets"].as_array().unwrap();
    assert_eq!(alive.len(), 1);
    assert_eq!(alive[0]["name"], "Rex");

    let (_, named) = send(client.get(format!("{base}/persons/1")).query(&[("preload[naming]", "Tom")])).await;
    assert_eq!(named["pets"][0]["name"], "Tom");

    let (_, bare) = send(client.get(format!("{base}/persons/1"))).await;
    assert!(bare.get("pets").is_none());
}

#[tokio::test]
async fn version_filter_guards_writes() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();
    let ann = create_ann(&client, &base).await;
    let cas = ann["cas"].as_i64().unwrap().to_string();

    let (status, patched) = send(
        client
            .patch(format!("{base}/persons/1"))
            .query(&[("version[cas]", cas.as_str())])
            .json(&json!({"age": 31})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(patched["age"], 31);
    assert_ne!(patched["cas"].as_i64().unwrap().to_string(), cas);

    let (status, _) = send(
        client
            .patch(format!("{base}/persons/1"))
            .query(&[("version[cas]", cas.as_str())])
            .json(&json!({"age": 32})),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn deleting_person_removes_pets() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();
    create_ann(&client, &base).await;

    let (status, _) = send(client.delete(format!("{base}/persons/1"))).await;
    assert_eq!(status, 200);

    let (_, pets) = send(client.get(format!("{base}/pets"))).await;
    assert_eq!(pets, json!([]));
}

// ── Pets & notes ─────────────────────────────────────────────────

#[tokio::test]
async fn pets_scenario() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let (status, rex) = send(client.post(format!("{base}/pets")).json(&json!({"name": "Rex", "alive": true}))).await;
    assert_eq!(status, 201);
    assert_eq!(rex, json!({"id": 1, "name": "Rex", "alive": true, "person_id": null}));

    let (_, found) = send(client.get(format!("{base}/pets")).query(&[("where[alive]", "true")])).await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    send(client.patch(format!("{base}/pets/1")).json(&json!({"alive": false}))).await;
    let (_, read) = send(client.get(format!("{base}/pets/1"))).await;
    assert_eq!(read["alive"], false);
    assert_eq!(read["name"], "Rex");
}

#[tokio::test]
async fn notes_scenario() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let (_, created) = send(client.post(format!("{base}/notes")).json(&json!({"title": "x"}))).await;
    let t0 = created["updated"].as_i64().unwrap();
    assert_eq!(created["created"], created["updated"]);

    send(client.patch(format!("{base}/notes/1")).json(&json!({"title": "y"}))).await;
    let (_, read) = send(client.get(format!("{base}/notes/1"))).await;
    assert_eq!(read["data"], json!({"title": "y"}));
    assert!(read["updated"].as_i64().unwrap() > t0);
}

#[tokio::test]
async fn discover_lists_demo_entities() {
    let base = spawn_test_server().await;
    let (status, body) = send(reqwest::Client::new().get(format!("{base}/_discover"))).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"entities": ["persons", "pets", "notes"]}));
}
