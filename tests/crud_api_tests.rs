//! HTTP-level tests of the CRUD handlers over the demo schema
//!
//! JSON → HTTP request → handler → InMemoryStore → HTTP response → JSON.

use axum::http::StatusCode;
use axum_test::TestServer;
use crud::config::{CrudConfig, EntityConfig};
use crud::entities::demo;
use crud::prelude::*;
use serde_json::{Value, json};

fn demo_server_with(config: CrudConfig) -> TestServer {
    let schema = Arc::new(demo::schema().unwrap());
    let app = ServerBuilder::new()
        .with_schema(schema.clone())
        .with_store(InMemoryStore::new(schema))
        .with_config(config)
        .build()
        .unwrap();
    TestServer::new(app)
}

fn demo_server() -> TestServer {
    demo_server_with(CrudConfig::default_config())
}

async fn create_user(server: &TestServer, name: &str) -> i64 {
    let response = server
        .post("/users")
        .json(&json!({"name": name, "age": 30}))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn create_pet(server: &TestServer, name: &str, age: i64, owner: i64) -> Value {
    let response = server
        .post("/pets")
        .json(&json!({"name": name, "age": age, "owner": owner}))
        .await;
    response.assert_status_ok();
    response.json()
}

// ==============================================================
// Health
// ==============================================================

#[tokio::test]
async fn test_health_route() {
    let server = demo_server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({"status": "ok", "service": "crud-rs"}));
}

// ==============================================================
// Create
// ==============================================================

#[tokio::test]
async fn test_create_pet() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;

    let body = create_pet(&server, "Kuro", 3, owner).await;

    assert_eq!(body["id"], 1);
    assert_eq!(body["name"], "Kuro");
    assert_eq!(body["age"], 3);
    // Relations are not expanded unless grouped in
    assert_eq!(body["edges"], json!({}));
    assert!(body.get("owner").is_none());
}

#[tokio::test]
async fn test_create_reports_every_violation() {
    let server = demo_server();

    let response = server
        .post("/pets")
        .json(&json!({"name": "Bob", "age": -2}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({
        "code": 400,
        "status": "Bad Request",
        "errors": {"age": "gt:0 violated", "owner": "required"}
    }));
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let server = demo_server();

    for body in ["{\"name\": ", "[1, 2]", "42", ""] {
        let response = server.post("/pets").text(body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["errors"], "invalid json string");
    }
}

#[tokio::test]
async fn test_create_rejects_mistyped_field() {
    let server = demo_server();

    let response = server
        .post("/pets")
        .json(&json!({"name": "Kuro", "age": "three", "owner": 1}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["errors"]["age"].is_string());
}

#[tokio::test]
async fn test_create_with_unknown_owner() {
    let server = demo_server();

    let response = server
        .post("/pets")
        .json(&json!({"name": "Kuro", "age": 3, "owner": 7}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errors"], "user 7 does not exist");
}

#[tokio::test]
async fn test_create_ignores_unknown_keys() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;

    let response = server
        .post("/pets")
        .json(&json!({"name": "Kuro", "age": 3, "owner": owner, "color": "black"}))
        .await;

    response.assert_status_ok();
    assert!(response.json::<Value>().get("color").is_none());
}

// ==============================================================
// Read
// ==============================================================

#[tokio::test]
async fn test_read_after_create_returns_same_body() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    let created = create_pet(&server, "Kuro", 3, owner).await;

    let response = server.get("/pets/1").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), created);
}

#[tokio::test]
async fn test_read_user_expands_pets() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    create_pet(&server, "Kuro", 3, owner).await;
    create_pet(&server, "Luna", 5, owner).await;

    let response = server.get(&format!("/users/{}", owner)).await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "id": 1,
        "name": "Ariel",
        "age": 30,
        "edges": {
            "pets": [
                {"id": 1, "name": "Kuro", "age": 3, "edges": {}},
                {"id": 2, "name": "Luna", "age": 5, "edges": {}}
            ]
        }
    }));
}

#[tokio::test]
async fn test_read_not_found() {
    let server = demo_server();

    let response = server.get("/pets/99").await;

    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({
        "code": 404,
        "status": "Not Found",
        "errors": "pet not found"
    }));
}

#[tokio::test]
async fn test_invalid_ids_are_rejected() {
    let server = demo_server();

    for id in ["abc", "0", "-1", "1.5"] {
        let path = format!("/pets/{}", id);
        let expected = json!({
            "code": 400,
            "status": "Bad Request",
            "errors": "id must be an integer greater zero"
        });

        server.get(&path).await.assert_json(&expected);
        server
            .patch(&path)
            .json(&json!({"age": 4}))
            .await
            .assert_json(&expected);
        server.delete(&path).await.assert_json(&expected);
    }
}

// ==============================================================
// Update
// ==============================================================

#[tokio::test]
async fn test_update_is_partial() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    create_pet(&server, "Kuro", 3, owner).await;

    let response = server.patch("/pets/1").json(&json!({"age": 4})).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Kuro");
    assert_eq!(body["age"], 4);
}

#[tokio::test]
async fn test_update_null_clears_nullable_field() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    create_pet(&server, "Kuro", 3, owner).await;

    let response = server.patch("/pets/1").json(&json!({"name": null})).await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], Value::Null);
}

#[tokio::test]
async fn test_update_validates() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    create_pet(&server, "Kuro", 3, owner).await;

    let response = server.patch("/pets/1").json(&json!({"age": 0})).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errors"], json!({"age": "gt:0 violated"}));
}

#[tokio::test]
async fn test_update_moves_pet_between_owners() {
    let server = demo_server();
    let ariel = create_user(&server, "Ariel").await;
    let bob = create_user(&server, "Bob").await;
    create_pet(&server, "Kuro", 3, ariel).await;

    server
        .patch("/pets/1")
        .json(&json!({"owner": bob}))
        .await
        .assert_status_ok();

    let ariel_body: Value = server.get(&format!("/users/{}", ariel)).await.json();
    let bob_body: Value = server.get(&format!("/users/{}", bob)).await.json();
    assert_eq!(ariel_body["edges"]["pets"], json!([]));
    assert_eq!(bob_body["edges"]["pets"][0]["name"], "Kuro");
}

#[tokio::test]
async fn test_update_not_found() {
    let server = demo_server();

    let response = server.patch("/users/5").json(&json!({"name": "Zoe"})).await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["errors"], "user not found");
}

// ==============================================================
// Delete
// ==============================================================

#[tokio::test]
async fn test_delete() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    create_pet(&server, "Kuro", 3, owner).await;

    let response = server.delete("/pets/1").await;
    response.assert_status(StatusCode::NO_CONTENT);
    assert!(response.as_bytes().is_empty());

    server.get("/pets/1").await.assert_status(StatusCode::NOT_FOUND);
    server.delete("/pets/1").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_refused_while_referenced() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    create_pet(&server, "Kuro", 3, owner).await;

    let response = server.delete(&format!("/users/{}", owner)).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    server
        .get(&format!("/users/{}", owner))
        .await
        .assert_status_ok();
}

// ==============================================================
// List
// ==============================================================

#[tokio::test]
async fn test_list() {
    let server = demo_server();
    let owner = create_user(&server, "Ariel").await;
    for (name, age) in [("Kuro", 3), ("Luna", 5), ("Milo", 3), ("Nala", 1)] {
        create_pet(&server, name, age, owner).await;
    }

    let body: Value = server.get("/pets").await.json();
    assert_eq!(body.as_array().unwrap().len(), 4);
    assert_eq!(body[0]["name"], "Kuro");

    let body: Value = server.get("/pets?age=3").await.json();
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Kuro", "Milo"]);

    let body: Value = server.get("/pets?sort=name:desc&limit=2&page=1").await.json();
    assert_eq!(body[0]["name"], "Nala");
    assert_eq!(body[1]["name"], "Milo");

    let body: Value = server.get("/pets?page=3&limit=2").await.json();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_rejects_bad_query() {
    let server = demo_server();

    for query in ["/pets?page=two", "/pets?color=black", "/pets?age=old", "/pets?sort=age:up"] {
        server
            .get(query)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_list_rejects_huge_page() {
    let server = demo_server();
    server.post("/groups").json(&json!({})).await.assert_status_ok();

    let response = server
        .get("/groups?page=18446744073709551615&limit=100")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(
        response.json::<Value>()["errors"]
            .as_str()
            .unwrap()
            .contains("page")
    );

    // Far past the last row, but addressable: just empty
    server
        .get("/groups?page=4294967296&limit=100")
        .await
        .assert_json(&json!([]));
}

#[tokio::test]
async fn test_group_has_only_an_id() {
    let server = demo_server();

    let response = server.post("/groups").json(&json!({})).await;
    response.assert_status_ok();
    response.assert_json(&json!({"id": 1, "edges": {}}));

    server.get("/groups").await.assert_json(&json!([{"id": 1, "edges": {}}]));
}

// ==============================================================
// Route tables
// ==============================================================

#[tokio::test]
async fn test_unselected_operations_are_not_routed() {
    let config = CrudConfig {
        entities: vec![
            EntityConfig::new("user", "/users").with_routes(Routes::CREATE | Routes::READ),
            EntityConfig::new("group", "/groups").with_routes(Routes::LIST),
        ],
        ..Default::default()
    };
    let server = demo_server_with(config);

    server
        .post("/users")
        .json(&json!({"name": "Ariel"}))
        .await
        .assert_status_ok();
    server.get("/users/1").await.assert_status_ok();

    // Path exists, method not selected
    server
        .get("/users")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    server
        .delete("/users/1")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);

    // No operation on the path at all
    server.get("/groups/1").await.assert_status(StatusCode::NOT_FOUND);
    server.get("/groups").await.assert_status_ok();

    // Kind not configured
    server.get("/pets").await.assert_status(StatusCode::NOT_FOUND);
}
