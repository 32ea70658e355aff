//! End-to-end tests driving the router in-process.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use waybill_server::{create_server, AppState};

fn app() -> Router {
    create_server(AppState::in_memory().unwrap())
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_zone(app: &Router) -> String {
    let (status, zone) = call(
        app,
        Method::POST,
        "/zones",
        Some(json!({
            "name": "north",
            "coordinates": [37.6, 55.7, 37.7, 55.8],
            "created_by": "dispatcher"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    zone["id"].as_str().unwrap().to_string()
}

fn order_body(zone_id: Option<&str>) -> Value {
    let mut body = json!({
        "customer_id": "6f1c2b1e-41f7-4c43-9a1e-0b6c1b8f6a01",
        "courier_id": "0d3e9c7a-5b2f-4d7e-8c1a-2f4b6d8e0a12",
        "delivery_date": "2026-10-20T09:00:00Z",
        "description": "two boxes",
        "created_by": "dispatcher"
    });
    if let Some(zone_id) = zone_id {
        body["delivery"] = json!({
            "zone_id": zone_id,
            "longitude": 37.62,
            "latitude": 55.75
        });
    }
    body
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["versioned"], json!(["Delivery", "Order"]));
}

#[tokio::test]
async fn test_order_lifecycle_with_history() {
    let app = app();
    let zone_id = create_zone(&app).await;

    let (status, created) = call(&app, Method::POST, "/orders", Some(order_body(Some(&zone_id)))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "not_delivered");
    assert_eq!(created["delivery"]["zone_id"], zone_id.as_str());

    let (status, updated) = call(
        &app,
        Method::PUT,
        &format!("/orders/{}", id),
        Some(json!({ "status": "delivering", "updated_by": "courier-7" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "delivering");
    assert_eq!(updated["updated_by"], "courier-7");

    let (status, history) = call(&app, Method::GET, &format!("/orders/{}/history", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let versions: Vec<_> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|r| (r["version"].as_u64().unwrap(), r["operation"].as_str().unwrap().to_string()))
        .collect();
    assert_eq!(
        versions,
        vec![(1, "INSERT".to_string()), (2, "UPDATE".to_string())]
    );
    assert_eq!(history[0]["end_transaction_id"], history[1]["transaction_id"]);

    let (_, latest) = call(&app, Method::GET, &format!("/orders/{}/history/latest", id), None).await;
    assert_eq!(latest["version"], 2);
    assert_eq!(latest["attributes"]["status"], "delivering");

    let (_, first) = call(&app, Method::GET, &format!("/orders/{}/history/1", id), None).await;
    assert_eq!(first["attributes"]["status"], "not_delivered");

    let (status, _) = call(&app, Method::GET, &format!("/orders/{}/history/9", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_order_cascades_in_one_transaction() {
    let app = app();
    let zone_id = create_zone(&app).await;
    let (_, created) = call(&app, Method::POST, "/orders", Some(order_body(Some(&zone_id)))).await;
    let id = created["id"].as_str().unwrap().to_string();
    let delivery_id = created["delivery"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::DELETE, &format!("/orders/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::GET, &format!("/orders/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::GET, &format!("/deliveries/{}", delivery_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, tombstone) = call(&app, Method::GET, &format!("/orders/{}/history/latest", id), None).await;
    assert_eq!(tombstone["operation"], "DELETE");

    let tx = tombstone["transaction_id"].as_i64().unwrap();
    let (status, unit) = call(&app, Method::GET, &format!("/transactions/{}", tx), None).await;
    assert_eq!(status, StatusCode::OK);
    let changes = unit["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().any(|r| r["entity_id"] == delivery_id.as_str()));
}

#[tokio::test]
async fn test_validation_and_not_found() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/orders",
        Some(order_body(Some("8a0f5c8e-7d1b-4b8e-9f0a-3c2d1e0f9b77"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["zone_id"].is_string());

    let (_, orders) = call(&app, Method::GET, "/orders", None).await;
    assert_eq!(orders, json!([]));

    let (status, _) = call(
        &app,
        Method::PUT,
        "/zones/8a0f5c8e-7d1b-4b8e-9f0a-3c2d1e0f9b77",
        Some(json!({ "name": "south", "updated_by": "dispatcher" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::GET, "/transactions/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zones_paginate_without_history() {
    let app = app();
    for _ in 0..3 {
        create_zone(&app).await;
    }

    let (_, page) = call(&app, Method::GET, "/zones?number=1&size=2", None).await;
    assert_eq!(page.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::GET, "/zones/some-id/history", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn create_order(app: &Router, zone_id: Option<&str>) -> Value {
    let (status, order) = call(app, Method::POST, "/orders", Some(order_body(zone_id))).await;
    assert_eq!(status, StatusCode::CREATED);
    order
}

fn delivery_body(order_id: &str, zone_id: &str) -> Value {
    json!({
        "order_id": order_id,
        "zone_id": zone_id,
        "longitude": 37.62,
        "latitude": 55.75,
        "created_by": "dispatcher"
    })
}

#[tokio::test]
async fn test_delivery_references_are_checked() {
    let app = app();
    let zone_id = create_zone(&app).await;
    let order = create_order(&app, None).await;
    let order_id = order["id"].as_str().unwrap();
    let missing = "8a0f5c8e-7d1b-4b8e-9f0a-3c2d1e0f9b77";

    let (status, body) = call(&app, Method::POST, "/deliveries", Some(delivery_body(missing, &zone_id))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["details"]["order_id"].is_string());

    let (status, body) = call(&app, Method::POST, "/deliveries", Some(delivery_body(order_id, missing))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["details"]["zone_id"].is_string());

    let (status, _) = call(&app, Method::POST, "/deliveries", Some(delivery_body(order_id, &zone_id))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::POST, "/deliveries", Some(delivery_body(order_id, &zone_id))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["details"]["code"], "CONFLICT_003");

    let (_, deliveries) = call(&app, Method::GET, "/deliveries", None).await;
    assert_eq!(deliveries.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_zone_in_use_cannot_be_deleted() {
    let app = app();
    let zone_id = create_zone(&app).await;
    let order = create_order(&app, Some(&zone_id)).await;

    let (status, body) = call(&app, Method::DELETE, &format!("/zones/{}", zone_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["details"]["code"], "CONFLICT_003");
    let (status, _) = call(&app, Method::GET, &format!("/zones/{}", zone_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::DELETE, &format!("/orders/{}", order["id"].as_str().unwrap()), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::DELETE, &format!("/zones/{}", zone_id), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_page_beyond_range_is_empty() {
    let app = app();
    create_zone(&app).await;

    let uri = format!("/zones?number={}&size=2", usize::MAX);
    let (status, page) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, json!([]));
}
