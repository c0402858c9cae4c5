//! A small order service wired together from every crate: configuration,
//! pipeline, observation and the generated document.

use std::sync::{Arc, Mutex};

use daedalus::prelude::*;
use daedalus_test::{TestRequest, TestResponse};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize, Serialize)]
struct NewOrder {
    sku: String,
    quantity: u32,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct Order {
    id: String,
    sku: String,
    quantity: u32,
}

impl Describe for NewOrder {
    fn describe() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("Sku", FieldType::String)
                .tags_from(r#"json:"sku" validate:"required,len=8""#),
            FieldDescriptor::new("Quantity", FieldType::Integer)
                .tags_from(r#"json:"quantity" validate:"gte=1,lte=100""#),
        ]
    }
}

impl Describe for Order {
    fn describe() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("ID", FieldType::String).tags_from(r#"json:"id" validate:"uuid""#),
            FieldDescriptor::new("Sku", FieldType::String).tags_from(r#"json:"sku""#),
            FieldDescriptor::new("Quantity", FieldType::Integer).tags_from(r#"json:"quantity""#),
        ]
    }
}

fn create_order() -> Endpoint<NewOrder, Order> {
    Endpoint::bind(
        EndpointSpec::builder("createOrder", Method::POST, "/orders")
            .tag("orders")
            .success_status(StatusCode::CREATED)
            .error(errors::conflict())
            .with_scopes(["orders:write"]),
        |_ctx: RequestContext, input: NewOrder| async move {
            if input.sku == "SOLD-OUT" {
                return Err(errors::conflict().with_message("sku sold out").into());
            }
            anyhow::Ok(Order {
                id: "0192f4e8-0000-7000-8000-000000000001".to_string(),
                sku: input.sku,
                quantity: input.quantity,
            })
        },
    )
}

fn writer() -> CallerIdentity {
    CallerIdentity::new("u-1").with_scopes(["orders:write"])
}

fn pipeline(seen: Arc<Mutex<Vec<String>>>) -> RequestPipeline {
    let config = ConfigLoader::new()
        .with_string("[pipeline]\nvalidate_output = true\n", "toml")
        .unwrap()
        .with_env_prefix("DAEDALUS")
        .with_env_vars([("DAEDALUS_PIPELINE_DEFAULT_HEADERS", "x-service=orders")])
        .load()
        .unwrap();

    RequestPipeline::new(config.pipeline_config().unwrap())
        .with_observer(TracingObserver::new().with_metrics(false))
        .with_observer(move |_endpoint: &str, signal: &Signal| {
            seen.lock().unwrap().push(signal.name().to_string());
        })
}

#[tokio::test]
async fn test_configured_pipeline_serves_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let request = TestRequest::post("/orders")
        .json(&json!({"sku": "ABCD-123", "quantity": 2}))
        .identity(writer())
        .build()
        .unwrap();

    let served = pipeline(Arc::clone(&seen)).serve(&create_order(), request).await;
    let (response, failure) = served.into_parts();
    assert!(failure.is_none());

    let response = TestResponse::from_http(response).await.unwrap();
    response
        .assert_status(StatusCode::CREATED)
        .assert_header("x-service", "orders");
    let order: Order = response.json().unwrap();
    assert_eq!(order.sku, "ABCD-123");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().map(String::as_str), Some("params_bound"));
    assert_eq!(seen.last().map(String::as_str), Some("response_written"));
}

#[tokio::test]
async fn test_declared_conflict_and_missing_scope() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(Arc::clone(&seen));

    let request = TestRequest::post("/orders")
        .json(&json!({"sku": "SOLD-OUT", "quantity": 1}))
        .identity(writer())
        .build()
        .unwrap();
    let response = TestResponse::from_http(pipeline.serve(&create_order(), request).await.response)
        .await
        .unwrap();
    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_code("CONFLICT");
    assert!(response.header("x-service").is_none());

    let request = TestRequest::post("/orders")
        .json(&json!({"sku": "ABCD-123", "quantity": 1}))
        .identity(CallerIdentity::new("u-2"))
        .build()
        .unwrap();
    let response = TestResponse::from_http(pipeline.serve(&create_order(), request).await.response)
        .await
        .unwrap();
    response.assert_status(StatusCode::FORBIDDEN);
}

#[test]
fn test_document_from_bound_endpoints() {
    let scanner = StaticScanner::new().register::<NewOrder>().register::<Order>();
    let specs = [create_order().spec().clone()];

    let json = DocumentBuilder::new("Orders", "1.0.0")
        .bearer_auth("bearer")
        .build_json(&specs, &scanner)
        .unwrap();
    let doc: Value = serde_json::from_str(&json).unwrap();

    let new_order = &doc["components"]["schemas"]["NewOrder"];
    assert_eq!(new_order["properties"]["sku"]["minLength"], 8);
    assert_eq!(new_order["properties"]["sku"]["maxLength"], 8);
    assert_eq!(new_order["properties"]["quantity"]["minimum"], 1.0);
    assert_eq!(new_order["properties"]["quantity"]["maximum"], 100.0);

    let op = &doc["paths"]["/orders"]["post"];
    assert_eq!(op["operationId"], "createOrder");
    assert!(op["responses"]["201"].is_object());
    assert!(op["responses"]["409"].is_object());
    assert_eq!(op["security"], json!([{"bearer": ["orders:write"]}]));
}
