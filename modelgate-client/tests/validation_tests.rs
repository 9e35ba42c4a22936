//! Validation client against an in-process serving runtime.

use std::io::Write;

use modelgate_client::{ClientError, RawEndpoint, ValidationClient};
use modelgate_config::{
    InferenceConfiguration, ModelDescriptor, ModelInferenceStep, ModelType, Schema, ServingConfig,
    TensorType, TransformDefinition, TransformStep,
};
use modelgate_runtime::{launch, LaunchOptions};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn transform_config(port: u16) -> InferenceConfiguration {
    let schema = Schema::builder().string_column("first").build().unwrap();
    let transform = TransformDefinition::builder()
        .append_string("first", "two")
        .build()
        .unwrap();
    InferenceConfiguration::builder()
        .transform_step(TransformStep::new(schema.clone(), transform, schema).unwrap())
        .serving(ServingConfig::builder().http_port(port).build().unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn post_json_returns_transformed_body() {
    let port = free_port();
    let server = launch(LaunchOptions::from_config(transform_config(port)))
        .await
        .unwrap();

    let client = ValidationClient::new(port);
    let body = client
        .post_json(&serde_json::json!({ "first": "value" }))
        .await
        .unwrap();

    assert!(!body.is_empty());
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["first"], "valuetwo");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn post_tensor_files_round_trips() {
    let mut artifact = tempfile::NamedTempFile::new().unwrap();
    artifact.write_all(b"network weights").unwrap();

    let model = ModelDescriptor::builder()
        .loading_path(artifact.path())
        .model_type(ModelType::MultiLayerNetwork)
        .input("image_array", TensorType::Float)
        .output("output")
        .build()
        .unwrap();
    let port = free_port();
    let config = InferenceConfiguration::builder()
        .model_step(ModelInferenceStep::new(model, 1).unwrap())
        .serving(ServingConfig::builder().http_port(port).build().unwrap())
        .build()
        .unwrap();
    let server = launch(LaunchOptions::from_config(config)).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let sample = dir.path().join("sample.bin");
    std::fs::write(&sample, [1u8, 2, 3, 4]).unwrap();

    let client = ValidationClient::new(port);
    let body = client
        .post_tensor_files(RawEndpoint::Nd4j, &[("image_array".to_string(), sample)])
        .await
        .unwrap();

    assert!(!body.is_empty());
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(parsed["output"].is_string());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn bad_request_surfaces_as_status_error() {
    let port = free_port();
    let server = launch(LaunchOptions::from_config(transform_config(port)))
        .await
        .unwrap();

    let client = ValidationClient::new(port);
    let err = client
        .post_json(&serde_json::json!({ "wrong": "field" }))
        .await
        .unwrap_err();

    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("first"));
        }
        other => panic!("expected status error, got {other}"),
    }

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreachable_server_surfaces_as_request_error() {
    let port = free_port();
    // Nothing listens on the port.
    let client = ValidationClient::new(port);
    let err = client
        .post_json(&serde_json::json!({ "first": "value" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Request { .. }));
}

#[tokio::test]
async fn health_probe() {
    let port = free_port();
    let server = launch(LaunchOptions::from_config(transform_config(port)))
        .await
        .unwrap();

    let client = ValidationClient::new(port);
    assert_eq!(client.health().await.unwrap(), "OK");

    server.shutdown().await.unwrap();
}
