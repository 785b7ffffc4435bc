use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flagdeck_cli::cancel::{Cancellation, CancellationSource};
use flagdeck_cli::commands::{command_tree, descriptors};
use flagdeck_cli::error::{EXIT_ERROR, EXIT_OK};
use flagdeck_cli::output::BufferedOutput;
use flagdeck_cli::pipeline::{
    DEFAULT_MAX_ATTEMPTS, OutboundRequest, RetryPolicy, Transport, TransportError,
    TransportResponse,
};
use flagdeck_cli::{Runtime, run_with};
use flagdeck_config::{CliConfig, Credential, MemoryConfigProvider};
use httpmock::prelude::*;
use reqwest::StatusCode;
use serde_json::json;

fn authenticated(server: &MockServer) -> Arc<MemoryConfigProvider> {
    Arc::new(MemoryConfigProvider::new(CliConfig {
        api_host: server.base_url(),
        auth: Some(Credential::new("alice", "secret")),
    }))
}

#[tokio::test]
async fn create_tag_posts_pascal_case_payload() {
    let server = MockServer::start_async().await;
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/products/p1/tags")
            .header("authorization", "Basic YWxpY2U6c2VjcmV0")
            .header("content-type", "application/json")
            .json_body(json!({"Name": "Beta", "Color": "#ff0000"}));
        then.status(201)
            .json_body(json!({"tagId": 11, "name": "Beta", "color": "#ff0000"}));
    });
    let output = Arc::new(BufferedOutput::new());
    let runtime = Runtime::new(output.clone(), authenticated(&server));

    let code = run_with(
        [
            "flagdeck",
            "tag",
            "create",
            "--product-id",
            "p1",
            "--name",
            "Beta",
            "--color",
            "#ff0000",
        ],
        &runtime,
        &Cancellation::never(),
    )
    .await;

    assert_eq!(code, EXIT_OK, "stderr: {}", output.stderr());
    create.assert_calls(1);
    assert_eq!(output.stdout(), "Creating Tag... Ok.\n11\n");
}

#[tokio::test]
async fn delete_tag_exhausts_retries_on_server_errors() {
    let server = MockServer::start_async().await;
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/v1/tags/42");
        then.status(500);
    });
    let output = Arc::new(BufferedOutput::new());
    let runtime = Runtime::new(output.clone(), authenticated(&server))
        .with_retry(RetryPolicy::immediate(DEFAULT_MAX_ATTEMPTS));

    let code = run_with(
        ["flagdeck", "tag", "rm", "--tag-id", "42"],
        &runtime,
        &Cancellation::never(),
    )
    .await;

    assert_eq!(code, EXIT_ERROR);
    delete.assert_calls(3);
    assert_eq!(output.stdout(), "Deleting Tag... Failed.\n");
    assert_eq!(
        output.stderr(),
        "Http request failed: 500 Internal Server Error.\n"
    );
}

#[tokio::test]
async fn missing_credential_stops_before_any_request() {
    let server = MockServer::start_async().await;
    let lookup = server.mock(|when, then| {
        when.method(GET).path("/v1/tags/7");
        then.status(200)
            .json_body(json!({"tagId": 7, "name": "Beta"}));
    });
    let update = server.mock(|when, then| {
        when.method(PUT).path("/v1/tags/7");
        then.status(200);
    });
    let output = Arc::new(BufferedOutput::new());
    let config = Arc::new(MemoryConfigProvider::new(CliConfig {
        api_host: server.base_url(),
        auth: None,
    }));
    let runtime = Runtime::new(output.clone(), config);

    let code = run_with(
        ["flagdeck", "tag", "update", "--tag-id", "7", "--name", "Gamma"],
        &runtime,
        &Cancellation::never(),
    )
    .await;

    assert_eq!(code, EXIT_ERROR);
    lookup.assert_calls(0);
    update.assert_calls(0);
    assert!(output.stdout().is_empty());
    assert!(output.stderr().starts_with("No credential configured."));
}

#[tokio::test]
async fn verbose_errors_include_problem_detail() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v1/tags/9");
        then.status(404)
            .json_body(json!({"title": "Not Found", "detail": "Tag 9 does not exist."}));
    });
    let output = Arc::new(BufferedOutput::new());
    let runtime = Runtime::new(output.clone(), authenticated(&server));

    let code = run_with(
        ["flagdeck", "-v", "tag", "update", "--tag-id", "9", "--name", "Gamma"],
        &runtime,
        &Cancellation::never(),
    )
    .await;

    assert_eq!(code, EXIT_ERROR);
    assert_eq!(
        output.stderr(),
        "Http request failed: 404 Not Found.\nTag 9 does not exist.\n"
    );
}

#[test]
fn tree_has_one_node_per_descriptor() {
    let tree = command_tree().expect("valid tree");
    assert_eq!(tree.len(), descriptors().len());
    assert_eq!(tree.paths().first().map(String::as_str), Some("flagdeck"));
}

/// Transport replaying a fixed list of statuses and recording every body.
struct ScriptedTransport {
    statuses: Mutex<Vec<u16>>,
    bodies: Mutex<Vec<Option<Vec<u8>>>>,
}

impl ScriptedTransport {
    fn new(mut statuses: Vec<u16>) -> Self {
        statuses.reverse();
        Self {
            statuses: Mutex::new(statuses),
            bodies: Mutex::new(Vec::new()),
        }
    }

    fn bodies(&self) -> Vec<Option<Vec<u8>>> {
        self.bodies.lock().expect("bodies lock").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.bodies.lock().expect("bodies lock").push(request.body);
        let status = self
            .statuses
            .lock()
            .expect("statuses lock")
            .pop()
            .ok_or_else(|| TransportError::new("script exhausted"))?;
        let body = if status < 300 {
            br#"{"tagId": 11, "name": "Beta", "color": null}"#.to_vec()
        } else {
            Vec::new()
        };
        Ok(TransportResponse {
            status: StatusCode::from_u16(status).expect("valid status"),
            body,
        })
    }
}

#[tokio::test]
async fn retries_replay_identical_bodies() {
    let transport = Arc::new(ScriptedTransport::new(vec![503, 502, 201]));
    let output = Arc::new(BufferedOutput::new());
    let runtime = Runtime::new(
        output.clone(),
        Arc::new(MemoryConfigProvider::new(CliConfig {
            api_host: "https://api.example.com".into(),
            auth: Some(Credential::new("alice", "secret")),
        })),
    )
    .with_retry(RetryPolicy::immediate(DEFAULT_MAX_ATTEMPTS))
    .with_transport(transport.clone());

    let code = run_with(
        ["flagdeck", "t", "cr", "-p", "p1", "-n", "Beta"],
        &runtime,
        &Cancellation::never(),
    )
    .await;

    assert_eq!(code, EXIT_OK, "stderr: {}", output.stderr());
    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 3);
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    let sent: serde_json::Value =
        serde_json::from_slice(bodies[0].as_deref().expect("body")).expect("json body");
    assert_eq!(sent, json!({"Name": "Beta", "Color": null}));
}

#[tokio::test]
async fn cancelled_invocation_reports_terminated() {
    let transport = Arc::new(ScriptedTransport::new(vec![200]));
    let output = Arc::new(BufferedOutput::new());
    let runtime = Runtime::new(
        output.clone(),
        Arc::new(MemoryConfigProvider::new(CliConfig {
            api_host: "https://api.example.com".into(),
            auth: Some(Credential::new("alice", "secret")),
        })),
    )
    .with_transport(transport.clone());
    let source = CancellationSource::new();
    source.cancel();

    let code = run_with(["flagdeck", "tag", "ls"], &runtime, &source.signal()).await;

    assert_eq!(code, EXIT_ERROR);
    assert!(transport.bodies().is_empty());
    assert_eq!(output.stderr(), "Terminated.\n");
}
