//! End-to-end tests of the HTTP surface.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use hostdb::api::{create_router, state::ApiState, DEFAULT_REQUEST_TIMEOUT};
use hostdb::auth::TokenStore;
use hostdb::config::TokenConfig;
use hostdb::model::{Annotation, Machine, NetworkInterface, RemotePower, SerialConsole};
use hostdb::storage::{RedbRepository, ResourceRepository};
use hostdb::virt::{BackendRegistry, VirtualizationBackend};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const ROOT: &str = "Token root-token";
const USER: &str = "Token user-token";
const CSCREEN: &str = "cscreen.example.com";

struct FakeBackend {
    fail: bool,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl VirtualizationBackend for FakeBackend {
    fn kind(&self) -> &str {
        "libvirt"
    }

    fn decommission(&self, machine: &Machine) -> hostdb::Result<()> {
        std::thread::sleep(self.delay);
        self.calls.lock().unwrap().push(machine.fqdn.clone());
        if self.fail {
            return Err(hostdb::Error::Backend {
                backend: "libvirt".into(),
                reason: "domain is locked".into(),
            });
        }
        Ok(())
    }
}

struct TestServer {
    _dir: TempDir,
    repository: Arc<RedbRepository>,
    backend: Option<Arc<FakeBackend>>,
    app: Router,
}

impl TestServer {
    fn new() -> Self {
        Self::build(None, DEFAULT_REQUEST_TIMEOUT)
    }

    fn with_backend(fail: bool) -> Self {
        Self::build(Some(fake_backend(fail, Duration::ZERO)), DEFAULT_REQUEST_TIMEOUT)
    }

    fn build(backend: Option<Arc<FakeBackend>>, request_timeout: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(RedbRepository::open(dir.path().join("hostdb.redb")).unwrap());

        let mut backends = BackendRegistry::new();
        if let Some(backend) = &backend {
            backends.register(backend.clone()).unwrap();
        }

        let tokens = TokenStore::new(&[
            TokenConfig {
                token: "root-token".into(),
                username: "admin".into(),
                superuser: true,
            },
            TokenConfig {
                token: "user-token".into(),
                username: "alice".into(),
                superuser: false,
            },
        ]);

        let state = Arc::new(ApiState::new(repository.clone(), backends, tokens));
        let app = create_router(state, request_timeout);

        Self {
            _dir: dir,
            repository,
            backend,
            app,
        }
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, token);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: impl Into<Body>) -> (StatusCode, Value) {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, token);
        }
        self.send(request.body(body.into()).unwrap()).await
    }

    async fn delete(&self, item: &str, fqdn: &str) -> (StatusCode, Value) {
        let body = json!({ "form": { "fqdn": fqdn } }).to_string();
        self.post(&format!("/{}/delete", item), Some(ROOT), body).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn fake_backend(fail: bool, delay: Duration) -> Arc<FakeBackend> {
    Arc::new(FakeBackend {
        fail,
        delay,
        calls: Mutex::new(Vec::new()),
    })
}

fn seed_guest(repo: &RedbRepository) {
    repo.put_machine(&Machine::new("hv01.example.com").with_virtualization_api("libvirt"))
        .unwrap();
    repo.put_machine(&Machine::new_virtual("vm01.example.com", "hv01.example.com"))
        .unwrap();
}

fn rows(table: &Value) -> Vec<(String, u64)> {
    assert_eq!(table["type"], "TABLE", "not a table: {}", table);
    table["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| {
            (
                row["objects"].as_str().unwrap().to_string(),
                row["count"].as_u64().unwrap(),
            )
        })
        .collect()
}

fn assert_error(value: &Value, kind: &str) {
    assert_eq!(value["type"], "ERROR", "{}", value);
    assert_eq!(value["kind"], kind, "{}", value);
}

#[tokio::test]
async fn test_dispatch_redirects_to_item() {
    let server = TestServer::new();

    for (args, location) in [
        ("machine", "/machine/delete"),
        ("SerialConsole", "/serialconsole/delete"),
        ("%20remotepower%20", "/remotepower/delete"),
    ] {
        let response = server
            .app
            .clone()
            .oneshot(
                Request::get(format!("/delete?args={}", args))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{}", args);
        assert_eq!(response.headers()[header::LOCATION], location, "{}", args);
    }
}

#[tokio::test]
async fn test_dispatch_errors() {
    let server = TestServer::new();

    let cases = [
        ("/delete", "MISSING_ARGUMENT", "Item is missing!"),
        ("/delete?args=", "MISSING_ARGUMENT", "Item is missing!"),
        ("/delete?args=bogus", "UNKNOWN_ITEM", "Unknown item 'bogus'!"),
        (
            "/delete?args=machine%20host01",
            "INVALID_ARGUMENT_COUNT",
            "Invalid number of arguments for 'machine'!",
        ),
    ];

    for (uri, kind, message) in cases {
        let (status, body) = server.get(uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_error(&body, kind);
        assert_eq!(body["message"], message, "{}", uri);
    }
}

#[tokio::test]
async fn test_describe_requires_superuser() {
    let server = TestServer::new();

    for item in ["machine", "serialconsole", "remotepower"] {
        let uri = format!("/{}/delete", item);

        let (status, body) = server.get(&uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"type": "AUTH_REQUIRED", "message": "Authentication required!"}));

        let (status, body) = server.get(&uri, Some("Token unknown")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], "AUTH_REQUIRED");

        let (status, body) = server.get(&uri, Some(USER)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_error(&body, "FORBIDDEN");
        assert_eq!(
            body["message"],
            "Only superusers are allowed to perform this action!"
        );

        let (status, body) = server.get(&uri, Some(ROOT)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "INPUT");
        assert_eq!(body["url"], uri);
        assert_eq!(body["order"], json!(["fqdn"]));
        assert_eq!(body["fields"][0]["key"], "fqdn");
        assert_eq!(body["fields"][0]["required"], true);
        assert_eq!(body["fields"][0]["max_length"], 200);
    }
}

#[tokio::test]
async fn test_describe_has_no_side_effects() {
    let server = TestServer::new();
    server
        .repository
        .put_machine(&Machine::new("host01.example.com"))
        .unwrap();

    server.get("/machine/delete", Some(ROOT)).await;
    assert!(server
        .repository
        .get_machine("host01.example.com")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_delete_machine_cascades() {
    let server = TestServer::new();
    let repo = &server.repository;
    repo.put_machine(&Machine::new(CSCREEN)).unwrap();
    repo.put_machine(&Machine::new("host01.example.com")).unwrap();
    repo.put_machine(&Machine::new("other.example.com")).unwrap();
    repo.put_serial_console(&SerialConsole::new("host01.example.com", "ipmi", CSCREEN))
        .unwrap();
    repo.put_remote_power(&RemotePower::new("host01.example.com", "ipmilan"))
        .unwrap();
    for mac in ["00:11:22:33:44:55", "00:11:22:33:44:56"] {
        repo.put_network_interface(&NetworkInterface {
            machine: "host01.example.com".into(),
            mac_address: mac.into(),
            primary: false,
        })
        .unwrap();
    }
    repo.put_annotation(&Annotation {
        machine: "host01.example.com".into(),
        text: "retired".into(),
        reporter: "admin".into(),
    })
    .unwrap();

    let (status, body) = server.delete("machine", "HOST01.example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["header"],
        json!([{"objects": "Deleted objects"}, {"count": "#"}])
    );
    assert_eq!(
        rows(&body),
        vec![
            ("Annotation".to_string(), 1),
            ("Machine".to_string(), 1),
            ("NetworkInterface".to_string(), 2),
            ("RemotePower".to_string(), 1),
            ("SerialConsole".to_string(), 1),
        ]
    );

    assert!(repo.get_machine("host01.example.com").unwrap().is_none());
    assert!(repo.get_machine("other.example.com").unwrap().is_some());

    let (status, body) = server.delete("machine", "host01.example.com").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn test_delete_unknown_machine() {
    let server = TestServer::new();

    for item in ["machine", "serialconsole", "remotepower"] {
        let (status, body) = server.delete(item, "ghost.example.com").await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", item);
        assert_error(&body, "NOT_FOUND");
        assert_eq!(body["message"], "Machine 'ghost.example.com' not found!");
    }
}

#[tokio::test]
async fn test_execute_rejections() {
    let server = TestServer::new();
    server
        .repository
        .put_machine(&Machine::new("host01.example.com"))
        .unwrap();
    let valid = json!({"form": {"fqdn": "host01.example.com"}}).to_string();

    // Authentication is checked before the body is looked at.
    let (status, body) = server.post("/machine/delete", None, "not json").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["type"], "AUTH_REQUIRED");

    let (status, body) = server.post("/machine/delete", Some(USER), valid.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "FORBIDDEN");

    let (status, body) = server.post("/machine/delete", Some(ROOT), "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "BAD_REQUEST");

    let (status, body) = server.post("/machine/delete", Some(ROOT), r#"{"form": {}}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "VALIDATION_ERROR");
    assert_eq!(body["message"], "fqdn: This field is required.");

    let (status, body) = server
        .post("/machine/delete", Some(ROOT), r#"{"form": {"fqdn": "host01"}}"#)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "VALIDATION_ERROR");

    // None of the rejected requests touched the record.
    assert!(server
        .repository
        .get_machine("host01.example.com")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_delete_sub_resources() {
    let server = TestServer::new();
    let repo = &server.repository;
    repo.put_machine(&Machine::new(CSCREEN)).unwrap();
    repo.put_machine(&Machine::new("host01.example.com")).unwrap();
    repo.put_serial_console(&SerialConsole::new("host01.example.com", "ipmi", CSCREEN))
        .unwrap();
    repo.put_remote_power(&RemotePower::new("host01.example.com", "ipmilan"))
        .unwrap();

    let (status, body) = server.delete("serialconsole", "host01.example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows(&body), vec![("SerialConsole".to_string(), 1)]);

    let (status, body) = server.delete("serialconsole", "host01.example.com").await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_error(&body, "PRECONDITION_FAILED");
    assert_eq!(body["message"], "Machine has no serial console!");

    let (status, body) = server.delete("remotepower", "host01.example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows(&body), vec![("RemotePower".to_string(), 1)]);

    let (status, body) = server.delete("remotepower", "host01.example.com").await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["message"], "Machine has no remote power!");

    assert!(repo.get_machine("host01.example.com").unwrap().is_some());
}

#[tokio::test]
async fn test_delete_virtual_machine() {
    let server = TestServer::with_backend(false);
    let repo = &server.repository;
    repo.put_machine(&Machine::new("hv01.example.com").with_virtualization_api("libvirt"))
        .unwrap();
    repo.put_machine(&Machine::new_virtual("vm01.example.com", "hv01.example.com"))
        .unwrap();

    let (status, body) = server.delete("machine", "vm01.example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows(&body), vec![("Machine".to_string(), 1)]);

    let backend = server.backend.as_ref().unwrap();
    assert_eq!(*backend.calls.lock().unwrap(), vec!["vm01.example.com"]);
    assert!(repo.get_machine("vm01.example.com").unwrap().is_none());
    assert!(repo.get_machine("hv01.example.com").unwrap().is_some());
}

#[tokio::test]
async fn test_delete_virtual_machine_failures() {
    // Hypervisor without a usable backend.
    let server = TestServer::new();
    server
        .repository
        .put_machine(&Machine::new("hv01.example.com").with_virtualization_api("libvirt"))
        .unwrap();
    server
        .repository
        .put_machine(&Machine::new_virtual("vm01.example.com", "hv01.example.com"))
        .unwrap();

    let (status, body) = server.delete("machine", "vm01.example.com").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_error(&body, "CONFIGURATION_ERROR");
    assert_eq!(body["message"], "No virtualization API found!");
    assert!(server
        .repository
        .get_machine("vm01.example.com")
        .unwrap()
        .is_some());

    // Backend refuses to decommission.
    let server = TestServer::with_backend(true);
    server
        .repository
        .put_machine(&Machine::new("hv01.example.com").with_virtualization_api("libvirt"))
        .unwrap();
    server
        .repository
        .put_machine(&Machine::new_virtual("vm01.example.com", "hv01.example.com"))
        .unwrap();

    let (status, body) = server.delete("machine", "vm01.example.com").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"type": "ERROR", "kind": "INTERNAL_ERROR", "message": "Something went wrong!"})
    );
    assert!(server
        .repository
        .get_machine("vm01.example.com")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_completion_help_and_health() {
    let server = TestServer::new();

    let (status, body) = server.get("/delete/completion", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["machine", "remotepower", "serialconsole"]));

    let (status, body) = server.get("/delete/help", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "delete");
    assert_eq!(body["url"], "/delete");
    assert!(body["help"].as_str().unwrap().contains("DELETE <item> [args*]"));

    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], hostdb::VERSION);
}

#[tokio::test]
async fn test_slow_execute_reports_its_outcome() {
    let server = TestServer::build(
        Some(fake_backend(false, Duration::from_millis(400))),
        Duration::from_millis(100),
    );
    seed_guest(&server.repository);

    let (status, body) = server.delete("machine", "vm01.example.com").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(rows(&body), vec![("Machine".to_string(), 1)]);
    assert!(server
        .repository
        .get_machine("vm01.example.com")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_slow_failing_execute_keeps_record() {
    let server = TestServer::build(
        Some(fake_backend(true, Duration::from_millis(400))),
        Duration::from_millis(100),
    );
    seed_guest(&server.repository);

    let (status, body) = server.delete("machine", "vm01.example.com").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "INTERNAL_ERROR");
    assert!(server
        .repository
        .get_machine("vm01.example.com")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_malformed_query_is_structured() {
    let server = TestServer::new();

    let (status, body) = server.get("/delete?args=machine&args=x", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "BAD_REQUEST");
    assert_eq!(body["message"], "Invalid query string!");
}

#[tokio::test]
async fn test_oversized_body_is_structured() {
    let server = TestServer::new();
    server
        .repository
        .put_machine(&Machine::new("host01.example.com"))
        .unwrap();
    let oversized = format!(
        r#"{{"form": {{"fqdn": "host01.example.com", "pad": "{}"}}}}"#,
        "x".repeat(3 * 1024 * 1024)
    );

    let (status, body) = server.post("/machine/delete", None, oversized.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["type"], "AUTH_REQUIRED");

    let (status, body) = server.post("/machine/delete", Some(ROOT), oversized).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_error(&body, "BAD_REQUEST");
    assert_eq!(body["message"], "Invalid request body!");

    assert!(server
        .repository
        .get_machine("host01.example.com")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_routing_failures_are_structured() {
    let server = TestServer::new();

    let response = server
        .app
        .clone()
        .oneshot(
            Request::put("/machine/delete")
                .header(header::AUTHORIZATION, ROOT)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key(header::ALLOW));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_error(&body, "METHOD_NOT_ALLOWED");

    let (status, body) = server.get("/machines/delete", Some(ROOT)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
    assert_eq!(body["message"], "Unknown path!");
}
