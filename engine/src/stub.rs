//! Helper methods only available for tests: a scripted Kubernetes API
//! server plus mock exec, RNG and clock wiring for the [`Context`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use http::{Request, Response, StatusCode};
use hyper::{body::to_bytes, Body};
use k8s_openapi::api::core::v1::{Namespace, PersistentVolume, Pod};
use k8s_openapi::chrono::{DateTime, TimeZone, Utc};
use kube::Client;
use rand::rngs::mock::StepRng;
use serde::Serialize;
use serde_json::json;

use crate::context::{Clock, Context};
use crate::exec::PodExec;

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// Wraps the mock API server handle; tests script one response per expected
/// request, in order.
///
/// If the code under test makes more calls than the script serves, it sees a
/// closed-service error; await the script's `JoinHandle` through
/// [`timeout_after_1s`] to catch missing calls.
pub struct ApiServerVerifier(ApiServerHandle);

/// Clock pinned to a fixed instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Exec seam returning queued responses instead of dialing a cluster.
#[derive(Default)]
pub struct MockExec {
    responses: Mutex<VecDeque<Result<String>>>,
}

impl MockExec {
    /// Mock that serves exactly one exec response.
    pub fn with_response(response: Result<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([response])),
        }
    }
}

#[async_trait::async_trait]
impl PodExec for MockExec {
    async fn exec(&self, _namespace: &str, pod: &str, _command: &[String]) -> Result<String> {
        self.responses
            .lock()
            .expect("mock exec mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("unexpected exec call for pod {pod}")))
    }
}

// Add test specific implementation to the Context
impl Context<MockExec, StepRng, FixedClock> {
    /// Create a test context with a mocked kube client.
    pub fn test() -> (Arc<Self>, ApiServerVerifier) {
        Self::test_with_exec(MockExec::default())
    }

    /// Create a test context with a mocked kube client and exec seam.
    pub fn test_with_exec(exec_client: MockExec) -> (Arc<Self>, ApiServerVerifier) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let k_client = Client::new(mock_service, "default");
        let cx = Self {
            k_client,
            exec_client,
            rng: Mutex::new(StepRng::new(29, 7)),
            clock: FixedClock(Utc.timestamp_opt(0, 0).unwrap()),
        };
        (Arc::new(cx), ApiServerVerifier(handle))
    }
}

impl ApiServerVerifier {
    /// Serve one request: assert its method and path, respond with `body`.
    pub async fn handle<T: Serialize>(&mut self, method: &str, path: &str, body: &T) -> Result<()> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method().as_str(), method);
        assert_eq!(request.uri().path(), path);
        let _ = to_bytes(request.into_body()).await?;
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(body)?))
                .expect("response should build"),
        );
        Ok(())
    }

    /// Serve one request by echoing its body back, returning the body so the
    /// test can assert on the manifest that was sent.
    pub async fn handle_and_return_body(&mut self, method: &str, path: &str) -> Result<String> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method().as_str(), method);
        assert_eq!(request.uri().path(), path);
        let bytes = to_bytes(request.into_body()).await?;
        let body = String::from_utf8(bytes.to_vec())?;
        send.send_response(
            Response::builder()
                .body(Body::from(bytes))
                .expect("response should build"),
        );
        Ok(body)
    }

    /// Serve one request with a 404 `Status`, the cluster's not-found shape.
    pub async fn handle_not_found(&mut self, method: &str, path: &str) -> Result<()> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method().as_str(), method);
        assert_eq!(request.uri().path(), path);
        let _ = to_bytes(request.into_body()).await?;
        let status = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": format!("{path} not found"),
            "reason": "NotFound",
            "code": 404,
        });
        send.send_response(
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::from(serde_json::to_vec(&status)?))
                .expect("response should build"),
        );
        Ok(())
    }

    /// Serve one list request with the given items.
    pub async fn handle_list<T: Serialize>(
        &mut self,
        method: &str,
        path: &str,
        items: Vec<T>,
    ) -> Result<()> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method().as_str(), method);
        assert_eq!(request.uri().path(), path);
        let _ = to_bytes(request.into_body()).await?;
        let list = json!({
            "apiVersion": "v1",
            "kind": "List",
            "metadata": { "resourceVersion": "" },
            "items": items,
        });
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(&list)?))
                .expect("response should build"),
        );
        Ok(())
    }

    /// Assert the client hangs up without any further request.
    pub async fn expect_no_more_requests(&mut self) {
        assert!(
            self.0.next_request().await.is_none(),
            "unexpected extra request"
        );
    }
}

pub async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("stub succeeded")
}

/// Test-only phase assignment for phase-bearing kinds.
pub trait WithPhase: Sized {
    /// The object with `status.phase` set.
    fn with_phase(self, phase: &str) -> Self;
}

impl WithPhase for Namespace {
    fn with_phase(mut self, phase: &str) -> Self {
        self.status
            .get_or_insert_with(Default::default)
            .phase = Some(phase.to_owned());
        self
    }
}

impl WithPhase for Pod {
    fn with_phase(mut self, phase: &str) -> Self {
        self.status
            .get_or_insert_with(Default::default)
            .phase = Some(phase.to_owned());
        self
    }
}

impl WithPhase for PersistentVolume {
    fn with_phase(mut self, phase: &str) -> Self {
        self.status
            .get_or_insert_with(Default::default)
            .phase = Some(phase.to_owned());
        self
    }
}

/// Free-function form reading better at call sites.
pub fn with_phase<K: WithPhase>(object: K, phase: &str) -> K {
    object.with_phase(phase)
}
