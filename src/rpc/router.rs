//! JSON-RPC 2.0 dispatcher.
//!
//! `RpcRouter` turns a request body into a response, whatever happens in
//! between: malformed JSON, unknown methods, bad params and device failures
//! all end as a well-formed error response carrying the caller's `id`. It has
//! no HTTP dependency; [`crate::routes::rpc`] is the axum adapter.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::RpcError;
use super::methods::{self, Method};
use super::params;
use super::types::{RpcRequest, RpcResponse};
use crate::device::DeviceApi;

/// Stateless JSON-RPC router over a [`DeviceApi`].
#[derive(Clone)]
pub struct RpcRouter {
    device: Arc<dyn DeviceApi>,
    member_fetch_concurrency: usize,
}

impl RpcRouter {
    /// Create a router. `member_fetch_concurrency` bounds the number of pool
    /// member lookups in flight during `bigip.get_pools`.
    pub fn new(device: Arc<dyn DeviceApi>, member_fetch_concurrency: usize) -> Self {
        Self {
            device,
            member_fetch_concurrency: member_fetch_concurrency.max(1),
        }
    }

    /// Handle a raw request body.
    pub async fn handle_body(&self, body: &[u8]) -> RpcResponse {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => RpcError::Parse(e.to_string()).to_response(Value::Null),
        }
    }

    /// Handle an already-parsed JSON value.
    ///
    /// Only non-object bodies are invalid requests. An object without a string
    /// `method` is answered like any other unknown method, and the `jsonrpc`
    /// member is not checked.
    pub async fn handle_value(&self, value: Value) -> RpcResponse {
        let Value::Object(envelope) = &value else {
            let reason = if value.is_array() {
                "batch requests are not supported"
            } else {
                "request must be a JSON object"
            };
            return RpcError::InvalidRequest(reason.into()).to_response(Value::Null);
        };

        // Recover the id first so every error below stays correlatable.
        let id = envelope.get("id").cloned().unwrap_or(Value::Null);
        match envelope.get("method") {
            Some(Value::String(_)) => {}
            Some(other) => return RpcError::MethodNotFound(other.to_string()).to_response(id),
            None => return RpcError::MethodNotFound("(none)".into()).to_response(id),
        }

        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => RpcError::InvalidRequest(e.to_string()).to_response(id),
        }
    }

    /// Dispatch a parsed request to its method handler.
    pub async fn dispatch(&self, req: RpcRequest) -> RpcResponse {
        let RpcRequest {
            id, method, params, ..
        } = req;
        let id = id.unwrap_or(Value::Null);

        let span = info_span!("rpc", %method, request_id = %Uuid::new_v4());
        async move {
            let started = Instant::now();
            let outcome = self.route(&method, params).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match outcome {
                Ok(result) => {
                    info!(elapsed_ms, "rpc ok");
                    RpcResponse::success(id, result)
                }
                Err(err) => {
                    warn!(code = err.code(), error = %err, elapsed_ms, "rpc failed");
                    err.to_response(id)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Route a method call to its handler and return the result as JSON.
    async fn route(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let Some(method) = Method::from_name(method) else {
            return Err(RpcError::MethodNotFound(method.to_string()));
        };
        let device = self.device.as_ref();

        match method {
            // Params are irrelevant here, whatever their shape.
            Method::ListServices => Ok(json!(methods::list_services())),
            Method::RunCommand => {
                let params = params::as_object(params)?;
                Ok(json!(methods::run_command(device, &params).await?))
            }
            Method::GetVirtuals => {
                let params = params::as_object(params)?;
                Ok(json!(methods::get_virtuals(device, &params).await?))
            }
            Method::GetPools => {
                let params = params::as_object(params)?;
                let pools =
                    methods::get_pools(device, &params, self.member_fetch_concurrency).await?;
                Ok(json!(pools))
            }
        }
    }

    /// All supported method names, for discovery.
    pub fn method_names() -> Vec<&'static str> {
        Method::ALL.into_iter().map(Method::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::future::BoxFuture;
    use futures::FutureExt;

    use crate::client::ClientError;
    use crate::device::{Credentials, VirtualServer};

    /// Scripted device that records every call it receives.
    #[derive(Default)]
    struct StubDevice {
        calls: Mutex<Vec<String>>,
        bash_output: String,
        fail_bash: bool,
        virtuals: Vec<VirtualServer>,
        fail_virtuals: bool,
        pools: Vec<String>,
        fail_pool_listing: bool,
        /// Pools absent from this map fail their member lookup.
        members: HashMap<String, Vec<String>>,
        /// Per-pool artificial latency.
        member_delay_ms: HashMap<String, u64>,
    }

    impl StubDevice {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn device_error() -> ClientError {
        ClientError::Device {
            status: 500,
            message: "internal error".into(),
        }
    }

    impl DeviceApi for StubDevice {
        fn run_bash<'a>(
            &'a self,
            creds: &'a Credentials,
            command: &'a str,
        ) -> BoxFuture<'a, Result<String, ClientError>> {
            async move {
                self.record(format!("bash {}@{} {command}", creds.username, creds.host));
                if self.fail_bash {
                    return Err(device_error());
                }
                Ok(self.bash_output.clone())
            }
            .boxed()
        }

        fn list_virtuals<'a>(
            &'a self,
            _creds: &'a Credentials,
        ) -> BoxFuture<'a, Result<Vec<VirtualServer>, ClientError>> {
            async move {
                self.record("virtuals".into());
                if self.fail_virtuals {
                    Err(device_error())
                } else {
                    Ok(self.virtuals.clone())
                }
            }
            .boxed()
        }

        fn list_pool_names<'a>(
            &'a self,
            _creds: &'a Credentials,
        ) -> BoxFuture<'a, Result<Vec<String>, ClientError>> {
            async move {
                self.record("pools".into());
                if self.fail_pool_listing {
                    Err(device_error())
                } else {
                    Ok(self.pools.clone())
                }
            }
            .boxed()
        }

        fn list_pool_members<'a>(
            &'a self,
            _creds: &'a Credentials,
            pool: &'a str,
        ) -> BoxFuture<'a, Result<Vec<String>, ClientError>> {
            async move {
                self.record(format!("members {pool}"));
                if let Some(ms) = self.member_delay_ms.get(pool) {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                self.members.get(pool).cloned().ok_or_else(device_error)
            }
            .boxed()
        }
    }

    fn router(stub: &Arc<StubDevice>) -> RpcRouter {
        RpcRouter::new(stub.clone(), 1)
    }

    fn creds() -> Value {
        json!({"host": "10.1.1.245", "username": "admin", "password": "secret"})
    }

    fn request(method: &str, params: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params})
    }

    fn error_code(resp: &RpcResponse) -> Option<i64> {
        resp.error_object().map(|e| e.code)
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let stub = Arc::new(StubDevice::default());
        for name in ["bigip.run_tmsh", "tools/list", "", "mcp.list_services "] {
            let resp = router(&stub).handle_value(request(name, creds())).await;
            assert_eq!(error_code(&resp), Some(-32601), "method {name:?}");
            assert!(resp.result().is_none());
        }
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_params_never_reach_device() {
        let stub = Arc::new(StubDevice::default());
        let full = json!({
            "host": "10.1.1.245",
            "username": "admin",
            "password": "secret",
            "command": "tmsh show sys version",
        });
        let cases: [(&str, &[&str]); 3] = [
            ("bigip.run_command", &["host", "username", "password", "command"]),
            ("bigip.get_virtuals", &["host", "username", "password"]),
            ("bigip.get_pools", &["host", "username", "password"]),
        ];

        for (method, required) in cases {
            for field in required {
                let mut params = full.clone();
                params.as_object_mut().unwrap().remove(*field);
                let resp = router(&stub).handle_value(request(method, params)).await;
                let err = resp.error_object().expect("error response");
                assert_eq!(err.code, -32602, "{method} without {field}");
                assert!(err.message.contains(field), "{}", err.message);

                let mut params = full.clone();
                params[*field] = json!("");
                let resp = router(&stub).handle_value(request(method, params)).await;
                assert_eq!(error_code(&resp), Some(-32602), "{method} with empty {field}");
            }

            let resp = router(&stub).handle_value(request(method, json!({}))).await;
            assert_eq!(error_code(&resp), Some(-32602));
        }
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn non_object_params_are_invalid_for_device_methods() {
        let stub = Arc::new(StubDevice::default());
        let resp = router(&stub)
            .handle_value(request("bigip.get_pools", json!(["10.1.1.245"])))
            .await;
        assert_eq!(error_code(&resp), Some(-32602));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn list_services_ignores_params() {
        let stub = Arc::new(StubDevice::default());
        for params in [json!({}), creds(), json!([1, 2]), Value::Null] {
            let resp = router(&stub)
                .handle_value(request("mcp.list_services", params))
                .await;
            assert_eq!(resp.result(), Some(&json!(["bigip"])));
        }
        let resp = router(&stub)
            .handle_value(json!({"jsonrpc": "2.0", "id": 1, "method": "mcp.list_services"}))
            .await;
        assert_eq!(resp.result(), Some(&json!(["bigip"])));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn run_command_output_is_verbatim() {
        let stub = Arc::new(StubDevice {
            bash_output: "hi\n".into(),
            ..StubDevice::default()
        });
        let mut params = creds();
        params["command"] = json!("echo hi");

        let resp = router(&stub)
            .handle_value(request("bigip.run_command", params))
            .await;
        assert_eq!(resp.result(), Some(&json!({"output": "hi\n"})));
        assert_eq!(stub.calls(), vec!["bash admin@10.1.1.245 echo hi"]);
    }

    #[tokio::test]
    async fn get_virtuals_returns_projection() {
        let stub = Arc::new(StubDevice {
            virtuals: vec![VirtualServer {
                name: "vs_http".into(),
                destination: Some("/Common/10.1.10.100:80".into()),
            }],
            ..StubDevice::default()
        });
        let resp = router(&stub)
            .handle_value(request("bigip.get_virtuals", creds()))
            .await;
        assert_eq!(
            resp.result(),
            Some(&json!([{"name": "vs_http", "destination": "/Common/10.1.10.100:80"}]))
        );
    }

    #[tokio::test]
    async fn run_command_device_failure_is_upstream_error() {
        let stub = Arc::new(StubDevice {
            fail_bash: true,
            ..StubDevice::default()
        });
        let mut params = creds();
        params["command"] = json!("tmsh show sys version");
        let resp = router(&stub)
            .handle_value(request("bigip.run_command", params))
            .await;
        let err = resp.error_object().expect("error response");
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "Device error (HTTP 500): internal error");
        assert!(resp.result().is_none());
        assert_eq!(resp.id, json!(1));
    }

    #[tokio::test]
    async fn concurrent_requests_do_not_affect_each_other() {
        let stub = Arc::new(StubDevice {
            fail_virtuals: true,
            pools: vec!["web-pool".into()],
            members: HashMap::from([("web-pool".to_string(), vec!["10.0.0.1:80".to_string()])]),
            member_delay_ms: HashMap::from([("web-pool".to_string(), 20)]),
            ..StubDevice::default()
        });
        let rpc = router(&stub);

        let (virtuals, services, pools) = tokio::join!(
            rpc.handle_value(json!({"jsonrpc": "2.0", "id": "v", "method": "bigip.get_virtuals", "params": creds()})),
            rpc.handle_value(json!({"jsonrpc": "2.0", "id": "s", "method": "mcp.list_services"})),
            rpc.handle_value(json!({"jsonrpc": "2.0", "id": "p", "method": "bigip.get_pools", "params": creds()})),
        );

        assert_eq!(virtuals.id, json!("v"));
        assert_eq!(error_code(&virtuals), Some(-32000));

        assert_eq!(services.id, json!("s"));
        assert_eq!(services.result(), Some(&json!(["bigip"])));

        assert_eq!(pools.id, json!("p"));
        assert_eq!(
            pools.result(),
            Some(&json!([{"pool": "web-pool", "members": ["10.0.0.1:80"]}]))
        );
    }

    #[tokio::test]
    async fn get_virtuals_device_failure_is_upstream_error() {
        let stub = Arc::new(StubDevice {
            fail_virtuals: true,
            ..StubDevice::default()
        });
        let resp = router(&stub)
            .handle_value(request("bigip.get_virtuals", creds()))
            .await;
        let err = resp.error_object().expect("error response");
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "Device error (HTTP 500): internal error");
        assert!(resp.result().is_none());
    }

    #[tokio::test]
    async fn get_pools_tolerates_member_failures() {
        let stub = Arc::new(StubDevice {
            pools: vec!["web-pool".into(), "api-pool".into()],
            members: HashMap::from([(
                "web-pool".to_string(),
                vec!["10.0.0.1:80".to_string(), "10.0.0.2:80".to_string()],
            )]),
            ..StubDevice::default()
        });
        let resp = router(&stub)
            .handle_value(request("bigip.get_pools", creds()))
            .await;

        assert!(resp.error_object().is_none());
        assert_eq!(
            resp.result(),
            Some(&json!([
                {"pool": "web-pool", "members": ["10.0.0.1:80", "10.0.0.2:80"]},
                {"pool": "api-pool", "members": []},
            ]))
        );
        assert_eq!(
            stub.calls(),
            vec!["pools", "members web-pool", "members api-pool"]
        );
    }

    #[tokio::test]
    async fn get_pools_listing_failure_aborts() {
        let stub = Arc::new(StubDevice {
            fail_pool_listing: true,
            ..StubDevice::default()
        });
        let resp = router(&stub)
            .handle_value(request("bigip.get_pools", creds()))
            .await;
        assert_eq!(error_code(&resp), Some(-32000));
        assert_eq!(stub.calls(), vec!["pools"]);
    }

    #[tokio::test]
    async fn parallel_member_fetch_keeps_pool_order() {
        let pools = ["p1", "p2", "p3", "p4"];
        let stub = Arc::new(StubDevice {
            pools: pools.iter().map(ToString::to_string).collect(),
            members: pools
                .iter()
                .filter(|p| **p != "p3")
                .map(|p| (p.to_string(), vec![format!("{p}-m1")]))
                .collect(),
            // Earlier pools answer last.
            member_delay_ms: pools
                .iter()
                .enumerate()
                .map(|(i, p)| (p.to_string(), (40 - 10 * i) as u64))
                .collect(),
            ..StubDevice::default()
        });
        let resp = RpcRouter::new(stub.clone(), 4)
            .handle_value(request("bigip.get_pools", creds()))
            .await;
        assert_eq!(
            resp.result(),
            Some(&json!([
                {"pool": "p1", "members": ["p1-m1"]},
                {"pool": "p2", "members": ["p2-m1"]},
                {"pool": "p3", "members": []},
                {"pool": "p4", "members": ["p4-m1"]},
            ]))
        );
    }

    #[tokio::test]
    async fn id_is_echoed_verbatim() {
        let stub = Arc::new(StubDevice::default());
        for id in [json!(42), json!("req-7"), Value::Null, json!(1.5), json!({"k": [1]})] {
            for method in ["mcp.list_services", "no.such_method", "bigip.get_pools"] {
                let resp = router(&stub)
                    .handle_value(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": {}}))
                    .await;
                assert_eq!(resp.id, id, "{method}");
            }
        }
    }

    #[tokio::test]
    async fn absent_id_answers_with_null() {
        let stub = Arc::new(StubDevice::default());
        let resp = router(&stub)
            .handle_value(json!({"jsonrpc": "2.0", "method": "mcp.list_services"}))
            .await;
        assert_eq!(resp.id, Value::Null);
        assert!(resp.result().is_some());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let stub = Arc::new(StubDevice::default());
        let resp = router(&stub).handle_body(b"{\"jsonrpc\": \"2.0\", ").await;
        assert_eq!(error_code(&resp), Some(-32700));
        assert_eq!(resp.id, Value::Null);
    }

    #[tokio::test]
    async fn non_object_bodies_are_invalid_request() {
        let stub = Arc::new(StubDevice::default());

        let resp = router(&stub)
            .handle_value(json!([{"jsonrpc": "2.0", "id": 1, "method": "mcp.list_services"}]))
            .await;
        assert_eq!(error_code(&resp), Some(-32600));
        assert_eq!(resp.id, Value::Null);

        let resp = router(&stub).handle_value(json!("mcp.list_services")).await;
        assert_eq!(error_code(&resp), Some(-32600));
    }

    #[tokio::test]
    async fn missing_or_non_string_method_is_method_not_found() {
        let stub = Arc::new(StubDevice::default());
        let envelopes = [
            json!({"jsonrpc": "2.0", "id": 3}),
            json!({"jsonrpc": "2.0", "id": 3, "method": null}),
            json!({"jsonrpc": "2.0", "id": 3, "method": 7}),
            json!({"jsonrpc": "2.0", "id": 3, "method": ["bigip.get_pools"], "params": creds()}),
        ];
        for envelope in envelopes {
            let resp = router(&stub).handle_value(envelope.clone()).await;
            assert_eq!(error_code(&resp), Some(-32601), "{envelope}");
            assert_eq!(resp.id, json!(3));
            assert!(resp.result().is_none());
        }
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn jsonrpc_member_is_not_checked() {
        let stub = Arc::new(StubDevice::default());
        for version in [json!("1.0"), json!(2), Value::Null] {
            let resp = router(&stub)
                .handle_value(json!({"jsonrpc": version, "id": 6, "method": "mcp.list_services"}))
                .await;
            assert_eq!(resp.result(), Some(&json!(["bigip"])), "jsonrpc {version}");
            assert_eq!(resp.id, json!(6));
        }
    }

    #[test]
    fn method_names_lists_closed_set() {
        assert_eq!(
            RpcRouter::method_names(),
            vec![
                "mcp.list_services",
                "bigip.run_command",
                "bigip.get_virtuals",
                "bigip.get_pools",
            ]
        );
    }
}
