//! Request validation and method dispatch.

use crate::api::FreezerRemoteApi;
use crate::config::ServerConfig;
use ancient_protocol::{
    codes, Method, RpcErrorObject, RpcRequest, RpcResponse, JSONRPC_VERSION,
};
use ancient_store::{AncientEngine, AncientResult, CallContext, RepairReport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Dispatches JSON-RPC requests to a [`FreezerRemoteApi`].
///
/// The server is transport-agnostic: [`handle_line`](Self::handle_line)
/// takes one raw request line and always produces a response, which the
/// listener (or a loopback transport in tests) writes back.
pub struct RpcServer {
    api: FreezerRemoteApi,
    namespace: String,
    request_timeout: Duration,
}

impl RpcServer {
    /// Creates a server for `engine` using the namespace and timeout of
    /// `config`.
    pub fn new(engine: Arc<dyn AncientEngine>, config: &ServerConfig) -> Self {
        Self {
            api: FreezerRemoteApi::new(engine),
            namespace: config.namespace.clone(),
            request_timeout: config.request_timeout,
        }
    }

    /// Returns the facade.
    pub fn api(&self) -> &FreezerRemoteApi {
        &self.api
    }

    /// Returns the method namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Realigns the engine's categories. Run once before serving.
    pub fn repair(&self) -> AncientResult<RepairReport> {
        let report = self.api.engine().repair()?;
        info!(frozen = report.frozen, "engine repaired before serving");
        Ok(report)
    }

    /// Handles one raw request line.
    pub fn handle_line(&self, line: &[u8]) -> RpcResponse {
        self.handle_line_until(line, &CancellationToken::new())
    }

    /// Handles one raw request line, refusing to start engine work once
    /// `cancel` fires.
    pub fn handle_line_until(&self, line: &[u8], cancel: &CancellationToken) -> RpcResponse {
        let value: Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "unparsable request");
                return RpcResponse::failure(None, RpcErrorObject::parse_error(e.to_string()), None);
            }
        };

        let id = value.get("id").and_then(Value::as_u64);
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.handle_request_until(request, cancel),
            Err(e) => RpcResponse::failure(id, RpcErrorObject::invalid_request(e.to_string()), None),
        }
    }

    /// Handles a decoded request.
    pub fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        self.handle_request_until(request, &CancellationToken::new())
    }

    /// Handles a decoded request under `cancel`.
    pub fn handle_request_until(&self, request: RpcRequest, cancel: &CancellationToken) -> RpcResponse {
        let id = request.id;
        if request.jsonrpc != JSONRPC_VERSION {
            return RpcResponse::failure(
                Some(id),
                RpcErrorObject::invalid_request(format!(
                    "unsupported jsonrpc version {:?}",
                    request.jsonrpc
                )),
                None,
            );
        }

        let Some(method) = Method::resolve(&self.namespace, &request.method) else {
            debug!(id, method = %request.method, "unknown method");
            return RpcResponse::failure(
                Some(id),
                RpcErrorObject::method_not_found(&request.method),
                None,
            );
        };

        debug!(id, method = method.name(), deadline_ms = ?request.deadline_ms, "dispatching");
        let ctx = self.context_for(&request, cancel);
        match self.dispatch(method, &request.params, &ctx) {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => {
                if error.code == codes::ENGINE_ERROR {
                    warn!(id, method = method.name(), message = %error.message, "engine failure");
                }
                RpcResponse::failure(Some(id), error, method.failure_placeholder())
            }
        }
    }

    /// Every request is bounded by the server timeout and, if present, by
    /// the time the caller still has left.
    fn context_for(&self, request: &RpcRequest, cancel: &CancellationToken) -> CallContext {
        let budget = match request.deadline_ms {
            Some(ms) => self.request_timeout.min(Duration::from_millis(ms)),
            None => self.request_timeout,
        };
        CallContext::background()
            .with_timeout(budget)
            .with_cancel(cancel.clone())
    }

    fn dispatch(
        &self,
        method: Method,
        params: &[Value],
        ctx: &CallContext,
    ) -> Result<Value, RpcErrorObject> {
        if params.len() != method.arity() {
            return Err(RpcErrorObject::invalid_params(format!(
                "{} expects {} params, got {}",
                method.name(),
                method.arity(),
                params.len()
            )));
        }
        ctx.check().map_err(|e| RpcErrorObject::from_ancient(&e))?;

        let api = &self.api;
        let result = match method {
            Method::PingVersion => Ok(Value::from(api.ping_version())),
            Method::Close => api.close(ctx).map(|()| Value::Null),
            Method::HasAncient => {
                let category = str_param(params, 0, "category")?;
                let number = u64_param(params, 1, "number")?;
                api.has_ancient(ctx, category, number).map(Value::from)
            }
            Method::Ancient => {
                let category = str_param(params, 0, "category")?;
                let number = u64_param(params, 1, "number")?;
                api.ancient(ctx, category, number).map(Value::from)
            }
            Method::Ancients => api.ancients(ctx).map(Value::from),
            Method::AncientSize => {
                let category = str_param(params, 0, "category")?;
                api.ancient_size(ctx, category).map(Value::from)
            }
            Method::AppendAncient => {
                let number = u64_param(params, 0, "number")?;
                api.append_ancient(
                    ctx,
                    number,
                    str_param(params, 1, "hash")?,
                    str_param(params, 2, "header")?,
                    str_param(params, 3, "body")?,
                    str_param(params, 4, "receipts")?,
                    str_param(params, 5, "td")?,
                )
                .map(|()| Value::Null)
            }
            Method::TruncateAncients => {
                let target = u64_param(params, 0, "target")?;
                api.truncate_ancients(ctx, target).map(|()| Value::Null)
            }
            Method::Sync => api.sync(ctx).map(|()| Value::Null),
        };
        result.map_err(|e| RpcErrorObject::from_ancient(&e))
    }
}

fn str_param<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a str, RpcErrorObject> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcErrorObject::invalid_params(format!("param {index} ({name}) must be a string")))
}

fn u64_param(params: &[Value], index: usize, name: &str) -> Result<u64, RpcErrorObject> {
    params.get(index).and_then(Value::as_u64).ok_or_else(|| {
        RpcErrorObject::invalid_params(format!("param {index} ({name}) must be an unsigned integer"))
    })
}
