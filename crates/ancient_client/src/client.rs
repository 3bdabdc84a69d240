//! The remote ancient store.

use crate::config::ClientConfig;
use crate::tcp::TcpTransport;
use crate::transport::RpcTransport;
use ancient_protocol::{envelope, handshake_status, Method, RpcRequest, PROTOCOL_VERSION};
use ancient_store::{
    AncientError, AncientRecord, AncientResult, AncientStore, CallContext, Category,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// An [`AncientStore`] whose engine lives in another process.
///
/// Every operation is one JSON-RPC call. Errors raised by the remote
/// engine come back as the same [`AncientError`] variant; failures of the
/// channel itself are reported as `Transport`, `Protocol`, `Canceled` or
/// `DeadlineExceeded`. Nothing is retried.
///
/// # Example
///
/// ```rust,no_run
/// use ancient_client::{ClientConfig, RemoteFreezer};
/// use ancient_store::{AncientStore, CallContext};
///
/// let freezer = RemoteFreezer::connect("127.0.0.1:8545", ClientConfig::default())?;
/// println!("{}", freezer.status());
/// let frozen = freezer.ancients(&CallContext::background())?;
/// # Ok::<(), ancient_store::AncientError>(())
/// ```
pub struct RemoteFreezer {
    transport: Box<dyn RpcTransport>,
    config: ClientConfig,
    next_id: AtomicU64,
    status: String,
    closed: AtomicBool,
}

impl RemoteFreezer {
    /// Dials `endpoint` over TCP and runs the handshake.
    pub fn connect(endpoint: &str, config: ClientConfig) -> AncientResult<Self> {
        info!(endpoint, namespace = %config.namespace, "connecting to remote ancient store");
        let ctx = CallContext::background().with_timeout(config.connect_timeout);
        let transport = TcpTransport::connect(endpoint, &config, &ctx).map_err(handshake_error)?;
        Self::with_transport(transport, config)
    }

    /// Runs the handshake over an existing transport.
    ///
    /// Fails with `Transport` if the probe fails and with
    /// `VersionMismatch` if the server speaks another version.
    pub fn with_transport<T>(transport: T, config: ClientConfig) -> AncientResult<Self>
    where
        T: RpcTransport + 'static,
    {
        let mut freezer = Self {
            transport: Box::new(transport),
            config,
            next_id: AtomicU64::new(1),
            status: String::new(),
            closed: AtomicBool::new(false),
        };

        let ctx = CallContext::background().with_timeout(freezer.config.connect_timeout);
        let version = freezer
            .call(&ctx, Method::PingVersion, Vec::new())
            .and_then(|value| match value {
                Value::String(version) => Ok(version),
                other => Err(AncientError::Protocol(format!(
                    "handshake returned {other}, expected a version string"
                ))),
            })
            .map_err(handshake_error)?;

        if version != PROTOCOL_VERSION {
            return Err(AncientError::VersionMismatch {
                local: PROTOCOL_VERSION.to_string(),
                remote: version,
            });
        }
        freezer.status = handshake_status(&version);
        info!(status = %freezer.status, "remote ancient store ready");
        Ok(freezer)
    }

    /// Returns the diagnostic status recorded by the handshake.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns true until the store is closed or the transport gives up.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.transport.is_connected()
    }

    fn call(&self, ctx: &CallContext, method: Method, params: Vec<Value>) -> AncientResult<Value> {
        let ctx = if ctx.deadline().is_some() {
            ctx.clone()
        } else {
            ctx.bounded_by(self.config.default_timeout)
        };
        ctx.check()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method.qualified(&self.config.namespace), params)
            .with_remaining(ctx.remaining());
        debug!(id, method = method.name(), "remote call");

        let response = self.transport.call(&request, &ctx)?;
        if response.id.is_some_and(|got| got != id) {
            return Err(AncientError::Protocol(format!(
                "response id {:?} does not match request {id}",
                response.id
            )));
        }
        response.into_result()
    }

    fn open_call(&self, ctx: &CallContext, method: Method, params: Vec<Value>) -> AncientResult<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AncientError::Closed);
        }
        self.call(ctx, method, params)
    }
}

fn handshake_error(err: AncientError) -> AncientError {
    match err {
        AncientError::Transport(_) => err,
        other => AncientError::Transport(format!("handshake failed: {other}")),
    }
}

fn expect_u64(value: Value) -> AncientResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| AncientError::Protocol(format!("expected an unsigned integer, got {value}")))
}

impl AncientStore for RemoteFreezer {
    fn has_ancient(&self, ctx: &CallContext, category: Category, number: u64) -> AncientResult<bool> {
        let value = self.open_call(
            ctx,
            Method::HasAncient,
            vec![Value::from(category.as_str()), Value::from(number)],
        )?;
        value
            .as_bool()
            .ok_or_else(|| AncientError::Protocol(format!("expected a bool, got {value}")))
    }

    fn ancient(&self, ctx: &CallContext, category: Category, number: u64) -> AncientResult<Vec<u8>> {
        let value = self.open_call(
            ctx,
            Method::Ancient,
            vec![Value::from(category.as_str()), Value::from(number)],
        )?;
        let text = value
            .as_str()
            .ok_or_else(|| AncientError::Protocol(format!("expected a hex string, got {value}")))?;
        Ok(envelope::decode(text)?)
    }

    fn ancients(&self, ctx: &CallContext) -> AncientResult<u64> {
        expect_u64(self.open_call(ctx, Method::Ancients, Vec::new())?)
    }

    fn ancient_size(&self, ctx: &CallContext, category: Category) -> AncientResult<u64> {
        expect_u64(self.open_call(
            ctx,
            Method::AncientSize,
            vec![Value::from(category.as_str())],
        )?)
    }

    fn append_ancient(
        &self,
        ctx: &CallContext,
        number: u64,
        record: &AncientRecord,
    ) -> AncientResult<()> {
        let mut params = Vec::with_capacity(6);
        params.push(Value::from(number));
        params.extend(
            record
                .blobs()
                .into_iter()
                .map(|(_, blob)| Value::from(envelope::encode(blob))),
        );
        self.open_call(ctx, Method::AppendAncient, params).map(|_| ())
    }

    fn truncate_ancients(&self, ctx: &CallContext, target: u64) -> AncientResult<()> {
        self.open_call(ctx, Method::TruncateAncients, vec![Value::from(target)])
            .map(|_| ())
    }

    fn sync(&self, ctx: &CallContext) -> AncientResult<()> {
        self.open_call(ctx, Method::Sync, Vec::new()).map(|_| ())
    }

    fn close(&self, ctx: &CallContext) -> AncientResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let remote = self.call(ctx, Method::Close, Vec::new());
        self.transport.close()?;
        info!("remote ancient store closed");
        remote.map(|_| ())
    }
}

impl Drop for RemoteFreezer {
    fn drop(&mut self) {
        // The remote engine stays open; only the channel is released.
        let _ = self.transport.close();
    }
}
