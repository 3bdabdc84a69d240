//! The wire-facing facade over an ancient engine.

use ancient_protocol::{envelope, PROTOCOL_VERSION};
use ancient_store::{AncientEngine, AncientRecord, AncientResult, CallContext, Category};
use std::sync::Arc;

/// Adapts an [`AncientEngine`] to the textual arguments of the protocol.
///
/// Every binary argument is decoded before the engine is touched, so a
/// malformed envelope never reaches it. Engine errors are returned as-is.
#[derive(Clone)]
pub struct FreezerRemoteApi {
    engine: Arc<dyn AncientEngine>,
}

impl FreezerRemoteApi {
    /// Creates a facade over `engine`.
    pub fn new(engine: Arc<dyn AncientEngine>) -> Self {
        Self { engine }
    }

    /// Returns the engine behind the facade.
    pub fn engine(&self) -> &Arc<dyn AncientEngine> {
        &self.engine
    }

    /// Answers the handshake probe.
    pub fn ping_version(&self) -> &'static str {
        PROTOCOL_VERSION
    }

    /// Reports whether `number` is frozen. Unknown categories hold nothing.
    pub fn has_ancient(&self, ctx: &CallContext, category: &str, number: u64) -> AncientResult<bool> {
        match category.parse::<Category>() {
            Ok(category) => self.engine.has_ancient(ctx, category, number),
            Err(_) => {
                ctx.check()?;
                Ok(false)
            }
        }
    }

    /// Returns the encoded blob of `category` at `number`.
    pub fn ancient(&self, ctx: &CallContext, category: &str, number: u64) -> AncientResult<String> {
        let category = category.parse::<Category>()?;
        let blob = self.engine.ancient(ctx, category, number)?;
        Ok(envelope::encode(&blob))
    }

    /// Returns the frozen count.
    pub fn ancients(&self, ctx: &CallContext) -> AncientResult<u64> {
        self.engine.ancients(ctx)
    }

    /// Returns the committed byte size of `category`.
    pub fn ancient_size(&self, ctx: &CallContext, category: &str) -> AncientResult<u64> {
        let category = category.parse::<Category>()?;
        self.engine.ancient_size(ctx, category)
    }

    /// Decodes the five category envelopes and appends them at `number`.
    #[allow(clippy::too_many_arguments)]
    pub fn append_ancient(
        &self,
        ctx: &CallContext,
        number: u64,
        hash: &str,
        header: &str,
        body: &str,
        receipts: &str,
        td: &str,
    ) -> AncientResult<()> {
        let record = AncientRecord::new(
            envelope::decode(hash)?,
            envelope::decode(header)?,
            envelope::decode(body)?,
            envelope::decode(receipts)?,
            envelope::decode(td)?,
        );
        self.engine.append_ancient(ctx, number, &record)
    }

    /// Discards every item at or above `target`.
    pub fn truncate_ancients(&self, ctx: &CallContext, target: u64) -> AncientResult<()> {
        self.engine.truncate_ancients(ctx, target)
    }

    /// Flushes the engine to durable storage.
    pub fn sync(&self, ctx: &CallContext) -> AncientResult<()> {
        self.engine.sync(ctx)
    }

    /// Closes the engine.
    pub fn close(&self, ctx: &CallContext) -> AncientResult<()> {
        self.engine.close(ctx)
    }
}
