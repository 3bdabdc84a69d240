//! Protocol method table.

use crate::envelope::EMPTY_ENVELOPE;
use serde_json::Value;

/// Namespace prefixed to every method name unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "freezer";

/// A remote ancient store method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `close()` → null
    Close,
    /// `pingVersion()` → version string
    PingVersion,
    /// `hasAncient(category, number)` → bool
    HasAncient,
    /// `ancient(category, number)` → hex blob
    Ancient,
    /// `ancients()` → frozen count
    Ancients,
    /// `ancientSize(category)` → bytes
    AncientSize,
    /// `appendAncient(number, hash, header, body, receipts, td)` → null
    AppendAncient,
    /// `truncateAncients(target)` → null
    TruncateAncients,
    /// `sync()` → null
    Sync,
}

impl Method {
    /// Every method the facade serves.
    pub const ALL: [Method; 9] = [
        Method::Close,
        Method::PingVersion,
        Method::HasAncient,
        Method::Ancient,
        Method::Ancients,
        Method::AncientSize,
        Method::AppendAncient,
        Method::TruncateAncients,
        Method::Sync,
    ];

    /// Returns the unqualified method name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Method::Close => "close",
            Method::PingVersion => "pingVersion",
            Method::HasAncient => "hasAncient",
            Method::Ancient => "ancient",
            Method::Ancients => "ancients",
            Method::AncientSize => "ancientSize",
            Method::AppendAncient => "appendAncient",
            Method::TruncateAncients => "truncateAncients",
            Method::Sync => "sync",
        }
    }

    /// Returns the wire name, e.g. `freezer_hasAncient`.
    #[must_use]
    pub fn qualified(self, namespace: &str) -> String {
        format!("{namespace}_{}", self.name())
    }

    /// Resolves a wire name within `namespace`.
    #[must_use]
    pub fn resolve(namespace: &str, wire_name: &str) -> Option<Method> {
        let name = wire_name
            .strip_prefix(namespace)
            .and_then(|rest| rest.strip_prefix('_'))?;
        Method::ALL.into_iter().find(|method| method.name() == name)
    }

    /// Number of positional parameters the method takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Method::Close | Method::PingVersion | Method::Ancients | Method::Sync => 0,
            Method::AncientSize | Method::TruncateAncients => 1,
            Method::HasAncient | Method::Ancient => 2,
            Method::AppendAncient => 6,
        }
    }

    /// Result value sent alongside an error, if the method defines one.
    ///
    /// A failed `ancient` still returns the empty envelope so that callers
    /// reading only the result see an empty blob rather than nothing.
    #[must_use]
    pub fn failure_placeholder(self) -> Option<Value> {
        match self {
            Method::Ancient => Some(Value::String(EMPTY_ENVELOPE.to_string())),
            _ => None,
        }
    }
}
