//! Record categories.

use crate::error::AncientError;
use std::fmt;
use std::str::FromStr;

/// Number of categories every record is split into.
pub const CATEGORY_COUNT: usize = 5;

/// One named field of an ancient record.
///
/// Every category holds exactly one blob per committed sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Block hash.
    Hash,
    /// Encoded block header.
    Header,
    /// Encoded block body.
    Body,
    /// Encoded receipts.
    Receipts,
    /// Accumulated total difficulty.
    Difficulty,
}

impl Category {
    /// All categories in storage order.
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Hash,
        Category::Header,
        Category::Body,
        Category::Receipts,
        Category::Difficulty,
    ];

    /// Returns the wire name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Hash => "hash",
            Category::Header => "header",
            Category::Body => "body",
            Category::Receipts => "receipts",
            Category::Difficulty => "td",
        }
    }

    /// Returns the position of the category in [`Category::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Category::Hash => 0,
            Category::Header => 1,
            Category::Body => 2,
            Category::Receipts => 3,
            Category::Difficulty => 4,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AncientError;

    /// Parses a wire name. The plural table names used by freezer
    /// deployments (`hashes`, `headers`, `bodies`, `diffs`) are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash" | "hashes" => Ok(Category::Hash),
            "header" | "headers" => Ok(Category::Header),
            "body" | "bodies" => Ok(Category::Body),
            "receipts" => Ok(Category::Receipts),
            "td" | "diffs" | "totalDifficulty" => Ok(Category::Difficulty),
            other => Err(AncientError::UnknownCategory(other.to_string())),
        }
    }
}
