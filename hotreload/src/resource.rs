//! The capability contract every reconcilable resource satisfies.

use std::fmt;

/// A resource the reconciler can track, diff and apply.
///
/// Identity is `(KIND, name)`. Two resources with the same identity but
/// different content (`PartialEq`) are treated as an update.
pub trait Resource: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Type discriminator shared by every instance of the implementing type.
    const KIND: &'static str;

    /// Name of the resource, unique within its kind.
    fn name(&self) -> &str;

    /// Human-readable description for log lines.
    fn log_name(&self) -> String;

    fn kind(&self) -> &'static str {
        Self::KIND
    }
}
