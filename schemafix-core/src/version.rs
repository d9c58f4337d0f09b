//! [`DataVersion`]: a non-negative integer tag for a schema revision.

use std::fmt;

/// A schema revision number. Ordered; `0` and `i32::MAX` are both legal.
///
/// Immutable by construction (there is no setter, only `From`/`Into` and
/// comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataVersion(i32);

impl DataVersion {
    /// The smallest legal version.
    pub const ZERO: DataVersion = DataVersion(0);
    /// The largest legal version.
    pub const MAX: DataVersion = DataVersion(i32::MAX);

    #[must_use]
    pub const fn new(version: i32) -> Self {
        DataVersion(version)
    }

    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for DataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for DataVersion {
    fn from(value: i32) -> Self {
        DataVersion(value)
    }
}
