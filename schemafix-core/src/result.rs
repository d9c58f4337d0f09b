//! [`DataResult`]: the tri-state outcome (success / error / error-with-partial)
//! that threads through every fallible combinator in this crate.
//!
//! Named `DataResult` rather than `Result` so it never shadows
//! [`std::result::Result`] at call sites that mix the two (this crate uses
//! plain `Result` everywhere a single error either fully succeeds or fully
//! fails; `DataResult` is reserved for operations that can usefully return a
//! best-effort partial value alongside an error, as the spec calls for).

use either::Either;

/// Advisory metadata carried alongside a [`DataResult`]. Combinators that
/// merge two results take the stricter of the two (`Experimental` wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Stable,
    Experimental,
}

impl Lifecycle {
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Lifecycle::Experimental, _) | (_, Lifecycle::Experimental) => Lifecycle::Experimental,
            (Lifecycle::Stable, Lifecycle::Stable) => Lifecycle::Stable,
        }
    }
}

/// `Success(value)`, `Error(message)`, or `Error(message, partial value)`.
#[derive(Debug, Clone)]
pub enum DataResult<A> {
    Success {
        value: A,
        lifecycle: Lifecycle,
    },
    Error {
        message: String,
        partial: Option<A>,
        lifecycle: Lifecycle,
    },
}

impl<A> DataResult<A> {
    #[must_use]
    pub fn success(value: A) -> Self {
        DataResult::Success {
            value,
            lifecycle: Lifecycle::Stable,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        DataResult::Error {
            message: message.into(),
            partial: None,
            lifecycle: Lifecycle::Stable,
        }
    }

    #[must_use]
    pub fn error_with_partial(message: impl Into<String>, partial: A) -> Self {
        DataResult::Error {
            message: message.into(),
            partial: Some(partial),
            lifecycle: Lifecycle::Stable,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, DataResult::Success { .. })
    }

    #[must_use]
    pub fn with_lifecycle(self, lifecycle: Lifecycle) -> Self {
        match self {
            DataResult::Success { value, .. } => DataResult::Success { value, lifecycle },
            DataResult::Error { message, partial, .. } => DataResult::Error {
                message,
                partial,
                lifecycle,
            },
        }
    }

    /// Success: `f` applied to the value. Error: `f` applied to the partial,
    /// if one is present (the partial survives `map`, unlike `flat_map`).
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> DataResult<B> {
        match self {
            DataResult::Success { value, lifecycle } => DataResult::Success {
                value: f(value),
                lifecycle,
            },
            DataResult::Error {
                message,
                partial,
                lifecycle,
            } => DataResult::Error {
                message,
                partial: partial.map(f),
                lifecycle,
            },
        }
    }

    /// Success: `f` applied to the value, its lifecycle merged with ours.
    /// Error: the error passes through unchanged, dropping the partial.
    pub fn flat_map<B>(self, f: impl FnOnce(A) -> DataResult<B>) -> DataResult<B> {
        match self {
            DataResult::Success { value, lifecycle } => f(value).with_lifecycle_merged(lifecycle),
            DataResult::Error {
                message, lifecycle, ..
            } => DataResult::Error {
                message,
                partial: None,
                lifecycle,
            },
        }
    }

    fn with_lifecycle_merged(self, other: Lifecycle) -> Self {
        let merged = self.lifecycle().merge(other);
        self.with_lifecycle(merged)
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            DataResult::Success { lifecycle, .. } | DataResult::Error { lifecycle, .. } => *lifecycle,
        }
    }

    #[must_use]
    pub fn map_error(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            DataResult::Success { .. } => self,
            DataResult::Error {
                message,
                partial,
                lifecycle,
            } => DataResult::Error {
                message: f(message),
                partial,
                lifecycle,
            },
        }
    }

    /// Combines two results, propagating the *first* error encountered.
    pub fn apply2<B, C>(self, other: DataResult<B>, f: impl FnOnce(A, B) -> C) -> DataResult<C> {
        match (self, other) {
            (
                DataResult::Error {
                    message, lifecycle, ..
                },
                _,
            ) => DataResult::Error {
                message,
                partial: None,
                lifecycle,
            },
            (
                DataResult::Success { lifecycle: l1, .. },
                DataResult::Error {
                    message,
                    lifecycle: l2,
                    ..
                },
            ) => DataResult::Error {
                message,
                partial: None,
                lifecycle: l1.merge(l2),
            },
            (
                DataResult::Success { value: a, lifecycle: l1 },
                DataResult::Success { value: b, lifecycle: l2 },
            ) => DataResult::Success {
                value: f(a, b),
                lifecycle: l1.merge(l2),
            },
        }
    }

    /// Extracts the value, falling back to `default` on any error (the
    /// partial, if present, is ignored, use [`Self::result_or_partial`] to
    /// prefer it).
    pub fn or_else(self, default: A) -> A {
        match self {
            DataResult::Success { value, .. } => value,
            DataResult::Error { .. } => default,
        }
    }

    pub fn or_else_get(self, default: impl FnOnce() -> A) -> A {
        match self {
            DataResult::Success { value, .. } => value,
            DataResult::Error { .. } => default(),
        }
    }

    /// Success: the value. Error-with-partial: invoke `on_error` with the
    /// message and return the partial. Bare error: a fatal contract
    /// violation, the caller promised to handle only results that carry a
    /// partial on failure.
    pub fn result_or_partial(self, on_error: impl FnOnce(&str)) -> A {
        match self {
            DataResult::Success { value, .. } => value,
            DataResult::Error {
                message,
                partial: Some(partial),
                ..
            } => {
                on_error(&message);
                partial
            }
            DataResult::Error { message, partial: None, .. } => {
                panic!("fatal: result_or_partial called on a bare error: {message}")
            }
        }
    }

    /// Upgrades an error-with-partial to a success, reporting the original
    /// error through `on_error` first. A bare error is a fatal contract
    /// violation, same as [`Self::result_or_partial`].
    pub fn promote_partial(self, on_error: impl FnOnce(&str)) -> Self {
        match self {
            DataResult::Success { .. } => self,
            DataResult::Error {
                message,
                partial: Some(partial),
                lifecycle,
            } => {
                on_error(&message);
                DataResult::Success {
                    value: partial,
                    lifecycle,
                }
            }
            DataResult::Error { message, partial: None, .. } => {
                panic!("fatal: promote_partial called on a bare error: {message}")
            }
        }
    }

    #[must_use]
    pub fn to_either(self) -> Either<String, A> {
        match self {
            DataResult::Success { value, .. } => Either::Right(value),
            DataResult::Error { message, .. } => Either::Left(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_preserves_partial() {
        let r: DataResult<i32> = DataResult::error_with_partial("bad", 41);
        let mapped = r.map(|v| v + 1);
        match mapped {
            DataResult::Error { partial: Some(42), .. } => {}
            other => panic!("expected partial 42, got {other:?}"),
        }
    }

    #[test]
    fn flat_map_drops_partial_on_error() {
        let r: DataResult<i32> = DataResult::error_with_partial("bad", 41);
        let mapped = r.flat_map(|v| DataResult::success(v + 1));
        match mapped {
            DataResult::Error { partial: None, .. } => {}
            other => panic!("expected bare error, got {other:?}"),
        }
    }

    #[test]
    fn result_law_success_flat_map() {
        let r = DataResult::success(41).flat_map(|v| DataResult::success(v + 1));
        match r {
            DataResult::Success { value: 42, .. } => {}
            other => panic!("expected 42, got {other:?}"),
        }
    }

    #[test]
    fn apply2_propagates_first_error() {
        let a: DataResult<i32> = DataResult::error("x");
        let b: DataResult<i32> = DataResult::error("y");
        let r = a.apply2(b, |x, y| x + y);
        match r {
            DataResult::Error { message, .. } => assert_eq!(message, "x"),
            other => panic!("expected error x, got {other:?}"),
        }

        let a: DataResult<i32> = DataResult::success(1);
        let b: DataResult<i32> = DataResult::error("y");
        let r = a.apply2(b, |x, y| x + y);
        match r {
            DataResult::Error { message, .. } => assert_eq!(message, "y"),
            other => panic!("expected error y, got {other:?}"),
        }
    }

    #[test]
    fn lifecycle_merge_prefers_experimental() {
        assert_eq!(Lifecycle::Stable.merge(Lifecycle::Stable), Lifecycle::Stable);
        assert_eq!(
            Lifecycle::Stable.merge(Lifecycle::Experimental),
            Lifecycle::Experimental
        );
    }

    #[test]
    #[should_panic(expected = "fatal")]
    fn result_or_partial_panics_on_bare_error() {
        let r: DataResult<i32> = DataResult::error("boom");
        r.result_or_partial(|_| {});
    }
}
