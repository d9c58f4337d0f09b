//! Structured errors for every fallible surface in the engine.
//!
//! Two families coexist by design (see `spec.md` §7): hard errors raised
//! immediately for programmer mistakes ([`IllegalArgument`], [`IllegalState`]),
//! and domain errors that flow through [`crate::result::DataResult`] or a
//! plain [`Result`] ([`OpsError`], [`TemplateError`], [`CodecError`]).

use snafu::{Backtrace, Snafu};

use crate::reference::TypeReference;
use crate::version::DataVersion;

/*
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
╔═══════════════════════════════════════════════════════════════════════╗
║                                                                       ║
║                                OpsError                               ║
║                               ¯¯¯¯¯¯¯¯¯                               ║
╚═══════════════════════════════════════════════════════════════════════╝
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
*/

/// An accessor or structural-update call on an [`crate::ops::Ops`]
/// implementation failed.
///
/// Deliberately `Clone` (no backtrace) so it can live inside a
/// [`crate::dynamic::Dynamic`]'s lazily-evaluated navigation chain without
/// forcing every caller to thread `Arc` around it.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum OpsError {
    /// The value was not of the kind the accessor expected.
    #[snafu(display("expected a {expected} value, found {found}"))]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
    /// A map lookup found no entry for the given key.
    #[snafu(display("key {key:?} not found"))]
    KeyNotFound { key: String },
    /// A list index was out of bounds.
    #[snafu(display("index {index} out of range (length {len})"))]
    IndexOutOfRange { index: usize, len: usize },
    /// A structural rebuild (`with_children`) was handed a different number
    /// of children than the type shape requires.
    #[snafu(display("expected {expected} children to rebuild {shape}, found {found}"))]
    ShapeMismatch {
        shape: &'static str,
        expected: usize,
        found: usize,
    },
}

pub type OpsResult<T> = std::result::Result<T, OpsError>;

/*
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
╔═══════════════════════════════════════════════════════════════════════╗
║                                                                       ║
║                              TemplateError                            ║
║                             ¯¯¯¯¯¯¯¯¯¯¯¯¯¯                            ║
╚═══════════════════════════════════════════════════════════════════════╝
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
*/

/// Raised while applying a [`crate::types::template::TypeTemplate`] to a
/// [`crate::types::template::TypeFamily`].
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum TemplateError {
    /// `id(i)` referenced a recursion point absent from the family.
    #[snafu(display("recursion point µ{index} is not present in this type family"))]
    RecursionPointOutOfRange { index: usize },
    /// A recursion point's generator tried to resolve it a second time.
    #[snafu(display("recursion point µ{index} was already resolved"))]
    RecursionPointAlreadyResolved { index: usize },
    /// `and()`/`or()` were called with fewer than two operands.
    #[snafu(display("{combinator}() requires at least 2 operands"))]
    RequiresAtLeastTwo { combinator: &'static str },
}

/*
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
╔═══════════════════════════════════════════════════════════════════════╗
║                                                                       ║
║                               CodecError                              ║
║                              ¯¯¯¯¯¯¯¯¯¯¯                              ║
╚═══════════════════════════════════════════════════════════════════════╝
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
*/

/// Raised by a [`crate::codec::Codec`] during `encode`/`decode`.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    #[snafu(display("decode failed: {message}"))]
    Decode { message: String },
    #[snafu(display("encode failed: {message}"))]
    Encode { message: String },
    #[snafu(display("underlying ops error: {source}"))]
    Ops { source: OpsError },
}

impl From<OpsError> for CodecError {
    fn from(source: OpsError) -> Self {
        CodecError::Ops { source }
    }
}

/*
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
╔═══════════════════════════════════════════════════════════════════════╗
║                                                                       ║
║                               FixError                                ║
║                              ¯¯¯¯¯¯¯¯¯¯                               ║
╚═══════════════════════════════════════════════════════════════════════╝
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
*/

/// A fix raised a domain error while migrating a document; the original
/// cause is preserved (§7: "the original is preserved as cause").
#[derive(Debug, Snafu)]
#[snafu(display(
    "fix {fix_name:?} ({from_version}->{to_version}) failed for type {type_reference:?}: {cause}"
))]
pub struct FixError {
    pub fix_name: String,
    pub from_version: DataVersion,
    pub to_version: DataVersion,
    pub type_reference: TypeReference,
    #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub backtrace: Backtrace,
}

impl FixError {
    pub fn wrap(
        fix_name: impl Into<String>,
        from_version: DataVersion,
        to_version: DataVersion,
        type_reference: TypeReference,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FixError {
            fix_name: fix_name.into(),
            from_version,
            to_version,
            type_reference,
            cause: Some(Box::new(cause)),
            backtrace: Backtrace::capture(),
        }
    }
}

/*
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
╔═══════════════════════════════════════════════════════════════════════╗
║                                                                       ║
║                               FixerError                              ║
║                              ¯¯¯¯¯¯¯¯¯¯¯                              ║
╚═══════════════════════════════════════════════════════════════════════╝
░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░
*/

/// Everything [`crate::fixer::Fixer::update`] can raise. `IllegalArgument`
/// and `IllegalState` are hard errors (programmer mistakes); `Fix` wraps a
/// domain error surfaced by a fix's `apply`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FixerError {
    /// The caller violated a documented precondition of `update`.
    #[snafu(display("illegal argument: {message}"))]
    IllegalArgument { message: String, backtrace: Backtrace },
    /// A frozen registry was mutated, or a fix returned no output.
    #[snafu(display("illegal state: {message}"))]
    IllegalState { message: String, backtrace: Backtrace },
    /// A fix raised a domain error during application.
    #[snafu(display("{source}"))]
    Fix {
        #[snafu(backtrace)]
        source: FixError,
    },
}

impl FixerError {
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        FixerError::IllegalArgument {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        FixerError::IllegalState {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<FixError> for FixerError {
    fn from(source: FixError) -> Self {
        FixerError::Fix { source }
    }
}

/// A mutating call landed on an already-frozen registry.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(display("registry is frozen; {operation} is no longer permitted"))]
pub struct FrozenRegistryError {
    pub operation: &'static str,
}
