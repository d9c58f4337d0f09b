//! Schema-versioned data migration engine.
//!
//! Documents are encoded in some concrete format ([`ops::Ops`]) and carry
//! a [`version::DataVersion`]. A [`fixer::Fixer`] walks the registered
//! [`fix::FixRegistry`] to bring a document from one version to another,
//! applying each in-range [`fix::DataFix`] in order; individual fixes are
//! usually expressed as [`rules::RewriteRule`] combinators over the
//! structural [`types::Type`] algebra rather than hand-rolled tree walks.
//!
//! Nothing in this crate installs a [`tracing`] subscriber or reads
//! configuration from the environment, that is host application
//! territory; this crate only emits spans and events for a host to
//! collect.

pub mod codec;
pub mod dynamic;
pub mod error;
pub mod finder;
pub mod fix;
pub mod fixer;
pub mod ops;
pub mod pair;
pub mod reference;
pub mod result;
pub mod rules;
pub mod schema;
pub mod types;
pub mod version;

pub use codec::{field_of, optional_field_of, Codec, Decoder, Encoder};
pub use dynamic::{Dynamic, TaggedDynamic};
pub use error::{CodecError, FixError, FixerError, FrozenRegistryError, OpsError, TemplateError};
pub use fix::{DataFix, FixEntry, FixRegistrar, FixRegistry};
pub use fixer::{Bootstrap, Fixer, FixerContext};
pub use ops::Ops;
pub use pair::Pair;
pub use reference::TypeReference;
pub use result::{DataResult, Lifecycle};
pub use schema::{Schema, SchemaRegistrar, SchemaRegistry};
pub use types::template::{TypeFamily, TypeTemplate};
pub use types::typed::Typed;
pub use types::Type;
pub use version::DataVersion;
