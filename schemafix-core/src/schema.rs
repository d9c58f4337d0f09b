//! [`Schema`] and [`SchemaRegistry`]: a version-tagged set of named types,
//! and the frozen collection of them a [`crate::fixer::Fixer`] consults.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use once_cell::sync::OnceCell;

use crate::error::FrozenRegistryError;
use crate::reference::TypeReference;
use crate::types::Type;
use crate::version::DataVersion;

/// A version-tagged namespace of [`Type`]s. The type registry is built
/// lazily, on first access, by calling `register_types` exactly once;
/// every access after that reads the same memoized map. A parent schema
/// (an earlier version sharing most of the same types) is referenced
/// weakly: schemas never own their parent, since a `SchemaRegistry`
/// already does and always registers parents first.
///
/// `Arc`/`Weak` throughout (not `Rc`): once frozen, a `SchemaRegistry` is
/// shared across threads (`spec.md` §5), so every persistent handle here
/// must be `Send + Sync`.
pub struct Schema {
    version: DataVersion,
    parent: Option<Weak<Schema>>,
    register_types: Box<dyn Fn() -> Vec<(TypeReference, Type)> + Send + Sync>,
    types: OnceCell<HashMap<TypeReference, Type>>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("version", &self.version)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl Schema {
    /// `register_types` is the "subclass hook": it is called once, the
    /// first time this schema's types are looked up, and never again.
    #[must_use]
    pub fn new(
        version: DataVersion,
        parent: Option<&Arc<Schema>>,
        register_types: impl Fn() -> Vec<(TypeReference, Type)> + Send + Sync + 'static,
    ) -> Arc<Schema> {
        Arc::new(Schema {
            version,
            parent: parent.map(Arc::downgrade),
            register_types: Box::new(register_types),
            types: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn version(&self) -> DataVersion {
        self.version
    }

    /// The parent schema, if it is still alive. Always `Some` while the
    /// owning [`SchemaRegistry`] is alive, since registries register
    /// parents before children and hold every schema by strong reference.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Schema>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(version = %self.version))]
    fn types(&self) -> &HashMap<TypeReference, Type> {
        self.types.get_or_init(|| {
            tracing::debug!("building type registry");
            (self.register_types)().into_iter().collect()
        })
    }

    /// Looks up a type registered directly on this schema. Does not fall
    /// back to the parent: `Fixer`/`FixRegistry` resolution is by exact
    /// `(type, version)`, never by inheritance.
    #[must_use]
    pub fn find_type(&self, reference: &TypeReference) -> Option<&Type> {
        self.types().get(reference)
    }
}

/// An insertion-ordered collection of [`Schema`]s, frozen before the first
/// migration runs. Mirrors [`crate::fix::FixRegistry`]'s freeze
/// discipline.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<Vec<Arc<Schema>>>,
    frozen: AtomicBool,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("len", &self.schemas.read().expect("schema registry lock poisoned").len())
            .field("frozen", &self.frozen.load(Ordering::Acquire))
            .finish()
    }
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        SchemaRegistry::default()
    }

    /// Adds `schema` to the registry. Errors if the registry is already
    /// frozen.
    pub fn register(&self, schema: Arc<Schema>) -> Result<(), FrozenRegistryError> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(FrozenRegistryError { operation: "register" });
        }
        self.schemas.write().expect("schema registry lock poisoned").push(schema);
        Ok(())
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn get(&self, version: DataVersion) -> Option<Arc<Schema>> {
        self.schemas
            .read()
            .expect("schema registry lock poisoned")
            .iter()
            .find(|schema| schema.version() == version)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.read().expect("schema registry lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.read().expect("schema registry lock poisoned").is_empty()
    }
}

/// Something that knows how to populate a [`SchemaRegistry`], the
/// `SchemaRegistry`-side counterpart of [`crate::fix::FixRegistrar`].
/// Bootstrap code typically implements both on the same type; see
/// [`crate::fixer::Bootstrap`].
pub trait SchemaRegistrar {
    fn register_schemas(&self, registry: &SchemaRegistry) -> Result<(), FrozenRegistryError>;
}
