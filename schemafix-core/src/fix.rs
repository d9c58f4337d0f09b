//! [`DataFix`] and [`FixRegistry`]: the versioned, per-type migration
//! steps a [`crate::fixer::Fixer`] walks through.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::dynamic::Dynamic;
use crate::error::{FixerError, FrozenRegistryError};
use crate::fixer::FixerContext;
use crate::reference::TypeReference;
use crate::version::DataVersion;

type ApplyFn<T> = dyn Fn(&TypeReference, Dynamic<T>, &FixerContext) -> Result<Dynamic<T>, Box<dyn std::error::Error + Send + Sync>>
    + Send
    + Sync;

/// One migration step for a single [`TypeReference`], from `from_version`
/// (exclusive of earlier versions, inclusive of itself) to `to_version`.
///
/// `Arc` throughout (not `Rc`): a [`FixRegistry`] is frozen before the
/// first migration and then shared across threads (`spec.md` §5).
pub struct DataFix<T> {
    name: String,
    from_version: DataVersion,
    to_version: DataVersion,
    apply: Arc<ApplyFn<T>>,
}

impl<T> fmt::Debug for DataFix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFix")
            .field("name", &self.name)
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> DataFix<T> {
    /// Fails if `from_version >= to_version`.
    pub fn new(
        name: impl Into<String>,
        from_version: DataVersion,
        to_version: DataVersion,
        apply: impl Fn(&TypeReference, Dynamic<T>, &FixerContext) -> Result<Dynamic<T>, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    ) -> Result<DataFix<T>, FixerError> {
        if from_version >= to_version {
            return Err(FixerError::illegal_argument(format!(
                "fix fromVersion ({from_version}) must be strictly less than toVersion ({to_version})"
            )));
        }
        Ok(DataFix {
            name: name.into(),
            from_version,
            to_version,
            apply: Arc::new(apply),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn from_version(&self) -> DataVersion {
        self.from_version
    }

    #[must_use]
    pub fn to_version(&self) -> DataVersion {
        self.to_version
    }

    pub fn apply(
        &self,
        type_reference: &TypeReference,
        input: Dynamic<T>,
        ctx: &FixerContext,
    ) -> Result<Dynamic<T>, Box<dyn std::error::Error + Send + Sync>> {
        (self.apply)(type_reference, input, ctx)
    }
}

/// A registered [`DataFix`], bound to the [`TypeReference`] it was
/// registered under and the order in which it was registered (the
/// tie-break when two fixes share a `from_version`).
pub struct FixEntry<T> {
    pub fix: Arc<DataFix<T>>,
    pub registration_order: usize,
    pub type_reference: TypeReference,
}

impl<T> Clone for FixEntry<T> {
    fn clone(&self) -> Self {
        FixEntry {
            fix: Arc::clone(&self.fix),
            registration_order: self.registration_order,
            type_reference: self.type_reference.clone(),
        }
    }
}

impl<T> fmt::Debug for FixEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixEntry")
            .field("fix", &self.fix)
            .field("registration_order", &self.registration_order)
            .field("type_reference", &self.type_reference)
            .finish()
    }
}

/// `TypeReference -> insertion-ordered list of DataFix`, freezable. Gap
/// tolerant: a sub-range with no registered fix is a no-op, not an error
/// (additive/nullable schema changes need no migration code).
pub struct FixRegistry<T> {
    entries: RwLock<HashMap<TypeReference, Vec<FixEntry<T>>>>,
    next_order: AtomicUsize,
    frozen: AtomicBool,
}

impl<T> Default for FixRegistry<T> {
    fn default() -> Self {
        FixRegistry {
            entries: RwLock::new(HashMap::new()),
            next_order: AtomicUsize::new(0),
            frozen: AtomicBool::new(false),
        }
    }
}

impl<T: Clone> FixRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        FixRegistry::default()
    }

    pub fn register(&self, type_reference: TypeReference, fix: DataFix<T>) -> Result<(), FrozenRegistryError> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(FrozenRegistryError { operation: "register" });
        }
        let order = self.next_order.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .expect("fix registry lock poisoned")
            .entry(type_reference.clone())
            .or_default()
            .push(FixEntry {
                fix: Arc::new(fix),
                registration_order: order,
                type_reference,
            });
        Ok(())
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Fixes for exactly `type_reference` whose range falls inside
    /// `[from, to]`, ordered by `from_version` ascending, then
    /// registration order.
    #[must_use]
    #[tracing::instrument(level = "trace", skip(self), fields(type_reference = %type_reference))]
    pub fn get_fixes(&self, type_reference: &TypeReference, from: DataVersion, to: DataVersion) -> Vec<FixEntry<T>> {
        let entries = self.entries.read().expect("fix registry lock poisoned");
        let mut matching: Vec<FixEntry<T>> = entries
            .get(type_reference)
            .map(|fixes| {
                fixes
                    .iter()
                    .filter(|entry| entry.fix.from_version() >= from && entry.fix.to_version() <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| {
            a.fix
                .from_version()
                .cmp(&b.fix.from_version())
                .then(a.registration_order.cmp(&b.registration_order))
        });
        matching
    }
}

/// Something that knows how to populate a [`FixRegistry`], typically one
/// implementation per type family, grouping "all the fixes for players"
/// or similar, registered during bootstrap before the registry freezes.
pub trait FixRegistrar<T> {
    fn register_fixes(&self, registry: &FixRegistry<T>) -> Result<(), FrozenRegistryError>;
}
