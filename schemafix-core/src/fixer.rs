//! [`Fixer`]: the facade a host calls to migrate one document from an
//! old [`DataVersion`] to a newer one, walking the registered
//! [`FixRegistry`] in order and optionally recording what happened.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use snafu::Backtrace;

use crate::dynamic::{Dynamic, TaggedDynamic};
use crate::error::{FixError, FixerError, FrozenRegistryError};
use crate::fix::{FixRegistrar, FixRegistry};
use crate::reference::TypeReference;
use crate::schema::{SchemaRegistrar, SchemaRegistry};
use crate::version::DataVersion;

/// Everything a [`Fixer`] needs to bootstrap itself: the schemas for every
/// version, and the fixes that step between them. Anything implementing
/// both [`SchemaRegistrar`] and [`FixRegistrar`] gets this for free,
/// there is no separate trait to implement.
pub trait Bootstrap<T>: SchemaRegistrar + FixRegistrar<T> {}

impl<T, B: SchemaRegistrar + FixRegistrar<T> + ?Sized> Bootstrap<T> for B {}

/// Handed to every [`crate::fix::DataFix::apply`] call: which version
/// range this step covers, and which type it's migrating. Distinct from
/// [`UpdateDiagnostics`], which the *caller* of [`Fixer::update`] receives
/// back; a fix only ever sees this, never the accumulated log.
#[derive(Debug, Clone)]
pub struct FixerContext {
    pub current_version: DataVersion,
    pub from_version: DataVersion,
    pub to_version: DataVersion,
    pub type_reference: TypeReference,
}

/// One fix's contribution to an [`UpdateDiagnostics`] log.
#[derive(Debug, Clone)]
pub struct FixDiagnostic {
    pub fix_name: String,
    pub duration: Duration,
    pub before: String,
    pub after: String,
}

/// Recorded only when [`Fixer::with_diagnostics`] is enabled (off by
/// default): a snapshot of the document before and after the run, plus
/// one entry per fix actually applied. Snapshots are rendered with
/// `{:?}` and truncated to [`Fixer::with_max_snapshot_len`] characters.
#[derive(Debug, Clone, Default)]
pub struct UpdateDiagnostics {
    pub input_snapshot: String,
    pub output_snapshot: String,
    pub total_duration: Duration,
    pub fixes: Vec<FixDiagnostic>,
}

/// The result of [`Fixer::update`]: the migrated document, plus a
/// diagnostic log if one was requested.
pub struct UpdateOutcome<T> {
    pub result: Dynamic<T>,
    pub diagnostics: Option<UpdateDiagnostics>,
}

fn snapshot<T: fmt::Debug>(value: &Dynamic<T>, max_len: Option<usize>) -> String {
    let rendered = match value.value() {
        Ok(v) => format!("{v:?}"),
        Err(e) => format!("<unreadable: {e}>"),
    };
    match max_len {
        Some(max) if rendered.chars().count() > max => {
            let truncated: String = rendered.chars().take(max).collect();
            format!("{truncated}... (truncated)")
        }
        _ => rendered,
    }
}

/// Walks a single [`FixRegistry`] against a single [`SchemaRegistry`], up
/// to `current_version`. Both registries are frozen the moment a `Fixer`
/// is built from them; migrations run against a fixed, closed set of
/// fixes and schemas. `Arc`, not `Rc`: a frozen `Fixer` is `Send + Sync`
/// and may be shared across threads to drive concurrent migrations.
pub struct Fixer<T> {
    current_version: DataVersion,
    schemas: Arc<SchemaRegistry>,
    fixes: Arc<FixRegistry<T>>,
    diagnostics_enabled: bool,
    max_snapshot_len: Option<usize>,
}

impl<T> fmt::Debug for Fixer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixer")
            .field("current_version", &self.current_version)
            .field("diagnostics_enabled", &self.diagnostics_enabled)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + fmt::Debug + 'static> Fixer<T> {
    #[must_use]
    pub fn new(current_version: DataVersion, schemas: Arc<SchemaRegistry>, fixes: Arc<FixRegistry<T>>) -> Self {
        schemas.freeze();
        fixes.freeze();
        Fixer {
            current_version,
            schemas,
            fixes,
            diagnostics_enabled: false,
            max_snapshot_len: None,
        }
    }

    /// Builds a fresh [`SchemaRegistry`] and [`FixRegistry`], asks
    /// `bootstrap` to populate both, then freezes them into a `Fixer`,
    /// schemas first, fixes second, matching the order a fix's `from`
    /// type is expected to already be registered.
    pub fn bootstrap(current_version: DataVersion, bootstrap: &(impl Bootstrap<T> + ?Sized)) -> Result<Self, FrozenRegistryError> {
        let schemas = Arc::new(SchemaRegistry::new());
        bootstrap.register_schemas(&schemas)?;
        let fixes = Arc::new(FixRegistry::new());
        bootstrap.register_fixes(&fixes)?;
        Ok(Fixer::new(current_version, schemas, fixes))
    }

    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics_enabled = enabled;
        self
    }

    /// Caps rendered snapshot length; beyond it, a snapshot is cut off
    /// with an `"... (truncated)"` suffix. Has no effect unless
    /// diagnostics are enabled.
    #[must_use]
    pub fn with_max_snapshot_len(mut self, max_len: usize) -> Self {
        self.max_snapshot_len = Some(max_len);
        self
    }

    #[must_use]
    pub fn current_version(&self) -> DataVersion {
        self.current_version
    }

    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    #[must_use]
    pub fn fixes(&self) -> &Arc<FixRegistry<T>> {
        &self.fixes
    }

    /// Migrates `input`, declared as `type_reference`, from `from` to
    /// `to`. Requires `from <= to <= self.current_version()`; returns
    /// `input` unchanged (but still snapshotted, if diagnostics are on)
    /// when `from == to`.
    #[tracing::instrument(level = "debug", skip(self, input), fields(type_reference = %type_reference))]
    pub fn update(
        &self,
        type_reference: &TypeReference,
        input: Dynamic<T>,
        from: DataVersion,
        to: DataVersion,
    ) -> Result<UpdateOutcome<T>, FixerError> {
        if from > to {
            return Err(FixerError::illegal_argument(format!(
                "fromVersion ({from}) must be <= toVersion ({to})"
            )));
        }
        if to > self.current_version {
            return Err(FixerError::illegal_argument(format!(
                "toVersion ({to}) must be <= the fixer's current version ({})",
                self.current_version
            )));
        }

        let start = Instant::now();
        let mut diagnostics = self.diagnostics_enabled.then(|| UpdateDiagnostics {
            input_snapshot: snapshot(&input, self.max_snapshot_len),
            ..UpdateDiagnostics::default()
        });

        if from == to {
            if let Some(d) = diagnostics.as_mut() {
                d.output_snapshot = snapshot(&input, self.max_snapshot_len);
                d.total_duration = start.elapsed();
            }
            return Ok(UpdateOutcome {
                result: input,
                diagnostics,
            });
        }

        let pending = self.fixes.get_fixes(type_reference, from, to);
        tracing::debug!(count = pending.len(), %from, %to, "applying fixes");

        let mut current = input;
        for entry in pending {
            let fix_start = Instant::now();
            let before = diagnostics.is_some().then(|| snapshot(&current, self.max_snapshot_len));

            let ctx = FixerContext {
                current_version: self.current_version,
                from_version: entry.fix.from_version(),
                to_version: entry.fix.to_version(),
                type_reference: type_reference.clone(),
            };

            current = entry.fix.apply(type_reference, current, &ctx).map_err(|cause| {
                FixerError::from(FixError {
                    fix_name: entry.fix.name().to_string(),
                    from_version: entry.fix.from_version(),
                    to_version: entry.fix.to_version(),
                    type_reference: type_reference.clone(),
                    cause: Some(cause),
                    backtrace: Backtrace::capture(),
                })
            })?;

            if let Some(error) = current.error() {
                return Err(FixerError::illegal_state(format!(
                    "fix {:?} left the document unreadable: {error}",
                    entry.fix.name()
                )));
            }

            if let Some(d) = diagnostics.as_mut() {
                d.fixes.push(FixDiagnostic {
                    fix_name: entry.fix.name().to_string(),
                    duration: fix_start.elapsed(),
                    before: before.expect("diagnostics enabled implies before was captured"),
                    after: snapshot(&current, self.max_snapshot_len),
                });
            }
        }

        if let Some(d) = diagnostics.as_mut() {
            d.output_snapshot = snapshot(&current, self.max_snapshot_len);
            d.total_duration = start.elapsed();
        }

        Ok(UpdateOutcome {
            result: current,
            diagnostics,
        })
    }

    /// Convenience overload that reads the type to migrate off the
    /// [`TaggedDynamic`] itself.
    pub fn update_tagged(
        &self,
        tagged: TaggedDynamic<T>,
        from: DataVersion,
        to: DataVersion,
    ) -> Result<UpdateOutcome<T>, FixerError> {
        self.update(&tagged.type_reference, tagged.dynamic, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::DataFix;
    use crate::ops::test_support::{Json, JsonOps};
    use crate::types::Type;

    fn player_dynamic(hp: i32) -> Dynamic<Json> {
        let ops: Arc<dyn crate::ops::Ops<Json>> = Arc::new(JsonOps);
        let root = Dynamic::new(Arc::clone(&ops), ops.empty_map());
        root.set("hp", &root.create_int(hp))
    }

    fn fixer_with(fixes: Vec<DataFix<Json>>, current_version: i32) -> Fixer<Json> {
        let registry = Arc::new(FixRegistry::new());
        let player = TypeReference::from("player");
        for fix in fixes {
            registry.register(player.clone(), fix).unwrap();
        }
        let schemas = Arc::new(SchemaRegistry::new());
        schemas
            .register(crate::schema::Schema::new(DataVersion::new(0), None, || {
                vec![(TypeReference::from("player"), Type::Int)]
            }))
            .unwrap();
        Fixer::new(DataVersion::new(current_version), schemas, registry)
    }

    #[test]
    fn identity_when_from_equals_to() {
        let fixer = fixer_with(vec![], 5);
        let outcome = fixer
            .update(&TypeReference::from("player"), player_dynamic(10), DataVersion::new(3), DataVersion::new(3))
            .unwrap();
        assert_eq!(outcome.result.get("hp").as_int().unwrap(), 10);
    }

    #[test]
    fn rejects_from_greater_than_to() {
        let fixer = fixer_with(vec![], 5);
        let err = fixer.update(&TypeReference::from("player"), player_dynamic(10), DataVersion::new(3), DataVersion::new(1));
        assert!(matches!(err, Err(FixerError::IllegalArgument { .. })));
    }

    #[test]
    fn rejects_to_greater_than_current_version() {
        let fixer = fixer_with(vec![], 5);
        let err = fixer.update(&TypeReference::from("player"), player_dynamic(10), DataVersion::new(0), DataVersion::new(9));
        assert!(matches!(err, Err(FixerError::IllegalArgument { .. })));
    }

    #[test]
    fn applies_in_range_fixes_in_order() {
        let double_hp = DataFix::new("double-hp", DataVersion::new(0), DataVersion::new(1), |_type, input, _ctx| {
            Ok(input.update("hp", |d| {
                let v = d.as_int().unwrap();
                d.create_int(v * 2)
            }))
        })
        .unwrap();
        let add_one = DataFix::new("add-one", DataVersion::new(1), DataVersion::new(2), |_type, input, _ctx| {
            Ok(input.update("hp", |d| {
                let v = d.as_int().unwrap();
                d.create_int(v + 1)
            }))
        })
        .unwrap();
        let fixer = fixer_with(vec![double_hp, add_one], 2);
        let outcome = fixer
            .update(&TypeReference::from("player"), player_dynamic(10), DataVersion::new(0), DataVersion::new(2))
            .unwrap();
        assert_eq!(outcome.result.get("hp").as_int().unwrap(), 21);
    }

    #[test]
    fn a_failing_fix_is_wrapped_into_fix_error() {
        #[derive(Debug)]
        struct Boom;
        impl fmt::Display for Boom {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "boom")
            }
        }
        impl std::error::Error for Boom {}

        let exploding = DataFix::new("exploding", DataVersion::new(0), DataVersion::new(1), |_type, _input, _ctx| {
            Err(Box::new(Boom) as Box<dyn std::error::Error + Send + Sync>)
        })
        .unwrap();
        let fixer = fixer_with(vec![exploding], 1);
        let err = fixer.update(&TypeReference::from("player"), player_dynamic(10), DataVersion::new(0), DataVersion::new(1));
        assert!(matches!(err, Err(FixerError::Fix { .. })));
    }

    #[test]
    fn diagnostics_are_off_by_default_and_populated_when_enabled() {
        let noop = DataFix::new("noop", DataVersion::new(0), DataVersion::new(1), |_type, input, _ctx| Ok(input)).unwrap();

        let fixer = fixer_with(vec![noop], 1);
        let outcome = fixer
            .update(&TypeReference::from("player"), player_dynamic(10), DataVersion::new(0), DataVersion::new(1))
            .unwrap();
        assert!(outcome.diagnostics.is_none());

        let registry = Arc::new(FixRegistry::new());
        let player = TypeReference::from("player");
        registry
            .register(
                player.clone(),
                DataFix::new("noop", DataVersion::new(0), DataVersion::new(1), |_type, input, _ctx| Ok(input)).unwrap(),
            )
            .unwrap();
        let schemas = Arc::new(SchemaRegistry::new());
        let fixer = Fixer::new(DataVersion::new(1), schemas, registry).with_diagnostics(true);
        let outcome = fixer.update(&player, player_dynamic(10), DataVersion::new(0), DataVersion::new(1)).unwrap();
        let diagnostics = outcome.diagnostics.unwrap();
        assert_eq!(diagnostics.fixes.len(), 1);
        assert_eq!(diagnostics.fixes[0].fix_name, "noop");
    }
}
