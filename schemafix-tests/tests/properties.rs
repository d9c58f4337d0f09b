//! The universal (quantified) invariants the engine is built to satisfy,
//! independent of any one migration scenario. Generative cases use
//! `proptest`; the rest are plain assertions where a handful of concrete
//! values already pin down the property.

use std::sync::Arc;

use proptest::prelude::*;
use schemafix_core::error::FrozenRegistryError;
use schemafix_core::fix::{DataFix, FixRegistry};
use schemafix_core::result::{DataResult, Lifecycle};
use schemafix_core::rules::{bottom_up, top_down, RewriteRule};
use schemafix_core::schema::SchemaRegistry;
use schemafix_core::types::template::{and, field, int_type, or, string_type};
use schemafix_core::types::typed::Typed;
use schemafix_core::types::Type;
use schemafix_core::{DataVersion, Dynamic, TypeReference};
use serde_json::Value;

use schemafix_tests::ops;

fn v(n: i32) -> DataVersion {
    DataVersion::new(n)
}

fn noop_fix(name: impl Into<String>, from: i32, to: i32) -> DataFix<Value> {
    DataFix::new(name, v(from), v(to), |_t, input, _ctx| Ok(input)).unwrap()
}

/// 1: registration closure, every returned fix's range sits inside the
/// queried `[from, to]`.
proptest! {
    #[test]
    fn registration_closure(ranges in prop::collection::vec((0i32..20, 1i32..21), 1..8), query in (0i32..20, 0i32..21)) {
        let registry = FixRegistry::new();
        let ty = TypeReference::from("t");
        for (i, (from, to)) in ranges.iter().enumerate() {
            if from < to {
                registry.register(ty.clone(), noop_fix(format!("f{i}"), *from, *to)).unwrap();
            }
        }
        let (qfrom, qto) = query;
        if qfrom <= qto {
            let fixes = registry.get_fixes(&ty, v(qfrom), v(qto));
            for entry in &fixes {
                prop_assert!(entry.fix.from_version() >= v(qfrom));
                prop_assert!(entry.fix.to_version() <= v(qto));
            }
        }
    }
}

/// 2: ordering stability, ascending `fromVersion`, ties broken by
/// registration order.
#[test]
fn ordering_stability() {
    let registry = FixRegistry::new();
    let ty = TypeReference::from("t");
    registry.register(ty.clone(), noop_fix("b-first", 2, 3)).unwrap();
    registry.register(ty.clone(), noop_fix("a-second", 0, 1)).unwrap();
    registry.register(ty.clone(), noop_fix("c-same-from-first", 2, 3)).unwrap();

    let fixes = registry.get_fixes(&ty, v(0), v(3));
    let names: Vec<&str> = fixes.iter().map(|e| e.fix.name()).collect();
    assert_eq!(names, vec!["a-second", "b-first", "c-same-from-first"]);
}

/// 3: identity at the same version, `update(type, d, v, v) == d`, for
/// any registered fixes and any readable document.
#[test]
fn identity_at_same_version() {
    use schemafix_core::Fixer;

    let registry = Arc::new(FixRegistry::new());
    let ty = TypeReference::from("t");
    registry.register(ty.clone(), noop_fix("irrelevant", 0, 5)).unwrap();
    let schemas = Arc::new(SchemaRegistry::new());
    let fixer = Fixer::new(v(5), schemas, registry);

    let ops = ops();
    let doc = Dynamic::new(Arc::clone(&ops), ops.empty_map()).set("k", &Dynamic::new(Arc::clone(&ops), ops.create_int(1)));
    let outcome = fixer.update(&ty, doc.clone(), v(3), v(3)).unwrap();

    assert_eq!(outcome.result.get("k").as_int().unwrap(), doc.get("k").as_int().unwrap());
}

/// 4: template constancy, a primitive template resolves to the same
/// `Type` regardless of which family it's applied against (it never
/// references `id(_)`, so the family is irrelevant to it).
#[test]
fn template_constancy() {
    let family_a = schemafix_core::TypeFamily::build(vec![string_type()]).unwrap();
    let family_b = schemafix_core::TypeFamily::build(vec![string_type(), string_type()]).unwrap();

    let p = int_type();
    assert_eq!(p.apply(&family_a).unwrap().describe(), p.apply(&family_b).unwrap().describe());
}

/// 5: template associativity, `and`/`or` associate to the right.
#[test]
fn template_associativity_is_right_leaning() {
    let anded = and(vec![int_type(), int_type(), int_type()]).unwrap().build().unwrap();
    assert_eq!(anded.describe(), "(int × (int × int))");

    let ored = or(vec![string_type(), string_type(), string_type()]).unwrap().build().unwrap();
    assert_eq!(ored.describe(), "(String + (String + String))");
}

/// 6: `withChildren`/`children` round-trip for every node shape a fix
/// actually walks, not just the leaves.
#[test]
fn with_children_children_roundtrip() {
    let ops = ops();
    let cases: Vec<(Type, Value)> = vec![
        (Type::Int, ops.create_int(7)),
        (
            Type::List(Box::new(Type::Int)),
            ops.create_list(vec![ops.create_int(1), ops.create_int(2), ops.create_int(3)]),
        ),
        (
            Type::Optional(Box::new(Type::Int)),
            ops.create_int(9),
        ),
        (Type::Optional(Box::new(Type::Int)), ops.empty()),
        (
            and(vec![field("hp", int_type()), field("name", string_type())]).unwrap().build().unwrap(),
            {
                let base = ops.empty_map();
                let base = ops.merge_to_map(&base, ops.create_string("hp"), ops.create_int(20)).unwrap();
                ops.merge_to_map(&base, ops.create_string("name"), ops.create_string("Steve")).unwrap()
            },
        ),
    ];

    for (ty, value) in cases {
        let node = Typed::new(ty, value);
        let children = node.children(ops.as_ref()).unwrap();
        let rebuilt = node.with_children(ops.as_ref(), children).unwrap();
        assert_eq!(rebuilt.value(), node.value());
    }
}

fn tracing_rule(order: Arc<std::sync::Mutex<Vec<String>>>) -> Arc<dyn RewriteRule<Value>> {
    Arc::new(move |node: &Typed<Value>, _ops: &dyn schemafix_core::ops::Ops<Value>| {
        order.lock().unwrap().push(node.type_of().describe());
        Ok(None)
    })
}

/// 7/8: `bottomUp`/`topDown` visit a `List(Int)` of `[1, 2, 3]` in the
/// documented orders.
#[test]
fn bottom_up_and_top_down_visit_in_the_documented_order() {
    let ops = ops();
    let ty = Type::List(Box::new(Type::Int));
    let value = ops.create_list(vec![ops.create_int(1), ops.create_int(2), ops.create_int(3)]);
    let node = Typed::new(ty, value);

    let bottom_order = Arc::new(std::sync::Mutex::new(Vec::new()));
    bottom_up(tracing_rule(Arc::clone(&bottom_order))).apply(&node, ops.as_ref()).unwrap();
    assert_eq!(*bottom_order.lock().unwrap(), vec!["int", "int", "int", "List<int>"]);

    let top_order = Arc::new(std::sync::Mutex::new(Vec::new()));
    top_down(tracing_rule(Arc::clone(&top_order))).apply(&node, ops.as_ref()).unwrap();
    assert_eq!(*top_order.lock().unwrap(), vec!["List<int>", "int", "int", "int"]);
}

/// 9: `Result` laws for `DataResult`.
#[test]
fn data_result_laws() {
    let a = DataResult::success(41);
    assert!(matches!(a.flat_map(|v| DataResult::success(v + 1)), DataResult::Success { value: 42, .. }));

    let err: DataResult<i32> = DataResult::error("boom");
    assert!(matches!(err.flat_map(|v: i32| DataResult::success(v + 1)), DataResult::Error { ref message, .. } if message == "boom"));

    let mapped = DataResult::success(41).map(|v| v + 1);
    assert!(matches!(mapped, DataResult::Success { value: 42, .. }));
}

/// 10: `apply2` propagates the first error.
#[test]
fn apply2_propagates_first_error() {
    let a: DataResult<i32> = DataResult::error("x");
    let b: DataResult<i32> = DataResult::error("y");
    match a.apply2(b, |x, y| x + y) {
        DataResult::Error { message, .. } => assert_eq!(message, "x"),
        other => panic!("expected error x, got {other:?}"),
    }

    let a: DataResult<i32> = DataResult::success(1);
    let b: DataResult<i32> = DataResult::error("y");
    match a.apply2(b, |x, y| x + y) {
        DataResult::Error { message, .. } => assert_eq!(message, "y"),
        other => panic!("expected error y, got {other:?}"),
    }
}

proptest! {
    /// A second facet of law 9, with a random payload rather than a single
    /// fixed value.
    #[test]
    fn data_result_map_matches_success_of_applied_f(x in any::<i32>()) {
        let mapped = DataResult::success(x).map(|v| v.wrapping_add(1));
        prop_assert!(matches!(mapped, DataResult::Success { value, .. } if value == x.wrapping_add(1)));
    }
}

#[test]
fn lifecycle_merge_prefers_experimental() {
    assert_eq!(Lifecycle::Stable.merge(Lifecycle::Stable), Lifecycle::Stable);
    assert_eq!(Lifecycle::Stable.merge(Lifecycle::Experimental), Lifecycle::Experimental);
    assert_eq!(Lifecycle::Experimental.merge(Lifecycle::Stable), Lifecycle::Experimental);
}

/// 11: round-tripping through a second `Ops` and back is the identity,
/// here "self-conversion" through the same `Ops`, which is the degenerate
/// case every real conversion must also satisfy.
#[test]
fn ops_round_trip_through_convert() {
    let ops = ops();
    let doc = Dynamic::new(Arc::clone(&ops), ops.empty_map())
        .set("name", &Dynamic::new(Arc::clone(&ops), ops.create_string("Steve")))
        .set("hp", &Dynamic::new(Arc::clone(&ops), ops.create_int(20)))
        .set("tags", &Dynamic::new(Arc::clone(&ops), ops.create_list(vec![ops.create_int(1), ops.create_int(2)])));

    let round_tripped = doc.convert(Arc::clone(&ops)).unwrap().convert(Arc::clone(&ops)).unwrap();

    assert_eq!(round_tripped.get("name").as_string().unwrap(), "Steve");
    assert_eq!(round_tripped.get("hp").as_int().unwrap(), 20);
    let tags: Vec<i32> = round_tripped.get("tags").as_list().unwrap().iter().map(|d| d.as_int().unwrap()).collect();
    assert_eq!(tags, vec![1, 2]);
}

/// 12: freeze immutability, mutating a frozen registry fails, every
/// query keeps working.
#[test]
fn freeze_immutability() {
    let registry = FixRegistry::new();
    let ty = TypeReference::from("t");
    registry.register(ty.clone(), noop_fix("before-freeze", 0, 1)).unwrap();
    registry.freeze();

    let err = registry.register(ty.clone(), noop_fix("after-freeze", 1, 2));
    assert!(matches!(err, Err(FrozenRegistryError { operation: "register" })));

    // Reads still succeed, any number of times.
    assert_eq!(registry.get_fixes(&ty, v(0), v(1)).len(), 1);
    assert_eq!(registry.get_fixes(&ty, v(0), v(1)).len(), 1);

    let schemas = SchemaRegistry::new();
    schemas.freeze();
    assert!(schemas.is_empty());
    assert!(schemas.get(v(0)).is_none());
}
