//! [`RewriteRule`]: a [`crate::types::Type`]-guided step that inspects a
//! [`Typed`] node and optionally replaces it, plus the combinators that
//! build bigger rules out of smaller ones.
//!
//! A rule returning `None` means "not applicable here, leave unchanged",
//! every combinator composes on that signal rather than forcing every leaf
//! rule to special-case the identity transform.

use std::sync::Arc;

use crate::dynamic::Dynamic;
use crate::error::OpsResult;
use crate::finder::Finder;
use crate::ops::Ops;
use crate::reference::TypeReference;
use crate::types::typed::Typed;
use crate::types::Type;

/// `Send + Sync` so that `Arc<dyn RewriteRule<T>>` (the currency every
/// combinator here trades in) is itself thread-shareable, matching the
/// rest of the frozen, post-bootstrap engine state (`spec.md` §5).
pub trait RewriteRule<T>: Send + Sync {
    fn apply(&self, node: &Typed<T>, ops: &dyn Ops<T>) -> OpsResult<Option<Typed<T>>>;
}

impl<T, F> RewriteRule<T> for F
where
    F: Fn(&Typed<T>, &dyn Ops<T>) -> OpsResult<Option<Typed<T>>> + Send + Sync,
{
    fn apply(&self, node: &Typed<T>, ops: &dyn Ops<T>) -> OpsResult<Option<Typed<T>>> {
        self(node, ops)
    }
}

/// Restricts `rule` to nodes whose declared type is exactly `type_reference`.
pub fn for_type<T: Clone + 'static>(type_reference: TypeReference, rule: Arc<dyn RewriteRule<T>>) -> Arc<dyn RewriteRule<T>> {
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| {
        if node.type_of().reference() == type_reference {
            rule.apply(node, ops)
        } else {
            Ok(None)
        }
    })
}

/// Applies every rule in order, threading each one's output into the
/// next. `Some` iff at least one rule in the chain changed the node.
pub fn seq<T: Clone + 'static>(rules: Vec<Arc<dyn RewriteRule<T>>>) -> Arc<dyn RewriteRule<T>> {
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| {
        let mut current = node.clone();
        let mut changed = false;
        for rule in &rules {
            if let Some(next) = rule.apply(&current, ops)? {
                current = next;
                changed = true;
            }
        }
        Ok(changed.then_some(current))
    })
}

/// Tries each rule in order, returning the first one that applies.
pub fn or_else<T: Clone + 'static>(rules: Vec<Arc<dyn RewriteRule<T>>>) -> Arc<dyn RewriteRule<T>> {
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| {
        for rule in &rules {
            if let Some(next) = rule.apply(node, ops)? {
                return Ok(Some(next));
            }
        }
        Ok(None)
    })
}

/// Applies `rule` to every immediate child (one level, no recursion),
/// rebuilding the node iff at least one child changed.
pub fn all<T: Clone + 'static>(rule: Arc<dyn RewriteRule<T>>) -> Arc<dyn RewriteRule<T>> {
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| {
        let children = node.children(ops)?;
        let mut changed = false;
        let mut new_children = Vec::with_capacity(children.len());
        for child in children {
            match rule.apply(&child, ops)? {
                Some(next) => {
                    changed = true;
                    new_children.push(next);
                }
                None => new_children.push(child),
            }
        }
        if changed {
            Ok(Some(node.with_children(ops, new_children)?))
        } else {
            Ok(None)
        }
    })
}

/// Applies `rule` to each immediate child in turn, stopping at (and
/// rebuilding around) the first one that changes. Later children are
/// never tried once one has matched.
pub fn one<T: Clone + 'static>(rule: Arc<dyn RewriteRule<T>>) -> Arc<dyn RewriteRule<T>> {
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| {
        let children = node.children(ops)?;
        for (index, child) in children.iter().enumerate() {
            if let Some(next) = rule.apply(child, ops)? {
                let mut new_children = children.clone();
                new_children[index] = next;
                return Ok(Some(node.with_children(ops, new_children)?));
            }
        }
        Ok(None)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Rewrite this node, then its rebuilt children.
    TopDown,
    /// Rewrite the children first, then the node rebuilt from them.
    BottomUp,
}

/// Applies `rule` at every node of the tree rooted at `node`, recursing in
/// the given [`TraversalOrder`]. `Some` iff any node anywhere in the tree
/// changed.
pub fn everywhere<T: Clone + 'static>(rule: Arc<dyn RewriteRule<T>>, order: TraversalOrder) -> Arc<dyn RewriteRule<T>> {
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| walk(&rule, order, node, ops))
}

pub fn top_down<T: Clone + 'static>(rule: Arc<dyn RewriteRule<T>>) -> Arc<dyn RewriteRule<T>> {
    everywhere(rule, TraversalOrder::TopDown)
}

pub fn bottom_up<T: Clone + 'static>(rule: Arc<dyn RewriteRule<T>>) -> Arc<dyn RewriteRule<T>> {
    everywhere(rule, TraversalOrder::BottomUp)
}

fn walk<T: Clone>(
    rule: &Arc<dyn RewriteRule<T>>,
    order: TraversalOrder,
    node: &Typed<T>,
    ops: &dyn Ops<T>,
) -> OpsResult<Option<Typed<T>>> {
    match order {
        TraversalOrder::TopDown => {
            let (current, mut changed) = match rule.apply(node, ops)? {
                Some(next) => (next, true),
                None => (node.clone(), false),
            };
            let children = current.children(ops)?;
            let mut new_children = Vec::with_capacity(children.len());
            for child in &children {
                match walk(rule, order, child, ops)? {
                    Some(next) => {
                        changed = true;
                        new_children.push(next);
                    }
                    None => new_children.push(child.clone()),
                }
            }
            if changed {
                Ok(Some(current.with_children(ops, new_children)?))
            } else {
                Ok(None)
            }
        }
        TraversalOrder::BottomUp => {
            let children = node.children(ops)?;
            let mut children_changed = false;
            let mut new_children = Vec::with_capacity(children.len());
            for child in &children {
                match walk(rule, order, child, ops)? {
                    Some(next) => {
                        children_changed = true;
                        new_children.push(next);
                    }
                    None => new_children.push(child.clone()),
                }
            }
            let rebuilt = if children_changed {
                node.with_children(ops, new_children)?
            } else {
                node.clone()
            };
            match rule.apply(&rebuilt, ops)? {
                Some(next) => Ok(Some(next)),
                None if children_changed => Ok(Some(rebuilt)),
                None => Ok(None),
            }
        }
    }
}

/// Renames a record's field, leaving its value untouched. A no-op if the
/// old name is absent.
pub fn rename_field<T: Clone + 'static>(old_name: impl Into<String>, new_name: impl Into<String>) -> Arc<dyn RewriteRule<T>> {
    let old_name = old_name.into();
    let new_name = new_name.into();
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| -> OpsResult<Option<Typed<T>>> {
        let old_key = ops.create_string(&old_name);
        match ops.get(node.value(), &old_key) {
            Ok(field_value) => {
                let without_old = ops.remove(node.value(), &old_key)?;
                let new_key = ops.create_string(&new_name);
                let with_new = ops.merge_to_map(&without_old, new_key, field_value)?;
                Ok(Some(Typed::new(node.type_of().clone(), with_new)))
            }
            Err(_) => Ok(None),
        }
    })
}

/// Sets a record field to a constant value, overwriting any existing
/// entry, the usual way to backfill a newly-added, previously-absent
/// field during a migration.
pub fn add_field<T: Clone + Send + Sync + 'static>(name: impl Into<String>, value: T) -> Arc<dyn RewriteRule<T>> {
    let name = name.into();
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| -> OpsResult<Option<Typed<T>>> {
        let key = ops.create_string(&name);
        let updated = ops.merge_to_map(node.value(), key, value.clone())?;
        Ok(Some(Typed::new(node.type_of().clone(), updated)))
    })
}

/// Drops a record field. A no-op if it's already absent.
pub fn remove_field<T: Clone + 'static>(name: impl Into<String>) -> Arc<dyn RewriteRule<T>> {
    let name = name.into();
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| -> OpsResult<Option<Typed<T>>> {
        let key = ops.create_string(&name);
        match ops.get(node.value(), &key) {
            Ok(_) => Ok(Some(Typed::new(node.type_of().clone(), ops.remove(node.value(), &key)?))),
            Err(_) => Ok(None),
        }
    })
}

/// Applies `rule` to the value of the named field, wherever it sits in a
/// chain of right-associative `Product(Field(...), ...)` records, leaving
/// every other field untouched.
pub fn transform_field<T: Clone + 'static>(name: impl Into<String>, rule: Arc<dyn RewriteRule<T>>) -> Arc<dyn RewriteRule<T>> {
    let name = name.into();
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| transform_field_at(&name, &rule, node, ops))
}

fn transform_field_at<T: Clone + 'static>(
    name: &str,
    rule: &Arc<dyn RewriteRule<T>>,
    node: &Typed<T>,
    ops: &dyn Ops<T>,
) -> OpsResult<Option<Typed<T>>> {
    match node.type_of() {
        Type::Field(field_name, _) if field_name == name => {
            let mut children = node.children(ops)?;
            let child = children.remove(0);
            match rule.apply(&child, ops)? {
                Some(next) => Ok(Some(node.with_children(ops, vec![next])?)),
                None => Ok(None),
            }
        }
        Type::Product(left, _) if matches!(left.as_ref(), Type::Field(field_name, _) if field_name == name) => {
            let mut children = node.children(ops)?;
            let right_child = children.pop().expect("Product has exactly two children");
            let left_child = children.pop().expect("Product has exactly two children");
            match rule.apply(&left_child, ops)? {
                Some(next) => Ok(Some(node.with_children(ops, vec![next, right_child])?)),
                None => Ok(None),
            }
        }
        Type::Product(_, _) => {
            let mut children = node.children(ops)?;
            let right_child = children.pop().expect("Product has exactly two children");
            let left_child = children.pop().expect("Product has exactly two children");
            match transform_field_at(name, rule, &right_child, ops)? {
                Some(next_right) => Ok(Some(node.with_children(ops, vec![left_child, next_right])?)),
                None => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

/// Maps a raw-value function over a node's value, regardless of its type.
/// The general-purpose escape hatch for transforms the structural
/// combinators above don't fit.
pub fn transform<T: Clone + 'static>(f: impl Fn(&T, &dyn Ops<T>) -> OpsResult<Option<T>> + Send + Sync + 'static) -> Arc<dyn RewriteRule<T>> {
    Arc::new(move |node: &Typed<T>, ops: &dyn Ops<T>| {
        Ok(f(node.value(), ops)?.map(|value| Typed::new(node.type_of().clone(), value)))
    })
}

/// Applies `f` at the location `finder` addresses within `dynamic`,
/// leaving everything else untouched, the [`Dynamic`]/[`Finder`]
/// counterpart of [`transform_field`], for fixes that navigate by path
/// rather than by declared type.
pub fn transform_at<T: Clone + 'static>(dynamic: &Dynamic<T>, finder: &Finder<T>, f: impl FnOnce(Dynamic<T>) -> Dynamic<T>) -> Dynamic<T> {
    finder.modify(dynamic, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{Json, JsonOps};

    fn ops() -> JsonOps {
        JsonOps
    }

    fn record(ops: &JsonOps, entries: Vec<(&str, Json)>) -> Json {
        entries
            .into_iter()
            .fold(ops.empty_map(), |acc, (k, v)| ops.merge_to_map(&acc, ops.create_string(k), v).unwrap())
    }

    fn field_chain() -> Type {
        Type::Product(
            Box::new(Type::Field("hp".into(), Box::new(Type::Int))),
            Box::new(Type::Field("name".into(), Box::new(Type::String))),
        )
    }

    #[test]
    fn for_type_only_applies_to_matching_reference() {
        let ops = ops();
        let node = Typed::new(Type::Named("Player".to_string(), Box::new(Type::Int)), ops.create_int(1));
        let double: Arc<dyn RewriteRule<Json>> = transform(|v, ops| Ok(Some(ops.create_int(ops.get_number_value(v)? as i32 * 2))));
        let gated = for_type(TypeReference::from("Player"), double.clone());
        assert!(gated.apply(&node, &ops).unwrap().is_some());

        let other = Typed::new(Type::Named("Item".to_string(), Box::new(Type::Int)), ops.create_int(1));
        assert!(gated.apply(&other, &ops).unwrap().is_none());
    }

    #[test]
    fn seq_reports_unchanged_when_no_rule_applies() {
        let ops = ops();
        let node = Typed::new(Type::Int, ops.create_int(1));
        let noop: Arc<dyn RewriteRule<Json>> = Arc::new(|_n: &Typed<Json>, _o: &dyn Ops<Json>| Ok(None));
        let rule = seq(vec![noop.clone(), noop]);
        assert!(rule.apply(&node, &ops).unwrap().is_none());
    }

    #[test]
    fn or_else_returns_first_applicable_rule() {
        let ops = ops();
        let node = Typed::new(Type::Int, ops.create_int(1));
        let miss: Arc<dyn RewriteRule<Json>> = Arc::new(|_n: &Typed<Json>, _o: &dyn Ops<Json>| Ok(None));
        let hit: Arc<dyn RewriteRule<Json>> = transform(|_v, ops| Ok(Some(ops.create_int(99))));
        let rule = or_else(vec![miss, hit]);
        let result = rule.apply(&node, &ops).unwrap().unwrap();
        assert_eq!(*result.value(), ops.create_int(99));
    }

    #[test]
    fn all_rebuilds_when_any_child_changes() {
        let ops = ops();
        let ty = Type::List(Box::new(Type::Int));
        let value = ops.create_list(vec![ops.create_int(1), ops.create_int(2)]);
        let node = Typed::new(ty, value);
        let increment: Arc<dyn RewriteRule<Json>> = transform(|v, ops| Ok(Some(ops.create_int(ops.get_number_value(v)? as i32 + 1))));
        let result = all(increment).apply(&node, &ops).unwrap().unwrap();
        let items: Vec<i32> = ops.get_list(result.value()).unwrap().iter().map(|v| ops.get_number_value(v).unwrap() as i32).collect();
        assert_eq!(items, vec![2, 3]);
    }

    #[test]
    fn one_stops_at_first_match() {
        let ops = ops();
        let ty = Type::List(Box::new(Type::Int));
        let value = ops.create_list(vec![ops.create_int(1), ops.create_int(1), ops.create_int(1)]);
        let node = Typed::new(ty, value);
        let mark_once: Arc<dyn RewriteRule<Json>> = transform(|v, ops| Ok(Some(ops.create_int(ops.get_number_value(v)? as i32 + 100))));
        let result = one(mark_once).apply(&node, &ops).unwrap().unwrap();
        let items: Vec<i32> = ops.get_list(result.value()).unwrap().iter().map(|v| ops.get_number_value(v).unwrap() as i32).collect();
        assert_eq!(items, vec![101, 1, 1]);
    }

    #[test]
    fn top_down_visits_parent_before_children() {
        let ops = ops();
        let ty = Type::List(Box::new(Type::List(Box::new(Type::Int))));
        let value = ops.create_list(vec![ops.create_list(vec![ops.create_int(1)])]);
        let node = Typed::new(ty, value);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order_clone = Arc::clone(&order);
        let record_visit: Arc<dyn RewriteRule<Json>> = Arc::new(move |n: &Typed<Json>, _o: &dyn Ops<Json>| {
            order_clone.lock().unwrap().push(n.type_of().describe());
            Ok(None)
        });
        top_down(record_visit).apply(&node, &ops).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["List<List<int>>", "List<int>", "int"]);
    }

    #[test]
    fn bottom_up_visits_children_before_parent() {
        let ops = ops();
        let ty = Type::List(Box::new(Type::List(Box::new(Type::Int))));
        let value = ops.create_list(vec![ops.create_list(vec![ops.create_int(1)])]);
        let node = Typed::new(ty, value);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order_clone = Arc::clone(&order);
        let record_visit: Arc<dyn RewriteRule<Json>> = Arc::new(move |n: &Typed<Json>, _o: &dyn Ops<Json>| {
            order_clone.lock().unwrap().push(n.type_of().describe());
            Ok(None)
        });
        bottom_up(record_visit).apply(&node, &ops).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["int", "List<int>", "List<List<int>>"]);
    }

    #[test]
    fn rename_field_preserves_value_and_drops_old_key() {
        let ops = ops();
        let ty = Type::Field("hp".into(), Box::new(Type::Int));
        let value = record(&ops, vec![("hp", ops.create_int(20))]);
        let node = Typed::new(ty, value);
        let renamed = rename_field("hp", "health").apply(&node, &ops).unwrap().unwrap();
        assert_eq!(ops.get_number_value(&ops.get(renamed.value(), &ops.create_string("health")).unwrap()).unwrap(), 20.0);
        assert!(ops.get(renamed.value(), &ops.create_string("hp")).is_err());
    }

    #[test]
    fn add_field_sets_a_constant_value() {
        let ops = ops();
        let ty = Type::Field("hp".into(), Box::new(Type::Int));
        let value = record(&ops, vec![("hp", ops.create_int(20))]);
        let node = Typed::new(ty, value);
        let added = add_field("level", ops.create_int(1)).apply(&node, &ops).unwrap().unwrap();
        assert_eq!(ops.get_number_value(&ops.get(added.value(), &ops.create_string("level")).unwrap()).unwrap(), 1.0);
    }

    #[test]
    fn remove_field_is_a_noop_when_absent() {
        let ops = ops();
        let ty = Type::Field("hp".into(), Box::new(Type::Int));
        let value = record(&ops, vec![("hp", ops.create_int(20))]);
        let node = Typed::new(ty, value);
        assert!(remove_field::<Json>("missing").apply(&node, &ops).unwrap().is_none());
    }

    #[test]
    fn transform_field_locates_a_field_deep_in_the_product_chain() {
        let ops = ops();
        let ty = field_chain();
        let value = record(&ops, vec![("hp", ops.create_int(20)), ("name", ops.create_string("Steve"))]);
        let node = Typed::new(ty, value);
        let uppercase: Arc<dyn RewriteRule<Json>> = transform(|v, ops| Ok(Some(ops.create_string(&ops.get_string_value(v)?.to_uppercase()))));
        let rewritten = transform_field("name", uppercase).apply(&node, &ops).unwrap().unwrap();
        assert_eq!(
            ops.get_string_value(&ops.get(rewritten.value(), &ops.create_string("name")).unwrap()).unwrap(),
            "STEVE"
        );
        assert_eq!(ops.get_number_value(&ops.get(rewritten.value(), &ops.create_string("hp")).unwrap()).unwrap(), 20.0);
    }
}
