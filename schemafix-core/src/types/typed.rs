//! [`Typed`]: a [`Type`] paired with an encoded value, supporting the
//! `children`/`with_children` structural-recursion protocol every rewrite
//! combinator in [`crate::rules`] is built from.
//!
//! Two value-level conventions this module settles, since the pure type
//! algebra doesn't carry a wire format:
//! - A `Product` whose left slot is a [`Type::Field`] is record-shaped
//!   (value is a map, fields addressed by name); any other `Product` is
//!   tuple-shaped (value is a list, consumed positionally, cons-cell
//!   style). The choice is made per-node from `left`'s shape, so a chain
//!   of `Field`s reads the same shared map all the way down, each level
//!   pulling out one more key.
//! - `Optional(T)` absence has no dedicated wire value (`Ops::classify`
//!   has no null/unit kind), so absence is represented as
//!   `ops.empty()`/an empty list or map, and an absent optional field is
//!   omitted from its enclosing map entirely rather than written as that
//!   sentinel.

use crate::error::{IndexOutOfRangeSnafu, OpsResult, ShapeMismatchSnafu, WrongKindSnafu};
use crate::ops::{Ops, ValueKind};

use super::Type;

/// A value of format `T`, tagged with the [`Type`] describing its shape.
#[derive(Debug, Clone)]
pub struct Typed<T> {
    ty: Type,
    value: T,
}

impl<T: Clone> Typed<T> {
    #[must_use]
    pub fn new(ty: Type, value: T) -> Self {
        Typed { ty, value }
    }

    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    #[must_use]
    pub fn type_of(&self) -> &Type {
        &self.ty
    }

    /// Structurally decomposes this value into its immediate children,
    /// guided by `ty`. The inverse of [`Typed::with_children`]:
    /// `with_children(ops, children(ops)?)? == self` for any valid value.
    pub fn children(&self, ops: &dyn Ops<T>) -> OpsResult<Vec<Typed<T>>> {
        match &self.ty {
            Type::Bool
            | Type::Byte
            | Type::Short
            | Type::Int
            | Type::Long
            | Type::Float
            | Type::Double
            | Type::String
            | Type::Passthrough
            | Type::Remainder => Ok(Vec::new()),

            Type::List(elem) => {
                let items = ops.get_list(&self.value)?;
                Ok(items
                    .into_iter()
                    .map(|v| Typed::new((**elem).clone(), v))
                    .collect())
            }

            Type::Optional(elem) => {
                if is_absent(ops, &self.value)? {
                    Ok(Vec::new())
                } else {
                    Ok(vec![Typed::new((**elem).clone(), self.value.clone())])
                }
            }

            Type::Product(left, right) => {
                let (left_child, right_child) = decompose_product(ops, left, right, &self.value)?;
                Ok(vec![left_child, right_child])
            }

            Type::Sum(left, right) => Ok(vec![decompose_sum(ops, left, right, &self.value)?]),

            Type::Field(name, inner) => {
                let field_value = ops.get(&self.value, &ops.create_string(name))?;
                Ok(vec![Typed::new((**inner).clone(), field_value)])
            }

            Type::Named(_, inner) => Ok(vec![Typed::new((**inner).clone(), self.value.clone())]),

            Type::Recursive { cell, .. } | Type::RecursivePoint { body: cell, .. } => {
                let resolved = resolved_cell(cell)?;
                Typed::new(resolved, self.value.clone()).children(ops)
            }

            Type::TaggedChoice { tag_field, branches } => {
                let branch_ty = active_branch(ops, &self.value, tag_field, branches)?;
                Typed::new(branch_ty, self.value.clone()).children(ops)
            }
        }
    }

    /// Rebuilds a value of this same type from `new_children`, which must
    /// have exactly the shape `children(ops)` would have produced (same
    /// length for fixed-arity shapes; any length for `List`).
    pub fn with_children(&self, ops: &dyn Ops<T>, new_children: Vec<Typed<T>>) -> OpsResult<Typed<T>> {
        let value = match &self.ty {
            Type::Bool
            | Type::Byte
            | Type::Short
            | Type::Int
            | Type::Long
            | Type::Float
            | Type::Double
            | Type::String
            | Type::Passthrough
            | Type::Remainder => {
                require_arity("terminal", 0, &new_children)?;
                self.value.clone()
            }

            Type::List(_) => ops.create_list(new_children.into_iter().map(Typed::into_value).collect()),

            Type::Optional(_) => match new_children.len() {
                0 => ops.empty(),
                1 => new_children.into_iter().next().expect("checked len == 1").value,
                found => return ShapeMismatchSnafu { shape: "Optional", expected: 1usize, found }.fail(),
            },

            Type::Product(left, right) => {
                require_arity("Product", 2, &new_children)?;
                let mut children = new_children.into_iter();
                let left_child = children.next().expect("checked len == 2");
                let right_child = children.next().expect("checked len == 2");
                rebuild_product(ops, left, &left_child, &right_child)?
            }

            Type::Sum(left, right) => {
                require_arity("Sum", 1, &new_children)?;
                let child = new_children.into_iter().next().expect("checked len == 1");
                rebuild_sum(ops, left, right, &child)?
            }

            Type::Field(name, inner) => {
                require_arity("Field", 1, &new_children)?;
                let child = new_children.into_iter().next().expect("checked len == 1");
                merge_or_omit(ops, &self.value, name, inner, &child)?
            }

            Type::Named(_, _) => {
                require_arity("Named", 1, &new_children)?;
                new_children.into_iter().next().expect("checked len == 1").value
            }

            Type::Recursive { cell, .. } | Type::RecursivePoint { body: cell, .. } => {
                let resolved = resolved_cell(cell)?;
                Typed::new(resolved, self.value.clone())
                    .with_children(ops, new_children)?
                    .value
            }

            Type::TaggedChoice { tag_field, branches } => {
                let branch_ty = active_branch(ops, &self.value, tag_field, branches)?;
                Typed::new(branch_ty, self.value.clone())
                    .with_children(ops, new_children)?
                    .value
            }
        };
        Ok(Typed::new(self.ty.clone(), value))
    }
}

/// Resolves `tag_field` in `value` to the branch type it selects, for
/// [`Typed::children`]/[`Typed::with_children`] on a `TaggedChoice`.
fn active_branch<T>(ops: &dyn Ops<T>, value: &T, tag_field: &str, branches: &[(String, Type)]) -> OpsResult<Type> {
    let tag = ops.get_string_value(&ops.get(value, &ops.create_string(tag_field))?)?;
    branches
        .iter()
        .find(|(branch_tag, _)| *branch_tag == tag)
        .map(|(_, ty)| ty.clone())
        .ok_or_else(|| {
            WrongKindSnafu {
                expected: "a declared tag value",
                found: "an unrecognized tag",
            }
            .build()
        })
}

fn require_arity<T>(shape: &'static str, expected: usize, children: &[T]) -> OpsResult<()> {
    if children.len() == expected {
        Ok(())
    } else {
        ShapeMismatchSnafu { shape, expected, found: children.len() }.fail()
    }
}

fn resolved_cell(cell: &super::RecursiveCell) -> OpsResult<Type> {
    cell.get().cloned().ok_or_else(|| {
        WrongKindSnafu {
            expected: "a resolved recursive type",
            found: "an unresolved recursion point",
        }
        .build()
    })
}

/// Treats an empty map or empty list as the encoding of `Optional` absence,
/// per the module-level convention note.
fn is_absent<T>(ops: &dyn Ops<T>, value: &T) -> OpsResult<bool> {
    Ok(match ops.classify(value)? {
        ValueKind::Map(entries) => entries.is_empty(),
        ValueKind::List(items) => items.is_empty(),
        _ => false,
    })
}

fn decompose_product<T: Clone>(
    ops: &dyn Ops<T>,
    left: &Type,
    right: &Type,
    value: &T,
) -> OpsResult<(Typed<T>, Typed<T>)> {
    if let Type::Field(name, inner) = left {
        let field_value = match ops.get(value, &ops.create_string(name)) {
            Ok(v) => v,
            Err(err) => {
                if matches!(inner.as_ref(), Type::Optional(_)) {
                    ops.empty()
                } else {
                    return Err(err);
                }
            }
        };
        let left_child = Typed::new((**inner).clone(), field_value);
        let right_child = Typed::new(right.clone(), value.clone());
        Ok((left_child, right_child))
    } else {
        let items = ops.get_list(value)?;
        let Some((head, tail)) = items.split_first() else {
            return IndexOutOfRangeSnafu { index: 0usize, len: 0usize }.fail();
        };
        let left_child = Typed::new(left.clone(), head.clone());
        let right_child = Typed::new(right.clone(), ops.create_list(tail.to_vec()));
        Ok((left_child, right_child))
    }
}

fn rebuild_product<T: Clone>(
    ops: &dyn Ops<T>,
    left: &Type,
    left_child: &Typed<T>,
    right_child: &Typed<T>,
) -> OpsResult<T> {
    if let Type::Field(name, _) = left {
        merge_or_omit(ops, &right_child.value, name, &left_child.ty, left_child)
    } else {
        let tail = ops.get_list(&right_child.value)?;
        let mut items = Vec::with_capacity(tail.len() + 1);
        items.push(left_child.value.clone());
        items.extend(tail);
        Ok(ops.create_list(items))
    }
}

/// Writes `child`'s value under `name` in `base`, unless `child` is an
/// absent `Optional`, in which case the key is removed instead of being
/// set to the absence sentinel.
fn merge_or_omit<T: Clone>(
    ops: &dyn Ops<T>,
    base: &T,
    name: &str,
    field_inner: &Type,
    child: &Typed<T>,
) -> OpsResult<T> {
    let key = ops.create_string(name);
    if matches!(field_inner, Type::Optional(_)) && is_absent(ops, &child.value)? {
        ops.remove(base, &key)
    } else {
        ops.merge_to_map(base, key, child.value.clone())
    }
}

/// `Sum(left, right)` has no named wire convention in the algebra itself,
/// so it is encoded generically as a two-element list `[tag, payload]`
/// (`tag` 0 for `left`, 1 for `right`), the shape `Rules::everywhere` and
/// friends exercise when they walk a raw, unnamed sum.
fn decompose_sum<T: Clone>(ops: &dyn Ops<T>, left: &Type, right: &Type, value: &T) -> OpsResult<Typed<T>> {
    let items = ops.get_list(value)?;
    let [tag, payload] = <[T; 2]>::try_from(items).map_err(|items| {
        ShapeMismatchSnafu { shape: "Sum", expected: 2usize, found: items.len() }.build()
    })?;
    let tag = ops.get_number_value(&tag)?;
    if tag == 0.0 {
        Ok(Typed::new(left.clone(), payload))
    } else {
        Ok(Typed::new(right.clone(), payload))
    }
}

fn rebuild_sum<T: Clone>(ops: &dyn Ops<T>, left: &Type, right: &Type, child: &Typed<T>) -> OpsResult<T> {
    let tag = if child.ty.describe() == left.describe() {
        0
    } else {
        debug_assert_eq!(child.ty.describe(), right.describe());
        1
    };
    Ok(ops.create_list(vec![ops.create_int(tag), child.value.clone()]))
}
