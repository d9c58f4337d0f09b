//! DSL for building [`Type`] values. A [`TypeTemplate`] is a deferred
//! builder; it only becomes a concrete `Type` when [`TypeTemplate::build`]
//! or [`TypeTemplate::apply`] resolves it, which is also where recursion
//! points get tied.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{
    RecursionPointAlreadyResolvedSnafu, RecursionPointOutOfRangeSnafu, RequiresAtLeastTwoSnafu,
    TemplateError,
};

use super::{RecursiveCell, Type};

/// Handle passed into a [`recursive`] body, standing in for "the whole
/// recursive type being defined" (`µ0`). Has no behaviour of its own; it
/// exists so `recursive`'s body closure has something to name.
#[derive(Debug, Clone, Copy)]
pub struct SelfRef;

impl From<SelfRef> for TypeTemplate {
    fn from(_: SelfRef) -> Self {
        TypeTemplate::SelfRef
    }
}

#[derive(Debug, Clone)]
pub enum TypeTemplate {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    List(Box<TypeTemplate>),
    Optional(Box<TypeTemplate>),
    Product(Box<TypeTemplate>, Box<TypeTemplate>),
    Sum(Box<TypeTemplate>, Box<TypeTemplate>),
    Field(String, Box<TypeTemplate>),
    Named(String, Box<TypeTemplate>),
    Remainder,
    TaggedChoice {
        tag_field: String,
        /// Accepted by `tagged_choice_typed` for construction-time
        /// validation. The structural algebra (`Type::TaggedChoice`) only
        /// carries the tag field name and branches, so this is resolved
        /// (to surface errors early) but not retained.
        discriminant: Option<Box<TypeTemplate>>,
        branches: Vec<(String, TypeTemplate)>,
    },
    /// `µ0` inside a [`recursive`] body.
    SelfRef,
    /// A reference to point `i` of the [`TypeFamily`] this template is
    /// resolved against.
    Id(usize),
    Recursive { name: String, body: Arc<TypeTemplate> },
}

#[derive(Clone, Copy)]
enum IdSource<'a> {
    /// Resolving the points of a family being built right now; points may
    /// still be unresolved, so references go through their shared cells.
    Lazy(&'a [RecursiveCell]),
    /// Resolving a template against an already-built family; every point
    /// is final, so references copy the resolved `Type` directly.
    Eager(&'a [Type]),
}

struct ResolveCtx<'a> {
    self_cell: Option<&'a RecursiveCell>,
    ids: IdSource<'a>,
}

impl TypeTemplate {
    fn resolve(&self, ctx: &ResolveCtx<'_>) -> Result<Type, TemplateError> {
        match self {
            TypeTemplate::Bool => Ok(Type::Bool),
            TypeTemplate::Byte => Ok(Type::Byte),
            TypeTemplate::Short => Ok(Type::Short),
            TypeTemplate::Int => Ok(Type::Int),
            TypeTemplate::Long => Ok(Type::Long),
            TypeTemplate::Float => Ok(Type::Float),
            TypeTemplate::Double => Ok(Type::Double),
            TypeTemplate::String => Ok(Type::String),
            TypeTemplate::Remainder => Ok(Type::Remainder),
            TypeTemplate::List(inner) => Ok(Type::List(Box::new(inner.resolve(ctx)?))),
            TypeTemplate::Optional(inner) => Ok(Type::Optional(Box::new(inner.resolve(ctx)?))),
            TypeTemplate::Product(a, b) => Ok(Type::Product(
                Box::new(a.resolve(ctx)?),
                Box::new(b.resolve(ctx)?),
            )),
            TypeTemplate::Sum(a, b) => Ok(Type::Sum(Box::new(a.resolve(ctx)?), Box::new(b.resolve(ctx)?))),
            TypeTemplate::Field(name, inner) => {
                Ok(Type::Field(name.clone(), Box::new(inner.resolve(ctx)?)))
            }
            TypeTemplate::Named(name, inner) => {
                Ok(Type::Named(name.clone(), Box::new(inner.resolve(ctx)?)))
            }
            TypeTemplate::TaggedChoice {
                tag_field,
                discriminant,
                branches,
            } => {
                if let Some(discriminant) = discriminant {
                    discriminant.resolve(ctx)?;
                }
                let resolved = branches
                    .iter()
                    .map(|(tag, template)| Ok((tag.clone(), template.resolve(ctx)?)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::TaggedChoice {
                    tag_field: tag_field.clone(),
                    branches: resolved,
                })
            }
            TypeTemplate::SelfRef => {
                let cell = ctx
                    .self_cell
                    .ok_or_else(|| RecursionPointOutOfRangeSnafu { index: 0usize }.build())?;
                Ok(Type::RecursivePoint {
                    index: 0,
                    body: Arc::clone(cell),
                })
            }
            TypeTemplate::Id(index) => match ctx.ids {
                IdSource::Lazy(cells) => {
                    let cell = cells
                        .get(*index)
                        .ok_or_else(|| RecursionPointOutOfRangeSnafu { index: *index }.build())?;
                    Ok(Type::RecursivePoint {
                        index: *index,
                        body: Arc::clone(cell),
                    })
                }
                IdSource::Eager(points) => points
                    .get(*index)
                    .cloned()
                    .ok_or_else(|| RecursionPointOutOfRangeSnafu { index: *index }.build()),
            },
            TypeTemplate::Recursive { name, body } => {
                let cell: RecursiveCell = Arc::new(OnceCell::new());
                let inner_ctx = ResolveCtx {
                    self_cell: Some(&cell),
                    ids: ctx.ids,
                };
                let resolved_body = body.resolve(&inner_ctx)?;
                cell.set(resolved_body)
                    .map_err(|_| RecursionPointAlreadyResolvedSnafu { index: 0usize }.build())?;
                Ok(Type::Recursive {
                    name: name.clone(),
                    cell,
                })
            }
        }
    }

    /// Resolves a standalone template with no enclosing family. The
    /// common case: a single self-recursive definition built with
    /// [`recursive`], where every reference is `self`, not `id(i)`.
    pub fn build(&self) -> Result<Type, TemplateError> {
        let ctx = ResolveCtx {
            self_cell: None,
            ids: IdSource::Eager(&[]),
        };
        self.resolve(&ctx)
    }

    /// Resolves this template against an already-built family, so any
    /// `id(i)` it contains picks up `family`'s `i`-th point.
    pub fn apply(&self, family: &TypeFamily) -> Result<Type, TemplateError> {
        let ctx = ResolveCtx {
            self_cell: None,
            ids: IdSource::Eager(&family.points),
        };
        self.resolve(&ctx)
    }
}

fn right_assoc(mut items: Vec<TypeTemplate>, ctor: fn(Box<TypeTemplate>, Box<TypeTemplate>) -> TypeTemplate) -> TypeTemplate {
    let last = items.pop().expect("caller checked len >= 2");
    items.into_iter().rev().fold(last, |acc, item| ctor(Box::new(item), Box::new(acc)))
}

/// A set of mutually-recursive [`TypeTemplate`]s resolved together, so
/// `id(i)` inside any of them can reach any of the others (including
/// itself) regardless of build order.
pub struct TypeFamily {
    points: Vec<Type>,
}

impl TypeFamily {
    pub fn build(templates: Vec<TypeTemplate>) -> Result<TypeFamily, TemplateError> {
        let cells: Vec<RecursiveCell> = (0..templates.len()).map(|_| Arc::new(OnceCell::new())).collect();
        let mut points = Vec::with_capacity(templates.len());
        for template in &templates {
            let ctx = ResolveCtx {
                self_cell: None,
                ids: IdSource::Lazy(&cells),
            };
            points.push(template.resolve(&ctx)?);
        }
        for (index, (cell, ty)) in cells.iter().zip(points.iter()).enumerate() {
            cell.set(ty.clone())
                .map_err(|_| RecursionPointAlreadyResolvedSnafu { index }.build())?;
        }
        Ok(TypeFamily { points })
    }

    pub fn get(&self, index: usize) -> Result<&Type, TemplateError> {
        self.points
            .get(index)
            .ok_or_else(|| RecursionPointOutOfRangeSnafu { index }.build())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

pub fn bool_type() -> TypeTemplate {
    TypeTemplate::Bool
}
pub fn byte_type() -> TypeTemplate {
    TypeTemplate::Byte
}
pub fn short_type() -> TypeTemplate {
    TypeTemplate::Short
}
pub fn int_type() -> TypeTemplate {
    TypeTemplate::Int
}
pub fn long_type() -> TypeTemplate {
    TypeTemplate::Long
}
pub fn float_type() -> TypeTemplate {
    TypeTemplate::Float
}
pub fn double_type() -> TypeTemplate {
    TypeTemplate::Double
}
pub fn string_type() -> TypeTemplate {
    TypeTemplate::String
}

pub fn list(inner: impl Into<TypeTemplate>) -> TypeTemplate {
    TypeTemplate::List(Box::new(inner.into()))
}

pub fn optional(inner: impl Into<TypeTemplate>) -> TypeTemplate {
    TypeTemplate::Optional(Box::new(inner.into()))
}

pub fn and(templates: Vec<TypeTemplate>) -> Result<TypeTemplate, TemplateError> {
    if templates.len() < 2 {
        return RequiresAtLeastTwoSnafu { combinator: "and" }.fail();
    }
    Ok(right_assoc(templates, TypeTemplate::Product))
}

pub fn or(templates: Vec<TypeTemplate>) -> Result<TypeTemplate, TemplateError> {
    if templates.len() < 2 {
        return RequiresAtLeastTwoSnafu { combinator: "or" }.fail();
    }
    Ok(right_assoc(templates, TypeTemplate::Sum))
}

pub fn field(name: impl Into<String>, inner: impl Into<TypeTemplate>) -> TypeTemplate {
    TypeTemplate::Field(name.into(), Box::new(inner.into()))
}

pub fn optional_field(name: impl Into<String>, inner: impl Into<TypeTemplate>) -> TypeTemplate {
    TypeTemplate::Field(name.into(), Box::new(TypeTemplate::Optional(Box::new(inner.into()))))
}

pub fn named(name: impl Into<String>, inner: impl Into<TypeTemplate>) -> TypeTemplate {
    TypeTemplate::Named(name.into(), Box::new(inner.into()))
}

pub fn remainder() -> TypeTemplate {
    TypeTemplate::Remainder
}

pub fn tagged_choice(tag_field: impl Into<String>, branches: Vec<(String, TypeTemplate)>) -> TypeTemplate {
    TypeTemplate::TaggedChoice {
        tag_field: tag_field.into(),
        discriminant: None,
        branches,
    }
}

pub fn tagged_choice_typed(
    tag_field: impl Into<String>,
    discriminant: impl Into<TypeTemplate>,
    branches: Vec<(String, TypeTemplate)>,
) -> TypeTemplate {
    TypeTemplate::TaggedChoice {
        tag_field: tag_field.into(),
        discriminant: Some(Box::new(discriminant.into())),
        branches,
    }
}

pub fn id(index: usize) -> TypeTemplate {
    TypeTemplate::Id(index)
}

pub fn recursive(name: impl Into<String>, f: impl FnOnce(SelfRef) -> TypeTemplate) -> TypeTemplate {
    TypeTemplate::Recursive {
        name: name.into(),
        body: Arc::new(f(SelfRef)),
    }
}
