//! The type algebra: a small, closed set of shape descriptors used to drive
//! structural rewriting. See [`template`] for the DSL that builds these and
//! [`typed`] for the value-level counterpart.

pub mod template;
pub mod typed;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::reference::TypeReference;

/// A recursive type's fixed point, shared by every `RecursivePoint` that
/// refers to it. Left unresolved (`None`) until the enclosing `Recursive`
/// finishes building, at which point it is filled in exactly once.
///
/// `Arc`/`sync::OnceCell` rather than `Rc`/`unsync::OnceCell`: schemas built
/// from these types are frozen into a [`crate::schema::SchemaRegistry`]
/// and shared across threads (see `spec.md` §5), so every persistent type
/// in the algebra must be `Send + Sync`.
pub type RecursiveCell = Arc<OnceCell<Type>>;

/// One node in the structural type algebra. Closed over a fixed set of
/// shapes rather than left open for extension: every combinator in
/// [`crate::rules`] pattern-matches on this enum instead of dispatching
/// through virtual methods.
#[derive(Clone)]
pub enum Type {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    /// Opaque: passed through untouched, described but never decomposed.
    Passthrough,
    List(Box<Type>),
    Optional(Box<Type>),
    /// Right-associative: `Product(a, Product(b, c))` encodes a 3-tuple.
    Product(Box<Type>, Box<Type>),
    /// Right-associative, mirroring `Product`.
    Sum(Box<Type>, Box<Type>),
    Field(String, Box<Type>),
    Named(String, Box<Type>),
    /// The whole of a recursive definition; `cell` resolves to this same
    /// variant once construction completes. `name` is carried for
    /// `describe()` and `reference()`.
    Recursive { name: String, cell: RecursiveCell },
    /// A `µi` reference inside a recursive body. Never dereferences `body`
    /// eagerly, only `describe()`/`children()` calls that actually need
    /// the resolved shape do, and `describe()` itself deliberately does
    /// not, to keep printing terminating over a cyclic graph.
    RecursivePoint { index: usize, body: RecursiveCell },
    TaggedChoice {
        tag_field: String,
        branches: Vec<(String, Type)>,
    },
    /// "And whatever else", evaluates to [`Type::Passthrough`].
    Remainder,
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.describe())
    }
}

impl Type {
    /// Stable identity used for fix/schema lookups. Primitives and
    /// structural combinators borrow a synthetic name; `Named` and
    /// `Recursive` carry one explicitly.
    #[must_use]
    pub fn reference(&self) -> TypeReference {
        match self {
            Type::Named(name, _) | Type::Recursive { name, .. } => TypeReference::from(name.as_str()),
            other => TypeReference::from(other.describe()),
        }
    }

    /// Canonical, deterministic rendering used by snapshot tests.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Type::Bool => "bool".to_string(),
            Type::Byte => "byte".to_string(),
            Type::Short => "short".to_string(),
            Type::Int => "int".to_string(),
            Type::Long => "long".to_string(),
            Type::Float => "float".to_string(),
            Type::Double => "double".to_string(),
            Type::String => "String".to_string(),
            Type::Passthrough => "Passthrough".to_string(),
            Type::List(inner) => format!("List<{}>", inner.describe()),
            Type::Optional(inner) => format!("Optional<{}>", inner.describe()),
            Type::Product(a, b) => format!("({} × {})", a.describe(), b.describe()),
            Type::Sum(a, b) => format!("({} + {})", a.describe(), b.describe()),
            Type::Field(name, inner) => match inner.as_ref() {
                Type::Optional(optional_inner) => format!("?{name}: {}", optional_inner.describe()),
                _ => format!("{name}: {}", inner.describe()),
            },
            Type::Named(name, inner) => format!("{name}={}", inner.describe()),
            Type::Recursive { name, .. } => format!("{name}=µ0"),
            Type::RecursivePoint { index, .. } => format!("µ{index}"),
            Type::TaggedChoice { tag_field, branches } => {
                let rendered = branches
                    .iter()
                    .map(|(tag, ty)| format!("{tag} -> {}", ty.describe()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("TaggedChoice<{tag_field}>{{{rendered}}}")
            }
            Type::Remainder => "...".to_string(),
        }
    }

    /// Immediate structural sub-types, in declared left-to-right order.
    /// `RecursivePoint` does dereference here (unlike `describe()`) since
    /// a caller walking `children()` has already committed to exploring
    /// the shape and the cell is guaranteed resolved by the time any
    /// `children()` call can observe it.
    #[must_use]
    pub fn children(&self) -> Vec<Type> {
        match self {
            Type::Bool
            | Type::Byte
            | Type::Short
            | Type::Int
            | Type::Long
            | Type::Float
            | Type::Double
            | Type::String
            | Type::Passthrough
            | Type::Remainder => Vec::new(),
            Type::List(inner) | Type::Optional(inner) => vec![(**inner).clone()],
            Type::Product(a, b) | Type::Sum(a, b) => vec![(**a).clone(), (**b).clone()],
            Type::Field(_, inner) | Type::Named(_, inner) => vec![(**inner).clone()],
            Type::Recursive { cell, .. } => cell
                .get()
                .cloned()
                .map(|resolved| vec![resolved])
                .unwrap_or_default(),
            Type::RecursivePoint { body, .. } => body.get().cloned().into_iter().collect(),
            Type::TaggedChoice { branches, .. } => {
                branches.iter().map(|(_, ty)| ty.clone()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product3(a: Type, b: Type, c: Type) -> Type {
        Type::Product(Box::new(a), Box::new(Type::Product(Box::new(b), Box::new(c))))
    }

    #[test]
    fn describe_primitives_and_composites() {
        assert_eq!(Type::Bool.describe(), "bool");
        assert_eq!(Type::Int.describe(), "int");
        assert_eq!(Type::List(Box::new(Type::Int)).describe(), "List<int>");
        assert_eq!(
            Type::Optional(Box::new(Type::String)).describe(),
            "Optional<String>"
        );
        assert_eq!(
            product3(Type::Bool, Type::Int, Type::String).describe(),
            "(bool × (int × String))"
        );
    }

    #[test]
    fn field_and_named_describe_with_label() {
        let field = Type::Field("name".to_string(), Box::new(Type::String));
        assert_eq!(field.describe(), "name: String");
        let named = Type::Named("Player".to_string(), Box::new(Type::Int));
        assert_eq!(named.describe(), "Player=int");
    }

    #[test]
    fn optional_field_describes_with_question_mark_prefix() {
        let field = Type::Field("nickname".to_string(), Box::new(Type::Optional(Box::new(Type::String))));
        assert_eq!(field.describe(), "?nickname: String");
    }

    #[test]
    fn tagged_choice_describe_lists_branches_in_order() {
        let choice = Type::TaggedChoice {
            tag_field: "kind".to_string(),
            branches: vec![
                ("a".to_string(), Type::Int),
                ("b".to_string(), Type::String),
            ],
        };
        assert_eq!(choice.describe(), "TaggedChoice<kind>{a -> int, b -> String}");
        assert_eq!(choice.children().len(), 2);
    }

    #[test]
    fn children_of_primitives_is_empty() {
        assert!(Type::Bool.children().is_empty());
        assert!(Type::Remainder.children().is_empty());
    }

    #[test]
    fn children_of_product_is_left_to_right() {
        let p = Type::Product(Box::new(Type::Bool), Box::new(Type::Int));
        let kids = p.children();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].describe(), "bool");
        assert_eq!(kids[1].describe(), "int");
    }

    #[test]
    fn recursive_point_describe_does_not_dereference() {
        let cell: RecursiveCell = Arc::new(OnceCell::new());
        let point = Type::RecursivePoint {
            index: 0,
            body: Arc::clone(&cell),
        };
        // cell is deliberately left unresolved; describe() must still terminate.
        assert_eq!(point.describe(), "µ0");
    }

    #[test]
    fn recursive_children_resolves_once_cell_is_set() {
        let cell: RecursiveCell = Arc::new(OnceCell::new());
        let recursive = Type::Recursive {
            name: "List".to_string(),
            cell: Arc::clone(&cell),
        };
        assert!(recursive.children().is_empty());
        cell.set(Type::Int).ok();
        assert_eq!(recursive.children()[0].describe(), "int");
    }
}
