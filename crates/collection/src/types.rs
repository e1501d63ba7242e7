//! Runtime type identity for elements, providers and filters.
//!
//! Rust has no subtype hierarchy to reflect over, so assignability is
//! expressed with a small matcher: a tag either matches exactly one runtime
//! type, matches every type (the upper bound of a heterogeneous collection),
//! or matches nothing (the empty intersection of two unrelated exact tags).

use std::any::{Any, TypeId};

use crate::object::{ObjectRef, short_type_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeMatcher {
	/// Matches every element type. Used as a heterogeneous upper bound.
	Any,
	/// Matches exactly one runtime type.
	Exact(TypeId),
	/// Matches no type. Produced by intersecting two unrelated exact tags.
	Nothing,
}

/// A runtime type token with a short display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeTag {
	matcher: TypeMatcher,
	name: &'static str,
}

impl TypeTag {
	/// Returns the tag matching exactly the type `T`.
	pub fn of<T: Any>() -> Self {
		Self {
			matcher: TypeMatcher::Exact(TypeId::of::<T>()),
			name: short_type_name::<T>(),
		}
	}

	/// Returns a tag matching every element type, displayed under `name`.
	pub fn any(name: &'static str) -> Self {
		Self {
			matcher: TypeMatcher::Any,
			name,
		}
	}

	/// Returns the tag of an element's runtime type.
	pub(crate) fn of_object(object: &ObjectRef) -> Self {
		Self {
			matcher: TypeMatcher::Exact(object.as_any().type_id()),
			name: object.type_name(),
		}
	}

	/// Short display name of the tagged type.
	pub fn display_name(&self) -> &'static str {
		self.name
	}

	/// Returns true if a value of type `other` can stand in for this tag.
	pub fn is_assignable_from(&self, other: &TypeTag) -> bool {
		match (self.matcher, other.matcher) {
			(TypeMatcher::Any, _) => true,
			(TypeMatcher::Exact(a), TypeMatcher::Exact(b)) => a == b,
			_ => false,
		}
	}

	/// Returns true if the element's runtime type satisfies this tag.
	pub fn matches_object(&self, object: &ObjectRef) -> bool {
		match self.matcher {
			TypeMatcher::Any => true,
			TypeMatcher::Exact(id) => object.as_any().type_id() == id,
			TypeMatcher::Nothing => false,
		}
	}

	/// Intersects two tags. `Any` is the identity; unrelated exact tags
	/// intersect to a tag matching nothing.
	pub(crate) fn intersect(&self, other: &TypeTag) -> TypeTag {
		match (self.matcher, other.matcher) {
			(TypeMatcher::Any, _) => *other,
			(_, TypeMatcher::Any) => *self,
			(TypeMatcher::Exact(a), TypeMatcher::Exact(b)) if a == b => *other,
			_ => TypeTag {
				matcher: TypeMatcher::Nothing,
				name: other.name,
			},
		}
	}
}

impl std::fmt::Display for TypeTag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name)
	}
}
