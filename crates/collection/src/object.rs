//! Element traits and the shared element handle.
//!
//! Domain objects are stored behind `Rc<dyn DomainObject>` so a single
//! collection can hold elements of several concrete types under one declared
//! upper bound. Identity (not structural equality) is the notion of sameness
//! throughout: two handles refer to the same element iff they point at the
//! same allocation.

use std::any::Any;
use std::rc::Rc;

use crate::types::TypeTag;

/// An object that can report its own name.
///
/// This is the only obligation placed on user types; everything else is
/// derived. The default [`crate::namer::NamedNamer`] uses it to key elements.
pub trait Named {
	/// Returns the object's name. Must be stable and non-empty.
	fn name(&self) -> &str;
}

/// A value that can live in a collection.
///
/// Blanket-implemented for every `Named + Any` type; do not implement this
/// directly.
pub trait DomainObject: Named + Any {
	/// Short display name of the object's runtime type.
	fn type_name(&self) -> &'static str;

	/// Upcasts to [`Any`] for downcasting by reference.
	fn as_any(&self) -> &dyn Any;

	/// Upcasts the owning handle to [`Any`] for downcasting by `Rc`.
	fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Named + Any> DomainObject for T {
	fn type_name(&self) -> &'static str {
		short_type_name::<T>()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
		self
	}
}

impl std::fmt::Debug for dyn DomainObject {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct(self.type_name())
			.field("name", &self.name())
			.finish()
	}
}

/// Shared handle to an element.
pub type ObjectRef = Rc<dyn DomainObject>;

/// Convenience accessors on element handles.
pub trait ObjectRefExt {
	/// Returns true if the element's runtime type is `S`.
	fn is_type<S: Any>(&self) -> bool;

	/// Downcasts the handle to a concrete `Rc<S>`, if the runtime type matches.
	fn downcast_rc<S: Any>(&self) -> Option<Rc<S>>;

	/// Returns the tag of the element's runtime type.
	fn type_tag(&self) -> TypeTag;
}

impl ObjectRefExt for ObjectRef {
	fn is_type<S: Any>(&self) -> bool {
		self.as_any().is::<S>()
	}

	fn downcast_rc<S: Any>(&self) -> Option<Rc<S>> {
		self.clone().as_any_rc().downcast::<S>().ok()
	}

	fn type_tag(&self) -> TypeTag {
		TypeTag::of_object(self)
	}
}

/// Strips the module path from a type name, leaving the last segment.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
	let full = std::any::type_name::<T>();
	full.rsplit("::").next().unwrap_or(full)
}
