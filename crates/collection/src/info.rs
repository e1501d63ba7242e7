//! Element descriptors delivered to listeners and schema consumers.

use crate::object::ObjectRef;
use crate::types::TypeTag;

/// What an [`ElementInfo`] is backed by.
#[derive(Clone)]
pub(crate) enum ElementBacking {
	/// A realized element; the type is its runtime type.
	Object(ObjectRef),
	/// A pending producer; the type is its declared type, possibly absent.
	Producer(Option<TypeTag>),
}

/// A `(name, type)` descriptor for an element that has become known, either
/// by realization or by registration of a pending producer.
#[derive(Clone)]
pub struct ElementInfo {
	name: String,
	backing: ElementBacking,
}

impl ElementInfo {
	pub(crate) fn object_backed(name: String, object: ObjectRef) -> Self {
		Self {
			name,
			backing: ElementBacking::Object(object),
		}
	}

	pub(crate) fn producer_backed(name: String, declared: Option<TypeTag>) -> Self {
		Self {
			name,
			backing: ElementBacking::Producer(declared),
		}
	}

	/// The element's name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The element's type: the runtime type for realized elements, the
	/// declared type for pending producers. `None` means unknown.
	pub fn type_tag(&self) -> Option<TypeTag> {
		match &self.backing {
			ElementBacking::Object(object) => Some(TypeTag::of_object(object)),
			ElementBacking::Producer(declared) => *declared,
		}
	}

	/// The realized element, if this info is object-backed.
	pub fn object(&self) -> Option<&ObjectRef> {
		match &self.backing {
			ElementBacking::Object(object) => Some(object),
			ElementBacking::Producer(_) => None,
		}
	}

	/// Returns true if this info describes an already realized element.
	pub fn is_realized(&self) -> bool {
		matches!(self.backing, ElementBacking::Object(_))
	}

	pub(crate) fn backing(&self) -> &ElementBacking {
		&self.backing
	}
}

impl std::fmt::Debug for ElementInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ElementInfo")
			.field("name", &self.name)
			.field("type", &self.type_tag().map(|t| t.display_name()))
			.field("realized", &self.is_realized())
			.finish()
	}
}

/// One entry of a collection schema: an element name and its public type.
#[derive(Debug, Clone)]
pub struct ElementSchema {
	/// The element's name.
	pub name: String,
	/// The element's public type; `None` when the producer declared none.
	pub public_type: Option<TypeTag>,
}

impl ElementSchema {
	/// Display name of the public type, `"unknown"` when absent.
	pub fn type_display_name(&self) -> &'static str {
		self.public_type
			.map(|tag| tag.display_name())
			.unwrap_or("unknown")
	}
}
