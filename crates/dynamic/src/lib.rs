//! Dynamic property and configure-method access over nomen collections.
//!
//! Hosts that embed a collection behind a dynamically dispatched surface (a
//! configuration DSL, a scripting bridge) resolve element names at runtime:
//! a property read is a name lookup, and a method call carrying a single
//! configure callable is "look up, configure, return". This crate adapts a
//! [`NamedObjectCollection`] to that protocol with a small polymorphic
//! surface and a tagged [`InvokeResult`] instead of exceptions for the
//! not-found path.

use std::collections::BTreeMap;
use std::rc::Rc;

use nomen_collection::{CollectionResult, Named, NamedObjectCollection, ObjectRef};

/// A single-argument side-effecting callable, as passed by a DSL host.
pub type ConfigureCallable = Rc<dyn Fn(&ObjectRef)>;

/// Outcome of a dynamic property read or method invocation.
pub enum InvokeResult {
	/// The name resolved to an element.
	Found(ObjectRef),
	/// The name is not a property / method of the collection.
	NotFound,
}

impl InvokeResult {
	/// The element, if the invocation found one.
	pub fn found(self) -> Option<ObjectRef> {
		match self {
			InvokeResult::Found(object) => Some(object),
			InvokeResult::NotFound => None,
		}
	}

	pub fn is_found(&self) -> bool {
		matches!(self, InvokeResult::Found(_))
	}
}

impl std::fmt::Debug for InvokeResult {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			InvokeResult::Found(object) => write!(f, "Found({})", object.name()),
			InvokeResult::NotFound => f.write_str("NotFound"),
		}
	}
}

/// Exposes a collection's elements as dynamic properties and configure
/// methods.
#[derive(Clone)]
pub struct ElementsDynamicObject {
	collection: NamedObjectCollection,
}

impl ElementsDynamicObject {
	pub fn new(collection: NamedObjectCollection) -> Self {
		Self { collection }
	}

	/// Display name of the backing collection.
	pub fn display_name(&self) -> String {
		self.collection.display_name()
	}

	/// Returns true if `name` resolves to an element. Runs the collection's
	/// full lookup, including pending realization and rules.
	pub fn has_property(&self, name: &str) -> CollectionResult<bool> {
		Ok(self.collection.find_by_name(name)?.is_some())
	}

	/// Reads the property `name`.
	pub fn try_get_property(&self, name: &str) -> CollectionResult<InvokeResult> {
		Ok(match self.collection.find_by_name(name)? {
			Some(object) => InvokeResult::Found(object),
			None => InvokeResult::NotFound,
		})
	}

	/// All realized elements, keyed and sorted by name.
	pub fn properties(&self) -> BTreeMap<String, ObjectRef> {
		self.collection.as_map()
	}

	/// Returns true if `name` with the given arguments is a configure-method
	/// call this object would handle.
	pub fn has_method(&self, name: &str, args: &[ConfigureCallable]) -> CollectionResult<bool> {
		self.is_configure_method(name, args)
	}

	/// Invokes the method `name`: when `args` is a single configure callable
	/// and `name` is a known element, applies the callable to the element
	/// and returns it.
	pub fn try_invoke_method(
		&self,
		name: &str,
		args: &[ConfigureCallable],
	) -> CollectionResult<InvokeResult> {
		if !self.is_configure_method(name, args)? {
			return Ok(InvokeResult::NotFound);
		}
		let object = self.collection.get_by_name(name)?;
		args[0](&object);
		Ok(InvokeResult::Found(object))
	}

	fn is_configure_method(
		&self,
		name: &str,
		args: &[ConfigureCallable],
	) -> CollectionResult<bool> {
		if args.len() != 1 {
			return Ok(false);
		}
		self.has_property(name)
	}
}

impl std::fmt::Debug for ElementsDynamicObject {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ElementsDynamicObject")
			.field("display_name", &self.display_name())
			.finish()
	}
}
