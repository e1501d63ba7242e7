//! Read-only filtered views over a parent collection.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use crate::error::{CollectionError, CollectionResult};
use crate::filter::CollectionFilter;
use crate::info::{ElementInfo, ElementSchema};
use crate::object::ObjectRef;
use crate::provider::{DomainObjectProvider, ExistingProvider, ProviderRef};
use crate::types::TypeTag;

use super::{CollectionInner, NamedObjectCollection};

/// A live, filtered projection of a parent collection.
///
/// The view reads through the parent's storage on every call, so it always
/// reflects the parent's current population restricted by the filter. It
/// holds only a weak back-reference: a view never keeps its parent alive,
/// and once the parent is dropped the view reads as empty.
///
/// Views are read-only. Structural mutations fail with
/// [`CollectionError::Unsupported`]; mutate the parent instead. Lookups on a
/// view never run the parent's rules.
#[derive(Clone)]
pub struct FilteredCollection {
	parent: Weak<CollectionInner>,
	filter: CollectionFilter,
}

impl FilteredCollection {
	pub(crate) fn new(parent: Weak<CollectionInner>, filter: CollectionFilter) -> Self {
		Self { parent, filter }
	}

	fn parent(&self) -> Option<NamedObjectCollection> {
		self.parent.upgrade().map(NamedObjectCollection::from_inner)
	}

	/// The filter's target type.
	pub fn element_type(&self) -> TypeTag {
		self.filter.type_tag()
	}

	/// Display name of the view's element type.
	pub fn type_display_name(&self) -> &'static str {
		self.filter.type_tag().display_name()
	}

	/// Display name of the view.
	pub fn display_name(&self) -> String {
		format!("{} container", self.type_display_name())
	}

	fn unsupported(&self, operation: &'static str) -> CollectionError {
		CollectionError::Unsupported {
			operation,
			target: self.display_name(),
		}
	}

	// --- rejected mutations ---

	/// Views are read-only; always fails with
	/// [`CollectionError::Unsupported`].
	pub fn add(&self, _object: ObjectRef) -> CollectionResult<bool> {
		Err(self.unsupported("add(T)"))
	}

	/// Views are read-only; always fails with
	/// [`CollectionError::Unsupported`].
	pub fn add_later(&self, _provider: ProviderRef) -> CollectionResult<()> {
		Err(self.unsupported("addLater(Provider)"))
	}

	/// Views are read-only; always fails with
	/// [`CollectionError::Unsupported`].
	pub fn remove(&self, _object: &ObjectRef) -> CollectionResult<bool> {
		Err(self.unsupported("remove(Object)"))
	}

	/// Views are read-only; always fails with
	/// [`CollectionError::Unsupported`].
	pub fn clear(&self) -> CollectionResult<()> {
		Err(self.unsupported("clear()"))
	}

	// --- lookup ---

	/// Finds a matching element by name, realizing a matching pending
	/// producer if necessary. Does not run rules.
	pub fn find_by_name(&self, name: &str) -> CollectionResult<Option<ObjectRef>> {
		let Some(parent) = self.parent() else {
			return Ok(None);
		};
		if let Some(object) = parent.inner.index.borrow().get_filtered(name, &self.filter) {
			return Ok(Some(object));
		}
		let pending = parent
			.inner
			.index
			.borrow()
			.get_pending_filtered(name, &self.filter);
		if let Some(provider) = pending {
			provider.find()?;
			// Read back through the filter so a realized element that does
			// not satisfy it stays invisible.
			return Ok(parent.inner.index.borrow().get_filtered(name, &self.filter));
		}
		Ok(None)
	}

	/// Finds a matching element by name or fails with
	/// [`CollectionError::NotFound`].
	pub fn get_by_name(&self, name: &str) -> CollectionResult<ObjectRef> {
		self.find_by_name(name)?
			.ok_or_else(|| CollectionError::not_found(self.type_display_name(), name))
	}

	/// Returns a provider for the named matching element.
	pub fn named(&self, name: &str) -> CollectionResult<ProviderRef> {
		let Some(parent) = self.parent() else {
			return Err(CollectionError::not_found(self.type_display_name(), name));
		};
		if parent
			.inner
			.index
			.borrow()
			.get_filtered(name, &self.filter)
			.is_some()
		{
			let provider: ProviderRef = ExistingProvider::new(
				self.parent.clone(),
				name.to_string(),
				self.filter.type_tag(),
				Some(self.filter.clone()),
			);
			return Ok(provider);
		}
		let pending = parent
			.inner
			.index
			.borrow()
			.get_pending_filtered(name, &self.filter);
		if let Some(provider) = pending {
			return Ok(provider);
		}
		Err(CollectionError::not_found(self.type_display_name(), name))
	}

	/// Returns true if the name resolves to a matching realized element or a
	/// matching pending producer.
	pub fn has_with_name(&self, name: &str) -> bool {
		let Some(parent) = self.parent() else {
			return false;
		};
		let index = parent.inner.index.borrow();
		index.get_filtered(name, &self.filter).is_some()
			|| index.get_pending_filtered(name, &self.filter).is_some()
	}

	// --- enumeration ---

	/// All matching names, realized and pending, sorted ascending.
	pub fn names(&self) -> BTreeSet<String> {
		let Some(parent) = self.parent() else {
			return BTreeSet::new();
		};
		let index = parent.inner.index.borrow();
		let mut names: BTreeSet<String> = index.as_map_filtered(&self.filter).into_keys().collect();
		names.extend(index.pending_as_map_filtered(&self.filter).into_keys());
		names
	}

	/// Name-sorted map of the matching realized elements. Each call
	/// materializes a fresh snapshot of the parent's current state.
	pub fn as_map(&self) -> BTreeMap<String, ObjectRef> {
		match self.parent() {
			Some(parent) => parent.inner.index.borrow().as_map_filtered(&self.filter),
			None => BTreeMap::new(),
		}
	}

	/// Insertion-ordered matching elements, without forcing pending
	/// producers.
	pub fn elements_no_flush(&self) -> Vec<ObjectRef> {
		let Some(parent) = self.parent() else {
			return Vec::new();
		};
		let snapshot = parent.inner.store.borrow().snapshot();
		snapshot
			.into_iter()
			.filter(|object| self.filter.matches(object))
			.collect()
	}

	/// Realizes every matching pending producer, then returns the matching
	/// elements in insertion order.
	pub fn elements(&self) -> CollectionResult<Vec<ObjectRef>> {
		let Some(parent) = self.parent() else {
			return Ok(Vec::new());
		};
		let pending: Vec<ProviderRef> = parent
			.inner
			.index
			.borrow()
			.pending_as_map_filtered(&self.filter)
			.into_values()
			.collect();
		for provider in pending {
			provider.find()?;
		}
		Ok(self.elements_no_flush())
	}

	/// Number of matching realized elements.
	pub fn len(&self) -> usize {
		self.as_map().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Schema of the matching population: realized entries name-sorted,
	/// then matching pending entries in insertion order.
	pub fn collection_schema(&self) -> Vec<ElementSchema> {
		let Some(parent) = self.parent() else {
			return Vec::new();
		};
		let (realized, pending) = {
			let index = parent.inner.index.borrow();
			(
				index.as_map_filtered(&self.filter),
				index.pending_as_map_filtered(&self.filter),
			)
		};
		let realized = realized.into_iter().map(|(name, object)| ElementSchema {
			name,
			public_type: Some(TypeTag::of_object(&object)),
		});
		let pending = pending.into_iter().map(|(name, provider)| ElementSchema {
			name,
			public_type: provider.type_tag(),
		});
		realized.chain(pending).collect()
	}

	// --- filtering ---

	/// Narrows the view to elements whose runtime type is `S`. The filters
	/// compose in place; the new view still reads the root parent directly.
	pub fn with_type<S: std::any::Any>(&self) -> FilteredCollection {
		self.and(CollectionFilter::of_type(TypeTag::of::<S>()))
	}

	/// Narrows the view to elements assignable to `type_tag`.
	pub fn with_type_tag(&self, type_tag: TypeTag) -> FilteredCollection {
		self.and(CollectionFilter::of_type(type_tag))
	}

	/// Narrows the view to elements satisfying `spec`.
	pub fn matching(&self, spec: impl Fn(&ObjectRef) -> bool + 'static) -> FilteredCollection {
		self.and(CollectionFilter::matching(self.filter.type_tag(), spec))
	}

	fn and(&self, other: CollectionFilter) -> FilteredCollection {
		FilteredCollection {
			parent: self.parent.clone(),
			filter: self.filter.and(&other),
		}
	}

	// --- listeners ---

	/// Registers an action fired once per matching element as it becomes
	/// known, with immediate replay over the matching current population.
	pub fn when_element_known(&self, action: impl Fn(&ElementInfo) + 'static) {
		let Some(parent) = self.parent() else {
			return;
		};
		let filter = self.filter.clone();
		parent.when_element_known_action(Rc::new(move |info: &ElementInfo| {
			if filter.matches_info(info) {
				action(info);
			}
		}));
	}

	/// Registers an action fired after each matching element addition.
	pub fn when_object_added(&self, action: impl Fn(&ObjectRef) + 'static) {
		let Some(parent) = self.parent() else {
			return;
		};
		let filter = self.filter.clone();
		parent.when_object_added_action(Rc::new(move |object: &ObjectRef| {
			if filter.matches(object) {
				action(object);
			}
		}));
	}

	/// Registers an action fired after each matching element removal.
	pub fn when_object_removed(&self, action: impl Fn(&ObjectRef) + 'static) {
		let Some(parent) = self.parent() else {
			return;
		};
		let filter = self.filter.clone();
		parent.when_object_removed_action(Rc::new(move |object: &ObjectRef| {
			if filter.matches(object) {
				action(object);
			}
		}));
	}
}

impl std::fmt::Display for FilteredCollection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.display_name())
	}
}

impl std::fmt::Debug for FilteredCollection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FilteredCollection")
			.field("display_name", &self.display_name())
			.field("filter", &self.filter)
			.finish()
	}
}
