//! The dual name directory: realized elements and pending producers.
//!
//! # Invariants
//!
//! - Outside an in-flight realization, a name maps into at most one of the
//!   two directories. Enforced by the collection's add paths; tested by
//!   `collection::tests::test_lazy_element_moves_from_pending_to_realized`.
//! - Realized entries enumerate in ascending name order; pending entries in
//!   insertion order.
//! - `clear` wipes both directories together.

use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::filter::CollectionFilter;
use crate::object::ObjectRef;
use crate::provider::ProviderRef;

/// Name-keyed storage for one collection.
#[derive(Default)]
pub(crate) struct Index {
	realized: BTreeMap<String, ObjectRef>,
	pending: IndexMap<String, ProviderRef>,
}

impl Index {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn put(&mut self, name: String, value: ObjectRef) {
		self.realized.insert(name, value);
	}

	pub fn get(&self, name: &str) -> Option<ObjectRef> {
		self.realized.get(name).cloned()
	}

	pub fn remove(&mut self, name: &str) -> Option<ObjectRef> {
		self.realized.remove(name)
	}

	pub fn clear(&mut self) {
		self.realized.clear();
		self.pending.clear();
	}

	/// Name-sorted snapshot of the realized directory.
	pub fn as_map(&self) -> BTreeMap<String, ObjectRef> {
		self.realized.clone()
	}

	pub fn realized_names(&self) -> impl Iterator<Item = &str> {
		self.realized.keys().map(String::as_str)
	}

	pub fn realized_len(&self) -> usize {
		self.realized.len()
	}

	pub fn put_pending(&mut self, name: String, provider: ProviderRef) {
		self.pending.insert(name, provider);
	}

	pub fn get_pending(&self, name: &str) -> Option<ProviderRef> {
		self.pending.get(name).cloned()
	}

	pub fn remove_pending(&mut self, name: &str) -> Option<ProviderRef> {
		self.pending.shift_remove(name)
	}

	/// Removes every pending entry backed by exactly this producer.
	pub fn remove_pending_provider(&mut self, provider: &ProviderRef) {
		self.pending.retain(|_, existing| !Rc::ptr_eq(existing, provider));
	}

	/// Insertion-ordered snapshot of the pending directory.
	pub fn pending_as_map(&self) -> IndexMap<String, ProviderRef> {
		self.pending.clone()
	}

	pub fn pending_names(&self) -> impl Iterator<Item = &str> {
		self.pending.keys().map(String::as_str)
	}

	// Filtered reads. These are the projection a filtered view observes: a
	// realized entry must pass the whole filter, a pending entry must carry
	// a declared type assignable to the filter's target.

	pub fn get_filtered(&self, name: &str, filter: &CollectionFilter) -> Option<ObjectRef> {
		self.realized.get(name).and_then(|value| filter.filter(value))
	}

	pub fn as_map_filtered(&self, filter: &CollectionFilter) -> BTreeMap<String, ObjectRef> {
		self.realized
			.iter()
			.filter_map(|(name, value)| {
				filter.filter(value).map(|value| (name.clone(), value))
			})
			.collect()
	}

	pub fn get_pending_filtered(
		&self,
		name: &str,
		filter: &CollectionFilter,
	) -> Option<ProviderRef> {
		self.pending
			.get(name)
			.filter(|provider| filter.matches_pending(provider.type_tag()))
			.cloned()
	}

	pub fn pending_as_map_filtered(
		&self,
		filter: &CollectionFilter,
	) -> IndexMap<String, ProviderRef> {
		self.pending
			.iter()
			.filter(|(_, provider)| filter.matches_pending(provider.type_tag()))
			.map(|(name, provider)| (name.clone(), provider.clone()))
			.collect()
	}
}
