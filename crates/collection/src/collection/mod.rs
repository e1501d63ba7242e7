//! The container proper.
//!
//! # Mental model
//!
//! A collection holds three coexisting populations under one name space:
//!
//! 1. **Realized** elements, present in the element store and the realized
//!    directory of the [`crate::index::Index`].
//! 2. **Pending** producers, registered by [`NamedObjectCollection::add_later`]
//!    or [`NamedObjectCollection::register`] and realized on first access.
//! 3. **Rule-driven** elements, which do not exist until a lookup miss runs
//!    the registered [`Rule`]s and one of them adds the element.
//!
//! Lookup walks those populations in order: realized, then pending (forcing
//! realization), then rules followed by one more realized lookup.
//!
//! # Invariants
//!
//! - A name resolves to at most one of realized/pending between top-level
//!   operations; realization atomically moves a name from pending to
//!   realized. Tested by
//!   `tests::test_lazy_element_moves_from_pending_to_realized`.
//! - Rules never re-enter for a name they are already running for. Tested
//!   by `tests::test_rule_created_element`.
//! - No internal borrow is held across a user callback; every listener,
//!   rule, factory and configure action may re-enter the collection.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashSet;

use crate::actions::{ActionRc, ActionSet};
use crate::error::{CollectionError, CollectionResult, DynError};
use crate::filter::CollectionFilter;
use crate::guard::MutationGuard;
use crate::index::Index;
use crate::info::{ElementInfo, ElementSchema};
use crate::namer::{NamedNamer, Namer};
use crate::object::ObjectRef;
use crate::provider::{CreatingProvider, DomainObjectProvider, ExistingProvider, ProviderRef};
use crate::rules::Rule;
use crate::store::{ElementStore, EventRegister};
use crate::types::TypeTag;

mod view;

pub use view::FilteredCollection;

#[cfg(test)]
mod tests;

/// How an `add` with an already-taken name is handled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
	/// The add is a no-op returning `Ok(false)`.
	#[default]
	Ignore,
	/// The add fails with [`CollectionError::DuplicateName`].
	Fail,
}

type LazyRealizedHook = Rc<dyn Fn(&str, &ObjectRef)>;

pub(crate) struct CollectionInner {
	pub(crate) element_type: TypeTag,
	pub(crate) type_display_name: String,
	pub(crate) duplicate_policy: DuplicatePolicy,
	pub(crate) namer: Box<dyn Namer>,
	pub(crate) store: RefCell<ElementStore>,
	pub(crate) index: RefCell<Index>,
	pub(crate) events: RefCell<EventRegister>,
	pub(crate) rules: RefCell<Vec<Rule>>,
	pub(crate) applying_rules_for: RefCell<FxHashSet<String>>,
	pub(crate) when_known: RefCell<ActionSet<ElementInfo>>,
	pub(crate) guard: MutationGuard,
	pub(crate) on_lazy_realized: Option<LazyRealizedHook>,
}

/// Assembles a collection from injected strategies.
pub struct CollectionBuilder {
	element_type: TypeTag,
	namer: Box<dyn Namer>,
	duplicate_policy: DuplicatePolicy,
	type_display_name: Option<String>,
	on_lazy_realized: Option<LazyRealizedHook>,
}

impl CollectionBuilder {
	fn new(element_type: TypeTag) -> Self {
		Self {
			element_type,
			namer: Box::new(NamedNamer),
			duplicate_policy: DuplicatePolicy::default(),
			type_display_name: None,
			on_lazy_realized: None,
		}
	}

	/// Replaces the default name derivation.
	pub fn namer(mut self, namer: impl Namer + 'static) -> Self {
		self.namer = Box::new(namer);
		self
	}

	/// Selects strict or lenient duplicate-name handling.
	pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
		self.duplicate_policy = policy;
		self
	}

	/// Overrides the display name derived from the element type.
	pub fn type_display_name(mut self, name: impl Into<String>) -> Self {
		self.type_display_name = Some(name.into());
		self
	}

	/// Installs a hook invoked after each lazy element is realized.
	pub fn on_lazy_realized(mut self, hook: impl Fn(&str, &ObjectRef) + 'static) -> Self {
		self.on_lazy_realized = Some(Rc::new(hook));
		self
	}

	pub fn build(self) -> NamedObjectCollection {
		let type_display_name = self
			.type_display_name
			.unwrap_or_else(|| self.element_type.display_name().to_string());
		NamedObjectCollection {
			inner: Rc::new(CollectionInner {
				element_type: self.element_type,
				type_display_name,
				duplicate_policy: self.duplicate_policy,
				namer: self.namer,
				store: RefCell::new(ElementStore::new()),
				index: RefCell::new(Index::new()),
				events: RefCell::new(EventRegister::new()),
				rules: RefCell::new(Vec::new()),
				applying_rules_for: RefCell::new(FxHashSet::default()),
				when_known: RefCell::new(ActionSet::empty()),
				guard: MutationGuard::new(),
				on_lazy_realized: self.on_lazy_realized,
			}),
		}
	}
}

/// A named, typed, lazily-populated domain-object collection.
///
/// The handle is a cheap clone; all clones observe the same population.
/// Single-threaded by design: callbacks run synchronously on the caller and
/// may re-enter the collection.
#[derive(Clone)]
pub struct NamedObjectCollection {
	inner: Rc<CollectionInner>,
}

impl NamedObjectCollection {
	/// Creates a collection with the default strategies: name derivation via
	/// [`crate::object::Named`], lenient duplicate handling.
	pub fn new(element_type: TypeTag) -> Self {
		Self::builder(element_type).build()
	}

	/// Starts building a collection with custom strategies.
	pub fn builder(element_type: TypeTag) -> CollectionBuilder {
		CollectionBuilder::new(element_type)
	}

	pub(crate) fn from_inner(inner: Rc<CollectionInner>) -> Self {
		Self { inner }
	}

	pub(crate) fn downgrade(&self) -> Weak<CollectionInner> {
		Rc::downgrade(&self.inner)
	}

	/// The declared element type fixed at construction.
	pub fn element_type(&self) -> TypeTag {
		self.inner.element_type
	}

	/// Display name of the element type.
	pub fn type_display_name(&self) -> &str {
		&self.inner.type_display_name
	}

	/// Display name of the collection.
	pub fn display_name(&self) -> String {
		format!("{} container", self.inner.type_display_name)
	}

	fn assert_mutable(&self, operation: &'static str) -> CollectionResult<()> {
		if self.inner.guard.is_mutation_allowed() {
			Ok(())
		} else {
			Err(CollectionError::MutationDisallowed {
				operation,
				target: self.display_name(),
			})
		}
	}

	fn assert_can_add(&self, name: &str) -> CollectionResult<()> {
		if self.has_with_name(name) {
			Err(CollectionError::duplicate_name(
				&self.inner.type_display_name,
				name,
			))
		} else {
			Ok(())
		}
	}

	// --- population ---

	/// Adds a realized element. Returns false if an element with the same
	/// name is already realized (lenient policy) or fails (strict policy).
	pub fn add(&self, object: ObjectRef) -> CollectionResult<bool> {
		self.assert_mutable("add(T)")?;
		let notification = self.add_actions_snapshot();
		self.add_internal(object, &notification)
	}

	/// Adds every element of `objects`; returns true if any was added.
	pub fn add_all(
		&self,
		objects: impl IntoIterator<Item = ObjectRef>,
	) -> CollectionResult<bool> {
		self.assert_mutable("addAll(Collection)")?;
		let notification = self.add_actions_snapshot();
		let mut changed = false;
		for object in objects {
			if self.add_internal(object, &notification)? {
				changed = true;
			}
		}
		Ok(changed)
	}

	pub(crate) fn add_internal(
		&self,
		object: ObjectRef,
		notification: &ActionSet<ObjectRef>,
	) -> CollectionResult<bool> {
		let name = self.inner.namer.determine_name(&*object);
		debug_assert!(!name.is_empty(), "namer produced an empty name");
		if self.inner.index.borrow().get(&name).is_some() {
			return self.handle_non_unique_name(&name);
		}
		if !self.inner.store.borrow_mut().add(object.clone()) {
			return Ok(false);
		}
		self.inner.index.borrow_mut().put(name.clone(), object.clone());
		tracing::trace!(name = %name, "added element");
		notification.execute(&object);
		let when_known = self.inner.when_known.borrow().clone();
		when_known.execute(&ElementInfo::object_backed(name, object));
		Ok(true)
	}

	fn handle_non_unique_name(&self, name: &str) -> CollectionResult<bool> {
		match self.inner.duplicate_policy {
			DuplicatePolicy::Ignore => {
				tracing::trace!(name = %name, "ignoring element with duplicate name");
				Ok(false)
			}
			DuplicatePolicy::Fail => Err(CollectionError::duplicate_name(
				&self.inner.type_display_name,
				name,
			)),
		}
	}

	/// Registers a pending producer. The producer is indexed under its name
	/// but not realized; listeners observe a producer-backed element info.
	pub fn add_later(&self, provider: ProviderRef) -> CollectionResult<()> {
		self.assert_mutable("addLater(Provider)")?;
		let name = provider.name().to_string();
		self.inner.store.borrow_mut().add_pending(provider.clone());
		self.inner
			.index
			.borrow_mut()
			.put_pending(name.clone(), provider.clone());
		tracing::trace!(name = %name, "registered pending element");
		self.deferred_element_known(name, provider.type_tag());
		Ok(())
	}

	/// Registers a lazily-created element. The name is reserved immediately
	/// (failing with [`CollectionError::DuplicateName`] if taken); the
	/// factory runs on first access to the returned provider or on a lookup
	/// of the name.
	pub fn register(
		&self,
		name: impl Into<String>,
		factory: impl FnOnce() -> Result<ObjectRef, DynError> + 'static,
	) -> CollectionResult<Rc<CreatingProvider>> {
		let element_type = self.inner.element_type;
		self.register_with_type(name, element_type, factory)
	}

	/// As [`NamedObjectCollection::register`], declaring a more specific
	/// element type for the producer. The declared type is what filtered
	/// views match pending producers against.
	pub fn register_with_type(
		&self,
		name: impl Into<String>,
		declared: TypeTag,
		factory: impl FnOnce() -> Result<ObjectRef, DynError> + 'static,
	) -> CollectionResult<Rc<CreatingProvider>> {
		let name = name.into();
		self.assert_mutable("register(String)")?;
		self.assert_can_add(&name)?;
		let provider = CreatingProvider::new(self, name, declared, Box::new(factory));
		let pending: ProviderRef = provider.clone();
		self.add_later(pending)?;
		Ok(provider)
	}

	/// Removes a realized element by identity. Returns false if absent.
	pub fn remove(&self, object: &ObjectRef) -> CollectionResult<bool> {
		self.assert_mutable("remove(Object)")?;
		if !self.inner.store.borrow_mut().remove(object) {
			return Ok(false);
		}
		let name = self.inner.namer.determine_name(&**object);
		self.inner.index.borrow_mut().remove(&name);
		tracing::trace!(name = %name, "removed element");
		let actions = self.inner.events.borrow().remove_actions();
		actions.execute(object);
		Ok(true)
	}

	/// Removes a pending producer before realization. The producer is marked
	/// so later accesses observe the element as removed.
	pub fn remove_later(&self, provider: &ProviderRef) -> CollectionResult<bool> {
		self.assert_mutable("removeLater(Provider)")?;
		if !self.inner.store.borrow_mut().remove_pending(provider) {
			return Ok(false);
		}
		self.inner.index.borrow_mut().remove_pending(provider.name());
		provider.mark_removed_before_realized();
		tracing::trace!(name = %provider.name(), "removed pending element");
		Ok(true)
	}

	/// Removes the element with the given name, running rules and realizing
	/// a pending producer if necessary, and returns it.
	pub fn remove_by_name(&self, name: &str) -> CollectionResult<ObjectRef> {
		let object = self.get_by_name(name)?;
		if self.remove(&object)? {
			Ok(object)
		} else {
			Err(CollectionError::Invariant {
				message: format!(
					"found element with name '{name}' but remove() returned false"
				),
			})
		}
	}

	/// Removes every element and pending producer.
	pub fn clear(&self) -> CollectionResult<()> {
		self.assert_mutable("clear()")?;
		let (_, pending) = self.inner.store.borrow_mut().clear();
		self.inner.index.borrow_mut().clear();
		for provider in &pending {
			provider.mark_removed_before_realized();
		}
		Ok(())
	}

	// --- lookup ---

	/// Finds an element by name: realized first, then pending (realizing the
	/// producer), then rules followed by one more realized lookup.
	pub fn find_by_name(&self, name: &str) -> CollectionResult<Option<ObjectRef>> {
		if let Some(object) = self.find_by_name_without_rules(name) {
			return Ok(Some(object));
		}
		let pending = self.inner.index.borrow().get_pending(name);
		if let Some(provider) = pending {
			// Realization adds the element to this collection as a side
			// effect; read back through the index rather than trusting the
			// provider's return value.
			provider.find()?;
			return Ok(self.inner.index.borrow().get(name));
		}
		if !self.apply_rules(name) {
			return Ok(None);
		}
		Ok(self.find_by_name_without_rules(name))
	}

	/// Finds an element by name or fails with [`CollectionError::NotFound`].
	pub fn get_by_name(&self, name: &str) -> CollectionResult<ObjectRef> {
		self.find_by_name(name)?.ok_or_else(|| {
			CollectionError::not_found(&self.inner.type_display_name, name)
		})
	}

	/// As [`NamedObjectCollection::get_by_name`], running `action` against
	/// the element before returning it.
	pub fn get_by_name_configured(
		&self,
		name: &str,
		action: impl FnOnce(&ObjectRef),
	) -> CollectionResult<ObjectRef> {
		let object = self.get_by_name(name)?;
		action(&object);
		Ok(object)
	}

	pub(crate) fn find_by_name_without_rules(&self, name: &str) -> Option<ObjectRef> {
		self.inner.index.borrow().get(name)
	}

	/// Returns a provider for the named element: an existing provider for a
	/// realized element, the pending producer itself for a pending one, or
	/// after running rules, [`CollectionError::NotFound`].
	pub fn named(&self, name: &str) -> CollectionResult<ProviderRef> {
		self.find_domain_object(name).ok_or_else(|| {
			CollectionError::not_found(&self.inner.type_display_name, name)
		})
	}

	pub(crate) fn find_domain_object(&self, name: &str) -> Option<ProviderRef> {
		let found = self.search_for_domain_object(name);
		if found.is_some() {
			return found;
		}
		// Run the rules and try to find something again.
		if self.apply_rules(name) {
			return self.search_for_domain_object(name);
		}
		None
	}

	fn search_for_domain_object(&self, name: &str) -> Option<ProviderRef> {
		if self.find_by_name_without_rules(name).is_some() {
			let provider: ProviderRef = ExistingProvider::new(
				self.downgrade(),
				name.to_string(),
				self.inner.element_type,
				None,
			);
			return Some(provider);
		}
		self.inner.index.borrow().get_pending(name)
	}

	/// Returns true if the name resolves to a realized element or a pending
	/// producer. Does not run rules.
	pub fn has_with_name(&self, name: &str) -> bool {
		let index = self.inner.index.borrow();
		index.get(name).is_some() || index.get_pending(name).is_some()
	}

	// --- enumeration ---

	/// All names, realized and pending, sorted ascending.
	pub fn names(&self) -> BTreeSet<String> {
		let index = self.inner.index.borrow();
		index
			.realized_names()
			.chain(index.pending_names())
			.map(str::to_string)
			.collect()
	}

	/// Name-sorted map of the realized elements.
	pub fn as_map(&self) -> BTreeMap<String, ObjectRef> {
		self.inner.index.borrow().as_map()
	}

	/// Insertion-ordered realized elements, without forcing pending
	/// producers.
	pub fn elements_no_flush(&self) -> Vec<ObjectRef> {
		self.inner.store.borrow().snapshot()
	}

	/// Realizes every pending producer, then returns the elements in
	/// insertion order.
	pub fn elements(&self) -> CollectionResult<Vec<ObjectRef>> {
		self.flush_pending()?;
		Ok(self.inner.store.borrow().snapshot())
	}

	/// Realizes every currently pending producer.
	pub fn flush_pending(&self) -> CollectionResult<()> {
		let pending = self.inner.store.borrow().pending_snapshot();
		for provider in pending {
			provider.find()?;
		}
		Ok(())
	}

	/// Returns true if this exact element is realized in the collection.
	pub fn contains(&self, object: &ObjectRef) -> bool {
		self.inner.store.borrow().contains(object)
	}

	/// Number of realized elements.
	pub fn len(&self) -> usize {
		self.inner.index.borrow().realized_len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Enumerates `(name, public type)` pairs across both populations:
	/// realized entries name-sorted first, then pending entries in insertion
	/// order, with absent producer types reported as unknown.
	pub fn collection_schema(&self) -> Vec<ElementSchema> {
		let (realized, pending) = {
			let index = self.inner.index.borrow();
			(index.as_map(), index.pending_as_map())
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

	/// A live view of the elements whose runtime type is `S`.
	pub fn with_type<S: std::any::Any>(&self) -> FilteredCollection {
		self.filtered(CollectionFilter::of_type(TypeTag::of::<S>()))
	}

	/// A live view of the elements assignable to `type_tag`.
	pub fn with_type_tag(&self, type_tag: TypeTag) -> FilteredCollection {
		self.filtered(CollectionFilter::of_type(type_tag))
	}

	/// A live view of the elements satisfying `spec`.
	pub fn matching(&self, spec: impl Fn(&ObjectRef) -> bool + 'static) -> FilteredCollection {
		self.filtered(CollectionFilter::matching(self.inner.element_type, spec))
	}

	/// A live, read-only view restricted by `filter`.
	pub fn filtered(&self, filter: CollectionFilter) -> FilteredCollection {
		FilteredCollection::new(self.downgrade(), filter)
	}

	// --- rules ---

	/// Appends a rule, returning it.
	pub fn add_rule(&self, rule: Rule) -> Rule {
		self.inner.rules.borrow_mut().push(rule.clone());
		rule
	}

	/// Appends a rule built from a description and an action.
	pub fn add_rule_action(
		&self,
		description: impl Into<String>,
		action: impl Fn(&NamedObjectCollection, &str) + 'static,
	) -> Rule {
		self.add_rule(Rule::new(description, action))
	}

	/// The registered rules, in registration order.
	pub fn rules(&self) -> Vec<Rule> {
		self.inner.rules.borrow().clone()
	}

	/// Runs the rules for `name` unless they are already running for it.
	/// Returns true if the rules may have done some work.
	fn apply_rules(&self, name: &str) -> bool {
		let rules = self.inner.rules.borrow().clone();
		if rules.is_empty() {
			return false;
		}
		if !self
			.inner
			.applying_rules_for
			.borrow_mut()
			.insert(name.to_string())
		{
			return false;
		}
		let _scope = ApplyingScope {
			inner: &self.inner,
			name,
		};
		tracing::debug!(name = %name, rules = rules.len(), "applying rules for unknown element");
		for rule in &rules {
			rule.apply(self, name);
		}
		true
	}

	// --- listeners ---

	/// Registers an action fired once per element as it becomes known,
	/// realized or pending. The action immediately replays over the current
	/// population: realized elements first (in insertion order, without
	/// forcing pending producers), then pending producers in registration
	/// order.
	pub fn when_element_known(&self, action: impl Fn(&ElementInfo) + 'static) {
		self.when_element_known_action(Rc::new(action));
	}

	pub(crate) fn when_element_known_action(&self, action: ActionRc<ElementInfo>) {
		{
			let mut when_known = self.inner.when_known.borrow_mut();
			*when_known = when_known.add(action.clone());
		}
		let realized = self.inner.store.borrow().snapshot();
		for object in realized {
			let name = self.inner.namer.determine_name(&*object);
			action(&ElementInfo::object_backed(name, object));
		}
		let pending = self.inner.index.borrow().pending_as_map();
		for (name, provider) in pending {
			action(&ElementInfo::producer_backed(name, provider.type_tag()));
		}
	}

	fn deferred_element_known(&self, name: String, declared: Option<TypeTag>) {
		let when_known = self.inner.when_known.borrow().clone();
		when_known.execute(&ElementInfo::producer_backed(name, declared));
	}

	/// Registers an action fired after each element addition.
	pub fn when_object_added(&self, action: impl Fn(&ObjectRef) + 'static) {
		self.inner.events.borrow_mut().on_add(Rc::new(action));
	}

	/// Registers an action fired after each element removal.
	pub fn when_object_removed(&self, action: impl Fn(&ObjectRef) + 'static) {
		self.inner.events.borrow_mut().on_remove(Rc::new(action));
	}

	pub(crate) fn when_object_added_action(&self, action: ActionRc<ObjectRef>) {
		self.inner.events.borrow_mut().on_add(action);
	}

	pub(crate) fn when_object_removed_action(&self, action: ActionRc<ObjectRef>) {
		self.inner.events.borrow_mut().on_remove(action);
	}

	// --- provider support ---

	pub(crate) fn add_actions_snapshot(&self) -> ActionSet<ObjectRef> {
		self.inner.events.borrow().add_actions()
	}

	/// Drops a producer from the pending population after it realized its
	/// element.
	pub(crate) fn provider_realized(&self, provider: &ProviderRef) {
		self.inner.index.borrow_mut().remove_pending_provider(provider);
		self.inner.store.borrow_mut().remove_pending(provider);
	}

	pub(crate) fn lazy_realized(&self, name: &str, object: &ObjectRef) {
		tracing::debug!(name = %name, "realized lazy element");
		if let Some(hook) = &self.inner.on_lazy_realized {
			hook(name, object);
		}
	}
}

impl std::fmt::Display for NamedObjectCollection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.display_name())
	}
}

impl std::fmt::Debug for NamedObjectCollection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NamedObjectCollection")
			.field("display_name", &self.display_name())
			.field("realized", &self.len())
			.finish()
	}
}

/// Releases the in-flight rule name on all exit paths, including unwind out
/// of a failing rule.
struct ApplyingScope<'a> {
	inner: &'a CollectionInner,
	name: &'a str,
}

impl Drop for ApplyingScope<'_> {
	fn drop(&mut self) {
		self.inner.applying_rules_for.borrow_mut().remove(self.name);
	}
}
