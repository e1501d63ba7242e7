//! Handles to named elements.
//!
//! A provider is a lazy-safe, removal-aware reference into a collection:
//! usable before the element exists, and able to report that the element is
//! gone after its removal. Two kinds exist:
//!
//! - [`ExistingProvider`] wraps an element that was already realized when
//!   the handle was requested. It holds no element state of its own; every
//!   access re-reads the collection, so removal is observed naturally.
//! - [`CreatingProvider`] wraps a factory plus a queue of configure actions.
//!   It realizes the element at most once, adds it to the owning collection
//!   as a side effect of the first successful access, and caches a creation
//!   failure so the factory never runs twice.
//!
//! Providers hold a weak back-reference to the collection and never extend
//! its lifetime; once the collection is dropped they read as absent.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::actions::{ActionRc, ActionSet};
use crate::collection::{CollectionInner, NamedObjectCollection};
use crate::error::{CollectionError, CollectionResult, CreationFailure, DynError};
use crate::filter::CollectionFilter;
use crate::object::ObjectRef;
use crate::types::TypeTag;


/// A handle to a named element of a collection.
pub trait DomainObjectProvider {
	/// The name of the element this provider refers to.
	fn name(&self) -> &str;

	/// The provider's declared element type, if it carries one. Pending
	/// producers without a declared type are invisible to filtered views.
	fn type_tag(&self) -> Option<TypeTag>;

	/// Returns the element, realizing it first if necessary, or `None` if it
	/// is absent or was removed. On a pending producer owned by a
	/// collection, a successful call has the side effect of adding the
	/// realized element to that collection. A cached creation failure is
	/// returned as the error on every call.
	fn find(&self) -> CollectionResult<Option<ObjectRef>>;

	/// Returns the element or an error describing why it is unavailable.
	fn get(&self) -> CollectionResult<ObjectRef>;

	/// Returns true if a lookup would currently yield an element.
	fn is_present(&self) -> bool;

	/// Runs `action` against the element, now if it is realized, otherwise
	/// when it becomes realized. The action runs with collection mutation
	/// disabled.
	fn configure(&self, action: Box<dyn Fn(&ObjectRef)>) -> CollectionResult<()>;

	/// Lifecycle hook invoked by the collection when this provider is
	/// dropped from the pending population before realization.
	fn mark_removed_before_realized(&self) {}
}

impl std::fmt::Debug for dyn DomainObjectProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DomainObjectProvider")
			.field("name", &self.name())
			.field("type_tag", &self.type_tag())
			.finish()
	}
}

/// Shared handle to a provider.
pub type ProviderRef = Rc<dyn DomainObjectProvider>;

/// Provider over an element that was realized when the handle was created.
pub struct ExistingProvider {
	collection: Weak<CollectionInner>,
	name: String,
	declared: TypeTag,
	filter: Option<CollectionFilter>,
}

impl ExistingProvider {
	pub(crate) fn new(
		collection: Weak<CollectionInner>,
		name: String,
		declared: TypeTag,
		filter: Option<CollectionFilter>,
	) -> Rc<Self> {
		Rc::new(Self {
			collection,
			name,
			declared,
			filter,
		})
	}
}

impl DomainObjectProvider for ExistingProvider {
	fn name(&self) -> &str {
		&self.name
	}

	fn type_tag(&self) -> Option<TypeTag> {
		Some(self.declared)
	}

	fn find(&self) -> CollectionResult<Option<ObjectRef>> {
		let Some(inner) = self.collection.upgrade() else {
			return Ok(None);
		};
		let index = inner.index.borrow();
		let object = match &self.filter {
			Some(filter) => index.get_filtered(&self.name, filter),
			None => index.get(&self.name),
		};
		Ok(object)
	}

	fn get(&self) -> CollectionResult<ObjectRef> {
		match self.find()? {
			Some(object) => Ok(object),
			None => Err(CollectionError::removed(
				self.declared.display_name(),
				&self.name,
			)),
		}
	}

	fn is_present(&self) -> bool {
		matches!(self.find(), Ok(Some(_)))
	}

	fn configure(&self, action: Box<dyn Fn(&ObjectRef)>) -> CollectionResult<()> {
		let object = self.get()?;
		match self.collection.upgrade() {
			Some(inner) => inner.guard.with_mutation_disabled(|| action(&object)),
			None => action(&object),
		}
		Ok(())
	}
}

/// The factory injected into a [`CreatingProvider`].
pub type ObjectFactory = Box<dyn FnOnce() -> Result<ObjectRef, DynError>>;

/// Provider that creates its element on first access.
///
/// State machine: unrealized, then exactly one of realized, failed, or
/// removed-before-realized. A realized element can still disappear from the
/// collection; the provider detects that by re-reading the index.
pub struct CreatingProvider {
	me: Weak<CreatingProvider>,
	collection: Weak<CollectionInner>,
	name: String,
	declared: TypeTag,
	factory: RefCell<Option<ObjectFactory>>,
	object: RefCell<Option<ObjectRef>>,
	failure: RefCell<Option<CollectionError>>,
	on_create: RefCell<ActionSet<ObjectRef>>,
	removed_before_realized: Cell<bool>,
	realizing: Cell<bool>,
}

impl std::fmt::Debug for CreatingProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CreatingProvider")
			.field("name", &self.name)
			.field("declared", &self.declared)
			.finish()
	}
}

impl CreatingProvider {
	pub(crate) fn new(
		collection: &NamedObjectCollection,
		name: String,
		declared: TypeTag,
		factory: ObjectFactory,
	) -> Rc<Self> {
		// Seed the per-element notification set with the add actions already
		// registered on the collection; later registrations are collected
		// again on configure and just before creation.
		let on_create = ActionSet::empty().merge_from(&collection.add_actions_snapshot());
		Rc::new_cyclic(|me| Self {
			me: me.clone(),
			collection: collection.downgrade(),
			name,
			declared,
			factory: RefCell::new(Some(factory)),
			object: RefCell::new(None),
			failure: RefCell::new(None),
			on_create: RefCell::new(on_create),
			removed_before_realized: Cell::new(false),
			realizing: Cell::new(false),
		})
	}

	fn collection(&self) -> Option<NamedObjectCollection> {
		self.collection.upgrade().map(NamedObjectCollection::from_inner)
	}

	/// True if the element is gone for good: the pending producer was
	/// dropped, or the realized element was removed, and nothing (including
	/// a rule) currently supplies an element under this name.
	fn was_element_removed(&self) -> bool {
		(self.removed_before_realized.get() || self.was_removed_after_realized())
			&& !self.is_present_now()
	}

	fn was_removed_after_realized(&self) -> bool {
		if self.object.borrow().is_none() {
			return false;
		}
		match self.collection() {
			Some(collection) => collection.find_by_name_without_rules(&self.name).is_none(),
			None => true,
		}
	}

	fn is_present_now(&self) -> bool {
		match self.collection() {
			Some(collection) => collection.find_domain_object(&self.name).is_some(),
			None => false,
		}
	}

	fn try_create(&self, collection: &NamedObjectCollection) -> CollectionResult<()> {
		let result = {
			let _scope = RealizeScope::enter(self);
			self.create_and_register(collection)
		};
		if let Err(cause) = result {
			tracing::debug!(name = %self.name, error = %cause, "domain object creation failed");
			let failure = CollectionError::CreationFailed {
				name: self.name.clone(),
				type_display_name: self.declared.display_name().to_string(),
				cause: CreationFailure::new(cause),
			};
			*self.failure.borrow_mut() = Some(failure.clone());
			return Err(failure);
		}
		Ok(())
	}

	fn create_and_register(&self, collection: &NamedObjectCollection) -> Result<(), DynError> {
		// Collect add actions registered since the last configure call, then
		// freeze the set: actions added during the factory run are not
		// guaranteed to fire for this element.
		let merged = self
			.on_create
			.borrow()
			.merge_from(&collection.add_actions_snapshot());
		*self.on_create.borrow_mut() = merged.clone();

		let factory = self.factory.borrow_mut().take().ok_or_else(|| {
			Box::new(CollectionError::Invariant {
				message: format!("factory for domain object '{}' already consumed", self.name),
			}) as DynError
		})?;

		tracing::debug!(name = %self.name, "creating domain object");
		let object = factory()?;
		*self.object.borrow_mut() = Some(object.clone());

		collection
			.add_internal(object.clone(), &merged)
			.map_err(|error| Box::new(error) as DynError)?;
		if let Some(me) = self.me.upgrade() {
			let provider: ProviderRef = me;
			collection.provider_realized(&provider);
		}
		collection.lazy_realized(&self.name, &object);
		Ok(())
	}
}

impl DomainObjectProvider for CreatingProvider {
	fn name(&self) -> &str {
		&self.name
	}

	fn type_tag(&self) -> Option<TypeTag> {
		Some(self.declared)
	}

	fn find(&self) -> CollectionResult<Option<ObjectRef>> {
		if self.was_element_removed() {
			return Ok(None);
		}
		if let Some(failure) = self.failure.borrow().clone() {
			return Err(failure);
		}
		if let Some(object) = self.object.borrow().clone() {
			return Ok(Some(object));
		}
		let Some(collection) = self.collection() else {
			return Ok(None);
		};
		if let Some(existing) = collection.find_by_name_without_rules(&self.name) {
			// Something else realized this name first; adopt it.
			if !self.declared.matches_object(&existing) {
				return Err(CollectionError::Invariant {
					message: format!(
						"element '{}' exists but is not a {}",
						self.name,
						self.declared.display_name()
					),
				});
			}
			*self.object.borrow_mut() = Some(existing.clone());
			return Ok(Some(existing));
		}
		if self.realizing.get() {
			// Re-entrant lookup from inside the factory: the element is not
			// realized yet, and recursing into the factory is not an option.
			return Ok(None);
		}
		self.try_create(&collection)?;
		Ok(self.object.borrow().clone())
	}

	fn get(&self) -> CollectionResult<ObjectRef> {
		if self.was_element_removed() {
			return Err(CollectionError::removed(
				self.declared.display_name(),
				&self.name,
			));
		}
		match self.find()? {
			Some(object) => Ok(object),
			None => Err(CollectionError::not_found(
				self.declared.display_name(),
				&self.name,
			)),
		}
	}

	fn is_present(&self) -> bool {
		if self.failure.borrow().is_some() {
			return false;
		}
		self.is_present_now()
	}

	fn configure(&self, action: Box<dyn Fn(&ObjectRef)>) -> CollectionResult<()> {
		let collection = self.collection.clone();
		let action: Rc<dyn Fn(&ObjectRef)> = Rc::from(action);
		let wrapped: ActionRc<ObjectRef> = Rc::new(move |object: &ObjectRef| {
			match collection.upgrade() {
				Some(inner) => inner.guard.with_mutation_disabled(|| action(object)),
				None => action(object),
			}
		});

		let realized = self.object.borrow().clone();
		if let Some(object) = realized {
			// Already realized; run now.
			wrapped(&object);
			return Ok(());
		}

		// Collect container-level add actions registered since the last
		// call, then queue the object-specific action after them.
		let merged = match self.collection() {
			Some(collection) => self
				.on_create
				.borrow()
				.merge_from(&collection.add_actions_snapshot()),
			None => self.on_create.borrow().clone(),
		};
		*self.on_create.borrow_mut() = merged.add(wrapped);
		Ok(())
	}

	fn mark_removed_before_realized(&self) {
		self.removed_before_realized.set(true);
	}
}

/// Marks a realization in flight, and on exit (success, failure or unwind)
/// clears the in-flight flag and discards the accumulated per-element
/// actions so their captures are released.
struct RealizeScope<'a> {
	provider: &'a CreatingProvider,
}

impl<'a> RealizeScope<'a> {
	fn enter(provider: &'a CreatingProvider) -> Self {
		provider.realizing.set(true);
		Self { provider }
	}
}

impl Drop for RealizeScope<'_> {
	fn drop(&mut self) {
		self.provider.realizing.set(false);
		*self.provider.on_create.borrow_mut() = ActionSet::empty();
	}
}
