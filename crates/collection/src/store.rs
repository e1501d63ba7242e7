//! Underlying element storage and the mutation event register.

use std::rc::Rc;

use crate::actions::{ActionRc, ActionSet};
use crate::object::ObjectRef;
use crate::provider::ProviderRef;

/// The authoritative store of realized elements plus the registered pending
/// producers, both in insertion order. Membership is by identity.
#[derive(Default)]
pub(crate) struct ElementStore {
	elements: Vec<ObjectRef>,
	pending: Vec<ProviderRef>,
}

impl ElementStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an element; returns false if this exact element is already
	/// present.
	pub fn add(&mut self, object: ObjectRef) -> bool {
		if self.contains(&object) {
			return false;
		}
		self.elements.push(object);
		true
	}

	pub fn remove(&mut self, object: &ObjectRef) -> bool {
		let before = self.elements.len();
		self.elements.retain(|existing| !Rc::ptr_eq(existing, object));
		self.elements.len() != before
	}

	pub fn contains(&self, object: &ObjectRef) -> bool {
		self.elements.iter().any(|existing| Rc::ptr_eq(existing, object))
	}

	/// Insertion-ordered snapshot of the realized elements. Does not force
	/// pending producers.
	pub fn snapshot(&self) -> Vec<ObjectRef> {
		self.elements.clone()
	}

	pub fn add_pending(&mut self, provider: ProviderRef) {
		self.pending.push(provider);
	}

	pub fn remove_pending(&mut self, provider: &ProviderRef) -> bool {
		let before = self.pending.len();
		self.pending.retain(|existing| !Rc::ptr_eq(existing, provider));
		self.pending.len() != before
	}

	pub fn pending_snapshot(&self) -> Vec<ProviderRef> {
		self.pending.clone()
	}

	/// Empties the store, returning what was held so the caller can run
	/// removal bookkeeping without borrowing the store.
	pub fn clear(&mut self) -> (Vec<ObjectRef>, Vec<ProviderRef>) {
		(
			std::mem::take(&mut self.elements),
			std::mem::take(&mut self.pending),
		)
	}
}

/// Listener sets fired after successful element addition and removal.
#[derive(Default)]
pub(crate) struct EventRegister {
	add_actions: ActionSet<ObjectRef>,
	remove_actions: ActionSet<ObjectRef>,
}

impl EventRegister {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_actions(&self) -> ActionSet<ObjectRef> {
		self.add_actions.clone()
	}

	pub fn remove_actions(&self) -> ActionSet<ObjectRef> {
		self.remove_actions.clone()
	}

	pub fn on_add(&mut self, action: ActionRc<ObjectRef>) {
		self.add_actions = self.add_actions.add(action);
	}

	pub fn on_remove(&mut self, action: ActionRc<ObjectRef>) {
		self.remove_actions = self.remove_actions.add(action);
	}
}
