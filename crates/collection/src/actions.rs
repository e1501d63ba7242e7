//! Immutable, copy-on-add callback sets.
//!
//! An [`ActionSet`] is never mutated in place: `add` and `merge_from` return
//! a new set sharing the unchanged prefix. Callers snapshot the current set
//! (a cheap `Rc` clone) before running callbacks, so re-entrant registration
//! during execution never invalidates an iteration in progress.
//!
//! Merging deduplicates by callback identity. A creating provider repeatedly
//! re-merges the container's add actions into its own set; identity
//! deduplication keeps each action from firing twice for one element.

use std::rc::Rc;

/// A shared single-argument callback.
pub(crate) type ActionRc<T> = Rc<dyn Fn(&T)>;

/// An immutable set of callbacks over `T`.
pub(crate) struct ActionSet<T> {
	actions: Rc<[ActionRc<T>]>,
}

impl<T> Default for ActionSet<T> {
	fn default() -> Self {
		Self::empty()
	}
}

impl<T> Clone for ActionSet<T> {
	fn clone(&self) -> Self {
		Self {
			actions: self.actions.clone(),
		}
	}
}

impl<T> ActionSet<T> {
	/// Returns the empty set.
	pub fn empty() -> Self {
		Self {
			actions: Vec::new().into(),
		}
	}

	/// Returns a new set with `action` appended.
	pub fn add(&self, action: ActionRc<T>) -> Self {
		let mut actions: Vec<ActionRc<T>> = self.actions.to_vec();
		actions.push(action);
		Self {
			actions: actions.into(),
		}
	}

	/// Returns the union of both sets, deduplicated by callback identity.
	/// Actions from `other` that are already present are not appended again.
	pub fn merge_from(&self, other: &ActionSet<T>) -> Self {
		if other.is_empty() {
			return self.clone();
		}
		let mut actions: Vec<ActionRc<T>> = self.actions.to_vec();
		for action in other.actions.iter() {
			if !actions.iter().any(|existing| Rc::ptr_eq(existing, action)) {
				actions.push(action.clone());
			}
		}
		Self {
			actions: actions.into(),
		}
	}

	/// Runs every action against `value`, in registration order.
	pub fn execute(&self, value: &T) {
		for action in self.actions.iter() {
			action(value);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty()
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.actions.len()
	}
}
