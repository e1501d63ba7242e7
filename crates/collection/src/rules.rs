//! Rules: lookup-miss callbacks that may create the missing element.

use std::rc::Rc;

use crate::collection::NamedObjectCollection;

type RuleAction = Rc<dyn Fn(&NamedObjectCollection, &str)>;

/// A named-element rule.
///
/// Rules run when a lookup misses both the realized and the pending
/// population. The action receives the owning collection and the missing
/// name and may perform arbitrary mutations, including adding the requested
/// element. Re-entrant lookups of the same name while its rules run do not
/// fire the rules again.
#[derive(Clone)]
pub struct Rule {
	inner: Rc<RuleInner>,
}

struct RuleInner {
	description: String,
	action: RuleAction,
}

impl Rule {
	/// Creates a rule from a description and an action.
	pub fn new(
		description: impl Into<String>,
		action: impl Fn(&NamedObjectCollection, &str) + 'static,
	) -> Self {
		Self {
			inner: Rc::new(RuleInner {
				description: description.into(),
				action: Rc::new(action),
			}),
		}
	}

	/// Human-readable description of what the rule does.
	pub fn description(&self) -> &str {
		&self.inner.description
	}

	pub(crate) fn apply(&self, collection: &NamedObjectCollection, name: &str) {
		(self.inner.action)(collection, name);
	}
}

impl std::fmt::Display for Rule {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Rule: {}", self.inner.description)
	}
}

impl std::fmt::Debug for Rule {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Rule: {}", self.inner.description)
	}
}
