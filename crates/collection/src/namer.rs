//! Name derivation for elements.

use crate::object::DomainObject;

/// Derives the canonical name of an element.
///
/// Implementations must be pure and total: the same element always yields
/// the same non-empty name within one session.
pub trait Namer {
	/// Determines the name of the given object.
	fn determine_name(&self, object: &dyn DomainObject) -> String;
}

/// The default namer: delegates to [`crate::object::Named::name`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NamedNamer;

impl Namer for NamedNamer {
	fn determine_name(&self, object: &dyn DomainObject) -> String {
		object.name().to_string()
	}
}

impl<F> Namer for F
where
	F: Fn(&dyn DomainObject) -> String,
{
	fn determine_name(&self, object: &dyn DomainObject) -> String {
		self(object)
	}
}
