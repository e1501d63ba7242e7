//! Error types for collection operations.

use std::rc::Rc;

use thiserror::Error;

/// Boxed error returned by element factories.
pub type DynError = Box<dyn std::error::Error + 'static>;

/// Result alias for collection operations.
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Errors raised by collections, views and providers.
///
/// The enum is `Clone` so a cached creation failure can be surfaced again on
/// every subsequent access without re-running the factory.
#[derive(Debug, Clone, Error)]
pub enum CollectionError {
	/// No element with the requested name exists, after rules ran.
	#[error("{type_display_name} with name '{name}' not found.")]
	NotFound {
		/// Display name of the collection's element type.
		type_display_name: String,
		/// The requested element name.
		name: String,
	},

	/// An element with the same name already exists (strict collections only).
	#[error("Cannot add a {type_display_name} with name '{name}' as a {type_display_name} with that name already exists.")]
	DuplicateName {
		/// Display name of the collection's element type.
		type_display_name: String,
		/// The conflicting element name.
		name: String,
	},

	/// A creating provider's factory failed. Cached on the provider and
	/// returned again on every subsequent access.
	#[error("Could not create domain object '{name}' ({type_display_name})")]
	CreationFailed {
		/// Name of the element that failed to realize.
		name: String,
		/// Display name of the provider's declared type.
		type_display_name: String,
		/// The factory's failure.
		#[source]
		cause: CreationFailure,
	},

	/// A provider was accessed after its element was removed, or after its
	/// pending producer was dropped.
	#[error("The domain object '{name}' ({type_display_name}) for this provider is no longer present in its container.")]
	Removed {
		/// Name of the missing element.
		name: String,
		/// Display name of the provider's declared type.
		type_display_name: String,
	},

	/// A structural mutation was attempted while mutation is disabled.
	#[error("Cannot call {operation} on {target}: the container cannot be mutated while a configure action is executing.")]
	MutationDisallowed {
		/// The attempted operation.
		operation: &'static str,
		/// Display name of the collection.
		target: String,
	},

	/// A mutation was attempted on a read-only filtered view.
	#[error("{target} is a read-only filtered view and does not support {operation}.")]
	Unsupported {
		/// The attempted operation.
		operation: &'static str,
		/// Display name of the view.
		target: String,
	},

	/// An internal invariant was broken. Indicates a programming error.
	#[error("{message}")]
	Invariant {
		/// Description of the broken invariant.
		message: String,
	},
}

impl CollectionError {
	pub(crate) fn not_found(type_display_name: impl Into<String>, name: impl Into<String>) -> Self {
		Self::NotFound {
			type_display_name: type_display_name.into(),
			name: name.into(),
		}
	}

	pub(crate) fn duplicate_name(
		type_display_name: impl Into<String>,
		name: impl Into<String>,
	) -> Self {
		Self::DuplicateName {
			type_display_name: type_display_name.into(),
			name: name.into(),
		}
	}

	pub(crate) fn removed(type_display_name: impl Into<String>, name: impl Into<String>) -> Self {
		Self::Removed {
			name: name.into(),
			type_display_name: type_display_name.into(),
		}
	}
}

/// The cause of a failed element creation.
///
/// Wraps the factory error behind an `Rc` so the sticky failure cached on a
/// creating provider shares one underlying error across all surfaced copies.
#[derive(Debug, Clone)]
pub struct CreationFailure {
	cause: Rc<dyn std::error::Error + 'static>,
}

impl CreationFailure {
	pub(crate) fn new(cause: DynError) -> Self {
		Self { cause: cause.into() }
	}

	/// Returns true if `other` shares this failure's underlying error.
	pub fn same_failure(&self, other: &CreationFailure) -> bool {
		Rc::ptr_eq(&self.cause, &other.cause)
	}
}

impl std::fmt::Display for CreationFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Display::fmt(&self.cause, f)
	}
}

impl std::error::Error for CreationFailure {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.cause.source()
	}
}
