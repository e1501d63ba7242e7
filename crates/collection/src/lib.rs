//! Named, typed, lazily-populated domain-object collections.
//!
//! # Purpose
//!
//! A [`NamedObjectCollection`] stores elements addressable by a unique
//! string name derived from the element itself, across three coexisting
//! populations: *realized* elements already present, *pending* producers
//! that compute an element on demand, and *rule-driven* elements that do
//! not exist until a lookup by name triggers a registered [`Rule`].
//! Filtered [`FilteredCollection`] views observe the same underlying
//! population restricted by element type and predicate.
//!
//! # Mental model
//!
//! 1. **Population:** [`NamedObjectCollection::add`] installs a realized
//!    element; [`NamedObjectCollection::register`] reserves a name and
//!    defers creation to a factory; [`NamedObjectCollection::add_later`]
//!    registers a caller-supplied producer.
//! 2. **Lookup:** [`NamedObjectCollection::find_by_name`] reads realized
//!    state, forces a pending producer if one is registered under the name,
//!    and falls back to rules.
//! 3. **Handles:** [`NamedObjectCollection::named`] returns a
//!    [`DomainObjectProvider`]: a lazy-safe, removal-aware handle.
//! 4. **Observation:** [`NamedObjectCollection::when_element_known`]
//!    delivers one event per element, realized or pending, with immediate
//!    replay for late subscribers.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`NamedObjectCollection`] | The container: population, lookup, rules, listeners. |
//! | [`FilteredCollection`] | Live read-only view restricted by a [`CollectionFilter`]. |
//! | [`DomainObjectProvider`] | Handle to a named element, usable before realization. |
//! | [`CreatingProvider`] | Deferred producer wrapping a single-shot factory. |
//! | [`TypeTag`] | Runtime type token for declared types and filters. |
//! | [`CollectionError`] | Error taxonomy shared by collections and providers. |
//!
//! # Concurrency
//!
//! Single-threaded cooperative. The collection performs no locking; rules,
//! listeners, factories and configure actions run synchronously on the
//! caller and may re-enter the collection. Rule application is guarded
//! per name; provider `configure` actions run with structural mutation
//! disabled.

mod actions;
mod collection;
mod error;
mod filter;
mod guard;
mod index;
mod info;
mod namer;
mod object;
mod provider;
mod rules;
mod store;
mod types;

pub use collection::{
	CollectionBuilder, DuplicatePolicy, FilteredCollection, NamedObjectCollection,
};
pub use error::{CollectionError, CollectionResult, CreationFailure, DynError};
pub use filter::CollectionFilter;
pub use info::{ElementInfo, ElementSchema};
pub use namer::{NamedNamer, Namer};
pub use object::{DomainObject, Named, ObjectRef, ObjectRefExt};
pub use provider::{CreatingProvider, DomainObjectProvider, ExistingProvider, ProviderRef};
pub use rules::Rule;
pub use types::TypeTag;

#[cfg(test)]
pub(crate) mod test_fixtures;
