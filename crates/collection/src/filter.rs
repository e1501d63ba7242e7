//! Composable element filters.
//!
//! A filter is a target type plus an optional predicate. Composition with
//! [`CollectionFilter::and`] intersects the type tags and conjoins the
//! predicates in place, so chained filtered views never stack wrapper upon
//! wrapper.

use std::rc::Rc;

use crate::info::{ElementBacking, ElementInfo};
use crate::object::ObjectRef;
use crate::types::TypeTag;

type Spec = Rc<dyn Fn(&ObjectRef) -> bool>;

/// A target element type with an optional predicate.
#[derive(Clone)]
pub struct CollectionFilter {
	type_tag: TypeTag,
	spec: Option<Spec>,
}

impl CollectionFilter {
	/// A filter accepting every element assignable to `type_tag`.
	pub fn of_type(type_tag: TypeTag) -> Self {
		Self {
			type_tag,
			spec: None,
		}
	}

	/// A filter accepting elements assignable to `type_tag` that also satisfy
	/// `spec`.
	pub fn matching(type_tag: TypeTag, spec: impl Fn(&ObjectRef) -> bool + 'static) -> Self {
		Self {
			type_tag,
			spec: Some(Rc::new(spec)),
		}
	}

	/// The filter's target type.
	pub fn type_tag(&self) -> TypeTag {
		self.type_tag
	}

	/// Returns the element if it passes the filter, else `None`.
	pub fn filter(&self, object: &ObjectRef) -> Option<ObjectRef> {
		self.matches(object).then(|| object.clone())
	}

	/// Returns true if the element's type and the predicate both accept it.
	pub fn matches(&self, object: &ObjectRef) -> bool {
		self.type_tag.matches_object(object)
			&& self.spec.as_ref().is_none_or(|spec| spec(object))
	}

	/// Returns true if a pending producer with the given declared type may
	/// surface through this filter. Producers without a declared type never
	/// pass a filter.
	pub fn matches_pending(&self, declared: Option<TypeTag>) -> bool {
		declared.is_some_and(|tag| self.type_tag.is_assignable_from(&tag))
	}

	pub(crate) fn matches_info(&self, info: &ElementInfo) -> bool {
		match info.backing() {
			ElementBacking::Object(object) => self.matches(object),
			ElementBacking::Producer(declared) => self.matches_pending(*declared),
		}
	}

	/// Composes two filters: the target types are intersected and the
	/// predicates conjoined.
	pub fn and(&self, other: &CollectionFilter) -> CollectionFilter {
		let spec = match (&self.spec, &other.spec) {
			(None, None) => None,
			(Some(a), None) => Some(a.clone()),
			(None, Some(b)) => Some(b.clone()),
			(Some(a), Some(b)) => {
				let (a, b) = (a.clone(), b.clone());
				Some(Rc::new(move |object: &ObjectRef| a(object) && b(object)) as Spec)
			}
		};
		CollectionFilter {
			type_tag: self.type_tag.intersect(&other.type_tag),
			spec,
		}
	}
}

impl std::fmt::Debug for CollectionFilter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CollectionFilter")
			.field("type_tag", &self.type_tag)
			.field("spec", &self.spec.as_ref().map(|_| "<fn>"))
			.finish()
	}
}
