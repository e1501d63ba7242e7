//! Shared fixtures for collection tests.

use std::rc::Rc;

use crate::error::CollectionResult;
use crate::object::{Named, ObjectRef};
use crate::provider::{DomainObjectProvider, ProviderRef};
use crate::types::TypeTag;

pub(crate) struct Widget {
	pub name: String,
}

impl Named for Widget {
	fn name(&self) -> &str {
		&self.name
	}
}

pub(crate) struct Gadget {
	pub name: String,
}

impl Named for Gadget {
	fn name(&self) -> &str {
		&self.name
	}
}

pub(crate) fn widget(name: &str) -> ObjectRef {
	Rc::new(Widget { name: name.into() })
}

pub(crate) fn gadget(name: &str) -> ObjectRef {
	Rc::new(Gadget { name: name.into() })
}

/// A do-nothing pending producer with a fixed name and declared type.
pub(crate) struct InertProducer {
	name: String,
	declared: Option<TypeTag>,
}

impl DomainObjectProvider for InertProducer {
	fn name(&self) -> &str {
		&self.name
	}

	fn type_tag(&self) -> Option<TypeTag> {
		self.declared
	}

	fn find(&self) -> CollectionResult<Option<ObjectRef>> {
		Ok(None)
	}

	fn get(&self) -> CollectionResult<ObjectRef> {
		Err(crate::error::CollectionError::not_found(
			"Widget",
			&self.name,
		))
	}

	fn is_present(&self) -> bool {
		false
	}

	fn configure(&self, _action: Box<dyn Fn(&ObjectRef)>) -> CollectionResult<()> {
		Ok(())
	}
}

pub(crate) fn pending_producer(name: &str, declared: Option<TypeTag>) -> ProviderRef {
	Rc::new(InertProducer {
		name: name.into(),
		declared,
	})
}
