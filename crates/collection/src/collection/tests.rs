use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;
use crate::object::{Named, ObjectRefExt};
use crate::test_fixtures::{Widget, gadget, pending_producer, widget};

fn widgets() -> NamedObjectCollection {
	NamedObjectCollection::new(TypeTag::of::<Widget>())
}

fn elements() -> NamedObjectCollection {
	NamedObjectCollection::new(TypeTag::any("Element"))
}

#[test]
fn test_eager_add() {
	let collection = widgets();
	let a = widget("a");
	assert!(collection.add(a.clone()).expect("add"));

	assert_eq!(collection.len(), 1);
	let map = collection.as_map();
	assert!(Rc::ptr_eq(&map["a"], &a));
	assert_eq!(collection.names().into_iter().collect::<Vec<_>>(), ["a"]);

	let found = collection.find_by_name("a").expect("find").expect("present");
	assert!(Rc::ptr_eq(&found, &a));
}

/// A second element with a taken name is ignored by a lenient collection and
/// does not overwrite the first.
#[test]
fn test_duplicate_name_is_ignored_by_default() {
	let collection = widgets();
	let first = widget("a");
	let second = widget("a");
	assert!(collection.add(first.clone()).expect("add"));
	assert!(!collection.add(second).expect("add duplicate"));

	let found = collection.get_by_name("a").expect("get");
	assert!(Rc::ptr_eq(&found, &first));
}

#[test]
fn test_duplicate_name_fails_on_strict_collection() {
	let collection = NamedObjectCollection::builder(TypeTag::of::<Widget>())
		.duplicate_policy(DuplicatePolicy::Fail)
		.build();
	collection.add(widget("a")).expect("add");

	let err = collection.add(widget("a")).expect_err("duplicate must fail");
	assert!(matches!(err, CollectionError::DuplicateName { .. }));
	assert_eq!(
		err.to_string(),
		"Cannot add a Widget with name 'a' as a Widget with that name already exists."
	);
}

#[test]
fn test_not_found_message() {
	let collection = widgets();
	let err = collection.get_by_name("nope").expect_err("must miss");
	assert_eq!(err.to_string(), "Widget with name 'nope' not found.");
}

#[test]
fn test_display_names() {
	let collection = widgets();
	assert_eq!(collection.type_display_name(), "Widget");
	assert_eq!(collection.display_name(), "Widget container");

	let renamed = NamedObjectCollection::builder(TypeTag::of::<Widget>())
		.type_display_name("widget definition")
		.build();
	assert_eq!(renamed.display_name(), "widget definition container");
}

#[test]
fn test_add_all() {
	let collection = widgets();
	collection.add(widget("a")).expect("add");
	let changed = collection
		.add_all([widget("b"), widget("a"), widget("c")])
		.expect("add_all");
	assert!(changed);
	assert_eq!(
		collection.names().into_iter().collect::<Vec<_>>(),
		["a", "b", "c"]
	);

	assert!(!collection.add_all([widget("a")]).expect("all duplicates"));
}

/// Scenario: a lazy element is registered, visible by name, and moves to the
/// realized population on first lookup.
#[test]
fn test_lazy_element_moves_from_pending_to_realized() {
	let collection = widgets();
	let created = Rc::new(Cell::new(0u32));
	let counter = created.clone();
	let provider = collection
		.register("b", move || {
			counter.set(counter.get() + 1);
			Ok(widget("b"))
		})
		.expect("register");

	// Registered but unrealized: the name is known, the map is empty.
	assert_eq!(collection.names().into_iter().collect::<Vec<_>>(), ["b"]);
	assert!(collection.as_map().is_empty());
	assert!(collection.has_with_name("b"));
	assert_eq!(created.get(), 0);

	// named() surfaces the pending producer itself.
	let named = collection.named("b").expect("named");
	let pending: ProviderRef = provider.clone();
	assert!(Rc::ptr_eq(&named, &pending));

	let found = collection.find_by_name("b").expect("find").expect("realized");
	assert_eq!(created.get(), 1);
	assert!(Rc::ptr_eq(&collection.as_map()["b"], &found));

	// The pending entry is gone; named() now wraps the realized element.
	let named_after = collection.named("b").expect("named after realization");
	assert!(!Rc::ptr_eq(&named_after, &pending));

	// Repeated lookup does not re-run the factory.
	collection.find_by_name("b").expect("find again");
	assert_eq!(created.get(), 1);
}

#[test]
fn test_register_rejects_taken_name() {
	let collection = widgets();
	collection.add(widget("a")).expect("add");
	let err = collection
		.register("a", || Ok(widget("a")))
		.expect_err("name is taken");
	assert!(matches!(err, CollectionError::DuplicateName { .. }));
}

/// Lookup that hits a pending producer resolves through the producer and
/// does not fall back to rules, even when the producer yields nothing.
#[test]
fn test_pending_lookup_does_not_run_rules() {
	let collection = widgets();
	let fired = Rc::new(Cell::new(0u32));
	let counter = fired.clone();
	collection.add_rule_action("create on demand", move |_, _| {
		counter.set(counter.get() + 1);
	});

	collection
		.add_later(pending_producer("inert", None))
		.expect("add_later");
	let found = collection.find_by_name("inert").expect("find");
	assert!(found.is_none());
	assert_eq!(fired.get(), 0, "rules must not run for a pending name");
}

/// Scenario: a rule creates the requested element on lookup miss, and a
/// recursive lookup from inside the rule does not re-enter the rules.
#[test]
fn test_rule_created_element() {
	let collection = widgets();
	let invocations = Rc::new(Cell::new(0u32));
	let counter = invocations.clone();
	collection.add_rule_action("add x-names", move |c, name| {
		counter.set(counter.get() + 1);
		// A lookup for the name being ruled on must not recurse.
		let inner = c.find_by_name(name).expect("inner find");
		assert!(inner.is_none());
		if name.starts_with('x') {
			c.add(widget(name)).expect("rule add");
		}
	});

	let found = collection.find_by_name("xyz").expect("find").expect("rule made it");
	assert_eq!(found.name(), "xyz");
	assert_eq!(invocations.get(), 1);

	// A miss that the rule declines leaves the collection unchanged.
	assert!(collection.find_by_name("abc").expect("find").is_none());
	assert_eq!(invocations.get(), 2);
}

#[test]
fn test_rules_run_in_registration_order() {
	let collection = widgets();
	let order = Rc::new(RefCell::new(Vec::new()));
	let first = order.clone();
	collection.add_rule_action("first", move |_, _| first.borrow_mut().push(1));
	let second = order.clone();
	collection.add_rule_action("second", move |_, _| second.borrow_mut().push(2));

	assert!(collection.find_by_name("missing").expect("find").is_none());
	assert_eq!(*order.borrow(), [1, 2]);
	assert_eq!(collection.rules().len(), 2);
	assert_eq!(collection.rules()[0].description(), "first");
}

/// The in-flight name is released even when a rule panics, so later lookups
/// run the rules again.
#[test]
fn test_rule_failure_releases_reentrancy_guard() {
	let collection = widgets();
	let invocations = Rc::new(Cell::new(0u32));
	let counter = invocations.clone();
	collection.add_rule_action("explode", move |_, _| {
		counter.set(counter.get() + 1);
		panic!("rule failed");
	});

	let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
		let _ = collection.find_by_name("p");
	}));
	assert!(unwound.is_err());
	assert_eq!(invocations.get(), 1);

	let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
		let _ = collection.find_by_name("p");
	}));
	assert!(unwound.is_err());
	assert_eq!(invocations.get(), 2, "name must be released on unwind");
}

#[test]
fn test_named_runs_rules() {
	let collection = widgets();
	collection.add_rule_action("add x-names", |c, name| {
		if name.starts_with('x') {
			c.add(widget(name)).expect("rule add");
		}
	});

	let provider = collection.named("xa").expect("rule-created element");
	assert_eq!(provider.name(), "xa");
	assert!(provider.is_present());

	let err = collection.named("missing").expect_err("no rule matches");
	assert!(matches!(err, CollectionError::NotFound { .. }));
}

#[test]
fn test_remove() {
	let collection = widgets();
	let a = widget("a");
	collection.add(a.clone()).expect("add");
	assert!(collection.remove(&a).expect("remove"));
	assert!(!collection.remove(&a).expect("second remove"));
	assert!(collection.names().is_empty());
	assert!(collection.find_by_name("a").expect("find").is_none());
}

/// Scenario: after removal, a previously obtained provider reports the
/// element as gone.
#[test]
fn test_removed_provider() {
	let collection = widgets();
	let a = widget("a");
	collection.add(a.clone()).expect("add");
	let provider = collection.named("a").expect("named");
	assert!(provider.is_present());

	collection.remove(&a).expect("remove");
	assert!(!provider.is_present());
	assert!(provider.find().expect("find").is_none());
	let err = provider.get().expect_err("element is gone");
	assert_eq!(
		err.to_string(),
		"The domain object 'a' (Widget) for this provider is no longer present in its container."
	);
}

/// Scenario: a pending producer removed before realization signals removal
/// and never runs its factory.
#[test]
fn test_remove_before_realize() {
	let collection = widgets();
	let created = Rc::new(Cell::new(0u32));
	let counter = created.clone();
	let provider = collection
		.register("d", move || {
			counter.set(counter.get() + 1);
			Ok(widget("d"))
		})
		.expect("register");

	let pending: ProviderRef = provider.clone();
	assert!(collection.remove_later(&pending).expect("remove_later"));
	assert!(!collection.names().contains("d"));

	assert!(provider.find().expect("find after removal").is_none());
	let err = provider.get().expect_err("removed");
	assert!(matches!(err, CollectionError::Removed { .. }));
	assert_eq!(created.get(), 0);

	assert!(!collection.remove_later(&pending).expect("second removal"));
}

#[test]
fn test_remove_by_name() {
	let collection = widgets();
	let a = widget("a");
	collection.add(a.clone()).expect("add");
	let removed = collection.remove_by_name("a").expect("remove_by_name");
	assert!(Rc::ptr_eq(&removed, &a));

	let err = collection.remove_by_name("a").expect_err("already gone");
	assert!(matches!(err, CollectionError::NotFound { .. }));
}

#[test]
fn test_clear_drops_both_populations() {
	let collection = widgets();
	collection.add(widget("a")).expect("add");
	let provider = collection.register("b", || Ok(widget("b"))).expect("register");

	collection.clear().expect("clear");
	assert!(collection.names().is_empty());
	assert!(collection.as_map().is_empty());

	// The dropped producer observes the removal.
	let err = provider.get().expect_err("removed by clear");
	assert!(matches!(err, CollectionError::Removed { .. }));
}

#[test]
fn test_names_union_is_sorted_and_deduplicated() {
	let collection = widgets();
	collection.add(widget("c")).expect("add");
	collection.add(widget("a")).expect("add");
	collection.register("b", || Ok(widget("b"))).expect("register");
	// A pending entry under an already-realized name does not duplicate it.
	collection
		.add_later(pending_producer("a", Some(TypeTag::of::<Widget>())))
		.expect("add_later");

	assert_eq!(
		collection.names().into_iter().collect::<Vec<_>>(),
		["a", "b", "c"]
	);
}

/// The realized population already present replays to a new listener:
/// object-backed events first (insertion order), then producer-backed ones.
#[test]
fn test_when_element_known_replays_existing_population() {
	let collection = widgets();
	collection.add(widget("z")).expect("add");
	collection.add(widget("a")).expect("add");
	collection.register("lazy", || Ok(widget("lazy"))).expect("register");

	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = seen.clone();
	collection.when_element_known(move |info| {
		sink.borrow_mut().push((info.name().to_string(), info.is_realized()));
	});

	assert_eq!(
		*seen.borrow(),
		[
			("z".to_string(), true),
			("a".to_string(), true),
			("lazy".to_string(), false),
		]
	);
}

/// Scenario: listeners observe a lazy element once as pending when
/// registered before realization, and once as realized afterwards.
#[test]
fn test_when_element_known_timing_around_realization() {
	let collection = widgets();

	let early = Rc::new(RefCell::new(Vec::new()));
	let sink = early.clone();
	collection.when_element_known(move |info| {
		sink.borrow_mut().push((info.name().to_string(), info.is_realized()));
	});

	collection.register("b", || Ok(widget("b"))).expect("register");
	assert_eq!(*early.borrow(), [("b".to_string(), false)]);

	let mid = Rc::new(RefCell::new(Vec::new()));
	let sink = mid.clone();
	collection.when_element_known(move |info| {
		sink.borrow_mut().push((info.name().to_string(), info.is_realized()));
	});
	assert_eq!(*mid.borrow(), [("b".to_string(), false)]);

	collection.find_by_name("b").expect("realize");
	// The early listener saw the pending registration and the realization.
	assert_eq!(
		*early.borrow(),
		[("b".to_string(), false), ("b".to_string(), true)]
	);

	let late = Rc::new(RefCell::new(Vec::new()));
	let sink = late.clone();
	collection.when_element_known(move |info| {
		sink.borrow_mut().push((info.name().to_string(), info.is_realized()));
	});
	assert_eq!(*late.borrow(), [("b".to_string(), true)]);
}

#[test]
fn test_add_and_remove_events() {
	let collection = widgets();
	let added = Rc::new(RefCell::new(Vec::new()));
	let removed = Rc::new(RefCell::new(Vec::new()));
	let sink = added.clone();
	collection.when_object_added(move |object| sink.borrow_mut().push(object.name().to_string()));
	let sink = removed.clone();
	collection.when_object_removed(move |object| sink.borrow_mut().push(object.name().to_string()));

	let a = widget("a");
	collection.add(a.clone()).expect("add");
	collection.add(widget("b")).expect("add");
	collection.remove(&a).expect("remove");

	assert_eq!(*added.borrow(), ["a", "b"]);
	assert_eq!(*removed.borrow(), ["a"]);
}

/// Scenario: a filtered view tracks the parent live, restricted by type,
/// and rejects mutation.
#[test]
fn test_filtered_view_by_type() {
	let collection = elements();
	let a = widget("a");
	collection.add(a.clone()).expect("add");
	collection.add(gadget("b")).expect("add");

	let view = collection.with_type::<Widget>();
	assert_eq!(view.type_display_name(), "Widget");
	assert_eq!(view.display_name(), "Widget container");
	let map = view.as_map();
	assert_eq!(map.len(), 1);
	assert!(Rc::ptr_eq(&map["a"], &a));

	// The view is live: later parent additions show up.
	let c = widget("c");
	collection.add(c.clone()).expect("add");
	assert_eq!(view.as_map().len(), 2);
	assert!(view.names().contains("c"));

	let err = view.add(widget("d")).expect_err("views are read-only");
	assert!(matches!(err, CollectionError::Unsupported { .. }));
	assert!(view.clear().is_err());
	assert!(view.remove(&a).is_err());
	assert!(collection.find_by_name("d").expect("find").is_none());
}

/// Filtered lookups agree with filtering the parent's lookup result, and
/// the view's names are a subset of the parent's.
#[test]
fn test_filtered_consistency() {
	let collection = elements();
	collection.add(widget("a")).expect("add");
	collection.add(gadget("b")).expect("add");
	collection.add(widget("c")).expect("add");

	let view = collection.with_type::<Widget>();
	for name in ["a", "b", "c", "missing"] {
		let parent_filtered = collection
			.find_by_name(name)
			.expect("parent find")
			.filter(|object| object.is_type::<Widget>());
		let viewed = view.find_by_name(name).expect("view find");
		assert_eq!(parent_filtered.is_some(), viewed.is_some(), "name {name}");
	}
	assert!(view.names().is_subset(&collection.names()));
}

#[test]
fn test_matching_spec_view() {
	let collection = widgets();
	collection.add(widget("alpha")).expect("add");
	collection.add(widget("beta")).expect("add");

	let view = collection.matching(|object| object.name().starts_with('a'));
	assert_eq!(view.names().into_iter().collect::<Vec<_>>(), ["alpha"]);
	assert!(view.has_with_name("alpha"));
	assert!(!view.has_with_name("beta"));
}

/// Narrowing a view composes filters in place instead of stacking views.
#[test]
fn test_view_composition() {
	let collection = elements();
	collection.add(widget("alpha")).expect("add");
	collection.add(widget("beta")).expect("add");
	collection.add(gadget("ava")).expect("add");

	let view = collection
		.matching(|object| object.name().starts_with('a'))
		.with_type::<Widget>();
	assert_eq!(view.names().into_iter().collect::<Vec<_>>(), ["alpha"]);
}

/// A pending producer is visible through a view only when it declares an
/// assignable type; realization through the view applies the filter.
#[test]
fn test_filtered_view_of_pending_producers() {
	let collection = elements();
	collection
		.register_with_type("w", TypeTag::of::<Widget>(), || Ok(widget("w")))
		.expect("register");
	collection
		.add_later(pending_producer("untyped", None))
		.expect("add_later");

	let view = collection.with_type::<Widget>();
	assert!(view.has_with_name("w"));
	assert!(!view.has_with_name("untyped"));
	assert_eq!(view.names().into_iter().collect::<Vec<_>>(), ["w"]);

	let realized = view.find_by_name("w").expect("find").expect("realized");
	assert_eq!(realized.name(), "w");
	assert_eq!(collection.as_map().len(), 1);
}

#[test]
fn test_view_named() {
	let collection = elements();
	collection.add(widget("a")).expect("add");
	collection.add(gadget("g")).expect("add");

	let view = collection.with_type::<Widget>();
	let provider = view.named("a").expect("named");
	assert!(provider.is_present());
	assert_eq!(provider.name(), "a");

	// A non-matching element is invisible to the view's providers.
	let err = view.named("g").expect_err("filtered out");
	assert!(matches!(err, CollectionError::NotFound { .. }));
}

#[test]
fn test_view_events_are_filtered() {
	let collection = elements();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let view = collection.with_type::<Widget>();
	let sink = seen.clone();
	view.when_object_added(move |object| sink.borrow_mut().push(object.name().to_string()));

	collection.add(widget("a")).expect("add");
	collection.add(gadget("b")).expect("add");
	assert_eq!(*seen.borrow(), ["a"]);
}

#[test]
fn test_view_when_element_known_is_filtered() {
	let collection = elements();
	collection.add(widget("a")).expect("add");
	collection.add(gadget("b")).expect("add");
	collection
		.register_with_type("w", TypeTag::of::<Widget>(), || Ok(widget("w")))
		.expect("register");

	let seen = Rc::new(RefCell::new(Vec::new()));
	let view = collection.with_type::<Widget>();
	let sink = seen.clone();
	view.when_element_known(move |info| {
		sink.borrow_mut().push((info.name().to_string(), info.is_realized()));
	});
	assert_eq!(
		*seen.borrow(),
		[("a".to_string(), true), ("w".to_string(), false)]
	);

	collection.add(gadget("c")).expect("add");
	collection.add(widget("d")).expect("add");
	assert_eq!(
		*seen.borrow(),
		[
			("a".to_string(), true),
			("w".to_string(), false),
			("d".to_string(), true),
		]
	);
}

/// Schema enumerates realized entries name-sorted, then pending entries in
/// insertion order, with absent producer types reported as unknown.
#[test]
fn test_collection_schema() {
	let collection = elements();
	collection.add(widget("w")).expect("add");
	collection.add(gadget("g")).expect("add");
	collection
		.add_later(pending_producer("later", Some(TypeTag::of::<Sprocket>())))
		.expect("add_later");
	collection
		.add_later(pending_producer("anon", None))
		.expect("add_later");

	let schema = collection.collection_schema();
	let entries: Vec<(String, &str)> = schema
		.iter()
		.map(|entry| (entry.name.clone(), entry.type_display_name()))
		.collect();
	assert_eq!(
		entries,
		[
			("g".to_string(), "Gadget"),
			("w".to_string(), "Widget"),
			("later".to_string(), "Sprocket"),
			("anon".to_string(), "unknown"),
		]
	);
}

struct Sprocket;

impl Named for Sprocket {
	fn name(&self) -> &str {
		"sprocket"
	}
}

#[test]
fn test_elements_flush() {
	let collection = widgets();
	collection.add(widget("eager")).expect("add");
	collection.register("lazy", || Ok(widget("lazy"))).expect("register");

	let unforced = collection.elements_no_flush();
	assert_eq!(unforced.len(), 1);

	let all = collection.elements().expect("flush");
	let names: Vec<_> = all.iter().map(|object| object.name().to_string()).collect();
	assert_eq!(names, ["eager", "lazy"]);
	assert!(collection.contains(&all[1]));
}

/// Structural mutation from inside a provider configure action is rejected
/// by the mutation guard.
#[test]
fn test_mutation_disallowed_during_configure() {
	let collection = widgets();
	collection.add(widget("a")).expect("add");
	let provider = collection.named("a").expect("named");

	let observed = Rc::new(RefCell::new(None));
	let sink = observed.clone();
	let inner = collection.clone();
	provider
		.configure(Box::new(move |_| {
			*sink.borrow_mut() = Some(inner.add(widget("b")));
		}))
		.expect("configure");

	let result = observed.borrow_mut().take().expect("action ran");
	let err = result.expect_err("mutation must be rejected");
	assert!(matches!(err, CollectionError::MutationDisallowed { .. }));
	assert!(!collection.has_with_name("b"));
	// The guard is scoped: mutation works again afterwards.
	assert!(collection.add(widget("b")).expect("add after configure"));
}

#[test]
fn test_get_by_name_configured() {
	let collection = widgets();
	collection.add(widget("a")).expect("add");
	let configured = Rc::new(Cell::new(false));
	let flag = configured.clone();
	let object = collection
		.get_by_name_configured("a", move |_| flag.set(true))
		.expect("get");
	assert_eq!(object.name(), "a");
	assert!(configured.get());
}

/// Views hold only a weak reference: once the parent is dropped they read
/// as empty rather than keeping it alive.
#[test]
fn test_view_does_not_outlive_parent() {
	let collection = elements();
	collection.add(widget("a")).expect("add");
	let view = collection.with_type::<Widget>();
	assert_eq!(view.len(), 1);

	drop(collection);
	assert!(view.is_empty());
	assert!(view.as_map().is_empty());
	assert!(view.find_by_name("a").expect("find").is_none());
	assert!(matches!(
		view.named("a"),
		Err(CollectionError::NotFound { .. })
	));
}
