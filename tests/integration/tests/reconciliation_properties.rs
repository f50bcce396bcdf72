//! Properties that hold for arbitrary update sequences.

use std::collections::HashMap;

use proptest::prelude::*;
use reinhardt_fiber::{
	ClassComponent, Component, Context, Descriptor, InstanceId, MemoryHost, NodeHandle, Props, PublicInstance, Reconciler,
	RenderOutcome, RenderResult, RenderScope, UpdateResult, Updater,
};
use reinhardt_fiber_integration_tests::{RefEvent, RefLog};

struct Item;

impl Component for Item {
	fn render(&self, scope: &RenderScope<'_>) -> RenderResult {
		Ok(RenderOutcome::rendered(
			Descriptor::host("li").child(scope.props().get_str("label").unwrap_or_default().to_string()),
		))
	}
}

fn list(item: &ClassComponent, keys: &[u8]) -> Descriptor {
	Descriptor::host("ul").children(keys.iter().map(|key| {
		Descriptor::new(item.clone())
			.key(format!("k{key}"))
			.prop("label", format!("item {key}"))
	}))
}

fn distinct_keys() -> impl Strategy<Value = Vec<u8>> {
	proptest::collection::btree_set(0u8..12, 0..8)
		.prop_map(|set| set.into_iter().collect::<Vec<_>>())
		.prop_shuffle()
}

fn setup() -> (Reconciler<MemoryHost>, NodeHandle) {
	let mut host = MemoryHost::new();
	let container = host.create_container();
	(Reconciler::new(host), container)
}

/// Component handle and host node of every list item, by rendered text.
fn snapshot(
	reconciler: &Reconciler<MemoryHost>,
	root: InstanceId,
) -> HashMap<String, (PublicInstance, NodeHandle)> {
	let mut out = HashMap::new();
	for child in reconciler.children(root) {
		let (Some(public), Some(node)) = (
			reconciler.public_instance(child),
			reconciler.host_nodes(child).first().copied(),
		) else {
			continue;
		};
		out.insert(reconciler.host().text_content(node), (public, node));
	}
	out
}

proptest! {
	#[test]
	fn prop_keyed_children_keep_identity(steps in proptest::collection::vec(distinct_keys(), 1..8)) {
		let (mut reconciler, container) = setup();
		let item = ClassComponent::new("Item", |_: &Props, _: &Context, _: Updater| Item);
		let context = Context::new();
		let root = reconciler
			.mount(&list(&item, &[]), container, &context)
			.unwrap()
			.instance
			.unwrap();
		let mut previous = snapshot(&reconciler, root);

		for keys in steps {
			reconciler.receive_component(root, &list(&item, &keys), &context).unwrap();
			let current = snapshot(&reconciler, root);

			for (label, (public, node)) in &current {
				if let Some((old_public, old_node)) = previous.get(label) {
					prop_assert_eq!(public, old_public);
					prop_assert_eq!(node, old_node);
				}
			}
			let expected: String = keys.iter().map(|key| format!("<li>item {key}</li>")).collect();
			prop_assert_eq!(
				reconciler.host().inner_html(container),
				format!("<ul>{expected}</ul>")
			);
			previous = current;
		}
	}

	#[test]
	fn prop_identical_descriptor_never_mutates_host(keys in distinct_keys(), repeats in 1usize..4) {
		let (mut reconciler, container) = setup();
		let item = ClassComponent::new("Item", |_: &Props, _: &Context, _: Updater| Item);
		let context = Context::new();
		let tree = list(&item, &keys);
		let root = reconciler.mount(&tree, container, &context).unwrap().instance.unwrap();
		reconciler.host_mut().clear_mutations();

		for _ in 0..repeats {
			let result = reconciler.receive_component(root, &tree, &context).unwrap();
			prop_assert!(matches!(result, UpdateResult::Skipped));
		}
		prop_assert!(reconciler.host().mutations().is_empty());
	}

	#[test]
	fn prop_refs_attach_and_detach_exactly_once(
		shapes in proptest::collection::vec(0u8..4, 1..16),
	) {
		struct Widget;

		impl Component for Widget {
			fn render(&self, _scope: &RenderScope<'_>) -> RenderResult {
				Ok(RenderOutcome::rendered("widget"))
			}
		}

		let (mut reconciler, container) = setup();
		let widget = ClassComponent::new("Widget", |_: &Props, _: &Context, _: Updater| Widget);
		let logs = [RefLog::new(), RefLog::new()];
		// Shape picks the element type (host or class) and which ref it carries.
		let view = |shape: u8| {
			let target = logs[usize::from(shape % 2)].target();
			let child = if shape < 2 {
				Descriptor::host("input").with_ref(target)
			} else {
				Descriptor::new(widget.clone()).with_ref(target)
			};
			Descriptor::host("form").child(child)
		};

		let context = Context::new();
		let root = reconciler.mount(&view(0), container, &context).unwrap().instance.unwrap();
		for shape in shapes {
			reconciler.receive_component(root, &view(shape), &context).unwrap();
		}
		reconciler.unmount_component(root).unwrap();

		for log in &logs {
			let events = log.events();
			prop_assert_eq!(events.len() % 2, 0);
			for pair in events.chunks(2) {
				prop_assert!(!matches!(pair[0], RefEvent::Detached));
				prop_assert_eq!(&pair[1], &RefEvent::Detached);
			}
		}
	}
}
