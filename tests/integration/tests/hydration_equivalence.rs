//! Hydrating server output of a tree matches mounting the tree fresh.

use proptest::prelude::*;
use reinhardt_fiber::{Context, Descriptor, MemoryHost, Node, Reconciler};
use reinhardt_fiber_integration_tests::{
	Gate, created_nodes, load_container, render_markup, strip_comments,
};

#[derive(Debug, Clone)]
enum Tree {
	Text(String),
	Element {
		tag: &'static str,
		attributes: Vec<(&'static str, String)>,
		children: Vec<Tree>,
	},
	Boundary(Vec<Tree>),
}

impl Tree {
	fn to_node(&self) -> Node {
		match self {
			Tree::Text(text) => Node::Text(text.clone()),
			Tree::Element {
				tag,
				attributes,
				children,
			} => {
				let mut descriptor = Descriptor::host(*tag);
				for (name, value) in attributes {
					descriptor = descriptor.attr(*name, value.clone());
				}
				Node::Element(descriptor.children(children.iter().map(Tree::to_node)))
			}
			Tree::Boundary(children) => Node::Element(
				Descriptor::suspense("loading").children(children.iter().map(Tree::to_node)),
			),
		}
	}
}

fn tree() -> impl Strategy<Value = Tree> {
	let leaf = "[a-z]{1,6}".prop_map(Tree::Text);
	leaf.prop_recursive(4, 32, 4, |inner| {
		prop_oneof![
			3 => (
				prop::sample::select(vec!["div", "span", "b", "em", "section", "code"]),
				prop::collection::btree_map(
					prop::sample::select(vec!["class", "id", "title", "data-x"]),
					"[a-z]{0,4}",
					0..3,
				),
				prop::collection::vec(inner.clone(), 0..4),
			)
				.prop_map(|(tag, attributes, children)| Tree::Element {
					tag,
					attributes: attributes.into_iter().collect(),
					children,
				}),
			1 => prop::collection::vec(inner, 0..3).prop_map(Tree::Boundary),
		]
	})
}

fn root(tree: &Tree) -> Descriptor {
	Descriptor::host("main").child(tree.to_node())
}

fn fresh_mount(descriptor: &Descriptor) -> String {
	let mut host = MemoryHost::new();
	let container = host.create_container();
	let mut reconciler = Reconciler::new(host);
	reconciler.mount(descriptor, container, &Context::new()).unwrap();
	reconciler.host().inner_html(container)
}

proptest! {
	#[test]
	fn prop_hydration_matches_fresh_mount(tree in tree()) {
		let descriptor = root(&tree);
		let markup = render_markup(&descriptor, &Context::new());
		let (host, container) = load_container(&markup);
		let mut reconciler = Reconciler::new(host);

		reconciler.hydrate(&descriptor, container, &Context::new()).unwrap();

		prop_assert_eq!(created_nodes(reconciler.host()), 0);
		prop_assert_eq!(
			strip_comments(&reconciler.host().inner_html(container)),
			fresh_mount(&descriptor)
		);
	}

	#[test]
	fn prop_deferred_hydration_matches_fresh_mount(tree in tree()) {
		// Wrap the whole tree in a boundary whose content waits on data the
		// server already had.
		let server = Gate::opened();
		let client = Gate::new();
		let build = |gate: &Gate| {
			let body = tree.clone();
			let content = gate.component("Content", move |_| body.to_node());
			Descriptor::host("main").child(Descriptor::suspense("loading").child(Descriptor::new(content)))
		};
		let markup = render_markup(&build(&server), &Context::new());
		let (host, container) = load_container(&markup);
		let mut reconciler = Reconciler::new(host);
		let descriptor = build(&client);

		reconciler.hydrate(&descriptor, container, &Context::new()).unwrap();
		prop_assert_eq!(reconciler.host().inner_html(container), markup.clone());
		client.open();
		reconciler.flush().unwrap();

		prop_assert_eq!(created_nodes(reconciler.host()), 0);
		prop_assert_eq!(
			strip_comments(&reconciler.host().inner_html(container)),
			strip_comments(&markup)
		);
	}
}
