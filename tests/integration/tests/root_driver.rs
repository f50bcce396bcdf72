//! Driving a whole tree through a root.

use reinhardt_fiber::{Context, Descriptor, FunctionComponent, MemoryHost, Mutation, Reconciler, RenderOutcome, Root};
use reinhardt_fiber_integration_tests::{Gate, RefEvent, RefLog, created_nodes, load_container, render_markup};
use rstest::rstest;

fn page(gate: &Gate) -> Descriptor {
	let body = gate.component("Body", |_| Descriptor::host("p").child("Hello"));
	Descriptor::host("article").child(Descriptor::new(body))
}

fn empty_root() -> Root<MemoryHost> {
	let mut host = MemoryHost::new();
	let container = host.create_container();
	Root::new(Reconciler::new(host), container)
}

#[rstest]
fn test_hydrating_root_adopts_server_markup() {
	let markup = render_markup(&page(&Gate::opened()), &Context::new());
	let (host, container) = load_container(&markup);
	let mut root = Root::hydrating(Reconciler::new(host), container);

	root.render(page(&Gate::opened())).unwrap();

	assert!(root.instance().is_some());
	assert_eq!(created_nodes(root.host()), 0);
	assert_eq!(root.host().inner_html(container), "<article><p>Hello</p></article>");
}

#[rstest]
fn test_suspended_hydration_keeps_markup_until_resolved() {
	let markup = render_markup(&page(&Gate::opened()), &Context::new());
	let (host, container) = load_container(&markup);
	let gate = Gate::new();
	let mut root = Root::hydrating(Reconciler::new(host), container);

	root.render(page(&gate)).unwrap();

	assert!(root.is_waiting());
	assert!(root.instance().is_none());
	assert_eq!(root.host().inner_html(container), markup);
	assert!(root.host().mutations().is_empty());

	gate.open();
	root.flush().unwrap();

	assert!(!root.is_waiting());
	assert_eq!(created_nodes(root.host()), 0);
	assert_eq!(root.host().inner_html(container), markup);
}

#[rstest]
fn test_newer_render_supersedes_pending_retry() {
	let gate = Gate::new();
	let mut root = empty_root();
	root.render(page(&gate)).unwrap();
	assert!(root.is_waiting());

	root.render(Descriptor::host("p").child("replacement")).unwrap();
	assert!(!root.is_waiting());

	gate.open();
	root.flush().unwrap();

	assert_eq!(root.host().inner_html(root.container()), "<p>replacement</p>");
}

#[rstest]
fn test_suspending_update_retries_against_latest_descriptor() {
	let gate = Gate::new();
	let mut root = empty_root();
	root.render(Descriptor::host("article").child("static")).unwrap();

	root.render(page(&gate)).unwrap();
	assert!(root.is_waiting());
	assert_eq!(root.host().inner_html(root.container()), "<article>static</article>");

	gate.open();
	root.flush().unwrap();

	assert_eq!(root.host().inner_html(root.container()), "<article><p>Hello</p></article>");
}

#[rstest]
fn test_suspended_update_keeps_committed_tree_until_superseded() {
	let gate = Gate::new();
	let log = RefLog::new();
	let mut root = empty_root();
	root.render(Descriptor::host("article").with_ref(log.target()).child("static"))
		.unwrap();
	let mounted = root.instance();
	let article = log.current_node().unwrap();
	root.host_mut().clear_mutations();

	let body = gate.component("Body", |_| Descriptor::host("p").child("Hello"));
	root.render(
		Descriptor::host("article")
			.with_ref(log.target())
			.attr("class", "loaded")
			.child(Descriptor::new(body)),
	)
	.unwrap();

	assert!(root.is_waiting());
	assert_eq!(root.instance(), mounted);
	assert_eq!(root.host().inner_html(root.container()), "<article>static</article>");
	assert_eq!(log.events(), vec![RefEvent::Node(article)]);
	assert!(
		root.host()
			.mutations()
			.iter()
			.all(|mutation| matches!(mutation, Mutation::CreateElement { .. } | Mutation::CreateText { .. }))
	);

	root.render(Descriptor::host("article").with_ref(log.target()).child("replacement"))
		.unwrap();
	assert!(!root.is_waiting());
	gate.open();
	root.flush().unwrap();

	assert_eq!(root.host().inner_html(root.container()), "<article>replacement</article>");
	assert_eq!(log.events(), vec![RefEvent::Node(article)]);
	assert_eq!(root.host().find_by_tag(root.container(), "article"), vec![article]);
}

#[rstest]
#[case::provided(Some("dark"), "<em>dark</em>")]
#[case::missing(None, "<em>plain</em>")]
fn test_root_context_reaches_consumers(#[case] theme: Option<&str>, #[case] expected: &str) {
	let consumer = FunctionComponent::new("Themed", |_, context| {
		let theme = context.get_str("theme").unwrap_or("plain");
		Ok(RenderOutcome::rendered(Descriptor::host("em").child(theme.to_string())))
	})
	.with_context_keys(&["theme"]);
	let context = match theme {
		Some(theme) => Context::new().with("theme", theme),
		None => Context::new(),
	};
	let mut root = empty_root().with_context(context);

	root.render(Descriptor::new(consumer)).unwrap();

	assert_eq!(root.host().inner_html(root.container()), expected);
}

#[rstest]
fn test_unmount_then_render_mounts_again() {
	let mut root = empty_root();
	root.render(Descriptor::host("p").child("first")).unwrap();
	root.unmount().unwrap();
	assert!(root.instance().is_none());
	assert_eq!(root.reconciler().instance_count(), 0);

	root.render(Descriptor::host("p").child("second")).unwrap();

	assert!(root.instance().is_some());
	assert_eq!(root.host().inner_html(root.container()), "<p>second</p>");
}

#[rstest]
fn test_unmount_without_render_is_a_no_op() {
	let mut root = empty_root();
	root.unmount().unwrap();
	assert_eq!(root.host().inner_html(root.container()), "");
}
