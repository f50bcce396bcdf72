//! Partial hydration scenarios: server render, load, hydrate while parts of
//! the tree are still waiting on data, then resolve.

use reinhardt_fiber::{BoundaryState, Context, Descriptor, FunctionComponent, MemoryHost, Reconciler};
use reinhardt_fiber_integration_tests::{
	Gate, RefEvent, RefLog, created_nodes, load_container, render_markup,
};
use rstest::rstest;

/// `div > Suspense("Loading...") > Child(text)`, where `Child` renders a
/// `span` carrying `log`'s ref and waits on `gate`.
struct App {
	gate: Gate,
	log: RefLog,
	child: FunctionComponent,
}

impl App {
	fn new(gate: Gate) -> Self {
		let log = RefLog::new();
		let target = log.target();
		let child = gate.component("Child", move |props| {
			Descriptor::host("span")
				.attr("class", props.get_str("class").unwrap_or("label"))
				.with_ref(target.clone())
				.child(props.get_str("text").unwrap_or_default().to_string())
		});
		Self { gate, log, child }
	}

	fn boundary(&self, text: &str, class: &str) -> Descriptor {
		Descriptor::suspense("Loading...").child(
			Descriptor::new(self.child.clone())
				.prop("text", text)
				.prop("class", class),
		)
	}

	fn render(&self, text: &str) -> Descriptor {
		Descriptor::host("div").child(self.boundary(text, "label"))
	}
}

fn server_markup(descriptor: impl Fn(&App) -> Descriptor) -> String {
	render_markup(&descriptor(&App::new(Gate::opened())), &Context::new())
}

#[rstest]
fn test_resolved_boundary_adopts_server_node_and_ref() {
	let markup = server_markup(|app| app.render("Hello"));
	assert_eq!(
		markup,
		r#"<div><!--rh-start--><span class="label">Hello</span><!--rh-end--></div>"#
	);
	let (host, container) = load_container(&markup);
	let server_span = host.find_by_tag(container, "span")[0];
	let app = App::new(Gate::new());
	let context = Context::new();
	let mut reconciler = Reconciler::new(host);

	let root = reconciler
		.hydrate(&app.render("Hello"), container, &context)
		.unwrap()
		.instance
		.unwrap();

	// Waiting: nothing attached, nothing touched.
	let boundary = reconciler.boundaries(root)[0];
	assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Dehydrated));
	assert!(app.log.events().is_empty());
	assert_eq!(reconciler.host().inner_html(container), markup);

	app.gate.open();
	reconciler.flush().unwrap();

	assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Hydrated));
	assert_eq!(app.log.events(), vec![RefEvent::Node(server_span)]);
	assert_eq!(reconciler.host().text_content(server_span), "Hello");
	assert_eq!(reconciler.host().inner_html(container), markup);
	assert_eq!(created_nodes(reconciler.host()), 0);
}

#[rstest]
fn test_new_props_before_resolution_show_fallback_and_discard_markup() {
	let markup = server_markup(|app| app.render("Hello"));
	let (host, container) = load_container(&markup);
	let server_span = host.find_by_tag(container, "span")[0];
	let app = App::new(Gate::new());
	let context = Context::new();
	let mut reconciler = Reconciler::new(host);
	let root = reconciler
		.hydrate(&app.render("Hello"), container, &context)
		.unwrap()
		.instance
		.unwrap();
	let boundary = reconciler.boundaries(root)[0];

	reconciler
		.receive_component(root, &app.render("Hi"), &context)
		.unwrap();

	assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Discarded));
	assert_eq!(reconciler.is_showing_fallback(boundary), Some(true));
	assert_eq!(reconciler.host().inner_html(container), "<div>Loading...</div>");
	assert_eq!(reconciler.host().parent(server_span), None);
	assert!(app.log.events().is_empty());

	app.gate.open();
	reconciler.flush().unwrap();

	let spans = reconciler.host().find_by_tag(container, "span");
	assert_eq!(spans.len(), 1);
	assert_ne!(spans[0], server_span);
	assert_eq!(app.log.events(), vec![RefEvent::Node(spans[0])]);
	assert_eq!(
		reconciler.host().inner_html(container),
		r#"<div><span class="label">Hi</span></div>"#
	);
}

#[rstest]
fn test_new_props_leave_nothing_of_stale_markup() {
	let markup = server_markup(|app| Descriptor::host("div").child(app.boundary("Hello", "old")));
	let (host, container) = load_container(&markup);
	let app = App::new(Gate::new());
	let context = Context::new();
	let mut reconciler = Reconciler::new(host);
	let root = reconciler
		.hydrate(
			&Descriptor::host("div").child(app.boundary("Hello", "old")),
			container,
			&context,
		)
		.unwrap()
		.instance
		.unwrap();

	reconciler
		.receive_component(
			root,
			&Descriptor::host("div").child(app.boundary("Hello", "new")),
			&context,
		)
		.unwrap();
	app.gate.open();
	reconciler.flush().unwrap();

	let html = reconciler.host().inner_html(container);
	assert_eq!(html, r#"<div><span class="new">Hello</span></div>"#);
	assert!(!html.contains("old"));
}

#[rstest]
fn test_unchanged_props_keep_waiting_on_server_markup() {
	let markup = server_markup(|app| app.render("Hello"));
	let (host, container) = load_container(&markup);
	let server_span = host.find_by_tag(container, "span")[0];
	let app = App::new(Gate::new());
	let context = Context::new();
	let mut reconciler = Reconciler::new(host);
	let root = reconciler
		.hydrate(&app.render("Hello"), container, &context)
		.unwrap()
		.instance
		.unwrap();

	reconciler
		.receive_component(root, &app.render("Hello"), &context)
		.unwrap();
	let boundary = reconciler.boundaries(root)[0];
	assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Dehydrated));
	assert_eq!(reconciler.host().inner_html(container), markup);

	app.gate.open();
	reconciler.flush().unwrap();

	assert_eq!(app.log.current_node(), Some(server_span));
	assert_eq!(created_nodes(reconciler.host()), 0);
}

#[rstest]
fn test_parent_hydrates_while_nested_boundary_is_blocked() {
	let tree = |app: &App, outer: &RefLog| {
		Descriptor::suspense("outer loading").child(
			Descriptor::host("section")
				.with_ref(outer.target())
				.child(app.boundary("deep", "label")),
		)
	};
	let markup = render_markup(&tree(&App::new(Gate::opened()), &RefLog::new()), &Context::new());
	assert_eq!(
		markup,
		r#"<!--rh-start--><section><!--rh-start--><span class="label">deep</span><!--rh-end--></section><!--rh-end-->"#
	);
	let (host, container) = load_container(&markup);
	let section = host.find_by_tag(container, "section")[0];
	let span = host.find_by_tag(container, "span")[0];
	let app = App::new(Gate::new());
	let outer = RefLog::new();
	let mut reconciler = Reconciler::new(host);

	let root = reconciler
		.hydrate(&tree(&app, &outer), container, &Context::new())
		.unwrap()
		.instance
		.unwrap();

	let boundaries = reconciler.boundaries(root);
	assert_eq!(boundaries.len(), 2);
	assert_eq!(reconciler.boundary_state(boundaries[0]), Some(BoundaryState::Hydrated));
	assert_eq!(reconciler.boundary_state(boundaries[1]), Some(BoundaryState::Dehydrated));
	assert_eq!(outer.events(), vec![RefEvent::Node(section)]);
	assert!(app.log.events().is_empty());

	app.gate.open();
	reconciler.flush().unwrap();

	assert_eq!(reconciler.boundary_state(boundaries[1]), Some(BoundaryState::Hydrated));
	assert_eq!(app.log.events(), vec![RefEvent::Node(span)]);
	assert_eq!(reconciler.host().inner_html(container), markup);
	assert_eq!(created_nodes(reconciler.host()), 0);
}

#[rstest]
fn test_sibling_inserted_before_dehydrated_boundary() {
	let tree = |app: &App, sibling: bool| {
		Descriptor::host("div")
			.child(sibling.then(|| Descriptor::host("b").child("new")))
			.child(app.boundary("Hello", "label"))
	};
	let markup = server_markup(|app| tree(app, false));
	let (host, container) = load_container(&markup);
	let server_span = host.find_by_tag(container, "span")[0];
	let app = App::new(Gate::new());
	let context = Context::new();
	let mut reconciler = Reconciler::new(host);
	let root = reconciler
		.hydrate(&tree(&app, false), container, &context)
		.unwrap()
		.instance
		.unwrap();

	reconciler
		.receive_component(root, &tree(&app, true), &context)
		.unwrap();

	assert_eq!(
		reconciler.host().inner_html(container),
		r#"<div><b>new</b><!--rh-start--><span class="label">Hello</span><!--rh-end--></div>"#
	);
	let boundary = reconciler.boundaries(root)[0];
	assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Dehydrated));

	app.gate.open();
	reconciler.flush().unwrap();

	assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Hydrated));
	assert_eq!(app.log.current_node(), Some(server_span));
	assert_eq!(reconciler.host().find_by_tag(container, "span"), vec![server_span]);
}

#[rstest]
fn test_deleting_dehydrated_boundary_removes_its_region() {
	let tree = |app: &App, show: bool| {
		Descriptor::host("div")
			.child(show.then(|| app.boundary("Hello", "label")))
			.child(Descriptor::host("p").child("after"))
	};
	let markup = server_markup(|app| tree(app, true));
	let (host, container) = load_container(&markup);
	let app = App::new(Gate::new());
	let context = Context::new();
	let mut reconciler = Reconciler::new(host);
	let root = reconciler
		.hydrate(&tree(&app, true), container, &context)
		.unwrap()
		.instance
		.unwrap();
	let before = reconciler.instance_count();

	reconciler
		.receive_component(root, &tree(&app, false), &context)
		.unwrap();

	assert_eq!(reconciler.instance_count(), before - 1);
	assert_eq!(reconciler.host().inner_html(container), "<div><p>after</p></div>");
	assert!(reconciler.boundaries(root).is_empty());

	app.gate.open();
	reconciler.flush().unwrap();

	assert_eq!(reconciler.host().inner_html(container), "<div><p>after</p></div>");
	assert_eq!(created_nodes(reconciler.host()), 0);
	assert!(app.log.events().is_empty());
}

#[rstest]
fn test_mismatch_inside_boundary_is_contained() {
	let markup = server_markup(|app| app.render("Hello"));
	let (host, container) = load_container(&markup);
	let div = host.find_by_tag(container, "div")[0];
	let mut reconciler = Reconciler::new(host);
	let other = FunctionComponent::new("Other", |_, _| {
		Ok(reinhardt_fiber::RenderOutcome::rendered(Descriptor::host("em").child("client")))
	});

	let root = reconciler
		.hydrate(
			&Descriptor::host("div").child(Descriptor::suspense("Loading...").child(Descriptor::new(other))),
			container,
			&Context::new(),
		)
		.unwrap()
		.instance
		.unwrap();

	assert_eq!(reconciler.host().find_by_tag(container, "div"), vec![div]);
	assert_eq!(reconciler.host().inner_html(container), "<div><em>client</em></div>");
	let boundary = reconciler.boundaries(root)[0];
	assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Discarded));
}

#[rstest]
fn test_server_fallback_is_client_rendered() {
	let pending = App::new(Gate::new());
	let markup = render_markup(&pending.render("Hello"), &Context::new());
	assert_eq!(markup, "<div><!--rh-start?-->Loading...<!--rh-end--></div>");
	let (host, container): (MemoryHost, _) = load_container(&markup);
	let app = App::new(Gate::opened());
	let mut reconciler = Reconciler::new(host);

	reconciler
		.hydrate(&app.render("Hello"), container, &Context::new())
		.unwrap();

	assert_eq!(
		reconciler.host().inner_html(container),
		r#"<div><span class="label">Hello</span></div>"#
	);
	assert_eq!(app.log.events().len(), 1);
}

#[rstest]
#[case::equal_context("dark", true)]
#[case::changed_context("light", false)]
fn test_rebuilt_context_is_compared_by_value(#[case] theme: &str, #[case] keeps_markup: bool) {
	let markup = server_markup(|app| app.render("Hello"));
	let (host, container) = load_container(&markup);
	let server_span = host.find_by_tag(container, "span")[0];
	let app = App::new(Gate::new());
	let mut reconciler = Reconciler::new(host);
	let root = reconciler
		.hydrate(&app.render("Hello"), container, &Context::new().with("theme", "dark"))
		.unwrap()
		.instance
		.unwrap();
	let boundary = reconciler.boundaries(root)[0];

	reconciler
		.receive_component(root, &app.render("Hello"), &Context::new().with("theme", theme))
		.unwrap();

	if keeps_markup {
		assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Dehydrated));
		assert_eq!(reconciler.host().inner_html(container), markup);

		app.gate.open();
		reconciler.flush().unwrap();

		assert_eq!(app.log.current_node(), Some(server_span));
		assert_eq!(created_nodes(reconciler.host()), 0);
	} else {
		assert_eq!(reconciler.boundary_state(boundary), Some(BoundaryState::Discarded));
		assert_eq!(reconciler.host().inner_html(container), "<div>Loading...</div>");
	}
}
