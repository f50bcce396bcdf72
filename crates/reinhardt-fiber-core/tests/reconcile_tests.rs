//! Mount, update and unmount behaviour of the reconciler.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reinhardt_fiber_core::{
	ClassComponent, Component, Context, Descriptor, FunctionComponent, LazyRegistry, MemoryHost,
	Mutation, NodeHandle, Props, ReconcileError, Reconciler, ReconcilerConfig, RenderError, RenderOutcome,
	RenderResult, RenderScope, ResumeToken, State, UpdateResult, Updater,
};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

struct Harness {
	reconciler: Reconciler<MemoryHost>,
	container: NodeHandle,
	context: Context,
}

impl Harness {
	fn html(&self) -> String {
		self.reconciler.host().inner_html(self.container)
	}

	fn mount(&mut self, descriptor: &Descriptor) -> reinhardt_fiber_core::InstanceId {
		self.reconciler
			.mount(descriptor, self.container, &self.context)
			.unwrap()
			.instance
			.unwrap()
	}
}

#[fixture]
fn harness() -> Harness {
	let mut host = MemoryHost::new();
	let container = host.create_container();
	Harness {
		reconciler: Reconciler::new(host),
		container,
		context: Context::new(),
	}
}

fn state(value: Value) -> State {
	value.as_object().cloned().unwrap_or_default()
}

fn keyed_list(keys: &[&str]) -> Descriptor {
	Descriptor::host("ul").children(
		keys.iter()
			.map(|key| Descriptor::host("li").key(*key).child(*key)),
	)
}

#[rstest]
fn test_mount_builds_host_tree(mut harness: Harness) {
	let tree = Descriptor::host("section")
		.attr("id", "main")
		.child(Descriptor::host("h1").child("Title"))
		.child(vec!["a", "b"])
		.child(Descriptor::host("input").attr("disabled", true));

	harness.mount(&tree);

	assert_eq!(
		harness.html(),
		r#"<section id="main"><h1>Title</h1>ab<input disabled /></section>"#
	);
}

#[rstest]
fn test_keyed_reorder_moves_existing_nodes(mut harness: Harness) {
	let root = harness.mount(&keyed_list(&["a", "b", "c"]));
	let before = harness
		.reconciler
		.host()
		.find_by_tag(harness.container, "li");
	harness.reconciler.host_mut().clear_mutations();

	let result = harness
		.reconciler
		.receive_component(root, &keyed_list(&["c", "a", "b"]), &Context::default())
		.unwrap();

	assert!(matches!(result, UpdateResult::Updated));
	let after = harness
		.reconciler
		.host()
		.find_by_tag(harness.container, "li");
	assert_eq!(after, vec![before[2], before[0], before[1]]);
	assert_eq!(harness.html(), "<ul><li>c</li><li>a</li><li>b</li></ul>");
	assert!(
		!harness
			.reconciler
			.host()
			.mutations()
			.iter()
			.any(|m| matches!(m, Mutation::CreateElement { .. }))
	);
}

#[rstest]
fn test_unkeyed_children_match_by_index(mut harness: Harness) {
	let list = |items: &[&str]| {
		Descriptor::host("ul").children(items.iter().map(|item| Descriptor::host("li").child(*item)))
	};
	let root = harness.mount(&list(&["a", "b"]));
	let before = harness
		.reconciler
		.host()
		.find_by_tag(harness.container, "li");
	harness.reconciler.host_mut().clear_mutations();

	harness
		.reconciler
		.receive_component(root, &list(&["z", "a", "b"]), &Context::default())
		.unwrap();

	let after = harness
		.reconciler
		.host()
		.find_by_tag(harness.container, "li");
	assert_eq!(&after[..2], &before[..]);
	assert_eq!(harness.html(), "<ul><li>z</li><li>a</li><li>b</li></ul>");
	let created = harness
		.reconciler
		.host()
		.mutations()
		.iter()
		.filter(|m| matches!(m, Mutation::CreateElement { .. }))
		.count();
	assert_eq!(created, 1);
}

#[rstest]
fn test_empty_children_keep_positions(mut harness: Harness) {
	let view = |show: bool| {
		Descriptor::host("div")
			.child(show.then(|| Descriptor::host("b").child("flag")))
			.child(Descriptor::host("i").child("stable"))
	};
	let root = harness.mount(&view(false));
	let stable = harness.reconciler.host().find_by_tag(harness.container, "i");

	harness
		.reconciler
		.receive_component(root, &view(true), &Context::default())
		.unwrap();

	assert_eq!(
		harness.reconciler.host().find_by_tag(harness.container, "i"),
		stable
	);
	assert_eq!(harness.html(), "<div><b>flag</b><i>stable</i></div>");
}

#[rstest]
fn test_identical_descriptor_is_skipped(mut harness: Harness) {
	let tree = Descriptor::host("p").child("same");
	let root = harness.mount(&tree);
	harness.reconciler.host_mut().clear_mutations();

	let result = harness
		.reconciler
		.receive_component(root, &tree, &harness.context)
		.unwrap();

	assert!(matches!(result, UpdateResult::Skipped));
	assert!(harness.reconciler.host().mutations().is_empty());
}

#[rstest]
fn test_root_type_change_is_rejected(mut harness: Harness) {
	let root = harness.mount(&Descriptor::host("p"));
	let error = harness
		.reconciler
		.receive_component(root, &Descriptor::host("div"), &Context::default())
		.unwrap_err();
	assert!(matches!(error, ReconcileError::IncompatibleDescriptor { .. }));
}

#[rstest]
fn test_child_type_change_replaces_subtree(mut harness: Harness) {
	let root = harness.mount(&Descriptor::host("div").child(Descriptor::host("p").child("x")));
	harness
		.reconciler
		.receive_component(
			root,
			&Descriptor::host("div").child(Descriptor::host("span").child("x")),
			&Context::default(),
		)
		.unwrap();
	assert_eq!(harness.html(), "<div><span>x</span></div>");
}

struct Counter {
	log: Rc<RefCell<Vec<String>>>,
	renders: Rc<Cell<usize>>,
	skip_odd: bool,
}

impl Component for Counter {
	fn render(&self, scope: &RenderScope<'_>) -> RenderResult {
		self.renders.set(self.renders.get() + 1);
		let count = scope.state().get("count").cloned().unwrap_or(json!(0));
		Ok(RenderOutcome::rendered(
			Descriptor::host("span").child(count.to_string()),
		))
	}

	fn initial_state(&self, props: &Props) -> State {
		state(json!({ "count": props.get("start").cloned().unwrap_or(json!(0)) }))
	}

	fn did_mount(&mut self) {
		self.log.borrow_mut().push("did_mount".into());
	}

	fn should_skip_update(&self, next: &RenderScope<'_>) -> bool {
		self.skip_odd
			&& next
				.state()
				.get("count")
				.and_then(Value::as_i64)
				.is_some_and(|count| count % 2 == 1)
	}

	fn did_update(&mut self, _prev_props: &Props, prev_state: &State) {
		self.log
			.borrow_mut()
			.push(format!("did_update from {}", prev_state["count"]));
	}

	fn will_unmount(&mut self) {
		self.log.borrow_mut().push("will_unmount".into());
	}
}

struct CounterFixture {
	class: ClassComponent,
	updater: Rc<RefCell<Option<Updater>>>,
	log: Rc<RefCell<Vec<String>>>,
	renders: Rc<Cell<usize>>,
}

fn counter(skip_odd: bool) -> CounterFixture {
	let updater = Rc::new(RefCell::new(None));
	let log = Rc::new(RefCell::new(Vec::new()));
	let renders = Rc::new(Cell::new(0));
	let (slot, class_log, class_renders) = (updater.clone(), log.clone(), renders.clone());
	let class = ClassComponent::new("Counter", move |_: &Props, _: &Context, updater: Updater| {
		*slot.borrow_mut() = Some(updater);
		Counter {
			log: class_log.clone(),
			renders: class_renders.clone(),
			skip_odd,
		}
	});
	CounterFixture {
		class,
		updater,
		log,
		renders,
	}
}

impl CounterFixture {
	fn updater(&self) -> Updater {
		self.updater.borrow().clone().unwrap()
	}
}

#[rstest]
fn test_set_state_is_coalesced_into_one_render(mut harness: Harness) {
	let fixture = counter(false);
	let root = harness.mount(&Descriptor::new(fixture.class.clone()).prop("start", 1));
	assert_eq!(harness.html(), "<span>1</span>");
	assert_eq!(fixture.renders.get(), 1);

	let updater = fixture.updater();
	updater.set_state(state(json!({ "count": 2 })));
	updater.update_state(|current, _| {
		let count = current["count"].as_i64().unwrap_or_default();
		state(json!({ "count": count + 3 }))
	});
	assert_eq!(harness.html(), "<span>1</span>");

	harness.reconciler.flush().unwrap();

	assert_eq!(fixture.renders.get(), 2);
	assert_eq!(harness.html(), "<span>5</span>");
	assert_eq!(
		harness.reconciler.component_state(root),
		Some(state(json!({ "count": 5 })))
	);
	assert_eq!(
		*fixture.log.borrow(),
		vec!["did_mount".to_string(), "did_update from 1".to_string()]
	);
}

#[rstest]
fn test_should_skip_update_keeps_output_but_stores_state(mut harness: Harness) {
	let fixture = counter(true);
	let root = harness.mount(&Descriptor::new(fixture.class.clone()));

	fixture.updater().set_state(state(json!({ "count": 1 })));
	harness.reconciler.flush().unwrap();

	assert_eq!(fixture.renders.get(), 1);
	assert_eq!(harness.html(), "<span>0</span>");
	assert_eq!(
		harness.reconciler.component_state(root),
		Some(state(json!({ "count": 1 })))
	);

	fixture.updater().force_update();
	harness.reconciler.flush().unwrap();
	assert_eq!(harness.html(), "<span>1</span>");
}

#[rstest]
fn test_state_callback_runs_after_commit(mut harness: Harness) {
	let fixture = counter(false);
	harness.mount(&Descriptor::new(fixture.class.clone()));
	let seen = Rc::new(Cell::new(false));
	let flag = seen.clone();

	fixture
		.updater()
		.set_state_then(state(json!({ "count": 7 })), move || flag.set(true));
	assert!(!seen.get());
	harness.reconciler.flush().unwrap();

	assert!(seen.get());
	assert_eq!(harness.html(), "<span>7</span>");
}

fn waiting_on(token: &ResumeToken) -> FunctionComponent {
	let token = token.clone();
	FunctionComponent::new("Pending", move |_, _| {
		if token.is_resolved() {
			Ok(RenderOutcome::rendered(Descriptor::host("i").child("ready")))
		} else {
			Ok(RenderOutcome::suspended(&token))
		}
	})
}

#[rstest]
fn test_suspended_update_leaves_committed_tree_in_place(mut harness: Harness) {
	let fixture = counter(false);
	let token = ResumeToken::new();
	let pending = waiting_on(&token);
	let root = harness.mount(
		&Descriptor::host("div")
			.child(Descriptor::new(fixture.class.clone()))
			.child(Descriptor::host("b").child("old")),
	);
	let instances = harness.reconciler.instance_count();
	harness.reconciler.host_mut().clear_mutations();
	fixture.updater().set_state(state(json!({ "count": 4 })));
	let next = Descriptor::host("div")
		.attr("title", "new")
		.child(Descriptor::new(fixture.class.clone()))
		.child(Descriptor::new(pending));

	let result = harness.reconciler.receive_component(root, &next, &harness.context);

	assert!(matches!(result, Ok(UpdateResult::Threw(_))));
	assert_eq!(harness.html(), "<div><span>0</span><b>old</b></div>");
	assert_eq!(harness.reconciler.instance_count(), instances);
	assert!(
		harness
			.reconciler
			.host()
			.mutations()
			.iter()
			.all(|mutation| matches!(mutation, Mutation::CreateElement { .. } | Mutation::CreateText { .. }))
	);
	assert_eq!(*fixture.log.borrow(), vec!["did_mount".to_string()]);
	assert!(fixture.updater().is_mounted());

	// The state update the abandoned pass applied is still waiting.
	assert!(harness.reconciler.has_pending_work());
	harness.reconciler.flush().unwrap();
	assert_eq!(harness.html(), "<div><span>4</span><b>old</b></div>");

	token.resolve();
	let result = harness.reconciler.receive_component(root, &next, &harness.context);

	assert!(matches!(result, Ok(UpdateResult::Updated)));
	assert_eq!(harness.html(), r#"<div title="new"><span>4</span><i>ready</i></div>"#);
}

#[rstest]
fn test_update_after_unmount_is_dropped(mut harness: Harness) {
	let fixture = counter(false);
	let root = harness.mount(&Descriptor::new(fixture.class.clone()));
	let updater = fixture.updater();

	harness.reconciler.unmount_component(root).unwrap();
	updater.set_state(state(json!({ "count": 9 })));

	assert!(!updater.is_mounted());
	assert!(!harness.reconciler.has_pending_work());
	harness.reconciler.flush().unwrap();
	assert_eq!(fixture.renders.get(), 1);
	assert_eq!(
		*fixture.log.borrow(),
		vec!["did_mount".to_string(), "will_unmount".to_string()]
	);
}

#[rstest]
fn test_unmount_removes_host_nodes(mut harness: Harness) {
	let root = harness.mount(&Descriptor::host("div").child(Descriptor::host("p").child("x")));
	assert!(harness.reconciler.instance_count() > 0);

	harness.reconciler.unmount_component(root).unwrap();

	assert_eq!(harness.html(), "");
	assert_eq!(harness.reconciler.instance_count(), 0);
	assert!(!harness.reconciler.is_mounted(root));
}

#[rstest]
#[cfg_attr(debug_assertions, should_panic(expected = "is not mounted"))]
fn test_double_unmount_is_a_caller_error(mut harness: Harness) {
	let root = harness.mount(&Descriptor::host("p"));
	harness.reconciler.unmount_component(root).unwrap();

	let result = harness.reconciler.unmount_component(root);

	assert_eq!(result, Err(ReconcileError::NotMounted(root)));
}

#[rstest]
fn test_lifecycle_order_parent_after_children(mut harness: Harness) {
	let log = Rc::new(RefCell::new(Vec::new()));

	struct Logged {
		name: &'static str,
		log: Rc<RefCell<Vec<String>>>,
	}

	impl Component for Logged {
		fn render(&self, scope: &RenderScope<'_>) -> RenderResult {
			Ok(RenderOutcome::rendered(scope.props().children().to_vec()))
		}

		fn will_mount(&mut self, _scope: &RenderScope<'_>) {
			self.log.borrow_mut().push(format!("{} will_mount", self.name));
		}

		fn did_mount(&mut self) {
			self.log.borrow_mut().push(format!("{} did_mount", self.name));
		}

		fn will_unmount(&mut self) {
			self.log.borrow_mut().push(format!("{} will_unmount", self.name));
		}
	}

	let make = |name: &'static str| {
		let log = log.clone();
		ClassComponent::new(name, move |_: &Props, _: &Context, _: Updater| Logged {
			name,
			log: log.clone(),
		})
	};
	let tree = Descriptor::new(make("outer")).child(Descriptor::new(make("inner")));

	let root = harness.mount(&tree);
	harness.reconciler.unmount_component(root).unwrap();

	assert_eq!(
		*log.borrow(),
		vec![
			"outer will_mount",
			"inner will_mount",
			"inner did_mount",
			"outer did_mount",
			"outer will_unmount",
			"inner will_unmount",
		]
	);
}

struct Catcher {
	caught: Option<RenderError>,
	reports: Rc<RefCell<Vec<RenderError>>>,
}

impl Component for Catcher {
	fn render(&self, scope: &RenderScope<'_>) -> RenderResult {
		match &self.caught {
			Some(_) => Ok(RenderOutcome::rendered(Descriptor::host("p").child("caught"))),
			None => Ok(RenderOutcome::rendered(scope.props().children().to_vec())),
		}
	}

	fn is_error_boundary(&self) -> bool {
		true
	}

	fn did_catch(&mut self, error: &RenderError) {
		self.reports.borrow_mut().push(error.clone());
		self.caught = Some(error.clone());
	}
}

fn catcher(reports: Rc<RefCell<Vec<RenderError>>>) -> ClassComponent {
	ClassComponent::new("Catcher", move |_: &Props, _: &Context, _: Updater| Catcher {
		caught: None,
		reports: reports.clone(),
	})
}

fn thrower() -> FunctionComponent {
	FunctionComponent::new("Thrower", |props, _| {
		if props.get("fail") == Some(&json!(true)) {
			Err(RenderError::new("boom"))
		} else {
			Ok(RenderOutcome::rendered("fine"))
		}
	})
}

#[rstest]
fn test_error_boundary_catches_descendant_failure(mut harness: Harness) {
	let reports = Rc::new(RefCell::new(Vec::new()));
	let tree = Descriptor::new(catcher(reports.clone())).child(
		Descriptor::host("div").child(Descriptor::new(thrower()).prop("fail", true)),
	);

	harness.mount(&tree);

	assert_eq!(harness.html(), "<p>caught</p>");
	let reports = reports.borrow();
	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].component(), Some("Thrower"));
	assert_eq!(reports[0].message(), "boom");
}

#[rstest]
fn test_error_boundary_catches_failure_during_update(mut harness: Harness) {
	let reports = Rc::new(RefCell::new(Vec::new()));
	let class = catcher(reports.clone());
	let thrower = thrower();
	let tree = |fail: bool| {
		Descriptor::host("main").child(
			Descriptor::new(class.clone()).child(Descriptor::new(thrower.clone()).prop("fail", fail)),
		)
	};
	let root = harness.mount(&tree(false));
	assert_eq!(harness.html(), "<main>fine</main>");

	let result = harness
		.reconciler
		.receive_component(root, &tree(true), &Context::default());

	assert!(matches!(result, Ok(UpdateResult::Updated)));
	assert_eq!(harness.html(), "<main><p>caught</p></main>");
	assert_eq!(reports.borrow().len(), 1);
}

#[rstest]
fn test_uncaught_render_error_unmounts_tree(mut harness: Harness) {
	let tree = Descriptor::host("div").child(Descriptor::new(thrower()).prop("fail", true));

	let error = harness
		.reconciler
		.mount(&tree, harness.container, &Context::default())
		.unwrap_err();

	match error {
		ReconcileError::Render(error) => assert_eq!(error.component(), Some("Thrower")),
		other => panic!("unexpected error {other:?}"),
	}
	assert_eq!(harness.html(), "");
	assert_eq!(harness.reconciler.instance_count(), 0);
}

#[rstest]
fn test_lazy_types_resolve_through_registry() {
	let greeting = FunctionComponent::new("Greeting", |props, _| {
		let name = props.get_str("name").unwrap_or("nobody").to_string();
		Ok(RenderOutcome::rendered(format!("Hello, {name}")))
	});
	let mut host = MemoryHost::new();
	let container = host.create_container();
	let mut reconciler =
		Reconciler::new(host).with_lazy_registry(LazyRegistry::new().with("Greeting", greeting));

	reconciler
		.mount(
			&Descriptor::host("p").child(Descriptor::lazy("Greeting").prop("name", "Ada")),
			container,
			&Context::default(),
		)
		.unwrap();

	assert_eq!(reconciler.host().inner_html(container), "<p>Hello, Ada</p>");
}

#[rstest]
fn test_unknown_lazy_type_fails(mut harness: Harness) {
	let error = harness
		.reconciler
		.mount(&Descriptor::lazy("Nope"), harness.container, &Context::default())
		.unwrap_err();
	assert_eq!(error, ReconcileError::UnknownLazyComponent("Nope".into()));
}

#[rstest]
fn test_runaway_updates_hit_depth_limit() {
	struct Restless {
		updater: Updater,
	}

	impl Component for Restless {
		fn render(&self, _scope: &RenderScope<'_>) -> RenderResult {
			Ok(RenderOutcome::rendered(()))
		}

		fn did_update(&mut self, _prev_props: &Props, _prev_state: &State) {
			self.updater.force_update();
		}
	}

	let holder: Rc<RefCell<Option<Updater>>> = Rc::new(RefCell::new(None));
	let slot = holder.clone();
	let class = ClassComponent::new("Restless", move |_: &Props, _: &Context, updater: Updater| {
		*slot.borrow_mut() = Some(updater.clone());
		Restless { updater }
	});
	let mut host = MemoryHost::new();
	let container = host.create_container();
	let mut reconciler = Reconciler::new(host).with_config(ReconcilerConfig::new().max_update_depth(5));
	reconciler
		.mount(&Descriptor::new(class), container, &Context::default())
		.unwrap();

	holder.borrow().clone().unwrap().force_update();
	let error = reconciler.flush().unwrap_err();

	assert_eq!(error, ReconcileError::UpdateDepthExceeded(5));
}
