//! Building blocks of the guard pipeline.
//!
//! A navigation runs two queues of steps. The first holds leave guards,
//! global `before_each` hooks, update guards, per-route `before_enter`
//! guards and the async component step. The second is built once lazy
//! components have loaded and holds enter guards and `before_resolve` hooks.

use crate::component::{Component, ComponentResolver, ComponentSlot, Spawner};
use crate::error::RouterError;
use crate::guard::{
	ComponentGuard, GuardResult, NavigationGuard, Next, NextAction, PostEnterCallback,
};
use crate::logging::warn_dev;
use crate::record::RouteRecord;
use crate::route::Route;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// One step of a guard queue.
pub(crate) type Step = NavigationGuard;

/// A post-enter callback waiting for its component instance.
pub(crate) struct PostEnterTask {
	pub(crate) record: Rc<RouteRecord>,
	pub(crate) outlet: String,
	pub(crate) callback: PostEnterCallback,
	/// The route the callback was collected for.
	pub(crate) route: Rc<Route>,
}

impl fmt::Debug for PostEnterTask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PostEnterTask")
			.field("record", &self.record.path())
			.field("outlet", &self.outlet)
			.field("route", &self.route.full_path)
			.finish()
	}
}

/// Records kept, left and entered when moving from `current` to `next`.
#[derive(Debug, Default)]
pub(crate) struct QueueDiff {
	pub(crate) updated: Vec<Rc<RouteRecord>>,
	pub(crate) activated: Vec<Rc<RouteRecord>>,
	pub(crate) deactivated: Vec<Rc<RouteRecord>>,
}

/// Splits two matched chains at the first record they do not share.
pub(crate) fn resolve_queue(current: &[Rc<RouteRecord>], next: &[Rc<RouteRecord>]) -> QueueDiff {
	let shared = current
		.iter()
		.zip(next)
		.take_while(|(a, b)| Rc::ptr_eq(a, b))
		.count();
	QueueDiff {
		updated: next[..shared].to_vec(),
		activated: next[shared..].to_vec(),
		deactivated: current[shared..].to_vec(),
	}
}

/// Leave guards of `records`, each bound to its live instance.
///
/// Components run leaf first and in reverse outlet order; the guards of a
/// single component keep their declaration order.
pub(crate) fn leave_guards(records: &[Rc<RouteRecord>]) -> Vec<Step> {
	let groups: Vec<Vec<Step>> = records
		.iter()
		.flat_map(|record| bound_guards(record, |component| component.leave_guards().to_vec()))
		.collect();
	groups.into_iter().rev().flatten().collect()
}

/// Update guards of `records`, root first, each bound to its live instance.
pub(crate) fn update_guards(records: &[Rc<RouteRecord>]) -> Vec<Step> {
	records
		.iter()
		.flat_map(|record| bound_guards(record, |component| component.update_guards().to_vec()))
		.flatten()
		.collect()
}

/// Guards picked by `select`, grouped per outlet component.
fn bound_guards(
	record: &Rc<RouteRecord>,
	select: impl Fn(&Component) -> Vec<ComponentGuard>,
) -> Vec<Vec<Step>> {
	let mut groups = Vec::new();
	for (outlet, slot) in record.components() {
		let Some(component) = slot.resolved() else { continue };
		let Some(instance) = record.instance(&outlet) else { continue };
		let steps: Vec<Step> = select(&**component)
			.into_iter()
			.map(|guard| {
				let instance = Rc::clone(&instance);
				Rc::new(move |to: &Route, from: &Route, next: Next| guard(&instance, to, from, next))
					as Step
			})
			.collect();
		groups.push(steps);
	}
	groups
}

/// Enter guards of `records`, root first.
///
/// A guard that calls `next` with a callback queues a [`PostEnterTask`] into
/// `tasks` and proceeds.
pub(crate) fn enter_guards(
	records: &[Rc<RouteRecord>],
	tasks: &Rc<RefCell<Vec<PostEnterTask>>>,
	route: &Rc<Route>,
) -> Vec<Step> {
	let mut steps: Vec<Step> = Vec::new();
	for record in records {
		for (outlet, slot) in record.components() {
			let Some(component) = slot.resolved() else { continue };
			for guard in component.enter_guards() {
				let guard = Rc::clone(guard);
				let record = Rc::clone(record);
				let outlet = outlet.clone();
				let tasks = Rc::clone(tasks);
				let route = Rc::clone(route);
				steps.push(Rc::new(move |to: &Route, from: &Route, next: Next| {
					let record = Rc::clone(&record);
					let outlet = outlet.clone();
					let tasks = Rc::clone(&tasks);
					let route = Rc::clone(&route);
					guard(
						to,
						from,
						Next::new(move |action| match action {
							NextAction::Callback(callback) => {
								tasks.borrow_mut().push(PostEnterTask {
									record,
									outlet,
									callback,
									route,
								});
								next.proceed();
							}
							action => next.call(action),
						}),
					)
				}));
			}
		}
	}
	steps
}

/// The step that loads every lazy component of `records` in parallel.
///
/// It proceeds once all factories resolved, or errors on the first
/// rejection.
pub(crate) fn async_component_step(records: Vec<Rc<RouteRecord>>, spawner: Option<Spawner>) -> Step {
	Rc::new(move |_to: &Route, _from: &Route, next: Next| -> GuardResult {
		let mut lazy = Vec::new();
		for record in &records {
			for (outlet, slot) in record.components() {
				let ComponentSlot::Lazy(factory) = slot else { continue };
				match factory.resolved() {
					Some(component) => record.set_component(&outlet, ComponentSlot::Resolved(component)),
					None => lazy.push((Rc::clone(record), outlet, factory)),
				}
			}
		}

		if lazy.is_empty() {
			next.proceed();
			return Ok(());
		}

		let remaining = Rc::new(Cell::new(lazy.len()));
		let failed = Rc::new(Cell::new(false));
		for (record, outlet, factory) in lazy {
			let next = next.clone();
			let remaining = Rc::clone(&remaining);
			let failed = Rc::clone(&failed);
			let cache = factory.clone();
			let resolver = ComponentResolver::new(move |outcome| match outcome {
				Ok(component) => {
					cache.cache(Rc::clone(&component));
					record.set_component(&outlet, ComponentSlot::Resolved(component));
					remaining.set(remaining.get() - 1);
					if remaining.get() == 0 && !failed.get() {
						next.proceed();
					}
				}
				Err(reason) => {
					warn_dev!("Failed to resolve async component {}: {}", outlet, reason);
					if !failed.replace(true) {
						next.error(RouterError::AsyncComponent { outlet, reason });
					}
				}
			});
			factory.load(resolver, spawner.as_ref());
		}
		Ok(())
	})
}

/// Runs `queue` from `index`, handing each step to `iterator` together with
/// the continuation that advances to the following step.
pub(crate) fn run_queue(
	queue: Rc<[Step]>,
	index: usize,
	iterator: Rc<dyn Fn(&Step, Box<dyn FnOnce()>)>,
	done: Box<dyn FnOnce()>,
) {
	let Some(step) = queue.get(index).cloned() else {
		done();
		return;
	};
	let advance = {
		let iterator = Rc::clone(&iterator);
		Box::new(move || run_queue(queue, index + 1, iterator, done))
	};
	iterator(&step, advance);
}
