//! Route components as seen by the navigation core.
//!
//! The core never renders anything: a [`Component`] only carries its
//! in-component guards. Component instances are registered by the host when
//! a view mounts and are opaque to the router.

use crate::error::RouterError;
use crate::guard::{ComponentGuard, GuardResult, Latch, NavigationGuard, Next};
use crate::route::Route;
use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Spawner used to drive future-based async components.
pub type Spawner = Rc<dyn LocalSpawn>;

/// A routable component and its in-component guards.
#[derive(Clone, Default)]
pub struct Component {
	name: Option<String>,
	before_route_enter: Vec<NavigationGuard>,
	before_route_update: Vec<ComponentGuard>,
	before_route_leave: Vec<ComponentGuard>,
}

impl Component {
	/// Creates an anonymous component.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a named component.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			..Self::default()
		}
	}

	/// Returns the component name.
	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Adds a guard run before the component is entered.
	///
	/// The instance does not exist yet; pass a callback to
	/// [`Next::callback`] to reach it once it is registered.
	pub fn before_route_enter<F>(mut self, guard: F) -> Self
	where
		F: Fn(&Route, &Route, Next) -> GuardResult + 'static,
	{
		self.before_route_enter.push(Rc::new(guard));
		self
	}

	/// Adds a guard run when the route changes but the component is reused.
	pub fn before_route_update<F>(mut self, guard: F) -> Self
	where
		F: Fn(&ComponentInstance, &Route, &Route, Next) -> GuardResult + 'static,
	{
		self.before_route_update.push(Rc::new(guard));
		self
	}

	/// Adds a guard run before the component is left.
	pub fn before_route_leave<F>(mut self, guard: F) -> Self
	where
		F: Fn(&ComponentInstance, &Route, &Route, Next) -> GuardResult + 'static,
	{
		self.before_route_leave.push(Rc::new(guard));
		self
	}

	pub(crate) fn enter_guards(&self) -> &[NavigationGuard] {
		&self.before_route_enter
	}

	pub(crate) fn update_guards(&self) -> &[ComponentGuard] {
		&self.before_route_update
	}

	pub(crate) fn leave_guards(&self) -> &[ComponentGuard] {
		&self.before_route_leave
	}
}

impl fmt::Debug for Component {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Component")
			.field("name", &self.name)
			.field("before_route_enter", &self.before_route_enter.len())
			.field("before_route_update", &self.before_route_update.len())
			.field("before_route_leave", &self.before_route_leave.len())
			.finish()
	}
}

#[derive(Clone)]
enum ComponentFactory {
	Callback(Rc<dyn Fn(ComponentResolver) -> GuardResult>),
	Future(Rc<dyn Fn() -> LocalBoxFuture<'static, Result<Component, RouterError>>>),
}

/// A component loaded on demand when a route using it is activated.
#[derive(Clone)]
pub struct AsyncComponent {
	factory: ComponentFactory,
	resolved: Rc<RefCell<Option<Rc<Component>>>>,
}

impl AsyncComponent {
	/// Creates a factory that settles through the given [`ComponentResolver`],
	/// now or later.
	pub fn with_resolver<F>(factory: F) -> Self
	where
		F: Fn(ComponentResolver) -> GuardResult + 'static,
	{
		Self {
			factory: ComponentFactory::Callback(Rc::new(factory)),
			resolved: Rc::new(RefCell::new(None)),
		}
	}

	/// Creates a factory returning a future; the router spawns it on its
	/// local spawner.
	pub fn from_future<F, Fut>(factory: F) -> Self
	where
		F: Fn() -> Fut + 'static,
		Fut: Future<Output = Result<Component, RouterError>> + 'static,
	{
		Self {
			factory: ComponentFactory::Future(Rc::new(move || Box::pin(factory()))),
			resolved: Rc::new(RefCell::new(None)),
		}
	}

	/// Returns the component this factory already resolved to.
	pub fn resolved(&self) -> Option<Rc<Component>> {
		self.resolved.borrow().clone()
	}

	pub(crate) fn cache(&self, component: Rc<Component>) {
		*self.resolved.borrow_mut() = Some(component);
	}

	/// Starts loading; the outcome is reported through `resolver`.
	pub(crate) fn load(&self, resolver: ComponentResolver, spawner: Option<&Spawner>) {
		match &self.factory {
			ComponentFactory::Callback(factory) => {
				if let Err(err) = factory(resolver.clone()) {
					resolver.reject(err);
				}
			}
			ComponentFactory::Future(factory) => {
				let Some(spawner) = spawner else {
					resolver.reject(RouterError::NoSpawner);
					return;
				};
				let future = factory();
				let settle = resolver.clone();
				let spawned = spawner.spawn_local(async move {
					match future.await {
						Ok(component) => settle.resolve(component),
						Err(err) => settle.reject(err),
					}
				});
				if let Err(err) = spawned {
					resolver.reject(RouterError::Spawn(err.to_string()));
				}
			}
		}
	}
}

impl fmt::Debug for AsyncComponent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match self.factory {
			ComponentFactory::Callback(_) => "callback",
			ComponentFactory::Future(_) => "future",
		};
		f.debug_struct("AsyncComponent")
			.field("factory", &kind)
			.field("resolved", &self.resolved.borrow().is_some())
			.finish()
	}
}

/// Settles an async component factory. Only the first call counts.
#[derive(Clone)]
pub struct ComponentResolver {
	latch: Latch<Result<Rc<Component>, String>>,
}

impl ComponentResolver {
	pub(crate) fn new(settle: impl FnOnce(Result<Rc<Component>, String>) + 'static) -> Self {
		Self {
			latch: Latch::new(settle),
		}
	}

	/// Provides the loaded component.
	pub fn resolve(&self, component: impl Into<Rc<Component>>) {
		self.latch.fire(Ok(component.into()));
	}

	/// Reports that loading failed.
	pub fn reject(&self, reason: impl fmt::Display) {
		self.latch.fire(Err(reason.to_string()));
	}
}

impl fmt::Debug for ComponentResolver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentResolver")
			.field("settled", &self.latch.is_fired())
			.finish()
	}
}

/// A component outlet entry: a ready component or one still to load.
#[derive(Clone)]
pub enum ComponentSlot {
	/// A component ready to render.
	Resolved(Rc<Component>),
	/// A component loaded on first activation.
	Lazy(AsyncComponent),
}

impl ComponentSlot {
	/// Returns the component if it is loaded.
	pub fn resolved(&self) -> Option<&Rc<Component>> {
		match self {
			Self::Resolved(component) => Some(component),
			Self::Lazy(_) => None,
		}
	}

	/// Returns `true` if the slot still needs loading.
	pub fn is_lazy(&self) -> bool {
		matches!(self, Self::Lazy(_))
	}
}

impl From<Component> for ComponentSlot {
	fn from(component: Component) -> Self {
		Self::Resolved(Rc::new(component))
	}
}

impl From<Rc<Component>> for ComponentSlot {
	fn from(component: Rc<Component>) -> Self {
		Self::Resolved(component)
	}
}

impl From<AsyncComponent> for ComponentSlot {
	fn from(factory: AsyncComponent) -> Self {
		Self::Lazy(factory)
	}
}

impl fmt::Debug for ComponentSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Resolved(component) => f.debug_tuple("Resolved").field(component).finish(),
			Self::Lazy(factory) => f.debug_tuple("Lazy").field(factory).finish(),
		}
	}
}

/// A live component instance registered by the host.
pub struct ComponentInstance {
	state: Box<dyn Any>,
	being_destroyed: Cell<bool>,
}

impl ComponentInstance {
	/// Wraps host state as a component instance.
	pub fn new<T: Any>(state: T) -> Rc<Self> {
		Rc::new(Self {
			state: Box::new(state),
			being_destroyed: Cell::new(false),
		})
	}

	/// Returns the host state if it has type `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.state.downcast_ref()
	}

	/// Marks the instance as being torn down; post-enter callbacks skip it.
	pub fn mark_being_destroyed(&self) {
		self.being_destroyed.set(true);
	}

	/// Returns `true` once teardown started.
	pub fn is_being_destroyed(&self) -> bool {
		self.being_destroyed.get()
	}
}

impl fmt::Debug for ComponentInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentInstance")
			.field("being_destroyed", &self.being_destroyed.get())
			.finish_non_exhaustive()
	}
}
