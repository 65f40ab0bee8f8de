//! Compiled route records.

use crate::component::{ComponentInstance, ComponentSlot};
use crate::config::{Redirect, RouteProps};
use crate::guard::NavigationGuard;
use crate::pattern::PathPattern;
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Outlet components of a record; alias records share the canonical map.
pub(crate) type SharedComponents = Rc<RefCell<IndexMap<String, ComponentSlot>>>;

/// One node of the compiled route tree.
///
/// Records are created by the route map and live as long as the router.
/// Components resolve in place when an async factory settles, and live
/// instances are registered by the host.
pub struct RouteRecord {
	pub(crate) path: String,
	pub(crate) pattern: Rc<PathPattern>,
	pub(crate) components: SharedComponents,
	pub(crate) instances: RefCell<IndexMap<String, Rc<ComponentInstance>>>,
	pub(crate) name: Option<String>,
	pub(crate) parent: Option<Weak<RouteRecord>>,
	pub(crate) match_as: Option<String>,
	pub(crate) redirect: Option<Redirect>,
	pub(crate) before_enter: Option<NavigationGuard>,
	pub(crate) meta: Value,
	pub(crate) props: IndexMap<String, RouteProps>,
}

impl RouteRecord {
	/// Normalized absolute path pattern.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Compiled pattern.
	pub fn pattern(&self) -> &PathPattern {
		&self.pattern
	}

	/// Route name.
	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Parent record, if nested.
	pub fn parent(&self) -> Option<Rc<RouteRecord>> {
		self.parent.as_ref().and_then(Weak::upgrade)
	}

	/// Canonical path for alias records.
	pub fn match_as(&self) -> Option<&str> {
		self.match_as.as_deref()
	}

	/// Redirect target.
	pub fn redirect(&self) -> Option<&Redirect> {
		self.redirect.as_ref()
	}

	/// Metadata.
	pub fn meta(&self) -> &Value {
		&self.meta
	}

	/// Props per outlet.
	pub fn props(&self) -> &IndexMap<String, RouteProps> {
		&self.props
	}

	/// Snapshot of the outlet components.
	pub fn components(&self) -> IndexMap<String, ComponentSlot> {
		self.components.borrow().clone()
	}

	/// Component of one outlet.
	pub fn component(&self, outlet: &str) -> Option<ComponentSlot> {
		self.components.borrow().get(outlet).cloned()
	}

	/// Live instance of one outlet.
	pub fn instance(&self, outlet: &str) -> Option<Rc<ComponentInstance>> {
		self.instances.borrow().get(outlet).cloned()
	}

	/// Returns the records from the root down to `self`.
	pub fn chain(self: &Rc<Self>) -> Vec<Rc<RouteRecord>> {
		let mut chain = vec![Rc::clone(self)];
		let mut current = self.parent();
		while let Some(record) = current {
			current = record.parent();
			chain.push(record);
		}
		chain.reverse();
		chain
	}

	pub(crate) fn set_component(&self, outlet: &str, component: ComponentSlot) {
		self.components
			.borrow_mut()
			.insert(outlet.to_string(), component);
	}

	pub(crate) fn set_instance(&self, outlet: &str, instance: Rc<ComponentInstance>) {
		self.instances
			.borrow_mut()
			.insert(outlet.to_string(), instance);
	}

	/// Removes the instance of `outlet` if it is `instance`.
	pub(crate) fn remove_instance(&self, outlet: &str, instance: &Rc<ComponentInstance>) -> bool {
		let mut instances = self.instances.borrow_mut();
		if instances
			.get(outlet)
			.is_some_and(|current| Rc::ptr_eq(current, instance))
		{
			instances.shift_remove(outlet);
			true
		} else {
			false
		}
	}
}

impl fmt::Debug for RouteRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteRecord")
			.field("path", &self.path)
			.field("name", &self.name)
			.field("parent", &self.parent().map(|parent| parent.path.clone()))
			.field("match_as", &self.match_as)
			.field("redirect", &self.redirect)
			.field("components", &self.components.borrow().keys().collect::<Vec<_>>())
			.field("instances", &self.instances.borrow().len())
			.field("meta", &self.meta)
			.finish()
	}
}
