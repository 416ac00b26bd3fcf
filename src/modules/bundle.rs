//! # Bundle: ordered child storage for composites.
//!
//! A [`Bundle`] owns an ordered sequence of child modules and implements
//! the storage and context-propagation half of the composite contract;
//! execution order semantics live in the owning composite
//! ([`Process`](crate::Process), [`Chunk`](crate::Chunk)).
//!
//! ## Rules
//! - Insertion order is significant; it defines execution order for
//!   sequential composites.
//! - Deploying a child assigns it the owner's current context; the deploy
//!   is refused while the owner is `Running`/`Waiting`, or when the child
//!   refuses the context.
//! - Context propagation is probe-then-commit: if any child would refuse,
//!   nothing is changed.

use std::sync::{PoisonError, RwLock};

use crate::context::Context;
use crate::error::ModuleError;
use crate::modules::{ModuleMeta, ModuleRef};
use crate::state::Lifecycle;

/// Ordered collection of child modules sharing one context.
#[derive(Default)]
pub struct Bundle {
    children: RwLock<Vec<ModuleRef>>,
}

impl Bundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bundle over existing children (used by deep copies).
    pub(crate) fn with(children: Vec<ModuleRef>) -> Self {
        Self {
            children: RwLock::new(children),
        }
    }

    /// Appends `module`, gated by the owner's lifecycle: refused while the
    /// owner is `Running`/`Waiting` or when the child refuses the owner's
    /// context.
    pub fn deploy(&self, owner: &Lifecycle, module: ModuleRef) -> bool {
        self.deploy_at(owner, usize::MAX, module)
    }

    /// Inserts `module` at `index` (clamped to the current length), with
    /// the same gating as [`deploy`](Bundle::deploy).
    pub fn deploy_at(&self, owner: &Lifecycle, index: usize, module: ModuleRef) -> bool {
        if owner.state().is_active() {
            return false;
        }
        if !module.set_context(owner.context()) {
            return false;
        }
        let mut children = self.write();
        let index = index.min(children.len());
        children.insert(index, module);
        true
    }

    /// Removes the first child whose name matches; returns it if found.
    pub fn undeploy(&self, owner: &Lifecycle, name: &str) -> Option<ModuleRef> {
        if owner.state().is_active() {
            return None;
        }
        let mut children = self.write();
        let pos = children.iter().position(|c| c.meta().name() == name)?;
        Some(children.remove(pos))
    }

    /// True if a child with this identity is deployed.
    pub fn contains(&self, meta: &ModuleMeta) -> bool {
        self.read().iter().any(|c| c.meta() == meta)
    }

    /// Snapshot of the children, in execution order.
    pub fn modules(&self) -> Vec<ModuleRef> {
        self.read().clone()
    }

    /// Number of deployed children.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if no children are deployed.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// True if every child would accept a context swap right now.
    pub fn can_set_context(&self) -> bool {
        self.read().iter().all(|c| c.can_set_context())
    }

    /// Propagates `ctx` to every child. Callers probe with
    /// [`can_set_context`](Bundle::can_set_context) first; a child refusal
    /// mid-commit aborts and reports `false`.
    pub fn set_context(&self, ctx: &Context) -> bool {
        self.read().iter().all(|c| c.set_context(ctx.clone()))
    }

    /// Resets every child; true only if all of them reset.
    pub fn reset_all(&self) -> bool {
        let children = self.modules();
        let mut all = true;
        for child in children {
            all &= child.reset();
        }
        all
    }

    /// Deep-copies every child, preserving order.
    pub fn fork_all(&self) -> Result<Vec<ModuleRef>, ModuleError> {
        self.modules().iter().map(|c| c.fork()).collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ModuleRef>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ModuleRef>> {
        self.children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::modules::{Module, Step};
    use crate::state::ProcessState;

    fn leaf(name: &str) -> ModuleRef {
        Arc::new(Step::from_fn(
            ModuleMeta::new(name.to_string(), "1.0.0"),
            |_ctx, _t| async { Ok(true) },
        ))
    }

    fn owner() -> Lifecycle {
        Lifecycle::new(ModuleMeta::new("owner", "1.0.0"))
    }

    #[test]
    fn deploy_keeps_insertion_order() {
        let cell = owner();
        let bundle = Bundle::new();
        assert!(bundle.deploy(&cell, leaf("a")));
        assert!(bundle.deploy(&cell, leaf("c")));
        assert!(bundle.deploy_at(&cell, 1, leaf("b")));

        let names: Vec<String> = bundle
            .modules()
            .iter()
            .map(|m| m.meta().name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn deploy_assigns_the_owner_context() {
        let cell = owner();
        cell.context().set("site", String::from("eu-1"));
        let bundle = Bundle::new();
        let child = leaf("a");
        assert!(bundle.deploy(&cell, child.clone()));
        assert!(child.context().shares_store(&cell.context()));
    }

    #[test]
    fn deploy_refused_while_owner_active() {
        let cell = owner();
        let bundle = Bundle::new();
        cell.change(ProcessState::Running);
        assert!(!bundle.deploy(&cell, leaf("a")));
        assert!(bundle.is_empty());
    }

    #[test]
    fn undeploy_by_name() {
        let cell = owner();
        let bundle = Bundle::new();
        bundle.deploy(&cell, leaf("a"));
        bundle.deploy(&cell, leaf("b"));

        let removed = bundle.undeploy(&cell, "a").expect("removed");
        assert_eq!(removed.meta().name(), "a");
        assert!(!bundle.contains(&ModuleMeta::new("a", "1.0.0")));
        assert!(bundle.undeploy(&cell, "zz").is_none());
    }

    #[test]
    fn context_propagation_reaches_every_child() {
        let cell = owner();
        let bundle = Bundle::new();
        bundle.deploy(&cell, leaf("a"));
        bundle.deploy(&cell, leaf("b"));

        let fresh = Context::new();
        assert!(bundle.can_set_context());
        assert!(bundle.set_context(&fresh));
        for child in bundle.modules() {
            assert!(child.context().shares_store(&fresh));
        }
    }

    #[test]
    fn propagation_probe_detects_a_running_child() {
        let cell = owner();
        let bundle = Bundle::new();
        let child = leaf("a");
        bundle.deploy(&cell, child.clone());

        child.lifecycle().change(ProcessState::Running);
        assert!(!bundle.can_set_context());
    }
}
