//! Configuration hooks: last-minute changes to an application builder that
//! the application code itself does not know about (test setups mostly).

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::runtime::ExtkitBuilder;

pub trait ConfigurationHook: Send + Sync + 'static {
    fn configure(&self, builder: &mut ExtkitBuilder) -> anyhow::Result<()>;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Hook from a plain closure.
pub struct FnHook<F> {
    name: &'static str,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut ExtkitBuilder) -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> ConfigurationHook for FnHook<F>
where
    F: Fn(&mut ExtkitBuilder) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn configure(&self, builder: &mut ExtkitBuilder) -> anyhow::Result<()> {
        (self.f)(builder)
    }

    fn type_name(&self) -> &'static str {
        self.name
    }
}

/// Hooks waiting for the next application build.
///
/// Cloning shares the underlying list, so a test can hand one clone to the
/// code under test and keep registering through the other. The builder drains
/// the registry before running any hook: a failed build never leaks hooks
/// into the next one.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<Mutex<Vec<Arc<dyn ConfigurationHook>>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, hook: impl ConfigurationHook) {
        self.register_arc(Arc::new(hook));
    }

    pub fn register_arc(&self, hook: Arc<dyn ConfigurationHook>) {
        tracing::debug!(hook = hook.type_name(), "Hook registered");
        self.hooks.lock().push(hook);
    }

    pub fn drain(&self) -> Vec<Arc<dyn ConfigurationHook>> {
        std::mem::take(&mut *self.hooks.lock())
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.hooks.lock().iter().map(|h| h.type_name()).collect();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_hooks_and_drain_empties() {
        let registry = HookRegistry::new();
        let other = registry.clone();
        other.register(FnHook::new("test::Noop", |_| Ok(())));
        assert_eq!(registry.len(), 1);

        let drained = registry.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].type_name(), "test::Noop");
        assert!(other.is_empty());
    }
}
