use serde::Serialize;

use crate::item::ItemId;

/// Milestones of one application start, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    HooksProcessed { hooks: Vec<String> },
    /// Root and looked-up bundles, before any was initialized.
    BundlesResolved { bundles: Vec<ItemId> },
    /// Every initialized bundle, in initialization order.
    BundlesInitialized { bundles: Vec<ItemId> },
    /// Enabled installers in pipeline order.
    InstallersResolved { installers: Vec<String> },
    ModulesProcessed { modules: Vec<ItemId>, overriding: usize },
    /// Extensions recognized by at least one installer.
    ExtensionsResolved { extensions: Vec<String> },
    InjectorCreated,
    ExtensionsInstalled { installed: usize },
    ApplicationRun,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::HooksProcessed { .. } => "HooksProcessed",
            LifecycleEvent::BundlesResolved { .. } => "BundlesResolved",
            LifecycleEvent::BundlesInitialized { .. } => "BundlesInitialized",
            LifecycleEvent::InstallersResolved { .. } => "InstallersResolved",
            LifecycleEvent::ModulesProcessed { .. } => "ModulesProcessed",
            LifecycleEvent::ExtensionsResolved { .. } => "ExtensionsResolved",
            LifecycleEvent::InjectorCreated => "InjectorCreated",
            LifecycleEvent::ExtensionsInstalled { .. } => "ExtensionsInstalled",
            LifecycleEvent::ApplicationRun => "ApplicationRun",
        }
    }
}

pub trait LifecycleListener: Send + 'static {
    fn on_event(&mut self, event: &LifecycleEvent);

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Registered listeners; at most one per listener type.
#[derive(Default)]
pub(crate) struct Listeners {
    listeners: Vec<Box<dyn LifecycleListener>>,
}

impl Listeners {
    /// Returns false when a listener of the same type is already registered.
    pub(crate) fn add(&mut self, listener: Box<dyn LifecycleListener>) -> bool {
        if self
            .listeners
            .iter()
            .any(|l| l.type_name() == listener.type_name())
        {
            tracing::debug!(listener = listener.type_name(), "Duplicate lifecycle listener ignored");
            return false;
        }
        self.listeners.push(listener);
        true
    }

    pub(crate) fn emit(&mut self, event: LifecycleEvent) {
        tracing::trace!(event = event.name(), "Lifecycle event");
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}
