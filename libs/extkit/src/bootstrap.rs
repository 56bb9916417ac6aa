//! Handles passed to bundle callbacks.
//!
//! Every registration made through these handles goes through the
//! configuration context under the calling bundle's scope.

use std::sync::Arc;

use crate::context::{ConfigurationContext, Disable, Registrable, Registration};
use crate::contracts::{Bundle, HostBootstrap, HostBundle, InstallerHandle, Module};
use crate::error::ExtkitError;
use crate::instance::ItemInstance;
use crate::item::{ConfigItem, ItemId};
use crate::options::{OptionKey, OptionValue};
use crate::types::TypeDescriptor;

/// Initialization-phase handle of a [`Bundle`].
///
/// Nested bundles, and host bundles added through [`Self::host`], are
/// collected and initialized in registration order right after the current
/// bundle's `initialize` returns, still inside its scope.
pub struct BundleBootstrap<'a> {
    ctx: &'a mut ConfigurationContext,
    host: &'a mut dyn HostBootstrap,
    pending: Vec<ItemInstance>,
}

impl<'a> BundleBootstrap<'a> {
    pub(crate) fn new(ctx: &'a mut ConfigurationContext, host: &'a mut dyn HostBootstrap) -> Self {
        Self {
            ctx,
            host,
            pending: Vec::new(),
        }
    }

    pub fn bundle(&mut self, bundle: impl Bundle) -> Result<&mut Self, ExtkitError> {
        self.bundle_arc(Arc::new(bundle))
    }

    pub fn bundle_arc(&mut self, bundle: Arc<dyn Bundle>) -> Result<&mut Self, ExtkitError> {
        let registration = self.ctx.register_item(Registrable::Bundle(bundle.clone()))?;
        if registration.is_accepted() {
            self.pending.push(ItemInstance::Bundle(bundle));
        }
        Ok(self)
    }

    pub fn host_bundle(&mut self, bundle: impl HostBundle) -> Result<&mut Self, ExtkitError> {
        let bundle: Arc<dyn HostBundle> = Arc::new(bundle);
        let registration = self.ctx.register_item(Registrable::HostBundle(bundle.clone()))?;
        if registration.is_accepted() {
            self.pending.push(ItemInstance::HostBundle(bundle));
        }
        Ok(self)
    }

    pub fn installer(&mut self, installer: InstallerHandle) -> Result<&mut Self, ExtkitError> {
        self.ctx.register_item(Registrable::Installer(installer))?;
        Ok(self)
    }

    pub fn extension(&mut self, ty: TypeDescriptor) -> Result<&mut Self, ExtkitError> {
        self.ctx.register_item(Registrable::Extension(ty))?;
        Ok(self)
    }

    /// Extension disabled automatically when no installer recognizes it.
    pub fn extension_optional(&mut self, ty: TypeDescriptor) -> Result<&mut Self, ExtkitError> {
        self.ctx.register_item(Registrable::OptionalExtension(ty))?;
        Ok(self)
    }

    pub fn module(&mut self, module: impl Module) -> Result<&mut Self, ExtkitError> {
        self.ctx.register_item(Registrable::Module(Arc::new(module)))?;
        Ok(self)
    }

    /// Module configured after all regular modules, so its bindings win.
    pub fn module_override(&mut self, module: impl Module) -> Result<&mut Self, ExtkitError> {
        self.ctx
            .register_item(Registrable::OverridingModule(Arc::new(module)))?;
        Ok(self)
    }

    pub fn disable_installer(&mut self, type_name: impl Into<String>) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable(ConfigItem::Installer, type_name)?;
        Ok(self)
    }

    pub fn disable_extension(&mut self, type_name: impl Into<String>) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable(ConfigItem::Extension, type_name)?;
        Ok(self)
    }

    pub fn disable_bundle(&mut self, type_name: impl Into<String>) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable(ConfigItem::Bundle, type_name)?;
        Ok(self)
    }

    pub fn disable_host_bundle(&mut self, type_name: impl Into<String>) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable(ConfigItem::HostBundle, type_name)?;
        Ok(self)
    }

    pub fn disable_module(&mut self, type_name: impl Into<String>) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable(ConfigItem::Module, type_name)?;
        Ok(self)
    }

    pub fn disable(&mut self, disable: Disable) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable_matching(disable)?;
        Ok(self)
    }

    pub fn option<T: OptionValue>(&self, key: OptionKey<T>) -> T {
        self.ctx.options().get(key)
    }

    pub fn application_name(&self) -> &str {
        self.host.application_name()
    }

    /// The bundle this handle was created for.
    pub fn scope(&self) -> Option<&ItemId> {
        self.ctx.current_scope()
    }

    /// Host bootstrap whose `add_bundle` goes through the context.
    pub fn host(&mut self) -> TrackingBootstrap<'_> {
        let tracking = self.ctx.tracks_host_bundles();
        TrackingBootstrap::new(&mut *self.ctx, &mut *self.host, &mut self.pending, tracking)
    }

    pub(crate) fn into_pending(self) -> Vec<ItemInstance> {
        self.pending
    }
}

/// Run-phase handle of a [`Bundle`].
pub struct BundleEnvironment<'a> {
    ctx: &'a mut ConfigurationContext,
}

impl<'a> BundleEnvironment<'a> {
    pub(crate) fn new(ctx: &'a mut ConfigurationContext) -> Self {
        Self { ctx }
    }

    pub fn extension(&mut self, ty: TypeDescriptor) -> Result<&mut Self, ExtkitError> {
        self.ctx.register_item(Registrable::Extension(ty))?;
        Ok(self)
    }

    pub fn module(&mut self, module: impl Module) -> Result<&mut Self, ExtkitError> {
        self.ctx.register_item(Registrable::Module(Arc::new(module)))?;
        Ok(self)
    }

    pub fn module_override(&mut self, module: impl Module) -> Result<&mut Self, ExtkitError> {
        self.ctx
            .register_item(Registrable::OverridingModule(Arc::new(module)))?;
        Ok(self)
    }

    pub fn disable_extension(&mut self, type_name: impl Into<String>) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable(ConfigItem::Extension, type_name)?;
        Ok(self)
    }

    pub fn disable_module(&mut self, type_name: impl Into<String>) -> Result<&mut Self, ExtkitError> {
        self.ctx.disable(ConfigItem::Module, type_name)?;
        Ok(self)
    }

    pub fn option<T: OptionValue>(&self, key: OptionKey<T>) -> T {
        self.ctx.options().get(key)
    }
}

/// Decorator over the host bootstrap.
///
/// With tracking on, `add_bundle` registers the host bundle in the context;
/// accepted bundles are initialized once the calling bundle's `initialize`
/// returns, duplicates are dropped. Every other call goes to the wrapped host
/// unchanged.
pub struct TrackingBootstrap<'a> {
    ctx: &'a mut ConfigurationContext,
    host: &'a mut dyn HostBootstrap,
    pending: &'a mut Vec<ItemInstance>,
    tracking: bool,
}

impl<'a> TrackingBootstrap<'a> {
    pub(crate) fn new(
        ctx: &'a mut ConfigurationContext,
        host: &'a mut dyn HostBootstrap,
        pending: &'a mut Vec<ItemInstance>,
        tracking: bool,
    ) -> Self {
        Self {
            ctx,
            host,
            pending,
            tracking,
        }
    }
}

impl HostBootstrap for TrackingBootstrap<'_> {
    fn application_name(&self) -> &str {
        self.host.application_name()
    }

    fn add_bundle(&mut self, bundle: Arc<dyn HostBundle>) -> anyhow::Result<()> {
        if !self.tracking {
            return self.host.add_bundle(bundle);
        }
        match self.ctx.register_item(Registrable::HostBundle(bundle.clone()))? {
            Registration::Accepted(_) => self.pending.push(ItemInstance::HostBundle(bundle)),
            Registration::Duplicate { original, .. } => {
                tracing::debug!(bundle = %original, "Host bundle already registered");
            }
        }
        Ok(())
    }

    fn add_command(&mut self, name: &str) {
        self.host.add_command(name);
    }

    fn commands(&self) -> Vec<String> {
        self.host.commands()
    }
}
