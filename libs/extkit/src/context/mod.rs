//! Configuration context: the registration scope stack and the provenance of
//! every registered item.
//!
//! Registrations are only legal inside a scope. Scopes are entered through
//! [`ConfigurationContext::enter_scope`], which returns a guard popping the
//! scope when dropped, so the stack stays balanced on errors and panics.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

mod disables;
mod info;

pub use disables::Disable;
pub use info::ItemInfo;

use disables::DisableStore;

use crate::contracts::{Bundle, HostBundle, InstallerHandle, Module};
use crate::duplicates::{DuplicateDetector, EqualityDetector};
use crate::error::ExtkitError;
use crate::hooks::ConfigurationHook;
use crate::instance::ItemInstance;
use crate::item::{ConfigItem, ConfigPhase, ConfigScope, ItemId};
use crate::options::{ExtkitOptions, OptionStore};
use crate::types::TypeDescriptor;

/// Anything that can be registered in the context.
pub enum Registrable {
    Bundle(Arc<dyn Bundle>),
    HostBundle(Arc<dyn HostBundle>),
    Module(Arc<dyn Module>),
    OverridingModule(Arc<dyn Module>),
    Hook(Arc<dyn ConfigurationHook>),
    Installer(InstallerHandle),
    Extension(TypeDescriptor),
    OptionalExtension(TypeDescriptor),
}

impl Registrable {
    pub fn kind(&self) -> ConfigItem {
        match self {
            Self::Bundle(_) => ConfigItem::Bundle,
            Self::HostBundle(_) => ConfigItem::HostBundle,
            Self::Module(_) | Self::OverridingModule(_) => ConfigItem::Module,
            Self::Hook(_) => ConfigItem::Hook,
            Self::Installer(_) => ConfigItem::Installer,
            Self::Extension(_) | Self::OptionalExtension(_) => ConfigItem::Extension,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Bundle(b) => b.type_name(),
            Self::HostBundle(b) => b.type_name(),
            Self::Module(m) | Self::OverridingModule(m) => m.type_name(),
            Self::Hook(h) => h.type_name(),
            Self::Installer(i) => i.type_name(),
            Self::Extension(d) | Self::OptionalExtension(d) => d.name(),
        }
    }
}

impl fmt::Debug for Registrable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.type_name())
    }
}

/// Outcome of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Accepted(ItemId),
    /// Repeat of `original`. `ignored` is the discarded instance, if a
    /// different (but equal) instance was passed.
    Duplicate {
        original: ItemId,
        ignored: Option<ItemId>,
    },
}

impl Registration {
    pub fn id(&self) -> &ItemId {
        match self {
            Registration::Accepted(id) => id,
            Registration::Duplicate { original, .. } => original,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Registration::Accepted(_))
    }
}

/// Enter/exit counters; equal once the outermost scope closed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopeStats {
    pub entered: usize,
    pub exited: usize,
}

pub struct ConfigurationContext {
    scopes: Vec<ItemId>,
    scope_stats: ScopeStats,
    phase: ConfigPhase,
    detector: Box<dyn DuplicateDetector>,
    options: OptionStore,
    strict_duplicates: bool,
    track_host_bundles: bool,
    infos: IndexMap<ItemId, ItemInfo>,
    instances: IndexMap<ItemId, ItemInstance>,
    // discarded duplicates stay alive so their addresses are never reused
    ignored: Vec<ItemInstance>,
    installers: IndexMap<ItemId, InstallerHandle>,
    extensions: IndexMap<ItemId, TypeDescriptor>,
    disables: DisableStore,
    bundle_path: Vec<&'static str>,
    initialized: Vec<ItemId>,
}

impl Default for ConfigurationContext {
    fn default() -> Self {
        Self::new(Box::new(EqualityDetector), OptionStore::new())
    }
}

impl fmt::Debug for ConfigurationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationContext")
            .field("scopes", &self.scopes)
            .field("phase", &self.phase)
            .field("detector", &self.detector.name())
            .field("items", &self.infos.len())
            .field("installers", &self.installers.len())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

impl ConfigurationContext {
    /// Engine options driving registration are read here, once, so they
    /// count as used whether or not their code path ever runs.
    pub fn new(detector: Box<dyn DuplicateDetector>, options: OptionStore) -> Self {
        let strict_duplicates = options.get(ExtkitOptions::STRICT_DUPLICATES);
        let track_host_bundles = options.get(ExtkitOptions::TRACK_HOST_BUNDLES);
        Self {
            scopes: Vec::new(),
            scope_stats: ScopeStats::default(),
            phase: ConfigPhase::Init,
            detector,
            options,
            strict_duplicates,
            track_host_bundles,
            infos: IndexMap::new(),
            instances: IndexMap::new(),
            ignored: Vec::new(),
            installers: IndexMap::new(),
            extensions: IndexMap::new(),
            disables: DisableStore::default(),
            bundle_path: Vec::new(),
            initialized: Vec::new(),
        }
    }

    /* ------------------------------- Scopes ------------------------------- */

    /// Pushes `owner`; the returned guard pops it on every exit path.
    pub fn enter_scope(&mut self, owner: ItemId) -> ScopeGuard<'_> {
        self.scopes.push(owner);
        self.scope_stats.entered += 1;
        let depth = self.scopes.len();
        tracing::trace!(scope = ?self.scopes.last(), depth, "Scope entered");
        ScopeGuard { ctx: self, depth }
    }

    pub fn with_scope<R>(&mut self, owner: ItemId, f: impl FnOnce(&mut Self) -> R) -> R {
        let mut guard = self.enter_scope(owner);
        f(&mut *guard)
    }

    fn exit_scope(&mut self, depth: usize) {
        if self.scopes.len() != depth {
            tracing::error!(
                expected = depth,
                actual = self.scopes.len(),
                "Configuration scope stack out of balance"
            );
        }
        self.scopes.truncate(depth.saturating_sub(1));
        self.scope_stats.exited += 1;
        tracing::trace!(depth = self.scopes.len(), "Scope exited");
    }

    pub fn is_idle(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn current_scope(&self) -> Option<&ItemId> {
        self.scopes.last()
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Current owners from root to the innermost one, application root omitted.
    pub fn scope_chain(&self) -> Vec<ItemId> {
        self.scopes
            .iter()
            .filter(|s| ConfigScope::recognize(s) != Some(ConfigScope::Application))
            .cloned()
            .collect()
    }

    pub fn scope_stats(&self) -> ScopeStats {
        self.scope_stats
    }

    fn require_scope(&self, what: &str) -> Result<ItemId, ExtkitError> {
        self.current_scope().cloned().ok_or_else(|| {
            ExtkitError::illegal_state(format!(
                "{what} outside of any configuration scope: every registration must be attributable to an owner"
            ))
        })
    }

    /* ---------------------------- Registration ---------------------------- */

    pub fn phase(&self) -> ConfigPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: ConfigPhase) {
        tracing::debug!(%phase, "Configuration phase");
        self.phase = phase;
    }

    pub fn options(&self) -> &OptionStore {
        &self.options
    }

    /// Whether host bundles added from bundle callbacks go through the context.
    pub fn tracks_host_bundles(&self) -> bool {
        self.track_host_bundles
    }

    /// Registers an item under the current scope.
    ///
    /// Instances are checked against accepted instances of the same type by
    /// the duplicate detector; types are singletons, so a repeated type only
    /// records the additional owner.
    pub fn register_item(&mut self, item: Registrable) -> Result<Registration, ExtkitError> {
        let scope = self.require_scope(&format!("{} '{}' registered", item.kind(), item.type_name()))?;
        match item {
            Registrable::Bundle(b) => self.register_instance(ItemInstance::Bundle(b), scope, false),
            Registrable::HostBundle(b) => {
                self.register_instance(ItemInstance::HostBundle(b), scope, false)
            }
            Registrable::Module(m) => self.register_instance(ItemInstance::Module(m), scope, false),
            Registrable::OverridingModule(m) => {
                self.register_instance(ItemInstance::Module(m), scope, true)
            }
            Registrable::Hook(h) => self.register_instance(ItemInstance::Hook(h), scope, false),
            Registrable::Installer(handle) => {
                let id = ItemId::of_type(handle.type_name());
                let registration = self.register_type(ConfigItem::Installer, id, scope)?;
                if let Registration::Accepted(id) = &registration {
                    self.installers.insert(id.clone(), handle);
                }
                Ok(registration)
            }
            Registrable::Extension(ty) => self.register_extension(ty, false, scope),
            Registrable::OptionalExtension(ty) => self.register_extension(ty, true, scope),
        }
    }

    fn register_instance(
        &mut self,
        instance: ItemInstance,
        scope: ItemId,
        overriding: bool,
    ) -> Result<Registration, ExtkitError> {
        let kind = instance.kind();
        let id = instance.id();

        let original = if self.instances.contains_key(&id) {
            Some(id.clone())
        } else {
            self.instances
                .iter()
                .filter(|(_, accepted)| {
                    accepted.kind() == kind && accepted.type_name() == instance.type_name()
                })
                .find(|(_, accepted)| self.detector.is_duplicate(accepted, &instance))
                .map(|(accepted_id, _)| accepted_id.clone())
        };

        let Some(original) = original else {
            let mut info = ItemInfo::registered(
                id.clone(),
                kind,
                scope.clone(),
                self.scope_chain(),
                self.phase,
            );
            info.overriding = overriding;
            tracing::debug!(item = %id, %kind, scope = %scope, "Registered");
            self.infos.insert(id.clone(), info);
            self.instances.insert(id.clone(), instance);
            return Ok(Registration::Accepted(id));
        };

        if self.strict_duplicates {
            return Err(ExtkitError::illegal_state(format!(
                "{kind} '{id}' registered by '{scope}' duplicates already registered '{original}'"
            )));
        }

        let ignored = (id != original).then(|| id.clone());
        if let Some(info) = self.infos.get_mut(&original) {
            info.record_repeat(scope.clone());
            if let Some(ignored) = &ignored {
                info.duplicates.push(ignored.clone());
            }
        }
        if ignored.is_some() {
            self.ignored.push(instance);
        }
        tracing::info!(
            item = %id,
            original = %original,
            scope = %scope,
            "IGNORE {kind} as duplicate"
        );
        Ok(Registration::Duplicate { original, ignored })
    }

    fn register_type(
        &mut self,
        kind: ConfigItem,
        id: ItemId,
        scope: ItemId,
    ) -> Result<Registration, ExtkitError> {
        if let Some(info) = self.infos.get_mut(&id) {
            if info.kind != kind {
                return Err(ExtkitError::illegal_state(format!(
                    "'{id}' can't be registered as {kind}: it is already registered as {}",
                    info.kind
                )));
            }
            if info.is_registered() {
                info.record_repeat(scope.clone());
                tracing::debug!(item = %id, %kind, scope = %scope, "Registration repeated");
                return Ok(Registration::Duplicate {
                    original: id,
                    ignored: None,
                });
            }
        }

        let info = ItemInfo::registered(id.clone(), kind, scope.clone(), self.scope_chain(), self.phase);
        tracing::debug!(item = %id, %kind, scope = %scope, "Registered");
        self.infos.insert(id.clone(), info);
        Ok(Registration::Accepted(id))
    }

    fn register_extension(
        &mut self,
        ty: TypeDescriptor,
        optional: bool,
        scope: ItemId,
    ) -> Result<Registration, ExtkitError> {
        let id = ItemId::of_type(ty.name().to_string());
        let registration = self.register_type(ConfigItem::Extension, id.clone(), scope)?;
        if let Some(info) = self.infos.get_mut(&id) {
            info.optional = if registration.is_accepted() {
                optional
            } else {
                info.optional && optional
            };
            info.lazy = ty.is_lazy();
        }
        if registration.is_accepted() {
            self.extensions.insert(id, ty);
        }
        Ok(registration)
    }

    /* ------------------------------ Disables ------------------------------ */

    /// Disables every item of `kind` with the given type name.
    pub fn disable(&mut self, kind: ConfigItem, type_name: impl Into<String>) -> Result<(), ExtkitError> {
        let type_name = type_name.into();
        let scope = self.require_scope(&format!("{kind} '{type_name}' disabled"))?;
        tracing::debug!(%kind, item = %type_name, scope = %scope, "Disabled");
        self.disables.add_type(kind, type_name, scope);
        Ok(())
    }

    pub fn disable_matching(&mut self, disable: Disable) -> Result<(), ExtkitError> {
        let scope = self.require_scope(&format!("disable '{}' registered", disable.label()))?;
        tracing::debug!(disable = disable.label(), scope = %scope, "Disable predicate registered");
        self.disables.add_predicate(scope, disable);
        Ok(())
    }

    pub fn is_disabled(&self, kind: ConfigItem, id: &ItemId) -> bool {
        if self.disables.is_type_disabled(kind, id.type_name()) {
            return true;
        }
        self.infos
            .get(id)
            .is_some_and(|info| !self.disables.disabled_by(info).is_empty())
    }

    /// Applies all disables to the item infos. Types disabled without ever
    /// being registered get an info of their own.
    pub fn finalize(&mut self) {
        for info in self.infos.values_mut() {
            info.disabled_by = self.disables.disabled_by(info);
        }
        let missing: Vec<(ConfigItem, ItemId)> = self
            .disables
            .disabled_types()
            .filter(|(kind, name)| {
                !self
                    .infos
                    .values()
                    .any(|info| info.kind == *kind && info.id.type_name() == *name)
            })
            .map(|(kind, name)| (kind, ItemId::of_type(name.to_string())))
            .collect();
        for (kind, id) in missing {
            let mut info = ItemInfo::disabled_only(id.clone(), kind);
            info.disabled_by = self.disables.disabled_by(&info);
            self.infos.insert(id, info);
        }
    }

    /* ------------------------------- Queries ------------------------------ */

    pub fn info(&self, id: &ItemId) -> Option<&ItemInfo> {
        self.infos.get(id)
    }

    pub(crate) fn info_mut(&mut self, id: &ItemId) -> Option<&mut ItemInfo> {
        self.infos.get_mut(id)
    }

    /// All infos in registration order.
    pub fn infos(&self) -> impl Iterator<Item = &ItemInfo> {
        self.infos.values()
    }

    pub fn infos_of(&self, kind: ConfigItem) -> impl Iterator<Item = &ItemInfo> {
        self.infos.values().filter(move |i| i.kind == kind)
    }

    /// Infos of every item with the given type name (all instances for instance items).
    pub fn find_type(&self, type_name: &str) -> Vec<&ItemInfo> {
        self.infos
            .values()
            .filter(|i| i.id.type_name() == type_name)
            .collect()
    }

    pub fn instance(&self, id: &ItemId) -> Option<&ItemInstance> {
        self.instances.get(id)
    }

    /// Accepted instances of `kind` in registration order.
    pub fn instances_of(&self, kind: ConfigItem) -> Vec<ItemInstance> {
        self.instances
            .values()
            .filter(|i| i.kind() == kind)
            .cloned()
            .collect()
    }

    /// Accepted bundles and host bundles in registration order.
    pub fn bundle_instances(&self) -> Vec<ItemInstance> {
        self.instances
            .values()
            .filter(|i| matches!(i.kind(), ConfigItem::Bundle | ConfigItem::HostBundle))
            .cloned()
            .collect()
    }

    /// Ids of discarded duplicate instances.
    pub fn ignored_items(&self) -> Vec<ItemId> {
        self.ignored.iter().map(ItemInstance::id).collect()
    }

    /// Manually registered extensions in registration order.
    pub fn extensions(&self) -> Vec<TypeDescriptor> {
        self.extensions.values().cloned().collect()
    }

    pub(crate) fn take_installers(&mut self) -> Vec<(ItemId, InstallerHandle)> {
        self.installers.drain(..).collect()
    }

    /* ------------------------- Bundle walk state -------------------------- */

    pub(crate) fn bundle_path(&self) -> &[&'static str] {
        &self.bundle_path
    }

    pub(crate) fn push_bundle_path(&mut self, type_name: &'static str) {
        self.bundle_path.push(type_name);
    }

    pub(crate) fn pop_bundle_path(&mut self) {
        self.bundle_path.pop();
    }

    pub(crate) fn mark_initialized(&mut self, id: &ItemId) {
        self.initialized.push(id.clone());
        let order = self.initialized.len();
        if let Some(info) = self.infos.get_mut(id) {
            info.init_order = Some(order);
        }
    }

    pub fn is_initialized(&self, id: &ItemId) -> bool {
        self.initialized.contains(id)
    }

    /// Bundles and host bundles in initialization order.
    pub fn initialized_bundles(&self) -> &[ItemId] {
        &self.initialized
    }
}

/// Active registration scope. Derefs to the context; pops the scope on drop.
pub struct ScopeGuard<'a> {
    ctx: &'a mut ConfigurationContext,
    depth: usize,
}

impl Deref for ScopeGuard<'_> {
    type Target = ConfigurationContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.exit_scope(self.depth);
    }
}
