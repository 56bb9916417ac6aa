//! Application builder and the runtime driving one configuration run.
//!
//! Phases: hooks (in [`ExtkitBuilder::build`]) → init (root items, bundle
//! lookup, scan, bundle walk, installer pass 1) → run (bundle run callbacks,
//! modules, extension binding, injector, installation).

use std::fmt;
use std::sync::Arc;

use crate::bundles::{self, BundleLookup, InventoryBundleLookup};
use crate::context::{ConfigurationContext, Disable, Registrable};
use crate::contracts::{
    Binder, Bundle, ContainerFactory, HostBootstrap, HostBundle, InstallerHandle, Module,
};
use crate::duplicates::{DuplicateDetector, EqualityDetector};
use crate::error::ExtkitError;
use crate::hooks::{ConfigurationHook, HookRegistry};
use crate::info::ConfigurationInfo;
use crate::installer::InstallerPipeline;
use crate::instance::ItemInstance;
use crate::item::{ConfigItem, ConfigPhase, ConfigScope, ItemId};
use crate::lifecycle::{LifecycleEvent, LifecycleListener, Listeners};
use crate::options::{ExtkitOptions, OptionKey, OptionStore, OptionValue};
use crate::scanner::{ClasspathScanner, InventoryScanner};
use crate::types::TypeDescriptor;

enum Action {
    Register(Registrable),
    DisableType(ConfigItem, String),
    Disable(Disable),
}

/// Root-level registration, replayed into the context at init under `path`.
struct PendingEntry {
    path: Vec<ItemId>,
    action: Action,
}

/// Collects the application configuration.
///
/// Registration methods record intent only; the context sees them when
/// [`Extkit::initialize`] runs. Items added by configuration hooks are owned
/// by the hook.
pub struct ExtkitBuilder {
    application: String,
    path: Vec<ItemId>,
    pending: Vec<PendingEntry>,
    options: OptionStore,
    detector: Box<dyn DuplicateDetector>,
    scanner: Box<dyn ClasspathScanner>,
    lookup: Box<dyn BundleLookup>,
    listeners: Listeners,
    hooks: Vec<Arc<dyn ConfigurationHook>>,
    hook_registry: Option<HookRegistry>,
}

impl fmt::Debug for ExtkitBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtkitBuilder")
            .field("application", &self.application)
            .field("pending", &self.pending.len())
            .field("detector", &self.detector.name())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl ExtkitBuilder {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            path: vec![ConfigScope::Application.id()],
            pending: Vec::new(),
            options: OptionStore::new(),
            detector: Box::new(EqualityDetector),
            scanner: Box::new(InventoryScanner),
            lookup: Box::new(InventoryBundleLookup),
            listeners: Listeners::default(),
            hooks: Vec::new(),
            hook_registry: None,
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application
    }

    fn push(&mut self, action: Action) -> &mut Self {
        self.pending.push(PendingEntry {
            path: self.path.clone(),
            action,
        });
        self
    }

    pub fn bundle(&mut self, bundle: impl Bundle) -> &mut Self {
        self.bundle_arc(Arc::new(bundle))
    }

    pub fn bundle_arc(&mut self, bundle: Arc<dyn Bundle>) -> &mut Self {
        self.push(Action::Register(Registrable::Bundle(bundle)))
    }

    pub fn host_bundle(&mut self, bundle: impl HostBundle) -> &mut Self {
        self.push(Action::Register(Registrable::HostBundle(Arc::new(bundle))))
    }

    pub fn installer(&mut self, installer: InstallerHandle) -> &mut Self {
        self.push(Action::Register(Registrable::Installer(installer)))
    }

    pub fn extension(&mut self, ty: TypeDescriptor) -> &mut Self {
        self.push(Action::Register(Registrable::Extension(ty)))
    }

    pub fn extension_optional(&mut self, ty: TypeDescriptor) -> &mut Self {
        self.push(Action::Register(Registrable::OptionalExtension(ty)))
    }

    pub fn module(&mut self, module: impl Module) -> &mut Self {
        self.push(Action::Register(Registrable::Module(Arc::new(module))))
    }

    pub fn module_override(&mut self, module: impl Module) -> &mut Self {
        self.push(Action::Register(Registrable::OverridingModule(Arc::new(module))))
    }

    pub fn disable_installer(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.push(Action::DisableType(ConfigItem::Installer, type_name.into()))
    }

    pub fn disable_extension(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.push(Action::DisableType(ConfigItem::Extension, type_name.into()))
    }

    pub fn disable_bundle(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.push(Action::DisableType(ConfigItem::Bundle, type_name.into()))
    }

    pub fn disable_host_bundle(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.push(Action::DisableType(ConfigItem::HostBundle, type_name.into()))
    }

    pub fn disable_module(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.push(Action::DisableType(ConfigItem::Module, type_name.into()))
    }

    pub fn disable(&mut self, disable: Disable) -> &mut Self {
        self.push(Action::Disable(disable))
    }

    pub fn option<T: OptionValue>(&mut self, key: OptionKey<T>, value: T) -> Result<&mut Self, ExtkitError> {
        self.options.set(key, value)?;
        Ok(self)
    }

    /// Store receiving option overrides, e.g. from an [`crate::options::OptionsMapper`].
    pub fn options(&self) -> &OptionStore {
        &self.options
    }

    pub fn duplicate_detector(&mut self, detector: impl DuplicateDetector + 'static) -> &mut Self {
        tracing::debug!(detector = detector.name(), "Duplicate detector overridden");
        self.detector = Box::new(detector);
        self
    }

    pub fn scanner(&mut self, scanner: impl ClasspathScanner + 'static) -> &mut Self {
        self.scanner = Box::new(scanner);
        self
    }

    pub fn scan_packages<I, S>(&mut self, packages: I) -> Result<&mut Self, ExtkitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let packages = packages.into_iter().map(Into::into).collect();
        self.option(ExtkitOptions::SCAN_PACKAGES, packages)
    }

    pub fn bundle_lookup(&mut self, lookup: impl BundleLookup + 'static) -> &mut Self {
        self.lookup = Box::new(lookup);
        self
    }

    pub fn listener(&mut self, listener: impl LifecycleListener) -> &mut Self {
        self.listeners.add(Box::new(listener));
        self
    }

    pub fn hook(&mut self, hook: impl ConfigurationHook) -> &mut Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Hooks registered there are taken (and the registry emptied) by `build`.
    pub fn hooks_from(&mut self, registry: &HookRegistry) -> &mut Self {
        self.hook_registry = Some(registry.clone());
        self
    }

    /// Runs configuration hooks and freezes the configuration.
    pub fn build(mut self) -> Result<Extkit, ExtkitError> {
        let mut hooks = std::mem::take(&mut self.hooks);
        if let Some(registry) = self.hook_registry.take() {
            hooks.extend(registry.drain());
        }
        let names = self.run_hooks(hooks)?;

        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.emit(LifecycleEvent::HooksProcessed { hooks: names });

        Ok(Extkit {
            application: self.application,
            ctx: ConfigurationContext::new(self.detector, self.options),
            pending: self.pending,
            scanner: self.scanner,
            lookup: self.lookup,
            listeners,
            state: State::Configured,
            pipeline: None,
            scanned: Vec::new(),
        })
    }

    fn run_hooks(&mut self, hooks: Vec<Arc<dyn ConfigurationHook>>) -> Result<Vec<String>, ExtkitError> {
        let mut names = Vec::with_capacity(hooks.len());
        let mut seen: Vec<ItemId> = Vec::new();
        for hook in hooks {
            let id = ItemInstance::Hook(hook.clone()).id();
            if seen.contains(&id) {
                continue;
            }
            seen.push(id.clone());
            tracing::debug!(hook = hook.type_name(), "Running configuration hook");

            self.push(Action::Register(Registrable::Hook(hook.clone())));
            let root = std::mem::replace(&mut self.path, vec![ConfigScope::Hook.id(), id]);
            let result = hook.configure(self);
            self.path = root;
            result.map_err(|source| ExtkitError::HookFailure {
                hook: hook.type_name().to_string(),
                source,
            })?;
            names.push(hook.type_name().to_string());
        }
        Ok(names)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configured,
    Initialized,
    Started,
}

/// One application start: [`Extkit::initialize`] during host bootstrap,
/// [`Extkit::run`] once the host is ready to create the injector.
pub struct Extkit {
    application: String,
    ctx: ConfigurationContext,
    pending: Vec<PendingEntry>,
    scanner: Box<dyn ClasspathScanner>,
    lookup: Box<dyn BundleLookup>,
    listeners: Listeners,
    state: State,
    pipeline: Option<InstallerPipeline>,
    scanned: Vec<TypeDescriptor>,
}

impl fmt::Debug for Extkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extkit")
            .field("application", &self.application)
            .field("state", &self.state)
            .field("context", &self.ctx)
            .finish()
    }
}

impl Extkit {
    pub fn builder(application: impl Into<String>) -> ExtkitBuilder {
        ExtkitBuilder::new(application)
    }

    pub fn context(&self) -> &ConfigurationContext {
        &self.ctx
    }

    fn expect_state(&self, expected: State, operation: &str) -> Result<(), ExtkitError> {
        if self.state == expected {
            return Ok(());
        }
        Err(ExtkitError::illegal_state(format!(
            "{operation} called in state {:?}, expected {expected:?}",
            self.state
        )))
    }

    /// INIT phase: registers the root configuration, looked-up and scanned
    /// items, walks all bundles and resolves the installer pipeline.
    pub fn initialize(&mut self, host: &mut dyn HostBootstrap) -> Result<(), ExtkitError> {
        self.expect_state(State::Configured, "initialize")?;
        tracing::info!(application = %self.application, "Phase: init");
        self.ctx.set_phase(ConfigPhase::Init);

        self.register_pending()?;
        self.lookup_bundles()?;
        self.scan()?;

        let roots = self.ctx.bundle_instances();
        self.listeners.emit(LifecycleEvent::BundlesResolved {
            bundles: roots.iter().map(ItemInstance::id).collect(),
        });
        bundles::initialize_bundles(&mut self.ctx, host, roots)?;
        tracing::info!(
            bundles = self.ctx.initialized_bundles().len(),
            "Bundles initialized"
        );
        self.listeners.emit(LifecycleEvent::BundlesInitialized {
            bundles: self.ctx.initialized_bundles().to_vec(),
        });

        let pipeline = InstallerPipeline::build(&mut self.ctx)?;
        self.listeners.emit(LifecycleEvent::InstallersResolved {
            installers: pipeline.installer_names(),
        });
        self.pipeline = Some(pipeline);
        self.state = State::Initialized;
        Ok(())
    }

    fn register_pending(&mut self) -> Result<(), ExtkitError> {
        let mut entries = std::mem::take(&mut self.pending).into_iter().peekable();
        while let Some(first) = entries.next() {
            let path = first.path;
            let mut group = vec![first.action];
            while let Some(next) = entries.next_if(|e| e.path == path) {
                group.push(next.action);
            }
            with_path(&mut self.ctx, &path, |ctx| {
                group.into_iter().try_for_each(|action| apply(ctx, action))
            })?;
        }
        Ok(())
    }

    fn lookup_bundles(&mut self) -> Result<(), ExtkitError> {
        if !self.ctx.options().get(ExtkitOptions::USE_BUNDLE_LOOKUP) {
            tracing::debug!("Bundle lookup disabled");
            return Ok(());
        }
        let found = self.lookup.lookup();
        if found.is_empty() {
            return Ok(());
        }
        tracing::debug!(bundles = found.len(), "Bundles found by lookup");
        self.ctx.with_scope(ConfigScope::BundleLookup.id(), |ctx| {
            found
                .into_iter()
                .try_for_each(|b| ctx.register_item(Registrable::Bundle(b)).map(drop))
        })
    }

    fn scan(&mut self) -> Result<(), ExtkitError> {
        let packages = self.ctx.options().get(ExtkitOptions::SCAN_PACKAGES);
        if packages.is_empty() {
            return Ok(());
        }
        tracing::info!(packages = ?packages, "Scanning for extensions");

        let installers = self.scanner.installers(&packages);
        self.ctx.with_scope(ConfigScope::ClasspathScan.id(), |ctx| {
            installers
                .into_iter()
                .try_for_each(|i| ctx.register_item(Registrable::Installer(i)).map(drop))
        })?;

        self.scanned = self
            .scanner
            .candidates(&packages)
            .into_iter()
            .filter(|ty| !ty.is_invisible_for_scanner())
            .collect();
        Ok(())
    }

    /// RUN phase: bundle run callbacks, modules, extension binding, injector
    /// creation and installation. Returns the final configuration snapshot.
    pub fn run(&mut self, container: &mut dyn ContainerFactory) -> Result<ConfigurationInfo, ExtkitError> {
        self.expect_state(State::Initialized, "run")?;
        let Some(mut pipeline) = self.pipeline.take() else {
            return Err(ExtkitError::illegal_state("installer pipeline not resolved"));
        };

        tracing::info!("Phase: run");
        self.ctx.set_phase(ConfigPhase::Run);
        bundles::run_bundles(&mut self.ctx)?;

        tracing::info!("Phase: injector");
        self.ctx.set_phase(ConfigPhase::Injector);
        let (modules, overriding) = self.configure_modules(container.binder())?;
        self.listeners
            .emit(LifecycleEvent::ModulesProcessed { modules, overriding });

        let extensions = pipeline.bind_extensions(&mut self.ctx, &self.scanned, container.binder())?;
        self.listeners
            .emit(LifecycleEvent::ExtensionsResolved { extensions });

        let injector = container
            .create_injector()
            .map_err(ExtkitError::InjectorCreation)?;
        self.listeners.emit(LifecycleEvent::InjectorCreated);

        let installed = pipeline.install(&mut self.ctx, injector.as_ref())?;
        self.listeners
            .emit(LifecycleEvent::ExtensionsInstalled { installed });

        self.ctx.finalize();
        self.pipeline = Some(pipeline);
        self.state = State::Started;
        self.listeners.emit(LifecycleEvent::ApplicationRun);
        tracing::info!(application = %self.application, "Configuration complete");
        Ok(self.info())
    }

    /// Regular modules first, then overriding ones; disabled modules are skipped.
    fn configure_modules(&self, binder: &mut dyn Binder) -> Result<(Vec<ItemId>, usize), ExtkitError> {
        let modules = self.ctx.instances_of(ConfigItem::Module);
        let (overriding, regular): (Vec<_>, Vec<_>) = modules.into_iter().partition(|m| {
            self.ctx
                .info(&m.id())
                .is_some_and(|info| info.overriding)
        });
        let overriding_count = overriding.len();

        let mut configured = Vec::new();
        for module in regular.into_iter().chain(overriding) {
            let id = module.id();
            if self.ctx.is_disabled(ConfigItem::Module, &id) {
                tracing::debug!(module = %id, "Module disabled");
                continue;
            }
            if let ItemInstance::Module(m) = &module {
                tracing::debug!(module = %id, "Configuring module");
                m.configure(binder)
                    .map_err(|source| ExtkitError::ModuleConfiguration {
                        module: m.type_name().to_string(),
                        source,
                    })?;
                configured.push(id);
            }
        }
        Ok((configured, overriding_count))
    }

    /// Current snapshot; complete once `run` returned.
    pub fn info(&self) -> ConfigurationInfo {
        ConfigurationInfo {
            application: self.application.clone(),
            items: self.ctx.infos().cloned().collect(),
            installers: self
                .pipeline
                .as_ref()
                .map(InstallerPipeline::infos)
                .unwrap_or_default(),
            options: self.ctx.options().snapshot(),
            bundle_init_order: self.ctx.initialized_bundles().to_vec(),
            ignored: self.ctx.ignored_items(),
            scope_stats: self.ctx.scope_stats(),
        }
    }
}

fn apply(ctx: &mut ConfigurationContext, action: Action) -> Result<(), ExtkitError> {
    match action {
        Action::Register(item) => ctx.register_item(item).map(drop),
        Action::DisableType(kind, type_name) => ctx.disable(kind, type_name),
        Action::Disable(disable) => ctx.disable_matching(disable),
    }
}

fn with_path<R>(
    ctx: &mut ConfigurationContext,
    path: &[ItemId],
    f: impl FnOnce(&mut ConfigurationContext) -> R,
) -> R {
    match path.split_first() {
        None => f(ctx),
        Some((owner, rest)) => ctx.with_scope(owner.clone(), |ctx| with_path(ctx, rest, f)),
    }
}
