//! Demo application wired through the engine: a small bundle tree, three
//! installers (one per strategy), scanned and manual extensions, a host bundle
//! and a configuration hook.

use std::any::Any;
use std::sync::Arc;

use extkit::{
    lookup_bundle, scan_candidate, scan_installer, value_eq, Binder, BindingInstaller,
    BindingScope, Bundle, BundleBootstrap, BundleEnvironment, ExtkitBuilder, FnHook,
    HookRegistry, HostBootstrap, HostBundle, Installer, InstallerHandle, InstanceInstaller,
    Module, OptionKey, SharedInstance, TypeDescriptor, TypeInstaller,
};

pub const JOB: &str = "Job";
pub const HEALTH_CHECK: &str = "HealthCheck";
pub const RESOURCE: &str = "Resource";
pub const GRAPHQL: &str = "GraphQL";

/// Seconds between job runs; read by [`CoreBundle`].
pub const JOB_INTERVAL: OptionKey<u64> = OptionKey::new("Demo", "JobIntervalSecs", || 60);
/// Mount the admin resources found by the bundle lookup.
pub const ADMIN_ENABLED: OptionKey<bool> = OptionKey::new("Demo", "AdminEnabled", || true);

/* ------------------------------- extensions ------------------------------- */

pub mod ext {
    use super::*;

    #[derive(Default)]
    pub struct CleanupJob;

    #[derive(Default)]
    pub struct ReindexJob;

    #[derive(Default)]
    pub struct DatabaseHealth;

    /// Only registered explicitly, never through scanning.
    #[derive(Default)]
    pub struct InternalProbe;

    scan_candidate!(|| TypeDescriptor::of::<CleanupJob>()
        .with_marker(JOB)
        .with_order(20));
    scan_candidate!(|| TypeDescriptor::of::<ReindexJob>()
        .with_marker(JOB)
        .with_order(10));
    scan_candidate!(|| TypeDescriptor::of::<DatabaseHealth>().with_marker(HEALTH_CHECK));
    scan_candidate!(|| TypeDescriptor::of::<InternalProbe>()
        .with_marker(HEALTH_CHECK)
        .invisible_for_scanner());

    /// Unordered installer discovered by scanning; recognizes nothing in the demo.
    #[derive(Default)]
    pub struct AuditInstaller;

    impl Installer for AuditInstaller {
        fn matches(&self, ty: &TypeDescriptor) -> bool {
            ty.has_marker("Audited")
        }
    }

    impl TypeInstaller for AuditInstaller {
        fn install(&mut self, _ty: &TypeDescriptor) -> anyhow::Result<()> {
            Ok(())
        }
    }

    scan_installer!(AuditInstaller, || InstallerHandle::of_type(AuditInstaller));
}

pub mod web {
    use super::*;

    #[derive(Default)]
    pub struct UsersResource;

    #[derive(Default)]
    pub struct OrdersResource;

    #[derive(Default)]
    pub struct AdminResource;

    #[derive(Default)]
    pub struct GraphqlEndpoint;

    pub fn users() -> TypeDescriptor {
        TypeDescriptor::of::<UsersResource>().with_marker(RESOURCE)
    }

    pub fn orders() -> TypeDescriptor {
        TypeDescriptor::of::<OrdersResource>().with_marker(RESOURCE)
    }

    pub fn admin() -> TypeDescriptor {
        TypeDescriptor::of::<AdminResource>().with_marker(RESOURCE)
    }

    pub fn graphql() -> TypeDescriptor {
        TypeDescriptor::of::<GraphqlEndpoint>().with_marker(GRAPHQL)
    }
}

/* ------------------------------- installers ------------------------------- */

/// Schedules job extensions in their declared order.
#[derive(Default)]
pub struct JobInstaller {
    scheduled: Vec<String>,
}

impl Installer for JobInstaller {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        ty.has_marker(JOB)
    }

    fn order(&self) -> Option<i32> {
        Some(10)
    }

    fn recognizable_signs(&self) -> Vec<String> {
        vec![format!("declares the {JOB} marker")]
    }

    fn orders_extensions(&self) -> bool {
        true
    }

    fn report(&mut self) {
        tracing::info!(jobs = ?self.scheduled, "Jobs scheduled");
    }
}

impl TypeInstaller for JobInstaller {
    fn install(&mut self, ty: &TypeDescriptor) -> anyhow::Result<()> {
        self.scheduled.push(ty.simple_name().to_string());
        Ok(())
    }
}

/// Registers live health check instances.
#[derive(Default)]
pub struct HealthCheckInstaller {
    checks: Vec<SharedInstance>,
}

impl Installer for HealthCheckInstaller {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        ty.has_marker(HEALTH_CHECK)
    }

    fn order(&self) -> Option<i32> {
        Some(20)
    }

    fn recognizable_signs(&self) -> Vec<String> {
        vec![format!("declares the {HEALTH_CHECK} marker")]
    }

    fn report(&mut self) {
        tracing::info!(checks = self.checks.len(), "Health checks registered");
    }
}

impl InstanceInstaller for HealthCheckInstaller {
    fn install(&mut self, ty: &TypeDescriptor, instance: SharedInstance) -> anyhow::Result<()> {
        tracing::debug!(check = ty.simple_name(), "Health check registered");
        self.checks.push(instance);
        Ok(())
    }
}

/// Binds web resources per request.
#[derive(Default)]
pub struct ResourceInstaller;

impl Installer for ResourceInstaller {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        ty.has_marker(RESOURCE)
    }

    fn order(&self) -> Option<i32> {
        Some(30)
    }

    fn is_web(&self) -> bool {
        true
    }

    fn recognizable_signs(&self) -> Vec<String> {
        vec![format!("declares the {RESOURCE} marker")]
    }
}

impl BindingInstaller for ResourceInstaller {
    fn bind(&mut self, binder: &mut dyn Binder, ty: &TypeDescriptor) -> anyhow::Result<()> {
        binder.bind_type(ty, BindingScope::Prototype)
    }
}

/* --------------------------------- modules -------------------------------- */

#[derive(Debug, PartialEq)]
pub struct SettingsModule {
    pub application: String,
}

impl Module for SettingsModule {
    fn configure(&self, binder: &mut dyn Binder) -> anyhow::Result<()> {
        binder.bind_instance("demo.application", Arc::new(self.application.clone()))
    }

    fn equals(&self, other: &dyn Any) -> bool {
        value_eq(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Overriding module contributed by the demo hook.
pub struct ProfileModule {
    pub profile: &'static str,
}

impl Module for ProfileModule {
    fn configure(&self, binder: &mut dyn Binder) -> anyhow::Result<()> {
        binder.bind_instance("demo.profile", Arc::new(self.profile.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/* --------------------------------- bundles -------------------------------- */

#[derive(Debug, PartialEq, Default)]
pub struct CoreBundle;

impl Bundle for CoreBundle {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        let interval = bootstrap.option(JOB_INTERVAL);
        tracing::debug!(interval, "Core bundle configured");

        let application = bootstrap.application_name().to_string();
        bootstrap
            .installer(InstallerHandle::of_type(JobInstaller::default()))?
            .installer(InstallerHandle::instance(HealthCheckInstaller::default()))?
            .extension(
                TypeDescriptor::of::<ext::InternalProbe>().with_marker(HEALTH_CHECK),
            )?
            .module(SettingsModule { application })?
            .bundle(WebBundle)?;
        bootstrap.host().add_bundle(Arc::new(MetricsHostBundle))?;
        Ok(())
    }

    fn run(&self, env: &mut BundleEnvironment<'_>) -> anyhow::Result<()> {
        if env.option(JOB_INTERVAL) == 0 {
            env.disable_extension(std::any::type_name::<ext::CleanupJob>())?;
        }
        Ok(())
    }

    fn equals(&self, other: &dyn Any) -> bool {
        value_eq(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct WebBundle;

impl Bundle for WebBundle {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap
            .installer(InstallerHandle::binding(ResourceInstaller))?
            .extension(web::users())?
            .extension(web::orders())?
            .extension_optional(web::graphql())?;
        Ok(())
    }

    fn equals(&self, other: &dyn Any) -> bool {
        value_eq(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Found through the bundle lookup; re-registers the core bundle, which the
/// duplicate detector drops.
#[derive(Debug, PartialEq, Default)]
pub struct AdminBundle;

impl Bundle for AdminBundle {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        if bootstrap.option(ADMIN_ENABLED) {
            bootstrap.extension(web::admin())?;
        }
        bootstrap.bundle(CoreBundle)?;
        Ok(())
    }

    fn equals(&self, other: &dyn Any) -> bool {
        value_eq(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

lookup_bundle!(AdminBundle);

/// Native host bundle contributing a command.
#[derive(Debug, PartialEq, Default)]
pub struct MetricsHostBundle;

impl HostBundle for MetricsHostBundle {
    fn initialize(&self, bootstrap: &mut dyn HostBootstrap) -> anyhow::Result<()> {
        bootstrap.add_command("metrics");
        Ok(())
    }

    fn equals(&self, other: &dyn Any) -> bool {
        value_eq(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/* ---------------------------------- host ---------------------------------- */

/// Host framework stand-in: keeps registered bundles and commands.
#[derive(Default)]
pub struct DemoHost {
    name: String,
    bundles: Vec<&'static str>,
    commands: Vec<String>,
}

impl DemoHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn bundles(&self) -> &[&'static str] {
        &self.bundles
    }
}

impl HostBootstrap for DemoHost {
    fn application_name(&self) -> &str {
        &self.name
    }

    fn add_bundle(&mut self, bundle: Arc<dyn HostBundle>) -> anyhow::Result<()> {
        self.bundles.push(bundle.type_name());
        bundle.initialize(self)
    }

    fn add_command(&mut self, name: &str) {
        self.commands.push(name.to_string());
    }

    fn commands(&self) -> Vec<String> {
        self.commands.clone()
    }
}

/* ---------------------------------- setup --------------------------------- */

/// Package prefix of the scanned demo extensions.
pub fn scan_package() -> String {
    let module = std::any::type_name::<ext::CleanupJob>();
    module
        .rsplit_once("::")
        .map(|(package, _)| package.to_string())
        .unwrap_or_default()
}

/// Registers the demo application on a fresh builder.
pub fn configure(builder: &mut ExtkitBuilder, hooks: &HookRegistry) {
    hooks.register(FnHook::new("demo::ProfileHook", |builder: &mut ExtkitBuilder| {
        builder.module_override(ProfileModule { profile: "demo" });
        Ok(())
    }));

    builder.bundle(CoreBundle).hooks_from(hooks);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_package_points_at_extensions() {
        assert!(scan_package().ends_with("demo::ext"));
    }

    #[test]
    fn equal_bundles_compare_by_value() {
        assert!(CoreBundle.equals(CoreBundle.as_any()));
        assert!(!CoreBundle.equals(WebBundle.as_any()));
    }
}
