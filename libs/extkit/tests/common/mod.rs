#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use extkit::{
    ConfigurationInfo, Extkit, ExtkitBuilder, ExtkitError, HostBootstrap, HostBundle, Installer,
    InstallerHandle, InstanceInstaller, SharedInstance, SimpleContainer, TypeDescriptor,
    TypeInstaller,
};

/// Shared event log written by test installers, bundles and modules.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

/// Host framework double.
#[derive(Default)]
pub struct TestHost {
    pub added: Vec<String>,
    commands: Vec<String>,
}

impl HostBootstrap for TestHost {
    fn application_name(&self) -> &str {
        "test-app"
    }

    fn add_bundle(&mut self, bundle: Arc<dyn HostBundle>) -> anyhow::Result<()> {
        self.added.push(bundle.type_name().to_string());
        bundle.initialize(self)
    }

    fn add_command(&mut self, name: &str) {
        self.commands.push(name.to_string());
    }

    fn commands(&self) -> Vec<String> {
        self.commands.clone()
    }
}

/// Installer recognizing extensions by marker; records every call.
pub struct Recorder {
    pub name: &'static str,
    pub marker: &'static str,
    pub order: Option<i32>,
    pub sorted: bool,
    pub fail_on: Option<&'static str>,
    pub log: Log,
}

impl Recorder {
    pub fn new(name: &'static str, marker: &'static str, log: &Log) -> Self {
        Self {
            name,
            marker,
            order: None,
            sorted: false,
            fail_on: None,
            log: log.clone(),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn sorted(mut self) -> Self {
        self.sorted = true;
        self
    }

    pub fn fail_on(mut self, extension: &'static str) -> Self {
        self.fail_on = Some(extension);
        self
    }

    fn record(&self, ty: &TypeDescriptor) -> anyhow::Result<()> {
        if self.fail_on == Some(ty.name()) {
            anyhow::bail!("refusing {}", ty.simple_name());
        }
        self.log.push(format!("install:{}:{}", self.name, ty.simple_name()));
        Ok(())
    }

    pub fn instance(self) -> InstallerHandle {
        InstallerHandle::instance(self)
    }

    pub fn of_type(self) -> InstallerHandle {
        InstallerHandle::of_type(self)
    }
}

impl Installer for Recorder {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        ty.has_marker(self.marker)
    }

    fn order(&self) -> Option<i32> {
        self.order
    }

    fn orders_extensions(&self) -> bool {
        self.sorted
    }

    fn recognizable_signs(&self) -> Vec<String> {
        vec![format!("has marker {}", self.marker)]
    }

    fn report(&mut self) {
        self.log.push(format!("report:{}", self.name));
    }

    fn type_name(&self) -> &'static str {
        self.name
    }
}

impl InstanceInstaller for Recorder {
    fn install(&mut self, ty: &TypeDescriptor, instance: SharedInstance) -> anyhow::Result<()> {
        self.log.push(format!(
            "instance:{}:{:p}",
            ty.simple_name(),
            Arc::as_ptr(&instance) as *const ()
        ));
        self.record(ty)
    }
}

impl TypeInstaller for Recorder {
    fn install(&mut self, ty: &TypeDescriptor) -> anyhow::Result<()> {
        self.record(ty)
    }
}

#[derive(Default)]
pub struct Foo;

#[derive(Default)]
pub struct Bar;

pub fn foo() -> TypeDescriptor {
    TypeDescriptor::of::<Foo>().with_marker("Managed")
}

pub fn bar() -> TypeDescriptor {
    TypeDescriptor::of::<Bar>().with_marker("Managed")
}

/// Bundle whose initialize and run are plain closures.
pub struct FnBundle<F> {
    pub init: F,
}

impl<F> extkit::Bundle for FnBundle<F>
where
    F: Fn(&mut extkit::BundleBootstrap<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn initialize(&self, bootstrap: &mut extkit::BundleBootstrap<'_>) -> anyhow::Result<()> {
        (self.init)(bootstrap)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn fn_bundle<F>(init: F) -> FnBundle<F>
where
    F: Fn(&mut extkit::BundleBootstrap<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    FnBundle { init }
}

/// Builds, initializes and runs in one go.
pub fn start(builder: ExtkitBuilder) -> Result<(Extkit, ConfigurationInfo, SimpleContainer), ExtkitError> {
    let mut extkit = builder.build()?;
    let mut host = TestHost::default();
    extkit.initialize(&mut host)?;
    let mut container = SimpleContainer::new();
    let info = extkit.run(&mut container)?;
    Ok((extkit, info, container))
}
