use anyhow::{Context, Result};
use extkit::{
    ConfigurationInfo, Extkit, HookRegistry, HostBootstrap, LifecycleEvent, LifecycleListener, OptionsMapper,
    SimpleContainer,
};
use extkit_bootstrap::AppConfig;

use crate::demo::{self, DemoHost};

/// Mirrors lifecycle events into the log.
struct TraceListener;

impl LifecycleListener for TraceListener {
    fn on_event(&mut self, event: &LifecycleEvent) {
        tracing::debug!(event = event.name(), details = ?event, "Lifecycle");
    }
}

/// Outcome of one boot of the demo application.
pub struct Boot {
    pub info: ConfigurationInfo,
    pub host_bundles: Vec<&'static str>,
    pub commands: Vec<String>,
}

/// Builds, initializes and runs the demo application under `config`.
pub fn boot(config: &AppConfig) -> Result<Boot> {
    let hooks = HookRegistry::new();
    let mut builder = Extkit::builder(config.application.name.clone());
    builder.listener(TraceListener);
    demo::configure(&mut builder, &hooks);

    if config.scan.enabled && config.scan.packages.is_empty() {
        builder.scan_packages([demo::scan_package()])?;
    }

    let mut mapper = OptionsMapper::new()
        .register(demo::JOB_INTERVAL)
        .register(demo::ADMIN_ENABLED);
    extkit_bootstrap::configure_builder(config, &mut builder, &mut mapper)?;

    let mut extkit = builder.build().context("configuration hooks failed")?;
    let mut host = DemoHost::new(config.application.name.clone());
    extkit
        .initialize(&mut host)
        .context("application initialization failed")?;

    let mut container = SimpleContainer::new();
    let info = extkit.run(&mut container).context("application run failed")?;

    tracing::info!(
        application = %info.application,
        bound = container.bound().len(),
        host_commands = ?host.commands(),
        "Application started"
    );

    Ok(Boot {
        info,
        host_bundles: host.bundles().to_vec(),
        commands: host.commands(),
    })
}
