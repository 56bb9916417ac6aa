//! Depth-first bundle walk and bundle lookup.

use std::sync::Arc;

use crate::bootstrap::{BundleBootstrap, BundleEnvironment, TrackingBootstrap};
use crate::context::ConfigurationContext;
use crate::contracts::{Bundle, HostBootstrap};
use crate::error::ExtkitError;
use crate::instance::ItemInstance;
use crate::item::ItemId;

/// Initializes the given bundles in order, each followed by the bundles it
/// registered (depth first).
pub(crate) fn initialize_bundles(
    ctx: &mut ConfigurationContext,
    host: &mut dyn HostBootstrap,
    bundles: Vec<ItemInstance>,
) -> Result<(), ExtkitError> {
    for bundle in bundles {
        initialize_bundle(ctx, host, bundle)?;
    }
    Ok(())
}

fn initialize_bundle(
    ctx: &mut ConfigurationContext,
    host: &mut dyn HostBootstrap,
    bundle: ItemInstance,
) -> Result<(), ExtkitError> {
    let id = bundle.id();
    if ctx.is_disabled(bundle.kind(), &id) {
        tracing::debug!(bundle = %id, "Bundle disabled, skipping initialization");
        return Ok(());
    }

    let type_name = bundle.type_name();
    if ctx.bundle_path().contains(&type_name) {
        let mut path: Vec<String> = ctx.bundle_path().iter().map(|t| t.to_string()).collect();
        path.push(type_name.to_string());
        return Err(ExtkitError::BundleCycle { path });
    }

    ctx.push_bundle_path(type_name);
    let result = {
        let mut scope = ctx.enter_scope(id.clone());
        scope.mark_initialized(&id);
        initialize_in_scope(&mut scope, host, &bundle)
    };
    ctx.pop_bundle_path();
    result
}

fn initialize_in_scope(
    ctx: &mut ConfigurationContext,
    host: &mut dyn HostBootstrap,
    bundle: &ItemInstance,
) -> Result<(), ExtkitError> {
    let failed = |source: anyhow::Error| ExtkitError::BundleInitialization {
        bundle: bundle.type_name().to_string(),
        phase: "initialize",
        source,
    };
    tracing::debug!(bundle = %bundle.id(), "Initializing bundle");

    let nested = match bundle {
        ItemInstance::Bundle(b) => {
            let mut bootstrap = BundleBootstrap::new(ctx, host);
            b.initialize(&mut bootstrap).map_err(failed)?;
            bootstrap.into_pending()
        }
        ItemInstance::HostBundle(b) => {
            let mut pending = Vec::new();
            let mut bootstrap = TrackingBootstrap::new(ctx, host, &mut pending, true);
            b.initialize(&mut bootstrap).map_err(failed)?;
            pending
        }
        other => {
            return Err(ExtkitError::illegal_state(format!(
                "{} '{}' can't be initialized as a bundle",
                other.kind(),
                other.id()
            )))
        }
    };

    for child in nested {
        initialize_bundle(ctx, host, child)?;
    }
    Ok(())
}

/// Runs every initialized bundle, in initialization order, under its own scope.
pub(crate) fn run_bundles(ctx: &mut ConfigurationContext) -> Result<(), ExtkitError> {
    let order: Vec<ItemId> = ctx.initialized_bundles().to_vec();
    for id in order {
        let Some(bundle) = ctx.instance(&id).cloned() else {
            continue;
        };
        let failed = |source: anyhow::Error| ExtkitError::BundleInitialization {
            bundle: bundle.type_name().to_string(),
            phase: "run",
            source,
        };
        tracing::debug!(bundle = %id, "Running bundle");

        let mut scope = ctx.enter_scope(id.clone());
        match &bundle {
            ItemInstance::Bundle(b) => {
                let mut env = BundleEnvironment::new(&mut scope);
                b.run(&mut env).map_err(failed)?;
            }
            ItemInstance::HostBundle(b) => b.run().map_err(failed)?,
            _ => {}
        }
    }
    Ok(())
}

/* ----------------------------- Bundle lookup ----------------------------- */

/// Source of bundles registered without being named by the application.
pub trait BundleLookup: Send + Sync {
    fn lookup(&self) -> Vec<Arc<dyn Bundle>>;
}

/// Link-time bundle registration collected by [`InventoryBundleLookup`].
pub struct LookupEntry(pub fn() -> Arc<dyn Bundle>);

inventory::collect!(LookupEntry);

/// Bundles declared anywhere in the binary with [`crate::lookup_bundle!`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryBundleLookup;

impl BundleLookup for InventoryBundleLookup {
    fn lookup(&self) -> Vec<Arc<dyn Bundle>> {
        inventory::iter::<LookupEntry>
            .into_iter()
            .map(|entry| (entry.0)())
            .collect()
    }
}

/// Fixed list of bundles.
#[derive(Default, Clone)]
pub struct StaticBundleLookup {
    bundles: Vec<Arc<dyn Bundle>>,
}

impl StaticBundleLookup {
    pub fn new(bundles: Vec<Arc<dyn Bundle>>) -> Self {
        Self { bundles }
    }
}

impl BundleLookup for StaticBundleLookup {
    fn lookup(&self) -> Vec<Arc<dyn Bundle>> {
        self.bundles.clone()
    }
}

/// Declares a bundle found by [`InventoryBundleLookup`].
///
/// ```ignore
/// extkit::lookup_bundle!(MetricsBundle::default());
/// ```
#[macro_export]
macro_rules! lookup_bundle {
    ($bundle:expr) => {
        $crate::inventory::submit! {
            $crate::bundles::LookupEntry(|| ::std::sync::Arc::new($bundle))
        }
    };
}
