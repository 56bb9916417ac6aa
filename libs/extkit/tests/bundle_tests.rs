mod common;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use common::{bar, fn_bundle, foo, start, Log, Recorder, TestHost};
use extkit::{
    value_eq, Binder, Bundle, BundleBootstrap, BundleEnvironment, ConfigItem, ConfigPhase,
    ConfigScope, Disable, Extkit, ExtkitError, ExtkitOptions, HostBootstrap, HostBundle, ItemId,
    LegacyDetector, Module, SimpleContainer, StaticBundleLookup, TypeDescriptor,
};

fn installer(log: &Log) -> extkit::InstallerHandle {
    Recorder::new("InstA", "Managed", log).of_type()
}

/* ------------------------------ Nesting ------------------------------ */

struct Outer;
struct Inner;

impl Bundle for Outer {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.bundle(Inner)?;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Bundle for Inner {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.extension(foo())?;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn nested_bundles_are_attributed_to_their_parents() {
    let log = Log::default();
    let mut builder = Extkit::builder("nested");
    builder.bundle(Outer).installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();

    let outer = info.find_type(std::any::type_name::<Outer>())[0];
    let inner = info.find_type(std::any::type_name::<Inner>())[0];
    assert!(outer.scope_chain.is_empty());
    assert_eq!(inner.scope_chain, vec![outer.id.clone()]);

    let foo_info = info.find_type(foo().name())[0];
    assert_eq!(foo_info.scope_chain, vec![outer.id.clone(), inner.id.clone()]);
    assert_eq!(foo_info.owner(), Some(&inner.id));

    assert_eq!(info.bundle_init_order, vec![outer.id.clone(), inner.id.clone()]);
    assert_eq!(outer.init_order, Some(1));
    assert_eq!(inner.init_order, Some(2));
    assert!(info.is_balanced());
}

/* --------------------------- Host interception -------------------------- */

#[derive(Default)]
struct NativeB {
    log: Log,
}

impl HostBundle for NativeB {
    fn initialize(&self, bootstrap: &mut dyn HostBootstrap) -> anyhow::Result<()> {
        self.log
            .push(format!("native:init:{}", bootstrap.application_name()));
        bootstrap.add_command("migrate");
        Ok(())
    }
    fn run(&self) -> anyhow::Result<()> {
        self.log.push("native:run");
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct AddsNative {
    log: Log,
}

impl Bundle for AddsNative {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        let mut host = bootstrap.host();
        host.add_bundle(Arc::new(NativeB {
            log: self.log.clone(),
        }))?;
        self.log.push(format!("commands:{}", host.commands().join(",")));
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn host_bundles_added_through_bootstrap_are_tracked() {
    let log = Log::default();
    let mut builder = Extkit::builder("tracked");
    builder
        .bundle(AddsNative { log: log.clone() })
        .installer(installer(&log));

    let mut extkit = builder.build().unwrap();
    let mut host = TestHost::default();
    extkit.initialize(&mut host).unwrap();
    let info = extkit.run(&mut SimpleContainer::new()).unwrap();

    let parent = info.find_type(std::any::type_name::<AddsNative>())[0];
    let native = info.find_type(std::any::type_name::<NativeB>())[0];
    assert_eq!(native.kind, ConfigItem::HostBundle);
    assert_eq!(native.scope_chain, vec![parent.id.clone()]);

    // the host itself never saw the bundle; everything else passes through
    assert!(host.added.is_empty());
    assert_eq!(host.commands(), vec!["migrate"]);
    // initialized after its parent returns, like a nested bundle
    assert!(native.init_order > parent.init_order);
    assert_eq!(
        log.entries()
            .into_iter()
            .filter(|e| e.starts_with("native:") || e.starts_with("commands:"))
            .collect::<Vec<_>>(),
        vec!["commands:", "native:init:test-app", "native:run"]
    );
}

#[test]
fn host_bundles_go_to_the_host_when_tracking_is_off() {
    let log = Log::default();
    let mut builder = Extkit::builder("untracked");
    builder
        .option(ExtkitOptions::TRACK_HOST_BUNDLES, false)
        .unwrap()
        .bundle(AddsNative { log: log.clone() })
        .installer(installer(&log));

    let mut extkit = builder.build().unwrap();
    let mut host = TestHost::default();
    extkit.initialize(&mut host).unwrap();
    let info = extkit.run(&mut SimpleContainer::new()).unwrap();

    assert_eq!(host.added, vec![std::any::type_name::<NativeB>()]);
    assert!(info.find_type(std::any::type_name::<NativeB>()).is_empty());
    assert!(!log.entries().contains(&"native:run".to_string()));
}

#[test]
fn equal_host_bundles_are_initialized_once() {
    #[derive(PartialEq)]
    struct Native(u8);

    impl HostBundle for Native {
        fn initialize(&self, bootstrap: &mut dyn HostBootstrap) -> anyhow::Result<()> {
            bootstrap.add_command("native");
            Ok(())
        }
        fn equals(&self, other: &dyn Any) -> bool {
            value_eq(self, other)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let log = Log::default();
    let mut builder = Extkit::builder("native-dups");
    builder
        .bundle(fn_bundle(|b| {
            let mut host = b.host();
            host.add_bundle(Arc::new(Native(1)))?;
            host.add_bundle(Arc::new(Native(1)))?;
            host.add_bundle(Arc::new(Native(2)))?;
            Ok(())
        }))
        .installer(installer(&log));

    let mut extkit = builder.build().unwrap();
    let mut host = TestHost::default();
    extkit.initialize(&mut host).unwrap();

    assert_eq!(host.commands(), vec!["native", "native"]);
    let natives: Vec<_> = extkit
        .context()
        .infos_of(ConfigItem::HostBundle)
        .collect();
    assert_eq!(natives.len(), 2);
    assert_eq!(natives[0].also_attempted_by.len(), 1);
}

/* --------------------------- Failure handling --------------------------- */

struct CycleA;
struct CycleB;

impl Bundle for CycleA {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.bundle(CycleB)?;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Bundle for CycleB {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.bundle(CycleA)?;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn bundle_cycle_is_reported_with_path() {
    let log = Log::default();
    let mut builder = Extkit::builder("cycle");
    builder.bundle(CycleA).installer(installer(&log));
    let mut extkit = builder.build().unwrap();

    let err = extkit.initialize(&mut TestHost::default()).unwrap_err();
    let ExtkitError::BundleCycle { path } = &err else {
        panic!("unexpected error: {err}");
    };
    let a = std::any::type_name::<CycleA>().to_string();
    let b = std::any::type_name::<CycleB>().to_string();
    assert_eq!(path, &vec![a.clone(), b, a]);

    let ctx = extkit.context();
    assert!(ctx.is_idle());
    assert_eq!(ctx.scope_stats().entered, ctx.scope_stats().exited);
}

struct Failing;

impl Bundle for Failing {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.extension(foo())?;
        anyhow::bail!("database url missing")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Panicking;

impl Bundle for Panicking {
    fn initialize(&self, _bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        panic!("bundle exploded")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn failed_bundle_keeps_scopes_balanced() {
    let log = Log::default();
    let mut builder = Extkit::builder("failing");
    builder
        .bundle(fn_bundle(|b| {
            b.bundle(Failing)?;
            Ok(())
        }))
        .installer(installer(&log));
    let mut extkit = builder.build().unwrap();

    let err = extkit.initialize(&mut TestHost::default()).unwrap_err();
    match &err {
        ExtkitError::BundleInitialization { bundle, phase, source } => {
            assert_eq!(bundle, std::any::type_name::<Failing>());
            assert_eq!(*phase, "initialize");
            assert_eq!(source.to_string(), "database url missing");
        }
        other => panic!("unexpected error: {other}"),
    }
    let ctx = extkit.context();
    assert!(ctx.is_idle());
    assert_eq!(ctx.scope_stats().entered, ctx.scope_stats().exited);
}

#[test]
fn panicking_bundle_keeps_scopes_balanced() {
    let log = Log::default();
    let mut builder = Extkit::builder("panicking");
    builder
        .bundle(fn_bundle(|b| {
            b.bundle(Panicking)?;
            Ok(())
        }))
        .installer(installer(&log));
    let mut extkit = builder.build().unwrap();

    let mut host = TestHost::default();
    let outcome = catch_unwind(AssertUnwindSafe(|| extkit.initialize(&mut host)));
    assert!(outcome.is_err());

    let ctx = extkit.context();
    assert!(ctx.is_idle());
    // application root, the wrapping bundle and the panicking one
    assert_eq!(ctx.scope_stats().entered, 3);
    assert_eq!(ctx.scope_stats().exited, 3);
}

struct RunFails;

impl Bundle for RunFails {
    fn initialize(&self, _bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        Ok(())
    }
    fn run(&self, _env: &mut BundleEnvironment<'_>) -> anyhow::Result<()> {
        anyhow::bail!("port in use")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn run_failure_names_bundle_and_phase() {
    let log = Log::default();
    let mut builder = Extkit::builder("run-fails");
    builder.bundle(RunFails).installer(installer(&log));
    let err = start(builder).err().unwrap();
    assert!(matches!(err, ExtkitError::BundleInitialization { phase: "run", .. }));
}

/* ----------------------------- Duplicates ----------------------------- */

#[derive(PartialEq)]
struct Configured {
    name: &'static str,
}

impl Bundle for Configured {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.extension(foo())?;
        Ok(())
    }
    fn equals(&self, other: &dyn Any) -> bool {
        value_eq(self, other)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn equal_bundles_collapse_into_one_item() {
    let log = Log::default();
    let mut builder = Extkit::builder("dups");
    builder
        .bundle(Configured { name: "a" })
        .bundle(fn_bundle(|b| {
            b.bundle(Configured { name: "a" })?;
            b.bundle(Configured { name: "a" })?;
            Ok(())
        }))
        .bundle(Configured { name: "b" })
        .installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();

    let configured = info.find_type(std::any::type_name::<Configured>());
    assert_eq!(configured.len(), 2);
    assert_eq!(configured[0].also_attempted_by.len(), 2);
    assert_eq!(configured[0].registered_by.len(), 2);
    assert_eq!(configured[0].duplicates.len(), 2);
    assert!(!configured[1].is_duplicated());
    assert_eq!(info.ignored.len(), 2);
    assert_eq!(log.with_prefix("install:"), vec!["install:InstA:Foo"]);
}

#[test]
fn legacy_detector_keeps_first_instance_of_a_type() {
    let log = Log::default();
    let mut builder = Extkit::builder("legacy");
    builder
        .duplicate_detector(LegacyDetector)
        .bundle(Configured { name: "a" })
        .bundle(Configured { name: "b" })
        .installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();
    assert_eq!(info.find_type(std::any::type_name::<Configured>()).len(), 1);
    assert_eq!(info.bundle_init_order.len(), 1);
}

#[test]
fn strict_duplicates_fail_startup() {
    let log = Log::default();
    let mut builder = Extkit::builder("strict");
    builder
        .option(ExtkitOptions::STRICT_DUPLICATES, true)
        .unwrap()
        .bundle(Configured { name: "a" })
        .bundle(Configured { name: "a" })
        .installer(installer(&log));

    let err = start(builder).err().unwrap();
    assert!(matches!(err, ExtkitError::IllegalConfigurationState(_)));
}

/* ------------------------------ Disables ------------------------------ */

#[test]
fn disabled_bundle_is_not_initialized() {
    let log = Log::default();
    let mut builder = Extkit::builder("disabled-bundle");
    builder
        .bundle(Outer)
        .disable_bundle(std::any::type_name::<Inner>())
        .disable_module("app::NeverSeen")
        .installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();

    let inner = info.find_type(std::any::type_name::<Inner>())[0];
    assert!(!inner.is_enabled());
    assert_eq!(inner.init_order, None);
    assert!(info.find_type(foo().name()).is_empty());

    let never = info.find_type("app::NeverSeen")[0];
    assert!(!never.is_registered());
    assert_eq!(never.kind, ConfigItem::Module);
}

#[test]
fn bundles_can_disable_by_predicate() {
    let log = Log::default();
    let mut builder = Extkit::builder("predicate");
    builder
        .extension(foo())
        .extension(bar())
        .bundle(fn_bundle(|b| {
            b.disable(Disable::extension().and(Disable::type_name(std::any::type_name::<common::Bar>())))?;
            Ok(())
        }))
        .installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();
    let bar_info = info.find_type(bar().name())[0];
    let owner = &info.bundle_init_order[0];
    assert_eq!(bar_info.disabled_by.iter().collect::<Vec<_>>(), vec![owner]);
    assert_eq!(log.with_prefix("install:"), vec!["install:InstA:Foo"]);
}

#[derive(PartialEq)]
struct Registers {
    ext: &'static str,
}

impl Bundle for Registers {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.extension(TypeDescriptor::new(self.ext).with_marker("Managed"))?;
        Ok(())
    }
    fn equals(&self, other: &dyn Any) -> bool {
        value_eq(self, other)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn disable_by_owner_type_covers_every_instance() {
    let log = Log::default();
    let mut builder = Extkit::builder("owner-type");
    builder
        .bundle(Registers { ext: "app::One" })
        .bundle(Registers { ext: "app::Two" })
        .extension(foo())
        .disable(Disable::registered_by_type(std::any::type_name::<Registers>()))
        .installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();

    let owners = info.find_type(std::any::type_name::<Registers>());
    assert_eq!(owners.len(), 2);
    assert!(owners.iter().all(|o| o.is_enabled()));
    for ext in ["app::One", "app::Two"] {
        let item = info.find_type(ext)[0];
        assert!(!item.is_enabled(), "{ext} should be disabled");
        assert_eq!(item.disabled_by.len(), 1);
    }
    assert_ne!(
        info.find_type("app::One")[0].registration_scope,
        info.find_type("app::Two")[0].registration_scope
    );
    assert!(info.find_type(foo().name())[0].is_enabled());
    assert_eq!(log.with_prefix("install:"), vec!["install:InstA:Foo"]);
}

/* ---------------------------- Run phase ---------------------------- */

struct Recording {
    log: Log,
    name: &'static str,
}

impl Module for Recording {
    fn configure(&self, _binder: &mut dyn Binder) -> anyhow::Result<()> {
        self.log.push(format!("module:{}", self.name));
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Overrides {
    log: Log,
}

impl Module for Overrides {
    fn configure(&self, _binder: &mut dyn Binder) -> anyhow::Result<()> {
        self.log.push("module:override");
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct RunsModules {
    log: Log,
}

impl Bundle for RunsModules {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
        bootstrap.module_override(Overrides {
            log: self.log.clone(),
        })?;
        Ok(())
    }
    fn run(&self, env: &mut BundleEnvironment<'_>) -> anyhow::Result<()> {
        self.log.push("bundle:run");
        env.module(Recording {
            log: self.log.clone(),
            name: "from-run",
        })?;
        env.extension(bar())?;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn overriding_modules_are_configured_last() {
    let log = Log::default();
    let mut builder = Extkit::builder("modules");
    builder
        .bundle(RunsModules { log: log.clone() })
        .module(Recording {
            log: log.clone(),
            name: "root",
        })
        .installer(installer(&log));

    let (extkit, info, _) = start(builder).unwrap();

    assert_eq!(
        log.entries()
            .into_iter()
            .filter(|e| e.starts_with("module:") || e.starts_with("bundle:"))
            .collect::<Vec<_>>(),
        vec!["bundle:run", "module:root", "module:from-run", "module:override"]
    );
    let overriding: Vec<_> = info
        .items_of(ConfigItem::Module)
        .filter(|m| m.overriding)
        .collect();
    assert_eq!(overriding.len(), 1);

    let bar_info = extkit.context().info(&ItemId::of::<common::Bar>()).unwrap();
    assert_eq!(bar_info.phase, Some(ConfigPhase::Run));
    assert_eq!(log.with_prefix("install:"), vec!["install:InstA:Bar"]);
}

#[test]
fn bundle_lookup_registers_under_its_scope() {
    let log = Log::default();
    let lookup = StaticBundleLookup::new(vec![Arc::new(Inner) as Arc<dyn Bundle>]);
    let mut builder = Extkit::builder("lookup");
    builder.bundle_lookup(lookup).installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();
    let inner = info.find_type(std::any::type_name::<Inner>())[0];
    assert_eq!(
        inner.registration_scope,
        Some(ConfigScope::BundleLookup.id())
    );
    assert_eq!(log.with_prefix("install:"), vec!["install:InstA:Foo"]);
}

#[test]
fn bundle_lookup_can_be_switched_off() {
    let log = Log::default();
    let lookup = StaticBundleLookup::new(vec![Arc::new(Inner) as Arc<dyn Bundle>]);
    let mut builder = Extkit::builder("lookup-off");
    builder
        .bundle_lookup(lookup)
        .option(ExtkitOptions::USE_BUNDLE_LOOKUP, false)
        .unwrap()
        .installer(installer(&log));

    let (_, info, _) = start(builder).unwrap();
    assert!(info.find_type(std::any::type_name::<Inner>()).is_empty());
}
