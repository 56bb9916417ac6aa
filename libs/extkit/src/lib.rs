//! # ExtKit - extension discovery and configuration tracking
//!
//! ExtKit assembles an application out of nested **bundles**. Bundles register
//! installers, extensions, DI modules, options and further bundles; the engine
//! records who registered what, drops duplicate registrations and then runs a
//! two-pass installer pipeline that binds and installs every recognized
//! extension.
//!
//! ## Lifecycle
//!
//! hooks → init (root items, bundle lookup, scan, bundle walk, installers)
//! → run (bundle `run`, modules, extension binding, injector, installation)
//!
//! ## Example
//!
//! ```rust,ignore
//! use extkit::{Extkit, InstallerHandle, SimpleContainer, TypeDescriptor};
//!
//! let mut builder = Extkit::builder("orders");
//! builder
//!     .bundle(OrdersBundle::default())
//!     .installer(InstallerHandle::instance(ManagedInstaller::default()))
//!     .extension(TypeDescriptor::of::<Cleanup>().with_marker("Managed"));
//! let mut extkit = builder.build()?;
//! extkit.initialize(&mut host)?;
//! let info = extkit.run(&mut SimpleContainer::new())?;
//! assert!(info.is_balanced());
//! ```
//!
//! ## Provenance
//!
//! Every registration happens inside a configuration scope (the application
//! root, a bundle, a hook, the scanner or the bundle lookup). The resulting
//! [`ItemInfo`] keeps the owner chain, every owner that attempted the same
//! registration and the scopes that disabled the item.

pub use inventory;

pub mod bootstrap;
pub mod bundles;
pub mod context;
pub mod contracts;
pub mod di;
pub mod duplicates;
pub mod error;
pub mod hooks;
pub mod info;
pub mod installer;
pub mod instance;
pub mod item;
pub mod lifecycle;
pub mod options;
pub mod runtime;
pub mod scanner;
pub mod types;

pub use bootstrap::{BundleBootstrap, BundleEnvironment, TrackingBootstrap};
pub use bundles::{BundleLookup, InventoryBundleLookup, StaticBundleLookup};
pub use context::{
    ConfigurationContext, Disable, ItemInfo, Registrable, Registration, ScopeGuard, ScopeStats,
};
pub use contracts::{
    value_eq, Binder, BindingInstaller, BindingScope, Bundle, ContainerFactory, HostBootstrap,
    HostBundle, Injector, Installer, InstallerHandle, InstallerStrategy, InstanceInstaller,
    Module, SharedInstance, TypeInstaller,
};
pub use di::{SimpleContainer, SimpleInjector};
pub use duplicates::{DuplicateDetector, EqualityDetector, LegacyDetector, UniqueItemsDetector};
pub use error::ExtkitError;
pub use hooks::{ConfigurationHook, FnHook, HookRegistry};
pub use info::ConfigurationInfo;
pub use installer::{InstallerInfo, InstallerPipeline};
pub use instance::ItemInstance;
pub use item::{ConfigItem, ConfigPhase, ConfigScope, ItemId};
pub use lifecycle::{LifecycleEvent, LifecycleListener};
pub use options::{
    DynValue, ExtkitOptions, OptionDescriptor, OptionError, OptionId, OptionInfo, OptionKey,
    OptionStore, OptionValue, OptionsInfo, OptionsMapper,
};
pub use runtime::{Extkit, ExtkitBuilder};
pub use scanner::{ClasspathScanner, InventoryScanner, StaticScanner};
pub use types::TypeDescriptor;
