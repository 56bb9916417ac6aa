//! Identity of configuration items.
//!
//! Type-registered items (installers, extensions) are identified by their
//! fully-qualified type name only. Instance-registered items (bundles, host
//! bundles, modules, hooks) also carry the address of the registered instance,
//! so two distinct instances of one type get distinct ids.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    type_name: Cow<'static, str>,
    identity: Option<usize>,
}

impl ItemId {
    /// Id of a type-registered item. Equal names give equal ids, wherever the
    /// name came from.
    pub fn of_type(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            type_name: type_name.into(),
            identity: None,
        }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::of_type(std::any::type_name::<T>())
    }

    pub fn of_instance(type_name: impl Into<Cow<'static, str>>, identity: usize) -> Self {
        Self {
            type_name: type_name.into(),
            identity: Some(identity),
        }
    }

    /// Instance id derived from the allocation behind `instance`.
    pub fn of_arc<T: ?Sized>(type_name: &'static str, instance: &Arc<T>) -> Self {
        Self::of_instance(type_name, Arc::as_ptr(instance) as *const () as usize)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn identity(&self) -> Option<usize> {
        self.identity
    }

    pub fn is_instance(&self) -> bool {
        self.identity.is_some()
    }

    /// Last path segment of the type name, generics included.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.type_name)
    }

    /// True when both ids point at the same type, regardless of identity.
    pub fn same_type(&self, other: &ItemId) -> bool {
        self.type_name == other.type_name
    }
}

/// Last path segment of a type name; generic arguments stay intact.
pub fn simple_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let start = base.rfind("::").map(|i| i + 2).unwrap_or(0);
    &type_name[start..]
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            Some(identity) => write!(f, "{}@{:x}", self.type_name, identity),
            None => f.write_str(&self.type_name),
        }
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kinds of configuration items tracked by the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigItem {
    Bundle,
    HostBundle,
    Module,
    Installer,
    Extension,
    Hook,
}

impl ConfigItem {
    /// Instance items may legitimately be registered several times with
    /// different state; type items are singletons per type.
    pub fn is_instance_config(self) -> bool {
        matches!(
            self,
            ConfigItem::Bundle | ConfigItem::HostBundle | ConfigItem::Module | ConfigItem::Hook
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfigItem::Bundle => "bundle",
            ConfigItem::HostBundle => "host bundle",
            ConfigItem::Module => "module",
            ConfigItem::Installer => "installer",
            ConfigItem::Extension => "extension",
            ConfigItem::Hook => "hook",
        }
    }
}

impl fmt::Display for ConfigItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Owners that are not items themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConfigScope {
    /// Root builder registrations.
    Application,
    /// Bundles found by a bundle lookup.
    BundleLookup,
    /// Items found by the classpath scanner.
    ClasspathScan,
    /// Registrations made by configuration hooks.
    Hook,
    /// Disables applied to optional extensions nobody recognized.
    OptionalExtensionDisabler,
}

impl ConfigScope {
    pub const ALL: [ConfigScope; 5] = [
        ConfigScope::Application,
        ConfigScope::BundleLookup,
        ConfigScope::ClasspathScan,
        ConfigScope::Hook,
        ConfigScope::OptionalExtensionDisabler,
    ];

    fn type_name(self) -> &'static str {
        match self {
            ConfigScope::Application => "extkit::scope::Application",
            ConfigScope::BundleLookup => "extkit::scope::BundleLookup",
            ConfigScope::ClasspathScan => "extkit::scope::ClasspathScan",
            ConfigScope::Hook => "extkit::scope::Hook",
            ConfigScope::OptionalExtensionDisabler => "extkit::scope::OptionalExtensionDisabler",
        }
    }

    pub fn id(self) -> ItemId {
        ItemId::of_type(self.type_name())
    }

    pub fn recognize(id: &ItemId) -> Option<ConfigScope> {
        if id.is_instance() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|scope| scope.type_name() == id.type_name())
    }
}

/// Phase during which an item was first registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigPhase {
    /// Root configuration and bundle initialization.
    Init,
    /// Bundle run callbacks.
    Run,
    /// Binding and installation around injector creation.
    Injector,
}

impl fmt::Display for ConfigPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigPhase::Init => "init",
            ConfigPhase::Run => "run",
            ConfigPhase::Injector => "injector",
        })
    }
}
