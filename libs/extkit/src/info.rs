use serde::Serialize;

use crate::context::{ItemInfo, ScopeStats};
use crate::installer::InstallerInfo;
use crate::item::{ConfigItem, ItemId};
use crate::options::OptionsInfo;

/// Read-only snapshot of a finished configuration run.
///
/// Renderers (the CLI reports, log output, tests) work from this value only.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationInfo {
    pub application: String,
    /// Every item in registration order, including items only known from a disable.
    pub items: Vec<ItemInfo>,
    /// Enabled installers in pipeline order.
    pub installers: Vec<InstallerInfo>,
    pub options: OptionsInfo,
    pub bundle_init_order: Vec<ItemId>,
    /// Discarded duplicate instances.
    pub ignored: Vec<ItemId>,
    pub scope_stats: ScopeStats,
}

impl ConfigurationInfo {
    pub fn info(&self, id: &ItemId) -> Option<&ItemInfo> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn items_of(&self, kind: ConfigItem) -> impl Iterator<Item = &ItemInfo> {
        self.items.iter().filter(move |i| i.kind == kind)
    }

    /// Registered and not disabled.
    pub fn enabled(&self, kind: ConfigItem) -> Vec<&ItemInfo> {
        self.items_of(kind)
            .filter(|i| i.is_registered() && i.is_enabled())
            .collect()
    }

    pub fn disabled(&self, kind: ConfigItem) -> Vec<&ItemInfo> {
        self.items_of(kind).filter(|i| !i.is_enabled()).collect()
    }

    /// All items of a type; several for instance items registered with different state.
    pub fn find_type(&self, type_name: &str) -> Vec<&ItemInfo> {
        self.items
            .iter()
            .filter(|i| i.id.type_name() == type_name)
            .collect()
    }

    /// Items that `scope` registered, including rejected repeats.
    pub fn registered_by<'a>(&'a self, scope: &'a ItemId) -> impl Iterator<Item = &'a ItemInfo> + 'a {
        self.items.iter().filter(move |i| i.registered_by.contains(scope))
    }

    pub fn installer(&self, type_name: &str) -> Option<&InstallerInfo> {
        self.installers.iter().find(|i| i.id.type_name() == type_name)
    }

    /// Extensions installed by the given installer, in installation order.
    pub fn extensions_of(&self, installer: &str) -> &[String] {
        self.installer(installer)
            .map(|i| i.extensions.as_slice())
            .unwrap_or_default()
    }

    pub fn is_balanced(&self) -> bool {
        self.scope_stats.entered == self.scope_stats.exited
    }
}
