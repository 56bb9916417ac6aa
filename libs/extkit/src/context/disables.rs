use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::info::ItemInfo;
use crate::item::{ConfigItem, ConfigScope, ItemId};
use crate::types::in_package;

/// Predicate disabling every item it matches.
#[derive(Clone)]
pub struct Disable {
    label: String,
    predicate: Arc<dyn Fn(&ItemInfo) -> bool + Send + Sync>,
}

impl Disable {
    pub fn new(
        label: impl Into<String>,
        predicate: impl Fn(&ItemInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, info: &ItemInfo) -> bool {
        (self.predicate)(info)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Items whose first registration happened in `scope`.
    pub fn registered_by(scope: ItemId) -> Self {
        Self::new(format!("registered by {scope}"), move |info| {
            info.registration_scope.as_ref() == Some(&scope)
        })
    }

    /// Items registered by any instance of the given owner type.
    pub fn registered_by_type(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::new(format!("registered by {type_name}"), move |info| {
            info.registration_scope
                .as_ref()
                .is_some_and(|s| s.type_name() == type_name)
        })
    }

    pub fn scope(scope: ConfigScope) -> Self {
        Self::registered_by(scope.id())
    }

    pub fn kind(kind: ConfigItem) -> Self {
        Self::new(format!("any {kind}"), move |info| info.kind == kind)
    }

    pub fn installer() -> Self {
        Self::kind(ConfigItem::Installer)
    }

    pub fn extension() -> Self {
        Self::kind(ConfigItem::Extension)
    }

    pub fn bundle() -> Self {
        Self::kind(ConfigItem::Bundle)
    }

    pub fn module() -> Self {
        Self::kind(ConfigItem::Module)
    }

    pub fn type_name(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::new(format!("type {type_name}"), move |info| {
            info.id.type_name() == type_name
        })
    }

    pub fn in_package(package: impl Into<String>) -> Self {
        let package = package.into();
        Self::new(format!("in package {package}"), move |info| {
            in_package(info.id.type_name(), &package)
        })
    }

    pub fn and(self, other: Disable) -> Self {
        let label = format!("({} and {})", self.label, other.label);
        Self::new(label, move |info| self.matches(info) && other.matches(info))
    }

    pub fn or(self, other: Disable) -> Self {
        let label = format!("({} or {})", self.label, other.label);
        Self::new(label, move |info| self.matches(info) || other.matches(info))
    }

    pub fn negate(self) -> Self {
        let label = format!("not {}", self.label);
        Self::new(label, move |info| !self.matches(info))
    }
}

impl fmt::Debug for Disable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Disable({})", self.label)
    }
}

/// Disables collected during configuration, with the scope that issued each.
#[derive(Default)]
pub(crate) struct DisableStore {
    by_type: IndexMap<(ConfigItem, String), IndexSet<ItemId>>,
    predicates: Vec<(ItemId, Disable)>,
}

impl DisableStore {
    pub(crate) fn add_type(&mut self, kind: ConfigItem, type_name: String, scope: ItemId) {
        self.by_type
            .entry((kind, type_name))
            .or_default()
            .insert(scope);
    }

    pub(crate) fn add_predicate(&mut self, scope: ItemId, disable: Disable) {
        self.predicates.push((scope, disable));
    }

    pub(crate) fn is_type_disabled(&self, kind: ConfigItem, type_name: &str) -> bool {
        self.by_type.contains_key(&(kind, type_name.to_string()))
    }

    /// Scopes disabling `info`, type disables first.
    pub(crate) fn disabled_by(&self, info: &ItemInfo) -> IndexSet<ItemId> {
        let mut scopes = self
            .by_type
            .get(&(info.kind, info.id.type_name().to_string()))
            .cloned()
            .unwrap_or_default();
        for (scope, disable) in &self.predicates {
            if disable.matches(info) {
                scopes.insert(scope.clone());
            }
        }
        scopes
    }

    pub(crate) fn disabled_types(&self) -> impl Iterator<Item = (ConfigItem, &str)> {
        self.by_type.keys().map(|(kind, name)| (*kind, name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ConfigPhase;

    fn info(kind: ConfigItem, name: &'static str, scope: ItemId) -> ItemInfo {
        ItemInfo::registered(ItemId::of_type(name), kind, scope, Vec::new(), ConfigPhase::Init)
    }

    #[test]
    fn predicates_compose() {
        let scan = ConfigScope::ClasspathScan.id();
        let ext = info(ConfigItem::Extension, "app::web::Users", scan.clone());
        let inst = info(ConfigItem::Installer, "app::web::Installer", scan);

        let disable = Disable::extension().and(Disable::in_package("app::web"));
        assert!(disable.matches(&ext));
        assert!(!disable.matches(&inst));
        assert!(Disable::extension().negate().matches(&inst));
        assert!(Disable::scope(ConfigScope::ClasspathScan).matches(&inst));
        assert_eq!(
            disable.label(),
            "(any extension and in package app::web)"
        );
    }

    #[test]
    fn store_collects_scopes() {
        let app = ConfigScope::Application.id();
        let bundle = ItemId::of_instance("app::Bundle", 1);
        let mut store = DisableStore::default();
        store.add_type(ConfigItem::Extension, "app::Foo".into(), app.clone());
        store.add_predicate(bundle.clone(), Disable::type_name("app::Foo"));

        let foo = info(ConfigItem::Extension, "app::Foo", app.clone());
        let scopes: Vec<_> = store.disabled_by(&foo).into_iter().collect();
        assert_eq!(scopes, vec![app, bundle]);
        assert!(store.is_type_disabled(ConfigItem::Extension, "app::Foo"));
        assert!(!store.is_type_disabled(ConfigItem::Installer, "app::Foo"));
    }
}
