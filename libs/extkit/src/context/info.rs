use indexmap::IndexSet;
use serde::Serialize;

use crate::item::{ConfigItem, ConfigPhase, ItemId};

/// Provenance record of one configuration item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemInfo {
    pub id: ItemId,
    pub kind: ConfigItem,
    /// Scope of the first accepted registration.
    pub registration_scope: Option<ItemId>,
    /// Owners from root to the immediate owner; the application root is omitted.
    pub scope_chain: Vec<ItemId>,
    /// Distinct scopes that registered this item or a duplicate of it.
    pub registered_by: IndexSet<ItemId>,
    /// One entry per rejected repeat registration.
    pub also_attempted_by: Vec<ItemId>,
    pub registration_attempts: usize,
    /// Ids of the equal instances that were discarded.
    pub duplicates: Vec<ItemId>,
    /// `None` for items only known from a disable.
    pub phase: Option<ConfigPhase>,
    pub disabled_by: IndexSet<ItemId>,

    /// Extension: installers that recognized it, in pipeline order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub installed_by: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub lazy: bool,
    /// Bundles: position in initialization (and run) order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_order: Option<usize>,
    /// Modules: configured after all regular modules.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub overriding: bool,
}

impl ItemInfo {
    pub(crate) fn registered(
        id: ItemId,
        kind: ConfigItem,
        scope: ItemId,
        scope_chain: Vec<ItemId>,
        phase: ConfigPhase,
    ) -> Self {
        let mut registered_by = IndexSet::new();
        registered_by.insert(scope.clone());
        Self {
            id,
            kind,
            registration_scope: Some(scope),
            scope_chain,
            registered_by,
            also_attempted_by: Vec::new(),
            registration_attempts: 1,
            duplicates: Vec::new(),
            phase: Some(phase),
            disabled_by: IndexSet::new(),
            installed_by: Vec::new(),
            optional: false,
            lazy: false,
            init_order: None,
            overriding: false,
        }
    }

    pub(crate) fn disabled_only(id: ItemId, kind: ConfigItem) -> Self {
        Self {
            id,
            kind,
            registration_scope: None,
            scope_chain: Vec::new(),
            registered_by: IndexSet::new(),
            also_attempted_by: Vec::new(),
            registration_attempts: 0,
            duplicates: Vec::new(),
            phase: None,
            disabled_by: IndexSet::new(),
            installed_by: Vec::new(),
            optional: false,
            lazy: false,
            init_order: None,
            overriding: false,
        }
    }

    pub(crate) fn record_repeat(&mut self, scope: ItemId) {
        self.registration_attempts += 1;
        self.registered_by.insert(scope.clone());
        self.also_attempted_by.push(scope);
    }

    pub fn is_enabled(&self) -> bool {
        self.disabled_by.is_empty()
    }

    pub fn is_registered(&self) -> bool {
        self.registration_attempts > 0
    }

    pub fn is_duplicated(&self) -> bool {
        !self.also_attempted_by.is_empty()
    }

    /// Immediate owner, if it is not the application root.
    pub fn owner(&self) -> Option<&ItemId> {
        self.scope_chain.last()
    }
}
