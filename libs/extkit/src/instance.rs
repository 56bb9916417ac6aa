use std::fmt;
use std::sync::Arc;

use crate::contracts::{Bundle, HostBundle, Module};
use crate::hooks::ConfigurationHook;
use crate::item::{ConfigItem, ItemId};

/// An instance-registered configuration item.
#[derive(Clone)]
pub enum ItemInstance {
    Bundle(Arc<dyn Bundle>),
    HostBundle(Arc<dyn HostBundle>),
    Module(Arc<dyn Module>),
    Hook(Arc<dyn ConfigurationHook>),
}

impl ItemInstance {
    pub fn kind(&self) -> ConfigItem {
        match self {
            Self::Bundle(_) => ConfigItem::Bundle,
            Self::HostBundle(_) => ConfigItem::HostBundle,
            Self::Module(_) => ConfigItem::Module,
            Self::Hook(_) => ConfigItem::Hook,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bundle(b) => b.type_name(),
            Self::HostBundle(b) => b.type_name(),
            Self::Module(m) => m.type_name(),
            Self::Hook(h) => h.type_name(),
        }
    }

    pub fn id(&self) -> ItemId {
        ItemId::of_instance(self.type_name(), self.address())
    }

    pub fn is_same_instance(&self, other: &ItemInstance) -> bool {
        self.kind() == other.kind() && self.address() == other.address()
    }

    /// Value equality as declared by the item itself.
    pub fn equals(&self, other: &ItemInstance) -> bool {
        match (self, other) {
            (Self::Bundle(a), Self::Bundle(b)) => a.equals(b.as_any()),
            (Self::HostBundle(a), Self::HostBundle(b)) => a.equals(b.as_any()),
            (Self::Module(a), Self::Module(b)) => a.equals(b.as_any()),
            _ => false,
        }
    }

    fn address(&self) -> usize {
        match self {
            Self::Bundle(b) => Arc::as_ptr(b) as *const () as usize,
            Self::HostBundle(b) => Arc::as_ptr(b) as *const () as usize,
            Self::Module(m) => Arc::as_ptr(m) as *const () as usize,
            Self::Hook(h) => Arc::as_ptr(h) as *const () as usize,
        }
    }
}

impl fmt::Debug for ItemInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.id())
    }
}
