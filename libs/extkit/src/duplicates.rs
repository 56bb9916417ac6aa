//! Duplicate detection policies for instance items.
//!
//! The context asks the detector about one pair at a time: a newly registered
//! instance against one already accepted instance of the same type. It walks
//! the accepted instances in registration order and stops at the first pair
//! reported as duplicate, which identifies the item the new registration
//! collides with.

use std::collections::HashSet;

use crate::instance::ItemInstance;

pub trait DuplicateDetector: Send + Sync {
    /// True when `candidate` repeats `registered`. Both are of the same type.
    fn is_duplicate(&self, registered: &ItemInstance, candidate: &ItemInstance) -> bool;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Default policy: the same instance or an instance declaring itself equal.
#[derive(Debug, Default, Clone, Copy)]
pub struct EqualityDetector;

impl DuplicateDetector for EqualityDetector {
    fn is_duplicate(&self, registered: &ItemInstance, candidate: &ItemInstance) -> bool {
        registered.is_same_instance(candidate) || registered.equals(candidate)
    }
}

/// One instance per type, whatever the instances look like.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyDetector;

impl DuplicateDetector for LegacyDetector {
    fn is_duplicate(&self, registered: &ItemInstance, candidate: &ItemInstance) -> bool {
        registered.type_name() == candidate.type_name()
    }
}

/// Listed types are singletons; everything else falls back to equality.
#[derive(Debug, Default, Clone)]
pub struct UniqueItemsDetector {
    unique: HashSet<String>,
}

impl UniqueItemsDetector {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with<T: ?Sized + 'static>(mut self) -> Self {
        self.unique.insert(std::any::type_name::<T>().to_string());
        self
    }

    pub fn is_unique(&self, type_name: &str) -> bool {
        self.unique.contains(type_name)
    }
}

impl DuplicateDetector for UniqueItemsDetector {
    fn is_duplicate(&self, registered: &ItemInstance, candidate: &ItemInstance) -> bool {
        if self.is_unique(candidate.type_name()) {
            return registered.type_name() == candidate.type_name();
        }
        EqualityDetector.is_duplicate(registered, candidate)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;

    use super::*;
    use crate::bootstrap::BundleBootstrap;
    use crate::contracts::{value_eq, Bundle};

    #[derive(PartialEq)]
    struct Configured(u32);

    impl Bundle for Configured {
        fn initialize(&self, _b: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
            Ok(())
        }
        fn equals(&self, other: &dyn Any) -> bool {
            value_eq(self, other)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Opaque;

    impl Bundle for Opaque {
        fn initialize(&self, _b: &mut BundleBootstrap<'_>) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn bundle(b: impl Bundle) -> ItemInstance {
        ItemInstance::Bundle(Arc::new(b))
    }

    #[test]
    fn equality_policy_allows_differently_configured_instances() {
        let first = bundle(Configured(1));
        assert!(EqualityDetector.is_duplicate(&first, &bundle(Configured(1))));
        assert!(!EqualityDetector.is_duplicate(&first, &bundle(Configured(2))));
        assert!(EqualityDetector.is_duplicate(&first, &first.clone()));
    }

    #[test]
    fn equality_policy_without_equals_accepts_new_instances() {
        let first = bundle(Opaque);
        assert!(!EqualityDetector.is_duplicate(&first, &bundle(Opaque)));
        assert!(EqualityDetector.is_duplicate(&first, &first.clone()));
    }

    #[test]
    fn legacy_policy_rejects_any_second_instance() {
        assert!(LegacyDetector.is_duplicate(&bundle(Configured(1)), &bundle(Configured(2))));
        assert!(LegacyDetector.is_duplicate(&bundle(Opaque), &bundle(Opaque)));
    }

    #[test]
    fn unique_policy_only_forces_listed_types() {
        let detector = UniqueItemsDetector::default().with::<Opaque>();
        assert!(detector.is_duplicate(&bundle(Opaque), &bundle(Opaque)));
        assert!(!detector.is_duplicate(&bundle(Configured(1)), &bundle(Configured(2))));
        assert!(detector.is_duplicate(&bundle(Configured(3)), &bundle(Configured(3))));
    }
}
