//! Minimal in-process DI container.
//!
//! Bindings are keyed by type name. Singletons are created on first request
//! and cached; prototypes are created on every request. Unbound types that
//! carry a constructor are created just in time, as singletons. A type bound
//! without a constructor is only declared: requesting it fails.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::contracts::{
    Binder, BindingScope, ContainerFactory, Injector, SharedInstance,
};
use crate::types::{Constructor, TypeDescriptor};

#[derive(Clone)]
enum Provider {
    Constructor {
        constructor: Constructor,
        scope: BindingScope,
    },
    Declared(BindingScope),
    Instance(SharedInstance),
}

/// Binder side of the container; produces a [`SimpleInjector`].
#[derive(Default)]
pub struct SimpleContainer {
    bindings: IndexMap<String, Provider>,
    created: bool,
}

impl SimpleContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound type names in binding order.
    pub fn bound(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    pub fn scope_of(&self, name: &str) -> Option<BindingScope> {
        match self.bindings.get(name)? {
            Provider::Constructor { scope, .. } | Provider::Declared(scope) => Some(*scope),
            Provider::Instance(_) => Some(BindingScope::Singleton),
        }
    }
}

impl Binder for SimpleContainer {
    fn bind_type(&mut self, ty: &TypeDescriptor, scope: BindingScope) -> anyhow::Result<()> {
        let provider = match ty.constructor() {
            Some(constructor) => Provider::Constructor { constructor, scope },
            None => Provider::Declared(scope),
        };
        tracing::trace!(ty = ty.name(), ?scope, "Bound type");
        self.bindings.insert(ty.name().to_string(), provider);
        Ok(())
    }

    fn bind_instance(&mut self, name: &str, instance: SharedInstance) -> anyhow::Result<()> {
        tracing::trace!(name, "Bound instance");
        self.bindings
            .insert(name.to_string(), Provider::Instance(instance));
        Ok(())
    }

    fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

impl ContainerFactory for SimpleContainer {
    fn binder(&mut self) -> &mut dyn Binder {
        self
    }

    fn create_injector(&mut self) -> anyhow::Result<Arc<dyn Injector>> {
        if self.created {
            bail!("injector already created");
        }
        self.created = true;
        Ok(Arc::new(SimpleInjector {
            bindings: self.bindings.clone(),
            singletons: Mutex::new(HashMap::new()),
        }))
    }
}

pub struct SimpleInjector {
    bindings: IndexMap<String, Provider>,
    singletons: Mutex<HashMap<String, SharedInstance>>,
}

impl SimpleInjector {
    fn singleton(&self, name: &str, constructor: Constructor) -> SharedInstance {
        self.singletons
            .lock()
            .entry(name.to_string())
            .or_insert_with(constructor)
            .clone()
    }
}

impl Injector for SimpleInjector {
    fn instance(&self, ty: &TypeDescriptor) -> anyhow::Result<SharedInstance> {
        match self.bindings.get(ty.name()) {
            Some(Provider::Instance(instance)) => Ok(instance.clone()),
            Some(Provider::Constructor {
                constructor,
                scope: BindingScope::Singleton,
            }) => Ok(self.singleton(ty.name(), *constructor)),
            Some(Provider::Constructor {
                constructor,
                scope: BindingScope::Prototype,
            }) => Ok(constructor()),
            Some(Provider::Declared(_)) => {
                Err(anyhow!("'{}' is bound but has no constructor", ty.name()))
            }
            None => match ty.constructor() {
                Some(constructor) => Ok(self.singleton(ty.name(), constructor)),
                None => bail!("no binding for '{}'", ty.name()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter;

    #[test]
    fn singleton_is_cached_and_prototype_is_not() {
        let mut container = SimpleContainer::new();
        let single = TypeDescriptor::of::<Counter>();
        let proto = TypeDescriptor::new("test::Proto").with_constructor(|| Arc::new(Counter));
        container.bind_type(&single, BindingScope::Singleton).unwrap();
        container.bind_type(&proto, BindingScope::Prototype).unwrap();
        let injector = container.create_injector().unwrap();

        let a = injector.instance(&single).unwrap();
        let b = injector.instance(&single).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = injector.instance(&proto).unwrap();
        let d = injector.instance(&proto).unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
        assert!(a.downcast_ref::<Counter>().is_some());
    }

    #[test]
    fn declared_binding_fails_on_request() {
        let mut container = SimpleContainer::new();
        let ty = TypeDescriptor::new("test::Abstract");
        container.bind_type(&ty, BindingScope::Prototype).unwrap();
        assert!(container.is_bound("test::Abstract"));
        assert_eq!(container.scope_of("test::Abstract"), Some(BindingScope::Prototype));
        let injector = container.create_injector().unwrap();
        assert!(injector.instance(&ty).is_err());
    }

    #[test]
    fn unbound_constructible_types_resolve_just_in_time() {
        let mut container = SimpleContainer::new();
        let injector = container.create_injector().unwrap();
        assert!(injector.instance(&TypeDescriptor::of::<Counter>()).is_ok());
        assert!(injector.instance(&TypeDescriptor::new("test::Missing")).is_err());
        assert!(container.create_injector().is_err());
    }
}
