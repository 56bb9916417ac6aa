use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::bootstrap::{BundleBootstrap, BundleEnvironment};
use crate::types::TypeDescriptor;

/// Shared instance handed out by the injector.
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

/// Value equality helper for `equals` implementations.
pub fn value_eq<T: PartialEq + 'static>(this: &T, other: &dyn Any) -> bool {
    other.downcast_ref::<T>().is_some_and(|o| o == this)
}

/// Unit of composable configuration.
///
/// `initialize` may register installers, extensions, modules, options and
/// further bundles; `run` only extensions and modules.
pub trait Bundle: Send + Sync + 'static {
    fn initialize(&self, bootstrap: &mut BundleBootstrap<'_>) -> anyhow::Result<()>;

    fn run(&self, _env: &mut BundleEnvironment<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Value equality used by duplicate detection. The default only treats the
    /// very same instance as equal.
    fn equals(&self, _other: &dyn Any) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// DI module: contributes bindings before the injector is created.
pub trait Module: Send + Sync + 'static {
    fn configure(&self, binder: &mut dyn Binder) -> anyhow::Result<()>;

    fn equals(&self, _other: &dyn Any) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Native bundle of the host framework.
pub trait HostBundle: Send + Sync + 'static {
    fn initialize(&self, bootstrap: &mut dyn HostBootstrap) -> anyhow::Result<()>;

    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn equals(&self, _other: &dyn Any) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Bootstrap handle of the host framework.
pub trait HostBootstrap {
    fn application_name(&self) -> &str;

    /// Registers a native bundle; the host initializes it right away.
    fn add_bundle(&mut self, bundle: Arc<dyn HostBundle>) -> anyhow::Result<()>;

    fn add_command(&mut self, name: &str);

    fn commands(&self) -> Vec<String>;
}

/* ------------------------------ DI container ------------------------------ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingScope {
    Singleton,
    Prototype,
}

/// Configuration-time side of the DI container.
pub trait Binder {
    fn bind_type(&mut self, ty: &TypeDescriptor, scope: BindingScope) -> anyhow::Result<()>;

    fn bind_instance(&mut self, name: &str, instance: SharedInstance) -> anyhow::Result<()>;

    fn is_bound(&self, name: &str) -> bool;
}

pub trait Injector {
    fn instance(&self, ty: &TypeDescriptor) -> anyhow::Result<SharedInstance>;
}

/// Owns the binder until all bindings are in, then produces the injector.
pub trait ContainerFactory {
    fn binder(&mut self) -> &mut dyn Binder;

    fn create_injector(&mut self) -> anyhow::Result<Arc<dyn Injector>>;
}

/* ------------------------------- Installers ------------------------------- */

/// Recognizes extensions and knows how to install them.
pub trait Installer: 'static {
    fn matches(&self, ty: &TypeDescriptor) -> bool;

    /// Pipeline rank; `None` runs after every ranked installer.
    fn order(&self) -> Option<i32> {
        None
    }

    fn is_web(&self) -> bool {
        false
    }

    /// Human readable hints on how extensions are recognized.
    fn recognizable_signs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Install extensions sorted by their declared order.
    fn orders_extensions(&self) -> bool {
        false
    }

    /// Called once after all extensions were installed.
    fn report(&mut self) {}

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Issues the DI binding itself; no default binding is made for its extensions.
pub trait BindingInstaller: Installer {
    fn bind(&mut self, binder: &mut dyn Binder, ty: &TypeDescriptor) -> anyhow::Result<()>;
}

/// Receives one instance per extension, resolved through the injector.
pub trait InstanceInstaller: Installer {
    fn install(&mut self, ty: &TypeDescriptor, instance: SharedInstance) -> anyhow::Result<()>;
}

/// Receives the extension type; the pipeline binds it with default scope.
pub trait TypeInstaller: Installer {
    fn install(&mut self, ty: &TypeDescriptor) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallerStrategy {
    Binding,
    Instance,
    Type,
}

/// An installer together with its installation strategy.
pub enum InstallerHandle {
    Binding(Box<dyn BindingInstaller>),
    Instance(Box<dyn InstanceInstaller>),
    Type(Box<dyn TypeInstaller>),
}

macro_rules! with_installer {
    ($handle:expr, $i:ident => $body:expr) => {
        match $handle {
            InstallerHandle::Binding($i) => $body,
            InstallerHandle::Instance($i) => $body,
            InstallerHandle::Type($i) => $body,
        }
    };
}

impl InstallerHandle {
    pub fn binding(installer: impl BindingInstaller) -> Self {
        Self::Binding(Box::new(installer))
    }

    pub fn instance(installer: impl InstanceInstaller) -> Self {
        Self::Instance(Box::new(installer))
    }

    pub fn of_type(installer: impl TypeInstaller) -> Self {
        Self::Type(Box::new(installer))
    }

    pub fn strategy(&self) -> InstallerStrategy {
        match self {
            Self::Binding(_) => InstallerStrategy::Binding,
            Self::Instance(_) => InstallerStrategy::Instance,
            Self::Type(_) => InstallerStrategy::Type,
        }
    }

    pub fn type_name(&self) -> &'static str {
        with_installer!(self, i => i.type_name())
    }

    pub fn matches(&self, ty: &TypeDescriptor) -> bool {
        with_installer!(self, i => i.matches(ty))
    }

    pub fn order(&self) -> Option<i32> {
        with_installer!(self, i => i.order())
    }

    pub fn is_web(&self) -> bool {
        with_installer!(self, i => i.is_web())
    }

    pub fn recognizable_signs(&self) -> Vec<String> {
        with_installer!(self, i => i.recognizable_signs())
    }

    pub fn orders_extensions(&self) -> bool {
        with_installer!(self, i => i.orders_extensions())
    }

    pub fn report(&mut self) {
        with_installer!(self, i => i.report())
    }
}

impl fmt::Debug for InstallerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallerHandle")
            .field("type", &self.type_name())
            .field("strategy", &self.strategy())
            .field("order", &self.order())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl Installer for Plain {
        fn matches(&self, ty: &TypeDescriptor) -> bool {
            ty.has_marker("Plain")
        }
        fn order(&self) -> Option<i32> {
            Some(5)
        }
    }
    impl TypeInstaller for Plain {
        fn install(&mut self, _ty: &TypeDescriptor) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn handle_dispatches_to_installer() {
        let handle = InstallerHandle::of_type(Plain);
        assert_eq!(handle.strategy(), InstallerStrategy::Type);
        assert_eq!(handle.order(), Some(5));
        assert!(handle.type_name().ends_with("Plain"));
        assert!(handle.matches(&TypeDescriptor::new("x::Y").with_marker("Plain")));
        assert!(!handle.matches(&TypeDescriptor::new("x::Y")));
    }

    #[test]
    fn value_eq_requires_same_type() {
        assert!(value_eq(&5u8, &5u8));
        assert!(!value_eq(&5u8, &5u16));
        assert!(!value_eq(&5u8, &6u8));
    }
}
