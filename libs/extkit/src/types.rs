//! Structural descriptors of candidate extension types.
//!
//! Installers never inspect types at runtime; they match against what the
//! type declares about itself here: name, marker capabilities, supertype chain
//! and a few engine-level flags.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::item::simple_name;

/// Produces a fresh instance of a described type for the bundled container.
pub type Constructor = fn() -> Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct TypeDescriptor {
    name: Cow<'static, str>,
    markers: Vec<Cow<'static, str>>,
    supertypes: Vec<Cow<'static, str>>,
    order: Option<i32>,
    lazy: bool,
    invisible_for_scanner: bool,
    constructor: Option<Constructor>,
}

fn construct_default<T: Default + Send + Sync + 'static>() -> Arc<dyn Any + Send + Sync> {
    Arc::new(T::default())
}

impl TypeDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            markers: Vec::new(),
            supertypes: Vec::new(),
            order: None,
            lazy: false,
            invisible_for_scanner: false,
            constructor: None,
        }
    }

    /// Descriptor named after `T`, constructible through `T::default()`.
    pub fn of<T: Default + Send + Sync + 'static>() -> Self {
        Self::new(std::any::type_name::<T>()).with_constructor(construct_default::<T>)
    }

    pub fn with_marker(mut self, marker: impl Into<Cow<'static, str>>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn with_supertype(mut self, supertype: impl Into<Cow<'static, str>>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// No default binding is made for the extension; the injector creates it
    /// just in time. Binding installers see the flag through [`Self::is_lazy`].
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn invisible_for_scanner(mut self) -> Self {
        self.invisible_for_scanner = true;
        self
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Module path of the type, empty for top-level names.
    pub fn package(&self) -> &str {
        let base = self.name.split('<').next().unwrap_or(&self.name);
        base.rfind("::").map(|i| &base[..i]).unwrap_or("")
    }

    pub fn in_package(&self, package: &str) -> bool {
        in_package(&self.name, package)
    }

    pub fn markers(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(|m| m.as_ref())
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }

    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.supertypes.iter().map(|s| s.as_ref())
    }

    /// True for the type itself and for every declared supertype.
    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.name == name || self.supertypes.iter().any(|s| s == name)
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn is_invisible_for_scanner(&self) -> bool {
        self.invisible_for_scanner
    }

    pub fn constructor(&self) -> Option<Constructor> {
        self.constructor
    }
}

/// Package membership by path prefix: `app::ext::Foo` is in `app` and `app::ext`.
pub fn in_package(type_name: &str, package: &str) -> bool {
    let package = package.trim_end_matches("::");
    type_name == package
        || (type_name.starts_with(package) && type_name[package.len()..].starts_with("::"))
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("markers", &self.markers)
            .field("supertypes", &self.supertypes)
            .field("order", &self.order)
            .field("lazy", &self.lazy)
            .field("invisible_for_scanner", &self.invisible_for_scanner)
            .field("constructible", &self.constructor.is_some())
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sample(u8);

    #[test]
    fn descriptor_of_type_is_constructible() {
        let d = TypeDescriptor::of::<Sample>();
        assert_eq!(d.name(), std::any::type_name::<Sample>());
        assert_eq!(d.simple_name(), "Sample");
        let ctor = d.constructor().expect("constructor");
        assert!(ctor().downcast_ref::<Sample>().is_some_and(|s| s.0 == 0));
    }

    #[test]
    fn markers_and_supertypes() {
        let d = TypeDescriptor::new("app::web::UsersResource")
            .with_marker("Resource")
            .with_supertype("app::web::BaseResource");
        assert!(d.has_marker("Resource"));
        assert!(!d.has_marker("Managed"));
        assert!(d.is_subtype_of("app::web::BaseResource"));
        assert!(d.is_subtype_of("app::web::UsersResource"));
        assert_eq!(d.package(), "app::web");
    }

    #[test]
    fn package_prefix_needs_path_boundary() {
        assert!(in_package("app::web::Foo", "app"));
        assert!(in_package("app::web::Foo", "app::web::"));
        assert!(!in_package("application::Foo", "app"));
    }

    #[test]
    fn equality_ignores_everything_but_name() {
        let a = TypeDescriptor::new("app::Foo").with_order(3);
        let b = TypeDescriptor::new("app::Foo").lazy();
        assert_eq!(a, b);
    }
}
