//! Classpath scanning, modelled as link-time registration.
//!
//! Types opt into scanning with [`crate::scan_candidate!`], installers with
//! [`crate::scan_installer!`]. The scanner only returns what was declared
//! inside the requested module path prefixes.

use crate::contracts::InstallerHandle;
use crate::types::{in_package, TypeDescriptor};

pub trait ClasspathScanner {
    /// Candidate extension types declared in `packages`.
    fn candidates(&self, packages: &[String]) -> Vec<TypeDescriptor>;

    /// Installers declared in `packages`.
    fn installers(&self, _packages: &[String]) -> Vec<InstallerHandle> {
        Vec::new()
    }
}

/// The function type submitted by `scan_candidate!`.
pub struct ScanEntry(pub fn() -> TypeDescriptor);

inventory::collect!(ScanEntry);

/// The function type submitted by `scan_installer!`.
pub struct ScanInstallerEntry {
    pub type_name: fn() -> &'static str,
    pub create: fn() -> InstallerHandle,
}

inventory::collect!(ScanInstallerEntry);

fn in_any(type_name: &str, packages: &[String]) -> bool {
    packages.iter().any(|p| in_package(type_name, p))
}

/// Scanner over everything declared with the scan macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryScanner;

impl ClasspathScanner for InventoryScanner {
    fn candidates(&self, packages: &[String]) -> Vec<TypeDescriptor> {
        let mut found: Vec<TypeDescriptor> = ::inventory::iter::<ScanEntry>
            .into_iter()
            .map(|entry| (entry.0)())
            .filter(|ty| in_any(ty.name(), packages))
            .collect();
        // link order is unspecified
        found.sort_by(|a, b| a.name().cmp(b.name()));
        found.dedup_by(|a, b| a.name() == b.name());
        tracing::debug!(packages = ?packages, found = found.len(), "Scanned extension candidates");
        found
    }

    fn installers(&self, packages: &[String]) -> Vec<InstallerHandle> {
        let mut entries: Vec<&ScanInstallerEntry> = ::inventory::iter::<ScanInstallerEntry>
            .into_iter()
            .filter(|entry| in_any((entry.type_name)(), packages))
            .collect();
        entries.sort_by_key(|entry| (entry.type_name)());
        entries.into_iter().map(|entry| (entry.create)()).collect()
    }
}

/// Scanner over an explicit list of descriptors and installers.
#[derive(Default)]
pub struct StaticScanner {
    candidates: Vec<TypeDescriptor>,
    installers: Vec<fn() -> InstallerHandle>,
}

impl StaticScanner {
    pub fn new(candidates: Vec<TypeDescriptor>) -> Self {
        Self {
            candidates,
            installers: Vec::new(),
        }
    }

    pub fn with_installer(mut self, create: fn() -> InstallerHandle) -> Self {
        self.installers.push(create);
        self
    }
}

impl ClasspathScanner for StaticScanner {
    fn candidates(&self, packages: &[String]) -> Vec<TypeDescriptor> {
        self.candidates
            .iter()
            .filter(|ty| in_any(ty.name(), packages))
            .cloned()
            .collect()
    }

    fn installers(&self, packages: &[String]) -> Vec<InstallerHandle> {
        self.installers
            .iter()
            .map(|create| create())
            .filter(|handle| in_any(handle.type_name(), packages))
            .collect()
    }
}

/// Declares a scan candidate: `scan_candidate!(|| TypeDescriptor::of::<Foo>())`.
#[macro_export]
macro_rules! scan_candidate {
    ($descriptor:expr) => {
        $crate::inventory::submit! {
            $crate::scanner::ScanEntry($descriptor)
        }
    };
}

/// Declares a scanned installer: `scan_installer!(MyInstaller, || InstallerHandle::of_type(MyInstaller))`.
#[macro_export]
macro_rules! scan_installer {
    ($ty:ty, $create:expr) => {
        $crate::inventory::submit! {
            $crate::scanner::ScanInstallerEntry {
                type_name: ::std::any::type_name::<$ty>,
                create: $create,
            }
        }
    };
}
