use super::{OptionDescriptor, OptionKey};

const GROUP: &str = "Extkit";

fn enabled() -> bool {
    true
}

fn disabled() -> bool {
    false
}

/// Options consulted by the engine itself.
pub struct ExtkitOptions;

impl ExtkitOptions {
    /// Module path prefixes handed to the classpath scanner. Empty disables scanning.
    pub const SCAN_PACKAGES: OptionKey<Vec<String>> =
        OptionKey::new(GROUP, "ScanPackages", Vec::new);
    /// Register bundles found by the configured bundle lookup.
    pub const USE_BUNDLE_LOOKUP: OptionKey<bool> =
        OptionKey::new(GROUP, "UseBundleLookup", enabled);
    /// Route host bundles added from bundle callbacks through the context.
    pub const TRACK_HOST_BUNDLES: OptionKey<bool> =
        OptionKey::new(GROUP, "TrackHostBundles", enabled);
    /// Fail instead of ignoring duplicate instance registrations.
    pub const STRICT_DUPLICATES: OptionKey<bool> =
        OptionKey::new(GROUP, "StrictDuplicates", disabled);

    pub fn descriptors() -> Vec<OptionDescriptor> {
        vec![
            Self::SCAN_PACKAGES.descriptor(),
            Self::USE_BUNDLE_LOOKUP.descriptor(),
            Self::TRACK_HOST_BUNDLES.descriptor(),
            Self::STRICT_DUPLICATES.descriptor(),
        ]
    }
}
