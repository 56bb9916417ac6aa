use indexmap::IndexMap;
use serde::Serialize;

use super::{ExtkitOptions, OptionDescriptor, OptionError, OptionId, OptionKey, OptionStore, OptionValue};

/// Where a mapped value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    Text,
    Env(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct MappedOption {
    pub option: OptionId,
    pub raw: String,
    pub source: MappingSource,
}

/// Maps textual values onto typed options.
///
/// Only options registered with the mapper can be targeted; the engine's own
/// options are known from the start. Names may be given as `Group.Name` or as
/// the bare `Name` when it is unambiguous.
pub struct OptionsMapper {
    known: IndexMap<OptionId, OptionDescriptor>,
    mapped: Vec<MappedOption>,
}

impl Default for OptionsMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsMapper {
    pub fn new() -> Self {
        let mut mapper = Self {
            known: IndexMap::new(),
            mapped: Vec::new(),
        };
        mapper.extend(ExtkitOptions::descriptors());
        mapper
    }

    pub fn register<T: OptionValue>(mut self, key: OptionKey<T>) -> Self {
        self.extend([key.descriptor()]);
        self
    }

    pub fn extend(&mut self, descriptors: impl IntoIterator<Item = OptionDescriptor>) {
        for d in descriptors {
            self.known.insert(d.id(), d);
        }
    }

    /// Exact names win; otherwise names are compared ignoring ASCII case, so
    /// lowercased keys coming from environment layers still resolve.
    pub fn resolve(&self, name: &str) -> Result<&OptionDescriptor, OptionError> {
        match self.pick(name, |id| id.matches(name))? {
            Some(d) => Ok(d),
            None => self
                .pick(name, |id| id.matches_ignore_case(name))?
                .ok_or_else(|| OptionError::UnknownOption(name.to_string())),
        }
    }

    fn pick(
        &self,
        name: &str,
        accept: impl Fn(&OptionId) -> bool,
    ) -> Result<Option<&OptionDescriptor>, OptionError> {
        let mut found = self.known.values().filter(|d| accept(&d.id()));
        match (found.next(), found.next()) {
            (Some(_), Some(_)) => Err(OptionError::UnknownOption(format!(
                "{name} (ambiguous, use Group.Name)"
            ))),
            (d, _) => Ok(d),
        }
    }

    /// Parses `raw` for the named option and stores it.
    pub fn map_str(
        &mut self,
        store: &OptionStore,
        name: &str,
        raw: &str,
    ) -> Result<OptionId, OptionError> {
        self.map(store, name, raw, MappingSource::Text)
    }

    pub fn map_all<'a>(
        &mut self,
        store: &OptionStore,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<usize, OptionError> {
        let mut count = 0;
        for (name, raw) in entries {
            self.map_str(store, name, raw)?;
            count += 1;
        }
        Ok(count)
    }

    /// Maps the environment variable `var` when it is present.
    pub fn map_env(
        &mut self,
        store: &OptionStore,
        var: &str,
        name: &str,
    ) -> Result<Option<OptionId>, OptionError> {
        match std::env::var(var) {
            Ok(raw) => self
                .map(store, name, &raw, MappingSource::Env(var.to_string()))
                .map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn mapped(&self) -> &[MappedOption] {
        &self.mapped
    }

    fn map(
        &mut self,
        store: &OptionStore,
        name: &str,
        raw: &str,
        source: MappingSource,
    ) -> Result<OptionId, OptionError> {
        let descriptor = self.resolve(name)?;
        let value = descriptor.parse(raw)?;
        let option = descriptor.id();
        store.set_dynamic(descriptor, Some(value))?;
        tracing::debug!(option = %option, ?source, "Option mapped from text");
        self.mapped.push(MappedOption {
            option,
            raw: raw.to_string(),
            source,
        });
        Ok(option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: OptionKey<u32> = OptionKey::new("App", "Limit", || 10);
    const RATIO: OptionKey<f64> = OptionKey::new("App", "Ratio", || 0.5);

    #[test]
    fn maps_builtin_and_registered_options() {
        let store = OptionStore::new();
        let mut mapper = OptionsMapper::new().register(LIMIT);

        mapper
            .map_str(&store, "Extkit.ScanPackages", "app::ext, app::web")
            .unwrap();
        mapper.map_str(&store, "Limit", "25").unwrap();

        assert_eq!(
            store.get(ExtkitOptions::SCAN_PACKAGES),
            vec!["app::ext".to_string(), "app::web".to_string()]
        );
        assert_eq!(store.get(LIMIT), 25);
        assert_eq!(mapper.mapped().len(), 2);
    }

    #[test]
    fn lowercased_names_resolve() {
        let store = OptionStore::new();
        let mut mapper = OptionsMapper::new();
        mapper.map_str(&store, "strictduplicates", "true").unwrap();
        mapper.map_str(&store, "extkit.usebundlelookup", "false").unwrap();
        assert!(store.get(ExtkitOptions::STRICT_DUPLICATES));
        assert!(!store.get(ExtkitOptions::USE_BUNDLE_LOOKUP));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let store = OptionStore::new();
        let mut mapper = OptionsMapper::new();
        let err = mapper.map_str(&store, "App.Missing", "1").unwrap_err();
        assert!(matches!(err, OptionError::UnknownOption(_)));
    }

    #[test]
    fn unparsable_value_names_option() {
        let store = OptionStore::new();
        let mut mapper = OptionsMapper::new().register(RATIO);
        let err = mapper.map_str(&store, "App.Ratio", "half").unwrap_err();
        match err {
            OptionError::Parse { option, raw, .. } => {
                assert_eq!(option, "App.Ratio");
                assert_eq!(raw, "half");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!store.is_set(RATIO.id()));
    }

    #[test]
    fn missing_env_var_maps_nothing() {
        let store = OptionStore::new();
        let mut mapper = OptionsMapper::new();
        let mapped = mapper
            .map_env(&store, "EXTKIT_TEST_SURELY_UNSET_VAR", "UseBundleLookup")
            .unwrap();
        assert!(mapped.is_none());
        assert!(mapper.mapped().is_empty());
    }
}
