//! Typed, lazily materialized option store with usage tracking.
//!
//! Keys are declared as constants of [`OptionKey<T>`]; the value type is part
//! of the key, so typed reads and writes are checked at compile time. Values
//! arriving without static type information (config files, environment) go
//! through [`OptionStore::set_dynamic`], which checks them at runtime.
//!
//! Every holder remembers whether its value was ever read (`used`) and whether
//! it was overridden (`set`). Both flags are sticky.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use thiserror::Error;

mod builtin;
pub mod mapper;

pub use builtin::ExtkitOptions;
pub use mapper::OptionsMapper;

#[derive(Debug, Error)]
pub enum OptionError {
    #[error("invalid value for option '{option}': expected {expected}, got {actual}")]
    InvalidOptionValue {
        option: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("option '{option}' was never read or written")]
    OptionNotUsed { option: String },
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("can't parse '{raw}' for option '{option}': {reason}")]
    Parse {
        option: String,
        raw: String,
        reason: String,
    },
}

/// Value types usable behind an [`OptionKey`].
pub trait OptionValue: Clone + fmt::Debug + Serialize + Send + Sync + 'static {
    /// Converts a raw textual value (config file, environment variable).
    fn parse_option(raw: &str) -> Result<Self, String>;
}

impl OptionValue for bool {
    fn parse_option(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(format!("expected 'true' or 'false', got '{other}'")),
        }
    }
}

impl OptionValue for String {
    fn parse_option(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

macro_rules! numeric_option_value {
    ($($ty:ty),*) => {$(
        impl OptionValue for $ty {
            fn parse_option(raw: &str) -> Result<Self, String> {
                raw.trim().parse::<$ty>().map_err(|e| e.to_string())
            }
        }
    )*};
}

numeric_option_value!(i32, i64, u32, u64, usize, f64);

/// Comma separated list; blank elements are skipped.
impl<T: OptionValue> OptionValue for Vec<T> {
    fn parse_option(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(T::parse_option)
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId {
    group: &'static str,
    name: &'static str,
}

impl OptionId {
    pub fn group(&self) -> &'static str {
        self.group
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Matches both `Group.Name` and the bare `Name`.
    pub fn matches(&self, raw: &str) -> bool {
        raw == self.name
            || raw
                .split_once('.')
                .is_some_and(|(g, n)| g == self.group && n == self.name)
    }

    pub fn matches_ignore_case(&self, raw: &str) -> bool {
        raw.eq_ignore_ascii_case(self.name)
            || raw.split_once('.').is_some_and(|(g, n)| {
                g.eq_ignore_ascii_case(self.group) && n.eq_ignore_ascii_case(self.name)
            })
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

impl fmt::Debug for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for OptionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Declared option: group, name, value type and default.
pub struct OptionKey<T> {
    group: &'static str,
    name: &'static str,
    default: fn() -> T,
}

impl<T> Clone for OptionKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OptionKey<T> {}

impl<T> fmt::Debug for OptionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionKey({}.{})", self.group, self.name)
    }
}

impl<T: OptionValue> OptionKey<T> {
    pub const fn new(group: &'static str, name: &'static str, default: fn() -> T) -> Self {
        Self {
            group,
            name,
            default,
        }
    }

    pub fn id(&self) -> OptionId {
        OptionId {
            group: self.group,
            name: self.name,
        }
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }

    /// Type-erased view of the key, used for runtime-typed access.
    pub fn descriptor(&self) -> OptionDescriptor {
        let default = self.default;
        OptionDescriptor {
            id: self.id(),
            value_type: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            default: Arc::new(move || DynValue::new(default())),
            parse: parse_erased::<T>,
            render: render_erased::<T>,
        }
    }
}

fn parse_erased<T: OptionValue>(raw: &str) -> Result<DynValue, String> {
    T::parse_option(raw).map(DynValue::new)
}

fn render_erased<T: OptionValue>(value: &dyn Any) -> serde_json::Value {
    value
        .downcast_ref::<T>()
        .and_then(|v| serde_json::to_value(v).ok())
        .unwrap_or(serde_json::Value::Null)
}

/// A value with its runtime type attached.
pub struct DynValue {
    type_name: &'static str,
    type_id: TypeId,
    value: Box<dyn Any + Send + Sync>,
}

impl DynValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            value: Box::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DynValue({})", self.type_name)
    }
}

#[derive(Clone)]
pub struct OptionDescriptor {
    id: OptionId,
    value_type: &'static str,
    type_id: TypeId,
    default: Arc<dyn Fn() -> DynValue + Send + Sync>,
    parse: fn(&str) -> Result<DynValue, String>,
    render: fn(&dyn Any) -> serde_json::Value,
}

impl OptionDescriptor {
    pub fn id(&self) -> OptionId {
        self.id
    }

    pub fn value_type(&self) -> &'static str {
        self.value_type
    }

    pub fn parse(&self, raw: &str) -> Result<DynValue, OptionError> {
        (self.parse)(raw).map_err(|reason| OptionError::Parse {
            option: self.id.to_string(),
            raw: raw.to_string(),
            reason,
        })
    }
}

impl fmt::Debug for OptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionDescriptor")
            .field("id", &self.id)
            .field("value_type", &self.value_type)
            .finish()
    }
}

struct Holder {
    descriptor: OptionDescriptor,
    default: DynValue,
    value: Option<DynValue>,
    used: bool,
    set: bool,
}

impl Holder {
    fn new(descriptor: &OptionDescriptor) -> Self {
        Self {
            default: (descriptor.default)(),
            descriptor: descriptor.clone(),
            value: None,
            used: false,
            set: false,
        }
    }

    fn current(&self) -> &DynValue {
        self.value.as_ref().unwrap_or(&self.default)
    }

    fn info(&self) -> OptionInfo {
        let render = self.descriptor.render;
        OptionInfo {
            option: self.descriptor.id,
            value_type: self.descriptor.value_type,
            default: render(&*self.default.value),
            value: render(&*self.current().value),
            used: self.used,
            set: self.set,
        }
    }
}

/// Reporting view of one option holder.
#[derive(Debug, Clone, Serialize)]
pub struct OptionInfo {
    pub option: OptionId,
    pub value_type: &'static str,
    pub default: serde_json::Value,
    pub value: serde_json::Value,
    pub used: bool,
    pub set: bool,
}

impl OptionInfo {
    /// Overridden but never consulted: most likely a misconfiguration.
    pub fn is_set_but_unused(&self) -> bool {
        self.set && !self.used
    }
}

/// Snapshot of all materialized options, ordered by group then name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct OptionsInfo {
    options: Vec<OptionInfo>,
}

impl OptionsInfo {
    pub fn all(&self) -> &[OptionInfo] {
        &self.options
    }

    pub fn groups(&self) -> Vec<&'static str> {
        let mut groups: Vec<_> = self.options.iter().map(|o| o.option.group()).collect();
        groups.dedup();
        groups
    }

    pub fn in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a OptionInfo> + 'a {
        self.options
            .iter()
            .filter(move |o| o.option.group() == group)
    }

    pub fn find(&self, raw: &str) -> Option<&OptionInfo> {
        self.options.iter().find(|o| o.option.matches(raw))
    }

    pub fn set_but_unused(&self) -> impl Iterator<Item = &OptionInfo> {
        self.options.iter().filter(|o| o.is_set_but_unused())
    }
}

/// Option holders of one configuration run.
#[derive(Default)]
pub struct OptionStore {
    holders: Mutex<IndexMap<OptionId, Holder>>,
}

impl OptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the value. Marks the option as set, not as used.
    pub fn set<T: OptionValue>(&self, key: OptionKey<T>, value: T) -> Result<(), OptionError> {
        self.set_dynamic(&key.descriptor(), Some(DynValue::new(value)))
    }

    /// Runtime-typed override. `None` and values of a foreign type are rejected.
    pub fn set_dynamic(
        &self,
        option: &OptionDescriptor,
        value: Option<DynValue>,
    ) -> Result<(), OptionError> {
        let invalid = |actual: &'static str| OptionError::InvalidOptionValue {
            option: option.id.to_string(),
            expected: option.value_type,
            actual,
        };
        let value = value.ok_or_else(|| invalid("null"))?;
        if value.type_id != option.type_id {
            return Err(invalid(value.type_name));
        }

        let mut holders = self.holders.lock();
        let holder = holders
            .entry(option.id)
            .or_insert_with(|| Holder::new(option));
        if holder.descriptor.type_id != option.type_id {
            // two keys declared with the same group and name
            return Err(OptionError::InvalidOptionValue {
                option: option.id.to_string(),
                expected: holder.descriptor.value_type,
                actual: value.type_name,
            });
        }
        holder.value = Some(value);
        holder.set = true;
        tracing::debug!(option = %option.id, "Option value overridden");
        Ok(())
    }

    /// Current value (default unless overridden). Marks the option as used.
    pub fn get<T: OptionValue>(&self, key: OptionKey<T>) -> T {
        let mut holders = self.holders.lock();
        let holder = holders
            .entry(key.id())
            .or_insert_with(|| Holder::new(&key.descriptor()));
        holder.used = true;
        match holder.current().downcast_ref::<T>() {
            Some(value) => value.clone(),
            None => {
                tracing::warn!(
                    option = %key.id(),
                    declared = holder.descriptor.value_type,
                    requested = std::any::type_name::<T>(),
                    "Option declared twice with different types; using key default"
                );
                key.default_value()
            }
        }
    }

    pub fn describe(&self, option: OptionId) -> Result<OptionInfo, OptionError> {
        self.holders
            .lock()
            .get(&option)
            .map(Holder::info)
            .ok_or_else(|| OptionError::OptionNotUsed {
                option: option.to_string(),
            })
    }

    /// True once the option was read or written.
    pub fn knows_option(&self, option: OptionId) -> bool {
        self.holders.lock().contains_key(&option)
    }

    pub fn is_used(&self, option: OptionId) -> bool {
        self.holders.lock().get(&option).is_some_and(|h| h.used)
    }

    pub fn is_set(&self, option: OptionId) -> bool {
        self.holders.lock().get(&option).is_some_and(|h| h.set)
    }

    pub fn snapshot(&self) -> OptionsInfo {
        let mut options: Vec<OptionInfo> = self.holders.lock().values().map(Holder::info).collect();
        options.sort_by_key(|o| o.option);
        OptionsInfo { options }
    }
}

impl fmt::Debug for OptionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<OptionId> = self.holders.lock().keys().copied().collect();
        f.debug_struct("OptionStore").field("options", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETRIES: OptionKey<i32> = OptionKey::new("Test", "Retries", || 3);
    const NAME: OptionKey<String> = OptionKey::new("Test", "Name", String::new);
    const TAGS: OptionKey<Vec<String>> = OptionKey::new("Test", "Tags", Vec::new);

    #[test]
    fn get_before_set_returns_default_and_marks_used() {
        let store = OptionStore::new();
        assert!(!store.knows_option(RETRIES.id()));

        assert_eq!(store.get(RETRIES), 3);
        let info = store.describe(RETRIES.id()).unwrap();
        assert!(info.used);
        assert!(!info.set);
        assert_eq!(info.value, serde_json::json!(3));
    }

    #[test]
    fn set_then_get_round_trip() {
        let store = OptionStore::new();
        store.set(RETRIES, 7).unwrap();
        assert!(store.is_set(RETRIES.id()));
        assert!(!store.is_used(RETRIES.id()));

        assert_eq!(store.get(RETRIES), 7);
        let info = store.describe(RETRIES.id()).unwrap();
        assert!(info.used && info.set);
        assert_eq!(info.default, serde_json::json!(3));
    }

    #[test]
    fn flags_are_sticky() {
        let store = OptionStore::new();
        store.get(NAME);
        store.set(NAME, "x".into()).unwrap();
        store.set(NAME, String::new()).unwrap();
        let info = store.describe(NAME.id()).unwrap();
        assert!(info.used && info.set);
    }

    #[test]
    fn wrong_runtime_type_is_rejected() {
        let store = OptionStore::new();
        let err = store
            .set_dynamic(&RETRIES.descriptor(), Some(DynValue::new("42")))
            .unwrap_err();
        match err {
            OptionError::InvalidOptionValue {
                option,
                expected,
                actual,
            } => {
                assert_eq!(option, "Test.Retries");
                assert_eq!(expected, "i32");
                assert_eq!(actual, "&str");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!store.knows_option(RETRIES.id()));
    }

    #[test]
    fn null_value_is_rejected() {
        let store = OptionStore::new();
        let err = store.set_dynamic(&NAME.descriptor(), None).unwrap_err();
        assert!(matches!(err, OptionError::InvalidOptionValue { actual: "null", .. }));
    }

    #[test]
    fn describe_untouched_option_fails() {
        let store = OptionStore::new();
        let err = store.describe(TAGS.id()).unwrap_err();
        assert!(matches!(err, OptionError::OptionNotUsed { .. }));
    }

    #[test]
    fn list_values_parse_comma_separated() {
        assert_eq!(
            Vec::<String>::parse_option(" a, b ,,c ").unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(Vec::<i32>::parse_option("1,2").unwrap(), vec![1, 2]);
        assert!(bool::parse_option("yes").is_err());
        assert!(bool::parse_option(" TRUE ").unwrap());
    }

    #[test]
    fn snapshot_reports_set_but_unused() {
        let store = OptionStore::new();
        store.set(TAGS, vec!["a".into()]).unwrap();
        store.get(RETRIES);

        let snapshot = store.snapshot();
        let unused: Vec<_> = snapshot.set_but_unused().map(|o| o.option).collect();
        assert_eq!(unused, vec![TAGS.id()]);
        assert_eq!(snapshot.groups(), vec!["Test"]);
        assert!(snapshot.find("Test.Tags").is_some());
        assert!(snapshot.find("Retries").is_some());
    }
}
