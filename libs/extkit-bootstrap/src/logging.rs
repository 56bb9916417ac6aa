//! Tracing subscriber setup driven by the `logging` config section.
//!
//! Console output is human readable on stderr; targets with a `file` get JSON
//! records written through a size-rotated file. `RUST_LOG`, when present, caps
//! both sinks.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LoggingConfig, Section};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

// Keeps the non-blocking console worker alive for the whole process.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

fn level_filter(s: &str) -> LevelFilter {
    parse_level(s).map_or(LevelFilter::OFF, LevelFilter::from_level)
}

/// `extkit` matches `extkit` and `extkit::context`, never `extkit_bootstrap`.
fn matches_target(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// ================= rotating file sinks =================

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct FileSink(Option<Rotating>);

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(file) => file.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(file) => file.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Picks the file of the longest matching target prefix, then the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<Rotating>,
    by_target: Vec<(String, Rotating)>,
}

impl FileRouter {
    fn build(cfg: &LoggingConfig, base_dir: &Path) -> Self {
        let mut router = FileRouter::default();
        for (target, section) in cfg {
            let Some(file) = open_rotating(target, section, base_dir) else {
                continue;
            };
            if target == DEFAULT_SECTION {
                router.default = Some(file);
            } else {
                router.by_target.push((target.clone(), file));
            }
        }
        router
            .by_target
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        router
    }

    fn route(&self, target: &str) -> Option<Rotating> {
        self.by_target
            .iter()
            .find(|(prefix, _)| matches_target(target, prefix))
            .map(|(_, file)| file.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_target.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = FileSink;

    fn make_writer(&'a self) -> Self::Writer {
        FileSink(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileSink(self.route(meta.target()))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating(target: &str, section: &Section, base_dir: &Path) -> Option<Rotating> {
    if section.file.trim().is_empty() {
        return None;
    }
    let path = resolve_log_path(section.file.trim(), base_dir);
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!(
                "Failed to create log directory for '{target}': {} ({e})",
                parent.display()
            );
            return None;
        }
    }

    // MaxFiles wins over age-based retention when both are configured.
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(
            i64::from(section.max_age_days.unwrap_or(1)),
        )),
    };
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) as usize * 1024 * 1024;

    let rotate = FileRotate::new(
        &path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Some(Arc::new(Mutex::new(rotate)))
}

// ================= per-sink targets =================

#[derive(Clone, Copy)]
enum Sink {
    Console,
    File,
}

fn has_file(section: &Section) -> bool {
    !section.file.trim().is_empty()
}

// An empty file level follows the console level.
fn file_level(section: &Section) -> LevelFilter {
    if section.file_level.trim().is_empty() {
        level_filter(&section.console_level)
    } else {
        level_filter(&section.file_level)
    }
}

fn build_targets(cfg: &LoggingConfig, sink: Sink) -> Targets {
    let default = cfg.get(DEFAULT_SECTION);
    let default_file = default.is_some_and(has_file);

    let default_level = match (sink, default) {
        (Sink::Console, Some(section)) => level_filter(&section.console_level),
        (Sink::Console, None) => LevelFilter::INFO,
        (Sink::File, Some(section)) if default_file => file_level(section),
        (Sink::File, _) => LevelFilter::OFF,
    };

    let mut targets = Targets::new().with_default(default_level);
    for (target, section) in cfg.iter().filter(|(t, _)| t.as_str() != DEFAULT_SECTION) {
        let level = match sink {
            Sink::Console => level_filter(&section.console_level),
            // Targets without a file of their own write to the default file, if any.
            Sink::File if has_file(section) || default_file => file_level(section),
            Sink::File => continue,
        };
        targets = targets.with_target(target.clone(), level);
    }
    targets
}

// ================= public init =================

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init_logging(cfg: Option<&LoggingConfig>, base_dir: &Path) {
    // Bridge `log` → `tracing` before installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let cfg = match cfg {
        Some(cfg) if !cfg.is_empty() => cfg,
        _ => return init_minimal(),
    };

    let env = EnvFilter::try_from_default_env().ok();

    let (stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(build_targets(cfg, Sink::Console));

    let router = FileRouter::build(cfg, base_dir);
    let file_layer = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(build_targets(cfg, Sink::File))
    });

    let _ = Registry::default()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn init_minimal() {
    let env = EnvFilter::try_from_default_env().ok();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let _ = Registry::default().with(env).with(fmt_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.to_string(),
            file: file.to_string(),
            file_level: file_level.to_string(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn test_target_prefix_matching() {
        assert!(matches_target("extkit", "extkit"));
        assert!(matches_target("extkit::installer", "extkit"));
        assert!(!matches_target("extkit_bootstrap", "extkit"));
        assert!(!matches_target("ext", "extkit"));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level("whatever"), Some(Level::INFO));
        assert_eq!(level_filter("none"), LevelFilter::OFF);
    }

    #[test]
    fn test_console_targets_follow_sections() {
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("warn", "", ""));
        cfg.insert("extkit".into(), section("trace", "", ""));

        let targets = build_targets(&cfg, Sink::Console);
        assert!(targets.would_enable("extkit::context", &Level::TRACE));
        assert!(targets.would_enable("app", &Level::WARN));
        assert!(!targets.would_enable("app", &Level::INFO));
    }

    #[test]
    fn test_file_targets_are_off_without_files() {
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "", "debug"));
        cfg.insert("extkit".into(), section("debug", "", "trace"));

        let targets = build_targets(&cfg, Sink::File);
        assert!(!targets.would_enable("extkit", &Level::ERROR));
        assert!(!targets.would_enable("app", &Level::ERROR));
    }

    #[test]
    fn test_file_router_prefers_longest_prefix() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/app.log", "debug"));
        cfg.insert("extkit".into(), section("info", "logs/extkit.log", "debug"));
        cfg.insert(
            "extkit::installer".into(),
            section("info", "logs/installer.log", "trace"),
        );

        let router = FileRouter::build(&cfg, tmp.path());
        assert!(!router.is_empty());
        assert!(tmp.path().join("logs").is_dir());

        let installer = router.route("extkit::installer").unwrap();
        let engine = router.route("extkit::context").unwrap();
        let other = router.route("app").unwrap();
        assert!(!Arc::ptr_eq(&installer, &engine));
        assert!(Arc::ptr_eq(&other, router.default.as_ref().unwrap()));

        let targets = build_targets(&cfg, Sink::File);
        assert!(targets.would_enable("extkit::installer", &Level::TRACE));
        assert!(!targets.would_enable("extkit::context", &Level::TRACE));
    }

    #[test]
    fn test_router_without_default_drops_unrouted_records() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("extkit".into(), section("info", "extkit.log", "debug"));

        let router = FileRouter::build(&cfg, tmp.path());
        assert!(router.route("app").is_none());

        let mut sink = FileSink(router.route("app"));
        assert_eq!(sink.write(b"dropped").unwrap(), 7);
    }
}
