use std::any::Any;
use std::env;
use std::panic;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_DIR_ENV: &str = "NM_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "NM_LOG_LEVEL";
pub const LOG_BACKTRACE_ENV: &str = "NM_LOG_INCLUDE_BACKTRACE";

/// Engine build stamped on every panic record and on the startup line.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_DIRECTIVE: &str = "info";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// How a matching service logs: who it is, where records go, what passes the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub service: &'static str,
    pub engine_version: &'static str,
    /// Daily-rotated `<service>.log` files land here; stdout otherwise.
    pub log_dir: Option<PathBuf>,
    /// Used when `RUST_LOG` is unset.
    pub default_directive: String,
    /// Also run the default panic hook, which prints the backtrace.
    pub include_backtrace: bool,
}

impl LogSettings {
    pub fn from_env(service: &'static str) -> Self {
        Self::from_lookup(service, |name| env::var(name).ok())
    }

    pub fn from_lookup(service: &'static str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            service,
            engine_version: ENGINE_VERSION,
            log_dir: non_empty(LOG_DIR_ENV).map(PathBuf::from),
            default_directive: non_empty(LOG_LEVEL_ENV)
                .map(|value| value.trim().to_string())
                .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string()),
            include_backtrace: non_empty(LOG_BACKTRACE_ENV)
                .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true")),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_directive))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
    }

    fn file_writer(&self) -> Option<BoxMakeWriter> {
        let dir = self.log_dir.as_ref()?;
        if let Err(err) = std::fs::create_dir_all(dir) {
            eprintln!(
                "{}: cannot create log dir {}: {err}; logging to stdout",
                self.service,
                dir.display()
            );
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, format!("{}.log", self.service));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        Some(BoxMakeWriter::new(non_blocking))
    }
}

/// Installs the global subscriber and the panic hook, then records which
/// service and engine build is running. Repeated calls are no-ops.
pub fn init(settings: &LogSettings) {
    let builder = tracing_subscriber::fmt().with_env_filter(settings.env_filter());
    let installed = match settings.file_writer() {
        Some(writer) => builder.with_writer(writer).try_init().is_ok(),
        None => builder.try_init().is_ok(),
    };

    install_panic_hook(settings);

    if installed {
        tracing::info!(
            service = settings.service,
            engine_version = settings.engine_version,
            log_dir = settings.log_dir.as_ref().map(|dir| dir.display().to_string()),
            "logging initialized"
        );
    }
}

fn install_panic_hook(settings: &LogSettings) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    let service = settings.service;
    let engine_version = settings.engine_version;
    let include_backtrace = settings.include_backtrace;

    INSTALLED.get_or_init(|| {
        let default_hook = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));

            tracing::error!(
                service,
                engine_version,
                thread = thread.name().unwrap_or("unnamed"),
                location = location.as_deref().unwrap_or("unknown"),
                panic_message = %panic_message(info.payload()),
                "panic in matching service"
            );

            if include_backtrace {
                default_hook(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}
