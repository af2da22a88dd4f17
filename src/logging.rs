use anyhow::Context;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::field::MakeExt;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter, Registry};

/// Builds the subscriber of one run: `info` and above to stdout and, when `log_file`
/// is given, the same events without colors to that file. `RUST_LOG` overrides the
/// default level.
///
/// The subscriber is not installed globally; scope it to the run with
/// [tracing::subscriber::with_default].
///
/// ```rust
/// # use igfinder::logging::run_subscriber;
/// let dir = tempfile::tempdir().unwrap();
/// let log = dir.path().join("run.log");
/// let subscriber = run_subscriber(Some(log.as_path())).unwrap();
/// tracing::subscriber::with_default(subscriber, || tracing::info!("hello"));
/// ```
pub fn run_subscriber(log_file: Option<&Path>) -> anyhow::Result<impl Subscriber + Send + Sync> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let file_layer = match log_file {
        Some(p) => {
            if let Some(parent) = p.parent() {
                fs::create_dir_all(parent)?;
            }
            let f = File::create(p)
                .with_context(|| format!("Could not create the log file {:?}", p))?;
            // span fields are cached per formatter type, so the file needs its own
            // to stay free of the stdout colors
            let fields = fmt::format::debug_fn(|w, field, value| {
                if field.name() == "message" {
                    write!(w, "{:?}", value)
                } else {
                    write!(w, "{}={:?}", field, value)
                }
            })
            .delimited(" ");
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .fmt_fields(fields)
                    .with_writer(Mutex::new(f)),
            )
        }
        None => None,
    };

    Ok(Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stdout))
        .with(file_layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, info_span, warn};

    #[test]
    fn test_events_reach_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.txt");
        let subscriber = run_subscriber(Some(path.as_path())).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            let _span = info_span!("chromosome", name = "7").entered();
            info!("scanning");
            warn!("window skipped");
        });

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("scanning"));
        assert!(content.contains("window skipped"));
        assert!(content.contains("chromosome{name=\"7\"}"));
        assert!(!content.contains('\u{1b}'));
    }

    #[test]
    fn test_nested_span_fields_are_plain_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        let subscriber = run_subscriber(Some(path.as_path())).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            let _run = info_span!("run", species = "homo_sapiens").entered();
            let _lookup = info_span!("lookup", batches = 3).entered();
            warn!(ids = 50, "batch skipped");
        });

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains('\u{1b}'));
        assert!(content.contains("run{species=\"homo_sapiens\"}"));
        assert!(content.contains("lookup{batches=3}"));
        assert!(content.contains("batch skipped"));
        assert!(content.contains("ids=50"));
    }

    #[test]
    fn test_stdout_only() {
        let subscriber = run_subscriber(None).unwrap();
        tracing::subscriber::with_default(subscriber, || info!("no file"));
    }
}
