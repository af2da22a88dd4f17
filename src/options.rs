use anyhow::{anyhow, bail};
use lazy_static::lazy_static;
use nutype::nutype;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Base URL of the public Ensembl REST service.
pub const DEFAULT_SERVER: &str = "https://rest.ensembl.org";
/// Width, in bases, of the windows a chromosome is scanned in.
pub const DEFAULT_WINDOW_SIZE: u64 = 1_000_000;
/// Number of ids resolved by a single lookup request.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Pause inserted after a failed lookup batch.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(2);
/// Per request timeout of the HTTP client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const DEFAULT_OUTPUT: &str = "genes_filtrados.tsv";
pub const DEFAULT_STATS_PREFIX: &str = "IGFinder_stats";
pub const DEFAULT_PLOTS_PREFIX: &str = "IGFinder_plots";
pub const DEFAULT_LOG: &str = "IGFinder_log.txt";

lazy_static! {
    /// Chromosomes 1 to 22. Larger or unplaced regions tend to make the service fail.
    pub static ref AUTOSOMES: Vec<String> = (1..=22).map(|i| i.to_string()).collect();
}

pub fn default_user_agent() -> String {
    format!("IGFinder/{}", env!("CARGO_PKG_VERSION"))
}

#[nutype(validate(greater = 0), derive(Debug, Clone, Copy, PartialEq, Eq, AsRef))]
/// Width of a scan window in bases. Always positive.
pub struct WindowSize(u64);

#[nutype(validate(greater = 0), derive(Debug, Clone, Copy, PartialEq, Eq, AsRef))]
/// Number of ids per lookup batch. Always positive.
pub struct BatchSize(usize);

/// Settings of the retrieval stage: where to talk to and how to slice the work.
///
/// # Fields
///
/// * `window_size`: width of the overlap windows a chromosome is scanned in.
/// * `batch_size`: number of gene ids resolved by one lookup request.
/// * `batch_delay`: pause after a failed lookup batch, so a struggling service is not hammered.
/// * `server`: base URL of the annotation service.
/// * `user_agent`: identifying user agent sent with every request.
/// * `timeout`: per request timeout.
///
/// # Examples
///
/// ```rust
/// # use igfinder::options::FetchOptions;
/// # use std::time::Duration;
/// let fo = FetchOptions::new(1_000_000, 50)
///     .unwrap()
///     .with_batch_delay(Duration::ZERO);
/// assert_eq!(fo.window_size(), 1_000_000);
/// ```
#[derive(Clone, Debug)]
pub struct FetchOptions {
    window_size: WindowSize,
    batch_size: BatchSize,
    pub batch_delay: Duration,
    pub server: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl FetchOptions {
    /// Validates the window and batch sizes and fills every other field with its default.
    pub fn new(window_size: u64, batch_size: usize) -> anyhow::Result<FetchOptions> {
        let window_size = WindowSize::try_new(window_size)
            .map_err(|e| anyhow!("Invalid window size {}: {:?}", window_size, e))?;
        let batch_size = BatchSize::try_new(batch_size)
            .map_err(|e| anyhow!("Invalid batch size {}: {:?}", batch_size, e))?;

        Ok(FetchOptions {
            window_size,
            batch_size,
            batch_delay: DEFAULT_BATCH_DELAY,
            server: String::from(DEFAULT_SERVER),
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn window_size(&self) -> u64 {
        *self.window_size.as_ref()
    }

    pub fn batch_size(&self) -> usize {
        *self.batch_size.as_ref()
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> FetchOptions {
        self.batch_delay = delay;
        self
    }

    pub fn with_server<T: ToString>(mut self, server: T) -> FetchOptions {
        self.server = server.to_string().trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_agent<T: ToString>(mut self, user_agent: T) -> FetchOptions {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> FetchOptions {
        self.timeout = timeout;
        self
    }
}

/// Which of the assembly's chromosomes a run looks at.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ChromosomeFilter {
    /// Chromosomes `1` to `22`.
    #[default]
    Autosomes,
    /// An explicit list, scanned in the given order.
    Named(Vec<String>),
    /// Every region whose coordinate system is `chromosome`.
    All,
}

impl ChromosomeFilter {
    /// Builds a filter from the optional command line list. An empty list is rejected
    /// because it would make the run a silent no-op.
    pub fn new(names: Option<Vec<String>>, all: bool) -> anyhow::Result<ChromosomeFilter> {
        match (names, all) {
            (Some(_), true) => {
                bail!("A chromosome list and the all-chromosomes flag cannot be used together.")
            }
            (Some(names), false) => {
                let mut seen = std::collections::HashSet::new();
                let names: Vec<String> = names
                    .into_iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .filter(|n| seen.insert(n.clone()))
                    .collect();
                if names.is_empty() {
                    bail!("The provided chromosome list is empty.")
                }
                Ok(ChromosomeFilter::Named(names))
            }
            (None, true) => {
                warn!("Scanning every chromosome of the assembly. Very large or unusual regions may fail upstream.");
                Ok(ChromosomeFilter::All)
            }
            (None, false) => Ok(ChromosomeFilter::Autosomes),
        }
    }

    /// The requested names, in scan order, or `None` when every chromosome is wanted.
    pub fn names(&self) -> Option<&[String]> {
        match self {
            ChromosomeFilter::Autosomes => Some(AUTOSOMES.as_slice()),
            ChromosomeFilter::Named(v) => Some(v.as_slice()),
            ChromosomeFilter::All => None,
        }
    }
}

/// What happens to a structurally intronless gene listed in the UTR exception set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExceptionPolicy {
    /// Report it as multi-exonic.
    #[default]
    Reclassify,
    /// Leave it out of the table.
    Drop,
}

impl std::str::FromStr for ExceptionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<ExceptionPolicy> {
        match s.to_lowercase().as_str() {
            "reclassify" => Ok(ExceptionPolicy::Reclassify),
            "drop" => Ok(ExceptionPolicy::Drop),
            _ => bail!("Cannot parse the UTR exception policy {:?}; expected `reclassify` or `drop`.", s),
        }
    }
}

impl std::fmt::Display for ExceptionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExceptionPolicy::Reclassify => write!(f, "reclassify"),
            ExceptionPolicy::Drop => write!(f, "drop"),
        }
    }
}

/// Where the artifacts of a run go. `None` disables the optional ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputOptions {
    pub table: PathBuf,
    pub stats_prefix: Option<String>,
    pub plots_prefix: Option<String>,
    pub skipped_report: Option<PathBuf>,
}

impl Default for OutputOptions {
    fn default() -> OutputOptions {
        OutputOptions {
            table: PathBuf::from(DEFAULT_OUTPUT),
            stats_prefix: None,
            plots_prefix: None,
            skipped_report: None,
        }
    }
}

/// Everything one run needs.
#[derive(Clone, Debug)]
pub struct IgFinderOptions {
    pub species: String,
    pub utr_db: PathBuf,
    pub chromosomes: ChromosomeFilter,
    pub policy: ExceptionPolicy,
    pub fetch: FetchOptions,
    pub output: OutputOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_options_validation() {
        let fo = FetchOptions::new(DEFAULT_WINDOW_SIZE, DEFAULT_BATCH_SIZE).unwrap();
        assert_eq!(fo.window_size(), 1_000_000);
        assert_eq!(fo.batch_size(), 50);
        assert_eq!(fo.batch_delay, Duration::from_secs(2));
        assert_eq!(fo.server, "https://rest.ensembl.org");
        assert!(fo.user_agent.starts_with("IGFinder/"));

        assert!(FetchOptions::new(0, 50).is_err());
        assert!(FetchOptions::new(10, 0).is_err());
    }

    #[test]
    fn test_with_server_strips_trailing_slash() {
        let fo = FetchOptions::new(10, 10)
            .unwrap()
            .with_server("http://localhost:8080/");
        assert_eq!(fo.server, "http://localhost:8080");
    }

    #[test]
    fn test_chromosome_filter() {
        let f = ChromosomeFilter::new(None, false).unwrap();
        assert_eq!(f, ChromosomeFilter::Autosomes);
        let names = f.names().unwrap();
        assert_eq!(names.len(), 22);
        assert_eq!(names[0], "1");
        assert_eq!(names[21], "22");

        let f = ChromosomeFilter::new(
            Some(vec![" X".to_string(), "1".to_string(), "X".to_string()]),
            false,
        )
        .unwrap();
        assert_eq!(f.names().unwrap(), &["X".to_string(), "1".to_string()]);

        assert_eq!(ChromosomeFilter::new(None, true).unwrap().names(), None);
        assert!(ChromosomeFilter::new(Some(vec!["1".to_string()]), true).is_err());
        assert!(ChromosomeFilter::new(Some(vec![" ".to_string()]), false).is_err());
    }

    #[test]
    fn test_exception_policy_parse() {
        assert_eq!(
            "Reclassify".parse::<ExceptionPolicy>().unwrap(),
            ExceptionPolicy::Reclassify
        );
        assert_eq!("drop".parse::<ExceptionPolicy>().unwrap(), ExceptionPolicy::Drop);
        assert!("keep".parse::<ExceptionPolicy>().is_err());
        assert_eq!(ExceptionPolicy::default().to_string(), "reclassify");
    }
}
