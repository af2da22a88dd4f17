use clap::Parser;
use igfinder::client::EnsemblClient;
use igfinder::logging::run_subscriber;
use igfinder::options::{
    default_user_agent, ChromosomeFilter, ExceptionPolicy, FetchOptions, IgFinderOptions,
    OutputOptions, DEFAULT_BATCH_SIZE, DEFAULT_LOG, DEFAULT_OUTPUT, DEFAULT_PLOTS_PREFIX,
    DEFAULT_SERVER, DEFAULT_STATS_PREFIX, DEFAULT_WINDOW_SIZE,
};
use igfinder::pipeline::Pipeline;
use peak_alloc::PeakAlloc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[global_allocator]
static PEAK_ALLOC: PeakAlloc = PeakAlloc;

/// Identify intronless and multi-exonic genes of a species from the Ensembl REST API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Species name as known to Ensembl, e.g. homo_sapiens.
    #[arg(long)]
    species: String,

    /// Tab-separated file of genes with an intron in their UTR; ids in the third column.
    #[arg(long)]
    utr_db: PathBuf,

    /// Output table.
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Write a statistical comparison of the two gene groups.
    #[arg(long)]
    stats: bool,

    #[arg(long, default_value = DEFAULT_STATS_PREFIX)]
    stats_prefix: String,

    /// Draw figures of the gene lengths and of their chromosomal distribution.
    #[arg(long)]
    plots: bool,

    #[arg(long, default_value = DEFAULT_PLOTS_PREFIX)]
    plots_prefix: String,

    /// Log file, written next to the terminal output.
    #[arg(long, default_value = DEFAULT_LOG)]
    log: PathBuf,

    /// List the windows and lookup batches that could not be fetched in this file.
    #[arg(long)]
    skipped_report: Option<PathBuf>,

    /// Comma-separated chromosomes to scan instead of the autosomes 1 to 22.
    #[arg(long, value_delimiter = ',', conflicts_with = "all_chromosomes")]
    chromosomes: Option<Vec<String>>,

    /// Scan every chromosome of the assembly.
    #[arg(long)]
    all_chromosomes: bool,

    /// What to do with intronless genes listed in the UTR file: reclassify or drop.
    #[arg(long, default_value_t = ExceptionPolicy::Reclassify)]
    utr_policy: ExceptionPolicy,

    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: u64,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Pause after a failed lookup batch, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    batch_delay_ms: u64,

    #[arg(long, default_value = DEFAULT_SERVER)]
    server: String,

    #[arg(long)]
    user_agent: Option<String>,

    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

impl Args {
    fn to_options(&self) -> anyhow::Result<IgFinderOptions> {
        let fetch = FetchOptions::new(self.window_size, self.batch_size)?
            .with_batch_delay(Duration::from_millis(self.batch_delay_ms))
            .with_server(&self.server)
            .with_user_agent(self.user_agent.clone().unwrap_or_else(default_user_agent))
            .with_timeout(Duration::from_secs(self.timeout_secs));

        Ok(IgFinderOptions {
            species: self.species.clone(),
            utr_db: self.utr_db.clone(),
            chromosomes: ChromosomeFilter::new(self.chromosomes.clone(), self.all_chromosomes)?,
            policy: self.utr_policy,
            fetch,
            output: OutputOptions {
                table: self.output.clone(),
                stats_prefix: self.stats.then(|| self.stats_prefix.clone()),
                plots_prefix: self.plots.then(|| self.plots_prefix.clone()),
                skipped_report: self.skipped_report.clone(),
            },
        })
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let options = args.to_options()?;
    info!(
        "Species: {}, chromosomes: {:?}, UTR policy: {}",
        options.species, options.chromosomes, options.policy
    );
    let client = EnsemblClient::new(&options.fetch)?;
    let summary = Pipeline::new(options).run(&client)?;

    if let Some(table) = &summary.table {
        info!(
            "{} intronless and {} multi-exonic genes written to {:?}",
            summary.classification.intronless, summary.classification.multi_exonic, table
        );
    }
    info!(
        "Peak memory usage was {:.3} GB",
        PEAK_ALLOC.peak_usage_as_gb()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = match run_subscriber(Some(args.log.as_path())) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Could not set up logging: {:#}", e);
            std::process::exit(1);
        }
    };

    let res = tracing::subscriber::with_default(subscriber, || {
        let res = run(&args);
        if let Err(e) = &res {
            error!("{:#}", e);
        }
        res
    });

    if res.is_err() {
        std::process::exit(1);
    }
}
