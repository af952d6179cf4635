use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{LevelFilter, error, info, warn};
use pawtag::cache::JsonCache;
use pawtag::config::{FileConfig, Overrides, Settings};
use pawtag::tagging::{FileTagWriter, Precedence};
use pawtag::{Pipeline, PipelineOptions, RunSummary};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Directory holding the `NNN - Title.ext` files.
    pub dir: PathBuf,

    /// The playlist the files were downloaded from.
    pub playlist_url: String,

    /// Album name to use instead of the playlist title.
    #[arg(long = "album")]
    pub album: Option<String>,

    /// Maximum number of concurrent metadata fetches.
    #[arg(long = "workers", short)]
    pub workers: Option<usize>,

    #[arg(long = "no-artwork", action = clap::ArgAction::SetTrue)]
    pub no_artwork: bool,

    #[arg(long = "no-year", action = clap::ArgAction::SetTrue)]
    pub no_year: bool,

    /// Print the tags instead of writing them.
    #[arg(long = "dry-run", action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,

    #[arg(long = "cookies-from-browser", conflicts_with = "cookies")]
    pub cookies_from_browser: Option<String>,

    /// A Netscape-format cookie file.
    #[arg(long = "cookies")]
    pub cookies: Option<PathBuf>,

    /// Path to the 'yt-dlp' executable.
    #[arg(long = "yt-dlp")]
    pub yt_dlp: Option<PathBuf>,

    #[arg(long = "cache-file")]
    pub cache_file: Option<PathBuf>,

    /// Fetch metadata in batches instead of one invocation per item.
    #[arg(long = "batch", action = clap::ArgAction::SetTrue)]
    pub batch: bool,

    #[arg(long = "precedence", value_enum)]
    pub precedence: Option<Precedence>,

    #[arg(
        long = "verbosity",
        short,
        default_value = "info",
        value_parser = clap::builder::PossibleValuesParser::new([
            "info", "debug", "error", "none", "full"
        ])
    )]
    pub verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    env_logger::Builder::new()
        .filter_level(level_filter(&args.verbosity))
        .format_timestamp(None)
        .init();

    match run(args).await {
        Ok(summary) if summary.is_failure() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> pawtag::Result<RunSummary> {
    let file = FileConfig::load_default()?;
    let settings = Settings::merge(
        file,
        Overrides {
            yt_dlp: args.yt_dlp,
            workers: args.workers,
            cookies_from_browser: args.cookies_from_browser,
            cookies: args.cookies,
            cache_file: args.cache_file,
            precedence: args.precedence,
            batch: args.batch,
        },
    )?;

    let retriever = settings.retriever();
    match retriever.version().await {
        Ok(version) => info!("Using yt-dlp {}", version),
        Err(e) => warn!("Could not query the yt-dlp version: {}", e),
    }

    let pipeline = Pipeline::new(retriever, FileTagWriter)
        .with_resolver(settings.resolver())
        .with_fetcher(settings.fetcher());

    let mut options = PipelineOptions::new(args.dir, args.playlist_url);
    options.album = args.album;
    options.skip_artwork = args.no_artwork;
    options.skip_year = args.no_year;
    options.dry_run = args.dry_run;
    options.precedence = settings.precedence;

    let cache = Mutex::new(JsonCache::load(&settings.cache_file, settings.cache_ttl));
    let progress = progress_bar(args.verbosity == "none");

    let summary = pipeline
        .run(&options, &cache, |done, total| {
            progress.set_length(total as u64);
            progress.set_position(done as u64);
        })
        .await;
    progress.finish_and_clear();

    summary
}

fn progress_bar(hidden: bool) -> ProgressBar {
    let pb = ProgressBar::new(0);
    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else if let Ok(style) =
        ProgressStyle::default_bar().template("Fetching [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    pb
}

fn level_filter(verbosity: &str) -> LevelFilter {
    match verbosity {
        "none" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "debug" => LevelFilter::Debug,
        "full" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
