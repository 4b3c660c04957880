use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use crate::calendar::{self, MonthYear};
use crate::config::{self, AutofillConfig};
use crate::credentials::Credentials;
use crate::entropy::TimeInterval;
use crate::error::AutofillError;
use crate::fill::{self, FillOutcome, FillSettings};
use crate::notice::{Notice, NoticeKind};
use crate::reconcile::{self, MissingDateSet};
use crate::remote::ApiClient;
use crate::session::{CredentialSource, Session};
use crate::transport::Transport;

#[derive(Parser)]
#[command(name = "kenjo-autofill", version)]
pub struct Cli {
    /// Config file (default: <config_dir>/kenjo-autofill/config.json).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List past working days that have no attendance record.
    Scan(ScanArgs),
    /// Create attendance records for the given (or all missing) days.
    Fill(FillArgs),
    Config(ConfigArgs),
}

#[derive(Args, Clone, Debug, Default)]
struct SourceArgs {
    /// Read credentials from a storage export instead of a browser.
    #[arg(long, value_name = "PATH")]
    storage_file: Option<PathBuf>,
    /// Browser profile directory.
    #[arg(long, value_name = "DIR", conflicts_with = "storage_file")]
    profile: Option<PathBuf>,
    /// How long to wait for the app to reveal credentials.
    #[arg(long, value_name = "SECS")]
    wait_secs: Option<u64>,
}

impl SourceArgs {
    fn source(&self) -> CredentialSource {
        match &self.storage_file {
            Some(path) => CredentialSource::StorageFile(path.clone()),
            None => CredentialSource::Browser {
                profile: self.profile.clone(),
            },
        }
    }

    fn wait(&self, config: &AutofillConfig) -> Duration {
        self.wait_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.credential_wait())
    }
}

#[derive(Args, Clone, Debug, Default)]
struct PeriodArgs {
    /// Month 1-12 (default: current month).
    #[arg(long)]
    month: Option<u32>,
    /// Year (default: current year).
    #[arg(long)]
    year: Option<i32>,
}

impl PeriodArgs {
    fn resolve(&self, today: chrono::NaiveDate) -> Result<MonthYear, AutofillError> {
        let current = MonthYear::containing(today);
        MonthYear::new(
            self.month.unwrap_or(current.month()),
            self.year.unwrap_or(current.year()),
        )
    }
}

#[derive(Args)]
struct ScanArgs {
    #[command(flatten)]
    period: PeriodArgs,
    #[command(flatten)]
    source: SourceArgs,
    /// Print the result as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct FillArgs {
    #[command(flatten)]
    period: PeriodArgs,
    #[command(flatten)]
    source: SourceArgs,
    /// Day to fill; repeat for several. Default: every missing day of the month.
    #[arg(long = "date", value_name = "YYYY-MM-DD", action = clap::ArgAction::Append)]
    dates: Vec<String>,
    /// Interval to record per day; repeat for several. Default: configured intervals.
    #[arg(
        long = "interval",
        value_name = "HH:MM-HH:MM",
        value_parser = parse_interval,
        action = clap::ArgAction::Append
    )]
    intervals: Vec<TimeInterval>,
    /// Print the entries that would be created and stop.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the config file location.
    Path,
    /// Print the effective config.
    Show,
    /// Write a config file with the defaults.
    Init(ConfigInitArgs),
}

#[derive(Args)]
struct ConfigInitArgs {
    #[arg(long, default_value_t = false)]
    force: bool,
}

fn parse_interval(value: &str) -> Result<TimeInterval, AutofillError> {
    value.parse()
}

pub fn run() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    match cli.command {
        Commands::Scan(args) => run_scan(&config_path, args),
        Commands::Fill(args) => run_fill(&config_path, args),
        Commands::Config(args) => run_config(&config_path, args),
    }
}

/// Print an error as the terminal notice of the run.
pub fn report_error(err: &(dyn Error + 'static)) {
    match err.downcast_ref::<AutofillError>() {
        Some(err) => eprintln!("{}", Notice::failed(err)),
        None => eprintln!(
            "{}",
            Notice {
                kind: NoticeKind::Error,
                title: "Error".to_string(),
                message: err.to_string(),
            }
        ),
    }
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn load_config(path: &std::path::Path) -> Result<AutofillConfig, AutofillError> {
    let config = config::read_config(path);
    config.validate()?;
    Ok(config)
}

fn run_scan(config_path: &std::path::Path, args: ScanArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(config_path)?;
    let period = args.period.resolve(today())?;

    let rt = tokio::runtime::Runtime::new()?;
    let missing = rt.block_on(scan_with_session(&config, &args.source, period))?;

    if args.json {
        let days = missing.display_dates();
        let json = serde_json::json!({
            "month": period.month(),
            "year": period.year(),
            "missing": days,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for day in missing.display_dates() {
            println!("{day}");
        }
    }
    eprintln!("{}", Notice::scanned(&missing));
    Ok(())
}

async fn scan_with_session(
    config: &AutofillConfig,
    source: &SourceArgs,
    period: MonthYear,
) -> Result<MissingDateSet, AutofillError> {
    let session = Session::open(config, &source.source()).await?;
    let result = scan_in_session(&session, config, source, period).await;
    session.close().await;
    result
}

async fn scan_in_session(
    session: &Session,
    config: &AutofillConfig,
    source: &SourceArgs,
    period: MonthYear,
) -> Result<MissingDateSet, AutofillError> {
    let credentials = session.credentials(source.wait(config)).await?;
    let client = session.client(config)?;
    reconcile::scan(&client, Some(&credentials), period, today()).await
}

fn run_fill(config_path: &std::path::Path, args: FillArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(config_path)?;
    let period = args.period.resolve(today())?;
    let intervals = if args.intervals.is_empty() {
        config.intervals.clone()
    } else {
        args.intervals.clone()
    };
    let dates = args
        .dates
        .iter()
        .map(|d| calendar::normalize_day(d))
        .collect::<Result<Vec<_>, _>>()?;
    let settings = FillSettings {
        entropy: config.entropy,
        delay: config.request_delay(),
    };
    let mut rng = StdRng::from_os_rng();

    // Explicit dates need no browser for a dry run.
    if args.dry_run && !dates.is_empty() {
        print_plan(&dates, &intervals, &settings, &mut rng)?;
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(fill_with_session(
        &config,
        &args,
        period,
        dates,
        &intervals,
        &settings,
        &mut rng,
    ))?;

    if let Some(outcome) = outcome {
        eprintln!("{}", Notice::filled(&outcome));
    }
    Ok(())
}

/// Returns `None` when nothing was submitted: a dry run, or no missing days.
async fn fill_with_session(
    config: &AutofillConfig,
    args: &FillArgs,
    period: MonthYear,
    dates: Vec<String>,
    intervals: &[TimeInterval],
    settings: &FillSettings,
    rng: &mut StdRng,
) -> Result<Option<FillOutcome>, AutofillError> {
    let session = Session::open(config, &args.source.source()).await?;
    let result = fill_in_session(
        &session, config, args, period, dates, intervals, settings, rng,
    )
    .await;
    session.close().await;
    result
}

#[allow(clippy::too_many_arguments)]
async fn fill_in_session(
    session: &Session,
    config: &AutofillConfig,
    args: &FillArgs,
    period: MonthYear,
    dates: Vec<String>,
    intervals: &[TimeInterval],
    settings: &FillSettings,
    rng: &mut StdRng,
) -> Result<Option<FillOutcome>, AutofillError> {
    let credentials = session.credentials(args.source.wait(config)).await?;
    let client = session.client(config)?;

    let Some(dates) = dates_to_fill(&client, &credentials, period, dates, today()).await? else {
        return Ok(None);
    };

    if args.dry_run {
        print_plan(&dates, intervals, settings, rng)?;
        return Ok(None);
    }

    let outcome = fill::fill(
        &client,
        Some(&credentials),
        &dates,
        intervals,
        settings,
        rng,
        |progress| eprintln!("{progress}"),
    )
    .await?;
    Ok(Some(outcome))
}

/// The explicit dates, or every missing day of `period`. `None` when the
/// scan finds nothing left to fill.
async fn dates_to_fill<T: Transport>(
    client: &ApiClient<T>,
    credentials: &Credentials,
    period: MonthYear,
    explicit: Vec<String>,
    today: chrono::NaiveDate,
) -> Result<Option<Vec<String>>, AutofillError> {
    if !explicit.is_empty() {
        return Ok(Some(explicit));
    }
    let missing = reconcile::scan(client, Some(credentials), period, today).await?;
    eprintln!("{}", Notice::scanned(&missing));
    if missing.is_empty() {
        return Ok(None);
    }
    Ok(Some(missing.dates))
}

fn print_plan(
    dates: &[String],
    intervals: &[TimeInterval],
    settings: &FillSettings,
    rng: &mut StdRng,
) -> Result<(), AutofillError> {
    for task in fill::plan(dates, intervals, &settings.entropy, rng)? {
        println!("{task}");
    }
    Ok(())
}

fn run_config(config_path: &std::path::Path, args: ConfigArgs) -> Result<(), Box<dyn Error>> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config_path.display());
            Ok(())
        }
        ConfigCommand::Show => {
            let config = config::read_config(config_path);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommand::Init(init) => {
            if config_path.exists() && !init.force {
                return Err(AutofillError::Config(format!(
                    "'{}' already exists; pass --force to overwrite",
                    config_path.display()
                ))
                .into());
            }
            config::write_config(config_path, &AutofillConfig::default())?;
            println!("{}", config_path.display());
            Ok(())
        }
    }
}
