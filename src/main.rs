use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use proxy_sieve::{
    config::{AppConfig, DEFAULT_CONFIG_FILE},
    logging::init_logging,
    menu::{self, MenuChoice},
    ProbeStrategy, ProxyChecker, ProxyCrawler, ProxyParser,
};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{error, info};

/// A concurrent proxy validator
#[derive(Parser)]
#[command(name = "proxy-sieve")]
#[command(about = "Validate proxy lists and classify them by protocol")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive menu
    Menu,
    /// Fetch candidate proxies from the configured sources
    Scrape {
        /// File containing source URLs (one per line)
        #[arg(short, long)]
        sources: Option<PathBuf>,
        /// Where to write the scraped candidates
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Timeout in seconds for each source
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Check candidates and save the working ones
    Check {
        /// Input file containing candidates
        input: Option<PathBuf>,
        /// Output file for working proxies
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum number of concurrent classifications
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
        /// Timeout per protocol attempt in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Probe scheduling (sequential, race)
        #[arg(long)]
        strategy: Option<String>,
        /// URL to request through SOCKS candidates
        #[arg(long)]
        socks_target: Option<String>,
        /// Disable the live progress line
        #[arg(long)]
        no_progress: bool,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    init_logging(&config.log_level);

    match cli.command {
        Some(Commands::Menu) | None => run_menu(&config).await?,
        Some(Commands::Scrape {
            sources,
            output,
            timeout,
        }) => {
            if let Some(sources) = sources {
                config.files.sources = sources;
            }
            if let Some(output) = output {
                config.files.input = output;
            }
            if let Some(timeout) = timeout {
                config.scraper.timeout_secs = timeout;
            }
            scrape(&config).await?;
        }
        Some(Commands::Check {
            input,
            output,
            concurrency,
            timeout_ms,
            strategy,
            socks_target,
            no_progress,
        }) => {
            if let Some(input) = input {
                config.files.input = input;
            }
            if let Some(output) = output {
                config.files.output = output;
            }
            if let Some(concurrency) = concurrency {
                config.checker.concurrency = concurrency;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.checker.timeout_ms = timeout_ms;
            }
            if let Some(strategy) = strategy {
                config.checker.strategy = parse_strategy(&strategy)?;
            }
            if let Some(socks_target) = socks_target {
                config.checker.socks_target = socks_target;
            }
            if no_progress {
                config.checker.progress_interval_ms = 0;
            }
            check(&config).await?;
        }
        Some(Commands::InitConfig { force }) => {
            if cli.config.exists() && !force {
                bail!("{:?} already exists, use --force to overwrite", cli.config);
            }
            AppConfig::default()
                .save_to_file(&cli.config)
                .with_context(|| format!("Failed to write {:?}", cli.config))?;
            println!("Default configuration written to {:?}", cli.config);
        }
    }

    Ok(())
}

async fn run_menu(config: &AppConfig) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());

    loop {
        let choice = {
            let mut stdout = std::io::stdout();
            menu::prompt(&mut stdin, &mut stdout).await?
        };

        let outcome = match choice {
            MenuChoice::Scrape => scrape(config).await,
            MenuChoice::Check => check(config).await,
            MenuChoice::Exit => break,
        };
        if let Err(e) = outcome {
            error!("{:#}", e);
        }
    }

    info!("Bye");
    Ok(())
}

async fn scrape(config: &AppConfig) -> Result<()> {
    let sources = ProxyCrawler::load_sources(&config.files.sources)
        .with_context(|| format!("Failed to read source list {:?}", config.files.sources))?;
    if sources.is_empty() {
        bail!("No sources listed in {:?}", config.files.sources);
    }

    println!("Crawling {} sources...", sources.len());
    let crawler = ProxyCrawler::with_config(config.crawler_config())?;
    let proxies = crawler.scrape(&sources).await;

    ProxyParser::save_candidates(&proxies, &config.files.input)
        .with_context(|| format!("Failed to write {:?}", config.files.input))?;
    println!(
        "Saved {} unique proxies to {:?}",
        proxies.len(),
        config.files.input
    );
    Ok(())
}

async fn check(config: &AppConfig) -> Result<()> {
    let checker = ProxyChecker::with_config(config.checker_config())
        .context("Invalid checker configuration")?;

    println!(
        "Checking {:?} with concurrency {}, timeout {}ms",
        config.files.input, config.checker.concurrency, config.checker.timeout_ms
    );

    let summary = checker
        .check_file(&config.files.input, &config.files.output)
        .await
        .with_context(|| format!("Failed to check {:?}", config.files.input))?;

    // With progress on, the reporter has already printed the summary line
    if config.checker.progress_interval_ms == 0 {
        println!("{}", summary);
    } else if summary.unwritten > 0 {
        eprintln!("{} working proxies could not be written", summary.unwritten);
    }
    println!("Working proxies saved to {:?}", config.files.output);
    Ok(())
}

fn parse_strategy(s: &str) -> Result<ProbeStrategy> {
    match s.to_lowercase().as_str() {
        "sequential" => Ok(ProbeStrategy::Sequential),
        "race" => Ok(ProbeStrategy::Race),
        _ => Err(anyhow!(
            "Invalid strategy: {}. Use: sequential, race",
            s
        )),
    }
}
