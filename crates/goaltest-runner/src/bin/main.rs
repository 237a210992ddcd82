use std::path::PathBuf;

use clap::Parser;
use goaltest_runner::{backend, launch};
use goaltest_runner::{Agent, AgentOptions, Config, Device, Error, HtmlReport, DEFAULT_DEVICE, DEVICES};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "goaltest")]
#[command(about = "Goal-driven website testing with a vision model")]
#[command(version)]
struct Cli {
    /// Starting URL
    #[arg(required_unless_present = "list")]
    url: Option<String>,

    /// Goal of the test
    #[arg(required_unless_present = "list")]
    goal: Option<String>,

    /// File to write the HTML report to
    #[arg(required_unless_present = "list")]
    report: Option<PathBuf>,

    /// Browser to use (only chrome is supported)
    #[arg(short, long, default_value = "chrome")]
    browser: String,

    /// Replay the decisions recorded in a previous --store file
    #[arg(long, value_name = "FILE")]
    playback: Option<PathBuf>,

    /// Save the session to a JSON file for later --playback
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    noheadless: bool,

    /// Maximum number of steps (overrides config)
    #[arg(short, long)]
    maxsteps: Option<usize>,

    /// Show the mouse pointer in screenshots
    #[arg(short = 'M', long)]
    mouse: bool,

    /// Device to emulate
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    emulate: String,

    /// List device profiles and exit
    #[arg(short, long)]
    list: bool,

    /// YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    if cli.list {
        println!("Possible devices to emulate:");
        for device in DEVICES {
            println!("  {}", device);
        }
        return;
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the goal was achieved.
async fn run(cli: Cli) -> goaltest_runner::Result<bool> {
    let (Some(url), Some(goal), Some(report)) = (cli.url, cli.goal, cli.report) else {
        return Err(Error::Config("URL, GOAL and REPORT are required".into()));
    };
    if !cli.browser.eq_ignore_ascii_case("chrome") {
        return Err(Error::Environment(format!(
            "browser '{}' not supported, only chrome is",
            cli.browser
        )));
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.noheadless {
        config.browser.headless = false;
    }
    if let Some(max) = cli.maxsteps {
        config.agent.max_steps = max;
    }
    config.validate()?;

    let device = Device::find(&cli.emulate)?;
    let mut backend = backend::from_config(&config.model, cli.playback.as_deref())?;

    let stealth = launch::stealth_config(&config.browser, device);

    println!("Starting test run");
    println!("  URL: {}", url);
    println!("  Goal: \"{}\"", goal);
    println!("  Device: {}", device);
    println!("  Max steps: {}", config.agent.max_steps);

    let options = AgentOptions {
        max_steps: config.agent.max_steps,
        settle_ms: config.agent.settle_ms,
        jpeg_quality: config.agent.jpeg_quality,
        probe: config.agent.probe_options(),
        store: cli.store.clone(),
        browser: cli.browser.clone(),
        device: device.name.to_string(),
        show_pointer: cli.mouse,
        ..AgentOptions::new(goal, url.clone())
    };
    let agent = Agent::new(options).with_report(HtmlReport::new(report));

    let browser = goaltest_agent::Browser::launch_with_config(stealth).await?;
    let outcome = async {
        let page = launch::open_start_page(&browser, &url).await?;
        agent.run(&page, backend.as_mut()).await
    }
    .await;

    if let Err(e) = browser.close().await {
        error!("failed to close browser: {}", e);
    }

    let outcome = outcome?;
    println!();
    if outcome.achieved() {
        println!(
            "✓ Goal achieved in {} {}",
            outcome.steps,
            if outcome.steps == 1 { "step" } else { "steps" }
        );
    } else {
        println!("✗ Goal not achieved");
        println!("  Maximum number of steps ({}) reached", outcome.steps);
    }
    Ok(outcome.achieved())
}
