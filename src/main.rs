use std::{error::Error, process, sync::Arc, time::Duration};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use reqwest::Method;
use url::Url;
use uuid::Uuid;
use veil::Redact;

use thryve::{
    client::ApiClient,
    config::Config,
    events::Event,
    navigator::ChannelNavigator,
    protocol::PageRequest,
    store::FileStore,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the Thryve backend
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url, env = "THRYVE_API_URL", default_value = "http://localhost:8080")]
    api_url: Url,

    /// Session file
    ///
    /// Holds the access and refresh tokens between runs. Keep this file
    /// private: anyone reading it can act as you until the tokens expire.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("session.toml"))]
    session_file: String,

    /// Seconds before expiry at which an access token counts as expired
    #[arg(long, value_name = "SECONDS", default_value_t = Config::DEFAULT_REFRESH_SKEW.as_secs())]
    skew: u64,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Redact, Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        email: String,

        #[arg(long, env = "THRYVE_PASSWORD", hide_env_values = true)]
        #[redact]
        password: String,
    },

    /// Remove the stored session
    Logout,

    /// Show who the stored session belongs to
    Whoami,

    /// List courses
    Courses {
        #[arg(long, default_value_t = 0)]
        page: u64,

        #[arg(long, default_value_t = 10)]
        size: u64,
    },

    /// List your notifications
    Notifications {
        #[arg(long, default_value_t = 0)]
        page: u64,

        #[arg(long, default_value_t = 10)]
        size: u64,
    },

    /// Ask to be enrolled in a course
    Enroll { course: Uuid },

    /// Fetch any API path and print the JSON response
    Get {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Logs session events until the client is dropped.
async fn watch(mut events: tokio::sync::mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = events.recv().await {
        match &event {
            Event::SessionExpired => warn!("session expired, please sign in again"),
            Event::Navigate(path) => debug!("navigated to {path}"),
            Event::LoggedIn | Event::LoggedOut => debug!("{event:?}"),
        }
    }
}

/// Runs a single command against the backend.
///
/// # Errors
///
/// This function returns an error when the session file cannot be read or
/// written, or when the backend rejects the request.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = Config::new(args.api_url)?;
    config.refresh_skew = Duration::from_secs(args.skew);

    let store = FileStore::open(&args.session_file)?;
    let (navigator, events) = ChannelNavigator::new("/");
    let watcher = tokio::spawn(watch(events));

    let client = ApiClient::new(config, Arc::new(store), Arc::new(navigator))?;
    let result = dispatch(&client, args.command).await;

    // Dropping the last client closes the event channel, which ends the
    // watcher once it has logged everything the command produced.
    drop(client);
    if let Err(e) = watcher.await {
        error!("event watcher failed: {e}");
    }

    result
}

/// Executes `command` with `client`.
async fn dispatch(client: &ApiClient, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
        }

        Command::Logout => client.logout()?,

        Command::Whoami => {
            let identity = client.session().identity();
            if !identity.is_authenticated() && client.session().store().refresh_token().is_none() {
                info!("not signed in");
                return Ok(());
            }

            let me = client.me().await?;
            let roles = client
                .session()
                .identity()
                .roles()
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            println!("{} <{}> [{roles}]", me.username, me.email);
        }

        Command::Courses { page, size } => {
            let courses = client.courses(PageRequest::new(page, size)).await?;
            for course in &courses.content {
                println!("{}  {}", course.id, course.title);
            }
            if let Some(next) = courses.next() {
                info!("more with --page {}", next.page_number);
            }
        }

        Command::Notifications { page, size } => {
            let notifications = client.notifications(PageRequest::new(page, size)).await?;
            let unread = client.unread_count().await?;
            info!("{unread} unread");
            for notification in notifications.content {
                let marker = if notification.read { ' ' } else { '*' };
                println!("{marker} {}: {}", notification.title, notification.message);
            }
        }

        Command::Enroll { course } => {
            let request = client.request_enrollment(course).await?;
            println!("{} ({})", request.course.title, request.state);
        }

        Command::Get { path } => {
            let request = client.request(Method::GET, &path)?;
            let body: serde_json::Value = client.fetch(request).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the requested command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
