use anime_list_core::{ListQuery, SortOrder, StatusFilter};
use anime_list_sources::ServiceFactory;
use clap::{ArgAction, Parser, Subcommand};
use commands::{auth, catalog, config, gallery, list};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "animevault")]
#[command(about = "AnimeVault - Browse anime and keep your list in sync everywhere")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the AniList catalog by title
    Search {
        /// Search term (at least 2 characters)
        #[arg(required = true, num_args = 1..)]
        term: Vec<String>,
    },
    /// Show the full AniList record for one anime
    Show {
        /// AniList media id
        id: i64,
    },
    /// Top anime of the current season on MyAnimeList
    Trending {
        /// How many entries to show
        #[arg(long, default_value_t = 4)]
        limit: usize,
    },
    /// Show a MyAnimeList record
    Mal {
        /// MyAnimeList anime id
        id: i64,
    },
    /// Sign up, sign in, or sign out
    Auth {
        #[command(subcommand)]
        cmd: AuthCommands,
    },
    /// Show your list
    #[command(long_about = "Show the signed-in user's list, optionally filtered by title or status and sorted. Sort orders: recently-added (default), title-asc, title-desc, release-date.")]
    List {
        /// Only titles containing this text (romaji or English)
        #[arg(long)]
        query: Option<String>,

        /// Only entries with this status (all, releasing, finished, not-yet-released, cancelled, hiatus)
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// Sort order
        #[arg(long, default_value = "recently-added")]
        sort: SortOrder,
    },
    /// Add an AniList entry to your list
    Add {
        /// AniList media id
        id: i64,
    },
    /// Remove an entry from your list
    Remove {
        /// AniList media id
        id: i64,
    },
    /// Follow live changes to your list until interrupted
    Watch,
    /// Manage your image gallery
    Gallery {
        #[command(subcommand)]
        cmd: GalleryCommands,
    },
    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Create an account with email and password
    SignUp {
        /// Email address (if not provided, will prompt)
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign in with email and password
    SignIn {
        /// Email address (if not provided, will prompt)
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget the saved session
    SignOut,
    /// Show who is signed in
    Status,
}

#[derive(Subcommand)]
enum GalleryCommands {
    /// Upload an image file
    Upload {
        /// Path to the image
        file: PathBuf,
    },
    /// List your uploaded images, newest first
    List,
    /// Delete an uploaded image
    Delete {
        /// Image id, as shown by `gallery list`
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show {
        /// Show full values of masked settings
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let paths = commands::path_manager()?;
    let config = commands::load_config(&paths)?;

    logging::init_logging_with_file(cli.verbose, cli.quiet, config.logging.file.clone())
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);
    let factory = ServiceFactory::new(config, paths);

    match cli.command {
        Commands::Search { term } => catalog::search(&factory, &term.join(" "), &output).await,
        Commands::Show { id } => catalog::show(&factory, id, &output).await,
        Commands::Trending { limit } => catalog::trending(&factory, limit, &output).await,
        Commands::Mal { id } => catalog::mal(&factory, id, &output).await,
        Commands::Auth { cmd } => auth::run_auth(cmd, &factory, &output).await,
        Commands::List { query, status, sort } => {
            let query = ListQuery { text: query, status, sort };
            list::show_list(&factory, query, &output).await
        }
        Commands::Add { id } => list::add(&factory, id, &output).await,
        Commands::Remove { id } => list::remove(&factory, id, &output).await,
        Commands::Watch => list::watch(&factory, &output).await,
        Commands::Gallery { cmd } => gallery::run_gallery(cmd, &factory, &output).await,
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show { full: false });
            config::run_config(cmd, &factory, &output)
        }
    }
}
