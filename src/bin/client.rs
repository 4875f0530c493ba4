use std::{io, path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cloud_storage_client::{
    config::{Config, LoggingConfig},
    format::{file_icon, folder_icon, format_bytes, format_date},
    fs::{cache::FileListingCache, http::HttpSource, order::sort_entries, FetchError, ListingEntry},
    preferences::{PreferencesStore, SortBy, SortOrder, ViewMode},
    read_input,
    router::{guard, PendingRedirect, Route},
    storage::{FileStore, KeyValueStore, JWT_KEY},
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const GRID_COLUMNS: usize = 4;

/// Browse a remote cloud storage from the terminal
#[derive(Parser, Debug)]
#[command(name = "client", version)]
struct Cli {
    /// Path to a config.toml, instead of the one in the user config directory
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session token
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the session token
    Logout,
    /// Print the listing of a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Skip the cache
        #[arg(long)]
        refresh: bool,
    },
    /// Browse interactively, starting at a directory
    Browse {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show or change the view preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    Show,
    /// grid or list
    View { mode: ViewMode },
    /// name, mod_time or size
    SortBy { key: SortBy },
    /// asc or desc
    SortOrder { order: SortOrder },
    ToggleOrder,
    Name { name: String },
}

type Browser = FileListingCache<HttpSource, FileStore, PendingRedirect>;

struct Session {
    store: Arc<FileStore>,
    redirect: Arc<PendingRedirect>,
    browser: Browser,
    prefs: PreferencesStore<FileStore>,
}

impl Session {
    fn open(config: &Config) -> Result<Self, anyhow::Error> {
        let store = Arc::new(
            FileStore::open(&config.storage.path).context("Failed to open the local store")?,
        );
        let redirect = Arc::new(PendingRedirect::new());
        let source = HttpSource::new(&config.server.base_url, config.server.timeout())
            .context("Failed to set up the HTTP client")?;

        Ok(Session {
            browser: FileListingCache::new(source, store.clone(), redirect.clone()),
            prefs: PreferencesStore::load(store.clone()),
            store,
            redirect,
        })
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

async fn prompt(text: &'static str) -> Result<String, anyhow::Error> {
    Ok(tokio::task::spawn_blocking(move || read_input(Some(text))).await??)
}

fn ask_for_command_selection<S: AsRef<str>>(commands: &[S]) -> Result<usize, io::Error> {
    let options = commands.iter()
        .enumerate()
        .map(|(idx, command)| format!("{} - {}\n", idx + 1, command.as_ref()))
        .collect::<Vec<String>>()
        .concat();

    loop {
        println!("Commands:\n{options}");

        match read_input(Some("Select a command: "))?
            .trim()
            .parse::<usize>()
        {
            Ok(number) if number >= 1 && number <= commands.len() => break Ok(number),
            _ => println!("Invalid selection, please try again!\n")
        }
    }
}

async fn select<S: AsRef<str> + Send + 'static>(commands: Vec<S>) -> Result<usize, anyhow::Error> {
    Ok(tokio::task::spawn_blocking(move || ask_for_command_selection(&commands)).await??)
}

async fn login(session: &Session, username: Option<String>) -> Result<(), anyhow::Error> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ").await?,
    };
    let password = prompt("Password: ").await?;

    match session.browser.source().login(username.trim(), &password).await {
        Ok(token) => {
            session.store.set(JWT_KEY, &token).context("Failed to store the session token")?;
            info!(username = username.trim(), "logged in");
            println!("Logged in as {}\n", username.trim());
            Ok(())
        }
        Err(FetchError::Unauthenticated { .. }) => bail!("Invalid credentials"),
        Err(err) => Err(err).context("Login failed"),
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn parent_path(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent.to_owned(),
        _ => "/".to_owned(),
    }
}

fn sorted_views(session: &Session) -> (Vec<ListingEntry>, Vec<ListingEntry>) {
    let (sort_by, sort_order) = (session.prefs.sort_by(), session.prefs.sort_order());
    let mut folders = session.browser.folders();
    let mut files = session.browser.files();
    sort_entries(&mut folders, sort_by, sort_order);
    sort_entries(&mut files, sort_by, sort_order);
    (folders, files)
}

fn render(session: &Session) {
    println!("{}", session.browser.current_path());

    if let Some(error) = session.browser.error() {
        println!("Error: {error}\n");
        return;
    }

    let (folders, files) = sorted_views(session);
    if folders.is_empty() && files.is_empty() {
        println!("(empty)\n");
        return;
    }

    match session.prefs.view_mode() {
        ViewMode::List => {
            let rows = folders.iter()
                .map(|folder| format!("[{}] {}/\n", folder_icon(), folder.name))
                .chain(files.iter().map(|file| format!("[{}] {}\t\t{}\t{}\n",
                    file_icon(&file.name),
                    file.name,
                    format_bytes(file.size),
                    file.mod_time.as_deref().and_then(format_date).unwrap_or_else(|| "-".to_owned())
                )))
                .collect::<Vec<String>>()
                .concat();
            println!("{rows}");
        }
        ViewMode::Grid => {
            let cells: Vec<String> = folders.iter()
                .map(|folder| format!("{}/", folder.name))
                .chain(files.iter().map(|file| file.name.clone()))
                .collect();
            for row in cells.chunks(GRID_COLUMNS) {
                println!("{}", row.iter().map(|cell| format!("{cell:<24}")).collect::<String>());
            }
            println!();
        }
    }
}

/// Fetch `path` and, if the server asked for a login, log in and try once more
async fn show(session: &Session, path: &str, refresh: bool) -> Result<(), anyhow::Error> {
    for attempt in 0..2 {
        let result = if refresh {
            session.browser.refresh_files(path).await
        } else {
            session.browser.fetch_files(path).await
        };

        if let Err(err) = &result {
            debug!(path, error = %err, attempt, "fetch failed");
        }

        match session.redirect.take() {
            Some(Route::Login) if attempt == 0 => {
                println!("Your session has expired, please log in again.\n");
                login(session, None).await?;
            }
            _ => return Ok(()),
        }
    }
    Ok(())
}

async fn browse(mut session: Session, start: String) -> Result<(), anyhow::Error> {
    let commands = vec![
        "Open Folder", "Up", "Refresh", "Toggle Sort Order", "Sort By", "View Mode", "Clear Cache", "Exit",
    ];

    show(&session, &start, false).await?;
    render(&session);

    loop {
        let current = session.browser.current_path();
        match select(commands.clone()).await? {
            1 => {
                let (folders, _) = sorted_views(&session);
                if folders.is_empty() {
                    println!("There are no folders to open!\n");
                    continue;
                }

                println!("Select a folder:");
                let names: Vec<String> = folders.iter().map(|folder| folder.name.clone()).collect();
                let selection = select(names.clone()).await?;
                show(&session, &join_path(&current, &names[selection - 1]), false).await?;
            }
            2 => show(&session, &parent_path(&current), false).await?,
            3 => show(&session, &current, true).await?,
            4 => session.prefs.toggle_sort_order()?,
            5 => {
                let keys = [SortBy::Name, SortBy::ModTime, SortBy::Size];
                let selection = select(keys.iter().map(|key| key.to_string()).collect()).await?;
                session.prefs.set_sort_by(keys[selection - 1])?;
            }
            6 => {
                let mode = match session.prefs.view_mode() {
                    ViewMode::Grid => ViewMode::List,
                    ViewMode::List => ViewMode::Grid,
                };
                session.prefs.set_view_mode(mode)?;
            }
            7 => {
                session.browser.clear_cache(None);
                println!("Cache cleared\n");
                continue;
            }
            _ => break,
        }
        render(&session);
    }

    Ok(())
}

fn run_prefs(mut session: Session, action: Option<PrefsAction>) -> Result<(), anyhow::Error> {
    match action.unwrap_or(PrefsAction::Show) {
        PrefsAction::Show => {}
        PrefsAction::View { mode } => session.prefs.set_view_mode(mode)?,
        PrefsAction::SortBy { key } => session.prefs.set_sort_by(key)?,
        PrefsAction::SortOrder { order } => session.prefs.set_sort_order(order)?,
        PrefsAction::ToggleOrder => session.prefs.toggle_sort_order()?,
        PrefsAction::Name { name } => session.prefs.set_name(name)?,
    }

    let prefs = &session.prefs;
    println!("view mode:  {}", prefs.view_mode());
    println!("sort by:    {}", prefs.sort_by());
    println!("sort order: {}", prefs.sort_order());
    println!("name:       {}", prefs.name().unwrap_or("-"));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load the configuration")?;
    init_tracing(&config.logging);
    debug!(base_url = %config.server.base_url, store = %config.storage.path.display(), "starting");

    let session = Session::open(&config)?;

    match cli.command {
        Command::Login { username } => login(&session, username).await?,
        Command::Logout => {
            session.store.remove(JWT_KEY).context("Failed to remove the session token")?;
            println!("Logged out");
        }
        Command::Ls { path, refresh } => {
            if guard(Route::Home, session.store.as_ref()) == Route::Login {
                bail!("Not logged in, run `client login` first");
            }

            let result = if refresh {
                session.browser.refresh_files(&path).await
            } else {
                session.browser.fetch_files(&path).await
            };
            if session.redirect.take() == Some(Route::Login) {
                bail!("The session has expired, run `client login` again");
            }
            result.with_context(|| format!("Failed to list {path}"))?;
            render(&session);
        }
        Command::Browse { path } => {
            if guard(Route::Home, session.store.as_ref()) == Route::Login {
                println!("Please log in first.\n");
                login(&session, None).await?;
            }
            browse(session, path).await?;
        }
        Command::Prefs { action } => run_prefs(session, action)?,
    }

    Ok(())
}
