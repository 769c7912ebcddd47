use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use libtusk::actions::{AccountContext, Action, PageTarget, StoredDefaultsAction};
use libtusk::config::Config;
use libtusk::credentials::AccountVault;
use libtusk::error::TuskError;
use libtusk::logging::{LogFormat, LoggingConfig};
use libtusk::pagination::Direction;
use libtusk::reconcile::{BoundList, Edit};
use libtusk::types::Status;
use libtusk::TuskClient;
use std::io::BufRead;
use std::time::Duration;

mod render;

use render::{OutputFormat, account_text, notification_text, print_items, profile_header, status_text};

#[derive(Parser)]
#[command(name = "tusk")]
#[command(version, about = "Read Mastodon from the terminal")]
#[command(long_about = r#"Read Mastodon from the terminal.

EXAMPLES:
    # Log in (prints an authorization URL, then reads the code from stdin)
    tusk login mastodon.social

    # Home timeline, three pages
    tusk timeline --pages 3

    # Follow the home timeline, printing new posts as they arrive
    tusk timeline --watch 60

    # Scripting
    tusk notifications --format json | jq '.[] | .type'

    # Someone's followers
    tusk profile 109302 --list followers

EXIT CODES:
    0 - Success
    1 - Error (network, storage, configuration)
    2 - Authentication failed (log in again)
    3 - Invalid input
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Stored account to use (default: the first one)
    #[arg(long, global = true, value_name = "KEY")]
    account: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Show content behind content warnings
    #[arg(long, global = true)]
    show_warnings: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to an instance
    Login {
        /// Instance host (default: instance.default from the config)
        instance: Option<String>,

        /// Authorization code; read from stdin when omitted
        #[arg(long)]
        code: Option<String>,
    },
    /// Forget every stored account
    Logout,
    /// List stored accounts
    Accounts,
    /// Home timeline
    Timeline {
        #[arg(long, default_value = "1", value_name = "N")]
        pages: usize,

        /// Poll for newer posts every SECONDS until interrupted
        #[arg(long, value_name = "SECONDS")]
        watch: Option<u64>,
    },
    /// Your favourites
    Favourites {
        #[arg(long, default_value = "1", value_name = "N")]
        pages: usize,
    },
    /// Your notifications
    Notifications {
        #[arg(long, default_value = "1", value_name = "N")]
        pages: usize,
    },
    /// Show an account and one of its lists
    Profile {
        /// Account id (default: you)
        id: Option<String>,

        #[arg(long, value_enum, default_value = "statuses")]
        list: ProfileList,

        #[arg(long, default_value = "1", value_name = "N")]
        pages: usize,
    },
    /// Toggle favourite on a loaded status
    Favourite { id: String },
    /// Toggle boost on a loaded status
    Boost { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProfileList {
    Statuses,
    Followers,
    Following,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_format = std::env::var("TUSK_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("TUSK_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    LoggingConfig::new(log_format, level, cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e.downcast_ref::<TuskError>().map_or(1, TuskError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    if let Commands::Accounts = cli.command {
        return list_accounts(&config, cli.format);
    }

    let mut client = TuskClient::from_config(config)?;
    if cli.show_warnings {
        client
            .run(Action::StoredDefaults(StoredDefaultsAction::SetHideContentWarnings(false)))
            .await;
    }

    match cli.command {
        Commands::Login { instance, code } => login(&mut client, instance, code).await,
        Commands::Logout => {
            client.logout().await?;
            eprintln!("Logged out; stored credentials removed");
            Ok(())
        }
        Commands::Accounts => Ok(()),
        Commands::Timeline { pages, watch } => {
            restore(&mut client, cli.account).await?;
            page_more(&mut client, PageTarget::Timeline, pages).await?;
            let defaults = client.state().stored_defaults.clone();
            print_items(&client.state().timeline.items, cli.format, |s| status_text(s, &defaults))?;
            if let Some(seconds) = watch {
                watch_timeline(&mut client, Duration::from_secs(seconds.max(5)), cli.format).await?;
            }
            Ok(())
        }
        Commands::Favourites { pages } => {
            restore(&mut client, cli.account).await?;
            page_more(&mut client, PageTarget::Favourites, pages).await?;
            let defaults = client.state().stored_defaults.clone();
            print_items(&client.state().favourites.items, cli.format, |s| status_text(s, &defaults))
        }
        Commands::Notifications { pages } => {
            restore(&mut client, cli.account).await?;
            page_more(&mut client, PageTarget::Notifications, pages).await?;
            let defaults = client.state().stored_defaults.clone();
            print_items(&client.state().notifications.items, cli.format, |n| {
                notification_text(n, &defaults)
            })
        }
        Commands::Profile { id, list, pages } => {
            restore(&mut client, cli.account).await?;
            show_profile(&mut client, id, list, pages, cli.format).await
        }
        Commands::Favourite { id } => {
            restore(&mut client, cli.account).await?;
            let status = client.toggle_favourite(&id).await?;
            let state = if status.display_status().is_favourited() { "Favourited" } else { "Unfavourited" };
            eprintln!("{} {}", state, id);
            Ok(())
        }
        Commands::Boost { id } => {
            restore(&mut client, cli.account).await?;
            let status = client.toggle_reblog(&id).await?;
            let state = if status.display_status().is_reblogged() { "Boosted" } else { "Unboosted" };
            eprintln!("{} {}", state, id);
            Ok(())
        }
    }
}

async fn restore(client: &mut TuskClient, account: Option<String>) -> Result<()> {
    if !client.restore(account).await? {
        bail!(TuskError::InvalidInput("Not logged in. Run: tusk login <instance>".to_string()));
    }
    Ok(())
}

async fn login(client: &mut TuskClient, instance: Option<String>, code: Option<String>) -> Result<()> {
    let instance = instance.unwrap_or_else(|| client.config().instance.default.clone());
    let url = client.begin_login(&instance).await?;

    let code = match code {
        Some(code) => code,
        None => {
            eprintln!("Open this URL in a browser and authorize tusk:\n\n  {}\n", url);
            eprint!("Paste the authorization code: ");
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read authorization code")?;
            line
        }
    };

    client.complete_login(code.trim()).await?;
    let who = client
        .state()
        .accounts
        .active()
        .and_then(|entry| entry.account.as_ref())
        .map(|account| format!(" as @{}", account.acct))
        .unwrap_or_default();
    eprintln!("Logged in to {}{}", instance, who);
    Ok(())
}

fn list_accounts(config: &Config, format: OutputFormat) -> Result<()> {
    #[derive(serde::Serialize)]
    struct StoredAccount {
        key: String,
        instance: Option<String>,
    }

    let vault = AccountVault::from_config(&config.credentials);
    let accounts = vault
        .accounts()?
        .into_iter()
        .map(|key| {
            let instance = vault.get(&key).ok().and_then(|stored| stored.instance);
            StoredAccount { key, instance }
        })
        .collect::<Vec<_>>();

    if accounts.is_empty() && format == OutputFormat::Text {
        eprintln!("No stored accounts ({} backend)", vault.backend_name());
        return Ok(());
    }
    print_items(&accounts, format, |a| {
        format!("{}  {}", a.key, a.instance.as_deref().unwrap_or("?"))
    })
}

/// Fetch older pages until `pages` are loaded or the list runs out.
async fn page_more(client: &mut TuskClient, target: PageTarget, pages: usize) -> Result<()> {
    for _ in 1..pages {
        let more = match &target {
            PageTarget::Timeline => client.state().timeline.can_fetch(Direction::Older),
            PageTarget::Favourites => client.state().favourites.can_fetch(Direction::Older),
            PageTarget::Notifications => client.state().notifications.can_fetch(Direction::Older),
            PageTarget::AccountStatuses(context) => account_list_open(client, context, |e| {
                e.statuses.can_fetch(Direction::Older)
            }),
            PageTarget::Followers(context) => account_list_open(client, context, |e| {
                e.followers.can_fetch(Direction::Older)
            }),
            PageTarget::Following(context) => account_list_open(client, context, |e| {
                e.following.can_fetch(Direction::Older)
            }),
        };
        if !more {
            break;
        }
        client.fetch(target.clone(), Direction::Older).await?;
    }
    Ok(())
}

fn account_list_open(
    client: &TuskClient,
    context: &AccountContext,
    open: impl Fn(&libtusk::state::AccountState) -> bool,
) -> bool {
    client.state().accounts.get(context).is_some_and(open)
}

async fn show_profile(
    client: &mut TuskClient,
    id: Option<String>,
    list: ProfileList,
    pages: usize,
    format: OutputFormat,
) -> Result<()> {
    let context = client.open_profile(id.as_deref()).await?;
    let target = match list {
        ProfileList::Statuses => PageTarget::AccountStatuses(context.clone()),
        ProfileList::Followers => PageTarget::Followers(context.clone()),
        ProfileList::Following => PageTarget::Following(context.clone()),
    };
    page_more(client, target, pages).await?;

    let state = client.state();
    let Some(entry) = state.accounts.get(&context) else {
        bail!("Profile is no longer loaded");
    };
    if format == OutputFormat::Text {
        if let Some(account) = &entry.account {
            println!("{}\n", profile_header(account));
        }
    }
    let defaults = &state.stored_defaults;
    match list {
        ProfileList::Statuses => {
            let mut statuses: Vec<Status> = entry.pinned.clone();
            statuses.extend(
                entry
                    .statuses
                    .items
                    .iter()
                    .filter(|s| !entry.pinned.iter().any(|p| p.id == s.id))
                    .cloned(),
            );
            print_items(&statuses, format, |s| status_text(s, defaults))
        }
        ProfileList::Followers => print_items(&entry.followers.items, format, account_text),
        ProfileList::Following => print_items(&entry.following.items, format, account_text),
    }
}

/// Print statuses as they show up on the home timeline.
///
/// Rows already printed are tracked in a [`BoundList`]; only inserted and
/// changed rows are written again.
async fn watch_timeline(client: &mut TuskClient, every: Duration, format: OutputFormat) -> Result<()> {
    let mut shown: BoundList<Status> = BoundList::new();
    shown.update(client.state().timeline.items.clone());

    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }

        let direction = if client.state().timeline.can_fetch(Direction::Newer) {
            Direction::Newer
        } else {
            Direction::Reload
        };
        if let Err(e) = client.fetch_timeline(direction).await {
            if matches!(&e, TuskError::Remote(remote) if remote.is_authentication()) {
                return Err(e.into());
            }
            tracing::warn!("Refresh failed: {}", e);
            continue;
        }

        let defaults = client.state().stored_defaults.clone();
        let mut fresh = Vec::new();
        for edit in shown.update(client.state().timeline.items.clone()) {
            match edit {
                Edit::Insert { item, .. } | Edit::Update { item, .. } => fresh.push(item),
                Edit::Remove { .. } => {}
            }
        }
        print_items(&fresh, format, |s| status_text(s, &defaults))?;
    }
}
