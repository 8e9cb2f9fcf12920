use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use poptato::config::{self, Config};
use poptato::data::{TodoId, TodoItem, TokenPair, YesterdayItem};
use poptato::integrations::{self, auth::AuthClient, http::HttpGateway, TodoGateway};
use poptato::lists::{
    self, BacklogController, ListEvent, ListEventReceiver, MutationOutcome, TodayController,
    YesterdayController,
};
use poptato::prefs::PreferenceStore;
use poptato::session::{Session, SessionEvents, SessionRefresher, TokenAuthenticator};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "poptato")]
#[command(about = "Command-line client for the Poptato to-do service")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a token pair issued by the sign-in flow
    Login {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: String,
    },
    /// Forget the stored tokens
    Logout,
    /// Backlog items
    Backlog {
        #[command(subcommand)]
        action: BacklogAction,
    },
    /// Today's items
    Today {
        #[command(subcommand)]
        action: TodayAction,
    },
    /// Yesterday's unfinished items
    Yesterday {
        #[command(subcommand)]
        action: YesterdayAction,
    },
    /// Local preferences
    Prefs {
        /// Show deadlines as dates instead of D-day counters
        #[arg(long)]
        deadline_date_mode: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
enum BacklogAction {
    /// List items, optionally filtered by category strip index
    List {
        #[arg(long)]
        category: Option<usize>,
    },
    /// Add an item
    Add {
        content: String,
        #[arg(long)]
        category: Option<usize>,
    },
    Delete { id: i64 },
    Bookmark { id: i64 },
    /// Move an item to today
    Swipe { id: i64 },
    /// List categories
    Categories,
    /// Delete the category at a strip index
    DeleteCategory { index: usize },
}

#[derive(Subcommand, Debug)]
enum TodayAction {
    List,
    /// Check or uncheck an item
    Check { id: i64 },
    /// Move an item back to the backlog
    Swipe { id: i64 },
}

#[derive(Subcommand, Debug)]
enum YesterdayAction {
    List,
    /// Mark items as finished
    Complete { ids: Vec<i64> },
}

struct App {
    session: Session,
    gateway: Arc<dyn TodoGateway>,
    config: Config,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let prefs = Arc::new(PreferenceStore::open(&config::prefs_path(&config)?)?);
        let session = Session::new(Arc::clone(&prefs), SessionEvents::default());

        let client = integrations::build_http_client(&config)?;
        let auth = Arc::new(AuthClient::new(client.clone(), &config.api.base_url));
        let refresher = Arc::new(SessionRefresher::new(auth, prefs));
        let authenticator = TokenAuthenticator::new(refresher, session.clone(), config.api.timeout());
        let gateway: Arc<dyn TodoGateway> = Arc::new(HttpGateway::new(
            client,
            &config.api.base_url,
            authenticator,
        ));

        Ok(Self {
            session,
            gateway,
            config,
        })
    }

    fn require_session(&self) -> Result<()> {
        if !self.session.is_signed_in() {
            anyhow::bail!("Not signed in. Run `poptato login` first.");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("poptato=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.init {
        config::init_wizard().await?;
        return Ok(());
    }

    let config = config::load(args.config.as_deref())?;
    let app = App::new(config)?;

    match args.command {
        None => {
            let signed_in = app.session.is_signed_in();
            println!("Signed in: {}", if signed_in { "yes" } else { "no" });
            if signed_in && app.session.prefs().should_show_yesterday(Local::now().date_naive()) {
                println!("You have unfinished items from yesterday. Run `poptato yesterday list`.");
            }
            Ok(())
        }
        Some(Command::Login {
            access_token,
            refresh_token,
        }) => {
            app.session
                .sign_in(&TokenPair::new(access_token, refresh_token))?;
            println!("Signed in.");
            Ok(())
        }
        Some(Command::Logout) => {
            app.session.sign_out()?;
            println!("Signed out.");
            Ok(())
        }
        Some(Command::Prefs { deadline_date_mode }) => {
            let prefs = app.session.prefs();
            if let Some(enabled) = deadline_date_mode {
                prefs.set_deadline_date_mode(enabled)?;
            }
            println!("deadline_date_mode = {}", prefs.deadline_date_mode());
            Ok(())
        }
        Some(Command::Backlog { action }) => {
            app.require_session()?;
            run_backlog(&app, action).await
        }
        Some(Command::Today { action }) => {
            app.require_session()?;
            run_today(&app, action).await
        }
        Some(Command::Yesterday { action }) => {
            app.require_session()?;
            run_yesterday(&app, action).await
        }
    }
}

async fn run_backlog(app: &App, action: BacklogAction) -> Result<()> {
    let (tx, rx) = lists::event_channel();
    let backlog = BacklogController::new(
        Arc::clone(&app.gateway),
        tx,
        app.config.lists.backlog_page_size,
    );
    backlog.categories().load().await?;

    let outcome = match action {
        BacklogAction::List { category } => {
            backlog.select_category(category.unwrap_or(0)).await?;
            print_items(app, &backlog.items());
            None
        }
        BacklogAction::Add { content, category } => {
            backlog.select_category(category.unwrap_or(0)).await?;
            Some(backlog.create(&content).await)
        }
        BacklogAction::Delete { id } => {
            backlog.load().await?;
            Some(backlog.todos().delete(TodoId(id)).await)
        }
        BacklogAction::Bookmark { id } => {
            backlog.load().await?;
            Some(backlog.todos().toggle_bookmark(TodoId(id)).await)
        }
        BacklogAction::Swipe { id } => {
            backlog.load().await?;
            Some(backlog.todos().swipe(TodoId(id)).await)
        }
        BacklogAction::DeleteCategory { index } => {
            backlog.select_category(index).await?;
            Some(backlog.delete_category().await)
        }
        BacklogAction::Categories => {
            for (index, category) in backlog.categories().categories().iter().enumerate() {
                println!("{:>3}  {}", index, category.name);
            }
            None
        }
    };

    if let Some(outcome) = outcome {
        report(outcome, rx)?;
        print_items(app, &backlog.items());
    }
    Ok(())
}

async fn run_today(app: &App, action: TodayAction) -> Result<()> {
    let (tx, rx) = lists::event_channel();
    let today = TodayController::new(Arc::clone(&app.gateway), tx, app.config.lists.today_page_size);
    today.load().await?;

    let outcome = match action {
        TodayAction::List => None,
        TodayAction::Check { id } => Some(today.toggle_completion(TodoId(id)).await),
        TodayAction::Swipe { id } => Some(today.todos().swipe(TodoId(id)).await),
    };

    if let Some(outcome) = outcome {
        report(outcome, rx)?;
    }
    print_items(app, &today.items());
    Ok(())
}

async fn run_yesterday(app: &App, action: YesterdayAction) -> Result<()> {
    let (tx, rx) = lists::event_channel();
    let yesterday = YesterdayController::new(
        Arc::clone(&app.gateway),
        tx,
        app.config.lists.yesterday_page_size,
    );
    yesterday.load().await?;

    match action {
        YesterdayAction::List => {
            print_yesterday(&yesterday.items());
        }
        YesterdayAction::Complete { ids } => {
            for id in ids {
                if !yesterday.toggle_completion(TodoId(id)) {
                    tracing::warn!("No item {} on yesterday's list", id);
                }
            }
            report(yesterday.commit_completions().await, rx)?;
            app.session
                .prefs()
                .set_should_show_yesterday(false, Local::now().date_naive())?;
            print_yesterday(&yesterday.items());
        }
    }
    Ok(())
}

/// Turn a mutation outcome and the events it produced into CLI output.
fn report(outcome: MutationOutcome, mut rx: ListEventReceiver) -> Result<()> {
    while let Ok(event) = rx.try_recv() {
        match event {
            ListEvent::AllChecked => println!("All done for today!"),
            ListEvent::DeleteSucceeded(id) => println!("Deleted {}.", id),
            ListEvent::MutationFailed => {}
        }
    }
    match outcome {
        MutationOutcome::Committed => Ok(()),
        MutationOutcome::RolledBack => anyhow::bail!("The server rejected the change"),
        MutationOutcome::Rejected => anyhow::bail!("Nothing to change"),
    }
}

fn print_items(app: &App, items: &[TodoItem]) {
    let today = Local::now().date_naive();
    let date_mode = app.session.prefs().deadline_date_mode();

    for item in items {
        let check = if item.status.is_completed() { "x" } else { " " };
        let star = if item.is_bookmark { "*" } else { " " };
        let deadline = match (item.deadline, item.d_day(today)) {
            (Some(date), _) if date_mode => format!("  {}", date.format("%Y-%m-%d")),
            (_, Some(0)) => "  D-day".to_string(),
            (_, Some(days)) if days > 0 => format!("  D-{}", days),
            (_, Some(days)) => format!("  D+{}", -days),
            _ => String::new(),
        };
        let category = item
            .category
            .as_ref()
            .map(|c| format!("  #{}", c.name))
            .unwrap_or_default();
        println!(
            "[{}]{} {:>6}  {}{}{}",
            check, star, item.id.0, item.content, deadline, category
        );
    }
}

fn print_yesterday(items: &[YesterdayItem]) {
    for item in items {
        let check = if item.status.is_completed() { "x" } else { " " };
        println!("[{}] {:>6}  {}", check, item.id.0, item.content);
    }
}
