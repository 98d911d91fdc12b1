//! Heritage - family trees and multimedia memories
//!
//! Command-line front end. Every command starts the application state,
//! restores any cached session, and passes the route guard before it runs.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use heritage::{
    app::AppState,
    backend::EmotionTag,
    config::{self, BackendConfig},
    media::{format_duration, AudioBlob, PickedPhoto},
    routing::{Route, RouteDecision},
    services::{MemberDetails, Session},
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "heritage")]
#[command(author = "Swatto")]
#[command(version)]
#[command(about = "Digital Family Heritage - family trees and multimedia memories")]
struct Cli {
    /// Directory for local state such as the cached session
    #[arg(long, env = "HERITAGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HERITAGE_PASSWORD", hide_env_values = true)]
        password: String,
        /// Full name shown on the profile
        #[arg(long)]
        name: String,
    },

    /// Sign in with e-mail and password
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HERITAGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    SignOut,

    /// Show the signed-in user
    Whoami,

    /// Family trees and the most recent memories
    Dashboard,

    #[command(subcommand)]
    Tree(TreeCommands),

    #[command(subcommand)]
    Member(MemberCommands),

    #[command(subcommand)]
    Memory(MemoryCommands),

    /// Show where navigating to PATH would end up
    Route { path: String },
}

#[derive(Subcommand)]
enum TreeCommands {
    /// Create a family tree
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List family trees by name
    List,
}

#[derive(Subcommand)]
enum MemberCommands {
    /// Add a member to a tree
    Add {
        /// Tree id or name
        #[arg(long)]
        tree: String,
        name: String,
        #[arg(long)]
        born: Option<NaiveDate>,
        #[arg(long)]
        died: Option<NaiveDate>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// List the members of a tree
    List {
        /// Tree id or name
        #[arg(long)]
        tree: String,
    },
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Record a memory, optionally with a photo and an audio clip
    Add {
        #[arg(long)]
        title: String,
        /// Tree id or name; defaults to the first tree by name
        #[arg(long)]
        tree: Option<String>,
        #[arg(long, default_value = "")]
        content: String,
        /// Member id or name
        #[arg(long)]
        member: Option<String>,
        /// When it happened (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// happy, love, nostalgia, pride, peaceful or sad; repeatable
        #[arg(long = "emotion")]
        emotions: Vec<EmotionTag>,
        #[arg(long)]
        audio: Option<PathBuf>,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("heritage={},warn", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = BackendConfig::from_env()?;
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config::data_dir()?,
    };

    let mut app = AppState::connect(&config, data_dir)?;
    app.start().await;

    let result = dispatch(&mut app, cli.command).await;
    app.shutdown();
    result
}

async fn dispatch(app: &mut AppState, command: Commands) -> Result<()> {
    match command {
        Commands::SignUp {
            email,
            password,
            name,
        } => {
            app.enter(Route::Landing)?;
            match app.session.sign_up(&email, &password, &name).await? {
                Some(session) => println!("Welcome, {}", session.display_name),
                None => println!("Account created. Confirm your e-mail address, then sign in."),
            }
        }
        Commands::SignIn { email, password } => {
            app.enter(Route::Landing)?;
            let session = app.session.sign_in(&email, &password).await?;
            println!("Signed in as {}", session.display_name);
        }
        Commands::SignOut => {
            app.session.sign_out().await;
            println!("Signed out");
        }
        Commands::Whoami => {
            let session = app.enter_protected(Route::Profile)?;
            println!("{} <{}>", session.display_name, session.email);
            println!("id: {}", session.user_id);
        }
        Commands::Dashboard => {
            let session = app.enter_protected(Route::Dashboard)?;
            show_dashboard(app, &session).await?;
        }
        Commands::Tree(TreeCommands::Create { name, description }) => {
            let session = app.enter_protected(Route::CreateFamilyTree)?;
            let tree = app
                .family
                .create_tree(&session, &name, description.as_deref())
                .await?;
            println!("Created tree {} ({})", tree.name, tree.id);
        }
        Commands::Tree(TreeCommands::List) => {
            let session = app.enter_protected(Route::FamilyTree)?;
            for tree in app.family.list_trees(&session).await? {
                println!("{}  {}", tree.id, tree.name);
            }
        }
        Commands::Member(MemberCommands::Add {
            tree,
            name,
            born,
            died,
            gender,
            bio,
        }) => {
            let session = app.enter_protected(Route::FamilyTree)?;
            let tree_id = find_tree(app, &session, &tree).await?;
            let member = app
                .family
                .add_member(
                    &session,
                    &tree_id,
                    MemberDetails {
                        name,
                        birth_date: born,
                        death_date: died,
                        gender,
                        bio,
                    },
                )
                .await?;
            println!("Added {} ({})", member.name, member.id);
        }
        Commands::Member(MemberCommands::List { tree }) => {
            let session = app.enter_protected(Route::FamilyTree)?;
            let tree_id = find_tree(app, &session, &tree).await?;
            for member in app.family.list_members(&session, &tree_id).await? {
                let born = member
                    .birth_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!("{}  {} (b. {})", member.id, member.name, born);
            }
        }
        Commands::Memory(MemoryCommands::Add {
            title,
            tree,
            content,
            member,
            date,
            emotions,
            audio,
            photo,
        }) => {
            let session = app.enter_protected(Route::AddMemory)?;
            add_memory(
                app,
                &session,
                MemoryArgs {
                    title,
                    tree,
                    content,
                    member,
                    date,
                    emotions,
                    audio,
                    photo,
                },
            )
            .await?;
        }
        Commands::Route { path } => match app.navigator.navigate(&path) {
            RouteDecision::Render(route) => println!("{}", route.path()),
            RouteDecision::Redirect(route) => println!("redirect {}", route.path()),
            RouteDecision::ShowLoading => println!("loading"),
        },
    }

    Ok(())
}

struct MemoryArgs {
    title: String,
    tree: Option<String>,
    content: String,
    member: Option<String>,
    date: Option<NaiveDate>,
    emotions: Vec<EmotionTag>,
    audio: Option<PathBuf>,
    photo: Option<PathBuf>,
}

async fn add_memory(app: &mut AppState, session: &Session, args: MemoryArgs) -> Result<()> {
    let mut form = app.memories.open_form(session).await?;
    if form.needs_family_tree() {
        bail!(
            "Create a family tree first ({})",
            Route::CreateFamilyTree.path()
        );
    }

    if let Some(wanted) = &args.tree {
        let tree_id = form
            .trees
            .iter()
            .find(|t| &t.id == wanted || &t.name == wanted)
            .map(|t| t.id.clone())
            .with_context(|| format!("No family tree named {}", wanted))?;
        app.memories.select_tree(&mut form, session, &tree_id).await?;
    }

    if let Some(wanted) = &args.member {
        form.draft.family_member_id = form
            .members
            .iter()
            .find(|m| &m.id == wanted || &m.name == wanted)
            .map(|m| m.id.clone())
            .with_context(|| format!("No member named {} in this tree", wanted))?;
    }

    form.draft.title = args.title;
    form.draft.content = args.content;
    form.draft.memory_date = args.date;
    for tag in args.emotions {
        if !form.draft.emotions.contains(tag) {
            form.toggle_emotion(tag);
        }
    }

    if let Some(path) = &args.photo {
        form.draft.photo.select(PickedPhoto::from_file(path).await?)?;
    }
    if let Some(path) = &args.audio {
        form.attach_audio(AudioBlob::from_file(path).await?);
    }

    if !form.can_submit() {
        bail!("A family tree and a title are required");
    }

    if let Some(route) = form.submit(&app.memories, session).await? {
        println!("Memory saved: {}", form.draft.title.trim());
        if let Some(audio) = &form.draft.audio {
            println!("audio: {} bytes ({})", audio.data.len(), format_duration(audio.duration_secs));
        }
        println!("-> {}", route.path());
    }

    Ok(())
}

async fn show_dashboard(app: &AppState, session: &Session) -> Result<()> {
    let data = app.dashboard.load(session).await?;

    println!("Mirë se vini, {}", session.display_name);
    println!();
    println!("Family trees ({}):", data.family_trees.len());
    for tree in &data.family_trees {
        println!("  {}  {}", tree.created_at.format("%Y-%m-%d"), tree.name);
    }

    println!();
    println!("Recent memories:");
    if data.recent_memories.is_empty() {
        println!("  none yet");
    }
    for memory in &data.recent_memories {
        let tags: Vec<&str> = memory
            .emotion_tags
            .iter()
            .flatten()
            .map(|t| t.label())
            .collect();
        let photo = if memory.photo_url.is_some() { " [photo]" } else { "" };
        println!(
            "  {}  {}{} {}",
            memory.created_at.format("%Y-%m-%d"),
            memory.title,
            photo,
            tags.join(", ")
        );
    }

    Ok(())
}

async fn find_tree(app: &AppState, session: &Session, wanted: &str) -> Result<String> {
    app.family
        .list_trees(session)
        .await?
        .into_iter()
        .find(|t| t.id == wanted || t.name == wanted)
        .map(|t| t.id)
        .with_context(|| format!("No family tree named {}", wanted))
}
