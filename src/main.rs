//! Document Assistant command-line client
//!
//! Drives the client stores from a terminal: sign in, link a storage account, browse
//! and upload files, and ask the assistant about them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docassist_client::config::{Config, LogFormat};
use docassist_client::drive::{DriveView, LinkState};
use docassist_client::errors::ClientError;
use docassist_client::models::{FileUpload, Role};
use docassist_client::App;

#[derive(Parser)]
#[command(name = "docassist", version, about = "Document assistant client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the signed-in user and the storage-link state
    Status,
    /// Sign in with email and password
    SignIn { email: String, password: String },
    /// Create an account and sign in
    SignUp {
        email: String,
        password: String,
        #[arg(long)]
        name: String,
    },
    /// Sign out and forget the stored credential
    SignOut,
    /// Permanently delete the account
    DeleteAccount {
        /// Required; there is no undo
        #[arg(long)]
        yes: bool,
    },
    /// Link a storage account and wait for authorization to finish
    Connect,
    /// List a folder (the root when omitted)
    Ls { folder: Option<String> },
    /// Search files by name
    Search {
        query: String,
        #[arg(long)]
        folder: Option<String>,
    },
    /// Create a folder
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Upload a local file
    Upload {
        path: PathBuf,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Ask the assistant a question about your documents
    Ask { message: String },
    /// Print the conversation history
    History,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config);
    tracing::debug!("Backend: {}", config.api_base_url);
    tracing::debug!("Credential file: {:?}", config.credential_path);

    match run(config, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e.message());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run(config: Config, command: Command) -> Result<(), ClientError> {
    let app = App::from_config(config)?;
    let follower = app.start().await;

    let result = execute(&app, command).await;

    follower.abort();
    result
}

async fn execute(app: &App, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Status => {
            match app.session.user() {
                Some(user) => println!("Signed in as {} <{}>", user.display_name, user.email),
                None => println!("Not signed in"),
            }
            println!("Storage: {}", describe_link(app.drive.snapshot().link));
        }
        Command::SignIn { email, password } => {
            let user = app.session.sign_in(&email, &password).await?;
            println!("Signed in as {}", user.display_name);
        }
        Command::SignUp {
            email,
            password,
            name,
        } => {
            let user = app.session.sign_up(&email, &password, &name).await?;
            println!("Account created for {}", user.email);
        }
        Command::SignOut => {
            app.session.sign_out().await;
            println!("Signed out");
        }
        Command::DeleteAccount { yes } => {
            if !yes {
                return Err(ClientError::Validation(
                    "Pass --yes to confirm account deletion".to_string(),
                ));
            }
            require_user(app)?;
            app.session.delete_account().await?;
            println!("Account deleted");
        }
        Command::Connect => {
            require_user(app)?;
            let auth_url = app.drive.begin_connect().await?;
            println!("Complete authorization at:\n  {}", auth_url);
            println!("Waiting for the storage account to be linked...");
            match app.drive.wait_for_link().await {
                LinkState::Connected => println!("Storage account linked"),
                _ => {
                    return Err(ClientError::Validation(
                        "Storage account was not linked in time".to_string(),
                    ))
                }
            }
        }
        Command::Ls { folder } => {
            require_storage(app)?;
            app.drive.set_folder(folder.as_deref()).await;
            print_listing(&app.drive.snapshot());
        }
        Command::Search { query, folder } => {
            require_storage(app)?;
            app.drive.set_folder(folder.as_deref()).await;
            app.drive.search(&query).await;
            print_listing(&app.drive.snapshot());
        }
        Command::Mkdir { name, parent } => {
            require_storage(app)?;
            let folder = app.drive.create_folder(&name, parent.as_deref()).await?;
            println!("Created folder {} ({})", folder.name, folder.id);
        }
        Command::Upload { path, parent } => {
            require_storage(app)?;
            let file = FileUpload::from_path(&path).await?;
            let entry = app.drive.upload_file(&file, parent.as_deref()).await?;
            println!("Uploaded {} ({})", entry.name, entry.id);
        }
        Command::Ask { message } => {
            require_storage(app)?;
            let reply = app.assistant.send_message(&message).await?;
            println!("{}", reply.content);
        }
        Command::History => {
            require_user(app)?;
            app.assistant.load_history().await;
            for message in app.assistant.transcript() {
                let speaker = match message.role {
                    Role::User => "you",
                    Role::Assistant => "assistant",
                };
                println!(
                    "[{}] {}: {}",
                    message.timestamp.format("%Y-%m-%d %H:%M"),
                    speaker,
                    message.content
                );
            }
        }
    }
    Ok(())
}

fn require_user(app: &App) -> Result<(), ClientError> {
    match app.session.user() {
        Some(_) => Ok(()),
        None => Err(ClientError::Unauthorized(
            "Sign in first (docassist sign-in)".to_string(),
        )),
    }
}

fn require_storage(app: &App) -> Result<(), ClientError> {
    require_user(app)?;
    if app.drive.is_connected() {
        Ok(())
    } else {
        Err(ClientError::Validation(
            "Link a storage account first (docassist connect)".to_string(),
        ))
    }
}

fn describe_link(link: LinkState) -> &'static str {
    match link {
        LinkState::Unknown => "unknown",
        LinkState::Disconnected => "not linked",
        LinkState::Connecting => "linking",
        LinkState::Connected => "linked",
    }
}

fn print_listing(view: &DriveView) {
    let trail: Vec<&str> = view.breadcrumbs.iter().map(|c| c.name.as_str()).collect();
    println!("/{}", trail.join("/"));
    if !view.search_query.is_empty() {
        println!("(matching \"{}\")", view.search_query);
    }
    if view.files.is_empty() {
        println!("  (empty)");
        return;
    }
    for entry in &view.files {
        let marker = if entry.is_folder() { "d" } else { "-" };
        let size = entry
            .size_bytes
            .map(|bytes| bytes.to_string())
            .unwrap_or_default();
        println!(
            "  {} {:>10}  {}  {}  {}",
            marker,
            size,
            entry.modified_at.format("%Y-%m-%d %H:%M"),
            entry.name,
            entry.id
        );
    }
}
