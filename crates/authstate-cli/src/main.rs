//! authstate - command-line front end for the authstate session library.
//!
//! Signs in against the configured API, keeps the refresh token in the
//! configured storage, and issues authorized requests on your behalf.

use std::io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authstate_core::api::Method;
use authstate_core::{ApiClient, AuthClient, Config, FetchOptions};

/// Environment variable consulted before prompting for a password
const PASSWORD_ENV: &str = "AUTHSTATE_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "authstate", version, about = "Sign in to a JSON API and make authorized requests")]
struct Cli {
    /// Override the API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the stored refresh token
    Signout,
    /// Exchange the stored refresh token for a new access token
    Refresh,
    /// Show the API URL, signed-in state and whether a refresh token is stored
    Status,
    /// Send an authorized request to an endpoint and print the JSON response
    Request {
        /// Endpoint name, e.g. `users/me`
        endpoint: String,
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(long, short = 'd')]
        data: Option<String>,
        /// Send without the authorization header
        #[arg(long)]
        no_auth: bool,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn read_password(provided: Option<String>) -> Result<String> {
    match provided {
        Some(password) => Ok(password),
        None => rpassword::prompt_password("Password: ").context("Failed to read password"),
    }
}

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(email) => eprint!("Email [{}]: ", email),
        None => eprint!("Email: "),
    }
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("Failed to read email")?;
    let line = line.trim();
    match (line.is_empty(), default) {
        (true, Some(email)) => Ok(email.to_string()),
        (true, None) => Err(anyhow::anyhow!("Email is required")),
        (false, _) => Ok(line.to_string()),
    }
}

/// Restore an access token from the stored refresh token. The access token
/// itself is never persisted, so every invocation starts signed out.
async fn ensure_signed_in(auth: &mut AuthClient) -> Result<()> {
    if !auth.is_signed_in() && auth.has_refresh_token() {
        debug!("Restoring session from refresh token");
        auth.refresh_access_token().await?;
    }
    Ok(())
}

/// Lines printed by `status`. Offline: a refresh here would rotate the
/// stored token.
fn status_lines(auth: &AuthClient, config: &Config) -> Vec<String> {
    let signed_in = if auth.is_signed_in() {
        "yes"
    } else {
        "no (access token not persisted)"
    };
    let mut lines = vec![
        format!("api:           {}", auth.api().base_url()),
        format!("signed in:     {}", signed_in),
        format!(
            "refresh token: {}",
            if auth.has_refresh_token() { "stored" } else { "none" }
        ),
    ];
    if let Some(ref email) = config.last_email {
        lines.push(format!("last email:    {}", email));
    }
    lines
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    let base_url = cli.api_url.clone().unwrap_or_else(|| config.resolved_base_url());
    debug!(base_url = %base_url, storage = ?config.storage, "Configuration loaded");

    let api = ApiClient::new(base_url)?;
    let mut auth = AuthClient::new(api, config.open_storage()?);

    match cli.command {
        Command::Signin { email, password } => {
            let email = match email {
                Some(email) => email,
                None => prompt_email(config.last_email.as_deref())?,
            };
            let password = read_password(password)?;
            auth.sign_in(&email, &password).await?;

            config.last_email = Some(email.clone());
            config.save()?;
            info!(email = %email, "Session started");
            println!("Signed in as {}", email);
        }
        Command::Signup { email, password } => {
            let password = read_password(password)?;
            auth.sign_up(&email, &password).await?;

            config.last_email = Some(email.clone());
            config.save()?;
            println!("Signed up as {}", email);
        }
        Command::Signout => {
            ensure_signed_in(&mut auth).await?;
            auth.sign_out().await?;
            println!("Signed out");
        }
        Command::Refresh => {
            let token = auth.refresh_access_token().await?;
            println!("{}", token);
        }
        Command::Status => {
            for line in status_lines(&auth, &config) {
                println!("{}", line);
            }
        }
        Command::Request {
            endpoint,
            method,
            data,
            no_auth,
        } => {
            let method = method
                .to_uppercase()
                .parse::<Method>()
                .with_context(|| format!("Invalid HTTP method: {}", method))?;

            let mut options = FetchOptions::new(endpoint).method(method).authorize(!no_auth);
            if let Some(data) = data {
                let body: Value = serde_json::from_str(&data).context("Request body is not valid JSON")?;
                options = options.body(body);
            }

            if !no_auth {
                ensure_signed_in(&mut auth).await?;
            }
            let response = auth.fetch(options).await?;
            print_json(&response)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
