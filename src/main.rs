use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use household_client::{
    AuthError, AuthManager, ClientConfig, ClientError, FileTokenStore, MultipartForm, NormalizedResponse,
    RequestBody, RequestClient, RequestOptions,
};
use reqwest::Method;
use reqwest::header::HeaderValue;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("invalid content type: {0}")]
    InvalidContentType(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("cannot read {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
}

#[derive(Parser, Debug)]
#[command(name = "household", about = "Household API client with automatic token refresh")]
struct Cli {
    /// Overrides `HOUSEHOLD_API_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `HOUSEHOLD_SESSION_FILE`.
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Health,
    Login {
        /// Login or email.
        #[arg(long)]
        identifier: String,
        #[arg(long, env = "HOUSEHOLD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        login: String,
        #[arg(long, env = "HOUSEHOLD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Request(RequestArgs),
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// Endpoint path, e.g. `/vehicles/`.
    endpoint: String,

    #[arg(long, short = 'X', default_value = "GET")]
    method: String,

    /// JSON request body.
    #[arg(long, conflicts_with_all = ["form", "file"])]
    data: Option<String>,

    /// Raw text request body, sent under `--content-type`.
    #[arg(long, conflicts_with_all = ["data", "form", "file"])]
    text: Option<String>,

    #[arg(long, default_value = "text/plain", requires = "text")]
    content_type: String,

    /// Multipart text field as `name=value`; repeatable.
    #[arg(long, value_parser = parse_key_value)]
    form: Vec<(String, String)>,

    /// Multipart file field as `name=path`; repeatable.
    #[arg(long, value_parser = parse_key_value)]
    file: Vec<(String, String)>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = ClientConfig { base_url: ClientConfig::new(base_url)?.base_url, ..config };
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }

    let store = Arc::new(FileTokenStore::new(&config.session_file));
    let client = RequestClient::new(config)?;
    let manager = AuthManager::new(client, store);
    restore_session(&manager).await;

    match cli.command {
        Command::Health => Ok(print_response(&manager.client().health_check().await)),
        Command::Login { identifier, password } => {
            let data = manager.login(&identifier, &password).await?;
            let user = match data.get("user_id") {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => "?".to_owned(),
            };
            println!("logged in as user {user}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Register { email, login, password } => {
            let data = manager.register(&email, &login, &password).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Logout => {
            manager.logout().await?;
            println!("logged out");
            Ok(ExitCode::SUCCESS)
        }
        Command::Request(args) => {
            let endpoint = args.endpoint.clone();
            let options = build_options(args).await?;
            Ok(print_response(&manager.client().request(&endpoint, options).await))
        }
    }
}

/// Load the saved session. An unreadable session file leaves the CLI
/// logged out so `login` and `logout` can still replace or remove it.
async fn restore_session(manager: &AuthManager) -> bool {
    match manager.restore().await {
        Ok(restored) => restored,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable session; continuing logged out");
            false
        }
    }
}

async fn build_options(args: RequestArgs) -> Result<RequestOptions, CliError> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::InvalidMethod(args.method.clone()))?;

    if let Some(data) = args.data {
        let value = serde_json::from_str::<Value>(&data)?;
        return Ok(RequestOptions::default().with_method(method).with_body(RequestBody::from_value(&value)));
    }

    if let Some(text) = args.text {
        let content_type = HeaderValue::from_str(&args.content_type)
            .map_err(|_| CliError::InvalidContentType(args.content_type.clone()))?;
        return Ok(RequestOptions::text(method, content_type, text));
    }

    if args.form.is_empty() && args.file.is_empty() {
        return Ok(RequestOptions::default().with_method(method));
    }

    let mut form = MultipartForm::new();
    for (name, value) in args.form {
        form = form.text(name, value);
    }
    for (name, path) in args.file {
        let path = PathBuf::from(path);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| CliError::ReadFile { path: path.clone(), source })?;
        form = form.file(name, file_name_of(&path), bytes);
    }
    Ok(RequestOptions::multipart(method, form))
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(|| "upload".to_owned(), |n| n.to_string_lossy().into_owned())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

fn print_response(response: &NormalizedResponse) -> ExitCode {
    match serde_json::to_string_pretty(response) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("failed to render response: {e}"),
    }
    if response.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
