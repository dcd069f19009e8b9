mod cli;
mod config;
mod console;
mod http_client;
mod http_control_service;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use extrashot_core::{OperatorSession, SharedControlService};
use http_control_service::HttpControlService;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let target = config::Target::from_args(&args)?;
    init_logging(target.log_level())?;

    let client = http_client::build(&target)?;
    let service: SharedControlService =
        Arc::new(HttpControlService::new(client, target.api_base().clone()));
    let input = console::Input::stdin();
    tracing::info!("controller at {}", target.api_base());

    let mut credentials = target
        .credentials()
        .map(|(user, pass)| (user.to_string(), pass.to_string()));
    loop {
        let Some(session) = open_session(&service, &target, &input, credentials.take()).await?
        else {
            return Ok(());
        };
        let exit = console::run(&session, &input).await;
        session.teardown();
        match exit? {
            console::Exit::Quit => return Ok(()),
            console::Exit::LoggedOut => continue,
        }
    }
}

/// Resumes an authenticated session or logs in. `None` when input ends.
async fn open_session(
    service: &SharedControlService,
    target: &config::Target,
    input: &console::Input,
    mut credentials: Option<(String, String)>,
) -> Result<Option<OperatorSession>> {
    let options = target.controller_options();
    if let Some(session) = OperatorSession::resume(service.clone(), options.clone())
        .await
        .context("controller unreachable")?
    {
        return Ok(Some(session));
    }
    loop {
        let (username, password) = match credentials.take() {
            Some(credentials) => credentials,
            None => {
                let Some(username) = prompt_username(input, target.username()).await? else {
                    return Ok(None);
                };
                let Some(password) = input.read_line("password: ").await? else {
                    return Ok(None);
                };
                (username, password)
            }
        };
        match OperatorSession::login(service.clone(), options.clone(), &username, &password).await
        {
            Ok(session) => return Ok(Some(session)),
            Err(err) if err.is_local() => println!("{err}"),
            Err(err) => {
                tracing::warn!("login failed: {}", err);
                println!("login failed: {err}");
            }
        }
    }
}

async fn prompt_username(input: &console::Input, default: Option<&str>) -> Result<Option<String>> {
    let prompt = match default {
        Some(name) => format!("username [{name}]: "),
        None => "username: ".to_string(),
    };
    let Some(line) = input.read_line(&prompt).await? else {
        return Ok(None);
    };
    let line = line.trim();
    Ok(Some(match (line.is_empty(), default) {
        (true, Some(name)) => name.to_string(),
        _ => line.to_string(),
    }))
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.parse().context("invalid log level")?)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .try_init()
        .map_err(|err| anyhow!("logging init failed: {err}"))
}
