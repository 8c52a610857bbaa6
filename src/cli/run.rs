//! Subcommand execution.

use std::collections::HashSet;
use std::env;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{Cli, Commands};
use crate::domain::{FetchRequest, Priority, SendRequest, Topic, TopicEvent, UploadRequest};
use crate::error::Result;
use crate::infrastructure::bootstrap::build_service;
use crate::infrastructure::config::Config;
use crate::service::{Listener, PortalService};

const USERNAME_VAR: &str = "PORTAL_USERNAME";
const PASSWORD_VAR: &str = "PORTAL_PASSWORD";

/// Run one subcommand against a freshly started service, then shut it down.
///
/// # Errors
///
/// Returns an error if the service cannot start or the request fails.
#[allow(clippy::result_large_err)]
pub async fn execute(cli: Cli, config: Config) -> Result<()> {
    let service = build_service(&config)?;
    match (env::var(USERNAME_VAR), env::var(PASSWORD_VAR)) {
        (Ok(username), Ok(password)) => service.set_credentials(&username, &password, false),
        _ => warn!("{USERNAME_VAR} or {PASSWORD_VAR} not set, requests will wait for a login"),
    }

    let priority = if cli.foreground {
        Priority::Foreground
    } else {
        Priority::Background
    };

    let result = tokio::select! {
        result = run_command(&service, cli.command, priority) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    service.shutdown().await;
    result
}

#[allow(clippy::result_large_err)]
async fn run_command(service: &PortalService, command: Commands, priority: Priority) -> Result<()> {
    match command {
        Commands::Fetch { topic } => {
            let data = fetch(service, Topic::new(topic), priority).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Commands::Send { topic, json } => {
            let payload: Value = serde_json::from_str(&json)?;
            let request = SendRequest::with_value(topic, payload)
                .with_priority(priority)
                .report_network_errors();
            service.send(request).await?;
            println!("sent");
        }
        Commands::Upload { file, dest } => {
            let request = UploadRequest::new(file, dest)
                .with_priority(priority)
                .report_network_errors();
            service.upload(request).await?;
            println!("uploaded");
        }
        Commands::Watch { topics } => watch(service, topics, priority).await?,
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
async fn fetch(service: &PortalService, topic: Topic, priority: Priority) -> Result<Value> {
    let request = FetchRequest::new(topic)
        .with_priority(priority)
        .report_network_errors();
    Ok(service.fetch(request).await?)
}

/// Print each topic once, then again whenever it changes.
#[allow(clippy::result_large_err)]
async fn watch(service: &PortalService, topics: Vec<String>, priority: Priority) -> Result<()> {
    let (merged_tx, mut merged) = mpsc::unbounded_channel::<(Topic, TopicEvent)>();
    let mut live: HashSet<Topic> = HashSet::new();

    for name in topics {
        let topic = Topic::new(name);
        let (listener, mut events) = Listener::channel();
        service.subscribe(topic.clone(), &listener, true);
        live.insert(topic.clone());

        let forward = merged_tx.clone();
        let forwarded = topic.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if forward.send((forwarded.clone(), event)).is_err() {
                    break;
                }
            }
        });

        print_topic(service, &topic, priority).await;
    }
    drop(merged_tx);

    while let Some((topic, event)) = merged.recv().await {
        match event {
            TopicEvent::Changed => print_topic(service, &topic, priority).await,
            TopicEvent::NetworkError(error) => warn!(%topic, %error, "Network error while watching"),
            TopicEvent::DataError(error) => {
                eprintln!("{topic}: {error}, no longer watching");
                live.remove(&topic);
                if live.is_empty() {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn print_topic(service: &PortalService, topic: &Topic, priority: Priority) {
    match fetch(service, topic.clone(), priority).await {
        Ok(data) => match serde_json::to_string(&data) {
            Ok(text) => println!("{topic}: {text}"),
            Err(err) => warn!(%topic, error = %err, "Failed to render data"),
        },
        Err(err) => eprintln!("{topic}: {err}"),
    }
}
