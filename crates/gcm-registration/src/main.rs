//! Push registration CLI - Entry point.
//!
//! Usage: `gcm-registration [register|unregister|status|send <device_id> [text]|dispatch <json>]`

use anyhow::{bail, Context, Result};
use chrono::Utc;
use gcm_client::GcmClient;
use gcm_registration::{
    Config, LogForwarder, MessageDispatcher, RegistrationCoordinator, RegistrationRequest,
};
use registration_store::{RegistrationStore, Store};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log.level);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(config, &args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config: Config, args: &[String]) -> Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("register");

    let mut client = GcmClient::new(&config.gcm.service_url, &config.app.id, config.gcm.timeout)
        .context("Failed to create push service client")?;
    if let Some(key) = &config.gcm.api_key {
        client = client.with_api_key(key);
    }

    let backend = if config.store.persist {
        Store::file(&config.store.path)
    } else {
        info!("Persistence disabled, using in-memory storage");
        Store::memory()
    };
    let store = Arc::new(RegistrationStore::new(&config.app.id, backend));

    match command {
        "register" => {
            if !client.health_check().await {
                warn!(url = %config.gcm.service_url, "Push service health check failed");
            }

            let coordinator = RegistrationCoordinator::new(store, Arc::new(client));
            let request = RegistrationRequest::new(&config.gcm.sender_id);
            let token = coordinator
                .ensure_registered(config.app.version, &request)
                .await
                .context("Registration failed")?;

            info!(app_version = config.app.version, "Registered");
            println!("{}", token);
        }
        "unregister" => {
            let coordinator = RegistrationCoordinator::new(store, Arc::new(client));
            coordinator
                .unregister()
                .await
                .context("Unregistration failed")?;
            println!("unregistered");
        }
        "status" => match store.get_raw().await.context("Failed to read registration")? {
            Some(record) => {
                let valid = record.is_valid_for(config.app.version);
                println!(
                    "token={} app_version={} saved_at={} valid={}",
                    record.token,
                    record.app_version,
                    record.saved_at.to_rfc3339(),
                    valid
                );
            }
            None => println!("not registered"),
        },
        "send" => {
            let Some(device_id) = args.get(1) else {
                bail!("usage: send <device_id> [text]");
            };
            let text = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| Utc::now().to_rfc2822());

            let mut data = BTreeMap::new();
            data.insert("text".to_string(), text);

            let result = client
                .send(device_id, &data, config.gcm.send_retries)
                .await
                .context("Send failed")?;
            println!("{}", result);
        }
        "dispatch" => {
            let Some(raw) = args.get(1) else {
                bail!("usage: dispatch <json payload>");
            };
            let payload: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(raw).context("Payload must be a JSON object")?;

            let dispatcher = MessageDispatcher::new(Arc::new(LogForwarder));
            let event = dispatcher.dispatch(&payload);
            println!("{}", event.body());
        }
        other => bail!(
            "unknown command '{}' (expected register, unregister, status, send or dispatch)",
            other
        ),
    }

    Ok(())
}
