//! Config subcommand handlers for Waymark.

use tracing::info;
use waymark_bus::Extension;
use waymark_config::ConfigStore;
use waymark_protocols::{Response, RuntimeMessage};

use crate::cli::ConfigAction;

/// Handle config subcommands. Edits go through the background, the same way
/// the popup saves settings.
pub(crate) async fn handle_config_command(
    action: ConfigAction,
    store: &ConfigStore,
    extension: &Extension,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            config_show(store);
            Ok(())
        }
        ConfigAction::SetToken { token } => {
            let cleared = token.trim().is_empty();
            let response = extension.popup().send(RuntimeMessage::SetApiToken { token }).await?;
            expect_success(response)?;
            if cleared {
                println!("API token cleared");
            } else {
                println!("API token saved");
            }
            info!("API token updated");
            Ok(())
        }
        ConfigAction::SetUrl { url } => {
            let response = extension.popup().send(RuntimeMessage::SetApiUrl { url }).await?;
            expect_success(response)?;
            println!("API URL set to {}", store.snapshot().api.base_url);
            Ok(())
        }
    }
}

fn config_show(store: &ConfigStore) {
    let config = store.snapshot();
    if let Some(path) = store.path() {
        println!("# {}", path.display());
    }
    println!("{:<28} {}", "api.base_url", config.api.base_url);
    println!("{:<28} {}", "api.token", mask_token(config.api.token.as_deref()));
    println!("{:<28} {}", "api.lang", config.api.lang);
    println!("{:<28} {}s", "api.request_timeout_secs", config.api.request_timeout_secs);
    println!("{:<28} {}ms", "locator.timeout_ms", config.locator.timeout_ms);
    println!("{:<28} {}ms", "bus.request_timeout_ms", config.bus.request_timeout_ms);
    println!("{:<28} {}", "bus.web_app_urls", list_or_dash(&config.bus.web_app_urls));
    println!(
        "{:<28} {}",
        "bus.allowed_external_origins",
        list_or_dash(&config.bus.allowed_external_origins)
    );
}

pub(crate) fn expect_success(response: Response) -> Result<Response, Box<dyn std::error::Error>> {
    if response.success {
        Ok(response)
    } else {
        Err(response.error.unwrap_or_else(|| "request failed".to_string()).into())
    }
}

fn mask_token(token: Option<&str>) -> String {
    match token {
        None => "(not set)".to_string(),
        Some(t) if t.chars().count() <= 8 => "********".to_string(),
        Some(t) => {
            let tail: String = t.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{}", tail)
        }
    }
}

fn list_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
