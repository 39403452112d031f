//! Pattern, validation and guidance subcommands for Waymark.

use serde_json::json;
use waymark_bus::Extension;
use waymark_config::{ConfigStore, ConfigValidator};
use waymark_core::UrlPattern;
use waymark_protocols::{Banner, RuntimeMessage, Tooltip, Tour};

use crate::cmd_config::expect_success;

/// Print how `pattern` parses and whether it matches `url`.
pub(crate) fn match_pattern(pattern: &str, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = UrlPattern::parse(pattern);
    let matched = parsed.matches(url);
    println!("{:<8} {:?}", "pattern", parsed);
    println!("{:<8} {}", "url", url);
    println!("{:<8} {}", "result", if matched { "match" } else { "no match" });
    if matched {
        Ok(())
    } else {
        Err(format!("'{}' does not match {}", pattern, url).into())
    }
}

/// Validate the configuration, then ask the API whether the token is good.
pub(crate) async fn validate(
    store: &ConfigStore,
    extension: &Extension,
    offline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(&store.snapshot());
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    if !result.is_valid() {
        return Err(format!("configuration has {} error(s)", result.errors.len()).into());
    }
    println!("Configuration OK");

    if offline {
        return Ok(());
    }
    let response = extension
        .popup()
        .send(RuntimeMessage::ValidateToken { token: None })
        .await?;
    let response = expect_success(response)?;
    let valid = response
        .data
        .as_ref()
        .and_then(|d| d["valid"].as_bool())
        .unwrap_or(false);
    if valid {
        println!("API token accepted by {}", store.snapshot().api.base_url);
        Ok(())
    } else {
        Err("API token was rejected".into())
    }
}

/// Fetch tours, tooltips and banners for `url` through the background.
pub(crate) async fn list_guidance(
    extension: &Extension,
    url: &str,
    lang: Option<String>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let popup = extension.popup();
    let tours: Vec<Tour> = expect_success(popup.send(RuntimeMessage::FetchTours { url: url.to_string() }).await?)?
        .data_as()
        .unwrap_or_default();
    let tooltips: Vec<Tooltip> = expect_success(
        popup
            .send(RuntimeMessage::FetchTooltips {
                url: url.to_string(),
                lang,
            })
            .await?,
    )?
    .data_as()
    .unwrap_or_default();
    let banners: Vec<Banner> = expect_success(popup.send(RuntimeMessage::FetchBanners { url: url.to_string() }).await?)?
        .data_as()
        .unwrap_or_default();

    match format {
        "json" => {
            let json = json!({ "tours": tours, "tooltips": tooltips, "banners": banners });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if tours.is_empty() && tooltips.is_empty() && banners.is_empty() {
                println!("No guidance for {}", url);
                return Ok(());
            }
            println!("{:<10} {:<24} {:<24} {}", "KIND", "ID", "PATTERN", "TARGET");
            println!("{}", "-".repeat(80));
            for tour in &tours {
                let target = format!("{} step(s){}", tour.steps.len(), if tour.auto_start { ", auto" } else { "" });
                println!("{:<10} {:<24} {:<24} {}", "tour", tour.id, tour.url_pattern, target);
            }
            for tooltip in &tooltips {
                println!("{:<10} {:<24} {:<24} {}", "tooltip", tooltip.id, tooltip.url_pattern, tooltip.selector);
            }
            for banner in &banners {
                let title = banner.title.as_deref().unwrap_or("-");
                println!("{:<10} {:<24} {:<24} {}", "banner", banner.id, banner.url_pattern, title);
            }
        }
    }
    Ok(())
}
