use crate::output::{detail_table, Output};
use crate::ConfigCommands;
use anime_list_config::Config;
use anime_list_sources::ServiceFactory;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::Cell;
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run_config(cmd: ConfigCommands, factory: &ServiceFactory, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { full } => show_config(factory, full, output),
        ConfigCommands::Init { force } => init_config(factory, force, output),
    }
}

fn mask_string(s: &str) -> String {
    if s.is_empty() || s.starts_with("YOUR_") {
        return "<not set>".to_string();
    }
    if s.len() <= 4 {
        return "*".repeat(s.len());
    }
    format!("{}***{}", &s[..2], &s[s.len() - 2..])
}

fn show_config(factory: &ServiceFactory, full: bool, output: &Output) -> Result<()> {
    let config_file = factory.paths().config_file();
    let config = factory.config();
    let mask = |s: &str| if full { s.to_string() } else { mask_string(s) };
    let validation = config.validate().err().map(|e| e.to_string());

    if !output.is_human() {
        let mut value = serde_json::to_value(config)?;
        if !full {
            if let Some(firebase) = value.get_mut("firebase").and_then(|f| f.as_object_mut()) {
                if let Some(key) = firebase.get("api_key").and_then(|k| k.as_str()).map(mask_string) {
                    firebase.insert("api_key".to_string(), json!(key));
                }
            }
            if let Some(mal) = value.get_mut("mal").and_then(|m| m.as_object_mut()) {
                if let Some(id) = mal.get("client_id").and_then(|k| k.as_str()).map(mask_string) {
                    mal.insert("client_id".to_string(), json!(id));
                }
            }
        }
        output.json(&json!({
            "config_file": config_file.display().to_string(),
            "exists": config_file.exists(),
            "services": config.configured_services(),
            "problem": validation,
            "config": value,
        }));
        return Ok(());
    }

    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("Run `animevault config init` to create one. Defaults are shown below.");
    }

    let mut table = detail_table("Configuration");
    table.add_row(vec![Cell::new("Config File"), Cell::new(config_file.display().to_string())]);
    table.add_row(vec![Cell::new("AniList endpoint"), Cell::new(&config.anilist.endpoint)]);
    match &config.mal {
        Some(mal) => {
            table.add_row(vec![Cell::new("MAL client id"), Cell::new(mask(&mal.client_id))]);
            table.add_row(vec![Cell::new("MAL base URL"), Cell::new(&mal.base_url)]);
        }
        None => {
            table.add_row(vec![Cell::new("MAL"), Cell::new("Not configured".bright_black().to_string())]);
        }
    }
    match &config.firebase {
        Some(firebase) => {
            table.add_row(vec![Cell::new("Firebase API key"), Cell::new(mask(&firebase.api_key))]);
            table.add_row(vec![Cell::new("Firebase project"), Cell::new(&firebase.project_id)]);
            table.add_row(vec![Cell::new("Storage bucket"), Cell::new(&firebase.storage_bucket)]);
            table.add_row(vec![Cell::new("Database"), Cell::new(&firebase.database_id)]);
        }
        None => {
            table.add_row(vec![
                Cell::new("Firebase"),
                Cell::new("Not configured".bright_black().to_string()),
            ]);
        }
    }
    table.add_row(vec![
        Cell::new("Poll interval"),
        Cell::new(format!("{}s", config.sync.poll_interval_secs)),
    ]);
    table.add_row(vec![
        Cell::new("Request timeout"),
        Cell::new(format!("{}s", config.sync.request_timeout_secs)),
    ]);
    table.add_row(vec![
        Cell::new("Max image size"),
        Cell::new(format!("{} bytes", config.gallery.max_file_size_bytes)),
    ]);
    table.add_row(vec![
        Cell::new("Log file"),
        Cell::new(
            config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stderr".to_string()),
        ),
    ]);
    table.add_row(vec![
        Cell::new("Services"),
        Cell::new(config.configured_services().join(", ")),
    ]);
    output.table(&table);

    match validation {
        Some(problem) => output.warn(problem),
        None => output.success("Configuration is valid"),
    }
    Ok(())
}

fn init_config(factory: &ServiceFactory, force: bool, output: &Output) -> Result<()> {
    let paths = factory.paths();
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        return Err(eyre!(
            "{} already exists (use --force to overwrite)",
            config_file.display()
        ));
    }

    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create directories: {}", e))?;
    Config::template()
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to write {}: {}", config_file.display(), e))?;

    output.outcome(
        format!(
            "Wrote {}. Fill in the [firebase] and [mal] sections to enable lists, the gallery and trending.",
            config_file.display()
        ),
        &json!({"config_file": config_file.display().to_string(), "created": true}),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string(""), "<not set>");
        assert_eq!(mask_string("YOUR_API_KEY"), "<not set>");
        assert_eq!(mask_string("abc"), "***");
        assert_eq!(mask_string("AIzaSyD-secret"), "AI***et");
    }
}
