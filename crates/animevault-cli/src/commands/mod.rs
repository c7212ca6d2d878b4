pub mod auth;
pub mod catalog;
pub mod config;
pub mod gallery;
pub mod list;
pub mod progress;
pub mod prompts;

use anime_list_config::{Config, PathManager};
use anime_list_core::{ListStore, SyncPhase};
use anime_list_sources::{FirebaseServices, ServiceFactory};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use progress::Spinner;

/// Container layout when `ANIMEVAULT_BASE_PATH` is set, platform config dir otherwise
pub fn path_manager() -> Result<PathManager> {
    if std::env::var_os("ANIMEVAULT_BASE_PATH").is_some() {
        return Ok(PathManager::from_docker_env());
    }
    PathManager::new().map_err(|e| eyre!("{}", e))
}

pub fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))
}

pub async fn connect(factory: &ServiceFactory) -> Result<FirebaseServices> {
    factory
        .firebase()
        .await
        .map_err(|e| eyre!("Could not connect to the list backend: {}", e))
}

/// Start the list store and wait for the first delivery of the user's list
pub async fn open_list(services: &FirebaseServices) -> Result<ListStore> {
    let store = ListStore::new(services.documents(), services.identity());

    let spinner = Spinner::start("Syncing your list...");
    let state = store.ready().await;
    spinner.finish();

    match state.phase {
        SyncPhase::Unauthenticated => Err(eyre!("Not signed in. Run `animevault auth sign-in` first.")),
        SyncPhase::Errored => Err(eyre!(
            "Could not sync your list: {}",
            state.error.unwrap_or_else(|| "unknown error".to_string())
        )),
        SyncPhase::Initializing | SyncPhase::Synchronized => Ok(store),
    }
}

/// Drop markup from catalog descriptions for terminal display
pub fn plain_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            rest = &rest[start..];
            break;
        };
        let tag = rest[start + 1..start + end].trim().to_lowercase();
        if tag.starts_with("br") || tag == "/p" {
            text.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    text.push_str(rest);
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_strips_tags() {
        assert_eq!(
            plain_text("Humanity <i>fights</i> back.<br><br>Source: Kodansha &amp; friends"),
            "Humanity fights back.\n\nSource: Kodansha & friends"
        );
    }

    #[test]
    fn test_plain_text_unclosed_tag() {
        assert_eq!(plain_text("a < b"), "a < b");
    }
}
