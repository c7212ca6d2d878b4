use super::plain_text;
use crate::output::{detail_table, or_dash, styled_table, Output};
use anime_list_core::{ListStore, SyncPhase};
use anime_list_models::CatalogMedia;
use anime_list_sources::anilist::client::MIN_SEARCH_CHARS;
use anime_list_sources::mal::MalAnime;
use anime_list_sources::{IdentityProvider, ServiceFactory};
use chrono::Utc;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing::debug;

pub async fn search(factory: &ServiceFactory, term: &str, output: &Output) -> Result<()> {
    let term = term.trim();
    if term.chars().count() < MIN_SEARCH_CHARS {
        output.warn(format!("Type at least {} characters to search", MIN_SEARCH_CHARS));
        return Ok(());
    }

    let results = factory
        .anilist()
        .search(term)
        .await
        .map_err(|e| eyre!("Search failed: {}", e))?;

    if !output.is_human() {
        output.data(&results);
        return Ok(());
    }
    if results.is_empty() {
        output.info(format!("No anime found for \"{}\"", term));
        return Ok(());
    }

    let mut table = styled_table(&["ID", "Title", "Format", "Episodes", "Score", "Year", "Status"]);
    for media in &results {
        table.add_row(vec![
            Cell::new(media.id),
            Cell::new(media.title.preferred()),
            Cell::new(or_dash(media.format.as_deref())),
            Cell::new(or_dash(media.episodes)),
            Cell::new(or_dash(media.average_score.map(|s| format!("{}%", s)))),
            Cell::new(or_dash(media.season_year)),
            Cell::new(or_dash(media.status.map(|s| s.label()))),
        ]);
    }
    output.table(&table);
    Ok(())
}

pub async fn show(factory: &ServiceFactory, id: i64, output: &Output) -> Result<()> {
    let media = factory
        .anilist()
        .media(id)
        .await
        .map_err(|e| eyre!("Could not load anime {}: {}", id, e))?;
    let in_list = list_membership(factory, id).await;

    if !output.is_human() {
        let mut value = serde_json::to_value(&media)?;
        value["inList"] = json!(in_list);
        output.json(&value);
        return Ok(());
    }

    output.table(&media_table(&media, in_list));
    if let Some(description) = media.description.as_deref().filter(|d| !d.is_empty()) {
        if !output.is_quiet() {
            println!("\n{}\n", plain_text(description));
        }
    }
    Ok(())
}

fn media_table(media: &CatalogMedia, in_list: Option<bool>) -> Table {
    let mut table = detail_table(media.title.preferred());
    let mut row = |label: &str, value: String| {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    };

    row("AniList ID", media.id.to_string());
    row("Romaji", media.title.romaji.clone());
    if let Some(native) = media.title.native.as_deref() {
        row("Native", native.to_string());
    }
    row("Status", or_dash(media.status.map(|s| s.label())));
    row("Format", or_dash(media.format.as_deref()));
    row("Episodes", or_dash(media.episodes));
    row("Duration", or_dash(media.duration.map(|d| format!("{} min", d))));
    let season = match (media.season, media.season_year) {
        (Some(season), Some(year)) => Some(format!("{} {}", season, year)),
        (None, Some(year)) => Some(year.to_string()),
        _ => None,
    };
    row("Season", or_dash(season));
    row("Aired", format!("{} to {}", or_dash(media.start_date), or_dash(media.end_date)));
    row("Studio", or_dash(media.main_studio()));
    row("Score", or_dash(media.average_score.map(|s| format!("{}%", s))));
    row("Popularity", or_dash(media.popularity));
    if !media.genres.is_empty() {
        row("Genres", media.genres.join(", "));
    }
    let tags: Vec<&str> = media.top_tags(5).into_iter().map(|t| t.name.as_str()).collect();
    if !tags.is_empty() {
        row("Tags", tags.join(", "));
    }
    let characters: Vec<String> = media
        .characters
        .edges
        .iter()
        .take(6)
        .filter_map(|edge| edge.node.name.full.clone())
        .collect();
    if !characters.is_empty() {
        row("Characters", characters.join(", "));
    }
    let recommended: Vec<String> = media
        .recommended()
        .take(5)
        .map(|r| format!("{} ({})", r.title.preferred(), r.id))
        .collect();
    if !recommended.is_empty() {
        row("Recommended", recommended.join("\n"));
    }
    if let Some(url) = media.trailer.as_ref().and_then(|t| t.url()) {
        row("Trailer", url);
    }
    let links: Vec<String> = media
        .external_links
        .iter()
        .filter_map(|link| link.url.as_ref().map(|url| format!("{}: {}", link.site, url)))
        .collect();
    if !links.is_empty() {
        row("Links", links.join("\n"));
    }
    match in_list {
        Some(true) => row("My list", "✓ in your list".green().to_string()),
        Some(false) => row("My list", "not in your list".bright_black().to_string()),
        None => {}
    }
    table
}

/// Whether the signed-in user's list holds `id`; `None` when that cannot be known
async fn list_membership(factory: &ServiceFactory, id: i64) -> Option<bool> {
    if !factory.config().is_firebase_configured() {
        return None;
    }
    let services = match factory.firebase().await {
        Ok(services) => services,
        Err(err) => {
            debug!(error = %err, "skipping list membership");
            return None;
        }
    };
    services.auth.current_user_id()?;

    let store = ListStore::new(services.documents(), services.identity());
    let state = store.ready().await;
    match state.phase {
        SyncPhase::Synchronized => Some(state.contains(id)),
        _ => {
            debug!(phase = %state.phase, error = ?state.error, "list not available");
            None
        }
    }
}

pub async fn trending(factory: &ServiceFactory, limit: usize, output: &Output) -> Result<()> {
    let mal = factory
        .mal()
        .map_err(|e| eyre!("MyAnimeList is not available: {}", e))?;
    let top = mal
        .top_seasonal(Utc::now(), limit)
        .await
        .map_err(|e| eyre!("Could not load seasonal anime: {}", e))?;

    if !output.is_human() {
        output.data(&top);
        return Ok(());
    }
    if top.is_empty() {
        output.info("Nothing airing this season yet");
        return Ok(());
    }

    let mut table = styled_table(&["#", "MAL ID", "Title", "English title"]);
    for (rank, anime) in top.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(anime.id),
            Cell::new(&anime.title),
            Cell::new(or_dash(anime.english_title())),
        ]);
    }
    output.table(&table);
    Ok(())
}

pub async fn mal(factory: &ServiceFactory, id: i64, output: &Output) -> Result<()> {
    let client = factory
        .mal()
        .map_err(|e| eyre!("MyAnimeList is not available: {}", e))?;
    let anime = client
        .anime(id)
        .await
        .map_err(|e| eyre!("Could not load MyAnimeList entry {}: {}", id, e))?;

    if !output.is_human() {
        output.data(&anime);
        return Ok(());
    }

    output.table(&mal_table(&anime));
    if let Some(synopsis) = anime.synopsis.as_deref().filter(|s| !s.is_empty()) {
        if !output.is_quiet() {
            println!("\n{}\n", synopsis);
        }
    }
    Ok(())
}

fn mal_table(anime: &MalAnime) -> Table {
    let mut table = detail_table(&anime.title);
    let mut row = |label: &str, value: String| {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    };

    row("MAL ID", anime.id.to_string());
    if let Some(english) = anime.english_title() {
        row("English", english.to_string());
    }
    row("Type", or_dash(anime.media_type.as_deref()));
    row("Status", or_dash(anime.status.as_deref()));
    row("Episodes", or_dash(anime.num_episodes));
    row(
        "Aired",
        format!("{} to {}", or_dash(anime.start_date.as_deref()), or_dash(anime.end_date.as_deref())),
    );
    row(
        "Season",
        or_dash(anime.start_season.as_ref().map(|s| format!("{} {}", s.season, s.year))),
    );
    if let Some(broadcast) = &anime.broadcast {
        row(
            "Broadcast",
            format!(
                "{} {}",
                broadcast.day_of_the_week.as_deref().unwrap_or("-"),
                broadcast.start_time.as_deref().unwrap_or("")
            )
            .trim()
            .to_string(),
        );
    }
    row("Source", or_dash(anime.source.as_deref()));
    row(
        "Duration",
        or_dash(anime.average_episode_duration.map(|secs| format!("{} min", secs / 60))),
    );
    row("Rating", or_dash(anime.rating.as_deref()));
    row("Score", or_dash(anime.mean.map(|m| format!("{:.2}", m))));
    row("Rank", or_dash(anime.rank.map(|r| format!("#{}", r))));
    row("Popularity", or_dash(anime.popularity.map(|p| format!("#{}", p))));
    row("Members", or_dash(anime.num_list_users));
    let genres: Vec<&str> = anime.genres.iter().map(|g| g.name.as_str()).collect();
    if !genres.is_empty() {
        row("Genres", genres.join(", "));
    }
    let studios: Vec<&str> = anime.studios.iter().map(|s| s.name.as_str()).collect();
    if !studios.is_empty() {
        row("Studios", studios.join(", "));
    }
    let related: Vec<String> = anime
        .related_anime
        .iter()
        .map(|r| {
            format!(
                "{} ({}, {})",
                r.node.title,
                r.relation_type_formatted.as_deref().unwrap_or("Related"),
                r.node.id
            )
        })
        .collect();
    if !related.is_empty() {
        row("Related", related.join("\n"));
    }
    let recommended: Vec<String> = anime
        .recommendations
        .iter()
        .take(5)
        .map(|r| format!("{} ({})", r.node.title, r.node.id))
        .collect();
    if !recommended.is_empty() {
        row("Recommended", recommended.join("\n"));
    }
    table
}
