use super::{connect, open_list};
use crate::output::{or_dash, styled_table, Output};
use anime_list_core::{status_counts, ListQuery, ListState, ListStore, Mutation, SyncPhase};
use anime_list_models::ListItem;
use anime_list_sources::ServiceFactory;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::Cell;
use owo_colors::OwoColorize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// How long `add`/`remove` wait for the change to come back on the live channel
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn show_list(factory: &ServiceFactory, query: ListQuery, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let store = open_list(&services).await?;
    let items = store.items();
    let selected = query.apply(&items);

    if !output.is_human() {
        output.data(&selected);
        return Ok(());
    }
    if items.is_empty() {
        output.info("Your list is empty. Find something with `animevault search <title>` and add it with `animevault add <id>`.");
        return Ok(());
    }
    if selected.is_empty() {
        output.info("No entries match your filters");
        return Ok(());
    }

    let mut table = styled_table(&["ID", "Title", "Status", "Episodes", "Season", "Studio", "Added"]);
    for item in &selected {
        table.add_row(vec![
            Cell::new(item.id),
            Cell::new(item.display_title()),
            Cell::new(item.status.label()),
            Cell::new(or_dash(item.episodes)),
            Cell::new(or_dash(item.season_year)),
            Cell::new(or_dash(item.studio.as_deref())),
            Cell::new(item.added_at.format("%Y-%m-%d").to_string()),
        ]);
    }
    output.table(&table);

    let summary: Vec<String> = status_counts(&items)
        .into_iter()
        .map(|(status, count)| format!("{} {}", count, status.label()))
        .collect();
    output.info(format!(
        "{} of {} shown ({}, sorted by {})",
        selected.len(),
        items.len(),
        summary.join(", "),
        query.sort
    ));
    Ok(())
}

pub async fn add(factory: &ServiceFactory, id: i64, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let store = open_list(&services).await?;

    if store.is_in_list(id) {
        output.outcome("Already in your list", &json!({"id": id, "changed": false}));
        return Ok(());
    }

    let media = factory
        .anilist()
        .media(id)
        .await
        .map_err(|e| eyre!("Could not load anime {}: {}", id, e))?;
    let title = media.title.preferred().to_string();

    match store.add_item(&media).await? {
        Mutation::Unchanged => {
            output.outcome(format!("{} is already in your list", title), &json!({"id": id, "changed": false}));
        }
        Mutation::Applied => {
            confirm(&store, output, |state| state.contains(id)).await;
            output.outcome(format!("Added {}", title), &json!({"id": id, "changed": true}));
        }
    }
    Ok(())
}

pub async fn remove(factory: &ServiceFactory, id: i64, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let store = open_list(&services).await?;
    let title = store
        .items()
        .iter()
        .find(|item| item.id == id)
        .map(|item| item.display_title().to_string());

    match store.remove_item(id).await? {
        Mutation::Unchanged => {
            output.outcome(format!("{} is not in your list", id), &json!({"id": id, "changed": false}));
        }
        Mutation::Applied => {
            confirm(&store, output, |state| !state.contains(id)).await;
            let title = title.unwrap_or_else(|| id.to_string());
            output.outcome(format!("Removed {}", title), &json!({"id": id, "changed": true}));
        }
    }
    Ok(())
}

/// Wait for the committed change to reach the mirror
async fn confirm(store: &ListStore, output: &Output, applied: impl FnMut(&ListState) -> bool) {
    let mut state = store.watch_state();
    let synced = matches!(
        tokio::time::timeout(CONFIRM_TIMEOUT, state.wait_for(applied)).await,
        Ok(Ok(_))
    );
    if !synced {
        output.warn("Saved, but the change has not synced back yet");
    }
}

pub async fn watch(factory: &ServiceFactory, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let store = open_list(&services).await?;
    let mut state = store.watch_state();
    let mut known = snapshot(&state.borrow_and_update());

    output.outcome(
        format!("Watching your list ({} entries). Press Ctrl-C to stop.", known.len()),
        &json!({"type": "ready", "count": known.len()}),
    );

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    return Err(eyre!("List sync stopped"));
                }
                let current = state.borrow_and_update().clone();
                match current.phase {
                    SyncPhase::Errored => {
                        output.warn(format!(
                            "Sync interrupted: {}. Retrying...",
                            current.error.as_deref().unwrap_or("unknown error")
                        ));
                        tokio::time::sleep(Duration::from_secs(factory.config().sync.poll_interval_secs.max(1))).await;
                        store.resync();
                        continue;
                    }
                    SyncPhase::Unauthenticated => {
                        return Err(eyre!("Signed out while watching"));
                    }
                    SyncPhase::Initializing => continue,
                    SyncPhase::Synchronized => {}
                }

                let next = snapshot(&current);
                report_changes(&known, &next, output);
                known = next;
            }
            _ = tokio::signal::ctrl_c() => {
                output.info("Stopped watching");
                return Ok(());
            }
        }
    }
}

fn snapshot(state: &ListState) -> BTreeMap<i64, ListItem> {
    state.items.iter().map(|item| (item.id, item.clone())).collect()
}

fn report_changes(before: &BTreeMap<i64, ListItem>, after: &BTreeMap<i64, ListItem>, output: &Output) {
    for (id, item) in after {
        if !before.contains_key(id) {
            if output.is_human() {
                output.info(format!("{} {} ({})", "+".green(), item.display_title(), id));
            } else {
                output.json(&json!({"type": "added", "id": id, "title": item.display_title()}));
            }
        }
    }
    for (id, item) in before {
        if !after.contains_key(id) {
            if output.is_human() {
                output.info(format!("{} {} ({})", "-".red(), item.display_title(), id));
            } else {
                output.json(&json!({"type": "removed", "id": id, "title": item.display_title()}));
            }
        }
    }
}
