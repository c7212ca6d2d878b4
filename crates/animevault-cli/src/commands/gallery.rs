use super::connect;
use super::progress::Spinner;
use crate::output::{styled_table, Output};
use crate::GalleryCommands;
use anime_list_core::GalleryService;
use anime_list_sources::ServiceFactory;
use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use comfy_table::Cell;
use serde_json::json;
use std::path::Path;

pub async fn run_gallery(cmd: GalleryCommands, factory: &ServiceFactory, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let gallery = GalleryService::new(
        services.documents(),
        services.objects(),
        services.identity(),
        &factory.config().gallery,
    );

    match cmd {
        GalleryCommands::Upload { file } => upload(&gallery, &file, output).await,
        GalleryCommands::List => list(&gallery, output).await,
        GalleryCommands::Delete { id } => delete(&gallery, &id, output).await,
    }
}

/// Content type from the file extension
fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

async fn upload(gallery: &GalleryService, file: &Path, output: &Output) -> Result<()> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("Invalid file name: {}", file.display()))?
        .to_string();
    let content_type = content_type_for(file);

    let metadata = tokio::fs::metadata(file)
        .await
        .wrap_err_with(|| format!("Cannot read {}", file.display()))?;
    // Reject before reading the whole file
    gallery.validate(content_type, metadata.len())?;
    let bytes = tokio::fs::read(file)
        .await
        .wrap_err_with(|| format!("Cannot read {}", file.display()))?;

    let spinner = Spinner::start(&format!("Uploading {}...", file_name));
    let uploaded = gallery.upload(&file_name, content_type, bytes).await;
    spinner.finish();
    let image = uploaded?;

    if output.is_human() {
        output.success(format!("Uploaded {} ({})", image.file_name, image.id));
        output.info(&image.image_url);
    } else {
        output.json(&json!({
            "id": image.id,
            "imageUrl": image.image_url,
            "storagePath": image.storage_path,
            "fileSize": image.file_size,
        }));
    }
    Ok(())
}

async fn list(gallery: &GalleryService, output: &Output) -> Result<()> {
    let images = gallery.list().await?;

    if !output.is_human() {
        let value: Vec<_> = images
            .iter()
            .map(|image| {
                let mut value = serde_json::to_value(image).unwrap_or_default();
                value["id"] = json!(image.id);
                value
            })
            .collect();
        output.json(&json!(value));
        return Ok(());
    }
    if images.is_empty() {
        output.info("No images uploaded yet");
        return Ok(());
    }

    let mut table = styled_table(&["ID", "File", "Type", "Size", "Uploaded"]);
    for image in &images {
        table.add_row(vec![
            Cell::new(&image.id),
            Cell::new(&image.file_name),
            Cell::new(&image.file_type),
            Cell::new(format!("{:.1} KiB", image.file_size as f64 / 1024.0)),
            Cell::new(
                image
                    .created_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    output.table(&table);
    Ok(())
}

async fn delete(gallery: &GalleryService, id: &str, output: &Output) -> Result<()> {
    let image = gallery
        .find(id)
        .await?
        .ok_or_else(|| eyre!("No image with id {} in your gallery", id))?;
    gallery.delete(&image).await?;
    output.outcome(format!("Deleted {}", image.file_name), &json!({"id": id, "deleted": true}));
    Ok(())
}
