pub mod business;
pub mod event;
pub mod feed;
pub mod interests;
pub mod pending;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use whatson_sync::store::ProgressFn;
use whatson_sync::App;

/// The signed-in business code, or an error telling the user to log in.
pub async fn signed_in_code(app: &App) -> Result<String> {
    match app.admin().current().await? {
        Some(code) => Ok(code),
        None => bail!("not signed in, run `whatson login <code>` first"),
    }
}

/// Uploads a local media file, drawing a percentage on stderr while it runs.
pub async fn upload_media(app: &App, local: &Path, kind: &str) -> Result<String> {
    let ext = local
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
        .to_ascii_lowercase();
    let name = format!("{kind}_{}.{ext}", Utc::now().timestamp_millis());

    let progress: ProgressFn = Arc::new(|p| eprint!("\rUploading... {p:>3}%"));
    let url = app.store().upload_blob(local, &name, Some(progress)).await;
    eprintln!();
    Ok(url?)
}
