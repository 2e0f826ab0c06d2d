//! Exercises the adapter against an in-memory storage zone and prints
//! pull zone URLs for what it wrote.

use std::sync::Arc;

use bunny_client_memory::StorageClientMemory;
use bunny_fs::{AdapterConfig, BunnyFilesystem, Bytes, StorageAttributes};
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use miette::{Context, IntoDiagnostic, Result};

#[tokio::main]
async fn main() -> Result<()> {
  let zone = std::env::var("BUNNY_STORAGE_ZONE")
    .into_diagnostic()
    .context("could not read `BUNNY_STORAGE_ZONE`")?;
  let config = AdapterConfig::from_env();
  if config.pull_zone_url.is_empty() {
    miette::bail!("could not read `{}`", AdapterConfig::PULL_ZONE_URL_VAR);
  }

  let client = StorageClientMemory::new(zone);
  let fs = BunnyFilesystem::new(Arc::new(client), &config);

  // populate the zone
  for (path, contents) in [
    ("/index.html", "<html></html>"),
    ("/assets/app.js", "console.log(1)"),
    ("/assets/img/logo.svg", "<svg></svg>"),
  ] {
    fs.write(path, Bytes::from_static(contents.as_bytes()))
      .await
      .with_context(|| format!("failed to write `{path}`"))?;
  }

  // walk it
  let entries: Vec<StorageAttributes> = fs
    .list_contents("/", true)
    .try_collect()
    .await
    .context("failed to list storage zone")?;

  let expires_at = Utc::now() + Duration::hours(1);
  for entry in entries {
    let file = match entry {
      StorageAttributes::File(file) => file,
      StorageAttributes::Dir(dir) => {
        println!("dir  {path}", path = dir.path);
        continue;
      }
    };
    let path = file.path.as_str();
    println!(
      "file {path} ({size} bytes, {mime})",
      size = file.file_size,
      mime = file.mime_type.as_deref().unwrap_or("unknown"),
    );
    println!("  public:    {}", fs.public_url(path)?);
    if !config.pull_zone_token.is_empty() {
      let url = fs
        .temporary_url(path, expires_at, [("width", "200")], None)
        .with_context(|| format!("failed to sign url for `{path}`"))?;
      println!("  temporary: {url}");
    }
  }

  Ok(())
}
