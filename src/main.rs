// src/main.rs

use anyhow::{bail, Context, Result};
use songlib::config::default_config_path;
use songlib::{
    load_library, open_catalog, save_library, FileLibrary, Librarian, LibraryConfig, MountTable,
    RootStep,
};
use std::env;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: songlib [--config FILE] <scan|watch|list|move-root OLD NEW|remove-root ROOT...>";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_path = match args.iter().position(|a| a == "--config") {
        Some(idx) => {
            if idx + 1 >= args.len() {
                bail!("--config needs a file\n{}", USAGE);
            }
            let path = PathBuf::from(args.remove(idx + 1));
            args.remove(idx);
            path
        }
        None => default_config_path(),
    };

    let Some(command) = args.first().cloned() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let config = LibraryConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let mut conn = open_catalog(&config.catalog_path)?;
    let mut library = FileLibrary::with_fs("songs", MountTable::new(config.mount_roots.clone()));
    library.set_exclude(config.exclude.clone());
    let loaded = load_library(&mut library, &mut conn)?;
    tracing::info!("Catalog: {} songs ({} live, {} masked)", loaded, library.len(), library.masked_count());

    match command.as_str() {
        "list" => {
            for song in library.iter() {
                println!("{}", song.path().display());
            }
            for mount_point in library.masked_mount_points() {
                println!(
                    "# masked: {} ({} songs)",
                    mount_point.display(),
                    library.get_masked(mount_point).len()
                );
            }
        }
        "scan" => {
            library.rebuild(false);
            library.scan(&config.scan_dirs);
        }
        "watch" => {
            library.rebuild(false);
            library.scan(&config.scan_dirs);
            save_library(&mut library, &mut conn)?;
            if !config.watch {
                tracing::warn!("Watching disabled in config; nothing to do");
                return Ok(());
            }

            let mut librarian = Librarian::new(&config)?;
            librarian.start_watching(&config.scan_dirs)?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted, shutting down...");
                }
                on_signal.cancel();
            });
            librarian.run(&mut library, cancel).await?;
        }
        "move-root" => {
            let (Some(old), Some(new)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            let mut failed = 0;
            for progress in library.move_root(&PathBuf::from(old), &PathBuf::from(new)) {
                if let RootStep::Moved { persisted: false, .. } = progress.step {
                    failed += 1;
                }
                tracing::debug!("move-root {}/{} ({:.0}%)", progress.done, progress.total, progress.fraction() * 100.0);
            }
            if failed > 0 {
                tracing::warn!("{} songs moved in the catalog but not written to disk", failed);
            }
        }
        "remove-root" => {
            let roots: Vec<PathBuf> = args.iter().skip(1).map(PathBuf::from).collect();
            if roots.is_empty() {
                bail!(USAGE);
            }
            let count = library.remove_roots(&roots).count();
            tracing::info!("Removed {} songs", count);
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    if library.is_dirty() {
        save_library(&mut library, &mut conn)?;
    }
    Ok(())
}
