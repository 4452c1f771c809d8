//! Command-line client for the media gallery.

use api_client::{ApiClient, Category, MediaItem, MediaPatch, Tags, Visibility};
use clap::{Parser, Subcommand};
use gallery::{
    CategoryFilter, Filters, Gallery, GalleryNotice, MediaBlob, NewMediaItem, SortOrder,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(
    name = "mediagallery",
    author,
    version,
    about = "Media gallery command-line client"
)]
struct Cli {
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the backend base URL
    #[arg(long)]
    backend_url: Option<String>,
    /// Override the backend API key
    #[arg(long)]
    api_key: Option<String>,
    /// Enable tokio console for debugging
    #[arg(long)]
    debug_console: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List gallery items
    List {
        /// Match title or uploader, or any word against the tags
        #[arg(long)]
        search: Option<String>,
        /// Category name, or "All"
        #[arg(long, default_value = "All")]
        category: CategoryFilter,
        /// newest, most_liked or most_downloaded
        #[arg(long, default_value = "newest")]
        sort: SortOrder,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Upload a file and create its gallery item
    Upload {
        file: PathBuf,
        /// Defaults to the file name without extension
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "Anonymous")]
        uploader: String,
        #[arg(long)]
        category: Option<Category>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// External link shown with the item
        #[arg(long)]
        link: Option<String>,
        /// Disallow downloads
        #[arg(long)]
        no_download: bool,
        /// Make the item private
        #[arg(long)]
        private: bool,
    },
    /// Update fields of an existing item
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        /// Comma-separated tags, replacing the current ones
        #[arg(long)]
        tags: Option<String>,
        #[arg(long, conflicts_with = "clear_link")]
        link: Option<String>,
        /// Remove the external link
        #[arg(long)]
        clear_link: bool,
        #[arg(long)]
        allow_download: Option<bool>,
        /// public or private
        #[arg(long)]
        visibility: Option<Visibility>,
    },
    /// Count a download of an item
    Download { id: String },
    /// Delete an item and its stored file
    Delete {
        id: String,
        /// Public URL of the item's file
        url: String,
    },
    /// Write backend settings to the config file
    InitConfig {
        #[arg(long)]
        backend_url: String,
        #[arg(long)]
        api_key: String,
    },
}

fn init_logging(
    cfg: &config::AppConfig,
    debug_console: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    #[cfg(feature = "tokio-console")]
    {
        if debug_console {
            console_subscriber::init();
            return Ok(None);
        }
    }
    #[cfg(not(feature = "tokio-console"))]
    {
        if debug_console {
            eprintln!("tokio console requested but the tokio-console feature is not enabled");
        }
    }

    std::fs::create_dir_all(&cfg.data_dir)?;
    let file_appender = rolling::daily(&cfg.data_dir, "mediagallery.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stdout.and(file_writer))
        .init();
    Ok(Some(guard))
}

fn print_item(item: &MediaItem) {
    println!(
        "{}  [{}] {} by {} ({}) likes: {} downloads: {}",
        item.id,
        item.category,
        item.title,
        item.uploader,
        item.created_at.format("%Y-%m-%d"),
        item.likes,
        item.downloads
    );
    if !item.tags.is_empty() {
        println!("    tags: {}", item.tags.as_slice().join(", "));
    }
}

fn report_notices(rx: &mut mpsc::UnboundedReceiver<GalleryNotice>) {
    while let Ok(notice) = rx.try_recv() {
        match notice {
            GalleryNotice::BlobRemovalFailed { path, error } => {
                println!("Warning: file {} could not be removed from storage: {}", path, error)
            }
            GalleryNotice::DownloadRolledBack { id, error } => {
                println!("Warning: download count for {} was not saved: {}", id, error)
            }
        }
    }
}

async fn run(
    gallery: Gallery<ApiClient>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List {
            search,
            category,
            sort,
            pages,
        } => {
            let gallery = gallery.with_view(Filters { search, category }, sort);
            gallery.refresh().await?;
            let mut loaded = 1;
            while loaded < pages && gallery.has_more() {
                gallery.load_more().await?;
                loaded += 1;
            }
            let items = gallery.items();
            if items.is_empty() {
                println!("No items found");
            }
            for item in &items {
                print_item(item);
            }
            if gallery.has_more() {
                println!("More items available (use --pages)");
            }
            Ok(())
        }
        Commands::Upload {
            file,
            title,
            description,
            uploader,
            category,
            tags,
            link,
            no_download,
            private,
        } => {
            let data = tokio::fs::read(&file).await?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or("file path has no file name")?
                .to_string();
            let blob = MediaBlob::new(file_name, data);
            let mut meta = NewMediaItem::for_blob(&blob, uploader);
            if let Some(t) = title {
                meta.title = t;
            }
            if let Some(d) = description {
                meta.description = d;
            }
            if let Some(c) = category {
                meta.category = c;
            }
            if let Some(t) = tags {
                meta.tags = Tags::parse_list(&t);
            }
            meta.external_link = link;
            meta.allow_download = !no_download;
            if private {
                meta.visibility = Visibility::Private;
            }
            let item = gallery.add(meta, blob).await?;
            println!("Uploaded {}", item.id);
            print_item(&item);
            Ok(())
        }
        Commands::Edit {
            id,
            title,
            description,
            category,
            tags,
            link,
            clear_link,
            allow_download,
            visibility,
        } => {
            let external_link = if clear_link { Some(None) } else { link.map(Some) };
            let patch = MediaPatch {
                title,
                description,
                category,
                tags: tags.as_deref().map(Tags::parse_list),
                external_link,
                allow_download,
                visibility,
            };
            let item = gallery.edit(&id, patch).await?;
            println!("Updated {}", item.id);
            print_item(&item);
            Ok(())
        }
        Commands::Download { id } => {
            gallery.increment_downloads(&id).await?;
            println!("Counted download for {}", id);
            Ok(())
        }
        Commands::Delete { id, url } => {
            gallery.delete(&id, &url).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        backend_url: cli.backend_url.clone(),
        api_key: cli.api_key.clone(),
    };
    let cfg = match config::AppConfig::load_from(cli.config.clone()) {
        Ok(cfg) => cfg.apply_overrides(&overrides),
        Err(e) => {
            eprintln!("Configuration Error");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    if let Commands::InitConfig {
        backend_url,
        api_key,
    } = &cli.command
    {
        let cfg = cfg.apply_overrides(&config::AppConfigOverrides {
            backend_url: Some(backend_url.clone()),
            api_key: Some(api_key.clone()),
            ..Default::default()
        });
        let path = cli.config.clone().unwrap_or_else(config::default_path);
        cfg.save_to(Some(path.clone()))?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    let client_config = match cfg.client_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration Error");
            eprintln!("  {}", e);
            eprintln!("  Set GALLERY_BACKEND_URL and GALLERY_API_KEY, or run `mediagallery init-config`.");
            std::process::exit(1);
        }
    };

    let _guard = init_logging(&cfg, cli.debug_console)?;
    tracing::debug!(backend = %client_config.base_url, bucket = %client_config.bucket, "Using backend");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let gallery = Gallery::new(Arc::new(ApiClient::new(client_config)))
        .with_bucket(cfg.bucket.clone())
        .with_notices(tx);

    let result = run(gallery, cli.command).await;
    report_notices(&mut rx);
    result
}
