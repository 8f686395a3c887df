use clap::{Parser, Subcommand};
use media_core::config::{storage_dir_from_env_value, url_prefix_from_env_value};
use media_core::{CoreConfig, STAGING_MAX_AGE};
use media_files::{CommitRequest, MediaStore, SidecarSync};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "media")]
#[command(about = "Media asset store CLI")]
struct Cli {
    /// Storage root
    #[arg(long, global = true, env = "MEDIA_STORAGE_DIR")]
    root: Option<String>,

    /// Prefix of derived download URLs
    #[arg(long, global = true, env = "MEDIA_URL_PREFIX")]
    url_prefix: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file into a collection
    Upload {
        tenant: String,
        collection: String,
        /// Local file to upload
        file: PathBuf,
        /// Directory inside the collection
        #[arg(long, default_value = "")]
        dir: String,
        /// MIME type to record (sniffed from the content if omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Write a stored file to stdout or a local path
    Get {
        tenant: String,
        collection: String,
        filename: String,
        #[arg(long, default_value = "")]
        dir: String,
        /// Write to this path instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a file's metadata as JSON
    Meta {
        tenant: String,
        collection: String,
        filename: String,
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// List folders and files in a directory
    Ls {
        tenant: String,
        collection: String,
        #[arg(default_value = "")]
        path: String,
    },
    /// Search filenames in a directory
    Search {
        tenant: String,
        collection: String,
        query: String,
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// Create a folder
    Mkdir {
        tenant: String,
        collection: String,
        path: String,
    },
    /// Delete a folder and everything in it
    Rmdir {
        tenant: String,
        collection: String,
        path: String,
    },
    /// Move a file between directories
    Mv {
        tenant: String,
        collection: String,
        filename: String,
        #[arg(long, default_value = "")]
        from: String,
        #[arg(long, default_value = "")]
        to: String,
    },
    /// Rename a file
    Rename {
        tenant: String,
        collection: String,
        filename: String,
        new_name: String,
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// Delete a file and its metadata
    Rm {
        tenant: String,
        collection: String,
        filename: String,
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// List a tenant's collections
    Collections { tenant: String },
    /// Create a collection
    CreateCollection { tenant: String, collection: String },
    /// Remove abandoned staged uploads
    PurgeStaging {
        /// Minimum age in hours (defaults to 24)
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("media_files=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = CoreConfig::new(
        storage_dir_from_env_value(cli.root),
        &url_prefix_from_env_value(cli.url_prefix),
    )?;
    let store = MediaStore::new(cfg.storage_dir(), cfg.url_prefix());

    match cli.command {
        Some(command) => {
            let stdout = std::io::stdout();
            if let Err(e) = run(&store, command, &mut stdout.lock()) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Use 'media --help' for commands");
        }
    }

    Ok(())
}

fn run(
    store: &MediaStore,
    command: Commands,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Upload {
            tenant,
            collection,
            file,
            dir,
            mime,
        } => {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_owned();
            let size = std::fs::metadata(&file)?.len();
            let request = CommitRequest::new(tenant, collection)
                .with_subdir(dir)
                .with_mime_type(mime)
                .with_declared_size(Some(size));
            let outcome = store.uploads().upload(File::open(&file)?, &name, request)?;
            report_sidecar(&outcome.sidecar);
            writeln!(out, "{}", serde_json::to_string_pretty(&outcome.asset)?)?;
        }
        Commands::Get {
            tenant,
            collection,
            filename,
            dir,
            output,
        } => {
            let mut asset = store.open(&tenant, &collection, &dir, &filename)?;
            match output {
                Some(path) => {
                    let written = std::io::copy(&mut asset.file, &mut File::create(&path)?)?;
                    writeln!(out, "Wrote {} bytes to {}", written, path.display())?;
                }
                None => {
                    std::io::copy(&mut asset.file, out)?;
                }
            }
        }
        Commands::Meta {
            tenant,
            collection,
            filename,
            dir,
        } => {
            let metadata = store.metadata(&tenant, &collection, &dir, &filename)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&metadata)?)?;
        }
        Commands::Ls {
            tenant,
            collection,
            path,
        } => {
            let listing = store.namespace().list_children(&tenant, &collection, &path)?;
            for folder in listing.folders {
                writeln!(out, "{}/", folder)?;
            }
            for file in listing.files {
                writeln!(out, "{}", file)?;
            }
        }
        Commands::Search {
            tenant,
            collection,
            query,
            dir,
        } => {
            for name in store.namespace().search(&tenant, &collection, &dir, &query)? {
                writeln!(out, "{}", name)?;
            }
        }
        Commands::Mkdir {
            tenant,
            collection,
            path,
        } => {
            store.namespace().create_folder(&tenant, &collection, &path)?;
            writeln!(out, "Created {}", path)?;
        }
        Commands::Rmdir {
            tenant,
            collection,
            path,
        } => {
            store.namespace().delete_folder(&tenant, &collection, &path)?;
            writeln!(out, "Deleted {}", path)?;
        }
        Commands::Mv {
            tenant,
            collection,
            filename,
            from,
            to,
        } => {
            let outcome = store
                .relocation()
                .move_asset(&tenant, &collection, &filename, &from, &to)?;
            report_sidecar(&outcome.sidecar);
            writeln!(out, "Moved {} to '{}'", outcome.filename, outcome.address.subdir())?;
        }
        Commands::Rename {
            tenant,
            collection,
            filename,
            new_name,
            dir,
        } => {
            let outcome = store
                .relocation()
                .rename_asset(&tenant, &collection, &filename, &dir, &new_name)?;
            report_sidecar(&outcome.sidecar);
            writeln!(out, "Renamed {} to {}", filename, outcome.filename)?;
        }
        Commands::Rm {
            tenant,
            collection,
            filename,
            dir,
        } => {
            let outcome = store.delete(&tenant, &collection, &dir, &filename)?;
            report_sidecar(&outcome.sidecar);
            writeln!(out, "Deleted {}", outcome.filename)?;
        }
        Commands::Collections { tenant } => {
            let collections = store.namespace().list_collections(&tenant)?;
            if collections.is_empty() {
                writeln!(out, "No collections found.")?;
            }
            for name in collections {
                writeln!(out, "{}", name)?;
            }
        }
        Commands::CreateCollection { tenant, collection } => {
            store.namespace().create_collection(&tenant, &collection)?;
            writeln!(out, "Created collection {}/{}", tenant, collection)?;
        }
        Commands::PurgeStaging { max_age_hours } => {
            let max_age = max_age_hours
                .map(|h| Duration::from_secs(h.saturating_mul(60 * 60)))
                .unwrap_or(STAGING_MAX_AGE);
            let removed = store.uploads().purge_stale(max_age)?;
            writeln!(out, "Removed {} staged uploads", removed)?;
        }
    }

    Ok(())
}

fn report_sidecar(sync: &SidecarSync) {
    if let SidecarSync::Failed(reason) = sync {
        eprintln!("Warning: metadata sidecar is out of date: {}", reason);
    }
}
