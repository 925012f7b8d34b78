mod credentials_file;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cloudstore_box::BoxClient;
use cloudstore_core::{
    ClientConfig, CloudStorageClient, Credentials, MetaData, ThumbnailProvider, ThumbnailSize,
    format_size,
};
use credentials_file::CredentialsFile;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const ENV_PREFIX: &str = "BOX";
const DEFAULT_LOG_FILTER: &str = "cloudstore=info,cloudstore_box=info,cloudstore_core=info";

/// Command-line access to a Box account.
#[derive(Debug, Parser)]
#[command(name = "cloudstore")]
#[command(version, about = "Browse and modify a Box account by path", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Print the Box authorization page URL
    AuthorizeUrl { redirect_uri: String },

    /// Exchange an authorization code and save credentials
    Login { code: String },

    /// Show metadata (folder listing for folders)
    Stat {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Create a folder and any missing parents
    Mkdir { path: String },

    /// Delete a file, or a folder recursively
    #[command(name = "rm")]
    Remove { path: String },

    /// Copy an item
    #[command(name = "cp")]
    Copy { from: String, to: String },

    /// Move or rename an item
    #[command(name = "mv")]
    Move { from: String, to: String },

    /// Download a file
    Get {
        path: String,
        #[arg(value_name = "LOCAL_FILE")]
        local: PathBuf,
    },

    /// Upload a file, creating missing folders
    Put {
        #[arg(value_name = "LOCAL_FILE")]
        local: PathBuf,
        path: String,
    },

    /// Save a PNG thumbnail
    Thumb {
        path: String,
        #[arg(value_name = "LOCAL_FILE")]
        local: PathBuf,
        /// small, medium-small, medium, medium-large, large or extra-large
        #[arg(value_parser = parse_thumbnail_size)]
        size: Option<ThumbnailSize>,
    },
}

impl Command {
    fn needs_stored_credentials(&self) -> bool {
        !matches!(self, Command::AuthorizeUrl { .. } | Command::Login { .. })
    }
}

fn parse_thumbnail_size(value: &str) -> Result<ThumbnailSize, String> {
    ThumbnailSize::parse(value).ok_or_else(|| format!("unknown thumbnail size: {value}"))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `BOX_ACCESS_TOKEN` wins over the credentials file.
fn load_credentials(store: &CredentialsFile) -> anyhow::Result<Credentials> {
    if let Ok(token) = std::env::var(format!("{ENV_PREFIX}_ACCESS_TOKEN")) {
        let refresh = std::env::var(format!("{ENV_PREFIX}_REFRESH_TOKEN")).ok();
        return Ok(Credentials::new(token, refresh));
    }
    match store.load()? {
        Some(credentials) => Ok(credentials),
        None => bail!(
            "not logged in: run `cloudstore login <code>` or set {ENV_PREFIX}_ACCESS_TOKEN"
        ),
    }
}

fn render(metadata: &MetaData) -> String {
    match metadata {
        MetaData::File(file) => {
            let mut out = format!("{}  file  {}", file.path, format_size(file.size));
            if let Some(modified) = &file.modified {
                out.push_str(&format!("  {modified}"));
            }
            if file.is_deleted {
                out.push_str("  (deleted)");
            }
            out
        }
        MetaData::Folder(folder) => {
            let mut out = format!("{}  folder  {}", folder.path, format_size(folder.size));
            if folder.is_deleted {
                out.push_str("  (deleted)");
            }
            for child in folder.folders.iter().flatten() {
                out.push_str(&format!("\n  {}/", child.name));
            }
            for child in folder.files.iter().flatten() {
                out.push_str(&format!("\n  {}  {}", child.name, format_size(child.size)));
            }
            out
        }
    }
}

async fn run(client: &BoxClient, command: Command, store: &CredentialsFile) -> anyhow::Result<()> {
    match command {
        Command::AuthorizeUrl { redirect_uri } => {
            println!("{}", client.build_authorize_url(&redirect_uri)?);
        }
        Command::Login { code } => {
            client.authenticate_code(&code).await?;
            println!("logged in; credentials saved to {}", store.path().display());
        }
        Command::Stat { path } => println!("{}", render(&client.get_metadata(&path).await?)),
        Command::Mkdir { path } => println!("{}", render(&client.create_folder(&path).await?)),
        Command::Remove { path } => println!("{}", render(&client.delete(&path).await?)),
        Command::Copy { from, to } => println!("{}", render(&client.copy(&from, &to).await?)),
        Command::Move { from, to } => {
            println!("{}", render(&client.move_item(&from, &to).await?));
        }
        Command::Get { path, local } => {
            let data = client.get_file(&path).await?;
            tokio::fs::write(&local, &data)
                .await
                .with_context(|| format!("writing {}", local.display()))?;
            println!("{path} -> {} ({})", local.display(), format_size(data.len() as u64));
        }
        Command::Put { local, path } => {
            let data = tokio::fs::read(&local)
                .await
                .with_context(|| format!("reading {}", local.display()))?;
            println!("{}", render(&client.upload_file(&path, data).await?));
        }
        Command::Thumb { path, local, size } => {
            let data = client.get_thumbnail(&path, size).await?;
            tokio::fs::write(&local, &data)
                .await
                .with_context(|| format!("writing {}", local.display()))?;
            println!("{path} -> {}", local.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = Cli::parse().command;
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ClientConfig::from_env(ENV_PREFIX).context("reading Box client configuration")?;
    let store = CredentialsFile::default_location()?;
    let credentials = if command.needs_stored_credentials() {
        load_credentials(&store)?
    } else {
        Credentials::new(String::new(), None)
    };

    let persist = store.clone();
    let client = BoxClient::with_refresh_hook(
        &config,
        credentials,
        Arc::new(move |credentials: &Credentials| {
            if let Err(err) = persist.save(credentials) {
                warn!(error = %err, "failed to persist refreshed credentials");
            }
        }),
    )?;

    run(&client, command, &store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use cloudstore_core::{FileMetaData, FolderMetaData};

    fn parse(list: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("cloudstore").chain(list.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn no_arguments_shows_help() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
        assert_eq!(parse(&["--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn stat_defaults_to_root() {
        assert_eq!(parse(&["stat"]).unwrap(), Command::Stat { path: "/".into() });
    }

    #[test]
    fn parses_two_path_commands() {
        assert_eq!(
            parse(&["mv", "/a/x", "/b/y"]).unwrap(),
            Command::Move {
                from: "/a/x".into(),
                to: "/b/y".into()
            }
        );
        assert_eq!(
            parse(&["put", "local.txt", "/remote.txt"]).unwrap(),
            Command::Put {
                local: PathBuf::from("local.txt"),
                path: "/remote.txt".into()
            }
        );
        assert_eq!(
            parse(&["authorize-url", "https://localhost/cb"]).unwrap(),
            Command::AuthorizeUrl {
                redirect_uri: "https://localhost/cb".into()
            }
        );
    }

    #[test]
    fn thumb_size_is_optional_and_validated() {
        assert_eq!(
            parse(&["thumb", "/p.jpg", "out.png", "medium-large"]).unwrap(),
            Command::Thumb {
                path: "/p.jpg".into(),
                local: PathBuf::from("out.png"),
                size: Some(ThumbnailSize::MediumLarge),
            }
        );
        assert!(matches!(
            parse(&["thumb", "/p.jpg", "out.png"]).unwrap(),
            Command::Thumb { size: None, .. }
        ));
        let err = parse(&["thumb", "/p.jpg", "out.png", "huge"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_missing_and_extra_arguments() {
        let err = parse(&["cp", "/a"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse(&["rm", "/a", "/b"]).unwrap_err().kind(), ErrorKind::UnknownArgument);
        assert_eq!(parse(&["sync"]).unwrap_err().kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn login_and_authorize_url_need_no_stored_credentials() {
        assert!(!Command::Login { code: "c".into() }.needs_stored_credentials());
        assert!(
            !Command::AuthorizeUrl {
                redirect_uri: "r".into()
            }
            .needs_stored_credentials()
        );
        assert!(Command::Stat { path: "/".into() }.needs_stored_credentials());
    }

    #[test]
    fn renders_folder_listing() {
        let folder = MetaData::Folder(FolderMetaData {
            id: "1".into(),
            name: "Docs".into(),
            path: "/Docs".into(),
            size: 2048,
            modified: None,
            is_deleted: false,
            folders: Some(vec![FolderMetaData {
                id: "2".into(),
                name: "Old".into(),
                path: "/Docs/Old".into(),
                size: 0,
                modified: None,
                is_deleted: false,
                folders: None,
                files: None,
            }]),
            files: Some(vec![FileMetaData {
                id: "3".into(),
                name: "a.txt".into(),
                path: "/Docs/a.txt".into(),
                size: 1536,
                modified: None,
                version: None,
                sha1: None,
                is_deleted: false,
            }]),
        });
        assert_eq!(render(&folder), "/Docs  folder  2KB\n  Old/\n  a.txt  1.5KB");
    }
}
