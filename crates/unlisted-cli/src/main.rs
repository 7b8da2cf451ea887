//! Unlisted CLI
//!
//! Thin wrapper around unlisted-core for command-line usage. Talks to a
//! local Kubo daemon.
//!
//! ## Usage
//!
//! ```bash
//! # Write a config file into the data directory
//! unlisted init --api-url http://127.0.0.1:5001
//!
//! # Add a contact; give them the printed send address
//! unlisted contacts add Alice
//!
//! # Read what Alice shares with us
//! unlisted contacts set-receive-address Alice k51qzi5uqu5d...
//!
//! # Share and unshare files
//! unlisted share Alice report.pdf photos/beach.jpg
//! unlisted unshare Alice beach.jpg
//!
//! # Pull every contact's list, then look at it
//! unlisted sync
//! unlisted ls Alice
//!
//! # Download something Alice shared
//! unlisted fetch Alice slides.pdf ~/Downloads
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use unlisted_core::{
    default_data_dir, Config, Contact, ContactError, DaemonError, Engine, EngineError, Event,
    FileError, FileList, KuboClient, ServiceError, Storage, StoreError, SyncError, SyncState,
};

/// Unlisted - private file sharing over IPFS
#[derive(Parser)]
#[command(name = "unlisted")]
#[command(version)]
#[command(about = "Unlisted - private file sharing over IPFS")]
#[command(
    long_about = "Share file lists with individual contacts. Each contact gets a dedicated IPNS key; the list you share with them is published under it."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.unlisted)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Kubo RPC endpoint, overriding the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and write a config file
    Init,

    /// Contact management
    Contacts {
        #[command(subcommand)]
        action: ContactsAction,
    },

    /// Share files with a contact
    Share {
        /// Contact name
        contact: String,
        /// Files to share
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Stop sharing files with a contact
    Unshare {
        /// Contact name
        contact: String,
        /// Names of shared files
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List sent and received files
    Ls {
        /// Only this contact
        contact: Option<String>,
    },

    /// Fetch every contact's shared file list
    Sync,

    /// Download a file a contact shared
    Fetch {
        /// Contact name
        contact: String,
        /// File name
        name: String,
        /// Destination file or directory
        #[arg(default_value = ".")]
        dest: PathBuf,
    },
}

#[derive(Subcommand)]
enum ContactsAction {
    /// Add a contact
    Add {
        /// Display name
        name: String,
    },
    /// Remove a contact and its key
    Rm {
        /// Display name
        name: String,
    },
    /// Rename a contact and its key
    Rename {
        /// Current display name
        name: String,
        /// New display name
        new_name: String,
    },
    /// List all contacts
    Ls,
    /// Show contact details
    Info {
        /// Display name
        name: String,
    },
    /// Set the address a contact publishes their list for us under
    SetReceiveAddress {
        /// Display name
        name: String,
        /// IPNS name; omit to stop syncing from this contact
        address: Option<String>,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn load_config(data_dir: &Path, api_url: Option<String>) -> Result<Config> {
    let mut config = Config::load(data_dir)?;
    if let Some(api_url) = api_url {
        config.api_url = api_url;
    }
    Ok(config)
}

fn open_engine(data_dir: &Path, config: Config) -> Result<Engine> {
    let service = KuboClient::new(&config.api_url, config.request_timeout())?;
    let store = Storage::open_in(data_dir)?;
    debug!(?data_dir, api_url = %config.api_url, "Opened engine");
    let engine = Engine::new(Arc::new(service), Arc::new(store), config);
    log_events(&engine);
    Ok(engine)
}

/// Log engine progress until the engine goes away.
fn log_events(engine: &Engine) {
    let mut events = engine.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::Error(err)) => debug!(%err, "Operation failed"),
                Ok(event) => debug!("{}", event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed events"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// One-line advice for a failed command, if there is any to give.
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let err: EngineError = if let Some(e) = err.downcast_ref::<EngineError>() {
        e.clone()
    } else if let Some(e) = err.downcast_ref::<ContactError>() {
        e.clone().into()
    } else if let Some(e) = err.downcast_ref::<FileError>() {
        e.clone().into()
    } else if let Some(e) = err.downcast_ref::<SyncError>() {
        e.clone().into()
    } else if let Some(e) = err.downcast_ref::<DaemonError>() {
        e.clone().into()
    } else if let Some(e) = err.downcast_ref::<ServiceError>() {
        return service_hint(e);
    } else {
        return None;
    };

    if let Some(cause) = err.cause() {
        if let Some(e) = cause.downcast_ref::<ServiceError>() {
            return service_hint(e);
        }
        if cause.downcast_ref::<StoreError>().is_some() {
            return Some("is another unlisted process using the data directory?");
        }
    }

    match err {
        EngineError::Contact(ContactError::ContactAlreadyExists) => Some(
            "a contact or leftover key with that name exists; `unlisted contacts rm` removes both",
        ),
        EngineError::Contact(ContactError::ContactDoesNotExist) => {
            Some("see `unlisted contacts ls`")
        }
        EngineError::File(FileError::SendAddressNotSet) => {
            Some("this contact has no key to publish with; remove and re-add it")
        }
        EngineError::File(FileError::FileAlreadyExists(_)) => {
            Some("rename the file or unshare the existing one first")
        }
        EngineError::File(FileError::FileNotShared) => Some("see `unlisted ls <contact>`"),
        EngineError::File(FileError::FileHashNotSet) => Some("run `unlisted sync` and try again"),
        EngineError::Daemon(_) => Some("check the permissions of the data directory"),
        _ => None,
    }
}

fn service_hint(err: &ServiceError) -> Option<&'static str> {
    match err {
        ServiceError::Http(_) | ServiceError::Unavailable(_) => {
            Some("is the storage daemon running?")
        }
        ServiceError::InvalidUrl(_) => Some("check --api-url or api_url in config.json"),
        _ => None,
    }
}

fn print_list(label: &str, list: &FileList) {
    match list.hash() {
        Some(hash) => println!("  {} ({} files, {}):", label, list.len(), hash),
        None => println!("  {} (not published):", label),
    }
    for file in list.files() {
        match &file.hash {
            Some(hash) => println!("    {}  {}", file.name, hash),
            None => println!("    {}", file.name),
        }
    }
}

fn print_contact_files(contact: &Contact) {
    println!("{}", contact.display_name());
    print_list("Sent", contact.send_list());
    print_list("Received", contact.receive_list());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    run(cli, &data_dir).await.map_err(|err| match hint(&err) {
        Some(hint) => err.context(hint),
        None => err,
    })
}

async fn run(cli: Cli, data_dir: &Path) -> Result<()> {
    let config = load_config(data_dir, cli.api_url)?;

    match cli.command {
        Commands::Init => {
            let path = config.init(data_dir)?;
            println!("Initialised {}", path.display());
            println!("  API: {}", config.api_url);
        }

        Commands::Contacts { action } => {
            let engine = open_engine(data_dir, config)?;
            contacts(&engine, action).await?;
        }

        Commands::Share { contact, paths } => {
            let engine = open_engine(data_dir, config)?;
            let target = engine.contact(&contact)?;
            let updated = engine.share_files(&paths, &target).await?;
            println!("Shared {} file(s) with {}", paths.len(), contact);
            if let Some(hash) = updated.send_list().hash() {
                println!("  List: {}", hash);
            }
        }

        Commands::Unshare { contact, names } => {
            let engine = open_engine(data_dir, config)?;
            let target = engine.contact(&contact)?;
            let files: Vec<_> = target
                .send_list()
                .files()
                .iter()
                .filter(|f| names.contains(&f.name))
                .cloned()
                .collect();
            let updated = engine.unshare_files(&files, &target).await?;
            println!(
                "Unshared {} file(s) from {} ({} still shared)",
                files.len(),
                contact,
                updated.send_list().len()
            );
        }

        Commands::Ls { contact } => {
            let engine = open_engine(data_dir, config)?;
            match contact {
                Some(name) => print_contact_files(&engine.contact(&name)?),
                None => {
                    let contacts = sorted_contacts(&engine)?;
                    if contacts.is_empty() {
                        println!("No contacts found.");
                    }
                    for contact in contacts {
                        print_contact_files(&contact);
                    }
                }
            }
        }

        Commands::Sync => {
            let engine = open_engine(data_dir, config)?;
            let states = engine.sync().await?;
            if states.is_empty() {
                println!("No contacts to sync.");
            }
            for state in &states {
                let marker = match state {
                    SyncState::Synced { .. } => "✓",
                    SyncState::Failed { .. } => "✗",
                };
                println!("  {} {}: {}", marker, state.contact().display_name(), state);
            }
        }

        Commands::Fetch {
            contact,
            name,
            dest,
        } => {
            let engine = open_engine(data_dir, config)?;
            let source = engine.contact(&contact)?;
            let file = source
                .receive_list()
                .files_named(&name)
                .chain(source.send_list().files_named(&name))
                .next()
                .cloned();
            let Some(file) = file else {
                anyhow::bail!("{} has no file named {}", contact, name);
            };
            let path = engine.fetch_file(&file, &dest).await?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

async fn contacts(engine: &Engine, action: ContactsAction) -> Result<()> {
    match action {
        ContactsAction::Add { name } => {
            let contact = engine.add_contact(&name).await?;
            println!("Added contact: {}", name);
            if let Some(address) = contact.send_address() {
                println!("  Send address: {}", address.address);
                println!();
                println!("Give the send address to {} so they can sync.", name);
            }
        }

        ContactsAction::Rm { name } => {
            engine.remove_contact(&name).await?;
            println!("Removed contact: {}", name);
        }

        ContactsAction::Rename { name, new_name } => {
            engine.rename_contact(&name, &new_name).await?;
            println!("Renamed contact: {} -> {}", name, new_name);
        }

        ContactsAction::Ls => {
            let contacts = sorted_contacts(engine)?;
            if contacts.is_empty() {
                println!("No contacts found.");
            } else {
                println!("Contacts ({}):", contacts.len());
                println!();
                for contact in contacts {
                    println!(
                        "  {} [{} sent, {} received]",
                        contact.display_name(),
                        contact.send_list().len(),
                        contact.receive_list().len()
                    );
                }
            }
        }

        ContactsAction::Info { name } => {
            let contact = engine.contact(&name)?;
            println!("Contact: {}", contact.display_name());
            println!("  ID: {}", contact.identifier());
            match contact.send_address() {
                Some(address) => {
                    println!("  Send address: {}", address.address);
                    println!("  Key: {}", address.keypair_name);
                }
                None => println!("  Send address: (none)"),
            }
            println!(
                "  Receive address: {}",
                contact.receive_address().unwrap_or("(none)")
            );
            println!(
                "  Created: {}",
                chrono::DateTime::from_timestamp(contact.created_at(), 0)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| contact.created_at().to_string())
            );
            print_list("Sent", contact.send_list());
            print_list("Received", contact.receive_list());
        }

        ContactsAction::SetReceiveAddress { name, address } => {
            let contact = engine.set_receive_address(&name, address)?;
            match contact.receive_address() {
                Some(address) => println!("Receiving from {} at {}", name, address),
                None => println!("No longer receiving from {}", name),
            }
        }
    }

    Ok(())
}

fn sorted_contacts(engine: &Engine) -> Result<Vec<Contact>> {
    let mut contacts = engine.list_contacts()?;
    contacts.sort_by(|a, b| a.display_name().cmp(b.display_name()));
    Ok(contacts)
}
