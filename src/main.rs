use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use omgdata::fetch::kinds;
use omgdata::interface::DataInterface;
use omgdata::{AddressBook, Client, FetchPhase, Session, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "omgdata")]
#[command(about = "Inspect omg.lol data through the caching fetch layer")]
#[command(version)]
struct Args {
  /// Path to session file (default: $XDG_CONFIG_HOME/omgdata/session.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List every registered address
  Directory,
  /// List addresses with a public now page
  Garden,
  /// Show an address's profile page content
  Profile { address: String },
  /// Show an address's now page content
  Now { address: String },
  /// Show recent statuses, for an address or the global log
  Statuses { address: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let session = Session::load(args.config.as_deref())?;
  let interface: Arc<dyn DataInterface> = Arc::new(Client::new()?);
  let store = Arc::new(SqliteStore::open()?);

  match args.command {
    Command::Directory => {
      let directory = kinds::directory_fetcher(&interface, &store);
      directory.update_if_needed(false).await;
      for entry in directory.items() {
        println!("{}", entry.name);
      }
    }
    Command::Garden => {
      let garden = kinds::garden_fetcher(&interface, &store);
      garden.update_if_needed(false).await;
      for entry in garden.items() {
        println!("{}\t{}", entry.address, entry.url);
      }
    }
    Command::Profile { address } => {
      let book = AddressBook::new(&session, interface, store);
      let summary = book.address_summary(&address);
      let profile = summary.profile();
      profile.update_if_needed(false).await;
      match profile.current_value() {
        Some(profile) => println!("{}", profile.content),
        None => report_missing(profile.phase(), "no profile"),
      }
    }
    Command::Now { address } => {
      let book = AddressBook::new(&session, interface, store);
      let summary = book.address_summary(&address);
      let now = summary.now();
      now.update_if_needed(false).await;
      match now.current_value() {
        Some(now) => println!("{}", now.content),
        None => report_missing(now.phase(), "no now page"),
      }
    }
    Command::Statuses { address } => {
      let addresses: Vec<String> = address.into_iter().collect();
      let statuses = kinds::statuses_fetcher(&interface, &store, &addresses);
      statuses.update_if_needed(false).await;
      for status in statuses.items() {
        let emoji = status.emoji.unwrap_or_else(|| "💬".to_string());
        println!("{}  @{}  {}", emoji, status.address, status.content);
      }
    }
  }

  Ok(())
}

fn report_missing(phase: FetchPhase, label: &str) {
  match phase {
    FetchPhase::Failed => eprintln!("fetch failed"),
    _ => eprintln!("{label}"),
  }
}
