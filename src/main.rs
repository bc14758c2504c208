use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use chipper::{cli, config, logging, types::Collection, utils, warning};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in with Spotify
    Login,

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in Spotify profile
    Whoami,

    /// List the showcase collections
    Collections,

    /// Show the tracks of a collection
    Tracks(TracksOptions),

    /// Play a collection on a Spotify Connect device
    Play(PlayOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct TracksOptions {
    /// Collection as top:<artist>, album:<id> or playlist:<id>
    #[clap(value_parser = utils::parse_collection)]
    pub collection: Collection,
}

#[derive(Parser, Debug, Clone)]
pub struct PlayOptions {
    /// Collection as top:<artist>, album:<id> or playlist:<id>
    #[clap(value_parser = utils::parse_collection)]
    pub collection: Collection,

    /// Number of the track to start with
    #[clap(long)]
    pub track: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        warning!("Cannot load environment. Err: {}", e);
    }
    logging::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Login => cli::login().await,
        Command::Logout => cli::logout().await,
        Command::Whoami => cli::whoami().await,
        Command::Collections => cli::list_collections().await,
        Command::Tracks(opt) => cli::list_tracks(opt.collection).await,
        Command::Play(opt) => cli::play(opt.collection, opt.track).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
