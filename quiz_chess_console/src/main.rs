// Legend for various fix-this comments:
//   * "TODO" - bug or missing crucial feature.
//   * "Improvement potential" - missing nice-to-have feature or an opportunity
//       to make code better or faster.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod network;
pub mod tui;

mod client_main;

use std::path::Path;

use clap::{Command, arg};
use quiz_chess::config::ClientConfig;
use quiz_chess::force::Force;
use url::Url;


fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let matches = Command::new("Quiz chess")
        .version(clap::crate_version!())
        .about("Quiz chess console client")
        .subcommand_required(true)
        .subcommand(
            Command::new("client")
                .about("Join a game")
                .arg(arg!(<server_address> "Socket URL, e.g. ws://localhost:8000/ws"))
                .arg(arg!(<player_name> "Player name"))
                .arg(arg!(--"color" <color> "Preferred color: white or black"))
                .arg(arg!(--"config" <config_file> "Path to a yaml-serialized ClientConfig")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("client", sub_matches)) => {
            let server_address = sub_matches.get_one::<String>("server_address").unwrap();
            let ws_url = Url::parse(server_address)
                .map_err(|err| anyhow::anyhow!("Invalid server address {server_address}: {err}"))?;
            let color = match sub_matches.get_one::<String>("color") {
                Some(color) => Some(
                    Force::from_color_hint(color)
                        .ok_or_else(|| anyhow::anyhow!("Unknown color: {color}"))?,
                ),
                None => None,
            };
            let config = match sub_matches.get_one::<String>("config") {
                Some(path) => read_config_file(Path::new(path))?,
                None => ClientConfig::default(),
            };
            client_main::run(client_main::ClientArgs {
                ws_url,
                player_name: sub_matches.get_one::<String>("player_name").unwrap().clone(),
                color,
                config,
            })
        }
        _ => unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`"),
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("Reading config file {}: {err}", path.display()))?;
    serde_yaml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Parsing config file {}: {err}", path.display()))
}
