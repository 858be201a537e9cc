//! Command dispatch: CLI args -> bridge calls -> output formatting.

pub mod config_cmd;
pub mod entertainment;
pub mod events;
pub mod pair;
pub mod resources;
pub mod util;

use lumen_core::BridgeConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a bridge-bound command to its handler.
pub async fn dispatch(cmd: Command, config: BridgeConfig, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Resources(args) => resources::handle(config, args, global).await,
        Command::Events(args) => events::handle(config, args, global).await,
        Command::Entertainment(args) => entertainment::handle(config, args, global).await,
        Command::Pair(_) | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command must be handled before connecting".into(),
        )),
    }
}
