//! Shared helpers for command handlers.

use std::io::IsTerminal;

use uuid::Uuid;

use lumen_core::{ResourceKey, ResourceType, Rgb};

use crate::error::CliError;

pub fn parse_type(raw: &str) -> Result<ResourceType, CliError> {
    ResourceType::from_wire(raw).ok_or_else(|| CliError::Validation {
        field: "type".into(),
        reason: format!("unknown resource type '{raw}'"),
    })
}

pub fn parse_id(raw: &str) -> Result<Uuid, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "id".into(),
        reason: format!("'{raw}' is not a UUID"),
    })
}

pub fn parse_rgb(raw: &str) -> Result<Rgb, CliError> {
    Rgb::from_hex(raw).ok_or_else(|| CliError::Validation {
        field: "color".into(),
        reason: format!("'{raw}' is not a hex colour like #ff8800"),
    })
}

pub fn parse_key(rtype: &str, id: &str) -> Result<ResourceKey, CliError> {
    Ok(ResourceKey::new(parse_type(rtype)?, parse_id(id)?))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}
