//! Resource command handlers.

use std::sync::Arc;

use tabled::Tabled;

use lumen_core::{Bridge, BridgeConfig, Resource, ResourceKind};

use crate::cli::{GlobalOpts, ResourcesArgs, ResourcesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    rtype: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

fn kind_label(resource: &Resource) -> String {
    match resource.kind() {
        ResourceKind::Device { class } => class.to_string(),
        ResourceKind::Light { capabilities } | ResourceKind::GroupedLight { capabilities } => capabilities
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}

fn row(resource: &Arc<Resource>) -> ResourceRow {
    ResourceRow {
        id: resource.id().to_string(),
        rtype: resource.rtype().to_string(),
        name: resource.name().unwrap_or("-").to_owned(),
        kind: kind_label(resource),
    }
}

fn detail(resource: &Resource) -> String {
    let mut lines = output::detail_lines(&[
        ("ID", resource.id().to_string()),
        ("Type", resource.rtype().to_string()),
        ("Name", resource.name().unwrap_or("-").to_owned()),
        ("Owner", resource.owner().map_or_else(|| "-".into(), |k| k.to_string())),
        ("Kind", kind_label(resource)),
        (
            "Colour temp",
            resource.color_temperature_kelvin().map_or_else(|| "-".into(), |k| format!("{k} K")),
        ),
    ]);
    lines.push_str("\n\n");
    lines.push_str(&output::render_json(resource.fields(), false));
    lines
}

pub async fn handle(config: BridgeConfig, args: ResourcesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ResourcesCommand::List { r#type } => {
            let rtype = r#type.as_deref().map(util::parse_type).transpose()?;
            let resources = Bridge::oneshot(config, |bridge| async move {
                let mut all = match rtype {
                    Some(t) => bridge.resources(t).as_ref().clone(),
                    None => bridge.store().all(),
                };
                all.sort_by(|a, b| a.key().cmp(&b.key()));
                Ok(all)
            })
            .await?;

            let out = output::render_list(&global.output, &resources, row, |r| r.key().to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ResourcesCommand::Get { r#type, id } => {
            let key = util::parse_key(&r#type, &id)?;
            let resource = Bridge::oneshot(config, |bridge| async move { Ok(bridge.resource(&key)) })
                .await?
                .ok_or_else(|| CliError::NotFound {
                    resource_type: r#type.clone(),
                    identifier: id.clone(),
                    list_command: format!("resources list --type {}", r#type),
                })?;

            let out = output::render_single(
                &global.output,
                &resource.to_json(),
                |_| detail(&resource),
                |_| resource.key().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ResourcesCommand::Delete { r#type, id } => {
            let key = util::parse_key(&r#type, &id)?;
            if !util::confirm(&format!("Delete {key}?"), global.yes)? {
                return Ok(());
            }
            Bridge::oneshot(config, |bridge| async move { bridge.delete(key).await }).await?;
            if !global.quiet {
                eprintln!("Deleted {key}");
            }
            Ok(())
        }
    }
}
