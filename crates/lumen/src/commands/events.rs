//! `lumen events`: follow registry changes until Ctrl-C.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use lumen_core::{Bridge, BridgeConfig, RegistryEvent, ResourceType};

use crate::cli::{EventsArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

fn describe(event: &RegistryEvent) -> String {
    match event {
        RegistryEvent::Created { key } => format!("created  {key}"),
        RegistryEvent::Updated { key, fields } => format!("updated  {key} [{}]", fields.join(", ")),
        RegistryEvent::Deleted { key } => format!("deleted  {key}"),
        RegistryEvent::UnsupportedCapability { key, capability } => {
            format!("unsupported  {key} lacks {capability}")
        }
        RegistryEvent::Error { errors } => errors
            .iter()
            .map(|e| format!("error  {}: {}", e.kind, e.message))
            .collect::<Vec<_>>()
            .join("\n"),
        RegistryEvent::StreamConnected => "stream connected".into(),
        RegistryEvent::StreamDisconnected { reason } => format!("stream disconnected: {reason}"),
    }
}

fn wanted(event: &RegistryEvent, filter: Option<ResourceType>) -> bool {
    filter.is_none_or(|t| event.key().is_some_and(|k| k.rtype == t))
}

pub async fn handle(mut config: BridgeConfig, args: EventsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = args.r#type.as_deref().map(util::parse_type).transpose()?;
    config.event_stream_enabled = true;

    let bridge = Bridge::new(config)?;
    let mut events = bridge.events();
    bridge.connect().await?;

    let deadline = async {
        match args.seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = &mut deadline => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) if wanted(&event, filter) => print_event(&event, global),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }

    bridge.disconnect().await;
    Ok(())
}

fn print_event(event: &RegistryEvent, global: &GlobalOpts) {
    let line = match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            format!("{now}  {}", describe(event))
        }
        // One document per event so the output can be piped line by line.
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => output::render_json(event, true),
    };
    output::print_output(&line, global.quiet);
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::ResourceKey;
    use uuid::Uuid;

    #[test]
    fn filter_matches_on_resource_type() {
        let key = ResourceKey::new(ResourceType::Light, Uuid::nil());
        let event = RegistryEvent::Deleted { key };
        assert!(wanted(&event, None));
        assert!(wanted(&event, Some(ResourceType::Light)));
        assert!(!wanted(&event, Some(ResourceType::Room)));
        assert!(!wanted(&RegistryEvent::StreamConnected, Some(ResourceType::Light)));
    }

    #[test]
    fn updated_lists_fields() {
        let key = ResourceKey::new(ResourceType::Light, Uuid::nil());
        let text = describe(&RegistryEvent::Updated {
            key,
            fields: vec!["on".into(), "dimming".into()],
        });
        assert!(text.ends_with("[on, dimming]"));
    }
}
