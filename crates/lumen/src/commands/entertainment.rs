//! Entertainment command handlers.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use lumen_api::DtlsConnector;
use lumen_core::animation::{Animation, BrightnessModifier, ColorModifier, Easing, Sequence, Timing};
use lumen_core::model::color::rgb_to_xy;
use lumen_core::{Bridge, BridgeConfig, EntertainmentConfiguration, FrameCallback, Gamut, LightStream, Rgb, Xy};

use crate::cli::{Effect, EntertainmentArgs, EntertainmentCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ConfigurationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Channels")]
    channels: usize,
}

fn row(c: &EntertainmentConfiguration) -> ConfigurationRow {
    ConfigurationRow {
        id: c.id.to_string(),
        name: c.name.clone(),
        kind: c.configuration_type.map_or_else(|| "-".into(), |t| t.to_string()),
        status: c.status.to_string(),
        channels: c.channels.len(),
    }
}

const WARM: Xy = Xy::new(0.5268, 0.4133);

/// The animation an effect runs on every light. `tint` colours the
/// single-colour effects.
fn effect_animation(effect: Effect, tint: Xy) -> Arc<dyn Animation> {
    match effect {
        Effect::Wave => Arc::new(
            Timing::new(Duration::from_secs(4)).with_brightness(BrightnessModifier::wave(10.0, 100.0)),
        ),
        Effect::Palette => Arc::new(Timing::new(Duration::from_secs(8)).with_color(ColorModifier::color_palette(
            vec![Xy::new(0.675, 0.322), WARM, Xy::new(0.409, 0.518), Xy::new(0.167, 0.04)],
            Easing::EaseInOut,
        ))),
        Effect::Flicker => Arc::new(
            Timing::random_duration(Duration::from_millis(80), Duration::from_millis(200))
                .with_brightness(BrightnessModifier::flicker(35.0, 100.0))
                .with_color(ColorModifier::color(vec![tint], Easing::Linear)),
        ),
        Effect::Lightning => Arc::new(Sequence::new(vec![
            Timing::random_duration(Duration::from_secs(2), Duration::from_secs(6))
                .with_brightness(BrightnessModifier::brightness(vec![3.0], Easing::Linear)),
            Timing::new(Duration::from_millis(700))
                .with_random_loops(1, 3)
                .with_brightness(BrightnessModifier::lightning(3.0, 100.0)),
        ])),
    }
}

/// Attach `animation` to every stream that has none; a topology rebuild
/// hands back fresh streams.
fn attach(animation: Arc<dyn Animation>, base: Option<Rgb>) -> FrameCallback {
    Arc::new(move |streams: &mut [LightStream], _frame: u64, _fps: u32| {
        for stream in streams.iter_mut().filter(|s| s.animation().is_none()) {
            match base {
                Some(rgb) => stream.set_rgb(rgb),
                None => stream.set_color(WARM, 100.0),
            }
            stream.set_animation(Arc::clone(&animation));
        }
    })
}

pub async fn handle(config: BridgeConfig, args: EntertainmentArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        EntertainmentCommand::List => {
            let mut configurations =
                Bridge::oneshot(config, |bridge| async move { Ok(bridge.entertainment_configurations()) }).await?;
            configurations.sort_by(|a, b| a.name.cmp(&b.name));

            let out = output::render_list(&global.output, &configurations, row, |c| c.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EntertainmentCommand::Stream {
            id,
            fps,
            seconds,
            effect,
            color,
        } => {
            let config_id = util::parse_id(&id)?;
            let base = color.as_deref().map(util::parse_rgb).transpose()?;
            let tint = base.map_or(WARM, |rgb| rgb_to_xy(rgb, &Gamut::C).0);
            let fps = fps.unwrap_or(config.fps);

            let bridge = Bridge::new(config)?;
            bridge.connect().await?;
            let session = bridge.entertainment_session(config_id, Arc::new(DtlsConnector::default()))?;

            session.start(Some(attach(effect_animation(effect, tint), base)), fps).await?;
            let outcome = wait_streaming(seconds, global.quiet).await;

            // A session closed by the bridge has already stopped itself.
            if session.is_streaming() {
                session.stop().await?;
            }
            let frames = session.frame();
            bridge.disconnect().await;
            outcome?;

            if !global.quiet {
                eprintln!("Streamed {frames} frames at {fps} fps");
            }
            Ok(())
        }
    }
}

async fn wait_streaming(seconds: u64, quiet: bool) -> Result<(), CliError> {
    let bar = (!quiet).then(|| {
        let pb = ProgressBar::new(seconds);
        pb.set_style(
            ProgressStyle::with_template("{spinner} streaming {bar:30} {pos}/{len}s")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    });

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.tick().await;
    for _ in 0..seconds {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Some(pb) = &bar {
                    pb.abandon();
                }
                return result.map_err(CliError::from);
            }
            _ = tick.tick() => {
                if let Some(pb) = &bar {
                    pb.inc(1);
                }
            }
        }
    }
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
    Ok(())
}
