//! # Sunshine Face Demo Host
//!
//! This binary plays the role of the watch OS. It builds the face with an
//! in-memory companion serving the configured payload, then feeds it a scripted
//! sequence of host callbacks: startup properties, screen shape, visible,
//! interactive for a while, a time zone change, a tap, ambient with a minute tick, back to
//! interactive, hidden.
//!
//! With `--stdout` every change of display mode prints an ASCII preview of the
//! frame, and the last frame drawn is printed before exit.

use anyhow::Context;
use env_logger::{Builder, Env};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use sunshine_face_lib::companion::LoopbackChannel;
use sunshine_face_lib::config::{Config, CONFIG_FILE};
use sunshine_face_lib::display_mode::{FaceEvent, TapKind};
use sunshine_face_lib::face::WatchFace;
use sunshine_face_lib::geometry::ScreenShape;
use sunshine_face_lib::renderer::draw_ascii;
use tokio::sync::mpsc;

/// Width of the ASCII preview in characters
const PREVIEW_COLUMNS: u32 = 64;

/// Library and binary are separate log targets; both log at info by default
const DEFAULT_LOG_FILTER: &str = "sunshine_face_lib=info,sunshine_face=info";

/// Parsed command line
struct Options {
    stdout: bool,
    seconds: u64,
    config_path: String,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut options = Options {
        stdout: false,
        seconds: 5,
        config_path: CONFIG_FILE.to_string(),
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdout" => options.stdout = true,
            "--seconds" => {
                let value = args.next().context("--seconds needs a value")?;
                options.seconds = value
                    .parse()
                    .with_context(|| format!("invalid --seconds value '{}'", value))?;
            }
            "--config" => {
                options.config_path = args.next().context("--config needs a path")?;
            }
            other => anyhow::bail!("unknown argument '{}'", other),
        }
    }
    Ok(options)
}

/// Scripted host callbacks spread over `seconds`.
fn host_script(seconds: u64) -> mpsc::UnboundedReceiver<FaceEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let phase = Duration::from_millis(seconds.max(1) * 1000 / 4);

    tokio::spawn(async move {
        let steps = [
            (Duration::ZERO, FaceEvent::PropertiesChanged {
                low_bit_ambient: false,
            }),
            (Duration::ZERO, FaceEvent::InsetsChanged {
                shape: ScreenShape::Rectangular,
            }),
            (Duration::ZERO, FaceEvent::VisibilityChanged(true)),
            (phase / 2, FaceEvent::TimeZoneChanged),
            (phase / 2, FaceEvent::Tap {
                kind: TapKind::Tap,
                x: 160,
                y: 160,
                timestamp_ms: 0,
            }),
            (phase, FaceEvent::AmbientModeChanged(true)),
            (phase / 2, FaceEvent::TimeTick),
            (phase / 2, FaceEvent::AmbientModeChanged(false)),
            (phase, FaceEvent::VisibilityChanged(false)),
        ];
        for (delay, event) in steps {
            tokio::time::sleep(delay).await;
            log::debug!("host: {:?}", event);
            if tx.send(event).is_err() {
                return;
            }
        }
        // Give the channel teardown a moment before closing the loop
        tokio::time::sleep(Duration::from_millis(100)).await;
    });
    rx
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or(DEFAULT_LOG_FILTER)).init();

    let options = parse_args()?;
    let config = Config::load_from_path(&options.config_path);

    let channel = LoopbackChannel::from_config(&config.companion, &config.sync.data_path)
        .context("failed to set up the demo companion")?;
    let channel = Arc::new(channel);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut face = WatchFace::new(channel, &config);

        if options.stdout {
            let mut last_mode = None;
            face.set_presenter(move |frame, mode| {
                if last_mode != Some(mode) {
                    last_mode = Some(mode);
                    println!("--- {:?} ---", mode);
                    print!("{}", draw_ascii(frame, PREVIEW_COLUMNS));
                }
            });
        }

        face.run(host_script(options.seconds)).await;

        log::info!(
            "drew {} frames, weather {:?} / {:?}",
            face.frames(),
            face.weather().high_temp,
            face.weather().low_temp
        );
        if options.stdout && face.frames() > 0 {
            println!("--- last frame before {:?} ---", face.mode());
            print!("{}", draw_ascii(face.frame(), PREVIEW_COLUMNS));
        }
    });

    Ok(())
}
