//! Replay command implementation.

use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{Context, Result};
use cvgo_core::{Config, FrameOutput, FrameProcessor, PgmDirectory};
use tracing::info;

use crate::shutdown::ShutdownSignal;

/// Counters printed after a replay
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub detected: usize,
    pub triggers: usize,
}

impl ReplaySummary {
    pub fn record(&mut self, output: &FrameOutput) {
        self.frames += 1;
        if output.detected {
            self.detected += 1;
        }
        if output.triggered {
            self.triggers += 1;
        }
    }
}

pub fn format_frame(index: usize, output: &FrameOutput) -> String {
    if !output.detected {
        return format!(
            "{:>5}  -          angles ({:>7.2}, {:>7.2})",
            index, output.x_angle, output.y_angle
        );
    }
    format!(
        "{:>5}  ({:>3}, {:>3})  angles ({:>7.2}, {:>7.2}){}",
        index,
        output.aim_point.x,
        output.aim_point.y,
        output.x_angle,
        output.y_angle,
        if output.triggered { "  TRIGGER" } else { "" }
    )
}

pub fn run(config: &Config, dir: &Path, json: bool) -> Result<()> {
    let mut source = PgmDirectory::open(dir)
        .with_context(|| format!("Failed to open mask directory {}", dir.display()))?;
    info!("Replaying {} masks from {}", source.len(), dir.display());

    let shutdown = ShutdownSignal::install()?;
    let mut processor = FrameProcessor::new(config);
    let mut summary = ReplaySummary::default();
    let mut write_error = None;

    processor.run(&mut source, |output| {
        let index = summary.frames;
        summary.record(output);

        if json {
            match serde_json::to_string(output) {
                Ok(line) => println!("{}", line),
                Err(e) => {
                    write_error = Some(e);
                    return ControlFlow::Break(());
                }
            }
        } else {
            println!("{}", format_frame(index, output));
        }

        if shutdown.is_triggered() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    if let Some(e) = write_error {
        return Err(e.into());
    }

    info!(
        "{} frames, {} detected, {} triggers",
        summary.frames, summary.detected, summary.triggers
    );
    if !json {
        println!(
            "\n{} frames, {} detected, {} triggers",
            summary.frames, summary.detected, summary.triggers
        );
    }

    Ok(())
}
