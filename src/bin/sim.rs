//! Synthetic motion trace generator
//!
//! Writes a JSONL trace the daemon can replay: stretches of walking, each
//! followed by a fall (impact spike, tumble on the gyro, then lying still).
//! Values are linear acceleration (gravity removed) in m/s² and angular
//! velocity in rad/s.
//!
//! Usage:
//!   cargo run --bin sim -- --out traces/demo.jsonl --falls 2
//!   cargo run --bin sim -- --falls 0 --walk-secs 60     # no falls, for soak runs

use anyhow::Context;
use clap::Parser;
use fallguard::domain::types::{epoch_ms, MotionSample};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "sim", about = "Generate a synthetic motion trace")]
struct Args {
    /// Output JSONL file
    #[arg(long, default_value = "traces/demo.jsonl")]
    out: String,

    /// Number of falls in the trace
    #[arg(long, default_value = "1")]
    falls: u32,

    /// Seconds of walking before each fall (and after the last one)
    #[arg(long, default_value = "5")]
    walk_secs: u32,

    /// Sample rate per sensor
    #[arg(long, default_value = "50")]
    hz: u32,

    /// First timestamp (epoch ms); defaults to now
    #[arg(long)]
    start_ms: Option<u64>,
}

struct Trace<W: Write> {
    out: W,
    t_ms: u64,
    step_ms: u64,
    written: u64,
}

impl<W: Write> Trace<W> {
    fn emit(&mut self, sample: MotionSample) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, &sample)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// One accelerometer and one gyroscope reading at the current time
    fn tick(&mut self, accel: [f32; 3], gyro: [f32; 3]) -> anyhow::Result<()> {
        let t = self.t_ms;
        self.emit(MotionSample::acceleration(t, accel[0], accel[1], accel[2]))?;
        self.emit(MotionSample::rotation(t, gyro[0], gyro[1], gyro[2]))?;
        self.t_ms += self.step_ms;
        Ok(())
    }

    /// Gait: ~2 steps per second, peaks around 3 m/s²
    fn walk(&mut self, samples: u32) -> anyhow::Result<()> {
        for i in 0..samples {
            let phase = (self.t_ms as f32 / 1000.0) * std::f32::consts::TAU * 2.0;
            let bob = 1.5 + 1.2 * phase.sin();
            let sway = 0.4 * (phase * 0.5).cos();
            let yaw = 0.3 * (phase * 0.25 + i as f32 * 0.01).sin();
            self.tick([sway, 0.3, bob], [0.1, yaw, 0.05])?;
        }
        Ok(())
    }

    /// Impact, tumble and one second of lying still
    fn fall(&mut self, hz: u32) -> anyhow::Result<()> {
        // Free fall
        for _ in 0..(hz / 5).max(1) {
            self.tick([0.2, 0.1, 0.4], [1.5, 0.8, 0.2])?;
        }
        // Impact with a tumble
        self.tick([18.0, 12.0, 22.0], [4.0, 5.5, 2.0])?;
        self.tick([6.0, 4.0, 8.0], [2.0, 2.5, 1.0])?;
        // Lying still
        for _ in 0..hz {
            self.tick([0.05, 0.02, 0.1], [0.01, 0.0, 0.01])?;
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let hz = args.hz.max(1);

    let path = Path::new(&args.out);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    let mut trace = Trace {
        out: BufWriter::new(file),
        t_ms: args.start_ms.unwrap_or_else(epoch_ms),
        step_ms: (1000 / hz as u64).max(1),
        written: 0,
    };

    let walk_samples = args.walk_secs * hz;
    for _ in 0..args.falls {
        trace.walk(walk_samples)?;
        trace.fall(hz)?;
    }
    trace.walk(walk_samples)?;
    trace.out.flush()?;

    println!("Wrote {} samples ({} falls) to {}", trace.written, args.falls, path.display());
    Ok(())
}
