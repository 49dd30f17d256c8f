/*
Copyright 2024 Jakub Lewandowski

This file is part of the Lagrangian Coherent Structures (LCS) engine.

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program. If not, see https://www.gnu.org/licenses/.
*/

//! CLI front-end (§6) for tracing individual particle paths: reads a
//! configuration file and a list of starting positions, advects each
//! one independently between two timestamps, and writes a tab-
//! separated ASCII trace. Exit codes: `0` success, `2` invalid
//! arguments, `1` runtime failure.

use std::alloc;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cap::Cap;
use chrono::{DateTime, Utc};
use clap::Parser;
use log::info;

#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

use lcs_fle::config::Config;
use lcs_fle::coordinate::{CoordinateKind, CoordinateModel, Point};
use lcs_fle::errors::EngineError;
use lcs_fle::field_provider::{FieldProvider, VelocityUnits};
use lcs_fle::integrator::rk4_step;
use lcs_fle::iterator::TimeIterator;
use lcs_fle::output::path_output::{self, ParticleSample};
use lcs_fle::Float;

/// Default integration granularity, in hours, when the configuration
/// does not otherwise constrain the time step. Not exposed on the CLI:
/// this binary traces a handful of particles rather than sweeping a
/// grid, so a coarser knob is not worth the added surface.
const DEFAULT_STEP_HOURS: Float = 6.0;

/// Traces one or more particle positions through a time-varying
/// velocity field.
#[derive(Parser, Debug)]
#[command(name = "path")]
struct Cli {
    /// Path to the `.ini` velocity configuration.
    config: PathBuf,
    /// Whitespace-separated `lon lat` per line; `#` starts a comment.
    positions_file: PathBuf,
    /// Start time, RFC 3339.
    t_start: String,
    /// End time, RFC 3339.
    t_end: String,

    #[arg(long, default_value = "path.tsv")]
    output: PathBuf,

    #[arg(long)]
    verbose: bool,
}

enum CliError {
    InvalidArgument(String),
    Runtime(anyhow::Error),
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        CliError::Runtime(err.into())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::from(0),
        Err(CliError::InvalidArgument(msg)) => {
            eprintln!("invalid argument: {msg}");
            ExitCode::from(2)
        }
        Err(CliError::Runtime(err)) => {
            eprintln!("runtime error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let t_start: DateTime<Utc> = DateTime::parse_from_rfc3339(&cli.t_start)
        .map_err(|e| CliError::InvalidArgument(format!("T_START: {e}")))?
        .with_timezone(&Utc);
    let t_end: DateTime<Utc> = DateTime::parse_from_rfc3339(&cli.t_end)
        .map_err(|e| CliError::InvalidArgument(format!("T_END: {e}")))?
        .with_timezone(&Utc);

    let positions = read_positions(&cli.positions_file)?;
    if positions.is_empty() {
        return Err(CliError::InvalidArgument(
            "positions file contains no coordinates".to_string(),
        ));
    }

    let config =
        Config::from_file(&cli.config).map_err(|e| CliError::Runtime(anyhow::Error::from(e)))?;

    ALLOCATOR
        .set_limit(config.resources.memory_mb * 1024 * 1024)
        .map_err(|e| CliError::Runtime(anyhow::anyhow!("failed to set memory limit: {e:?}")))?;

    let velocity_is_angular = config.velocity.units == VelocityUnits::Angular;
    let coordinate = CoordinateModel::SphericalEquatorial {
        velocity_is_angular,
    };

    let field = FieldProvider::new(
        config.velocity.files.clone(),
        config.velocity.u_variable.clone(),
        config.velocity.v_variable.clone(),
        config.velocity.fill_value_u,
        config.velocity.fill_value_v,
        config.velocity.units,
        CoordinateKind::SphericalEquatorial,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop));

    let mut current: Vec<Option<Point>> = positions.iter().map(|&p| Some(p)).collect();
    let mut samples = Vec::new();

    for (id, &p) in positions.iter().enumerate() {
        samples.push(ParticleSample {
            id: id as u64,
            lon: p.x,
            lat: p.y,
            time: t_start,
        });
    }

    let iterator = TimeIterator::new(t_start, t_end, DEFAULT_STEP_HOURS * 3_600.0);

    for (t_curr, h) in iterator {
        if stop.load(Ordering::SeqCst) {
            info!("Cancellation requested, writing partial traces");
            break;
        }

        let t_next = t_curr + chrono::Duration::milliseconds((h * 1_000.0) as i64);
        field.fetch(t_curr, t_next).map_err(EngineError::Field)?;

        for (id, slot) in current.iter_mut().enumerate() {
            let p = match slot {
                Some(p) => *p,
                None => continue,
            };

            match rk4_step(&field, &coordinate, t_curr, p, h) {
                Some(moved) => {
                    *slot = Some(moved);
                    samples.push(ParticleSample {
                        id: id as u64,
                        lon: moved.x,
                        lat: moved.y,
                        time: t_next,
                    });
                }
                None => {
                    *slot = None;
                }
            }
        }
    }

    path_output::write_paths(&cli.output, &samples)?;

    Ok(())
}

fn read_positions(path: &PathBuf) -> Result<Vec<Point>, CliError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| CliError::InvalidArgument(format!("cannot read positions file: {e}")))?;

    let mut positions = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let lon: Float = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| CliError::InvalidArgument(format!("line {}: bad longitude", line_no + 1)))?;
        let lat: Float = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| CliError::InvalidArgument(format!("line {}: bad latitude", line_no + 1)))?;

        positions.push(Point::new(lon, lat));
    }

    Ok(positions)
}
