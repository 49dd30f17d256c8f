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

//! CLI front-end (§6) for a full map sweep: reads a configuration
//! file and a domain description, runs the engine, and writes a
//! NetCDF map. Exit codes: `0` success, `2` invalid arguments, `1`
//! runtime failure.

use std::alloc;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cap::Cap;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, ValueEnum};
use log::info;

/// Caps process memory to the configured `[RESOURCES] MEMORY` limit:
/// a clean OOM-style failure is preferable to the kernel killing the
/// process mid-sweep.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

use lcs_fle::config::Config;
use lcs_fle::coordinate::{CoordinateKind, CoordinateModel};
use lcs_fle::driver::{DriverConfig, Mode};
use lcs_fle::errors::EngineError;
use lcs_fle::field_provider::FieldProvider;
use lcs_fle::grid::Reader;
use lcs_fle::output::map_output::{self, Attribute, MapAttributes};
use lcs_fle::stencil::StencilKind;
use lcs_fle::sweep::{self, SweepConfig};
use lcs_fle::Float;

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum ModeArg {
    Fsle,
    Ftle,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum StencilArg {
    Triplet,
    Quintuplet,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum DirectionArg {
    Forward,
    Backward,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum UnitArg {
    Metric,
    Angular,
}

/// Computes a map of Finite-Size or Finite-Time Lyapunov Exponents
/// from a time series of gridded velocity fields.
#[derive(Parser, Debug)]
#[command(name = "map_of_fle")]
struct Cli {
    /// Path to the `.ini` velocity configuration.
    config: PathBuf,
    /// Output NetCDF path.
    output: PathBuf,
    /// Start time, RFC 3339 (e.g. `2010-01-06T00:00:00Z`).
    t_start: String,

    #[arg(long, value_enum, default_value_t = ModeArg::Fsle)]
    mode: ModeArg,

    /// Grid step in degrees; mutually exclusive with `--nx`/`--ny`.
    #[arg(long)]
    resolution: Option<Float>,

    #[arg(long)]
    nx: Option<usize>,
    #[arg(long)]
    ny: Option<usize>,
    #[arg(long)]
    x_min: Option<Float>,
    #[arg(long)]
    x_max: Option<Float>,
    #[arg(long)]
    y_min: Option<Float>,
    #[arg(long)]
    y_max: Option<Float>,

    #[arg(long, value_enum, default_value_t = StencilArg::Triplet)]
    stencil: StencilArg,

    #[arg(long, default_value_t = 0.02)]
    initial_separation: Float,

    /// Required in FSLE mode; invalid in FTLE mode.
    #[arg(long)]
    final_separation: Option<Float>,

    /// Advection time limit, in days.
    #[arg(long)]
    advection_time: Float,

    /// Integration step, in hours.
    #[arg(long, default_value_t = 6.0)]
    integration_time_step: Float,

    #[arg(long, value_enum, default_value_t = DirectionArg::Forward)]
    time_direction: DirectionArg,

    #[arg(long, value_enum)]
    unit: Option<UnitArg>,

    /// `--mask PATH VARIABLE`: cells with a defined, non-fill value
    /// in this file are excluded from the sweep.
    #[arg(long, num_args = 2, value_names = ["PATH", "VARIABLE"])]
    mask: Option<Vec<String>>,

    /// Also write `separation_distance` and `advection_time`.
    #[arg(long)]
    diagnostic: bool,

    /// Worker thread count; `0` uses all available cores.
    #[arg(long, default_value_t = 0)]
    threads: usize,

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

    let mode = match cli.mode {
        ModeArg::Fsle => Mode::Fsle,
        ModeArg::Ftle => Mode::Ftle,
    };

    if mode == Mode::Ftle && cli.final_separation.is_some() {
        return Err(CliError::InvalidArgument(
            "--final_separation is not valid in FTLE mode".to_string(),
        ));
    }
    if mode == Mode::Fsle && cli.final_separation.is_none() {
        return Err(CliError::InvalidArgument(
            "--final_separation is required in FSLE mode".to_string(),
        ));
    }

    let (x_min, x_max, y_min, y_max) = match (cli.x_min, cli.x_max, cli.y_min, cli.y_max) {
        (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
        _ => {
            return Err(CliError::InvalidArgument(
                "--x_min, --x_max, --y_min, --y_max are all required".to_string(),
            ));
        }
    };

    if x_min >= x_max {
        return Err(CliError::InvalidArgument(
            "--x_min must be less than --x_max".to_string(),
        ));
    }
    if y_min >= y_max {
        return Err(CliError::InvalidArgument(
            "--y_min must be less than --y_max".to_string(),
        ));
    }

    let (x_values, y_values) = match (cli.resolution, cli.nx, cli.ny) {
        (Some(step), None, None) => (
            linspace_by_step(x_min, x_max, step),
            linspace_by_step(y_min, y_max, step),
        ),
        (None, Some(nx), Some(ny)) => (
            linspace_by_count(x_min, x_max, nx),
            linspace_by_count(y_min, y_max, ny),
        ),
        _ => {
            return Err(CliError::InvalidArgument(
                "specify exactly one of --resolution or --nx/--ny".to_string(),
            ));
        }
    };

    let config =
        Config::from_file(&cli.config).map_err(|e| CliError::Runtime(anyhow::Error::from(e)))?;

    ALLOCATOR
        .set_limit(config.resources.memory_mb * 1024 * 1024)
        .map_err(|e| CliError::Runtime(anyhow::anyhow!("failed to set memory limit: {e:?}")))?;

    let mut velocity_units = config.velocity.units;
    if let Some(unit) = cli.unit {
        velocity_units = match unit {
            UnitArg::Metric => lcs_fle::field_provider::VelocityUnits::Metric,
            UnitArg::Angular => lcs_fle::field_provider::VelocityUnits::Angular,
        };
    }
    let velocity_is_angular = velocity_units == lcs_fle::field_provider::VelocityUnits::Angular;

    let field = FieldProvider::new(
        config.velocity.files.clone(),
        config.velocity.u_variable.clone(),
        config.velocity.v_variable.clone(),
        config.velocity.fill_value_u,
        config.velocity.fill_value_v,
        velocity_units,
        CoordinateKind::SphericalEquatorial,
    );

    let mask = match &cli.mask {
        Some(pair) => {
            let reader = Reader::open(&pair[0]).map_err(|e| CliError::Runtime(e.into()))?;
            Some(
                reader
                    .load(&pair[1], None)
                    .map_err(|e| CliError::Runtime(e.into()))?,
            )
        }
        None => None,
    };

    let sign: i64 = match cli.time_direction {
        DirectionArg::Forward => 1,
        DirectionArg::Backward => -1,
    };
    let t_end = t_start + Duration::milliseconds(sign * (cli.advection_time * 86_400_000.0) as i64);

    let stencil_kind = match cli.stencil {
        StencilArg::Triplet => StencilKind::Triplet,
        StencilArg::Quintuplet => StencilKind::Quintuplet,
    };

    let driver_config = DriverConfig {
        t_start,
        t_end,
        mode,
        delta_final: cli.final_separation.unwrap_or(Float::INFINITY),
        delta0: cli.initial_separation,
        stencil_kind,
    };

    let coordinate = CoordinateModel::SphericalEquatorial {
        velocity_is_angular,
    };

    let threads = if cli.threads > 0 {
        cli.threads
    } else {
        config.resources.threads
    };

    let sweep_config = SweepConfig {
        x_values: x_values.clone(),
        y_values: y_values.clone(),
        driver_config,
        coordinate,
        h: cli.integration_time_step * 3_600.0,
        fill_value: netcdf_default_fill(),
        diagnostics: cli.diagnostic,
        threads,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop));

    info!("Starting map sweep over {} x {} nodes", x_values.len(), y_values.len());
    let output = sweep::run(&field, mask.as_ref(), &sweep_config, &stop)?;

    let attributes = vec![
        Attribute { name: "mode", value: format!("{:?}", cli.mode).to_lowercase() },
        Attribute { name: "stencil", value: format!("{:?}", cli.stencil).to_lowercase() },
        Attribute { name: "initial_separation_degrees", value: cli.initial_separation.to_string() },
        Attribute {
            name: "final_separation_degrees",
            value: cli.final_separation.map(|v| v.to_string()).unwrap_or_default(),
        },
        Attribute { name: "advection_time_days", value: cli.advection_time.to_string() },
        Attribute { name: "integration_time_step_hours", value: cli.integration_time_step.to_string() },
        Attribute { name: "time_direction", value: format!("{:?}", cli.time_direction).to_lowercase() },
        Attribute { name: "t_start", value: t_start.to_rfc3339() },
    ];

    map_output::write_map(
        &cli.output,
        &x_values,
        &y_values,
        &output,
        &MapAttributes {
            attributes,
            fill_value: Some(netcdf_default_fill()),
        },
    )?;

    Ok(())
}

fn netcdf_default_fill() -> Float {
    9.969_209_968_386_869e36
}

fn linspace_by_step(min: Float, max: Float, step: Float) -> Vec<Float> {
    let count = ((max - min) / step).round() as usize + 1;
    (0..count).map(|i| min + i as Float * step).collect()
}

fn linspace_by_count(min: Float, max: Float, count: usize) -> Vec<Float> {
    if count <= 1 {
        return vec![min];
    }
    let step = (max - min) / (count - 1) as Float;
    (0..count).map(|i| min + i as Float * step).collect()
}
