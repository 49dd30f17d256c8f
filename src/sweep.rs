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

//! Map Sweep (§4.J): partitions the output grid into row-strips, each
//! an independent [`Driver`] instance, and steps every strip forward
//! in lockstep. A single union `fetch` per iteration step serialises
//! I/O while strip computation runs in parallel across a rayon
//! thread pool.
//!
//! The worker pool is sized from a configuration parameter and driven
//! through a `rayon::scope` fan-out with an `indicatif` progress bar,
//! generalised from per-particle dispatch to per-strip dispatch with a
//! shared barrier between steps.

use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use ndarray::Array2;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::coordinate::CoordinateModel;
use crate::driver::{Driver, DriverConfig, NodeState};
use crate::errors::EngineError;
use crate::field_provider::FieldProvider;
use crate::grid::Snapshot;
use crate::iterator::TimeIterator;
use crate::Float;

/// Dense `[nx x ny]` output arrays, one per reported quantity.
pub struct SweepOutput {
    pub theta1: Array2<Float>,
    pub theta2: Array2<Float>,
    pub lambda1: Array2<Float>,
    pub lambda2: Array2<Float>,
    pub final_separation: Option<Array2<Float>>,
    pub delta_t: Option<Array2<Float>>,
}

impl SweepOutput {
    fn new(nx: usize, ny: usize, fill_value: Float, diagnostics: bool) -> Self {
        SweepOutput {
            theta1: Array2::from_elem((nx, ny), fill_value),
            theta2: Array2::from_elem((nx, ny), fill_value),
            lambda1: Array2::from_elem((nx, ny), fill_value),
            lambda2: Array2::from_elem((nx, ny), fill_value),
            final_separation: diagnostics.then(|| Array2::from_elem((nx, ny), fill_value)),
            delta_t: diagnostics.then(|| Array2::from_elem((nx, ny), fill_value)),
        }
    }
}

/// Everything a sweep needs beyond the field provider itself.
pub struct SweepConfig {
    pub x_values: Vec<Float>,
    pub y_values: Vec<Float>,
    pub driver_config: DriverConfig,
    pub coordinate: CoordinateModel,
    pub h: Float,
    pub fill_value: Float,
    pub diagnostics: bool,
    pub threads: usize,
}

/// Runs a full map sweep, returning the dense output arrays.
///
/// `mask` is an optional pre-loaded snapshot: a node is masked when
/// the mask reader returns a defined value different from its fill
/// value. `stop` is polled once per iteration step; once set, every
/// still-active node is finalised as missing from that step onward
/// and the function returns with partial results, per §5's
/// cooperative-cancellation model.
pub fn run(
    field: &FieldProvider,
    mask: Option<&Snapshot>,
    config: &SweepConfig,
    stop: &AtomicBool,
) -> Result<SweepOutput, EngineError> {
    let nx = config.x_values.len();
    let ny = config.y_values.len();

    let pool = build_pool(config.threads)?;

    let worker_count = pool.current_num_threads().max(1);
    let strip_bounds = partition_rows(ny, worker_count);

    let driver = Driver::new(&config.driver_config, config.coordinate);

    let mut strips: Vec<Vec<NodeState>> = strip_bounds
        .iter()
        .map(|&(row_lo, row_hi)| {
            let mut states = Vec::with_capacity(nx * (row_hi - row_lo));
            for j in row_lo..row_hi {
                let y = config.y_values[j];
                for &x in &config.x_values {
                    let masked = is_masked(mask, x, y);
                    states.push(driver.init_node(x, y, masked));
                }
            }
            states
        })
        .collect();

    let total_nodes = nx * ny;
    let progress = ProgressBar::new(total_nodes as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );
    progress.set_prefix("Map sweep nodes");

    let iterator = TimeIterator::new(
        config.driver_config.t_start,
        config.driver_config.t_end,
        config.h,
    );

    for (t_curr, h) in iterator {
        if stop.load(Ordering::SeqCst) {
            info!("Cancellation requested, finalising partial results");
            break;
        }

        let t_next = t_curr + chrono::Duration::milliseconds((h * 1_000.0) as i64);
        debug!("Fetching snapshots for [{t_curr}, {t_next}]");
        field.fetch(t_curr, t_next).map_err(EngineError::Field)?;

        pool.install(|| {
            use rayon::prelude::*;

            strips.par_iter_mut().for_each(|states| {
                for state in states.iter_mut() {
                    driver.step_node(state, field, h);
                }
            });
        });
    }

    for states in strips.iter_mut() {
        for state in states.iter_mut() {
            driver.finish_node(state);
        }
    }

    let mut output = SweepOutput::new(nx, ny, config.fill_value, config.diagnostics);

    for (strip_idx, &(row_lo, row_hi)) in strip_bounds.iter().enumerate() {
        let states = &strips[strip_idx];

        let mut k = 0;
        for j in row_lo..row_hi {
            for i in 0..nx {
                let result = driver.reduce(&states[k]);
                k += 1;
                progress.inc(1);

                if result.masked || result.missing {
                    continue;
                }

                output.theta1[[i, j]] = result.theta1;
                output.theta2[[i, j]] = result.theta2;
                output.lambda1[[i, j]] = result.lambda1;
                output.lambda2[[i, j]] = result.lambda2;

                if let Some(sep) = output.final_separation.as_mut() {
                    sep[[i, j]] = result.final_separation;
                }
                if let Some(dt) = output.delta_t.as_mut() {
                    dt[[i, j]] = result.delta_t;
                }
            }
        }
    }

    progress.finish_with_message("Map sweep complete");

    Ok(output)
}

fn build_pool(threads: usize) -> Result<ThreadPool, EngineError> {
    let mut builder = ThreadPoolBuilder::new();
    if threads > 0 {
        builder = builder.num_threads(threads);
    }
    builder.build().map_err(EngineError::ThreadPool)
}

/// Splits `ny` rows into `workers` row-strips of roughly equal size.
fn partition_rows(ny: usize, workers: usize) -> Vec<(usize, usize)> {
    let workers = workers.max(1).min(ny.max(1));
    let base = ny / workers;
    let remainder = ny % workers;

    let mut bounds = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let size = base + usize::from(w < remainder);
        bounds.push((start, start + size));
        start += size;
    }
    bounds
}

fn is_masked(mask: Option<&Snapshot>, x: Float, y: Float) -> bool {
    match mask {
        None => false,
        Some(snapshot) => {
            let fill = snapshot.fill_value().unwrap_or(Float::NAN);
            let (value, _) = snapshot.interpolate(x, y, fill, None);
            !value.is_nan() && value != fill
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::CoordinateKind;
    use crate::driver::Mode;
    use crate::field_provider::{FileEntry, VelocityUnits};
    use crate::stencil::StencilKind;
    use chrono::{Duration, Utc};

    #[test]
    fn partition_rows_covers_every_row_exactly_once() {
        let bounds = partition_rows(10, 3);
        let mut covered = vec![false; 10];
        for (lo, hi) in bounds {
            for row in lo..hi {
                assert!(!covered[row], "row {row} covered twice");
                covered[row] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn sweep_with_no_input_files_fails_fetch_fatally() {
        // No input files at all means the very first `fetch` cannot
        // find any bracketing snapshot: this is the `IntervalNotCovered`
        // failure mode, which §7 marks fatal in the driver — the sweep
        // must propagate it rather than silently fill the output.
        let t0 = Utc::now();
        let driver_config = DriverConfig {
            t_start: t0,
            t_end: t0 + Duration::days(30),
            mode: Mode::Fsle,
            delta_final: 0.2,
            delta0: 0.1,
            stencil_kind: StencilKind::Triplet,
        };

        let config = SweepConfig {
            x_values: (0..10).map(|i| i as Float * 0.1).collect(),
            y_values: (0..10).map(|i| i as Float * 0.1).collect(),
            driver_config,
            coordinate: CoordinateModel::Cartesian,
            h: 3_600.0 * 24.0,
            fill_value: -999.0,
            diagnostics: true,
            threads: 1,
        };

        let field = FieldProvider::new(
            Vec::<FileEntry>::new(),
            "u",
            "v",
            Float::NAN,
            Float::NAN,
            VelocityUnits::Metric,
            CoordinateKind::Cartesian,
        );

        let stop = AtomicBool::new(false);
        let result = run(&field, None, &config, &stop);

        assert!(result.is_err());
    }
}
