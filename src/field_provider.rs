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

//! Field Provider (§4.D): keeps a sliding window of loaded grid
//! snapshots resident, and serves temporally- and spatially-
//! interpolated velocity samples to the integrator.
//!
//! The resident-window-with-eviction shape follows a collect-then-
//! construct pipeline, generalised from a single-file read to a time
//! series of NetCDF files tracked in a `BTreeMap` keyed by timestamp.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::constants::EARTH_RADIUS_M;
use crate::coordinate::CoordinateKind;
use crate::errors::{FieldError, GridError};
use crate::grid::{Reader, Snapshot};
use crate::Float;

/// Frame in which velocity samples are normalised, per the
/// `VELOCITY_UNITS` configuration key.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum VelocityUnits {
    Metric,
    Angular,
}

impl VelocityUnits {
    fn target_unit(self) -> &'static str {
        match self {
            VelocityUnits::Metric => "m/s",
            VelocityUnits::Angular => "degree/s",
        }
    }
}

/// One input file contributing a timestamped pair of U/V snapshots.
#[derive(Clone, Debug)]
pub struct FileEntry {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

struct LoadedSnapshot {
    u: Snapshot,
    v: Snapshot,
    /// Set when the source unit could not be linearly converted to the
    /// configured frame (a metric/angular crossing) and so must be
    /// transformed at sample time using the local latitude.
    needs_frame_transform: bool,
}

/// Serves velocity samples over a time-varying 2-D field, backed by a
/// sorted list of input files and a sliding window of resident
/// snapshots.
pub struct FieldProvider {
    files: Vec<FileEntry>,
    u_variable: String,
    v_variable: String,
    fill_value_u: Float,
    fill_value_v: Float,
    velocity_units: VelocityUnits,
    coordinate_kind: CoordinateKind,
    cadence: Duration,
    cache: RwLock<BTreeMap<i64, LoadedSnapshot>>,
}

impl FieldProvider {
    pub fn new(
        mut files: Vec<FileEntry>,
        u_variable: impl Into<String>,
        v_variable: impl Into<String>,
        fill_value_u: Float,
        fill_value_v: Float,
        velocity_units: VelocityUnits,
        coordinate_kind: CoordinateKind,
    ) -> Self {
        files.sort_by_key(|f| f.timestamp);

        let cadence = files
            .windows(2)
            .map(|w| w[1].timestamp - w[0].timestamp)
            .min()
            .unwrap_or_else(|| Duration::seconds(0));

        FieldProvider {
            files,
            u_variable: u_variable.into(),
            v_variable: v_variable.into(),
            fill_value_u,
            fill_value_v,
            velocity_units,
            coordinate_kind,
            cadence,
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.files.first().map(|f| f.timestamp)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.files.last().map(|f| f.timestamp)
    }

    pub fn unit(&self) -> &'static str {
        self.velocity_units.target_unit()
    }

    pub fn coordinate_type(&self) -> CoordinateKind {
        self.coordinate_kind
    }

    /// Guarantees that snapshots covering `[t_lo, t_hi]` are resident,
    /// evicting anything outside `[t_lo - cadence, t_hi + cadence]`
    /// and loading anything newly required, in timestamp order.
    ///
    /// Concurrent callers are serialised by the write lock; `compute`
    /// only needs a read lock and is safe to call from any number of
    /// worker threads once `fetch` has returned.
    pub fn fetch(&self, t_lo: DateTime<Utc>, t_hi: DateTime<Utc>) -> Result<(), FieldError> {
        let window_lo = t_lo - self.cadence;
        let window_hi = t_hi + self.cadence;

        let required: Vec<&FileEntry> = self
            .files
            .iter()
            .filter(|f| f.timestamp >= window_lo && f.timestamp <= window_hi)
            .collect();

        if required.is_empty() {
            return Err(FieldError::IntervalNotCovered);
        }

        let mut cache = self.cache.write().expect("field provider cache poisoned");

        cache.retain(|&ts, _| {
            let ts = DateTime::<Utc>::from_timestamp(ts, 0).unwrap();
            ts >= window_lo && ts <= window_hi
        });

        for entry in required {
            let key = entry.timestamp.timestamp();
            if cache.contains_key(&key) {
                continue;
            }

            let reader = Reader::open(&entry.path).map_err(FieldError::Grid)?;
            let loaded = self.load_pair(&reader)?;
            cache.insert(key, loaded);
        }

        Ok(())
    }

    fn load_pair(&self, reader: &Reader) -> Result<LoadedSnapshot, FieldError> {
        let target = self.velocity_units.target_unit();

        let (u, u_transform) = self.load_with_fallback(reader, &self.u_variable, target)?;
        let u = u.with_fill_value_override(self.fill_value_u);

        let (v, v_transform) = self.load_with_fallback(reader, &self.v_variable, target)?;
        let v = v.with_fill_value_override(self.fill_value_v);

        Ok(LoadedSnapshot {
            u,
            v,
            needs_frame_transform: u_transform || v_transform,
        })
    }

    /// Loads `variable` converted to `target`; if the registry rejects
    /// the conversion as a metric/angular frame crossing, loads the
    /// variable unconverted and flags it for a sample-time transform.
    fn load_with_fallback(
        &self,
        reader: &Reader,
        variable: &str,
        target: &str,
    ) -> Result<(Snapshot, bool), FieldError> {
        match reader.load(variable, Some(target)) {
            Ok(snapshot) => Ok((snapshot, false)),
            Err(GridError::Unit(_)) => {
                let snapshot = reader.load(variable, None).map_err(FieldError::Grid)?;
                Ok((snapshot, true))
            }
            Err(other) => Err(FieldError::Grid(other)),
        }
    }

    /// Temporally and spatially interpolates the velocity at `(t, x, y)`.
    ///
    /// `defined` is `false` when either component falls on a fill
    /// value at every bracketing snapshot, or when `t` is outside the
    /// resident window by more than one cadence.
    pub fn compute(&self, t: DateTime<Utc>, x: Float, y: Float) -> (Float, Float, bool) {
        let cache = self.cache.read().expect("field provider cache poisoned");

        if cache.is_empty() {
            return (0.0, 0.0, false);
        }

        let key = t.timestamp();
        let mut before = cache.range(..=key).next_back();
        let mut after = cache.range(key..).next();

        if before.is_none() && after.is_some() {
            let (&ts, _) = after.unwrap();
            if (ts - key).abs() as i64 <= self.cadence.num_seconds().max(1) {
                before = after;
            }
        }
        if after.is_none() && before.is_some() {
            let (&ts, _) = before.unwrap();
            if (key - ts).abs() as i64 <= self.cadence.num_seconds().max(1) {
                after = before;
            }
        }

        let (before, after) = match (before, after) {
            (Some(b), Some(a)) => (b, a),
            _ => return (0.0, 0.0, false),
        };

        let (u0, v0, d0) = self.sample(before.1, x, y);
        if before.0 == after.0 {
            return (u0, v0, d0);
        }

        let (u1, v1, d1) = self.sample(after.1, x, y);
        if !d0 || !d1 {
            return (0.0, 0.0, false);
        }

        let span = (*after.0 - *before.0) as Float;
        let weight = if span > 0.0 {
            (key - before.0) as Float / span
        } else {
            0.0
        };

        let u = u0 + (u1 - u0) * weight;
        let v = v0 + (v1 - v0) * weight;

        (u, v, true)
    }

    fn sample(&self, snapshot: &LoadedSnapshot, x: Float, y: Float) -> (Float, Float, bool) {
        let fill = Float::NAN;

        let (mut u, _) = snapshot.u.interpolate(x, y, fill, None);
        let (mut v, _) = snapshot.v.interpolate(x, y, fill, None);

        if u.is_nan() || v.is_nan() {
            return (0.0, 0.0, false);
        }

        if snapshot.needs_frame_transform {
            let lat_rad = y.to_radians();

            match self.velocity_units {
                VelocityUnits::Angular => {
                    let cos_lat = lat_rad.cos();
                    if cos_lat.abs() < 1e-12 {
                        return (0.0, 0.0, false);
                    }
                    u = (u / (EARTH_RADIUS_M * cos_lat)).to_degrees();
                    v = (v / EARTH_RADIUS_M).to_degrees();
                }
                VelocityUnits::Metric => {
                    let cos_lat = lat_rad.cos();
                    u = u.to_radians() * EARTH_RADIUS_M * cos_lat;
                    v = v.to_radians() * EARTH_RADIUS_M;
                }
            }
        }

        (u, v, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_units_map_to_canonical_strings() {
        assert_eq!(VelocityUnits::Metric.target_unit(), "m/s");
        assert_eq!(VelocityUnits::Angular.target_unit(), "degree/s");
    }

}
