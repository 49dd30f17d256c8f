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

//! Snapshot Reader (§4.B): opens a NetCDF file, loads a named variable
//! together with its longitude/latitude axes, and provides in-cell
//! bilinear interpolation with fill-value handling.
//!
//! The two-phase "read raw, then buffer a typed struct" shape keeps
//! parsing separate from lookup; the interpolation itself is a
//! `nalgebra` inverse-solve over a bracketing 4-point stencil found by
//! axis-bracket lookup.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use nalgebra::{Matrix4, Vector4};

use crate::axis::{Axis, AxisKind};
use crate::errors::GridError;
use crate::units::Registry as UnitRegistry;
use crate::Float;

/// Cell location hint returned by a previous [`Snapshot::interpolate`]
/// call, passed back in to skip the bracket search when the next query
/// point is likely to fall in the same cell (adjacent RK4 stages and
/// stencil arms typically do).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellHint {
    pub i: usize,
    pub j: usize,
}

/// A single loaded variable with its axes, ready for interpolation.
#[derive(Clone, Debug)]
pub struct Snapshot {
    x_axis: Axis,
    y_axis: Axis,
    values: ndarray::Array2<Float>,
    fill_value: Option<Float>,
    unit: String,
}

impl Snapshot {
    pub fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &Axis {
        &self.y_axis
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn fill_value(&self) -> Option<Float> {
        self.fill_value
    }

    /// Supplies a fill value to use when the file carried no
    /// `_FillValue` attribute of its own (the `FILL_VALUE` config key,
    /// see §4.D).
    pub fn with_fill_value_override(mut self, fill_value: Float) -> Self {
        if self.fill_value.is_none() {
            self.fill_value = Some(fill_value);
        }
        self
    }

    /// Bilinearly interpolates the variable at `(x, y)`.
    ///
    /// Returns `(fill_value, None)` when `(x, y)` lies outside the
    /// axes or any of the four enclosing corners equals the file's
    /// fill value. Otherwise returns the interpolated value and a
    /// [`CellHint`] for the next call.
    pub fn interpolate(
        &self,
        x: Float,
        y: Float,
        fill_value: Float,
        cell_hint: Option<CellHint>,
    ) -> (Float, Option<CellHint>) {
        let (i0, i1) = match self.valid_bracket(&self.x_axis, x, cell_hint.map(|h| h.i)) {
            Some(b) => b,
            None => return (fill_value, None),
        };
        let (j0, j1) = match self.valid_bracket(&self.y_axis, y, cell_hint.map(|h| h.j)) {
            Some(b) => b,
            None => return (fill_value, None),
        };

        let xs = self.x_axis.values();
        let ys = self.y_axis.values();

        let corners = [
            (xs[i0], ys[j0], self.values[[i0, j0]]),
            (xs[i0], ys[j1], self.values[[i0, j1]]),
            (xs[i1], ys[j0], self.values[[i1, j0]]),
            (xs[i1], ys[j1], self.values[[i1, j1]]),
        ];

        if let Some(fv) = self.fill_value {
            if corners.iter().any(|&(_, _, v)| v == fv) {
                return (fill_value, None);
            }
        }

        let value = bilinear(x, y, corners);
        (value, Some(CellHint { i: i0, j: j0 }))
    }

    /// Tries the cached hint first; falls back to a fresh bracket
    /// search when the hint is stale or absent.
    fn valid_bracket(&self, axis: &Axis, v: Float, hint: Option<usize>) -> Option<(usize, usize)> {
        if let Some(i) = hint {
            let values = axis.values();
            if i + 1 < values.len() {
                let (lo, hi) = (values[i], values[i + 1]);
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                if v >= lo && v <= hi {
                    return Some((i, i + 1));
                }
            }
        }

        axis.bracket(v)
    }
}

fn bilinear(x: Float, y: Float, corners: [(Float, Float, Float); 4]) -> Float {
    let lhs = Matrix4::from_row_slice(&[
        1.0,
        corners[0].0,
        corners[0].1,
        corners[0].0 * corners[0].1,
        1.0,
        corners[1].0,
        corners[1].1,
        corners[1].0 * corners[1].1,
        1.0,
        corners[2].0,
        corners[2].1,
        corners[2].0 * corners[2].1,
        1.0,
        corners[3].0,
        corners[3].1,
        corners[3].0 * corners[3].1,
    ]);

    let rhs = Vector4::from_column_slice(&[
        corners[0].2,
        corners[1].2,
        corners[2].2,
        corners[3].2,
    ]);

    let lhs = lhs.try_inverse().unwrap();
    let coeffs = lhs * rhs;

    coeffs[0] + coeffs[1] * x + coeffs[2] * y + coeffs[3] * x * y
}

/// Opens and reads variables from a single NetCDF file.
pub struct Reader {
    file: netcdf::File,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let file = netcdf::open(path.as_ref())?;
        Ok(Reader { file })
    }

    /// Loads `variable` together with its longitude/latitude axes,
    /// optionally converting to `desired_unit`.
    pub fn load(&self, variable: &str, desired_unit: Option<&str>) -> Result<Snapshot, GridError> {
        let var = self
            .file
            .variable(variable)
            .ok_or_else(|| GridError::VariableNotFound(variable.to_string()))?;

        let dims = var.dimensions();
        if dims.len() != 2 {
            return Err(GridError::VariableNotFound(format!(
                "{variable} is not a 2-D variable"
            )));
        }

        let dim0 = dims[0].name();
        let dim1 = dims[1].name();

        let (x_axis, y_axis, lat_major) = self.read_axes(&dim0, &dim1)?;

        let raw = var
            .values::<f64, _>(..)
            .map_err(GridError::Io)?
            .mapv(|v| v as Float);

        // NetCDF stores the declared dimension order slowest-varying
        // first. A lat-major file (dims `[iy, ix]`, the conventional
        // CF ordering) therefore reads as `(ny, nx)`; transpose it to
        // `(nx, ny)` so `values[[i, j]]` always indexes `x_axis`/`y_axis`.
        let values = if lat_major {
            raw.into_shape((y_axis.len(), x_axis.len()))
                .map_err(GridError::IncorrectShape)?
                .reversed_axes()
        } else {
            raw.into_shape((x_axis.len(), y_axis.len()))
                .map_err(GridError::IncorrectShape)?
        };

        let fill_value = var
            .attribute("_FillValue")
            .and_then(|a| a.value().ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Float(f) => Some(f as Float),
                netcdf::AttributeValue::Double(d) => Some(d),
                _ => None,
            });

        let unit = var
            .attribute("units")
            .and_then(|a| a.value().ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Str(s) => Some(s),
                _ => None,
            })
            .unwrap_or_default();

        let mut snapshot = Snapshot {
            x_axis,
            y_axis,
            values,
            fill_value,
            unit,
        };

        if let Some(to_unit) = desired_unit {
            let registry = UnitRegistry::new();

            if is_velocity_frame_conversion(&snapshot.unit, to_unit) {
                return Err(GridError::Unit(crate::errors::UnitError::NoLinearForm {
                    from: snapshot.unit.clone(),
                    to: to_unit.to_string(),
                }));
            }

            let conv = registry.converter(&snapshot.unit, to_unit)?;
            snapshot.values.mapv_inplace(|v| conv.apply(v));
            snapshot.unit = to_unit.to_string();
        }

        Ok(snapshot)
    }

    /// Returns the timestamp associated with `variable`'s time
    /// coordinate (a scalar `time` variable or dimension is expected
    /// to carry a CF-style `units` attribute of the form
    /// `"<unit> since <reference>"`).
    pub fn date(&self, variable: &str) -> Result<DateTime<Utc>, GridError> {
        let time_var = self
            .file
            .variable("time")
            .ok_or_else(|| GridError::VariableNotFound("time".to_string()))?;

        let raw = time_var.values::<f64, _>(..).map_err(GridError::Io)?;
        let offset = *raw
            .iter()
            .next()
            .ok_or_else(|| GridError::VariableNotFound(format!("{variable}/time")))?;

        let reference = time_var
            .attribute("units")
            .and_then(|a| a.value().ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Str(s) => Some(s),
                _ => None,
            })
            .ok_or_else(|| GridError::AxisError("time".to_string()))?;

        parse_cf_time(&reference, offset).ok_or_else(|| GridError::AxisError(reference))
    }

    /// Reads the two dimensions in their declared order and assigns
    /// them to `x`/`y` by resolved kind (Longitude -> x, Latitude -> y)
    /// rather than by declaration order, since CF files commonly
    /// declare `[lat, lon]`. Returns whether `dim0` (the variable's
    /// first, slowest-varying dimension) was the latitude axis, so the
    /// caller knows whether the raw values need transposing.
    fn read_axes(&self, dim0: &str, dim1: &str) -> Result<(Axis, Axis, bool), GridError> {
        let registry = UnitRegistry::new();

        let (kind0, values0, unit0) = self.read_axis_values(dim0)?;
        let (kind1, values1, unit1) = self.read_axis_values(dim1)?;

        let kind0 = resolve_kind(kind0, &unit0, &registry);
        let kind1 = resolve_kind(kind1, &unit1, &registry);

        if kind0 == AxisKind::Unknown || kind1 == AxisKind::Unknown {
            return Err(GridError::AxisError(format!("{unit0} / {unit1}")));
        }

        let axis0 = Axis::new(values0, kind0, unit0);
        let axis1 = Axis::new(values1, kind1, unit1);

        if kind0 == AxisKind::Longitude {
            Ok((axis0, axis1, false))
        } else {
            Ok((axis1, axis0, true))
        }
    }

    fn read_axis_values(&self, dim: &str) -> Result<(AxisKind, Vec<Float>, String), GridError> {
        let var = self
            .file
            .variable(dim)
            .ok_or_else(|| GridError::VariableNotFound(dim.to_string()))?;

        let raw = var.values::<f64, _>(..).map_err(GridError::Io)?;
        let values: Vec<Float> = raw.iter().map(|&v| v as Float).collect();

        let unit = var
            .attribute("units")
            .and_then(|a| a.value().ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Str(s) => Some(s),
                _ => None,
            })
            .unwrap_or_default();

        Ok((AxisKind::Unknown, values, unit))
    }
}

fn resolve_kind(current: AxisKind, unit: &str, _registry: &UnitRegistry) -> AxisKind {
    if current != AxisKind::Unknown {
        return current;
    }

    if UnitRegistry::is_longitude_unit(unit) {
        AxisKind::Longitude
    } else if UnitRegistry::is_latitude_unit(unit) {
        AxisKind::Latitude
    } else {
        AxisKind::Unknown
    }
}

fn is_velocity_frame_conversion(from: &str, to: &str) -> bool {
    let metric = ["m/s", "m s-1", "m s^-1"];
    let angular = ["degree/s", "degrees/s", "degree s-1"];

    (metric.contains(&from) && angular.contains(&to))
        || (angular.contains(&from) && metric.contains(&to))
}

/// Parses a CF-convention `"<unit> since <reference>"` time-units
/// string and applies `offset` to the reference instant. Only the
/// `seconds`/`hours`/`days` units used by the engine's input data are
/// supported.
fn parse_cf_time(units: &str, offset: Float) -> Option<DateTime<Utc>> {
    let (unit, rest) = units.split_once(" since ")?;
    let rest = rest.trim();
    let reference = NaiveDateTime::parse_from_str(rest, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .or_else(|_| NaiveDate::parse_from_str(rest, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is always valid").and_utc()))
        .ok()?;

    let seconds = match unit.trim() {
        "seconds" | "second" | "s" => offset,
        "minutes" | "minute" => offset * 60.0,
        "hours" | "hour" | "h" => offset * 3_600.0,
        "days" | "day" => offset * 86_400.0,
        _ => return None,
    };

    Some(reference + chrono::Duration::milliseconds((seconds * 1000.0) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_matches_corner_average_at_centre() {
        let corners = [(0.0, 0.0, 1.0), (0.0, 1.0, 2.0), (1.0, 0.0, 3.0), (1.0, 1.0, 4.0)];
        let value = bilinear(0.5, 0.5, corners);
        assert!((value - 2.5).abs() < 1e-9);
    }

    #[test]
    fn cf_time_seconds_since_epoch() {
        let parsed = parse_cf_time("seconds since 1970-01-01 00:00:00", 3600.0).unwrap();
        assert_eq!(parsed.timestamp(), 3600);
    }

    #[test]
    fn cf_time_days_since_reference() {
        let parsed = parse_cf_time("days since 2000-01-01", 1.0).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2000-01-02");
    }

    #[test]
    fn velocity_frame_conversion_detected() {
        assert!(is_velocity_frame_conversion("m/s", "degree/s"));
        assert!(!is_velocity_frame_conversion("m/s", "m/s"));
    }

    #[test]
    fn lat_major_variable_transposes_to_x_major() {
        let path = std::env::temp_dir().join("lcs_fle_grid_lat_major_test.nc");

        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("lat", 2).unwrap();
            file.add_dimension("lon", 2).unwrap();

            let mut lon = file.add_variable::<f64>("lon", &["lon"]).unwrap();
            lon.put_values(&[0.0, 1.0], ..).unwrap();
            lon.put_attribute("units", "degrees_east").unwrap();

            let mut lat = file.add_variable::<f64>("lat", &["lat"]).unwrap();
            lat.put_values(&[0.0, 1.0], ..).unwrap();
            lat.put_attribute("units", "degrees_north").unwrap();

            // Declared `[lat, lon]`, the conventional CF ordering, with
            // lat the slowest-varying dimension.
            let mut u = file.add_variable::<f64>("u", &["lat", "lon"]).unwrap();
            u.put_values(&[10.0, 20.0, 30.0, 40.0], ..).unwrap();
            u.put_attribute("units", "m/s").unwrap();
        }

        let reader = Reader::open(&path).unwrap();
        let snapshot = reader.load("u", None).unwrap();
        fs_remove(&path);

        assert_eq!(snapshot.x_axis().values(), &[0.0, 1.0]);
        assert_eq!(snapshot.y_axis().values(), &[0.0, 1.0]);

        let (value, _) = snapshot.interpolate(0.0, 0.0, -999.0, None);
        assert!((value - 10.0).abs() < 1e-9);
        let (value, _) = snapshot.interpolate(1.0, 0.0, -999.0, None);
        assert!((value - 20.0).abs() < 1e-9);
        let (value, _) = snapshot.interpolate(0.0, 1.0, -999.0, None);
        assert!((value - 30.0).abs() < 1e-9);
    }

    fn fs_remove(path: &std::path::Path) {
        std::fs::remove_file(path).ok();
    }
}
