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

//! NetCDF map writer (§6): serialises a completed [`SweepOutput`] to a
//! `lon x lat` NetCDF grid, converting `lambda1`/`lambda2` from the
//! driver's native `1/s` to the on-disk `1/day`.
//!
//! Variable/attribute access mirrors the read side in
//! [`crate::grid::Reader`]; this is its write-side counterpart.

use std::path::Path;

use crate::errors::EngineError;
use crate::sweep::SweepOutput;
use crate::Float;

/// Standard NetCDF `_FillValue` for a 64-bit float, used when the
/// caller supplies no explicit fill value.
const NC_FILL_DOUBLE: Float = 9.969_209_968_386_869e36;

/// Seconds-to-days factor applied when writing `lambda1`/`lambda2`:
/// the driver stores exponents in `1/s`, the file reports `1/day`.
const SECONDS_PER_DAY: Float = 86_400.0;

/// One global attribute, written verbatim as a string.
pub struct Attribute {
    pub name: &'static str,
    pub value: String,
}

/// Everything written to the map output file beyond the arrays
/// themselves: one attribute per integration parameter, per §6.
pub struct MapAttributes {
    pub attributes: Vec<Attribute>,
    pub fill_value: Option<Float>,
}

pub fn write_map(
    path: &Path,
    x_values: &[Float],
    y_values: &[Float],
    output: &SweepOutput,
    meta: &MapAttributes,
) -> Result<(), EngineError> {
    let nx = x_values.len();
    let ny = y_values.len();
    let fill_value = meta.fill_value.unwrap_or(NC_FILL_DOUBLE);

    let mut file = netcdf::create(path)?;

    file.add_dimension("lon", nx)?;
    file.add_dimension("lat", ny)?;

    let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
    lon.put_values(x_values, ..)?;
    lon.put_attribute("units", "degrees_east")?;

    let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
    lat.put_values(y_values, ..)?;
    lat.put_attribute("units", "degrees_north")?;

    write_grid_variable(&mut file, "theta1", &output.theta1, "degrees", fill_value)?;
    write_grid_variable(&mut file, "theta2", &output.theta2, "degrees", fill_value)?;
    write_grid_variable(
        &mut file,
        "lambda1",
        &scale(&output.lambda1, SECONDS_PER_DAY, fill_value),
        "1/day",
        fill_value,
    )?;
    write_grid_variable(
        &mut file,
        "lambda2",
        &scale(&output.lambda2, SECONDS_PER_DAY, fill_value),
        "1/day",
        fill_value,
    )?;

    if let Some(separation) = &output.final_separation {
        write_grid_variable(&mut file, "separation_distance", separation, "degrees", fill_value)?;
    }
    if let Some(delta_t) = &output.delta_t {
        write_grid_variable(
            &mut file,
            "advection_time",
            &scale(delta_t, 1.0 / SECONDS_PER_DAY, fill_value),
            "days",
            fill_value,
        )?;
    }

    for attribute in &meta.attributes {
        file.add_attribute(attribute.name, attribute.value.as_str())?;
    }

    Ok(())
}

/// Multiplies every non-fill value of `data` by `factor`, leaving
/// fill-value cells untouched.
fn scale(data: &ndarray::Array2<Float>, factor: Float, fill_value: Float) -> ndarray::Array2<Float> {
    data.mapv(|v| if v == fill_value { v } else { v * factor })
}

fn write_grid_variable(
    file: &mut netcdf::MutableFile,
    name: &str,
    data: &ndarray::Array2<Float>,
    units: &str,
    fill_value: Float,
) -> Result<(), EngineError> {
    let mut var = file.add_variable::<f64>(name, &["lon", "lat"])?;
    let flat: Vec<Float> = data.iter().copied().collect();
    var.put_values(&flat, ..)?;
    var.put_attribute("units", units)?;
    var.put_attribute("_FillValue", fill_value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn scale_leaves_fill_value_untouched() {
        let mut data = Array2::from_elem((2, 2), -999.0);
        data[[0, 0]] = 1.0;
        let scaled = scale(&data, 86_400.0, -999.0);

        assert_eq!(scaled[[0, 0]], 86_400.0);
        assert_eq!(scaled[[1, 1]], -999.0);
    }
}
