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

//! Unit Registry (§4.C): parses a small fixed algebra of length, time,
//! angle, and dimensionless units, and produces linear `(scale, offset)`
//! converters between units of the same dimension.
//!
//! The lookup-table shape here follows a "small closed enum +
//! exhaustive match" style used elsewhere for fixed field taxonomies.

use crate::errors::UnitError;
use crate::Float;

/// A linear unit conversion: `value_to = scale * value_from + offset`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Converter {
    scale: Float,
    offset: Float,
}

impl Converter {
    pub fn identity() -> Self {
        Converter {
            scale: 1.0,
            offset: 0.0,
        }
    }

    pub fn apply(&self, value: Float) -> Float {
        self.scale * value + self.offset
    }

    pub fn scale(&self) -> Float {
        self.scale
    }

    pub fn offset(&self) -> Float {
        self.offset
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Dimension {
    Length,
    Time,
    Angle,
    Dimensionless,
}

/// Canonical unit within a dimension, with the multiplicative factor
/// that converts one unit of it into the dimension's base unit
/// (metres, seconds, or degrees).
fn canonical(unit: &str) -> Option<(Dimension, Float)> {
    let unit = unit.trim();

    Some(match unit {
        "m" | "metre" | "metres" | "meter" | "meters" => (Dimension::Length, 1.0),
        "km" | "kilometre" | "kilometres" => (Dimension::Length, 1_000.0),
        "cm" => (Dimension::Length, 0.01),

        "s" | "sec" | "second" | "seconds" => (Dimension::Time, 1.0),
        "min" | "minute" | "minutes" => (Dimension::Time, 60.0),
        "h" | "hr" | "hour" | "hours" => (Dimension::Time, 3_600.0),
        "day" | "days" => (Dimension::Time, 86_400.0),

        "degree" | "degrees" | "deg" | "degrees_east" | "degrees_north" | "degree_E"
        | "degree_N" | "degrees_E" | "degrees_N" => (Dimension::Angle, 1.0),
        "radian" | "radians" | "rad" => (Dimension::Angle, 180.0 / std::f64::consts::PI),

        "1" | "" | "dimensionless" => (Dimension::Dimensionless, 1.0),

        _ => return None,
    })
}

/// Registry of unit conversions. Stateless and immutable after
/// construction — safe to share across map-sweep workers, per §5.
#[derive(Clone, Copy, Debug, Default)]
pub struct Registry;

impl Registry {
    pub fn new() -> Self {
        Registry
    }

    /// Produces a converter from `from` to `to`. Fails when either unit
    /// is unrecognised, or when the two units belong to different
    /// dimensions (no linear form exists, e.g. `m/s -> degree/s`: that
    /// conversion is the Field Provider's job, see §4.D, not the
    /// registry's).
    pub fn converter(&self, from: &str, to: &str) -> Result<Converter, UnitError> {
        if from.trim() == to.trim() {
            return Ok(Converter::identity());
        }

        let (from_dim, from_factor) =
            canonical(from).ok_or_else(|| UnitError::Unrecognised(from.to_string()))?;
        let (to_dim, to_factor) =
            canonical(to).ok_or_else(|| UnitError::Unrecognised(to.to_string()))?;

        if from_dim != to_dim {
            return Err(UnitError::NoLinearForm {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(Converter {
            scale: from_factor / to_factor,
            offset: 0.0,
        })
    }

    /// Returns whether `unit` is one of the canonical longitude-axis
    /// unit spellings recognised by the snapshot reader (§4.B step 2).
    pub fn is_longitude_unit(unit: &str) -> bool {
        matches!(
            unit.trim(),
            "degrees_east" | "degree_east" | "degree_E" | "degrees_E"
        )
    }

    /// Returns whether `unit` is one of the canonical latitude-axis
    /// unit spellings.
    pub fn is_latitude_unit(unit: &str) -> bool {
        matches!(
            unit.trim(),
            "degrees_north" | "degree_north" | "degree_N" | "degrees_N"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn identity_conversion() {
        let registry = Registry::new();
        let conv = registry.converter("m", "m").unwrap();
        assert_approx_eq!(Float, conv.apply(5.0), 5.0);
    }

    #[test]
    fn km_to_m() {
        let registry = Registry::new();
        let conv = registry.converter("km", "m").unwrap();
        assert_approx_eq!(Float, conv.apply(2.0), 2000.0);
    }

    #[test]
    fn hours_to_seconds() {
        let registry = Registry::new();
        let conv = registry.converter("h", "s").unwrap();
        assert_approx_eq!(Float, conv.apply(1.0), 3600.0);
    }

    #[test]
    fn cross_dimension_rejected() {
        let registry = Registry::new();
        assert!(registry.converter("m", "s").is_err());
    }

    #[test]
    fn unknown_unit_rejected() {
        let registry = Registry::new();
        assert!(registry.converter("parsecs", "m").is_err());
    }

    #[test]
    fn longitude_unit_detection() {
        assert!(Registry::is_longitude_unit("degrees_east"));
        assert!(!Registry::is_longitude_unit("degrees_north"));
    }
}
