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

//! Module implementing a 1-D coordinate axis: kind tagging, regular-grid
//! detection, unit conversion, and index lookup by bisection.
//!
//! The bisection core here applies the same binary-search discipline
//! used elsewhere to locate grid cells around a moving particle,
//! generalised to cover both ascending and descending axes.

use crate::constants::REGULAR_AXIS_TOLERANCE;
use crate::errors::{SearchError, UnitError};
use crate::units::Registry as UnitRegistry;
use crate::Float;

/// Kind of physical quantity an [`Axis`] represents.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AxisKind {
    X,
    Y,
    Longitude,
    Latitude,
    Time,
    Unknown,
}

/// Ordered sequence of coordinates along one dimension of a grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Axis {
    values: Vec<Float>,
    kind: AxisKind,
    unit: String,
    regular: bool,
    start: Float,
    increment: Float,
}

impl Axis {
    /// Builds an axis from raw, strictly monotone values.
    ///
    /// Longitude values are canonicalised into a contiguous interval
    /// `[origin, origin+360)` with `origin` chosen from `{-180, 0}`
    /// so that the covered arc does not wrap across the chosen
    /// boundary.
    pub fn new(mut values: Vec<Float>, kind: AxisKind, unit: impl Into<String>) -> Self {
        if kind == AxisKind::Longitude {
            values = canonicalise_longitude(values);
        }

        let (regular, start, increment) = detect_regular(&values, kind);

        Axis {
            values,
            kind,
            unit: unit.into(),
            regular,
            start,
            increment,
        }
    }

    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn is_regular(&self) -> bool {
        self.regular
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Float] {
        &self.values
    }

    pub fn start(&self) -> Option<Float> {
        self.regular.then_some(self.start)
    }

    pub fn increment(&self) -> Option<Float> {
        self.regular.then_some(self.increment)
    }

    /// Exact index of `v`, or `None` when `v` is not one of the axis's
    /// coordinates (within [`REGULAR_AXIS_TOLERANCE`]).
    pub fn index_of(&self, v: Float) -> Option<usize> {
        let i = self.locate(v)?;

        if (self.values[i] - v).abs() <= REGULAR_AXIS_TOLERANCE {
            Some(i)
        } else {
            None
        }
    }

    /// Returns `(i, i+1)` such that `v` lies between `values[i]` and
    /// `values[i+1]`, or `None` when `v` is outside the axis.
    pub fn bracket(&self, v: Float) -> Option<(usize, usize)> {
        let ascending = self.is_ascending();
        let (lo, hi) = bounds(&self.values);

        if v < lo || v > hi {
            return None;
        }

        if self.regular {
            let raw = (v - self.start) / self.increment;
            let i = raw.floor() as isize;
            let i = i.clamp(0, self.values.len() as isize - 2) as usize;
            return Some((i, i + 1));
        }

        let i = bisect(&self.values, v, ascending).ok()?;

        if i + 1 >= self.values.len() {
            if i == 0 {
                return None;
            }
            Some((i - 1, i))
        } else {
            Some((i, i + 1))
        }
    }

    /// Like [`Axis::bracket`] but clamps `v` into the axis range
    /// instead of returning `None`.
    pub fn index_bounded(&self, v: Float) -> (usize, usize) {
        let (lo, hi) = bounds(&self.values);
        let clamped = v.clamp(lo.min(hi), lo.max(hi));

        self.bracket(clamped)
            .unwrap_or((0, self.values.len().saturating_sub(1).max(1)))
    }

    /// Converts every coordinate to `to_unit` via the unit registry,
    /// returning a new axis with the converted unit recorded.
    pub fn convert(&self, to_unit: &str, registry: &UnitRegistry) -> Result<Axis, UnitError> {
        let conv = registry.converter(&self.unit, to_unit)?;

        let values = self.values.iter().map(|&v| conv.apply(v)).collect();

        Ok(Axis::new(values, self.kind, to_unit))
    }

    fn is_ascending(&self) -> bool {
        self.values.len() < 2 || self.values[0] < self.values[self.values.len() - 1]
    }

    fn locate(&self, v: Float) -> Option<usize> {
        if self.regular {
            let raw = ((v - self.start) / self.increment).round();
            if raw < 0.0 || raw as usize >= self.values.len() {
                return None;
            }
            return Some(raw as usize);
        }

        bisect(&self.values, v, self.is_ascending()).ok()
    }
}

fn bounds(values: &[Float]) -> (Float, Float) {
    let a = *values.first().unwrap();
    let b = *values.last().unwrap();

    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Binary search adapted to locate the index whose value is closest to
/// (and not past) `x`, on either an ascending or descending axis.
fn bisect(values: &[Float], x: Float, ascending: bool) -> Result<usize, SearchError> {
    if values.is_empty() {
        return Err(SearchError::EmptyArray);
    }

    let (lo_val, hi_val) = bounds(values);
    if x < lo_val || x > hi_val {
        return Err(SearchError::OutOfBounds);
    }

    let mut lo = 0usize;
    let mut hi = values.len() - 1;

    while lo < hi {
        let mid = (lo + hi) / 2;

        let past = if ascending {
            values[mid] >= x
        } else {
            values[mid] <= x
        };

        if past {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    Ok(lo)
}

fn detect_regular(values: &[Float], kind: AxisKind) -> (bool, Float, Float) {
    if values.len() < 2 {
        return (false, values.first().copied().unwrap_or(0.0), 0.0);
    }

    let first_increment = values[1] - values[0];

    let all_equal = values
        .windows(2)
        .all(|w| (w[1] - w[0] - first_increment).abs() <= REGULAR_AXIS_TOLERANCE);

    let sum_bounded = if kind == AxisKind::Longitude {
        (values.last().unwrap() - values.first().unwrap()).abs() <= 360.0 + REGULAR_AXIS_TOLERANCE
    } else {
        true
    };

    if all_equal && sum_bounded {
        (true, values[0], first_increment)
    } else {
        (false, values[0], first_increment)
    }
}

/// Normalises `v` into `[origin, origin+circle)`.
pub fn normalize(v: Float, origin: Float, circle: Float) -> Float {
    v - circle * ((v - origin) / circle).floor()
}

fn canonicalise_longitude(values: Vec<Float>) -> Vec<Float> {
    // Choose the origin ({-180} or {0}) that keeps the covered arc
    // contiguous: try -180 first (matches the common [-180, 180)
    // convention) and fall back to 0 if that would split the data
    // across the wrap point. Values are shifted in place, never
    // reordered: the caller's data matrix is indexed by the same raw
    // column order, so permuting the axis here would desync it from
    // that matrix. Because the chosen origin avoids splitting the
    // data's arc, the shift is a uniform per-element offset and the
    // original monotonic order (ascending or descending) survives it.
    let origin = choose_longitude_origin(&values);

    values
        .iter()
        .map(|&v| normalize(v, origin, 360.0))
        .collect()
}

fn choose_longitude_origin(values: &[Float]) -> Float {
    if values.is_empty() {
        return -180.0;
    }

    let span_from_neg180 = arc_span(values, -180.0);
    let span_from_0 = arc_span(values, 0.0);

    if span_from_neg180 <= span_from_0 {
        -180.0
    } else {
        0.0
    }
}

fn arc_span(values: &[Float], origin: Float) -> Float {
    let normalised: Vec<Float> = values.iter().map(|&v| normalize(v, origin, 360.0)).collect();
    let min = normalised.iter().cloned().fold(Float::INFINITY, Float::min);
    let max = normalised
        .iter()
        .cloned()
        .fold(Float::NEG_INFINITY, Float::max);
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn regular_axis_detected() {
        let axis = Axis::new(vec![0.0, 1.0, 2.0, 3.0], AxisKind::X, "m");
        assert!(axis.is_regular());
        assert_approx_eq!(Float, axis.start().unwrap(), 0.0);
        assert_approx_eq!(Float, axis.increment().unwrap(), 1.0);
    }

    #[test]
    fn irregular_axis_detected() {
        let axis = Axis::new(vec![0.0, 1.0, 3.0, 3.5], AxisKind::X, "m");
        assert!(!axis.is_regular());
    }

    #[test]
    fn bracket_regular() {
        let axis = Axis::new(vec![0.0, 1.0, 2.0, 3.0], AxisKind::X, "m");
        assert_eq!(axis.bracket(1.5), Some((1, 2)));
        assert_eq!(axis.bracket(-1.0), None);
        assert_eq!(axis.bracket(5.0), None);
    }

    #[test]
    fn bracket_descending() {
        let axis = Axis::new(vec![3.0, 2.0, 1.0, 0.0], AxisKind::Y, "m");
        assert_eq!(axis.bracket(1.5), Some((1, 2)));
    }

    #[test]
    fn normalize_is_idempotent_and_in_range() {
        for raw in [-540.0, -181.0, -180.0, 0.0, 179.999, 360.0, 720.5] {
            let once = normalize(raw, -180.0, 360.0);
            let twice = normalize(once, -180.0, 360.0);
            assert_approx_eq!(Float, once, twice);
            assert!(once >= -180.0 && once < 180.0);
            assert_approx_eq!(Float, (once - raw).rem_euclid(360.0), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn index_of_exact() {
        let axis = Axis::new(vec![0.0, 1.0, 2.0, 3.0], AxisKind::X, "m");
        assert_eq!(axis.index_of(2.0), Some(2));
        assert_eq!(axis.index_of(2.5), None);
    }
}
