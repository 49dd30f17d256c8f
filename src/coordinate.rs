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

//! Coordinate Model (§4.E): converts a velocity sample into a
//! position increment, and measures distance between two points.
//!
//! A tagged enum rather than a trait object per variant: the set of
//! coordinate frames is closed and the per-variant state is trivial,
//! so dynamic dispatch would only cost an indirection for no benefit
//! (a REDESIGN FLAG calls this out explicitly).

use crate::axis::normalize;
use crate::constants::EARTH_RADIUS_M;
use crate::Float;

/// Which coordinate frame a [`CoordinateModel`] operates in.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CoordinateKind {
    SphericalEquatorial,
    Cartesian,
}

/// A 2-D point. Units depend on the active [`CoordinateModel`]: degrees
/// for `SphericalEquatorial`, planar units for `Cartesian`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: Float,
    pub y: Float,
}

impl Point {
    pub fn new(x: Float, y: Float) -> Self {
        Point { x, y }
    }
}

/// Coordinate frame used to advance particle positions and measure
/// distances between them.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CoordinateModel {
    /// Longitude/latitude in degrees. Velocity samples may arrive in
    /// `m/s` or `degree/s`; both are handled by [`CoordinateModel::advance`].
    SphericalEquatorial { velocity_is_angular: bool },
    /// A planar unit, identical for position and velocity.
    Cartesian,
}

impl CoordinateModel {
    pub fn kind(&self) -> CoordinateKind {
        match self {
            CoordinateModel::SphericalEquatorial { .. } => CoordinateKind::SphericalEquatorial,
            CoordinateModel::Cartesian => CoordinateKind::Cartesian,
        }
    }

    /// Applies one RK stage increment given a velocity sample `(u, v)`
    /// at point `p`, over a step `dt` (seconds). Positions that cross
    /// a pole or the ±180° seam are wrapped through [`normalize`].
    pub fn advance(&self, p: Point, u: Float, v: Float, dt: Float) -> Point {
        match self {
            CoordinateModel::SphericalEquatorial {
                velocity_is_angular,
            } => {
                let (dx, dy) = if *velocity_is_angular {
                    (u * dt, v * dt)
                } else {
                    let lat_rad = p.y.to_radians();
                    let dx = (u * dt / (EARTH_RADIUS_M * lat_rad.cos())).to_degrees();
                    let dy = (v * dt / EARTH_RADIUS_M).to_degrees();
                    (dx, dy)
                };

                let x = normalize(p.x + dx, -180.0, 360.0);
                let y = (p.y + dy).clamp(-90.0, 90.0);

                Point { x, y }
            }
            CoordinateModel::Cartesian => Point {
                x: p.x + u * dt,
                y: p.y + v * dt,
            },
        }
    }

    /// Distance between two points: great-circle degrees for
    /// `SphericalEquatorial`, Euclidean for `Cartesian`.
    pub fn distance(&self, p: Point, q: Point) -> Float {
        match self {
            CoordinateModel::SphericalEquatorial { .. } => great_circle_degrees(p, q),
            CoordinateModel::Cartesian => {
                ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt()
            }
        }
    }
}

/// Great-circle angular separation between `p` and `q`, expressed in
/// degrees, via the haversine formula.
fn great_circle_degrees(p: Point, q: Point) -> Float {
    let lat1 = p.y.to_radians();
    let lat2 = q.y.to_radians();
    let dlat = (q.y - p.y).to_radians();
    let dlon = (q.x - p.x).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    c.to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn spherical_advance_metric_moves_east() {
        let model = CoordinateModel::SphericalEquatorial {
            velocity_is_angular: false,
        };
        let p = Point::new(0.0, 0.0);
        let moved = model.advance(p, 10.0, 0.0, 3600.0);
        assert!(moved.x > 0.0);
        assert_approx_eq!(Float, moved.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn spherical_advance_angular_is_direct() {
        let model = CoordinateModel::SphericalEquatorial {
            velocity_is_angular: true,
        };
        let p = Point::new(10.0, 10.0);
        let moved = model.advance(p, 1.0, 1.0, 2.0);
        assert_approx_eq!(Float, moved.x, 12.0);
        assert_approx_eq!(Float, moved.y, 12.0);
    }

    #[test]
    fn cartesian_advance_is_linear() {
        let model = CoordinateModel::Cartesian;
        let p = Point::new(1.0, 1.0);
        let moved = model.advance(p, 2.0, 3.0, 0.5);
        assert_approx_eq!(Float, moved.x, 2.0);
        assert_approx_eq!(Float, moved.y, 2.5);
    }

    #[test]
    fn cartesian_distance_is_euclidean() {
        let model = CoordinateModel::Cartesian;
        let d = model.distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert_approx_eq!(Float, d, 5.0);
    }

    #[test]
    fn spherical_distance_zero_for_identical_points() {
        let model = CoordinateModel::SphericalEquatorial {
            velocity_is_angular: true,
        };
        let p = Point::new(12.0, 34.0);
        assert_approx_eq!(Float, model.distance(p, p), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn longitude_wraps_across_seam() {
        let model = CoordinateModel::SphericalEquatorial {
            velocity_is_angular: true,
        };
        let p = Point::new(179.0, 0.0);
        let moved = model.advance(p, 2.0, 0.0, 1.0);
        assert!(moved.x < -170.0);
    }
}
