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

//! Stencil (§4.G): a small cluster of particles advected together,
//! whose relative displacement approximates the local deformation
//! gradient. Reports Cauchy-Green strain eigenvalues/vectors once
//! advection completes.
//!
//! Member advection reuses [`rk4_step`]; the eigen-decomposition
//! leans on the same `nalgebra` symmetric-eigen facilities used
//! elsewhere for small inverse-solves, applied here to a 2x2
//! deformation gradient instead of an interpolation matrix.

use chrono::{DateTime, Duration, Utc};
use nalgebra::{Matrix2, SymmetricEigen};

use crate::coordinate::{CoordinateModel, Point};
use crate::field_provider::FieldProvider;
use crate::integrator::rk4_step;
use crate::Float;

/// Which particle arrangement a [`Stencil`] was constructed with.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StencilKind {
    Triplet,
    Quintuplet,
}

/// Result of a completed stencil's Cauchy-Green eigen-decomposition.
#[derive(Copy, Clone, Debug)]
pub struct EigenResult {
    pub lambda1: Float,
    pub lambda2: Float,
    pub theta1: Float,
    pub theta2: Float,
    pub final_separation: Float,
}

/// A cluster of particles advected together to estimate the local
/// deformation gradient. Member `0` is always the centre particle.
#[derive(Clone, Debug)]
pub struct Stencil {
    kind: StencilKind,
    members: Vec<Point>,
    delta0: Float,
    t0: DateTime<Utc>,
    time: DateTime<Utc>,
    missing: bool,
    completed: bool,
}

impl Stencil {
    pub fn new(kind: StencilKind, x: Float, y: Float, delta0: Float, t0: DateTime<Utc>) -> Self {
        let members = match kind {
            StencilKind::Triplet => vec![
                Point::new(x, y),
                Point::new(x + delta0, y),
                Point::new(x, y + delta0),
            ],
            StencilKind::Quintuplet => vec![
                Point::new(x, y),
                Point::new(x + delta0, y),
                Point::new(x, y + delta0),
                Point::new(x - delta0, y),
                Point::new(x, y - delta0),
            ],
        };

        Stencil {
            kind,
            members,
            delta0,
            t0,
            time: t0,
            missing: false,
            completed: false,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn centre(&self) -> Point {
        self.members[0]
    }

    /// Advances every member by one RK4 step of size `h` seconds. If
    /// any member samples an undefined field value, the stencil is
    /// marked `missing` and `completed`, and positions/time are left
    /// unchanged (per §4.G).
    pub fn advance(&mut self, field: &FieldProvider, coordinate: &CoordinateModel, h: Float) {
        if self.completed {
            return;
        }

        let mut next = Vec::with_capacity(self.members.len());

        for &p in &self.members {
            match rk4_step(field, coordinate, self.time, p, h) {
                Some(moved) => next.push(moved),
                None => {
                    self.missing = true;
                    self.completed = true;
                    return;
                }
            }
        }

        self.members = next;
        self.time += Duration::milliseconds((h * 1_000.0) as i64);
    }

    /// Largest pairwise great-circle (or Euclidean) distance between
    /// any two members.
    pub fn max_distance(&self, coordinate: &CoordinateModel) -> Float {
        let mut max = 0.0;

        for i in 0..self.members.len() {
            for j in (i + 1)..self.members.len() {
                let d = coordinate.distance(self.members[i], self.members[j]);
                if d > max {
                    max = d;
                }
            }
        }

        max
    }

    /// Deformation gradient columns: raw current displacement of each
    /// neighbour from the centre (not normalized by `delta0`; the
    /// eigen-decomposition normalizes the Cauchy-Green tensor instead,
    /// so that the resulting exponent does not depend on the choice of
    /// `delta0`). The quintuplet uses a central difference across
    /// opposite neighbours, averaged rather than normalized.
    pub fn strain_tensor(&self) -> Matrix2<Float> {
        let centre = self.members[0];

        let (col1, col2) = match self.kind {
            StencilKind::Triplet => {
                let plus_x = self.members[1];
                let plus_y = self.members[2];

                (
                    (plus_x.x - centre.x, plus_x.y - centre.y),
                    (plus_y.x - centre.x, plus_y.y - centre.y),
                )
            }
            StencilKind::Quintuplet => {
                let plus_x = self.members[1];
                let plus_y = self.members[2];
                let minus_x = self.members[3];
                let minus_y = self.members[4];

                (
                    ((plus_x.x - minus_x.x) / 2.0, (plus_x.y - minus_x.y) / 2.0),
                    ((plus_y.x - minus_y.x) / 2.0, (plus_y.y - minus_y.y) / 2.0),
                )
            }
        };

        Matrix2::new(col1.0, col2.0, col1.1, col2.1)
    }

    /// Forms the Cauchy-Green tensor `C = AᵀA`, normalizes it by
    /// `delta0²` (undoing the raw scale of [`strain_tensor`] so the
    /// exponent reflects a stretch ratio rather than an absolute
    /// displacement), solves its eigenproblem, and converts eigenvalues
    /// to exponents. `λᵢ = (1/(2Δt))·ln(σᵢ/delta0²)` with
    /// `Δt = time - t0`; eigenvalues/vectors are returned with
    /// `λ1 ≥ λ2`.
    pub fn eigen(&self, coordinate: &CoordinateModel) -> EigenResult {
        let a = self.strain_tensor();
        let c = a.transpose() * a;
        let delta0_sq = self.delta0 * self.delta0;

        let eig = SymmetricEigen::new(c);
        let mut pairs: Vec<(Float, nalgebra::Vector2<Float>)> = (0..2)
            .map(|i| (eig.eigenvalues[i], eig.eigenvectors.column(i).into_owned()))
            .collect();
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        let delta_t = (self.time - self.t0).num_milliseconds() as Float / 1_000.0;
        let denom = if delta_t.abs() > 0.0 {
            2.0 * delta_t
        } else {
            Float::INFINITY
        };

        let to_exponent = |sigma: Float| -> Float {
            let sigma = sigma / delta0_sq;
            if sigma > 0.0 && delta_t.abs() > 0.0 {
                sigma.ln() / denom
            } else {
                0.0
            }
        };

        let theta = |v: &nalgebra::Vector2<Float>| v.y.atan2(v.x).to_degrees();

        EigenResult {
            lambda1: to_exponent(pairs[0].0),
            lambda2: to_exponent(pairs[1].0),
            theta1: theta(&pairs[0].1),
            theta2: theta(&pairs[1].1),
            final_separation: self.max_distance(coordinate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn triplet_strain_tensor_at_init_is_diagonal_at_delta0() {
        let t0 = Utc::now();
        let stencil = Stencil::new(StencilKind::Triplet, 0.0, 0.0, 0.5, t0);
        let a = stencil.strain_tensor();

        assert_approx_eq!(Float, a[(0, 0)], 0.5);
        assert_approx_eq!(Float, a[(1, 0)], 0.0);
        assert_approx_eq!(Float, a[(0, 1)], 0.0);
        assert_approx_eq!(Float, a[(1, 1)], 0.5);
    }

    #[test]
    fn stationary_stencil_has_zero_exponents() {
        let t0 = Utc::now();
        let mut stencil = Stencil::new(StencilKind::Triplet, 0.0, 0.0, 0.5, t0);
        stencil.time = t0 + Duration::days(30);
        stencil.mark_completed();

        let coordinate = CoordinateModel::Cartesian;
        let result = stencil.eigen(&coordinate);

        assert_approx_eq!(Float, result.lambda1, 0.0, epsilon = 1e-12);
        assert_approx_eq!(Float, result.lambda2, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn max_distance_triplet_is_largest_pair() {
        let t0 = Utc::now();
        let stencil = Stencil::new(StencilKind::Triplet, 0.0, 0.0, 1.0, t0);
        let coordinate = CoordinateModel::Cartesian;

        assert_approx_eq!(Float, stencil.max_distance(&coordinate), 2f64.sqrt());
    }
}
