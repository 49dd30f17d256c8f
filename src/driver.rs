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

//! FLE Driver (§4.I): owns the per-node stencil state machine for one
//! map-sweep strip (or a standalone run). The time-stepping loop
//! itself lives in the Map Sweep (§4.J), which owns the shared
//! iterator and issues the one union `fetch` per step; the driver
//! only knows how to initialise nodes and advance one already-fetched
//! step.
//!
//! The per-node dispatch follows a prepare-state, run-to-completion,
//! reduce-to-a-result-struct orchestration, generalised from one
//! particle to a stencil cluster with an early-termination criterion.

use chrono::{DateTime, Utc};

use crate::coordinate::CoordinateModel;
use crate::field_provider::FieldProvider;
use crate::stencil::{Stencil, StencilKind};
use crate::Float;

/// Which Lyapunov exponent family the driver computes.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Mode {
    Fsle,
    Ftle,
}

/// Parameters shared by every node in a run.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    pub t_start: DateTime<Utc>,
    pub t_end: DateTime<Utc>,
    pub mode: Mode,
    pub delta_final: Float,
    pub delta0: Float,
    pub stencil_kind: StencilKind,
}

/// Per-node state tracked across the map-sweep loop.
pub enum NodeState {
    /// The mask reader returned a defined, non-fill value at this
    /// node: it is excluded from computation entirely.
    Masked,
    /// Still advancing.
    Active(Stencil),
    /// Completed (threshold crossed, iterator exhausted, or a member
    /// went undefined mid-advance).
    Done(Stencil),
}

/// Outcome reduced from a finished [`NodeState`], ready to write into
/// the output arrays.
#[derive(Copy, Clone, Debug, Default)]
pub struct NodeResult {
    pub masked: bool,
    pub missing: bool,
    pub lambda1: Float,
    pub lambda2: Float,
    pub theta1: Float,
    pub theta2: Float,
    pub final_separation: Float,
    pub delta_t: Float,
}

pub struct Driver<'a> {
    config: &'a DriverConfig,
    coordinate: CoordinateModel,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a DriverConfig, coordinate: CoordinateModel) -> Self {
        Driver { config, coordinate }
    }

    /// Builds initial per-node state: masked nodes skip stencil
    /// construction entirely; others get a stencil centred at
    /// `(x, y)`. Particles on the domain edge are not special-cased
    /// here — `FieldProvider::compute` already reports them undefined
    /// once they leave the covered axes, which the first `advance`
    /// call surfaces as `missing`.
    pub fn init_node(&self, x: Float, y: Float, masked: bool) -> NodeState {
        if masked {
            return NodeState::Masked;
        }

        NodeState::Active(Stencil::new(
            self.config.stencil_kind,
            x,
            y,
            self.config.delta0,
            self.config.t_start,
        ))
    }

    /// Advances `state` by one already-fetched step `(t_curr, h)`.
    /// No-ops on `Masked`/`Done` states.
    pub fn step_node(&self, state: &mut NodeState, field: &FieldProvider, h: Float) {
        let stencil = match state {
            NodeState::Active(s) => s,
            _ => return,
        };

        stencil.advance(field, &self.coordinate, h);

        if stencil.is_completed() {
            let done = std::mem::replace(stencil, Stencil::new(
                self.config.stencil_kind,
                0.0,
                0.0,
                self.config.delta0,
                self.config.t_start,
            ));
            *state = NodeState::Done(done);
            return;
        }

        if self.config.mode == Mode::Fsle
            && stencil.max_distance(&self.coordinate) >= self.config.delta_final
        {
            stencil.mark_completed();
            let done = std::mem::replace(stencil, Stencil::new(
                self.config.stencil_kind,
                0.0,
                0.0,
                self.config.delta0,
                self.config.t_start,
            ));
            *state = NodeState::Done(done);
        }
    }

    /// Called once the shared iterator is exhausted: any node still
    /// `Active` (an FTLE run always ends this way; an FSLE run whose
    /// threshold was never crossed also ends up here) is finalised in
    /// place.
    pub fn finish_node(&self, state: &mut NodeState) {
        if let NodeState::Active(stencil) = state {
            stencil.mark_completed();
            let done = std::mem::replace(stencil, Stencil::new(
                self.config.stencil_kind,
                0.0,
                0.0,
                self.config.delta0,
                self.config.t_start,
            ));
            *state = NodeState::Done(done);
        }
    }

    /// Reduces a finished node state to its output values. Masked and
    /// missing nodes carry no meaningful eigen values; the caller
    /// substitutes the configured fill value for them.
    pub fn reduce(&self, state: &NodeState) -> NodeResult {
        match state {
            NodeState::Masked => NodeResult {
                masked: true,
                ..Default::default()
            },
            NodeState::Active(_) => NodeResult {
                missing: true,
                ..Default::default()
            },
            NodeState::Done(stencil) => {
                if stencil.is_missing() {
                    return NodeResult {
                        missing: true,
                        ..Default::default()
                    };
                }

                let eigen = stencil.eigen(&self.coordinate);
                let delta_t = (stencil.time() - self.config.t_start).num_milliseconds() as Float
                    / 1_000.0;

                NodeResult {
                    masked: false,
                    missing: false,
                    lambda1: eigen.lambda1,
                    lambda2: eigen.lambda2,
                    theta1: eigen.theta1,
                    theta2: eigen.theta2,
                    final_separation: eigen.final_separation,
                    delta_t,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::CoordinateKind;
    use crate::field_provider::{FileEntry, VelocityUnits};
    use chrono::Duration;

    fn empty_provider() -> FieldProvider {
        FieldProvider::new(
            Vec::<FileEntry>::new(),
            "u",
            "v",
            Float::NAN,
            Float::NAN,
            VelocityUnits::Metric,
            CoordinateKind::Cartesian,
        )
    }

    #[test]
    fn masked_node_reduces_to_masked_result() {
        let t0 = Utc::now();
        let config = DriverConfig {
            t_start: t0,
            t_end: t0 + Duration::days(30),
            mode: Mode::Ftle,
            delta_final: 0.2,
            delta0: 0.1,
            stencil_kind: StencilKind::Triplet,
        };
        let driver = Driver::new(&config, CoordinateModel::Cartesian);

        let state = driver.init_node(0.0, 0.0, true);
        let result = driver.reduce(&state);

        assert!(result.masked);
        assert!(!result.missing);
    }

    #[test]
    fn node_with_no_resident_snapshots_goes_missing_on_first_step() {
        let t0 = Utc::now();
        let config = DriverConfig {
            t_start: t0,
            t_end: t0 + Duration::days(30),
            mode: Mode::Ftle,
            delta_final: 0.2,
            delta0: 0.1,
            stencil_kind: StencilKind::Triplet,
        };
        let driver = Driver::new(&config, CoordinateModel::Cartesian);
        let provider = empty_provider();

        let mut state = driver.init_node(0.0, 0.0, false);
        driver.step_node(&mut state, &provider, 3_600.0);
        driver.finish_node(&mut state);

        let result = driver.reduce(&state);
        assert!(result.missing);
    }
}
