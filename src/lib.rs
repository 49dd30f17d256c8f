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

//! Engine for computing Lagrangian Coherent Structures (LCS) — Finite-Size
//! and Finite-Time Lyapunov Exponent (FSLE/FTLE) maps from a time-varying
//! 2-D velocity field sampled on geographic grids.
//!
//! The crate is organised leaf-first, mirroring the data flow
//! `sweep -> driver -> (stencil -> integrator -> field_provider -> grid, units, axis)`
//! with `coordinate` consulted by both the stencil and the integrator.
//!
//! Configuration parsing, CLI argument handling, and output writers are
//! kept out of the engine proper; they live in [`config`], [`output`], and
//! the two `bin/` entry points.

pub mod axis;
pub mod config;
pub mod constants;
pub mod coordinate;
pub mod driver;
pub mod errors;
pub mod field_provider;
pub mod grid;
pub mod integrator;
pub mod iterator;
pub mod output;
pub mod stencil;
pub mod sweep;
pub mod units;

/// Floating-point type used throughout the engine.
///
/// A single type alias, as opposed to generics everywhere, keeps the
/// numerically-heavy modules readable; switching to `f32` (e.g. for a
/// memory-constrained sweep) is a one-line change.
pub type Float = f64;
