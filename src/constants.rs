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

//! Module containing constants used by the engine.

use crate::Float;

/// Mean earth radius in metres, used by the spherical-equatorial
/// coordinate model (§4.E) to convert metric velocities into angular
/// displacements.
pub const EARTH_RADIUS_M: Float = 6_371_000.0;

/// Seconds in one day, used by the NetCDF writer to convert the
/// engine's internal `1/s` exponent units to the on-disk `1/day` unit.
pub const SECONDS_PER_DAY: Float = 86_400.0;

/// Absolute tolerance used to detect a regularly-spaced axis (§4.A).
pub const REGULAR_AXIS_TOLERANCE: Float = 1e-9;
