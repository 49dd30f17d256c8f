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

//! Output writers (§6): the engine proper only produces dense arrays
//! and in-memory particle traces; serialising them to disk lives here
//! and in the two CLI binaries only.

pub mod map_output;
pub mod path_output;
