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

//! Module with error definitions for every struct and function in the
//! engine. Each failure domain gets its own enum; [`EngineError`]
//! composes them for the map sweep and the two CLI binaries.

use thiserror::Error;

/// Top-level error returned by a map sweep or a particle-path run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("error while reading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("error while creating the worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("error while reading a grid snapshot: {0}")]
    Grid(#[from] GridError),

    #[error("error while evaluating the velocity field: {0}")]
    Field(#[from] FieldError),

    #[error("invalid argument: {0}")]
    Value(&'static str),

    #[error("error while handling a file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error while writing NetCDF output: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("error while writing the output CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors related to reading and validating the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot open config file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    CantParse(#[from] ini::Error),

    #[error("configuration component is out of bounds: {0}")]
    OutOfBounds(&'static str),

    #[error("missing required key: {0}")]
    MissingKey(&'static str),

    #[error("key {0} has a value that cannot be parsed: {1}")]
    BadValue(&'static str, String),

    #[error("cannot decode a timestamp from a filename: {0}")]
    BadDatePattern(#[from] regex::Error),

    #[error("cannot parse the decoded date: {0}")]
    BadDate(#[from] chrono::ParseError),
}

/// Errors related to reading a single grid snapshot (§4.B Snapshot Reader).
#[derive(Error, Debug)]
pub enum GridError {
    #[error("error while reading the input file: {0}")]
    Io(#[from] netcdf::Error),

    #[error("could not identify axis kind from unit {0:?}")]
    AxisError(String),

    #[error("unit conversion error: {0}")]
    Unit(#[from] UnitError),

    #[error("variable {0} was not found in the file")]
    VariableNotFound(String),

    #[error("values array shape mismatch: {0}")]
    IncorrectShape(#[from] ndarray::ShapeError),

    #[error("{0}")]
    Search(#[from] SearchError),
}

/// Errors raised by the unit registry (§4.C) when asked to convert
/// between units with no linear relationship (or no known relationship
/// at all).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("unrecognised unit: {0}")]
    Unrecognised(String),

    #[error("no linear conversion exists from {from:?} to {to:?}")]
    NoLinearForm { from: String, to: String },
}

/// Errors related to bisecting a sorted axis (§4.A Axis).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("provided array is empty")]
    EmptyArray,

    #[error("provided target is out of array bounds")]
    OutOfBounds,
}

/// Errors related to evaluating the velocity field (§4.D Field Provider).
#[derive(Error, Debug)]
pub enum FieldError {
    #[error("no loaded snapshot window covers the requested time")]
    IntervalNotCovered,

    #[error("error while reading a grid snapshot: {0}")]
    Grid(#[from] GridError),
}
