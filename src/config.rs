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

//! Configuration (§6): parses the `.ini`-style configuration file
//! describing the input velocity series and resource limits, and
//! validates it before the engine touches any input file.
//!
//! The "parse, then `check_bounds`" shape keeps structural parsing
//! separate from range validation. The backend crate is `ini`, since
//! the grammar here is INI rather than YAML, with manual section/key
//! extraction in place of a single `#[derive(Deserialize)]` shape,
//! since the format has a `FILES`-or-`DIR` alternative no derive
//! captures directly.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use ini::Ini;
use regex::Regex;

use crate::errors::ConfigError;
use crate::field_provider::{FileEntry, VelocityUnits};
use crate::Float;

/// `[VELOCITY]` section of the configuration file.
#[derive(Clone, Debug)]
pub struct VelocityConfig {
    pub u_variable: String,
    pub v_variable: String,
    pub units: VelocityUnits,
    pub fill_value_u: Float,
    pub fill_value_v: Float,
    pub files: Vec<FileEntry>,
}

impl VelocityConfig {
    fn from_section(section: &ini::Properties) -> Result<Self, ConfigError> {
        let u_variable = required(section, "U")?.to_string();
        let v_variable = required(section, "V")?.to_string();

        let units = match required(section, "UNITS")?.to_lowercase().as_str() {
            "metric" => VelocityUnits::Metric,
            "angular" => VelocityUnits::Angular,
            other => {
                return Err(ConfigError::BadValue("UNITS", other.to_string()));
            }
        };

        let fill_value = section
            .get("FILL_VALUE")
            .map(|v| parse_float("FILL_VALUE", v))
            .transpose()?
            .unwrap_or(Float::NAN);

        let files = resolve_files(section)?;

        let config = VelocityConfig {
            u_variable,
            v_variable,
            units,
            fill_value_u: fill_value,
            fill_value_v: fill_value,
            files,
        };

        config.check_bounds()?;
        Ok(config)
    }

    fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.files.is_empty() {
            return Err(ConfigError::OutOfBounds(
                "input file list resolved to zero files",
            ));
        }

        Ok(())
    }
}

/// `[RESOURCES]` section: worker count and the allocator's memory
/// ceiling, both optional.
#[derive(Copy, Clone, Debug)]
pub struct Resources {
    /// `0` means hardware concurrency, per §5's scheduling model.
    pub threads: usize,
    pub memory_mb: usize,
}

impl Resources {
    fn default_memory_mb() -> usize {
        usize::MAX / (1024 * 1024)
    }

    fn from_section(section: Option<&ini::Properties>) -> Result<Self, ConfigError> {
        let threads = section
            .and_then(|s| s.get("THREADS"))
            .map(|v| parse_usize("THREADS", v))
            .transpose()?
            .unwrap_or(0);

        let memory_mb = section
            .and_then(|s| s.get("MEMORY"))
            .map(|v| parse_usize("MEMORY", v))
            .transpose()?
            .unwrap_or_else(Resources::default_memory_mb);

        let resources = Resources { threads, memory_mb };
        resources.check_bounds()?;
        Ok(resources)
    }

    fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.memory_mb < 128 {
            return Err(ConfigError::OutOfBounds(
                "available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

/// Top-level configuration, read from the `.ini` file named on the
/// CLI.
#[derive(Clone, Debug)]
pub struct Config {
    pub velocity: VelocityConfig,
    pub resources: Resources,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let ini = Ini::load_from_file(path)?;

        let velocity_section = ini
            .section(Some("VELOCITY"))
            .ok_or(ConfigError::MissingKey("[VELOCITY]"))?;
        let velocity = VelocityConfig::from_section(velocity_section)?;

        let resources = Resources::from_section(ini.section(Some("RESOURCES")))?;

        Ok(Config {
            velocity,
            resources,
        })
    }
}

fn required<'a>(section: &'a ini::Properties, key: &'static str) -> Result<&'a str, ConfigError> {
    section.get(key).ok_or(ConfigError::MissingKey(key))
}

fn parse_float(key: &'static str, raw: &str) -> Result<Float, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::BadValue(key, raw.to_string()))
}

fn parse_usize(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::BadValue(key, raw.to_string()))
}

/// Resolves the `FILES` list or the `DIR`/`PATTERN`/`DATE_FORMAT`
/// directory scan into a sorted list of `(path, timestamp)` entries.
fn resolve_files(section: &ini::Properties) -> Result<Vec<FileEntry>, ConfigError> {
    if let Some(files_value) = section.get("FILES") {
        let date_pattern = section.get("DATE_PATTERN");
        let date_format = section.get("DATE_FORMAT");
        return parse_explicit_files(files_value, date_pattern, date_format);
    }

    let dir = required(section, "DIR")?;
    let pattern = required(section, "PATTERN")?;
    let date_format = required(section, "DATE_FORMAT")?;

    discover_files(dir, pattern, date_format)
}

/// `FILES = path1[@timestamp]; path2[@timestamp]; …`. When an entry
/// carries no explicit `@timestamp`, its date is decoded from the
/// path via `date_pattern`/`date_format`, both of which must then be
/// present.
fn parse_explicit_files(
    value: &str,
    date_pattern: Option<&str>,
    date_format: Option<&str>,
) -> Result<Vec<FileEntry>, ConfigError> {
    let regex = date_pattern.map(Regex::new).transpose()?;

    let mut entries = Vec::new();

    for token in value.split(';') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let entry = if let Some((path, ts)) = token.split_once('@') {
            let timestamp = DateTime::parse_from_rfc3339(ts.trim())
                .map_err(ConfigError::BadDate)?
                .with_timezone(&Utc);
            FileEntry {
                path: PathBuf::from(path.trim()),
                timestamp,
            }
        } else {
            let regex = regex
                .as_ref()
                .ok_or(ConfigError::MissingKey("DATE_PATTERN"))?;
            let date_format = date_format.ok_or(ConfigError::MissingKey("DATE_FORMAT"))?;
            let timestamp = decode_timestamp(token, regex, date_format)?;
            FileEntry {
                path: PathBuf::from(token),
                timestamp,
            }
        };

        entries.push(entry);
    }

    entries.sort_by_key(|e| e.timestamp);
    Ok(entries)
}

/// Scans `dir` for entries whose filename matches `pattern`, decoding
/// each match's first capture group as a date via `date_format`.
fn discover_files(dir: &str, pattern: &str, date_format: &str) -> Result<Vec<FileEntry>, ConfigError> {
    let regex = Regex::new(pattern)?;

    let mut entries = Vec::new();

    for item in fs::read_dir(dir)? {
        let item = item?;
        let path = item.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if let Some(timestamp) = regex
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| decode_timestamp(m.as_str(), &regex, date_format))
            .transpose()?
        {
            entries.push(FileEntry { path, timestamp });
        }
    }

    entries.sort_by_key(|e| e.timestamp);
    Ok(entries)
}

fn decode_timestamp(
    candidate: &str,
    regex: &Regex,
    date_format: &str,
) -> Result<DateTime<Utc>, ConfigError> {
    let captured = regex
        .captures(candidate)
        .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| candidate.to_string());

    let date = NaiveDate::parse_from_str(&captured, date_format).map_err(ConfigError::BadDate)?;

    Ok(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
        Utc,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_with_timestamp_parses() {
        let entries =
            parse_explicit_files("/data/a.nc@2010-01-06T00:00:00Z", None, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, PathBuf::from("/data/a.nc"));
        assert_eq!(entries[0].timestamp.to_rfc3339(), "2010-01-06T00:00:00+00:00");
    }

    #[test]
    fn explicit_file_without_timestamp_requires_pattern() {
        let result = parse_explicit_files("/data/a.nc", None, None);
        assert!(result.is_err());
    }

    #[test]
    fn decode_timestamp_from_filename() {
        let regex = Regex::new(r"(\d{8})").unwrap();
        let ts = decode_timestamp("dt_upd_global_merged_madt_uv_20100106_foo.nc", &regex, "%Y%m%d")
            .unwrap();
        assert_eq!(ts.format("%Y-%m-%d").to_string(), "2010-01-06");
    }

    #[test]
    fn missing_units_key_is_reported() {
        let mut ini = Ini::new();
        ini.with_section(Some("VELOCITY"))
            .set("U", "u10")
            .set("V", "v10")
            .set("FILES", "a.nc@2020-01-01T00:00:00Z");

        let section = ini.section(Some("VELOCITY")).unwrap();
        let result = VelocityConfig::from_section(section);
        assert!(result.is_err());
    }
}
