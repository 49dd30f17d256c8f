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

//! Particle-path ASCII writer (§6): `id\tlon\tlat\tISO8601` per sample,
//! one line per particle per step while it is not missing.
//!
//! Uses a headerless tab-delimited `csv::Writer` rather than a
//! header-and-comma one, recording just the four fields this format
//! needs.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::errors::EngineError;
use crate::Float;

/// One particle's position at one timestamp, ready to be written out.
#[derive(Copy, Clone, Debug)]
pub struct ParticleSample {
    pub id: u64,
    pub lon: Float,
    pub lat: Float,
    pub time: DateTime<Utc>,
}

/// Writes `samples` to `path` in arrival order, one tab-separated line
/// each. Missing particles are simply not represented: the caller
/// stops pushing samples for a particle once it goes undefined.
pub fn write_paths(path: &Path, samples: &[ParticleSample]) -> Result<(), EngineError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    for sample in samples {
        writer.write_record(&[
            sample.id.to_string(),
            sample.lon.to_string(),
            sample.lat.to_string(),
            sample.time.to_rfc3339(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_one_tab_separated_line_per_sample() {
        let path = std::env::temp_dir().join("lcs_fle_path_output_test.tsv");

        let samples = vec![ParticleSample {
            id: 1,
            lon: 40.0,
            lat: -50.0,
            time: DateTime::parse_from_rfc3339("2010-01-06T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }];

        write_paths(&path, &samples).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(contents.trim(), "1\t40\t-50\t2010-01-06T00:00:00+00:00");
    }
}
