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

//! Iterator (§4.H): emits the `(t_curr, h)` pairs the FLE Driver feeds
//! to `field.fetch` and the integrator, one step at a time from `t0`
//! to `t1` with the terminal step clamped exactly.

use chrono::{DateTime, Duration, Utc};

use crate::Float;

/// A finite, cloneable sequence of integration steps between two
/// timestamps. Cloning at any position yields an independent iterator
/// that resumes from there — the "restartable" requirement in §4.H.
#[derive(Clone, Debug)]
pub struct TimeIterator {
    current: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    exhausted: bool,
}

impl TimeIterator {
    /// `h` gives the step magnitude; its sign is ignored and replaced
    /// with `sign(t1 - t0)`, so callers may pass a plain positive
    /// time step regardless of integration direction.
    pub fn new(t0: DateTime<Utc>, t1: DateTime<Utc>, h: Float) -> Self {
        let magnitude_ms = (h.abs() * 1_000.0) as i64;
        let signed_ms = if t1 >= t0 { magnitude_ms } else { -magnitude_ms };

        TimeIterator {
            current: t0,
            end: t1,
            step: Duration::milliseconds(signed_ms),
            exhausted: t0 == t1,
        }
    }

    pub fn current(&self) -> DateTime<Utc> {
        self.current
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl Iterator for TimeIterator {
    /// `(t_curr, h)` — the current timestamp and the (possibly
    /// clamped) step in seconds to take from it.
    type Item = (DateTime<Utc>, Float);

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let forward = self.step.num_milliseconds() >= 0;
        let candidate = self.current + self.step;
        let overshoots = if forward {
            candidate >= self.end
        } else {
            candidate <= self.end
        };

        let t_curr = self.current;

        let h = if overshoots {
            (self.end - self.current).num_milliseconds() as Float / 1_000.0
        } else {
            self.step.num_milliseconds() as Float / 1_000.0
        };

        self.current = if overshoots { self.end } else { candidate };
        self.exhausted = overshoots;

        Some((t_curr, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn forward_iteration_clamps_terminal_step() {
        let t0 = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let t1 = t0 + Duration::hours(25);

        let steps: Vec<_> = TimeIterator::new(t0, t1, 3_600.0 * 10.0).collect();

        assert_eq!(steps.len(), 3);
        assert_approx_eq!(Float, steps[0].1, 36_000.0);
        assert_approx_eq!(Float, steps[1].1, 36_000.0);
        assert_approx_eq!(Float, steps[2].1, 18_000.0);
        assert_eq!(steps.last().unwrap().0 + Duration::seconds(steps.last().unwrap().1 as i64), t1);
    }

    #[test]
    fn backward_iteration_has_negative_steps() {
        let t0 = DateTime::parse_from_rfc3339("2020-01-02T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let t1 = t0 - Duration::hours(5);

        let steps: Vec<_> = TimeIterator::new(t0, t1, 3_600.0).collect();

        assert_eq!(steps.len(), 5);
        assert!(steps.iter().all(|(_, h)| *h < 0.0));
    }

    #[test]
    fn equal_endpoints_produce_empty_sequence() {
        let t0 = Utc::now();
        let steps: Vec<_> = TimeIterator::new(t0, t0, 3_600.0).collect();
        assert!(steps.is_empty());
    }

    #[test]
    fn cloned_iterator_resumes_independently() {
        let t0 = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let t1 = t0 + Duration::hours(10);

        let mut it = TimeIterator::new(t0, t1, 3_600.0);
        it.next();
        it.next();

        let clone = it.clone();
        let remaining_original: Vec<_> = it.collect();
        let remaining_clone: Vec<_> = clone.collect();

        assert_eq!(remaining_original.len(), remaining_clone.len());
    }
}
