//! Ten-minute rolling wind window.
//!
//! Holds timestamped speed and direction samples for the last ten minutes and
//! reduces them to the three reported statistics:
//!
//! - **speed**: arithmetic mean of all buffered speeds
//! - **direction**: circular mean over the seconds that carry both a speed and
//!   a direction sample, weighted by speed
//! - **gust**: the highest mean speed over any 3-second window `(t, t+3]`,
//!   stepped one second at a time across the buffer

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::buffer::TimedValue;

// ---

/// Length of the rolling window in seconds.
pub const WINDOW_SECONDS: i64 = 600;

/// Length of a gust averaging window in seconds.
pub const GUST_SECONDS: i64 = 3;

/// Reported wind statistics, already rounded for output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindSummary {
    pub speed: Option<f64>,
    pub direction: Option<u16>,
    pub gust: Option<f64>,
}

#[derive(Debug, Default)]
pub struct WindWindow {
    speeds: VecDeque<TimedValue>,
    directions: VecDeque<TimedValue>,
    last_buffer_time: Option<DateTime<Utc>>,
}

impl WindWindow {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Append new vectors, then purge everything at or before `time - 10min`.
    ///
    /// The caller has already applied the continuity filter to `speeds`.
    pub fn buffer(&mut self, time: DateTime<Utc>, speeds: &[TimedValue], directions: &[TimedValue]) {
        // ---
        for s in speeds {
            insert_ordered(&mut self.speeds, *s);
        }
        for d in directions {
            insert_ordered(&mut self.directions, *d);
        }

        let cutoff = time - Duration::seconds(WINDOW_SECONDS);
        purge(&mut self.speeds, cutoff);
        purge(&mut self.directions, cutoff);

        self.last_buffer_time = Some(time);
    }

    pub fn last_buffer_time(&self) -> Option<DateTime<Utc>> {
        self.last_buffer_time
    }

    pub fn sample_counts(&self) -> (usize, usize) {
        (self.speeds.len(), self.directions.len())
    }

    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty() && self.directions.is_empty()
    }

    /// Reduce the window to its reported statistics. Pure; repeated calls agree.
    pub fn summarize(&self) -> WindSummary {
        // ---
        let Some(last) = self.last_buffer_time else {
            return WindSummary::default();
        };

        let Some(speed) = self.mean_speed() else {
            return WindSummary::default();
        };

        let direction = if speed > 0.0 {
            self.mean_direction(last)
        } else {
            None
        };

        WindSummary {
            speed: Some(round1(speed)),
            direction: direction.map(round_degrees),
            gust: Some(round1(self.max_gust(last))),
        }
    }

    fn mean_speed(&self) -> Option<f64> {
        // ---
        if self.speeds.is_empty() {
            return None;
        }
        let total: f64 = self.speeds.iter().map(|s| s.value).sum();
        Some(total / self.speeds.len() as f64)
    }

    /// Circular mean of direction in degrees, in `[0, 360)`.
    fn mean_direction(&self, last: DateTime<Utc>) -> Option<f64> {
        // ---
        if self.directions.is_empty() {
            return None;
        }

        let speeds = by_second(&self.speeds);
        let directions = by_second(&self.directions);

        let last = last.timestamp();
        let mut east = 0.0;
        let mut north = 0.0;
        let mut count = 0usize;

        for t in (last - (WINDOW_SECONDS - 1))..=last {
            let (Some(speed), Some(direction)) = (speeds.get(&t), directions.get(&t)) else {
                continue;
            };
            let radians = direction.to_radians();
            east += speed * radians.sin();
            north += speed * radians.cos();
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let east = east / count as f64;
        let north = north / count as f64;
        Some(normalize_degrees(east.atan2(north).to_degrees()))
    }

    /// Highest 3-second mean speed; 0 when no window holds a sample.
    fn max_gust(&self, last: DateTime<Utc>) -> f64 {
        // ---
        let speeds = &self.speeds;
        let last = last.timestamp();
        let mut gust: Option<f64> = None;

        // Windows (t, t+3] for t in [last-600, last-3]; together they cover the
        // whole buffer (last-600, last].
        let mut t = last - WINDOW_SECONDS;
        while t + GUST_SECONDS <= last {
            let lo = speeds.partition_point(|s| s.time.timestamp() <= t);
            let hi = speeds.partition_point(|s| s.time.timestamp() <= t + GUST_SECONDS);
            if hi > lo {
                let total: f64 = speeds.range(lo..hi).map(|s| s.value).sum();
                let mean = total / (hi - lo) as f64;
                gust = Some(gust.map_or(mean, |g: f64| g.max(mean)));
            }
            t += 1;
        }

        gust.unwrap_or(0.0)
    }
}

fn insert_ordered(buf: &mut VecDeque<TimedValue>, value: TimedValue) {
    // ---
    match buf.back() {
        Some(back) if back.time > value.time => {
            let idx = buf.partition_point(|s| s.time <= value.time);
            buf.insert(idx, value);
        }
        _ => buf.push_back(value),
    }
}

fn purge(buf: &mut VecDeque<TimedValue>, cutoff: DateTime<Utc>) {
    // ---
    while let Some(front) = buf.front() {
        if front.time <= cutoff {
            buf.pop_front();
        } else {
            break;
        }
    }
}

fn by_second(buf: &VecDeque<TimedValue>) -> HashMap<i64, f64> {
    buf.iter().map(|s| (s.time.timestamp(), s.value)).collect()
}

/// Fold an angle in degrees into `[0, 360)`.
///
/// `rem_euclid` alone yields exactly 360.0 for tiny negative inputs.
pub fn normalize_degrees(degrees: f64) -> f64 {
    // ---
    let folded = degrees.rem_euclid(360.0);
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round_degrees(v: f64) -> u16 {
    // input is in [0, 360); 359.5 and above rounds to 360
    (v.round() as u16) % 360
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_degrees_stays_below_full_turn() {
        // ---
        assert_eq!((-1e-20f64).rem_euclid(360.0), 360.0);
        assert_eq!(normalize_degrees(-1e-20), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
        assert_eq!(normalize_degrees(359.5), 359.5);
    }

    fn at(offset: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(offset)
    }

    fn tv(offset: i64, value: f64) -> TimedValue {
        TimedValue::new(at(offset), value)
    }

    #[test]
    fn test_empty_window_is_all_absent() {
        // ---
        let window = WindWindow::new();
        assert_eq!(window.summarize(), WindSummary::default());

        let mut window = WindWindow::new();
        window.buffer(at(0), &[], &[]);
        assert_eq!(window.summarize(), WindSummary::default());
    }

    #[test]
    fn test_single_vector() {
        // ---
        let mut window = WindWindow::new();
        window.buffer(at(0), &[tv(0, 5.0)], &[tv(0, 90.0)]);

        let summary = window.summarize();
        assert_eq!(summary.speed, Some(5.0));
        assert_eq!(summary.direction, Some(90));
        assert_eq!(summary.gust, Some(5.0));
    }

    #[test]
    fn test_direction_wraps_around_north() {
        // ---
        let mut window = WindWindow::new();
        window.buffer(
            at(1),
            &[tv(0, 4.0), tv(1, 4.0)],
            &[tv(0, 350.0), tv(1, 10.0)],
        );

        let summary = window.summarize();
        assert_eq!(summary.direction, Some(0));
    }

    #[test]
    fn test_direction_is_speed_weighted() {
        // ---
        let mut window = WindWindow::new();
        // Strong easterly, weak northerly: result leans east of 45 degrees
        window.buffer(at(1), &[tv(0, 9.0), tv(1, 1.0)], &[tv(0, 90.0), tv(1, 0.0)]);

        let direction = window.summarize().direction.unwrap();
        assert!(direction > 45 && direction < 90, "got {direction}");
    }

    #[test]
    fn test_direction_requires_matching_seconds() {
        // ---
        let mut window = WindWindow::new();
        window.buffer(at(2), &[tv(0, 3.0)], &[tv(2, 180.0)]);

        let summary = window.summarize();
        assert_eq!(summary.speed, Some(3.0));
        assert_eq!(summary.direction, None);
    }

    #[test]
    fn test_calm_has_no_direction() {
        // ---
        let mut window = WindWindow::new();
        window.buffer(at(1), &[tv(0, 0.0), tv(1, 0.0)], &[tv(0, 200.0), tv(1, 210.0)]);

        let summary = window.summarize();
        assert_eq!(summary.speed, Some(0.0));
        assert_eq!(summary.direction, None);
        assert_eq!(summary.gust, Some(0.0));
    }

    #[test]
    fn test_gust_is_highest_three_second_mean() {
        // ---
        let mut window = WindWindow::new();
        let speeds: Vec<TimedValue> = [2.0, 2.0, 8.0, 10.0, 6.0, 2.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, v)| tv(i as i64, *v))
            .collect();
        window.buffer(at(6), &speeds, &[]);

        // (1, 4] holds 8, 10, 6
        let summary = window.summarize();
        assert_eq!(summary.gust, Some(8.0));
        assert_eq!(summary.speed, Some(4.6));
    }

    #[test]
    fn test_gust_window_is_exclusive_left_inclusive_right() {
        // ---
        let mut window = WindWindow::new();
        // Samples 3 seconds apart never share a window
        window.buffer(at(3), &[tv(0, 9.0), tv(3, 3.0)], &[]);

        assert_eq!(window.summarize().gust, Some(9.0));
    }

    #[test]
    fn test_purges_samples_older_than_ten_minutes() {
        // ---
        let mut window = WindWindow::new();
        window.buffer(at(0), &[tv(0, 10.0)], &[tv(0, 90.0)]);
        window.buffer(at(599), &[tv(599, 2.0)], &[tv(599, 270.0)]);
        assert_eq!(window.sample_counts(), (2, 2));

        window.buffer(at(600), &[tv(600, 2.0)], &[tv(600, 270.0)]);
        assert_eq!(window.sample_counts(), (2, 2));

        let summary = window.summarize();
        assert_eq!(summary.speed, Some(2.0));
        assert_eq!(summary.direction, Some(270));
        assert_eq!(summary.gust, Some(2.0));
    }

    #[test]
    fn test_buffering_purged_range_does_not_resurrect() {
        // ---
        let mut window = WindWindow::new();
        window.buffer(at(700), &[tv(700, 4.0)], &[]);
        window.buffer(at(701), &[tv(50, 40.0)], &[tv(60, 0.0)]);

        assert_eq!(window.sample_counts(), (1, 0));
        assert_eq!(window.summarize().speed, Some(4.0));
    }

    #[test]
    fn test_summarize_is_repeatable() {
        // ---
        let mut window = WindWindow::new();
        let speeds: Vec<TimedValue> = (0..120).map(|i| tv(i, (i % 7) as f64)).collect();
        let dirs: Vec<TimedValue> = (0..120).map(|i| tv(i, (i * 3 % 360) as f64)).collect();
        window.buffer(at(119), &speeds, &dirs);

        assert_eq!(window.summarize(), window.summarize());
    }

    #[test]
    fn test_out_of_order_samples_stay_sorted() {
        // ---
        let mut window = WindWindow::new();
        window.buffer(at(5), &[tv(5, 1.0), tv(2, 7.0)], &[]);
        window.buffer(at(6), &[tv(6, 1.0)], &[]);

        // (1, 4] holds only the 7.0 sample
        assert_eq!(window.summarize().gust, Some(7.0));
    }
}
