use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Numbering of a time-varying dataset: `first`, `first + step`, … up to `last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepRange {
    pub first: i32,
    pub last: i32,
    pub step: i32,
}

impl Default for TimestepRange {
    fn default() -> Self {
        Self {
            first: 0,
            last: 0,
            step: 1,
        }
    }
}

/// Cycles through the timesteps of a time-varying dataset.
///
/// Timesteps are addressed by their original number (e.g. `74` for the file
/// `Wind_74`), not by their position in the sequence. Every method that
/// changes the current timestep returns the new number.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestepSequence {
    numbers: Vec<i32>,
    /// Key path of a timestep's data, minus the number, e.g. `Fire/KeyData/Wind_`.
    pub base_key_path: String,
    current: usize,
    pub paused: bool,
    frames_per_second: f32,
    last_change: Option<Duration>,
}

impl TimestepSequence {
    /// A non-positive step yields only `first`.
    pub fn new(range: TimestepRange) -> Self {
        let numbers = if range.step > 0 {
            (range.first..=range.last)
                .step_by(range.step as usize)
                .collect()
        } else if range.first <= range.last {
            vec![range.first]
        } else {
            Vec::new()
        };
        Self::from_numbers(numbers)
    }

    /// A sequence over exactly these timesteps, e.g. the ones whose files were found.
    pub fn from_numbers(numbers: Vec<i32>) -> Self {
        Self {
            numbers,
            base_key_path: String::new(),
            current: 0,
            paused: false,
            frames_per_second: 1.0,
            last_change: None,
        }
    }

    pub fn with_base_key_path(mut self, base_key_path: impl Into<String>) -> Self {
        self.base_key_path = base_key_path.into();
        self
    }

    /// Key path of the data for timestep `number`.
    pub fn key_path_for(&self, number: i32) -> String {
        format!("{}{number}", self.base_key_path)
    }

    /// Key path of the current timestep's data.
    pub fn current_key_path(&self) -> Option<String> {
        self.current().map(|n| self.key_path_for(n))
    }

    /// Drops every timestep whose data is not available, keeping the current
    /// one if it survives.
    pub fn retain_available(&mut self, mut is_available: impl FnMut(&str) -> bool) {
        let current = self.current();
        let mut kept = Vec::with_capacity(self.numbers.len());
        for &n in &self.numbers {
            let key_path = self.key_path_for(n);
            if is_available(&key_path) {
                kept.push(n);
            } else {
                warn!("Skipping timestep {n}: no data at '{key_path}'");
            }
        }
        self.numbers = kept;
        self.current = current
            .and_then(|c| self.numbers.iter().position(|&n| n == c))
            .unwrap_or(0);
    }

    pub fn with_frames_per_second(mut self, fps: f32) -> Self {
        self.set_frames_per_second(fps);
        self
    }

    /// Playback rate, clamped to `0.1..=60`.
    pub fn set_frames_per_second(&mut self, fps: f32) {
        self.frames_per_second = fps.clamp(0.1, 60.0);
    }

    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }

    pub fn numbers(&self) -> &[i32] {
        &self.numbers
    }

    pub fn has(&self, number: i32) -> bool {
        self.numbers.contains(&number)
    }

    /// `None` for an empty sequence.
    pub fn current(&self) -> Option<i32> {
        self.numbers.get(self.current).copied()
    }

    /// Next timestep, wrapping to the first after the last.
    pub fn advance(&mut self) -> Option<i32> {
        if self.numbers.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.numbers.len();
        self.changed()
    }

    /// Previous timestep, wrapping to the last before the first.
    pub fn rewind(&mut self) -> Option<i32> {
        if self.numbers.is_empty() {
            return None;
        }
        self.current = self.current.checked_sub(1).unwrap_or(self.numbers.len() - 1);
        self.changed()
    }

    /// Jumps to `number`, or to the closest available timestep.
    ///
    /// Returns the new number only if the current timestep changed. Ties go
    /// to the earlier timestep.
    pub fn set_nearest(&mut self, number: i32) -> Option<i32> {
        let closest = self
            .numbers
            .iter()
            .enumerate()
            .min_by_key(|&(i, n)| (n.abs_diff(number), i))
            .map(|(i, _)| i)?;
        if closest == self.current {
            return None;
        }
        self.current = closest;
        self.changed()
    }

    /// Advances playback given the current time.
    ///
    /// Steps at most once per call and only once `1 / fps` has elapsed since
    /// the previous step. The first unpaused tick steps immediately.
    pub fn tick(&mut self, now: Duration) -> Option<i32> {
        if self.paused {
            return None;
        }
        let period = Duration::from_secs_f32(1.0 / self.frames_per_second);
        let due = self
            .last_change
            .is_none_or(|last| now.saturating_sub(last) >= period);
        if !due {
            return None;
        }
        self.last_change = Some(now);
        self.advance()
    }

    fn changed(&self) -> Option<i32> {
        let number = self.current();
        debug!("Current timestep = {number:?}");
        number
    }
}
