use std::time::Duration;

use crate::BeatConfig;

/// Bass-driven beat detector.
///
/// Keeps an exponential moving average of the bass level. A tick is a beat
/// when its bass exceeds the average *as it stood before this tick* by more
/// than the threshold and the cooldown since the previous beat has elapsed.
/// The average is updated on every tick, beat or not.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    alpha: f32,
    threshold: f32,
    cooldown: Duration,
    average: f32,
    last_beat: Option<Duration>,
}

impl BeatDetector {
    pub fn new(config: &BeatConfig) -> Self {
        Self {
            alpha: config.alpha,
            threshold: config.threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
            average: 0.0,
            last_beat: None,
        }
    }

    /// Current running average of the bass level.
    pub fn average(&self) -> f32 {
        self.average
    }

    /// Time of the most recent beat, if any.
    pub fn last_beat(&self) -> Option<Duration> {
        self.last_beat
    }

    /// Zeroes the average and forgets the last beat.
    pub fn reset(&mut self) {
        self.average = 0.0;
        self.last_beat = None;
    }

    /// Feeds one tick's bass level observed at `now` and reports whether it
    /// is a beat.
    pub fn update(&mut self, bass: f32, now: Duration) -> bool {
        let previous = self.average;
        self.average = (1.0 - self.alpha) * previous + self.alpha * bass;

        let cooled_down = self
            .last_beat
            .map(|last| now.saturating_sub(last) > self.cooldown)
            .unwrap_or(true);
        let beat = bass > previous + self.threshold && cooled_down;

        if beat {
            self.last_beat = Some(now);
            tracing::debug!(bass, average = previous, at_ms = now.as_millis() as u64, "beat");
        }
        beat
    }
}
