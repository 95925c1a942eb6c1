/// Rate-limited follower: every step each value moves towards its target by
/// at most `max_delta`.
///
/// The series is reset to a baseline whenever the number of targets differs
/// from the stored length, which is how surface or analysis-size changes are
/// absorbed.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    max_delta: f32,
    values: Vec<f32>,
}

impl SmoothingFilter {
    pub fn new(max_delta: f32) -> Self {
        Self {
            max_delta,
            values: Vec::new(),
        }
    }

    /// Last smoothed values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Drops the stored series; the next step starts from the baseline.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Advances every value one step towards `targets`. `baseline` seeds the
    /// series when its length has to change.
    pub fn follow<I>(&mut self, targets: I, baseline: f32) -> &[f32]
    where
        I: IntoIterator<Item = f32>,
        I::IntoIter: ExactSizeIterator,
    {
        let targets = targets.into_iter();
        if targets.len() != self.values.len() {
            tracing::debug!(
                from = self.values.len(),
                to = targets.len(),
                baseline,
                "reinitialising smoothed series"
            );
            self.values.clear();
            self.values.resize(targets.len(), baseline);
        }

        let limit = self.max_delta;
        for (current, target) in self.values.iter_mut().zip(targets) {
            *current += (target - *current).clamp(-limit, limit);
        }
        &self.values
    }
}

/// Bar height target for a raw magnitude on a surface `height` pixels tall.
pub fn bar_target(magnitude: u8, height: f32, ratio: f32) -> f32 {
    f32::from(magnitude) / 255.0 * height * ratio
}

/// Vertical position target for a raw waveform sample.
pub fn wave_target(sample: u8, height: f32, offset: f32) -> f32 {
    (f32::from(sample) / 128.0 - offset) * height / 2.0
}
