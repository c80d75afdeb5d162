use crate::types::Orientation;

/// Phase advance per simulated tick.
const PHASE_STEP: f64 = 0.02;

/// Deterministic sine motion used when no live sensor is available.
#[derive(Clone, Debug, Default)]
pub struct DemoSignal {
    t: f64,
}

impl DemoSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self) -> Orientation {
        self.t += PHASE_STEP;
        Orientation {
            roll: 45.0 * self.t.sin(),
            pitch: 30.0 * (self.t * 0.7).cos(),
            yaw: 60.0 * (self.t * 0.3).sin(),
        }
    }
}
