use crate::config::IdleParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IdlePhase {
    #[default]
    Rest,
    Build,
    Hold,
    Decay,
}

/// Slow ambient swell that plays while nobody is touching the instrument.
///
/// Rest waits `rest_sec`, Build ramps intensity by `build_rate` per tick up
/// to `cap`, Hold keeps it for `hold_sec`, Decay ramps down by `decay_rate`
/// per tick and returns to Rest. Any activity drops straight back to Rest
/// and lets intensity fade out.
#[derive(Clone, Debug)]
pub struct IdleEngine {
    phase: IdlePhase,
    intensity: f32,
    timer: f32,
    params: IdleParams,
}

impl IdleEngine {
    pub fn new(params: IdleParams) -> Self {
        Self {
            phase: IdlePhase::Rest,
            intensity: 0.0,
            timer: 0.0,
            params,
        }
    }

    pub fn phase(&self) -> IdlePhase {
        self.phase
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn params(&self) -> &IdleParams {
        &self.params
    }

    /// Advance one tick. The instrument is idle when nothing is held and the
    /// attractor has faded.
    pub fn update(&mut self, dt: f32, held: usize, attractor_active: bool) {
        if held > 0 || attractor_active {
            self.interrupt();
            return;
        }
        let p = &self.params;
        match self.phase {
            IdlePhase::Rest => {
                self.timer += dt;
                if self.timer >= p.rest_sec {
                    self.phase = IdlePhase::Build;
                    self.timer = 0.0;
                }
            }
            IdlePhase::Build => {
                self.intensity = (self.intensity + p.build_rate).min(p.cap);
                if self.intensity >= p.cap {
                    self.phase = IdlePhase::Hold;
                    self.timer = 0.0;
                }
            }
            IdlePhase::Hold => {
                self.timer += dt;
                if self.timer >= p.hold_sec {
                    self.phase = IdlePhase::Decay;
                }
            }
            IdlePhase::Decay => {
                self.intensity = (self.intensity - p.decay_rate).max(0.0);
                if self.intensity <= 0.0 {
                    self.phase = IdlePhase::Rest;
                    self.timer = 0.0;
                }
            }
        }
    }

    /// User activity: back to Rest, restart the timer, fade intensity.
    pub fn interrupt(&mut self) {
        if self.phase != IdlePhase::Rest {
            log::debug!("[idle] interrupted in {:?}", self.phase);
        }
        self.phase = IdlePhase::Rest;
        self.timer = 0.0;
        self.intensity *= self.params.interrupt_retention;
    }
}

impl Default for IdleEngine {
    fn default() -> Self {
        Self::new(IdleParams::default())
    }
}
