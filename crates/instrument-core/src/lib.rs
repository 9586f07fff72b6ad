pub mod attractor;
pub mod config;
pub mod constants;
pub mod error;
pub mod field;
pub mod fusion;
pub mod grid;
pub mod idle;
pub mod instrument;
pub mod motion;
pub mod profile;
pub mod sequencer;
pub mod signals;

pub static FIELD_STEP_WGSL: &str = include_str!("../shaders/field_step.wgsl");
pub static PARTICLES_WGSL: &str = include_str!("../shaders/particles.wgsl");

pub use attractor::*;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use field::*;
pub use fusion::*;
pub use grid::*;
pub use idle::*;
pub use instrument::*;
pub use motion::*;
pub use profile::*;
pub use sequencer::*;
pub use signals::*;
