//! Motion profile synthesis and step pulse generation.

mod profile;
mod stepgen;

pub use profile::{MotionPhase, MotionProfile, StepPlan, StepTiming};
pub use stepgen::{run_plan, StepChannel};
