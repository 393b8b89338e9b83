pub mod fade;
pub mod timer;

pub use fade::{BlendAlpha, FadePhase, FadeScheduler};
pub use timer::{PausableTimer, Tick};
