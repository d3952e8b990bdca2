pub mod config;
pub mod controller;
pub mod registry;
pub mod runner;
pub mod schedule;
pub mod timeline;

pub use config::{AudioOutput, ExperimentConfig, InvalidTrialPolicy};
pub use controller::TrialController;
pub use registry::{TrialBuilder, TrialRegistry};
pub use runner::{RunnerStatus, TimelineRunner};
pub use schedule::TransitionSchedule;
pub use timeline::{Timeline, TimelineEntry};
