pub mod classifier;
pub mod controller;
mod loop_worker;
pub mod policy;
pub mod scoring;
pub mod state;

pub use classifier::AttentionClassifier;
pub use controller::SessionController;
pub use policy::ObjectPolicy;
pub use scoring::IntegrityScorer;
pub use state::{MonitorSnapshot, SessionState};
