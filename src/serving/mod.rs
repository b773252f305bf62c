pub mod artifacts;
pub mod health;
pub mod launcher;

pub use artifacts::{ArtifactFetcher, ArtifactStore, HuggingFaceCli, InstallOutcome};
pub use health::{
    mentions_injection, parse_chat_completion, parse_model_list, HealthProbe, SmokeReview,
    VULNERABLE_SNIPPET,
};
pub use launcher::{verify_model_path, ServerLaunch};
