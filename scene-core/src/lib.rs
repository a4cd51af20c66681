//! Core domain types for the Scene Studio job orchestrator.
//!
//! This crate carries everything the other members share: job identity and
//! lifecycle enums, render and cached-asset records, the static video-model
//! catalog with its selection policy, the style tables, and the env-driven
//! runtime settings. It holds no I/O and no async code.

pub mod assets;
pub mod ids;
pub mod job;
pub mod models;
pub mod render;
pub mod settings;
pub mod styles;

pub use assets::CachedAsset;
pub use ids::{short_id, JobId};
pub use job::{JobRecord, JobState, JobType};
pub use models::{ModelRegistry, VideoModel};
pub use render::{Render, RenderQuality, RenderStatus};
pub use settings::Settings;
pub use styles::{get_style, list_styles, Style};
