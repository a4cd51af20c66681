//! Pipeline handlers and external adapters for Scene Studio.
//!
//! Handlers are deterministic progressions through named phases; each phase
//! publishes a progress checkpoint into the registry and mirrors it to the
//! store. Adapters are failure-tolerant façades over the generation
//! providers and the local ffmpeg encoder: a provider that cannot produce
//! returns `None` and the pipeline picks a degraded-but-successful fallback.

pub mod adapters;
pub mod error;
pub mod handlers;

pub use adapters::download::Downloader;
pub use adapters::encoder::Encoder;
pub use adapters::image::ImageClient;
pub use adapters::video::{VideoClient, VideoRequest};
pub use error::{PipelineError, PipelineResult};
pub use handlers::compose::ComposeHandler;
pub use handlers::full_universe::FullUniverseHandler;
pub use handlers::quick_create::QuickCreateHandler;
pub use handlers::tts::TtsHandler;
