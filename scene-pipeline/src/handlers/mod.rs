//! The four job-type state machines. Each handler is a deterministic
//! progression through named phases; phase boundaries are the only
//! externally observable checkpoints.

pub mod compose;
pub mod full_universe;
pub mod quick_create;
pub mod tts;

/// Pixel dimensions for a client aspect-ratio label
pub fn dimensions_for(aspect_ratio: &str) -> (u32, u32) {
    match aspect_ratio {
        "16:9" => (1280, 720),
        "1:1" => (720, 720),
        // 9:16 vertical is the default for shorts
        _ => (720, 1280),
    }
}

/// Seconds behind a client duration label ("30s", "2min", ...)
pub fn duration_label_secs(label: &str) -> u32 {
    match label {
        "30s" => 30,
        "45s" => 45,
        "2min" => 120,
        "3min" => 180,
        _ => 30,
    }
}
