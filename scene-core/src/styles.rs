//! Style catalog: the single source of truth for prompt styling shared by
//! the submission surface and the pipeline handlers.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// One visual style with its prompt scaffolding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub key: String,
    pub label: String,
    pub prompt: String,
    pub negative: String,
    pub category: String,
}

fn style(key: &str, label: &str, prompt: &str, negative: &str, category: &str) -> Style {
    Style {
        key: key.to_string(),
        label: label.to_string(),
        prompt: prompt.to_string(),
        negative: negative.to_string(),
        category: category.to_string(),
    }
}

static STYLES: Lazy<Vec<Style>> = Lazy::new(|| {
    vec![
        style(
            "cinematic_realism",
            "Cinematic Realism",
            "cinematic, realistic lighting, soft depth of field, high dynamic range, subtle film grain",
            "cartoon, overexposed, blurry, plastic skin, oversaturated, watermark, text",
            "realistic",
        ),
        style(
            "stylized_3d",
            "Stylized 3D (Pixar-lite)",
            "stylized 3D, soft subsurface scattering, studio lighting, clean materials, expressive characters",
            "photorealism, harsh shadows, grain, text, watermark",
            "animated",
        ),
        style(
            "anime",
            "Anime",
            "anime style, cel shading, crisp line art, expressive eyes, painterly background, high contrast",
            "photorealistic, 3D render noise, text overlay",
            "animated",
        ),
        style(
            "documentary_grit",
            "Documentary Grit",
            "documentary style, handheld feel, available light, authentic textures, minimal grading",
            "overpolished, studio glamour, artificial lighting look",
            "realistic",
        ),
        style(
            "film_noir",
            "Film Noir",
            "black and white film noir, hard light, deep shadows, high contrast, venetian blinds shadows",
            "color, low contrast, flat lighting, text",
            "vintage",
        ),
        style(
            "retro_vhs",
            "Retro VHS 90s",
            "retro 90s vhs aesthetic, chromatic aberration, scanlines, analog noise, soft focus",
            "ultra sharp, modern digital clarity",
            "vintage",
        ),
        style(
            "fantasy_illustration",
            "Fantasy Illustration",
            "epic fantasy illustration, painterly brushwork, volumetric lighting, ornate details, dramatic composition",
            "photorealistic, flat colors, text",
            "artistic",
        ),
    ]
});

/// Style lookup; unknown keys fall back to `cinematic_realism`
pub fn get_style(key: &str) -> &'static Style {
    STYLES
        .iter()
        .find(|s| s.key == key)
        .unwrap_or_else(|| &STYLES[0])
}

/// All styles, catalog order
pub fn list_styles() -> &'static [Style] {
    &STYLES
}
