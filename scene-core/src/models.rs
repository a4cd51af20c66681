use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Static record describing one external video-generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoModel {
    pub id: String,
    pub display_name: String,
    /// 1 = premium, 2 = high, 3 = economy
    pub tier: u8,
    /// Credits charged per started 5-second block
    pub credits_per_5s: i64,
    pub max_duration_secs: u32,
    pub resolutions: Vec<String>,
    pub aspect_ratios: Vec<String>,
    pub supports_text_to_video: bool,
    pub supports_image_to_video: bool,
    pub supports_video_extension: bool,
    pub turbo: bool,
    pub supports_negative_prompt: bool,
}

impl VideoModel {
    /// Clamp a requested duration to what the model can produce
    pub fn clamp_duration(&self, duration_secs: u32) -> u32 {
        duration_secs.min(self.max_duration_secs)
    }

    /// Credits for a clip of the given duration, billed in 5-second blocks
    pub fn estimate_credits(&self, duration_secs: u32) -> i64 {
        let clamped = self.clamp_duration(duration_secs).max(1);
        let blocks = (i64::from(clamped) + 4) / 5;
        self.credits_per_5s * blocks
    }
}

fn model(
    id: &str,
    display_name: &str,
    tier: u8,
    credits_per_5s: i64,
    max_duration_secs: u32,
    resolutions: &[&str],
    aspect_ratios: &[&str],
) -> VideoModel {
    VideoModel {
        id: id.to_string(),
        display_name: display_name.to_string(),
        tier,
        credits_per_5s,
        max_duration_secs,
        resolutions: resolutions.iter().map(|s| s.to_string()).collect(),
        aspect_ratios: aspect_ratios.iter().map(|s| s.to_string()).collect(),
        supports_text_to_video: true,
        supports_image_to_video: false,
        supports_video_extension: false,
        turbo: false,
        supports_negative_prompt: false,
    }
}

static BUILTIN_MODELS: Lazy<Vec<VideoModel>> = Lazy::new(|| {
    vec![
        VideoModel {
            supports_image_to_video: true,
            ..model(
                "veo3",
                "Google Veo 3.1",
                1,
                350,
                8,
                &["720p", "1080p"],
                &["16:9", "9:16", "1:1"],
            )
        },
        model(
            "sora-2-pro-text-to-video",
            "OpenAI Sora 2 Pro",
            1,
            400,
            20,
            &["low", "medium", "high"],
            &["landscape", "portrait", "square"],
        ),
        VideoModel {
            supports_image_to_video: true,
            supports_video_extension: true,
            ..model(
                "runway-gen3",
                "Runway Gen-3 Alpha",
                2,
                200,
                10,
                &["720p", "1080p"],
                &["16:9", "9:16", "1:1", "4:3", "3:4"],
            )
        },
        VideoModel {
            supports_image_to_video: true,
            supports_negative_prompt: true,
            ..model(
                "kling/v2-1-pro",
                "Kling v2.1 Pro",
                2,
                250,
                10,
                &["720p", "1080p"],
                &["16:9", "9:16", "1:1"],
            )
        },
        VideoModel {
            supports_text_to_video: false,
            supports_image_to_video: true,
            ..model(
                "hailuo/2-3-image-to-video-pro",
                "Hailuo Image-to-Video",
                3,
                180,
                6,
                &["768P"],
                &["16:9", "9:16"],
            )
        },
        model(
            "bytedance/v1-pro-text-to-video",
            "Bytedance (TikTok)",
            3,
            150,
            5,
            &["720p"],
            &["16:9", "9:16"],
        ),
        VideoModel {
            turbo: true,
            ..model(
                "wan/2-2-a14b-text-to-video-turbo",
                "Wan Turbo (Alibaba)",
                3,
                120,
                5,
                &["720p"],
                &["16:9", "9:16"],
            )
        },
        VideoModel {
            supports_image_to_video: true,
            ..model(
                "wan/2-6-text-to-video",
                "Wan 2.6 (Best Value)",
                3,
                60,
                10,
                &["720p", "1080p"],
                &["16:9", "9:16", "1:1"],
            )
        },
    ]
});

/// Style key to economically sensible default model
fn builtin_style_defaults() -> HashMap<String, String> {
    [
        ("cinematic_realism", "runway-gen3"),
        ("stylized_3d", "kling/v2-1-pro"),
        ("anime", "wan/2-6-text-to-video"),
        ("documentary_grit", "hailuo/2-3-image-to-video-pro"),
        ("film_noir", "wan/2-2-a14b-text-to-video-turbo"),
        ("retro_vhs", "bytedance/v1-pro-text-to-video"),
        ("fantasy_illustration", "veo3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Immutable catalog of video models plus the style-to-default selection policy.
///
/// Style influences the economically correct default, but the caller may
/// force any known model; unknown style keys resolve to the configured
/// fallback so submission never fails on catalog lookups.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, VideoModel>,
    style_defaults: HashMap<String, String>,
    fallback_model: String,
}

/// Used when the configured fallback id is itself unknown
const LAST_RESORT_MODEL: &str = "runway-gen3";

impl ModelRegistry {
    /// Catalog shipped with the studio, with the given fallback model id.
    /// An unknown fallback id is replaced so resolution stays total.
    pub fn builtin(fallback_model: &str) -> Self {
        let models: HashMap<String, VideoModel> = BUILTIN_MODELS
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();
        let fallback_model = if models.contains_key(fallback_model) {
            fallback_model.to_string()
        } else {
            LAST_RESORT_MODEL.to_string()
        };
        Self {
            models,
            style_defaults: builtin_style_defaults(),
            fallback_model,
        }
    }

    /// Look up a model record by id
    pub fn describe(&self, model_id: &str) -> Option<&VideoModel> {
        self.models.get(model_id)
    }

    /// True iff the id names a model in the catalog
    pub fn is_known(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    /// Select the model for a submission: a known override wins, otherwise
    /// the style default, otherwise the fallback
    pub fn resolve(&self, style_key: &str, override_model: Option<&str>) -> &VideoModel {
        if let Some(id) = override_model {
            if let Some(m) = self.models.get(id) {
                return m;
            }
        }
        let id = self
            .style_defaults
            .get(style_key)
            .unwrap_or(&self.fallback_model);
        self.models
            .get(id)
            .or_else(|| self.models.get(&self.fallback_model))
            .expect("fallback model must exist in the catalog")
    }

    /// All models, cheapest viable option first within each tier
    pub fn list(&self) -> Vec<&VideoModel> {
        let mut models: Vec<&VideoModel> = self.models.values().collect();
        models.sort_by_key(|m| (m.tier, m.credits_per_5s, m.id.clone()));
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::builtin("runway-gen3")
    }

    #[test]
    fn catalog_is_stable() {
        let reg = registry();
        for (id, cost, tier, max) in [
            ("veo3", 350, 1, 8),
            ("sora-2-pro-text-to-video", 400, 1, 20),
            ("runway-gen3", 200, 2, 10),
            ("kling/v2-1-pro", 250, 2, 10),
            ("hailuo/2-3-image-to-video-pro", 180, 3, 6),
            ("bytedance/v1-pro-text-to-video", 150, 3, 5),
            ("wan/2-2-a14b-text-to-video-turbo", 120, 3, 5),
            ("wan/2-6-text-to-video", 60, 3, 10),
        ] {
            let m = reg.describe(id).unwrap();
            assert_eq!(m.credits_per_5s, cost, "{id}");
            assert_eq!(m.tier, tier, "{id}");
            assert_eq!(m.max_duration_secs, max, "{id}");
        }
    }

    #[test]
    fn override_wins_over_style_default() {
        let reg = registry();
        let m = reg.resolve("anime", Some("wan/2-6-text-to-video"));
        assert_eq!(m.id, "wan/2-6-text-to-video");
    }

    #[test]
    fn unknown_override_falls_back_to_style_default() {
        let reg = registry();
        let m = reg.resolve("cinematic_realism", Some("not-a-model"));
        assert_eq!(m.id, "runway-gen3");
    }

    #[test]
    fn unknown_style_uses_fallback() {
        let reg = registry();
        let m = reg.resolve("vaporwave_dreams", None);
        assert_eq!(m.id, "runway-gen3");
    }

    #[test]
    fn misconfigured_fallback_id_is_replaced() {
        let reg = ModelRegistry::builtin("model-from-the-future");
        let m = reg.resolve("vaporwave_dreams", None);
        assert_eq!(m.id, "runway-gen3");
    }

    #[test]
    fn listing_orders_by_tier_then_cost() {
        let reg = registry();
        let ids: Vec<&str> = reg.list().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids[0], "veo3");
        assert_eq!(ids[1], "sora-2-pro-text-to-video");
        assert_eq!(ids[2], "runway-gen3");
        // Cheapest option leads within the economy tier.
        assert_eq!(ids[4], "wan/2-6-text-to-video");
        assert_eq!(*ids.last().unwrap(), "hailuo/2-3-image-to-video-pro");
    }

    #[test]
    fn credit_estimate_bills_in_five_second_blocks() {
        let reg = registry();
        let runway = reg.describe("runway-gen3").unwrap();
        assert_eq!(runway.estimate_credits(5), 200);
        assert_eq!(runway.estimate_credits(6), 400);
        assert_eq!(runway.estimate_credits(10), 400);
        // Requests beyond max duration clamp before billing
        assert_eq!(runway.estimate_credits(60), 400);
    }

    #[test]
    fn duration_clamps_to_model_max() {
        let reg = registry();
        let hailuo = reg.describe("hailuo/2-3-image-to-video-pro").unwrap();
        assert_eq!(hailuo.clamp_duration(10), 6);
        assert_eq!(hailuo.clamp_duration(5), 5);
    }
}
