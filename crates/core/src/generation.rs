//! Generation catalogue (durations, resolutions, presets, styles, quality
//! modes) and resolution of per-job parameters into concrete model inputs.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Allowed clip durations in seconds.
pub const DURATIONS: &[u32] = &[3, 6, 8, 10, 12];

/// Global default frame rate when neither the job nor its quality mode set one.
pub const DEFAULT_FPS: u32 = 24;
/// Global default number of denoising steps.
pub const DEFAULT_STEPS: u32 = 40;

pub const GUIDANCE_SCALE: f64 = 1.0;
pub const NOISE_AUGMENTATION: f64 = 0.1;
pub const ENHANCE_OUTPUT: bool = true;

/// Motion bucket used when a preset does not define one.
pub const DEFAULT_MOTION_BUCKET: u32 = 127;

/// Bounds for per-job overrides.
pub const MIN_CUSTOM_FPS: u32 = 12;
pub const MAX_CUSTOM_FPS: u32 = 30;
pub const MIN_CUSTOM_STEPS: u32 = 20;
pub const MAX_CUSTOM_STEPS: u32 = 60;

/// Maximum length of the free-text prompt, in characters.
pub const MAX_PROMPT_CHARS: u64 = 500;

/// Default admission limit for the work queue.
pub const MAX_QUEUE_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    /// Output frame size as `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::P360 => (480, 360),
            Resolution::P480 => (640, 480),
            Resolution::P720 => (1280, 720),
            Resolution::P1080 => (1920, 1080),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::P360 => "360p",
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

// ---------------------------------------------------------------------------
// Motion presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPreset {
    Micro,
    Smooth,
    PanL,
    PanR,
    TiltUp,
    TiltDown,
    DollyIn,
    Dynamic,
}

impl MotionPreset {
    /// Motion bucket id fed to the diffusion model. Higher means more motion.
    pub fn motion_bucket_id(self) -> u32 {
        match self {
            MotionPreset::Micro => 50,
            MotionPreset::Smooth => 80,
            MotionPreset::PanL | MotionPreset::PanR => 100,
            MotionPreset::TiltUp | MotionPreset::TiltDown => 100,
            MotionPreset::DollyIn => DEFAULT_MOTION_BUCKET,
            MotionPreset::Dynamic => 150,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MotionPreset::Micro => "Subtle micro-movements",
            MotionPreset::Smooth => "Smooth natural motion",
            MotionPreset::PanL => "Pan left",
            MotionPreset::PanR => "Pan right",
            MotionPreset::TiltUp => "Tilt upward",
            MotionPreset::TiltDown => "Tilt downward",
            MotionPreset::DollyIn => "Zoom in (dolly)",
            MotionPreset::Dynamic => "Dynamic movement",
        }
    }
}

// ---------------------------------------------------------------------------
// Visual styles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualStyle {
    #[default]
    None,
    Anime,
    Comic,
    #[serde(rename = "3d")]
    ThreeD,
    Clay,
    Cyberpunk,
    Cinematic,
    Fantasy,
}

impl VisualStyle {
    /// Text appended to the user prompt for this style.
    pub fn prompt_suffix(self) -> &'static str {
        match self {
            VisualStyle::None => "",
            VisualStyle::Anime => ", anime style, vibrant colors",
            VisualStyle::Comic => ", comic book style, bold lines",
            VisualStyle::ThreeD => ", 3D animation style, CGI",
            VisualStyle::Clay => ", clay animation style, stop motion",
            VisualStyle::Cyberpunk => ", cyberpunk style, neon lights, futuristic",
            VisualStyle::Cinematic => ", cinematic style, film grain, professional",
            VisualStyle::Fantasy => ", fantasy style, magical, dreamy",
        }
    }
}

// ---------------------------------------------------------------------------
// Quality modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    Fast,
    #[default]
    Standard,
    Smooth,
}

impl QualityMode {
    pub fn fps(self) -> u32 {
        match self {
            QualityMode::Fast => 18,
            QualityMode::Standard => 24,
            QualityMode::Smooth => 30,
        }
    }

    pub fn steps(self) -> u32 {
        match self {
            QualityMode::Fast => 30,
            QualityMode::Standard => 40,
            QualityMode::Smooth => 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-job settings
// ---------------------------------------------------------------------------

/// Generation parameters as submitted and stored with the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub duration: u32,
    pub resolution: Resolution,
    pub motion_preset: MotionPreset,
    #[serde(default)]
    pub visual_style: Option<VisualStyle>,
    #[serde(default)]
    pub quality_mode: Option<QualityMode>,
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default)]
    pub custom_fps: Option<u32>,
    #[serde(default)]
    pub custom_steps: Option<u32>,
}

/// Concrete inputs for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParams {
    pub width: u32,
    pub height: u32,
    pub duration: u32,
    pub fps: u32,
    pub steps: u32,
    pub num_frames: u32,
    pub motion_bucket_id: u32,
    pub guidance_scale: f64,
    pub noise_aug_strength: f64,
    pub prompt: String,
    pub enhance_output: bool,
}

/// Reject durations outside [`DURATIONS`].
pub fn validate_duration(duration: u32) -> Result<(), CoreError> {
    if DURATIONS.contains(&duration) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid duration {duration}. Allowed: {DURATIONS:?}"
        )))
    }
}

/// Resolve fps and steps with per-field precedence:
/// explicit override, then the quality mode, then the global default.
pub fn resolve_frame_settings(
    quality_mode: Option<QualityMode>,
    custom_fps: Option<u32>,
    custom_steps: Option<u32>,
) -> (u32, u32) {
    let fps = custom_fps
        .or_else(|| quality_mode.map(QualityMode::fps))
        .unwrap_or(DEFAULT_FPS);
    let steps = custom_steps
        .or_else(|| quality_mode.map(QualityMode::steps))
        .unwrap_or(DEFAULT_STEPS);
    (fps, steps)
}

/// Compose the prompt from the user text and the style suffix.
pub fn compose_prompt(user_prompt: Option<&str>, style: VisualStyle) -> String {
    let base = user_prompt.map(str::trim).unwrap_or_default();
    format!("{base}{}", style.prompt_suffix())
        .trim_start_matches(", ")
        .to_string()
}

impl GenerationSettings {
    /// Turn stored settings into model inputs.
    pub fn resolve(&self) -> ResolvedParams {
        let (width, height) = self.resolution.dimensions();
        let (fps, steps) =
            resolve_frame_settings(self.quality_mode, self.custom_fps, self.custom_steps);
        let style = self.visual_style.unwrap_or_default();

        ResolvedParams {
            width,
            height,
            duration: self.duration,
            fps,
            steps,
            num_frames: self.duration * fps,
            motion_bucket_id: self.motion_preset.motion_bucket_id(),
            guidance_scale: GUIDANCE_SCALE,
            noise_aug_strength: NOISE_AUGMENTATION,
            prompt: compose_prompt(self.user_prompt.as_deref(), style),
            enhance_output: ENHANCE_OUTPUT,
        }
    }
}
