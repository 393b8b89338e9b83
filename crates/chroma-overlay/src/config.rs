use serde::{Deserialize, Serialize};

/// A normalized RGB color (each channel in 0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const GREEN: Rgb = Rgb { r: 0.0, g: 1.0, b: 0.0 };
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build from 8-bit channels (0–255).
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
        }
    }

    /// Clamp every channel to [0, 1].
    pub fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
        }
    }
}

/// Configuration surface for a video overlay session.
///
/// Out-of-range values are clamped, never rejected. All fields have
/// defaults, so hosts can deserialize a partial JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    /// Replace all non-keyed pixels with `silhouette_color` instead of
    /// their original color.
    pub silhouette_mode: bool,
    /// Restart playback from the beginning on completion (handled by the
    /// decoder backend).
    pub looping: bool,
    /// The background color to key out.
    pub key_color: Rgb,
    /// Flat color used for non-keyed pixels when `silhouette_mode` is on.
    pub silhouette_color: Rgb,
    /// Keying tolerance in 0–1. Note the legacy convention: the effective
    /// per-channel threshold is `1 - |tolerance|`, so a *larger* configured
    /// value narrows the matched color range.
    pub tolerance: f32,
    pub fade_in_delay_ms: u64,
    pub fade_in_duration_ms: u64,
    /// How long before the end of the stream the fade-out ramp starts.
    pub fade_out_lead_ms: u64,
    pub fade_out_duration_ms: u64,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            silhouette_mode: false,
            looping: false,
            key_color: Rgb::GREEN,
            silhouette_color: Rgb::BLACK,
            tolerance: 0.7,
            fade_in_delay_ms: 500,
            fade_in_duration_ms: 500,
            fade_out_lead_ms: 500,
            fade_out_duration_ms: 500,
        }
    }
}

/// Apply the legacy tolerance convention: absolute value capped at 1.0,
/// then inverted. The stored value is the per-channel distance threshold
/// the shader compares against.
pub(crate) fn invert_tolerance(input: f32) -> f32 {
    1.0 - input.abs().min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_legacy_view() {
        let opts = OverlayOptions::default();
        assert_eq!(opts.key_color, Rgb::GREEN);
        assert_eq!(opts.silhouette_color, Rgb::BLACK);
        assert!((opts.tolerance - 0.7).abs() < 1e-6);
        assert!(!opts.silhouette_mode);
        assert!(!opts.looping);
        assert_eq!(opts.fade_in_delay_ms, 500);
        assert_eq!(opts.fade_in_duration_ms, 500);
        assert_eq!(opts.fade_out_lead_ms, 500);
        assert_eq!(opts.fade_out_duration_ms, 500);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let opts: OverlayOptions =
            serde_json::from_str(r#"{"silhouette_mode": true, "tolerance": 0.3}"#).unwrap();
        assert!(opts.silhouette_mode);
        assert!((opts.tolerance - 0.3).abs() < 1e-6);
        assert_eq!(opts.fade_out_lead_ms, 500);
    }

    #[test]
    fn invert_tolerance_legacy_direction() {
        // Larger input narrows the matched range (smaller threshold).
        assert!((invert_tolerance(0.7) - 0.3).abs() < 1e-6);
        assert!((invert_tolerance(0.0) - 1.0).abs() < 1e-6);
        // Out-of-range input is clamped by absolute value, not rejected.
        assert!((invert_tolerance(-0.7) - 0.3).abs() < 1e-6);
        assert!((invert_tolerance(3.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn invert_tolerance_idempotent_for_identical_sets() {
        let a = invert_tolerance(0.42);
        let b = invert_tolerance(0.42);
        assert_eq!(a, b);
    }

    #[test]
    fn rgb_from_u8() {
        let c = Rgb::from_u8(255, 0, 128);
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.g - 0.0).abs() < 1e-6);
        assert!((c.b - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn rgb_clamped() {
        let c = Rgb::new(-0.5, 1.5, 0.5).clamped();
        assert_eq!(c, Rgb::new(0.0, 1.0, 0.5));
    }
}
