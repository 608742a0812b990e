//! CPU versions of the bloom shading functions
//!
//! These mirror the GLSL in [`super::shaders`] line for line and are what
//! the software backend executes for the bloom programs. Colours are
//! linear RGBA in `[f32; 4]`.

use crate::foundation::math::utils::luminance;

/// Number of one-sided Gaussian taps (centre included)
pub const BLUR_TAPS: usize = 5;

/// Soft-knee bright pass.
///
/// Below `threshold - knee` nothing passes, above `threshold + knee` the
/// excess passes linearly, and in between the response is quadratic, where
/// `knee = threshold * soft_knee`.
pub fn bright_pass(color: [f32; 4], threshold: f32, soft_knee: f32) -> [f32; 4] {
    let brightness = luminance(color[0], color[1], color[2]);
    let knee = threshold * soft_knee;

    let soft = (brightness - threshold + knee).clamp(0.0, 2.0 * knee);
    let soft = soft * soft / (4.0 * knee + 1e-4);
    let contribution = soft.max(brightness - threshold) / brightness.max(1e-4);

    [
        color[0] * contribution,
        color[1] * contribution,
        color[2] * contribution,
        color[3],
    ]
}

/// Normalized one-sided Gaussian weights; `weights[0]` is the centre tap.
///
/// `weights[0] + 2 * sum(weights[1..]) == 1`.
pub fn gaussian_weights(taps: usize) -> Vec<f32> {
    if taps == 0 {
        return Vec::new();
    }
    let sigma = (taps as f32 * 0.5).max(1.0);
    let raw: Vec<f32> = (0..taps)
        .map(|offset| {
            let x = offset as f32;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total = raw[0] + 2.0 * raw[1..].iter().sum::<f32>();
    raw.into_iter().map(|weight| weight / total).collect()
}

/// One-dimensional Gaussian blur at `uv` along `step` (in UV units per tap)
pub fn blur(sample: impl Fn([f32; 2]) -> [f32; 4], uv: [f32; 2], step: [f32; 2], weights: &[f32]) -> [f32; 4] {
    let Some((&center, side)) = weights.split_first() else {
        return sample(uv);
    };

    let mut sum = scale(sample(uv), center);
    for (index, &weight) in side.iter().enumerate() {
        let offset = (index + 1) as f32;
        let forward = sample([uv[0] + step[0] * offset, uv[1] + step[1] * offset]);
        let backward = sample([uv[0] - step[0] * offset, uv[1] - step[1] * offset]);
        sum = add(sum, scale(add(forward, backward), weight));
    }
    sum
}

/// Knobs of the composite pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    /// Bloom strength
    pub intensity: f32,
    /// Exposure multiplier applied to the bloom term
    pub exposure: f32,
    /// Apply Reinhard tonemapping to the bloom term
    pub tonemap: bool,
    /// How far the glow raises alpha over transparent background
    pub alpha_scale: f32,
}

/// Combine the captured scene with the blurred bloom.
///
/// With `intensity == 0` the result equals `scene` exactly.
pub fn composite(scene: [f32; 4], bloom: [f32; 4], params: &CompositeParams) -> [f32; 4] {
    let gain = params.intensity * params.exposure;
    let mut term = [bloom[0] * gain, bloom[1] * gain, bloom[2] * gain];
    if params.tonemap {
        for channel in &mut term {
            *channel /= 1.0 + *channel;
        }
    }

    let glow_alpha = luminance(term[0], term[1], term[2]) * params.alpha_scale;
    [
        scene[0] + term[0],
        scene[1] + term[1],
        scene[2] + term[2],
        scene[3].max(glow_alpha).clamp(0.0, 1.0),
    ]
}

fn scale(color: [f32; 4], factor: f32) -> [f32; 4] {
    color.map(|channel| channel * factor)
}

fn add(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]
}
