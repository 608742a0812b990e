//! GLSL programs of the bloom pipeline
//!
//! All three passes share one full-screen-triangle vertex stage. Parameter
//! names here are the names [`super::bloom::PostProcessor`] sets.

use crate::render::backend::ShaderSource;

/// Program name of the bright pass
pub const EXTRACT_PROGRAM: &str = "bloom_extract";
/// Program name of the separable blur
pub const BLUR_PROGRAM: &str = "bloom_blur";
/// Program name of the composite pass
pub const COMPOSITE_PROGRAM: &str = "bloom_composite";

const FULLSCREEN_VERTEX: &str = r"#version 330 core
out vec2 v_uv;

void main() {
    // Single triangle covering the screen, no vertex buffer needed
    vec2 position = vec2((gl_VertexID << 1) & 2, gl_VertexID & 2);
    v_uv = position;
    gl_Position = vec4(position * 2.0 - 1.0, 0.0, 1.0);
}
";

const EXTRACT_FRAGMENT: &str = r"#version 330 core
in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_scene;
uniform float u_threshold;
uniform float u_softKnee;

void main() {
    vec4 color = texture(u_scene, v_uv);
    float brightness = dot(color.rgb, vec3(0.2126, 0.7152, 0.0722));
    float knee = u_threshold * u_softKnee;

    float soft = clamp(brightness - u_threshold + knee, 0.0, 2.0 * knee);
    soft = soft * soft / (4.0 * knee + 1e-4);
    float contribution = max(soft, brightness - u_threshold) / max(brightness, 1e-4);

    frag_color = vec4(color.rgb * contribution, color.a);
}
";

const BLUR_FRAGMENT: &str = r"#version 330 core
in vec2 v_uv;
out vec4 frag_color;

const int TAPS = 5;

uniform sampler2D u_source;
uniform vec2 u_direction;
uniform float u_weights[TAPS];

void main() {
    vec4 sum = texture(u_source, v_uv) * u_weights[0];
    for (int i = 1; i < TAPS; ++i) {
        vec2 offset = u_direction * float(i);
        sum += texture(u_source, v_uv + offset) * u_weights[i];
        sum += texture(u_source, v_uv - offset) * u_weights[i];
    }
    frag_color = sum;
}
";

const COMPOSITE_FRAGMENT: &str = r"#version 330 core
in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_scene;
uniform sampler2D u_bloom;
uniform float u_intensity;
uniform float u_exposure;
uniform bool u_tonemap;
uniform float u_alphaScale;

void main() {
    vec4 scene = texture(u_scene, v_uv);
    vec3 term = texture(u_bloom, v_uv).rgb * u_intensity * u_exposure;
    if (u_tonemap) {
        term = term / (vec3(1.0) + term);
    }

    float glow = dot(term, vec3(0.2126, 0.7152, 0.0722)) * u_alphaScale;
    frag_color = vec4(scene.rgb + term, clamp(max(scene.a, glow), 0.0, 1.0));
}
";

/// Bright-pass program
pub fn extract_source() -> ShaderSource {
    ShaderSource::new(EXTRACT_PROGRAM, FULLSCREEN_VERTEX, EXTRACT_FRAGMENT)
}

/// Separable Gaussian blur program
pub fn blur_source() -> ShaderSource {
    ShaderSource::new(BLUR_PROGRAM, FULLSCREEN_VERTEX, BLUR_FRAGMENT)
}

/// Composite program
pub fn composite_source() -> ShaderSource {
    ShaderSource::new(COMPOSITE_PROGRAM, FULLSCREEN_VERTEX, COMPOSITE_FRAGMENT)
}
