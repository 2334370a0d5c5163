//! WGSL source generation for the update kernel and the point-sprite
//! render shader.
//!
//! The respawn ranges are baked into the kernel as constants; the per-frame
//! values arrive through the [`crate::uniforms::SimParams`] block. The
//! kernel body must stay in lockstep with [`crate::step::update_particle`],
//! which is its host-side model, and with [`crate::hash::RANDOM_WGSL`] for
//! the draw sequence.

use std::ops::Range;

use crate::hash::RANDOM_WGSL;
use crate::uniforms::{SimParams, ViewParams};

/// Threads per workgroup in the update kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// WGSL declaration of the particle record.
///
/// The fields are scalars rather than `vec3` members: a `vec3` in a storage
/// struct is padded to 16 bytes, which would widen the stride to 48 and
/// break the 32-byte interleaved layout shared with the vertex fetch.
pub const PARTICLE_WGSL: &str = r#"
struct Particle {
    px: f32,
    py: f32,
    pz: f32,
    diameter: f32,
    vx: f32,
    vy: f32,
    vz: f32,
    life_time: f32,
}
"#;

/// Respawn draw ranges baked into the generated kernel.
#[derive(Clone, Debug)]
pub struct RespawnRanges {
    pub diameter: Range<f32>,
    pub upward_speed: Range<f32>,
    pub lateral_speed: f32,
    pub life_time: Range<f32>,
}

/// Generated update and render sources for one engine configuration.
pub struct ShaderSources {
    pub update: String,
    pub render: String,
}

/// Format an `f32` as a WGSL float literal.
fn lit(v: f32) -> String {
    format!("{:?}", v)
}

/// Generate the update kernel.
///
/// Reads `src[index]`, applies the update rule, writes `dst[index]`. The
/// pass has no rasterized output by construction.
pub fn update_kernel(ranges: &RespawnRanges) -> String {
    format!(
        r#"{particle}
{sim_params}
{random}
const RESPAWN_DIAMETER_MIN: f32 = {dmin};
const RESPAWN_DIAMETER_MAX: f32 = {dmax};
const RESPAWN_UPWARD_MIN: f32 = {upmin};
const RESPAWN_UPWARD_MAX: f32 = {upmax};
const RESPAWN_LATERAL: f32 = {lat};
const RESPAWN_LIFE_MIN: f32 = {lmin};
const RESPAWN_LIFE_MAX: f32 = {lmax};

@group(0) @binding(0)
var<storage, read> src: array<Particle>;

@group(0) @binding(1)
var<storage, read_write> dst: array<Particle>;

@group(0) @binding(2)
var<uniform> params: SimParams;

@compute @workgroup_size({workgroup_size})
fn update_main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let index = gid.x;
    if index >= arrayLength(&src) {{
        return;
    }}

    var p = src[index];
    p.life_time = p.life_time - params.delta_time;

    if p.life_time <= 0.0 {{
        let s = respawn_seed(index, params.accumulated_time);
        p.px = params.spawn_position.x;
        p.py = params.spawn_position.y;
        p.pz = params.spawn_position.z;
        p.diameter = rand_range(s, RESPAWN_DIAMETER_MIN, RESPAWN_DIAMETER_MAX);
        p.vx = rand_range(s + 1u, -RESPAWN_LATERAL, RESPAWN_LATERAL);
        p.vy = rand_range(s + 2u, RESPAWN_UPWARD_MIN, RESPAWN_UPWARD_MAX);
        p.vz = rand_range(s + 3u, -RESPAWN_LATERAL, RESPAWN_LATERAL);
        p.life_time = rand_range(s + 4u, RESPAWN_LIFE_MIN, RESPAWN_LIFE_MAX);
    }} else {{
        let velocity = vec3<f32>(p.vx, p.vy, p.vz) + params.gravity * params.delta_time;
        let position = vec3<f32>(p.px, p.py, p.pz) + velocity * params.delta_time;
        p.vx = velocity.x;
        p.vy = velocity.y;
        p.vz = velocity.z;
        p.px = position.x;
        p.py = position.y;
        p.pz = position.z;
    }}

    dst[index] = p;
}}
"#,
        particle = PARTICLE_WGSL,
        sim_params = SimParams::WGSL,
        random = RANDOM_WGSL,
        dmin = lit(ranges.diameter.start),
        dmax = lit(ranges.diameter.end),
        upmin = lit(ranges.upward_speed.start),
        upmax = lit(ranges.upward_speed.end),
        lat = lit(ranges.lateral_speed),
        lmin = lit(ranges.life_time.start),
        lmax = lit(ranges.life_time.end),
        workgroup_size = WORKGROUP_SIZE,
    )
}

/// Generate the point-sprite render shader.
///
/// Each particle instance expands to a camera-facing quad scaled by its
/// diameter; fragments outside the unit radius are discarded, producing a
/// disc. Color is the sprite texture (solid white when none is configured)
/// modulated by the lifetime fade-out alpha. The shader never writes
/// particle state.
pub fn render_shader(point_scale: f32) -> String {
    format!(
        r#"{sim_params}
{view_params}
const POINT_SCALE: f32 = {point_scale};

@group(0) @binding(0)
var<uniform> params: SimParams;

@group(0) @binding(1)
var<uniform> view: ViewParams;

@group(0) @binding(2)
var sprite_texture: texture_2d<f32>;

@group(0) @binding(3)
var sprite_sampler: sampler;

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) alpha: f32,
}}

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec3<f32>,
    @location(1) diameter: f32,
    @location(3) life_time: f32,
) -> VertexOutput {{
    var quad = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );

    let corner = quad[vertex_index];
    var clip = view.view_proj * vec4<f32>(position, 1.0);
    let size = diameter * POINT_SCALE;
    clip.x += corner.x * size * clip.w;
    clip.y += corner.y * size * clip.w;

    var out: VertexOutput;
    out.clip_position = clip;
    out.uv = corner;
    out.alpha = clamp(life_time / params.max_life_time, 0.0, 1.0);
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    let texel = textureSample(sprite_texture, sprite_sampler, in.uv * 0.5 + vec2<f32>(0.5, 0.5));
    if length(in.uv) > 1.0 {{
        discard;
    }}
    return vec4<f32>(texel.rgb, texel.a * in.alpha);
}}
"#,
        sim_params = SimParams::WGSL,
        view_params = ViewParams::WGSL,
        point_scale = lit(point_scale),
    )
}

/// Generate both sources for one configuration.
pub fn generate(ranges: &RespawnRanges, point_scale: f32) -> ShaderSources {
    ShaderSources {
        update: update_kernel(ranges),
        render: render_shader(point_scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ranges() -> RespawnRanges {
        RespawnRanges {
            diameter: 8.0..24.0,
            upward_speed: 1.0..2.0,
            lateral_speed: 0.25,
            life_time: 3.0..5.0,
        }
    }

    #[test]
    fn test_update_kernel_reads_src_writes_dst() {
        let wgsl = update_kernel(&test_ranges());
        assert!(wgsl.contains("var<storage, read> src"));
        assert!(wgsl.contains("var<storage, read_write> dst"));
        assert!(wgsl.contains("var p = src[index];"));
        assert!(wgsl.contains("dst[index] = p;"));
    }

    #[test]
    fn test_update_kernel_carries_hash_contract() {
        let wgsl = update_kernel(&test_ranges());
        assert!(wgsl.contains("0xed5ad4bbu"));
        assert!(wgsl.contains("respawn_seed(index, params.accumulated_time)"));
    }

    #[test]
    fn test_update_kernel_bakes_ranges() {
        let wgsl = update_kernel(&test_ranges());
        assert!(wgsl.contains("const RESPAWN_LIFE_MIN: f32 = 3.0;"));
        assert!(wgsl.contains("const RESPAWN_LIFE_MAX: f32 = 5.0;"));
        assert!(wgsl.contains("const RESPAWN_LATERAL: f32 = 0.25;"));
    }

    #[test]
    fn test_render_shader_masks_a_disc() {
        let wgsl = render_shader(0.002);
        assert!(wgsl.contains("discard"));
        assert!(wgsl.contains("length(in.uv) > 1.0"));
    }

    #[test]
    fn test_render_shader_fades_by_lifetime() {
        let wgsl = render_shader(0.002);
        assert!(wgsl.contains("clamp(life_time / params.max_life_time, 0.0, 1.0)"));
    }

    #[test]
    fn test_render_shader_never_writes_particles() {
        let wgsl = render_shader(0.002);
        assert!(!wgsl.contains("var<storage"), "render stage must not bind particle storage");
    }
}
