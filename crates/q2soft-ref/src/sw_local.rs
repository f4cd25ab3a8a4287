// sw_local.rs — Software refresh local definitions
//
// Constants, error types, fixed-point helpers and the per-frame view state
// shared by every stage of the refresh.

use q2soft_common::q_shared::*;

pub const REF_VERSION: &str = "SOFT 0.01";

// ============================================================================
// Fixed point
// ============================================================================

/// Screen-space fixed point used by the edge tables: 16.16 in an `i32`.
pub const FIXED_SHIFT: i32 = 16;
pub const FIXED_ONE: i32 = 1 << FIXED_SHIFT;
pub const FIXED_FRAC_MASK: i32 = FIXED_ONE - 1;

/// Largest screen dimension the 16.16 edge stepping can address.
pub const MAX_RESOLUTION: i32 = 32767;

#[inline]
pub fn float_to_fixed(f: f32) -> i32 {
    (f * FIXED_ONE as f32) as i32
}

#[inline]
pub fn fixed_to_int(x: i32) -> i32 {
    x >> FIXED_SHIFT
}

// ============================================================================
// Pools and tables
// ============================================================================

pub const NUMSTACKEDGES: usize = 2048;
pub const NUMSTACKSURFACES: usize = 1024;
pub const MAXALIASVERTS: usize = 2048;

/// Active edge table sentinels live in the first edge slots.
pub const EDGE_HEAD: u32 = 0;
pub const EDGE_TAIL: u32 = 1;
pub const EDGE_AFTERTAIL: u32 = 2;
pub const EDGE_SENTINEL: u32 = 3;
pub const NUM_EDGE_SENTINELS: usize = 4;

/// Surface 0 is "no surface", surface 1 is the background.
pub const SURF_NONE: u32 = 0;
pub const SURF_BACKGROUND: u32 = 1;
pub const NUM_RESERVED_SURFACES: usize = 2;

pub const NONE_INDEX: u32 = u32::MAX;

pub const BACKGROUND_KEY: i32 = 0x7FFF_FFFF;
pub const SKYBOX_KEY: i32 = 0x7FFF_FFF0;

pub const BMODEL_FULLY_CLIPPED: i32 = 0x10;

pub const BACKFACE_EPSILON: f32 = 0.01;
pub const NEAR_CLIP: f32 = 0.01;
pub const PARTICLE_Z_CLIP: f32 = 8.0;

pub const DLIGHT_CUTOFF: f32 = 64.0;

// ============================================================================
// Colormap / lighting
// ============================================================================

pub const VID_CBITS: i32 = 6;
pub const VID_GRADES: i32 = 1 << VID_CBITS;
pub const LIGHT_MIN: i32 = 5;
pub const MAXLIGHTMAPS: usize = 4;
pub const NUM_MIPS: usize = 4;
pub const TRANSPARENT_COLOR: u8 = 0xFF;

// ============================================================================
// Warp
// ============================================================================

pub const CYCLE: usize = 128;
pub const AMP: i32 = 8 * 0x10000;
pub const AMP2: usize = 3;
pub const SPEED: f32 = 20.0;

pub const NUM_BEAM_SEGS: usize = 6;

// internal surface flags
pub const SURF_PLANEBACK: i32 = 2;
pub const SURF_DRAWSKYBOX: i32 = 4;
pub const SURF_DRAWTURB: i32 = 0x10;
pub const SURF_DRAWBACKGROUND: i32 = 0x40;

// ============================================================================
// rserr_t
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RsErr {
    Ok = 0,
    InvalidFullscreen = 1,
    InvalidMode = 2,
    Unknown = 3,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefError {
    /// Unrecoverable; the host must stop rendering.
    Fatal(String),
    /// A buffer could not be allocated; prior state is untouched.
    OutOfMemory { what: &'static str, bytes: usize },
    /// A frame needs a world but none is registered.
    NoWorldModel,
    /// Mode negotiation failed in a way no fallback covers.
    ModeChange(String),
}

impl std::fmt::Display for RefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefError::Fatal(msg) => write!(f, "fatal: {}", msg.trim_end()),
            RefError::OutOfMemory { what, bytes } => {
                write!(f, "{}: Couldn't malloc {} bytes", what, bytes)
            }
            RefError::NoWorldModel => write!(f, "R_RenderView: NULL worldmodel"),
            RefError::ModeChange(msg) => write!(f, "mode change failed: {}", msg.trim_end()),
        }
    }
}

impl std::error::Error for RefError {}

/// Allocate a zero-filled buffer without aborting on failure.
pub fn try_alloc<T: Clone + Default>(what: &'static str, count: usize) -> Result<Vec<T>, RefError> {
    let mut v: Vec<T> = Vec::new();
    v.try_reserve_exact(count).map_err(|_| RefError::OutOfMemory {
        what,
        bytes: count.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(count, T::default());
    Ok(v)
}

// ============================================================================
// Video definition
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VidDef {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

// ============================================================================
// Clip planes and view bases
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub dist: f32,
}

impl ClipPlane {
    #[inline]
    pub fn distance(&self, p: &Vec3) -> f32 {
        dot_product(p, &self.normal) - self.dist
    }
}

/// The eye expressed in some model's space. Index 0 of a frame's basis
/// list is always the world.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewBasis {
    pub origin: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl ViewBasis {
    /// Model space -> view space (x right, y up, z forward), relative to the eye.
    #[inline]
    pub fn transform_point(&self, p: &Vec3) -> Vec3 {
        let local = vector_subtract(p, &self.origin);
        self.transform_vector(&local)
    }

    #[inline]
    pub fn transform_vector(&self, v: &Vec3) -> Vec3 {
        [
            dot_product(v, &self.right),
            dot_product(v, &self.up),
            dot_product(v, &self.forward),
        ]
    }

    /// Express this basis in the space of an entity placed at `origin`
    /// with orientation `(forward, right, up)`.
    pub fn into_model_space(&self, origin: &Vec3, axes: &(Vec3, Vec3, Vec3)) -> ViewBasis {
        let (f, r, u) = axes;
        let to_model = |v: &Vec3| [dot_product(v, f), -dot_product(v, r), dot_product(v, u)];
        let rel = vector_subtract(&self.origin, origin);
        ViewBasis {
            origin: to_model(&rel),
            forward: to_model(&self.forward),
            right: to_model(&self.right),
            up: to_model(&self.up),
        }
    }
}

/// Frustum corner selection: entries 0..3 pick the reject corner, 3..6 the
/// accept corner, as indexes into a `[mins, maxs]` array of six floats.
pub fn frustum_indexes(planes: &[ClipPlane; 4]) -> [[usize; 6]; 4] {
    let mut out = [[0usize; 6]; 4];
    for (i, plane) in planes.iter().enumerate() {
        for j in 0..3 {
            if plane.normal[j] < 0.0 {
                out[i][j] = j;
                out[i][j + 3] = j + 3;
            } else {
                out[i][j] = j + 3;
                out[i][j + 3] = j;
            }
        }
    }
    out
}

// ============================================================================
// View state
// ============================================================================

/// Projection and clipping state rebuilt by `setup_frame`.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub vrect: VRect,
    pub vrectright: i32,
    pub vrectbottom: i32,
    pub fvrectx_adj: f32,
    pub fvrecty_adj: f32,
    pub fvrectright_adj: f32,
    pub fvrectbottom_adj: f32,
    pub vrect_x_adj_shift: i32,
    pub vrectright_adj_shift: i32,

    pub xcenter: f32,
    pub ycenter: f32,
    pub xscale: f32,
    pub yscale: f32,
    pub xscaleinv: f32,
    pub yscaleinv: f32,
    pub xscaleshrink: f32,
    pub yscaleshrink: f32,
    pub horizontal_fov: f32,
    pub vertical_fov: f32,

    pub world: ViewBasis,
    /// View-space frustum planes: left, right, bottom, top.
    pub view_planes: [[f32; 3]; 4],
    /// The same planes in world space.
    pub clip_planes: [ClipPlane; 4],
    pub frustum_indexes: [[usize; 6]; 4],
}

impl ViewState {
    /// Rebuild projection for `vrect` with horizontal field of view `fov_x`
    /// in degrees, looking from `origin` along `angles`.
    pub fn setup(&mut self, vrect: VRect, fov_x: f32, origin: &Vec3, angles: &Vec3) {
        self.vrect = vrect;
        self.vrectright = vrect.x + vrect.width;
        self.vrectbottom = vrect.y + vrect.height;
        self.fvrectx_adj = vrect.x as f32 - 0.5;
        self.fvrecty_adj = vrect.y as f32 - 0.5;
        self.fvrectright_adj = self.vrectright as f32 - 0.5;
        self.fvrectbottom_adj = self.vrectbottom as f32 - 0.5;
        self.vrect_x_adj_shift = (vrect.x << FIXED_SHIFT) + (1 << (FIXED_SHIFT - 1)) - 1;
        self.vrectright_adj_shift = (self.vrectright << FIXED_SHIFT) + (1 << (FIXED_SHIFT - 1)) - 1;

        self.horizontal_fov = 2.0 * (fov_x.to_radians() / 2.0).tan();
        self.vertical_fov = if vrect.width > 0 {
            self.horizontal_fov * vrect.height as f32 / vrect.width as f32
        } else {
            self.horizontal_fov
        };

        self.xcenter = vrect.width as f32 * 0.5 + vrect.x as f32 - 0.5;
        self.ycenter = vrect.height as f32 * 0.5 + vrect.y as f32 - 0.5;
        self.xscale = vrect.width as f32 / self.horizontal_fov;
        self.yscale = self.xscale;
        self.xscaleinv = 1.0 / self.xscale;
        self.yscaleinv = 1.0 / self.yscale;
        self.xscaleshrink = (vrect.width - 6).max(1) as f32 / self.horizontal_fov;
        self.yscaleshrink = self.xscaleshrink;

        let (forward, right, up) = angle_vectors(angles);
        self.world = ViewBasis { origin: *origin, forward, right, up };

        let hx = self.horizontal_fov * 0.5;
        let hy = self.vertical_fov * 0.5;
        self.view_planes = [[1.0, 0.0, hx], [-1.0, 0.0, hx], [0.0, 1.0, hy], [0.0, -1.0, hy]];
        self.clip_planes = clip_planes_for(&self.view_planes, &self.world);
        self.frustum_indexes = frustum_indexes(&self.clip_planes);
    }

    /// Project a view-space point; returns `(u, v, 1/z)` clamped to the
    /// adjusted view rectangle.
    #[inline]
    pub fn project(&self, p: &Vec3) -> (f32, f32, f32) {
        let z = if p[2] < NEAR_CLIP { NEAR_CLIP } else { p[2] };
        let zi = 1.0 / z;
        let u = (self.xcenter + self.xscale * zi * p[0]).clamp(self.fvrectx_adj, self.fvrectright_adj);
        let v = (self.ycenter - self.yscale * zi * p[1]).clamp(self.fvrecty_adj, self.fvrectbottom_adj);
        (u, v, zi)
    }
}

/// Turn view-space frustum normals into planes in the space of `basis`.
pub fn clip_planes_for(view_planes: &[[f32; 3]; 4], basis: &ViewBasis) -> [ClipPlane; 4] {
    let mut out = [ClipPlane::default(); 4];
    for (i, n) in view_planes.iter().enumerate() {
        let mut normal = [0.0f32; 3];
        for j in 0..3 {
            normal[j] = n[0] * basis.right[j] + n[1] * basis.up[j] + n[2] * basis.forward[j];
        }
        vector_normalize(&mut normal);
        out[i] = ClipPlane { normal, dist: dot_product(&basis.origin, &normal) };
    }
    out
}
