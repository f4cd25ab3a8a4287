// sw_alias.rs — Alias (MD2) model drawing
//
// Frames are lerped into the per-frame vertex pool, lit against a fixed
// light direction, and the triangles go through the polygon rasterizer
// with colormap shading.

use q2soft_common::q_shared::*;

use crate::sw_light::light_point;
use crate::sw_local::*;
use crate::sw_model_types::{AliasFrame, AliasModel, BspWorld, Image};
use crate::sw_poly::{wrapped_texel, Blend, PolyRasterizer, PolyStyle, PolyVert};
use crate::sw_pool::Pool;
use crate::sw_refdef::{Entity, RefDef};
use crate::sw_scan::FrameTarget;

/// Light always comes from the same direction, in world space.
const ALIAS_LIGHTVEC: Vec3 = [-1.0, 0.0, 0.0];

/// Model orientation. Alias models pitch the opposite way to the view.
pub fn alias_axes(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    angle_vectors(&[-angles[PITCH], angles[YAW], angles[ROLL]])
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AliasLighting {
    /// Colormap offset at zero shade; larger is darker.
    pub ambient: i32,
    pub shade: i32,
    /// Light direction in model space.
    pub lightvec: Vec3,
    /// Set for weapon models so the host can read the light level.
    pub lightlevel: Option<f32>,
}

impl AliasLighting {
    /// Work out ambient and directional shading from the light at the
    /// entity's origin.
    pub fn new(mut light: Vec3, flags: RenderFx, time: f32, axes: &(Vec3, Vec3, Vec3)) -> Self {
        if flags.contains(RenderFx::FULLBRIGHT) {
            light = [1.0; 3];
        }

        let lightlevel = flags.contains(RenderFx::WEAPONMODEL).then(|| 150.0 * light[0]);

        if flags.contains(RenderFx::MINLIGHT) {
            for c in light.iter_mut() {
                if *c < 0.1 {
                    *c = 0.1;
                }
            }
        }

        // bonus items pulse
        if flags.contains(RenderFx::GLOW) {
            let scale = 0.1 * (time * 7.0).sin();
            for c in light.iter_mut() {
                let min = *c * 0.8;
                *c += scale;
                if *c < min {
                    *c = min;
                }
            }
        }

        let j = ((light[0] + light[1] + light[2]) * 0.3333 * 255.0) as i32;
        let ambientlight = j.min(128);
        let mut shadelight = j;
        if ambientlight + shadelight > 192 {
            shadelight = 192 - ambientlight;
        }

        let mut ambient = ambientlight.max(LIGHT_MIN);
        ambient = ((255 - ambient) << VID_CBITS).max(LIGHT_MIN);
        let shade = shadelight.max(0) * VID_GRADES;

        let (f, r, u) = axes;
        Self {
            ambient,
            shade,
            lightvec: [
                dot_product(&ALIAS_LIGHTVEC, f),
                -dot_product(&ALIAS_LIGHTVEC, r),
                dot_product(&ALIAS_LIGHTVEC, u),
            ],
            lightlevel,
        }
    }

    /// Colormap offset for a vertex with model-space `normal`.
    #[inline]
    pub fn vertex_light(&self, normal: &Vec3) -> i32 {
        let lightcos = dot_product(normal, &self.lightvec);
        let mut temp = self.ambient;
        if lightcos < 0.0 {
            temp += (self.shade as f32 * lightcos) as i32;
            if temp < 0 {
                temp = 0;
            }
        }
        temp
    }
}

/// Model-space bounds covering both lerp frames.
fn lerped_bounds(frame: &AliasFrame, oldframe: &AliasFrame) -> (Vec3, Vec3) {
    let mut mins = [f32::MAX; 3];
    let mut maxs = [f32::MIN; 3];
    for f in [frame, oldframe] {
        for i in 0..3 {
            let a = f.translate[i];
            let b = f.translate[i] + f.scale[i] * 255.0;
            mins[i] = mins[i].min(a.min(b));
            maxs[i] = maxs[i].max(a.max(b));
        }
    }
    (mins, maxs)
}

#[inline]
fn model_to_world(p: &Vec3, origin: &Vec3, axes: &(Vec3, Vec3, Vec3)) -> Vec3 {
    let (f, r, u) = axes;
    let mut out = vector_ma(origin, p[0], f);
    out = vector_ma(&out, -p[1], r);
    vector_ma(&out, p[2], u)
}

/// True when the lerped frame box is entirely outside one frustum plane
/// or behind the eye.
pub fn frame_culled(view: &ViewState, e: &Entity, frame: &AliasFrame, oldframe: &AliasFrame, axes: &(Vec3, Vec3, Vec3)) -> bool {
    let (mins, maxs) = lerped_bounds(frame, oldframe);
    let mut corners = [[0.0f32; 3]; 8];
    for (i, c) in corners.iter_mut().enumerate() {
        let p = [
            if i & 1 != 0 { maxs[0] } else { mins[0] },
            if i & 2 != 0 { maxs[1] } else { mins[1] },
            if i & 4 != 0 { maxs[2] } else { mins[2] },
        ];
        *c = model_to_world(&p, &e.origin, axes);
    }

    for plane in &view.clip_planes {
        if corners.iter().all(|c| plane.distance(c) < 0.0) {
            return true;
        }
    }
    corners.iter().all(|c| view.world.transform_point(c)[2] < NEAR_CLIP)
}

/// Screen-space facing test on the three view-space corners.
fn faces_viewer(view: &ViewState, a: &Vec3, b: &Vec3, c: &Vec3) -> bool {
    let proj = |p: &Vec3| {
        let zi = 1.0 / p[2].max(NEAR_CLIP);
        (view.xscale * zi * p[0], -view.yscale * zi * p[1])
    };
    let (ua, va) = proj(a);
    let (ub, vb) = proj(b);
    let (uc, vc) = proj(c);
    let xdenom = (uc - ua) * (vc - vb) - (uc - ub) * (vc - va);
    xdenom < 0.0
}

/// Everything needed to draw alias entities for one frame.
pub struct AliasDrawer<'a> {
    pub view: &'a ViewState,
    pub fd: &'a RefDef,
    pub world: Option<&'a BspWorld>,
    pub images: &'a [Image],
    pub colormap: &'a [u8],
    pub alphamap: &'a [u8],
    pub lerpmodels: bool,
    pub modulate: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasReport {
    pub drawn: bool,
    pub lightlevel: Option<f32>,
    pub warnings: Vec<String>,
}

impl AliasDrawer<'_> {
    pub fn draw(
        &self,
        rast: &mut PolyRasterizer,
        target: &mut FrameTarget,
        verts: &mut Pool<PolyVert>,
        e: &Entity,
        name: &str,
        model: &AliasModel,
    ) -> AliasReport {
        let mut report = AliasReport::default();
        let numframes = model.frames.len() as i32;
        if numframes == 0 {
            return report;
        }

        let mut frame = e.frame;
        if frame < 0 || frame >= numframes {
            report.warnings.push(format!("R_AliasSetupFrames {}: no such thisframe {}\n", name, frame));
            frame = 0;
        }
        let mut oldframe = e.oldframe;
        if oldframe < 0 || oldframe >= numframes {
            report.warnings.push(format!("R_AliasSetupFrames {}: no such lastframe {}\n", name, oldframe));
            oldframe = 0;
        }
        let frame = &model.frames[frame as usize];
        let oldframe = &model.frames[oldframe as usize];

        let axes = alias_axes(&e.angles);
        if frame_culled(self.view, e, frame, oldframe, &axes) {
            return report;
        }

        let skin = match e.skin {
            Some(h) => Some(h),
            None => {
                let mut skinnum = e.skinnum;
                if skinnum < 0 || skinnum as usize >= model.skins.len() {
                    report.warnings.push(format!("R_AliasSetupSkin {}: no such skin # {}\n", name, skinnum));
                    skinnum = 0;
                }
                model.skins.get(skinnum as usize).copied().flatten()
            }
        };
        let Some(skin) = skin.and_then(|h| self.images.get(h)) else {
            report.warnings.push(format!("R_AliasDrawModel {}: NULL skin found\n", name));
            return report;
        };

        let light = match self.world {
            Some(world) if !e.flags.contains(RenderFx::FULLBRIGHT) => light_point(world, self.fd, &e.origin, self.modulate),
            _ => [1.0; 3],
        };
        let lighting = AliasLighting::new(light, e.flags, self.fd.time, &axes);
        report.lightlevel = lighting.lightlevel;

        let numverts = model.num_verts();
        let Some(first) = verts.alloc_run(numverts) else {
            return report;
        };
        let first = first as usize;

        let backlerp = if self.lerpmodels { e.backlerp } else { 0.0 };
        let frontlerp = 1.0 - backlerp;
        let mut translate = [0.0f32; 3];
        let mut frontscale = [0.0f32; 3];
        let mut backscale = [0.0f32; 3];
        for i in 0..3 {
            translate[i] = backlerp * oldframe.translate[i] + frontlerp * frame.translate[i];
            frontscale[i] = frontlerp * frame.scale[i];
            backscale[i] = backlerp * oldframe.scale[i];
        }

        let pool = &mut verts.as_mut_slice()[first..first + numverts];
        for (i, out) in pool.iter_mut().enumerate() {
            let Some(v) = frame.verts.get(i) else {
                continue;
            };
            let ov = oldframe.verts.get(i).unwrap_or(v);
            let mut p = [0.0f32; 3];
            for k in 0..3 {
                p[k] = translate[k] + ov.v[k] as f32 * backscale[k] + v.v[k] as f32 * frontscale[k];
            }
            let world = model_to_world(&p, &e.origin, &axes);
            *out = PolyVert {
                pos: self.view.world.transform_point(&world),
                s: 0.0,
                t: 0.0,
                l: lighting.vertex_light(&v.normal) as f32,
            };
        }

        let alpha = if e.flags.contains(RenderFx::TRANSLUCENT) { e.alpha } else { 1.0 };
        let style = PolyStyle { blend: Blend::for_translucency(alpha), alphamap: self.alphamap, write_z: true };

        let (_, iw, ih) = skin.mip(0);
        let sscale = if model.skinwidth > 0 { iw as f32 / model.skinwidth as f32 } else { 1.0 };
        let tscale = if model.skinheight > 0 { ih as f32 / model.skinheight as f32 } else { 1.0 };
        let colormap = self.colormap;

        for tri in &model.triangles {
            let mut corners = [PolyVert::default(); 3];
            let mut ok = true;
            for k in 0..3 {
                let (Some(pv), Some(st)) = (pool.get(tri.index_xyz[k] as usize), model.st.get(tri.index_st[k] as usize)) else {
                    ok = false;
                    break;
                };
                corners[k] = PolyVert { s: st[0] as f32 * sscale, t: st[1] as f32 * tscale, ..*pv };
            }
            if !ok || !faces_viewer(self.view, &corners[0].pos, &corners[1].pos, &corners[2].pos) {
                continue;
            }
            rast.draw(target, self.view, &corners, &style, |s, t, l| {
                let texel = wrapped_texel(skin, s, t) as usize;
                let row = (l as i32 & 0xFF00) as usize;
                Some(colormap.get(row + texel).copied().unwrap_or(texel as u8))
            });
        }

        report.drawn = true;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sw_model_types::{AliasTriangle, AliasVertex, ImageType};

    const IDENTITY: (Vec3, Vec3, Vec3) = ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]);

    fn view() -> ViewState {
        let mut view = ViewState::default();
        view.setup(VRect { x: 0, y: 0, width: 32, height: 32 }, 90.0, &[0.0; 3], &[0.0; 3]);
        view
    }

    /// Colormap where every light row maps a colour to itself.
    fn identity_colormap() -> Vec<u8> {
        (0..64 * 256).map(|i| (i & 0xFF) as u8).collect()
    }

    fn skin(fill: u8) -> Image {
        Image {
            name: "models/test/skin.pcx".into(),
            kind: ImageType::Skin,
            width: 8,
            height: 8,
            mips: vec![vec![fill; 64]],
            transparent: false,
            registration_sequence: 1,
        }
    }

    /// One big triangle standing upright, facing -x.
    fn model(index_xyz: [u16; 3]) -> AliasModel {
        let vert = |v: [u8; 3]| AliasVertex { v, normal: [-1.0, 0.0, 0.0] };
        AliasModel {
            skinwidth: 8,
            skinheight: 8,
            st: vec![[0, 0], [8, 0], [0, 8]],
            triangles: vec![AliasTriangle { index_xyz, index_st: [0, 1, 2] }],
            frames: vec![AliasFrame {
                name: "stand01".into(),
                scale: [1.0; 3],
                translate: [0.0, -10.0, -10.0],
                verts: vec![vert([0, 0, 0]), vert([0, 40, 0]), vert([0, 0, 40])],
            }],
            skin_names: vec!["models/test/skin.pcx".into()],
            skins: vec![Some(0)],
        }
    }

    fn drawer<'a>(view: &'a ViewState, fd: &'a RefDef, images: &'a [Image], colormap: &'a [u8]) -> AliasDrawer<'a> {
        AliasDrawer {
            view,
            fd,
            world: None,
            images,
            colormap,
            alphamap: &[],
            lerpmodels: true,
            modulate: 1.0,
        }
    }

    // ============================================================
    // Lighting
    // ============================================================

    #[test]
    fn test_fullbright_lighting_clamps_shade() {
        let l = AliasLighting::new([0.2; 3], RenderFx::FULLBRIGHT, 0.0, &IDENTITY);
        assert_eq!(l.ambient, (255 - 128) << VID_CBITS);
        assert_eq!(l.shade, 64 * VID_GRADES);
        assert_eq!(l.lightlevel, None);
    }

    #[test]
    fn test_minlight_floor() {
        let l = AliasLighting::new([0.0; 3], RenderFx::MINLIGHT, 0.0, &IDENTITY);
        assert_eq!(l.ambient, (255 - 25) << VID_CBITS);
        assert_eq!(l.shade, 25 * VID_GRADES);
    }

    #[test]
    fn test_weapon_model_reports_light_level() {
        let l = AliasLighting::new([0.5; 3], RenderFx::WEAPONMODEL, 0.0, &IDENTITY);
        assert_eq!(l.lightlevel, Some(75.0));
    }

    #[test]
    fn test_vertex_light_brightens_facing_normals() {
        let l = AliasLighting::new([0.5; 3], RenderFx::empty(), 0.0, &IDENTITY);
        assert_eq!(l.lightvec, [-1.0, 0.0, 0.0]);
        let lit = l.vertex_light(&[1.0, 0.0, 0.0]);
        let unlit = l.vertex_light(&[-1.0, 0.0, 0.0]);
        assert_eq!(unlit, l.ambient);
        assert!(lit < unlit);
        assert!(lit >= 0);
    }

    // ============================================================
    // Drawing
    // ============================================================

    #[test]
    fn test_draws_and_writes_z() {
        let view = view();
        let fd = RefDef::default();
        let images = [skin(7)];
        let colormap = identity_colormap();
        let (mut pixels, mut zbuffer) = (vec![0u8; 32 * 32], vec![0u16; 32 * 32]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 32 };
        let mut pool: Pool<PolyVert> = Pool::new("verts", MAXALIASVERTS, 0);
        pool.reserve(0);
        let e = Entity { origin: [50.0, 0.0, 0.0], alpha: 1.0, flags: RenderFx::FULLBRIGHT, ..Default::default() };

        let report = drawer(&view, &fd, &images, &colormap).draw(
            &mut PolyRasterizer::new(),
            &mut target,
            &mut pool,
            &e,
            "models/test/tris.md2",
            &model([0, 2, 1]),
        );
        assert!(report.drawn);
        assert!(report.warnings.is_empty());
        assert_eq!(pool.used(), 3);
        assert_eq!(pixels[16 * 32 + 16], 7);
        assert!(zbuffer[16 * 32 + 16] > 0);
    }

    #[test]
    fn test_back_facing_triangle_is_skipped() {
        let view = view();
        let fd = RefDef::default();
        let images = [skin(7)];
        let colormap = identity_colormap();
        let (mut pixels, mut zbuffer) = (vec![0u8; 32 * 32], vec![0u16; 32 * 32]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 32 };
        let mut pool: Pool<PolyVert> = Pool::new("verts", MAXALIASVERTS, 0);
        pool.reserve(0);
        let e = Entity { origin: [50.0, 0.0, 0.0], alpha: 1.0, flags: RenderFx::FULLBRIGHT, ..Default::default() };
        drawer(&view, &fd, &images, &colormap).draw(
            &mut PolyRasterizer::new(),
            &mut target,
            &mut pool,
            &e,
            "models/test/tris.md2",
            &model([0, 1, 2]),
        );
        assert!(pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_bad_frame_falls_back_with_warning() {
        let view = view();
        let fd = RefDef::default();
        let images = [skin(7)];
        let colormap = identity_colormap();
        let (mut pixels, mut zbuffer) = (vec![0u8; 32 * 32], vec![0u16; 32 * 32]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 32 };
        let mut pool: Pool<PolyVert> = Pool::new("verts", MAXALIASVERTS, 0);
        pool.reserve(0);
        let e = Entity { origin: [50.0, 0.0, 0.0], frame: 9, alpha: 1.0, ..Default::default() };
        let report = drawer(&view, &fd, &images, &colormap).draw(
            &mut PolyRasterizer::new(),
            &mut target,
            &mut pool,
            &e,
            "models/test/tris.md2",
            &model([0, 2, 1]),
        );
        assert!(report.drawn);
        assert_eq!(report.warnings, vec!["R_AliasSetupFrames models/test/tris.md2: no such thisframe 9\n".to_string()]);
    }

    #[test]
    fn test_model_behind_eye_is_culled() {
        let view = view();
        let fd = RefDef::default();
        let images = [skin(7)];
        let colormap = identity_colormap();
        let (mut pixels, mut zbuffer) = (vec![0u8; 32 * 32], vec![0u16; 32 * 32]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 32 };
        let mut pool: Pool<PolyVert> = Pool::new("verts", MAXALIASVERTS, 0);
        pool.reserve(0);
        let e = Entity { origin: [-300.0, 0.0, 0.0], alpha: 1.0, ..Default::default() };
        let report = drawer(&view, &fd, &images, &colormap).draw(
            &mut PolyRasterizer::new(),
            &mut target,
            &mut pool,
            &e,
            "models/test/tris.md2",
            &model([0, 2, 1]),
        );
        assert!(!report.drawn);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_vertex_pool_overflow_skips_model() {
        let view = view();
        let fd = RefDef::default();
        let images = [skin(7)];
        let colormap = identity_colormap();
        let (mut pixels, mut zbuffer) = (vec![0u8; 32 * 32], vec![0u16; 32 * 32]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 32 };
        let mut pool: Pool<PolyVert> = Pool::new("verts", 2, 0);
        pool.reserve(0);
        let e = Entity { origin: [50.0, 0.0, 0.0], alpha: 1.0, flags: RenderFx::FULLBRIGHT, ..Default::default() };
        let report = drawer(&view, &fd, &images, &colormap).draw(
            &mut PolyRasterizer::new(),
            &mut target,
            &mut pool,
            &e,
            "models/test/tris.md2",
            &model([0, 2, 1]),
        );
        assert!(!report.drawn);
        assert_eq!(pool.overflow(), 3);
        assert!(pixels.iter().all(|&p| p == 0));
    }
}
