// sw_scan.rs — Span drawing for edge-sorted surfaces
//
// Every surface that came out of the edge sweep with spans is drawn here:
// texture-mapped and lit world faces, turbulent water, the sky box, the
// background and the flat-shaded debug view. Texture coordinates are
// perspective correct every 16 pixels and affine in between.

use q2soft_common::q_shared::*;

use crate::sw_edge::{span_iter, Span, Surf, SurfSource};
use crate::sw_light::{build_light_block, LightBlock, LightParams};
use crate::sw_local::*;
use crate::sw_model_types::{BspWorld, Image, ImageHandle};
use crate::sw_refdef::RefDef;
use crate::sw_sky::SkyState;

/// The 8-bit colour buffer being drawn into and its depth buffer. Both
/// share `stride`.
pub struct FrameTarget<'a> {
    pub pixels: &'a mut [u8],
    pub zbuffer: &'a mut [u16],
    pub stride: usize,
}

impl FrameTarget<'_> {
    #[inline]
    pub fn offset(&self, x: i32, y: i32) -> usize {
        y as usize * self.stride + x as usize
    }
}

/// Depth value stored for a 1/z of `zi`.
#[inline]
pub fn zi_to_depth(zi: f32) -> i32 {
    (zi * 0x8000 as f32) as i32
}

// ============================================================
// Gradients
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpanGradients {
    pub sdivzstepu: f32,
    pub tdivzstepu: f32,
    pub sdivzstepv: f32,
    pub tdivzstepv: f32,
    pub sdivzorigin: f32,
    pub tdivzorigin: f32,
    pub zistepu: f32,
    pub zistepv: f32,
    pub ziorigin: f32,
    pub sadjust: i32,
    pub tadjust: i32,
    pub bbextents: i32,
    pub bbextentt: i32,
}

/// Texture mapping of one face, wherever it came from.
#[derive(Debug, Clone, Copy)]
pub struct FaceTexture {
    pub vecs: [[f32; 4]; 2],
    pub texturemins: [i32; 2],
    pub extents: [i32; 2],
    pub flags: SurfFlags,
}

/// Screen-space s/z and t/z gradients for `tex` seen through `basis` at
/// mip level `mip`.
pub fn calc_gradients(view: &ViewState, basis: &ViewBasis, surf: &Surf, tex: &FaceTexture, mip: usize, time: f32) -> SpanGradients {
    let mipscale = 1.0 / (1 << mip) as f32;
    let saxis = basis.transform_vector(&[tex.vecs[0][0], tex.vecs[0][1], tex.vecs[0][2]]);
    let taxis = basis.transform_vector(&[tex.vecs[1][0], tex.vecs[1][1], tex.vecs[1][2]]);

    let mut g = SpanGradients {
        zistepu: surf.d_zistepu,
        zistepv: surf.d_zistepv,
        ziorigin: surf.d_ziorigin,
        ..Default::default()
    };

    let t = view.xscaleinv * mipscale;
    g.sdivzstepu = saxis[0] * t;
    g.tdivzstepu = taxis[0] * t;
    let t = view.yscaleinv * mipscale;
    g.sdivzstepv = -saxis[1] * t;
    g.tdivzstepv = -taxis[1] * t;
    g.sdivzorigin = saxis[2] * mipscale - view.xcenter * g.sdivzstepu - view.ycenter * g.sdivzstepv;
    g.tdivzorigin = taxis[2] * mipscale - view.xcenter * g.tdivzstepu - view.ycenter * g.tdivzstepv;

    let modelorg = vector_scale(&basis.origin, mipscale);
    let t = 0x10000 as f32 * mipscale;
    let s_eye = dot_product(&modelorg, &[tex.vecs[0][0], tex.vecs[0][1], tex.vecs[0][2]]);
    let t_eye = dot_product(&modelorg, &[tex.vecs[1][0], tex.vecs[1][1], tex.vecs[1][2]]);
    g.sadjust = (s_eye * 0x10000 as f32 + 0.5) as i32 - ((tex.texturemins[0] << 16) >> mip) + (tex.vecs[0][3] * t) as i32;
    g.tadjust = (t_eye * 0x10000 as f32 + 0.5) as i32 - ((tex.texturemins[1] << 16) >> mip) + (tex.vecs[1][3] * t) as i32;

    // flowing textures scroll along s
    if tex.flags.contains(SurfFlags::FLOWING) {
        let rate = if tex.flags.contains(SurfFlags::WARP) { 0.25 } else { 0.77 };
        let phase = time * rate;
        g.sadjust += (0x10000 as f32 * (-128.0 * (phase - phase.trunc()))) as i32;
    }

    g.bbextents = ((tex.extents[0] << 16) >> mip) - 1;
    g.bbextentt = ((tex.extents[1] << 16) >> mip) - 1;
    g
}

// ============================================================
// Span rasterization
// ============================================================

#[inline]
fn clamp_next(v: i32, extent: i32) -> i32 {
    // prevent round-off on negative steps from running off the texture
    if v > extent {
        extent
    } else if v < 16 {
        16
    } else {
        v
    }
}

/// Draw perspective-correct spans, asking `sample` for the texel at each
/// 16.16 (s, t).
pub fn draw_spans16<'s, F>(target: &mut FrameTarget, g: &SpanGradients, spans: impl Iterator<Item = &'s Span>, mut sample: F)
where
    F: FnMut(i32, i32) -> u8,
{
    let sdivz16stepu = g.sdivzstepu * 16.0;
    let tdivz16stepu = g.tdivzstepu * 16.0;
    let zi16stepu = g.zistepu * 16.0;
    let bbextents = g.bbextents.max(0);
    let bbextentt = g.bbextentt.max(0);

    for span in spans {
        if span.count <= 0 {
            continue;
        }
        let mut dest = target.offset(span.u, span.v);
        let mut count = span.count;

        let du = span.u as f32;
        let dv = span.v as f32;
        let mut sdivz = g.sdivzorigin + dv * g.sdivzstepv + du * g.sdivzstepu;
        let mut tdivz = g.tdivzorigin + dv * g.tdivzstepv + du * g.tdivzstepu;
        let mut zi = g.ziorigin + dv * g.zistepv + du * g.zistepu;
        // prescale to 16.16
        let mut z = 0x10000 as f32 / zi;

        let mut s = ((sdivz * z) as i32).saturating_add(g.sadjust).clamp(0, bbextents);
        let mut t = ((tdivz * z) as i32).saturating_add(g.tadjust).clamp(0, bbextentt);

        while count > 0 {
            let spancount = count.min(16);
            count -= spancount;

            let (snext, tnext, sstep, tstep);
            if count > 0 {
                sdivz += sdivz16stepu;
                tdivz += tdivz16stepu;
                zi += zi16stepu;
                z = 0x10000 as f32 / zi;
                snext = clamp_next(((sdivz * z) as i32).saturating_add(g.sadjust), bbextents);
                tnext = clamp_next(((tdivz * z) as i32).saturating_add(g.tadjust), bbextentt);
                sstep = (snext - s) >> 4;
                tstep = (tnext - t) >> 4;
            } else {
                // evaluate at the last pixel so the end lands exactly
                let m1 = (spancount - 1) as f32;
                sdivz += g.sdivzstepu * m1;
                tdivz += g.tdivzstepu * m1;
                zi += g.zistepu * m1;
                z = 0x10000 as f32 / zi;
                snext = clamp_next(((sdivz * z) as i32).saturating_add(g.sadjust), bbextents);
                tnext = clamp_next(((tdivz * z) as i32).saturating_add(g.tadjust), bbextentt);
                if spancount > 1 {
                    sstep = (snext - s) / (spancount - 1);
                    tstep = (tnext - t) / (spancount - 1);
                } else {
                    sstep = 0;
                    tstep = 0;
                }
            }

            let mut ss = s;
            let mut tt = t;
            for _ in 0..spancount {
                if let Some(p) = target.pixels.get_mut(dest) {
                    *p = sample(ss, tt);
                }
                dest += 1;
                ss = ss.wrapping_add(sstep);
                tt = tt.wrapping_add(tstep);
            }

            s = snext;
            t = tnext;
        }
    }
}

/// Write 1/z for every pixel of the spans.
pub fn draw_z_spans<'s>(target: &mut FrameTarget, zistepu: f32, zistepv: f32, ziorigin: f32, spans: impl Iterator<Item = &'s Span>) {
    const ZSCALE: f64 = 0x8000 as f64 * 0x10000 as f64;
    let izistep = (zistepu as f64 * ZSCALE) as i64;

    for span in spans {
        let dest = target.offset(span.u, span.v);
        let zi = ziorigin + span.v as f32 * zistepv + span.u as f32 * zistepu;
        let mut izi = (zi as f64 * ZSCALE) as i64;
        let end = (dest + span.count.max(0) as usize).min(target.zbuffer.len());
        for z in target.zbuffer.iter_mut().take(end).skip(dest) {
            *z = (izi >> 16).clamp(0, 0xFFFF) as u16;
            izi += izistep;
        }
    }
}

/// Flat fill.
pub fn draw_solid_spans<'s>(target: &mut FrameTarget, color: u8, spans: impl Iterator<Item = &'s Span>) {
    for span in spans {
        let dest = target.offset(span.u, span.v);
        let end = (dest + span.count.max(0) as usize).min(target.pixels.len());
        if dest < end {
            target.pixels[dest..end].fill(color);
        }
    }
}

/// Texel of a 64x64 turbulent texture at (s, t), warped by `turb`.
#[inline]
pub fn turb_sample(pbase: &[u8], turb: &[i32], s: i32, t: i32) -> u8 {
    let cycle_mask = CYCLE as i32 - 1;
    let ts = turb.get(((t >> 16) & cycle_mask) as usize).copied().unwrap_or(0);
    let tt = turb.get(((s >> 16) & cycle_mask) as usize).copied().unwrap_or(0);
    let sturb = ((s.wrapping_add(ts)) >> 16) & 63;
    let tturb = ((t.wrapping_add(tt)) >> 16) & 63;
    pbase.get(((tturb << 6) + sturb) as usize).copied().unwrap_or(0)
}

// ============================================================
// Mip selection
// ============================================================

const BASEMIP: [f32; 3] = [1.0, 0.5 * 0.8, 0.25 * 0.8];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    pub drawflat: bool,
    pub clearcolor: i32,
    pub fullbright: bool,
    pub modulate: f32,
    pub scalemip: [f32; 3],
    pub minmip: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::new(false, 2, false, 1.0, 1.0, 0)
    }
}

impl ScanSettings {
    pub fn new(drawflat: bool, clearcolor: i32, fullbright: bool, modulate: f32, mipscale: f32, mipcap: i32) -> Self {
        Self {
            drawflat,
            clearcolor,
            fullbright,
            modulate,
            scalemip: BASEMIP.map(|b| b * mipscale),
            minmip: mipcap.clamp(0, NUM_MIPS as i32 - 1) as usize,
        }
    }

    pub fn mip_level_for_scale(&self, scale: f32) -> usize {
        let level = self.scalemip.iter().position(|&m| scale >= m).unwrap_or(NUM_MIPS - 1);
        level.max(self.minmip)
    }
}

// ============================================================
// Lit surface blocks
// ============================================================

/// Light a face's texture at `mip` into `out`, returning its width and
/// height in texels.
pub fn build_lit_block(
    world: &BspWorld,
    face: usize,
    mip: usize,
    image: &Image,
    colormap: &[u8],
    light: &LightBlock,
    out: &mut Vec<u8>,
) -> (i32, i32) {
    let Some(surf) = world.surfaces.get(face) else {
        out.clear();
        return (0, 0);
    };
    let width = (surf.extents[0] >> mip).max(1);
    let height = (surf.extents[1] >> mip).max(1);
    let (texels, tw, th) = image.mip(mip);
    let smin = surf.texturemins[0] >> mip;
    let tmin = surf.texturemins[1] >> mip;

    out.clear();
    out.reserve((width * height) as usize);
    for y in 0..height {
        let ty = (tmin + y).rem_euclid(th.max(1));
        for x in 0..width {
            let tx = (smin + x).rem_euclid(tw.max(1));
            let texel = texels.get((ty * tw + tx) as usize).copied().unwrap_or(0);
            let l = light.sample(x << mip, y << mip);
            let idx = (l & 0xFF00) as usize + texel as usize;
            out.push(colormap.get(idx).copied().unwrap_or(texel));
        }
    }
    (width, height)
}

// ============================================================
// D_DrawSurfaces
// ============================================================

/// Everything needed to turn a batch of spans into pixels.
pub struct SurfaceDrawer<'a> {
    pub view: &'a ViewState,
    pub bases: &'a [ViewBasis],
    pub world: Option<&'a BspWorld>,
    pub images: &'a [Image],
    pub notexture: Option<ImageHandle>,
    pub sky: &'a SkyState,
    pub colormap: &'a [u8],
    pub fd: &'a RefDef,
    pub sintable: &'a [i32],
    pub settings: ScanSettings,
    pub framecount: i32,
    light: LightBlock,
    block: Vec<u8>,
    pub c_surf: usize,
}

impl<'a> SurfaceDrawer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        view: &'a ViewState,
        bases: &'a [ViewBasis],
        world: Option<&'a BspWorld>,
        images: &'a [Image],
        notexture: Option<ImageHandle>,
        sky: &'a SkyState,
        colormap: &'a [u8],
        fd: &'a RefDef,
        sintable: &'a [i32],
        settings: ScanSettings,
        framecount: i32,
    ) -> Self {
        Self {
            view,
            bases,
            world,
            images,
            notexture,
            sky,
            colormap,
            fd,
            sintable,
            settings,
            framecount,
            light: LightBlock::default(),
            block: Vec::new(),
            c_surf: 0,
        }
    }

    fn image(&self, handle: Option<ImageHandle>) -> Option<&'a Image> {
        let images = self.images;
        handle.or(self.notexture).and_then(|h| images.get(h))
    }

    fn basis(&self, idx: u32) -> ViewBasis {
        self.bases.get(idx as usize).copied().unwrap_or(self.view.world)
    }

    /// Draw every surface in `surfs` that has spans.
    pub fn draw_surfaces(&mut self, target: &mut FrameTarget, surfs: &[Surf], spans: &[Span]) {
        for surf in surfs.iter().skip(SURF_BACKGROUND as usize) {
            if surf.spans == NONE_INDEX {
                continue;
            }
            self.c_surf += 1;
            let list = || span_iter(spans, surf.spans);

            if surf.flags & SURF_DRAWBACKGROUND != 0 {
                draw_solid_spans(target, (self.settings.clearcolor & 0xFF) as u8, list());
                draw_z_spans(target, 0.0, 0.0, -0.9, list());
                continue;
            }

            if self.settings.drawflat {
                let color = match surf.source {
                    SurfSource::World(f) => f & 0xFF,
                    SurfSource::Sky(s) => s as u32,
                    SurfSource::None => 0,
                };
                draw_solid_spans(target, color as u8, list());
                draw_z_spans(target, surf.d_zistepu, surf.d_zistepv, surf.d_ziorigin, list());
                continue;
            }

            if surf.flags & SURF_DRAWSKYBOX != 0 {
                self.draw_sky_surface(target, surf, spans);
            } else if surf.flags & SURF_DRAWTURB != 0 {
                self.draw_turbulent_surface(target, surf, spans);
            } else {
                self.draw_lit_surface(target, surf, spans);
            }
        }
    }

    fn draw_sky_surface(&mut self, target: &mut FrameTarget, surf: &Surf, spans: &[Span]) {
        let SurfSource::Sky(side) = surf.source else {
            return;
        };
        let Some(tex) = self.sky.face_tex(side) else {
            return;
        };
        let Some(image) = self.image(tex.image) else {
            return;
        };
        let face = FaceTexture {
            vecs: tex.vecs,
            texturemins: tex.texturemins,
            extents: tex.extents,
            flags: SurfFlags::empty(),
        };
        let g = calc_gradients(self.view, &self.view.world, surf, &face, 0, self.fd.time);
        let (pixels, width, _) = image.mip(0);
        draw_spans16(target, &g, span_iter(spans, surf.spans), |s, t| {
            pixels.get(((s >> 16) + (t >> 16) * width) as usize).copied().unwrap_or(0)
        });
        // the sky is infinitely far away
        draw_z_spans(target, 0.0, 0.0, -0.9, span_iter(spans, surf.spans));
    }

    fn world_face(&self, surf: &Surf) -> Option<(&'a BspWorld, usize, FaceTexture, Option<ImageHandle>, f32)> {
        let SurfSource::World(face) = surf.source else {
            return None;
        };
        let world = self.world?;
        let msurf = world.surfaces.get(face as usize)?;
        let ti = world.texinfo.get(msurf.texinfo)?;
        let tex = FaceTexture {
            vecs: ti.vecs,
            texturemins: msurf.texturemins,
            extents: msurf.extents,
            flags: ti.flags,
        };
        Some((world, face as usize, tex, ti.image, ti.mipadjust))
    }

    fn draw_turbulent_surface(&mut self, target: &mut FrameTarget, surf: &Surf, spans: &[Span]) {
        let Some((_, _, tex, handle, _)) = self.world_face(surf) else {
            return;
        };
        let Some(image) = self.image(handle) else {
            return;
        };
        let basis = self.basis(surf.basis);
        let g = calc_gradients(self.view, &basis, surf, &tex, 0, self.fd.time);
        let (pbase, _, _) = image.mip(0);
        let phase = ((self.fd.time * SPEED) as i32 & (CYCLE as i32 - 1)) as usize;
        let turb = self.sintable.get(phase..).unwrap_or(&[]);
        draw_spans16(target, &g, span_iter(spans, surf.spans), |s, t| turb_sample(pbase, turb, s, t));
        draw_z_spans(target, surf.d_zistepu, surf.d_zistepv, surf.d_ziorigin, span_iter(spans, surf.spans));
    }

    fn draw_lit_surface(&mut self, target: &mut FrameTarget, surf: &Surf, spans: &[Span]) {
        let Some((world, face, tex, handle, mipadjust)) = self.world_face(surf) else {
            return;
        };
        let Some(image) = self.image(handle) else {
            return;
        };

        let scale_for_mip = self.view.xscale.max(self.view.yscale);
        let mip = self.settings.mip_level_for_scale(surf.nearzi * scale_for_mip * mipadjust);

        let offset = surf
            .entity
            .and_then(|e| self.fd.entities.get(e as usize))
            .map_or([0.0; 3], |e| e.origin);
        let params = LightParams {
            fd: self.fd,
            modulate: self.settings.modulate,
            fullbright: self.settings.fullbright,
            framecount: self.framecount,
            offset,
        };
        build_light_block(world, face, &params, &mut self.light);
        let mut block = std::mem::take(&mut self.block);
        let (width, _) = build_lit_block(world, face, mip, image, self.colormap, &self.light, &mut block);

        let basis = self.basis(surf.basis);
        let g = calc_gradients(self.view, &basis, surf, &tex, mip, self.fd.time);
        draw_spans16(target, &g, span_iter(spans, surf.spans), |s, t| {
            block.get(((s >> 16) + (t >> 16) * width) as usize).copied().unwrap_or(0)
        });
        draw_z_spans(target, surf.d_zistepu, surf.d_zistepv, surf.d_ziorigin, span_iter(spans, surf.spans));
        self.block = block;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sw_model_types::*;

    fn buffers(w: usize, h: usize) -> (Vec<u8>, Vec<u16>) {
        (vec![0; w * h], vec![0; w * h])
    }

    fn span(u: i32, v: i32, count: i32) -> Span {
        Span { u, v, count, next: NONE_INDEX }
    }

    // ============================================================
    // Span primitives
    // ============================================================

    #[test]
    fn test_affine_chunks_hit_every_texel() {
        let (mut pixels, mut zbuffer) = buffers(64, 2);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 64 };
        // s = u texels, 1/z = 1
        let g = SpanGradients {
            sdivzstepu: 1.0,
            ziorigin: 1.0,
            bbextents: 64 << 16,
            bbextentt: 64 << 16,
            ..Default::default()
        };
        let spans = [span(0, 1, 40)];
        draw_spans16(&mut target, &g, spans.iter(), |s, _| (s >> 16) as u8);
        for x in 0..40 {
            assert_eq!(pixels[64 + x], x as u8);
        }
        assert_eq!(pixels[64 + 40], 0);
    }

    #[test]
    fn test_z_spans_store_scaled_inverse_depth() {
        let (mut pixels, mut zbuffer) = buffers(8, 1);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 8 };
        let spans = [span(2, 0, 3)];
        draw_z_spans(&mut target, 0.0, 0.0, 0.5, spans.iter());
        assert_eq!(&zbuffer[..], &[0, 0, 0x4000, 0x4000, 0x4000, 0, 0, 0]);
    }

    #[test]
    fn test_negative_zi_stores_zero() {
        let (mut pixels, mut zbuffer) = (vec![0u8; 4], vec![7u16; 4]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 4 };
        draw_z_spans(&mut target, 0.0, 0.0, -0.9, [span(0, 0, 4)].iter());
        assert!(zbuffer.iter().all(|&z| z == 0));
    }

    #[test]
    fn test_solid_spans_clip_to_buffer() {
        let (mut pixels, mut zbuffer) = buffers(4, 1);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 4 };
        draw_solid_spans(&mut target, 9, [span(2, 0, 10)].iter());
        assert_eq!(pixels, vec![0, 0, 9, 9]);
    }

    #[test]
    fn test_turb_sample_without_warp_is_tiled() {
        let pbase: Vec<u8> = (0..64 * 64).map(|i| (i % 251) as u8).collect();
        let turb = vec![0; 256];
        let s = 70 << 16;
        let t = 3 << 16;
        assert_eq!(turb_sample(&pbase, &turb, s, t), pbase[3 * 64 + 6]);
    }

    // ============================================================
    // Mips and gradients
    // ============================================================

    #[test]
    fn test_mip_level_for_scale() {
        let settings = ScanSettings::default();
        assert_eq!(settings.mip_level_for_scale(2.0), 0);
        assert_eq!(settings.mip_level_for_scale(0.5), 1);
        assert_eq!(settings.mip_level_for_scale(0.3), 2);
        assert_eq!(settings.mip_level_for_scale(0.01), 3);
        let capped = ScanSettings::new(false, 0, false, 1.0, 1.0, 2);
        assert_eq!(capped.mip_level_for_scale(2.0), 2);
        let capped = ScanSettings::new(false, 0, false, 1.0, 1.0, 9);
        assert_eq!(capped.minmip, 3);
    }

    #[test]
    fn test_flowing_shifts_sadjust() {
        let mut view = ViewState::default();
        view.setup(VRect { x: 0, y: 0, width: 64, height: 48 }, 90.0, &[0.0; 3], &[0.0; 3]);
        let surf = Surf::default();
        let mut tex = FaceTexture {
            vecs: [[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            texturemins: [0, 0],
            extents: [64, 64],
            flags: SurfFlags::empty(),
        };
        let still = calc_gradients(&view, &view.world, &surf, &tex, 0, 1.0);
        tex.flags = SurfFlags::FLOWING;
        let flowing = calc_gradients(&view, &view.world, &surf, &tex, 0, 1.0);
        // 0.77 of the way through the cycle
        assert_eq!(flowing.sadjust - still.sadjust, (0x10000 as f32 * (-128.0 * 0.77f32)) as i32);
        assert_eq!(still.bbextents, (64 << 16) - 1);
        let mip2 = calc_gradients(&view, &view.world, &surf, &tex, 2, 1.0);
        assert_eq!(mip2.bbextents, (16 << 16) - 1);
    }

    // ============================================================
    // Lit blocks
    // ============================================================

    fn wall_world() -> BspWorld {
        let mut world = BspWorld {
            planes: vec![CPlane::new([1.0, 0.0, 0.0], 64.0)],
            vertexes: vec![[64.0, 0.0, 0.0], [64.0, 32.0, 0.0], [64.0, 32.0, 32.0], [64.0, 0.0, 32.0]],
            texinfo: vec![MTexInfo { vecs: [[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]], ..Default::default() }],
            surfaces: vec![MSurface { verts: vec![0, 1, 2, 3], samples: Some(0), ..Default::default() }],
            lightdata: vec![0; 9],
            ..Default::default()
        };
        world.prepare();
        world
    }

    fn checker() -> Image {
        let mut mips = Vec::new();
        for m in 0..4 {
            let size = 16 >> m;
            mips.push((0..size * size).map(|i| ((i % size + i / size) % 2) as u8 + 1).collect());
        }
        Image {
            name: "textures/checker".into(),
            kind: ImageType::Wall,
            width: 16,
            height: 16,
            mips,
            transparent: false,
            registration_sequence: 1,
        }
    }

    #[test]
    fn test_lit_block_fullbright_uses_row_zero() {
        let world = wall_world();
        let image = checker();
        // row r maps every texel to r * 10 + texel
        let colormap: Vec<u8> = (0..64 * 256).map(|i| ((i / 256) * 10 % 200 + (i % 256) % 50) as u8).collect();
        let light = LightBlock { smax: 3, tmax: 3, lights: vec![0; 9] };
        let mut out = Vec::new();
        let (w, h) = build_lit_block(&world, 0, 0, &image, &colormap, &light, &mut out);
        assert_eq!((w, h), (32, 32));
        assert_eq!(out.len(), 32 * 32);
        assert_eq!(out[0], 1);
        assert_eq!(out[1], 2);
        // the texture wraps every 16 texels
        assert_eq!(out[16], out[0]);
    }

    #[test]
    fn test_lit_block_dark_row() {
        let world = wall_world();
        let image = checker();
        let colormap: Vec<u8> = (0..64 * 256).map(|i| (i / 256) as u8).collect();
        let light = LightBlock { smax: 3, tmax: 3, lights: vec![63 << 8; 9] };
        let mut out = Vec::new();
        build_lit_block(&world, 0, 1, &image, &colormap, &light, &mut out);
        assert_eq!(out.len(), 16 * 16);
        assert!(out.iter().all(|&p| p == 63));
    }
}
