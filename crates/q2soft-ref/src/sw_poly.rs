// sw_poly.rs — Z-buffered polygon rasterizer
//
// Everything drawn after the edge sweep (translucent faces, beams, sprites
// and alias triangles) comes through here: clip in view space, project,
// then walk scanlines with perspective-correct s/t every 16 pixels.

use q2soft_common::q_shared::*;

use crate::sw_bsp::AlphaSurface;
use crate::sw_local::*;
use crate::sw_model_types::{BspWorld, Image};
use crate::sw_refdef::Entity;
use crate::sw_scan::{turb_sample, zi_to_depth, FrameTarget};

/// A vertex in view space (x right, y up, z forward) with texture
/// coordinates in texels and a light value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolyVert {
    pub pos: Vec3,
    pub s: f32,
    pub t: f32,
    pub l: f32,
}

impl PolyVert {
    fn lerp(&self, other: &PolyVert, f: f32) -> PolyVert {
        PolyVert {
            pos: [
                self.pos[0] + f * (other.pos[0] - self.pos[0]),
                self.pos[1] + f * (other.pos[1] - self.pos[1]),
                self.pos[2] + f * (other.pos[2] - self.pos[2]),
            ],
            s: self.s + f * (other.s - self.s),
            t: self.t + f * (other.t - self.t),
            l: self.l + f * (other.l - self.l),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    Opaque,
    /// Two thirds source.
    Alpha66,
    /// One third source.
    Alpha33,
}

impl Blend {
    pub fn for_alpha(alpha: f32) -> Blend {
        if alpha >= 1.0 {
            Blend::Opaque
        } else if alpha > 0.33 {
            Blend::Alpha66
        } else {
            Blend::Alpha33
        }
    }

    /// Thresholds used by models and particles: mostly opaque counts as
    /// opaque.
    pub fn for_translucency(alpha: f32) -> Blend {
        if alpha > 0.66 {
            Blend::Opaque
        } else if alpha > 0.33 {
            Blend::Alpha66
        } else {
            Blend::Alpha33
        }
    }

    #[inline]
    pub fn apply(self, alphamap: &[u8], src: u8, dst: u8) -> u8 {
        let idx = match self {
            Blend::Opaque => return src,
            Blend::Alpha66 => ((src as usize) << 8) + dst as usize,
            Blend::Alpha33 => src as usize + ((dst as usize) << 8),
        };
        alphamap.get(idx).copied().unwrap_or(src)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PolyStyle<'m> {
    pub blend: Blend,
    pub alphamap: &'m [u8],
    pub write_z: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct ScreenVert {
    u: f32,
    v: f32,
    zi: f32,
    sz: f32,
    tz: f32,
    l: f32,
}

impl ScreenVert {
    fn lerp(&self, other: &ScreenVert, f: f32) -> ScreenVert {
        ScreenVert {
            u: self.u + f * (other.u - self.u),
            v: self.v + f * (other.v - self.v),
            zi: self.zi + f * (other.zi - self.zi),
            sz: self.sz + f * (other.sz - self.sz),
            tz: self.tz + f * (other.tz - self.tz),
            l: self.l + f * (other.l - self.l),
        }
    }
}

#[derive(Default)]
pub struct PolyRasterizer {
    clip_a: Vec<PolyVert>,
    clip_b: Vec<PolyVert>,
    screen: Vec<ScreenVert>,
    pub c_polys: usize,
}

fn clip_poly(input: &[PolyVert], out: &mut Vec<PolyVert>, normal: &Vec3, dist: f32) {
    out.clear();
    let n = input.len();
    for i in 0..n {
        let p0 = &input[i];
        let p1 = &input[(i + 1) % n];
        let d0 = dot_product(&p0.pos, normal) - dist;
        let d1 = dot_product(&p1.pos, normal) - dist;
        if d0 >= 0.0 {
            out.push(*p0);
        }
        if (d0 >= 0.0) != (d1 >= 0.0) {
            out.push(p0.lerp(p1, d0 / (d0 - d1)));
        }
    }
}

impl PolyRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clip, project and fill a convex polygon. `shade` gets (s, t, l) and
    /// returns the colour index to write, or `None` to leave the pixel.
    /// Returns the number of pixels written.
    pub fn draw<F>(&mut self, target: &mut FrameTarget, view: &ViewState, verts: &[PolyVert], style: &PolyStyle, mut shade: F) -> usize
    where
        F: FnMut(f32, f32, f32) -> Option<u8>,
    {
        if verts.len() < 3 {
            return 0;
        }

        let mut a = std::mem::take(&mut self.clip_a);
        let mut b = std::mem::take(&mut self.clip_b);
        a.clear();
        a.extend_from_slice(verts);

        let near = ([0.0, 0.0, 1.0], NEAR_CLIP);
        let planes = view.view_planes.iter().map(|n| (*n, 0.0)).chain(std::iter::once(near));
        for (normal, dist) in planes {
            clip_poly(&a, &mut b, &normal, dist);
            std::mem::swap(&mut a, &mut b);
            if a.len() < 3 {
                break;
            }
        }

        let mut drawn = 0;
        if a.len() >= 3 {
            self.screen.clear();
            for p in &a {
                let zi = 1.0 / p.pos[2];
                self.screen.push(ScreenVert {
                    u: view.xcenter + view.xscale * zi * p.pos[0],
                    v: view.ycenter - view.yscale * zi * p.pos[1],
                    zi,
                    sz: p.s * zi,
                    tz: p.t * zi,
                    l: p.l,
                });
            }
            self.c_polys += 1;
            drawn = self.fill(target, view, style, &mut shade);
        }

        self.clip_a = a;
        self.clip_b = b;
        drawn
    }

    fn fill(&self, target: &mut FrameTarget, view: &ViewState, style: &PolyStyle, shade: &mut dyn FnMut(f32, f32, f32) -> Option<u8>) -> usize {
        let sv = &self.screen;
        let n = sv.len();
        let (min_v, max_v) = sv.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.v), hi.max(p.v)));

        let top = (min_v.ceil() as i32).max(view.vrect.y);
        let bottom = (max_v.ceil() as i32 - 1).min(view.vrectbottom - 1);
        let mut drawn = 0;

        for y in top..=bottom {
            let fy = y as f32;
            let mut left: Option<ScreenVert> = None;
            let mut right: Option<ScreenVert> = None;
            for i in 0..n {
                let (p0, p1) = (&sv[i], &sv[(i + 1) % n]);
                let (lo, hi) = if p0.v <= p1.v { (p0, p1) } else { (p1, p0) };
                if lo.v == hi.v || fy < lo.v || fy >= hi.v {
                    continue;
                }
                let x = lo.lerp(hi, (fy - lo.v) / (hi.v - lo.v));
                if left.map_or(true, |c| x.u < c.u) {
                    left = Some(x);
                }
                if right.map_or(true, |c| x.u > c.u) {
                    right = Some(x);
                }
            }
            let (Some(l), Some(r)) = (left, right) else {
                continue;
            };

            let x0 = (l.u.ceil() as i32).max(view.vrect.x);
            let x1 = (r.u.ceil() as i32 - 1).min(view.vrectright - 1);
            if x1 < x0 {
                continue;
            }

            let width = r.u - l.u;
            let d = if width > 0.0 {
                let inv = 1.0 / width;
                ScreenVert {
                    u: 1.0,
                    v: 0.0,
                    zi: (r.zi - l.zi) * inv,
                    sz: (r.sz - l.sz) * inv,
                    tz: (r.tz - l.tz) * inv,
                    l: (r.l - l.l) * inv,
                }
            } else {
                ScreenVert::default()
            };
            let at = |x: i32| {
                let dx = x as f32 - l.u;
                (l.zi + d.zi * dx, l.sz + d.sz * dx, l.tz + d.tz * dx, l.l + d.l * dx)
            };

            drawn += draw_scanline(target, y, x0, x1, &at, style, shade);
        }
        drawn
    }
}

/// Fill pixels x0..=x1 of row y, recomputing s and t every 16 pixels.
fn draw_scanline(
    target: &mut FrameTarget,
    y: i32,
    x0: i32,
    x1: i32,
    at: &dyn Fn(i32) -> (f32, f32, f32, f32),
    style: &PolyStyle,
    shade: &mut dyn FnMut(f32, f32, f32) -> Option<u8>,
) -> usize {
    let mut drawn = 0;
    let mut x = x0;
    while x <= x1 {
        let count = (x1 - x + 1).min(16);
        let (zi0, sz0, tz0, l0) = at(x);
        let (zi1, sz1, tz1, l1) = at(x + count);
        let (s0, t0) = if zi0 != 0.0 { (sz0 / zi0, tz0 / zi0) } else { (0.0, 0.0) };
        let (s1, t1) = if zi1 != 0.0 { (sz1 / zi1, tz1 / zi1) } else { (s0, t0) };
        let inv = 1.0 / count as f32;
        let (ds, dt, dl, dzi) = ((s1 - s0) * inv, (t1 - t0) * inv, (l1 - l0) * inv, (zi1 - zi0) * inv);

        for k in 0..count {
            let kf = k as f32;
            let idx = target.offset(x + k, y);
            let izi = zi_to_depth(zi0 + dzi * kf);
            let Some(&stored) = target.zbuffer.get(idx) else {
                continue;
            };
            if stored as i32 > izi {
                continue;
            }
            let Some(src) = shade(s0 + ds * kf, t0 + dt * kf, l0 + dl * kf) else {
                continue;
            };
            let dst = target.pixels[idx];
            target.pixels[idx] = style.blend.apply(style.alphamap, src, dst);
            if style.write_z && style.blend == Blend::Opaque {
                target.zbuffer[idx] = izi.clamp(0, 0xFFFF) as u16;
            }
            drawn += 1;
        }
        x += count;
    }
    drawn
}

/// Texel of `image` mip 0 at (s, t), wrapping.
#[inline]
pub fn wrapped_texel(image: &Image, s: f32, t: f32) -> u8 {
    let (pixels, w, h) = image.mip(0);
    let x = (s.floor() as i32).rem_euclid(w.max(1));
    let y = (t.floor() as i32).rem_euclid(h.max(1));
    pixels.get((y * w + x) as usize).copied().unwrap_or(0)
}

// ============================================================
// Beams
// ============================================================

/// Draw a beam entity as a flat-shaded tube from `origin` to `oldorigin`
/// whose diameter is `frame`.
pub fn draw_beam(rast: &mut PolyRasterizer, target: &mut FrameTarget, view: &ViewState, e: &Entity, alphamap: &[u8]) {
    let direction = vector_subtract(&e.oldorigin, &e.origin);
    let mut ndir = direction;
    if vector_normalize(&mut ndir) == 0.0 {
        return;
    }

    let perpvec = vector_scale(&perpendicular_vector(&ndir), (e.frame / 2) as f32);

    let mut start_points = [[0.0f32; 3]; NUM_BEAM_SEGS];
    let mut end_points = [[0.0f32; 3]; NUM_BEAM_SEGS];
    for i in 0..NUM_BEAM_SEGS {
        let p = rotate_point_around_vector(&ndir, &perpvec, (360.0 / NUM_BEAM_SEGS as f32) * i as f32);
        start_points[i] = vector_add(&p, &e.origin);
        end_points[i] = vector_add(&start_points[i], &direction);
    }

    let color = (e.skinnum & 0xFF) as u8;
    let style = PolyStyle { blend: Blend::for_alpha(e.alpha), alphamap, write_z: false };
    for i in 0..NUM_BEAM_SEGS {
        let j = (i + 1) % NUM_BEAM_SEGS;
        let quad = [start_points[i], end_points[i], end_points[j], start_points[j]].map(|p| PolyVert {
            pos: view.world.transform_point(&p),
            ..Default::default()
        });
        rast.draw(target, view, &quad, &style, |_, _, _| Some(color));
    }
}

// ============================================================
// Translucent world faces
// ============================================================

/// Draw the faces set aside during the world walk, back to front as
/// queued, blended by their TRANS33/TRANS66 flag.
#[allow(clippy::too_many_arguments)]
pub fn draw_alpha_surfaces(
    rast: &mut PolyRasterizer,
    target: &mut FrameTarget,
    view: &ViewState,
    bases: &[ViewBasis],
    world: &BspWorld,
    images: &[Image],
    surfaces: &[AlphaSurface],
    alphamap: &[u8],
    turb: &[i32],
) {
    let mut verts = Vec::new();
    let mut poly = Vec::new();
    for alpha in surfaces.iter().rev() {
        let Some(surf) = world.surfaces.get(alpha.face) else {
            continue;
        };
        let Some(ti) = world.texinfo.get(surf.texinfo) else {
            continue;
        };
        let Some(image) = ti.image.and_then(|h| images.get(h)) else {
            continue;
        };
        let basis = bases.get(alpha.basis as usize).copied().unwrap_or(view.world);

        world.face_vertices(alpha.face, &mut verts);
        poly.clear();
        for p in &verts {
            poly.push(PolyVert {
                pos: basis.transform_point(p),
                s: dot_product(p, &[ti.vecs[0][0], ti.vecs[0][1], ti.vecs[0][2]]) + ti.vecs[0][3],
                t: dot_product(p, &[ti.vecs[1][0], ti.vecs[1][1], ti.vecs[1][2]]) + ti.vecs[1][3],
                l: 0.0,
            });
        }

        let alpha_value = if ti.flags.contains(SurfFlags::TRANS66) { 0.60 } else { 0.30 };
        let style = PolyStyle { blend: Blend::for_alpha(alpha_value), alphamap, write_z: false };

        if ti.flags.contains(SurfFlags::WARP) {
            let (pbase, _, _) = image.mip(0);
            rast.draw(target, view, &poly, &style, |s, t, _| {
                Some(turb_sample(pbase, turb, (s * 65536.0) as i32, (t * 65536.0) as i32))
            });
        } else {
            rast.draw(target, view, &poly, &style, |s, t, _| Some(wrapped_texel(image, s, t)));
        }
    }
}
