// sw_light.rs — Dynamic light marking, point lighting and surface light blocks

use q2soft_common::q_shared::*;

use crate::sw_local::*;
use crate::sw_model_types::{BspWorld, NodeRef};
use crate::sw_refdef::{DLight, RefDef};

/// Radius below which a dlight no longer reaches a surface sample.
const DLIGHT_MINLIGHT: f32 = 32.0;

// ============================================================
// DYNAMIC LIGHTS — BSP marking
// ============================================================

/// Recursively flag the faces a dynamic light can reach with `bit`.
pub fn mark_lights(world: &mut BspWorld, light: &DLight, bit: u32, node: NodeRef, framecount: i32) {
    let NodeRef::Node(n) = node else {
        return;
    };
    let Some(mnode) = world.nodes.get(n) else {
        return;
    };
    let (plane_idx, children, first, count) = (mnode.plane, mnode.children, mnode.firstsurface, mnode.numsurfaces);
    let Some(splitplane) = world.planes.get(plane_idx).copied() else {
        return;
    };
    let dist = splitplane.distance(&light.origin);

    if dist > light.intensity - DLIGHT_CUTOFF {
        mark_lights(world, light, bit, children[0], framecount);
        return;
    }
    if dist < -light.intensity + DLIGHT_CUTOFF {
        mark_lights(world, light, bit, children[1], framecount);
        return;
    }

    // mark the polygons
    for face in first..first + count {
        let Some(plane) = world.surfaces.get(face).and_then(|s| world.planes.get(s.plane)).copied() else {
            continue;
        };
        let Some(surf) = world.surfaces.get_mut(face) else {
            continue;
        };
        // only light the side facing the light
        let sidebit = if plane.distance(&light.origin) >= 0.0 { 0 } else { SURF_PLANEBACK };
        if surf.flags & SURF_PLANEBACK != sidebit {
            continue;
        }
        if surf.dlightframe != framecount {
            surf.dlightbits = bit;
            surf.dlightframe = framecount;
        } else {
            surf.dlightbits |= bit;
        }
    }

    mark_lights(world, light, bit, children[0], framecount);
    mark_lights(world, light, bit, children[1], framecount);
}

/// Mark every dlight into the tree under `head`. `offset` is the origin of
/// the model owning the tree, zero for the world.
pub fn push_dlights(world: &mut BspWorld, head: NodeRef, dlights: &[DLight], offset: &Vec3, framecount: i32) {
    for (k, dl) in dlights.iter().enumerate().take(32) {
        let local = DLight { origin: vector_subtract(&dl.origin, offset), ..*dl };
        mark_lights(world, &local, 1 << k, head, framecount);
    }
}

// ============================================================
// LIGHT SAMPLING
// ============================================================

/// Trace from `start` to `end` and sample the lightmap of the first face
/// hit. `None` if nothing was hit.
fn recursive_light_point(world: &BspWorld, fd: &RefDef, node: NodeRef, start: &Vec3, end: &Vec3) -> Option<Vec3> {
    let NodeRef::Node(n) = node else {
        // didn't hit anything
        return None;
    };
    let mnode = world.nodes.get(n)?;
    let plane = world.planes.get(mnode.plane)?;

    let front = plane.distance(start);
    let back = plane.distance(end);
    let side = usize::from(front < 0.0);

    if (back < 0.0) == (front < 0.0) {
        return recursive_light_point(world, fd, mnode.children[side], start, end);
    }

    let frac = front / (front - back);
    let mid = [
        start[0] + (end[0] - start[0]) * frac,
        start[1] + (end[1] - start[1]) * frac,
        start[2] + (end[2] - start[2]) * frac,
    ];

    // go down front side
    if let Some(color) = recursive_light_point(world, fd, mnode.children[side], start, &mid) {
        return Some(color);
    }

    // check for impact on this node
    for face in mnode.firstsurface..mnode.firstsurface + mnode.numsurfaces {
        let Some(surf) = world.surfaces.get(face) else {
            break;
        };
        if surf.flags & SURF_DRAWTURB != 0 || world.face_flags(face).contains(SurfFlags::SKY) {
            // no lightmaps
            continue;
        }
        let Some(tex) = world.texinfo.get(surf.texinfo) else {
            continue;
        };

        let s = (dot_product(&mid, &[tex.vecs[0][0], tex.vecs[0][1], tex.vecs[0][2]]) + tex.vecs[0][3]) as i32;
        let t = (dot_product(&mid, &[tex.vecs[1][0], tex.vecs[1][1], tex.vecs[1][2]]) + tex.vecs[1][3]) as i32;
        if s < surf.texturemins[0] || t < surf.texturemins[1] {
            continue;
        }
        let ds = s - surf.texturemins[0];
        let dt = t - surf.texturemins[1];
        if ds > surf.extents[0] || dt > surf.extents[1] {
            continue;
        }

        let Some(samples) = surf.samples else {
            return Some([0.0; 3]);
        };

        let smax = ((surf.extents[0] >> 4) + 1) as usize;
        let tmax = ((surf.extents[1] >> 4) + 1) as usize;
        let size = smax * tmax;
        let mut offset = samples + (dt >> 4) as usize * smax + (ds >> 4) as usize;

        let mut color = [0.0f32; 3];
        for &style in surf.styles.iter().take_while(|&&s| s != 255) {
            let Some(&sample) = world.lightdata.get(offset) else {
                break;
            };
            let rgb = fd.lightstyle(style).rgb;
            let v = sample as f32 * (1.0 / 255.0);
            color = vector_ma(&color, v, &rgb);
            offset += size;
        }
        return Some(color);
    }

    // go down back side
    recursive_light_point(world, fd, mnode.children[1 - side], &mid, end)
}

/// Light arriving at point `p` from the lightmaps below it plus dynamic
/// lights, scaled by `modulate`.
pub fn light_point(world: &BspWorld, fd: &RefDef, p: &Vec3, modulate: f32) -> Vec3 {
    if world.lightdata.is_empty() {
        return [1.0; 3];
    }

    let end = [p[0], p[1], p[2] - 2048.0];
    let mut color = if world.nodes.is_empty() {
        [0.0; 3]
    } else {
        recursive_light_point(world, fd, NodeRef::Node(0), p, &end).unwrap_or([0.0; 3])
    };

    // add dynamic lights
    for dl in &fd.dlights {
        let dist = vector_subtract(p, &dl.origin);
        let add = (dl.intensity - vector_length(&dist)) * (1.0 / 256.0);
        if add > 0.0 {
            color = vector_ma(&color, add, &dl.color);
        }
    }

    vector_scale(&color, modulate)
}

// ============================================================
// Surface light blocks
// ============================================================

/// Per-face light grid, one entry per 16 texels plus one, already turned
/// into colormap row offsets (`value & 0xFF00`).
#[derive(Debug, Clone, Default)]
pub struct LightBlock {
    pub smax: usize,
    pub tmax: usize,
    pub lights: Vec<i32>,
}

impl LightBlock {
    /// Light at texel position (s, t) of mip 0, bilinear between samples.
    pub fn sample(&self, s: i32, t: i32) -> i32 {
        if self.lights.is_empty() {
            return 0;
        }
        let s = s.max(0);
        let t = t.max(0);
        let si = ((s >> 4) as usize).min(self.smax - 1);
        let ti = ((t >> 4) as usize).min(self.tmax - 1);
        let si1 = (si + 1).min(self.smax - 1);
        let ti1 = (ti + 1).min(self.tmax - 1);
        let fs = s & 15;
        let ft = t & 15;
        let at = |x: usize, y: usize| self.lights[y * self.smax + x];
        let top = at(si, ti) * (16 - fs) + at(si1, ti) * fs;
        let bottom = at(si, ti1) * (16 - fs) + at(si1, ti1) * fs;
        (top * (16 - ft) + bottom * ft) >> 8
    }
}

/// Everything besides the world that decides how a face is lit this frame.
pub struct LightParams<'a> {
    pub fd: &'a RefDef,
    pub modulate: f32,
    pub fullbright: bool,
    pub framecount: i32,
    /// Origin of the brush entity the face belongs to.
    pub offset: Vec3,
}

/// Add the dlights flagged on `face` into `block` (before inversion).
fn add_dynamic_lights(world: &BspWorld, face: usize, params: &LightParams, block: &mut LightBlock) {
    let Some(surf) = world.surfaces.get(face) else {
        return;
    };
    let (Some(plane), Some(tex)) = (world.planes.get(surf.plane), world.texinfo.get(surf.texinfo)) else {
        return;
    };

    for (lnum, dl) in params.fd.dlights.iter().enumerate().take(32) {
        if surf.dlightbits & (1 << lnum) == 0 {
            // not lit by this light
            continue;
        }
        let origin = vector_subtract(&dl.origin, &params.offset);
        let dist = plane.distance(&origin);
        let rad = dl.intensity - dist.abs();
        if rad < DLIGHT_MINLIGHT {
            continue;
        }
        let minlight = rad - DLIGHT_MINLIGHT;

        let impact = vector_ma(&origin, -dist, &plane.normal);
        let local = [
            dot_product(&impact, &[tex.vecs[0][0], tex.vecs[0][1], tex.vecs[0][2]]) + tex.vecs[0][3]
                - surf.texturemins[0] as f32,
            dot_product(&impact, &[tex.vecs[1][0], tex.vecs[1][1], tex.vecs[1][2]]) + tex.vecs[1][3]
                - surf.texturemins[1] as f32,
        ];

        for t in 0..block.tmax {
            let td = ((local[1] - (t * 16) as f32) as i32).abs();
            for s in 0..block.smax {
                let sd = ((local[0] - (s * 16) as f32) as i32).abs();
                let d = (if sd > td { sd + (td >> 1) } else { td + (sd >> 1) }) as f32;
                if d < minlight {
                    block.lights[t * block.smax + s] += ((rad - d) * 256.0) as i32;
                }
            }
        }
    }
}

/// Combine the styled lightmaps and dynamic lights of a face into `block`.
pub fn build_light_block(world: &BspWorld, face: usize, params: &LightParams, block: &mut LightBlock) {
    block.lights.clear();
    let Some(surf) = world.surfaces.get(face) else {
        block.smax = 0;
        block.tmax = 0;
        return;
    };
    block.smax = ((surf.extents[0] >> 4) + 1).max(1) as usize;
    block.tmax = ((surf.extents[1] >> 4) + 1).max(1) as usize;
    let size = block.smax * block.tmax;
    block.lights.resize(size, 0);

    if params.fullbright || world.lightdata.is_empty() {
        // row 0 of the colormap is full bright
        return;
    }

    if let Some(mut offset) = surf.samples {
        for &style in surf.styles.iter().take_while(|&&s| s != 255) {
            // 8.8 fraction
            let scale = (params.fd.lightstyle(style).white * 128.0 * params.modulate) as i32;
            let Some(map) = world.lightdata.get(offset..offset + size) else {
                break;
            };
            for (bl, &sample) in block.lights.iter_mut().zip(map) {
                *bl += sample as i32 * scale;
            }
            offset += size;
        }
    }

    if surf.dlightframe == params.framecount {
        add_dynamic_lights(world, face, params, block);
    }

    // bound, invert, and shift
    for bl in &mut block.lights {
        let t = (*bl).max(0);
        let t = (255 * 256 - t) >> (8 - VID_CBITS);
        *bl = t.max(1 << 6);
    }
}
