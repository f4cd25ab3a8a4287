// sw_part.rs — Particles
//
// Each particle is a square of pixels, sized by distance, z-tested against
// the world. Only fully opaque particles write depth.

use q2soft_common::q_shared::*;

use crate::sw_local::*;
use crate::sw_poly::Blend;
use crate::sw_refdef::Particle;
use crate::sw_scan::{zi_to_depth, FrameTarget};

/// Particle square size limits, derived from the view width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleSizes {
    pub pix_min: i32,
    pub pix_max: i32,
    pub pix_shift: i32,
}

impl ParticleSizes {
    pub fn for_width(width: i32) -> Self {
        let w = width as f32;
        Self {
            pix_min: (width / 320).max(1),
            pix_max: ((w / (320.0 / 4.0) + 0.5) as i32).max(1),
            pix_shift: 8 - (w / 320.0 + 0.5) as i32,
        }
    }

    #[inline]
    pub fn size(&self, izi: i32) -> i32 {
        let pix = izi >> self.pix_shift;
        if pix < self.pix_min {
            self.pix_min
        } else if pix > self.pix_max {
            self.pix_max
        } else {
            pix
        }
    }
}

/// Draw every particle; returns how many reached the screen.
pub fn draw_particles(target: &mut FrameTarget, view: &ViewState, particles: &[Particle], alphamap: &[u8]) -> usize {
    let sizes = ParticleSizes::for_width(view.vrect.width);
    let basis = &view.world;
    let pright = vector_scale(&basis.right, view.xscaleshrink);
    let pup = vector_scale(&basis.up, view.yscaleshrink);

    // keep the whole square on screen
    let right_limit = view.vrectright - sizes.pix_max;
    let bottom_limit = view.vrectbottom - sizes.pix_max;

    let mut drawn = 0;
    for p in particles {
        let local = vector_subtract(&p.origin, &basis.origin);
        let z = dot_product(&local, &basis.forward);
        if z < PARTICLE_Z_CLIP {
            continue;
        }
        let zi = 1.0 / z;
        let u = (view.xcenter + zi * dot_product(&local, &pright) + 0.5) as i32;
        let v = (view.ycenter - zi * dot_product(&local, &pup) + 0.5) as i32;
        if v > bottom_limit || u > right_limit || v < view.vrect.y || u < view.vrect.x {
            continue;
        }

        let izi = zi_to_depth(zi);
        let pix = sizes.size(izi);
        let color = (p.color & 0xFF) as u8;
        let blend = Blend::for_translucency(p.alpha);

        for row in 0..pix {
            for col in 0..pix {
                let idx = target.offset(u + col, v + row);
                let Some(&stored) = target.zbuffer.get(idx) else {
                    continue;
                };
                if stored as i32 > izi {
                    continue;
                }
                let dst = target.pixels[idx];
                target.pixels[idx] = blend.apply(alphamap, color, dst);
                if blend == Blend::Opaque {
                    target.zbuffer[idx] = izi.clamp(0, 0xFFFF) as u16;
                }
            }
        }
        drawn += 1;
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(width: i32) -> ViewState {
        let mut view = ViewState::default();
        view.setup(VRect { x: 0, y: 0, width, height: width * 3 / 4 }, 90.0, &[0.0; 3], &[0.0; 3]);
        view
    }

    fn xor_alphamap() -> Vec<u8> {
        (0..65536usize).map(|i| ((i >> 8) ^ (i & 0xFF)) as u8).collect()
    }

    // ============================================================
    // Sizes
    // ============================================================

    #[test]
    fn test_sizes_scale_with_width() {
        assert_eq!(ParticleSizes::for_width(320), ParticleSizes { pix_min: 1, pix_max: 4, pix_shift: 7 });
        assert_eq!(ParticleSizes::for_width(640), ParticleSizes { pix_min: 2, pix_max: 8, pix_shift: 6 });
    }

    #[test]
    fn test_size_is_clamped() {
        let s = ParticleSizes::for_width(320);
        assert_eq!(s.size(0), 1);
        assert_eq!(s.size(0x8000), 4);
        assert_eq!(s.size(3 << 7), 3);
    }

    // ============================================================
    // Drawing
    // ============================================================

    #[test]
    fn test_near_particle_is_rejected() {
        let view = view(320);
        let (mut pixels, mut zbuffer) = (vec![0u8; 320 * 240], vec![0u16; 320 * 240]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 320 };
        let p = Particle { origin: [4.0, 0.0, 0.0], color: 5, alpha: 1.0 };
        assert_eq!(draw_particles(&mut target, &view, &[p], &[]), 0);
        assert!(pixels.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_opaque_particle_writes_z() {
        let view = view(320);
        let (mut pixels, mut zbuffer) = (vec![0u8; 320 * 240], vec![0u16; 320 * 240]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 320 };
        let p = Particle { origin: [100.0, 0.0, 0.0], color: 5, alpha: 1.0 };
        assert_eq!(draw_particles(&mut target, &view, &[p], &[]), 1);
        let idx = 120 * 320 + 160;
        assert_eq!(pixels[idx], 5);
        assert_eq!(zbuffer[idx] as i32, zi_to_depth(0.01));
    }

    #[test]
    fn test_translucent_particle_blends_without_z() {
        let view = view(320);
        let alphamap = xor_alphamap();
        let (mut pixels, mut zbuffer) = (vec![3u8; 320 * 240], vec![0u16; 320 * 240]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 320 };
        let p = Particle { origin: [100.0, 0.0, 0.0], color: 5, alpha: 0.5 };
        draw_particles(&mut target, &view, &[p], &alphamap);
        let idx = 120 * 320 + 160;
        assert_eq!(pixels[idx], 5 ^ 3);
        assert_eq!(zbuffer[idx], 0);
    }

    #[test]
    fn test_particle_behind_wall_is_hidden() {
        let view = view(320);
        let (mut pixels, mut zbuffer) = (vec![0u8; 320 * 240], vec![0xFFFFu16; 320 * 240]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 320 };
        let p = Particle { origin: [100.0, 0.0, 0.0], color: 5, alpha: 1.0 };
        draw_particles(&mut target, &view, &[p], &[]);
        assert!(pixels.iter().all(|&c| c == 0));
    }
}
