// sw_warp.rs — Turbulence tables and the underwater screen warp

use crate::sw_local::*;

#[derive(Debug, Clone, Default)]
pub struct WarpState {
    /// Texture-space offsets for turbulent surfaces, 16.16.
    pub sintable: Vec<i32>,
    /// Pixel offsets for the screen warp, 0..=2*AMP2.
    pub intsintable: Vec<i32>,
    /// Warp buffer row offset per output row.
    rowptr: Vec<usize>,
    column: Vec<usize>,
    cached: (i32, i32, i32, i32),
}

impl WarpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the sine tables for a `width` x `height` mode.
    pub fn init_turb(&mut self, width: i32, height: i32) {
        let len = (width.max(height).max(0) as usize + CYCLE).max(2 * CYCLE);
        self.sintable.clear();
        self.intsintable.clear();
        for i in 0..len {
            let s = (i as f64 * std::f64::consts::PI * 2.0 / CYCLE as f64).sin();
            self.sintable.push((AMP as f64 + s * AMP as f64) as i32);
            self.intsintable.push((AMP2 as f64 + s * AMP2 as f64) as i32);
        }
        self.rowptr.clear();
        self.column.clear();
        self.cached = (0, 0, 0, 0);
    }

    /// Turbulence table slice for surface warps at `time`.
    pub fn turb(&self, time: f32) -> &[i32] {
        let offset = (time * SPEED) as i32 & (CYCLE as i32 - 1);
        self.sintable.get(offset as usize..).unwrap_or(&[])
    }

    fn build_maps(&mut self, w: i32, h: i32, vrect_w: i32, vrect_h: i32, warp_stride: usize) {
        let key = (w, h, vrect_w, vrect_h);
        if self.cached == key && !self.rowptr.is_empty() {
            return;
        }
        self.cached = key;
        let extra = (AMP2 * 2) as i32;

        self.rowptr.clear();
        for v in 0..h + extra {
            let v2 = (v as f32 / (h + extra) as f32 * vrect_h as f32) as usize;
            self.rowptr.push(v2 * warp_stride);
        }
        self.column.clear();
        for u in 0..w + extra {
            let u2 = (u as f32 / (w + extra) as f32 * vrect_w as f32) as usize;
            self.column.push(u2);
        }
    }

    /// Resample the scene drawn into `warp` onto the view area of `dest`,
    /// wobbling rows and columns.
    #[allow(clippy::too_many_arguments)]
    pub fn warp_screen(
        &mut self,
        dest: &mut [u8],
        dest_stride: usize,
        warp: &[u8],
        warp_stride: usize,
        area: VRect,
        scene: VRect,
        time: f32,
    ) {
        if area.width <= 0 || area.height <= 0 {
            return;
        }
        self.build_maps(area.width, area.height, scene.width, scene.height, warp_stride);

        let offset = ((time * SPEED) as i32 & (CYCLE as i32 - 1)) as usize;
        let turb = self.intsintable.get(offset..).unwrap_or(&[]);
        let turb_at = |i: usize| turb.get(i).copied().unwrap_or(AMP2 as i32) as usize;

        for v in 0..area.height as usize {
            let row_start = (area.y as usize + v) * dest_stride + area.x as usize;
            let Some(row) = dest.get_mut(row_start..row_start + area.width as usize) else {
                break;
            };
            let tv = turb_at(v);
            for (u, out) in row.iter_mut().enumerate() {
                let src_row = self.rowptr.get(v + turb_at(u)).copied().unwrap_or(0);
                let src_col = self.column.get(u + tv).copied().unwrap_or(0);
                if let Some(&c) = warp.get(src_row + src_col) {
                    *out = c;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_turb_ranges() {
        let mut warp = WarpState::new();
        warp.init_turb(320, 240);
        assert_eq!(warp.sintable.len(), 320 + CYCLE);
        assert!(warp.intsintable.iter().all(|&v| (0..=2 * AMP2 as i32).contains(&v)));
        assert!(warp.sintable.iter().all(|&v| (0..=2 * AMP).contains(&v)));
        assert_eq!(warp.sintable[0], AMP);
        assert_eq!(warp.intsintable[0], AMP2 as i32);
    }

    #[test]
    fn test_small_modes_keep_two_cycles() {
        let mut warp = WarpState::new();
        warp.init_turb(16, 8);
        assert_eq!(warp.sintable.len(), 2 * CYCLE);
    }

    #[test]
    fn test_turb_wraps_with_time() {
        let mut warp = WarpState::new();
        warp.init_turb(64, 64);
        assert_eq!(warp.turb(0.0).len(), warp.sintable.len());
        assert_eq!(warp.turb(1.0).len(), warp.sintable.len() - 20);
        assert!(warp.turb(1000.0).len() > warp.sintable.len() - CYCLE);
    }

    #[test]
    fn test_warp_of_flat_scene_is_flat() {
        let mut warp = WarpState::new();
        warp.init_turb(32, 24);
        let source = vec![42u8; 32 * 24];
        let mut dest = vec![0u8; 32 * 24];
        let rect = VRect { x: 0, y: 0, width: 32, height: 24 };
        warp.warp_screen(&mut dest, 32, &source, 32, rect, rect, 1.5);
        assert!(dest.iter().all(|&c| c == 42));
    }

    #[test]
    fn test_warp_stays_inside_area() {
        let mut warp = WarpState::new();
        warp.init_turb(32, 24);
        let source: Vec<u8> = (0..32 * 24).map(|i| (i % 251) as u8).collect();
        let mut dest = vec![0u8; 32 * 24];
        let area = VRect { x: 4, y: 4, width: 16, height: 8 };
        warp.warp_screen(&mut dest, 32, &source, 32, area, area, 0.25);
        assert_eq!(dest[0], 0);
        assert_eq!(dest[3 * 32 + 10], 0);
        assert_eq!(dest[12 * 32 + 10], 0);
        // pixels come from the scene's corner of the warp buffer
        let scene: Vec<u8> = (0..8).flat_map(|y| source[y * 32..y * 32 + 16].to_vec()).collect();
        for y in 4..12 {
            for x in 4..20 {
                assert!(scene.contains(&dest[y * 32 + x]));
            }
        }
    }
}
