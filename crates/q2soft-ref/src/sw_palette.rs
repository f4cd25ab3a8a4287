// sw_palette.rs — Gamma table, palette blends and the 8 -> 32 bit blit

use image::RgbImage;

/// Gamma lookup for `vid_gamma` and `sw_overbrightbits`.
pub fn build_gamma_table(vid_gamma: f32, overbright: f32) -> [u8; 256] {
    let overbright = overbright.clamp(0.5, 4.0);
    // computed wide so that vid_gamma 1.1 lands exactly on the linear path
    let g = (2.1f64 - vid_gamma as f64) as f32;

    let mut table = [0u8; 256];
    for (i, out) in table.iter_mut().enumerate() {
        let inf = if g == 1.0 {
            (i as f32 * overbright) as i32
        } else {
            ((255.0 * ((i as f64 + 0.5) / 255.5).powf(g as f64) + 0.5) * overbright as f64) as i32
        };
        *out = inf.clamp(0, 255) as u8;
    }
    table
}

/// Palette state: the base palette from the colormap, the gamma table and
/// the palette currently handed to the screen.
#[derive(Debug, Clone)]
pub struct PaletteState {
    /// Base palette, RGBA per entry.
    pub base: [u8; 1024],
    pub gammatable: [u8; 256],
    /// RGBA in memory order, one `u32` per index.
    pub currentpalette: [u32; 256],
    /// A blend is applied and must be undone when it ends.
    modified: bool,
}

impl Default for PaletteState {
    fn default() -> Self {
        let mut gammatable = [0u8; 256];
        for (i, g) in gammatable.iter_mut().enumerate() {
            *g = i as u8;
        }
        Self { base: [0; 1024], gammatable, currentpalette: [0; 256], modified: false }
    }
}

impl PaletteState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the 768-byte RGB palette that came with the colormap.
    pub fn set_base(&mut self, rgb: &[u8]) {
        expand_rgb(rgb, &mut self.base);
    }

    pub fn rebuild_gamma(&mut self, vid_gamma: f32, overbright: f32) {
        self.gammatable = build_gamma_table(vid_gamma, overbright);
    }

    /// Run an RGBA palette through the gamma table into `currentpalette`.
    pub fn gamma_correct_and_set(&mut self, palette: &[u8]) {
        let gamma = self.gammatable;
        let out: &mut [u8] = bytemuck::cast_slice_mut(&mut self.currentpalette[..]);
        for (dst, src) in out.chunks_exact_mut(4).zip(palette.chunks_exact(4)) {
            dst[0] = gamma[src[0] as usize];
            dst[1] = gamma[src[1] as usize];
            dst[2] = gamma[src[2] as usize];
            dst[3] = 0xFF;
        }
    }

    pub fn set_base_palette(&mut self) {
        let base = self.base;
        self.gamma_correct_and_set(&base);
    }

    /// Install a host palette (RGB, 768 bytes), or go back to the base one.
    pub fn set_palette(&mut self, palette: Option<&[u8]>) {
        match palette {
            Some(rgb) => {
                let mut palette32 = [0u8; 1024];
                expand_rgb(rgb, &mut palette32);
                self.gamma_correct_and_set(&palette32);
            }
            None => self.set_base_palette(),
        }
    }

    /// Tint the palette towards `blend` (r, g, b, alpha). With no alpha the
    /// base palette is put back once.
    pub fn calc_palette(&mut self, blend: &[f32; 4]) {
        let mut alpha = blend[3];
        if alpha <= 0.0 {
            if self.modified {
                self.modified = false;
                self.set_base_palette();
            }
            return;
        }

        self.modified = true;
        if alpha > 1.0 {
            alpha = 1.0;
        }

        let premult = [blend[0] * alpha * 255.0, blend[1] * alpha * 255.0, blend[2] * alpha * 255.0];
        let one_minus_alpha = 1.0 - alpha;

        let mut palette = [0u8; 1024];
        for (out, src) in palette.chunks_exact_mut(4).zip(self.base.chunks_exact(4)) {
            for j in 0..3 {
                let v = (premult[j] + one_minus_alpha * src[j] as f32) as i32;
                out[j] = v.min(255) as u8;
            }
            out[3] = 255;
        }
        self.gamma_correct_and_set(&palette);
    }

    /// Convert an 8-bit frame to 32-bit pixels.
    pub fn copy_frame(&self, source: &[u8], out: &mut Vec<u32>) {
        out.clear();
        out.extend(source.iter().map(|&c| self.currentpalette[c as usize]));
    }

    /// RGB image of an 8-bit frame as it currently looks on screen.
    pub fn screenshot(&self, source: &[u8], width: i32, height: i32) -> Option<RgbImage> {
        let bytes: &[u8] = bytemuck::cast_slice(&self.currentpalette[..]);
        let mut rgb = Vec::with_capacity(source.len() * 3);
        for &c in source {
            let i = c as usize * 4;
            rgb.extend_from_slice(&bytes[i..i + 3]);
        }
        RgbImage::from_raw(u32::try_from(width).ok()?, u32::try_from(height).ok()?, rgb)
    }
}

fn expand_rgb(rgb: &[u8], out: &mut [u8; 1024]) {
    for (dst, src) in out.chunks_exact_mut(4).zip(rgb.chunks_exact(3)) {
        dst[..3].copy_from_slice(src);
        dst[3] = 0xFF;
    }
}
