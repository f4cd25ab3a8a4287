// sw_image.rs — Image table, notexture, colormap

use q2soft_common::q_shared::*;

use crate::sw_import::RefImport;
use crate::sw_local::*;
use crate::sw_model_types::{Image, ImageHandle, ImageType, LoadedPic};

pub const COLORMAP_NAME: &str = "pics/colormap.pcx";

/// Light rows in the colormap; the alpha table follows them.
pub const COLORMAP_LIGHT_ROWS: usize = 64;

/// 16x16 checkerboard with all four mip levels.
pub fn notexture_image() -> Image {
    let mut mips = Vec::with_capacity(NUM_MIPS);
    for m in 0..NUM_MIPS {
        let size = 16 >> m;
        let half = 8 >> m;
        let mut pixels = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                pixels.push(if (y < half) ^ (x < half) { 0 } else { 0xFF });
            }
        }
        mips.push(pixels);
    }
    Image {
        name: "***r_notexture***".into(),
        kind: ImageType::Wall,
        width: 16,
        height: 16,
        mips,
        transparent: false,
        registration_sequence: 1,
    }
}

/// Point-sampled mip chain for wall textures.
fn build_mips(pic: &LoadedPic, levels: usize) -> Vec<Vec<u8>> {
    let mut mips = vec![pic.pixels.clone()];
    for m in 1..levels {
        let w = (pic.width >> m).max(1);
        let h = (pic.height >> m).max(1);
        let mut level = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let src = ((y << m) * pic.width + (x << m)) as usize;
                level.push(pic.pixels.get(src).copied().unwrap_or(0));
            }
        }
        mips.push(level);
    }
    mips
}

#[derive(Debug, Clone)]
pub struct ImageTable {
    pub images: Vec<Image>,
    pub registration_sequence: i32,
    pub notexture: ImageHandle,
}

impl Default for ImageTable {
    fn default() -> Self {
        Self { images: vec![notexture_image()], registration_sequence: 1, notexture: 0 }
    }
}

impl ImageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: ImageHandle) -> Option<&Image> {
        self.images.get(handle)
    }

    /// Find an already loaded image or load it through the host.
    pub fn find_image(&mut self, ri: &mut dyn RefImport, name: &str, kind: ImageType) -> Option<ImageHandle> {
        if name.len() < 5 {
            return None;
        }

        // look for it
        if let Some(idx) = self.images.iter().position(|img| img.registration_sequence != 0 && img.name == name) {
            self.images[idx].registration_sequence = self.registration_sequence;
            return Some(idx);
        }

        let Some(pic) = ri.load_pic(name) else {
            if kind == ImageType::Wall {
                ri.con_printf(PRINT_ALL, &format!("R_FindImage: can't load {}\n", name));
            }
            return None;
        };
        if pic.width <= 0 || pic.height <= 0 || pic.pixels.len() < (pic.width * pic.height) as usize {
            ri.con_printf(PRINT_ALL, &format!("R_FindImage: bad image {}\n", name));
            return None;
        }
        Some(self.load_pic(name, &pic, kind))
    }

    /// Install a decoded picture, reusing a free slot.
    pub fn load_pic(&mut self, name: &str, pic: &LoadedPic, kind: ImageType) -> ImageHandle {
        let levels = if kind == ImageType::Wall { NUM_MIPS } else { 1 };
        let image = Image {
            name: name.chars().take(MAX_QPATH - 1).collect(),
            kind,
            width: pic.width,
            height: pic.height,
            mips: build_mips(pic, levels),
            transparent: pic.pixels.contains(&TRANSPARENT_COLOR),
            registration_sequence: self.registration_sequence,
        };
        match self.images.iter().position(|img| img.registration_sequence == 0) {
            Some(free) => {
                self.images[free] = image;
                free
            }
            None => {
                self.images.push(image);
                self.images.len() - 1
            }
        }
    }

    /// `name` without a leading slash is looked up under `pics/`.
    pub fn find_pic(&mut self, ri: &mut dyn RefImport, name: &str) -> Option<ImageHandle> {
        match name.strip_prefix('/').or_else(|| name.strip_prefix('\\')) {
            Some(full) => self.find_image(ri, full, ImageType::Pic),
            None => self.find_image(ri, &format!("pics/{}.pcx", name), ImageType::Pic),
        }
    }

    pub fn register_skin(&mut self, ri: &mut dyn RefImport, name: &str) -> Option<ImageHandle> {
        self.find_image(ri, name, ImageType::Skin)
    }

    /// Drop images not touched since the last registration started. Pics
    /// and the notexture image are kept.
    pub fn free_unused(&mut self) {
        let seq = self.registration_sequence;
        if let Some(nt) = self.images.get_mut(self.notexture) {
            nt.registration_sequence = seq;
        }
        for img in self.images.iter_mut() {
            if img.registration_sequence == seq || img.registration_sequence == 0 || img.kind == ImageType::Pic {
                continue;
            }
            img.registration_sequence = 0;
            img.mips = Vec::new();
            img.name.clear();
        }
    }

    pub fn image_list(&self, ri: &mut dyn RefImport) {
        ri.con_printf(PRINT_ALL, "------------------\n");
        let mut texels = 0;
        for img in &self.images {
            if img.registration_sequence <= 0 {
                continue;
            }
            texels += img.width * img.height;
            let type_char = match img.kind {
                ImageType::Skin => "M",
                ImageType::Sprite => "S",
                ImageType::Wall => "W",
                ImageType::Pic => "P",
                ImageType::Sky => " ",
            };
            ri.con_printf(PRINT_ALL, &format!("{} {:3} {:3} : {}\n", type_char, img.width, img.height, img.name));
        }
        ri.con_printf(PRINT_ALL, &format!("Total texel count: {}\n", texels));
    }

    pub fn shutdown(&mut self) {
        *self = Self::default();
    }
}

// ============================================================
// Colormap
// ============================================================

/// Light-shading table (64 rows of 256) followed by the translucency
/// table, plus the palette that came with it.
#[derive(Debug, Clone, Default)]
pub struct Colormap {
    pub data: Vec<u8>,
    pub palette: Vec<u8>,
}

impl Colormap {
    pub fn load(ri: &mut dyn RefImport) -> Result<Colormap, RefError> {
        let pic = ri.load_pic(COLORMAP_NAME);
        match pic {
            Some(LoadedPic { pixels, palette: Some(palette), .. }) if pixels.len() >= COLORMAP_LIGHT_ROWS * 256 => {
                Ok(Colormap { data: pixels, palette })
            }
            _ => Err(RefError::Fatal(format!("Couldn't load {}", COLORMAP_NAME))),
        }
    }

    pub fn colormap(&self) -> &[u8] {
        &self.data
    }

    pub fn alphamap(&self) -> &[u8] {
        self.data.get(COLORMAP_LIGHT_ROWS * 256..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sw_import::StdRefImport;

    fn pic(w: i32, h: i32, fill: u8) -> LoadedPic {
        LoadedPic { width: w, height: h, pixels: vec![fill; (w * h) as usize], palette: None }
    }

    // ============================================================
    // notexture
    // ============================================================

    #[test]
    fn test_notexture_checker() {
        let img = notexture_image();
        assert_eq!(img.mips.len(), 4);
        let (m0, w, _) = img.mip(0);
        assert_eq!(w, 16);
        assert_eq!(m0[0], 0xFF);
        assert_eq!(m0[8], 0);
        assert_eq!(m0[8 * 16], 0);
        assert_eq!(m0[8 * 16 + 8], 0xFF);
        let (m3, w3, h3) = img.mip(3);
        assert_eq!((w3, h3), (2, 2));
        assert_eq!(m3, &[0xFF, 0, 0, 0xFF]);
    }

    // ============================================================
    // Lookup and registration
    // ============================================================

    #[test]
    fn test_find_image_loads_once() {
        let mut ri = StdRefImport::new();
        ri.add_pic("textures/e1u1/floor.wal", pic(32, 32, 4));
        let mut table = ImageTable::new();
        let a = table.find_image(&mut ri, "textures/e1u1/floor.wal", ImageType::Wall).unwrap();
        ri.pics.clear();
        let b = table.find_image(&mut ri, "textures/e1u1/floor.wal", ImageType::Wall).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, table.notexture);
        let img = table.get(a).unwrap();
        assert_eq!(img.mips.len(), NUM_MIPS);
        assert_eq!(img.mip(2).1, 8);
    }

    #[test]
    fn test_missing_and_short_names() {
        let mut ri = StdRefImport::new();
        let mut table = ImageTable::new();
        assert_eq!(table.find_image(&mut ri, "a.pc", ImageType::Pic), None);
        assert_eq!(table.find_image(&mut ri, "pics/none.pcx", ImageType::Pic), None);
    }

    #[test]
    fn test_find_pic_prefixes_path() {
        let mut ri = StdRefImport::new();
        ri.add_pic("pics/conback.pcx", pic(8, 8, 1));
        ri.add_pic("env/raw.pcx", pic(8, 8, 2));
        let mut table = ImageTable::new();
        assert!(table.find_pic(&mut ri, "conback").is_some());
        assert!(table.find_pic(&mut ri, "/env/raw.pcx").is_some());
    }

    #[test]
    fn test_transparent_flag() {
        let mut table = ImageTable::new();
        let mut p = pic(4, 4, 3);
        p.pixels[5] = TRANSPARENT_COLOR;
        let h = table.load_pic("sprites/flare.pcx", &p, ImageType::Sprite);
        assert!(table.get(h).unwrap().transparent);
    }

    #[test]
    fn test_free_unused_keeps_pics_and_current() {
        let mut ri = StdRefImport::new();
        ri.add_pic("models/a/skin.pcx", pic(4, 4, 1));
        ri.add_pic("models/b/skin.pcx", pic(4, 4, 1));
        ri.add_pic("pics/num_0.pcx", pic(4, 4, 1));
        let mut table = ImageTable::new();
        let old = table.register_skin(&mut ri, "models/a/skin.pcx").unwrap();
        let hud = table.find_pic(&mut ri, "num_0").unwrap();

        table.registration_sequence += 1;
        let kept = table.register_skin(&mut ri, "models/b/skin.pcx").unwrap();
        table.free_unused();

        assert_eq!(table.images[old].registration_sequence, 0);
        assert_ne!(table.images[hud].registration_sequence, 0);
        assert_ne!(table.images[kept].registration_sequence, 0);
        assert_ne!(table.images[table.notexture].registration_sequence, 0);

        // freed slot is reused
        let again = table.register_skin(&mut ri, "models/a/skin.pcx").unwrap();
        assert_eq!(again, old);
    }

    #[test]
    fn test_image_list_output() {
        let mut ri = StdRefImport::new();
        let mut table = ImageTable::new();
        table.load_pic("models/a/skin.pcx", &pic(4, 2, 1), ImageType::Skin);
        table.image_list(&mut ri);
        assert_eq!(ri.printed[0], "------------------\n");
        assert!(ri.printed.contains(&"M   4   2 : models/a/skin.pcx\n".to_string()));
        assert_eq!(ri.printed.last().unwrap(), "Total texel count: 264\n");
    }

    #[test]
    fn test_wall_load_failure_is_reported() {
        let mut ri = StdRefImport::new();
        let mut table = ImageTable::new();
        assert!(table.find_image(&mut ri, "textures/none.wal", ImageType::Wall).is_none());
        assert_eq!(ri.printed, vec!["R_FindImage: can't load textures/none.wal\n".to_string()]);
    }

    // ============================================================
    // Colormap
    // ============================================================

    #[test]
    fn test_colormap_split() {
        let mut ri = StdRefImport::new();
        let mut p = pic(256, 320, 0);
        p.pixels[64 * 256] = 77;
        p.palette = Some(vec![0; 768]);
        ri.add_pic(COLORMAP_NAME, p);
        let cm = Colormap::load(&mut ri).unwrap();
        assert_eq!(cm.colormap().len(), 256 * 320);
        assert_eq!(cm.alphamap().len(), 65536);
        assert_eq!(cm.alphamap()[0], 77);
    }

    #[test]
    fn test_missing_colormap_is_fatal() {
        let mut ri = StdRefImport::new();
        match Colormap::load(&mut ri) {
            Err(RefError::Fatal(msg)) => assert_eq!(msg, "Couldn't load pics/colormap.pcx"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
