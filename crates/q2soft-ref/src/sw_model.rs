// sw_model.rs — Model registration
//
// The host parses files; this keeps the table of known models, ties their
// textures to the image table and frees what a new map no longer uses.

use q2soft_common::q_shared::*;

use crate::sw_image::ImageTable;
use crate::sw_import::RefImport;
use crate::sw_model_types::*;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    /// Known models; inline brush models of the current map come first.
    pub models: Vec<Model>,
    pub world: Option<BspWorld>,
    pub world_name: String,
    pub registration_sequence: i32,
}

/// Rough resident size, for `modellist`.
fn resident_size(model: &Model, world: Option<&BspWorld>) -> usize {
    match &model.kind {
        ModelKind::Brush(0) => world.map_or(0, |w| {
            w.surfaces.len() * std::mem::size_of::<MSurface>()
                + w.nodes.len() * std::mem::size_of::<MNode>()
                + w.leafs.len() * std::mem::size_of::<MLeaf>()
                + w.vertexes.len() * std::mem::size_of::<Vec3>()
                + w.lightdata.len()
        }),
        ModelKind::Brush(_) => std::mem::size_of::<MSubModel>(),
        ModelKind::Alias(a) => {
            a.frames.iter().map(|f| f.verts.len() * std::mem::size_of::<AliasVertex>()).sum::<usize>()
                + a.triangles.len() * std::mem::size_of::<AliasTriangle>()
                + a.st.len() * 4
        }
        ModelKind::Sprite(s) => s.frames.len() * std::mem::size_of::<SpriteFrame>(),
    }
}

fn alias_bounds(alias: &AliasModel) -> (Vec3, Vec3) {
    let mut mins = [-32.0; 3];
    let mut maxs = [32.0; 3];
    if let Some(f) = alias.frames.first() {
        for i in 0..3 {
            mins[i] = f.translate[i];
            maxs[i] = f.translate[i] + f.scale[i] * 255.0;
        }
    }
    (mins, maxs)
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self { registration_sequence: 1, ..Default::default() }
    }

    pub fn get(&self, handle: ModelHandle) -> Option<&Model> {
        self.models.get(handle)
    }

    /// Load `maps/<map>.bsp` as the world unless it is already loaded.
    /// Returns true when a new world was installed.
    pub fn begin_registration(&mut self, ri: &mut dyn RefImport, images: &mut ImageTable, map: &str) -> bool {
        self.registration_sequence += 1;
        images.registration_sequence = self.registration_sequence;

        let fullname = format!("maps/{}.bsp", map);
        let flushmap = ri.cvar_get("flushmap", "0", 0) != 0.0;

        if self.world.is_some() && self.world_name == fullname && !flushmap {
            self.touch_world(ri, images);
            return false;
        }

        // inline models belong to the old world
        self.models.retain(|m| !matches!(m.kind, ModelKind::Brush(_)));
        self.world = None;
        self.world_name.clear();

        let Some(mut world) = ri.load_world(&fullname) else {
            ri.sys_error(ERR_DROP, &format!("Mod_NumForName: {} not found", fullname));
            return false;
        };
        world.name = fullname.clone();
        world.prepare();

        let inline: Vec<Model> = world
            .submodels
            .iter()
            .enumerate()
            .map(|(i, sub)| Model {
                name: if i == 0 { fullname.clone() } else { format!("*{}", i) },
                kind: ModelKind::Brush(i),
                mins: sub.mins,
                maxs: sub.maxs,
                registration_sequence: self.registration_sequence,
            })
            .collect();
        // handles of the remaining models shift; none are held across a map change
        self.models.splice(0..0, inline);

        self.world = Some(world);
        self.world_name = fullname;
        self.touch_world(ri, images);
        true
    }

    /// Re-register the world's wall textures in the current sequence.
    fn touch_world(&mut self, ri: &mut dyn RefImport, images: &mut ImageTable) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        for ti in &mut world.texinfo {
            if ti.texture.is_empty() {
                continue;
            }
            let name = format!("textures/{}.wal", ti.texture);
            ti.image = Some(images.find_image(ri, &name, ImageType::Wall).unwrap_or(images.notexture));
        }
        let seq = self.registration_sequence;
        for m in &mut self.models {
            if matches!(m.kind, ModelKind::Brush(_)) {
                m.registration_sequence = seq;
            }
        }
    }

    /// Find or load a model and register everything it draws with.
    pub fn register_model(&mut self, ri: &mut dyn RefImport, images: &mut ImageTable, name: &str) -> Option<ModelHandle> {
        if name.is_empty() {
            return None;
        }

        // inline models are grabbed only from worldmodel
        if let Some(num) = name.strip_prefix('*') {
            let idx = num.parse::<usize>().ok().filter(|&i| i >= 1);
            let found = idx.and_then(|i| {
                self.models.iter().position(|m| matches!(m.kind, ModelKind::Brush(b) if b == i))
            });
            if found.is_none() {
                ri.sys_error(ERR_DROP, "bad inline model number");
            }
            return found;
        }

        let handle = match self.models.iter().position(|m| m.name == name) {
            Some(h) => h,
            None => {
                let data = ri.load_model(name)?;
                let (kind, mins, maxs) = match data {
                    ModelData::Alias(a) => {
                        let (mins, maxs) = alias_bounds(&a);
                        (ModelKind::Alias(a), mins, maxs)
                    }
                    ModelData::Sprite(s) => {
                        let r = s.frames.iter().map(|f| f.width.max(f.height)).max().unwrap_or(0) as f32 / 2.0;
                        (ModelKind::Sprite(s), [-r; 3], [r; 3])
                    }
                };
                self.models.push(Model {
                    name: name.chars().take(MAX_QPATH - 1).collect(),
                    kind,
                    mins,
                    maxs,
                    registration_sequence: self.registration_sequence,
                });
                self.models.len() - 1
            }
        };

        let seq = self.registration_sequence;
        let model = &mut self.models[handle];
        model.registration_sequence = seq;
        match &mut model.kind {
            ModelKind::Alias(a) => {
                a.skins = a.skin_names.iter().map(|s| images.find_image(ri, s, ImageType::Skin)).collect();
            }
            ModelKind::Sprite(s) => {
                for f in &mut s.frames {
                    f.image = images.find_image(ri, &f.name, ImageType::Sprite);
                }
            }
            ModelKind::Brush(_) => {}
        }
        Some(handle)
    }

    /// Free models and images the current registration did not touch.
    pub fn end_registration(&mut self, images: &mut ImageTable) {
        let seq = self.registration_sequence;
        self.models.retain(|m| m.registration_sequence == seq || matches!(m.kind, ModelKind::Brush(_)));
        images.free_unused();
    }

    pub fn model_list(&self, ri: &mut dyn RefImport) {
        ri.con_printf(PRINT_ALL, "Loaded models:\n");
        let mut total = 0;
        for m in &self.models {
            if m.name.is_empty() {
                continue;
            }
            let size = resident_size(m, self.world.as_ref());
            ri.con_printf(PRINT_ALL, &format!("{:8} : {}\n", size, m.name));
            total += size;
        }
        ri.con_printf(PRINT_ALL, &format!("Total resident: {}\n", total));
    }

    pub fn free_all(&mut self) {
        self.models.clear();
        self.world = None;
        self.world_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sw_import::StdRefImport;

    fn world_with_submodels(n: usize) -> BspWorld {
        BspWorld {
            texinfo: vec![MTexInfo { texture: "e1u1/floor".into(), ..Default::default() }],
            submodels: (0..n).map(|_| MSubModel { mins: [-8.0; 3], maxs: [8.0; 3], ..Default::default() }).collect(),
            ..Default::default()
        }
    }

    fn alias() -> AliasModel {
        AliasModel {
            frames: vec![AliasFrame { scale: [1.0; 3], translate: [-4.0; 3], ..Default::default() }],
            skin_names: vec!["models/monsters/soldier/skin.pcx".into()],
            ..Default::default()
        }
    }

    fn pic() -> LoadedPic {
        LoadedPic { width: 4, height: 4, pixels: vec![1; 16], palette: None }
    }

    #[test]
    fn test_world_registration_creates_inline_models() {
        let mut ri = StdRefImport::new();
        ri.add_world("maps/base1.bsp", world_with_submodels(3));
        ri.add_pic("textures/e1u1/floor.wal", pic());
        let mut images = ImageTable::new();
        let mut reg = ModelRegistry::new();

        assert!(reg.begin_registration(&mut ri, &mut images, "base1"));
        assert_eq!(reg.world_name, "maps/base1.bsp");
        let world = reg.world.as_ref().unwrap();
        assert!(world.texinfo[0].image.is_some());
        assert_ne!(world.texinfo[0].image, Some(images.notexture));

        let h = reg.register_model(&mut ri, &mut images, "*2").unwrap();
        assert!(matches!(reg.get(h).unwrap().kind, ModelKind::Brush(2)));
        assert_eq!(reg.get(h).unwrap().name, "*2");

        // same map again keeps the world
        assert!(!reg.begin_registration(&mut ri, &mut images, "base1"));
        assert!(reg.world.is_some());
    }

    #[test]
    fn test_bad_inline_number_is_an_error() {
        let mut ri = StdRefImport::new();
        ri.add_world("maps/base1.bsp", world_with_submodels(2));
        let mut images = ImageTable::new();
        let mut reg = ModelRegistry::new();
        reg.begin_registration(&mut ri, &mut images, "base1");
        assert!(reg.register_model(&mut ri, &mut images, "*5").is_none());
        assert_eq!(ri.errors, vec!["bad inline model number".to_string()]);
    }

    #[test]
    fn test_missing_wall_texture_uses_notexture() {
        let mut ri = StdRefImport::new();
        ri.add_world("maps/q2dm1.bsp", world_with_submodels(1));
        let mut images = ImageTable::new();
        let mut reg = ModelRegistry::new();
        reg.begin_registration(&mut ri, &mut images, "q2dm1");
        assert_eq!(reg.world.as_ref().unwrap().texinfo[0].image, Some(images.notexture));
    }

    #[test]
    fn test_missing_world_is_dropped() {
        let mut ri = StdRefImport::new();
        let mut images = ImageTable::new();
        let mut reg = ModelRegistry::new();
        assert!(!reg.begin_registration(&mut ri, &mut images, "nowhere"));
        assert!(reg.world.is_none());
        assert_eq!(ri.errors, vec!["Mod_NumForName: maps/nowhere.bsp not found".to_string()]);
    }

    #[test]
    fn test_alias_model_registers_skins_once() {
        let mut ri = StdRefImport::new();
        ri.add_model("models/monsters/soldier/tris.md2", ModelData::Alias(alias()));
        ri.add_pic("models/monsters/soldier/skin.pcx", pic());
        let mut images = ImageTable::new();
        let mut reg = ModelRegistry::new();

        let a = reg.register_model(&mut ri, &mut images, "models/monsters/soldier/tris.md2").unwrap();
        let b = reg.register_model(&mut ri, &mut images, "models/monsters/soldier/tris.md2").unwrap();
        assert_eq!(a, b);
        let ModelKind::Alias(model) = &reg.get(a).unwrap().kind else {
            panic!("not an alias model");
        };
        assert!(model.skins[0].is_some());
        assert_eq!(reg.get(a).unwrap().mins, [-4.0; 3]);
        assert!(reg.register_model(&mut ri, &mut images, "models/none.md2").is_none());
    }

    #[test]
    fn test_end_registration_frees_stale_models() {
        let mut ri = StdRefImport::new();
        ri.add_world("maps/base1.bsp", world_with_submodels(1));
        ri.add_model("models/a.md2", ModelData::Alias(alias()));
        ri.add_model("sprites/s.sp2", ModelData::Sprite(SpriteModel::default()));
        let mut images = ImageTable::new();
        let mut reg = ModelRegistry::new();

        reg.begin_registration(&mut ri, &mut images, "base1");
        reg.register_model(&mut ri, &mut images, "models/a.md2");
        reg.end_registration(&mut images);

        reg.begin_registration(&mut ri, &mut images, "base1");
        reg.register_model(&mut ri, &mut images, "sprites/s.sp2");
        reg.end_registration(&mut images);

        assert!(reg.models.iter().all(|m| m.name != "models/a.md2"));
        assert!(reg.models.iter().any(|m| m.name == "sprites/s.sp2"));
        assert!(reg.models.iter().any(|m| m.name == "maps/base1.bsp"));
    }
}
