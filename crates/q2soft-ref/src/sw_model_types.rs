// sw_model_types.rs — In-memory world, alias, sprite and image types
//
// The host's loaders build these; `BspWorld::prepare` fills in the derived
// fields (parents, extents, mip adjust) the refresh relies on.

use q2soft_common::q_shared::*;

use crate::sw_local::{MAXLIGHTMAPS, SURF_DRAWTURB, SURF_PLANEBACK};

// ============================================================================
// Images
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Skin,
    Sprite,
    Wall,
    Pic,
    Sky,
}

/// Decoded 8-bit picture as handed over by the host's loaders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedPic {
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u8>,
    /// 768 bytes of RGB when the file carries a palette.
    pub palette: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct Image {
    pub name: String,
    pub kind: ImageType,
    pub width: i32,
    pub height: i32,
    /// Mip levels, each half the size of the previous one.
    pub mips: Vec<Vec<u8>>,
    pub transparent: bool,
    pub registration_sequence: i32,
}

impl Image {
    /// Mip level `mip` clamped to what this image has, with its dimensions.
    pub fn mip(&self, mip: usize) -> (&[u8], i32, i32) {
        let m = mip.min(self.mips.len().saturating_sub(1));
        let w = (self.width >> m).max(1);
        let h = (self.height >> m).max(1);
        (self.mips.get(m).map_or(&[][..], |p| p.as_slice()), w, h)
    }
}

pub type ImageHandle = usize;

// ============================================================================
// Brush models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Node(usize),
    Leaf(usize),
}

#[derive(Debug, Clone)]
pub struct MTexInfo {
    pub vecs: [[f32; 4]; 2],
    pub flags: SurfFlags,
    pub texture: String,
    pub image: Option<ImageHandle>,
    pub mipadjust: f32,
}

impl Default for MTexInfo {
    fn default() -> Self {
        Self {
            vecs: [[0.0; 4]; 2],
            flags: SurfFlags::empty(),
            texture: String::new(),
            image: None,
            mipadjust: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MSurface {
    pub plane: usize,
    /// `SURF_PLANEBACK` and friends.
    pub flags: i32,
    /// Indexes into `BspWorld::vertexes`, in winding order.
    pub verts: Vec<u32>,
    pub texinfo: usize,
    pub texturemins: [i32; 2],
    pub extents: [i32; 2],
    pub styles: [u8; MAXLIGHTMAPS],
    /// Offset into `BspWorld::lightdata`, one byte per sample per style.
    pub samples: Option<usize>,

    pub visframe: i32,
    pub dlightframe: i32,
    pub dlightbits: u32,
}

impl Default for MSurface {
    fn default() -> Self {
        Self {
            plane: 0,
            flags: 0,
            verts: Vec::new(),
            texinfo: 0,
            texturemins: [0; 2],
            extents: [0; 2],
            // 255 ends the style list
            styles: [0, 255, 255, 255],
            samples: None,
            visframe: 0,
            dlightframe: 0,
            dlightbits: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MNode {
    pub plane: usize,
    pub children: [NodeRef; 2],
    pub minmaxs: [f32; 6],
    pub parent: Option<usize>,
    pub firstsurface: usize,
    pub numsurfaces: usize,
    pub visframe: i32,
}

#[derive(Debug, Clone)]
pub struct MLeaf {
    pub contents: i32,
    pub cluster: i32,
    pub area: i32,
    pub minmaxs: [f32; 6],
    pub parent: Option<usize>,
    /// Indexes into `BspWorld::surfaces`.
    pub marksurfaces: Vec<usize>,
    pub visframe: i32,
    pub key: i32,
}

impl Default for MLeaf {
    fn default() -> Self {
        Self {
            contents: 0,
            cluster: -1,
            area: 0,
            minmaxs: [0.0; 6],
            parent: None,
            marksurfaces: Vec::new(),
            visframe: 0,
            key: 0,
        }
    }
}

/// An inline brush model (`*1`, `*2`, ...); model 0 is the world itself.
#[derive(Debug, Clone, Default)]
pub struct MSubModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub headnode: usize,
    pub firstface: usize,
    pub numfaces: usize,
}

/// Compressed cluster visibility.
#[derive(Debug, Clone, Default)]
pub struct VisData {
    pub numclusters: usize,
    /// Byte offset into `data` of each cluster's PVS row.
    pub offsets: Vec<usize>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct BspWorld {
    pub name: String,
    pub planes: Vec<CPlane>,
    pub vertexes: Vec<Vec3>,
    pub texinfo: Vec<MTexInfo>,
    pub surfaces: Vec<MSurface>,
    pub nodes: Vec<MNode>,
    pub leafs: Vec<MLeaf>,
    pub submodels: Vec<MSubModel>,
    pub vis: Option<VisData>,
    pub lightdata: Vec<u8>,
}

impl BspWorld {
    /// Fill in the fields the loader leaves to the refresh: parent links,
    /// texture extents and per-texinfo mip adjustment.
    pub fn prepare(&mut self) {
        for ti in &mut self.texinfo {
            let len1 = (ti.vecs[0][0].powi(2) + ti.vecs[0][1].powi(2) + ti.vecs[0][2].powi(2)).sqrt();
            let len2 = (ti.vecs[1][0].powi(2) + ti.vecs[1][1].powi(2) + ti.vecs[1][2].powi(2)).sqrt();
            let len = (len1 + len2) / 2.0;
            ti.mipadjust = if len < 0.32 {
                4.0
            } else if len < 0.49 {
                3.0
            } else if len < 0.99 {
                2.0
            } else {
                1.0
            };
        }

        for i in 0..self.surfaces.len() {
            self.calc_surface_extents(i);
        }

        if !self.nodes.is_empty() {
            self.set_parent(NodeRef::Node(0), None);
        }
        for sub in &self.submodels {
            if sub.headnode < self.nodes.len() && sub.headnode != 0 {
                // inline models hang off their own roots
                let head = sub.headnode;
                let mut stack = vec![(NodeRef::Node(head), None)];
                while let Some((node, parent)) = stack.pop() {
                    match node {
                        NodeRef::Node(n) => {
                            if self.nodes[n].parent.is_none() {
                                self.nodes[n].parent = parent;
                            }
                            let children = self.nodes[n].children;
                            stack.push((children[0], Some(n)));
                            stack.push((children[1], Some(n)));
                        }
                        NodeRef::Leaf(l) => {
                            if self.leafs[l].parent.is_none() {
                                self.leafs[l].parent = parent;
                            }
                        }
                    }
                }
            }
        }
    }

    fn set_parent(&mut self, root: NodeRef, parent: Option<usize>) {
        let mut stack = vec![(root, parent)];
        while let Some((node, parent)) = stack.pop() {
            match node {
                NodeRef::Node(n) => {
                    self.nodes[n].parent = parent;
                    let children = self.nodes[n].children;
                    stack.push((children[0], Some(n)));
                    stack.push((children[1], Some(n)));
                }
                NodeRef::Leaf(l) => self.leafs[l].parent = parent,
            }
        }
    }

    fn calc_surface_extents(&mut self, index: usize) {
        let surf = &self.surfaces[index];
        let Some(tex) = self.texinfo.get(surf.texinfo) else {
            return;
        };
        let mut mins = [f32::MAX; 2];
        let mut maxs = [f32::MIN; 2];
        for &vi in &surf.verts {
            let Some(v) = self.vertexes.get(vi as usize) else {
                continue;
            };
            for j in 0..2 {
                let val = v[0] * tex.vecs[j][0] + v[1] * tex.vecs[j][1] + v[2] * tex.vecs[j][2] + tex.vecs[j][3];
                mins[j] = mins[j].min(val);
                maxs[j] = maxs[j].max(val);
            }
        }
        let warp = tex.flags.contains(SurfFlags::WARP);
        let surf = &mut self.surfaces[index];
        if surf.verts.is_empty() {
            return;
        }
        if warp {
            // turbulent texturing wraps, so never clamp against the face
            surf.flags |= SURF_DRAWTURB;
            surf.texturemins = [-8192, -8192];
            surf.extents = [16384, 16384];
            return;
        }
        for j in 0..2 {
            let bmin = (mins[j] / 16.0).floor() as i32;
            let bmax = (maxs[j] / 16.0).ceil() as i32;
            surf.texturemins[j] = bmin * 16;
            surf.extents[j] = (bmax - bmin) * 16;
        }
    }

    pub fn node_minmaxs(&self, node: NodeRef) -> &[f32; 6] {
        match node {
            NodeRef::Node(n) => &self.nodes[n].minmaxs,
            NodeRef::Leaf(l) => &self.leafs[l].minmaxs,
        }
    }

    pub fn node_visframe(&self, node: NodeRef) -> i32 {
        match node {
            NodeRef::Node(n) => self.nodes[n].visframe,
            NodeRef::Leaf(l) => self.leafs[l].visframe,
        }
    }

    /// Plane of a face oriented the way the face looks.
    pub fn face_plane(&self, face: usize) -> Option<CPlane> {
        let surf = self.surfaces.get(face)?;
        let plane = *self.planes.get(surf.plane)?;
        if surf.flags & SURF_PLANEBACK != 0 {
            Some(CPlane::new(vector_negate(&plane.normal), -plane.dist))
        } else {
            Some(plane)
        }
    }

    pub fn face_vertices(&self, face: usize, out: &mut Vec<Vec3>) {
        out.clear();
        if let Some(surf) = self.surfaces.get(face) {
            out.extend(surf.verts.iter().filter_map(|&v| self.vertexes.get(v as usize).copied()));
        }
    }

    pub fn face_flags(&self, face: usize) -> SurfFlags {
        self.surfaces
            .get(face)
            .and_then(|s| self.texinfo.get(s.texinfo))
            .map_or(SurfFlags::empty(), |t| t.flags)
    }
}

// ============================================================================
// Alias models
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AliasVertex {
    pub v: [u8; 3],
    pub normal: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct AliasFrame {
    pub name: String,
    pub scale: Vec3,
    pub translate: Vec3,
    pub verts: Vec<AliasVertex>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasTriangle {
    pub index_xyz: [u16; 3],
    pub index_st: [u16; 3],
}

#[derive(Debug, Clone, Default)]
pub struct AliasModel {
    pub skinwidth: i32,
    pub skinheight: i32,
    pub st: Vec<[i16; 2]>,
    pub triangles: Vec<AliasTriangle>,
    pub frames: Vec<AliasFrame>,
    pub skin_names: Vec<String>,
    pub skins: Vec<Option<ImageHandle>>,
}

impl AliasModel {
    pub fn num_verts(&self) -> usize {
        self.frames.first().map_or(0, |f| f.verts.len())
    }
}

// ============================================================================
// Sprites
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SpriteFrame {
    pub width: i32,
    pub height: i32,
    pub origin_x: i32,
    pub origin_y: i32,
    pub name: String,
    pub image: Option<ImageHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct SpriteModel {
    pub frames: Vec<SpriteFrame>,
}

/// What the host's model loader hands back for non-inline names.
#[derive(Debug, Clone)]
pub enum ModelData {
    Alias(AliasModel),
    Sprite(SpriteModel),
}

#[derive(Debug, Clone)]
pub enum ModelKind {
    /// Index into the world's submodel list.
    Brush(usize),
    Alias(AliasModel),
    Sprite(SpriteModel),
}

#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub kind: ModelKind,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub registration_sequence: i32,
}

pub type ModelHandle = usize;

#[cfg(test)]
mod tests {
    use super::*;

    fn one_face_world() -> BspWorld {
        let mut world = BspWorld {
            planes: vec![CPlane::new([1.0, 0.0, 0.0], 64.0)],
            vertexes: vec![[64.0, 0.0, 0.0], [64.0, 32.0, 0.0], [64.0, 32.0, 48.0]],
            texinfo: vec![MTexInfo {
                vecs: [[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
                ..Default::default()
            }],
            surfaces: vec![MSurface { verts: vec![0, 1, 2], ..Default::default() }],
            nodes: vec![MNode {
                plane: 0,
                children: [NodeRef::Leaf(1), NodeRef::Leaf(0)],
                minmaxs: [0.0; 6],
                parent: None,
                firstsurface: 0,
                numsurfaces: 1,
                visframe: 0,
            }],
            leafs: vec![
                MLeaf { contents: CONTENTS_SOLID, ..Default::default() },
                MLeaf { cluster: 0, ..Default::default() },
            ],
            ..Default::default()
        };
        world.prepare();
        world
    }

    #[test]
    fn test_prepare_sets_parents() {
        let world = one_face_world();
        assert_eq!(world.leafs[0].parent, Some(0));
        assert_eq!(world.leafs[1].parent, Some(0));
        assert_eq!(world.nodes[0].parent, None);
    }

    #[test]
    fn test_prepare_extents() {
        let world = one_face_world();
        assert_eq!(world.surfaces[0].texturemins, [0, 0]);
        assert_eq!(world.surfaces[0].extents, [32, 48]);
        assert_eq!(world.texinfo[0].mipadjust, 1.0);
    }

    #[test]
    fn test_face_plane_flips_for_planeback() {
        let mut world = one_face_world();
        world.surfaces[0].flags |= SURF_PLANEBACK;
        let p = world.face_plane(0).unwrap();
        assert_eq!(p.normal, [-1.0, 0.0, 0.0]);
        assert_eq!(p.dist, -64.0);
    }

    #[test]
    fn test_image_mip_clamps() {
        let img = Image {
            name: "pics/x.pcx".into(),
            kind: ImageType::Pic,
            width: 8,
            height: 8,
            mips: vec![vec![1; 64]],
            transparent: false,
            registration_sequence: 0,
        };
        let (pixels, w, h) = img.mip(2);
        assert_eq!((pixels.len(), w, h), (64, 8, 8));
    }
}
