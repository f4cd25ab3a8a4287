// sw_bsp.rs — Visibility marking, frustum culling and BSP traversal
//
// PVS marking stamps leaves and their ancestors with the current visibility
// frame. The world walk then goes front to back, refining frustum clip
// flags per node and handing visible faces to the edge tables. Brush
// entities enter the tree at the first node that splits their bounds.

use q2soft_common::q_shared::*;

use crate::sw_edge::{EdgeTables, FaceInput, SurfSource};
use crate::sw_light;
use crate::sw_local::*;
use crate::sw_model_types::{BspWorld, NodeRef};
use crate::sw_refdef::RefDef;
use crate::sw_sky::SkyState;

// ============================================================
// PVS
// ============================================================

/// Expand one run-length compressed PVS row. Zero bytes are followed by a
/// count of zero bytes to emit. `None` means no visibility data: every
/// cluster is visible.
pub fn decompress_vis(compressed: Option<&[u8]>, numclusters: usize) -> Vec<u8> {
    let row = (numclusters + 7) >> 3;
    let Some(input) = compressed else {
        return vec![0xFF; row];
    };

    let mut out = Vec::with_capacity(row);
    let mut i = 0;
    while out.len() < row && i < input.len() {
        if input[i] != 0 {
            out.push(input[i]);
            i += 1;
            continue;
        }
        let count = input.get(i + 1).copied().unwrap_or(0) as usize;
        i += 2;
        let zeros = count.min(row - out.len());
        out.resize(out.len() + zeros, 0);
    }
    out.resize(row, 0);
    out
}

/// Decompressed PVS row for `cluster`.
pub fn cluster_pvs(world: &BspWorld, cluster: i32) -> Vec<u8> {
    let numclusters = world.vis.as_ref().map_or(world.leafs.len(), |v| v.numclusters);
    match &world.vis {
        Some(vis) if cluster >= 0 => {
            let data = vis.offsets.get(cluster as usize).and_then(|&ofs| vis.data.get(ofs..));
            decompress_vis(data, vis.numclusters)
        }
        _ => decompress_vis(None, numclusters),
    }
}

/// Visibility stamping state kept beside the world.
#[derive(Debug, Clone)]
pub struct VisState {
    pub visframecount: i32,
    pub viewcluster: i32,
    pub oldviewcluster: i32,
}

impl Default for VisState {
    fn default() -> Self {
        Self { visframecount: 0, viewcluster: -1, oldviewcluster: -1 }
    }
}

impl VisState {
    /// Force the next frame to mark leaves again.
    pub fn new_map(&mut self) {
        self.viewcluster = -1;
        self.oldviewcluster = -1;
    }

    /// Stamp every leaf in the view cluster's PVS, and its ancestors, with a
    /// new visibility frame. Returns false when nothing needed redoing.
    pub fn mark_visible(&mut self, world: &mut BspWorld, novis: bool, lockpvs: bool) -> bool {
        if self.oldviewcluster == self.viewcluster && !novis && self.viewcluster != -1 {
            return false;
        }

        // development aid to let you run around and see where the pvs ends
        if lockpvs {
            return false;
        }

        self.visframecount += 1;
        self.oldviewcluster = self.viewcluster;
        let stamp = self.visframecount;

        if novis || self.viewcluster == -1 || world.vis.is_none() {
            for leaf in &mut world.leafs {
                leaf.visframe = stamp;
            }
            for node in &mut world.nodes {
                node.visframe = stamp;
            }
            return true;
        }

        let vis = cluster_pvs(world, self.viewcluster);

        for i in 0..world.leafs.len() {
            let cluster = world.leafs[i].cluster;
            if cluster < 0 {
                continue;
            }
            let c = cluster as usize;
            if !vis.get(c >> 3).is_some_and(|b| b & (1 << (c & 7)) != 0) {
                continue;
            }
            if world.leafs[i].visframe == stamp {
                continue;
            }
            world.leafs[i].visframe = stamp;
            let mut parent = world.leafs[i].parent;
            while let Some(n) = parent {
                if world.nodes[n].visframe == stamp {
                    break;
                }
                world.nodes[n].visframe = stamp;
                parent = world.nodes[n].parent;
            }
        }
        true
    }
}

/// Leaf containing `p`.
pub fn point_in_leaf(world: &BspWorld, p: &Vec3) -> Option<usize> {
    if world.nodes.is_empty() {
        return if world.leafs.is_empty() { None } else { Some(0) };
    }
    let mut node = NodeRef::Node(0);
    loop {
        match node {
            NodeRef::Leaf(l) => return Some(l),
            NodeRef::Node(n) => {
                let mnode = world.nodes.get(n)?;
                let plane = world.planes.get(mnode.plane)?;
                node = if plane.distance(p) > 0.0 { mnode.children[0] } else { mnode.children[1] };
            }
        }
    }
}

// ============================================================
// Frustum tests
// ============================================================

fn corner(minmaxs: &[f32; 6], idx: &[usize]) -> Vec3 {
    [minmaxs[idx[0]], minmaxs[idx[1]], minmaxs[idx[2]]]
}

fn clip_flags_traced(
    minmaxs: &[f32; 6],
    planes: &[ClipPlane; 4],
    indexes: &[[usize; 6]; 4],
    on_test: &mut dyn FnMut(usize),
) -> i32 {
    let mut clipflags = 0;
    for i in 0..4 {
        on_test(i);
        let pindex = &indexes[i];

        let rejectpt = corner(minmaxs, &pindex[0..3]);
        if planes[i].distance(&rejectpt) <= 0.0 {
            return BMODEL_FULLY_CLIPPED;
        }

        let acceptpt = corner(minmaxs, &pindex[3..6]);
        if planes[i].distance(&acceptpt) <= 0.0 {
            clipflags |= 1 << i;
        }
    }
    clipflags
}

/// Which of the four frustum planes a box (`mins` then `maxs`) may cross,
/// or `BMODEL_FULLY_CLIPPED` as soon as one plane rejects it.
pub fn compute_clip_flags(minmaxs: &[f32; 6], view: &ViewState) -> i32 {
    clip_flags_traced(minmaxs, &view.clip_planes, &view.frustum_indexes, &mut |_| {})
}

/// First node whose plane splits the box, or the non-solid leaf holding it.
pub fn find_top_node(world: &BspWorld, mins: &Vec3, maxs: &Vec3, visframecount: i32) -> Option<NodeRef> {
    if world.nodes.is_empty() {
        return None;
    }
    let mut node = NodeRef::Node(0);
    loop {
        if world.node_visframe(node) != visframecount {
            return None;
        }
        match node {
            NodeRef::Leaf(l) => {
                return (world.leafs[l].contents != CONTENTS_SOLID).then_some(node);
            }
            NodeRef::Node(n) => {
                let mnode = &world.nodes[n];
                let plane = world.planes.get(mnode.plane)?;
                let sides = box_on_plane_side(mins, maxs, plane);
                if sides == 3 {
                    return Some(node);
                }
                node = if sides & 1 != 0 { mnode.children[0] } else { mnode.children[1] };
            }
        }
    }
}

/// Axis-aligned box enclosing `mins`/`maxs` rotated by `angles`.
pub fn rotated_bbox(mins: &Vec3, maxs: &Vec3, angles: &Vec3) -> (Vec3, Vec3) {
    if angles[0] == 0.0 && angles[1] == 0.0 && angles[2] == 0.0 {
        return (*mins, *maxs);
    }

    let mut tmins = [99999.0f32; 3];
    let mut tmaxs = [-99999.0f32; 3];
    let (forward, right, up) = angle_vectors(angles);

    for i in 0..8 {
        let tmp = [
            if i & 1 != 0 { mins[0] } else { maxs[0] },
            if i & 2 != 0 { mins[1] } else { maxs[1] },
            if i & 4 != 0 { mins[2] } else { maxs[2] },
        ];
        let mut v = vector_scale(&forward, tmp[0]);
        v = vector_ma(&v, -tmp[1], &right);
        v = vector_ma(&v, tmp[2], &up);
        add_point_to_bounds(&v, &mut tmins, &mut tmaxs);
    }
    (tmins, tmaxs)
}

// ============================================================
// World and brush entity traversal
// ============================================================

/// A translucent face held back for the alpha pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaSurface {
    pub face: usize,
    pub basis: u32,
    pub entity: Option<u32>,
}

/// Everything a BSP walk touches for one frame.
pub struct WorldPass<'a> {
    pub world: &'a mut BspWorld,
    pub view: &'a ViewState,
    pub edges: &'a mut EdgeTables,
    pub sky: &'a mut SkyState,
    pub alpha_surfaces: &'a mut Vec<AlphaSurface>,
    pub fd: &'a RefDef,
    pub framecount: i32,
    pub visframecount: i32,
    pub drawnodes: usize,
    verts: Vec<Vec3>,
}

impl<'a> WorldPass<'a> {
    pub fn new(
        world: &'a mut BspWorld,
        view: &'a ViewState,
        edges: &'a mut EdgeTables,
        sky: &'a mut SkyState,
        alpha_surfaces: &'a mut Vec<AlphaSurface>,
        fd: &'a RefDef,
        framecount: i32,
        visframecount: i32,
    ) -> Self {
        Self {
            world,
            view,
            edges,
            sky,
            alpha_surfaces,
            fd,
            framecount,
            visframecount,
            drawnodes: 0,
            verts: Vec::new(),
        }
    }

    pub fn render_world(&mut self) {
        if self.world.nodes.is_empty() {
            return;
        }
        self.edges.current_basis = 0;
        self.edges.current_entity = None;
        self.edges.insubmodel = false;
        self.recursive_world_node(NodeRef::Node(0), 15);
    }

    fn recursive_world_node(&mut self, node: NodeRef, mut clipflags: i32) {
        if let NodeRef::Leaf(l) = node {
            if self.world.leafs[l].contents == CONTENTS_SOLID {
                return;
            }
        }
        if self.world.node_visframe(node) != self.visframecount {
            return;
        }

        // cull the clipping planes if not trivially accepted
        if clipflags != 0 {
            let minmaxs = *self.world.node_minmaxs(node);
            for i in 0..4 {
                if clipflags & (1 << i) == 0 {
                    continue;
                }
                let pindex = &self.view.frustum_indexes[i];
                let plane = &self.view.clip_planes[i];

                if plane.distance(&corner(&minmaxs, &pindex[0..3])) <= 0.0 {
                    return;
                }
                if plane.distance(&corner(&minmaxs, &pindex[3..6])) >= 0.0 {
                    // node is entirely on screen for this plane
                    clipflags &= !(1 << i);
                }
            }
        }

        self.drawnodes += 1;

        match node {
            NodeRef::Leaf(l) => {
                let leaf = &mut self.world.leafs[l];
                if !self.fd.area_visible(leaf.area) {
                    return;
                }
                for &mark in &leaf.marksurfaces {
                    if let Some(surf) = self.world.surfaces.get_mut(mark) {
                        surf.visframe = self.framecount;
                    }
                }
                let leaf = &mut self.world.leafs[l];
                leaf.key = self.edges.current_key;
                // all bmodels in a leaf share the same key
                self.edges.current_key += 1;
            }
            NodeRef::Node(n) => {
                let (plane_idx, children, first, count) = {
                    let mnode = &self.world.nodes[n];
                    (mnode.plane, mnode.children, mnode.firstsurface, mnode.numsurfaces)
                };
                let Some(plane) = self.world.planes.get(plane_idx).copied() else {
                    return;
                };
                let dot = plane.distance(&self.view.world.origin);
                let side = if dot >= 0.0 { 0 } else { 1 };

                self.recursive_world_node(children[side], clipflags);

                if count > 0 {
                    for face in first..first + count {
                        let Some(surf) = self.world.surfaces.get(face) else {
                            break;
                        };
                        if surf.visframe != self.framecount {
                            continue;
                        }
                        let back = surf.flags & SURF_PLANEBACK != 0;
                        if (back && dot < -BACKFACE_EPSILON) || (!back && dot > BACKFACE_EPSILON) {
                            self.render_world_face(face, clipflags);
                        }
                    }
                    // all surfaces on the same node share the same sequence number
                    self.edges.current_key += 1;
                }

                self.recursive_world_node(children[1 - side], clipflags);
            }
        }
    }

    /// Route one BSP face: translucent faces wait for the alpha pass, sky
    /// faces bring in the sky box, everything else enters the edge tables.
    fn render_world_face(&mut self, face: usize, clipflags: i32) {
        let texflags = self.world.face_flags(face);
        if texflags.contains(SurfFlags::NODRAW) {
            return;
        }
        if texflags.intersects(SurfFlags::TRANS33 | SurfFlags::TRANS66) {
            self.alpha_surfaces.push(AlphaSurface {
                face,
                basis: self.edges.current_basis,
                entity: self.edges.current_entity,
            });
            return;
        }
        if texflags.contains(SurfFlags::SKY) {
            if !self.edges.insubmodel {
                self.sky.emit(self.edges, self.view, self.framecount);
            }
            return;
        }

        let mut verts = std::mem::take(&mut self.verts);
        self.world.face_vertices(face, &mut verts);
        self.emit_polygon(face, &verts, clipflags);
        self.verts = verts;
    }

    fn emit_polygon(&mut self, face: usize, verts: &[Vec3], clipflags: i32) {
        let surf = &self.world.surfaces[face];
        let Some(plane) = self.world.planes.get(surf.plane) else {
            return;
        };
        let input = FaceInput {
            verts,
            normal: plane.normal,
            dist: plane.dist,
            flags: surf.flags,
            source: SurfSource::World(face as u32),
        };
        self.edges.render_face(self.view, &input, clipflags);
    }

    /// Add the faces of inline brush models in `entities` (entity index,
    /// submodel index) to the edge tables.
    pub fn draw_brush_entities(&mut self, entities: &[(u32, usize)]) {
        let fd = self.fd;
        self.edges.insubmodel = true;

        for &(ent_idx, submodel) in entities {
            let Some(ent) = fd.entities.get(ent_idx as usize) else {
                continue;
            };
            let Some(sub) = self.world.submodels.get(submodel).cloned() else {
                continue;
            };
            if sub.numfaces == 0 {
                // clip brush only
                continue;
            }

            let (mins, maxs) = rotated_bbox(&sub.mins, &sub.maxs, &ent.angles);
            let mins = vector_add(&mins, &ent.origin);
            let maxs = vector_add(&maxs, &ent.origin);
            let minmaxs = [mins[0], mins[1], mins[2], maxs[0], maxs[1], maxs[2]];

            let clipflags = compute_clip_flags(&minmaxs, self.view);
            if clipflags == BMODEL_FULLY_CLIPPED {
                continue;
            }
            let Some(topnode) = find_top_node(self.world, &mins, &maxs, self.visframecount) else {
                continue;
            };

            let axes = angle_vectors(&ent.angles);
            let basis = self.view.world.into_model_space(&ent.origin, &axes);
            self.edges.current_basis = self.edges.push_basis(basis);
            self.edges.current_entity = Some(ent_idx);

            // dynamic lights in the model's own space
            if sub.headnode < self.world.nodes.len() {
                sw_light::push_dlights(
                    self.world,
                    NodeRef::Node(sub.headnode),
                    &fd.dlights,
                    &ent.origin,
                    self.framecount,
                );
            }

            let faces = sub.firstface..sub.firstface + sub.numfaces;
            match topnode {
                NodeRef::Node(_) => self.draw_clipped_submodel(faces, &basis, &ent.origin, &axes, topnode, clipflags),
                NodeRef::Leaf(l) => {
                    // falls entirely in one leaf: let 1/z sorting order it
                    let key = self.world.leafs[l].key;
                    for face in faces {
                        if self.submodel_face_visible(face, &basis) {
                            self.edges.current_key = key;
                            self.render_world_face(face, clipflags);
                        }
                    }
                }
            }
        }

        // back to the world orientation
        self.edges.current_basis = 0;
        self.edges.current_entity = None;
        self.edges.insubmodel = false;
    }

    fn submodel_face_visible(&self, face: usize, basis: &ViewBasis) -> bool {
        let Some(surf) = self.world.surfaces.get(face) else {
            return false;
        };
        let Some(plane) = self.world.planes.get(surf.plane) else {
            return false;
        };
        let dot = dot_product(&basis.origin, &plane.normal) - plane.dist;
        let back = surf.flags & SURF_PLANEBACK != 0;
        (back && dot < -BACKFACE_EPSILON) || (!back && dot > BACKFACE_EPSILON)
    }

    fn draw_clipped_submodel(
        &mut self,
        faces: std::ops::Range<usize>,
        basis: &ViewBasis,
        origin: &Vec3,
        axes: &(Vec3, Vec3, Vec3),
        topnode: NodeRef,
        clipflags: i32,
    ) {
        let special = SurfFlags::TRANS33 | SurfFlags::TRANS66 | SurfFlags::SKY | SurfFlags::NODRAW;
        for face in faces {
            if !self.submodel_face_visible(face, basis) {
                continue;
            }
            if self.world.face_flags(face).intersects(special) {
                self.render_world_face(face, clipflags);
                continue;
            }
            let mut verts = Vec::new();
            self.world.face_vertices(face, &mut verts);
            self.recursive_clip_bpoly(face, verts, topnode, origin, axes, clipflags);
        }
    }

    /// Split a model-space polygon by the world tree, emitting each piece
    /// keyed by the leaf it lands in.
    fn recursive_clip_bpoly(
        &mut self,
        face: usize,
        verts: Vec<Vec3>,
        node: NodeRef,
        origin: &Vec3,
        axes: &(Vec3, Vec3, Vec3),
        clipflags: i32,
    ) {
        let NodeRef::Node(n) = node else {
            return;
        };
        let (plane_idx, children) = (self.world.nodes[n].plane, self.world.nodes[n].children);
        let Some(plane) = self.world.planes.get(plane_idx) else {
            return;
        };

        // the splitting plane in model space
        let (f, r, u) = axes;
        let normal = [dot_product(&plane.normal, f), -dot_product(&plane.normal, r), dot_product(&plane.normal, u)];
        let dist = plane.dist - dot_product(origin, &plane.normal);

        let (front, back) = split_polygon(&verts, &normal, dist);

        for (side, piece) in [front, back].into_iter().enumerate() {
            if piece.len() < 3 {
                continue;
            }
            let child = children[side];
            if self.world.node_visframe(child) != self.visframecount {
                continue;
            }
            match child {
                NodeRef::Leaf(l) => {
                    let leaf = &self.world.leafs[l];
                    if leaf.contents == CONTENTS_SOLID || !self.fd.area_visible(leaf.area) {
                        continue;
                    }
                    self.edges.current_key = leaf.key;
                    self.emit_polygon(face, &piece, clipflags);
                }
                NodeRef::Node(_) => self.recursive_clip_bpoly(face, piece, child, origin, axes, clipflags),
            }
        }
    }
}

/// Split a convex polygon by a plane. Points on the plane go to both sides.
pub fn split_polygon(verts: &[Vec3], normal: &Vec3, dist: f32) -> (Vec<Vec3>, Vec<Vec3>) {
    const ON_EPSILON: f32 = 0.01;
    let mut front = Vec::with_capacity(verts.len() + 1);
    let mut back = Vec::with_capacity(verts.len() + 1);
    let n = verts.len();
    for i in 0..n {
        let p0 = &verts[i];
        let p1 = &verts[(i + 1) % n];
        let d0 = dot_product(p0, normal) - dist;
        let d1 = dot_product(p1, normal) - dist;

        if d0 >= -ON_EPSILON {
            front.push(*p0);
        }
        if d0 <= ON_EPSILON {
            back.push(*p0);
        }

        if (d0 > ON_EPSILON && d1 < -ON_EPSILON) || (d0 < -ON_EPSILON && d1 > ON_EPSILON) {
            let frac = d0 / (d0 - d1);
            let mid = [
                p0[0] + frac * (p1[0] - p0[0]),
                p0[1] + frac * (p1[1] - p0[1]),
                p0[2] + frac * (p1[2] - p0[2]),
            ];
            front.push(mid);
            back.push(mid);
        }
    }
    (front, back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sw_model_types::{MLeaf, MNode, VisData};

    /// Two leaves split by x = 0; leaf 0 (x > 0) is cluster 0, leaf 1 is
    /// cluster 1. Cluster 0 sees only itself.
    fn two_leaf_world() -> BspWorld {
        let mut world = BspWorld {
            planes: vec![CPlane::new([1.0, 0.0, 0.0], 0.0)],
            nodes: vec![MNode {
                plane: 0,
                children: [NodeRef::Leaf(0), NodeRef::Leaf(1)],
                minmaxs: [-64.0, -64.0, -64.0, 64.0, 64.0, 64.0],
                parent: None,
                firstsurface: 0,
                numsurfaces: 0,
                visframe: 0,
            }],
            leafs: vec![
                MLeaf { cluster: 0, minmaxs: [0.0, -64.0, -64.0, 64.0, 64.0, 64.0], ..Default::default() },
                MLeaf { cluster: 1, minmaxs: [-64.0, -64.0, -64.0, 0.0, 64.0, 64.0], ..Default::default() },
            ],
            vis: Some(VisData { numclusters: 2, offsets: vec![0, 1], data: vec![0b01, 0b11] }),
            ..Default::default()
        };
        world.prepare();
        world
    }

    fn test_view() -> ViewState {
        let mut view = ViewState::default();
        view.setup(VRect { x: 0, y: 0, width: 320, height: 200 }, 90.0, &[0.0; 3], &[0.0; 3]);
        view
    }

    // ============================================================
    // PVS
    // ============================================================

    #[test]
    fn test_decompress_vis_runs() {
        // 20 clusters -> 3 bytes; 0x00 0x02 expands to two zero bytes
        let out = decompress_vis(Some(&[0x00, 0x02, 0x81]), 20);
        assert_eq!(out, vec![0, 0, 0x81]);
    }

    #[test]
    fn test_decompress_vis_without_data_is_all_visible() {
        assert_eq!(decompress_vis(None, 9), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_decompress_vis_short_input_pads() {
        assert_eq!(decompress_vis(Some(&[0x05]), 24), vec![0x05, 0, 0]);
    }

    #[test]
    fn test_mark_visible_stamps_pvs_only() {
        let mut world = two_leaf_world();
        let mut vis = VisState { viewcluster: 0, ..Default::default() };
        assert!(vis.mark_visible(&mut world, false, false));
        assert_eq!(world.leafs[0].visframe, vis.visframecount);
        assert_ne!(world.leafs[1].visframe, vis.visframecount);
        assert_eq!(world.nodes[0].visframe, vis.visframecount);
    }

    #[test]
    fn test_mark_visible_is_idempotent() {
        let mut world = two_leaf_world();
        let mut vis = VisState { viewcluster: 1, ..Default::default() };
        assert!(vis.mark_visible(&mut world, false, false));
        let stamp = vis.visframecount;
        assert!(!vis.mark_visible(&mut world, false, false));
        assert_eq!(vis.visframecount, stamp);
    }

    #[test]
    fn test_novis_marks_everything() {
        let mut world = two_leaf_world();
        let mut vis = VisState { viewcluster: 0, ..Default::default() };
        vis.mark_visible(&mut world, true, false);
        assert!(world.leafs.iter().all(|l| l.visframe == vis.visframecount));
    }

    #[test]
    fn test_lockpvs_freezes_marking() {
        let mut world = two_leaf_world();
        let mut vis = VisState { viewcluster: 0, ..Default::default() };
        vis.mark_visible(&mut world, false, false);
        vis.viewcluster = 1;
        assert!(!vis.mark_visible(&mut world, false, true));
        assert_ne!(world.leafs[1].visframe, vis.visframecount);
    }

    #[test]
    fn test_point_in_leaf() {
        let world = two_leaf_world();
        assert_eq!(point_in_leaf(&world, &[10.0, 0.0, 0.0]), Some(0));
        assert_eq!(point_in_leaf(&world, &[-10.0, 0.0, 0.0]), Some(1));
    }

    // ============================================================
    // Clipping
    // ============================================================

    #[test]
    fn test_clip_flags_short_circuit() {
        let view = test_view();
        // behind the viewer: the left plane already rejects it
        let minmaxs = [-200.0, -10.0, -10.0, -100.0, 10.0, 10.0];
        let mut tested = Vec::new();
        let flags = clip_flags_traced(&minmaxs, &view.clip_planes, &view.frustum_indexes, &mut |i| tested.push(i));
        assert_eq!(flags, BMODEL_FULLY_CLIPPED);
        assert_eq!(tested, vec![0]);
    }

    #[test]
    fn test_clip_flags_inside_and_crossing() {
        let view = test_view();
        assert_eq!(compute_clip_flags(&[100.0, -1.0, -1.0, 110.0, 1.0, 1.0], &view), 0);
        // pokes out past the left edge only
        let flags = compute_clip_flags(&[100.0, -1.0, -1.0, 110.0, 200.0, 1.0], &view);
        assert_eq!(flags, 1);
    }

    #[test]
    fn test_rotated_bbox_zero_angles_unchanged() {
        let mins = [-3.5, 2.0, -8.25];
        let maxs = [4.0, 9.5, 1.0];
        assert_eq!(rotated_bbox(&mins, &maxs, &[0.0; 3]), (mins, maxs));
    }

    #[test]
    fn test_rotated_bbox_yaw_expands() {
        let (mins, maxs) = rotated_bbox(&[-10.0, -1.0, -1.0], &[10.0, 1.0, 1.0], &[0.0, 45.0, 0.0]);
        assert!(maxs[1] > 1.0);
        assert!(mins[1] < -1.0);
        assert!(maxs[0] < 10.0);
    }

    #[test]
    fn test_find_top_node() {
        let mut world = two_leaf_world();
        let mut vis = VisState { viewcluster: 1, ..Default::default() };
        vis.mark_visible(&mut world, false, false);
        let f = vis.visframecount;
        assert_eq!(find_top_node(&world, &[-8.0, -8.0, -8.0], &[8.0, 8.0, 8.0], f), Some(NodeRef::Node(0)));
        assert_eq!(find_top_node(&world, &[4.0, -8.0, -8.0], &[8.0, 8.0, 8.0], f), Some(NodeRef::Leaf(0)));
        // stale stamp means not visible at all
        assert_eq!(find_top_node(&world, &[4.0, -8.0, -8.0], &[8.0, 8.0, 8.0], f + 1), None);
    }

    #[test]
    fn test_find_top_node_rejects_solid() {
        let mut world = two_leaf_world();
        world.leafs[1].contents = CONTENTS_SOLID;
        let mut vis = VisState::default();
        vis.mark_visible(&mut world, true, false);
        let f = vis.visframecount;
        assert_eq!(find_top_node(&world, &[-8.0, -8.0, -8.0], &[-4.0, 8.0, 8.0], f), None);
    }

    #[test]
    fn test_split_polygon() {
        let square = vec![[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]];
        let (front, back) = split_polygon(&square, &[1.0, 0.0, 0.0], 0.0);
        assert_eq!(front.len(), 4);
        assert_eq!(back.len(), 4);
        assert!(front.iter().all(|p| p[0] >= -0.01));
        assert!(back.iter().all(|p| p[0] <= 0.01));
    }
}
