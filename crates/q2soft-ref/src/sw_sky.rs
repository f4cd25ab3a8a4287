// sw_sky.rs — Sky box
//
// The sky is a 256 unit cube centred on the eye. Its six faces go through
// the edge tables like any other surface, at a key behind all world
// geometry, the first time a sky face is seen in a frame.

use q2soft_common::q_shared::*;

use crate::sw_edge::{EdgeTables, FaceInput, SurfSource};
use crate::sw_local::*;
use crate::sw_model_types::ImageHandle;

const SKY_SUFFIXES: [&str; 6] = ["rt", "bk", "lf", "ft", "up", "dn"];

/// Which image suffix each box face shows.
const SKY_SIDE_IMAGE: [usize; 6] = [5, 2, 4, 1, 0, 3];

/// Texture axes of each face.
const BOX_VECS: [[Vec3; 2]; 6] = [
    [[0.0, -1.0, 0.0], [-1.0, 0.0, 0.0]],
    [[0.0, 1.0, 0.0], [0.0, 0.0, -1.0]],
    [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0]],
    [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
    [[0.0, -1.0, 0.0], [0.0, 0.0, -1.0]],
    [[-1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
];

/// (axis, side) of each face plane.
const SKYBOX_PLANES: [(usize, f32); 6] = [(2, -1.0), (0, -1.0), (2, 1.0), (1, 1.0), (0, 1.0), (1, -1.0)];

const SKY_HALF: f32 = 128.0;

/// Texture mapping of one box face for the current eye position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyFaceTex {
    pub vecs: [[f32; 4]; 2],
    pub texturemins: [i32; 2],
    pub extents: [i32; 2],
    pub image: Option<ImageHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct SkyState {
    pub name: String,
    /// Stored for the host; the box is drawn unrotated.
    pub rotate: f32,
    pub axis: Vec3,
    pub images: [Option<ImageHandle>; 6],
    pub skyframe: i32,
    origin: Vec3,
}

impl SkyState {
    pub fn new() -> Self {
        Self { skyframe: -1, ..Default::default() }
    }

    /// Image paths of the six faces, in face order.
    pub fn image_names(name: &str) -> [String; 6] {
        std::array::from_fn(|i| format!("env/{}{}.pcx", name, SKY_SUFFIXES[SKY_SIDE_IMAGE[i]]))
    }

    pub fn set_sky(
        &mut self,
        name: &str,
        rotate: f32,
        axis: &Vec3,
        find_image: &mut dyn FnMut(&str) -> Option<ImageHandle>,
    ) {
        self.name = name.chars().take(63).collect();
        self.rotate = rotate;
        self.axis = *axis;
        let names = Self::image_names(&self.name);
        for (slot, path) in self.images.iter_mut().zip(names.iter()) {
            *slot = find_image(path);
        }
    }

    /// Put the box around the eye into the edge tables, once per frame.
    pub fn emit(&mut self, edges: &mut EdgeTables, view: &ViewState, framecount: i32) {
        if self.skyframe == framecount {
            return;
        }
        self.skyframe = framecount;
        self.origin = view.world.origin;

        let oldkey = edges.current_key;
        let oldbasis = edges.current_basis;
        edges.current_key = SKYBOX_KEY;
        edges.current_basis = 0;

        for side in 0..6 {
            let (verts, normal, dist) = self.face_polygon(side);
            let input = FaceInput {
                verts: &verts,
                normal,
                dist,
                flags: SURF_DRAWSKYBOX,
                source: SurfSource::Sky(side as u8),
            };
            edges.render_face(view, &input, 15);
        }

        edges.current_key = oldkey;
        edges.current_basis = oldbasis;
    }

    /// Corners, plane normal and plane distance of a box face.
    fn face_polygon(&self, side: usize) -> ([Vec3; 4], Vec3, f32) {
        let (axis, sign) = SKYBOX_PLANES[side];
        let a1 = (axis + 1) % 3;
        let a2 = (axis + 2) % 3;
        let mut verts = [self.origin; 4];
        for (k, (d1, d2)) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].into_iter().enumerate() {
            verts[k][axis] += sign * SKY_HALF;
            verts[k][a1] += d1 * SKY_HALF;
            verts[k][a2] += d2 * SKY_HALF;
        }
        let mut normal = [0.0; 3];
        normal[axis] = 1.0;
        (verts, normal, self.origin[axis] + sign * SKY_HALF)
    }

    /// Texture mapping of face `side` as placed for the current frame.
    pub fn face_tex(&self, side: u8) -> Option<SkyFaceTex> {
        let side = side as usize;
        let [s, t] = *BOX_VECS.get(side)?;
        Some(SkyFaceTex {
            vecs: [
                [s[0], s[1], s[2], -dot_product(&self.origin, &s)],
                [t[0], t[1], t[2], -dot_product(&self.origin, &t)],
            ],
            texturemins: [-(SKY_HALF as i32); 2],
            extents: [2 * SKY_HALF as i32; 2],
            image: self.images[side],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sw_edge::span_iter;

    fn setup() -> (ViewState, EdgeTables) {
        let mut view = ViewState::default();
        view.setup(VRect { x: 0, y: 0, width: 64, height: 48 }, 90.0, &[10.0, 20.0, 30.0], &[0.0; 3]);
        let mut edges = EdgeTables::new();
        edges.edges.reserve(0);
        edges.surfaces.reserve(0);
        edges.alloc_mode_tables(64, 48).unwrap();
        edges.begin_edge_frame(&view);
        (view, edges)
    }

    #[test]
    fn test_image_names_follow_side_order() {
        let names = SkyState::image_names("unit1_");
        assert_eq!(names[0], "env/unit1_dn.pcx");
        assert_eq!(names[4], "env/unit1_rt.pcx");
        assert_eq!(names[3], "env/unit1_bk.pcx");
    }

    #[test]
    fn test_set_sky_looks_up_all_faces() {
        let mut sky = SkyState::new();
        let mut asked = Vec::new();
        sky.set_sky("space", 2.5, &[0.0, 0.0, 1.0], &mut |name| {
            asked.push(name.to_string());
            Some(asked.len())
        });
        assert_eq!(asked.len(), 6);
        assert_eq!(sky.images, [Some(1), Some(2), Some(3), Some(4), Some(5), Some(6)]);
        assert_eq!(sky.rotate, 2.5);
    }

    #[test]
    fn test_emit_once_per_frame_and_restores_key() {
        let (view, mut edges) = setup();
        let mut sky = SkyState::new();
        edges.current_key = 17;
        sky.emit(&mut edges, &view, 1);
        let emitted = edges.surface_count();
        assert!(emitted >= 1 && emitted <= 6);
        assert_eq!(edges.current_key, 17);
        sky.emit(&mut edges, &view, 1);
        assert_eq!(edges.surface_count(), emitted);
        let slice = &edges.surfaces.as_slice()[NUM_RESERVED_SURFACES..edges.surfaces.cursor()];
        assert!(slice.iter().all(|s| s.key == SKYBOX_KEY && s.flags & SURF_DRAWSKYBOX != 0));
    }

    #[test]
    fn test_front_face_fills_view_center() {
        let (view, mut edges) = setup();
        let mut sky = SkyState::new();
        sky.emit(&mut edges, &view, 1);
        let mut owner = None;
        edges.scan_edges(&view, &mut |surfs, spans| {
            for s in surfs.iter().skip(NUM_RESERVED_SURFACES) {
                for span in span_iter(spans, s.spans) {
                    if span.v == 24 && span.u <= 32 && 32 < span.u + span.count {
                        owner = Some(s.source);
                    }
                }
            }
        });
        // looking down +x
        assert_eq!(owner, Some(SurfSource::Sky(4)));
    }

    #[test]
    fn test_face_tex_centres_on_eye() {
        let (view, mut edges) = setup();
        let mut sky = SkyState::new();
        sky.emit(&mut edges, &view, 1);
        let tex = sky.face_tex(4).unwrap();
        let (verts, _, _) = sky.face_polygon(4);
        for v in verts {
            let s = dot_product(&v, &[tex.vecs[0][0], tex.vecs[0][1], tex.vecs[0][2]]) + tex.vecs[0][3];
            assert!(s.abs() <= 128.0 + 1e-3);
        }
        assert_eq!(tex.texturemins, [-128, -128]);
        assert_eq!(tex.extents, [256, 256]);
    }
}
