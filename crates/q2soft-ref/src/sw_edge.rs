// sw_edge.rs — Global/active edge tables and span generation
//
// Visible polygons are clipped, projected and broken into edges bucketed by
// their first scanline. The sweep then walks scanlines top to bottom,
// keeping the active edges sorted by u and a stack of open surfaces sorted
// by key, and records a span whenever the front surface changes.
//
// Edge slots 0..4 are the head, tail, after-tail and sentinel of the active
// list. Surface 0 means "no surface" and surface 1 is the background.

use q2soft_common::q_shared::*;

use crate::sw_local::*;
use crate::sw_pool::Pool;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edge {
    /// 16.16 screen x at the current scanline.
    pub u: i32,
    pub u_step: i32,
    pub prev: u32,
    pub next: u32,
    /// [trailing surface, leading surface]; 0 = none.
    pub surfs: [u32; 2],
    pub next_remove: u32,
    pub nearzi: f32,
}

/// Where a surface's texture and lighting come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SurfSource {
    #[default]
    None,
    /// Face index in the world.
    World(u32),
    /// Sky box side 0..6.
    Sky(u8),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surf {
    /// Surface stack links while scanning.
    pub next: u32,
    pub prev: u32,
    /// Head of this surface's span list.
    pub spans: u32,
    pub key: i32,
    pub last_u: i32,
    pub spanstate: i32,
    pub flags: i32,
    pub source: SurfSource,
    pub entity: Option<u32>,
    /// Index into the frame's view bases; 0 is the world.
    pub basis: u32,
    pub nearzi: f32,
    pub insubmodel: bool,
    pub d_ziorigin: f32,
    pub d_zistepu: f32,
    pub d_zistepv: f32,
}

impl Default for Surf {
    fn default() -> Self {
        Self {
            next: SURF_NONE,
            prev: SURF_NONE,
            spans: NONE_INDEX,
            key: 0,
            last_u: 0,
            spanstate: 0,
            flags: 0,
            source: SurfSource::None,
            entity: None,
            basis: 0,
            nearzi: 0.0,
            insubmodel: false,
            d_ziorigin: 0.0,
            d_zistepu: 0.0,
            d_zistepv: 0.0,
        }
    }
}

impl Surf {
    /// 1/z of this surface's plane at screen position (u, v).
    #[inline]
    pub fn zi_at(&self, u: f32, v: f32) -> f32 {
        self.d_ziorigin + v * self.d_zistepv + u * self.d_zistepu
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub u: i32,
    pub v: i32,
    pub count: i32,
    pub next: u32,
}

/// A convex polygon ready for the edge tables, in the space of the
/// current view basis.
pub struct FaceInput<'a> {
    pub verts: &'a [Vec3],
    pub normal: Vec3,
    pub dist: f32,
    pub flags: i32,
    pub source: SurfSource,
}

/// Iterate the span list of a surface.
pub fn span_iter<'a>(spans: &'a [Span], head: u32) -> impl Iterator<Item = &'a Span> + 'a {
    let mut cur = head;
    std::iter::from_fn(move || {
        let span = spans.get(cur as usize)?;
        cur = span.next;
        Some(span)
    })
}

pub struct EdgeTables {
    pub edges: Pool<Edge>,
    pub surfaces: Pool<Surf>,
    newedges: Vec<u32>,
    removeedges: Vec<u32>,
    spans: Vec<Span>,
    span_capacity: usize,
    span_flush_at: usize,
    /// Spans dropped because the scratch list was full.
    pub spans_truncated: usize,

    /// View bases referenced by surfaces this frame.
    pub bases: Vec<ViewBasis>,
    pub current_key: i32,
    pub insubmodel: bool,
    pub current_entity: Option<u32>,
    pub current_basis: u32,

    clip_a: Vec<Vec3>,
    clip_b: Vec<Vec3>,
    projected: Vec<(f32, f32, f32)>,

    pub c_faceclip: usize,
    pub c_emitted_edges: usize,
}

impl Default for EdgeTables {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeTables {
    pub fn new() -> Self {
        Self {
            edges: Pool::new("edges", NUMSTACKEDGES, NUM_EDGE_SENTINELS),
            surfaces: Pool::new("surfaces", NUMSTACKSURFACES, NUM_RESERVED_SURFACES),
            newedges: Vec::new(),
            removeedges: Vec::new(),
            spans: Vec::new(),
            span_capacity: 0,
            span_flush_at: 0,
            spans_truncated: 0,
            bases: Vec::new(),
            current_key: 0,
            insubmodel: false,
            current_entity: None,
            current_basis: 0,
            clip_a: Vec::new(),
            clip_b: Vec::new(),
            projected: Vec::new(),
            c_faceclip: 0,
            c_emitted_edges: 0,
        }
    }

    /// Size the per-scanline tables and span scratch for a video mode.
    pub fn alloc_mode_tables(&mut self, width: i32, height: i32) -> Result<(), RefError> {
        let height = height.max(1) as usize;
        let width = width.max(1) as usize;
        let newedges = try_alloc::<u32>("newedges", height)?;
        let removeedges = try_alloc::<u32>("removeedges", height)?;
        let mut spans: Vec<Span> = Vec::new();
        spans.try_reserve_exact(width * 2).map_err(|_| RefError::OutOfMemory {
            what: "edge_basespans",
            bytes: width * 2 * std::mem::size_of::<Span>(),
        })?;
        self.newedges = newedges;
        self.removeedges = removeedges;
        self.spans = spans;
        self.span_capacity = width * 2;
        Ok(())
    }

    pub fn free_mode_tables(&mut self) {
        self.newedges = Vec::new();
        self.removeedges = Vec::new();
        self.spans = Vec::new();
        self.span_capacity = 0;
    }

    pub fn push_basis(&mut self, basis: ViewBasis) -> u32 {
        self.bases.push(basis);
        (self.bases.len() - 1) as u32
    }

    pub fn basis(&self, idx: u32) -> ViewBasis {
        self.bases.get(idx as usize).copied().unwrap_or_default()
    }

    /// Number of real surfaces emitted this frame.
    pub fn surface_count(&self) -> usize {
        self.surfaces.used()
    }

    // ========================================================
    // BeginEdgeFrame
    // ========================================================

    /// Reset the tables for a new frame: empty edge buckets, the
    /// background surface in slot 1, and the world as view basis 0.
    pub fn begin_edge_frame(&mut self, view: &ViewState) {
        self.edges.reset();
        self.surfaces.reset();
        self.newedges.fill(NONE_INDEX);
        self.removeedges.fill(NONE_INDEX);
        self.spans.clear();
        self.spans_truncated = 0;
        self.bases.clear();
        self.bases.push(view.world);
        self.current_key = 0;
        self.insubmodel = false;
        self.current_entity = None;
        self.current_basis = 0;
        self.c_faceclip = 0;
        self.c_emitted_edges = 0;
        self.span_flush_at = self.span_capacity.saturating_sub(view.vrect.width.max(0) as usize);

        if let Some(bg) = self.surfaces.get_mut(SURF_BACKGROUND) {
            *bg = Surf {
                spans: NONE_INDEX,
                flags: SURF_DRAWBACKGROUND,
                key: BACKGROUND_KEY,
                d_ziorigin: -0.9,
                ..Default::default()
            };
        }
    }

    // ========================================================
    // GlobalEdgeTableBuild
    // ========================================================

    /// Clip, project and emit a polygon. Returns true if a surface was
    /// created for it.
    pub fn render_face(&mut self, view: &ViewState, face: &FaceInput, clipflags: i32) -> bool {
        if self.surfaces.available() == 0 {
            self.surfaces.note_overflow(1);
            return false;
        }
        if self.edges.available() < face.verts.len() + 4 {
            self.edges.note_overflow(face.verts.len());
            return false;
        }

        let basis = self.basis(self.current_basis);

        let mut a = std::mem::take(&mut self.clip_a);
        let mut b = std::mem::take(&mut self.clip_b);
        a.clear();
        a.extend(face.verts.iter().map(|v| basis.transform_point(v)));

        for (i, plane) in view.view_planes.iter().enumerate() {
            if clipflags & (1 << i) == 0 {
                continue;
            }
            clip_to_plane(&a, &mut b, plane);
            std::mem::swap(&mut a, &mut b);
            self.c_faceclip += 1;
            if a.len() < 3 {
                break;
            }
        }

        let mut created = false;
        if a.len() >= 3 {
            created = self.emit_polygon(view, &a, face, &basis);
        }

        self.clip_a = a;
        self.clip_b = b;
        created
    }

    fn emit_polygon(&mut self, view: &ViewState, poly: &[Vec3], face: &FaceInput, basis: &ViewBasis) -> bool {
        let mut projected = std::mem::take(&mut self.projected);
        projected.clear();
        let mut nearzi = 0.0f32;
        for p in poly {
            let pv = view.project(p);
            nearzi = nearzi.max(pv.2);
            projected.push(pv);
        }

        // front faces run clockwise on screen
        if signed_area(&projected) < 0.0 {
            projected.reverse();
        }

        let surf_idx = self.surfaces.cursor() as u32;
        let mut emitted = 0;
        let n = projected.len();
        for i in 0..n {
            if self.emit_edge(view, projected[i], projected[(i + 1) % n], surf_idx, nearzi) {
                emitted += 1;
            }
        }
        self.projected = projected;

        if emitted == 0 {
            return false;
        }
        self.c_emitted_edges += emitted;

        let Some(idx) = self.surfaces.alloc() else {
            return false;
        };

        // 1/z gradients from the plane in view space
        let p_normal = basis.transform_vector(&face.normal);
        let d = face.dist - dot_product(&basis.origin, &face.normal);
        let distinv = if d.abs() > 1e-6 { 1.0 / d } else { 0.0 };
        let zistepu = p_normal[0] * view.xscaleinv * distinv;
        let zistepv = -p_normal[1] * view.yscaleinv * distinv;

        self.surfaces[idx] = Surf {
            spans: NONE_INDEX,
            key: self.current_key,
            flags: face.flags,
            source: face.source,
            entity: self.current_entity,
            basis: self.current_basis,
            nearzi,
            insubmodel: self.insubmodel,
            d_zistepu: zistepu,
            d_zistepv: zistepv,
            d_ziorigin: p_normal[2] * distinv - view.xcenter * zistepu - view.ycenter * zistepv,
            ..Default::default()
        };
        true
    }

    /// Add one projected edge to the bucket of its first scanline. Edges
    /// that do not cross a scanline center are dropped.
    fn emit_edge(
        &mut self,
        view: &ViewState,
        p0: (f32, f32, f32),
        p1: (f32, f32, f32),
        surf: u32,
        nearzi: f32,
    ) -> bool {
        let (u0, v0, _) = p0;
        let (u1, v1, _) = p1;
        let ceilv0 = v0.ceil() as i32;
        let ceilv1 = v1.ceil() as i32;

        if ceilv0 == ceilv1 {
            return false;
        }

        let (v, v2, u, u_step, surfs) = if ceilv0 < ceilv1 {
            // trailing edge (going down)
            let u_step = (u1 - u0) / (v1 - v0);
            let u = u0 + (ceilv0 as f32 - v0) * u_step;
            (ceilv0, ceilv1 - 1, u, u_step, [surf, SURF_NONE])
        } else {
            // leading edge (going up)
            let u_step = (u0 - u1) / (v0 - v1);
            let u = u1 + (ceilv1 as f32 - v1) * u_step;
            (ceilv1, ceilv0 - 1, u, u_step, [SURF_NONE, surf])
        };

        let (Some(&start_head), Some(&end_head)) =
            (self.newedges.get(v as usize), self.removeedges.get(v2 as usize))
        else {
            return false;
        };
        if v < 0 || v2 < v {
            return false;
        }

        let Some(edge_idx) = self.edges.alloc() else {
            return false;
        };

        // clamp so nearly horizontal edges cannot step off the view
        let fixed_u = float_to_fixed(u)
            .saturating_add(FIXED_FRAC_MASK)
            .clamp(view.vrect_x_adj_shift, view.vrectright_adj_shift);

        {
            let edge = &mut self.edges[edge_idx];
            edge.u = fixed_u;
            edge.u_step = float_to_fixed(u_step);
            edge.surfs = surfs;
            edge.nearzi = nearzi;
            edge.next_remove = end_head;
        }
        self.removeedges[v2 as usize] = edge_idx;

        // sort into the start bucket; trailers sort after leaders
        let u_check = if surfs[0] != SURF_NONE { fixed_u.saturating_add(1) } else { fixed_u };
        if start_head == NONE_INDEX || self.edges[start_head].u >= u_check {
            self.edges[edge_idx].next = start_head;
            self.newedges[v as usize] = edge_idx;
        } else {
            let mut pcheck = start_head;
            loop {
                let next = self.edges[pcheck].next;
                if next == NONE_INDEX || self.edges[next].u >= u_check {
                    break;
                }
                pcheck = next;
            }
            self.edges[edge_idx].next = self.edges[pcheck].next;
            self.edges[pcheck].next = edge_idx;
        }
        true
    }

    // ========================================================
    // ActiveEdgeSweep
    // ========================================================

    fn setup_sentinels(&mut self, view: &ViewState) {
        let head = Edge {
            u: view.vrect.x << FIXED_SHIFT,
            u_step: 0,
            prev: NONE_INDEX,
            next: EDGE_TAIL,
            surfs: [SURF_NONE, SURF_BACKGROUND],
            next_remove: NONE_INDEX,
            nearzi: 0.0,
        };
        let tail = Edge {
            u: (view.vrectright << FIXED_SHIFT) + FIXED_FRAC_MASK,
            u_step: 0,
            prev: EDGE_HEAD,
            next: EDGE_AFTERTAIL,
            surfs: [SURF_BACKGROUND, SURF_NONE],
            next_remove: NONE_INDEX,
            nearzi: 0.0,
        };
        let aftertail = Edge {
            // force a move
            u: -1,
            u_step: 0,
            prev: EDGE_TAIL,
            next: EDGE_SENTINEL,
            ..Default::default()
        };
        let sentinel = Edge {
            // nothing sorts past this
            u: i32::MAX,
            u_step: 0,
            prev: EDGE_AFTERTAIL,
            next: NONE_INDEX,
            ..Default::default()
        };
        self.edges[EDGE_HEAD] = head;
        self.edges[EDGE_TAIL] = tail;
        self.edges[EDGE_AFTERTAIL] = aftertail;
        self.edges[EDGE_SENTINEL] = sentinel;
    }

    /// Merge a u-sorted bucket of new edges into the active list.
    fn insert_new_edges(&mut self, mut to_add: u32) {
        let mut edgelist = self.edges[EDGE_HEAD].next;
        while to_add != NONE_INDEX {
            let next_add = self.edges[to_add].next;
            let u = self.edges[to_add].u;
            while self.edges[edgelist].u < u {
                edgelist = self.edges[edgelist].next;
            }
            let prev = self.edges[edgelist].prev;
            self.edges[to_add].next = edgelist;
            self.edges[to_add].prev = prev;
            self.edges[prev].next = to_add;
            self.edges[edgelist].prev = to_add;
            to_add = next_add;
        }
    }

    fn remove_edges(&mut self, mut pedge: u32) {
        while pedge != NONE_INDEX {
            let Edge { prev, next, next_remove, .. } = self.edges[pedge];
            self.edges[next].prev = prev;
            self.edges[prev].next = next;
            pedge = next_remove;
        }
    }

    /// Advance every active edge one scanline, bubbling any edge that
    /// crossed its left neighbour back into u order.
    fn step_active_u(&mut self) {
        let mut pedge = self.edges[EDGE_HEAD].next;
        loop {
            let step = self.edges[pedge].u_step;
            self.edges[pedge].u = self.edges[pedge].u.wrapping_add(step);
            let prev = self.edges[pedge].prev;
            if self.edges[pedge].u >= self.edges[prev].u {
                pedge = self.edges[pedge].next;
                continue;
            }

            if pedge == EDGE_AFTERTAIL {
                return;
            }

            // pull the edge out of the list
            let pnext = self.edges[pedge].next;
            self.edges[pnext].prev = prev;
            self.edges[prev].next = pnext;

            // find where it goes
            let u = self.edges[pedge].u;
            let mut pwedge = self.edges[prev].prev;
            while pwedge != EDGE_HEAD && pwedge != NONE_INDEX && self.edges[pwedge].u > u {
                pwedge = self.edges[pwedge].prev;
            }
            if pwedge == NONE_INDEX {
                pwedge = EDGE_HEAD;
            }

            let after = self.edges[pwedge].next;
            self.edges[pedge].next = after;
            self.edges[pedge].prev = pwedge;
            self.edges[after].prev = pedge;
            self.edges[pwedge].next = pedge;

            pedge = pnext;
            if pedge == EDGE_TAIL {
                return;
            }
        }
    }

    // ========================================================
    // SpanEmission
    // ========================================================

    fn emit_span(&mut self, surf: u32, u: i32, count: i32, v: i32) {
        if self.spans.len() >= self.span_capacity {
            self.spans_truncated += 1;
            return;
        }
        let head = self.surfaces[surf].spans;
        self.spans.push(Span { u, v, count, next: head });
        self.surfaces[surf].spans = (self.spans.len() - 1) as u32;
    }

    fn trailing_edge(&mut self, surf: u32, edge_u: i32, iv: i32) {
        self.surfaces[surf].spanstate -= 1;
        if self.surfaces[surf].spanstate != 0 {
            return;
        }
        let Surf { next, prev, last_u, .. } = self.surfaces[surf];
        if surf == self.surfaces[SURF_BACKGROUND].next {
            // the top surface is going away: emit its span
            let iu = fixed_to_int(edge_u);
            if iu > last_u {
                self.emit_span(surf, last_u, iu - last_u, iv);
            }
            // set last_u on the surface below
            self.surfaces[next].last_u = iu;
        }
        self.surfaces[prev].next = next;
        self.surfaces[next].prev = prev;
    }

    /// 1/z of two submodel surfaces sharing a key, at the edge's u.
    fn submodel_in_front(&self, surf: u32, surf2: u32, edge_u: i32, fv: f32) -> bool {
        let fu = (edge_u - FIXED_FRAC_MASK) as f32 * (1.0 / FIXED_ONE as f32);
        let s = &self.surfaces[surf];
        let s2 = &self.surfaces[surf2];
        let newzi = s.zi_at(fu, fv);
        let testzi = s2.zi_at(fu, fv);
        if newzi * 0.99 >= testzi {
            return true;
        }
        newzi * 1.01 >= testzi && s.d_zistepu >= s2.d_zistepu
    }

    fn leading_edge(&mut self, surf: u32, edge_u: i32, iv: i32) {
        // an inverted span: the end edge was already seen
        self.surfaces[surf].spanstate += 1;
        if self.surfaces[surf].spanstate != 1 {
            return;
        }

        let fv = iv as f32;
        let key = self.surfaces[surf].key;
        let insubmodel = self.surfaces[surf].insubmodel;
        let mut surf2 = self.surfaces[SURF_BACKGROUND].next;

        let newtop = if key < self.surfaces[surf2].key {
            true
        } else if insubmodel && key == self.surfaces[surf2].key && self.submodel_in_front(surf, surf2, edge_u, fv) {
            true
        } else {
            loop {
                loop {
                    surf2 = self.surfaces[surf2].next;
                    if key <= self.surfaces[surf2].key {
                        break;
                    }
                }
                if key == self.surfaces[surf2].key && surf2 != SURF_BACKGROUND {
                    // same plane: the one already active is in front,
                    // unless both are bmodels in one leaf
                    if !insubmodel || !self.submodel_in_front(surf, surf2, edge_u, fv) {
                        continue;
                    }
                }
                break;
            }
            false
        };

        if newtop {
            // emit a span for the surface being obscured
            let iu = fixed_to_int(edge_u);
            let last_u = self.surfaces[surf2].last_u;
            if iu > last_u {
                self.emit_span(surf2, last_u, iu - last_u, iv);
            }
            self.surfaces[surf].last_u = iu;
        }

        // insert before surf2
        let prev = self.surfaces[surf2].prev;
        self.surfaces[surf].next = surf2;
        self.surfaces[surf].prev = prev;
        self.surfaces[prev].next = surf;
        self.surfaces[surf2].prev = surf;
    }

    fn cleanup_span(&mut self, iv: i32) {
        // whatever is on top runs to the right edge
        let surf = self.surfaces[SURF_BACKGROUND].next;
        let iu = fixed_to_int(self.edges[EDGE_TAIL].u);
        let last_u = self.surfaces[surf].last_u;
        if iu > last_u {
            self.emit_span(surf, last_u, iu - last_u, iv);
        }

        // reset spanstate for everything still on the stack
        let mut s = surf;
        loop {
            self.surfaces[s].spanstate = 0;
            s = self.surfaces[s].next;
            if s == SURF_BACKGROUND || s == SURF_NONE {
                break;
            }
        }
    }

    fn generate_spans(&mut self, view: &ViewState, iv: i32) {
        // clear the active surfaces to just the background
        {
            let bg = &mut self.surfaces[SURF_BACKGROUND];
            bg.next = SURF_BACKGROUND;
            bg.prev = SURF_BACKGROUND;
            bg.last_u = view.vrect.x;
        }

        let mut edge = self.edges[EDGE_HEAD].next;
        while edge != EDGE_TAIL {
            let Edge { u, surfs, next, .. } = self.edges[edge];
            if surfs[0] != SURF_NONE {
                // a surface is going away for this span
                self.trailing_edge(surfs[0], u, iv);
            }
            if surfs[1] != SURF_NONE {
                self.leading_edge(surfs[1], u, iv);
            }
            edge = next;
        }

        self.cleanup_span(iv);
    }

    fn flush_spans(&mut self, flush: &mut dyn FnMut(&[Surf], &[Span])) {
        let cursor = self.surfaces.cursor();
        flush(&self.surfaces.as_slice()[..cursor], &self.spans);
        for s in &mut self.surfaces.as_mut_slice()[SURF_BACKGROUND as usize..cursor] {
            s.spans = NONE_INDEX;
        }
        self.spans.clear();
    }

    /// Sweep the view top to bottom, generating spans and handing them to
    /// `flush` whenever the scratch list gets close to full, and once more
    /// at the end.
    pub fn scan_edges(&mut self, view: &ViewState, flush: &mut dyn FnMut(&[Surf], &[Span])) {
        if self.edges.as_slice().len() < NUM_EDGE_SENTINELS
            || self.surfaces.as_slice().len() < NUM_RESERVED_SURFACES
            || view.vrect.height <= 0
        {
            return;
        }

        self.setup_sentinels(view);
        self.spans.clear();

        let top = view.vrect.y;
        let bottom = view.vrectbottom - 1;

        for iv in top..bottom {
            // the background span is pre-included
            self.surfaces[SURF_BACKGROUND].spanstate = 1;
            if let Some(&head) = self.newedges.get(iv as usize) {
                if head != NONE_INDEX {
                    self.insert_new_edges(head);
                }
            }

            self.generate_spans(view, iv);

            // flush if there may not be room for another scanline
            if self.spans.len() > self.span_flush_at {
                self.flush_spans(flush);
            }

            if let Some(&head) = self.removeedges.get(iv as usize) {
                if head != NONE_INDEX {
                    self.remove_edges(head);
                }
            }

            if self.edges[EDGE_HEAD].next != EDGE_TAIL {
                self.step_active_u();
            }
        }

        // the last scan needs no stepping, sorting or removal
        let iv = bottom;
        self.surfaces[SURF_BACKGROUND].spanstate = 1;
        if let Some(&head) = self.newedges.get(iv as usize) {
            if head != NONE_INDEX {
                self.insert_new_edges(head);
            }
        }
        self.generate_spans(view, iv);

        self.flush_spans(flush);
    }
}

/// Sutherland-Hodgman clip against a view-space plane through the eye;
/// keeps the side where `dot(p, normal) >= 0`.
fn clip_to_plane(input: &[Vec3], out: &mut Vec<Vec3>, normal: &[f32; 3]) {
    out.clear();
    let n = input.len();
    for i in 0..n {
        let p0 = &input[i];
        let p1 = &input[(i + 1) % n];
        let d0 = dot_product(p0, normal);
        let d1 = dot_product(p1, normal);
        if d0 >= 0.0 {
            out.push(*p0);
        }
        if (d0 >= 0.0) != (d1 >= 0.0) {
            let frac = d0 / (d0 - d1);
            out.push([
                p0[0] + frac * (p1[0] - p0[0]),
                p0[1] + frac * (p1[1] - p0[1]),
                p0[2] + frac * (p1[2] - p0[2]),
            ]);
        }
    }
}

/// Twice the screen-space area; positive for clockwise with v down.
fn signed_area(pts: &[(f32, f32, f32)]) -> f32 {
    let n = pts.len();
    (0..n)
        .map(|i| {
            let (u0, v0, _) = pts[i];
            let (u1, v1, _) = pts[(i + 1) % n];
            u0 * v1 - u1 * v0
        })
        .sum()
}
