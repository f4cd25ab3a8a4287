// sw_main.rs — Refresh entry points
//
// `SwRenderer` owns every piece of refresh state: the mode buffers, the
// per-frame pools, the image and model tables and the palette. The host
// drives it through init / begin_frame / render_frame / end_frame and the
// registration calls.

use std::time::Instant;

use q2soft_common::q_shared::*;

use crate::platform::SwImp;
use crate::sw_alias::AliasDrawer;
use crate::sw_bsp::{point_in_leaf, AlphaSurface, VisState, WorldPass};
use crate::sw_edge::EdgeTables;
use crate::sw_image::{Colormap, ImageTable};
use crate::sw_import::RefImport;
use crate::sw_light::{light_point, push_dlights};
use crate::sw_local::*;
use crate::sw_model::ModelRegistry;
use crate::sw_model_types::*;
use crate::sw_palette::PaletteState;
use crate::sw_part::draw_particles;
use crate::sw_poly::{draw_alpha_surfaces, draw_beam, PolyRasterizer, PolyVert};
use crate::sw_pool::{Pool, PoolGrowth};
use crate::sw_refdef::RefDef;
use crate::sw_scan::{FrameTarget, ScanSettings, SurfaceDrawer};
use crate::sw_sky::SkyState;
use crate::sw_sprite::draw_sprite;
use crate::sw_warp::WarpState;

const COMMANDS: [&str; 3] = ["modellist", "screenshot", "imagelist"];

/// Console variables sampled once per frame.
#[derive(Debug, Clone, Copy, Default)]
struct FrameCvars {
    drawworld: bool,
    drawentities: bool,
    novis: bool,
    lockpvs: bool,
    fullbright: bool,
    lerpmodels: bool,
    modulate: f32,
    drawflat: bool,
    clearcolor: i32,
    mipscale: f32,
    mipcap: i32,
    waterwarp: bool,
    speeds: bool,
    polymodelstats: bool,
    reportsurfout: bool,
    reportedgeout: bool,
    maxedges: usize,
    maxsurfs: usize,
}

impl FrameCvars {
    fn read(ri: &dyn RefImport) -> Self {
        let on = |name: &str| ri.cvar_value(name) != 0.0;
        Self {
            drawworld: on("r_drawworld"),
            drawentities: on("r_drawentities"),
            novis: on("r_novis"),
            lockpvs: on("r_lockpvs"),
            fullbright: on("r_fullbright"),
            lerpmodels: on("r_lerpmodels"),
            modulate: ri.cvar_value("r_modulate"),
            drawflat: on("sw_drawflat"),
            clearcolor: ri.cvar_value("sw_clearcolor") as i32,
            mipscale: ri.cvar_value("sw_mipscale"),
            mipcap: ri.cvar_value("sw_mipcap") as i32,
            waterwarp: on("sw_waterwarp"),
            speeds: on("r_speeds"),
            polymodelstats: on("sw_polymodelstats"),
            reportsurfout: on("sw_reportsurfout"),
            reportedgeout: on("sw_reportedgeout"),
            maxedges: ri.cvar_value("sw_maxedges").max(0.0) as usize,
            maxsurfs: ri.cvar_value("sw_maxsurfs").max(0.0) as usize,
        }
    }
}

/// Counters for the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub drawnodes: usize,
    pub surfaces: usize,
    pub faceclip: usize,
    pub drawn_surfaces: usize,
    pub polys: usize,
    pub alias_models: usize,
    pub particles: usize,
    pub ms: f32,
}

fn frame_target<'a>(
    vid_buffer: &'a mut [u8],
    warpbuffer: &'a mut [u8],
    zbuffer: &'a mut [u16],
    dowarp: bool,
    stride: usize,
) -> FrameTarget<'a> {
    let pixels = if dowarp { warpbuffer } else { vid_buffer };
    FrameTarget { pixels, zbuffer, stride }
}

fn report_growth(ri: &mut dyn RefImport, kind: &str, growth: PoolGrowth) {
    match growth {
        PoolGrowth::Unchanged => {}
        PoolGrowth::Grown(count) => ri.con_printf(PRINT_ALL, &format!("Allocated {} {}\n", count, kind)),
        PoolGrowth::Failed(err) => ri.con_printf(PRINT_ALL, &format!("{}\n", err)),
    }
}

pub struct SwRenderer<I: RefImport, P: SwImp> {
    pub ri: I,
    pub imp: P,
    vid: VidDef,
    prev_mode: i32,
    force_mode: bool,
    force_gamma: bool,

    vid_buffer: Vec<u8>,
    zbuffer: Vec<u16>,
    warpbuffer: Vec<u8>,
    frame32: Vec<u32>,

    view: ViewState,
    edges: EdgeTables,
    alias_verts: Pool<PolyVert>,
    rast: PolyRasterizer,
    warp: WarpState,
    sky: SkyState,
    vis: VisState,
    alpha_surfaces: Vec<AlphaSurface>,
    framecount: i32,
    dowarp: bool,

    pub palette: PaletteState,
    colormap: Colormap,
    pub images: ImageTable,
    pub models: ModelRegistry,

    pub stats: FrameStats,
    pub lightlevel: f32,
}

impl<I: RefImport, P: SwImp> SwRenderer<I, P> {
    pub fn new(ri: I, imp: P) -> Self {
        Self {
            ri,
            imp,
            vid: VidDef::default(),
            prev_mode: 0,
            force_mode: false,
            force_gamma: false,
            vid_buffer: Vec::new(),
            zbuffer: Vec::new(),
            warpbuffer: Vec::new(),
            frame32: Vec::new(),
            view: ViewState::default(),
            edges: EdgeTables::new(),
            alias_verts: Pool::new("verts", MAXALIASVERTS, 0),
            rast: PolyRasterizer::new(),
            warp: WarpState::new(),
            sky: SkyState::new(),
            vis: VisState::default(),
            alpha_surfaces: Vec::new(),
            framecount: 0,
            dowarp: false,
            palette: PaletteState::new(),
            colormap: Colormap::default(),
            images: ImageTable::new(),
            models: ModelRegistry::new(),
            stats: FrameStats::default(),
            lightlevel: 0.0,
        }
    }

    pub fn vid(&self) -> VidDef {
        self.vid
    }

    /// The 8-bit frame as last drawn.
    pub fn frame_buffer(&self) -> &[u8] {
        &self.vid_buffer
    }

    pub fn zbuffer(&self) -> &[u16] {
        &self.zbuffer
    }

    /// Send `err` to the host as fatal and hand it back.
    fn report(&mut self, err: RefError) -> RefError {
        let msg = match &err {
            RefError::Fatal(msg) | RefError::ModeChange(msg) => msg.clone(),
            other => other.to_string(),
        };
        self.ri.sys_error(ERR_FATAL, &msg);
        err
    }

    // ========================================================
    // R_Register
    // ========================================================

    fn register(&mut self) {
        let ri = &mut self.ri;
        ri.cvar_get("sw_polymodelstats", "0", 0);
        ri.cvar_get("sw_clearcolor", "2", 0);
        ri.cvar_get("sw_drawflat", "0", 0);
        ri.cvar_get("sw_draworder", "0", 0);
        ri.cvar_get("sw_maxedges", &NUMSTACKEDGES.to_string(), 0);
        ri.cvar_get("sw_maxsurfs", "0", 0);
        ri.cvar_get("sw_mipcap", "0", 0);
        ri.cvar_get("sw_mipscale", "1", 0);
        ri.cvar_get("sw_reportedgeout", "0", 0);
        ri.cvar_get("sw_reportsurfout", "0", 0);
        ri.cvar_get("sw_waterwarp", "1", 0);
        ri.cvar_get("sw_overbrightbits", "1.0", CVAR_ARCHIVE);

        ri.cvar_get("r_mode", "0", CVAR_ARCHIVE);
        ri.cvar_get("r_customwidth", "1024", CVAR_ARCHIVE);
        ri.cvar_get("r_customheight", "768", CVAR_ARCHIVE);
        ri.cvar_get("r_speeds", "0", 0);
        ri.cvar_get("r_fullbright", "0", 0);
        ri.cvar_get("r_drawentities", "1", 0);
        ri.cvar_get("r_drawworld", "1", 0);
        ri.cvar_get("r_lightlevel", "0", 0);
        ri.cvar_get("r_lerpmodels", "1", 0);
        ri.cvar_get("r_novis", "0", 0);
        ri.cvar_get("r_lockpvs", "0", 0);
        ri.cvar_get("r_modulate", "1", CVAR_ARCHIVE);
        ri.cvar_get("r_vsync", "1", CVAR_ARCHIVE);
        ri.cvar_get("vid_fullscreen", "0", CVAR_ARCHIVE);
        ri.cvar_get("vid_gamma", "1.0", CVAR_ARCHIVE);
        ri.cvar_get("flushmap", "0", 0);

        for cmd in COMMANDS {
            ri.cmd_add_command(cmd);
        }

        // first begin_frame sets a mode and builds the gamma table
        self.force_mode = true;
        self.force_gamma = true;
    }

    // ========================================================
    // Init / Shutdown
    // ========================================================

    pub fn init(&mut self) -> Result<(), RefError> {
        self.images = ImageTable::new();
        self.models = ModelRegistry::new();
        self.register();

        let colormap = match Colormap::load(&mut self.ri) {
            Ok(colormap) => colormap,
            Err(err) => return Err(self.report(err)),
        };
        self.palette.set_base(&colormap.palette);
        self.colormap = colormap;

        self.begin_frame()?;

        self.ri.con_printf(PRINT_ALL, &format!("ref_soft version: {}\n", REF_VERSION));
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.free_mode_buffers();
        for cmd in COMMANDS {
            self.ri.cmd_remove_command(cmd);
        }
        self.models.free_all();
        self.images.shutdown();
        self.imp.shutdown();
    }

    // ========================================================
    // Modes
    // ========================================================

    /// Rebuild gamma if it changed, then apply any pending mode change.
    pub fn begin_frame(&mut self) -> Result<(), RefError> {
        if self.force_gamma || self.ri.cvar_modified("vid_gamma") || self.ri.cvar_modified("sw_overbrightbits") {
            let gamma = self.ri.cvar_value("vid_gamma");
            let overbright = self.ri.cvar_value("sw_overbrightbits");
            self.palette.rebuild_gamma(gamma, overbright);
            self.palette.set_base_palette();
            self.ri.cvar_clear_modified("vid_gamma");
            self.ri.cvar_clear_modified("sw_overbrightbits");
            self.force_gamma = false;
        }

        while self.force_mode
            || self.ri.cvar_modified("r_mode")
            || self.ri.cvar_modified("vid_fullscreen")
            || self.ri.cvar_modified("r_vsync")
        {
            let mode = self.ri.cvar_value("r_mode") as i32;
            let fullscreen = self.ri.cvar_value("vid_fullscreen") as i32;

            match self.set_mode(mode, fullscreen) {
                RsErr::Ok => {
                    if let Err(err) = self.init_graphics() {
                        return Err(self.report(err));
                    }
                    self.prev_mode = mode;
                    self.force_mode = false;
                    self.ri.cvar_clear_modified("r_mode");
                    self.ri.cvar_clear_modified("vid_fullscreen");
                    self.ri.cvar_clear_modified("r_vsync");
                }
                RsErr::InvalidMode if mode != self.prev_mode => {
                    // retried next pass with the last good mode
                    self.ri.cvar_set_value("r_mode", self.prev_mode as f32);
                    self.ri.con_printf(PRINT_ALL, "ref_soft::RE_BeginFrame() - could not set mode\n");
                }
                RsErr::InvalidFullscreen => {
                    if let Err(err) = self.init_graphics() {
                        return Err(self.report(err));
                    }
                    self.ri.cvar_set_value("vid_fullscreen", 0.0);
                    self.ri
                        .con_printf(PRINT_ALL, "ref_soft::RE_BeginFrame() - fullscreen unavailable in this mode\n");
                    self.prev_mode = mode;
                    self.force_mode = false;
                    self.ri.cvar_clear_modified("r_mode");
                    self.ri.cvar_clear_modified("r_vsync");
                }
                _ => {
                    let err =
                        RefError::ModeChange("ref_soft::RE_BeginFrame() - catastrophic mode change failure\n".into());
                    return Err(self.report(err));
                }
            }
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: i32, fullscreen: i32) -> RsErr {
        self.ri.con_printf(PRINT_ALL, &format!("setting mode {}:", mode));

        let size = if mode == -1 {
            Some((self.ri.cvar_value("r_customwidth") as i32, self.ri.cvar_value("r_customheight") as i32))
        } else {
            self.ri.vid_get_mode_info(mode)
        };
        let Some((mut width, mut height)) = size else {
            self.ri.con_printf(PRINT_ALL, " invalid mode\n");
            return RsErr::InvalidMode;
        };
        self.ri.con_printf(PRINT_ALL, &format!(" {} {}\n", width, height));

        if width <= 0 || height <= 0 || width > MAX_RESOLUTION || height > MAX_RESOLUTION {
            return RsErr::InvalidMode;
        }

        self.imp.set_vsync(self.ri.cvar_value("r_vsync") != 0.0);
        let err = self.imp.init_graphics(fullscreen, &mut width, &mut height);
        if !matches!(err, RsErr::Ok | RsErr::InvalidFullscreen) {
            return err;
        }

        self.vid = VidDef { width, height };
        if let Err(e) = self.create_render() {
            self.ri.con_printf(PRINT_ALL, &format!("{}\n", e));
            return RsErr::Unknown;
        }
        self.ri.vid_new_window(width, height);
        err
    }

    /// Allocate everything whose size follows the video mode.
    fn create_render(&mut self) -> Result<(), RefError> {
        self.free_mode_buffers();

        let (width, height) = (self.vid.width, self.vid.height);
        let size = width as usize * height as usize;
        self.vid_buffer = try_alloc("vid_buffer", size)?;
        self.warpbuffer = try_alloc("warpbuffer", size)?;
        self.edges.alloc_mode_tables(width, height)?;
        self.warp.init_turb(width, height);

        let maxedges = self.ri.cvar_value("sw_maxedges").max(0.0) as usize;
        let maxsurfs = self.ri.cvar_value("sw_maxsurfs").max(0.0) as usize;
        self.realloc_map_buffers(maxedges, maxsurfs);

        self.palette.currentpalette = [0; 256];
        self.palette.set_base_palette();
        Ok(())
    }

    /// Depth buffer for the current size.
    fn init_graphics(&mut self) -> Result<(), RefError> {
        let size = self.vid.width as usize * self.vid.height as usize;
        self.zbuffer = try_alloc("zbuffer", size)?;
        self.palette.set_base_palette();
        Ok(())
    }

    fn free_mode_buffers(&mut self) {
        self.vid_buffer = Vec::new();
        self.zbuffer = Vec::new();
        self.warpbuffer = Vec::new();
        self.frame32 = Vec::new();
        self.edges.free_mode_tables();
    }

    /// Grow any pool that ran short; logs each growth.
    fn realloc_map_buffers(&mut self, maxedges: usize, maxsurfs: usize) {
        let growth = self.edges.surfaces.reserve(maxsurfs);
        report_growth(&mut self.ri, self.edges.surfaces.kind(), growth);
        let growth = self.edges.edges.reserve(maxedges);
        report_growth(&mut self.ri, self.edges.edges.kind(), growth);
        let growth = self.alias_verts.reserve(0);
        report_growth(&mut self.ri, self.alias_verts.kind(), growth);
    }

    // ========================================================
    // Frames
    // ========================================================

    /// Size the view from `fd`, find the view cluster and decide whether
    /// this frame goes through the warp buffer. Returns the on-screen area.
    fn setup_frame(&mut self, fd: &RefDef, cv: &FrameCvars, noworld: bool) -> VRect {
        let x = fd.x.clamp(0, self.vid.width);
        let y = fd.y.clamp(0, self.vid.height);
        let area = VRect {
            x,
            y,
            width: fd.width.clamp(0, self.vid.width - x),
            height: fd.height.clamp(0, self.vid.height - y),
        };

        let mut underwater = fd.rdflags.contains(RdFlags::UNDERWATER);
        if !noworld {
            if let Some(world) = self.models.world.as_ref() {
                if let Some(leaf) = point_in_leaf(world, &fd.vieworg).and_then(|l| world.leafs.get(l)) {
                    self.vis.viewcluster = leaf.cluster;
                    underwater |= leaf.contents & MASK_WATER != 0;
                }
            }
        }

        self.dowarp = cv.waterwarp && underwater && area.width > 0 && area.height > 0;
        let vrect = if self.dowarp { VRect { x: 0, y: 0, ..area } } else { area };
        self.view.setup(vrect, fd.fov_x, &fd.vieworg, &fd.viewangles);
        area
    }

    pub fn render_frame(&mut self, fd: &RefDef) -> Result<(), RefError> {
        let noworld = fd.rdflags.contains(RdFlags::NOWORLDMODEL);
        if self.models.world.is_none() && !noworld {
            return Err(self.report(RefError::NoWorldModel));
        }
        if self.vid_buffer.is_empty() || self.zbuffer.is_empty() {
            return Err(RefError::ModeChange("no video mode set".into()));
        }

        let cv = FrameCvars::read(&self.ri);
        let start = Instant::now();
        self.framecount += 1;
        self.stats = FrameStats::default();
        self.rast.c_polys = 0;

        let area = self.setup_frame(fd, &cv, noworld);
        let stride = self.vid.width as usize;

        if noworld {
            // nothing sorts against a world: everything in view is far away
            let vrect = self.view.vrect;
            for row in vrect.y..vrect.y + vrect.height {
                let first = row as usize * stride + vrect.x as usize;
                if let Some(z) = self.zbuffer.get_mut(first..first + vrect.width as usize) {
                    z.fill(0);
                }
            }
        } else {
            if let Some(world) = self.models.world.as_mut() {
                self.vis.mark_visible(world, cv.novis, cv.lockpvs);
                if !world.nodes.is_empty() {
                    push_dlights(world, NodeRef::Node(0), &fd.dlights, &VEC3_ORIGIN, self.framecount);
                }
            }
            self.edge_drawing(fd, &cv);
        }

        if cv.drawentities {
            self.draw_entities(fd, &cv);
        }

        {
            let alphamap = self.colormap.alphamap();
            let mut target =
                frame_target(&mut self.vid_buffer, &mut self.warpbuffer, &mut self.zbuffer, self.dowarp, stride);
            self.stats.particles = draw_particles(&mut target, &self.view, &fd.particles, alphamap);
        }

        if let Some(world) = self.models.world.as_ref() {
            if !noworld && !self.alpha_surfaces.is_empty() {
                let mut target =
                    frame_target(&mut self.vid_buffer, &mut self.warpbuffer, &mut self.zbuffer, self.dowarp, stride);
                draw_alpha_surfaces(
                    &mut self.rast,
                    &mut target,
                    &self.view,
                    &self.edges.bases,
                    world,
                    &self.images.images,
                    &self.alpha_surfaces,
                    self.colormap.alphamap(),
                    self.warp.turb(fd.time),
                );
            }
        }

        self.set_light_level(fd, &cv, noworld);

        if self.dowarp {
            let scene = VRect { x: 0, y: 0, ..area };
            self.warp.warp_screen(&mut self.vid_buffer, stride, &self.warpbuffer, stride, area, scene, fd.time);
        }

        self.palette.calc_palette(&fd.blend);

        self.stats.polys = self.rast.c_polys;
        self.stats.ms = start.elapsed().as_secs_f32() * 1000.0;
        if cv.polymodelstats {
            self.ri.con_printf(PRINT_ALL, &format!("{:3} polygon model drawn\n", self.stats.alias_models));
        }
        if cv.speeds {
            let s = self.stats;
            self.ri.con_printf(
                PRINT_ALL,
                &format!(
                    "{:5.1} ms {:3}/{:3}/{:3} poly {:3} surf\n",
                    s.ms, s.faceclip, s.surfaces, s.polys, s.drawn_surfaces
                ),
            );
        }

        self.report_shortfalls(&cv);
        self.realloc_map_buffers(cv.maxedges, cv.maxsurfs);
        Ok(())
    }

    /// Tell the console what this frame ran out of.
    fn report_shortfalls(&mut self, cv: &FrameCvars) {
        let surf_short = self.edges.surfaces.overflow();
        if cv.reportsurfout && surf_short > 0 {
            self.ri.con_printf(PRINT_ALL, &format!("Short {} surfaces\n", surf_short));
        }
        let edge_short = self.edges.edges.overflow();
        if cv.reportedgeout && edge_short > 0 {
            self.ri.con_printf(PRINT_ALL, &format!("Short roughly {} edges\n", edge_short * 2 / 3));
        }
        // spans past the scratch list are lost for good
        if self.edges.spans_truncated > 0 {
            self.ri.con_printf(PRINT_ALL, &format!("Dropped {} spans\n", self.edges.spans_truncated));
        }
    }

    /// Walk the world and brush entities into the edge tables, then scan
    /// them out into spans and draw the spans.
    fn edge_drawing(&mut self, fd: &RefDef, cv: &FrameCvars) {
        self.edges.begin_edge_frame(&self.view);
        self.alpha_surfaces.clear();

        let brush: Vec<(u32, usize)> = if cv.drawentities {
            fd.entities
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.flags.contains(RenderFx::BEAM))
                .filter_map(|(i, e)| match self.models.get(e.model?)?.kind {
                    ModelKind::Brush(sub) if sub > 0 => Some((i as u32, sub)),
                    _ => None,
                })
                .collect()
        } else {
            Vec::new()
        };

        let Some(world) = self.models.world.as_mut() else {
            return;
        };
        let mut pass = WorldPass::new(
            world,
            &self.view,
            &mut self.edges,
            &mut self.sky,
            &mut self.alpha_surfaces,
            fd,
            self.framecount,
            self.vis.visframecount,
        );
        if cv.drawworld {
            pass.render_world();
        }
        pass.draw_brush_entities(&brush);
        self.stats.drawnodes = pass.drawnodes;

        let bases = self.edges.bases.clone();
        let settings =
            ScanSettings::new(cv.drawflat, cv.clearcolor, cv.fullbright, cv.modulate, cv.mipscale, cv.mipcap);
        let mut drawer = SurfaceDrawer::new(
            &self.view,
            &bases,
            self.models.world.as_ref(),
            &self.images.images,
            Some(self.images.notexture),
            &self.sky,
            self.colormap.colormap(),
            fd,
            &self.warp.sintable,
            settings,
            self.framecount,
        );
        let stride = self.vid.width as usize;
        let mut target =
            frame_target(&mut self.vid_buffer, &mut self.warpbuffer, &mut self.zbuffer, self.dowarp, stride);
        self.edges.scan_edges(&self.view, &mut |surfs, spans| drawer.draw_surfaces(&mut target, surfs, spans));

        self.stats.drawn_surfaces = drawer.c_surf;
        self.stats.surfaces = self.edges.surface_count();
        self.stats.faceclip = self.edges.c_faceclip;
    }

    /// Opaque entities first, then translucent ones over them.
    fn draw_entities(&mut self, fd: &RefDef, cv: &FrameCvars) {
        let stride = self.vid.width as usize;
        let alphamap = self.colormap.alphamap();
        let mut target =
            frame_target(&mut self.vid_buffer, &mut self.warpbuffer, &mut self.zbuffer, self.dowarp, stride);
        let alias = AliasDrawer {
            view: &self.view,
            fd,
            world: self.models.world.as_ref(),
            images: &self.images.images,
            colormap: self.colormap.colormap(),
            alphamap,
            lerpmodels: cv.lerpmodels,
            modulate: cv.modulate,
        };

        for translucent in [false, true] {
            for e in &fd.entities {
                if e.flags.contains(RenderFx::TRANSLUCENT) != translucent {
                    continue;
                }
                if e.flags.contains(RenderFx::BEAM) {
                    draw_beam(&mut self.rast, &mut target, &self.view, e, alphamap);
                    continue;
                }
                // no model: nothing to draw
                let Some(model) = e.model.and_then(|h| self.models.get(h)) else {
                    continue;
                };
                match &model.kind {
                    ModelKind::Sprite(sprite) => draw_sprite(
                        &mut self.rast,
                        &mut target,
                        &self.view,
                        e,
                        sprite,
                        &self.images.images,
                        Some(self.images.notexture),
                        alphamap,
                    ),
                    ModelKind::Alias(mesh) => {
                        self.alias_verts.reset();
                        let report =
                            alias.draw(&mut self.rast, &mut target, &mut self.alias_verts, e, &model.name, mesh);
                        for warning in &report.warnings {
                            self.ri.con_printf(PRINT_ALL, warning);
                        }
                        if report.drawn {
                            self.stats.alias_models += 1;
                        }
                    }
                    // drawn with the world
                    ModelKind::Brush(_) => {}
                }
            }
        }
    }

    /// Write the light at the view origin back to `r_lightlevel`.
    fn set_light_level(&mut self, fd: &RefDef, cv: &FrameCvars, noworld: bool) {
        let level = match self.models.world.as_ref() {
            Some(world) if !noworld && cv.drawentities && !fd.entities.is_empty() => {
                150.0 * light_point(world, fd, &fd.vieworg, cv.modulate)[0]
            }
            _ => 150.0,
        };
        self.lightlevel = level;
        self.ri.cvar_set_value("r_lightlevel", level);
    }

    /// Convert the frame through the current palette and present it.
    pub fn end_frame(&mut self) {
        if self.vid_buffer.is_empty() {
            return;
        }
        self.palette.copy_frame(&self.vid_buffer, &mut self.frame32);
        self.imp.present(&self.frame32, self.vid.width, self.vid.height);
    }

    /// Install a 768-byte RGB palette, or go back to the colormap's.
    pub fn set_palette(&mut self, palette: Option<&[u8]>) {
        // clear to black so the switch does not flash
        self.vid_buffer.fill(0);
        self.end_frame();
        self.palette.set_palette(palette);
    }

    // ========================================================
    // Registration
    // ========================================================

    pub fn begin_registration(&mut self, map: &str) {
        self.models.begin_registration(&mut self.ri, &mut self.images, map);
        self.vis.new_map();
    }

    pub fn register_model(&mut self, name: &str) -> Option<ModelHandle> {
        self.models.register_model(&mut self.ri, &mut self.images, name)
    }

    pub fn register_skin(&mut self, name: &str) -> Option<ImageHandle> {
        self.images.register_skin(&mut self.ri, name)
    }

    pub fn register_pic(&mut self, name: &str) -> Option<ImageHandle> {
        self.images.find_pic(&mut self.ri, name)
    }

    pub fn set_sky(&mut self, name: &str, rotate: f32, axis: &Vec3) {
        let images = &mut self.images;
        let ri = &mut self.ri;
        self.sky.set_sky(name, rotate, axis, &mut |path: &str| images.find_image(&mut *ri, path, ImageType::Sky));
    }

    pub fn end_registration(&mut self) {
        self.models.end_registration(&mut self.images);
    }

    // ========================================================
    // Commands
    // ========================================================

    /// Run one of the registered console commands. Returns false for
    /// names this refresh does not own.
    pub fn execute_command(&mut self, name: &str) -> bool {
        match name {
            "modellist" => self.models.model_list(&mut self.ri),
            "imagelist" => self.images.image_list(&mut self.ri),
            "screenshot" => self.screenshot(),
            _ => return false,
        }
        true
    }

    pub fn screenshot(&mut self) {
        let Some(shot) = self.palette.screenshot(&self.vid_buffer, self.vid.width, self.vid.height) else {
            self.ri.con_printf(PRINT_ALL, "SCR_ScreenShot_f: Couldn't create a file\n");
            return;
        };
        match self.ri.write_screenshot(&shot) {
            Ok(picname) => self.ri.con_printf(PRINT_ALL, &format!("Wrote {}\n", picname)),
            Err(msg) => self.ri.con_printf(PRINT_ALL, &format!("SCR_ScreenShot_f: {}\n", msg)),
        }
    }
}
