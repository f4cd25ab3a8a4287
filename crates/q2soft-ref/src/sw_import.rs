// sw_import.rs — Services the refresh consumes from its host
//
// `RefImport` is the import table: printing, fatal errors, console
// variables and commands, video mode lookup and asset loading. The refresh
// never touches files or the console directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbImage;
use q2soft_common::common::{com_error, com_printf};
use q2soft_common::cvar::CvarContext;
use q2soft_common::q_shared::*;

use crate::sw_model_types::{BspWorld, LoadedPic, ModelData};

pub trait RefImport {
    fn con_printf(&mut self, level: i32, msg: &str);
    fn sys_error(&mut self, code: i32, msg: &str);

    /// Register (or look up) a console variable, returning its value.
    fn cvar_get(&mut self, name: &str, default: &str, flags: i32) -> f32;
    fn cvar_value(&self, name: &str) -> f32;
    fn cvar_set(&mut self, name: &str, value: &str);
    fn cvar_set_value(&mut self, name: &str, value: f32);
    fn cvar_modified(&self, name: &str) -> bool;
    fn cvar_clear_modified(&mut self, name: &str);

    fn cmd_add_command(&mut self, name: &str);
    fn cmd_remove_command(&mut self, name: &str);

    /// Size of a built-in video mode.
    fn vid_get_mode_info(&self, mode: i32) -> Option<(i32, i32)>;
    /// Let input and sound know the window changed.
    fn vid_new_window(&mut self, width: i32, height: i32);

    fn load_pic(&mut self, name: &str) -> Option<LoadedPic>;
    fn load_world(&mut self, name: &str) -> Option<BspWorld>;
    fn load_model(&mut self, name: &str) -> Option<ModelData>;

    /// Persist a screenshot; returns the name written.
    fn write_screenshot(&mut self, shot: &RgbImage) -> Result<String, String>;
}

// ============================================================================
// Video modes
// ============================================================================

pub const VID_MODES: &[(i32, i32)] = &[
    (320, 240),
    (400, 300),
    (512, 384),
    (640, 480),
    (800, 600),
    (960, 720),
    (1024, 768),
    (1152, 864),
    (1280, 1024),
    (1600, 1200),
    (2048, 1536),
];

// ============================================================================
// Stock import
// ============================================================================

/// In-process host: a cvar store, a command list, in-memory asset tables and
/// a screenshot directory.
#[derive(Default)]
pub struct StdRefImport {
    pub cvars: CvarContext,
    pub commands: Vec<String>,
    pub pics: HashMap<String, LoadedPic>,
    pub worlds: HashMap<String, BspWorld>,
    pub models: HashMap<String, ModelData>,
    pub screenshot_dir: Option<PathBuf>,
    /// Every line passed to `con_printf`, newest last.
    pub printed: Vec<String>,
    /// Every message passed to `sys_error`, newest last.
    pub errors: Vec<String>,
    pub new_windows: Vec<(i32, i32)>,
}

impl StdRefImport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = Some(dir.into());
        self
    }

    pub fn add_pic(&mut self, name: &str, pic: LoadedPic) {
        self.pics.insert(name.to_string(), pic);
    }

    pub fn add_world(&mut self, name: &str, world: BspWorld) {
        self.worlds.insert(name.to_string(), world);
    }

    pub fn add_model(&mut self, name: &str, model: ModelData) {
        self.models.insert(name.to_string(), model);
    }

    fn next_screenshot_path(dir: &Path) -> Option<(String, PathBuf)> {
        (0..=99).find_map(|i| {
            let picname = format!("quake{:02}.png", i);
            let path = dir.join(&picname);
            (!path.exists()).then_some((picname, path))
        })
    }
}

impl RefImport for StdRefImport {
    fn con_printf(&mut self, level: i32, msg: &str) {
        self.printed.push(msg.to_string());
        // developer prints only reach the console with `developer` set
        if level == PRINT_DEVELOPER && self.cvars.variable_value("developer") == 0.0 {
            return;
        }
        com_printf(msg);
    }

    fn sys_error(&mut self, code: i32, msg: &str) {
        self.errors.push(msg.trim_end().to_string());
        com_error(code, msg);
    }

    fn cvar_get(&mut self, name: &str, default: &str, flags: i32) -> f32 {
        let idx = self.cvars.get(name, default, flags);
        self.cvars.cvar_vars[idx].value
    }

    fn cvar_value(&self, name: &str) -> f32 {
        self.cvars.variable_value(name)
    }

    fn cvar_set(&mut self, name: &str, value: &str) {
        self.cvars.set(name, value);
    }

    fn cvar_set_value(&mut self, name: &str, value: f32) {
        self.cvars.set_value(name, value);
    }

    fn cvar_modified(&self, name: &str) -> bool {
        self.cvars.is_modified(name)
    }

    fn cvar_clear_modified(&mut self, name: &str) {
        self.cvars.clear_modified(name);
    }

    fn cmd_add_command(&mut self, name: &str) {
        if !self.commands.iter().any(|c| c == name) {
            self.commands.push(name.to_string());
        }
    }

    fn cmd_remove_command(&mut self, name: &str) {
        self.commands.retain(|c| c != name);
    }

    fn vid_get_mode_info(&self, mode: i32) -> Option<(i32, i32)> {
        usize::try_from(mode).ok().and_then(|m| VID_MODES.get(m).copied())
    }

    fn vid_new_window(&mut self, width: i32, height: i32) {
        self.new_windows.push((width, height));
    }

    fn load_pic(&mut self, name: &str) -> Option<LoadedPic> {
        self.pics.get(name).cloned()
    }

    fn load_world(&mut self, name: &str) -> Option<BspWorld> {
        self.worlds.get(name).cloned()
    }

    fn load_model(&mut self, name: &str) -> Option<ModelData> {
        self.models.get(name).cloned()
    }

    fn write_screenshot(&mut self, shot: &RgbImage) -> Result<String, String> {
        let dir = self
            .screenshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("scrnshot"));
        std::fs::create_dir_all(&dir).map_err(|e| format!("Couldn't create {}: {}", dir.display(), e))?;
        let (picname, path) =
            Self::next_screenshot_path(&dir).ok_or_else(|| "Couldn't create a file".to_string())?;
        shot.save(&path).map_err(|e| format!("Could not write file: {}", e))?;
        Ok(picname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_info() {
        let ri = StdRefImport::new();
        assert_eq!(ri.vid_get_mode_info(0), Some((320, 240)));
        assert_eq!(ri.vid_get_mode_info(3), Some((640, 480)));
        assert_eq!(ri.vid_get_mode_info(-1), None);
        assert_eq!(ri.vid_get_mode_info(99), None);
    }

    #[test]
    fn test_cvar_roundtrip_through_import() {
        let mut ri = StdRefImport::new();
        assert_eq!(ri.cvar_get("sw_maxedges", "2048", 0), 2048.0);
        assert!(ri.cvar_modified("sw_maxedges"));
        ri.cvar_clear_modified("sw_maxedges");
        ri.cvar_set_value("sw_maxedges", 4096.0);
        assert!(ri.cvar_modified("sw_maxedges"));
        assert_eq!(ri.cvar_value("sw_maxedges"), 4096.0);
    }

    #[test]
    fn test_commands_unique() {
        let mut ri = StdRefImport::new();
        ri.cmd_add_command("screenshot");
        ri.cmd_add_command("screenshot");
        assert_eq!(ri.commands.len(), 1);
        ri.cmd_remove_command("screenshot");
        assert!(ri.commands.is_empty());
    }

    #[test]
    fn test_screenshot_written_as_png() {
        let dir = std::env::temp_dir().join(format!("q2soft_shot_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut ri = StdRefImport::new().with_screenshot_dir(&dir);
        let shot = RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0]));
        let name = ri.write_screenshot(&shot).unwrap();
        assert_eq!(name, "quake00.png");
        assert!(dir.join("quake00.png").exists());
        let name = ri.write_screenshot(&shot).unwrap();
        assert_eq!(name, "quake01.png");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
