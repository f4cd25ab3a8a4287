// platform.rs — Platform window/mode negotiation and presentation
//
// The refresh talks to whatever owns the window through `SwImp`. A windowing
// backend implements it for real screens; `HeadlessImp` keeps the last
// presented frame in memory and is what tools and tests run against.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::sw_local::{RsErr, MAX_RESOLUTION};

pub trait SwImp {
    /// Create or resize the output surface. May adjust `width`/`height`.
    /// `InvalidFullscreen` means a window was made, but not fullscreen.
    fn init_graphics(&mut self, fullscreen: i32, width: &mut i32, height: &mut i32) -> RsErr;

    /// Show a frame of `width * height` 32-bit pixels.
    fn present(&mut self, pixels: &[u32], width: i32, height: i32);

    fn set_vsync(&mut self, _enabled: bool) {}

    fn shutdown(&mut self) {}
}

// ============================================================
// Headless backend
// ============================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentedFrame {
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u32>,
    pub count: u64,
}

/// Shared view of what the headless backend last presented.
pub type FrameHandle = Arc<Mutex<PresentedFrame>>;

pub struct HeadlessImp {
    pub allow_fullscreen: bool,
    pub max_width: i32,
    pub max_height: i32,
    pub fullscreen: bool,
    pub vsync: bool,
    frame: FrameHandle,
}

impl Default for HeadlessImp {
    fn default() -> Self {
        Self {
            allow_fullscreen: false,
            max_width: MAX_RESOLUTION,
            max_height: MAX_RESOLUTION,
            fullscreen: false,
            vsync: false,
            frame: Arc::new(Mutex::new(PresentedFrame::default())),
        }
    }
}

impl HeadlessImp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_handle(&self) -> FrameHandle {
        Arc::clone(&self.frame)
    }
}

impl SwImp for HeadlessImp {
    fn init_graphics(&mut self, fullscreen: i32, width: &mut i32, height: &mut i32) -> RsErr {
        if *width <= 0 || *height <= 0 || *width > self.max_width || *height > self.max_height {
            return RsErr::InvalidMode;
        }
        if fullscreen != 0 && !self.allow_fullscreen {
            self.fullscreen = false;
            return RsErr::InvalidFullscreen;
        }
        self.fullscreen = fullscreen != 0;
        RsErr::Ok
    }

    fn present(&mut self, pixels: &[u32], width: i32, height: i32) {
        let mut frame = self.frame.lock();
        frame.width = width;
        frame.height = height;
        frame.pixels.clear();
        frame.pixels.extend_from_slice(pixels);
        frame.count += 1;
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.vsync = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_rejects_oversized_mode() {
        let mut imp = HeadlessImp { max_width: 640, max_height: 480, ..Default::default() };
        let (mut w, mut h) = (800, 600);
        assert_eq!(imp.init_graphics(0, &mut w, &mut h), RsErr::InvalidMode);
        let (mut w, mut h) = (320, 200);
        assert_eq!(imp.init_graphics(0, &mut w, &mut h), RsErr::Ok);
    }

    #[test]
    fn test_headless_fullscreen_fallback() {
        let mut imp = HeadlessImp::new();
        let (mut w, mut h) = (320, 240);
        assert_eq!(imp.init_graphics(1, &mut w, &mut h), RsErr::InvalidFullscreen);
        assert!(!imp.fullscreen);
        imp.allow_fullscreen = true;
        assert_eq!(imp.init_graphics(1, &mut w, &mut h), RsErr::Ok);
        assert!(imp.fullscreen);
    }

    #[test]
    fn test_present_is_visible_through_handle() {
        let mut imp = HeadlessImp::new();
        let handle = imp.frame_handle();
        imp.present(&[1, 2, 3, 4], 2, 2);
        let frame = handle.lock();
        assert_eq!(frame.pixels, vec![1, 2, 3, 4]);
        assert_eq!(frame.count, 1);
    }
}
