// sw_refdef.rs — Frame descriptor handed to `render_frame`

use q2soft_common::q_shared::*;

use crate::sw_model_types::{ImageHandle, ModelHandle};

#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub model: Option<ModelHandle>,
    pub angles: Vec3,
    pub origin: Vec3,
    /// Beam end point, or the previous origin for lerping.
    pub oldorigin: Vec3,
    pub frame: i32,
    pub oldframe: i32,
    /// 0.0 = current frame, 1.0 = old frame.
    pub backlerp: f32,
    pub skinnum: i32,
    pub skin: Option<ImageHandle>,
    pub alpha: f32,
    pub flags: RenderFx,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DLight {
    pub origin: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Particle {
    pub origin: Vec3,
    pub color: i32,
    pub alpha: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightStyle {
    pub rgb: Vec3,
    /// rgb[0] + rgb[1] + rgb[2]
    pub white: f32,
}

impl Default for LightStyle {
    fn default() -> Self {
        Self { rgb: [1.0; 3], white: 3.0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefDef {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub fov_x: f32,
    pub fov_y: f32,
    pub vieworg: Vec3,
    pub viewangles: Vec3,
    /// rgba 0-1 full screen blend
    pub blend: [f32; 4],
    /// time in seconds for shader effects
    pub time: f32,
    pub rdflags: RdFlags,
    /// one bit per area; `None` means all areas are open
    pub areabits: Option<Vec<u8>>,
    pub lightstyles: Vec<LightStyle>,
    pub entities: Vec<Entity>,
    pub dlights: Vec<DLight>,
    pub particles: Vec<Particle>,
}

impl RefDef {
    pub fn lightstyle(&self, style: u8) -> LightStyle {
        self.lightstyles.get(style as usize).copied().unwrap_or_default()
    }

    pub fn area_visible(&self, area: i32) -> bool {
        match &self.areabits {
            None => true,
            Some(bits) => {
                let a = area.max(0) as usize;
                bits.get(a >> 3).is_some_and(|b| b & (1 << (a & 7)) != 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lightstyle_is_full_bright() {
        let fd = RefDef::default();
        assert_eq!(fd.lightstyle(7).white, 3.0);
    }

    #[test]
    fn test_area_bits() {
        let mut fd = RefDef::default();
        assert!(fd.area_visible(5));
        fd.areabits = Some(vec![0b0000_0010]);
        assert!(fd.area_visible(1));
        assert!(!fd.area_visible(0));
        assert!(!fd.area_visible(9));
    }
}
