// sw_sprite.rs — Camera-facing sprites

use q2soft_common::q_shared::*;

use crate::sw_local::*;
use crate::sw_model_types::{Image, ImageHandle, SpriteModel};
use crate::sw_poly::{Blend, PolyRasterizer, PolyStyle, PolyVert};
use crate::sw_refdef::Entity;
use crate::sw_scan::FrameTarget;

/// Build the four corners of a sprite frame, parallel to the view plane,
/// with texture coordinates covering the whole frame.
pub fn sprite_quad(view: &ViewState, origin: &Vec3, width: i32, height: i32, origin_x: i32, origin_y: i32) -> [PolyVert; 4] {
    let center = view.world.transform_point(origin);
    let (w, h) = (width as f32, height as f32);
    let (ox, oy) = (origin_x as f32, origin_y as f32);
    let corner = |dx: f32, dy: f32, s: f32, t: f32| PolyVert {
        pos: [center[0] + dx, center[1] + dy, center[2]],
        s,
        t,
        l: 0.0,
    };
    [
        corner(-ox, h - oy, 0.0, 0.0),
        corner(w - ox, h - oy, w, 0.0),
        corner(w - ox, -oy, w, h),
        corner(-ox, -oy, 0.0, h),
    ]
}

/// Draw one sprite entity. Transparent texels are left alone.
#[allow(clippy::too_many_arguments)]
pub fn draw_sprite(
    rast: &mut PolyRasterizer,
    target: &mut FrameTarget,
    view: &ViewState,
    e: &Entity,
    sprite: &SpriteModel,
    images: &[Image],
    notexture: Option<ImageHandle>,
    alphamap: &[u8],
) {
    if sprite.frames.is_empty() {
        return;
    }
    let frame = &sprite.frames[e.frame.rem_euclid(sprite.frames.len() as i32) as usize];
    let Some(image) = frame.image.or(notexture).and_then(|h| images.get(h)) else {
        return;
    };

    let quad = sprite_quad(view, &e.origin, frame.width, frame.height, frame.origin_x, frame.origin_y);
    let alpha = if e.flags.contains(RenderFx::TRANSLUCENT) { e.alpha } else { 1.0 };
    let style = PolyStyle { blend: Blend::for_alpha(alpha), alphamap, write_z: false };

    let (pixels, iw, ih) = image.mip(0);
    // frame size may differ from the image; scale into it
    let sx = iw as f32 / frame.width.max(1) as f32;
    let sy = ih as f32 / frame.height.max(1) as f32;
    rast.draw(target, view, &quad, &style, |s, t, _| {
        let x = ((s * sx) as i32).clamp(0, iw - 1);
        let y = ((t * sy) as i32).clamp(0, ih - 1);
        match pixels.get((y * iw + x) as usize) {
            Some(&TRANSPARENT_COLOR) | None => None,
            Some(&c) => Some(c),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sw_model_types::{ImageType, SpriteFrame};

    fn view() -> ViewState {
        let mut view = ViewState::default();
        view.setup(VRect { x: 0, y: 0, width: 32, height: 32 }, 90.0, &[0.0; 3], &[0.0; 3]);
        view
    }

    fn image(fill: u8) -> Image {
        // left half see-through
        let pixels = (0..64).map(|i| if i % 8 < 4 { TRANSPARENT_COLOR } else { fill }).collect();
        Image {
            name: "sprites/s_test.pcx".into(),
            kind: ImageType::Sprite,
            width: 8,
            height: 8,
            mips: vec![pixels],
            transparent: true,
            registration_sequence: 1,
        }
    }

    fn sprite() -> SpriteModel {
        SpriteModel {
            frames: vec![SpriteFrame {
                width: 8,
                height: 8,
                origin_x: 4,
                origin_y: 4,
                name: "sprites/s_test.pcx".into(),
                image: Some(0),
            }],
        }
    }

    #[test]
    fn test_quad_is_centred_on_origin() {
        let view = view();
        let quad = sprite_quad(&view, &[20.0, 0.0, 0.0], 8, 8, 4, 4);
        assert_eq!(quad[0].pos, [-4.0, 4.0, 20.0]);
        assert_eq!(quad[2].pos, [4.0, -4.0, 20.0]);
        assert_eq!((quad[2].s, quad[2].t), (8.0, 8.0));
    }

    #[test]
    fn test_sprite_draws_texture_over_frame() {
        let view = view();
        let (mut pixels, mut zbuffer) = (vec![0u8; 32 * 32], vec![0u16; 32 * 32]);
        let mut target = FrameTarget { pixels: &mut pixels, zbuffer: &mut zbuffer, stride: 32 };
        let mut rast = PolyRasterizer::new();
        let e = Entity { origin: [20.0, 0.0, 0.0], frame: 3, alpha: 1.0, ..Default::default() };
        draw_sprite(&mut rast, &mut target, &view, &e, &sprite(), &[image(9)], None, &[]);
        assert_eq!(pixels[16 * 32 + 17], 9);
        assert_eq!(pixels[16 * 32 + 13], 0);
        assert!(zbuffer.iter().all(|&z| z == 0));
    }
}
