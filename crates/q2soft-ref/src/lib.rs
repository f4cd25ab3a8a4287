#![allow(clippy::needless_range_loop, clippy::too_many_arguments, clippy::manual_range_contains,
         clippy::field_reassign_with_default, clippy::new_without_default)]
// 8-bit software refresh

pub mod sw_local;
pub mod sw_pool;
pub mod sw_model_types;
pub mod sw_refdef;
pub mod sw_import;
pub mod platform;

pub mod sw_image;
pub mod sw_model;
pub mod sw_bsp;
pub mod sw_edge;
pub mod sw_light;
pub mod sw_sky;
pub mod sw_scan;
pub mod sw_poly;
pub mod sw_sprite;
pub mod sw_alias;
pub mod sw_part;
pub mod sw_warp;
pub mod sw_palette;
pub mod sw_main;

pub use sw_main::{FrameStats, SwRenderer};
