//! Output frame composition
//!
//! Pure layout logic: camera tiles are scaled to 60% of their native size
//! and placed on a grid over the screen-share frame (resized to the canvas)
//! or a black background when nothing is being shared. Tiles that run past
//! the canvas edge are clipped. The grid matches what clients expect: the
//! column stride is 0.8 camera widths starting 0.7 widths in, rows advance
//! by 0.8 camera heights.

use crate::media::frame::{Canvas, RawFrame};

/// Fraction of native camera size a tile is scaled to (3/5 = 60%)
const TILE_SCALE_NUM: u32 = 3;
const TILE_SCALE_DEN: u32 = 5;

/// Compose one output frame from the current screen share and at most one
/// camera frame per participant.
///
/// With no inputs at all this still produces a valid frame: the solid
/// background. The compositor's cadence is input-independent.
pub fn compose(
    screen: Option<&RawFrame>,
    cameras: &[RawFrame],
    canvas_width: u32,
    canvas_height: u32,
) -> RawFrame {
    let mut canvas = match screen {
        Some(frame) => Canvas::from_frame(frame, canvas_width, canvas_height),
        None => Canvas::solid(canvas_width, canvas_height, [0, 0, 0]),
    };

    if let Some(first) = cameras.first() {
        let cam_width = first.width();
        let cam_height = first.height();
        let per_row = (canvas.width() / cam_width).max(1);

        for (i, camera) in cameras.iter().enumerate() {
            let tile = camera.resize(
                camera.width() * TILE_SCALE_NUM / TILE_SCALE_DEN,
                camera.height() * TILE_SCALE_NUM / TILE_SCALE_DEN,
            );
            let col = i as u32 % per_row;
            let row = i as u32 / per_row;
            let x = col * cam_width * 4 / 5 + cam_width * 7 / 10;
            let y = row * cam_height * 4 / 5;
            canvas.blit(&tile, x, y);
        }
    }

    canvas.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_inputs_yields_black_canvas() {
        let out = compose(None, &[], 8, 6);
        assert_eq!(out.width(), 8);
        assert_eq!(out.height(), 6);
        assert_eq!(out.pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(out.pixel(7, 5), Some([0, 0, 0]));
    }

    #[test]
    fn test_screen_fills_canvas() {
        let screen = RawFrame::solid(4, 4, [50, 60, 70]);
        let out = compose(Some(&screen), &[], 16, 12);
        assert_eq!(out.width(), 16);
        assert_eq!(out.pixel(15, 11), Some([50, 60, 70]));
    }

    #[test]
    fn test_camera_tile_lands_on_grid() {
        let camera = RawFrame::solid(10, 10, [200, 0, 0]);
        let out = compose(None, &[camera], 40, 30);

        // First tile starts at x = 0.7 * cam_width = 7, y = 0, scaled to 6x6.
        assert_eq!(out.pixel(7, 0), Some([200, 0, 0]));
        assert_eq!(out.pixel(12, 5), Some([200, 0, 0]));
        assert_eq!(out.pixel(13, 6), Some([0, 0, 0]));
        assert_eq!(out.pixel(0, 0), Some([0, 0, 0]));
    }

    #[test]
    fn test_second_camera_offset_by_stride() {
        let a = RawFrame::solid(10, 10, [200, 0, 0]);
        let b = RawFrame::solid(10, 10, [0, 200, 0]);
        let out = compose(None, &[a, b], 40, 30);

        // Second tile: x = 1 * 8 + 7 = 15.
        assert_eq!(out.pixel(7, 0), Some([200, 0, 0]));
        assert_eq!(out.pixel(15, 0), Some([0, 200, 0]));
    }

    #[test]
    fn test_cameras_overlay_screen() {
        let screen = RawFrame::solid(4, 4, [9, 9, 9]);
        let camera = RawFrame::solid(10, 10, [0, 0, 200]);
        let out = compose(Some(&screen), &[camera], 40, 30);

        assert_eq!(out.pixel(7, 0), Some([0, 0, 200]));
        assert_eq!(out.pixel(0, 29), Some([9, 9, 9]));
    }
}
