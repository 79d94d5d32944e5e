//! Pixel operations for building and applying the watermark layer

use image::{Rgba, RgbaImage};

/// Draw `mark` onto `canvas` with its top-left corner at (`x`, `y`)
///
/// Uses the "over" operator; parts outside the canvas are clipped.
pub fn paste(canvas: &mut RgbaImage, mark: &RgbaImage, x: i32, y: i32) {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let (mw, mh) = (mark.width() as i32, mark.height() as i32);

    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = x.saturating_add(mw).min(cw);
    let y_end = y.saturating_add(mh).min(ch);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let src = *mark.get_pixel((tx - x) as u32, (ty - y) as u32);
            if src[3] == 0 {
                continue;
            }
            let dst = canvas.get_pixel_mut(tx as u32, ty as u32);
            *dst = over(*dst, src, 1.0);
        }
    }
}

/// Rotate `layer` counter-clockwise by `degrees` about its centre, sampling
/// into a `width` x `height` canvas centred on the same point
///
/// Samples are bilinear on premultiplied colour, so transparent borders do
/// not darken the mark's edges.
pub fn rotate_into(layer: &RgbaImage, degrees: f32, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    let (cos, sin) = {
        let radians = degrees.to_radians();
        (radians.cos(), radians.sin())
    };

    let src_cx = layer.width() as f32 / 2.0;
    let src_cy = layer.height() as f32 / 2.0;
    let dst_cx = width as f32 / 2.0;
    let dst_cy = height as f32 / 2.0;

    for (dx, dy, pixel) in out.enumerate_pixels_mut() {
        // Pixel centres, relative to the canvas centre
        let rx = dx as f32 + 0.5 - dst_cx;
        let ry = dy as f32 + 0.5 - dst_cy;

        // Inverse of a counter-clockwise turn in y-down coordinates
        let sx = rx * cos - ry * sin + src_cx - 0.5;
        let sy = rx * sin + ry * cos + src_cy - 0.5;

        *pixel = sample_bilinear(layer, sx, sy);
    }

    out
}

fn sample_bilinear(image: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let fetch = |px: f32, py: f32| -> [f32; 4] {
        if px < 0.0 || py < 0.0 || px >= image.width() as f32 || py >= image.height() as f32 {
            return [0.0; 4];
        }
        let p = image.get_pixel(px as u32, py as u32);
        let a = p[3] as f32 / 255.0;
        [p[0] as f32 * a, p[1] as f32 * a, p[2] as f32 * a, p[3] as f32]
    };

    let samples = [
        (fetch(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (fetch(x0 + 1.0, y0), fx * (1.0 - fy)),
        (fetch(x0, y0 + 1.0), (1.0 - fx) * fy),
        (fetch(x0 + 1.0, y0 + 1.0), fx * fy),
    ];

    let mut acc = [0.0f32; 4];
    for (value, weight) in samples {
        for c in 0..4 {
            acc[c] += value[c] * weight;
        }
    }

    let alpha = acc[3];
    if alpha < 0.5 {
        return Rgba([0, 0, 0, 0]);
    }
    let a = alpha / 255.0;
    let channel = |v: f32| (v / a).round().clamp(0.0, 255.0) as u8;
    Rgba([
        channel(acc[0]),
        channel(acc[1]),
        channel(acc[2]),
        alpha.round().clamp(0.0, 255.0) as u8,
    ])
}

/// Blend a page-sized `layer` onto `page`, scaling the layer's alpha by `opacity`
///
/// Pixels where the layer is fully transparent are left untouched, so an
/// empty layer or zero opacity leaves the page byte-identical.
pub fn blend_layer(page: &mut RgbaImage, layer: &RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }

    let width = page.width().min(layer.width());
    let height = page.height().min(layer.height());

    for y in 0..height {
        for x in 0..width {
            let src = *layer.get_pixel(x, y);
            if src[3] == 0 {
                continue;
            }
            let dst = page.get_pixel_mut(x, y);
            *dst = over(*dst, src, opacity);
        }
    }
}

/// Multiply every alpha value of `layer` by `opacity`
pub fn scale_alpha(layer: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    for pixel in layer.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * opacity).round() as u8;
    }
}

/// Porter-Duff "over" with extra opacity on the foreground
fn over(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = foreground[3] as f32 / 255.0 * opacity;
    if fg_alpha <= 0.0 {
        return background;
    }
    let bg_alpha = background[3] as f32 / 255.0;
    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |fg: u8, bg: u8| -> u8 {
        let value = (fg as f32 * fg_alpha + bg as f32 * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(foreground[0], background[0]),
        blend(foreground[1], background[1]),
        blend(foreground[2], background[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn test_paste_clips_to_canvas() {
        let mut canvas = RgbaImage::new(4, 4);
        let mark = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 255]));
        paste(&mut canvas, &mark, -1, 2);

        assert_eq!(*canvas.get_pixel(0, 2), Rgba([10, 20, 30, 255]));
        assert_eq!(*canvas.get_pixel(1, 3), Rgba([10, 20, 30, 255]));
        assert_eq!(*canvas.get_pixel(2, 2), Rgba([0, 0, 0, 0]));
        assert_eq!(*canvas.get_pixel(0, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_paste_far_off_canvas_is_a_no_op() {
        let mut canvas = RgbaImage::new(4, 4);
        let mark = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 255]));
        paste(&mut canvas, &mark, i32::MAX, i32::MAX);
        paste(&mut canvas, &mark, i32::MIN, i32::MIN);
        assert!(canvas.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_blend_half_opacity_black_on_white() {
        let mut page = white(2, 2);
        let layer = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        blend_layer(&mut page, &layer, 0.5);

        let p = page.get_pixel(0, 0);
        assert!((126..=128).contains(&p[0]), "got {:?}", p);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_zero_opacity_is_identity() {
        let mut page = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8 * 30, y as u8 * 30, 77, 255]));
        let original = page.clone();
        let layer = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));

        blend_layer(&mut page, &layer, 0.0);
        assert_eq!(page, original);
    }

    #[test]
    fn test_transparent_layer_pixels_leave_page_untouched() {
        let mut page = RgbaImage::from_fn(4, 4, |x, _| Rgba([x as u8 * 60 + 1, 3, 5, 255]));
        let original = page.clone();
        blend_layer(&mut page, &RgbaImage::new(4, 4), 1.0);
        assert_eq!(page, original);
    }

    #[test]
    fn test_rotate_zero_degrees_preserves_pixels() {
        let layer = RgbaImage::from_fn(6, 4, |x, y| Rgba([x as u8 * 40, y as u8 * 60, 9, 255]));
        let rotated = rotate_into(&layer, 0.0, 6, 4);
        assert_eq!(rotated, layer);
    }

    #[test]
    fn test_rotate_quarter_turn_counter_clockwise() {
        // A mark at the right edge moves to the top after a 90 degree turn
        let mut layer = RgbaImage::new(9, 9);
        layer.put_pixel(8, 4, Rgba([255, 0, 0, 255]));
        let rotated = rotate_into(&layer, 90.0, 9, 9);

        let p = rotated.get_pixel(4, 0);
        assert_eq!(p[0], 255);
        assert!(p[3] > 200, "got {:?}", p);
        assert_eq!(rotated.get_pixel(8, 4)[3], 0);
    }

    #[test]
    fn test_rotate_crops_to_requested_size() {
        let layer = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let rotated = rotate_into(&layer, 45.0, 4, 6);
        assert_eq!(rotated.dimensions(), (4, 6));
        // The centre of a large opaque layer stays opaque
        assert_eq!(rotated.get_pixel(2, 3)[3], 255);
    }

    #[test]
    fn test_scale_alpha() {
        let mut layer = RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 200]));
        scale_alpha(&mut layer, 0.5);
        assert_eq!(layer.get_pixel(0, 0)[3], 100);
    }
}
