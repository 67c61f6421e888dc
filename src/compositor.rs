use x11rb::protocol::xproto::ImageOrder;

use crate::source::SourceImage;

/// In-memory byte order of a 32-bit pixel as the X server expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// LSB-first servers: blue, green, red, alpha.
    Bgra,
    /// MSB-first servers: alpha, red, green, blue.
    Argb,
}

impl From<ImageOrder> for PixelLayout {
    fn from(order: ImageOrder) -> Self {
        if order == ImageOrder::MSB_FIRST {
            Self::Argb
        } else {
            Self::Bgra
        }
    }
}

impl PixelLayout {
    pub fn pack(self, [r, g, b, a]: [u8; 4]) -> [u8; 4] {
        match self {
            Self::Bgra => [b, g, r, a],
            Self::Argb => [a, r, g, b],
        }
    }

    #[cfg(test)]
    pub fn unpack(self, px: [u8; 4]) -> [u8; 4] {
        match self {
            Self::Bgra => [px[2], px[1], px[0], px[3]],
            Self::Argb => [px[1], px[2], px[3], px[0]],
        }
    }
}

/// Region of the window covered by the scaled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FittedRect {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

/// A display-ready frame: packed pixels for `rect`, row-major, 4 bytes each.
pub struct RenderedFrame {
    pub data: Vec<u8>,
    pub rect: FittedRect,
}

/// Largest rectangle with the source aspect ratio that fits the target,
/// centered on the axis with slack. `None` when the target is empty.
pub fn fit_rect(src_width: u32, src_height: u32, target_width: u16, target_height: u16) -> Option<FittedRect> {
    if src_width == 0 || src_height == 0 || target_width == 0 || target_height == 0 {
        return None;
    }

    let aspect = src_width as f64 / src_height as f64;
    let target_aspect = target_width as f64 / target_height as f64;

    let rect = if target_aspect > aspect {
        // Pillarbox: fit by height
        let width = ((aspect * target_height as f64).round() as u16).clamp(1, target_width);
        FittedRect {
            x: ((target_width - width) / 2) as i16,
            y: 0,
            width,
            height: target_height,
        }
    } else {
        // Letterbox: fit by width
        let height = ((target_width as f64 / aspect).round() as u16).clamp(1, target_height);
        FittedRect {
            x: 0,
            y: ((target_height - height) / 2) as i16,
            width: target_width,
            height,
        }
    };

    Some(rect)
}

/// Uniform mask alpha for an opacity in `[0, 1]`.
pub fn opacity_alpha(opacity: f64) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn div_round(n: u32, d: u32) -> u8 {
    ((n + d / 2) / d) as u8
}

/// Source-over of a straight-alpha pixel under a uniform mask onto a
/// cleared destination. Output is premultiplied.
pub fn apply_mask([r, g, b, a]: [u8; 4], mask: u8) -> [u8; 4] {
    let weight = a as u32 * mask as u32;
    [
        div_round(r as u32 * weight, 255 * 255),
        div_round(g as u32 * weight, 255 * 255),
        div_round(b as u32 * weight, 255 * 255),
        div_round(weight, 255),
    ]
}

/// Nearest-neighbour source coordinate for each destination coordinate,
/// sampling at pixel centers.
fn sample_map(src_len: u32, dst_len: u16) -> Vec<u32> {
    (0..dst_len as u64)
        .map(|d| {
            let s = ((2 * d + 1) * src_len as u64) / (2 * dst_len as u64);
            (s as u32).min(src_len - 1)
        })
        .collect()
}

/// Scale `source` into the window, apply the opacity mask and pack the
/// pixels for the server.
pub fn render(
    source: &SourceImage,
    target_width: u16,
    target_height: u16,
    opacity: f64,
    layout: PixelLayout,
) -> Option<RenderedFrame> {
    let rect = fit_rect(source.width(), source.height(), target_width, target_height)?;
    let mask = opacity_alpha(opacity);

    let xs = sample_map(source.width(), rect.width);
    let ys = sample_map(source.height(), rect.height);

    let mut data = Vec::with_capacity(rect.width as usize * rect.height as usize * 4);
    for &sy in &ys {
        for &sx in &xs {
            let px = apply_mask(source.rgba(sx, sy), mask);
            data.extend_from_slice(&layout.pack(px));
        }
    }

    log::debug!(
        "Rendered {}x{} at ({}, {}) in {}x{}, alpha {}",
        rect.width,
        rect.height,
        rect.x,
        rect.y,
        target_width,
        target_height,
        mask
    );

    Some(RenderedFrame { data, rect })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn opaque(width: u32, height: u32) -> SourceImage {
        SourceImage::from_rgba(RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))).unwrap()
    }

    #[test]
    fn test_fit_rect_properties() {
        let sizes = [1u16, 3, 7, 64, 100, 333, 1920];
        for &sw in &sizes {
            for &sh in &sizes {
                for &tw in &sizes {
                    for &th in &sizes {
                        let rect = fit_rect(sw as u32, sh as u32, tw, th).unwrap();
                        assert!(rect.width <= tw && rect.height <= th);
                        assert!(rect.width >= 1 && rect.height >= 1);

                        let x_slack = tw - rect.width;
                        let y_slack = th - rect.height;
                        assert!(x_slack == 0 || y_slack == 0, "one axis must be filled");
                        assert_eq!(rect.x as u16, x_slack / 2);
                        assert_eq!(rect.y as u16, y_slack / 2);

                        // Aspect within half a pixel of rounding on the scaled axis
                        let src_aspect = sw as f64 / sh as f64;
                        if y_slack == 0 && rect.width > 1 && rect.width < tw {
                            let ideal = src_aspect * rect.height as f64;
                            assert!((rect.width as f64 - ideal).abs() <= 0.5 + 1e-9);
                        }
                        if x_slack == 0 && rect.height > 1 && rect.height < th {
                            let ideal = rect.width as f64 / src_aspect;
                            assert!((rect.height as f64 - ideal).abs() <= 0.5 + 1e-9);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_fit_rect_empty_target() {
        assert_eq!(fit_rect(10, 10, 0, 50), None);
        assert_eq!(fit_rect(10, 10, 50, 0), None);
    }

    #[test]
    fn test_wide_window_pillarboxes() {
        let rect = fit_rect(200, 100, 400, 100).unwrap();
        assert_eq!(
            rect,
            FittedRect {
                x: 100,
                y: 0,
                width: 200,
                height: 100
            }
        );
    }

    #[test]
    fn test_tall_window_letterboxes() {
        let rect = fit_rect(200, 100, 100, 400).unwrap();
        assert_eq!(
            rect,
            FittedRect {
                x: 0,
                y: 175,
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn test_opacity_endpoints() {
        let px = [10, 20, 30, 128];
        assert_eq!(apply_mask(px, opacity_alpha(0.0)), [0, 0, 0, 0]);
        assert_eq!(apply_mask(px, opacity_alpha(1.0))[3], 128);
        assert_eq!(apply_mask([10, 20, 30, 255], 255), [10, 20, 30, 255]);
    }

    #[test]
    fn test_opacity_monotonic() {
        for alpha in [0u8, 1, 77, 128, 254, 255] {
            let mut last = 0;
            for step in 0..=100 {
                let out = apply_mask([255, 255, 255, alpha], opacity_alpha(step as f64 / 100.0))[3];
                assert!(out >= last);
                last = out;
            }
        }
    }

    #[test]
    fn test_opacity_alpha_rounds_and_clamps() {
        assert_eq!(opacity_alpha(0.25), 64);
        assert_eq!(opacity_alpha(-1.0), 0);
        assert_eq!(opacity_alpha(3.0), 255);
    }

    #[test]
    fn test_pixel_layout_round_trip() {
        let px = [0x11, 0x22, 0x33, 0x44];
        assert_eq!(PixelLayout::Bgra.pack(px), [0x33, 0x22, 0x11, 0x44]);
        assert_eq!(PixelLayout::Argb.pack(px), [0x44, 0x11, 0x22, 0x33]);
        for layout in [PixelLayout::Bgra, PixelLayout::Argb] {
            assert_eq!(layout.unpack(layout.pack(px)), px);
        }
    }

    #[test]
    fn test_layout_from_server_order() {
        assert_eq!(PixelLayout::from(ImageOrder::LSB_FIRST), PixelLayout::Bgra);
        assert_eq!(PixelLayout::from(ImageOrder::MSB_FIRST), PixelLayout::Argb);
    }

    #[test]
    fn test_render_quarter_opacity_in_wide_window() {
        let source = opaque(200, 100);
        let frame = render(&source, 400, 100, 0.25, PixelLayout::Bgra).unwrap();

        assert_eq!((frame.rect.x, frame.rect.y), (100, 0));
        assert_eq!((frame.rect.width, frame.rect.height), (200, 100));
        assert_eq!(frame.data.len(), 200 * 100 * 4);

        let first = [frame.data[0], frame.data[1], frame.data[2], frame.data[3]];
        let [r, g, b, a] = PixelLayout::Bgra.unpack(first);
        assert_eq!(a, 64);
        assert_eq!((r, g, b), (50, 25, 13));
    }

    #[test]
    fn test_render_nearest_neighbour_upscale() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let source = SourceImage::from_rgba(img).unwrap();

        let frame = render(&source, 4, 2, 1.0, PixelLayout::Bgra).unwrap();
        assert_eq!((frame.rect.width, frame.rect.height), (4, 2));

        let pixels: Vec<[u8; 4]> = frame
            .data
            .chunks_exact(4)
            .map(|c| PixelLayout::Bgra.unpack([c[0], c[1], c[2], c[3]]))
            .collect();
        let red = [255, 0, 0, 255];
        let blue = [0, 0, 255, 255];
        assert_eq!(pixels, vec![red, red, blue, blue, red, red, blue, blue]);
    }

    #[test]
    fn test_render_empty_target() {
        assert!(render(&opaque(4, 4), 0, 10, 1.0, PixelLayout::Bgra).is_none());
    }
}
