//! Binary object masks and morphological erosion.
//!
//! Masks are 8-bit grayscale images where any nonzero pixel is foreground.

use image::{GrayImage, Luma};

/// Offsets of an `r x r` rectangular structuring element anchored at its centre.
fn rect_kernel(radius: u32) -> Vec<(i32, i32)> {
    let anchor = radius as i32 / 2;
    let mut kernel = Vec::with_capacity((radius * radius) as usize);
    for y in 0..radius as i32 {
        for x in 0..radius as i32 {
            kernel.push((x - anchor, y - anchor));
        }
    }
    kernel
}

/// Erode a mask with an `radius x radius` square element.
///
/// A pixel stays foreground only if every in-bounds pixel under the element is
/// foreground; pixels outside the image never erode. Foreground pixels keep
/// their original value. `radius == 0` returns the mask unchanged.
pub fn erode_mask(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }

    let kernel = rect_kernel(radius);
    let (width, height) = (mask.width() as i32, mask.height() as i32);
    let mut output = GrayImage::new(mask.width(), mask.height());

    for y in 0..height {
        for x in 0..width {
            let mut min_val = u8::MAX;
            for &(kx, ky) in &kernel {
                let (px, py) = (x + kx, y + ky);
                if px >= 0 && px < width && py >= 0 && py < height {
                    min_val = min_val.min(mask.get_pixel(px as u32, py as u32)[0]);
                    if min_val == 0 {
                        break;
                    }
                }
            }
            output.put_pixel(x as u32, y as u32, Luma([min_val]));
        }
    }

    output
}

/// Number of foreground pixels.
pub fn foreground_area(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}
