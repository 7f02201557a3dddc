//! 16-bit grayscale PNG export.

use crate::error::Result;
use image::{ImageBuffer, Luma};
use ndarray::Array2;
use std::path::Path;

/// Save `image` as a 16-bit grayscale PNG.
///
/// Row 0 of the array (detector y = 0) becomes the bottom row of the PNG, so
/// the picture has the same orientation as the FITS frame in a viewer.
pub fn save_png(image: &Array2<u16>, path: &Path) -> Result<()> {
    let (height, width) = image.dim();
    let mut buffer: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::new(width as u32, height as u32);
    for (x, y, pixel) in buffer.enumerate_pixels_mut() {
        *pixel = Luma([image[[height - 1 - y as usize, x as usize]]]);
    }
    buffer.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_png_is_flipped_vertically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        let mut frame = Array2::<u16>::zeros((3, 4));
        frame[[0, 1]] = 1234;
        save_png(&frame, &path).unwrap();

        let read = image::open(&path).unwrap().into_luma16();
        assert_eq!(read.dimensions(), (4, 3));
        assert_eq!(read.get_pixel(1, 2).0[0], 1234);
        assert_eq!(read.get_pixel(1, 0).0[0], 0);
    }
}
