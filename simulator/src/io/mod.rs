//! Writing simulated frames to disk.

#[cfg(feature = "fits")]
pub mod fits;
pub mod png;

pub use png::save_png;

use ndarray::Array2;

/// Round counts to integers and clamp them to `[0, max_adu]`.
///
/// Non-finite values become 0.
pub fn quantize_frame(frame: &Array2<f64>, max_adu: u16) -> Array2<u16> {
    frame.mapv(|v| {
        if v.is_finite() {
            v.round().clamp(0.0, max_adu as f64) as u16
        } else {
            0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_quantize_clamps_and_rounds() {
        let frame = array![[-3.0, 0.4, 0.6], [1e9, f64::NAN, 41.5]];
        let q = quantize_frame(&frame, 1000);
        assert_eq!(q, array![[0, 0, 1], [1000, 0, 42]]);
    }
}
