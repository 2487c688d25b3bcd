//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Output dimensions when resizing to `target_width`, preserving aspect ratio.
///
/// The width never exceeds the original (no upscaling) and the height is
/// rounded, with a floor of 1px so extreme panoramas still encode.
///
/// ```
/// # use picture_gen::imaging::calculate_resize_dimensions;
/// assert_eq!(calculate_resize_dimensions((2000, 1500), 400), (400, 300));
/// assert_eq!(calculate_resize_dimensions((300, 200), 400), (300, 200));
/// ```
pub fn calculate_resize_dimensions(original: (u32, u32), target_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return (0, 0);
    }
    let width = target_width.min(orig_w);
    let ratio = width as f64 / orig_w as f64;
    let height = ((orig_h as f64 * ratio).round() as u32).max(1);
    (width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_keeps_aspect() {
        assert_eq!(calculate_resize_dimensions((2000, 1500), 1000), (1000, 750));
    }

    #[test]
    fn portrait_keeps_aspect() {
        assert_eq!(calculate_resize_dimensions((1500, 2000), 600), (600, 800));
    }

    #[test]
    fn odd_ratio_rounds_height() {
        // 1000x333 at 400 → 133.2 → 133
        assert_eq!(calculate_resize_dimensions((1000, 333), 400), (400, 133));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(calculate_resize_dimensions((450, 300), 600), (450, 300));
    }

    #[test]
    fn native_width_is_identity() {
        assert_eq!(calculate_resize_dimensions((1234, 567), 1234), (1234, 567));
    }

    #[test]
    fn extreme_panorama_keeps_one_pixel() {
        assert_eq!(calculate_resize_dimensions((10000, 1), 400), (400, 1));
    }

    #[test]
    fn zero_width_source() {
        assert_eq!(calculate_resize_dimensions((0, 100), 400), (0, 0));
    }
}
