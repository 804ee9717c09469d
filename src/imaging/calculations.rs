//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropRect;

/// Clamp a requested dimension to the minimum of one pixel.
pub fn clamp_dimension(value: i64) -> u32 {
    if value < 1 {
        1
    } else {
        value.min(u32::MAX as i64) as u32
    }
}

/// Scale `other` by the ratio `new / current`, rounding ties to even.
///
/// Used for both axes: when the width changes from `current` to `new`, the
/// height `other` is scaled by the same factor.
///
/// # Examples
/// ```
/// # use webthumb::imaging::calculations::scale_other_axis;
/// // 800x600 → width 400 gives height 300
/// assert_eq!(scale_other_axis(800, 400, 600), 300);
/// ```
pub fn scale_other_axis(current: u32, new: u32, other: u32) -> u32 {
    debug_assert!(current > 0, "current dimension must be initialized");
    let scaled = (other as f64 * (new as f64 / current as f64)).round_ties_even();
    clamp_dimension(scaled as i64)
}

/// Which axis a max-proportions clamp binds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingAxis {
    Height,
    Width,
    /// The longer side already fits, nothing changes.
    None,
}

/// Decide which single axis `set_max_proportions` clamps.
///
/// The longer side is the binding constraint. A square image is treated as
/// landscape, so its width is compared against `max_width`.
pub fn binding_axis(current: (u32, u32), max_height: u32, max_width: u32) -> BindingAxis {
    let (w, h) = current;
    if h > w {
        if h > max_height {
            BindingAxis::Height
        } else {
            BindingAxis::None
        }
    } else if w > max_width {
        BindingAxis::Width
    } else {
        BindingAxis::None
    }
}

/// Check that a crop rectangle is non-empty and lies inside the source.
pub fn crop_fits(rect: &CropRect, natural: (u32, u32)) -> bool {
    let (nw, nh) = natural;
    rect.width > 0
        && rect.height > 0
        && (rect.x as u64 + rect.width as u64) <= nw as u64
        && (rect.y as u64 + rect.height as u64) <= nh as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // clamp_dimension
    // =========================================================================

    #[test]
    fn clamp_raises_non_positive_to_one() {
        assert_eq!(clamp_dimension(0), 1);
        assert_eq!(clamp_dimension(-25), 1);
        assert_eq!(clamp_dimension(1), 1);
        assert_eq!(clamp_dimension(640), 640);
    }

    // =========================================================================
    // scale_other_axis
    // =========================================================================

    #[test]
    fn halving_width_halves_height() {
        assert_eq!(scale_other_axis(800, 400, 600), 300);
    }

    #[test]
    fn doubling_height_doubles_width() {
        assert_eq!(scale_other_axis(300, 600, 400), 800);
    }

    #[test]
    fn ties_round_to_even() {
        // 5 * (5 / 10) = 2.5 → 2
        assert_eq!(scale_other_axis(10, 5, 5), 2);
        // 3 * (7 / 2) = 10.5 → 10
        assert_eq!(scale_other_axis(2, 7, 3), 10);
        // 3 * (1 / 2) = 1.5 → 2
        assert_eq!(scale_other_axis(2, 1, 3), 2);
        // 5 * (100 / 300) = 1.666 → 2
        assert_eq!(scale_other_axis(300, 100, 5), 2);
    }

    #[test]
    fn never_scales_below_one_pixel() {
        // 1000x1 strip shrunk to width 10 → 0.01 rounds to 0, clamped to 1
        assert_eq!(scale_other_axis(1000, 10, 1), 1);
    }

    #[test]
    fn aspect_is_preserved_within_rounding() {
        let (w, h) = (1920u32, 1080u32);
        for new_w in [1u32, 7, 100, 333, 640, 1279, 3000] {
            let new_h = scale_other_axis(w, new_w, h);
            let expected = h as f64 * new_w as f64 / w as f64;
            assert!(
                (new_h as f64 - expected.max(1.0)).abs() <= 0.5 + f64::EPSILON,
                "{new_w} → {new_h}, expected ≈ {expected}"
            );
        }
    }

    // =========================================================================
    // binding_axis
    // =========================================================================

    #[test]
    fn portrait_binds_on_height() {
        assert_eq!(binding_axis((600, 800), 400, 400), BindingAxis::Height);
    }

    #[test]
    fn landscape_binds_on_width() {
        assert_eq!(binding_axis((800, 600), 400, 400), BindingAxis::Width);
    }

    #[test]
    fn square_counts_as_landscape() {
        assert_eq!(binding_axis((500, 500), 100, 1000), BindingAxis::None);
        assert_eq!(binding_axis((500, 500), 1000, 100), BindingAxis::Width);
    }

    #[test]
    fn fitting_image_is_untouched() {
        assert_eq!(binding_axis((300, 200), 400, 400), BindingAxis::None);
        // only the longer side is compared: the height exceeds max_height
        // but the width is the longer side and it fits
        assert_eq!(binding_axis((400, 300), 100, 500), BindingAxis::None);
    }

    // =========================================================================
    // crop_fits
    // =========================================================================

    #[test]
    fn crop_inside_bounds_fits() {
        assert!(crop_fits(&CropRect::new(0, 0, 800, 600), (800, 600)));
        assert!(crop_fits(&CropRect::new(100, 50, 200, 100), (800, 600)));
    }

    #[test]
    fn crop_past_edge_does_not_fit() {
        assert!(!crop_fits(&CropRect::new(700, 0, 200, 100), (800, 600)));
        assert!(!crop_fits(&CropRect::new(0, 599, 10, 2), (800, 600)));
    }

    #[test]
    fn empty_crop_does_not_fit() {
        assert!(!crop_fits(&CropRect::new(0, 0, 0, 10), (800, 600)));
        assert!(!crop_fits(&CropRect::new(0, 0, 10, 0), (800, 600)));
    }
}
