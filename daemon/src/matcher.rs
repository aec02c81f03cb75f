//! Exact-position, tolerance-bounded pixel matching.

use crate::capture::{Frame, Rgb};
use crate::profile::SignatureGroup;

/// True when every channel of `captured` is within `tolerance` of `expected`.
pub fn color_matches(captured: Rgb, expected: Rgb, tolerance: u8) -> bool {
    captured.r.abs_diff(expected.r) <= tolerance
        && captured.g.abs_diff(expected.g) <= tolerance
        && captured.b.abs_diff(expected.b) <= tolerance
}

/// True when every probe of `group` matches `frame`. Probes outside the frame never match.
pub fn group_matches(frame: &Frame, group: &SignatureGroup, tolerance: u8) -> bool {
    group.probes().iter().all(|probe| {
        frame
            .pixel(probe.x, probe.y)
            .is_some_and(|captured| color_matches(captured, probe.color, tolerance))
    })
}

/// True when any of `groups` matches in full.
pub fn any_group_matches(frame: &Frame, groups: &[SignatureGroup], tolerance: u8) -> bool {
    groups.iter().any(|group| group_matches(frame, group, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PixelProbe;

    fn solid(width: u32, height: u32, color: Rgb) -> Frame {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            rgba.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Frame { width, height, rgba }
    }

    fn group(probes: &[(u32, u32, u8, u8, u8)]) -> SignatureGroup {
        SignatureGroup::new(
            probes
                .iter()
                .map(|&(x, y, r, g, b)| PixelProbe { x, y, color: Rgb::new(r, g, b) })
                .collect(),
        )
    }

    // ── color_matches ─────────────────────────────────────────────────────────

    #[test]
    fn exact_color_matches_with_zero_tolerance() {
        let c = Rgb::new(12, 34, 56);
        assert!(color_matches(c, c, 0));
    }

    #[test]
    fn difference_exactly_at_tolerance_matches() {
        let expected = Rgb::new(100, 100, 100);
        assert!(color_matches(Rgb::new(115, 85, 100), expected, 15));
    }

    #[test]
    fn difference_one_past_tolerance_fails() {
        let expected = Rgb::new(100, 100, 100);
        assert!(!color_matches(Rgb::new(116, 100, 100), expected, 15));
        assert!(!color_matches(Rgb::new(100, 84, 100), expected, 15));
        assert!(!color_matches(Rgb::new(100, 100, 116), expected, 15));
    }

    #[test]
    fn matches_iff_max_channel_delta_within_tolerance() {
        let samples = [0u8, 1, 7, 14, 15, 16, 128, 254, 255];
        for &a in &samples {
            for &b in &samples {
                for t in [0u8, 1, 15, 255] {
                    let c1 = Rgb::new(a, b, a);
                    let c2 = Rgb::new(b, a, a);
                    let max_delta = a.abs_diff(b);
                    assert_eq!(color_matches(c1, c2, t), max_delta <= t, "{c1:?} vs {c2:?} @ {t}");
                }
            }
        }
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert!(color_matches(Rgb::new(0, 0, 0), Rgb::new(255, 255, 255), 255));
        assert!(!color_matches(Rgb::new(0, 0, 0), Rgb::new(255, 255, 255), 254));
    }

    // ── group_matches ─────────────────────────────────────────────────────────

    #[test]
    fn group_requires_every_probe() {
        let frame = solid(20, 20, Rgb::new(255, 0, 0));
        assert!(group_matches(&frame, &group(&[(1, 1, 255, 0, 0), (10, 10, 250, 5, 0)]), 5));
        assert!(!group_matches(&frame, &group(&[(1, 1, 255, 0, 0), (10, 10, 0, 0, 255)]), 5));
    }

    #[test]
    fn probe_outside_frame_fails_group() {
        let frame = solid(4, 4, Rgb::new(0, 0, 0));
        assert!(!group_matches(&frame, &group(&[(0, 0, 0, 0, 0), (4, 0, 0, 0, 0)]), 255));
    }

    #[test]
    fn any_group_is_or_of_groups() {
        let frame = solid(8, 8, Rgb::new(0, 255, 0));
        let red = group(&[(0, 0, 255, 0, 0)]);
        let green = group(&[(0, 0, 0, 255, 0)]);
        assert!(any_group_matches(&frame, &[red.clone(), green], 0));
        assert!(!any_group_matches(&frame, &[red], 0));
        assert!(!any_group_matches(&frame, &[], 0));
    }
}
