//! Split-page state for double-page spreads.
//!
//! A landscape image is shown as two sequential halves. Which half comes
//! first depends on the split preference (left-to-right for western-style
//! spreads, right-to-left for manga), and the state only moves in the
//! paging direction.

use serde::{Deserialize, Serialize};

use crate::reader::PagingDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitPreference {
    SplitLeftToRight,
    SplitRightToLeft,
    NoSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitPart {
    #[default]
    Whole,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub fn needs_split(width: u32, height: u32) -> bool {
    width > height
}

/// Advance the split state for the image about to be rendered. Runs on
/// every render: entering a page, flipping to its other half, and leaving
/// it all pass through here.
///
/// With a splittable image the two halves simply swap and `Whole` enters
/// at the half matching the travel direction; a non-splittable image (or
/// the `NoSplit` preference) always collapses to `Whole`.
pub fn advance(
    part: SplitPart,
    direction: PagingDirection,
    preference: SplitPreference,
    needs_splitting: bool,
) -> SplitPart {
    if !needs_splitting || preference == SplitPreference::NoSplit {
        return SplitPart::Whole;
    }
    let left_to_right = preference == SplitPreference::SplitLeftToRight;
    match direction {
        PagingDirection::Forward => match part {
            SplitPart::Whole => {
                if left_to_right {
                    SplitPart::Left
                } else {
                    SplitPart::Right
                }
            }
            SplitPart::Left => SplitPart::Right,
            SplitPart::Right => SplitPart::Left,
        },
        PagingDirection::Backward => match part {
            SplitPart::Whole => {
                if left_to_right {
                    SplitPart::Right
                } else {
                    SplitPart::Left
                }
            }
            SplitPart::Left => SplitPart::Right,
            SplitPart::Right => SplitPart::Left,
        },
    }
}

/// First half shown when entering a fresh page while paging forward.
pub fn forward_entry_part(preference: SplitPreference) -> SplitPart {
    match preference {
        SplitPreference::SplitLeftToRight => SplitPart::Left,
        SplitPreference::SplitRightToLeft => SplitPart::Right,
        SplitPreference::NoSplit => SplitPart::Whole,
    }
}

/// First half shown when entering a fresh page while paging backward.
pub fn backward_entry_part(preference: SplitPreference) -> SplitPart {
    match preference {
        SplitPreference::SplitLeftToRight => SplitPart::Right,
        SplitPreference::SplitRightToLeft => SplitPart::Left,
        SplitPreference::NoSplit => SplitPart::Whole,
    }
}

/// Crop rectangle for the rendered part: a half-width slice with a left or
/// right x-offset, or the full image.
pub fn crop_for(part: SplitPart, width: u32, height: u32) -> CropRect {
    let half = width / 2;
    match part {
        SplitPart::Whole => CropRect {
            x: 0,
            y: 0,
            width,
            height,
        },
        SplitPart::Left => CropRect {
            x: 0,
            y: 0,
            width: half,
            height,
        },
        SplitPart::Right => CropRect {
            x: half,
            y: 0,
            width: width - half,
            height,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PagingDirection::{Backward, Forward};
    use SplitPart::{Left, Right, Whole};
    use SplitPreference::{NoSplit, SplitLeftToRight, SplitRightToLeft};

    #[test]
    fn portrait_image_never_splits() {
        for part in [Whole, Left, Right] {
            for dir in [Forward, Backward] {
                assert_eq!(advance(part, dir, SplitLeftToRight, false), Whole);
            }
        }
    }

    #[test]
    fn no_split_preference_forces_whole() {
        assert_eq!(advance(Left, Forward, NoSplit, true), Whole);
        assert_eq!(advance(Whole, Backward, NoSplit, true), Whole);
    }

    #[test]
    fn forward_cycle_left_to_right() {
        let step = |p| advance(p, Forward, SplitLeftToRight, true);
        assert_eq!(step(Whole), Left);
        assert_eq!(step(Left), Right);
        // Leaving the page: the next image decides whether to re-enter
        // split; a wide one lands on its first half.
        assert_eq!(step(Right), Left);
    }

    #[test]
    fn forward_cycle_right_to_left() {
        let step = |p| advance(p, Forward, SplitRightToLeft, true);
        assert_eq!(step(Whole), Right);
        assert_eq!(step(Right), Left);
        assert_eq!(step(Left), Right);
    }

    #[test]
    fn half_swap_is_an_involution() {
        for pref in [SplitLeftToRight, SplitRightToLeft] {
            for dir in [Forward, Backward] {
                for part in [Left, Right] {
                    let there = advance(part, dir, pref, true);
                    let back = advance(there, dir, pref, true);
                    assert_eq!(back, part);
                }
            }
        }
    }

    #[test]
    fn backward_entry_mirrors_forward_entry() {
        assert_eq!(forward_entry_part(SplitLeftToRight), Left);
        assert_eq!(backward_entry_part(SplitLeftToRight), Right);
        assert_eq!(forward_entry_part(SplitRightToLeft), Right);
        assert_eq!(backward_entry_part(SplitRightToLeft), Left);
    }

    #[test]
    fn crop_halves_cover_odd_widths() {
        let left = crop_for(Left, 1001, 600);
        let right = crop_for(Right, 1001, 600);
        assert_eq!(left.width + right.width, 1001);
        assert_eq!(right.x, 500);
        assert_eq!(crop_for(Whole, 1001, 600).width, 1001);
    }
}
