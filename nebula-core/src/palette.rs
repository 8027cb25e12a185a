//! Subsystem color allocation
//!
//! Subsystems under one system get distinct colors from a fixed palette for
//! as long as the palette lasts. Allocation is by palette index, so the same
//! set of used colors always yields the same answer.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Fixed, ordered set of visually distinguishable colors
pub const PALETTE: [&str; 12] = [
    "#3B82F6", // blue
    "#10B981", // emerald
    "#F59E0B", // amber
    "#EF4444", // red
    "#8B5CF6", // violet
    "#EC4899", // pink
    "#14B8A6", // teal
    "#F97316", // orange
    "#6366F1", // indigo
    "#84CC16", // lime
    "#06B6D4", // cyan
    "#A855F7", // purple
];

/// Returns the first palette color not present in `used`.
/// Falls back to a random palette entry once all colors are taken.
pub fn allocate_color<'a, I>(used: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    allocate_color_with_rng(used, &mut rand::thread_rng())
}

/// Same as [`allocate_color`] with a caller-supplied random source
pub fn allocate_color_with_rng<'a, I, R>(used: I, rng: &mut R) -> String
where
    I: IntoIterator<Item = &'a str>,
    R: Rng + ?Sized,
{
    let used: HashSet<String> = used.into_iter().map(|c| c.to_ascii_uppercase()).collect();

    if let Some(free) = PALETTE.iter().find(|c| !used.contains(**c)) {
        return free.to_string();
    }

    PALETTE
        .choose(rng)
        .copied()
        .unwrap_or(PALETTE[0])
        .to_string()
}
