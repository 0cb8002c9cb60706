//! Connected-component extraction and centre-proximity selection.
//!
//! Segmentation noise often leaves several disjoint blobs in the mask.
//! [`extract_contours`] labels every 4-connected foreground component and
//! [`select_closest`] keeps the one whose centroid is nearest the image
//! centre, on the assumption that the user framed the fish.

use std::collections::VecDeque;

use image::GrayImage;

use crate::grayscale::FOREGROUND;
use crate::types::{Contour, Dimensions};

/// 4-connectivity neighbour offsets: up, down, left, right.
const NEIGHBOURS: [(i64, i64); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Extract every 4-connected foreground component of a binary mask.
///
/// Pixels are scanned in row-major order; each unvisited foreground pixel
/// seeds a breadth-first flood fill. Components are returned in the
/// order their seed pixel was found, so the output is stable for a given
/// mask. Every foreground pixel belongs to exactly one component.
///
/// Visited state is a flat boolean array, so the whole pass is
/// `O(width * height)`. An all-background mask yields an empty list.
#[must_use = "returns the extracted components"]
pub fn extract_contours(binary: &GrayImage) -> Vec<Contour> {
    let (width, height) = binary.dimensions();
    let w = width as usize;
    let raw = binary.as_raw();
    let mut visited = vec![false; raw.len()];
    let mut queue = VecDeque::new();
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * w + x as usize;
            if visited[idx] || raw[idx] != FOREGROUND {
                continue;
            }

            visited[idx] = true;
            queue.push_back((x, y));
            let mut pixels = Vec::new();

            while let Some((cx, cy)) = queue.pop_front() {
                pixels.push((cx, cy));
                for (dx, dy) in NEIGHBOURS {
                    let Some((nx, ny)) = offset(cx, cy, dx, dy, width, height) else {
                        continue;
                    };
                    let n_idx = ny as usize * w + nx as usize;
                    if !visited[n_idx] && raw[n_idx] == FOREGROUND {
                        visited[n_idx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }

            contours.push(Contour::new(pixels));
        }
    }

    tracing::debug!(count = contours.len(), "extracted components");
    contours
}

/// Apply a neighbour offset, returning `None` when it leaves the grid.
fn offset(x: u32, y: u32, dx: i64, dy: i64, width: u32, height: u32) -> Option<(u32, u32)> {
    let nx = u32::try_from(i64::from(x) + dx).ok()?;
    let ny = u32::try_from(i64::from(y) + dy).ok()?;
    (nx < width && ny < height).then_some((nx, ny))
}

/// Pick the component whose point-average centroid is closest to the
/// image centre `(width / 2, height / 2)`.
///
/// Ties keep the earliest component in scan order. Empty components are
/// skipped. Returns `None` if there is nothing to choose from.
#[must_use]
pub fn select_closest(contours: Vec<Contour>, dimensions: Dimensions) -> Option<Contour> {
    let center = dimensions.center();
    let mut best: Option<(f64, Contour)> = None;

    for contour in contours {
        let Some(centroid) = contour.centroid() else {
            continue;
        };
        let d = centroid.distance_squared(center);
        // Strict comparison keeps the first of equally distant components.
        if best.as_ref().is_none_or(|(best_d, _)| d < *best_d) {
            best = Some((d, contour));
        }
    }

    if let Some((d, ref contour)) = best {
        tracing::debug!(
            pixels = contour.len(),
            distance = d.sqrt(),
            "selected component nearest centre"
        );
    }
    best.map(|(_, contour)| contour)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use image::Luma;
    use imageproc::region_labelling::{Connectivity, connected_components};

    use super::*;

    fn mask_from_rows(rows: &[&str]) -> GrayImage {
        let height = u32::try_from(rows.len()).unwrap();
        let width = u32::try_from(rows[0].len()).unwrap();
        GrayImage::from_fn(width, height, |x, y| {
            if rows[y as usize].as_bytes()[x as usize] == b'#' {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        })
    }

    fn dims(mask: &GrayImage) -> Dimensions {
        Dimensions::of(mask)
    }

    #[test]
    fn all_background_yields_no_contours() {
        let mask = GrayImage::new(16, 16);
        assert!(extract_contours(&mask).is_empty());
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let mask = mask_from_rows(&["#.", ".#"]);
        let contours = extract_contours(&mask);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].pixels(), &[(0, 0)]);
        assert_eq!(contours[1].pixels(), &[(1, 1)]);
    }

    #[test]
    fn components_ordered_by_first_scan_pixel() {
        let mask = mask_from_rows(&[
            "....##", //
            "#...##", //
            "#.....", //
            "##..#.",
        ]);
        let contours = extract_contours(&mask);
        assert_eq!(contours.len(), 3);
        assert_eq!(contours[0].pixels()[0], (4, 0));
        assert_eq!(contours[0].len(), 4);
        assert_eq!(contours[1].pixels()[0], (0, 1));
        assert_eq!(contours[1].len(), 4);
        assert_eq!(contours[2].pixels(), &[(4, 3)]);
    }

    #[test]
    fn u_shape_is_one_component() {
        let mask = mask_from_rows(&[
            "#...#", //
            "#...#", //
            "#####",
        ]);
        let contours = extract_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 9);
    }

    #[test]
    fn extraction_is_idempotent() {
        let mask = mask_from_rows(&[
            "##..#", //
            "#..##", //
            "..#..", //
            "##..#",
        ]);
        assert_eq!(extract_contours(&mask), extract_contours(&mask));
    }

    #[test]
    fn contours_partition_the_foreground() {
        let mask = GrayImage::from_fn(40, 30, |x, y| {
            if (x * 7 + y * 13) % 5 < 2 {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        });
        let contours = extract_contours(&mask);

        let mut seen = HashSet::new();
        for contour in &contours {
            for &p in contour.pixels() {
                assert!(seen.insert(p), "pixel {p:?} appears in two contours");
            }
        }
        let foreground: HashSet<(u32, u32)> = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == FOREGROUND)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(seen, foreground);
    }

    #[test]
    fn component_count_matches_imageproc_labelling() {
        let mask = GrayImage::from_fn(50, 50, |x, y| {
            let dx = f64::from(x % 17) - 8.0;
            let dy = f64::from(y % 13) - 6.0;
            if dx.hypot(dy) < 5.0 {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        });
        let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));
        let distinct: HashSet<u32> = labels.pixels().map(|p| p.0[0]).filter(|&l| l != 0).collect();
        assert_eq!(extract_contours(&mask).len(), distinct.len());
    }

    #[test]
    fn non_foreground_gray_values_are_ignored() {
        let mut mask = GrayImage::new(3, 1);
        mask.put_pixel(0, 0, Luma([FOREGROUND]));
        mask.put_pixel(1, 0, Luma([128]));
        mask.put_pixel(2, 0, Luma([FOREGROUND]));
        assert_eq!(extract_contours(&mask).len(), 2);
    }

    #[test]
    fn select_closest_picks_central_blob() {
        let mask = mask_from_rows(&[
            "##.......", //
            "##.......", //
            "....#....", //
            "...###...", //
            "....#....", //
            ".........", //
            ".......##",
        ]);
        let contours = extract_contours(&mask);
        assert_eq!(contours.len(), 3);
        let selected = select_closest(contours, dims(&mask)).unwrap();
        assert_eq!(selected.len(), 5);
        assert!(selected.pixels().contains(&(4, 3)));
    }

    #[test]
    fn select_closest_tie_keeps_first_in_scan_order() {
        // Two single pixels mirrored about the centre (3, 1).
        let mask = mask_from_rows(&["......", ".#...#"]);
        let contours = extract_contours(&mask);
        let first = contours[0].clone();
        let selected = select_closest(contours, dims(&mask)).unwrap();
        assert_eq!(selected, first);
    }

    #[test]
    fn select_closest_on_empty_list_is_none() {
        let d = Dimensions {
            width: 10,
            height: 10,
        };
        assert!(select_closest(Vec::new(), d).is_none());
        assert!(select_closest(vec![Contour::new(vec![])], d).is_none());
    }
}
