//! Procedural dot arrays: two clusters on either side of the partition,
//! placed by bounded rejection sampling so that no two dots overlap.

use crate::config::DotGeometry;
use crate::error::{ConfigError, LayoutError};
use numag_core::{Dot, DotCounts, MaskPattern, Rgb, Side};
use rand::Rng;

/// Two dots overlap when their centres are closer than the summed radii
/// widened by `extra_distance_pct` percent.
pub fn overlaps(a: &Dot, b: &Dot, extra_distance_pct: f32) -> bool {
    a.distance_to(b) < (1.0 + extra_distance_pct / 100.0) * (a.radius + b.radius)
}

/// Draws the right count from `min..=max`, then the left count from what is
/// left, so the two sides never tie. A range with fewer than two counts is
/// a configuration error.
pub fn pick_counts<R: Rng + ?Sized>(
    min: u32,
    max: u32,
    rng: &mut R,
) -> Result<DotCounts, ConfigError> {
    if max <= min {
        return Err(ConfigError::Invalid(format!(
            "cannot pick two different dot counts from {min}..={max}"
        )));
    }
    let mut pool: Vec<u32> = (min..=max).collect();
    let right = pool.remove(rng.random_range(0..pool.len()));
    let left = pool[rng.random_range(0..pool.len())];
    Ok(DotCounts { left, right })
}

pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb {
    Rgb::new(rng.random(), rng.random(), rng.random())
}

pub fn random_mask<R: Rng + ?Sized>(size: u32, rng: &mut R) -> MaskPattern {
    let levels = (0..size * size).map(|_| rng.random()).collect();
    MaskPattern { size, levels }
}

fn sample_dot<R: Rng + ?Sized>(side: Side, color: Rgb, geometry: &DotGeometry, rng: &mut R) -> Dot {
    let radius = rng.random_range(geometry.min_radius..=geometry.max_radius);
    let x = side.sign() * rng.random_range(geometry.x_range());
    let y = rng.random_range(geometry.y_range());
    Dot {
        x,
        y,
        radius,
        color,
        side,
    }
}

/// Lays out `counts.right` dots on the right, then `counts.left` on the left.
///
/// Each rejected candidate is replaced by a fresh draw on the same side. A dot
/// that cannot be placed within `max_attempts_per_dot` draws fails the layout.
pub fn generate_dots<R: Rng + ?Sized>(
    counts: DotCounts,
    colors: (Rgb, Rgb),
    geometry: &DotGeometry,
    rng: &mut R,
) -> Result<Vec<Dot>, LayoutError> {
    let (left_color, right_color) = colors;
    let total = counts.total() as usize;
    let mut dots: Vec<Dot> = Vec::with_capacity(total);

    for i in 0..total {
        let (side, color) = if i < counts.right as usize {
            (Side::Right, right_color)
        } else {
            (Side::Left, left_color)
        };

        let mut attempts = 0;
        loop {
            let candidate = sample_dot(side, color, geometry, rng);
            if !dots
                .iter()
                .any(|d| overlaps(d, &candidate, geometry.extra_distance_pct))
            {
                dots.push(candidate);
                break;
            }
            attempts += 1;
            if attempts >= geometry.max_attempts_per_dot {
                return Err(LayoutError::Exhausted {
                    side,
                    placed: dots.len(),
                    attempts,
                });
            }
        }
    }

    Ok(dots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    fn dot(x: f32, y: f32, radius: f32) -> Dot {
        Dot {
            x,
            y,
            radius,
            color: RED,
            side: Side::Right,
        }
    }

    #[test]
    fn overlap_uses_widened_radii() {
        let a = dot(0.0, 0.0, 10.0);
        // Summed radii 20, widened by 20% to 24
        assert!(overlaps(&a, &dot(23.9, 0.0, 10.0), 20.0));
        assert!(!overlaps(&a, &dot(24.1, 0.0, 10.0), 20.0));
        assert!(!overlaps(&a, &dot(20.0, 0.0, 10.0), 0.0));
        assert!(overlaps(&a, &dot(0.0, 19.0, 10.0), 0.0));
    }

    #[test]
    fn picked_counts_differ_and_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let c = pick_counts(1, 10, &mut rng).unwrap();
            assert_ne!(c.left, c.right);
            assert!((1..=10).contains(&c.left));
            assert!((1..=10).contains(&c.right));
        }
        let c = pick_counts(3, 4, &mut rng).unwrap();
        assert_eq!(c.left + c.right, 7);
    }

    #[test]
    fn counts_need_two_distinct_values() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_matches!(pick_counts(4, 4, &mut rng), Err(ConfigError::Invalid(_)));
        assert_matches!(pick_counts(5, 2, &mut rng), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn layouts_respect_sides_and_never_overlap() {
        let geometry = DotGeometry::default();
        let x = geometry.x_range();
        let y = geometry.y_range();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let counts = pick_counts(1, 10, &mut rng).unwrap();
            let dots = generate_dots(counts, (RED, BLUE), &geometry, &mut rng).unwrap();
            assert_eq!(dots.len(), counts.total() as usize);

            for (i, d) in dots.iter().enumerate() {
                assert!(d.radius >= geometry.min_radius && d.radius <= geometry.max_radius);
                assert!(d.y >= y.start && d.y <= y.end);
                if i < counts.right as usize {
                    assert_eq!(d.side, Side::Right);
                    assert_eq!(d.color, BLUE);
                    assert!(d.x >= x.start && d.x <= x.end, "right dot at {}", d.x);
                } else {
                    assert_eq!(d.side, Side::Left);
                    assert_eq!(d.color, RED);
                    assert!(-d.x >= x.start && -d.x <= x.end, "left dot at {}", d.x);
                }
            }

            for (i, a) in dots.iter().enumerate() {
                for b in &dots[i + 1..] {
                    assert!(!overlaps(a, b, geometry.extra_distance_pct));
                }
            }
        }
    }

    #[test]
    fn impossible_density_fails_instead_of_spinning() {
        let geometry = DotGeometry {
            screen_width: 200.0,
            screen_height: 100.0,
            min_radius: 40.0,
            max_radius: 40.0,
            max_attempts_per_dot: 200,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let counts = DotCounts { left: 1, right: 6 };
        let err = generate_dots(counts, (RED, BLUE), &geometry, &mut rng).unwrap_err();
        assert_matches!(
            err,
            LayoutError::Exhausted { side: Side::Right, attempts: 200, placed } if placed >= 1
        );
    }

    #[test]
    fn fixed_seed_reproduces_layout() {
        let geometry = DotGeometry::default();
        let counts = DotCounts { left: 3, right: 5 };
        let a = generate_dots(counts, (RED, BLUE), &geometry, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = generate_dots(counts, (RED, BLUE), &geometry, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mask_covers_the_whole_grid() {
        let mut rng = StdRng::seed_from_u64(3);
        let mask = random_mask(16, &mut rng);
        assert_eq!(mask.levels.len(), 256);
        let distinct: std::collections::HashSet<_> = mask.levels.iter().collect();
        assert!(distinct.len() > 1);
    }
}
