use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::PhotoRecord;

/// Up to `max` photos chosen uniformly without replacement.
pub fn select_photos<R: Rng + ?Sized>(photos: &[PhotoRecord], max: usize, rng: &mut R) -> Vec<PhotoRecord> {
    let mut chosen = photos.to_vec();
    chosen.shuffle(rng);
    chosen.truncate(max);
    chosen
}

/// Display time per photo: the narration spread over the photos, within
/// bounds, or the default for silent videos.
pub fn seconds_per_image(
    narration_secs: Option<f64>,
    photo_count: usize,
    min_secs: u32,
    max_secs: u32,
    default_secs: u32,
) -> u32 {
    match narration_secs {
        Some(secs) if secs > 0.0 && photo_count > 0 => {
            let per = (secs / photo_count as f64).ceil() as u32;
            per.clamp(min_secs, max_secs.max(min_secs))
        }
        _ => default_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn photos(n: usize) -> Vec<PhotoRecord> {
        (0..n).map(|i| PhotoRecord::new(format!("p{}", i), i as i64, None)).collect()
    }

    #[test]
    fn test_select_caps_and_has_no_repeats() {
        let mut rng = StdRng::seed_from_u64(3);
        let chosen = select_photos(&photos(10), 4, &mut rng);
        assert_eq!(chosen.len(), 4);
        let uris: HashSet<_> = chosen.iter().map(|p| p.uri.clone()).collect();
        assert_eq!(uris.len(), 4);
    }

    #[test]
    fn test_select_takes_all_when_fewer() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(select_photos(&photos(2), 4, &mut rng).len(), 2);
        assert!(select_photos(&[], 4, &mut rng).is_empty());
    }

    #[test]
    fn test_select_reaches_every_photo() {
        let mut rng = StdRng::seed_from_u64(11);
        let all = photos(6);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            for p in select_photos(&all, 4, &mut rng) {
                seen.insert(p.uri);
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_seconds_per_image() {
        assert_eq!(seconds_per_image(Some(14.2), 4, 3, 10, 4), 4);
        assert_eq!(seconds_per_image(Some(5.0), 4, 3, 10, 4), 3);
        assert_eq!(seconds_per_image(Some(60.0), 4, 3, 10, 4), 10);
        assert_eq!(seconds_per_image(Some(12.0), 3, 3, 10, 4), 4);
        assert_eq!(seconds_per_image(None, 4, 3, 10, 4), 4);
        assert_eq!(seconds_per_image(Some(0.0), 4, 3, 10, 4), 4);
    }
}
