//! Nearest-neighbor identity matching over the enrolled gallery.
//!
//! A probe descriptor is compared against every reference descriptor of
//! every enrolled student; the global minimum Euclidean distance wins if it
//! falls within the configured threshold.

use crate::descriptor::Descriptor;

/// One enrolled student with all of their reference descriptors (students
/// typically enroll several captures taken at different angles).
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub roll_no: String,
    pub full_name: String,
    pub descriptors: Vec<Descriptor>,
}

/// A positive identification: the owning student, the winning distance, and
/// the similarity score reported to the teacher (`1 - distance`).
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub roll_no: String,
    pub full_name: String,
    pub distance: f32,
    pub confidence: f32,
}

/// Finds the enrolled student closest to `probe`, or `None` when the gallery
/// is empty or the nearest distance exceeds `threshold`.
///
/// Deterministic: entries are scanned in roll-number order and a candidate
/// only replaces the current best on a strictly smaller distance, so an
/// exact tie resolves to the lowest roll number.
pub fn find_best_match(
    probe: &Descriptor,
    gallery: &[GalleryEntry],
    threshold: f32,
) -> Option<Match> {
    if gallery.is_empty() {
        return None;
    }

    let mut ordered: Vec<&GalleryEntry> = gallery.iter().collect();
    ordered.sort_by(|a, b| a.roll_no.cmp(&b.roll_no));

    let mut best: Option<(&GalleryEntry, f32)> = None;
    for entry in ordered {
        for reference in &entry.descriptors {
            let distance = probe.euclidean_distance(reference);
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((entry, distance));
            }
        }
    }

    match best {
        Some((entry, distance)) if distance <= threshold => Some(Match {
            roll_no: entry.roll_no.clone(),
            full_name: entry.full_name.clone(),
            distance,
            confidence: 1.0 - distance,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(roll: &str, vectors: &[&[f32]]) -> GalleryEntry {
        GalleryEntry {
            roll_no: roll.to_string(),
            full_name: format!("Student {roll}"),
            descriptors: vectors
                .iter()
                .map(|v| Descriptor { values: v.to_vec() })
                .collect(),
        }
    }

    #[test]
    fn empty_gallery_never_matches() {
        let probe = Descriptor { values: vec![1.0, 0.0] };
        assert_eq!(find_best_match(&probe, &[], 0.5), None);
    }

    #[test]
    fn uses_global_minimum_across_all_descriptors() {
        // CS102's second capture is the closest vector overall, even though
        // its first capture is worse than CS101's.
        let gallery = vec![
            entry("CS101", &[&[0.3, 0.0]]),
            entry("CS102", &[&[0.9, 0.9], &[0.1, 0.0]]),
        ];
        let probe = Descriptor { values: vec![0.0, 0.0] };

        let m = find_best_match(&probe, &gallery, 0.5).unwrap();
        assert_eq!(m.roll_no, "CS102");
        assert!((m.distance - 0.1).abs() < 1e-6);
        assert!((m.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn distance_beyond_threshold_is_no_match() {
        let gallery = vec![entry("CS101", &[&[2.0, 0.0]])];
        let probe = Descriptor { values: vec![0.0, 0.0] };
        assert_eq!(find_best_match(&probe, &gallery, 0.5), None);
    }

    #[test]
    fn exact_tie_resolves_to_lowest_roll_number() {
        // Same vector enrolled for both students; listed out of order.
        let gallery = vec![
            entry("CS200", &[&[0.2, 0.0]]),
            entry("CS100", &[&[0.2, 0.0]]),
        ];
        let probe = Descriptor { values: vec![0.0, 0.0] };

        let m = find_best_match(&probe, &gallery, 0.5).unwrap();
        assert_eq!(m.roll_no, "CS100");
    }

    #[test]
    fn repeated_invocations_agree() {
        let gallery = vec![
            entry("CS101", &[&[0.1, 0.2], &[0.4, 0.1]]),
            entry("CS102", &[&[0.3, 0.3]]),
        ];
        let probe = Descriptor { values: vec![0.2, 0.2] };

        let first = find_best_match(&probe, &gallery, 0.6);
        for _ in 0..10 {
            assert_eq!(find_best_match(&probe, &gallery, 0.6), first);
        }
    }
}
