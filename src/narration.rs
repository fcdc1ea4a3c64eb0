//! Narration scripts for memory videos.

use crate::model::{PhotoCluster, UNKNOWN_LOCATION};

/// Deterministic, reassuring script for a cluster video.
///
/// `photo_count` is the number of photos actually shown, which may be fewer
/// than the cluster holds.
pub fn script_for(cluster: &PhotoCluster, photo_count: usize) -> String {
    let place = meaningful_place(cluster.location_name.as_deref());
    let when = cluster.time_description.trim();

    let mut sentences = Vec::with_capacity(5);

    match place {
        Some(place) => sentences.push(format!("Here are some memories from {}.", place)),
        None => sentences.push("Here are some special memories.".to_string()),
    }

    if !when.is_empty() {
        let preposition = if when.contains(" to ") { "from" } else { "on" };
        sentences.push(format!("These photos were taken {} {}.", preposition, when));
    }

    sentences.push(match photo_count {
        0 | 1 => "There is a lovely photo to look at together.".to_string(),
        n => format!("There are {} lovely photos to look at together.", n),
    });

    if let Some(place) = place {
        sentences.push(format!("{} was a wonderful place to be.", place));
    }

    sentences.push("Take your time and enjoy remembering these happy moments.".to_string());
    sentences.join(" ")
}

/// The place name if it would mean something to a listener.
fn meaningful_place(name: Option<&str>) -> Option<&str> {
    let name = name?.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(UNKNOWN_LOCATION) || looks_like_coordinates(name) {
        return None;
    }
    Some(name)
}

/// True for geocoder fallbacks such as `"-37.8136, 144.9631"`.
pub fn looks_like_coordinates(name: &str) -> bool {
    let mut parts = name.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => a.trim().parse::<f64>().is_ok() && b.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}
