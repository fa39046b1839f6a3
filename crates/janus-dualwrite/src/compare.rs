//! Structural comparison of store results
//!
//! Two stores may accept the same write yet disagree: each assigns its
//! own uid and resource version, and content can drift over time. The
//! dual writer counts an object pair as equal only when content and the
//! store-assigned identity both agree, so a pure uid or resource-version
//! mismatch is still a recorded divergence. The syncer instead chases
//! content drift only: bookkeeping is owned by each store and an upsert
//! can never make it converge. Comparison results drive divergence
//! accounting only; they never influence which object is returned to
//! the caller.

use janus_common::{ResourceList, ResourceObject};

fn normalized(obj: &ResourceObject) -> ResourceObject {
    let mut o = obj.clone();
    o.meta.resource_version.clear();
    o.meta.uid.clear();
    o.meta.creation_timestamp = None;
    o.meta.update_timestamp = None;
    o
}

/// Whether two objects carry the same content, ignoring store
/// bookkeeping (resource version, uid, managed timestamps).
///
/// This is the syncer's convergence test: an upsert cannot change the
/// bookkeeping the receiving store owns, so chasing it would never
/// terminate. Order-sensitive for JSON arrays; key-insensitive for maps.
#[must_use]
pub fn contents_match(a: &ResourceObject, b: &ResourceObject) -> bool {
    normalized(a) == normalized(b)
}

/// Strict equality for divergence accounting: content plus the
/// store-assigned uid and resource version. Two stores that accepted
/// identical content still diverge until the migration hands one of
/// them the other's identity. Managed timestamps stay normalized.
#[must_use]
pub fn objects_match(a: &ResourceObject, b: &ResourceObject) -> bool {
    a.meta.uid == b.meta.uid
        && a.meta.resource_version == b.meta.resource_version
        && contents_match(a, b)
}

/// Whether two optional deletion snapshots agree, strictly
#[must_use]
pub fn optional_objects_match(a: Option<&ResourceObject>, b: Option<&ResourceObject>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => objects_match(a, b),
        _ => false,
    }
}

/// Whole-list summary comparison: same length and strict item-wise match
/// in order. List metadata is store-local and ignored.
#[must_use]
pub fn lists_match(a: &ResourceList, b: &ResourceList) -> bool {
    a.items.len() == b.items.len()
        && a.items
            .iter()
            .zip(b.items.iter())
            .all(|(x, y)| objects_match(x, y))
}
