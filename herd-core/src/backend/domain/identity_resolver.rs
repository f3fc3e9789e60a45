//! Identity resolution for lineage references.
//!
//! Parent references on an animal record are loose: a record id, an ear tag
//! ("brinco") or a free-text name, any of which may point at an animal that
//! was never registered. Resolution order is fixed:
//!
//! 1. exact id match
//! 2. case-insensitive, trimmed ear-tag match
//! 3. case-insensitive, trimmed name match
//!
//! A miss is a normal outcome. A supplied name that matches nothing becomes an
//! [`AncestorRef::External`]; with no usable name the result is
//! [`AncestorRef::Absent`].

use log::debug;
use shared::Animal;

use crate::backend::domain::models::herd::HerdSnapshot;
use crate::backend::domain::models::lineage::AncestorRef;
use crate::backend::domain::models::metrics::AnimalIndices;

/// Normalized comparison key for names and ear tags
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// True if `key` (already normalized) is this animal's ear tag or name
pub fn matches_identity_key(animal: &Animal, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    if normalize_key(&animal.ear_tag) == key {
        return true;
    }
    animal
        .name
        .as_deref()
        .map(|name| normalize_key(name) == key)
        .unwrap_or(false)
}

/// Normalized keys under which an animal can be referenced by name
pub fn identity_keys(animal: &Animal) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    let tag = normalize_key(&animal.ear_tag);
    if !tag.is_empty() {
        keys.push(tag);
    }
    if let Some(name) = animal.name.as_deref() {
        let name = normalize_key(name);
        if !name.is_empty() && !keys.contains(&name) {
            keys.push(name);
        }
    }
    keys
}

/// Resolve a reference by scanning the herd
pub fn resolve<'a>(herd: &'a [Animal], name_or_tag: Option<&str>, id: Option<&str>) -> AncestorRef<'a> {
    let id = id.map(str::trim).filter(|v| !v.is_empty());
    let name = name_or_tag.map(str::trim).filter(|v| !v.is_empty());

    if let Some(id) = id {
        if let Some(animal) = herd.iter().find(|a| a.id == id) {
            return AncestorRef::Resolved(animal);
        }
    }

    match name {
        Some(name) => {
            let key = normalize_key(name);
            let by_tag = herd.iter().find(|a| normalize_key(&a.ear_tag) == key);
            let found = by_tag.or_else(|| {
                herd.iter().find(|a| {
                    a.name
                        .as_deref()
                        .map(|n| normalize_key(n) == key)
                        .unwrap_or(false)
                })
            });
            match found {
                Some(animal) => AncestorRef::Resolved(animal),
                None => AncestorRef::External(name.to_string()),
            }
        }
        None => {
            if let Some(id) = id {
                debug!("Lineage id {} matches no herd animal and no name was given", id);
            }
            AncestorRef::Absent
        }
    }
}

/// Resolve a reference through prebuilt indices.
///
/// Same semantics as [`resolve`]; the indices must come from `snapshot`.
pub fn resolve_indexed<'a>(
    snapshot: &'a HerdSnapshot,
    indices: &AnimalIndices,
    name_or_tag: Option<&str>,
    id: Option<&str>,
) -> AncestorRef<'a> {
    debug_assert_eq!(indices.snapshot_version, snapshot.version());
    let animals = snapshot.animals();
    let id = id.map(str::trim).filter(|v| !v.is_empty());
    let name = name_or_tag.map(str::trim).filter(|v| !v.is_empty());

    if let Some(&pos) = id.and_then(|id| indices.by_id.get(id)) {
        return AncestorRef::Resolved(&animals[pos]);
    }

    match name {
        Some(name) => {
            let key = normalize_key(name);
            let found = indices
                .by_ear_tag_key
                .get(&key)
                .or_else(|| indices.by_name_key.get(&key))
                .and_then(|positions| positions.first());
            match found {
                Some(&pos) => AncestorRef::Resolved(&animals[pos]),
                None => AncestorRef::External(name.to_string()),
            }
        }
        None => AncestorRef::Absent,
    }
}

/// Resolve the lineage (genetic) mother of `animal`
pub fn resolve_mother<'a>(herd: &'a [Animal], animal: &Animal) -> AncestorRef<'a> {
    resolve(herd, animal.lineage_mother_name(), animal.lineage_mother_id())
}

pub fn resolve_father<'a>(herd: &'a [Animal], animal: &Animal) -> AncestorRef<'a> {
    resolve(herd, animal.father_name_ref(), animal.father_id_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn herd() -> Vec<Animal> {
        vec![
            Animal {
                id: "1".to_string(),
                ear_tag: "ABC001".to_string(),
                name: Some("Mimosa".to_string()),
                ..Default::default()
            },
            Animal {
                id: "2".to_string(),
                ear_tag: "MIMOSA".to_string(),
                name: Some("Estrela".to_string()),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_resolves_by_id_tag_and_name() {
        let herd = vec![herd().remove(0)];

        let by_id = resolve(&herd, None, Some("1"));
        let by_tag = resolve(&herd, Some("abc001"), None);
        let by_name = resolve(&herd, Some("MIMOSA"), None);

        assert_eq!(by_id.animal().map(|a| a.id.as_str()), Some("1"));
        assert_eq!(by_tag, by_id);
        assert_eq!(by_name, by_id);
    }

    #[test]
    fn test_unmatched_name_is_external() {
        let herd = herd();
        let result = resolve(&herd, Some("  XYZ999 "), None);
        assert_eq!(result, AncestorRef::External("XYZ999".to_string()));
        assert!(result.is_reference());
    }

    #[test]
    fn test_nothing_supplied_is_absent() {
        let herd = herd();
        assert!(resolve(&herd, None, None).is_absent());
        assert!(resolve(&herd, Some("   "), Some("")).is_absent());
    }

    #[test]
    fn test_unmatched_id_without_name_is_absent() {
        let herd = herd();
        assert!(resolve(&herd, None, Some("missing")).is_absent());
    }

    #[test]
    fn test_unmatched_id_falls_back_to_name() {
        let herd = herd();
        let result = resolve(&herd, Some("Estrela"), Some("missing"));
        assert_eq!(result.animal().map(|a| a.id.as_str()), Some("2"));
    }

    #[test]
    fn test_ear_tag_wins_over_name() {
        // "Mimosa" is animal 1's name and animal 2's ear tag
        let herd = herd();
        let result = resolve(&herd, Some("mimosa"), None);
        assert_eq!(result.animal().map(|a| a.id.as_str()), Some("2"));
    }

    #[test]
    fn test_identity_keys_dedup() {
        let animal = Animal {
            ear_tag: "Bento".to_string(),
            name: Some("bento ".to_string()),
            ..Default::default()
        };
        assert_eq!(identity_keys(&animal), vec!["bento".to_string()]);
        assert!(matches_identity_key(&animal, "bento"));
        assert!(!matches_identity_key(&animal, ""));
    }
}
