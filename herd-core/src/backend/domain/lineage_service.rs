//! Genealogy domain logic for the herd.
//!
//! Builds ancestor trees (bounded to a fixed number of generations) and
//! descendant generations from flat animal records whose parent references
//! may be ids, ear tags or free-text names.
//!
//! ## Rules
//!
//! - FIV animals ascend through the biological mother. The receptor mother is
//!   reported on the tree root for display and never ascends.
//! - External (unregistered) ancestors are leaves.
//! - Ancestor depth is an explicit bound, which also neutralizes records that
//!   list an animal as its own ancestor.
//! - Each descendant generation is deduplicated by id and never contains the
//!   subject animal. Progeny and siblings are read from the derived metrics
//!   of the same snapshot.
//!
//! Lineage views are memoized per `(snapshot version, animal id)`.

use chrono::Datelike;
use log::{debug, info};
use shared::{
    Animal, AnimalStatus, AncestorNode, AncestorTree, DescendantGenerations, DescendantGroup,
    DescendantSummary, GenerationStats, Sex,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::backend::domain::derived_metrics_service::DerivedMetricsService;
use crate::backend::domain::identity_resolver::{self, identity_keys, normalize_key};
use crate::backend::domain::models::herd::parse_record_date;
use crate::backend::domain::models::lineage::{AncestorRef, DescendantGrouping, GenerationReport, LineageView};
use crate::config::LineageConfig;

/// Generations walked in either direction, whatever the config asks for
pub const MAX_GENERATIONS: u8 = 3;

/// Animals in `herd` whose recorded father or mother is `parent`.
///
/// Matches on parent id, or on the parent's ear tag / name against the
/// child's recorded parent names. An FIV child matches by id on both its
/// recorded mother and its biological mother; by name only the biological
/// mother counts. `parent` itself is never included.
pub fn find_offspring_of<'a>(parent: &Animal, herd: &'a [Animal]) -> Vec<&'a Animal> {
    let keys = identity_keys(parent);
    herd.iter()
        .filter(|candidate| candidate.id != parent.id && is_offspring_of(candidate, parent, &keys))
        .collect()
}

fn is_offspring_of(candidate: &Animal, parent: &Animal, parent_keys: &[String]) -> bool {
    let parent_id = parent.id.as_str();
    if candidate.mother_id_ref() == Some(parent_id)
        || candidate.lineage_mother_id() == Some(parent_id)
        || candidate.father_id_ref() == Some(parent_id)
    {
        return true;
    }
    let name_matches = |name: Option<&str>| {
        name.map(|n| parent_keys.contains(&normalize_key(n)))
            .unwrap_or(false)
    };
    name_matches(candidate.lineage_mother_name()) || name_matches(candidate.father_name_ref())
}

/// Descendants of `root`, one deduplicated list per generation, up to `depth` generations.
///
/// Progeny come from the precomputed derived data of `metrics`, so each step
/// is a lookup instead of a herd scan. Lists are in herd order and never
/// contain `root`.
pub fn descendant_levels<'a>(metrics: &'a DerivedMetricsService, root: &Animal, depth: u8) -> Vec<Vec<&'a Animal>> {
    let animals = metrics.snapshot().animals();
    let indices = metrics.get_indices();
    let progeny_of = |animal_id: &str| -> Vec<usize> {
        metrics
            .get_derived_data(animal_id)
            .map(|d| d.progeny_ids.iter().filter_map(|id| indices.by_id.get(id).copied()).collect())
            .unwrap_or_default()
    };

    let mut levels = Vec::with_capacity(depth as usize);
    let mut current: BTreeSet<usize> = BTreeSet::new();
    for generation in 0..depth {
        let next: BTreeSet<usize> = if generation == 0 {
            progeny_of(&root.id).into_iter().collect()
        } else {
            current.iter().flat_map(|&pos| progeny_of(&animals[pos].id)).collect()
        };
        current = next.into_iter().filter(|&pos| animals[pos].id != root.id).collect();
        levels.push(current.iter().map(|&pos| &animals[pos]).collect());
    }
    levels
}

struct LineageMemo {
    snapshot_version: u64,
    views: HashMap<String, Arc<LineageView>>,
}

/// Service that builds and memoizes lineage views
#[derive(Clone)]
pub struct LineageService {
    config: LineageConfig,
    memo: Arc<Mutex<LineageMemo>>,
}

impl LineageService {
    pub fn new(config: LineageConfig) -> Self {
        Self {
            config,
            memo: Arc::new(Mutex::new(LineageMemo {
                snapshot_version: 0,
                views: HashMap::new(),
            })),
        }
    }

    /// Ancestors, siblings and descendants of `animal_id` in the snapshot behind `metrics`.
    ///
    /// Returns `None` if the animal is not in the snapshot. Views for older
    /// snapshots are dropped as soon as a newer snapshot is requested.
    pub fn lineage_for(&self, metrics: &DerivedMetricsService, animal_id: &str) -> Option<Arc<LineageView>> {
        let snapshot = metrics.snapshot();
        {
            let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
            if memo.snapshot_version == snapshot.version() {
                if let Some(view) = memo.views.get(animal_id) {
                    debug!("Lineage cache hit for {} (snapshot {})", animal_id, snapshot.version());
                    return Some(view.clone());
                }
            } else if snapshot.version() > memo.snapshot_version {
                if !memo.views.is_empty() {
                    info!(
                        "Herd snapshot changed ({} -> {}), dropping {} cached lineage views",
                        memo.snapshot_version,
                        snapshot.version(),
                        memo.views.len()
                    );
                }
                memo.snapshot_version = snapshot.version();
                memo.views.clear();
            }
        }

        let animals = snapshot.animals();
        let indices = metrics.get_indices();
        let animal = &animals[*indices.by_id.get(animal_id)?];
        let siblings = metrics
            .get_derived_data(animal_id)
            .map(|derived| {
                derived
                    .sibling_ids
                    .iter()
                    .filter_map(|id| indices.by_id.get(id))
                    .map(|&pos| summarize_descendant(&animals[pos], 0))
                    .collect()
            })
            .unwrap_or_default();

        let view = Arc::new(LineageView {
            snapshot_version: snapshot.version(),
            ancestry: self.build_ancestry(animal, animals),
            siblings,
            descendants: self.descendant_generations(metrics, animal),
        });

        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        if memo.snapshot_version == snapshot.version() {
            memo.views.insert(animal_id.to_string(), view.clone());
        }
        Some(view)
    }

    /// Number of memoized views for the current snapshot
    pub fn cached_views(&self) -> usize {
        self.memo.lock().unwrap_or_else(|e| e.into_inner()).views.len()
    }

    /// Ancestor tree of `animal`, bounded by the configured depth
    pub fn build_ancestry(&self, animal: &Animal, herd: &[Animal]) -> AncestorTree {
        let depth = self.config.ancestor_depth.min(MAX_GENERATIONS);
        let (father, mother) = if depth == 0 {
            (None, None)
        } else {
            (
                ancestor_node(herd, identity_resolver::resolve_father(herd, animal), Sex::Male, 1, depth),
                ancestor_node(herd, identity_resolver::resolve_mother(herd, animal), Sex::Female, 1, depth),
            )
        };

        let (receptor_name, receptor_id) = animal.receptor_refs();
        let receptor_mother = if depth == 0 {
            None
        } else {
            // Leaf on purpose: max depth equals the node's own generation
            ancestor_node(
                herd,
                identity_resolver::resolve(herd, receptor_name, receptor_id),
                Sex::Female,
                1,
                1,
            )
        };

        AncestorTree {
            animal_id: animal.id.clone(),
            father,
            mother,
            receptor_mother,
        }
    }

    /// Children, grandchildren and great-grandchildren of `animal`
    pub fn descendant_generations(&self, metrics: &DerivedMetricsService, animal: &Animal) -> DescendantGenerations {
        let depth = self.config.descendant_depth.min(MAX_GENERATIONS);
        let mut levels = descendant_levels(metrics, animal, depth).into_iter();

        let mut summarize = |generation: u8| -> Vec<DescendantSummary> {
            levels
                .next()
                .unwrap_or_default()
                .into_iter()
                .map(|a| summarize_descendant(a, generation))
                .collect()
        };

        let children = summarize(1);
        let grandchildren = summarize(2);
        let great_grandchildren = summarize(3);

        DescendantGenerations {
            animal_id: animal.id.clone(),
            children,
            grandchildren,
            great_grandchildren,
        }
    }

    /// Counts for one generation
    pub fn generation_stats(generation: &[DescendantSummary]) -> GenerationStats {
        generation.iter().fold(GenerationStats::default(), |mut stats, d| {
            stats.total += 1;
            match d.sex {
                Sex::Male => stats.males += 1,
                Sex::Female => stats.females += 1,
            }
            match d.status {
                AnimalStatus::Active => stats.active += 1,
                AnimalStatus::Sold => stats.sold += 1,
                AnimalStatus::Deceased => stats.deceased += 1,
            }
            if d.is_fiv {
                stats.fiv += 1;
            }
            stats
        })
    }

    /// Stats and display groups for each descendant generation, children first
    pub fn generation_reports(
        descendants: &DescendantGenerations,
        grouping: DescendantGrouping,
    ) -> Vec<GenerationReport> {
        [
            &descendants.children,
            &descendants.grandchildren,
            &descendants.great_grandchildren,
        ]
        .into_iter()
        .zip(1u8..)
        .map(|(animals, generation)| GenerationReport {
            generation,
            stats: Self::generation_stats(animals),
            groups: Self::group_descendants(animals, grouping),
        })
        .collect()
    }

    /// Bucket descendants for display.
    ///
    /// Status buckets follow Active, Sold, Deceased. Year buckets are newest
    /// first with undated animals last. Empty buckets are omitted, except for
    /// the single bucket of the ungrouped view.
    pub fn group_descendants(
        descendants: &[DescendantSummary],
        grouping: DescendantGrouping,
    ) -> Vec<DescendantGroup> {
        match grouping {
            DescendantGrouping::None => vec![DescendantGroup {
                label: "All".to_string(),
                animals: descendants.to_vec(),
            }],
            DescendantGrouping::Status => {
                let order = [
                    (AnimalStatus::Active, "Active"),
                    (AnimalStatus::Sold, "Sold"),
                    (AnimalStatus::Deceased, "Deceased"),
                ];
                order
                    .iter()
                    .map(|(status, label)| DescendantGroup {
                        label: label.to_string(),
                        animals: descendants.iter().filter(|d| d.status == *status).cloned().collect(),
                    })
                    .filter(|g| !g.animals.is_empty())
                    .collect()
            }
            DescendantGrouping::Sex => [(Sex::Male, "Male"), (Sex::Female, "Female")]
                .iter()
                .map(|(sex, label)| DescendantGroup {
                    label: label.to_string(),
                    animals: descendants.iter().filter(|d| d.sex == *sex).cloned().collect(),
                })
                .filter(|g| !g.animals.is_empty())
                .collect(),
            DescendantGrouping::BirthYear => {
                let mut by_year: BTreeMap<i32, Vec<DescendantSummary>> = BTreeMap::new();
                let mut undated = Vec::new();
                for d in descendants {
                    match d.birth_date.as_deref().and_then(parse_record_date) {
                        Some(date) => by_year.entry(date.year()).or_default().push(d.clone()),
                        None => undated.push(d.clone()),
                    }
                }
                let mut groups: Vec<DescendantGroup> = by_year
                    .into_iter()
                    .rev()
                    .map(|(year, animals)| DescendantGroup {
                        label: year.to_string(),
                        animals,
                    })
                    .collect();
                if !undated.is_empty() {
                    groups.push(DescendantGroup {
                        label: "Unknown".to_string(),
                        animals: undated,
                    });
                }
                groups
            }
        }
    }
}

fn ancestor_node(
    herd: &[Animal],
    reference: AncestorRef<'_>,
    role_sex: Sex,
    generation: u8,
    max_depth: u8,
) -> Option<AncestorNode> {
    match reference {
        AncestorRef::Absent => None,
        AncestorRef::External(name) => Some(AncestorNode {
            animal_id: None,
            ear_tag: None,
            display_name: name,
            sex: Some(role_sex),
            generation,
            is_fiv: false,
            is_reference: true,
            father: None,
            mother: None,
        }),
        AncestorRef::Resolved(animal) => {
            let (father, mother) = if generation < max_depth {
                (
                    ancestor_node(
                        herd,
                        identity_resolver::resolve_father(herd, animal),
                        Sex::Male,
                        generation + 1,
                        max_depth,
                    ),
                    ancestor_node(
                        herd,
                        identity_resolver::resolve_mother(herd, animal),
                        Sex::Female,
                        generation + 1,
                        max_depth,
                    ),
                )
            } else {
                (None, None)
            };

            Some(AncestorNode {
                animal_id: Some(animal.id.clone()),
                ear_tag: Some(animal.ear_tag.clone()),
                display_name: animal.display_name(),
                sex: Some(animal.sex),
                generation,
                is_fiv: animal.is_fiv,
                is_reference: false,
                father: father.map(Box::new),
                mother: mother.map(Box::new),
            })
        }
    }
}

fn summarize_descendant(animal: &Animal, generation: u8) -> DescendantSummary {
    DescendantSummary {
        animal_id: animal.id.clone(),
        ear_tag: animal.ear_tag.clone(),
        display_name: animal.display_name(),
        sex: animal.sex,
        status: animal.status,
        birth_date: animal.birth_date.clone(),
        is_fiv: animal.is_fiv,
        generation,
    }
}
