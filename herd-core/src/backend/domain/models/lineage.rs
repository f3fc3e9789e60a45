//! Domain models for genealogy traversal.
use serde::{Deserialize, Serialize};
use shared::{Animal, AncestorTree, DescendantGenerations, DescendantGroup, DescendantSummary, GenerationStats};

/// Outcome of resolving a lineage reference against the herd
#[derive(Debug, Clone, PartialEq)]
pub enum AncestorRef<'a> {
    /// The reference matched an animal in the herd
    Resolved(&'a Animal),
    /// A name was given but no herd animal matches it (bought-in, external sire, ...)
    External(String),
    /// Neither a usable name nor a matching id was given
    Absent,
}

impl<'a> AncestorRef<'a> {
    pub fn animal(&self) -> Option<&'a Animal> {
        match self {
            AncestorRef::Resolved(animal) => Some(animal),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, AncestorRef::External(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, AncestorRef::Absent)
    }

    pub fn display_name(&self) -> Option<String> {
        match self {
            AncestorRef::Resolved(animal) => Some(animal.display_name()),
            AncestorRef::External(name) => Some(name.clone()),
            AncestorRef::Absent => None,
        }
    }
}

/// How descendant lists are bucketed for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DescendantGrouping {
    #[default]
    None,
    Status,
    Sex,
    BirthYear,
}

impl DescendantGrouping {
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "all" => Ok(DescendantGrouping::None),
            "status" => Ok(DescendantGrouping::Status),
            "sex" => Ok(DescendantGrouping::Sex),
            "year" | "birth_year" => Ok(DescendantGrouping::BirthYear),
            other => Err(format!("Invalid grouping: {}", other)),
        }
    }
}

/// Full genealogy of one animal within one herd snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageView {
    pub snapshot_version: u64,
    pub ancestry: AncestorTree,
    /// Animals sharing a resolved mother or father, as generation 0
    pub siblings: Vec<DescendantSummary>,
    pub descendants: DescendantGenerations,
}

/// Counts and display buckets for one descendant generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: u8,
    pub stats: GenerationStats,
    pub groups: Vec<DescendantGroup>,
}
