use serde::{Deserialize, Serialize};
use std::fmt;

/// A single animal record as stored by the persistence layer.
///
/// Lineage fields can hold either a record id, a free-text name/ear tag, or
/// both. Nothing guarantees that a referenced parent exists in the herd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Animal {
    pub id: String,
    /// Ear tag ("brinco"), human-assigned and unique within a herd in practice
    #[serde(alias = "brinco")]
    pub ear_tag: String,
    pub name: Option<String>,
    pub breed: String,
    pub sex: Sex,
    /// Birth date as recorded (YYYY-MM-DD). May be missing or malformed.
    pub birth_date: Option<String>,
    /// Current weight in kg
    pub current_weight: Option<f64>,
    pub status: AnimalStatus,

    pub father_id: Option<String>,
    pub father_name: Option<String>,
    pub mother_id: Option<String>,
    pub mother_name: Option<String>,

    /// Embryo transfer product: the gestational mother differs from the genetic one
    pub is_fiv: bool,
    pub biological_mother_id: Option<String>,
    pub biological_mother_name: Option<String>,
    pub receptor_mother_id: Option<String>,
    pub receptor_mother_name: Option<String>,

    pub weighings: Vec<WeighingEvent>,
    pub medications: Vec<MedicationEvent>,
    pub pregnancies: Vec<PregnancyEvent>,
    pub abortions: Vec<AbortionEvent>,
    pub births: Vec<OffspringBirthEvent>,
}

impl Animal {
    /// Name when present, ear tag otherwise
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.ear_tag.trim().to_string(),
        }
    }

    /// Id of the mother that carries the genetics.
    ///
    /// For FIV animals this is the biological mother. The generic mother id is
    /// only used as a fallback when it does not point at the receptor.
    pub fn lineage_mother_id(&self) -> Option<&str> {
        if self.is_fiv {
            non_blank(self.biological_mother_id.as_deref()).or_else(|| {
                let mother = non_blank(self.mother_id.as_deref())?;
                if non_blank(self.receptor_mother_id.as_deref()) == Some(mother) {
                    None
                } else {
                    Some(mother)
                }
            })
        } else {
            non_blank(self.mother_id.as_deref())
        }
    }

    /// Name/ear tag of the mother that carries the genetics (see [`Animal::lineage_mother_id`]).
    pub fn lineage_mother_name(&self) -> Option<&str> {
        if self.is_fiv {
            non_blank(self.biological_mother_name.as_deref()).or_else(|| {
                let mother = non_blank(self.mother_name.as_deref())?;
                let receptor = non_blank(self.receptor_mother_name.as_deref());
                match receptor {
                    Some(r) if r.to_lowercase() == mother.to_lowercase() => None,
                    _ => Some(mother),
                }
            })
        } else {
            non_blank(self.mother_name.as_deref())
        }
    }

    /// Mother id exactly as recorded. For FIV animals this is usually the receptor.
    pub fn mother_id_ref(&self) -> Option<&str> {
        non_blank(self.mother_id.as_deref())
    }

    pub fn father_id_ref(&self) -> Option<&str> {
        non_blank(self.father_id.as_deref())
    }

    pub fn father_name_ref(&self) -> Option<&str> {
        non_blank(self.father_name.as_deref())
    }

    /// Receptor (surrogate) mother reference, only meaningful for FIV animals
    pub fn receptor_refs(&self) -> (Option<&str>, Option<&str>) {
        if !self.is_fiv {
            return (None, None);
        }
        (
            non_blank(self.receptor_mother_name.as_deref()),
            non_blank(self.receptor_mother_id.as_deref()),
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Sex {
    Male,
    #[default]
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "male"),
            Sex::Female => write!(f, "female"),
        }
    }
}

impl Sex {
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "macho" => Ok(Sex::Male),
            "female" | "f" | "femea" | "fêmea" => Ok(Sex::Female),
            other => Err(format!("Invalid sex: {}", other)),
        }
    }
}

/// Lifecycle status of an animal in the herd
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AnimalStatus {
    #[default]
    Active,
    Sold,
    Deceased,
}

impl fmt::Display for AnimalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimalStatus::Active => write!(f, "active"),
            AnimalStatus::Sold => write!(f, "sold"),
            AnimalStatus::Deceased => write!(f, "deceased"),
        }
    }
}

impl AnimalStatus {
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "active" | "ativo" => Ok(AnimalStatus::Active),
            "sold" | "vendido" => Ok(AnimalStatus::Sold),
            "deceased" | "obito" | "óbito" => Ok(AnimalStatus::Deceased),
            other => Err(format!("Invalid animal status: {}", other)),
        }
    }
}

/// Which development milestone a weighing records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WeighingKind {
    Birth,
    Weaning,
    Yearling,
    #[default]
    None,
}

impl fmt::Display for WeighingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeighingKind::Birth => write!(f, "birth"),
            WeighingKind::Weaning => write!(f, "weaning"),
            WeighingKind::Yearling => write!(f, "yearling"),
            WeighingKind::None => write!(f, "none"),
        }
    }
}

impl WeighingKind {
    /// Unknown values map to `None`; a weighing is still a weighing.
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "birth" => WeighingKind::Birth,
            "weaning" => WeighingKind::Weaning,
            "yearling" => WeighingKind::Yearling,
            _ => WeighingKind::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingEvent {
    /// YYYY-MM-DD
    pub date: String,
    /// Weight in kg
    pub weight: f64,
    pub kind: WeighingKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationEvent {
    pub date: String,
    pub product: String,
    pub dose: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PregnancyEvent {
    pub date: String,
    pub expected_calving_date: Option<String>,
    pub sire: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortionEvent {
    pub date: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffspringBirthEvent {
    pub date: String,
    pub calf_id: Option<String>,
    pub calf_ear_tag: Option<String>,
}

/// A breeding season ("estação de monta") and the coverages recorded in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedingSeason {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub coverages: Vec<Coverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub female_id: String,
    pub date: String,
    /// Bull name, semen batch or donor reference
    pub sire: Option<String>,
    pub method: CoverageMethod,
    pub diagnosis: PregnancyDiagnosis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageMethod {
    Natural,
    ArtificialInsemination,
    EmbryoTransfer,
}

impl fmt::Display for CoverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageMethod::Natural => write!(f, "natural"),
            CoverageMethod::ArtificialInsemination => write!(f, "ai"),
            CoverageMethod::EmbryoTransfer => write!(f, "embryo_transfer"),
        }
    }
}

impl CoverageMethod {
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "natural" => Ok(CoverageMethod::Natural),
            "ai" | "iatf" => Ok(CoverageMethod::ArtificialInsemination),
            "embryo_transfer" | "te" | "fiv" => Ok(CoverageMethod::EmbryoTransfer),
            other => Err(format!("Invalid coverage method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PregnancyDiagnosis {
    Pending,
    Pregnant,
    Empty,
}

impl fmt::Display for PregnancyDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PregnancyDiagnosis::Pending => write!(f, "pending"),
            PregnancyDiagnosis::Pregnant => write!(f, "pregnant"),
            PregnancyDiagnosis::Empty => write!(f, "empty"),
        }
    }
}

impl PregnancyDiagnosis {
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "" => Ok(PregnancyDiagnosis::Pending),
            "pregnant" => Ok(PregnancyDiagnosis::Pregnant),
            "empty" => Ok(PregnancyDiagnosis::Empty),
            other => Err(format!("Invalid pregnancy diagnosis: {}", other)),
        }
    }
}

/// A node in a rendered ancestor tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestorNode {
    /// Record id when the ancestor is registered in the herd
    pub animal_id: Option<String>,
    pub ear_tag: Option<String>,
    pub display_name: String,
    pub sex: Option<Sex>,
    /// 1 = parents, 2 = grandparents, 3 = great-grandparents
    pub generation: u8,
    pub is_fiv: bool,
    /// True when the ancestor is only known by name (not in the herd records)
    pub is_reference: bool,
    pub father: Option<Box<AncestorNode>>,
    pub mother: Option<Box<AncestorNode>>,
}

/// Ancestors of one animal, bounded to a fixed number of generations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestorTree {
    pub animal_id: String,
    pub father: Option<AncestorNode>,
    pub mother: Option<AncestorNode>,
    /// Gestational mother of an FIV animal. Display only, never ascended.
    pub receptor_mother: Option<AncestorNode>,
}

/// Compact view of an animal inside a descendant generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescendantSummary {
    pub animal_id: String,
    pub ear_tag: String,
    pub display_name: String,
    pub sex: Sex,
    pub status: AnimalStatus,
    pub birth_date: Option<String>,
    pub is_fiv: bool,
    pub generation: u8,
}

/// Counts for one generation of descendants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total: usize,
    pub males: usize,
    pub females: usize,
    pub active: usize,
    pub sold: usize,
    pub deceased: usize,
    pub fiv: usize,
}

/// Descendants of one animal split by generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescendantGenerations {
    pub animal_id: String,
    pub children: Vec<DescendantSummary>,
    pub grandchildren: Vec<DescendantSummary>,
    pub great_grandchildren: Vec<DescendantSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescendantGroup {
    pub label: String,
    pub animals: Vec<DescendantSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fiv_lineage_mother_prefers_biological() {
        let animal = Animal {
            id: "1".to_string(),
            ear_tag: "FIV01".to_string(),
            is_fiv: true,
            mother_id: Some("receptor".to_string()),
            mother_name: Some("Receptora".to_string()),
            biological_mother_id: Some("donor".to_string()),
            biological_mother_name: Some("Doadora".to_string()),
            receptor_mother_id: Some("receptor".to_string()),
            receptor_mother_name: Some("Receptora".to_string()),
            ..Default::default()
        };

        assert_eq!(animal.lineage_mother_id(), Some("donor"));
        assert_eq!(animal.lineage_mother_name(), Some("Doadora"));
        assert_eq!(animal.receptor_refs(), (Some("Receptora"), Some("receptor")));
    }

    #[test]
    fn test_fiv_without_biological_mother_never_falls_back_to_receptor() {
        let animal = Animal {
            id: "1".to_string(),
            is_fiv: true,
            mother_id: Some("receptor".to_string()),
            mother_name: Some("receptora ".to_string()),
            receptor_mother_id: Some("receptor".to_string()),
            receptor_mother_name: Some("Receptora".to_string()),
            ..Default::default()
        };

        assert_eq!(animal.lineage_mother_id(), None);
        assert_eq!(animal.lineage_mother_name(), None);
    }

    #[test]
    fn test_receptor_name_match_ignores_accented_case() {
        let animal = Animal {
            id: "1".to_string(),
            is_fiv: true,
            mother_id: Some("receptor".to_string()),
            mother_name: Some("ESTRÊLA".to_string()),
            receptor_mother_name: Some("Estrêla".to_string()),
            ..Default::default()
        };

        assert_eq!(animal.lineage_mother_name(), None);
        assert_eq!(animal.mother_id_ref(), Some("receptor"));
        assert_eq!(animal.lineage_mother_id(), Some("receptor"));
    }

    #[test]
    fn test_display_name_falls_back_to_ear_tag() {
        let mut animal = Animal {
            ear_tag: " ABC001 ".to_string(),
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(animal.display_name(), "ABC001");

        animal.name = Some("Mimosa".to_string());
        assert_eq!(animal.display_name(), "Mimosa");
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(Sex::from_string("Macho").unwrap(), Sex::Male);
        assert_eq!(AnimalStatus::from_string("sold").unwrap(), AnimalStatus::Sold);
        assert_eq!(WeighingKind::from_string("WEANING"), WeighingKind::Weaning);
        assert_eq!(WeighingKind::from_string("whatever"), WeighingKind::None);
        assert!(PregnancyDiagnosis::from_string("maybe").is_err());
    }

    #[test]
    fn test_animal_accepts_brinco_alias() {
        let json = r#"{
            "id": "1", "brinco": "ABC001", "name": null, "breed": "Nelore",
            "sex": "Female", "birth_date": null, "current_weight": null,
            "status": "Active", "father_id": null, "father_name": null,
            "mother_id": null, "mother_name": null, "is_fiv": false,
            "biological_mother_id": null, "biological_mother_name": null,
            "receptor_mother_id": null, "receptor_mother_name": null,
            "weighings": [], "medications": [], "pregnancies": [],
            "abortions": [], "births": []
        }"#;
        let animal: Animal = serde_json::from_str(json).unwrap();
        assert_eq!(animal.ear_tag, "ABC001");
    }
}
