//! Category paths, external taxonomy entries and mapping decisions

use crate::ShelfmarkError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used in canonical category path strings
pub const PATH_SEPARATOR: &str = " > ";

/// Our own category assignment: department, category and optional subcategory
///
/// Serialized as its canonical string, `"Department > Category > Subcategory"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryPath {
    department: String,
    category: String,
    subcategory: Option<String>,
}

impl CategoryPath {
    /// Builds a path, trimming each segment. An empty subcategory is treated as absent.
    pub fn new(
        department: impl AsRef<str>,
        category: impl AsRef<str>,
        subcategory: Option<&str>,
    ) -> Result<Self, ShelfmarkError> {
        let department = department.as_ref().trim();
        let category = category.as_ref().trim();
        if department.is_empty() || category.is_empty() {
            return Err(ShelfmarkError::InvalidCategoryPath(format!(
                "department and category are required (got '{department}', '{category}')"
            )));
        }
        let subcategory = subcategory
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            department: department.to_string(),
            category: category.to_string(),
            subcategory,
        })
    }

    /// Parses `"A > B"` or `"A > B > C"`
    pub fn parse(rendered: &str) -> Result<Self, ShelfmarkError> {
        let segments: Vec<&str> = rendered.split('>').map(str::trim).collect();
        match segments.as_slice() {
            [department, category] => Self::new(department, category, None),
            [department, category, subcategory] => {
                Self::new(department, category, Some(subcategory))
            }
            _ => Err(ShelfmarkError::InvalidCategoryPath(rendered.to_string())),
        }
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }

    /// Keys to try when looking up a mapping, most specific first:
    /// full path, then `Department > Category`, then `Department`.
    pub fn lookup_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(3);
        if self.subcategory.is_some() {
            keys.push(self.to_string());
        }
        keys.push(format!("{}{PATH_SEPARATOR}{}", self.department, self.category));
        keys.push(self.department.clone());
        keys
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PATH_SEPARATOR}{}", self.department, self.category)?;
        if let Some(sub) = &self.subcategory {
            write!(f, "{PATH_SEPARATOR}{sub}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for CategoryPath {
    type Error = ShelfmarkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CategoryPath> for String {
    fn from(path: CategoryPath) -> Self {
        path.to_string()
    }
}

/// One entry of the external standard taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalCategory {
    /// Opaque global identifier, e.g. `gid://shopify/TaxonomyCategory/hg-11-4`
    pub id: String,
    /// Canonical full-name path, e.g. `Home & Garden > Lawn & Garden`
    #[serde(alias = "fullName")]
    pub full_name: String,
}

impl ExternalCategory {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
        }
    }
}

/// Model-reported confidence in a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Case-insensitive parse of `high`, `medium` or `low`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Why a category could not be mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedReason {
    /// The model returned an id outside the loaded external taxonomy
    Hallucinated,
    /// The model declined to pick a candidate
    NoConfidentMatch,
    /// The response could not be parsed or lacked required fields
    MalformedResponse,
    /// The mapping call itself failed
    MappingFailed,
    /// No external taxonomy was available for this run
    MappingDisabled,
}

/// Outcome of mapping one of our category paths onto the external taxonomy
///
/// `Mapped` always carries an id that belonged to the external taxonomy loaded
/// when the decision was made; anything else is `Unmapped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MappingDecision {
    Mapped {
        external_id: String,
        external_name: String,
        confidence: Confidence,
        rationale: String,
    },
    Unmapped { reason: UnmappedReason },
}

impl MappingDecision {
    pub fn unmapped(reason: UnmappedReason) -> Self {
        Self::Unmapped { reason }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped { .. })
    }

    pub fn external_id(&self) -> Option<&str> {
        match self {
            Self::Mapped { external_id, .. } => Some(external_id),
            Self::Unmapped { .. } => None,
        }
    }

    pub fn external_name(&self) -> Option<&str> {
        match self {
            Self::Mapped { external_name, .. } => Some(external_name),
            Self::Unmapped { .. } => None,
        }
    }

    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            Self::Mapped { confidence, .. } => Some(*confidence),
            Self::Unmapped { .. } => None,
        }
    }

    pub fn unmapped_reason(&self) -> Option<&UnmappedReason> {
        match self {
            Self::Mapped { .. } => None,
            Self::Unmapped { reason } => Some(reason),
        }
    }
}
