//! Criterion catalog: the immutable Dimension → Pillar → Criterion hierarchy.
//!
//! A catalog is validated once at construction and never mutated afterwards.
//! Criterion ids follow `DIM-PILLAR-Cn` (e.g. `STRAT-P1-C1`); the catalog keeps
//! an explicit `criterion_id → (dimension, pillar)` index so answers are grouped
//! by lookup rather than by string prefix.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scoring::ScoringError;

// =============================================================================
// Shape constants
// =============================================================================

pub const MAX_POINTS_PER_CRITERION: u32 = 3;
pub const CRITERIA_PER_PILLAR: u32 = 3;
pub const PILLARS_PER_DIMENSION: u32 = 4;
pub const MAX_POINTS_PER_PILLAR: u32 = MAX_POINTS_PER_CRITERION * CRITERIA_PER_PILLAR;
/// Dimension count of a complete catalog. The engine iterates whatever the
/// catalog holds and never relies on this value.
pub const TOTAL_DIMENSIONS: usize = 6;

const FIELD_SEPARATOR: char = '-';

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pillar {
    pub dimension_code: String,
    pub code: String,
    pub name: String,
}

impl Pillar {
    /// Numeric depth of the pillar (`P3` → 3).
    pub fn index(&self) -> Option<u32> {
        pillar_index(&self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionOption {
    pub score: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub criterion_id: String,
    pub dimension_code: String,
    pub pillar_code: String,
    #[serde(alias = "criterion_text")]
    pub text: String,
    #[serde(default)]
    pub options: Vec<CriterionOption>,
    #[serde(default)]
    pub next_linear: Option<String>,
}

/// Decomposed `DIM-PILLAR-Cn` criterion id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriterionPath<'a> {
    pub dimension: &'a str,
    pub pillar: &'a str,
    pub ordinal: u32,
}

/// Parse a criterion id into its dimension, pillar and ordinal parts.
pub fn parse_criterion_id(id: &str) -> Result<CriterionPath<'_>, ScoringError> {
    let mut parts = id.split(FIELD_SEPARATOR);
    let (Some(dimension), Some(pillar), Some(tail), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ScoringError::config(format!(
            "malformed criterion id '{id}': expected DIM-PILLAR-Cn"
        )));
    };

    if dimension.is_empty() || pillar.is_empty() {
        return Err(ScoringError::config(format!(
            "malformed criterion id '{id}': empty dimension or pillar"
        )));
    }

    let ordinal = tail
        .strip_prefix('C')
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| {
            ScoringError::config(format!(
                "malformed criterion id '{id}': ordinal must look like C1"
            ))
        })?;

    Ok(CriterionPath {
        dimension,
        pillar,
        ordinal,
    })
}

/// Numeric suffix of a pillar code (`P1` → 1). Zero is not a valid depth.
pub fn pillar_index(code: &str) -> Option<u32> {
    code.strip_prefix('P')
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n >= 1)
}

/// Filter for [`CatalogReader::list_criteria`].
#[derive(Debug, Clone, Default)]
pub struct CriterionFilter {
    pub dimension_code: Option<String>,
    pub pillar_code: Option<String>,
}

impl CriterionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn dimension(code: impl Into<String>) -> Self {
        Self {
            dimension_code: Some(code.into()),
            pillar_code: None,
        }
    }

    pub fn pillar(dimension_code: impl Into<String>, pillar_code: impl Into<String>) -> Self {
        Self {
            dimension_code: Some(dimension_code.into()),
            pillar_code: Some(pillar_code.into()),
        }
    }

    fn matches(&self, c: &Criterion) -> bool {
        self.dimension_code
            .as_deref()
            .map_or(true, |d| d == c.dimension_code)
            && self
                .pillar_code
                .as_deref()
                .map_or(true, |p| p == c.pillar_code)
    }
}

// =============================================================================
// Reader trait
// =============================================================================

/// Read interface the scoring engine consumes.
pub trait CatalogReader {
    /// Dimensions in catalog order.
    fn list_dimensions(&self) -> &[Dimension];

    /// Pillars of one dimension ordered by depth (P1 < P2 < ...).
    fn list_pillars(&self, dimension_code: &str) -> Vec<&Pillar>;

    fn list_criteria(&self, filter: &CriterionFilter) -> Vec<&Criterion>;

    /// `(dimension_code, pillar_code)` owning a criterion, if it exists.
    fn locate(&self, criterion_id: &str) -> Option<(&str, &str)>;
}

// =============================================================================
// Catalog
// =============================================================================

/// Serialized catalog document (`{dimensions, pillars, criteria}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub pillars: Vec<Pillar>,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    dimensions: Vec<Dimension>,
    pillars: Vec<Pillar>,
    criteria: Vec<Criterion>,
    by_id: HashMap<String, usize>,
    head: Option<usize>,
}

impl Catalog {
    /// Build and validate a catalog. `next_linear` links are taken as given.
    pub fn new(
        dimensions: Vec<Dimension>,
        mut pillars: Vec<Pillar>,
        criteria: Vec<Criterion>,
    ) -> Result<Self, ScoringError> {
        let dim_order: HashMap<&str, usize> = dimensions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.code.as_str(), i))
            .collect();

        if dim_order.len() != dimensions.len() {
            return Err(ScoringError::config("duplicate dimension code"));
        }
        for dim in &dimensions {
            check_code("dimension", &dim.code)?;
        }

        let mut pillar_keys: HashSet<(String, String)> = HashSet::new();
        for pillar in &pillars {
            if !dim_order.contains_key(pillar.dimension_code.as_str()) {
                return Err(ScoringError::config(format!(
                    "pillar {} references unknown dimension {}",
                    pillar.code, pillar.dimension_code
                )));
            }
            check_code("pillar", &pillar.code)?;
            if pillar.index().is_none() {
                return Err(ScoringError::config(format!(
                    "pillar code '{}' must look like P1, P2, ...",
                    pillar.code
                )));
            }
            if !pillar_keys.insert((pillar.dimension_code.clone(), pillar.code.clone())) {
                return Err(ScoringError::config(format!(
                    "duplicate pillar {}-{}",
                    pillar.dimension_code, pillar.code
                )));
            }
        }

        pillars.sort_by_key(|p| {
            (
                dim_order.get(p.dimension_code.as_str()).copied().unwrap_or(usize::MAX),
                p.index().unwrap_or(u32::MAX),
            )
        });

        let mut by_id = HashMap::with_capacity(criteria.len());
        let mut per_pillar: HashMap<(&str, &str), u32> = HashMap::new();
        for (idx, criterion) in criteria.iter().enumerate() {
            let path = parse_criterion_id(&criterion.criterion_id)?;
            if path.dimension != criterion.dimension_code || path.pillar != criterion.pillar_code
            {
                return Err(ScoringError::config(format!(
                    "criterion {} is filed under {}-{}",
                    criterion.criterion_id, criterion.dimension_code, criterion.pillar_code
                )));
            }
            if !pillar_keys.contains(&(
                criterion.dimension_code.clone(),
                criterion.pillar_code.clone(),
            )) {
                return Err(ScoringError::config(format!(
                    "criterion {} references unknown pillar",
                    criterion.criterion_id
                )));
            }
            let filled = per_pillar
                .entry((
                    criterion.dimension_code.as_str(),
                    criterion.pillar_code.as_str(),
                ))
                .or_default();
            *filled += 1;
            if *filled > CRITERIA_PER_PILLAR {
                return Err(ScoringError::config(format!(
                    "pillar {}-{} holds more than {CRITERIA_PER_PILLAR} criteria",
                    criterion.dimension_code, criterion.pillar_code
                )));
            }
            if let Some(opt) = criterion
                .options
                .iter()
                .find(|o| u32::from(o.score) > MAX_POINTS_PER_CRITERION)
            {
                return Err(ScoringError::config(format!(
                    "criterion {} has option scored {} (max {MAX_POINTS_PER_CRITERION})",
                    criterion.criterion_id, opt.score
                )));
            }
            if by_id.insert(criterion.criterion_id.clone(), idx).is_some() {
                return Err(ScoringError::config(format!(
                    "duplicate criterion id {}",
                    criterion.criterion_id
                )));
            }
        }

        let head = linear_head(&criteria, &by_id)?;

        Ok(Self {
            dimensions,
            pillars,
            criteria,
            by_id,
            head,
        })
    }

    /// Build a catalog whose linear order is the order criteria are given in,
    /// overwriting any `next_linear` links.
    pub fn linked(
        dimensions: Vec<Dimension>,
        pillars: Vec<Pillar>,
        mut criteria: Vec<Criterion>,
    ) -> Result<Self, ScoringError> {
        let ids: Vec<String> = criteria.iter().map(|c| c.criterion_id.clone()).collect();
        for (i, criterion) in criteria.iter_mut().enumerate() {
            criterion.next_linear = ids.get(i + 1).cloned();
        }
        Self::new(dimensions, pillars, criteria)
    }

    pub fn empty() -> Self {
        Self {
            dimensions: Vec::new(),
            pillars: Vec::new(),
            criteria: Vec::new(),
            by_id: HashMap::new(),
            head: None,
        }
    }

    /// The default six-dimension catalog shipped with the crate.
    pub fn builtin() -> Result<Self, ScoringError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn from_document(doc: CatalogDocument) -> Result<Self, ScoringError> {
        Self::new(doc.dimensions, doc.pillars, doc.criteria)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ScoringError> {
        let doc: CatalogDocument = serde_json::from_str(raw)
            .map_err(|e| ScoringError::config(format!("invalid catalog document: {e}")))?;
        Self::from_document(doc)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ScoringError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScoringError::not_found(format!("catalog file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Number of criteria, i.e. questions in a full session.
    pub fn total_criteria(&self) -> usize {
        self.criteria.len()
    }

    pub fn criterion(&self, criterion_id: &str) -> Option<&Criterion> {
        self.by_id.get(criterion_id).map(|&i| &self.criteria[i])
    }

    pub fn dimension(&self, code: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.code == code)
    }

    /// Head of the linear traversal order.
    pub fn first(&self) -> Option<&Criterion> {
        self.head.map(|i| &self.criteria[i])
    }

    /// Successor of a criterion in the linear order; `None` at the end.
    pub fn next(&self, criterion_id: &str) -> Option<&Criterion> {
        self.criterion(criterion_id)?
            .next_linear
            .as_deref()
            .and_then(|id| self.criterion(id))
    }

    /// All criteria following the linear order from the head.
    pub fn linear_order(&self) -> Vec<&Criterion> {
        let mut out = Vec::with_capacity(self.criteria.len());
        let mut cursor = self.first();
        while let Some(c) = cursor {
            out.push(c);
            cursor = self.next(&c.criterion_id);
        }
        out
    }
}

impl CatalogReader for Catalog {
    fn list_dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    fn list_pillars(&self, dimension_code: &str) -> Vec<&Pillar> {
        self.pillars
            .iter()
            .filter(|p| p.dimension_code == dimension_code)
            .collect()
    }

    fn list_criteria(&self, filter: &CriterionFilter) -> Vec<&Criterion> {
        self.criteria.iter().filter(|c| filter.matches(c)).collect()
    }

    fn locate(&self, criterion_id: &str) -> Option<(&str, &str)> {
        self.criterion(criterion_id)
            .map(|c| (c.dimension_code.as_str(), c.pillar_code.as_str()))
    }
}

fn check_code(kind: &str, code: &str) -> Result<(), ScoringError> {
    if code.is_empty() || code.contains(FIELD_SEPARATOR) {
        return Err(ScoringError::config(format!(
            "{kind} code '{code}' must be non-empty and must not contain '{FIELD_SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Find the unique head of the `next_linear` chain and check the chain covers
/// every criterion exactly once.
fn linear_head(
    criteria: &[Criterion],
    by_id: &HashMap<String, usize>,
) -> Result<Option<usize>, ScoringError> {
    if criteria.is_empty() {
        return Ok(None);
    }

    let mut pointed: HashSet<usize> = HashSet::new();
    for c in criteria {
        if let Some(next) = &c.next_linear {
            let target = by_id.get(next).ok_or_else(|| {
                ScoringError::config(format!(
                    "criterion {} points to unknown successor {next}",
                    c.criterion_id
                ))
            })?;
            if !pointed.insert(*target) {
                return Err(ScoringError::config(format!(
                    "criterion {next} has more than one predecessor"
                )));
            }
        }
    }

    let heads: Vec<usize> = (0..criteria.len()).filter(|i| !pointed.contains(i)).collect();
    let [head] = heads.as_slice() else {
        return Err(ScoringError::config(format!(
            "linear order must have exactly one head, found {}",
            heads.len()
        )));
    };

    let mut seen = 1usize;
    let mut cursor = criteria[*head].next_linear.as_deref();
    while let Some(id) = cursor {
        seen += 1;
        if seen > criteria.len() {
            return Err(ScoringError::config("linear order contains a cycle"));
        }
        cursor = by_id
            .get(id)
            .and_then(|&i| criteria[i].next_linear.as_deref());
    }
    if seen != criteria.len() {
        return Err(ScoringError::config(format!(
            "linear order reaches {seen} of {} criteria",
            criteria.len()
        )));
    }

    Ok(Some(*head))
}
