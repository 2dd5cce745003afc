//! Our own taxonomy document
//!
//! A Markdown file in which `**Product Type:** `Dept`` starts a department,
//! `#### Category` headings start a category, and numbered `N. **Name**`
//! lines list subcategories.

use crate::error::{TaxonomyError, TaxonomyResult};
use regex::Regex;
use shelfmark_core::{CategoryPath, SHA256_HASHER};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static DEPARTMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*Product Type:\*\*\s*`([^`]+)`").expect("valid regex"));
static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^####\s+(.+)$").expect("valid regex"));
static SUBCATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+(.+)$").expect("valid regex"));

/// Parsed taxonomy document plus the fingerprint of its bytes
#[derive(Debug, Clone)]
pub struct InternalTaxonomy {
    document: String,
    paths: Vec<CategoryPath>,
    fingerprint: String,
}

impl InternalTaxonomy {
    /// Reads and parses the document at `path`
    pub fn load(path: &Path) -> TaxonomyResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = String::from_utf8_lossy(&bytes).into_owned();
        let fingerprint = SHA256_HASHER.hash_bytes(&bytes);
        let taxonomy = Self::from_markdown(document, fingerprint);
        info!(
            path = %path.display(),
            categories = taxonomy.paths.len(),
            "Loaded internal taxonomy"
        );
        Ok(taxonomy)
    }

    /// Parses an in-memory document; `fingerprint` identifies its version
    pub fn from_markdown(document: String, fingerprint: String) -> Self {
        let paths = parse_paths(&document);
        Self {
            document,
            paths,
            fingerprint,
        }
    }

    /// Raw document text, included verbatim in taxonomy prompts
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Every category path the document defines, in document order
    pub fn paths(&self) -> &[CategoryPath] {
        &self.paths
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn parse_paths(document: &str) -> Vec<CategoryPath> {
    let mut paths: Vec<CategoryPath> = Vec::new();
    let mut department: Option<String> = None;
    let mut category: Option<String> = None;

    let mut push = |path: Option<CategoryPath>| {
        if let Some(path) = path {
            if !paths.contains(&path) {
                debug!(%path, "Found category path");
                paths.push(path);
            }
        }
    };

    for line in document.lines().map(str::trim) {
        if let Some(caps) = DEPARTMENT_RE.captures(line) {
            department = Some(caps[1].trim().to_string());
            category = None;
        } else if let Some(caps) = CATEGORY_RE.captures(line) {
            let Some(dept) = &department else { continue };
            let name = caps[1].trim().to_string();
            push(CategoryPath::new(dept, &name, None).ok());
            category = Some(name);
        } else if let Some(caps) = SUBCATEGORY_RE.captures(line) {
            let (Some(dept), Some(cat)) = (&department, &category) else {
                continue;
            };
            let item = caps[1].trim();
            if item.contains("Tags:") {
                continue;
            }
            let name = item.replace("**", "");
            push(CategoryPath::new(dept, cat, Some(name.trim())).ok());
        }
    }
    paths
}
