//! Taxonomy — the classification vocabulary applied to items, plus the
//! referential-integrity edits that keep ledger items consistent with it.
//!
//! Structural edits (`rename_*`, `delete_*`) take both the taxonomy and the
//! ledger. Each one validates every precondition before touching either, so a
//! rejected edit never leaves partial state behind. Callers hold the session
//! lock across the whole call, which makes the two-sided rewrite appear atomic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::EditError,
    ledger::Ledger,
    types::{Outcome, Receipt},
};

/// Reserved fallback category. Always present, never deleted or renamed.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Categories with their sub-categories, labels and payment modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxonomy {
    /// Category name → ordered, duplicate-free sub-category names.
    pub categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub payment_modes: Vec<String>,
}

impl Default for Taxonomy {
    /// The built-in vocabulary used on first start and after a reset.
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(UNCATEGORIZED.to_string(), Vec::new());
        categories.insert(
            "Food".to_string(),
            vec!["Groceries".to_string(), "Dining Out".to_string()],
        );
        categories.insert(
            "Transportation".to_string(),
            vec!["Gas".to_string(), "Public Transit".to_string()],
        );
        categories.insert(
            "Entertainment".to_string(),
            vec!["Movies".to_string(), "Games".to_string()],
        );
        Self {
            categories,
            labels: ["Organic", "Discount", "Gift", "Bulk"]
                .into_iter()
                .map(String::from)
                .collect(),
            payment_modes: Vec::new(),
        }
    }
}

impl Taxonomy {
    pub fn has_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn sub_categories(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn has_sub_category(&self, category: &str, sub: &str) -> bool {
        self.sub_categories(category)
            .is_some_and(|subs| subs.iter().any(|s| s == sub))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn has_payment_mode(&self, mode: &str) -> bool {
        self.payment_modes.iter().any(|m| m == mode)
    }

    /// Restore the reserved category and drop duplicate entries.
    ///
    /// Applied to anything read from disk, a backup file or a remote
    /// document, since those bypass the edit operations.
    pub fn normalize(&mut self) {
        self.categories
            .entry(UNCATEGORIZED.to_string())
            .or_default();
        for subs in self.categories.values_mut() {
            dedup_in_order(subs);
        }
        dedup_in_order(&mut self.labels);
        dedup_in_order(&mut self.payment_modes);
    }

    /// Add every category, sub-category and label that `receipts` reference
    /// but the taxonomy lacks. Returns whether anything was added.
    ///
    /// Run on load: the ledger and taxonomy blobs are written separately, and
    /// a failure between the two leaves items naming a missing category.
    pub fn adopt_references(&mut self, receipts: &[Receipt]) -> bool {
        let mut adopted = false;
        for item in receipts.iter().flat_map(|r| &r.items) {
            if item.category.trim().is_empty() {
                continue;
            }
            let subs = self.categories.entry(item.category.clone()).or_insert_with(|| {
                adopted = true;
                Vec::new()
            });
            if !item.sub_category.trim().is_empty() {
                adopted |= push_unique(subs, &item.sub_category).is_applied();
            }
            for label in &item.labels {
                adopted |= push_unique(&mut self.labels, label).is_applied();
            }
        }
        adopted
    }

    // -----------------------------------------------------------------------
    // Additions (taxonomy only)
    // -----------------------------------------------------------------------

    pub fn add_category(&mut self, name: &str) -> Result<Outcome, EditError> {
        let name = non_blank(name)?;
        if self.has_category(name) {
            return Ok(Outcome::Unchanged);
        }
        self.categories.insert(name.to_string(), Vec::new());
        Ok(Outcome::Applied)
    }

    pub fn add_sub_category(&mut self, category: &str, sub: &str) -> Result<Outcome, EditError> {
        let sub = non_blank(sub)?;
        let subs = self
            .categories
            .get_mut(category)
            .ok_or_else(|| EditError::CategoryNotFound(category.to_string()))?;
        if subs.iter().any(|s| s == sub) {
            return Ok(Outcome::Unchanged);
        }
        subs.push(sub.to_string());
        Ok(Outcome::Applied)
    }

    pub fn add_label(&mut self, label: &str) -> Result<Outcome, EditError> {
        let label = non_blank(label)?;
        Ok(push_unique(&mut self.labels, label))
    }

    pub fn add_payment_mode(&mut self, mode: &str) -> Result<Outcome, EditError> {
        let mode = non_blank(mode)?;
        Ok(push_unique(&mut self.payment_modes, mode))
    }
}

// ---------------------------------------------------------------------------
// Renames
// ---------------------------------------------------------------------------

pub(crate) fn rename_category(
    taxonomy: &mut Taxonomy,
    ledger: &mut Ledger,
    old: &str,
    new: &str,
) -> Result<Outcome, EditError> {
    let new = new.trim();
    if new.is_empty() {
        return Err(EditError::BlankName);
    }
    if old == new {
        return Err(EditError::SameName(old.to_string()));
    }
    if old == UNCATEGORIZED {
        return Err(EditError::ReservedCategory(old.to_string()));
    }
    if taxonomy.has_category(new) {
        return Err(EditError::DuplicateCategory(new.to_string()));
    }
    let subs = taxonomy
        .categories
        .remove(old)
        .ok_or_else(|| EditError::CategoryNotFound(old.to_string()))?;

    taxonomy.categories.insert(new.to_string(), subs);
    for item in ledger.items_mut() {
        if item.category == old {
            item.category = new.to_string();
        }
    }
    Ok(Outcome::Applied)
}

pub(crate) fn rename_sub_category(
    taxonomy: &mut Taxonomy,
    ledger: &mut Ledger,
    category: &str,
    old: &str,
    new: &str,
) -> Result<Outcome, EditError> {
    let new = new.trim();
    if new.is_empty() {
        return Err(EditError::BlankName);
    }
    if old == new {
        return Err(EditError::SameName(old.to_string()));
    }
    let subs = taxonomy
        .categories
        .get_mut(category)
        .ok_or_else(|| EditError::CategoryNotFound(category.to_string()))?;
    if subs.iter().any(|s| s == new) {
        return Err(EditError::DuplicateSubCategory {
            category: category.to_string(),
            sub: new.to_string(),
        });
    }
    let slot = subs
        .iter_mut()
        .find(|s| *s == old)
        .ok_or_else(|| EditError::SubCategoryNotFound {
            category: category.to_string(),
            sub: old.to_string(),
        })?;

    *slot = new.to_string();
    for item in ledger.items_mut() {
        if item.category == category && item.sub_category == old {
            item.sub_category = new.to_string();
        }
    }
    Ok(Outcome::Applied)
}

pub(crate) fn rename_label(
    taxonomy: &mut Taxonomy,
    ledger: &mut Ledger,
    old: &str,
    new: &str,
) -> Result<Outcome, EditError> {
    let new = new.trim();
    if new.is_empty() {
        return Err(EditError::BlankName);
    }
    if old == new {
        return Err(EditError::SameName(old.to_string()));
    }
    if taxonomy.has_label(new) {
        return Err(EditError::DuplicateLabel(new.to_string()));
    }
    let slot = taxonomy
        .labels
        .iter_mut()
        .find(|l| *l == old)
        .ok_or_else(|| EditError::LabelNotFound(old.to_string()))?;

    *slot = new.to_string();
    for item in ledger.items_mut() {
        if !item.has_label(old) {
            continue;
        }
        let already_tagged = item.has_label(new);
        item.labels.retain(|l| l != old || !already_tagged);
        for label in item.labels.iter_mut().filter(|l| *l == old) {
            *label = new.to_string();
        }
    }
    Ok(Outcome::Applied)
}

// ---------------------------------------------------------------------------
// Deletions
// ---------------------------------------------------------------------------

pub(crate) fn delete_category(
    taxonomy: &mut Taxonomy,
    ledger: &mut Ledger,
    name: &str,
    reassign_to: Option<&str>,
) -> Result<Outcome, EditError> {
    if name == UNCATEGORIZED {
        return Err(EditError::ReservedCategory(name.to_string()));
    }
    if !taxonomy.has_category(name) {
        return Err(EditError::CategoryNotFound(name.to_string()));
    }

    let usage = ledger.category_usage(name);
    let target = match (usage, reassign_to) {
        (0, None) => None,
        (0, Some(t)) => Some(t).filter(|t| taxonomy.has_category(t)),
        (_, t) => Some(t.unwrap_or(UNCATEGORIZED)),
    };
    if let Some(target) = target {
        if target == name {
            return Err(EditError::ReassignToSelf(name.to_string()));
        }
        if !taxonomy.has_category(target) {
            return Err(EditError::ReassignTargetMissing {
                target: target.to_string(),
                usage,
            });
        }
    }

    let moved = taxonomy.categories.remove(name).unwrap_or_default();
    if let Some(target) = target {
        if let Some(target_subs) = taxonomy.categories.get_mut(target) {
            for sub in moved {
                if !target_subs.contains(&sub) {
                    target_subs.push(sub);
                }
            }
        }
        for item in ledger.items_mut() {
            if item.category == name {
                item.category = target.to_string();
            }
        }
    }
    Ok(Outcome::Applied)
}

pub(crate) fn delete_sub_category(
    taxonomy: &mut Taxonomy,
    ledger: &mut Ledger,
    category: &str,
    sub: &str,
    reassign_to: Option<&str>,
) -> Result<Outcome, EditError> {
    if !taxonomy.has_category(category) {
        return Err(EditError::CategoryNotFound(category.to_string()));
    }
    if !taxonomy.has_sub_category(category, sub) {
        return Err(EditError::SubCategoryNotFound {
            category: category.to_string(),
            sub: sub.to_string(),
        });
    }

    let usage = ledger.sub_category_usage(category, sub);
    let target = if usage > 0 {
        let valid = reassign_to
            .filter(|t| *t != sub && taxonomy.has_sub_category(category, t));
        match valid {
            Some(t) => Some(t),
            None => {
                return Err(EditError::SubCategoryInUse {
                    category: category.to_string(),
                    sub: sub.to_string(),
                    usage,
                })
            }
        }
    } else {
        None
    };

    if let Some(subs) = taxonomy.categories.get_mut(category) {
        subs.retain(|s| s != sub);
    }
    if let Some(target) = target {
        for item in ledger.items_mut() {
            if item.category == category && item.sub_category == sub {
                item.sub_category = target.to_string();
            }
        }
    }
    Ok(Outcome::Applied)
}

/// Remove a label everywhere. No usage guard: labels are optional metadata.
pub(crate) fn delete_label(taxonomy: &mut Taxonomy, ledger: &mut Ledger, label: &str) -> Outcome {
    let mut outcome = Outcome::Unchanged;
    let before = taxonomy.labels.len();
    taxonomy.labels.retain(|l| l != label);
    if taxonomy.labels.len() != before {
        outcome = Outcome::Applied;
    }
    for item in ledger.items_mut() {
        if item.has_label(label) {
            item.labels.retain(|l| l != label);
            outcome = Outcome::Applied;
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_blank(name: &str) -> Result<&str, EditError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(EditError::BlankName)
    } else {
        Ok(trimmed)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) -> Outcome {
    if list.iter().any(|v| v == value) {
        Outcome::Unchanged
    } else {
        list.push(value.to_string());
        Outcome::Applied
    }
}

fn dedup_in_order(list: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    list.retain(|v| seen.insert(v.clone()));
}
