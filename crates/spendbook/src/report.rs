//! Read-side projections over a receipt list.
//!
//! Everything here is a pure function of a `&[Receipt]` slice, so callers
//! pass [`Session::receipts`](crate::session::Session::receipts) or a
//! snapshot and never hold the session lock while aggregating.
//!
//! Aggregations sum plain item prices. Only [`item_total_with_gst`] and
//! [`receipt_total`] apply GST.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Item, Receipt};

// ============================================================================
// Filter
// ============================================================================

/// Constraints shared by every projection. Empty lists and `None` bounds
/// mean "no constraint". Dates are `YYYY-MM-DD` and compared as strings,
/// both bounds inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub categories: Vec<String>,
    pub sub_categories: Vec<String>,
    pub labels: Vec<String>,
    pub payment_modes: Vec<String>,
}

impl ReportFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sub_categories<I, S>(mut self, subs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_categories = subs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_payment_modes<I, S>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payment_modes = modes.into_iter().map(Into::into).collect();
        self
    }

    /// Date range and payment mode apply to the whole receipt.
    pub fn accepts_receipt(&self, receipt: &Receipt) -> bool {
        if let Some(start) = &self.start_date {
            if receipt.date.as_str() < start.as_str() {
                return false;
            }
        }
        if let Some(end) = &self.end_date {
            if receipt.date.as_str() > end.as_str() {
                return false;
            }
        }
        if !self.payment_modes.is_empty() {
            match &receipt.payment_mode {
                Some(mode) if self.payment_modes.contains(mode) => {}
                _ => return false,
            }
        }
        true
    }

    /// Category, sub-category and label constraints apply per item. An item
    /// passes the label constraint when it carries any selected label.
    pub fn accepts_item(&self, item: &Item) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&item.category) {
            return false;
        }
        if !self.sub_categories.is_empty() && !self.sub_categories.contains(&item.sub_category) {
            return false;
        }
        if !self.labels.is_empty() && !item.labels.iter().any(|l| self.labels.contains(l)) {
            return false;
        }
        true
    }

    /// Every (receipt, item) pair that passes both levels.
    pub fn matching<'a>(&'a self, receipts: &'a [Receipt]) -> impl Iterator<Item = (&'a Receipt, &'a Item)> + 'a {
        receipts
            .iter()
            .filter(move |r| self.accepts_receipt(r))
            .flat_map(|r| r.items.iter().map(move |i| (r, i)))
            .filter(move |(_, i)| self.accepts_item(i))
    }
}

// ============================================================================
// Aggregations
// ============================================================================

pub fn total_spent(receipts: &[Receipt], filter: &ReportFilter) -> f64 {
    filter.matching(receipts).map(|(_, i)| i.price).sum()
}

pub fn totals_by_category(receipts: &[Receipt], filter: &ReportFilter) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for (_, item) in filter.matching(receipts) {
        *totals.entry(item.category.clone()).or_insert(0.0) += item.price;
    }
    totals
}

/// Items without a sub-category are left out.
pub fn totals_by_sub_category(receipts: &[Receipt], filter: &ReportFilter) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for (_, item) in filter.matching(receipts) {
        if item.sub_category.is_empty() {
            continue;
        }
        *totals.entry(item.sub_category.clone()).or_insert(0.0) += item.price;
    }
    totals
}

/// An item counts once toward each of its labels. With a label filter, only
/// the selected labels are aggregated.
pub fn totals_by_label(receipts: &[Receipt], filter: &ReportFilter) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for (_, item) in filter.matching(receipts) {
        for label in &item.labels {
            if !filter.labels.is_empty() && !filter.labels.contains(label) {
                continue;
            }
            *totals.entry(label.clone()).or_insert(0.0) += item.price;
        }
    }
    totals
}

/// Keyed by `YYYY-MM`, ascending. Receipts without a usable date are
/// skipped.
pub fn totals_by_month(receipts: &[Receipt], filter: &ReportFilter) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for (receipt, item) in filter.matching(receipts) {
        let Some(month) = receipt.month() else {
            continue;
        };
        *totals.entry(month.to_string()).or_insert(0.0) += item.price;
    }
    totals
}

// ============================================================================
// Drill-down
// ============================================================================

/// One bar of a breakdown chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Category(String),
    SubCategory(String),
    Label(String),
    Month(String),
}

impl Selection {
    fn accepts(&self, receipt: &Receipt, item: &Item) -> bool {
        match self {
            Selection::Category(c) => &item.category == c,
            Selection::SubCategory(s) => &item.sub_category == s,
            Selection::Label(l) => item.has_label(l),
            Selection::Month(m) => receipt.month() == Some(m.as_str()),
        }
    }
}

/// The items behind one bar, with their receipts.
pub fn matching_items<'a>(
    receipts: &'a [Receipt],
    filter: &ReportFilter,
    selection: &Selection,
) -> Vec<(&'a Receipt, &'a Item)> {
    receipts
        .iter()
        .filter(|r| filter.accepts_receipt(r))
        .flat_map(|r| r.items.iter().map(move |i| (r, i)))
        .filter(|(r, i)| selection.accepts(r, i) && filter.accepts_item(i))
        .collect()
}

// ============================================================================
// Totals with GST
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    #[default]
    None,
    Up,
    Down,
}

impl Rounding {
    pub fn apply(self, amount: f64) -> f64 {
        match self {
            Rounding::None => amount,
            Rounding::Up => amount.ceil(),
            Rounding::Down => amount.floor(),
        }
    }
}

/// Price including the item's GST, falling back to the receipt's rate.
pub fn item_total_with_gst(receipt: &Receipt, item: &Item) -> f64 {
    item.price * (1.0 + receipt.effective_gst_rate(item) / 100.0)
}

pub fn receipt_total(receipt: &Receipt, rounding: Rounding) -> f64 {
    let raw: f64 = receipt
        .items
        .iter()
        .map(|item| item_total_with_gst(receipt, item))
        .sum();
    rounding.apply(raw)
}

// ============================================================================
// Search
// ============================================================================

/// Receipts passing the receipt-level filter whose text matches `query`
/// (case-insensitive). Matches shop, date in `YYYY-MM-DD` or `DD-MM-YYYY`
/// form, GST-inclusive total, payment mode, and any item's name, category,
/// sub-category, price or labels. A blank query matches everything.
pub fn search_receipts<'a>(receipts: &'a [Receipt], filter: &ReportFilter, query: &str) -> Vec<&'a Receipt> {
    let query = query.trim().to_lowercase();
    receipts
        .iter()
        .filter(|r| filter.accepts_receipt(r))
        .filter(|r| query.is_empty() || receipt_matches(r, &query))
        .collect()
}

fn receipt_matches(receipt: &Receipt, query: &str) -> bool {
    if receipt.shop.to_lowercase().contains(query) {
        return true;
    }
    if receipt.date.contains(query) || display_date(&receipt.date).contains(query) {
        return true;
    }
    let total = receipt_total(receipt, Rounding::None);
    if total.to_string().contains(query) || format!("{total:.2}").contains(query) {
        return true;
    }
    if receipt
        .payment_mode
        .as_deref()
        .is_some_and(|m| m.to_lowercase().contains(query))
    {
        return true;
    }
    receipt.items.iter().any(|item| {
        item.name.to_lowercase().contains(query)
            || item.category.to_lowercase().contains(query)
            || item.sub_category.to_lowercase().contains(query)
            || item.price.to_string().contains(query)
            || item.labels.iter().any(|l| l.to_lowercase().contains(query))
    })
}

/// `YYYY-MM-DD` -> `DD-MM-YYYY`.
fn display_date(date: &str) -> String {
    date.split('-').rev().collect::<Vec<_>>().join("-")
}
