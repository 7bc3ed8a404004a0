//! Ledger — the ordered collection of persisted receipts.

use chrono::NaiveDate;

use crate::{
    error::EditError,
    taxonomy::Taxonomy,
    types::{generate_id, Item, Outcome, Receipt},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    receipts: Vec<Receipt>,
}

impl Ledger {
    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn get(&self, id: &str) -> Option<&Receipt> {
        self.receipts.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// Append a validated receipt, assigning an id when it has none.
    /// Returns the id the receipt was stored under.
    pub(crate) fn add(&mut self, mut receipt: Receipt, taxonomy: &Taxonomy) -> Result<String, EditError> {
        validate_receipt(&receipt, taxonomy)?;
        if receipt.id.trim().is_empty() {
            receipt.id = loop {
                let id = generate_id();
                if self.get(&id).is_none() {
                    break id;
                }
            };
        } else if self.get(&receipt.id).is_some() {
            return Err(EditError::DuplicateReceiptId(receipt.id));
        }
        let id = receipt.id.clone();
        self.receipts.push(receipt);
        Ok(id)
    }

    /// Replace the receipt with the same id, keeping its position.
    pub(crate) fn update(&mut self, receipt: Receipt, taxonomy: &Taxonomy) -> Result<Outcome, EditError> {
        let slot = self
            .receipts
            .iter_mut()
            .find(|r| r.id == receipt.id)
            .ok_or_else(|| EditError::ReceiptNotFound(receipt.id.clone()))?;
        validate_receipt(&receipt, taxonomy)?;
        if *slot == receipt {
            return Ok(Outcome::Unchanged);
        }
        *slot = receipt;
        Ok(Outcome::Applied)
    }

    pub(crate) fn delete(&mut self, id: &str) -> Outcome {
        let before = self.receipts.len();
        self.receipts.retain(|r| r.id != id);
        if self.receipts.len() == before {
            Outcome::Unchanged
        } else {
            Outcome::Applied
        }
    }

    /// Replace everything; used by remote apply, import and reset.
    ///
    /// Receipts without items are dropped and duplicate ids keep their first
    /// occurrence, so the ledger invariants hold whatever the source.
    pub(crate) fn replace(&mut self, receipts: Vec<Receipt>) {
        let mut seen = std::collections::HashSet::new();
        self.receipts = receipts
            .into_iter()
            .filter(|r| !r.items.is_empty())
            .map(|mut r| {
                if r.id.trim().is_empty() {
                    r.id = generate_id();
                }
                r
            })
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.receipts.iter_mut().flat_map(|r| r.items.iter_mut())
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.receipts.iter().flat_map(|r| r.items.iter())
    }

    // -----------------------------------------------------------------------
    // Usage counters
    // -----------------------------------------------------------------------

    pub fn category_usage(&self, category: &str) -> usize {
        self.items().filter(|i| i.category == category).count()
    }

    pub fn sub_category_usage(&self, category: &str, sub: &str) -> usize {
        self.items()
            .filter(|i| i.category == category && i.sub_category == sub)
            .count()
    }

    pub fn label_usage(&self, label: &str) -> usize {
        self.items().filter(|i| i.has_label(label)).count()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_receipt(receipt: &Receipt, taxonomy: &Taxonomy) -> Result<(), EditError> {
    if receipt.shop.trim().is_empty() {
        return Err(EditError::EmptyShop);
    }
    if receipt.items.is_empty() {
        return Err(EditError::EmptyReceipt);
    }
    if NaiveDate::parse_from_str(&receipt.date, "%Y-%m-%d").is_err() {
        return Err(EditError::InvalidDate(receipt.date.clone()));
    }
    if let Some(rate) = receipt.gst_rate {
        check_gst(rate)?;
    }
    for (index, item) in receipt.items.iter().enumerate() {
        validate_item(item, taxonomy).map_err(|reason| EditError::InvalidItem { index, reason })?;
        if let Some(rate) = item.gst_rate {
            check_gst(rate)?;
        }
    }
    Ok(())
}

fn validate_item(item: &Item, taxonomy: &Taxonomy) -> Result<(), String> {
    if item.name.trim().is_empty() {
        return Err("name must not be blank".to_string());
    }
    if !item.price.is_finite() || item.price < 0.0 {
        return Err(format!("price {} must be a non-negative number", item.price));
    }
    if !taxonomy.has_category(&item.category) {
        return Err(format!("category \"{}\" does not exist", item.category));
    }
    Ok(())
}

fn check_gst(rate: f64) -> Result<(), EditError> {
    if (0.0..=100.0).contains(&rate) {
        Ok(())
    } else {
        Err(EditError::InvalidGstRate(rate))
    }
}
