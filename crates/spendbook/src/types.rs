use serde::{Deserialize, Serialize};

use crate::taxonomy::Taxonomy;

/// A single purchased line on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub name: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    /// Ordered, duplicate-free.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Percent, overrides the receipt-level rate.
    #[serde(
        default,
        rename = "gst",
        alias = "gstRate",
        skip_serializing_if = "Option::is_none"
    )]
    pub gst_rate: Option<f64>,
}

impl Item {
    pub fn new(name: impl Into<String>, price: f64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            category: category.into(),
            sub_category: String::new(),
            labels: Vec::new(),
            notes: None,
            gst_rate: None,
        }
    }

    pub fn with_sub_category(mut self, sub: impl Into<String>) -> Self {
        self.sub_category = sub.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            let label = label.into();
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
        self
    }

    pub fn with_gst_rate(mut self, rate: f64) -> Self {
        self.gst_rate = Some(rate);
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A receipt: one shop visit with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Blank means "not assigned yet"; `add_receipt` fills it in.
    #[serde(default)]
    pub id: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    pub shop: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_mode: Option<String>,
    #[serde(
        default,
        rename = "gst",
        alias = "gstRate",
        skip_serializing_if = "Option::is_none"
    )]
    pub gst_rate: Option<f64>,
}

impl Receipt {
    pub fn new(date: impl Into<String>, shop: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            date: date.into(),
            shop: shop.into(),
            items: Vec::new(),
            payment_mode: None,
            gst_rate: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_payment_mode(mut self, mode: impl Into<String>) -> Self {
        self.payment_mode = Some(mode.into());
        self
    }

    pub fn with_gst_rate(mut self, rate: f64) -> Self {
        self.gst_rate = Some(rate);
        self
    }

    /// Effective GST percent for `item`: item rate, then receipt rate, then zero.
    pub fn effective_gst_rate(&self, item: &Item) -> f64 {
        item.gst_rate.or(self.gst_rate).unwrap_or(0.0)
    }

    /// `YYYY-MM` prefix of the date, if the date is long enough to have one.
    pub fn month(&self) -> Option<&str> {
        self.date.get(..7).filter(|m| m.len() == 7)
    }
}

/// What a successful edit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and was persisted.
    Applied,
    /// The request was valid but there was nothing to do.
    Unchanged,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}

/// Read-only view of the whole session state handed to collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub receipts: Vec<Receipt>,
    pub category_data: Taxonomy,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty() && self.category_data == Taxonomy::default()
    }
}

/// The document exchanged with the remote store. Always written whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub receipts: Vec<Receipt>,
    pub category_data: Taxonomy,
    /// RFC 3339
    pub updated_at: String,
}

impl SyncSnapshot {
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            receipts: snapshot.receipts,
            category_data: snapshot.category_data,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Generate a fresh receipt id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
