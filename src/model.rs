//! Records read and written by the SLI pipeline.
//!
//! Bulk/order records keep the camelCase field names of the shipment store
//! they come from, so a bulk can be round-tripped through JSON unchanged.
//! The [`DocumentModel`] is what the HTML template sees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document types a bulk can carry files for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Utisli,
}

/// A file produced for a bulk and where it was stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFile {
    pub filename: Option<String>,
    /// Storage target marker; downstream config keys off this value.
    pub target: Option<String>,
    pub ref_collection: Option<String>,
    pub file_id: Option<String>,
}

/// References to the orders consolidated into a bulk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkContent {
    #[serde(default)]
    pub orders: Vec<String>,
}

/// A shipment batch consolidated into one export filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bulk {
    #[serde(rename = "_id")]
    pub id: String,
    pub destination_country: String,
    #[serde(default)]
    pub mawb: Option<String>,
    #[serde(default)]
    pub content: BulkContent,
    #[serde(default)]
    pub files: BTreeMap<DocumentType, BulkFile>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files_created: bool,
    #[serde(default)]
    pub files_created_at: Option<DateTime<Utc>>,
}

impl Bulk {
    pub fn new(id: impl Into<String>, destination_country: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            destination_country: destination_country.into(),
            mawb: None,
            content: BulkContent::default(),
            files: BTreeMap::new(),
            created_at: Some(Utc::now()),
            files_created: false,
            files_created_at: None,
        }
    }

    pub fn file(&self, doc_type: DocumentType) -> Option<&BulkFile> {
        self.files.get(&doc_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub bulk_id: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// A single order position. Numeric fields missing in the source are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(rename = "__v", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hs_code: Option<String>,
    #[serde(default)]
    pub country_of_origin: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub sme_indicator: Option<String>,
}

impl LineItem {
    pub fn extended_price(&self) -> f64 {
        self.price * self.quantity
    }

    pub fn extended_weight(&self) -> f64 {
        self.weight * self.quantity
    }
}

/// All line items of a bulk sharing one SKU, summed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedLineItem {
    pub sku: String,
    pub description: Option<String>,
    pub hs_code: Option<String>,
    pub country_of_origin: Option<String>,
    /// Exact sum of extended prices.
    pub price: f64,
    /// Price as printed on the document and counted in the declared value.
    pub rounded_price: i64,
    pub weight: f64,
    pub quantity: f64,
    pub sme_indicator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub street_name: String,
    #[serde(default)]
    pub house_no: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

impl Address {
    /// Blank address left for manual completion.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Addresses {
    pub usppi: Address,
    pub ultimate_consignee: Address,
    pub intermediate_consignee: Address,
}

/// Customs-declaration fields of the SLI form. Most are fixed business
/// defaults; empty strings are left for manual completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInfo {
    pub mawb: String,
    pub transport_mode: String,
    pub service: String,
    pub forwarding_agent: String,
    pub freight_terms: String,
    pub incoterms: String,
    pub ultimate_consignee_type: String,
    pub state_of_origin: String,
    pub in_bond_code: String,
    pub usppi_reference: String,
    pub country_of_ultimate_destination: String,
    pub entry_number: String,
    pub routed_transaction: String,
    pub hazardous_material: String,
    pub ftz_identifier: String,
    pub related_party_indicator: String,
    pub tib_temporary_export_carnet: String,
    pub shipping_weight_unit: String,
    pub sme_indicator: String,
    pub instructions_to_forwarder: String,
    pub ddtc_applicant_registration_number: String,
    pub eligible_party_certification: String,
    pub insurance_requested: String,
    pub insurance_requested_value: String,
    /// Sum of every composed line item's rounded price.
    pub declared_value_for_carriage: i64,
    pub usppi_contact_name: String,
    pub signature: String,
    pub usppi_email: String,
    pub title: String,
    pub date: String,
    pub usppi_telephone: String,
    pub ocean_freight_forwarding_service: String,
    pub air_service_level: String,
    pub origin: String,
}

/// Full rendering context for the SLI template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentModel {
    pub addresses: Addresses,
    pub additional_info: AdditionalInfo,
    pub line_items: Vec<ComposedLineItem>,
}

impl DocumentModel {
    pub fn declared_value(&self) -> i64 {
        self.additional_info.declared_value_for_carriage
    }
}
