//! Document composition: merge the summarised orders of a bulk with the
//! country-keyed shipping rules into the SLI [`DocumentModel`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::summarise_line_items;
use crate::model::{AdditionalInfo, Address, Addresses, Bulk, DocumentModel, Order};

/// SME indicator stamped on every line item of the document.
pub const SME_INDICATOR: &str = "No";

/// Per-destination variables of the forwarder instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionVars {
    pub airport: String,
    pub importer: String,
    pub importer_phone: String,
}

/// Static business rules the composer resolves against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingRules {
    /// Name the forwarder is told to contact.
    pub shipper_name: String,
    /// US principal party in interest (the exporter).
    pub usppi: Address,
    pub intermediate_consignee: Address,
    /// Ultimate consignee by destination country code.
    pub consignees: HashMap<String, Address>,
    pub instructions: HashMap<String, InstructionVars>,
    /// Country whose instruction variables apply to unknown destinations.
    pub default_instruction_country: String,
}

impl Default for ShippingRules {
    fn default() -> Self {
        let ccl = Address {
            company: "CCL Logistics Ltd".into(),
            street_name: "Horton Road".into(),
            house_no: "Unit 5".into(),
            postcode: "SL3 0BB".into(),
            city: "Colnbrook".into(),
            country: "GB".into(),
        };
        let toll = Address {
            company: "TOLL Global Forwarding".into(),
            street_name: "Kent Road".into(),
            house_no: "207".into(),
            postcode: "2020".into(),
            city: "Mascot NSW".into(),
            country: "AU".into(),
        };

        let consignees = HashMap::from([("GB".to_string(), ccl), ("AU".to_string(), toll)]);
        let instructions = HashMap::from([
            (
                "GB".to_string(),
                InstructionVars {
                    airport: "Heathrow".into(),
                    importer: "CCL".into(),
                    importer_phone: "+44 208 231 0900".into(),
                },
            ),
            (
                "AU".to_string(),
                InstructionVars {
                    airport: "Sydney".into(),
                    importer: "Toll".into(),
                    importer_phone: "+61 2 9364 5555".into(),
                },
            ),
        ]);

        Self {
            shipper_name: "BorderGuru".into(),
            usppi: Address {
                company: "BorderGuru LLC".into(),
                street_name: "Broadway".into(),
                house_no: "1133".into(),
                postcode: "10010".into(),
                city: "New York, NY".into(),
                country: "US".into(),
            },
            intermediate_consignee: Address {
                company: "Direct".into(),
                ..Address::empty()
            },
            consignees,
            instructions,
            default_instruction_country: "GB".into(),
        }
    }
}

impl ShippingRules {
    /// Ultimate consignee for a destination; blank when the country is not mapped.
    pub fn consignee_for(&self, country_code: &str) -> Address {
        self.consignees
            .get(country_code)
            .cloned()
            .unwrap_or_else(Address::empty)
    }

    /// Instruction variables for a destination, falling back to the default country.
    pub fn instruction_vars_for(&self, country_code: &str) -> Option<&InstructionVars> {
        self.instructions.get(country_code).or_else(|| {
            debug!(
                country = country_code,
                fallback = %self.default_instruction_country,
                "No instruction variables for destination, using default"
            );
            self.instructions.get(&self.default_instruction_country)
        })
    }
}

/// Builds the document model for a bulk. Holds only immutable data, so one
/// composer can serve any number of bulks.
#[derive(Debug, Clone)]
pub struct Composer {
    rules: ShippingRules,
    customer_care_email: String,
}

impl Composer {
    pub fn new(rules: ShippingRules, customer_care_email: impl Into<String>) -> Self {
        Self {
            rules,
            customer_care_email: customer_care_email.into(),
        }
    }

    pub fn rules(&self) -> &ShippingRules {
        &self.rules
    }

    pub fn instruction_for(&self, country_code: &str) -> String {
        match self.rules.instruction_vars_for(country_code) {
            Some(vars) => format!(
                "In {}, {} is taking over this shipment: {}. \
                 In case of any questions or issues at any time of the transport please \
                 contact {} by email {}.",
                vars.airport,
                vars.importer,
                vars.importer_phone,
                self.rules.shipper_name,
                self.customer_care_email
            ),
            None => {
                warn!(country = country_code, "No instruction variables configured at all");
                String::new()
            }
        }
    }

    /// Compose the SLI document for `bulk` from its orders.
    pub fn compose(&self, orders: &[Order], bulk: &Bulk) -> DocumentModel {
        let destination = bulk.destination_country.as_str();
        let summary = summarise_line_items(orders, SME_INDICATOR);

        let additional_info = AdditionalInfo {
            mawb: bulk.mawb.clone().unwrap_or_default(),
            transport_mode: "Air".into(),
            service: String::new(),
            forwarding_agent: "APC Postal Logistics".into(),
            freight_terms: "Collect".into(),
            incoterms: "FAS".into(),
            ultimate_consignee_type: "Direct Consumer".into(),
            state_of_origin: "US".into(),
            in_bond_code: String::new(),
            usppi_reference: String::new(),
            country_of_ultimate_destination: destination.to_string(),
            entry_number: String::new(),
            routed_transaction: "No".into(),
            hazardous_material: "No".into(),
            ftz_identifier: String::new(),
            related_party_indicator: "Non-Related".into(),
            tib_temporary_export_carnet: "No".into(),
            shipping_weight_unit: "KG".into(),
            sme_indicator: SME_INDICATOR.into(),
            instructions_to_forwarder: self.instruction_for(destination),
            ddtc_applicant_registration_number: "n/a".into(),
            eligible_party_certification: "No".into(),
            insurance_requested: "No".into(),
            insurance_requested_value: String::new(),
            declared_value_for_carriage: summary.declared_value_for_carriage,
            usppi_contact_name: String::new(),
            signature: String::new(),
            usppi_email: String::new(),
            title: String::new(),
            date: String::new(),
            usppi_telephone: String::new(),
            ocean_freight_forwarding_service: String::new(),
            air_service_level: "Express".into(),
            origin: "US".into(),
        };

        debug!(
            bulk_id = %bulk.id,
            destination,
            line_items = summary.line_items.len(),
            declared_value = summary.declared_value_for_carriage,
            "Composed SLI document model"
        );

        DocumentModel {
            addresses: Addresses {
                usppi: self.rules.usppi.clone(),
                ultimate_consignee: self.rules.consignee_for(destination),
                intermediate_consignee: self.rules.intermediate_consignee.clone(),
            },
            additional_info,
            line_items: summary.line_items,
        }
    }
}
