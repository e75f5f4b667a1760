//! Domain records exchanged with the rental backend.
//!
//! Entity schemas belong to the backend; records carry their `id` plus the
//! remaining attributes as an opaque JSON map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! entity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub id: String,
            #[serde(flatten)]
            pub attributes: Map<String, Value>,
        }

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self { id: id.into(), attributes: Map::new() }
            }

            pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
                self.attributes.insert(name.into(), value.into());
                self
            }

            pub fn attribute(&self, name: &str) -> Option<&Value> {
                self.attributes.get(name)
            }
        }
    };
}

entity!(Vehicle);
entity!(Customer);
entity!(Company);
entity!(Rental);

/// Paging metadata returned with list pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub has_more: bool,
    pub items_per_page: u32,
}

/// One page of records. The backend names the list after the resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    #[serde(alias = "vehicles", alias = "customers", alias = "companies", alias = "rentals")]
    pub items: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Filters for a paginated listing. Absent fields are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageQuery {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Any other backend filter (`brand`, `yearMin`, `dateFrom`, ...).
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Vehicle listing options. Only the default listing is cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleFilter {
    pub include_removed: bool,
    pub include_private: bool,
}

impl VehicleFilter {
    pub fn is_default(&self) -> bool {
        !self.include_removed && !self.include_private
    }
}

/// Everything the dashboard needs in one round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkData {
    pub vehicles: Vec<Vehicle>,
    pub rentals: Vec<Rental>,
    pub customers: Vec<Customer>,
    pub companies: Vec<Company>,
    pub insurers: Vec<Value>,
    pub expenses: Vec<Value>,
    pub insurances: Vec<Value>,
    pub settlements: Vec<Value>,
    pub vehicle_documents: Vec<Value>,
    pub insurance_claims: Vec<Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipRecord {
    pub id: String,
    pub owner_company_id: String,
    #[serde(default)]
    pub owner_company_name: Option<String>,
    pub valid_from: String,
    #[serde(default)]
    pub valid_to: Option<String>,
    #[serde(default)]
    pub transfer_reason: Option<String>,
    #[serde(default)]
    pub transfer_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleHistory {
    pub vehicle_id: String,
    #[serde(default)]
    pub vehicle: Option<Value>,
    #[serde(default)]
    pub history: Vec<OwnershipRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnershipHistory {
    pub vehicle_histories: Vec<VehicleHistory>,
    pub total_vehicles: u64,
    pub load_time_ms: Option<u64>,
}

/// Handover/return protocol presence for one rental.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolStatus {
    pub rental_id: String,
    pub has_handover_protocol: bool,
    pub has_return_protocol: bool,
    pub handover_protocol_id: Option<String>,
    pub return_protocol_id: Option<String>,
    pub handover_created_at: Option<String>,
    pub return_created_at: Option<String>,
}

/// Protocols recorded for a rental.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RentalProtocols {
    pub handover_protocols: Vec<Value>,
    pub return_protocols: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Handover,
    Return,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Handover => "handover",
            ProtocolKind::Return => "return",
        }
    }
}
