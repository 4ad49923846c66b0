/// Pricing Snapshot Models
///
/// A raw snapshot is what the proposal wizard submits: loosely validated line
/// items with their pricing breakdowns. A resolved snapshot is the same data
/// after supplier resolution and structural checks, with per-item and
/// aggregated preflight diagnostics. Resolved snapshots are what gets frozen
/// into a proposal version.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::mapping::{ErpEntityType, ObjectType};

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Hotel,
    Golf,
    Transfer,
    Extra,
    Package,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Hotel => "hotel",
            ServiceType::Golf => "golf",
            ServiceType::Transfer => "transfer",
            ServiceType::Extra => "extra",
            ServiceType::Package => "package",
        }
    }

    /// Extras are sold without a supplier of record; everything else must be
    /// booked against one.
    pub fn requires_supplier(&self) -> bool {
        !matches!(self, ServiceType::Extra)
    }

    /// Catalog object type a line of this service points at, when it has one.
    pub fn catalog_object_type(&self) -> Option<ObjectType> {
        match self {
            ServiceType::Hotel => Some(ObjectType::Hotel),
            ServiceType::Golf => Some(ObjectType::Course),
            _ => None,
        }
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hotel" => Ok(ServiceType::Hotel),
            "golf" => Ok(ServiceType::Golf),
            "transfer" => Ok(ServiceType::Transfer),
            "extra" => Ok(ServiceType::Extra),
            "package" => Ok(ServiceType::Package),
            other => Err(format!("unknown service type '{}'", other)),
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an item's supplier came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupplierSource {
    Manual,
    Override,
    Mapped,
    Generic,
}

impl SupplierSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierSource::Manual => "manual",
            SupplierSource::Override => "override",
            SupplierSource::Mapped => "mapped",
            SupplierSource::Generic => "generic",
        }
    }
}

impl FromStr for SupplierSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SupplierSource::Manual),
            "override" => Ok(SupplierSource::Override),
            "mapped" => Ok(SupplierSource::Mapped),
            "generic" => Ok(SupplierSource::Generic),
            other => Err(format!("unknown supplier source '{}'", other)),
        }
    }
}

/// One strategy tried while resolving a supplier, in the order attempted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStep {
    Manual,
    Override,
    Mapping,
    Generic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PricingBasis {
    #[default]
    PerRoom,
    PerPerson,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    #[default]
    Total,
    PerNight,
}

/// Diagnostic codes produced by the resolver and the preflight validator.
///
/// Resolver codes are upper case; codes emitted by the legacy per-item
/// preflight path keep their historical lower case spelling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    MissingDisplayName,
    MissingGreenFees,
    CountOutOfRange,
    MissingRoomPricing,
    MissingDoubleRooms,
    MissingSingleRooms,
    MissingDoublePricingBasis,
    MissingGiavTotal,
    InvalidStayDates,
    MissingNightlyRateRows,
    DuplicateNightlyRateDate,
    InvalidNightlyRateDate,
    ManualService,
    GenericSupplier,
    MissingSupplier,
    SupplierNameMissing,
    #[serde(rename = "manual_supplier")]
    LegacyManualSupplier,
    #[serde(rename = "missing_mapping")]
    LegacyMissingMapping,
    #[serde(rename = "generic_supplier")]
    LegacyGenericSupplier,
    #[serde(rename = "missing_supplier_for_manual_item")]
    MissingSupplierForManualItem,
}

// ============================================================================
// RAW SNAPSHOT (client submitted)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoomMode {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rooms: u32,
    #[serde(default)]
    pub basis: Option<PricingBasis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NightlyRate {
    /// Kept as text so unparseable dates surface as a diagnostic instead of a
    /// request rejection.
    pub date: String,
    #[serde(default)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HotelPricing {
    #[serde(default)]
    pub double: RoomMode,
    #[serde(default)]
    pub single: RoomMode,
    #[serde(default)]
    pub rate_mode: RateMode,
    #[serde(default)]
    pub nightly_rates: Vec<NightlyRate>,
}

impl HotelPricing {
    /// `None` when the counts do not fit in a `u32`.
    pub fn enabled_rooms(&self) -> Option<u32> {
        let double = if self.double.enabled { self.double.rooms } else { 0 };
        let single = if self.single.enabled { self.single.rooms } else { 0 };
        double.checked_add(single)
    }

    /// Guests implied by the room breakdown (two per double, one per single).
    pub fn occupancy(&self) -> Option<u32> {
        let double = if self.double.enabled { self.double.rooms.checked_mul(2)? } else { 0 };
        let single = if self.single.enabled { self.single.rooms } else { 0 };
        double.checked_add(single)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GolfPricing {
    #[serde(default)]
    pub green_fees_per_person: u32,
    #[serde(default)]
    pub players: u32,
}

/// Per-service pricing breakdown carried by a line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemPricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel: Option<HotelPricing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golf: Option<GolfPricing>,
}

/// Line fields that pass through resolution unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineDetails {
    pub service_type: ServiceType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub object_type: Option<ObjectType>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub pax: Option<u32>,
    #[serde(default)]
    pub line_cost: Decimal,
    #[serde(default)]
    pub total_sell: Decimal,
    #[serde(default)]
    pub pricing: ItemPricing,
}

impl LineDetails {
    /// Lines without a catalog reference were typed in by hand.
    pub fn is_manual(&self) -> bool {
        self.object_id.is_none()
    }

    pub fn catalog_key(&self) -> Option<(ObjectType, i64)> {
        let object_id = self.object_id?;
        let object_type = self
            .object_type
            .or_else(|| self.service_type.catalog_object_type())?;
        Some((object_type, object_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawItem {
    #[serde(flatten)]
    pub line: LineDetails,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub supplier_override: bool,
    #[serde(default)]
    pub erp_supplier_id: Option<i64>,
    #[serde(default)]
    pub erp_supplier_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotHeader {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub pax: Option<u32>,
    #[serde(default)]
    pub destination_country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawSnapshot {
    #[serde(flatten)]
    pub header: SnapshotHeader,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

// ============================================================================
// RESOLVED SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub code: IssueCode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dates: Vec<NaiveDate>,
}

impl Issue {
    pub fn new(code: IssueCode) -> Self {
        Self { code, dates: Vec::new() }
    }

    pub fn with_dates(code: IssueCode, dates: Vec<NaiveDate>) -> Self {
        Self { code, dates }
    }
}

/// A diagnostic attributed to a line, as reported at snapshot or version level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreflightIssue {
    pub index: usize,
    pub code: IssueCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dates: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,
}

impl PreflightIssue {
    pub fn new(index: usize, code: IssueCode) -> Self {
        Self {
            index,
            code,
            item_id: None,
            dates: Vec::new(),
            supplier_id: None,
            supplier_name: None,
        }
    }

    pub fn from_issue(index: usize, issue: &Issue) -> Self {
        Self {
            dates: issue.dates.clone(),
            ..Self::new(index, issue.code)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preflight {
    pub ok: bool,
    pub warnings: Vec<PreflightIssue>,
    pub blocking: Vec<PreflightIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Totals {
    pub sell: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedItem {
    #[serde(flatten)]
    pub line: LineDetails,
    pub display_name: Option<String>,
    pub erp_entity_type: Option<ErpEntityType>,
    pub erp_entity_id: Option<i64>,
    pub erp_supplier_id: Option<i64>,
    pub erp_supplier_name: Option<String>,
    pub supplier_source: Option<SupplierSource>,
    pub supplier_resolution_chain: Vec<ResolutionStep>,
    pub warnings: Vec<Issue>,
    pub blocking: Vec<Issue>,
    pub preflight_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_terms: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedSnapshot {
    #[serde(flatten)]
    pub header: SnapshotHeader,
    pub items: Vec<ResolvedItem>,
    pub totals: Totals,
    pub preflight: Preflight,
}

impl ResolvedSnapshot {
    pub fn has_blocking(&self) -> bool {
        !self.preflight.blocking.is_empty()
    }
}
