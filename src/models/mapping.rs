/// Supplier Mapping Models
///
/// Associates an internal catalog object (hotel, golf course) with the
/// supplier entity that represents it in the remote ERP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Hotel,
    Course,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Hotel => "hotel",
            ObjectType::Course => "course",
        }
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hotel" => Ok(ObjectType::Hotel),
            "course" => Ok(ObjectType::Course),
            other => Err(format!("unknown object type '{}'", other)),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    #[default]
    Active,
    NeedsReview,
    Deprecated,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Active => "active",
            MappingStatus::NeedsReview => "needs_review",
            MappingStatus::Deprecated => "deprecated",
        }
    }
}

impl FromStr for MappingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MappingStatus::Active),
            "needs_review" => Ok(MappingStatus::NeedsReview),
            "deprecated" => Ok(MappingStatus::Deprecated),
            other => Err(format!("unknown mapping status '{}'", other)),
        }
    }
}

/// How a mapping came to exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Manual,
    Exact,
    Fuzzy,
    Batch,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Manual => "manual",
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Batch => "batch",
        }
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(MatchType::Manual),
            "exact" => Ok(MatchType::Exact),
            "fuzzy" => Ok(MatchType::Fuzzy),
            "batch" => Ok(MatchType::Batch),
            other => Err(format!("unknown match type '{}'", other)),
        }
    }
}

/// Kind of remote entity a catalog object is mapped to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErpEntityType {
    #[default]
    Provider,
    Agent,
}

impl ErpEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErpEntityType::Provider => "provider",
            ErpEntityType::Agent => "agent",
        }
    }
}

impl FromStr for ErpEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider" => Ok(ErpEntityType::Provider),
            "agent" => Ok(ErpEntityType::Agent),
            other => Err(format!("unknown ERP entity type '{}'", other)),
        }
    }
}

// ============================================================================
// DATABASE MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplierMapping {
    pub object_type: ObjectType,
    pub object_id: i64,
    pub erp_entity_type: ErpEntityType,
    pub erp_entity_id: i64,
    pub erp_supplier_id: i64,
    pub erp_supplier_name: Option<String>,
    pub status: MappingStatus,
    pub match_type: MatchType,
    pub updated_at: DateTime<Utc>,
}

impl SupplierMapping {
    pub fn is_active(&self) -> bool {
        self.status == MappingStatus::Active
    }
}

// ============================================================================
// REQUEST MODELS
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertMappingRequest {
    pub object_type: ObjectType,
    #[validate(range(min = 1, message = "object_id must be positive"))]
    pub object_id: i64,
    #[serde(default)]
    pub erp_entity_type: ErpEntityType,
    pub erp_entity_id: Option<i64>,
    #[validate(range(min = 1, message = "erp_supplier_id must be positive"))]
    pub erp_supplier_id: i64,
    pub erp_supplier_name: Option<String>,
    #[serde(default)]
    pub status: MappingStatus,
    #[serde(default)]
    pub match_type: MatchType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchMappingRequest {
    #[validate(range(min = 1, message = "erp_supplier_id must be positive"))]
    pub erp_supplier_id: i64,
    pub erp_supplier_name: Option<String>,
    pub object_type: ObjectType,
    #[validate(length(min = 1, message = "At least one object id is required"))]
    pub object_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BatchMappingResponse {
    pub upserted: u64,
}
