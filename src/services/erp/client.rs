// Remote ERP client contract
// Payloads, directory records and the error type shared by the JSON-RPC
// client and the synchronization orchestrator.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ReservationKind;
use crate::services::erp::destination::DestinationZone;

// ============================================================================
// Error Types
// ============================================================================

/// Method and parameters of a failed remote call, forwarded to the
/// notification sink.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallTrace {
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum ErpError {
    #[error("ERP transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("ERP call {operation} failed: {message}")]
    Remote {
        operation: String,
        message: String,
        trace: Option<CallTrace>,
    },

    #[error("Malformed ERP response for {operation}: {message}")]
    Malformed { operation: String, message: String },

    #[error("ERP call {operation} returned no usable identifier")]
    MissingId { operation: String },

    #[error("Invalid ERP client configuration: {0}")]
    Config(String),
}

impl ErpError {
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ErpError::Remote {
            operation: operation.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn trace(&self) -> Option<&CallTrace> {
        match self {
            ErpError::Remote { trace, .. } => trace.as_ref(),
            _ => None,
        }
    }
}

pub type ErpResult<T> = std::result::Result<T, ErpError>;

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document: Option<String>,
}

/// The remote trip file (expediente).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CasePayload {
    pub title: String,
    pub opening_date: NaiveDate,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub destination: DestinationZone,
    pub customer_id: i64,
    pub pax: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPayload {
    pub case_id: i64,
    pub kind: ReservationKind,
    pub supplier_id: Option<i64>,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub pax: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
    pub cost: Decimal,
    pub sell: Decimal,
    /// Required on package containers by the remote cost-nesting rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_margin_pct: Option<Decimal>,
}

// ============================================================================
// Directory records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

// ============================================================================
// Client trait
// ============================================================================

/// Operations the orchestrator and the admin surface need from the remote
/// ERP. Create and nest calls are not idempotent on the remote side.
#[async_trait]
pub trait ErpClient: Send + Sync {
    async fn search_customer_by_document(&self, document: &str) -> ErpResult<Option<i64>>;

    async fn create_customer(&self, customer: &CustomerPayload) -> ErpResult<i64>;

    async fn create_case(&self, case: &CasePayload) -> ErpResult<i64>;

    /// Creates a line or package container reservation depending on `kind`.
    async fn create_reservation(&self, reservation: &ReservationPayload) -> ErpResult<i64>;

    /// Links a cost-bearing reservation under a package container.
    async fn nest_reservation(&self, container_id: i64, reservation_id: i64) -> ErpResult<()>;

    async fn get_provider(&self, id: i64) -> ErpResult<Option<Provider>>;

    async fn search_providers(&self, query: &str) -> ErpResult<Vec<Provider>>;

    async fn get_agent(&self, id: i64) -> ErpResult<Option<Agent>>;

    async fn search_agents(&self, query: &str) -> ErpResult<Vec<Agent>>;
}
