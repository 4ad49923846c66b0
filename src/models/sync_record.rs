use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::snapshot::ServiceType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationKind {
    Package,
    Hotel,
    Golf,
    Transfer,
    Extra,
    Other,
}

impl ReservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationKind::Package => "package",
            ReservationKind::Hotel => "hotel",
            ReservationKind::Golf => "golf",
            ReservationKind::Transfer => "transfer",
            ReservationKind::Extra => "extra",
            ReservationKind::Other => "other",
        }
    }
}

impl From<ServiceType> for ReservationKind {
    fn from(service_type: ServiceType) -> Self {
        match service_type {
            ServiceType::Hotel => ReservationKind::Hotel,
            ServiceType::Golf => ReservationKind::Golf,
            ServiceType::Transfer => ReservationKind::Transfer,
            ServiceType::Extra => ReservationKind::Extra,
            ServiceType::Package => ReservationKind::Other,
        }
    }
}

impl FromStr for ReservationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "package" => Ok(ReservationKind::Package),
            "hotel" => Ok(ReservationKind::Hotel),
            "golf" => Ok(ReservationKind::Golf),
            "transfer" => Ok(ReservationKind::Transfer),
            "extra" => Ok(ReservationKind::Extra),
            "other" => Ok(ReservationKind::Other),
            other => Err(format!("unknown reservation kind '{}'", other)),
        }
    }
}

/// Ledger entry for a remote reservation that was fully created (and nested,
/// when a package container exists). `item_id = None` is the package
/// container itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRecord {
    pub proposal_id: Uuid,
    pub version_id: Uuid,
    pub item_id: Option<Uuid>,
    pub external_reservation_id: i64,
    pub reservation_kind: ReservationKind,
    pub supplier_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
