/// Preflight Service
///
/// Decides whether a persisted version may proceed to synchronization.
/// Versions saved through the snapshot resolver are re-aggregated from their
/// stored diagnostics; older versions are re-checked from their item rows
/// and the mapping table.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::DefaultSupplier;
use crate::middleware::error_handling::{AppError, Result};
use crate::models::{IssueCode, PreflightIssue, ProposalVersion, ResolvedSnapshot, VersionItem};
use crate::repositories::{MappingStore, ProposalStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PreflightPath {
    Snapshot,
    Legacy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreflightReport {
    pub version_id: Uuid,
    pub ok: bool,
    pub warnings: Vec<PreflightIssue>,
    pub blocking: Vec<PreflightIssue>,
    pub path: PreflightPath,
}

pub struct PreflightService {
    proposals: Arc<dyn ProposalStore>,
    mappings: Arc<dyn MappingStore>,
    default_supplier: DefaultSupplier,
}

impl PreflightService {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        mappings: Arc<dyn MappingStore>,
        default_supplier: DefaultSupplier,
    ) -> Self {
        Self {
            proposals,
            mappings,
            default_supplier,
        }
    }

    pub async fn check_version(&self, version_id: Uuid) -> Result<PreflightReport> {
        let version = self
            .proposals
            .find_version(version_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Version {} not found", version_id)))?;

        let report = match resolved_snapshot(&version) {
            Some(snapshot) => Self::from_snapshot(version_id, &snapshot),
            None => {
                let items = self.proposals.list_version_items(version_id).await?;
                self.from_items(version_id, &items).await?
            }
        };

        tracing::info!(
            version_id = %version_id,
            path = ?report.path,
            ok = report.ok,
            warnings = report.warnings.len(),
            blocking = report.blocking.len(),
            "Preflight checked"
        );

        Ok(report)
    }

    fn from_snapshot(version_id: Uuid, snapshot: &ResolvedSnapshot) -> PreflightReport {
        let mut warnings = Vec::new();
        let mut blocking = Vec::new();

        for (index, item) in snapshot.items.iter().enumerate() {
            warnings.extend(item.warnings.iter().map(|w| PreflightIssue::from_issue(index, w)));
            blocking.extend(item.blocking.iter().map(|b| PreflightIssue::from_issue(index, b)));
        }

        PreflightReport {
            version_id,
            ok: blocking.is_empty(),
            warnings,
            blocking,
            path: PreflightPath::Snapshot,
        }
    }

    /// Only a hand-typed line with no supplier at all blocks here.
    async fn from_items(&self, version_id: Uuid, items: &[VersionItem]) -> Result<PreflightReport> {
        let mut warnings = Vec::new();
        let mut blocking = Vec::new();

        for (index, item) in items.iter().enumerate() {
            if !item.service_type.requires_supplier() {
                continue;
            }

            let issue = |code: IssueCode| PreflightIssue {
                item_id: Some(item.id),
                ..PreflightIssue::new(index, code)
            };

            match item.catalog_key() {
                None => match item.erp_supplier_id.filter(|id| *id > 0) {
                    Some(supplier_id) => warnings.push(PreflightIssue {
                        supplier_id: Some(supplier_id),
                        supplier_name: item.erp_supplier_name.clone(),
                        ..issue(IssueCode::LegacyManualSupplier)
                    }),
                    None => blocking.push(issue(IssueCode::MissingSupplierForManualItem)),
                },
                Some((object_type, object_id)) => {
                    match self.mappings.get_active_mapping(object_type, object_id).await? {
                        None => warnings.push(PreflightIssue {
                            supplier_id: Some(self.default_supplier.id),
                            supplier_name: Some(self.default_supplier.name.clone()),
                            ..issue(IssueCode::LegacyMissingMapping)
                        }),
                        Some(mapping) if mapping.erp_supplier_id == self.default_supplier.id => {
                            warnings.push(PreflightIssue {
                                supplier_id: Some(mapping.erp_supplier_id),
                                supplier_name: mapping.erp_supplier_name.clone(),
                                ..issue(IssueCode::LegacyGenericSupplier)
                            })
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        Ok(PreflightReport {
            version_id,
            ok: blocking.is_empty(),
            warnings,
            blocking,
            path: PreflightPath::Legacy,
        })
    }
}

/// A snapshot qualifies for the fast path only when every item carries the
/// resolver's diagnostic markers.
fn resolved_snapshot(version: &ProposalVersion) -> Option<ResolvedSnapshot> {
    serde_json::from_value::<ResolvedSnapshot>(version.snapshot.clone())
        .ok()
        .filter(|snapshot| !snapshot.items.is_empty())
}
