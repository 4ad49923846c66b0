/// Snapshot Resolver
///
/// Turns a raw pricing snapshot into a resolved one:
/// - normalizes display names
/// - runs structural checks per service type (room pricing, nightly rates,
///   green fees)
/// - resolves each line's supplier through the fallback chain
///   manual → override → catalog mapping → generic default
/// - aggregates per-item diagnostics into the snapshot preflight block
///
/// For identical input and mapping-table state the output is identical: no
/// remote calls, no randomness, no clock reads.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::DefaultSupplier;
use crate::middleware::error_handling::Result;
use crate::models::{
    ErpEntityType, GolfPricing, HotelPricing, Issue, IssueCode, Preflight, PreflightIssue,
    RateMode, RawItem, RawSnapshot, ResolutionStep, ResolvedItem, ResolvedSnapshot, ServiceType,
    SupplierSource, Totals,
};
use crate::repositories::{CatalogMetadata, CatalogStore, MappingStore};

/// Identifies the proposal/version a resolution runs for (logging only).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext {
    pub proposal_id: Option<Uuid>,
    pub version_number: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveOutcome {
    pub snapshot: ResolvedSnapshot,
    /// Blocking issues only. Non-empty means the snapshot must not be persisted.
    pub errors: Vec<PreflightIssue>,
}

impl ResolveOutcome {
    pub fn is_blocked(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SupplierResolution {
    source: Option<SupplierSource>,
    supplier_id: Option<i64>,
    supplier_name: Option<String>,
    entity_type: Option<ErpEntityType>,
    entity_id: Option<i64>,
    chain: Vec<ResolutionStep>,
}

impl SupplierResolution {
    fn unresolved(chain: Vec<ResolutionStep>) -> Self {
        Self {
            source: None,
            supplier_id: None,
            supplier_name: None,
            entity_type: None,
            entity_id: None,
            chain,
        }
    }

    fn provider(
        source: SupplierSource,
        supplier_id: i64,
        supplier_name: Option<String>,
        chain: Vec<ResolutionStep>,
    ) -> Self {
        Self {
            source: Some(source),
            supplier_id: Some(supplier_id),
            supplier_name,
            entity_type: Some(ErpEntityType::Provider),
            entity_id: Some(supplier_id),
            chain,
        }
    }
}

pub struct SnapshotResolver {
    mappings: Arc<dyn MappingStore>,
    catalog: Option<Arc<dyn CatalogStore>>,
    default_supplier: DefaultSupplier,
}

impl SnapshotResolver {
    pub fn new(mappings: Arc<dyn MappingStore>, default_supplier: DefaultSupplier) -> Self {
        Self {
            mappings,
            catalog: None,
            default_supplier,
        }
    }

    /// Enables best-effort metadata enrichment (image, cancellation terms).
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn default_supplier(&self) -> &DefaultSupplier {
        &self.default_supplier
    }

    pub async fn resolve(&self, raw: &RawSnapshot, ctx: &ResolveContext) -> Result<ResolveOutcome> {
        let mut items = Vec::with_capacity(raw.items.len());
        for item in &raw.items {
            items.push(self.resolve_item(item).await?);
        }

        let mut preflight = Preflight {
            ok: true,
            warnings: Vec::new(),
            blocking: Vec::new(),
        };
        let mut totals = Totals {
            sell: Decimal::ZERO,
            cost: Decimal::ZERO,
        };

        for (index, item) in items.iter().enumerate() {
            preflight.ok &= item.preflight_ok;
            preflight
                .warnings
                .extend(item.warnings.iter().map(|w| PreflightIssue::from_issue(index, w)));
            preflight
                .blocking
                .extend(item.blocking.iter().map(|b| PreflightIssue::from_issue(index, b)));
            totals.sell += item.line.total_sell;
            totals.cost += item.line.line_cost;
        }

        let errors = preflight.blocking.clone();

        tracing::info!(
            proposal_id = ?ctx.proposal_id,
            version_number = ?ctx.version_number,
            items = items.len(),
            warnings = preflight.warnings.len(),
            blocking = preflight.blocking.len(),
            "Snapshot resolved"
        );

        Ok(ResolveOutcome {
            snapshot: ResolvedSnapshot {
                header: raw.header.clone(),
                items,
                totals,
                preflight,
            },
            errors,
        })
    }

    async fn resolve_item(&self, item: &RawItem) -> Result<ResolvedItem> {
        let mut warnings = Vec::new();
        let mut blocking = Vec::new();

        // 1. Display name
        let display_name = non_blank(item.display_name.as_deref())
            .or_else(|| non_blank(item.title.as_deref()));
        if display_name.is_none() {
            blocking.push(Issue::new(IssueCode::MissingDisplayName));
        }

        // 2. Structural checks
        match item.line.service_type {
            ServiceType::Golf => {
                check_golf(item.line.pricing.golf.as_ref(), &mut blocking);
            }
            ServiceType::Hotel => {
                let default_pricing = HotelPricing::default();
                let pricing = item.line.pricing.hotel.as_ref().unwrap_or(&default_pricing);
                check_hotel(item, pricing, &mut blocking);
            }
            _ => {}
        }

        // 3. Supplier resolution
        let supplier = self.resolve_supplier(item, &mut warnings).await?;
        if item.line.service_type.requires_supplier() && supplier.supplier_id.is_none() {
            blocking.push(Issue::new(IssueCode::MissingSupplier));
        }
        if supplier.supplier_id.is_some() && supplier.supplier_name.is_none() {
            warnings.push(Issue::new(IssueCode::SupplierNameMissing));
        }

        let metadata = self.enrich(item).await.unwrap_or_default();

        Ok(ResolvedItem {
            line: item.line.clone(),
            display_name,
            erp_entity_type: supplier.entity_type,
            erp_entity_id: supplier.entity_id,
            erp_supplier_id: supplier.supplier_id,
            erp_supplier_name: supplier.supplier_name,
            supplier_source: supplier.source,
            supplier_resolution_chain: supplier.chain,
            preflight_ok: blocking.is_empty(),
            warnings,
            blocking,
            image_url: metadata.image_url,
            cancellation_terms: metadata.cancellation_terms,
        })
    }

    /// First satisfied branch wins.
    async fn resolve_supplier(
        &self,
        item: &RawItem,
        warnings: &mut Vec<Issue>,
    ) -> Result<SupplierResolution> {
        let requires_supplier = item.line.service_type.requires_supplier();
        let explicit_id = item.erp_supplier_id.filter(|id| *id > 0);
        let explicit_name = non_blank(item.erp_supplier_name.as_deref());
        let mut chain = Vec::new();

        if item.line.is_manual() {
            chain.push(ResolutionStep::Manual);
            if let Some(id) = explicit_id {
                return Ok(SupplierResolution::provider(
                    SupplierSource::Manual,
                    id,
                    explicit_name,
                    chain,
                ));
            }
            if requires_supplier {
                chain.push(ResolutionStep::Generic);
                warnings.push(Issue::new(IssueCode::ManualService));
                return Ok(self.generic(chain));
            }
            return Ok(SupplierResolution::unresolved(chain));
        }

        if item.supplier_override {
            chain.push(ResolutionStep::Override);
            if let Some(id) = explicit_id {
                return Ok(SupplierResolution::provider(
                    SupplierSource::Override,
                    id,
                    explicit_name,
                    chain,
                ));
            }
        }

        if let Some((object_type, object_id)) = item.line.catalog_key() {
            chain.push(ResolutionStep::Mapping);
            if let Some(mapping) = self.mappings.get_active_mapping(object_type, object_id).await? {
                if mapping.erp_supplier_id == self.default_supplier.id {
                    warnings.push(Issue::new(IssueCode::GenericSupplier));
                }
                return Ok(SupplierResolution {
                    source: Some(SupplierSource::Mapped),
                    supplier_id: Some(mapping.erp_supplier_id),
                    supplier_name: non_blank(mapping.erp_supplier_name.as_deref()),
                    entity_type: Some(mapping.erp_entity_type),
                    entity_id: Some(mapping.erp_entity_id),
                    chain,
                });
            }
        }

        if requires_supplier {
            chain.push(ResolutionStep::Generic);
            warnings.push(Issue::new(IssueCode::GenericSupplier));
            return Ok(self.generic(chain));
        }

        Ok(SupplierResolution::unresolved(chain))
    }

    fn generic(&self, chain: Vec<ResolutionStep>) -> SupplierResolution {
        SupplierResolution::provider(
            SupplierSource::Generic,
            self.default_supplier.id,
            non_blank(Some(self.default_supplier.name.as_str())),
            chain,
        )
    }

    /// Cosmetic only: any failure yields no metadata.
    async fn enrich(&self, item: &RawItem) -> Option<CatalogMetadata> {
        let catalog = self.catalog.as_ref()?;
        let (object_type, object_id) = item.line.catalog_key()?;

        match catalog.get_metadata(object_type, object_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("Catalog enrichment skipped for {} {}: {}", object_type, object_id, e);
                None
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Upper bound for rooms, players and green fees on a single line.
const MAX_BOOKABLE_COUNT: u32 = 999;

fn check_golf(pricing: Option<&GolfPricing>, blocking: &mut Vec<Issue>) {
    if pricing.map_or(0, |p| p.green_fees_per_person) < 1 {
        blocking.push(Issue::new(IssueCode::MissingGreenFees));
    }

    if let Some(pricing) = pricing {
        if pricing.players > MAX_BOOKABLE_COUNT
            || pricing.green_fees_per_person > MAX_BOOKABLE_COUNT
        {
            blocking.push(Issue::new(IssueCode::CountOutOfRange));
        }
    }
}

fn check_hotel(item: &RawItem, pricing: &HotelPricing, blocking: &mut Vec<Issue>) {
    if !pricing.double.enabled && !pricing.single.enabled {
        blocking.push(Issue::new(IssueCode::MissingRoomPricing));
    }

    if pricing.double.enabled {
        if pricing.double.rooms < 1 {
            blocking.push(Issue::new(IssueCode::MissingDoubleRooms));
        }
        if pricing.double.basis.is_none() {
            blocking.push(Issue::new(IssueCode::MissingDoublePricingBasis));
        }
    }

    if pricing.single.enabled && pricing.single.rooms < 1 {
        blocking.push(Issue::new(IssueCode::MissingSingleRooms));
    }

    if pricing.double.rooms > MAX_BOOKABLE_COUNT || pricing.single.rooms > MAX_BOOKABLE_COUNT {
        blocking.push(Issue::new(IssueCode::CountOutOfRange));
    }

    if item.line.total_sell.is_zero() {
        blocking.push(Issue::new(IssueCode::MissingGiavTotal));
    }

    if pricing.rate_mode == RateMode::PerNight {
        check_nightly_rates(item.line.start_date, item.line.end_date, pricing, blocking);
    }
}

/// Every night in `[start, end)` needs exactly one rate row.
fn check_nightly_rates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    pricing: &HotelPricing,
    blocking: &mut Vec<Issue>,
) {
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => {
            blocking.push(Issue::new(IssueCode::InvalidStayDates));
            return;
        }
    };

    let nights: BTreeSet<NaiveDate> = start.iter_days().take_while(|day| *day < end).collect();
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    let mut out_of_range = BTreeSet::new();
    let mut unparseable = false;

    for rate in &pricing.nightly_rates {
        match NaiveDate::parse_from_str(rate.date.trim(), "%Y-%m-%d") {
            Ok(date) if nights.contains(&date) => {
                if !seen.insert(date) {
                    duplicates.insert(date);
                }
            }
            Ok(date) => {
                out_of_range.insert(date);
            }
            Err(_) => unparseable = true,
        }
    }

    let missing: Vec<NaiveDate> = nights.difference(&seen).copied().collect();
    if !missing.is_empty() {
        blocking.push(Issue::with_dates(IssueCode::MissingNightlyRateRows, missing));
    }
    if !duplicates.is_empty() {
        blocking.push(Issue::with_dates(
            IssueCode::DuplicateNightlyRateDate,
            duplicates.into_iter().collect(),
        ));
    }
    if !out_of_range.is_empty() || unparseable {
        blocking.push(Issue::with_dates(
            IssueCode::InvalidNightlyRateDate,
            out_of_range.into_iter().collect(),
        ));
    }
}
