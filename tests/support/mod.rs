// In-memory collaborators for integration tests
// Stores mirror the PostgreSQL repositories' semantics (conditional pending
// mark, COALESCE-style id updates); the ERP mock counts calls per operation
// and can fail or pause selected operations.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use tripdesk::config::SyncConfig;
use tripdesk::middleware::error_handling::{AppError, Result};
use tripdesk::models::{
    ErpEntityType, ErpSyncStatus, ExternalIds, MappingStatus, MatchType, ObjectType, Proposal,
    ProposalStatus, ProposalVersion, RawSnapshot, SupplierMapping, SyncRecord, VersionItem,
};
use tripdesk::repositories::{MappingStore, ProposalStore, SyncRecordStore};
use tripdesk::services::erp::{
    Agent, CallTrace, CasePayload, CustomerPayload, ErpClient, ErpError, ErpResult,
    ErpSyncService, Provider, ReservationPayload,
};
use tripdesk::services::{NotificationSink, PreflightService, SyncErrorNotice};
use tripdesk::{AppState, Collaborators};

pub const DEFAULT_SUPPLIER_ID: i64 = 900;
pub const CUSTOMER_DOCUMENT: &str = "12345678Z";

// ============================================================================
// Proposal store
// ============================================================================

#[derive(Default)]
pub struct InMemoryProposalStore {
    proposals: Mutex<HashMap<Uuid, Proposal>>,
    versions: Mutex<HashMap<Uuid, ProposalVersion>>,
    items: Mutex<HashMap<Uuid, Vec<VersionItem>>>,
}

impl InMemoryProposalStore {
    pub fn insert_proposal(&self, proposal: Proposal) {
        self.proposals.lock().unwrap().insert(proposal.id, proposal);
    }

    pub fn get(&self, id: Uuid) -> Proposal {
        self.proposals.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn modify(&self, id: Uuid, change: impl FnOnce(&mut Proposal)) {
        let mut proposals = self.proposals.lock().unwrap();
        change(proposals.get_mut(&id).unwrap());
    }

    pub fn items(&self, version_id: Uuid) -> Vec<VersionItem> {
        self.items
            .lock()
            .unwrap()
            .get(&version_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProposalStore for InMemoryProposalStore {
    async fn find_proposal(&self, id: Uuid) -> Result<Option<Proposal>> {
        Ok(self.proposals.lock().unwrap().get(&id).cloned())
    }

    async fn find_version(&self, id: Uuid) -> Result<Option<ProposalVersion>> {
        Ok(self.versions.lock().unwrap().get(&id).cloned())
    }

    async fn list_version_items(&self, version_id: Uuid) -> Result<Vec<VersionItem>> {
        let mut items = self.items(version_id);
        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    async fn next_version_number(&self, proposal_id: Uuid) -> Result<i32> {
        let versions = self.versions.lock().unwrap();
        let max = versions
            .values()
            .filter(|v| v.proposal_id == proposal_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn insert_version(&self, version: &ProposalVersion, items: &[VersionItem]) -> Result<()> {
        let mut proposals = self.proposals.lock().unwrap();
        let proposal = proposals
            .get_mut(&version.proposal_id)
            .ok_or_else(|| AppError::NotFound("Proposal not found".to_string()))?;
        proposal.current_version_id = Some(version.id);

        self.versions.lock().unwrap().insert(version.id, version.clone());
        self.items.lock().unwrap().insert(version.id, items.to_vec());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: ProposalStatus) -> Result<()> {
        if let Some(p) = self.proposals.lock().unwrap().get_mut(&id) {
            p.status = status;
        }
        Ok(())
    }

    async fn set_accepted_version(&self, id: Uuid, version_id: Uuid) -> Result<()> {
        if let Some(p) = self.proposals.lock().unwrap().get_mut(&id) {
            p.accepted_version_id = Some(version_id);
            p.status = ProposalStatus::Accepted;
        }
        Ok(())
    }

    async fn try_mark_sync_pending(
        &self,
        id: Uuid,
        now: chrono::DateTime<Utc>,
        stale_before: chrono::DateTime<Utc>,
    ) -> Result<bool> {
        let mut proposals = self.proposals.lock().unwrap();
        let Some(p) = proposals.get_mut(&id) else {
            return Ok(false);
        };

        let stale = p.erp_sync_updated_at.map_or(true, |at| at < stale_before);
        if p.erp_sync_status == ErpSyncStatus::Pending && !stale {
            return Ok(false);
        }

        p.erp_sync_status = ErpSyncStatus::Pending;
        p.erp_sync_error = None;
        p.erp_sync_updated_at = Some(now);
        Ok(true)
    }

    async fn touch_sync_pending(&self, id: Uuid, now: chrono::DateTime<Utc>) -> Result<()> {
        if let Some(p) = self.proposals.lock().unwrap().get_mut(&id) {
            if p.erp_sync_status == ErpSyncStatus::Pending {
                p.erp_sync_updated_at = Some(now);
            }
        }
        Ok(())
    }

    async fn update_sync_status(
        &self,
        id: Uuid,
        status: ErpSyncStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        if let Some(p) = self.proposals.lock().unwrap().get_mut(&id) {
            p.erp_sync_status = status;
            p.erp_sync_error = error_message.map(str::to_string);
            p.erp_sync_updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_external_ids(&self, id: Uuid, ids: &ExternalIds) -> Result<()> {
        if let Some(p) = self.proposals.lock().unwrap().get_mut(&id) {
            p.erp_client_id = ids.client_id.or(p.erp_client_id);
            p.erp_case_id = ids.case_id.or(p.erp_case_id);
            p.erp_package_reservation_id =
                ids.package_reservation_id.or(p.erp_package_reservation_id);
        }
        Ok(())
    }
}

// ============================================================================
// Mapping and sync record stores
// ============================================================================

#[derive(Default)]
pub struct InMemoryMappingStore {
    rows: Mutex<HashMap<(ObjectType, i64), SupplierMapping>>,
}

impl InMemoryMappingStore {
    pub fn map(&self, object_type: ObjectType, object_id: i64, supplier_id: i64) {
        let mapping = SupplierMapping {
            object_type,
            object_id,
            erp_entity_type: ErpEntityType::Provider,
            erp_entity_id: supplier_id,
            erp_supplier_id: supplier_id,
            erp_supplier_name: Some(format!("Supplier {}", supplier_id)),
            status: MappingStatus::Active,
            match_type: MatchType::Manual,
            updated_at: Utc::now(),
        };
        self.rows
            .lock()
            .unwrap()
            .insert((object_type, object_id), mapping);
    }

    pub fn get(&self, object_type: ObjectType, object_id: i64) -> Option<SupplierMapping> {
        self.rows.lock().unwrap().get(&(object_type, object_id)).cloned()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn get_active_mapping(
        &self,
        object_type: ObjectType,
        object_id: i64,
    ) -> Result<Option<SupplierMapping>> {
        Ok(self.get(object_type, object_id).filter(|m| m.is_active()))
    }

    async fn upsert(&self, mapping: &SupplierMapping) -> Result<SupplierMapping> {
        self.rows
            .lock()
            .unwrap()
            .insert((mapping.object_type, mapping.object_id), mapping.clone());
        Ok(mapping.clone())
    }

    async fn batch_upsert(
        &self,
        supplier_id: i64,
        supplier_name: Option<&str>,
        object_type: ObjectType,
        object_ids: &[i64],
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        for object_id in object_ids {
            rows.insert(
                (object_type, *object_id),
                SupplierMapping {
                    object_type,
                    object_id: *object_id,
                    erp_entity_type: ErpEntityType::Provider,
                    erp_entity_id: supplier_id,
                    erp_supplier_id: supplier_id,
                    erp_supplier_name: supplier_name.map(str::to_string),
                    status: MappingStatus::Active,
                    match_type: MatchType::Batch,
                    updated_at: Utc::now(),
                },
            );
        }
        Ok(object_ids.len() as u64)
    }
}

#[derive(Default)]
pub struct InMemorySyncRecordStore {
    records: Mutex<Vec<SyncRecord>>,
}

impl InMemorySyncRecordStore {
    pub fn all(&self) -> Vec<SyncRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncRecordStore for InMemorySyncRecordStore {
    async fn get_by_item(
        &self,
        proposal_id: Uuid,
        version_id: Uuid,
        item_id: Option<Uuid>,
    ) -> Result<Option<SyncRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.proposal_id == proposal_id && r.version_id == version_id && r.item_id == item_id)
            .cloned())
    }

    async fn create(&self, record: &SyncRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| {
            r.proposal_id == record.proposal_id
                && r.version_id == record.version_id
                && r.item_id == record.item_id
        }) {
            return Err(AppError::Conflict("duplicate sync record".to_string()));
        }
        records.push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Notification sink
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<SyncErrorNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<SyncErrorNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify_sync_error(&self, notice: &SyncErrorNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

// ============================================================================
// ERP mock
// ============================================================================

/// Pauses the first call to an operation until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

pub struct MockErpClient {
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, u32>>,
    customers: Mutex<HashMap<String, i64>>,
    /// Customer registered by "someone else" when `customer.create` fails.
    racing_customer: Mutex<Option<i64>>,
    providers: Mutex<Vec<Provider>>,
    agents: Mutex<Vec<Agent>>,
    reservations: Mutex<Vec<(i64, ReservationPayload)>>,
    cases: Mutex<Vec<CasePayload>>,
    nested: Mutex<Vec<(i64, i64)>>,
    gates: Mutex<HashMap<&'static str, Arc<Gate>>>,
    next_id: AtomicI64,
}

impl Default for MockErpClient {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            customers: Mutex::new(HashMap::new()),
            racing_customer: Mutex::new(None),
            providers: Mutex::new(Vec::new()),
            agents: Mutex::new(Vec::new()),
            reservations: Mutex::new(Vec::new()),
            cases: Mutex::new(Vec::new()),
            nested: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1000),
        }
    }
}

impl MockErpClient {
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn fail_next(&self, operation: &'static str, times: u32) {
        self.failures.lock().unwrap().insert(operation, times);
    }

    pub fn add_customer(&self, document: &str, id: i64) {
        self.customers
            .lock()
            .unwrap()
            .insert(document.to_string(), id);
    }

    pub fn register_customer_on_failed_create(&self, id: i64) {
        *self.racing_customer.lock().unwrap() = Some(id);
    }

    pub fn add_provider(&self, id: i64, name: &str) {
        self.providers.lock().unwrap().push(Provider {
            id,
            name: name.to_string(),
            tax_id: None,
        });
    }

    pub fn add_agent(&self, id: i64, name: &str) {
        self.agents.lock().unwrap().push(Agent {
            id,
            name: name.to_string(),
            email: None,
        });
    }

    pub fn set_gate(&self, operation: &'static str, gate: Arc<Gate>) {
        self.gates.lock().unwrap().insert(operation, gate);
    }

    pub fn reservations(&self) -> Vec<(i64, ReservationPayload)> {
        self.reservations.lock().unwrap().clone()
    }

    pub fn cases(&self) -> Vec<CasePayload> {
        self.cases.lock().unwrap().clone()
    }

    pub fn nested(&self) -> Vec<(i64, i64)> {
        self.nested.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, params: Value) -> ErpResult<()> {
        self.calls.lock().unwrap().push(operation);

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ErpError::Remote {
                    operation: operation.to_string(),
                    message: "simulated failure".to_string(),
                    trace: Some(CallTrace {
                        method: operation.to_string(),
                        params,
                    }),
                });
            }
        }
        Ok(())
    }

    fn new_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn wait_at_gate(&self, operation: &'static str) {
        let gate = self.gates.lock().unwrap().remove(operation);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl ErpClient for MockErpClient {
    async fn search_customer_by_document(&self, document: &str) -> ErpResult<Option<i64>> {
        self.record("customer.search", json!({ "document": document }))?;
        Ok(self.customers.lock().unwrap().get(document).copied())
    }

    async fn create_customer(&self, customer: &CustomerPayload) -> ErpResult<i64> {
        self.wait_at_gate("customer.create").await;

        if let Err(e) = self.record("customer.create", json!({ "name": customer.name })) {
            let racing = *self.racing_customer.lock().unwrap();
            if let (Some(id), Some(document)) = (racing, customer.document.as_deref()) {
                self.add_customer(document, id);
            }
            return Err(e);
        }

        let id = self.new_id();
        if let Some(document) = customer.document.as_deref() {
            self.add_customer(document, id);
        }
        Ok(id)
    }

    async fn create_case(&self, case: &CasePayload) -> ErpResult<i64> {
        self.wait_at_gate("case.create").await;
        self.record("case.create", json!({ "customerId": case.customer_id }))?;
        self.cases.lock().unwrap().push(case.clone());
        Ok(self.new_id())
    }

    async fn create_reservation(&self, reservation: &ReservationPayload) -> ErpResult<i64> {
        self.record("reservation.create", json!({ "caseId": reservation.case_id }))?;
        let id = self.new_id();
        self.reservations
            .lock()
            .unwrap()
            .push((id, reservation.clone()));
        Ok(id)
    }

    async fn nest_reservation(&self, container_id: i64, reservation_id: i64) -> ErpResult<()> {
        self.record(
            "reservation.nest",
            json!({ "containerId": container_id, "reservationId": reservation_id }),
        )?;
        self.nested.lock().unwrap().push((container_id, reservation_id));
        Ok(())
    }

    async fn get_provider(&self, id: i64) -> ErpResult<Option<Provider>> {
        self.record("provider.get", json!({ "providerId": id }))?;
        Ok(self.providers.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn search_providers(&self, query: &str) -> ErpResult<Vec<Provider>> {
        self.record("provider.search", json!({ "query": query }))?;
        let query = query.to_lowercase();
        Ok(self
            .providers
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    async fn get_agent(&self, id: i64) -> ErpResult<Option<Agent>> {
        self.record("agent.get", json!({ "agentId": id }))?;
        Ok(self.agents.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn search_agents(&self, query: &str) -> ErpResult<Vec<Agent>> {
        self.record("agent.search", json!({ "query": query }))?;
        let query = query.to_lowercase();
        Ok(self
            .agents
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn draft_proposal() -> Proposal {
    let now = Utc::now();
    Proposal {
        id: Uuid::new_v4(),
        title: "Golf week in Marbella".to_string(),
        customer_name: "Ana Ruiz".to_string(),
        customer_email: Some("ana@example.com".to_string()),
        customer_phone: None,
        customer_document: Some(CUSTOMER_DOCUMENT.to_string()),
        destination_country: Some("ES".to_string()),
        start_date: Some(date(2024, 1, 1)),
        end_date: Some(date(2024, 1, 4)),
        pax: 4,
        currency: "EUR".to_string(),
        status: ProposalStatus::Draft,
        current_version_id: None,
        accepted_version_id: None,
        erp_client_id: None,
        erp_case_id: None,
        erp_package_reservation_id: None,
        erp_sync_status: ErpSyncStatus::None,
        erp_sync_error: None,
        erp_sync_updated_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Hotel 10 (mapped), golf course 5 (mapped) and a hand-typed transfer
/// with its own supplier.
pub fn sample_snapshot() -> Value {
    json!({
        "title": "Golf week in Marbella",
        "currency": "EUR",
        "start_date": "2024-01-01",
        "end_date": "2024-01-04",
        "pax": 4,
        "destination_country": "ES",
        "items": [
            {
                "service_type": "hotel",
                "display_name": "Hotel Fuerte Marbella",
                "object_id": 10,
                "start_date": "2024-01-01",
                "end_date": "2024-01-04",
                "line_cost": "900.00",
                "total_sell": "1100.00",
                "pricing": {"hotel": {
                    "double": {"enabled": true, "rooms": 2, "basis": "per_room"},
                    "rate_mode": "per_night",
                    "nightly_rates": [
                        {"date": "2024-01-01", "amount": "300.00"},
                        {"date": "2024-01-02", "amount": "300.00"},
                        {"date": "2024-01-03", "amount": "300.00"}
                    ]
                }}
            },
            {
                "service_type": "golf",
                "display_name": "Los Naranjos 18 holes",
                "object_id": 5,
                "start_date": "2024-01-02",
                "line_cost": "320.00",
                "total_sell": "400.00",
                "pricing": {"golf": {"green_fees_per_person": 2, "players": 4}}
            },
            {
                "service_type": "transfer",
                "display_name": "Airport transfer AGP",
                "pax": 4,
                "erp_supplier_id": 555,
                "erp_supplier_name": "Costa Transfers",
                "line_cost": "80.00",
                "total_sell": "100.00"
            }
        ]
    })
}

pub fn raw(value: Value) -> RawSnapshot {
    serde_json::from_value(value).unwrap()
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub proposals: Arc<InMemoryProposalStore>,
    pub mappings: Arc<InMemoryMappingStore>,
    pub records: Arc<InMemorySyncRecordStore>,
    pub erp: Arc<MockErpClient>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new() -> Self {
        let mut config = SyncConfig::default();
        config.default_supplier.id = DEFAULT_SUPPLIER_ID;
        config.default_supplier.name = "Generic Supplier".to_string();

        let mappings = Arc::new(InMemoryMappingStore::default());
        mappings.map(ObjectType::Hotel, 10, 4321);
        mappings.map(ObjectType::Course, 5, 3100);

        Self {
            proposals: Arc::new(InMemoryProposalStore::default()),
            mappings,
            records: Arc::new(InMemorySyncRecordStore::default()),
            erp: Arc::new(MockErpClient::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            config,
        }
    }

    pub fn without_container() -> Self {
        let mut harness = Self::new();
        harness.config.package_container = false;
        harness
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            Collaborators {
                proposals: self.proposals.clone(),
                mappings: self.mappings.clone(),
                sync_records: self.records.clone(),
                catalog: None,
                erp: self.erp.clone(),
                notifier: self.notifier.clone(),
            },
            self.config.clone(),
        )
    }

    pub fn sync_service(&self) -> ErpSyncService {
        let preflight = Arc::new(PreflightService::new(
            self.proposals.clone(),
            self.mappings.clone(),
            self.config.default_supplier.clone(),
        ));

        ErpSyncService::new(
            self.proposals.clone(),
            self.records.clone(),
            self.erp.clone(),
            self.notifier.clone(),
            preflight,
            self.config.clone(),
        )
    }

    /// Saves a version through the resolver and accepts it.
    pub async fn seed_accepted(&self, snapshot: Value) -> (Uuid, Uuid) {
        let proposal = draft_proposal();
        let proposal_id = proposal.id;
        self.proposals.insert_proposal(proposal);

        let state = self.state();
        let version = state
            .proposals
            .create_version(proposal_id, &raw(snapshot))
            .await
            .unwrap();
        state.proposals.accept(proposal_id, version.id).await.unwrap();

        (proposal_id, version.id)
    }

    /// An accepted proposal whose version predates the resolver: the stored
    /// snapshot has no diagnostics and only item rows are available.
    pub fn seed_legacy_accepted(&self, items: Vec<VersionItem>) -> (Uuid, Uuid) {
        let mut proposal = draft_proposal();
        let version_id = items.first().map(|i| i.version_id).unwrap_or_else(Uuid::new_v4);
        proposal.status = ProposalStatus::Accepted;
        proposal.accepted_version_id = Some(version_id);
        let proposal_id = proposal.id;
        self.proposals.insert_proposal(proposal);

        let version = ProposalVersion {
            id: version_id,
            proposal_id,
            version_number: 1,
            snapshot: json!({ "title": "Imported proposal" }),
            total_sell: items.iter().map(|i| i.total_sell).sum(),
            total_cost: items.iter().map(|i| i.line_cost).sum(),
            preflight_ok: true,
            public_token: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
        };
        self.proposals.versions.lock().unwrap().insert(version_id, version);
        self.proposals.items.lock().unwrap().insert(version_id, items);

        (proposal_id, version_id)
    }
}

pub fn legacy_item(
    version_id: Uuid,
    position: i32,
    service_type: tripdesk::models::ServiceType,
    object_id: Option<i64>,
    supplier_id: Option<i64>,
) -> VersionItem {
    VersionItem {
        id: Uuid::new_v4(),
        version_id,
        position,
        service_type,
        display_name: format!("Line {}", position),
        description: None,
        object_type: None,
        object_id,
        erp_supplier_id: supplier_id,
        erp_supplier_name: supplier_id.map(|id| format!("Supplier {}", id)),
        supplier_source: None,
        start_date: None,
        end_date: None,
        pax: 2,
        line_cost: rust_decimal::Decimal::new(10000, 2),
        total_sell: rust_decimal::Decimal::new(12000, 2),
        pricing: Default::default(),
    }
}
