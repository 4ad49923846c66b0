// ERP Integration Module
// Client contract, JSON-RPC transport, destination classification and the
// synchronization orchestrator.

pub mod client;
pub mod destination;
pub mod erp_sync_service;
pub mod rpc_client;

pub use client::{
    Agent, CallTrace, CasePayload, CustomerPayload, ErpClient, ErpError, ErpResult, Provider,
    ReservationPayload,
};
pub use destination::DestinationZone;
pub use erp_sync_service::{ErpSyncService, SyncError, SyncOutcome};
pub use rpc_client::RpcErpClient;
