// JSON-RPC 2.0 client for the remote ERP
// API key authentication, transport timeout, and exponential backoff on
// 429/transport errors for read-only calls. Create and nest calls are sent
// exactly once.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ErpClientConfig;
use crate::services::erp::client::{
    Agent, CallTrace, CasePayload, CustomerPayload, ErpClient, ErpError, ErpResult, Provider,
    ReservationPayload,
};

const API_KEY_HEADER: &str = "X-Api-Key";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Result of a create call: either a bare integer or an object carrying the
/// operation's id field. Numeric strings are accepted in both positions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdResult {
    Bare(IdValue),
    Object(serde_json::Map<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Number(i64),
    Text(String),
}

impl IdValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            IdValue::Number(n) => Some(*n),
            IdValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl IdResult {
    fn extract(&self, id_field: &str) -> Option<i64> {
        let id = match self {
            IdResult::Bare(value) => value.as_i64(),
            IdResult::Object(map) => map
                .get(id_field)
                .cloned()
                .and_then(|v| serde_json::from_value::<IdValue>(v).ok())
                .and_then(|v| v.as_i64()),
        };
        id.filter(|id| *id > 0)
    }
}

#[derive(Debug, Deserialize)]
struct CustomerMatch {
    #[serde(alias = "customerId")]
    id: i64,
}

/// Remote operations and the id field each create call answers with.
struct Method {
    name: &'static str,
    id_field: &'static str,
    read_only: bool,
}

const SEARCH_CUSTOMER: Method = Method { name: "customer.search", id_field: "customerId", read_only: true };
const CREATE_CUSTOMER: Method = Method { name: "customer.create", id_field: "customerId", read_only: false };
const CREATE_CASE: Method = Method { name: "case.create", id_field: "caseId", read_only: false };
const CREATE_RESERVATION: Method = Method { name: "reservation.create", id_field: "reservationId", read_only: false };
const NEST_RESERVATION: Method = Method { name: "reservation.nest", id_field: "reservationId", read_only: false };
const GET_PROVIDER: Method = Method { name: "provider.get", id_field: "providerId", read_only: true };
const SEARCH_PROVIDERS: Method = Method { name: "provider.search", id_field: "providerId", read_only: true };
const GET_AGENT: Method = Method { name: "agent.get", id_field: "agentId", read_only: true };
const SEARCH_AGENTS: Method = Method { name: "agent.search", id_field: "agentId", read_only: true };

// ============================================================================
// Client
// ============================================================================

pub struct RpcErpClient {
    config: ErpClientConfig,
    http_client: Client,
    next_request_id: AtomicU64,
}

impl RpcErpClient {
    pub fn new(config: ErpClientConfig) -> ErpResult<Self> {
        config
            .validate()
            .map_err(|e| ErpError::Config(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ErpError::Config(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            next_request_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &Method, params: Value) -> ErpResult<T> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: request_id,
            method: method.name,
            params: &params,
        };

        tracing::debug!(operation = method.name, request_id, "Calling ERP");

        let request = self
            .http_client
            .post(&self.config.endpoint)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body);

        let response = if method.read_only {
            self.execute_with_retry(request, method.name).await?
        } else {
            request.send().await.map_err(|e| transport(method.name, e))?
        };

        let envelope = self.read_envelope(response, method.name, &params).await?;
        let result = unwrap_envelope(envelope, method.name, params)?;

        serde_json::from_value(result).map_err(|e| ErpError::Malformed {
            operation: method.name.to_string(),
            message: e.to_string(),
        })
    }

    async fn call_for_id(&self, method: &Method, params: Value) -> ErpResult<i64> {
        let result: Option<IdResult> = self.call(method, params).await?;
        let id = result
            .and_then(|r| r.extract(method.id_field))
            .ok_or_else(|| ErpError::MissingId {
                operation: method.name.to_string(),
            })?;

        tracing::info!(operation = method.name, id, "ERP record created");
        Ok(id)
    }

    async fn execute_with_retry(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> ErpResult<Response> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let req = request.try_clone().ok_or_else(|| ErpError::Transport {
                operation: operation.to_string(),
                message: "Failed to clone request for retry".to_string(),
            })?;

            match req.send().await {
                Ok(response) => {
                    if response.status() == StatusCode::TOO_MANY_REQUESTS
                        && attempts < self.config.max_retries
                    {
                        // Rate limited - exponential backoff
                        let delay = std::time::Duration::from_secs(2u64.pow(attempts));
                        tracing::warn!(operation, attempts, "ERP rate limited, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if attempts < self.config.max_retries => {
                    let delay = std::time::Duration::from_secs(2u64.pow(attempts));
                    tracing::warn!(operation, attempts, "ERP transport error, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(transport(operation, e)),
            }
        }
    }

    async fn read_envelope(
        &self,
        response: Response,
        operation: &str,
        params: &Value,
    ) -> ErpResult<RpcResponse> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ErpError::Remote {
                operation: operation.to_string(),
                message: format!("HTTP {}: {}", status, error_text),
                trace: Some(CallTrace {
                    method: operation.to_string(),
                    params: params.clone(),
                }),
            });
        }

        response.json().await.map_err(|e| ErpError::Malformed {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}

fn transport(operation: &str, e: reqwest::Error) -> ErpError {
    ErpError::Transport {
        operation: operation.to_string(),
        message: e.to_string(),
    }
}

fn unwrap_envelope(envelope: RpcResponse, operation: &str, params: Value) -> ErpResult<Value> {
    if let Some(error) = envelope.error {
        return Err(ErpError::Remote {
            operation: operation.to_string(),
            message: format!("{} (code {})", error.message, error.code),
            trace: Some(CallTrace {
                method: operation.to_string(),
                params,
            }),
        });
    }

    Ok(envelope.result.unwrap_or(Value::Null))
}

#[async_trait]
impl ErpClient for RpcErpClient {
    async fn search_customer_by_document(&self, document: &str) -> ErpResult<Option<i64>> {
        let matches: Option<Vec<CustomerMatch>> = self
            .call(&SEARCH_CUSTOMER, json!({ "document": document }))
            .await?;

        Ok(matches
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .find(|id| *id > 0))
    }

    async fn create_customer(&self, customer: &CustomerPayload) -> ErpResult<i64> {
        self.call_for_id(&CREATE_CUSTOMER, to_params(CREATE_CUSTOMER.name, customer)?)
            .await
    }

    async fn create_case(&self, case: &CasePayload) -> ErpResult<i64> {
        self.call_for_id(&CREATE_CASE, to_params(CREATE_CASE.name, case)?).await
    }

    async fn create_reservation(&self, reservation: &ReservationPayload) -> ErpResult<i64> {
        self.call_for_id(
            &CREATE_RESERVATION,
            to_params(CREATE_RESERVATION.name, reservation)?,
        )
        .await
    }

    async fn nest_reservation(&self, container_id: i64, reservation_id: i64) -> ErpResult<()> {
        let _: Value = self
            .call(
                &NEST_RESERVATION,
                json!({ "containerId": container_id, "reservationId": reservation_id }),
            )
            .await?;

        tracing::info!(container_id, reservation_id, "ERP reservation nested");
        Ok(())
    }

    async fn get_provider(&self, id: i64) -> ErpResult<Option<Provider>> {
        self.call(&GET_PROVIDER, json!({ "providerId": id })).await
    }

    async fn search_providers(&self, query: &str) -> ErpResult<Vec<Provider>> {
        let providers: Option<Vec<Provider>> =
            self.call(&SEARCH_PROVIDERS, json!({ "query": query })).await?;
        Ok(providers.unwrap_or_default())
    }

    async fn get_agent(&self, id: i64) -> ErpResult<Option<Agent>> {
        self.call(&GET_AGENT, json!({ "agentId": id })).await
    }

    async fn search_agents(&self, query: &str) -> ErpResult<Vec<Agent>> {
        let agents: Option<Vec<Agent>> = self.call(&SEARCH_AGENTS, json!({ "query": query })).await?;
        Ok(agents.unwrap_or_default())
    }
}

fn to_params<T: Serialize>(operation: &str, payload: &T) -> ErpResult<Value> {
    serde_json::to_value(payload).map_err(|e| ErpError::Malformed {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse_id(raw: Value, field: &str) -> Option<i64> {
        serde_json::from_value::<IdResult>(raw).ok()?.extract(field)
    }

    #[test]
    fn test_bare_integer_id() {
        assert_eq!(parse_id(json!(4512), "caseId"), Some(4512));
        assert_eq!(parse_id(json!("4512"), "caseId"), Some(4512));
    }

    #[test]
    fn test_object_id_uses_declared_field() {
        assert_eq!(parse_id(json!({"caseId": 88, "customerId": 12}), "caseId"), Some(88));
        assert_eq!(parse_id(json!({"reservationId": "901"}), "reservationId"), Some(901));
        assert_eq!(parse_id(json!({"id": 88}), "caseId"), None);
    }

    #[test]
    fn test_non_positive_ids_rejected() {
        assert_eq!(parse_id(json!(0), "caseId"), None);
        assert_eq!(parse_id(json!({"customerId": -3}), "customerId"), None);
    }

    #[test]
    fn test_error_envelope_carries_trace() {
        let envelope: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "Supplier is blocked"}
        }))
        .unwrap();

        let err = unwrap_envelope(envelope, "reservation.create", json!({"caseId": 7})).unwrap_err();

        assert!(err.to_string().contains("Supplier is blocked"));
        let trace = err.trace().unwrap();
        assert_eq!(trace.method, "reservation.create");
        assert_eq!(trace.params, json!({"caseId": 7}));
    }

    #[test]
    fn test_missing_result_is_null() {
        let envelope: RpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap();

        assert_eq!(unwrap_envelope(envelope, "reservation.nest", json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_config_validation() {
        let config = ErpClientConfig {
            endpoint: "".to_string(),
            api_key: "key".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        };

        assert!(matches!(RpcErpClient::new(config), Err(ErpError::Config(_))));
    }
}
