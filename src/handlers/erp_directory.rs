use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    middleware::error_handling::{AppError, Result},
    services::erp::{Agent, Provider},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    #[serde(default)]
    pub q: String,
}

impl DirectoryQuery {
    fn term(&self) -> Result<&str> {
        let term = self.q.trim();
        if term.len() < 2 {
            return Err(AppError::BadRequest(
                "Search term must be at least 2 characters".to_string(),
            ));
        }
        Ok(term)
    }
}

pub async fn search_providers(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<Vec<Provider>>> {
    let providers = state.mappings.search_providers(query.term()?).await?;
    Ok(Json(providers))
}

pub async fn search_agents(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<Vec<Agent>>> {
    let agents = state.mappings.search_agents(query.term()?).await?;
    Ok(Json(agents))
}
