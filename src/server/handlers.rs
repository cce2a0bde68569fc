//! Route handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

use fable_core::{GenerationRequest, Passage, PassageId, ProviderKind};

use super::error::ApiError;
use super::models::{
    FableResult, GenerateBody, GenerateResponse, HealthResponse, ModelsResponse, SearchBody,
    SearchResponse, WelcomeResponse,
};
use crate::app::AppContext;

type Ctx = State<Arc<AppContext>>;

/// `GET /`
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to Fable RAG API".to_string(),
        health: "/health".to_string(),
    })
}

/// `GET /health`
pub async fn health(State(ctx): Ctx) -> Result<Json<HealthResponse>, ApiError> {
    let engine = ctx.engine()?;
    let settings = engine.settings();

    let info = engine.collection_info().await.ok_or_else(|| {
        ApiError::unavailable(format!(
            "Collection '{}' does not exist, please run `fable ingest` first",
            settings.collection
        ))
    })?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        message: "System running normally".to_string(),
        collection_name: settings.collection.clone(),
        total_fables: info.points_count,
        llm_provider: settings.provider_summary(),
    }))
}

/// `GET /models`
pub async fn models(State(ctx): Ctx) -> Json<ModelsResponse> {
    let config = ctx.config();
    let ollama_models = if config.providers.contains(&ProviderKind::Ollama) {
        config.ollama_models.clone()
    } else {
        Vec::new()
    };

    Json(ModelsResponse {
        providers: config.providers.iter().map(|p| p.name().to_string()).collect(),
        default_provider: config.default_provider.name().to_string(),
        ollama_models,
    })
}

/// `POST /search`
pub async fn search(
    State(ctx): Ctx,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) = payload?;
    body.validate().map_err(ApiError::validation)?;

    let engine = ctx.engine()?;
    let results = engine
        .search(&body.query, body.limit, body.score_threshold)
        .await
        .map_err(|e| ApiError::with_operation(e, "Search"))?;

    let results: Vec<FableResult> = results.into_iter().map(FableResult::from).collect();
    Ok(Json(SearchResponse {
        query: body.query,
        total_results: results.len(),
        results,
    }))
}

/// `POST /generate`
pub async fn generate(
    State(ctx): Ctx,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = payload?;
    body.validate().map_err(ApiError::validation)?;

    let engine = ctx.engine()?;
    let mut request = GenerationRequest::new(body.query.clone(), body.limit);
    request.provider = body.provider;
    request.model = body.ollama_model;

    let response = engine
        .generate_answer(&request)
        .await
        .map_err(|e| ApiError::with_operation(e, "Generate"))?;
    info!(provider = %response.provider, sources = response.sources.len(), "answer generated");

    Ok(Json(GenerateResponse {
        query: body.query,
        answer: response.answer,
        sources: response.sources.into_iter().map(FableResult::from).collect(),
        llm_provider: response.provider,
    }))
}

/// `GET /fables/{id}`
pub async fn get_fable(
    State(ctx): Ctx,
    Path(id): Path<String>,
) -> Result<Json<Passage>, ApiError> {
    let engine = ctx.engine()?;
    let id: PassageId = match id.parse() {
        Ok(id) => id,
        Err(never) => match never {},
    };

    engine
        .get_passage(&id)
        .await
        .map(Json)
        .map_err(|e| ApiError::with_operation(e, "Get fable"))
}
