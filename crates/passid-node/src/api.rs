//! HTTP API server for the identity provider.
//!
//! Routes live under [`API_PREFIX`]; resources use JSON:API envelopes.

use ark_bn254::Fr;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, OriginalUri, Query, State},
    routing::{get, post},
    Json, Router,
};
use passid_core::{Did, DocumentSod, PageParams, ZkProof};
use passid_crypto::{document_nullifier, field_to_decimal};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::gist::{GistData, GistDataSource};
use crate::registration::{ClaimLifecycleOrchestrator, RegistrationRequest};
use crate::uniqueness::UniquenessService;

pub const API_PREFIX: &str = "/integrations/identity-provider-service/v1";

/// Shared handler state, built once at startup.
pub struct AppState {
    pub registration: Arc<ClaimLifecycleOrchestrator>,
    pub uniqueness: Arc<UniquenessService>,
    pub gist: Option<Arc<dyn GistDataSource>>,
    pub blinder: Fr,
}

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct CreateIdentityRequest {
    pub data: CreateIdentityData,
}

#[derive(Debug, Deserialize)]
pub struct CreateIdentityData {
    pub id: String,
    pub zkproof: ZkProof,
    pub document_sod: DocumentSod,
}

#[derive(Debug, Deserialize)]
pub struct DocumentNullifierQuery {
    pub dg2_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(rename = "page[number]")]
    pub number: Option<u64>,
    #[serde(rename = "page[limit]")]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GistQuery {
    pub user_did: Option<String>,
    pub block_number: Option<u64>,
}

// --- Response types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct Resource<A> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: A,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub current: String,
    pub next: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListDocument<T> {
    pub data: Vec<T>,
    pub links: Links,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimAttributes {
    pub claim_id: String,
    pub issuer_did: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NullifierAttributes {
    pub document_nullifier_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UniquenessProofAttributes {
    pub proof: ZkProof,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_create_identity(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateIdentityRequest>, JsonRejection>,
) -> Result<Json<Document<Resource<ClaimAttributes>>>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let did = Did::new(req.data.id).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let issued = state
        .registration
        .register(RegistrationRequest {
            did,
            proof: req.data.zkproof,
            document_sod: req.data.document_sod,
        })
        .await?;

    let claim_id = issued.claim_id.to_string();
    Ok(Json(Document {
        data: Resource {
            id: Some(claim_id.clone()),
            kind: "claims".into(),
            attributes: ClaimAttributes {
                claim_id,
                issuer_did: issued.issuer_did,
            },
        },
    }))
}

async fn handle_document_nullifier(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DocumentNullifierQuery>, QueryRejection>,
) -> Result<Json<Document<Resource<NullifierAttributes>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let dg2_hash = query
        .dg2_hash
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::bad_request("dg2_hash: cannot be blank"))?;
    let bytes = hex::decode(&dg2_hash)
        .map_err(|e| ApiError::bad_request(format!("dg2_hash: {}", e)))?;
    let nullifier = document_nullifier(&bytes, &state.blinder)
        .map_err(|e| ApiError::bad_request(format!("dg2_hash: {}", e)))?;

    Ok(Json(Document {
        data: Resource {
            id: None,
            kind: "nullifiers".into(),
            attributes: NullifierAttributes {
                document_nullifier_hash: field_to_decimal(&nullifier),
            },
        },
    }))
}

async fn handle_uniqueness_proofs(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ListDocument<Resource<UniquenessProofAttributes>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = PageParams::new(query.number, query.limit);

    let proofs = state.uniqueness.proofs(page).await?;
    let data = proofs
        .into_iter()
        .map(|p| Resource {
            id: None,
            kind: "uniqueness_proof".into(),
            attributes: UniquenessProofAttributes { proof: p.proof },
        })
        .collect();

    Ok(Json(ListDocument {
        data,
        links: Links {
            current: page_link(uri.path(), page),
            next: page_link(uri.path(), page.next()),
        },
    }))
}

async fn handle_gist_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<GistQuery>, QueryRejection>,
) -> Result<Json<Document<Resource<GistData>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let user_did = query
        .user_did
        .ok_or_else(|| ApiError::bad_request("user_did: cannot be blank"))?;
    let did = Did::new(user_did).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let source = state
        .gist
        .as_ref()
        .ok_or_else(|| ApiError::not_implemented("no GIST data source is configured"))?;
    let block_number = query.block_number.filter(|b| *b != 0);
    let gist = source.gist_data(&did, block_number).await?;

    if gist.gist_root != gist.gist_proof.root {
        tracing::warn!(
            gist_root = %gist.gist_root,
            gist_proof_root = %gist.gist_proof.root,
            "gist root does not match"
        );
    }

    Ok(Json(Document {
        data: Resource {
            id: Some(did.uri().to_string()),
            kind: "gist_datas".into(),
            attributes: gist,
        },
    }))
}

/// Offset pagination link with the query encoded as `url.Values` would.
fn page_link(path: &str, page: PageParams) -> String {
    format!(
        "{}?page%5Blimit%5D={}&page%5Bnumber%5D={}",
        path, page.limit, page.number
    )
}

// --- Server ---

pub fn build_router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/create-identity", post(handle_create_identity))
        .route("/document-nullifier", get(handle_document_nullifier))
        .route("/uniqueness-proofs", get(handle_uniqueness_proofs))
        .route("/gist-data", get(handle_gist_data));

    Router::new()
        .route("/health", get(handle_health))
        .nest(API_PREFIX, v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("HTTP API server stopped");
    Ok(())
}
