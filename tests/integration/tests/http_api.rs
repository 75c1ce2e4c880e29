//! Integration test: the HTTP surface over the real document and proof
//! pipeline.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use passid_core::{MultiAccountLimits, TreeParams, ZkProof};
use passid_document::DocumentVerifier;
use passid_integration_tests::{
    prove, registration_signals, sod, trust_store, FixedClock, RecordingIssuer, SOD_SHA256_ECDSA,
};
use passid_node::{
    build_router, AntiSybilEngine, AppState, ClaimLifecycleOrchestrator, MemoryClaimStore,
    PassportVerifier, RegistrationSettings, UniquenessService, WorkerPool, API_PREFIX,
};
use passid_proof::{CircuitInputs, CircuitProver, ProofError, ProofValidator, VerificationKeys};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Returns the tree root as the only public signal.
struct RootProver;

#[async_trait]
impl CircuitProver for RootProver {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<ZkProof, ProofError> {
        let (_, proof) = prove(&[passid_crypto::field_to_decimal(&inputs.root)]);
        Ok(proof)
    }
}

fn app() -> (axum::Router, Value) {
    let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
    let document = sod(SOD_SHA256_ECDSA);
    let documents = Arc::new(DocumentVerifier::new(trust_store()));
    let verified = documents.verify_at(&document, now).unwrap();
    let (key, proof) = prove(&registration_signals(
        verified.dg1_hash().unwrap(),
        now.date_naive(),
        30,
    ));

    let workers = WorkerPool::new(2);
    let store = Arc::new(MemoryClaimStore::new());
    let blinder = passid_crypto::parse_field("42").unwrap();
    let registration = ClaimLifecycleOrchestrator::new(
        store.clone(),
        Arc::new(RecordingIssuer::default()),
        Arc::new(PassportVerifier::new(
            documents,
            Arc::new(ProofValidator::new(
                VerificationKeys::new(key.clone(), key).unwrap(),
                18,
            )),
            workers.clone(),
        )),
        Arc::new(AntiSybilEngine::from_entropy(MultiAccountLimits::new(5, 5).unwrap())),
        workers.clone(),
        blinder,
        RegistrationSettings {
            issuer_did: "did:iden3:readonly:issuer".into(),
            timeout: std::time::Duration::from_secs(30),
            policy: Default::default(),
        },
    )
    .with_clock(Arc::new(FixedClock(now)));
    let uniqueness = UniquenessService::new(
        store,
        Arc::new(RootProver),
        workers,
        TreeParams::new(4, 2).unwrap(),
        blinder,
    );

    let body = json!({
        "data": {
            "id": "did:iden3:readonly:alice",
            "zkproof": proof,
            "document_sod": document,
        }
    });
    let router = build_router(Arc::new(AppState {
        registration: Arc::new(registration),
        uniqueness: Arc::new(uniqueness),
        gist: None,
        blinder,
    }));
    (router, body)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("{}/create-identity", API_PREFIX))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_create_identity_then_uniqueness_proof() {
    let (app, body) = app();

    let (status, created) = send(&app, post(&body)).await;
    assert_eq!(status, StatusCode::OK, "{}", created);
    assert_eq!(created["data"]["type"], "claims");
    assert_eq!(
        created["data"]["attributes"]["issuer_did"],
        "did:iden3:readonly:issuer"
    );

    let uri = format!("{}/uniqueness-proofs", API_PREFIX);
    let (status, listed) = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(
        listed["data"][0]["attributes"]["proof"]["pub_signals"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_tampered_document_is_bad_request() {
    let (app, mut body) = app();
    body["data"]["document_sod"]["algorithm"] = json!("SHA256withRSAandMGF1");

    let (status, error) = send(&app, post(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["errors"][0]["status"], "400");
}
