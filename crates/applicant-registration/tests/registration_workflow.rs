use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use applicant_registration::config::{ApiConfig, FormConfig};
use applicant_registration::workflows::registration::{
    AttachmentSlot, Field, FileHandle, GatewayError, HttpRegistryClient, JsonFileSessionStore,
    RegistrationError, RegistrationSequencer, SchemaRevision, Step, VerificationOutcome,
};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

const RECEIPT: &[u8] = b"%PDF-1.4 comprobante de registro";
const REGISTERED_ID: &str = "5555555";
const FAILING_ID: &str = "9999";

#[derive(Debug, Clone, Copy)]
enum Reply {
    Link,
    Pdf,
    Html,
    Declined,
}

#[derive(Debug, Clone)]
struct CapturedPost {
    content_type: String,
    body: String,
}

struct MockRegistry {
    reply: Reply,
    lookups: Mutex<Vec<HashMap<String, String>>>,
    posts: Mutex<Vec<CapturedPost>>,
}

impl MockRegistry {
    fn lookups(&self) -> Vec<HashMap<String, String>> {
        self.lookups.lock().expect("registry mutex poisoned").clone()
    }

    fn posts(&self) -> Vec<CapturedPost> {
        self.posts.lock().expect("registry mutex poisoned").clone()
    }
}

async fn exists(
    State(registry): State<Arc<MockRegistry>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let national_id = params.get("cedula_identidad").cloned().unwrap_or_default();
    registry
        .lookups
        .lock()
        .expect("registry mutex poisoned")
        .push(params);
    if national_id == FAILING_ID {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({ "success": true, "existe": national_id == REGISTERED_ID })).into_response()
}

async fn register(
    State(registry): State<Arc<MockRegistry>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    registry
        .posts
        .lock()
        .expect("registry mutex poisoned")
        .push(CapturedPost {
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
        });

    match registry.reply {
        Reply::Link => Json(json!({
            "success": true,
            "pdfUrl": "/storage/comprobantes/comprobante.pdf"
        }))
        .into_response(),
        Reply::Pdf => ([(header::CONTENT_TYPE, "application/pdf")], RECEIPT).into_response(),
        Reply::Html => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            "<html>mantenimiento</html>",
        )
            .into_response(),
        Reply::Declined => Json(json!({
            "success": false,
            "message": "El email ya se encuentra registrado"
        }))
        .into_response(),
    }
}

async fn receipt() -> Response {
    ([(header::CONTENT_TYPE, "application/pdf")], RECEIPT).into_response()
}

async fn spawn_registry(reply: Reply) -> (Url, Arc<MockRegistry>) {
    let registry = Arc::new(MockRegistry {
        reply,
        lookups: Mutex::new(Vec::new()),
        posts: Mutex::new(Vec::new()),
    });
    let router = Router::new()
        .route("/api/postulantes/existe", get(exists))
        .route("/api/postulantes", post(register))
        .route("/storage/comprobantes/comprobante.pdf", get(receipt))
        .with_state(registry.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock registry");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock registry");
    });

    let base_url = Url::parse(&format!("http://{addr}")).expect("base url");
    (base_url, registry)
}

type HttpSequencer = RegistrationSequencer<JsonFileSessionStore, HttpRegistryClient>;

fn sequencer_for(base_url: Url, session_path: &Path) -> HttpSequencer {
    let client = HttpRegistryClient::new(&ApiConfig {
        base_url,
        request_timeout: Duration::from_secs(5),
    })
    .expect("http client");
    RegistrationSequencer::restore(
        Arc::new(JsonFileSessionStore::new(session_path)),
        Arc::new(client),
        &FormConfig {
            revision: SchemaRevision::Current,
            reset_delay: Duration::from_secs(3),
        },
    )
}

fn enter_identity(sequencer: &mut HttpSequencer, national_id: &str) {
    sequencer
        .edit(Field::NationalId, national_id)
        .expect("identity editable");
    sequencer.edit(Field::Suffix, "1a").expect("identity editable");
    sequencer
        .edit(Field::IssuingRegion, "CB")
        .expect("identity editable");
}

fn fill_application(sequencer: &mut HttpSequencer) {
    let edits = [
        (Field::FirstName, "Juan Carlos"),
        (Field::PaternalSurname, "Mamani"),
        (Field::MaternalSurname, "Choque"),
        (Field::BirthDate, "1990-11-02"),
        (Field::Education, "TECNICO SUPERIOR"),
        (Field::Career, "Electrónica"),
        (Field::City, "Cochabamba"),
        (Field::Zone, "Sarco"),
        (Field::Street, "Calle Beni"),
        (Field::HouseNumber, "345"),
        (Field::Email, "juan.mamani@correo.bo"),
        (Field::Mobile, "60012345"),
        (Field::PhoneBrand, "Xiaomi"),
        (Field::PhoneModel, "Redmi Note 12"),
        (Field::Postulation, "PROVINCIA"),
        (Field::FacilityCode, "3-1002-00045"),
        (Field::FacilityName, "Escuela Simón Bolívar"),
        (Field::FacilityMunicipality, "Quillacollo"),
        (Field::LivesNearFacility, "false"),
        (Field::Experience, "NO"),
    ];
    for (field, value) in edits {
        let outcome = sequencer.edit(field, value).expect("registration editable");
        assert!(outcome.is_none(), "{field} rejected: {outcome:?}");
    }
    for key in ["esBoliviano", "registradoPadronElectoral", "lineaEntel"] {
        sequencer.set_requirement(key, true).expect("known requirement");
    }

    let files = [
        (
            AttachmentSlot::IdentityDocument,
            FileHandle::new("carnet.pdf", "application/pdf", b"%PDF ci".to_vec()),
        ),
        (
            AttachmentSlot::NonAffiliationCapture,
            FileHandle::new("militancia.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]),
        ),
        (
            AttachmentSlot::Curriculum,
            FileHandle::new("cv.pdf", "application/pdf", b"%PDF cv".to_vec()),
        ),
        (
            AttachmentSlot::DeviceCapture,
            FileHandle::new("android.png", "image/png", vec![0x89, b'P', b'N', b'G']),
        ),
    ];
    for (slot, file) in files {
        let outcome = sequencer.attach(slot, Some(file)).expect("registration editable");
        assert!(outcome.is_none(), "{slot} rejected: {outcome:?}");
    }
}

async fn verified_sequencer(reply: Reply, dir: &Path) -> (HttpSequencer, Arc<MockRegistry>) {
    let (base_url, registry) = spawn_registry(reply).await;
    let mut sequencer = sequencer_for(base_url, &dir.join("session.json"));
    enter_identity(&mut sequencer, "7654321");
    let outcome = sequencer.verify().await.expect("verification succeeds");
    assert_eq!(outcome, VerificationOutcome::Eligible);
    fill_application(&mut sequencer);
    (sequencer, registry)
}

#[tokio::test]
async fn applicant_registers_and_receives_linked_receipt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session_path = dir.path().join("session.json");
    let (mut sequencer, registry) = verified_sequencer(Reply::Link, dir.path()).await;

    let lookups = registry.lookups();
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].get("cedula_identidad").map(String::as_str), Some("7654321"));
    assert_eq!(lookups[0].get("complemento").map(String::as_str), Some("1A"));
    assert_eq!(lookups[0].get("expedicion").map(String::as_str), Some("CB"));
    assert!(session_path.exists());

    let receipt = sequencer.submit().await.expect("registration accepted");
    assert!(!session_path.exists());
    assert_eq!(receipt.document.file_name, "comprobante_7654321.pdf");
    assert_eq!(receipt.document.bytes, RECEIPT);

    let posts = registry.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].content_type.starts_with("multipart/form-data"));
    for expected in [
        "name=\"nombre\"",
        "name=\"tipoPostulacion\"",
        "OPERADOR DE TRANSMISION SIREPRE PROVINCIA",
        "name=\"idRecinto\"",
        "name=\"requisitos\"",
        "\"lineaEntel\":true",
        "name=\"cedulaIdentidad\"",
        "name=\"expedicion\"",
        "name=\"experiencia_general\"",
        "name=\"archivo_ci\"; filename=\"carnet.pdf\"",
        "name=\"capturaPantalla\"; filename=\"android.png\"",
    ] {
        assert!(posts[0].body.contains(expected), "missing {expected}");
    }

    let downloads = dir.path().join("downloads");
    let saved = receipt
        .document
        .save_in(&downloads)
        .expect("receipt written");
    assert_eq!(std::fs::read(&saved).expect("read receipt"), RECEIPT);

    tokio::time::pause();
    assert!(sequencer.settle().await);
    assert_eq!(sequencer.step(), Step::Verification);
    assert!(!session_path.exists());
}

#[tokio::test]
async fn streamed_pdf_reply_is_the_receipt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut sequencer, _) = verified_sequencer(Reply::Pdf, dir.path()).await;

    let receipt = sequencer.submit().await.expect("registration accepted");

    assert_eq!(receipt.document.bytes, RECEIPT);
    assert!(sequencer.reset_pending());
}

#[tokio::test]
async fn unrecognized_reply_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut sequencer, _) = verified_sequencer(Reply::Html, dir.path()).await;

    let outcome = sequencer.submit().await;

    assert!(matches!(
        outcome,
        Err(RegistrationError::Gateway(GatewayError::UnexpectedResponse(_)))
    ));
    assert_eq!(sequencer.step(), Step::Registration);
    assert!(!sequencer.reset_pending());
}

#[tokio::test]
async fn declined_registration_shows_server_message() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut sequencer, _) = verified_sequencer(Reply::Declined, dir.path()).await;

    let outcome = sequencer.submit().await;

    assert!(matches!(outcome, Err(RegistrationError::Rejected(_))));
    assert_eq!(
        sequencer.banner().map(|banner| banner.text.as_str()),
        Some("El email ya se encuentra registrado")
    );
}

#[tokio::test]
async fn registered_applicant_is_turned_away() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (base_url, registry) = spawn_registry(Reply::Link).await;
    let mut sequencer = sequencer_for(base_url, &dir.path().join("session.json"));
    enter_identity(&mut sequencer, REGISTERED_ID);

    let outcome = sequencer.verify().await.expect("registry answered");

    assert_eq!(outcome, VerificationOutcome::AlreadyRegistered);
    assert_eq!(sequencer.step(), Step::Verification);
    assert!(registry.posts().is_empty());
}

#[tokio::test]
async fn registry_failure_status_keeps_verification_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (base_url, _) = spawn_registry(Reply::Link).await;
    let mut sequencer = sequencer_for(base_url, &dir.path().join("session.json"));
    enter_identity(&mut sequencer, FAILING_ID);

    let outcome = sequencer.verify().await;

    assert!(matches!(
        outcome,
        Err(RegistrationError::Gateway(GatewayError::Status(500)))
    ));
    assert_eq!(
        sequencer.banner().map(|banner| banner.text.as_str()),
        Some("Error al verificar el postulante.")
    );
}

#[tokio::test]
async fn unreachable_registry_is_a_connection_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let base_url = Url::parse(&format!("http://{addr}")).expect("base url");
    let mut sequencer = sequencer_for(base_url, &dir.path().join("session.json"));
    enter_identity(&mut sequencer, "7654321");

    let outcome = sequencer.verify().await;

    assert!(matches!(
        outcome,
        Err(RegistrationError::Gateway(GatewayError::Transport(_)))
    ));
    assert_eq!(
        sequencer.banner().map(|banner| banner.text.as_str()),
        Some("Error de conexión con el servidor.")
    );
}

#[tokio::test]
async fn session_survives_restart_without_file_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session_path = dir.path().join("session.json");
    let (sequencer, _) = verified_sequencer(Reply::Link, dir.path()).await;
    drop(sequencer);

    let (base_url, registry) = spawn_registry(Reply::Link).await;
    let mut resumed = sequencer_for(base_url, &session_path);

    assert_eq!(resumed.step(), Step::Registration);
    assert_eq!(resumed.verification().national_id, "7654321");
    assert_eq!(resumed.applicant().first_name, "Juan Carlos");
    assert_eq!(resumed.applicant().restored_slots().len(), 4);

    let outcome = resumed.submit().await;
    assert!(matches!(outcome, Err(RegistrationError::Validation(_))));
    assert!(registry.posts().is_empty());
}
