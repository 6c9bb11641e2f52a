use std::future::Future;

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::domain::VerificationRecord;
use super::payload::SubmissionRequest;
use crate::config::ApiConfig;

const EXISTENCE_PATH: &str = "api/postulantes/existe";
const REGISTRATION_PATH: &str = "api/postulantes";

/// Reply of the existence check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ExistenceReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "existe")]
    pub exists: bool,
}

/// What the registry answered to a registration post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResponse {
    /// JSON success pointing at the generated document.
    DocumentLink(String),
    /// The document itself was streamed back.
    Document(Vec<u8>),
    /// JSON reply without a document, with the server's explanation if any.
    Rejected { message: Option<String> },
}

#[derive(Debug, Deserialize)]
struct SubmissionReply {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "pdfUrl")]
    pdf_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("registry unreachable: {0}")]
    Transport(String),
    #[error("registry answered with HTTP {0}")]
    Status(u16),
    #[error("unexpected registry response: {0}")]
    UnexpectedResponse(String),
    #[error("invalid registry URL: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    fn transport<E: std::fmt::Display>(err: E) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// Remote registry operations used by the sequencer.
pub trait RegistryGateway: Send + Sync {
    fn check_exists(
        &self,
        verification: &VerificationRecord,
    ) -> impl Future<Output = Result<ExistenceReply, GatewayError>> + Send;

    fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> impl Future<Output = Result<SubmissionResponse, GatewayError>> + Send;

    /// Fetch a document by the link returned from [`RegistryGateway::submit`].
    fn download(&self, link: &str) -> impl Future<Output = Result<Vec<u8>, GatewayError>> + Send;
}

/// `reqwest`-backed registry client.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: Client,
    base_url: Url,
}

impl HttpRegistryClient {
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(GatewayError::transport)?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    pub fn with_client(client: Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| GatewayError::InvalidUrl(err.to_string()))
    }

    fn resolve_link(&self, link: &str) -> Result<Url, GatewayError> {
        match Url::parse(link) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.endpoint(link),
            Err(err) => Err(GatewayError::InvalidUrl(err.to_string())),
        }
    }

    fn build_form(request: &SubmissionRequest) -> Result<Form, GatewayError> {
        let mut form = Form::new();
        for (name, value) in &request.fields {
            form = form.text(*name, value.clone());
        }
        for file in &request.files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)
                .map_err(|err| {
                    GatewayError::UnexpectedResponse(format!(
                        "attachment {} has an invalid MIME type: {err}",
                        file.field
                    ))
                })?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

fn ensure_success(response: &Response) -> Result<(), GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(GatewayError::Status(status.as_u16()))
    }
}

enum BodyKind {
    Json,
    Document,
    Other(String),
}

fn classify(response: &Response) -> BodyKind {
    let raw = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let Ok(content_type) = raw.parse::<mime::Mime>() else {
        return BodyKind::Other(raw);
    };
    let (kind, subtype) = (content_type.type_(), content_type.subtype());
    if kind != mime::APPLICATION {
        BodyKind::Other(raw)
    } else if subtype == mime::JSON {
        BodyKind::Json
    } else if subtype == mime::PDF || subtype == mime::OCTET_STREAM {
        BodyKind::Document
    } else {
        BodyKind::Other(raw)
    }
}

impl RegistryGateway for HttpRegistryClient {
    async fn check_exists(
        &self,
        verification: &VerificationRecord,
    ) -> Result<ExistenceReply, GatewayError> {
        let url = self.endpoint(EXISTENCE_PATH)?;
        let region = verification
            .issuing_region
            .map(|region| region.code())
            .unwrap_or_default();
        debug!(url = %url, "checking applicant existence");

        let response = self
            .client
            .get(url)
            .query(&[
                ("cedula_identidad", verification.national_id.as_str()),
                ("complemento", verification.suffix.as_str()),
                ("expedicion", region),
            ])
            .send()
            .await
            .map_err(GatewayError::transport)?;
        ensure_success(&response)?;

        response
            .json::<ExistenceReply>()
            .await
            .map_err(|err| GatewayError::UnexpectedResponse(err.to_string()))
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, GatewayError> {
        let url = self.endpoint(REGISTRATION_PATH)?;
        let form = Self::build_form(request)?;
        debug!(
            url = %url,
            fields = request.fields.len(),
            files = request.files.len(),
            "posting registration"
        );

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(GatewayError::transport)?;
        ensure_success(&response)?;

        match classify(&response) {
            BodyKind::Json => {
                let reply = response
                    .json::<SubmissionReply>()
                    .await
                    .map_err(|err| GatewayError::UnexpectedResponse(err.to_string()))?;
                match reply {
                    SubmissionReply {
                        success: true,
                        pdf_url: Some(link),
                        ..
                    } if !link.trim().is_empty() => Ok(SubmissionResponse::DocumentLink(link)),
                    SubmissionReply { message, .. } => Ok(SubmissionResponse::Rejected { message }),
                }
            }
            BodyKind::Document => {
                let bytes = response.bytes().await.map_err(GatewayError::transport)?;
                Ok(SubmissionResponse::Document(bytes.to_vec()))
            }
            BodyKind::Other(content_type) => {
                warn!(content_type = %content_type, "registry replied with unrecognized content");
                Err(GatewayError::UnexpectedResponse(format!(
                    "content type '{content_type}' is not recognized"
                )))
            }
        }
    }

    async fn download(&self, link: &str) -> Result<Vec<u8>, GatewayError> {
        let url = self.resolve_link(link)?;
        debug!(url = %url, "downloading confirmation document");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(GatewayError::transport)?;
        ensure_success(&response)?;
        let bytes = response.bytes().await.map_err(GatewayError::transport)?;
        Ok(bytes.to_vec())
    }
}
