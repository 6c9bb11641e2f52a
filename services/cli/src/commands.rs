use crate::cli::{SubmitArgs, VerifyArgs};
use crate::infra::load_file;
use applicant_registration::config::AppConfig;
use applicant_registration::error::AppError;
use applicant_registration::telemetry;
use applicant_registration::workflows::registration::{
    normalize, AttachmentSlot, Banner, BannerKind, EducationLevel, Field, FieldError,
    HttpRegistryClient, IssuingRegion, JsonFileSessionStore, PostulationType, RegistrationError,
    RegistrationSequencer, Requirements, SchemaRevision, SessionSnapshot, Step, ValidationReport,
    VerificationOutcome,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

type Sequencer = RegistrationSequencer<JsonFileSessionStore, HttpRegistryClient>;

/// One CLI invocation over the stored form session.
pub(crate) struct Session {
    config: AppConfig,
    sequencer: Sequencer,
}

#[derive(Serialize)]
struct StatusView<'a> {
    step: Step,
    revision: SchemaRevision,
    session: &'a SessionSnapshot,
    errors: &'a ValidationReport,
    banner: Option<&'a Banner>,
}

impl Session {
    pub(crate) fn open() -> Result<Self, AppError> {
        let config = AppConfig::load()?;
        telemetry::init(&config.telemetry, config.environment)?;

        let client = HttpRegistryClient::new(&config.api).map_err(RegistrationError::Gateway)?;
        let store = JsonFileSessionStore::new(&config.session.storage_path);
        info!(
            environment = ?config.environment,
            registry = %client.base_url(),
            session = %store.path().display(),
            revision = config.form.revision.label(),
            "registration session opened"
        );
        let sequencer =
            RegistrationSequencer::restore(Arc::new(store), Arc::new(client), &config.form);
        Ok(Self { config, sequencer })
    }

    pub(crate) fn status(&self) -> Result<(), AppError> {
        let view = StatusView {
            step: self.sequencer.step(),
            revision: self.sequencer.validator().revision(),
            session: self.sequencer.snapshot(),
            errors: self.sequencer.errors(),
            banner: self.sequencer.banner(),
        };
        let rendered = serde_json::to_string_pretty(&view)?;
        println!("{rendered}");
        Ok(())
    }

    pub(crate) async fn verify(&mut self, args: VerifyArgs) -> Result<(), AppError> {
        let edits = [
            (Field::NationalId, args.national_id),
            (Field::Suffix, args.complement),
            (Field::IssuingRegion, args.region),
        ];
        for (field, value) in edits {
            if let Some(value) = value {
                let outcome = self.sequencer.edit(field, &value)?;
                print_field_outcome(field.key(), outcome.as_ref());
            }
        }

        let outcome = self.sequencer.verify().await;
        self.print_banner();
        match outcome? {
            VerificationOutcome::Eligible => {
                println!("Continue with `registro set <campo> <valor>` and `registro submit`.");
            }
            VerificationOutcome::AlreadyRegistered => {}
        }
        Ok(())
    }

    pub(crate) fn set(&mut self, field: Field, value: &str) -> Result<(), AppError> {
        let outcome = self.sequencer.edit(field, value)?;
        print_field_outcome(field.key(), outcome.as_ref());
        Ok(())
    }

    pub(crate) fn require(&mut self, key: &str, value: bool) -> Result<(), AppError> {
        self.sequencer.set_requirement(key, value)?;
        println!("{key}: {value}");
        Ok(())
    }

    pub(crate) fn attach(
        &mut self,
        slot: AttachmentSlot,
        path: Option<&Path>,
    ) -> Result<(), AppError> {
        let file = path.map(load_file).transpose()?;
        let outcome = self.sequencer.attach(slot, file)?;
        print_field_outcome(slot.key(), outcome.as_ref());
        if outcome.is_none() && path.is_some() {
            println!(
                "note: only the file name is kept between runs; pass it again with `submit --attach {slot}=PATH`"
            );
        }
        Ok(())
    }

    pub(crate) fn validate(&self, field: Field, value: &str) -> Result<(), AppError> {
        let normalized = normalize(field, value);
        if normalized != value {
            println!("normalized: {normalized:?}");
        }
        let outcome = self.sequencer.validator().check(field, &normalized).err();
        print_field_outcome(field.key(), outcome.as_ref());
        Ok(())
    }

    pub(crate) async fn submit(&mut self, args: SubmitArgs) -> Result<(), AppError> {
        for (slot, path) in &args.attachments {
            let file = load_file(path)?;
            let outcome = self.sequencer.attach(*slot, Some(file))?;
            print_field_outcome(slot.key(), outcome.as_ref());
        }

        let outcome = self.sequencer.submit().await;
        self.print_banner();
        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                if let RegistrationError::Validation(report) = &err {
                    print_report(report);
                }
                return Err(err.into());
            }
        };

        let out_dir = args
            .out
            .unwrap_or_else(|| self.config.session.download_dir.clone());
        let saved = receipt.document.save_in(&out_dir)?;
        println!("Comprobante guardado en {}", saved.display());

        if args.no_wait {
            return Ok(());
        }
        println!(
            "El formulario se reiniciará en {} segundos...",
            self.sequencer.reset_delay().as_secs()
        );
        if self.sequencer.settle().await {
            println!("Formulario listo para un nuevo postulante.");
        }
        Ok(())
    }

    pub(crate) fn cancel(&mut self) -> Result<(), AppError> {
        self.sequencer.cancel();
        println!(
            "Registro cancelado. Cédula conservada: {}",
            self.sequencer.verification().national_id
        );
        Ok(())
    }

    pub(crate) fn reset(&mut self) -> Result<(), AppError> {
        self.sequencer.new_registration()?;
        println!("Sesión eliminada. Puede iniciar un nuevo registro.");
        Ok(())
    }

    fn print_banner(&self) {
        if let Some(banner) = self.sequencer.banner() {
            let tag = match banner.kind {
                BannerKind::Success => "ok",
                BannerKind::Error => "error",
                BannerKind::Info => "info",
            };
            println!("[{tag}] {}", banner.text);
        }
    }
}

fn print_field_outcome(key: &str, error: Option<&FieldError>) {
    match error {
        Some(error) => println!("{key}: {}", error.message),
        None => println!("{key}: ok"),
    }
}

fn print_report(report: &ValidationReport) {
    for (key, message) in report.iter() {
        println!("  {key}: {message}");
    }
}

pub(crate) fn print_options() {
    println!("expedicion:");
    for region in IssuingRegion::ALL {
        println!("  {} ({})", region.code(), region.name());
    }
    println!("gradoInstruccion:");
    for level in EducationLevel::ALL {
        println!("  {}", level.as_str());
    }
    println!("tipoPostulacion:");
    for kind in PostulationType::ALL {
        println!("  {}", kind.as_str());
    }
    println!("experienciaEspecifica:\n  SI\n  NO");
    println!("requisitos:");
    for key in Requirements::KEYS {
        println!("  {key}");
    }
    println!("archivos:");
    for slot in AttachmentSlot::ALL {
        println!("  {slot}");
    }
}
