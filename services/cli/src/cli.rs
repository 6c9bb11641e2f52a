use crate::commands::{self, Session};
use crate::infra::{parse_attachment, parse_field, parse_flag, parse_slot};
use applicant_registration::error::AppError;
use applicant_registration::workflows::registration::{AttachmentSlot, Field};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "registro",
    about = "Verify and register electoral-process applicants against the registry",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the stored session, inline errors and the last banner (default command)
    Status,
    /// Check whether the applicant is already registered
    Verify(VerifyArgs),
    /// Edit one form field by its wire name (e.g. `celular`, `idRecinto`)
    Set {
        #[arg(value_parser = parse_field)]
        field: Field,
        value: String,
    },
    /// Tick or untick an eligibility requirement (e.g. `esBoliviano true`)
    Require {
        key: String,
        #[arg(value_parser = parse_flag)]
        value: bool,
    },
    /// Attach a file to a slot, or clear the slot when no path is given
    Attach {
        #[arg(value_parser = parse_slot)]
        slot: AttachmentSlot,
        path: Option<PathBuf>,
    },
    /// Normalize and validate a value without touching the session
    Validate {
        #[arg(value_parser = parse_field)]
        field: Field,
        value: String,
    },
    /// Validate everything, submit the registration and save the receipt
    Submit(SubmitArgs),
    /// Leave the registration form, keeping the verified identity
    Cancel,
    /// Discard the session and start over for a new applicant
    Reset,
    /// List the accepted values of select fields and requirement keys
    Options,
}

#[derive(Args, Debug, Default)]
pub(crate) struct VerifyArgs {
    /// National identity card number
    #[arg(long = "ci")]
    pub(crate) national_id: Option<String>,
    /// Identity card complement
    #[arg(long)]
    pub(crate) complement: Option<String>,
    /// Issuing department code (LP, CB, SC, OR, PT, TJ, CH, BN, PD)
    #[arg(long)]
    pub(crate) region: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SubmitArgs {
    /// Attach a file before submitting, as SLOT=PATH (repeatable)
    #[arg(long = "attach", value_parser = parse_attachment)]
    pub(crate) attachments: Vec<(AttachmentSlot, PathBuf)>,
    /// Directory for the confirmation document (defaults to APP_DOWNLOAD_DIR)
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
    /// Exit right after saving the receipt instead of waiting for the form reset
    #[arg(long)]
    pub(crate) no_wait: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Status);

    if let Command::Options = command {
        commands::print_options();
        return Ok(());
    }

    let mut session = Session::open()?;
    match command {
        Command::Status => session.status(),
        Command::Verify(args) => session.verify(args).await,
        Command::Set { field, value } => session.set(field, &value),
        Command::Require { key, value } => session.require(&key, value),
        Command::Attach { slot, path } => session.attach(slot, path.as_deref()),
        Command::Validate { field, value } => session.validate(field, &value),
        Command::Submit(args) => session.submit(args).await,
        Command::Cancel => session.cancel(),
        Command::Reset => session.reset(),
        Command::Options => Ok(()),
    }
}
