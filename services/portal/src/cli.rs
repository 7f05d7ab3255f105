//! services/portal/src/cli.rs
//!
//! Command-line surface of the portal client.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use learning_plan_core::domain::{ApplicationStatus, SignerRole, UserRole};

/// portal - self-directed learning plan applications from the terminal
#[derive(Parser, Debug)]
#[command(name = "portal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    // === Account ===
    /// Log in and keep the session for later commands
    Login {
        username: String,
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Create an account
    Register(RegisterArgs),

    /// Change the logged-in user's password
    ChangePassword {
        old_password: String,
        new_password: String,
        /// Repeat of the new password (defaults to the new password)
        #[arg(long)]
        confirm: Option<String>,
    },

    // === Application forms ===
    /// Write an empty application form to a file
    Init {
        output: PathBuf,
    },

    /// Validate a form file without sending it
    Check {
        form: PathBuf,
    },

    /// Submit a form file as a new application, or as an edit of an existing one
    Submit {
        form: PathBuf,
        /// Id of the application being edited
        #[arg(long)]
        edit: Option<String>,
    },

    /// Fill a member slot of a form file from the student roster
    FillMember {
        form: PathBuf,
        /// Member slot, 1 to 3
        #[arg(value_parser = clap::value_parser!(u8).range(1..=3))]
        slot: u8,
    },

    /// Capture a signature from a recorded stroke file into a form file
    Sign {
        form: PathBuf,
        /// Signer slot, by key (e.g. `leader`) or printed label
        #[arg(value_parser = parse_signer)]
        role: SignerRole,
        /// Stroke recording (JSON)
        #[arg(required_unless_present = "delete")]
        strokes: Option<PathBuf>,
        /// Remove the slot's signature instead
        #[arg(long)]
        delete: bool,
    },

    // === Submitted applications ===
    /// List applications
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one application
    Show {
        id: String,
    },

    /// Download an application into a form file for editing
    Pull {
        id: String,
        output: PathBuf,
    },

    /// Delete an application
    Delete {
        id: String,
    },

    /// Download the rendered PDF of an application
    ExportPdf {
        id: String,
        /// Output path (defaults to the name suggested by the server)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    // === Drafts ===
    /// Manage the saved draft
    #[command(subcommand)]
    Draft(DraftCommand),

    // === Teacher review ===
    /// Review applications
    #[command(subcommand)]
    Review(ReviewCommand),

    // === Roster and settings ===
    /// Look up students
    #[command(subcommand)]
    Student(StudentCommand),

    /// Gmail notification settings
    #[command(subcommand)]
    Gmail(GmailCommand),
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    pub username: String,
    pub password: String,
    #[arg(long, value_enum, default_value = "student")]
    pub role: RoleArg,
    #[arg(long)]
    pub student_id: Option<String>,
    #[arg(long)]
    pub student_name: Option<String>,
    #[arg(long)]
    pub class_name: Option<String>,
    #[arg(long)]
    pub seat_number: Option<u32>,
    #[arg(long)]
    pub teacher_name: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    #[arg(long)]
    pub skip: Option<u32>,
    #[arg(long)]
    pub limit: Option<u32>,
    /// Start date year filter
    #[arg(long)]
    pub year: Option<String>,
    /// Start date month filter (no leading zero)
    #[arg(long)]
    pub month: Option<String>,
    /// Start date day filter (no leading zero)
    #[arg(long)]
    pub day: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum DraftCommand {
    /// Save a form file as the draft, overwriting the previous one
    Save { form: PathBuf },
    /// Write the saved draft to a form file
    Load { output: PathBuf },
    /// Delete the saved draft
    Delete,
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommand {
    /// Pass or fail an application
    Status {
        id: String,
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Save the teacher's comment on an application
    Comment { id: String, text: String },
    /// Show the teacher's comment on an application
    View { id: String },
}

#[derive(Subcommand, Debug)]
pub enum StudentCommand {
    /// Look up one student by id
    Get { student_id: String },
    /// Search the roster
    Search {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        class: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum GmailCommand {
    /// Show the current configuration
    Show,
    /// Configure the sending account
    Set {
        user: String,
        #[arg(long)]
        app_password: Option<String>,
    },
    /// Remove the configuration
    Clear,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    Pending,
    Passed,
    NotPassed,
}

impl From<StatusArg> for ApplicationStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Passed => Self::Passed,
            StatusArg::NotPassed => Self::NotPassed,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Student,
    Teacher,
}

impl From<RoleArg> for UserRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Student => Self::Student,
            RoleArg::Teacher => Self::Teacher,
        }
    }
}

/// Accepts a slot key such as `member1Guardian` or its printed label.
fn parse_signer(raw: &str) -> Result<SignerRole, String> {
    SignerRole::from_label(raw)
        .or_else(|| serde_json::from_value(serde_json::Value::String(raw.to_string())).ok())
        .ok_or_else(|| {
            let keys: Vec<String> = SignerRole::ALL
                .iter()
                .filter_map(|role| serde_json::to_value(role).ok())
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            format!("unknown signer '{}', expected one of: {}", raw, keys.join(", "))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn signer_accepts_key_or_label() {
        assert_eq!(parse_signer("leader"), Ok(SignerRole::Leader));
        assert_eq!(parse_signer("組員1父母或監護人簽名"), Ok(SignerRole::Member1Guardian));
        assert!(parse_signer("principal").is_err());
    }

    #[test]
    fn review_status_parses_kebab_case() {
        let cli = Cli::try_parse_from(["portal", "review", "status", "app-1", "not-passed"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Review(ReviewCommand::Status { status: StatusArg::NotPassed, .. })
        ));
    }

    #[test]
    fn sign_needs_strokes_unless_deleting() {
        assert!(Cli::try_parse_from(["portal", "sign", "form.json", "leader"]).is_err());
        assert!(Cli::try_parse_from(["portal", "sign", "form.json", "leader", "--delete"]).is_ok());
    }
}
