//! Command-line interface for the resign signing pipeline.
//!
//! Wraps the `resign` library: credential import and management, revocation
//! checks, entitlement validation, signing orchestration, archive
//! extraction, and IPA packaging.

use clap::{Parser, Subcommand};
use resign::paths::{migrate_legacy_certificates, MigrationOutcome, Workspace};
use resign::revocation::HttpRevocationAuthority;
use resign::secrets::{MemorySecretStore, PlatformSecretStore, SecretStore};
use resign::signing::{Resigner, SigningOptions, ToolSigner};
use resign::store::{CredentialImporter, CredentialStore};
use resign::validation::validate;
use resign::{package, CompressionLevel, RevocationChecker};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing_subscriber::EnvFilter;

/// Secret-store service name; scopes platform keychain entries.
const SERVICE: &str = "resign";

#[derive(Parser)]
#[command(name = "resign")]
#[command(about = "Signing identity management and app re-signing")]
struct Cli {
    /// Workspace root directory
    #[arg(long, env = "RESIGN_ROOT", default_value = ".resign", global = true)]
    root: PathBuf,

    /// Keep secrets in process memory instead of the platform store
    /// (secrets will not survive the process)
    #[arg(long, global = true)]
    memory_secrets: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a key and provisioning profile as a new credential
    Import {
        /// PKCS#12 key file
        #[arg(short, long)]
        key: PathBuf,

        /// Provisioning profile
        #[arg(short, long)]
        profile: PathBuf,

        /// Key password
        #[arg(long, env = "RESIGN_IMPORT_PASSWORD")]
        password: Option<String>,

        /// Display label
        #[arg(short, long)]
        nickname: Option<String>,

        /// Make this the default credential
        #[arg(long)]
        default: bool,
    },

    /// List stored credentials, newest first
    List,

    /// Delete a credential, its files, and its secret
    Delete {
        /// Credential id
        id: String,
    },

    /// Make a credential the default
    SetDefault {
        /// Credential id
        id: String,
    },

    /// Check a credential against a revocation authority
    Check {
        /// Credential id
        id: String,

        /// Revocation authority endpoint
        #[arg(long, env = "RESIGN_AUTHORITY_URL")]
        authority_url: String,
    },

    /// Validate entitlements for an app bundle against a credential
    Validate {
        /// App bundle (.app directory)
        app: PathBuf,

        /// Credential id (defaults to the store default)
        #[arg(short, long)]
        credential: Option<String>,

        /// Signing options JSON file
        #[arg(short, long)]
        options: Option<PathBuf>,
    },

    /// Sign an app bundle
    Sign {
        /// App bundle (.app directory)
        app: PathBuf,

        /// Credential id (defaults to the store default)
        #[arg(short, long)]
        credential: Option<String>,

        /// Sign ad-hoc, without a credential
        #[arg(short, long)]
        adhoc: bool,

        /// Signing options JSON file
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// External signing tool
        #[arg(long, env = "RESIGN_SIGNER_TOOL")]
        signer_tool: PathBuf,
    },

    /// Extract an archive or compressed file one step
    Extract {
        /// Input file (.gz/.bz2/.xz/.lzma/.tar)
        file: PathBuf,
    },

    /// Package a signed app bundle into an .ipa
    Package {
        /// App bundle (.app directory)
        app: PathBuf,

        /// App name for the archive file name
        #[arg(long, default_value = "Unknown")]
        name: String,

        /// App version for the archive file name
        #[arg(long, default_value = "1.0")]
        version: String,

        /// ZIP compression level (0-9)
        #[arg(short = 'z', long, default_value = "6")]
        compression_level: u32,
    },

    /// Run the startup migrations: legacy certificate directories and
    /// inline secrets
    Migrate {
        /// Legacy certificates directory to move into the workspace
        #[arg(long)]
        legacy: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let workspace = Workspace::new(&cli.root);
    workspace.ensure_layout()?;

    let secrets: Arc<dyn SecretStore> = if cli.memory_secrets {
        Arc::new(MemorySecretStore::new())
    } else {
        Arc::new(PlatformSecretStore::new(SERVICE))
    };
    let store = Arc::new(CredentialStore::open(workspace.certificates(), secrets)?);

    match cli.command {
        Command::Import {
            key,
            profile,
            password,
            nickname,
            default,
        } => {
            let mut importer = CredentialImporter::new(key, profile).default(default);
            if let Some(password) = password {
                importer = importer.password(SecretString::from(password));
            }
            if let Some(nickname) = nickname {
                importer = importer.nickname(nickname);
            }
            let credential = importer.import(&store)?;
            println!("Imported: {}", credential.id);
        }

        Command::List => {
            for credential in store.all() {
                let mut flags = Vec::new();
                if credential.is_default {
                    flags.push("default");
                }
                if credential.revoked {
                    flags.push("revoked");
                }
                if credential.has_inline_secret() {
                    flags.push("inline-secret");
                }
                let flags = if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                };
                println!(
                    "{}  {}{}",
                    credential.id,
                    credential.nickname.as_deref().unwrap_or("-"),
                    flags
                );
            }
        }

        Command::Delete { id } => {
            store.delete(&id)?;
            println!("Deleted: {id}");
        }

        Command::SetDefault { id } => {
            store.set_default(&id)?;
            println!("Default: {id}");
        }

        Command::Check { id, authority_url } => {
            let authority = Arc::new(HttpRevocationAuthority::new(authority_url));
            let checker = RevocationChecker::new(store.clone(), authority);
            let status = checker.check(&id).await;
            println!("{status:?}");
        }

        Command::Validate {
            app,
            credential,
            options,
        } => {
            let options = load_options(options.as_deref())?;
            let id = credential.or_else(|| store.default_credential().map(|c| c.id));
            let profile = id.as_deref().and_then(|id| store.decoded_profile(id));

            let app_identifier = resign::signing::bundle_identifier(&app);
            let report = validate(app_identifier.as_deref(), &options, profile.as_ref());

            println!(
                "Effective bundle id: {}",
                report.effective_bundle_id.as_deref().unwrap_or("-")
            );
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
        }

        Command::Sign {
            app,
            credential,
            adhoc,
            options,
            signer_tool,
        } => {
            let options = load_options(options.as_deref())?;
            let id = credential.or_else(|| store.default_credential().map(|c| c.id));
            let signer = ToolSigner::new(signer_tool);

            let resigner = Resigner::new(&app, options, store.clone(), id);
            resigner.disinject(&signer)?;
            if adhoc {
                resigner.adhoc_sign(&signer)?;
            } else {
                resigner.sign(&signer)?;
            }
            println!("Signed: {}", app.display());
        }

        Command::Extract { file } => {
            let output = resign::extract_file(&file)?;
            println!("{}", output.display());
        }

        Command::Package {
            app,
            name,
            version,
            compression_level,
        } => {
            let work = workspace.signed_dir(&uuid::Uuid::new_v4().to_string());
            let payload = package::stage_payload(&app, &work)?;

            let output = workspace
                .archives()
                .join(package::archive_file_name(&name, &version, SystemTime::now()));
            let mut last_percent = 0u8;
            let mut progress = |fraction: f64| {
                let percent = (fraction * 100.0) as u8;
                if percent >= last_percent + 10 {
                    last_percent = percent;
                    eprintln!("packaging {percent}%");
                }
            };
            package::create_ipa(
                &payload,
                &output,
                CompressionLevel::new(compression_level),
                Some(&mut progress),
            )?;
            println!("{}", output.display());
        }

        Command::Migrate { legacy } => {
            if let Some(legacy) = legacy {
                let report = migrate_legacy_certificates(&legacy, &workspace)?;
                for (item, outcome) in &report.items {
                    let text = match outcome {
                        MigrationOutcome::Moved => "moved".to_owned(),
                        MigrationOutcome::SkippedExists => "skipped (exists)".to_owned(),
                        MigrationOutcome::Failed(reason) => format!("failed: {reason}"),
                    };
                    println!("{item}: {text}");
                }
            }

            let stats = store.migrate_inline_secrets();
            println!(
                "Secrets: {} migrated, {} left inline",
                stats.migrated, stats.failed
            );
        }
    }

    Ok(())
}

fn load_options(path: Option<&std::path::Path>) -> Result<SigningOptions, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let data = std::fs::read(path)?;
            Ok(serde_json::from_slice(&data)?)
        }
        None => Ok(SigningOptions::default()),
    }
}
