//! OGM Validator CLI - validate project location files against the Open Geodata Model
//!
//! # Main Commands
//!
//! ```bash
//! ogm-validator validate locations.xlsx          # Validate and print the report
//! ogm-validator validate data.csv -o out/        # ... and save validated_data.geojson
//! ogm-validator mail locations.csv               # Validate, then print a mail draft
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! ogm-validator transform locations.csv          # Rows to GeoJSON, no validation
//! ogm-validator schemas                          # Load and list the schema documents
//! ```
//!
//! Exit code is 0 when the upload is valid, 2 when a spreadsheet is waiting
//! for `--continue-without-template`, 1 otherwise.

use clap::{Parser, Subcommand};
use ogm_validator::{
    parse_csv_bytes, transform_csv_rows, transform_spreadsheet_rows, FeatureCollection, InputKind,
    LocationFeature, SchemaRegistry, Session, SessionState, UploadedFile, ValidatorConfig, Workbook,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const EXIT_VALID: i32 = 0;
const EXIT_INVALID: i32 = 1;
const EXIT_PENDING_DECISION: i32 = 2;

#[derive(Parser)]
#[command(name = "ogm-validator")]
#[command(about = "Validate project location data against the Open Geodata Model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Schema repository base URL (overrides OGM_SCHEMA_BASE_URL)
    #[arg(long, global = true)]
    schema_base_url: Option<String>,

    /// Schema repository branch (overrides OGM_SCHEMA_BRANCH)
    #[arg(long, global = true)]
    schema_branch: Option<String>,

    /// Expected name of the template's second sheet (overrides OGM_TEMPLATE_SHEET)
    #[arg(long, global = true)]
    template_sheet: Option<String>,

    /// Timeout per schema request in seconds (overrides OGM_FETCH_TIMEOUT_SECS)
    #[arg(long, global = true)]
    fetch_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a GeoJSON, CSV or Excel file
    Validate {
        /// Input file
        input: PathBuf,

        /// Declared media type (default: from the file extension)
        #[arg(short, long)]
        media_type: Option<String>,

        /// Load the schema files from a local directory instead of the network
        /// (the bundled backend/schemas are reduced test fixtures, not the published model)
        #[arg(short, long)]
        schema_dir: Option<PathBuf>,

        /// Save the processed GeoJSON here (file or directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Validate a workbook even without the template sheet
        #[arg(long)]
        continue_without_template: bool,
    },

    /// Convert CSV/Excel rows to a GeoJSON FeatureCollection without validating
    Transform {
        /// Input CSV or Excel file
        input: PathBuf,

        /// Declared media type (default: from the file extension)
        #[arg(short, long)]
        media_type: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load the schema documents and list them
    Schemas {
        /// Load the schema files from a local directory instead of the network
        /// (the bundled backend/schemas are reduced test fixtures, not the published model)
        #[arg(short, long)]
        schema_dir: Option<PathBuf>,
    },

    /// Validate a CSV/Excel file and print a mail draft for the project numbers
    Mail {
        /// Input CSV or Excel file
        input: PathBuf,

        /// Declared media type (default: from the file extension)
        #[arg(short, long)]
        media_type: Option<String>,

        /// Load the schema files from a local directory instead of the network
        /// (the bundled backend/schemas are reduced test fixtures, not the published model)
        #[arg(short, long)]
        schema_dir: Option<PathBuf>,

        /// Validate a workbook even without the template sheet
        #[arg(long)]
        continue_without_template: bool,
    },
}

impl Cli {
    fn config(&self) -> ValidatorConfig {
        let mut config = ValidatorConfig::from_env();
        if let Some(url) = &self.schema_base_url {
            config.schema_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(branch) = &self.schema_branch {
            config.schema_branch = branch.clone();
        }
        if let Some(sheet) = &self.template_sheet {
            config.template_sheet_name = sheet.clone();
        }
        if let Some(secs) = self.fetch_timeout {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let result = match cli.command {
        Commands::Validate {
            input,
            media_type,
            schema_dir,
            output,
            continue_without_template,
        } => {
            cmd_validate(
                config,
                &input,
                media_type,
                schema_dir.as_deref(),
                output.as_deref(),
                continue_without_template,
            )
            .await
        }

        Commands::Transform {
            input,
            media_type,
            output,
        } => cmd_transform(&config, &input, media_type, output.as_deref()).await,

        Commands::Schemas { schema_dir } => cmd_schemas(config, schema_dir.as_deref()).await,

        Commands::Mail {
            input,
            media_type,
            schema_dir,
            continue_without_template,
        } => {
            cmd_mail(
                config,
                &input,
                media_type,
                schema_dir.as_deref(),
                continue_without_template,
            )
            .await
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(EXIT_INVALID);
        }
    }
}

async fn cmd_validate(
    config: ValidatorConfig,
    input: &Path,
    media_type: Option<String>,
    schema_dir: Option<&Path>,
    output: Option<&Path>,
    continue_without_template: bool,
) -> CliResult<i32> {
    let mut session = ready_session(config, schema_dir).await?;
    let file = read_upload(input, media_type).await?;

    eprintln!("📄 Validating: {} ({})", file.name, file.media_type);
    if !upload_and_resolve(&mut session, file, continue_without_template)? {
        return Ok(EXIT_PENDING_DECISION);
    }

    let outcome = session.outcome().ok_or("Upload did not resolve")?;
    println!("{}", outcome.report_text());

    if let (Some(output), Some(_)) = (output, &outcome.data) {
        let artifact = session.download()?;
        let path = if output.is_dir() {
            output.join(&artifact.file_name)
        } else {
            output.to_path_buf()
        };
        tokio::fs::write(&path, &artifact.contents).await?;
        eprintln!("💾 {} written to: {}", artifact.media_type, path.display());
    }

    Ok(if outcome.is_valid() { EXIT_VALID } else { EXIT_INVALID })
}

async fn cmd_transform(
    config: &ValidatorConfig,
    input: &Path,
    media_type: Option<String>,
    output: Option<&Path>,
) -> CliResult<i32> {
    let file = read_upload(input, media_type).await?;
    eprintln!("📄 Transforming: {}", file.name);

    let features: Vec<LocationFeature> = match InputKind::from_media_type(&file.media_type) {
        Some(InputKind::Csv) => {
            let table = parse_csv_bytes(&file.bytes)?;
            eprintln!("   Encoding: {}", table.encoding);
            eprintln!("   Delimiter: '{}'", format_delimiter(table.delimiter));
            eprintln!("   Columns: {}", table.headers.join(", "));
            transform_csv_rows(table.rows)
        }
        Some(InputKind::Spreadsheet) => {
            let workbook = Workbook::open(&file.bytes)?;
            eprintln!("   Sheets: {}", workbook.sheet_names().join(", "));
            if !workbook.has_template_sheet(&config.template_sheet_name) {
                eprintln!("   ⚠️  Second sheet is not '{}'", config.template_sheet_name);
            }
            transform_spreadsheet_rows(workbook.data_rows(config.header_offset)?)
        }
        Some(InputKind::GeoJson) => return Err("GeoJSON input is already a FeatureCollection; use 'validate'".into()),
        None => return Err(format!("Unsupported media type: {}", file.media_type).into()),
    };

    let values = features
        .iter()
        .map(LocationFeature::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let collection = FeatureCollection::new(values);
    eprintln!("⚙️  Transformed: {} features", collection.len());

    let json = serde_json::to_string_pretty(&collection)?;
    write_output(&json, output).await?;

    Ok(EXIT_VALID)
}

async fn cmd_schemas(config: ValidatorConfig, schema_dir: Option<&Path>) -> CliResult<i32> {
    let session = ready_session(config, schema_dir).await?;
    let validator = session.validator().ok_or("Schemas are not loaded")?;

    eprintln!("📋 Schemas ({}):\n", validator.schema_ids().len());
    for id in validator.schema_ids() {
        let marker = if id == validator.root_id() { " (root)" } else { "" };
        match validator.schema(id) {
            Some(doc) => println!("  📄 {}{}\n     {}", id, marker, doc.source),
            None => println!("  📄 {}{}", id, marker),
        }
    }

    Ok(EXIT_VALID)
}

async fn cmd_mail(
    config: ValidatorConfig,
    input: &Path,
    media_type: Option<String>,
    schema_dir: Option<&Path>,
    continue_without_template: bool,
) -> CliResult<i32> {
    let mut session = ready_session(config, schema_dir).await?;
    let file = read_upload(input, media_type).await?;

    if !upload_and_resolve(&mut session, file, continue_without_template)? {
        return Ok(EXIT_PENDING_DECISION);
    }

    let outcome = session.outcome().ok_or("Upload did not resolve")?;
    if !outcome.is_valid() {
        println!("{}", outcome.report_text());
        return Ok(EXIT_INVALID);
    }

    let draft = session.mail_draft()?;
    eprintln!("✉️  Projects: {}", draft.project_numbers.join(", "));
    println!("Subject: {}\n\n{}", draft.subject, draft.body);
    println!("{}", draft.mailto_link());

    Ok(EXIT_VALID)
}

/// Session with schemas loaded from the network or a local mirror.
async fn ready_session(config: ValidatorConfig, schema_dir: Option<&Path>) -> CliResult<Session> {
    let registry = SchemaRegistry::new(&config)?;
    let mut session = Session::new(config);

    match schema_dir {
        Some(dir) => session.load_schemas_from_dir(&registry, dir).await?,
        None => session.load_schemas(&registry).await?,
    }
    Ok(session)
}

async fn read_upload(input: &Path, media_type: Option<String>) -> CliResult<UploadedFile> {
    let bytes = tokio::fs::read(input).await?;
    let media_type = media_type
        .or_else(|| InputKind::media_type_for_path(input).map(str::to_owned))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    Ok(UploadedFile::new(name, media_type, bytes))
}

/// Upload, answering a template warning with `continue_without_template`.
///
/// Returns `false` when the upload is left waiting for that decision.
fn upload_and_resolve(session: &mut Session, file: UploadedFile, continue_without_template: bool) -> CliResult<bool> {
    let warning = match session.upload(file)? {
        SessionState::AwaitingTemplateDecision(warning) => warning.clone(),
        _ => return Ok(true),
    };

    eprintln!("⚠️  {}", warning.message());
    if !continue_without_template {
        eprintln!("   Re-run with --continue-without-template to validate anyway.");
        session.dismiss_structural_warning()?;
        return Ok(false);
    }

    session.continue_without_template()?;
    Ok(true)
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

async fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            tokio::fs::write(p, content).await?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
