//! Command-line driver: argument handling, dispatch and exit codes.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};

use crate::auth::Authenticator;
use crate::client::DriveClient;
use crate::config::Config;
use crate::error::{DriveError, Result};
use crate::folder_ref::parse_folder_id;
use crate::models::UploadResult;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

const USAGE: &str = "\
Usage: drive_upload <file1> [file2 ...]
Options:
  --folder-id <ID>   Upload into a specific folder (ID or folder URL)
  --list-folders     List Drive folders";

const SETUP_INSTRUCTIONS: &str = "\
Download an OAuth client from Google Cloud Console:
1. Go to https://console.cloud.google.com/
2. Create a project, then open APIs & Services -> Credentials
3. Create an OAuth 2.0 Client ID (Desktop app)
4. Download the JSON and save it as 'credentials.json'";

/// Upload files to Google Drive.
#[derive(Parser, Debug)]
#[command(name = "drive_upload", about, long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true, args_override_self = true)]
pub struct Cli {
    /// Files to upload.
    pub files: Vec<PathBuf>,

    /// Destination folder URL or ID.
    #[arg(long, value_name = "ID")]
    pub folder_id: Option<String>,

    /// List Drive folders instead of uploading.
    #[arg(long)]
    pub list_folders: bool,

    /// Where the OAuth token is cached between runs.
    #[arg(long, env = "DRIVE_UPLOAD_TOKEN_FILE", value_name = "PATH")]
    pub token_file: Option<PathBuf>,

    /// OAuth client secret file (default: credentials.json, then client_secret.json).
    #[arg(long, env = "DRIVE_UPLOAD_CLIENT_SECRET", value_name = "PATH")]
    pub client_secret: Option<PathBuf>,
}

impl Cli {
    /// Parse `args` (including the program name).
    ///
    /// Only tokens starting with `--` are options, and each must be one of
    /// the flags above. Everything else is a file, so `-draft.txt` and `-`
    /// are file names rather than short flags.
    pub fn parse_args(args: &[OsString]) -> Result<Self> {
        let arranged = arrange_args(args)?;
        Self::try_parse_from(arranged).map_err(|e| DriveError::InvalidArgument(clap_message(&e)))
    }

    /// Apply path overrides on top of `defaults`.
    pub fn config(&self, defaults: Config) -> Config {
        let mut config = defaults;
        if let Some(path) = &self.token_file {
            config = config.with_token_path(path);
        }
        if let Some(path) = &self.client_secret {
            config = config.with_client_secret(path);
        }
        config
    }
}

/// Move option tokens to the front and file tokens behind a `--`
/// terminator. Values of options that take one are attached with `=`, so
/// `--folder-id --x` keeps `--x` as the folder.
fn arrange_args(args: &[OsString]) -> Result<Vec<OsString>> {
    let command = Cli::command();
    let mut tokens = args.iter();
    let mut options: Vec<OsString> = tokens.next().cloned().into_iter().collect();
    let mut files = Vec::new();

    while let Some(token) = tokens.next() {
        let Some(long) = token.to_str().and_then(|t| t.strip_prefix("--")) else {
            files.push(token.clone());
            continue;
        };
        let (name, attached) = match long.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (long, None),
        };
        let takes_value = command
            .get_arguments()
            .find(|arg| arg.get_long() == Some(name))
            .map(|arg| arg.get_action().takes_values())
            .ok_or_else(|| {
                DriveError::InvalidArgument(format!("unknown option --{}", long))
            })?;

        if takes_value && attached.is_none() {
            let value = tokens.next().ok_or_else(|| {
                DriveError::InvalidArgument(format!("--{} requires a value", name))
            })?;
            let mut joined = OsString::from(format!("--{}=", name));
            joined.push(value);
            options.push(joined);
        } else {
            options.push(token.clone());
        }
    }

    options.push(OsString::from("--"));
    options.extend(files);
    Ok(options)
}

fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

/// Run the program for `args` (including the program name) and return the
/// process exit code.
pub async fn run<I, T>(args: I, defaults: Config) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    run_with_output(args, defaults, &mut std::io::stdout()).await
}

/// Like [`run`], writing the user-facing report to `out`. Diagnostics
/// still go to stderr.
pub async fn run_with_output<I, T, W>(args: I, defaults: Config, out: &mut W) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    W: Write,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() < 2 {
        let _ = writeln!(out, "{}", USAGE);
        return EXIT_FAILURE;
    }

    let cli = match Cli::parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FAILURE;
        }
    };

    let folder_id = match cli.folder_id.as_deref().map(parse_folder_id).transpose() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FAILURE;
        }
    };
    let files = existing_files(&cli.files);
    let config = cli.config(defaults);

    let credential = match Authenticator::new(config.clone()).credential().await {
        Ok(credential) => credential,
        Err(DriveError::SetupRequired { candidates }) => {
            let names: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            eprintln!("Client secret not found (looked for {}).", names.join(", "));
            eprintln!("{}", SETUP_INSTRUCTIONS);
            return EXIT_FAILURE;
        }
        Err(e) => {
            eprintln!("Authentication error: {}", e);
            return EXIT_FAILURE;
        }
    };
    let client = DriveClient::new(&config, &credential);

    if cli.list_folders {
        return match list_folders(&client, out).await {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                eprintln!("❌ Failed to list folders: {}", e);
                EXIT_FAILURE
            }
        };
    }

    if files.is_empty() {
        let _ = writeln!(out, "No file specified.");
        return EXIT_FAILURE;
    }

    for path in &files {
        if !path.exists() {
            eprintln!("File not found: {}", path.display());
            continue;
        }
        if let Err(e) = upload_one(&client, path, folder_id.as_deref(), out).await {
            tracing::debug!(path = %path.display(), error = ?e, "upload failed");
            eprintln!("❌ {:#}", e);
        }
    }

    EXIT_SUCCESS
}

/// Keep the paths that exist, reporting each one that does not.
pub fn existing_files(candidates: &[PathBuf]) -> Vec<PathBuf> {
    candidates
        .iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                eprintln!("File not found: {}", path.display());
            }
            exists
        })
        .cloned()
        .collect()
}

async fn upload_one<W: Write>(
    client: &DriveClient,
    path: &Path,
    folder_id: Option<&str>,
    out: &mut W,
) -> anyhow::Result<UploadResult> {
    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    writeln!(out, "Uploading {}...", display_name)?;

    let uploaded = client
        .upload_file(path, folder_id)
        .await
        .with_context(|| format!("Upload failed for {}", path.display()))?;

    writeln!(out, "✅ Uploaded: {}", uploaded.name)?;
    writeln!(
        out,
        "🔗 Link: {}",
        uploaded.web_view_link.as_deref().unwrap_or("-")
    )?;
    Ok(uploaded)
}

async fn list_folders<W: Write>(client: &DriveClient, out: &mut W) -> anyhow::Result<()> {
    let folders = client.list_folders().await?;
    if folders.is_empty() {
        writeln!(out, "No folders found.")?;
        return Ok(());
    }

    writeln!(out, "Available folders:")?;
    for folder in folders {
        writeln!(out, "  {}", folder)?;
    }
    Ok(())
}
