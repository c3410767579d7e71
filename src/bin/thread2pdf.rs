//! CLI binary for thread2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to `ExportConfig`
//! and writes the artefact.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thread2pdf::export::write_atomic;
use thread2pdf::{
    export, export_verified, CommentSort, ExportConfig, ExportError, ExportOutput,
    ExportProgressCallback, ExportStage, ExportStats, HiddenReplies, OutputFormat, PaperSize,
    ProgressCallback, Secrets,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the pipeline stages. Expansion can take many
/// requests on big threads, so it reports those as they happen.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, thread_url: &str) {
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("Exporting {thread_url}"))));
    }

    fn on_stage(&self, stage: ExportStage) {
        self.bar.set_prefix(stage.label());
        self.bar.set_message("");
    }

    fn on_comments_expanded(&self, requests: usize, pending: usize) {
        self.bar.set_message(format!(
            "{requests} request(s), {pending} placeholder(s) left"
        ));
    }

    fn on_export_complete(&self, stats: &ExportStats) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} comments rendered  {}",
            green("✔"),
            bold(&stats.comments_rendered.to_string()),
            dim(&format!(
                "({} hidden, {} expansion requests)",
                stats.comments_hidden, stats.expansion_requests
            )),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # PDF named after the thread, in the current directory
  thread2pdf https://www.reddit.com/r/rust/comments/abc123/some_thread/

  # Markdown outline to stdout
  thread2pdf --format markdown https://www.reddit.com/r/rust/comments/abc123/some_thread/

  # HTML to a file, newest comments first
  thread2pdf --format html --sort new -o thread.html https://www.reddit.com/r/...

  # Large thread: cap "load more" requests, show only well-received comments
  thread2pdf --more-limit 20 --min-score 5 https://www.reddit.com/r/...

  # Verify an hCaptcha token first (as a web front end would)
  thread2pdf --captcha-token "$TOKEN" --hcaptcha-secret 0x... https://www.reddit.com/r/...

SECRETS FILE (TOML):
  [reddit]
  client_id  = "..."
  secret_key = "..."

  [hcaptcha]
  secret_key = "..."
  verify_url = "https://api.hcaptcha.com/siteverify"   # optional

ENVIRONMENT VARIABLES:
  REDDIT_CLIENT_ID        Reddit app client id
  REDDIT_CLIENT_SECRET    Reddit app secret
  THREAD2PDF_SECRETS      Path to a secrets file
  HCAPTCHA_SECRET         hCaptcha secret key
  PDFIUM_LIB_PATH         pdfium library, or the directory holding it
  THREAD2PDF_FONT         TrueType font for non-Latin text (e.g. NotoSans)
  RUST_LOG                Log filter, e.g. thread2pdf=debug

Without Reddit credentials the public JSON endpoints are used. They work
for most threads but are rate-limited much more aggressively.
"#;

/// Back up Reddit threads as PDF, HTML, or Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "thread2pdf",
    version,
    about = "Back up Reddit threads as PDF, HTML, or Markdown",
    long_about = "Fetch a Reddit thread with its full comment tree, flatten it into an \
indented outline, and save it as a PDF, an HTML page, or Markdown.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Full thread URL, e.g. https://www.reddit.com/r/sub/comments/abc123/title/
    url: String,

    /// Write to this file. PDFs default to a name derived from the thread;
    /// Markdown and HTML default to stdout.
    #[arg(short, long, env = "THREAD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "THREAD2PDF_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// TOML secrets file with [reddit] and [hcaptcha] tables.
    #[arg(long, env = "THREAD2PDF_SECRETS")]
    secrets: Option<PathBuf>,

    /// Reddit app client id (overrides the secrets file).
    #[arg(long, env = "REDDIT_CLIENT_ID")]
    client_id: Option<String>,

    /// Reddit app secret (overrides the secrets file).
    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// User-Agent sent to Reddit.
    #[arg(long, env = "THREAD2PDF_USER_AGENT")]
    user_agent: Option<String>,

    /// hCaptcha response token to verify before exporting.
    #[arg(long)]
    captcha_token: Option<String>,

    /// Client IP to bind the captcha check to.
    #[arg(long, requires = "captcha_token")]
    remote_ip: Option<String>,

    /// hCaptcha secret key (overrides the secrets file).
    #[arg(long, env = "HCAPTCHA_SECRET", hide_env_values = true)]
    hcaptcha_secret: Option<String>,

    /// Maximum "load more" requests. Unlimited when omitted.
    #[arg(long, env = "THREAD2PDF_MORE_LIMIT")]
    more_limit: Option<usize>,

    /// Comment sort order.
    #[arg(long, value_enum, default_value = "confidence")]
    sort: SortArg,

    /// Leave out comments scoring below this.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    min_score: i64,

    /// Drop the replies of comments left out by --min-score as well.
    #[arg(long)]
    prune_hidden_replies: bool,

    /// PDF paper size.
    #[arg(long, value_enum, default_value = "a4")]
    paper: PaperArg,

    /// PDF body font size in points (6–24).
    #[arg(long, default_value_t = 10.0)]
    font_size: f32,

    /// pdfium library or the directory holding it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// TrueType font for emoji, CJK, and other non-Latin text in the PDF.
    #[arg(long, env = "THREAD2PDF_FONT")]
    font: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "THREAD2PDF_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Retries on rate limits, server errors, and timeouts.
    #[arg(long, env = "THREAD2PDF_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Print the export result as JSON (without the binary artefact).
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "THREAD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Html,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Confidence,
    Top,
    New,
    Controversial,
    Old,
    Qa,
}

impl From<SortArg> for CommentSort {
    fn from(v: SortArg) -> Self {
        match v {
            SortArg::Confidence => CommentSort::Confidence,
            SortArg::Top => CommentSort::Top,
            SortArg::New => CommentSort::New,
            SortArg::Controversial => CommentSort::Controversial,
            SortArg::Old => CommentSort::Old,
            SortArg::Qa => CommentSort::Qa,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PaperArg {
    A4,
    Letter,
}

impl From<PaperArg> for PaperSize {
    fn from(v: PaperArg) -> Self {
        match v {
            PaperArg::A4 => PaperSize::A4,
            PaperArg::Letter => PaperSize::Letter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level feedback, so library logs drop to
    // errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run export ───────────────────────────────────────────────────────
    let result = match &cli.captcha_token {
        Some(token) => export_verified(&cli.url, token, cli.remote_ip.as_deref(), &config).await,
        None => export(&cli.url, &config).await,
    };
    let output = match result {
        Ok(output) => output,
        Err(e) => return Err(report(e)),
    };

    // ── Write artefact ───────────────────────────────────────────────────
    let destination = match (&cli.output, output.format) {
        (Some(path), _) => Some(path.clone()),
        (None, OutputFormat::Pdf) => Some(PathBuf::from(&output.filename)),
        (None, _) => None,
    };

    match &destination {
        Some(path) => write_atomic(path, &output.bytes).map_err(report)?,
        None if !cli.json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&output.bytes)
                .context("Failed to write to stdout")?;
            if !output.bytes.ends_with(b"\n") {
                handle.write_all(b"\n").ok();
            }
        }
        None => {}
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&output, destination.as_ref(), show_progress);
    }

    Ok(())
}

/// Show the end-user message, keep the full chain for `anyhow`.
fn report(e: ExportError) -> anyhow::Error {
    eprintln!("{} {}", red("✘"), bold(&e.user_message()));
    anyhow::Error::new(e).context("Export failed")
}

fn print_summary(output: &ExportOutput, destination: Option<&PathBuf>, progress_shown: bool) {
    let stats = &output.stats;
    if !progress_shown {
        eprintln!(
            "Exported {}/{} comments in {}ms",
            stats.comments_rendered, stats.comments_fetched, stats.total_duration_ms
        );
    }
    if let Some(path) = destination {
        let pages = if stats.pdf_pages > 0 {
            format!("{} pages  ", stats.pdf_pages)
        } else {
            String::new()
        };
        eprintln!(
            "   {}{}  →  {}",
            dim(&pages),
            dim(&format!("{} bytes", stats.output_bytes)),
            bold(&path.display().to_string()),
        );
    }
    if stats.unresolved_placeholders > 0 {
        eprintln!(
            "   {} {} \"load more\" placeholder(s) left unresolved (--more-limit)",
            cyan("⚠"),
            stats.unresolved_placeholders
        );
    }
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder();

    if let Some(path) = &cli.secrets {
        let secrets = Secrets::load(path).context("Failed to load secrets")?;
        builder = builder.secrets(secrets);
    }
    match (&cli.client_id, &cli.client_secret) {
        (Some(id), Some(secret)) => builder = builder.credentials(id, secret),
        (None, None) => {}
        _ => anyhow::bail!("--client-id and --client-secret must be given together"),
    }
    if let Some(secret) = &cli.hcaptcha_secret {
        builder = builder.captcha(secret, thread2pdf::config::DEFAULT_HCAPTCHA_VERIFY_URL);
    }
    if let Some(agent) = &cli.user_agent {
        builder = builder.user_agent(agent);
    }
    if let Some(path) = &cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(font) = &cli.font {
        builder = builder.unicode_font(font);
    }

    builder = builder
        .format(cli.format.into())
        .more_comments_limit(cli.more_limit)
        .comment_sort(cli.sort.into())
        .min_score(cli.min_score)
        .hidden_replies(if cli.prune_hidden_replies {
            HiddenReplies::Prune
        } else {
            HiddenReplies::Keep
        })
        .paper(cli.paper.into())
        .font_size(cli.font_size)
        .request_timeout_secs(cli.timeout)
        .max_retries(cli.max_retries);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
