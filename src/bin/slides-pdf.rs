//! CLI binary for slides-pdf.
//!
//! `serve` runs the HTTP endpoint; `build` assembles a deck from URLs or
//! local files straight to disk. Both are thin shims that map flags to
//! `AssemblyConfig`.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use slides_pdf::pipeline::emit::local_filename;
use slides_pdf::server::{self, AppState};
use slides_pdf::{
    assemble_http, assemble_to_file, AssemblyConfig, AssemblyProgressCallback, AuthProvider,
    HttpFetcher, ProgressCallback, SlideRequest, StaticTokenAuth, SupabaseAuth,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────

/// Progress bar over the requested images; one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Fetching");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl AssemblyProgressCallback for CliProgressCallback {
    fn on_assembly_start(&self, total_inputs: usize) {
        self.bar.set_length(total_inputs as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Assembling {total_inputs} images…"))
        ));
    }

    fn on_image_fetched(&self, input_num: usize, _total: usize, bytes: usize) {
        self.bar
            .set_message(dim(&format!("#{input_num} {} KiB", bytes / 1024)));
    }

    fn on_slide_added(&self, input_num: usize, page_num: usize, total_inputs: usize) {
        self.bar.set_prefix("Composing");
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            green("✓"),
            input_num,
            total_inputs,
            dim(&format!("page {page_num}")),
        ));
        self.bar.inc(1);
    }

    fn on_image_skipped(&self, input_num: usize, total_inputs: usize, error: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            red("✗"),
            input_num,
            total_inputs,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_assembly_complete(&self, total_inputs: usize, page_count: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        if skipped == 0 {
            eprintln!("{} {} pages assembled", green("✔"), bold(&page_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images used  ({} skipped)",
                if page_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&page_count.to_string()),
                total_inputs,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the endpoint, validating sessions against Supabase
  slides-pdf serve --supabase-url https://xyz.supabase.co --supabase-anon-key eyJ...

  # Serve with fixed tokens (self-hosting, local testing)
  slides-pdf serve --auth static --static-token devtoken=alice

  # Build a deck from URLs and local files
  slides-pdf build https://cdn.example.com/1.png ./2.jpg --title "Quarterly Report"

  # Write to a specific file and print the per-image report
  slides-pdf build a.png b.png -o deck.pdf --json

ENDPOINT:
  POST /api/studio/slides/pdf
    Authorization: Bearer <token>   (or cookie sb-access-token=<token>)
    {"imageUrls": ["https://…", …], "title": "My Deck"}
  → application/pdf, attachment; filename="My%20Deck.pdf"

ENVIRONMENT VARIABLES:
  SLIDES_PDF_HOST, SLIDES_PDF_PORT             Bind address
  SLIDES_PDF_AUTH                              supabase | static
  SUPABASE_URL, SUPABASE_ANON_KEY              Supabase project
  SLIDES_PDF_STATIC_TOKENS                     Comma-separated TOKEN=USER pairs
  SLIDES_PDF_FETCH_TIMEOUT                     Per-image timeout, seconds
  SLIDES_PDF_CONCURRENCY                       Parallel fetches
  SLIDES_PDF_MAX_IMAGE_MB                      Per-image size cap
  RUST_LOG                                     Overrides -v / -q
"#;

/// Turn slide images into an A4-landscape PDF deck.
#[derive(Parser, Debug)]
#[command(
    name = "slides-pdf",
    version,
    about = "Turn slide images into an A4-landscape PDF deck",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SLIDES_PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SLIDES_PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Assemble a deck locally and write it to disk.
    Build(BuildArgs),
}

/// Limits shared by both subcommands.
#[derive(Args, Debug)]
struct FetchArgs {
    /// Per-image fetch timeout in seconds.
    #[arg(long, env = "SLIDES_PDF_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Number of images fetched in parallel.
    #[arg(short, long, env = "SLIDES_PDF_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-image size cap in MiB.
    #[arg(long, env = "SLIDES_PDF_MAX_IMAGE_MB", default_value_t = 25)]
    max_image_mb: u64,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host address to bind to.
    #[arg(long, env = "SLIDES_PDF_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "SLIDES_PDF_PORT", default_value_t = 3000)]
    port: u16,

    /// How sessions are validated.
    #[arg(long, env = "SLIDES_PDF_AUTH", value_enum, default_value = "supabase")]
    auth: AuthKind,

    /// Supabase project URL.
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Supabase anon key, sent as `apikey`.
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    supabase_anon_key: Option<String>,

    /// TOKEN=USER pair accepted by `--auth static` (repeatable).
    #[arg(
        long = "static-token",
        env = "SLIDES_PDF_STATIC_TOKENS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    static_tokens: Vec<String>,

    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Image URLs or local file paths, in slide order.
    #[arg(required = true)]
    locators: Vec<String>,

    /// Deck title; also names the output file.
    #[arg(short, long)]
    title: Option<String>,

    /// Output file. Defaults to "<title>.pdf" (unencoded) in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the per-image report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDES_PDF_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    fetch: FetchArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AuthKind {
    Supabase,
    Static,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The build progress bar replaces INFO logs; the server always logs.
    let bar_active = matches!(&cli.command, Command::Build(b) if !b.no_progress && !b.json);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_active {
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

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Build(args) => run_build(args, cli.quiet).await,
    }
}

/// Map the shared fetch flags to `AssemblyConfig`.
fn build_config(
    fetch: &FetchArgs,
    allow_local_files: bool,
    progress: Option<ProgressCallback>,
) -> Result<AssemblyConfig> {
    let mut builder = AssemblyConfig::builder()
        .fetch_timeout_secs(fetch.fetch_timeout)
        .concurrency(fetch.concurrency)
        .max_image_bytes(fetch.max_image_mb.saturating_mul(1024 * 1024))
        .allow_local_files(allow_local_files);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.fetch, false, None)?;

    let auth: Arc<dyn AuthProvider> = match args.auth {
        AuthKind::Supabase => {
            let (Some(url), Some(key)) = (&args.supabase_url, &args.supabase_anon_key) else {
                bail!("--auth supabase needs --supabase-url and --supabase-anon-key");
            };
            Arc::new(
                SupabaseAuth::new(url.as_str(), key.as_str(), args.fetch.fetch_timeout)
                    .context("Failed to set up Supabase auth")?,
            )
        }
        AuthKind::Static => {
            let auth = StaticTokenAuth::from_pairs(&args.static_tokens)
                .context("Invalid --static-token")?;
            if auth.is_empty() {
                bail!("--auth static needs at least one --static-token TOKEN=USER");
            }
            Arc::new(auth)
        }
    };

    let fetcher = Arc::new(HttpFetcher::new(&config).context("Failed to build HTTP client")?);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;

    tracing::info!(
        "Auth: {:?}, fetch timeout {}s, concurrency {}, image cap {} MiB",
        args.auth,
        config.fetch_timeout_secs,
        config.concurrency,
        args.fetch.max_image_mb
    );

    server::serve(addr, AppState::new(auth, fetcher, config))
        .await
        .context("Server error")
}

async fn run_build(args: BuildArgs, quiet: bool) -> Result<()> {
    let show_progress = !quiet && !args.no_progress && !args.json;
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AssemblyProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args.fetch, true, progress)?;
    let request = SlideRequest::new(args.locators.clone(), args.title.clone())
        .context("Nothing to assemble")?;

    // `assemble_to_file` only returns stats; the JSON report needs the per-image results.
    let (path, stats, slides) = match args.output {
        Some(path) if !args.json => {
            let stats = assemble_to_file(&request, &path, &config)
                .await
                .context("Assembly failed")?;
            (path, stats, None)
        }
        output => {
            let deck = assemble_http(&request, &config)
                .await
                .context("Assembly failed")?;
            let path = output.unwrap_or_else(|| {
                PathBuf::from(local_filename(args.title.as_deref(), &config.default_title))
            });
            tokio::fs::write(&path, &deck.pdf)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            (path, deck.stats, Some(deck.slides))
        }
    };

    if args.json {
        let report = serde_json::json!({
            "output": path.display().to_string(),
            "stats": stats,
            "slides": slides,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}",
            if stats.skipped() == 0 { green("✔") } else { cyan("⚠") },
            stats.pages,
            stats.requested,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }

    Ok(())
}
