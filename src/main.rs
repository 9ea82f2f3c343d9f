use dotenvy::dotenv;
use regex::Regex;
use sora_fetch_bot::bot::handlers::{sender_id, Command};
use sora_fetch_bot::bot::polling::PollingErrorHandler;
use sora_fetch_bot::bot::{DownloadOrchestrator, LinkFlow};
use sora_fetch_bot::cache::LinkCache;
use sora_fetch_bot::config::{
    Settings, LINK_CACHE_MAX_SIZE, LINK_CACHE_TTL_SECS, POLLING_CONFLICT_BACKOFF_SECS,
};
use sora_fetch_bot::download::DownloadEngine;
use sora_fetch_bot::resolver::ResolverClient;
use sora_fetch_bot::{bot, health};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::update_listeners;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
}

impl RedactionPatterns {
    /// Compile all redaction patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token1.replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self.token2.replace_all(&output, "[TELEGRAM_TOKEN]");
        self.token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the caller's length; the redacted text may differ in size
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Sora fetch bot...");

    let settings = init_settings();
    let shutdown = CancellationToken::new();
    init_health(&settings, &shutdown);

    let flow = init_flow(&settings);
    let bot = Bot::new(settings.telegram_token.clone());
    let listener = update_listeners::polling_default(bot.clone()).await;

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![flow])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            PollingErrorHandler::new(Duration::from_secs(POLLING_CONFLICT_BACKOFF_SECS)),
        )
        .await;

    shutdown.cancel();
    info!("Bot stopped.");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_health(settings: &Settings, shutdown: &CancellationToken) {
    let Some(port) = settings.health_port else {
        return;
    };
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = health::serve(port, shutdown).await {
            error!("Health endpoint failed on port {port}: {e}");
        }
    });
}

fn init_flow(settings: &Settings) -> Arc<LinkFlow> {
    let download_dir = settings.download_dir();
    info!(
        "Initializing pipeline (resolver: {}, download dir: {}, cache ttl: {}s)",
        settings.resolver_api_url,
        download_dir.display(),
        LINK_CACHE_TTL_SECS
    );

    let cache = LinkCache::new(LINK_CACHE_TTL_SECS, LINK_CACHE_MAX_SIZE);
    let resolver = ResolverClient::new(settings.resolver_api_url.clone());
    let engine = Arc::new(DownloadEngine::new(download_dir));
    let orchestrator = Arc::new(DownloadOrchestrator::new(engine));

    Arc::new(LinkFlow::new(cache, resolver, orchestrator))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text_message),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start | Command::Help => bot::handlers::start(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text_message(
    bot: Bot,
    msg: Message,
    flow: Arc<LinkFlow>,
) -> Result<(), teloxide::RequestError> {
    let user_id = sender_id(&msg);
    match bot::handlers::handle_text(bot, msg, flow).await {
        Ok(phase) => info!(?user_id, %phase, "Message handled"),
        Err(e) => error!("Text handler error for user {user_id:?}: {e}"),
    }
    respond(())
}
