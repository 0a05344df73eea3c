//! Aiuta playground entry point.
//!
//! Runs both ends of the embed bridge in one process: the host SDK on an
//! in-memory page, and the try-on app inside the iframe that SDK creates.
//!
//! # Flow
//!
//! ```text
//! main()
//!  └─ Aiuta::try_on(product)        host: create iframe, handshake, app.tryOn
//!  └─ AppBootstrap (attached frame)  app: handshake, IFRAME_LOADED, serve app.tryOn
//!  └─ app → host                    sdk.setInteractive(true), sdk.trackEvent,
//!                                   sdk.setInteractive(false)
//!  └─ Aiuta::destroy()
//! ```
//!
//! Set `RUST_LOG=debug` to see every message crossing the channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aiuta_app::{AppBootstrap, TryOnHandler};
use aiuta_rpc::{HandlerError, PageEnvironment, RpcConfig};
use aiuta_sdk::infrastructure::document::memory::{FrameEnd, MemoryDocument};
use aiuta_sdk::infrastructure::document::Document;
use aiuta_sdk::{Aiuta, AiutaConfiguration};
use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aiuta-playground", about = "Try a product on through the Aiuta embed bridge")]
struct Cli {
    /// Widget configuration (`.json` or `.toml`).
    #[arg(long, env = "AIUTA_CONFIG")]
    config: Option<PathBuf>,

    /// API key used when no configuration file is given.
    #[arg(long, env = "AIUTA_API_KEY", default_value = "playground-key")]
    api_key: String,

    /// URL of the simulated merchant page.
    #[arg(long, env = "AIUTA_PAGE_URL", default_value = "https://shop.example/products/42")]
    page_url: String,

    /// Serve the app from this origin instead of the configured app URL.
    #[arg(long, env = "AIUTA_APP_ORIGIN")]
    app_origin: Option<String>,

    /// Product id to try on; repeat for several.
    #[arg(long = "product", env = "AIUTA_PRODUCT", default_value = "sku-42")]
    products: Vec<String>,

    /// Per-call timeout in milliseconds.
    #[arg(long, env = "AIUTA_CALL_TIMEOUT_MS", default_value_t = 10_000)]
    call_timeout_ms: u64,
}

impl Cli {
    fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            ..RpcConfig::default()
        }
    }

    fn configuration(&self) -> anyhow::Result<AiutaConfiguration> {
        let mut configuration = match &self.config {
            Some(path) => AiutaConfiguration::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AiutaConfiguration::with_api_key(&self.api_key),
        };
        if let Some(origin) = &self.app_origin {
            configuration = configuration
                .with_app_url(format!("{}/sdk/v0/index.html", origin.trim_end_matches('/')));
        }
        Ok(configuration)
    }
}

/// Stand-in for the try-on UI: accepts every product.
struct PlaygroundTryOn;

#[async_trait]
impl TryOnHandler for PlaygroundTryOn {
    async fn try_on(&self, product_ids: Vec<String>) -> Result<Value, HandlerError> {
        info!("app: opening try-on for {product_ids:?}");
        Ok(json!({ "status": "opened", "productIds": product_ids }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let configuration = cli.configuration()?;
    let iframe_id = configuration.iframe_id.clone();
    info!("Aiuta playground starting on {}", cli.page_url);

    // ── Host page ─────────────────────────────────────────────────────────────
    let document = Arc::new(MemoryDocument::new(&cli.page_url));
    let aiuta = Arc::new(
        Aiuta::new(configuration, document.clone(), &PageEnvironment::new(&cli.page_url))
            .context("creating the widget")?
            .with_rpc_config(cli.rpc_config()),
    );
    let host_try_on = tokio::spawn({
        let aiuta = aiuta.clone();
        let products = cli.products.clone();
        async move { aiuta.try_on(products).await }
    });

    // ── Iframe document ───────────────────────────────────────────────────────
    let frame = wait_for_frame(&document, &iframe_id).await?;
    let env = PageEnvironment::new(frame.href.clone())
        .with_ancestor_origins(vec![document.origin().to_string()]);
    let app = AppBootstrap::new(env, Arc::new(frame.parent), Arc::new(PlaygroundTryOn), cli.rpc_config())
        .context("bootstrapping the app")?;
    app.listen(frame.inbox);
    app.connect().await.context("app handshake")?;
    app.notify_loaded().context("announcing the app")?;

    let result = host_try_on
        .await
        .context("try-on task")?
        .context("try-on")?;
    info!("host: try-on resolved with {result}");

    // ── App drives the host ───────────────────────────────────────────────────
    let sdk = app.rpc().sdk();
    sdk.set_interactive(true).await.context("sdk.setInteractive")?;
    info!("host: pointer-events = {:?}", aiuta.iframe().pointer_events());
    sdk.track_event(json!({"type": "tryOnFinished", "productIds": cli.products}))
        .await
        .context("sdk.trackEvent")?;
    sdk.set_interactive(false).await.context("sdk.setInteractive")?;
    info!("host: pointer-events = {:?}", aiuta.iframe().pointer_events());

    aiuta.destroy();
    info!("done: {} iframe(s) left on the page", document.iframe_count());
    println!("{result}");
    Ok(())
}

/// Waits for the host to append the iframe, then takes the frame's side.
async fn wait_for_frame(document: &MemoryDocument, iframe_id: &str) -> anyhow::Result<FrameEnd> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while document.find_iframe(iframe_id).is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .context("the host never created the iframe")?;

    document
        .attach_frame(iframe_id)
        .with_context(|| format!("attaching iframe #{iframe_id}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
