//! NextGCore MME S1 Session-Control Daemon
//!
//! Accepts eNB associations and runs the S1AP procedures against a single
//! context store owned by the event loop.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::net::IpAddr;
use tokio::sync::mpsc;

use nextgcore_s1mme::s1ap_path::{self, S1apServer};
use nextgcore_s1mme::{MmeConfig, S1apContext, S1apDispatcher, S1apEvent};

/// NextGCore MME - S1 session control
#[derive(Parser, Debug)]
#[command(name = "nextgcore-s1mme")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "EPC MME S1 session-control core")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/nextgcore/mme.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(long)]
    no_color: bool,

    /// Run in daemon mode
    #[arg(short, long)]
    daemon: bool,

    /// S1AP listen address (overrides config)
    #[arg(long)]
    addr: Option<IpAddr>,

    /// S1AP listen port (overrides config)
    #[arg(long)]
    port: Option<u16>,
}

/// MME application state
pub struct MmeApp {
    /// Loaded configuration
    config: MmeConfig,
    /// eNB and UE contexts
    ctx: S1apContext,
    /// Event channel feeding the S1AP event loop
    events_tx: mpsc::UnboundedSender<S1apEvent>,
    events_rx: mpsc::UnboundedReceiver<S1apEvent>,
}

impl MmeApp {
    /// Create a new MME application
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let config = MmeConfig::default();
        Self {
            ctx: S1apContext::with_m_tmsi_seed(config.m_tmsi_seed),
            config,
            events_tx,
            events_rx,
        }
    }

    /// Load configuration and apply command-line overrides
    pub fn init(&mut self, config_path: &str, addr: Option<IpAddr>, port: Option<u16>) -> Result<()> {
        log::info!("Initializing MME...");

        let mut config = MmeConfig::load(config_path)
            .with_context(|| format!("loading configuration from {config_path}"))?;
        if let Some(addr) = addr {
            config.s1ap.addr = addr;
        }
        if let Some(port) = port {
            config.s1ap.port = port;
        }

        self.ctx = S1apContext::with_m_tmsi_seed(config.m_tmsi_seed);
        log::debug!("S1AP context initialized (M-TMSI seed {:#x})", config.m_tmsi_seed);
        log::debug!(
            "Served PLMN {} MMEGI {} MMEC {}",
            config.served_plmn().to_bcd(),
            config.gummei.mme_gid,
            config.gummei.mme_code
        );
        self.config = config;

        log::info!("MME initialized successfully");
        Ok(())
    }

    /// Run the S1AP server and event loop until shutdown
    pub async fn run(&mut self) -> Result<()> {
        log::info!("MME running...");

        let server = S1apServer::bind(self.config.bind_addr(), self.events_tx.clone())
            .await
            .with_context(|| format!("binding S1AP server on {}", self.config.bind_addr()))?;
        let server_task = tokio::spawn(async move {
            if let Err(e) = server.run().await {
                log::error!("S1AP server stopped: {}", e);
            }
        });

        let mut dispatcher = S1apDispatcher::new(&self.config);
        s1ap_path::run_event_loop(&mut self.ctx, &mut dispatcher, &mut self.events_rx).await;

        server_task.abort();
        log::info!("MME main loop exited");
        Ok(())
    }

    /// Shutdown the MME application
    pub fn shutdown(&mut self) {
        log::info!("Shutting down MME...");
        self.stop();
        self.ctx.clear();
        log::debug!("S1AP context finalized");
        log::info!("MME shutdown complete");
    }

    /// Signal the event loop to stop
    pub fn stop(&self) {
        let _ = self.events_tx.send(S1apEvent::Shutdown);
    }

    /// Sender that signal handlers use to stop the event loop
    pub fn event_sender(&self) -> mpsc::UnboundedSender<S1apEvent> {
        self.events_tx.clone()
    }
}

impl Default for MmeApp {
    fn default() -> Self {
        Self::new()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    let write_style = if args.no_color {
        env_logger::WriteStyle::Never
    } else {
        env_logger::WriteStyle::Auto
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .write_style(write_style)
        .format_timestamp_millis()
        .init();

    log::info!("NextGCore MME S1 v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration: {}", args.config);
    if args.daemon {
        log::warn!("Daemon mode is not supported, running in foreground");
    }

    let mut app = MmeApp::new();

    // Setup signal handlers
    let events = app.event_sender();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        let _ = events.send(S1apEvent::Shutdown);
    })?;

    app.init(&args.config, args.addr, args.port)?;
    app.run().await?;
    app.shutdown();

    log::info!("NextGCore MME terminated");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mme_app_creation() {
        let mut app = MmeApp::new();
        assert_eq!(app.ctx.enb_count(), 0);
        assert!(app.events_rx.try_recv().is_err());
    }

    #[test]
    fn test_mme_app_stop_queues_shutdown() {
        let mut app = MmeApp::new();
        app.stop();
        assert!(matches!(app.events_rx.try_recv(), Ok(S1apEvent::Shutdown)));

        // Signal handlers stop through a cloned sender
        let events = app.event_sender();
        events.send(S1apEvent::Shutdown).unwrap();
        assert!(matches!(app.events_rx.try_recv(), Ok(S1apEvent::Shutdown)));
    }

    #[test]
    fn test_mme_app_init_overrides() {
        let mut app = MmeApp::new();
        app.init(
            "/nonexistent/nextgcore/mme.yaml",
            Some("0.0.0.0".parse().unwrap()),
            Some(0),
        )
        .unwrap();
        assert_eq!(app.config.bind_addr(), "0.0.0.0:0".parse().unwrap());
    }

    #[tokio::test]
    async fn test_mme_app_run_until_stopped() {
        let mut app = MmeApp::new();
        app.init("/nonexistent/nextgcore/mme.yaml", None, Some(0)).unwrap();
        app.stop();
        app.run().await.unwrap();
        app.shutdown();
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["nextgcore-s1mme", "-c", "/tmp/mme.yaml", "--port", "5000"]);
        assert_eq!(args.config, "/tmp/mme.yaml");
        assert_eq!(args.port, Some(5000));
        assert!(args.addr.is_none());
    }
}
