mod config;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use livetail_client::{
    ClientError, LogStreamManager, SnapshotClient, SnapshotQuery, StreamEnvelope, StreamEvent,
    TokenProvider,
};
use livetail_logs::{
    ChannelSession, LogBuffer, LogRecord, SnapshotOutcome, SnapshotTicket, export_file_name,
    export_to_file,
};
use livetail_tui::{
    Action, AppState, Event, EventHandler, HelpOverlay, KeyBindings, KeyContext, LogViewerScreen,
    Tui,
};
use livetail_types::ConnectionStatus;

use crate::config::{Overrides, Settings};

/// livetail - tail and filter a live log channel in the terminal
#[derive(Parser, Debug)]
#[command(name = "livetail")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Channel to open first (defaults to the configured default channel)
    #[arg(value_name = "CHANNEL")]
    channel: Option<String>,

    /// Config file (defaults to $XDG_CONFIG_HOME/livetail/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log service base URL, e.g. https://admin.example.com
    #[arg(long)]
    base_url: Option<String>,

    /// Credential for the token endpoint
    #[arg(long, env = "LIVETAIL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number of records kept in memory
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Number of historical records fetched per channel
    #[arg(long)]
    snapshot_limit: Option<usize>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = init_tracing(args.log_file.as_deref())?;

    // Run the application
    let result = run_app(args).await;

    // Handle any errors
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Install the tracing subscriber; the guard must live until exit
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("--log-file '{}' has no file name", path.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

/// Results of spawned async work, handled on the main loop
enum InternalAction {
    TokenReady {
        channel: String,
        result: Result<String, ClientError>,
    },
    SnapshotLoaded {
        ticket: SnapshotTicket,
        result: Result<Vec<LogRecord>, ClientError>,
    },
}

/// Everything the event loop owns
struct App {
    settings: Settings,
    state: AppState,
    buffer: LogBuffer,
    session: ChannelSession,
    tokens: TokenProvider,
    snapshots: SnapshotClient,
    streams: LogStreamManager,
    internal_tx: mpsc::UnboundedSender<InternalAction>,
    snapshot_task: Option<JoinHandle<()>>,
}

async fn run_app(args: Args) -> Result<()> {
    let overrides = Overrides {
        channel: args.channel,
        base_url: args.base_url,
        api_key: args.api_key,
        buffer_size: args.buffer_size,
        snapshot_limit: args.snapshot_limit,
    };
    let settings =
        Settings::load(args.config.as_deref(), overrides).context("Failed to load configuration")?;
    info!(
        base_url = %settings.client.base_url,
        channel = %settings.initial_channel,
        capacity = settings.buffer_capacity,
        "starting livetail"
    );

    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<InternalAction>();
    let (stream_tx, mut stream_rx) = mpsc::unbounded_channel::<StreamEnvelope>();

    let mut app =
        App::new(settings, internal_tx, stream_tx).context("Failed to set up log service client")?;

    // Initialize TUI
    let mut tui = Tui::new().context("Failed to initialize terminal")?;
    let mut events = EventHandler::new(Duration::from_millis(100));
    let keybindings = KeyBindings::new();

    app.start();

    render(&mut tui, &mut app)?;

    // Main event loop
    loop {
        let render_now = tokio::select! {
            // Handle terminal events
            Some(event) = events.next() => match event {
                Event::Key(key) => {
                    let action = if app.state.ui_state.search_active {
                        keybindings.get_filter_input_action(&key)
                    } else {
                        keybindings.get_action(KeyContext::LogViewer, &key)
                    };
                    if let Some(action) = action {
                        app.handle_action(action);
                    }
                    true
                }
                Event::Tick => {
                    if app.state.expire_notification(Instant::now()) {
                        app.state.render_dirty = true;
                    }
                    app.state.render_dirty
                }
                Event::Resize(_, _) => true,
                Event::Error(e) => {
                    app.state.notify_error(format!("Terminal error: {}", e));
                    true
                }
            },

            // Live records; rendering waits for the next tick
            Some(envelope) = stream_rx.recv() => {
                app.handle_stream(envelope);
                false
            }

            // Handle internal async results
            Some(internal) = internal_rx.recv() => {
                app.handle_internal(internal);
                true
            }
        };

        if app.state.should_quit {
            break;
        }

        if render_now {
            render(&mut tui, &mut app)?;
        }
    }

    // Cleanup
    app.shutdown();
    events.shutdown();
    tui.restore()?;

    Ok(())
}

impl App {
    fn new(
        settings: Settings,
        internal_tx: mpsc::UnboundedSender<InternalAction>,
        stream_tx: mpsc::UnboundedSender<StreamEnvelope>,
    ) -> Result<Self, ClientError> {
        let tokens = TokenProvider::new(&settings.client)?;
        let snapshots = SnapshotClient::new(&settings.client, tokens.clone())?;
        let streams = LogStreamManager::new(&settings.client, stream_tx);

        Ok(Self {
            state: AppState::new(
                settings.channels.clone(),
                &settings.initial_channel,
                settings.follow_threshold,
            ),
            buffer: LogBuffer::new(settings.buffer_capacity),
            session: ChannelSession::new(settings.initial_channel.clone()),
            tokens,
            snapshots,
            streams,
            internal_tx,
            snapshot_task: None,
            settings,
        })
    }

    /// Seed history and open the live channel
    fn start(&mut self) {
        let ticket = self.session.begin_load();
        self.start_snapshot(ticket);
        self.request_connect();
    }

    /// Fetch history for the session's current request
    fn start_snapshot(&mut self, ticket: SnapshotTicket) {
        if let Some(task) = self.snapshot_task.take() {
            task.abort();
        }

        let query = SnapshotQuery::new(ticket.channel(), self.settings.snapshot_limit)
            .with_level(self.state.filter.level.level())
            .with_query(&self.state.filter.search);
        let client = self.snapshots.clone();
        let tx = self.internal_tx.clone();

        self.state.loading = true;
        self.snapshot_task = Some(tokio::spawn(async move {
            let result = client.fetch(&query).await;
            let _ = tx.send(InternalAction::SnapshotLoaded { ticket, result });
        }));
    }

    /// Get a token for the current channel, then subscribe
    fn request_connect(&mut self) {
        self.state.set_status(ConnectionStatus::Authenticating);

        let channel = self.session.channel().to_string();
        let tokens = self.tokens.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = tokens.token().await;
            let _ = tx.send(InternalAction::TokenReady { channel, result });
        });
    }

    fn switch_channel(&mut self, channel: String) {
        if let Some(ticket) = self.session.switch_to(&channel, &self.buffer) {
            self.streams.disconnect();
            self.start_snapshot(ticket);
            self.request_connect();
        }
    }

    fn handle_internal(&mut self, internal: InternalAction) {
        match internal {
            InternalAction::TokenReady { channel, result } => {
                if channel != self.session.channel() {
                    debug!(%channel, "ignoring token for previous channel");
                    return;
                }
                match result {
                    Ok(token) => {
                        self.state.set_status(ConnectionStatus::Connecting);
                        if let Err(e) = self.streams.connect(&channel, &token) {
                            warn!(error = %e, "could not open live channel");
                            self.state
                                .set_status(ConnectionStatus::Disconnected(e.to_string()));
                        }
                    }
                    Err(e) if e.is_auth() => {
                        self.state.set_status(ConnectionStatus::AuthFailed(e.to_string()));
                    }
                    Err(e) => {
                        self.state
                            .set_status(ConnectionStatus::Disconnected(e.to_string()));
                    }
                }
            }

            InternalAction::SnapshotLoaded { ticket, result } => {
                let channel = ticket.channel().to_string();
                match self.session.complete(&ticket, result, &self.buffer) {
                    SnapshotOutcome::Applied(count) => {
                        debug!(%channel, epoch = ticket.epoch(), count, "history loaded");
                    }
                    SnapshotOutcome::Stale => {}
                    SnapshotOutcome::Failed(e) => {
                        warn!(%channel, error = %e, "history request failed");
                        self.state
                            .notify_error(format!("Could not load history for {}: {}", channel, e));
                    }
                }
                self.state.loading = self.session.is_loading();
            }
        }
    }

    fn handle_stream(&mut self, envelope: StreamEnvelope) {
        // Events from a replaced subscription are dropped here
        if !self.streams.is_current(envelope.subscription) {
            return;
        }

        match envelope.event {
            StreamEvent::Open => {
                self.state.set_status(ConnectionStatus::Connected);
            }
            StreamEvent::Record(record) => {
                if self.buffer.push(record) {
                    self.state.render_dirty = true;
                }
            }
            StreamEvent::Malformed(_) => {
                self.state.dropped += 1;
                self.state.render_dirty = true;
            }
            StreamEvent::Error(reason) => {
                self.state.set_status(ConnectionStatus::Disconnected(reason));
            }
            StreamEvent::Closed => {
                // An earlier Error already carries the reason
                if self.state.status.is_live() {
                    self.state.set_status(ConnectionStatus::Disconnected(
                        "server closed the connection".to_string(),
                    ));
                }
            }
        }
    }

    fn handle_action(&mut self, action: Action) {
        // Help overlay swallows everything but its own keys
        if self.state.ui_state.help_visible
            && !matches!(action, Action::ToggleHelp | Action::Dismiss | Action::Quit)
        {
            return;
        }

        match action {
            Action::Quit => {
                self.state.should_quit = true;
            }
            Action::ToggleHelp => {
                self.state.ui_state.help_visible = !self.state.ui_state.help_visible;
            }
            Action::Dismiss => {
                self.state.dismiss();
            }

            // Channels
            Action::NextChannel => {
                if let Some(channel) = self.state.next_channel() {
                    self.switch_channel(channel);
                }
            }
            Action::PrevChannel => {
                if let Some(channel) = self.state.prev_channel() {
                    self.switch_channel(channel);
                }
            }
            Action::SelectChannel(index) => {
                if let Some(channel) = self.state.select_channel(index) {
                    self.switch_channel(channel);
                }
            }
            Action::RefreshSnapshot => {
                let ticket = self.session.begin_load();
                self.start_snapshot(ticket);
            }
            Action::Reconnect => {
                self.streams.disconnect();
                self.request_connect();
            }

            // Filter/Search actions
            Action::OpenSearch => self.state.start_search(),
            Action::CloseSearch => self.state.cancel_search(),
            Action::SearchInput(c) => self.state.search_input_char(c),
            Action::SearchBackspace => self.state.search_input_backspace(),
            Action::SearchClear => self.state.ui_state.search_input.clear(),
            Action::ApplyFilter => self.state.apply_filter(),
            Action::ClearFilter => self.state.clear_filter(),
            Action::NextLevel => self.state.cycle_level(true),
            Action::PrevLevel => self.state.cycle_level(false),

            // Scrolling
            Action::ScrollUp(n) => self.state.ui_state.follow.scroll_up(n),
            Action::ScrollDown(n) => self.state.ui_state.follow.scroll_down(n),
            Action::PageUp => self.state.ui_state.follow.page_up(),
            Action::PageDown => self.state.ui_state.follow.page_down(),
            Action::ScrollToTop => self.state.ui_state.follow.scroll_to_top(),
            Action::ScrollToBottom => self.state.ui_state.follow.scroll_to_bottom(),
            Action::ToggleFollow => self.state.ui_state.follow.toggle(),

            // Display toggles
            Action::ToggleTimestamps => {
                self.state.ui_state.show_timestamps = !self.state.ui_state.show_timestamps;
            }
            Action::ToggleLocalTime => {
                self.state.ui_state.use_local_time = !self.state.ui_state.use_local_time;
            }
            Action::ToggleSources => {
                self.state.ui_state.show_sources = !self.state.ui_state.show_sources;
            }
            Action::ToggleDetails => {
                self.state.ui_state.show_details = !self.state.ui_state.show_details;
            }
            Action::ToggleStats => {
                self.state.ui_state.stats_visible = !self.state.ui_state.stats_visible;
            }

            Action::ClearView => {
                self.buffer.clear();
                self.state.ui_state.follow.reset();
            }
            Action::ExportLogs => self.export_view(),
        }
        self.state.render_dirty = true;
    }

    /// Write the filtered view to a timestamped file in the working directory
    fn export_view(&mut self) {
        let format = self.settings.export_format;
        let filename = export_file_name(self.session.channel(), chrono::Local::now(), format);
        let records = self.state.visible_records(&self.buffer).to_vec();

        match export_to_file(Path::new(&filename), &records, format) {
            Ok(count) => {
                info!(%filename, count, "exported view");
                self.state.notify(format!("Exported {} logs to {}", count, filename));
            }
            Err(e) => {
                warn!(%filename, error = %e, "export failed");
                self.state.notify_error(format!("Export failed: {}", e));
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.snapshot_task.take() {
            task.abort();
        }
        self.streams.disconnect();
    }
}

fn render(tui: &mut Tui, app: &mut App) -> Result<()> {
    let App { state, buffer, .. } = app;
    tui.draw(|frame| {
        LogViewerScreen::render(frame, state, buffer);

        // Render help overlay if visible
        if state.ui_state.help_visible {
            HelpOverlay::render(frame);
        }
    })?;
    state.render_dirty = false;

    Ok(())
}
