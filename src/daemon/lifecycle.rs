use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::log_buffer::LogBuffer;
use super::process::{BinaryRunner, LineConsumer, ProcessHandle, ProcessRunner};
use super::state::{Dispatch, LifecycleCommand, NodeState, NodeStatus};
use crate::config_store::{ConfigStore, CorsPolicy};
use crate::error::Result;
use crate::installer::{BinaryInstaller, Installer};
use crate::settings::WardenSettings;

pub const INIT_COMMAND: &str = "init";
pub const DAEMON_COMMAND: &str = "daemon --enable-pubsub-experiment";

const NODE_LOG_TARGET: &str = "warden::node";

#[derive(Default)]
struct Details {
    pid: Option<u32>,
    last_init_exit: Option<i32>,
}

/// Owns the single tracked daemon and its log buffer.
///
/// Every lifecycle operation holds the daemon slot for its whole duration,
/// so concurrent callers are served one at a time.
pub struct LifecycleManager {
    installer: Arc<dyn Installer>,
    runner: Arc<dyn ProcessRunner>,
    config: ConfigStore,
    cors: CorsPolicy,
    logs: Arc<LogBuffer>,
    daemon: tokio::sync::Mutex<Option<Box<dyn ProcessHandle>>>,
    state: watch::Sender<NodeState>,
    details: Mutex<Details>,
}

impl LifecycleManager {
    pub fn new(
        installer: Arc<dyn Installer>,
        runner: Arc<dyn ProcessRunner>,
        config: ConfigStore,
    ) -> Self {
        let (state, _) = watch::channel(NodeState::Stopped);
        Self {
            installer,
            runner,
            config,
            cors: CorsPolicy::default(),
            logs: Arc::new(LogBuffer::default()),
            daemon: tokio::sync::Mutex::new(None),
            state,
            details: Mutex::new(Details::default()),
        }
    }

    /// Wires the real installer, runner and config store from settings.
    pub fn from_settings(settings: &WardenSettings) -> Self {
        let paths = settings.paths();
        let installer = BinaryInstaller::new(
            settings.resolved_abi(),
            &paths.assets_dir,
            &paths.binary_path,
        );
        let runner = BinaryRunner::new(&paths.binary_path, &paths.ipfs_path)
            .stop_timeout(settings.stop_timeout());
        let logs = match settings.max_log_lines {
            Some(max) => LogBuffer::with_max_lines(max),
            None => LogBuffer::new(),
        };

        Self::new(
            Arc::new(installer),
            Arc::new(runner),
            ConfigStore::new(&paths.config_path),
        )
        .with_cors(CorsPolicy::default().with_origins(settings.extra_origins.iter().cloned()))
        .with_log_buffer(Arc::new(logs))
    }

    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = cors;
        self
    }

    pub fn with_log_buffer(mut self, logs: Arc<LogBuffer>) -> Self {
        self.logs = logs;
        self
    }

    pub fn logs(&self) -> &Arc<LogBuffer> {
        &self.logs
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn state(&self) -> NodeState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Follow state changes, e.g. to switch between start and stop controls.
    pub fn watch_state(&self) -> watch::Receiver<NodeState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> NodeStatus {
        let details = self.details.lock().unwrap_or_else(PoisonError::into_inner);
        NodeStatus {
            state: self.state(),
            pid: details.pid,
            last_init_exit: details.last_init_exit,
            log_lines: self.logs.len(),
        }
    }

    /// Install the binary, then run the full start sequence.
    pub async fn init(&self) -> Result<()> {
        let mut daemon = self.daemon.lock().await;
        self.init_locked(&mut daemon).await
    }

    /// Run `init`, patch the config and launch the daemon. A daemon that is
    /// already tracked is stopped first.
    pub async fn start(&self) -> Result<()> {
        let mut daemon = self.daemon.lock().await;
        self.supersede(&mut daemon).await?;
        self.logs.clear();
        self.launch(&mut daemon).await
    }

    /// Terminate the tracked daemon, if any. The log buffer is kept.
    pub async fn stop(&self) -> Result<()> {
        let mut daemon = self.daemon.lock().await;
        self.stop_locked(&mut daemon).await
    }

    pub async fn restart(&self) -> Result<()> {
        let mut daemon = self.daemon.lock().await;
        self.stop_locked(&mut daemon).await?;
        self.init_locked(&mut daemon).await
    }

    pub async fn handle(&self, command: LifecycleCommand) -> Result<Dispatch> {
        info!("Lifecycle command: {}", command.as_str());
        match command {
            LifecycleCommand::Start => self.start().await?,
            LifecycleCommand::Stop => self.stop().await?,
            LifecycleCommand::Restart => self.restart().await?,
            LifecycleCommand::Exit => {
                if let Err(e) = self.stop().await {
                    warn!("Failed to stop daemon before exit: {}", e);
                }
                return Ok(Dispatch::Exit);
            }
        }
        Ok(Dispatch::Continue)
    }

    /// Handle a raw action string. Unknown actions are ignored.
    pub async fn dispatch(&self, action: &str) -> Result<Dispatch> {
        match action.parse::<LifecycleCommand>() {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                debug!("Ignoring {}", e);
                Ok(Dispatch::Continue)
            }
        }
    }

    async fn init_locked(&self, daemon: &mut Option<Box<dyn ProcessHandle>>) -> Result<()> {
        self.supersede(daemon).await?;
        self.logs.clear();
        self.set_state(NodeState::Initializing);

        if let Err(e) = self.installer.install().await {
            self.set_state(NodeState::Stopped);
            return Err(e);
        }

        self.launch(daemon).await
    }

    async fn launch(&self, daemon: &mut Option<Box<dyn ProcessHandle>>) -> Result<()> {
        let result = self.run_sequence(daemon).await;
        if result.is_err() {
            self.set_state(NodeState::Stopped);
        }
        result
    }

    /// init (blocking) → config patch → daemon (tracked, not awaited).
    async fn run_sequence(&self, daemon: &mut Option<Box<dyn ProcessHandle>>) -> Result<()> {
        self.set_state(NodeState::Initializing);

        let mut init = self.runner.run(INIT_COMMAND)?;
        init.stream_lines(self.node_lines("init"));
        let exit = init.wait().await?;
        info!("Node init exited with {:?}", exit);
        self.update_details(|d| d.last_init_exit = exit);

        self.set_state(NodeState::Configuring);
        self.config.patch(|config| self.cors.apply(config)).await?;

        let mut process = self.runner.run(DAEMON_COMMAND)?;
        process.stream_lines(self.node_lines("daemon"));
        let pid = process.id();
        *daemon = Some(process);
        self.update_details(|d| d.pid = pid);
        self.set_state(NodeState::Running);

        info!("Node daemon running with PID {:?}", pid);
        Ok(())
    }

    async fn supersede(&self, daemon: &mut Option<Box<dyn ProcessHandle>>) -> Result<()> {
        if daemon.is_some() {
            warn!("A daemon is already tracked, stopping it first");
            self.stop_locked(daemon).await?;
        }
        Ok(())
    }

    async fn stop_locked(&self, daemon: &mut Option<Box<dyn ProcessHandle>>) -> Result<()> {
        let result = match daemon.take() {
            Some(mut process) => {
                info!("Stopping node daemon (PID {:?})", process.id());
                process.terminate().await
            }
            None => {
                debug!("No daemon to stop");
                Ok(())
            }
        };
        self.update_details(|d| d.pid = None);
        self.set_state(NodeState::Stopped);
        result
    }

    fn node_lines(&self, tag: &'static str) -> LineConsumer {
        let logs = Arc::clone(&self.logs);
        Arc::new(move |line: String| {
            debug!(target: NODE_LOG_TARGET, "{}={}", tag, line);
            logs.push(line);
        })
    }

    fn set_state(&self, next: NodeState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Node state {} -> {}", previous, next);
        }
    }

    fn update_details(&self, f: impl FnOnce(&mut Details)) {
        let mut details = self.details.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut details);
    }
}
