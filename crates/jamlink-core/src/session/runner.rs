//! Poll-loop orchestrator and worker lifecycle
//!
//! The worker thread repeatedly drains UI commands, drives the session
//! engine until it reports no more work, detects state deltas, and
//! publishes events and snapshot updates. It is the single consumer of
//! the command queue and the single producer of the event queue.
//!
//! The engine leaves its mutex slot for the duration of each iteration:
//! `work_step` can re-enter the license rendezvous and block for up to
//! a minute, and no lock the UI thread needs may be held across that.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::directory::ServerListFetcher;
use crate::error::{SessionError, SessionResult};
use crate::queue::{QueueReceiver, QueueSender};
use crate::types::SessionStatus;

use super::{
    command_channel, event_channel, Command, EngineCallbacks, SessionEngine, SessionEvent,
    SessionShared, WorkStatus, LICENSE_TIMEOUT,
};

/// Poll interval while connected or connecting (responsiveness)
const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Poll interval while disconnected or without an engine (conservation)
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Copy the roster every Nth connected iteration even without a change
/// flag — a safety net in case change detection misses an update.
/// Tunable; any periodic-refresh policy satisfies the contract.
const ROSTER_REFRESH_INTERVAL: u64 = 5;

/// UI-thread ends of the command/event queues
pub struct UiEndpoints {
    /// Push commands here (UI thread only)
    pub commands: QueueSender<Command>,
    /// Drain events here (UI thread only)
    pub events: QueueReceiver<SessionEvent>,
}

/// Owns the poll-loop worker thread
///
/// `start` spawns the worker holding a strong reference to the shared
/// state; `stop` is idempotent, safe without a prior `start`, and
/// guaranteed to join even while the worker is blocked in the license
/// rendezvous.
pub struct SessionRunner {
    shared: Arc<SessionShared>,
    thread: Option<JoinHandle<()>>,
}

impl SessionRunner {
    pub fn new(shared: Arc<SessionShared>) -> Self {
        Self {
            shared,
            thread: None,
        }
    }

    /// Install the engine (if any) and spawn the worker thread
    ///
    /// With no engine the worker still serves directory fetches; the
    /// engine can arrive later via [`SessionShared::engine`]. Returns
    /// the UI-thread queue endpoints.
    pub fn start(&mut self, engine: Option<Box<dyn SessionEngine>>) -> SessionResult<UiEndpoints> {
        if self.thread.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        self.shared.shutdown.store(false, Ordering::Release);
        *self.shared.engine.lock().unwrap() = engine;

        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("session-poll".into())
            .spawn(move || run_loop(shared, command_rx, event_tx))
            .map_err(|e| SessionError::Spawn(e.to_string()))?;

        self.thread = Some(handle);
        log::info!("Session worker started");

        Ok(UiEndpoints {
            commands: command_tx,
            events: event_rx,
        })
    }

    /// Signal shutdown, unblock any pending rendezvous, and join
    ///
    /// Once the worker is gone the engine is reclaimed from its slot,
    /// disconnected if needed, and dropped.
    pub fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);

        // Wake a worker blocked in the license wait; without this the
        // join below would wait out the full rendezvous timeout.
        self.shared.license.force_reject();

        if let Some(handle) = self.thread.take() {
            log::info!("Stopping session worker");
            if handle.join().is_err() {
                log::error!("Session worker panicked");
            }
        }

        if let Some(mut engine) = self.shared.engine.lock().unwrap().take() {
            if engine.status() != SessionStatus::Disconnected {
                engine.disconnect();
            }
        }
        self.shared.roster.clear();
        self.shared.snapshot.store_status(SessionStatus::Disconnected);
    }

    /// Whether the worker thread is currently running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Engine callbacks for one loop iteration
///
/// Chat notifications become events; the license prompt blocks on the
/// rendezvous with the shutdown flag as its cancellation input.
struct LoopCallbacks<'a> {
    shared: &'a SessionShared,
    events: &'a mut QueueSender<SessionEvent>,
}

impl EngineCallbacks for LoopCallbacks<'_> {
    fn chat_message(&mut self, kind: &str, user: &str, text: &str) {
        let is_topic = kind == "TOPIC";
        self.events.try_push(SessionEvent::ChatMessage {
            kind: kind.to_string(),
            user: user.to_string(),
            text: text.to_string(),
        });
        if is_topic {
            self.events.try_push(SessionEvent::TopicChanged {
                topic: text.to_string(),
            });
        }
    }

    fn license_prompt(&mut self, text: &str) -> bool {
        self.shared
            .license
            .request(text, LICENSE_TIMEOUT, &self.shared.shutdown)
    }
}

/// Main worker loop
fn run_loop(
    shared: Arc<SessionShared>,
    mut commands: QueueReceiver<Command>,
    mut events: QueueSender<SessionEvent>,
) {
    let fetcher = ServerListFetcher::new();
    let mut last_status = SessionStatus::Disconnected;
    let mut connected_iterations: u64 = 0;

    while !shared.shutdown.load(Ordering::Acquire) {
        // Take the engine out of its slot for this iteration; the lock
        // is released before any blocking call.
        let mut engine = shared.engine.lock().unwrap().take();

        apply_commands(&shared, &mut commands, &mut engine, &fetcher);

        let Some(mut engine) = engine else {
            // No engine yet: only the directory fetch can make progress
            publish_fetch_result(&fetcher, &mut events);
            thread::sleep(IDLE_POLL_INTERVAL);
            continue;
        };

        // Run the engine dry, checking the shutdown flag between steps
        // so a long step sequence cannot block teardown.
        let mut aborted = false;
        {
            let mut callbacks = LoopCallbacks {
                shared: &shared,
                events: &mut events,
            };
            while engine.work_step(&mut callbacks) == WorkStatus::MoreWork {
                if shared.shutdown.load(Ordering::Acquire) {
                    aborted = true;
                    break;
                }
            }
        }
        if aborted {
            *shared.engine.lock().unwrap() = Some(engine);
            break;
        }

        // Status delta detection
        let current_status = engine.status();
        let mut status_event = None;
        if current_status != last_status {
            let error_text = engine.error_text();
            log::info!(
                "Status changed: {} -> {}",
                last_status.label(),
                current_status.label()
            );
            if !error_text.is_empty() {
                log::info!("Engine reported: {}", error_text);
            }
            status_event = Some(SessionEvent::StatusChanged {
                status: current_status,
                error_text,
            });
            last_status = current_status;
        }
        shared.snapshot.store_status(current_status);

        let mut update_roster = engine.roster_changed();
        let user_info_changed = update_roster;

        if current_status == SessionStatus::Connected {
            let (pos, len) = engine.interval_position();
            shared
                .snapshot
                .store_transport(engine.bpm(), engine.bpi(), pos, len);

            if connected_iterations % ROSTER_REFRESH_INTERVAL == 0 {
                update_roster = true;
            }
            connected_iterations += 1;
        }

        if update_roster {
            let mut roster = Vec::new();
            engine.roster(&mut roster);
            shared.roster.replace(roster);
        }

        // Publish accumulated events
        if let Some(event) = status_event {
            events.try_push(event);
        }
        if user_info_changed {
            events.try_push(SessionEvent::UserInfoChanged);
        }
        publish_fetch_result(&fetcher, &mut events);

        *shared.engine.lock().unwrap() = Some(engine);

        // Adaptive cadence: tight while connected/connecting, relaxed
        // while disconnected.
        let interval = if current_status == SessionStatus::Disconnected {
            IDLE_POLL_INTERVAL
        } else {
            ACTIVE_POLL_INTERVAL
        };
        thread::sleep(interval);
    }

    log::info!("Session worker exited");
}

/// Apply every queued command, in order
fn apply_commands(
    shared: &SessionShared,
    commands: &mut QueueReceiver<Command>,
    engine: &mut Option<Box<dyn SessionEngine>>,
    fetcher: &ServerListFetcher,
) {
    commands.drain(|cmd| match cmd {
        Command::Connect(args) => {
            if let Some(engine) = engine.as_deref_mut() {
                {
                    let mut creds = shared.credentials.lock().unwrap();
                    creds.server = args.server.clone();
                    creds.username = args.username.clone();
                    creds.password = args.password.clone();
                }
                log::info!("Connecting to {} as {}", args.server, args.username);
                engine.connect(&args.server, &args.username, &args.password);
            }
        }
        Command::Disconnect => {
            if let Some(engine) = engine.as_deref_mut() {
                log::info!("Disconnecting");
                engine.disconnect();
            }
        }
        Command::SetLocalChannelInfo {
            channel,
            name,
            bitrate,
            transmit,
        } => {
            if let Some(engine) = engine.as_deref_mut() {
                engine.set_local_channel_info(channel, &name, bitrate, transmit);
            }
        }
        Command::SetLocalChannelMonitoring {
            channel,
            volume,
            pan,
            mute,
            solo,
        } => {
            if let Some(engine) = engine.as_deref_mut() {
                engine.set_local_channel_monitoring(channel, volume, pan, mute, solo);
            }
        }
        Command::SetUserState { user_index, mute } => {
            if let Some(engine) = engine.as_deref_mut() {
                engine.set_user_state(user_index, mute);
            }
        }
        Command::SetUserChannelState {
            user_index,
            channel_index,
            subscribed,
            volume,
            pan,
            mute,
            solo,
        } => {
            if let Some(engine) = engine.as_deref_mut() {
                engine.set_user_channel_state(
                    user_index,
                    channel_index,
                    subscribed,
                    volume,
                    pan,
                    mute,
                    solo,
                );
            }
        }
        // Directory requests go to the fetcher, never to the engine
        Command::RequestServerList { url } => fetcher.request(&url),
    });
}

fn publish_fetch_result(fetcher: &ServerListFetcher, events: &mut QueueSender<SessionEvent>) {
    if let Some(result) = fetcher.poll() {
        events.try_push(SessionEvent::ServerList {
            entries: result.entries,
            error: result.error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnectArgs, RealtimeProcessor};
    use crate::types::{RemoteChannel, RemoteUser};
    use std::sync::Mutex;
    use std::time::Instant;

    struct NullProcessor;

    impl RealtimeProcessor for NullProcessor {
        fn process(
            &self,
            input_left: &[f32],
            input_right: &[f32],
            output_left: &mut [f32],
            output_right: &mut [f32],
            _sample_rate: u32,
            _just_monitor: bool,
            _is_playing: bool,
        ) {
            output_left.copy_from_slice(input_left);
            output_right.copy_from_slice(input_right);
        }

        fn output_peak(&self, _side: usize) -> f32 {
            0.0
        }

        fn local_peak(&self, _side: usize) -> f32 {
            0.0
        }
    }

    /// Record of everything a scripted engine was asked to do
    #[derive(Default)]
    struct EngineLog {
        connects: Vec<(String, String)>,
        disconnects: usize,
        monitoring: Vec<(i32, Option<f32>)>,
        prompt_result: Option<bool>,
    }

    /// Engine that walks a fixed status script, one step per iteration
    struct ScriptedEngine {
        statuses: Vec<SessionStatus>,
        step: usize,
        license_text: Option<String>,
        roster_change_pending: bool,
        log: Arc<Mutex<EngineLog>>,
    }

    impl ScriptedEngine {
        fn new(statuses: Vec<SessionStatus>, log: Arc<Mutex<EngineLog>>) -> Self {
            Self {
                statuses,
                step: 0,
                license_text: None,
                roster_change_pending: false,
                log,
            }
        }
    }

    impl SessionEngine for ScriptedEngine {
        fn work_step(&mut self, callbacks: &mut dyn EngineCallbacks) -> WorkStatus {
            if self.step < self.statuses.len() {
                self.step += 1;
            }
            if let Some(text) = self.license_text.take() {
                let accepted = callbacks.license_prompt(&text);
                self.log.lock().unwrap().prompt_result = Some(accepted);
            }
            WorkStatus::Idle
        }

        fn status(&self) -> SessionStatus {
            if self.statuses.is_empty() {
                return SessionStatus::Disconnected;
            }
            let idx = self.step.saturating_sub(1).min(self.statuses.len() - 1);
            self.statuses[idx]
        }

        fn error_text(&self) -> String {
            String::new()
        }

        fn interval_position(&self) -> (i32, i32) {
            (50, 100)
        }

        fn bpi(&self) -> i32 {
            4
        }

        fn bpm(&self) -> f32 {
            120.0
        }

        fn roster_changed(&mut self) -> bool {
            std::mem::take(&mut self.roster_change_pending)
        }

        fn roster(&self, out: &mut Vec<RemoteUser>) {
            out.push(RemoteUser {
                name: "remote".to_string(),
                mute: false,
                channels: vec![RemoteChannel::default()],
            });
        }

        fn connect(&mut self, server: &str, username: &str, _password: &str) {
            self.log
                .lock()
                .unwrap()
                .connects
                .push((server.to_string(), username.to_string()));
        }

        fn disconnect(&mut self) {
            self.log.lock().unwrap().disconnects += 1;
        }

        fn set_local_channel_info(
            &mut self,
            _channel: i32,
            _name: &str,
            _bitrate: Option<i32>,
            _transmit: Option<bool>,
        ) {
        }

        fn set_local_channel_monitoring(
            &mut self,
            channel: i32,
            volume: Option<f32>,
            _pan: Option<f32>,
            _mute: Option<bool>,
            _solo: Option<bool>,
        ) {
            self.log.lock().unwrap().monitoring.push((channel, volume));
        }

        fn set_user_state(&mut self, _user_index: i32, _mute: Option<bool>) {}

        #[allow(clippy::too_many_arguments)]
        fn set_user_channel_state(
            &mut self,
            _user_index: i32,
            _channel_index: i32,
            _subscribed: Option<bool>,
            _volume: Option<f32>,
            _pan: Option<f32>,
            _mute: Option<bool>,
            _solo: Option<bool>,
        ) {
        }

        fn realtime_processor(&self) -> Arc<dyn RealtimeProcessor> {
            Arc::new(NullProcessor)
        }
    }

    fn drain_until<F: FnMut(&SessionEvent) -> bool>(
        endpoints: &mut UiEndpoints,
        mut want: F,
        deadline: Duration,
    ) -> Vec<SessionEvent> {
        let start = Instant::now();
        let mut collected = Vec::new();
        let mut done = false;
        while !done && start.elapsed() < deadline {
            endpoints.events.drain(|event| {
                if want(&event) {
                    done = true;
                }
                collected.push(event);
            });
            thread::sleep(Duration::from_millis(5));
        }
        collected
    }

    #[test]
    fn test_status_transitions_publish_exactly_once() {
        use SessionStatus::*;
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let engine = ScriptedEngine::new(
            vec![Disconnected, PreConnect, Connected, Connected, Disconnected],
            Arc::clone(&log),
        );

        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let mut endpoints = runner.start(Some(Box::new(engine))).unwrap();

        // Wait for the final transition back to Disconnected
        let events = drain_until(
            &mut endpoints,
            |event| {
                matches!(
                    event,
                    SessionEvent::StatusChanged {
                        status: SessionStatus::Disconnected,
                        ..
                    }
                )
            },
            Duration::from_secs(10),
        );
        runner.stop();

        let transitions: Vec<SessionStatus> = events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::StatusChanged { status, .. } => Some(*status),
                _ => None,
            })
            .collect();
        // No event for the repeated Connected status
        assert_eq!(transitions, vec![PreConnect, Connected, Disconnected]);
    }

    #[test]
    fn test_connected_iteration_publishes_snapshot() {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let engine = ScriptedEngine::new(vec![SessionStatus::Connected], Arc::clone(&log));

        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let mut endpoints = runner.start(Some(Box::new(engine))).unwrap();

        // The periodic roster refresh fills the mirror even though the
        // engine never raises its change flag.
        let deadline = Instant::now() + Duration::from_secs(10);
        while shared.roster.user_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(shared.roster.user_count(), 1);

        assert_eq!(shared.snapshot.bpm(), 120.0);
        assert_eq!(shared.snapshot.bpi(), 4);
        assert_eq!(shared.snapshot.beat_position(), 2);
        assert_eq!(shared.snapshot.status(), SessionStatus::Connected);

        // A periodic refresh alone must not raise UserInfoChanged
        let mut saw_user_info = false;
        endpoints.events.drain(|event| {
            if matches!(event, SessionEvent::UserInfoChanged) {
                saw_user_info = true;
            }
        });
        runner.stop();
        assert!(!saw_user_info);
    }

    #[test]
    fn test_commands_are_applied_in_order() {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let engine = ScriptedEngine::new(vec![SessionStatus::Disconnected], Arc::clone(&log));

        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let mut endpoints = runner.start(Some(Box::new(engine))).unwrap();

        endpoints.commands.try_push(Command::Connect(Box::new(ConnectArgs {
            server: "jam.example.com:2049".to_string(),
            username: "anon".to_string(),
            password: String::new(),
        })));
        endpoints.commands.try_push(Command::SetLocalChannelMonitoring {
            channel: 0,
            volume: Some(0.8),
            pan: None,
            mute: None,
            solo: None,
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        while log.lock().unwrap().monitoring.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        runner.stop();

        let log = log.lock().unwrap();
        assert_eq!(
            log.connects,
            vec![("jam.example.com:2049".to_string(), "anon".to_string())]
        );
        assert_eq!(log.monitoring, vec![(0, Some(0.8))]);

        let creds = shared.credentials.lock().unwrap();
        assert_eq!(creds.server, "jam.example.com:2049");
        assert_eq!(creds.username, "anon");
    }

    #[test]
    fn test_roster_change_publishes_event_and_mirror() {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let mut engine = ScriptedEngine::new(vec![SessionStatus::Connected], Arc::clone(&log));
        engine.roster_change_pending = true;

        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let mut endpoints = runner.start(Some(Box::new(engine))).unwrap();

        let events = drain_until(
            &mut endpoints,
            |event| matches!(event, SessionEvent::UserInfoChanged),
            Duration::from_secs(10),
        );
        let mirrored = shared.roster.user_count();
        runner.stop();

        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::UserInfoChanged)));
        assert_eq!(mirrored, 1);
    }

    #[test]
    fn test_server_list_request_without_engine() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let http = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf);
            let body = "SERVER \"jam.example.com:2049\" \"Example\" \"2/8\"\n";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        // No engine installed: the worker only serves directory fetches
        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let mut endpoints = runner.start(None).unwrap();

        endpoints.commands.try_push(Command::RequestServerList {
            url: format!("http://{}/serverlist", addr),
        });

        let events = drain_until(
            &mut endpoints,
            |event| matches!(event, SessionEvent::ServerList { .. }),
            Duration::from_secs(10),
        );
        runner.stop();
        http.join().unwrap();

        let list = events.iter().find_map(|event| match event {
            SessionEvent::ServerList { entries, error } => Some((entries, error)),
            _ => None,
        });
        let (entries, error) = list.expect("no server list event");
        assert!(error.is_none());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].host, "jam.example.com");
        // No engine means no status transitions
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::StatusChanged { .. })));
    }

    #[test]
    fn test_stop_without_start_is_safe() {
        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(shared);
        runner.stop();
        runner.stop();
        assert!(!runner.is_running());
    }

    #[test]
    fn test_stop_terminates_worker() {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let engine = ScriptedEngine::new(vec![SessionStatus::Connected], Arc::clone(&log));

        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let _endpoints = runner.start(Some(Box::new(engine))).unwrap();

        thread::sleep(Duration::from_millis(100));
        runner.stop();
        assert!(!runner.is_running());
        // Engine was reclaimed and disconnected during stop()
        assert_eq!(log.lock().unwrap().disconnects, 1);
        assert_eq!(shared.snapshot.status(), SessionStatus::Disconnected);
    }

    #[test]
    fn test_stop_during_pending_rendezvous() {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let mut engine = ScriptedEngine::new(vec![SessionStatus::PreConnect], Arc::clone(&log));
        engine.license_text = Some("server terms".to_string());

        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let _endpoints = runner.start(Some(Box::new(engine))).unwrap();

        // Wait until the worker is blocked inside the rendezvous
        let deadline = Instant::now() + Duration::from_secs(10);
        while !shared.license.is_pending() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(shared.license.is_pending(), "prompt never raised");

        let start = Instant::now();
        runner.stop();
        // Join completed well before the 60s rendezvous timeout
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!runner.is_running());
        assert_eq!(log.lock().unwrap().prompt_result, Some(false));
    }

    #[test]
    fn test_license_accept_reaches_engine() {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let mut engine = ScriptedEngine::new(vec![SessionStatus::PreConnect], Arc::clone(&log));
        engine.license_text = Some("server terms".to_string());

        let shared = Arc::new(SessionShared::new());
        let mut runner = SessionRunner::new(Arc::clone(&shared));
        let _endpoints = runner.start(Some(Box::new(engine))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !shared.license.is_pending() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(shared.license.text(), "server terms");
        shared.license.respond(true);

        let deadline = Instant::now() + Duration::from_secs(10);
        while log.lock().unwrap().prompt_result.is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        runner.stop();
        assert_eq!(log.lock().unwrap().prompt_result, Some(true));
    }
}
