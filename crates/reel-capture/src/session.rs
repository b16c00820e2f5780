//! Capture session orchestrator.
//!
//! Drives one capture from launch to teardown:
//!
//! ```text
//! Idle → Launching → AwaitingDevTools → Connected → AnimationsPaused
//!      → Navigating → PageLoaded → AnimationsResumed → RepaintInjected
//!      → ScreencastRunning → Draining → Stopped | Failed
//! ```
//!
//! Every received message is classified. Replies are matched by command id,
//! events the session is currently waiting for are buffered, everything else
//! is dropped. Nothing assumes the next message answers the last command.

use std::collections::VecDeque;
use std::time::Duration;

use reel_core::CaptureRequest;
use reel_core::constants::PROBE_TIMEOUT;
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cdp::codec::{Command, Event, Message, methods};
use crate::cdp::discovery::wait_until_ready;
use crate::cdp::transport::{CdpTransport, WsTransport};
use crate::chrome::{BrowserProcess, BrowserState};
use crate::error::CaptureError;
use crate::probe::{http_client, validate_target};
use crate::progress::ProgressReporter;
use crate::scripts;
use crate::sink::FrameSink;
use crate::types::{CaptureOptions, CaptureReport, CaptureState, ScreencastOptions, duration_ms};

/// One capture run.
pub struct CaptureSession<T: CdpTransport> {
    request: CaptureRequest,
    options: CaptureOptions,
    transport: Option<T>,
    process: Option<BrowserProcess>,
    next_id: u64,
    state: CaptureState,
    subscriptions: Vec<&'static str>,
    backlog: VecDeque<Event>,
    screencast_running: bool,
}

impl<T: CdpTransport> CaptureSession<T> {
    /// Create an idle session.
    pub fn new(request: CaptureRequest, options: CaptureOptions) -> Self {
        Self {
            request,
            options,
            transport: None,
            process: None,
            next_id: 1,
            state: CaptureState::Idle,
            subscriptions: Vec::new(),
            backlog: VecDeque::new(),
            screencast_running: false,
        }
    }

    /// Create a session over an already connected transport.
    ///
    /// No browser process is owned; [`capture`](Self::capture) starts at the
    /// pause step.
    pub fn with_transport(request: CaptureRequest, options: CaptureOptions, transport: T) -> Self {
        let mut session = Self::new(request, options);
        session.transport = Some(transport);
        session.state = CaptureState::Connected;
        session
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// State of the owned browser process, if one was launched.
    pub fn browser_state(&self) -> Option<BrowserState> {
        self.process.as_ref().map(BrowserProcess::state)
    }

    /// Whether the transport is still open.
    pub fn is_transport_open(&self) -> bool {
        self.transport.as_ref().is_some_and(CdpTransport::is_open)
    }

    /// Run the capture over the attached transport, then tear down.
    pub async fn capture(
        &mut self,
        sink: &mut dyn FrameSink,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<CaptureReport, CaptureError> {
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CaptureError::Cancelled),
            r = self.drive(sink, progress) => r,
        };
        self.finish(result, progress, started).await
    }

    /// Release the browser and the socket. Safe to call any number of times.
    pub async fn teardown(&mut self) {
        if !self.state.is_terminal() {
            self.state = CaptureState::Draining;
        }
        self.subscriptions.clear();
        self.backlog.clear();

        if self.screencast_running && self.is_transport_open() {
            let timeout = self.options.teardown_timeout;
            if let Err(e) = self
                .send_command(methods::STOP_SCREENCAST, json!({}), timeout)
                .await
            {
                debug!(error = %e, "stopScreencast failed during teardown");
            }
        }
        self.screencast_running = false;

        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.close().await {
                debug!(error = %e, "transport close failed");
            }
        }
        if let Some(process) = self.process.as_mut() {
            process.terminate().await;
        }
    }

    async fn finish(
        &mut self,
        result: Result<u32, CaptureError>,
        progress: &dyn ProgressReporter,
        started: Instant,
    ) -> Result<CaptureReport, CaptureError> {
        progress.finished();
        self.teardown().await;
        match result {
            Ok(frames) => {
                self.state = CaptureState::Stopped;
                let report = CaptureReport {
                    frames,
                    frame_dir: self.options.frame_dir.clone(),
                    elapsed: started.elapsed(),
                };
                info!(
                    frames,
                    elapsed_ms = duration_ms(report.elapsed),
                    "capture complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.state = CaptureState::Failed;
                warn!(error = %e, "capture failed");
                Err(e)
            }
        }
    }

    // ── Capture steps ───────────────────────────────────────────────────

    async fn drive(
        &mut self,
        sink: &mut dyn FrameSink,
        progress: &dyn ProgressReporter,
    ) -> Result<u32, CaptureError> {
        self.pause_animations().await?;
        self.navigate().await?;
        self.resume_animations().await?;
        self.inject_repaint().await?;
        self.start_screencast().await?;
        self.capture_frames(sink, progress).await
    }

    async fn pause_animations(&mut self) -> Result<(), CaptureError> {
        let _ = self
            .command(
                methods::ADD_SCRIPT_ON_NEW_DOCUMENT,
                json!({ "source": scripts::pause_script() }),
            )
            .await?;
        self.state = CaptureState::AnimationsPaused;
        debug!("animations paused");
        Ok(())
    }

    async fn navigate(&mut self) -> Result<(), CaptureError> {
        self.state = CaptureState::Navigating;
        self.subscribe(methods::LOAD_EVENT_FIRED);

        let _ = self.command(methods::PAGE_ENABLE, json!({})).await?;
        let url = self.request.url.clone();
        let result = self
            .command(methods::PAGE_NAVIGATE, json!({ "url": url }))
            .await?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            warn!(url = %url, error_text, "navigation reported an error");
        }

        let timeout = self.options.navigation_timeout();
        let _ = self
            .wait_for_event(methods::LOAD_EVENT_FIRED, timeout)
            .await
            .map_err(|e| match e {
                CaptureError::ReceiveTimeout { .. } => CaptureError::NavigationTimeout {
                    url: url.clone(),
                    timeout_ms: duration_ms(timeout),
                },
                other => other,
            })?;
        self.unsubscribe(methods::LOAD_EVENT_FIRED);
        self.state = CaptureState::PageLoaded;
        info!(url = %url, "page loaded");
        Ok(())
    }

    async fn resume_animations(&mut self) -> Result<(), CaptureError> {
        let _ = self.evaluate(&scripts::resume_expression()).await?;
        tokio::time::sleep(self.options.settle_delay).await;
        self.state = CaptureState::AnimationsResumed;
        debug!("animations resumed");
        Ok(())
    }

    async fn inject_repaint(&mut self) -> Result<(), CaptureError> {
        let period = self.request.frame_period();
        let _ = self
            .evaluate(&scripts::repaint_expression(duration_ms(period)))
            .await?;
        tokio::time::sleep(self.request.half_frame_period()).await;
        self.state = CaptureState::RepaintInjected;
        debug!(period_ms = duration_ms(period), "repaint injected");
        Ok(())
    }

    async fn start_screencast(&mut self) -> Result<(), CaptureError> {
        // Frames may arrive before the reply, so subscribe first.
        self.subscribe(methods::SCREENCAST_FRAME);
        self.screencast_running = true;
        let params =
            ScreencastOptions::for_viewport(self.request.width, self.request.height).to_params();
        let _ = self.command(methods::START_SCREENCAST, params).await?;
        self.state = CaptureState::ScreencastRunning;
        Ok(())
    }

    async fn capture_frames(
        &mut self,
        sink: &mut dyn FrameSink,
        progress: &dyn ProgressReporter,
    ) -> Result<u32, CaptureError> {
        let total = self.request.total_frames();
        let frame_timeout = self.options.frame_timeout;
        info!(total, fps = self.request.fps, "capturing frames");
        progress.started(total);

        for index in 1..=total {
            let event = self
                .wait_for_event(methods::SCREENCAST_FRAME, frame_timeout)
                .await
                .map_err(|e| match e {
                    CaptureError::ReceiveTimeout { .. } => CaptureError::FrameTimeout {
                        frame: index,
                        total,
                        timeout_ms: duration_ms(frame_timeout),
                    },
                    other => other,
                })?;
            let frame = event.screencast_frame()?.ok_or_else(|| {
                CaptureError::Protocol(format!("expected a screencast frame, got {}", event.method))
            })?;

            let _ = self
                .command(
                    methods::SCREENCAST_FRAME_ACK,
                    json!({ "sessionId": frame.session_id }),
                )
                .await?;
            let _ = sink.write(index, &frame.data).await?;
            progress.advanced(index, total);
            trace!(index, total, session_id = frame.session_id, "frame captured");
        }
        Ok(total)
    }

    // ── Message plumbing ────────────────────────────────────────────────

    fn subscribe(&mut self, method: &'static str) {
        if !self.subscriptions.contains(&method) {
            self.subscriptions.push(method);
        }
    }

    fn unsubscribe(&mut self, method: &'static str) {
        self.subscriptions.retain(|m| *m != method);
        self.backlog.retain(|e| e.method != method);
    }

    fn is_subscribed(&self, method: &str) -> bool {
        self.subscriptions.iter().any(|m| *m == method)
    }

    async fn command(&mut self, method: &str, params: Value) -> Result<Value, CaptureError> {
        let timeout = self.options.command_timeout;
        self.send_command(method, params, timeout).await
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value, CaptureError> {
        let result = self
            .command(
                methods::RUNTIME_EVALUATE,
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            let msg = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("evaluation error");
            return Err(CaptureError::Protocol(format!("page script failed: {msg}")));
        }
        Ok(result["result"]["value"].clone())
    }

    /// Send a command and wait for the reply carrying its id.
    async fn send_command(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, CaptureError> {
        let id = self.next_id;
        self.next_id += 1;
        let command = Command::new(id, method, params);

        let Some(transport) = self.transport.as_mut() else {
            return Err(CaptureError::Protocol(format!(
                "cannot send {method}: not connected"
            )));
        };
        transport.send(&command).await?;

        let timed_out = || CaptureError::CommandTimeout {
            method: method.to_string(),
            timeout_ms: duration_ms(timeout),
        };
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            match transport.receive_one(remaining).await {
                Ok(Message::Response(reply)) if reply.id == id => {
                    return reply.outcome.map_err(|e| CaptureError::Command {
                        method: method.to_string(),
                        code: e.code,
                        message: e.message,
                    });
                }
                Ok(Message::Response(reply)) => {
                    debug!(id = reply.id, awaiting = id, "discarding unmatched reply");
                }
                Ok(Message::Event(event)) => {
                    if self.subscriptions.iter().any(|m| *m == event.method) {
                        self.backlog.push_back(event);
                    } else {
                        trace!(method = %event.method, "discarding event");
                    }
                }
                Err(CaptureError::ReceiveTimeout { .. }) => return Err(timed_out()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait for the next event named `method`, draining the backlog first.
    ///
    /// Expiry is reported as [`CaptureError::ReceiveTimeout`] for the caller
    /// to refine.
    async fn wait_for_event(
        &mut self,
        method: &str,
        timeout: Duration,
    ) -> Result<Event, CaptureError> {
        if let Some(pos) = self.backlog.iter().position(|e| e.method == method) {
            if let Some(event) = self.backlog.remove(pos) {
                return Ok(event);
            }
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CaptureError::ReceiveTimeout {
                    timeout_ms: duration_ms(timeout),
                });
            }
            let message = {
                let Some(transport) = self.transport.as_mut() else {
                    return Err(CaptureError::Protocol(format!(
                        "cannot wait for {method}: not connected"
                    )));
                };
                transport.receive_one(remaining).await
            };
            match message {
                Ok(Message::Event(event)) if event.method == method => return Ok(event),
                Ok(Message::Event(event)) => {
                    if self.is_subscribed(&event.method) {
                        self.backlog.push_back(event);
                    } else {
                        trace!(method = %event.method, "discarding event");
                    }
                }
                Ok(Message::Response(reply)) => {
                    debug!(id = reply.id, "discarding unmatched reply");
                }
                Err(CaptureError::ReceiveTimeout { .. }) => {
                    return Err(CaptureError::ReceiveTimeout {
                        timeout_ms: duration_ms(timeout),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl CaptureSession<WsTransport> {
    /// Full capture: probe the URL, launch the browser, connect, record every
    /// frame, then tear down.
    ///
    /// Teardown runs on success, failure and cancellation alike.
    pub async fn execute(
        &mut self,
        sink: &mut dyn FrameSink,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<CaptureReport, CaptureError> {
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CaptureError::Cancelled),
            r = async {
                self.launch_and_connect().await?;
                self.drive(sink, progress).await
            } => r,
        };
        self.finish(result, progress, started).await
    }

    async fn launch_and_connect(&mut self) -> Result<(), CaptureError> {
        self.request.validate()?;
        let client = http_client(PROBE_TIMEOUT)?;
        validate_target(&client, &self.request.url).await?;

        self.state = CaptureState::Launching;
        let process = BrowserProcess::launch(
            &self.options.executable,
            self.request.width,
            self.request.height,
            self.request.debug_port,
            &self.request.browser_args,
        )?;
        let process = self.process.insert(process);

        self.state = CaptureState::AwaitingDevTools;
        let port = self.request.debug_port;
        let ws_url = tokio::select! {
            r = wait_until_ready(
                &client,
                port,
                self.options.discovery_timeout,
                self.options.discovery_poll_interval,
            ) => r?,
            status = process.wait_exit() => {
                let context = match status {
                    Ok(status) => format!("browser exited during startup ({status})"),
                    Err(e) => format!("failed to wait for browser: {e}"),
                };
                return Err(CaptureError::Launch { context });
            }
        };
        process.mark_running();
        let pid = process.pid();

        self.transport = Some(WsTransport::connect(&ws_url).await?);
        self.state = CaptureState::Connected;
        info!(pid, port, ws_url = %ws_url, "connected to browser");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use base64::Engine as _;

    use super::*;
    use crate::cdp::codec::{CommandResult, ResponseError};
    use crate::progress::NoopProgress;
    use crate::sink::DirectorySink;

    /// Scripted browser: replies to every command and only pushes the next
    /// screencast frame once the previous one is acknowledged.
    #[derive(Default)]
    struct FakeTransport {
        inbox: VecDeque<Message>,
        sent: Vec<Command>,
        open: bool,
        /// Frames the fake is willing to deliver before stalling.
        frame_budget: u32,
        delivered: u32,
        pending_ack: Option<i64>,
        skip_load_event: bool,
        fail_method: Option<&'static str>,
    }

    impl FakeTransport {
        fn new(frame_budget: u32) -> Self {
            Self {
                open: true,
                frame_budget,
                ..Self::default()
            }
        }

        fn reply(&mut self, id: u64, result: Value) {
            self.inbox.push_back(Message::Response(CommandResult {
                id,
                outcome: Ok(result),
            }));
        }

        fn event(&mut self, method: &str, params: Value) {
            self.inbox.push_back(Message::Event(Event::new(method, params)));
        }

        fn push_frame(&mut self) {
            if self.delivered >= self.frame_budget {
                return;
            }
            self.delivered += 1;
            let session_id = 100 + i64::from(self.delivered);
            let data = base64::engine::general_purpose::STANDARD
                .encode(format!("frame-{}", self.delivered));
            self.pending_ack = Some(session_id);
            self.event(
                methods::SCREENCAST_FRAME,
                json!({"sessionId": session_id, "data": data, "metadata": {}}),
            );
        }

        fn count(&self, method: &str) -> usize {
            self.sent.iter().filter(|c| c.method == method).count()
        }
    }

    #[async_trait]
    impl CdpTransport for FakeTransport {
        async fn send(&mut self, command: &Command) -> Result<(), CaptureError> {
            if !self.open {
                return Err(CaptureError::Connection {
                    url: "fake".into(),
                    reason: "closed".into(),
                });
            }
            self.sent.push(command.clone());
            let id = command.id;

            if self.fail_method == Some(command.method.as_str()) {
                self.inbox.push_back(Message::Response(CommandResult {
                    id,
                    outcome: Err(ResponseError {
                        code: -32000,
                        message: "Cannot navigate to invalid URL".into(),
                        data: None,
                    }),
                }));
                return Ok(());
            }

            match command.method.as_str() {
                methods::PAGE_NAVIGATE => {
                    // Unrelated traffic ahead of the reply.
                    self.event("Network.dataReceived", json!({"requestId": "1"}));
                    self.reply(999, json!({}));
                    self.reply(id, json!({"frameId": "F1", "loaderId": "L1"}));
                    self.event("Page.frameStartedLoading", json!({"frameId": "F1"}));
                    if !self.skip_load_event {
                        self.event(methods::LOAD_EVENT_FIRED, json!({"timestamp": 1.0}));
                    }
                }
                methods::RUNTIME_EVALUATE => {
                    self.reply(id, json!({"result": {"type": "boolean", "value": true}}));
                }
                methods::START_SCREENCAST => {
                    // First frame races ahead of the reply.
                    self.push_frame();
                    self.reply(id, json!({}));
                }
                methods::SCREENCAST_FRAME_ACK => {
                    let acked = command.params["sessionId"].as_i64();
                    assert_eq!(acked, self.pending_ack, "ack must echo the frame's sessionId");
                    self.pending_ack = None;
                    self.push_frame();
                    self.reply(id, json!({}));
                }
                _ => self.reply(id, json!({})),
            }
            Ok(())
        }

        async fn receive_one(&mut self, timeout: Duration) -> Result<Message, CaptureError> {
            self.inbox.pop_front().ok_or(CaptureError::ReceiveTimeout {
                timeout_ms: duration_ms(timeout),
            })
        }

        async fn close(&mut self) -> Result<(), CaptureError> {
            self.open = false;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn request() -> CaptureRequest {
        CaptureRequest::new("http://127.0.0.1:1/anim.html", 2.0, 10, 800, 600)
    }

    fn options(frame_dir: PathBuf) -> CaptureOptions {
        let mut opts = CaptureOptions::new("/nonexistent/chrome", frame_dir);
        opts.frame_timeout = Duration::from_millis(200);
        opts.command_timeout = Duration::from_millis(200);
        opts.settle_delay = Duration::from_millis(1);
        opts
    }

    fn fake_session(dir: &Path, fake: FakeTransport) -> CaptureSession<FakeTransport> {
        CaptureSession::with_transport(request(), options(dir.into()), fake)
    }

    /// Counts reporter callbacks.
    #[derive(Default)]
    struct CountingProgress {
        started: AtomicU32,
        advanced: AtomicU32,
        finished: AtomicU32,
    }

    impl ProgressReporter for CountingProgress {
        fn started(&self, _total: u32) {
            let _ = self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn advanced(&self, _done: u32, _total: u32) {
            let _ = self.advanced.fetch_add(1, Ordering::SeqCst);
        }
        fn finished(&self) {
            let _ = self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn progress_finishes_once_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = fake_session(dir.path(), FakeTransport::new(u32::MAX));
        let mut sink = DirectorySink::new(dir.path());
        let progress = CountingProgress::default();

        let _ = session
            .capture(&mut sink, &progress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(progress.started.load(Ordering::SeqCst), 1);
        assert_eq!(progress.advanced.load(Ordering::SeqCst), 20);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn progress_finishes_on_cancel_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let progress = CountingProgress::default();
        let mut session = fake_session(dir.path(), FakeTransport::new(u32::MAX));
        let _ = session.capture(&mut sink, &progress, &cancel).await.unwrap_err();
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);

        let progress = CountingProgress::default();
        let mut session = fake_session(dir.path(), FakeTransport::new(2));
        let _ = session
            .capture(&mut sink, &progress, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(progress.advanced.load(Ordering::SeqCst), 2);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ack_gated_fake_completes_all_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = fake_session(dir.path(), FakeTransport::new(u32::MAX));
        let mut sink = DirectorySink::new(dir.path());

        let report = session
            .capture(&mut sink, &NoopProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.frames, 20);
        assert_eq!(report.frame_dir, dir.path());
        assert_eq!(session.state(), CaptureState::Stopped);
        assert!(!session.is_transport_open());

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let expected: Vec<String> = (1..=20).map(|i| format!("frame{i:04}.png")).collect();
        assert_eq!(names, expected);
        assert_eq!(
            std::fs::read(dir.path().join("frame0007.png")).unwrap(),
            b"frame-7"
        );

        let fake = session.transport.as_ref().unwrap();
        assert_eq!(fake.count(methods::SCREENCAST_FRAME_ACK), 20);
        assert_eq!(fake.count(methods::STOP_SCREENCAST), 1);
    }

    #[tokio::test]
    async fn command_ids_increase_and_steps_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = fake_session(dir.path(), FakeTransport::new(u32::MAX));
        let mut sink = DirectorySink::new(dir.path());
        let _ = session
            .capture(&mut sink, &NoopProgress, &CancellationToken::new())
            .await
            .unwrap();

        let sent = &session.transport.as_ref().unwrap().sent;
        assert!(sent.windows(2).all(|w| w[0].id < w[1].id));
        let prefix: Vec<&str> = sent.iter().take(6).map(|c| c.method.as_str()).collect();
        assert_eq!(
            prefix,
            vec![
                methods::ADD_SCRIPT_ON_NEW_DOCUMENT,
                methods::PAGE_ENABLE,
                methods::PAGE_NAVIGATE,
                methods::RUNTIME_EVALUATE,
                methods::RUNTIME_EVALUATE,
                methods::START_SCREENCAST,
            ]
        );
        assert!(
            sent[0].params["source"]
                .as_str()
                .unwrap()
                .contains(scripts::PAUSE_STYLE_ID)
        );
        assert!(
            sent[4].params["expression"]
                .as_str()
                .unwrap()
                .contains("100ms linear infinite")
        );
        assert_eq!(sent[5].params["maxWidth"], 800);
        assert_eq!(sent[5].params["maxHeight"], 600);
    }

    #[tokio::test]
    async fn stalled_screencast_fails_with_frame_timeout_and_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = fake_session(dir.path(), FakeTransport::new(3));
        let mut sink = DirectorySink::new(dir.path());

        let err = session
            .capture(&mut sink, &NoopProgress, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            CaptureError::FrameTimeout {
                frame,
                total,
                timeout_ms,
            } => {
                assert_eq!(frame, 4);
                assert_eq!(total, 20);
                assert_eq!(timeout_ms, 200);
            }
            other => panic!("expected FrameTimeout, got {other:?}"),
        }
        assert_eq!(session.state(), CaptureState::Failed);
        assert!(!session.is_transport_open());
        assert_eq!(session.transport.as_ref().unwrap().count(methods::STOP_SCREENCAST), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn teardown_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = fake_session(dir.path(), FakeTransport::new(u32::MAX));
        let mut sink = DirectorySink::new(dir.path());
        let _ = session
            .capture(&mut sink, &NoopProgress, &CancellationToken::new())
            .await
            .unwrap();

        session.teardown().await;
        session.teardown().await;
        assert_eq!(session.state(), CaptureState::Stopped);
        assert!(!session.is_transport_open());
        assert!(session.browser_state().is_none());
        assert_eq!(session.transport.as_ref().unwrap().count(methods::STOP_SCREENCAST), 1);
    }

    #[tokio::test]
    async fn missing_load_event_is_navigation_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeTransport::new(u32::MAX);
        fake.skip_load_event = true;
        let mut opts = options(dir.path().into());
        opts.navigation_timeout = Some(Duration::from_millis(150));
        let mut session = CaptureSession::with_transport(request(), opts, fake);
        let mut sink = DirectorySink::new(dir.path());

        let err = session
            .capture(&mut sink, &NoopProgress, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            CaptureError::NavigationTimeout { url, timeout_ms } => {
                assert_eq!(url, "http://127.0.0.1:1/anim.html");
                assert_eq!(timeout_ms, 150);
            }
            other => panic!("expected NavigationTimeout, got {other:?}"),
        }
        assert_eq!(session.transport.as_ref().unwrap().count(methods::STOP_SCREENCAST), 0);
    }

    #[tokio::test]
    async fn error_reply_fails_with_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeTransport::new(u32::MAX);
        fake.fail_method = Some(methods::PAGE_NAVIGATE);
        let mut session = fake_session(dir.path(), fake);
        let mut sink = DirectorySink::new(dir.path());

        let err = session
            .capture(&mut sink, &NoopProgress, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            CaptureError::Command { method, code, .. } => {
                assert_eq!(method, methods::PAGE_NAVIGATE);
                assert_eq!(code, -32000);
            }
            other => panic!("expected Command, got {other:?}"),
        }
        assert_eq!(session.state(), CaptureState::Failed);
    }

    #[tokio::test]
    async fn cancelled_token_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = fake_session(dir.path(), FakeTransport::new(u32::MAX));
        let mut sink = DirectorySink::new(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = session
            .capture(&mut sink, &NoopProgress, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Cancelled));
        assert_eq!(session.state(), CaptureState::Failed);
        assert!(!session.is_transport_open());
    }

    #[tokio::test]
    async fn buffered_event_is_served_before_reading() {
        let mut session = CaptureSession::with_transport(
            request(),
            options(PathBuf::from("/tmp")),
            FakeTransport::new(0),
        );
        session.subscribe(methods::LOAD_EVENT_FIRED);
        session
            .transport
            .as_mut()
            .unwrap()
            .event(methods::LOAD_EVENT_FIRED, json!({"timestamp": 2.0}));

        // The load event arrives while the Page.enable reply is awaited.
        let _ = session.command(methods::PAGE_ENABLE, json!({})).await.unwrap();
        assert_eq!(session.backlog.len(), 1);

        let event = session
            .wait_for_event(methods::LOAD_EVENT_FIRED, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(event.params["timestamp"], 2.0);
        assert!(session.backlog.is_empty());
    }
}
