//! Debounced preview renderer
//!
//! `Idle → DebouncePending → Rendering → Rendered`. An edit while a render is
//! pending pushes the deadline back. A failed render loads the error document
//! and still ends in `Rendered`.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::console::{BridgeMessage, ConsoleBuffer, ConsoleMessage};
use super::document::{
    compose, error_document, ComposeOptions, PreviewDocument, PreviewSource, SandboxPolicy,
};
use crate::config::PreviewConfig;
use crate::error::{Error, Result};

/// Where composed documents are displayed
pub trait RenderSurface {
    /// Replace whatever is displayed with `document`
    fn load(&mut self, document: &PreviewDocument) -> Result<()>;
}

/// Surface that keeps the latest `<iframe srcdoc>` markup
#[derive(Debug, Clone)]
pub struct SrcdocSurface {
    policy: SandboxPolicy,
    title: String,
    markup: Option<String>,
    renders: u64,
}

impl SrcdocSurface {
    pub fn new(policy: SandboxPolicy) -> Self {
        SrcdocSurface {
            policy,
            title: "HTML Preview".to_string(),
            markup: None,
            renders: 0,
        }
    }

    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }
}

impl Default for SrcdocSurface {
    fn default() -> Self {
        Self::new(SandboxPolicy::default())
    }
}

impl RenderSurface for SrcdocSurface {
    fn load(&mut self, document: &PreviewDocument) -> Result<()> {
        self.markup = Some(document.to_iframe(&self.policy, &self.title));
        self.renders += 1;
        Ok(())
    }
}

/// Renderer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    DebouncePending { deadline: Instant },
    Rendering,
    Rendered,
}

/// Serializable state name for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewPhase {
    Idle,
    DebouncePending,
    Rendering,
    Rendered,
}

impl From<PreviewState> for PreviewPhase {
    fn from(state: PreviewState) -> Self {
        match state {
            PreviewState::Idle => PreviewPhase::Idle,
            PreviewState::DebouncePending { .. } => PreviewPhase::DebouncePending,
            PreviewState::Rendering => PreviewPhase::Rendering,
            PreviewState::Rendered => PreviewPhase::Rendered,
        }
    }
}

/// Debounced renderer owning its console buffer
pub struct PreviewRenderer<S> {
    surface: S,
    source: PreviewSource,
    options: ComposeOptions,
    debounce: Duration,
    state: PreviewState,
    console: ConsoleBuffer,
    renders: u64,
    last_error: Option<String>,
    document: Option<PreviewDocument>,
}

impl<S: RenderSurface> PreviewRenderer<S> {
    pub fn new(surface: S, config: &PreviewConfig) -> Self {
        PreviewRenderer {
            surface,
            source: PreviewSource::default(),
            options: ComposeOptions::from_config(config),
            debounce: config.debounce,
            state: PreviewState::Idle,
            console: ConsoleBuffer::new(config.console_capacity),
            renders: 0,
            last_error: None,
            document: None,
        }
    }

    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    /// Pending render deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            PreviewState::DebouncePending { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn console(&self) -> &ConsoleBuffer {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut ConsoleBuffer {
        &mut self.console
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Completed renders (error documents included)
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Latest document handed to the surface
    pub fn document(&self) -> Option<&PreviewDocument> {
        self.document.as_ref()
    }

    /// Record an edit and (re)arm the debounce deadline
    pub fn edit(&mut self, source: PreviewSource, now: Instant) {
        self.source = source;
        self.state = PreviewState::DebouncePending {
            deadline: now + self.debounce,
        };
    }

    /// Render if the debounce deadline has passed; returns whether it did
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            PreviewState::DebouncePending { deadline } if now >= deadline => {
                if let Err(e) = self.render_now() {
                    debug!("Preview rendered with error document: {}", e);
                }
                true
            }
            _ => false,
        }
    }

    /// Render immediately, cancelling any pending deadline
    ///
    /// On failure the error document is shown and the failure returned.
    pub fn render_now(&mut self) -> Result<()> {
        self.state = PreviewState::Rendering;

        let outcome = compose(&self.source, &self.options)
            .and_then(|document| self.show(document));

        if let Err(ref e) = outcome {
            let message = e.to_string();
            if let Err(load_err) = self.show(error_document(&message)) {
                warn!("Failed to load preview error document: {}", load_err);
            }
            self.last_error = Some(message);
        } else {
            self.last_error = None;
        }

        self.renders += 1;
        self.state = PreviewState::Rendered;
        outcome
    }

    fn show(&mut self, document: PreviewDocument) -> Result<()> {
        self.surface.load(&document)?;
        self.document = Some(document);
        Ok(())
    }

    fn snapshot(&self) -> PreviewSnapshot {
        PreviewSnapshot {
            phase: self.state.into(),
            renders: self.renders,
            console: self.console.snapshot(),
            last_error: self.last_error.clone(),
            document: self.document.as_ref().map(|d| d.as_str().to_string()),
        }
    }
}

impl<S: RenderSurface + Send + 'static> PreviewRenderer<S> {
    /// Run the renderer on its own task
    ///
    /// The task is the only writer of the console buffer. Readers observe it
    /// through the watch channel.
    pub fn spawn(self) -> PreviewHandle<S> {
        let (tx, rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(self.snapshot());
        let task = tokio::spawn(run(self, rx, snapshot_tx));

        PreviewHandle {
            events: tx,
            snapshot: snapshot_rx,
            task,
        }
    }
}

/// Input to a spawned renderer
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    Edit(PreviewSource),
    Console(ConsoleMessage),
    Refresh,
    ClearConsole,
}

/// What readers see of a spawned renderer
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSnapshot {
    pub phase: PreviewPhase,
    pub renders: u64,
    pub console: Vec<ConsoleMessage>,
    pub last_error: Option<String>,
    pub document: Option<String>,
}

async fn run<S: RenderSurface>(
    mut renderer: PreviewRenderer<S>,
    mut events: mpsc::Receiver<PreviewEvent>,
    snapshot: watch::Sender<PreviewSnapshot>,
) -> PreviewRenderer<S> {
    loop {
        let deadline = renderer.deadline();

        tokio::select! {
            event = events.recv() => match event {
                Some(PreviewEvent::Edit(source)) => renderer.edit(source, Instant::now()),
                Some(PreviewEvent::Console(message)) => renderer.console.push(message),
                Some(PreviewEvent::ClearConsole) => renderer.console.clear(),
                Some(PreviewEvent::Refresh) => {
                    let _ = renderer.render_now();
                }
                None => break,
            },
            _ = wait_until(deadline) => {
                renderer.poll(Instant::now());
            }
        }

        snapshot.send_replace(renderer.snapshot());
    }

    renderer
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle to a spawned renderer
pub struct PreviewHandle<S> {
    events: mpsc::Sender<PreviewEvent>,
    snapshot: watch::Receiver<PreviewSnapshot>,
    task: JoinHandle<PreviewRenderer<S>>,
}

impl<S> PreviewHandle<S> {
    async fn send(&self, event: PreviewEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| Error::Internal("Preview renderer stopped".to_string()))
    }

    pub async fn edit(&self, source: PreviewSource) -> Result<()> {
        self.send(PreviewEvent::Edit(source)).await
    }

    pub async fn console(&self, message: ConsoleMessage) -> Result<()> {
        self.send(PreviewEvent::Console(message)).await
    }

    /// Forward a raw `postMessage` payload; foreign payloads are dropped
    pub async fn bridge(&self, payload: &str) -> Result<()> {
        match BridgeMessage::parse(payload) {
            Some(message) => self.console(message).await,
            None => Ok(()),
        }
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(PreviewEvent::Refresh).await
    }

    pub async fn clear_console(&self) -> Result<()> {
        self.send(PreviewEvent::ClearConsole).await
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> PreviewSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<PreviewSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the task and get the renderer back
    pub async fn shutdown(self) -> Result<PreviewRenderer<S>> {
        drop(self.events);
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Preview renderer task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::console::ConsoleKind;

    /// Surface that fails on demand
    #[derive(Default)]
    struct Flaky {
        fail: bool,
        loaded: Vec<String>,
    }

    impl RenderSurface for Flaky {
        fn load(&mut self, document: &PreviewDocument) -> Result<()> {
            if self.fail && !document.as_str().contains("Error Loading HTML:") {
                return Err(Error::Internal("surface detached".to_string()));
            }
            self.loaded.push(document.as_str().to_string());
            Ok(())
        }
    }

    fn config() -> PreviewConfig {
        PreviewConfig {
            console_capacity: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_edit_resets_debounce() {
        let mut renderer = PreviewRenderer::new(SrcdocSurface::default(), &config());
        let t0 = Instant::now();

        renderer.edit(PreviewSource::new("<p>1</p>"), t0);
        assert!(!renderer.poll(t0 + Duration::from_millis(300)));

        renderer.edit(PreviewSource::new("<p>2</p>"), t0 + Duration::from_millis(300));
        assert!(!renderer.poll(t0 + Duration::from_millis(700)));
        assert!(matches!(renderer.state(), PreviewState::DebouncePending { .. }));

        assert!(renderer.poll(t0 + Duration::from_millis(800)));
        assert_eq!(renderer.state(), PreviewState::Rendered);
        assert_eq!(renderer.surface().render_count(), 1);
        assert!(renderer.document().unwrap().as_str().contains("<p>2</p>"));
        assert!(!renderer.poll(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_failed_render_shows_error_document() {
        let surface = Flaky {
            fail: true,
            ..Default::default()
        };
        let mut renderer = PreviewRenderer::new(surface, &config());
        renderer.edit(PreviewSource::new("<p>x</p>"), Instant::now());

        assert!(renderer.render_now().is_err());
        assert_eq!(renderer.state(), PreviewState::Rendered);
        assert_eq!(renderer.last_error(), Some("Internal error: surface detached"));

        let surface = renderer.into_surface();
        assert_eq!(surface.loaded.len(), 1);
        assert!(surface.loaded[0].contains("surface detached"));
    }

    #[test]
    fn test_oversized_source_renders_error_document() {
        let mut renderer = PreviewRenderer::new(SrcdocSurface::default(), &config())
            .with_options(ComposeOptions {
                max_source_bytes: 4,
                ..Default::default()
            });
        renderer.edit(PreviewSource::new("<p>long</p>"), Instant::now());

        assert!(renderer.render_now().is_err());
        assert!(renderer
            .document()
            .unwrap()
            .as_str()
            .contains("Error Loading HTML:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_renderer_debounces() {
        let handle = PreviewRenderer::new(SrcdocSurface::default(), &config()).spawn();

        handle.edit(PreviewSource::new("<p>a</p>")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.edit(PreviewSource::new("<p>b</p>")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(handle.snapshot().renders, 0);
        assert_eq!(handle.snapshot().phase, PreviewPhase::DebouncePending);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.renders, 1);
        assert_eq!(snapshot.phase, PreviewPhase::Rendered);
        assert!(snapshot.document.unwrap().contains("<p>b</p>"));

        let renderer = handle.shutdown().await.unwrap();
        assert_eq!(renderer.surface().render_count(), 1);
    }

    #[tokio::test]
    async fn test_spawned_console_is_bounded_and_ordered() {
        let handle = PreviewRenderer::new(SrcdocSurface::default(), &config()).spawn();
        let mut updates = handle.subscribe();

        for (i, kind) in ["log", "warn", "error", "log"].iter().enumerate() {
            let payload = format!(
                r#"{{"source":"coderelay-preview","kind":"{}","text":"m{}"}}"#,
                kind, i
            );
            handle.bridge(&payload).await.unwrap();
        }
        handle.bridge(r#"{"source":"other","kind":"log"}"#).await.unwrap();
        handle.refresh().await.unwrap();

        updates
            .wait_for(|s| s.renders == 1)
            .await
            .unwrap();
        let console = handle.snapshot().console;
        let texts: Vec<_> = console.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m1", "m2", "m3"]);
        assert_eq!(console[0].kind, ConsoleKind::Warn);

        handle.clear_console().await.unwrap();
        updates.wait_for(|s| s.console.is_empty()).await.unwrap();

        handle.shutdown().await.unwrap();
    }
}
