//! Async driver
//!
//! `Player` owns the controller and applies one message at a time on the
//! task that awaits `run`. Fetches run in spawned tasks and engine events are
//! forwarded, and both come back through the same message channel, so all
//! controller state is touched from a single place.
//!
//! ```text
//! PlayerHandle --+
//! fetch tasks ---+--[Message]--> Player::run --> PlayerController::update
//! engine events -+                                  |
//!                                                   +--[Command::Fetch]--> spawn
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::controller::PlayerController;
use super::message::{Command, LoadOutcome, LoadRequest, Message};
use super::state::PlayerState;
use crate::api::ContentSource;
use crate::audio::{EngineEventReceiver, MediaEngine};
use crate::error::{DataKind, PlayerError};

/// Cheap, cloneable control surface. Every call is a non-blocking send.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl PlayerHandle {
    pub fn send(&self, message: Message) {
        let _ = self.tx.send(message);
    }

    pub fn select_chapter(&self, chapter: u16, reciter: impl Into<String>) {
        self.send(Message::SelectChapter {
            chapter,
            reciter: reciter.into(),
        });
    }

    pub fn play(&self) {
        self.send(Message::Play);
    }

    pub fn pause(&self) {
        self.send(Message::Pause);
    }

    pub fn seek(&self, position_ms: u64) {
        self.send(Message::Seek(position_ms));
    }

    pub fn seek_to_ayah(&self, ayah: u32) {
        self.send(Message::SeekToAyah(ayah));
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(Message::SetVolume(volume));
    }

    pub fn toggle_mute(&self) {
        self.send(Message::ToggleMute);
    }

    pub fn next(&self) {
        self.send(Message::Next);
    }

    pub fn previous(&self) {
        self.send(Message::Previous);
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.send(Message::SetRepeat(repeat));
    }

    pub fn set_auto_advance(&self, auto_advance: bool) {
        self.send(Message::SetAutoAdvance(auto_advance));
    }

    pub fn retry(&self) {
        self.send(Message::Retry);
    }

    /// The highlight target finished loading
    pub fn target_ready(&self) {
        self.send(Message::TargetReady);
    }

    pub fn shutdown(&self) {
        self.send(Message::Shutdown);
    }

    /// True once the player has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct Player<E: MediaEngine, S: ContentSource> {
    controller: PlayerController<E>,
    source: S,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    engine_events: Option<EngineEventReceiver>,
    inflight: Option<JoinHandle<()>>,
    exit_when_finished: bool,
}

impl<E: MediaEngine, S: ContentSource> Player<E, S> {
    pub fn new(
        controller: PlayerController<E>,
        source: S,
        engine_events: EngineEventReceiver,
    ) -> (Self, PlayerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = PlayerHandle { tx: tx.clone() };
        let player = Self {
            controller,
            source,
            tx,
            rx,
            engine_events: Some(engine_events),
            inflight: None,
            exit_when_finished: false,
        };
        (player, handle)
    }

    /// Stop `run` once playback settles in `Ended` or `Error`
    pub fn exit_when_finished(mut self, exit: bool) -> Self {
        self.exit_when_finished = exit;
        self
    }

    /// For subscribing and swapping highlight targets before `run`
    pub fn controller_mut(&mut self) -> &mut PlayerController<E> {
        &mut self.controller
    }

    /// Process messages until `Shutdown` (or a finished chapter, see
    /// `exit_when_finished`). Returns the controller for inspection.
    pub async fn run(mut self) -> PlayerController<E> {
        let forwarder = self.engine_events.take().map(|mut events| {
            let tx = self.tx.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    if tx.send(Message::Engine(event)).is_err() {
                        break;
                    }
                }
            })
        });

        tracing::debug!("Player loop started");
        while let Some(message) = self.rx.recv().await {
            let shutdown = matches!(message, Message::Shutdown);

            for command in self.controller.update(message) {
                self.perform(command);
            }

            if shutdown {
                break;
            }
            if self.exit_when_finished
                && matches!(
                    self.controller.state(),
                    PlayerState::Ended | PlayerState::Error
                )
            {
                tracing::info!("Playback finished ({})", self.controller.state());
                break;
            }
        }

        if let Some(task) = self.inflight.take() {
            task.abort();
        }
        if let Some(task) = forwarder {
            task.abort();
        }
        self.rx.close();
        tracing::debug!("Player loop stopped");
        self.controller
    }

    fn perform(&mut self, command: Command) {
        match command {
            Command::Fetch(request) => {
                // Superseded fetches would be discarded by id anyway
                if let Some(previous) = self.inflight.take() {
                    previous.abort();
                }

                let source = self.source.clone();
                let tx = self.tx.clone();
                self.inflight = Some(tokio::spawn(async move {
                    let LoadRequest {
                        selection_id,
                        chapter,
                        reciter,
                    } = request;
                    let outcome = fetch_selection(&source, chapter, &reciter).await;
                    if tx
                        .send(Message::Loaded {
                            selection_id,
                            outcome,
                        })
                        .is_err()
                    {
                        tracing::debug!("Player stopped before selection {} loaded", selection_id);
                    }
                }));
            }
        }
    }
}

/// Fetch chapter metadata, audio URL and timings concurrently
pub async fn fetch_selection<S: ContentSource>(
    source: &S,
    chapter: u16,
    reciter: &str,
) -> LoadOutcome {
    let (chapters, audio_url, timings) = tokio::join!(
        source.chapters(),
        source.audio_url(chapter, reciter),
        source.timings(chapter, reciter),
    );

    LoadOutcome {
        chapters: chapters.map_err(|e| PlayerError::unavailable(DataKind::Chapters, format!("{:#}", e))),
        audio_url: audio_url.map_err(|e| PlayerError::unavailable(DataKind::Audio, format!("{:#}", e))),
        timings: timings.map_err(|e| PlayerError::unavailable(DataKind::Timings, format!("{:#}", e))),
    }
}
