//! Rodio-backed playback engine
//!
//! The output stream and sink live on a dedicated audio thread. `RodioEngine`
//! is the handle the clock talks to: it sends commands and returns
//! immediately. Downloads run on the caller's tokio runtime and hand their
//! bytes to the audio thread, which decodes them and reports back through the
//! engine event channel.
//!
//! ```text
//! PlaybackClock --> RodioEngine --[AudioCommand]--> audio thread (Sink)
//!                                                      |
//! driver <----------------[EngineEvent]----------------+
//! ```

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use rodio::decoder::DecoderError;
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tokio::time::Instant;

use super::engine::{LoadTicket, MediaEngine};
use super::events::{
    AudioCommand, AudioCommandReceiver, AudioCommandSender, EngineEvent, EngineEventSender,
    audio_command_channel,
};
use crate::error::{DataKind, PlaybackError, PlayerError};

/// How often the audio thread reports the position while playing
const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Handle to the audio thread
pub struct RodioEngine {
    command_tx: AudioCommandSender,
    runtime: tokio::runtime::Handle,
    http: reqwest::Client,
    /// Ticket of the newest load; older downloads are dropped on arrival
    latest: Arc<AtomicU64>,
    /// False when no output device could be opened
    device_ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for RodioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioEngine")
            .field("latest", &self.latest.load(Ordering::Relaxed))
            .field("device_ready", &self.device_ready.load(Ordering::Relaxed))
            .finish()
    }
}

impl RodioEngine {
    /// Spawn the audio thread. Must be called from within a tokio runtime.
    pub fn new(events: EngineEventSender, http: reqwest::Client) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("RodioEngine needs a tokio runtime for downloads")?;

        let (command_tx, command_rx) = audio_command_channel();
        let latest = Arc::new(AtomicU64::new(0));
        let device_ready = Arc::new(AtomicBool::new(false));

        let thread_latest = latest.clone();
        let thread_ready = device_ready.clone();
        std::thread::Builder::new()
            .name("ayah-audio".to_string())
            .spawn(move || {
                AudioThread::new(events, thread_latest, thread_ready).run(command_rx);
            })
            .context("failed to spawn audio thread")?;

        Ok(Self {
            command_tx,
            runtime,
            http,
            latest,
            device_ready,
        })
    }

    fn send(&self, command: AudioCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::error!("Audio thread is gone, command dropped");
        }
    }
}

impl MediaEngine for RodioEngine {
    fn load(&mut self, ticket: LoadTicket, url: &str) {
        self.latest.store(ticket.0, Ordering::SeqCst);
        self.send(AudioCommand::Unload);

        let http = self.http.clone();
        let tx = self.command_tx.clone();
        let latest = self.latest.clone();
        let url = url.to_string();

        self.runtime.spawn(async move {
            let result = download(&http, &url).await;

            if latest.load(Ordering::SeqCst) != ticket.0 {
                tracing::debug!("Download {} for {} superseded, dropping", ticket, url);
                return;
            }

            let command = match result {
                Ok(bytes) => {
                    tracing::debug!("Downloaded {} bytes from {}", bytes.len(), url);
                    AudioCommand::Source { ticket, bytes }
                }
                Err(e) => AudioCommand::Failed {
                    ticket,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(command);
        });
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if !self.device_ready.load(Ordering::SeqCst) {
            return Err(PlaybackError::Rejected {
                reason: "no audio output device".to_string(),
            });
        }
        self.send(AudioCommand::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.send(AudioCommand::Pause);
    }

    fn seek(&mut self, position_ms: u64) {
        self.send(AudioCommand::Seek {
            position: Duration::from_millis(position_ms),
        });
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(AudioCommand::SetVolume { volume });
    }

    fn unload(&mut self) {
        self.latest.store(0, Ordering::SeqCst);
        self.send(AudioCommand::Unload);
    }
}

async fn download(http: &reqwest::Client, url: &str) -> reqwest::Result<Vec<u8>> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Shutdown);
    }
}

/// State owned by the audio thread
struct AudioThread {
    events: EngineEventSender,
    latest: Arc<AtomicU64>,
    /// Kept alive for as long as sinks play into its mixer
    _stream: Option<OutputStream>,
    mixer: Option<Mixer>,
    sink: Option<Sink>,
    /// Encoded source, kept so a drained sink can be rebuilt
    bytes: Option<Arc<[u8]>>,
    ticket: Option<LoadTicket>,
    playing: bool,
    volume: f32,
    /// Next position report. Commands never push it back.
    next_tick: Instant,
}

impl AudioThread {
    fn new(events: EngineEventSender, latest: Arc<AtomicU64>, ready: Arc<AtomicBool>) -> Self {
        let stream = match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => {
                ready.store(true, Ordering::SeqCst);
                Some(stream)
            }
            Err(e) => {
                tracing::error!("Failed to open audio output: {}", e);
                None
            }
        };
        let mixer = stream.as_ref().map(|s| s.mixer().clone());
        Self::with_output(events, latest, stream, mixer)
    }

    fn with_output(
        events: EngineEventSender,
        latest: Arc<AtomicU64>,
        stream: Option<OutputStream>,
        mixer: Option<Mixer>,
    ) -> Self {
        Self {
            events,
            latest,
            _stream: stream,
            mixer,
            sink: None,
            bytes: None,
            ticket: None,
            playing: false,
            volume: 1.0,
            next_tick: Instant::now() + TIME_UPDATE_INTERVAL,
        }
    }

    fn run(mut self, mut commands: AudioCommandReceiver) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Audio thread could not start its timer: {}", e);
                return;
            }
        };

        tracing::debug!("Audio thread started");
        self.next_tick = Instant::now() + TIME_UPDATE_INTERVAL;
        loop {
            let received =
                runtime.block_on(tokio::time::timeout_at(self.next_tick, commands.recv()));
            match received {
                Ok(None) | Ok(Some(AudioCommand::Shutdown)) => break,
                Ok(Some(command)) => self.handle(command),
                Err(_) => {}
            }
            self.tick_if_due(Instant::now());
        }
        self.unload();
        tracing::debug!("Audio thread stopped");
    }

    fn is_current(&self, ticket: LoadTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    fn handle(&mut self, command: AudioCommand) {
        tracing::trace!("Audio command: {:?}", command);
        match command {
            AudioCommand::Source { ticket, bytes } => self.open(ticket, bytes),
            AudioCommand::Failed { ticket, reason } => {
                if !self.is_current(ticket) {
                    tracing::debug!("Failure of superseded source {} dropped", ticket);
                    return;
                }
                self.emit(EngineEvent::LoadFailed {
                    ticket,
                    error: PlayerError::unavailable(DataKind::Audio, reason),
                });
            }
            AudioCommand::Play => {
                self.rewind_if_drained();
                if let Some(sink) = &self.sink {
                    sink.play();
                    self.playing = true;
                }
            }
            AudioCommand::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
                self.playing = false;
            }
            AudioCommand::Seek { position } => {
                self.rewind_if_drained();
                if let Some(sink) = &self.sink {
                    if let Err(e) = sink.try_seek(position) {
                        tracing::warn!("Seek to {:?} failed: {}", position, e);
                    }
                }
                if let Some(ticket) = self.ticket {
                    self.emit(EngineEvent::Seeked {
                        ticket,
                        position_ms: position.as_millis() as u64,
                    });
                }
            }
            AudioCommand::SetVolume { volume } => {
                self.volume = volume;
                if let Some(sink) = &self.sink {
                    sink.set_volume(volume);
                }
            }
            AudioCommand::Unload => self.unload(),
            AudioCommand::Shutdown => {}
        }
    }

    fn open(&mut self, ticket: LoadTicket, bytes: Vec<u8>) {
        if !self.is_current(ticket) {
            tracing::debug!("Source {} arrived after being superseded", ticket);
            return;
        }
        self.unload();

        let duration_ms = match self.attach(bytes.into()) {
            Ok(duration_ms) => duration_ms,
            Err(e) => {
                self.emit(EngineEvent::LoadFailed {
                    ticket,
                    error: PlaybackError::Decode {
                        reason: e.to_string(),
                    }
                    .into(),
                });
                return;
            }
        };

        self.ticket = Some(ticket);
        tracing::info!("Audio source {} ready, duration {}ms", ticket, duration_ms);
        self.emit(EngineEvent::Loaded {
            ticket,
            duration_ms,
        });
    }

    /// Decode `bytes` into a fresh, paused sink. Returns the duration in ms,
    /// 0 when the container does not say.
    fn attach(&mut self, bytes: Arc<[u8]>) -> Result<u64, DecoderError> {
        let source = Decoder::new(Cursor::new(bytes.clone()))?;
        let duration_ms = source
            .total_duration()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        if let Some(mixer) = &self.mixer {
            let sink = Sink::connect_new(mixer);
            sink.pause();
            sink.set_volume(self.volume);
            sink.append(source);
            self.sink = Some(sink);
        }
        self.bytes = Some(bytes);
        Ok(duration_ms)
    }

    /// A drained sink cannot seek, so decode the source again
    fn rewind_if_drained(&mut self) {
        if !self.sink.as_ref().is_some_and(Sink::empty) {
            return;
        }
        let Some(bytes) = self.bytes.clone() else {
            return;
        };
        if let Err(e) = self.attach(bytes) {
            tracing::warn!("Failed to rewind source: {}", e);
        }
    }

    fn unload(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.bytes = None;
        self.ticket = None;
        self.playing = false;
    }

    /// Report once the deadline has passed, however many commands arrived
    /// in between. Returns whether a report was due.
    fn tick_if_due(&mut self, now: Instant) -> bool {
        if now < self.next_tick {
            return false;
        }
        self.tick();
        self.next_tick = now + TIME_UPDATE_INTERVAL;
        true
    }

    fn tick(&mut self) {
        let (Some(sink), Some(ticket)) = (&self.sink, self.ticket) else {
            return;
        };
        if !self.playing {
            return;
        }

        if sink.empty() {
            self.playing = false;
            self.emit(EngineEvent::Ended { ticket });
            return;
        }

        let position_ms = sink.get_pos().as_millis() as u64;
        self.emit(EngineEvent::TimeUpdate {
            ticket,
            position_ms,
        });
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Engine event receiver dropped");
        }
    }
}
