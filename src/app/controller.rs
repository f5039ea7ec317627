//! Playback controller
//!
//! A synchronous state machine over one `PlaybackClock`, one `AyahResolver`
//! and one `HighlightRenderer`. `update` applies a single message and returns
//! the fetches the driver has to start; fetch results and engine reports come
//! back in as messages. Nothing here blocks or spawns.

use std::sync::Arc;

use super::message::{Command, LoadOutcome, LoadRequest, Message};
use super::state::{PlayerState, Selection};
use super::subscription::{SubscriptionId, Subscribers};
use crate::api::ChapterMeta;
use crate::audio::{ClockEvent, EngineEvent, MediaEngine, PlaybackClock, PlaybackState};
use crate::error::{DataKind, PlaybackError, PlayerError};
use crate::features::settings::PlaybackSettings;
use crate::features::timing::{
    AyahChange, AyahResolver, RecitationKey, ResolvedAyah, TimingTable,
};
use crate::highlight::{HighlightRenderer, HighlightTarget};

/// Used for range checks until the chapter list has been fetched
pub const DEFAULT_CHAPTER_COUNT: u16 = 114;

pub struct PlayerController<E: MediaEngine> {
    clock: PlaybackClock<E>,
    resolver: AyahResolver,
    renderer: HighlightRenderer,
    state: PlayerState,
    selection: Option<Selection>,
    last_selection_id: u64,
    chapters: Vec<ChapterMeta>,
    repeat: bool,
    auto_advance: bool,
    last_error: Option<PlayerError>,

    next_subscription: u64,
    ayah_subscribers: Subscribers<AyahChange>,
    state_subscribers: Subscribers<PlayerState>,
    error_subscribers: Subscribers<PlayerError>,
}

impl<E: MediaEngine> std::fmt::Debug for PlayerController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerController")
            .field("state", &self.state)
            .field("selection", &self.selection)
            .field("playback", &self.clock.snapshot())
            .field("repeat", &self.repeat)
            .field("auto_advance", &self.auto_advance)
            .finish_non_exhaustive()
    }
}

impl<E: MediaEngine> PlayerController<E> {
    pub fn new(engine: E, target: Option<HighlightTarget>) -> Self {
        Self {
            clock: PlaybackClock::new(engine),
            resolver: AyahResolver::new(Arc::new(TimingTable::empty(RecitationKey::new(0, "")))),
            renderer: HighlightRenderer::new(target),
            state: PlayerState::Idle,
            selection: None,
            last_selection_id: 0,
            chapters: Vec::new(),
            repeat: false,
            auto_advance: true,
            last_error: None,
            next_subscription: 0,
            ayah_subscribers: Subscribers::default(),
            state_subscribers: Subscribers::default(),
            error_subscribers: Subscribers::default(),
        }
    }

    pub fn apply_settings(&mut self, playback: &PlaybackSettings) {
        self.clock.set_volume(playback.volume);
        self.repeat = playback.repeat;
        self.auto_advance = playback.auto_advance;
    }

    // ============ Accessors ============

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn playback(&self) -> PlaybackState {
        self.clock.snapshot()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn current_ayah(&self) -> Option<&ResolvedAyah> {
        self.resolver.current()
    }

    pub fn timing_table(&self) -> &Arc<TimingTable> {
        self.resolver.table()
    }

    pub fn chapters(&self) -> &[ChapterMeta] {
        &self.chapters
    }

    /// Highest selectable chapter number
    pub fn chapter_count(&self) -> u16 {
        self.chapters
            .iter()
            .map(|c| c.number)
            .max()
            .unwrap_or(DEFAULT_CHAPTER_COUNT)
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    pub fn engine(&self) -> &E {
        self.clock.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.clock.engine_mut()
    }

    pub fn renderer(&self) -> &HighlightRenderer {
        &self.renderer
    }

    /// Swap the highlight target; the old one is returned cleaned
    pub fn set_highlight_target(
        &mut self,
        target: Option<HighlightTarget>,
    ) -> Option<HighlightTarget> {
        self.renderer.set_target(target)
    }

    // ============ Subscriptions ============

    fn subscription_id(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId(self.next_subscription)
    }

    pub fn on_ayah_changed(&mut self, handler: impl FnMut(&AyahChange) + 'static) -> SubscriptionId {
        let id = self.subscription_id();
        self.ayah_subscribers.add(id, handler);
        id
    }

    pub fn on_playback_state_changed(
        &mut self,
        handler: impl FnMut(&PlayerState) + 'static,
    ) -> SubscriptionId {
        let id = self.subscription_id();
        self.state_subscribers.add(id, handler);
        id
    }

    pub fn on_error(&mut self, handler: impl FnMut(&PlayerError) + 'static) -> SubscriptionId {
        let id = self.subscription_id();
        self.error_subscribers.add(id, handler);
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.ayah_subscribers.remove(id)
            || self.state_subscribers.remove(id)
            || self.error_subscribers.remove(id)
    }

    // ============ Update ============

    pub fn update(&mut self, message: Message) -> Vec<Command> {
        match message {
            Message::SelectChapter { chapter, reciter } => self.select(chapter, reciter, false),
            Message::Next => self.step(1),
            Message::Previous => self.step(-1),
            Message::Retry => self.retry(),
            Message::Loaded {
                selection_id,
                outcome,
            } => {
                self.on_loaded(selection_id, outcome);
                Vec::new()
            }
            Message::Engine(event) => self.on_engine_event(event),
            message => {
                self.handle_transport(message);
                Vec::new()
            }
        }
    }

    fn handle_transport(&mut self, message: Message) {
        match message {
            Message::Play => self.play(),
            Message::Pause => self.pause(),
            Message::Seek(position_ms) => self.seek(position_ms),
            Message::SeekToAyah(ayah) => self.seek_to_ayah(ayah),
            Message::SetVolume(volume) => self.clock.set_volume(volume),
            Message::ToggleMute => self.clock.toggle_mute(),
            Message::SetRepeat(repeat) => {
                tracing::debug!("Repeat {}", if repeat { "on" } else { "off" });
                self.repeat = repeat;
            }
            Message::SetAutoAdvance(auto_advance) => {
                tracing::debug!("Auto-advance {}", if auto_advance { "on" } else { "off" });
                self.auto_advance = auto_advance;
            }
            Message::TargetReady => self.renderer.refresh(),
            Message::Shutdown => self.shutdown(),
            _ => {}
        }
    }

    // ============ Selection ============

    fn select(&mut self, chapter: u16, reciter: String, autoplay: bool) -> Vec<Command> {
        let count = self.chapter_count();
        if chapter == 0 || chapter > count {
            tracing::warn!("Chapter {} is outside 1..={}", chapter, count);
            return Vec::new();
        }

        self.last_selection_id += 1;
        let id = self.last_selection_id;
        let key = RecitationKey::new(chapter, reciter.clone());

        if let Some(old) = &self.selection {
            tracing::debug!("Selection {} ({}) superseded by {}", old.id, old.key, id);
        }
        tracing::info!("Selecting {} (selection {})", key, id);

        // Release everything tied to the previous chapter before anything new arrives
        self.renderer.clear();
        self.clock.detach();
        self.resolver
            .replace_table(Arc::new(TimingTable::empty(key.clone())));
        self.last_error = None;
        self.selection = Some(Selection { id, key, autoplay });
        self.set_state(PlayerState::Loading);

        vec![Command::Fetch(LoadRequest {
            selection_id: id,
            chapter,
            reciter,
        })]
    }

    fn step(&mut self, delta: i32) -> Vec<Command> {
        let Some(selection) = &self.selection else {
            tracing::debug!("Nothing selected, cannot step {}", delta);
            return Vec::new();
        };

        let target = i32::from(selection.key.chapter) + delta;
        let Some(chapter) = u16::try_from(target)
            .ok()
            .filter(|c| (1..=self.chapter_count()).contains(c))
        else {
            tracing::debug!("No chapter {} to step to", target);
            return Vec::new();
        };

        let autoplay = match self.state {
            PlayerState::Playing => true,
            PlayerState::Loading => selection.autoplay,
            _ => false,
        };
        let reciter = selection.key.reciter.clone();
        self.select(chapter, reciter, autoplay)
    }

    fn retry(&mut self) -> Vec<Command> {
        if self.state != PlayerState::Error {
            tracing::debug!("Retry ignored in state {}", self.state);
            return Vec::new();
        }
        let Some(selection) = &self.selection else {
            return Vec::new();
        };
        let (chapter, reciter, autoplay) = (
            selection.key.chapter,
            selection.key.reciter.clone(),
            selection.autoplay,
        );
        tracing::info!("Retrying chapter {}", chapter);
        self.select(chapter, reciter, autoplay)
    }

    fn on_loaded(&mut self, selection_id: u64, outcome: LoadOutcome) {
        let current = self.selection.as_ref().map(|s| s.id);
        if current != Some(selection_id) || self.state != PlayerState::Loading {
            tracing::debug!(
                "Discarding load result for selection {} (current {:?}, state {})",
                selection_id,
                current,
                self.state
            );
            return;
        }
        let Some(key) = self.selection.as_ref().map(|s| s.key.clone()) else {
            return;
        };

        let LoadOutcome {
            chapters,
            audio_url,
            timings,
        } = outcome;

        match chapters {
            Ok(chapters) if chapters.is_empty() => {
                return self.fail(PlayerError::unavailable(
                    DataKind::Chapters,
                    "chapter list is empty",
                ));
            }
            Ok(chapters) => self.chapters = chapters,
            Err(e) => return self.fail(e),
        }

        let url = match audio_url {
            Ok(url) => url,
            Err(e) => return self.fail(e),
        };

        let table = match timings {
            Ok(records) => {
                let table = TimingTable::new(key.clone(), records);
                if let Some(reason) = table.diagnostics().describe() {
                    self.report(PlayerError::MalformedTimingData { reason });
                }
                if table.is_empty() {
                    self.report(PlayerError::unavailable(
                        DataKind::Timings,
                        format!("no timing entries for {}", key),
                    ));
                }
                table
            }
            Err(e) => {
                self.report(e);
                TimingTable::empty(key.clone())
            }
        };
        tracing::debug!("Timing table for {} has {} entries", key, table.len());
        self.resolver.replace_table(Arc::new(table));

        let ticket = self.clock.load(&url);
        tracing::debug!("Loading audio {} for {} as {}", url, key, ticket);
    }

    // ============ Engine ============

    fn on_engine_event(&mut self, event: EngineEvent) -> Vec<Command> {
        let Some(event) = self.clock.handle_engine_event(event) else {
            return Vec::new();
        };

        match event {
            ClockEvent::Loaded { duration_ms } => {
                if self.state != PlayerState::Loading {
                    return Vec::new();
                }
                tracing::debug!("Audio ready, duration {}ms", duration_ms);
                self.set_state(PlayerState::Ready);
                self.publish_position(0);
                if self.selection.as_ref().is_some_and(|s| s.autoplay) {
                    self.play();
                }
                Vec::new()
            }
            ClockEvent::LoadFailed(error) => {
                self.fail(error);
                Vec::new()
            }
            ClockEvent::Position { position_ms } => {
                self.publish_position(position_ms);
                Vec::new()
            }
            ClockEvent::Ended => self.on_ended(),
        }
    }

    fn on_ended(&mut self) -> Vec<Command> {
        self.set_state(PlayerState::Ended);

        if self.repeat {
            tracing::debug!("Repeating chapter");
            self.play();
            return Vec::new();
        }
        if !self.auto_advance {
            return Vec::new();
        }

        let Some(selection) = &self.selection else {
            return Vec::new();
        };
        let next = selection.key.chapter.saturating_add(1);
        if next > self.chapter_count() {
            tracing::info!("Reached the last chapter, stopping");
            return Vec::new();
        }
        let reciter = selection.key.reciter.clone();
        self.select(next, reciter, true)
    }

    // ============ Transport ============

    fn play(&mut self) {
        match self.state {
            PlayerState::Playing => {}
            PlayerState::Loading => {
                if let Some(selection) = &mut self.selection {
                    selection.autoplay = true;
                }
            }
            PlayerState::Idle | PlayerState::Error if !self.clock.is_loaded() => {
                self.report(PlaybackError::NotLoaded.into());
            }
            _ => {
                if self.state == PlayerState::Ended {
                    self.clock.seek(0);
                    self.publish_position(0);
                }
                match self.clock.play() {
                    Ok(()) => self.set_state(PlayerState::Playing),
                    Err(e) => self.fail(e.into()),
                }
            }
        }
    }

    fn pause(&mut self) {
        match self.state {
            PlayerState::Playing => {
                self.clock.pause();
                self.set_state(PlayerState::Paused);
            }
            PlayerState::Loading => {
                if let Some(selection) = &mut self.selection {
                    selection.autoplay = false;
                }
            }
            _ => tracing::debug!("Pause ignored in state {}", self.state),
        }
    }

    fn seek(&mut self, position_ms: u64) {
        let Some(position_ms) = self.clock.seek(position_ms) else {
            return;
        };
        if self.state == PlayerState::Ended {
            self.set_state(PlayerState::Paused);
        }
        self.publish_position(position_ms);
    }

    fn seek_to_ayah(&mut self, ayah: u32) {
        match self.resolver.table().start_of(ayah) {
            Some(start) => self.seek(start),
            None => tracing::debug!("Ayah {} is not in the timing table", ayah),
        }
    }

    fn shutdown(&mut self) {
        tracing::info!("Shutting down player");
        self.renderer.clear();
        self.clock.detach();
        self.selection = None;
        self.resolver
            .replace_table(Arc::new(TimingTable::empty(RecitationKey::new(0, ""))));
        self.set_state(PlayerState::Idle);
    }

    // ============ Notifications ============

    fn publish_position(&mut self, position_ms: u64) {
        let Some(change) = self.resolver.update(position_ms) else {
            return;
        };
        self.renderer.render(&change);
        self.ayah_subscribers.emit(&change);
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state == state {
            return;
        }
        tracing::debug!("Player state {} -> {}", self.state, state);
        self.state = state;
        self.state_subscribers.emit(&state);
    }

    /// Fatal for the current chapter: enter `Error`
    fn fail(&mut self, error: PlayerError) {
        tracing::error!("{}", error);
        self.last_error = Some(error.clone());
        self.set_state(PlayerState::Error);
        self.error_subscribers.emit(&error);
    }

    /// Degraded or refused: notify without changing state
    fn report(&mut self, error: PlayerError) {
        tracing::warn!("{}", error);
        self.error_subscribers.emit(&error);
    }
}

impl<E: MediaEngine> Drop for PlayerController<E> {
    fn drop(&mut self) {
        self.renderer.clear();
        self.clock.detach();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::audio::{EngineCall, LoadTicket, RecordingEngine};
    use crate::error::Severity;
    use crate::features::timing::RawTimingRecord;
    use crate::highlight::{MemoryTextSurface, ShapeStyle, SvgPage};

    type Controller = PlayerController<RecordingEngine>;

    fn scenario_records() -> Vec<RawTimingRecord> {
        vec![
            RawTimingRecord::new(1, 0).with_polygon(&[(0.0, 0.0), (10.0, 0.0), (10.0, 5.0)]),
            RawTimingRecord::new(2, 3200).with_polygon(&[(0.0, 5.0), (10.0, 5.0), (10.0, 9.0)]),
            RawTimingRecord::new(3, 7000).with_polygon(&[(0.0, 9.0), (10.0, 9.0), (10.0, 14.0)]),
        ]
    }

    fn outcome(chapter: u16, records: Vec<RawTimingRecord>) -> LoadOutcome {
        LoadOutcome {
            chapters: Ok((1..=3).map(|n| ChapterMeta::new(n, format!("C{}", n))).collect()),
            audio_url: Ok(format!("mem://{}.mp3", chapter)),
            timings: Ok(records),
        }
    }

    fn fetch_id(commands: &[Command]) -> u64 {
        match commands {
            [Command::Fetch(request)] => request.selection_id,
            other => panic!("expected one fetch, got {:?}", other),
        }
    }

    fn select(controller: &mut Controller, chapter: u16) -> u64 {
        fetch_id(&controller.update(Message::SelectChapter {
            chapter,
            reciter: "r".to_string(),
        }))
    }

    fn finish_audio(controller: &mut Controller, duration_ms: u64) -> LoadTicket {
        let ticket = controller.engine().last_ticket().unwrap();
        controller.update(Message::Engine(EngineEvent::Loaded {
            ticket,
            duration_ms,
        }));
        ticket
    }

    /// Select `chapter`, deliver its data and audio
    fn load(controller: &mut Controller, chapter: u16, records: Vec<RawTimingRecord>) -> LoadTicket {
        let id = select(controller, chapter);
        controller.update(Message::Loaded {
            selection_id: id,
            outcome: outcome(chapter, records),
        });
        finish_audio(controller, 10_000)
    }

    fn record_ayahs(controller: &mut Controller) -> Rc<RefCell<Vec<Option<u32>>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        controller.on_ayah_changed(move |change| {
            sink.borrow_mut().push(change.current.as_ref().map(|a| a.ayah));
        });
        seen
    }

    #[test]
    fn test_seek_scenario() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let seen = record_ayahs(&mut controller);
        load(&mut controller, 2, scenario_records());
        assert_eq!(controller.state(), PlayerState::Ready);
        seen.borrow_mut().clear();

        controller.update(Message::Seek(3200));
        controller.update(Message::Seek(0));
        controller.update(Message::Seek(9999));

        assert_eq!(*seen.borrow(), vec![Some(2), Some(1), Some(3)]);
    }

    #[test]
    fn test_ticks_are_edge_triggered() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let seen = record_ayahs(&mut controller);
        let ticket = load(&mut controller, 2, scenario_records());
        controller.update(Message::Play);

        for position_ms in [250, 500, 3300, 3300, 3550] {
            controller.update(Message::Engine(EngineEvent::TimeUpdate {
                ticket,
                position_ms,
            }));
        }
        assert_eq!(*seen.borrow(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_tick_queued_before_seek_does_not_move_highlight() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let seen = record_ayahs(&mut controller);
        let ticket = load(&mut controller, 2, scenario_records());
        controller.update(Message::Play);
        controller.update(Message::Engine(EngineEvent::TimeUpdate {
            ticket,
            position_ms: 8000,
        }));
        seen.borrow_mut().clear();

        controller.update(Message::Seek(0));
        for event in [
            EngineEvent::TimeUpdate {
                ticket,
                position_ms: 8250,
            },
            EngineEvent::Seeked {
                ticket,
                position_ms: 0,
            },
            EngineEvent::TimeUpdate {
                ticket,
                position_ms: 250,
            },
        ] {
            controller.update(Message::Engine(event));
        }

        assert_eq!(*seen.borrow(), vec![Some(1)]);
        assert_eq!(controller.playback().position_ms, 250);
    }

    #[test]
    fn test_repaired_timings_reported_as_degraded() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        controller.on_error(move |e| sink.borrow_mut().push(e.clone()));

        let unsorted = vec![
            RawTimingRecord::new(2, 3200),
            RawTimingRecord::new(1, 0),
            RawTimingRecord::new(0, 50),
        ];
        load(&mut controller, 1, unsorted);

        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PlayerError::MalformedTimingData { .. }));
        assert_eq!(errors[0].severity(), Severity::Degraded);
        assert_eq!(controller.state(), PlayerState::Ready);
        assert_eq!(controller.timing_table().len(), 2);
        assert_eq!(controller.last_error(), None);
    }

    #[test]
    fn test_transport_states() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let states = Rc::new(RefCell::new(Vec::new()));
        let sink = states.clone();
        controller.on_playback_state_changed(move |s| sink.borrow_mut().push(*s));

        load(&mut controller, 1, scenario_records());
        controller.update(Message::Play);
        controller.update(Message::Pause);
        controller.update(Message::Play);

        assert_eq!(
            *states.borrow(),
            vec![
                PlayerState::Loading,
                PlayerState::Ready,
                PlayerState::Playing,
                PlayerState::Paused,
                PlayerState::Playing,
            ]
        );
    }

    #[test]
    fn test_stale_load_result_discarded() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let first = select(&mut controller, 1);
        let second = select(&mut controller, 2);
        assert!(second > first);

        controller.update(Message::Loaded {
            selection_id: first,
            outcome: outcome(1, scenario_records()),
        });
        assert_eq!(controller.engine().loaded_urls(), Vec::<&str>::new());

        controller.update(Message::Loaded {
            selection_id: second,
            outcome: outcome(2, scenario_records()),
        });
        finish_audio(&mut controller, 10_000);

        assert_eq!(controller.engine().loaded_urls(), vec!["mem://2.mp3"]);
        assert_eq!(controller.selection().unwrap().key.chapter, 2);
        assert_eq!(controller.timing_table().key().chapter, 2);
        assert_eq!(controller.state(), PlayerState::Ready);
    }

    #[test]
    fn test_stale_engine_events_after_select_ignored() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let seen = record_ayahs(&mut controller);
        let old_ticket = load(&mut controller, 1, scenario_records());
        controller.update(Message::Play);
        select(&mut controller, 2);
        seen.borrow_mut().clear();

        controller.update(Message::Engine(EngineEvent::TimeUpdate {
            ticket: old_ticket,
            position_ms: 8000,
        }));
        controller.update(Message::Engine(EngineEvent::Ended { ticket: old_ticket }));

        assert!(seen.borrow().is_empty());
        assert_eq!(controller.state(), PlayerState::Loading);
    }

    #[test]
    fn test_highlight_disposed_on_chapter_change() {
        let page = Rc::new(RefCell::new(SvgPage::from_markup(1, "<svg></svg>").unwrap()));
        let target = HighlightTarget::vector(page.clone(), ShapeStyle::default());
        let mut controller = Controller::new(RecordingEngine::new(), Some(target));

        load(&mut controller, 1, scenario_records());
        controller.update(Message::Seek(3500));
        assert_eq!(page.borrow().highlighted_ayahs(), vec![2]);

        select(&mut controller, 2);
        assert_eq!(page.borrow().shape_count(), 0);
        let markup = page.borrow().to_markup().unwrap();
        assert!(!markup.contains("data-chapter=\"1\""));
    }

    #[test]
    fn test_text_highlight_follows_position() {
        let surface = Rc::new(RefCell::new(MemoryTextSurface::from_verses([
            (1, "a"),
            (2, "b"),
            (3, "c"),
        ])));
        let target = HighlightTarget::text(surface.clone(), "ayah-active", true);
        let mut controller = Controller::new(RecordingEngine::new(), Some(target));

        load(&mut controller, 2, scenario_records());
        controller.update(Message::Seek(7100));
        assert_eq!(surface.borrow().marked("ayah-active"), vec![3]);

        controller.update(Message::Shutdown);
        assert!(surface.borrow().marked("ayah-active").is_empty());
        assert_eq!(controller.state(), PlayerState::Idle);
    }

    #[test]
    fn test_missing_timings_degrade() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        controller.on_error(move |e| sink.borrow_mut().push(e.clone()));

        let id = select(&mut controller, 1);
        controller.update(Message::Loaded {
            selection_id: id,
            outcome: LoadOutcome {
                timings: Err(PlayerError::unavailable(DataKind::Timings, "404")),
                ..outcome(1, Vec::new())
            },
        });
        finish_audio(&mut controller, 5000);
        controller.update(Message::Seek(1000));

        assert_eq!(controller.state(), PlayerState::Ready);
        assert_eq!(controller.current_ayah(), None);
        assert_eq!(errors.borrow().len(), 1);
        assert_eq!(errors.borrow()[0].severity(), Severity::Degraded);
    }

    #[test]
    fn test_audio_failure_enters_error_and_retry_reloads() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let id = select(&mut controller, 1);
        controller.update(Message::Loaded {
            selection_id: id,
            outcome: LoadOutcome {
                audio_url: Err(PlayerError::unavailable(DataKind::Audio, "timeout")),
                ..outcome(1, scenario_records())
            },
        });
        assert_eq!(controller.state(), PlayerState::Error);
        assert!(controller.last_error().is_some());

        let retry = controller.update(Message::Retry);
        assert!(fetch_id(&retry) > id);
        assert_eq!(controller.state(), PlayerState::Loading);
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn test_engine_load_failure_enters_error() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let id = select(&mut controller, 1);
        controller.update(Message::Loaded {
            selection_id: id,
            outcome: outcome(1, scenario_records()),
        });
        let ticket = controller.engine().last_ticket().unwrap();
        controller.update(Message::Engine(EngineEvent::LoadFailed {
            ticket,
            error: PlaybackError::Decode {
                reason: "bad header".to_string(),
            }
            .into(),
        }));
        assert_eq!(controller.state(), PlayerState::Error);
    }

    #[test]
    fn test_rejected_play_surfaces_error() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        load(&mut controller, 1, scenario_records());
        controller
            .engine_mut()
            .reject_play(Some("autoplay blocked"));

        controller.update(Message::Play);
        assert_eq!(controller.state(), PlayerState::Error);
        assert!(matches!(
            controller.last_error(),
            Some(PlayerError::Playback(PlaybackError::Rejected { .. }))
        ));

        controller.engine_mut().reject_play(None);
        controller.update(Message::Play);
        assert_eq!(controller.state(), PlayerState::Playing);
    }

    #[test]
    fn test_play_before_select_reports_not_loaded() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        controller.on_error(move |e| sink.borrow_mut().push(e.clone()));

        controller.update(Message::Play);
        assert_eq!(controller.state(), PlayerState::Idle);
        assert_eq!(
            *errors.borrow(),
            vec![PlayerError::Playback(PlaybackError::NotLoaded)]
        );
    }

    #[test]
    fn test_play_while_loading_starts_when_ready() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let id = select(&mut controller, 1);
        controller.update(Message::Play);
        controller.update(Message::Loaded {
            selection_id: id,
            outcome: outcome(1, scenario_records()),
        });
        finish_audio(&mut controller, 10_000);
        assert_eq!(controller.state(), PlayerState::Playing);
    }

    #[test]
    fn test_repeat_restarts_chapter() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let seen = record_ayahs(&mut controller);
        let ticket = load(&mut controller, 2, scenario_records());
        controller.update(Message::SetRepeat(true));
        controller.update(Message::Play);
        controller.update(Message::Seek(9000));
        controller.engine_mut().take_calls();
        seen.borrow_mut().clear();

        let commands = controller.update(Message::Engine(EngineEvent::Ended { ticket }));

        assert!(commands.is_empty());
        assert_eq!(controller.state(), PlayerState::Playing);
        assert_eq!(controller.playback().position_ms, 0);
        assert_eq!(*seen.borrow(), vec![Some(1)]);
        assert_eq!(
            controller.engine().calls(),
            &[EngineCall::Seek(0), EngineCall::Play]
        );
    }

    #[test]
    fn test_auto_advance_selects_next_with_autoplay() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let ticket = load(&mut controller, 2, scenario_records());
        controller.update(Message::Play);

        let commands = controller.update(Message::Engine(EngineEvent::Ended { ticket }));
        let id = fetch_id(&commands);
        assert_eq!(controller.selection().unwrap().key.chapter, 3);
        assert!(controller.selection().unwrap().autoplay);

        controller.update(Message::Loaded {
            selection_id: id,
            outcome: outcome(3, scenario_records()),
        });
        finish_audio(&mut controller, 10_000);
        assert_eq!(controller.state(), PlayerState::Playing);
    }

    #[test]
    fn test_auto_advance_stops_at_last_chapter() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let ticket = load(&mut controller, 3, scenario_records());
        controller.update(Message::Play);

        let commands = controller.update(Message::Engine(EngineEvent::Ended { ticket }));
        assert!(commands.is_empty());
        assert_eq!(controller.state(), PlayerState::Ended);
    }

    #[test]
    fn test_next_and_previous_clamped() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        load(&mut controller, 3, scenario_records());
        assert!(controller.update(Message::Next).is_empty());

        let commands = controller.update(Message::Previous);
        assert_eq!(
            commands,
            vec![Command::Fetch(LoadRequest {
                selection_id: fetch_id(&commands),
                chapter: 2,
                reciter: "r".to_string(),
            })]
        );

        let mut controller = Controller::new(RecordingEngine::new(), None);
        load(&mut controller, 1, scenario_records());
        assert!(controller.update(Message::Previous).is_empty());
        assert!(controller.update(Message::Next).len() == 1);
    }

    #[test]
    fn test_out_of_range_select_ignored() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        assert!(
            controller
                .update(Message::SelectChapter {
                    chapter: 0,
                    reciter: "r".to_string()
                })
                .is_empty()
        );
        assert!(
            controller
                .update(Message::SelectChapter {
                    chapter: DEFAULT_CHAPTER_COUNT + 1,
                    reciter: "r".to_string()
                })
                .is_empty()
        );
        assert_eq!(controller.state(), PlayerState::Idle);
    }

    #[test]
    fn test_seek_to_ayah() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        load(&mut controller, 2, scenario_records());
        controller.update(Message::SeekToAyah(3));
        assert_eq!(controller.playback().position_ms, 7000);
        assert_eq!(controller.current_ayah().map(|a| a.ayah), Some(3));

        controller.update(Message::SeekToAyah(42));
        assert_eq!(controller.playback().position_ms, 7000);
    }

    #[test]
    fn test_target_ready_repaints_pending_page() {
        let page = Rc::new(RefCell::new(SvgPage::pending(2)));
        let target = HighlightTarget::vector(page.clone(), ShapeStyle::default());
        let mut controller = Controller::new(RecordingEngine::new(), Some(target));

        load(&mut controller, 2, scenario_records());
        controller.update(Message::Seek(3300));
        assert_eq!(page.borrow().shape_count(), 0);

        page.borrow_mut().finish_loading("<svg></svg>").unwrap();
        controller.update(Message::TargetReady);
        assert_eq!(page.borrow().highlighted_ayahs(), vec![2]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let id = controller.on_playback_state_changed(move |_| *sink.borrow_mut() += 1);

        select(&mut controller, 1);
        assert!(controller.unsubscribe(id));
        controller.update(Message::Shutdown);

        assert_eq!(*count.borrow(), 1);
        assert!(!controller.unsubscribe(id));
    }

    #[test]
    fn test_volume_and_mute() {
        let mut controller = Controller::new(RecordingEngine::new(), None);
        load(&mut controller, 1, scenario_records());
        controller.update(Message::SetVolume(0.4));
        controller.update(Message::ToggleMute);
        assert!(controller.playback().is_muted);
        assert_eq!(controller.engine().last_volume(), Some(0.0));

        controller.update(Message::ToggleMute);
        assert_eq!(controller.engine().last_volume(), Some(0.4));
    }
}
