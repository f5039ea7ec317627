//! Ayah Sync - terminal recitation player
//!
//! Plays one chapter (and, with auto-advance, the ones after it) while logging
//! the active ayah.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ayah_sync::api::HttpSource;
use ayah_sync::app::{Player, PlayerController};
use ayah_sync::audio::{RodioEngine, engine_event_channel};
use ayah_sync::error::Severity;
use ayah_sync::features::{Settings, TargetKind};
use ayah_sync::highlight::{HighlightTarget, MemoryTextSurface, ShapeStyle, SvgPage};

/// Longest chapter; the text target gets one node per possible ayah
const MAX_AYAHS: u32 = 286;

#[derive(Parser, Debug)]
#[command(name = "ayah-sync", version, about = "Play a recitation with the current ayah tracked")]
struct Args {
    /// Chapter (surah) number
    #[arg(short, long, default_value_t = 1)]
    chapter: u16,

    /// Reciter id; defaults to the one in settings
    #[arg(short, long)]
    reciter: Option<String>,

    /// Base URL for chapters, audio and timings
    #[arg(long, env = "AYAH_SYNC_BASE_URL")]
    base_url: Option<String>,

    /// Highlight tagged text nodes instead of a page graphic
    #[arg(long)]
    text: bool,

    /// SVG page to decorate with the highlight polygon
    #[arg(long, conflicts_with = "text")]
    page: Option<PathBuf>,

    /// Where the decorated page is written on every ayah change
    /// [default: <page>.highlighted.svg]
    #[arg(long, requires = "page")]
    out: Option<PathBuf>,

    /// Replay the chapter when it ends
    #[arg(long)]
    repeat: bool,

    /// Keep the overrides given here as the new defaults
    #[arg(long)]
    save_settings: bool,
}

/// The decorated page and where it goes
struct PageOutput {
    page: Rc<RefCell<SvgPage>>,
    path: PathBuf,
}

impl PageOutput {
    fn write(&self) {
        let Some(markup) = self.page.borrow().to_markup() else {
            return;
        };
        if let Err(e) = std::fs::write(&self.path, markup) {
            tracing::warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ayah_sync=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_target(
    args: &Args,
    settings: &Settings,
) -> anyhow::Result<(Option<HighlightTarget>, Option<PageOutput>)> {
    match settings.highlight.target {
        TargetKind::Text => {
            let surface = MemoryTextSurface::from_verses((1..=MAX_AYAHS).map(|n| (n, String::new())));
            let target = HighlightTarget::text(
                surface,
                settings.highlight.active_class.clone(),
                settings.highlight.smooth_scroll,
            );
            Ok((Some(target), None))
        }
        TargetKind::Vector => {
            let Some(path) = &args.page else {
                tracing::info!("No page graphic given, highlighting disabled");
                return Ok((None, None));
            };
            let page = Rc::new(RefCell::new(load_page(path)?));
            let output = PageOutput {
                page: page.clone(),
                path: args
                    .out
                    .clone()
                    .unwrap_or_else(|| path.with_extension("highlighted.svg")),
            };
            let target = HighlightTarget::vector(page, ShapeStyle::from(&settings.highlight));
            Ok((Some(target), Some(output)))
        }
    }
}

fn load_page(path: &Path) -> anyhow::Result<SvgPage> {
    let markup = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    SvgPage::from_markup(1, markup)
        .with_context(|| format!("{} is not a usable SVG page", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut settings = Settings::load();
    if let Some(base_url) = &args.base_url {
        settings.source.base_url = base_url.clone();
    }
    if args.repeat {
        settings.playback.repeat = true;
    }
    if args.text {
        settings.highlight.target = TargetKind::Text;
    } else if args.page.is_some() {
        settings.highlight.target = TargetKind::Vector;
    }
    if args.save_settings {
        settings.playback.default_reciter = args
            .reciter
            .clone()
            .unwrap_or_else(|| settings.playback.default_reciter.clone());
        settings.save().context("failed to save settings")?;
        tracing::info!("Settings saved");
    }
    let reciter = args
        .reciter
        .clone()
        .unwrap_or_else(|| settings.playback.default_reciter.clone());

    let source = HttpSource::new(settings.source.clone())?;
    let (events_tx, events_rx) = engine_event_channel();
    let engine = RodioEngine::new(events_tx, source.client().clone())?;

    let (target, page_output) = build_target(&args, &settings)?;
    let mut controller = PlayerController::new(engine, target);
    controller.apply_settings(&settings.playback);
    controller.on_ayah_changed(move |change| {
        match &change.current {
            Some(ayah) => tracing::info!("{} ayah {}", change.key, ayah.ayah),
            None => tracing::info!("{} no active ayah", change.key),
        }
        if let Some(output) = &page_output {
            output.write();
        }
    });
    controller.on_playback_state_changed(|state| tracing::info!("State: {}", state));
    controller.on_error(|error| match error.severity() {
        Severity::Fatal => tracing::error!("{}", error),
        Severity::Degraded => tracing::warn!("{}", error),
    });

    let (player, handle) = Player::new(controller, source, events_rx);

    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            interrupt.shutdown();
        }
    });

    handle.select_chapter(args.chapter, reciter);
    handle.play();

    let controller = player.exit_when_finished(true).run().await;
    if let Some(error) = controller.last_error() {
        return Err(error.clone().into());
    }
    Ok(())
}
