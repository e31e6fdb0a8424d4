use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use adsplice::ads::{
    AdEventSink, AdEventType, AdPlayerHandle, AdsLoader, AdsManager, AdsRequest, VideoAdPlayer,
    VideoAdPlayerCallback,
};
use adsplice::engine::sim::{BuildMode, SimulatedProvider};
use adsplice::media::types::ProgressSnapshot;
use adsplice::session::controls::string_for_time;
use adsplice::{AdOrchestrator, PlayerSettings, Video, VideoType};

const DEFAULT_CONTENT: &str = "https://media.example.com/big_buck_bunny.mp4";
const DEFAULT_AD_TAG: &str = "https://ads.example.com/vast?preroll=1";
const AD_CREATIVE: &str = "https://ads.example.com/creative/preroll.mp4";

/// Stand-in ad-decision service: one pre-roll per request.
struct ScriptedLoader;

impl AdsLoader for ScriptedLoader {
    fn request_ads(&mut self, request: AdsRequest) {
        log::info!("Ad service received request for {}", request.ad_tag_url);
        let spawned = thread::Builder::new()
            .name("ad-service".into())
            .spawn(move || {
                thread::sleep(Duration::from_millis(200));
                let manager = ScriptedManager {
                    player: request.container.player.clone(),
                    events: request.events.clone(),
                };
                request.events.ads_manager_loaded(Box::new(manager));
                request.events.ad_event(AdEventType::Loaded);
            });
        if let Err(e) = spawned {
            log::error!("Failed to start ad service thread: {e}");
        }
    }
}

struct ScriptedManager {
    player: AdPlayerHandle,
    events: AdEventSink,
}

impl AdsManager for ScriptedManager {
    fn init(&mut self) {
        self.player.add_callback(Arc::new(EndOfAd {
            player: self.player.clone(),
            events: self.events.clone(),
        }));
    }

    fn start(&mut self) {
        self.player.load_ad(AD_CREATIVE);
        self.events.ad_event(AdEventType::ContentPauseRequested);
        self.player.play_ad();
    }

    fn on_progress(&mut self, progress: ProgressSnapshot) {
        log::trace!("Ad service saw progress {:?}", progress.current_ms());
    }
}

/// Ends the break once the creative finishes.
struct EndOfAd {
    player: AdPlayerHandle,
    events: AdEventSink,
}

impl VideoAdPlayerCallback for EndOfAd {
    fn on_ended(&self) {
        self.player.clone().stop_ad();
        self.events.ad_event(AdEventType::ContentResumeRequested);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let stall = args.iter().any(|a| a == "--stall");
    let no_ads = args.iter().any(|a| a == "--no-ads");
    let content_url = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| DEFAULT_CONTENT.to_string());

    let settings = PlayerSettings::load();
    let provider = SimulatedProvider::new()
        .with_build_mode(BuildMode::Threaded(Duration::from_millis(50)))
        .with_duration_for(AD_CREATIVE, 5_000)
        .with_duration_for(content_url.clone(), 20_000);

    let mut orchestrator = AdOrchestrator::new(
        Video::new(content_url, VideoType::Mp4),
        (!no_ads).then(|| DEFAULT_AD_TAG.to_string()),
        Box::new(provider.clone()),
        Box::new(ScriptedLoader),
        settings,
    )
    .context("Failed to create content session")?;

    orchestrator.play();

    let frame = Duration::from_millis(100);
    let started = Instant::now();
    let mut last_report = started;
    let mut stalled_at: Option<Instant> = None;

    while started.elapsed() < Duration::from_secs(15) {
        let now = Instant::now();
        orchestrator.pump(now).context("Content failed to start")?;

        if stall && stalled_at.is_none() {
            if let Some(ad) = provider.handle_for(AD_CREATIVE) {
                log::info!("Stalling ad engine");
                ad.set_stalled(true);
                stalled_at = Some(now);
            }
        }
        if let Some(at) = stalled_at {
            if now.duration_since(at) > Duration::from_millis(2500) {
                if let Some(ad) = provider.handle_for(AD_CREATIVE).filter(|h| h.is_stalled()) {
                    log::info!("Ad engine unstalled");
                    ad.set_stalled(false);
                }
            }
        }

        provider.advance_all(frame.as_millis() as u64);

        for notice in orchestrator.take_notices() {
            log::warn!("[notice] {}", notice.message);
        }

        if now.duration_since(last_report) >= Duration::from_secs(1) {
            last_report = now;
            let progress = orchestrator.get_progress();
            log::info!(
                "{:?}/{:?} at {}",
                orchestrator.state(),
                orchestrator.active_session(),
                progress
                    .current_ms()
                    .map_or_else(|| "--:--".to_string(), string_for_time)
            );
        }

        thread::sleep(frame);
    }

    log::info!(
        "Done: {} stall recoveries",
        orchestrator.stall_recoveries()
    );
    orchestrator.release();
    Ok(())
}
