//! Play command handler.
//!
//! Wires the HTTP generation backend, the rodio audio output and the file
//! stores into a coordinator, then relays events to the terminal and single
//! key commands from stdin back to the coordinator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use narrator_core::{
    GenerationRetryPolicy, ParagraphIndex, Paragraphs, PlaybackEvent, PlaybackStatus,
};
use narrator_generation::{GenerationController, HttpGenerationBackend, InMemoryLocatorCache};
use narrator_playback::native::RodioElementFactory;
use narrator_playback::{Coordinator, CoordinatorDeps};

use crate::bootstrap::{CliContext, server_url};

/// Characters of paragraph text echoed when a paragraph starts.
const PREVIEW_CHARS: usize = 72;

pub struct PlayArgs {
    pub file: PathBuf,
    pub from: Option<ParagraphIndex>,
    pub resume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Pause,
    Resume,
    Next,
    Back,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

pub async fn execute(ctx: &CliContext, args: PlayArgs) -> Result<()> {
    let settings = ctx.settings().await?;

    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let paragraphs = Paragraphs::from_text(&text);
    if paragraphs.is_empty() {
        bail!("{} contains no paragraphs", args.file.display());
    }

    let base_url = server_url(&settings.server_url)?;
    let backend = HttpGenerationBackend::new(base_url.clone())?;
    let controller = GenerationController::with_deps(
        Arc::new(backend),
        Arc::new(InMemoryLocatorCache::new()),
        GenerationRetryPolicy::default(),
    );
    let elements = RodioElementFactory::new().context("Failed to open audio output")?;

    let deps = CoordinatorDeps::new(controller, Arc::new(elements), base_url)
        .with_config(settings.buffer)
        .with_audio_settings(settings.audio)
        .with_session_store(Arc::new(ctx.session_store(&args.file)))
        .with_preferences_store(Arc::new(ctx.settings_store().clone()));
    let (coordinator, mut events) = Coordinator::spawn(deps)?;
    coordinator
        .load_session(paragraphs.clone(), settings.generation.clone())
        .await?;

    let bookmark = if args.resume {
        coordinator.saved_bookmark().await?.map(|b| b.paragraph)
    } else {
        None
    };
    let from = start_index(args.from, bookmark, paragraphs.len())?;

    println!(
        "Reading {} ({} paragraphs) from paragraph {}",
        args.file.display(),
        paragraphs.len(),
        from + 1
    );
    println!("Keys: p pause, r resume, n next, b back, s stop (then Enter)");
    coordinator.start(from).await?;

    let result = run_session(&coordinator, &mut events, &paragraphs).await;
    coordinator.shutdown().await;
    result
}

async fn run_session(
    coordinator: &Coordinator,
    events: &mut mpsc::UnboundedReceiver<PlaybackEvent>,
    paragraphs: &Paragraphs,
) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { return Ok(()) };
                if report(&event, paragraphs)? == Flow::Done {
                    return Ok(());
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        let Some(key) = parse_key(&line) else { continue };
                        if handle_key(coordinator, key, paragraphs.len()).await? == Flow::Done {
                            return Ok(());
                        }
                    }
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(());
            }
        }
    }
}

fn report(event: &PlaybackEvent, paragraphs: &Paragraphs) -> Result<Flow> {
    match event {
        PlaybackEvent::ParagraphStarted { index } => {
            println!(
                "▶ [{}/{}] {}",
                index + 1,
                paragraphs.len(),
                preview(paragraphs.get(*index).unwrap_or_default(), PREVIEW_CHARS)
            );
        }
        PlaybackEvent::StateChanged { status } => match status {
            PlaybackStatus::InitialBuffering | PlaybackStatus::Buffering => {
                println!("… buffering");
            }
            PlaybackStatus::Paused => println!("⏸ paused"),
            PlaybackStatus::Completed => {
                println!("✓ Finished.");
                return Ok(Flow::Done);
            }
            PlaybackStatus::Error => return Err(anyhow!("Audio output is no longer available")),
            PlaybackStatus::Idle | PlaybackStatus::Playing => {}
        },
        PlaybackEvent::ParagraphFailed { index, message } => {
            eprintln!("⚠ Skipping paragraph {}: {message}", index + 1);
        }
        PlaybackEvent::PlaybackError {
            message,
            recoverable,
            ..
        } => {
            let hint = if *recoverable { " (press r to retry)" } else { "" };
            eprintln!("✗ {message}{hint}");
        }
        PlaybackEvent::ParagraphGenerated { .. } | PlaybackEvent::Completed => {}
    }
    Ok(Flow::Continue)
}

async fn handle_key(coordinator: &Coordinator, key: Key, total: usize) -> Result<Flow> {
    let state = coordinator.state();
    match key {
        Key::Pause => coordinator.pause().await?,
        Key::Resume if state.error.is_some() && state.status == PlaybackStatus::Playing => {
            coordinator.retry_playback().await?;
        }
        Key::Resume => coordinator.resume().await?,
        Key::Next => {
            let next = state.current_paragraph + 1;
            if next < total {
                coordinator.skip_to(next).await?;
            } else {
                println!("Already at the last paragraph");
            }
        }
        Key::Back => {
            coordinator
                .skip_to(state.current_paragraph.saturating_sub(1))
                .await?;
        }
        Key::Stop => {
            coordinator.stop().await?;
            return Ok(Flow::Done);
        }
    }
    Ok(Flow::Continue)
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(Key::Pause),
        "r" | "resume" => Some(Key::Resume),
        "n" | "next" => Some(Key::Next),
        "b" | "back" => Some(Key::Back),
        "s" | "stop" | "q" | "quit" => Some(Key::Stop),
        _ => None,
    }
}

/// Resolve where to start: an explicit index, the saved bookmark, or the top.
fn start_index(
    from: Option<ParagraphIndex>,
    bookmark: Option<ParagraphIndex>,
    total: usize,
) -> Result<ParagraphIndex> {
    if let Some(from) = from {
        if from >= total {
            bail!("--from {from} is past the last paragraph ({})", total - 1);
        }
        return Ok(from);
    }
    // A bookmark from an older, longer version of the file restarts.
    Ok(bookmark.filter(|&b| b < total).unwrap_or(0))
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max).collect();
    short.push('…');
    short
}
