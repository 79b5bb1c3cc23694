use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;

use voiceguard_core::device::infrastructure::cpal_capture::CpalCaptureSource;
use voiceguard_core::device::infrastructure::cpal_playback::CpalPlaybackSink;
use voiceguard_core::disguise::domain::noise_suppressor::NoiseSuppressor;
use voiceguard_core::disguise::infrastructure::resampling_transformer::ResamplingTransformer;
use voiceguard_core::disguise::infrastructure::spectral_noise_gate::SpectralNoiseGate;
use voiceguard_core::pipeline::selection_channel::selection_channel;
use voiceguard_core::pipeline::streaming_engine::StreamingEngine;
use voiceguard_core::profiles::factor_sampler::UniformFactorSampler;
use voiceguard_core::profiles::profile_catalog::ProfileCatalog;
use voiceguard_core::profiles::voice_preset::{VoiceGroup, VoicePreset};

mod menu;

/// Live voice disguise for calls: captures the microphone, reshapes the
/// voice, and plays the result on the default output device.
#[derive(Parser)]
#[command(name = "voiceguard")]
struct Cli {
    /// Voice preset to start with.
    #[arg(long, default_value = "sophia")]
    voice: String,

    /// Apply spectral noise gating before the disguise.
    #[arg(long)]
    denoise: bool,

    /// List the available voice presets and exit.
    #[arg(long)]
    list_voices: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let catalog = ProfileCatalog::new();

    if cli.list_voices {
        print_voices(&catalog);
        return Ok(());
    }

    let initial = VoicePreset::from_name(&cli.voice)
        .ok_or_else(|| format!("unknown voice preset '{}', try --list-voices", cli.voice))?;

    let capture = CpalCaptureSource::open()?;
    let playback = CpalPlaybackSink::open()?;
    let suppressor: Option<Box<dyn NoiseSuppressor>> = if cli.denoise {
        log::info!("spectral noise gate enabled");
        Some(Box::new(SpectralNoiseGate::default()))
    } else {
        None
    };

    let (selections, receiver) = selection_channel();
    let stop = Arc::new(AtomicBool::new(false));

    let mut engine = StreamingEngine::new(
        Box::new(capture),
        Box::new(playback),
        suppressor,
        Box::new(ResamplingTransformer::new()),
        Box::new(UniformFactorSampler),
        catalog,
        receiver,
        stop.clone(),
        initial,
    );
    let audio_thread = thread::spawn(move || engine.run());

    println!("Voice disguise active, speaking as '{initial}'.");
    let stdin = io::stdin();
    menu::run(stdin.lock(), &selections, || audio_thread.is_finished())?;

    stop.store(true, Ordering::Relaxed);
    match audio_thread.join() {
        Ok(outcome) => outcome?,
        Err(_) => return Err("audio thread panicked".into()),
    }
    Ok(())
}

fn print_voices(catalog: &ProfileCatalog) {
    println!("Available voices:");
    let mut group: Option<VoiceGroup> = None;
    for profile in catalog.profiles() {
        let preset = profile.preset();
        if group != Some(preset.group()) {
            group = Some(preset.group());
            println!("{}:", preset.group().label());
        }
        println!(
            "  {:2}. {:<14} pitch {:.1}-{:.1}  formant {:.1}-{:.1}",
            preset.menu_number(),
            preset.name(),
            profile.pitch_range().min(),
            profile.pitch_range().max(),
            profile.formant_range().min(),
            profile.formant_range().max(),
        );
    }
}
