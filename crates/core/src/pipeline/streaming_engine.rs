use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::device::domain::capture_source::CaptureSource;
use crate::device::domain::playback_sink::PlaybackSink;
use crate::disguise::domain::noise_suppressor::NoiseSuppressor;
use crate::disguise::domain::voice_transformer::VoiceTransformer;
use crate::pipeline::selection_channel::SelectionReceiver;
use crate::profiles::factor_sampler::FactorSampler;
use crate::profiles::profile_catalog::ProfileCatalog;
use crate::profiles::voice_preset::VoicePreset;

/// Errors that abort the streaming loop, tagged by the failing stage.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has already run")]
    AlreadyStarted,
    #[error("audio capture failed: {0}")]
    Capture(String),
    #[error("noise suppression failed: {0}")]
    Suppress(String),
    #[error("voice transform failed: {0}")]
    Transform(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Idle,
    Running,
    Stopped,
}

/// Drives capture, disguise and playback as one blocking loop.
///
/// The loop runs on whichever thread calls [`run`](Self::run) and is paced
/// entirely by its devices: the capture source blocks until microphone audio
/// exists and the playback sink blocks while its queue is full. Every cycle
/// polls the selection channel for a new voice and re-samples the disguise
/// factors, so a switch takes effect on the chunk already in flight and the
/// voice keeps drifting inside the active profile's ranges.
///
/// Any stage error aborts the loop; both devices are closed on every exit
/// path. An engine runs at most once.
pub struct StreamingEngine {
    capture: Box<dyn CaptureSource>,
    playback: Box<dyn PlaybackSink>,
    suppressor: Option<Box<dyn NoiseSuppressor>>,
    transformer: Box<dyn VoiceTransformer>,
    sampler: Box<dyn FactorSampler>,
    catalog: ProfileCatalog,
    selections: SelectionReceiver,
    stop: Arc<AtomicBool>,
    active: VoicePreset,
    state: EngineState,
    chunks_processed: u64,
    secs_captured: f64,
}

impl StreamingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture: Box<dyn CaptureSource>,
        playback: Box<dyn PlaybackSink>,
        suppressor: Option<Box<dyn NoiseSuppressor>>,
        transformer: Box<dyn VoiceTransformer>,
        sampler: Box<dyn FactorSampler>,
        catalog: ProfileCatalog,
        selections: SelectionReceiver,
        stop: Arc<AtomicBool>,
        initial: VoicePreset,
    ) -> Self {
        Self {
            capture,
            playback,
            suppressor,
            transformer,
            sampler,
            catalog,
            selections,
            stop,
            active: initial,
            state: EngineState::Idle,
            chunks_processed: 0,
            secs_captured: 0.0,
        }
    }

    /// Streams until the stop flag is raised or a stage fails.
    ///
    /// Returns after both devices have been closed.
    pub fn run(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Idle {
            return Err(EngineError::AlreadyStarted);
        }
        self.state = EngineState::Running;
        log::info!("voice disguise engine started with preset '{}'", self.active);

        let outcome = self.stream_loop();

        self.capture.close();
        if let Err(e) = self.playback.close() {
            log::warn!("failed to close playback sink: {e}");
        }
        self.state = EngineState::Stopped;

        match &outcome {
            Ok(()) => log::info!(
                "engine stopped after {} chunks ({:.1} s of audio)",
                self.chunks_processed,
                self.secs_captured
            ),
            Err(e) => log::error!(
                "engine aborted after {} chunks ({:.1} s of audio): {e}",
                self.chunks_processed,
                self.secs_captured
            ),
        }
        outcome
    }

    fn stream_loop(&mut self) -> Result<(), EngineError> {
        while !self.stop.load(Ordering::Relaxed) {
            self.process_chunk()?;
            self.chunks_processed += 1;
        }
        Ok(())
    }

    fn process_chunk(&mut self) -> Result<(), EngineError> {
        let chunk = self
            .capture
            .read_chunk()
            .map_err(|e| EngineError::Capture(e.to_string()))?;
        self.secs_captured += chunk.duration_secs();

        // Polled after the blocking read so a selection made while waiting
        // for audio applies to the chunk already in flight.
        if let Some(selected) = self.selections.try_latest() {
            if selected != self.active {
                log::debug!("switching voice from '{}' to '{}'", self.active, selected);
                self.active = selected;
            }
        }

        let chunk = match &self.suppressor {
            Some(suppressor) => suppressor
                .suppress(&chunk)
                .map_err(|e| EngineError::Suppress(e.to_string()))?,
            None => chunk,
        };

        let profile = self.catalog.profile(self.active);
        let factors = self.sampler.sample(profile);
        let output = self
            .transformer
            .transform(&chunk, factors)
            .map_err(|e| EngineError::Transform(e.to_string()))?;

        self.playback
            .write(&output)
            .map_err(|e| EngineError::Playback(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::f64::consts::PI;
    use std::sync::Mutex;

    use crate::disguise::infrastructure::resampling_transformer::ResamplingTransformer;
    use crate::pipeline::selection_channel::selection_channel;
    use crate::profiles::factor_sampler::{DisguiseFactors, UniformFactorSampler};
    use crate::profiles::profile_catalog::VoiceProfile;
    use crate::shared::chunk::AudioChunk;
    use crate::shared::constants::SAMPLE_RATE;

    // --- Stubs ---

    struct ScriptedCapture {
        chunk: AudioChunk,
        remaining: usize,
        stop: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedCapture {
        /// Delivers `chunks` copies of `chunk`, raising the stop flag while
        /// handing out the last one so the loop ends after processing it.
        fn new(chunk: AudioChunk, chunks: usize, stop: Arc<AtomicBool>) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let capture = Self {
                chunk,
                remaining: chunks,
                stop,
                closed: closed.clone(),
            };
            (capture, closed)
        }
    }

    impl CaptureSource for ScriptedCapture {
        fn read_chunk(&mut self) -> Result<AudioChunk, Box<dyn std::error::Error>> {
            if self.remaining <= 1 {
                self.stop.store(true, Ordering::Relaxed);
            }
            self.remaining = self.remaining.saturating_sub(1);
            Ok(self.chunk.clone())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    struct FailingCapture {
        closed: Arc<AtomicBool>,
    }

    impl CaptureSource for FailingCapture {
        fn read_chunk(&mut self) -> Result<AudioChunk, Box<dyn std::error::Error>> {
            Err("microphone unplugged".into())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    struct RecordingSink {
        writes: Arc<Mutex<Vec<Vec<f32>>>>,
        closed: Arc<AtomicBool>,
    }

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<Vec<Vec<f32>>>>, Arc<AtomicBool>) {
            let writes = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let sink = Self {
                writes: writes.clone(),
                closed: closed.clone(),
            };
            (sink, writes, closed)
        }
    }

    impl PlaybackSink for RecordingSink {
        fn write(&mut self, samples: &[f32]) -> Result<(), Box<dyn std::error::Error>> {
            self.writes.lock().unwrap().push(samples.to_vec());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    struct FailingSink {
        closed: Arc<AtomicBool>,
    }

    impl PlaybackSink for FailingSink {
        fn write(&mut self, _samples: &[f32]) -> Result<(), Box<dyn std::error::Error>> {
            Err("output device gone".into())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    struct PassthroughTransformer;

    impl VoiceTransformer for PassthroughTransformer {
        fn transform(
            &self,
            chunk: &AudioChunk,
            _factors: DisguiseFactors,
        ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            Ok(chunk.samples().to_vec())
        }
    }

    struct FailingTransformer;

    impl VoiceTransformer for FailingTransformer {
        fn transform(
            &self,
            _chunk: &AudioChunk,
            _factors: DisguiseFactors,
        ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            Err("resample blew up".into())
        }
    }

    struct ZeroingSuppressor;

    impl NoiseSuppressor for ZeroingSuppressor {
        fn suppress(&self, chunk: &AudioChunk) -> Result<AudioChunk, Box<dyn std::error::Error>> {
            Ok(AudioChunk::silent(chunk.len(), chunk.sample_rate()))
        }
    }

    struct FailingSuppressor;

    impl NoiseSuppressor for FailingSuppressor {
        fn suppress(&self, _chunk: &AudioChunk) -> Result<AudioChunk, Box<dyn std::error::Error>> {
            Err("gate exploded".into())
        }
    }

    /// Returns fixed factors and records which preset each draw came from.
    struct FixedFactorSampler {
        factors: DisguiseFactors,
        seen: Arc<Mutex<Vec<VoicePreset>>>,
    }

    impl FixedFactorSampler {
        fn new(pitch: f32, formant: f32) -> (Self, Arc<Mutex<Vec<VoicePreset>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sampler = Self {
                factors: DisguiseFactors::new(pitch, formant),
                seen: seen.clone(),
            };
            (sampler, seen)
        }
    }

    impl FactorSampler for FixedFactorSampler {
        fn sample(&self, profile: &VoiceProfile) -> DisguiseFactors {
            self.seen.lock().unwrap().push(profile.preset());
            self.factors
        }
    }

    // --- Helpers ---

    fn ramp_chunk(len: usize) -> AudioChunk {
        let samples = (0..len).map(|i| i as f32 / len as f32).collect();
        AudioChunk::new(samples, SAMPLE_RATE)
    }

    fn sine_chunk(len: usize, cycles: f64) -> AudioChunk {
        let samples: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * cycles * i as f64 / len as f64).sin() as f32)
            .collect();
        AudioChunk::new(samples, SAMPLE_RATE)
    }

    fn goertzel_power(samples: &[f32], bin: usize) -> f64 {
        let len = samples.len() as f64;
        let omega = 2.0 * PI * bin as f64 / len;
        let coeff = 2.0 * omega.cos();
        let (mut prev, mut prev2) = (0.0f64, 0.0f64);
        for &sample in samples {
            let next = sample as f64 + coeff * prev - prev2;
            prev2 = prev;
            prev = next;
        }
        prev2 * prev2 + prev * prev - coeff * prev * prev2
    }

    fn dominant_frequency(samples: &[f32], sample_rate: u32) -> f64 {
        let len = samples.len();
        let mut best_bin = 0;
        let mut best_power = 0.0;
        for bin in 1..len / 2 {
            let power = goertzel_power(samples, bin);
            if power > best_power {
                best_power = power;
                best_bin = bin;
            }
        }
        best_bin as f64 * sample_rate as f64 / len as f64
    }

    #[allow(clippy::too_many_arguments)]
    fn engine_with(
        capture: Box<dyn CaptureSource>,
        playback: Box<dyn PlaybackSink>,
        suppressor: Option<Box<dyn NoiseSuppressor>>,
        transformer: Box<dyn VoiceTransformer>,
        sampler: Box<dyn FactorSampler>,
        selections: SelectionReceiver,
        stop: Arc<AtomicBool>,
        initial: VoicePreset,
    ) -> StreamingEngine {
        StreamingEngine::new(
            capture,
            playback,
            suppressor,
            transformer,
            sampler,
            ProfileCatalog::new(),
            selections,
            stop,
            initial,
        )
    }

    #[test]
    fn test_run_streams_every_chunk_until_stop() {
        let stop = Arc::new(AtomicBool::new(false));
        let chunk = ramp_chunk(64);
        let (capture, capture_closed) = ScriptedCapture::new(chunk.clone(), 3, stop.clone());
        let (sink, writes, sink_closed) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(engine.run().is_ok());
        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 3);
        for written in writes.iter() {
            assert_eq!(written.as_slice(), chunk.samples());
        }
        assert!(capture_closed.load(Ordering::Relaxed));
        assert!(sink_closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_run_returns_immediately_when_stop_is_already_raised() {
        let stop = Arc::new(AtomicBool::new(true));
        let (capture, capture_closed) = ScriptedCapture::new(ramp_chunk(64), 5, stop.clone());
        let (sink, writes, sink_closed) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(engine.run().is_ok());
        assert!(writes.lock().unwrap().is_empty());
        assert!(capture_closed.load(Ordering::Relaxed));
        assert!(sink_closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_run_twice_reports_already_started() {
        let stop = Arc::new(AtomicBool::new(true));
        let (capture, _) = ScriptedCapture::new(ramp_chunk(64), 1, stop.clone());
        let (sink, _, _) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(engine.run().is_ok());
        assert!(matches!(engine.run(), Err(EngineError::AlreadyStarted)));
    }

    #[test]
    fn test_capture_failure_aborts_and_closes_devices() {
        let stop = Arc::new(AtomicBool::new(false));
        let capture_closed = Arc::new(AtomicBool::new(false));
        let capture = FailingCapture {
            closed: capture_closed.clone(),
        };
        let (sink, writes, sink_closed) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        let result = engine.run();
        assert!(matches!(result, Err(EngineError::Capture(_))));
        assert!(writes.lock().unwrap().is_empty());
        assert!(capture_closed.load(Ordering::Relaxed));
        assert!(sink_closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_suppressor_failure_aborts_with_suppress_error() {
        let stop = Arc::new(AtomicBool::new(false));
        let (capture, _) = ScriptedCapture::new(ramp_chunk(64), 5, stop.clone());
        let (sink, writes, sink_closed) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            Some(Box::new(FailingSuppressor)),
            Box::new(PassthroughTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(matches!(engine.run(), Err(EngineError::Suppress(_))));
        assert!(writes.lock().unwrap().is_empty());
        assert!(sink_closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_transform_failure_aborts_with_transform_error() {
        let stop = Arc::new(AtomicBool::new(false));
        let (capture, capture_closed) = ScriptedCapture::new(ramp_chunk(64), 5, stop.clone());
        let (sink, writes, _) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(FailingTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(matches!(engine.run(), Err(EngineError::Transform(_))));
        assert!(writes.lock().unwrap().is_empty());
        assert!(capture_closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_playback_failure_aborts_with_playback_error() {
        let stop = Arc::new(AtomicBool::new(false));
        let (capture, capture_closed) = ScriptedCapture::new(ramp_chunk(64), 5, stop.clone());
        let sink_closed = Arc::new(AtomicBool::new(false));
        let sink = FailingSink {
            closed: sink_closed.clone(),
        };
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(matches!(engine.run(), Err(EngineError::Playback(_))));
        assert!(capture_closed.load(Ordering::Relaxed));
        assert!(sink_closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_suppressor_runs_before_the_transformer() {
        let stop = Arc::new(AtomicBool::new(false));
        let (capture, _) = ScriptedCapture::new(ramp_chunk(64), 1, stop.clone());
        let (sink, writes, _) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            Some(Box::new(ZeroingSuppressor)),
            Box::new(PassthroughTransformer),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(engine.run().is_ok());
        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_initial_preset_feeds_the_sampler() {
        let stop = Arc::new(AtomicBool::new(false));
        let (capture, _) = ScriptedCapture::new(ramp_chunk(64), 1, stop.clone());
        let (sink, _, _) = RecordingSink::new();
        let (sampler, seen) = FixedFactorSampler::new(1.0, 1.0);
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(sampler),
            receiver,
            stop,
            VoicePreset::Mason,
        );

        assert!(engine.run().is_ok());
        assert_eq!(*seen.lock().unwrap(), vec![VoicePreset::Mason]);
    }

    #[test]
    fn test_selection_switches_voice_on_the_chunk_in_flight() {
        let stop = Arc::new(AtomicBool::new(false));
        let (capture, _) = ScriptedCapture::new(ramp_chunk(64), 2, stop.clone());
        let (sink, _, _) = RecordingSink::new();
        let (sampler, seen) = FixedFactorSampler::new(1.0, 1.0);
        let (sender, receiver) = selection_channel();

        sender.select(VoicePreset::Jacob);

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(sampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(engine.run().is_ok());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![VoicePreset::Jacob, VoicePreset::Jacob],
            "switch should land on the first chunk and persist"
        );
    }

    #[test]
    fn test_rapid_selections_collapse_to_the_newest() {
        let stop = Arc::new(AtomicBool::new(false));
        let (capture, _) = ScriptedCapture::new(ramp_chunk(64), 1, stop.clone());
        let (sink, _, _) = RecordingSink::new();
        let (sampler, seen) = FixedFactorSampler::new(1.0, 1.0);
        let (sender, receiver) = selection_channel();

        sender.select(VoicePreset::Emma);
        sender.select(VoicePreset::Liam);

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(PassthroughTransformer),
            Box::new(sampler),
            receiver,
            stop,
            VoicePreset::Sophia,
        );

        assert!(engine.run().is_ok());
        assert_eq!(*seen.lock().unwrap(), vec![VoicePreset::Liam]);
    }

    #[test]
    fn test_real_sampler_keeps_output_inside_profile_band() {
        let stop = Arc::new(AtomicBool::new(false));
        let chunk = sine_chunk(1024, 100.0);
        let f0 = 100.0 * SAMPLE_RATE as f64 / 1024.0;
        let (capture, _) = ScriptedCapture::new(chunk, 1, stop.clone());
        let (sink, writes, _) = RecordingSink::new();
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(ResamplingTransformer::new()),
            Box::new(UniformFactorSampler),
            receiver,
            stop,
            VoicePreset::Jacob,
        );

        assert!(engine.run().is_ok());
        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        // jacob: pitch 0.4..=0.6 and formant 0.5..=0.7, product 0.2..=0.42.
        let len = writes[0].len();
        assert!(
            (2439..=5120).contains(&len),
            "length {len} outside the jacob band"
        );
        let measured = dominant_frequency(&writes[0], SAMPLE_RATE);
        let (lo, hi) = (f0 * 0.2 - 40.0, f0 * 0.42 + 40.0);
        assert!(
            (lo..=hi).contains(&measured),
            "dominant {measured} Hz outside [{lo}, {hi}]"
        );
    }

    #[test]
    fn test_engine_disguises_audio_end_to_end() {
        let stop = Arc::new(AtomicBool::new(false));
        let chunk = sine_chunk(1024, 100.0);
        let f0 = 100.0 * SAMPLE_RATE as f64 / 1024.0;
        let (capture, _) = ScriptedCapture::new(chunk, 1, stop.clone());
        let (sink, writes, _) = RecordingSink::new();
        let (sampler, _) = FixedFactorSampler::new(0.5, 0.6);
        let (_sender, receiver) = selection_channel();

        let mut engine = engine_with(
            Box::new(capture),
            Box::new(sink),
            None,
            Box::new(ResamplingTransformer::new()),
            Box::new(sampler),
            receiver,
            stop,
            VoicePreset::Jacob,
        );

        assert!(engine.run().is_ok());
        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 3413, "1024 / 0.5 / 0.6 rounded per stage");
        let measured = dominant_frequency(&writes[0], SAMPLE_RATE);
        assert!(
            (measured - f0 * 0.3).abs() < 60.0,
            "dominant {measured} Hz, expected ~{} Hz",
            f0 * 0.3
        );
    }
}
