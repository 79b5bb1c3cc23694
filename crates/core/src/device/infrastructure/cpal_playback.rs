use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TryRecvError};

use crate::device::domain::playback_sink::PlaybackSink;
use crate::shared::constants::{CHANNELS, CHUNK_FRAMES, SAMPLE_RATE};

/// Samples the playback queue may hold; a blocked write on this full queue
/// is what paces the whole pipeline against real time.
const QUEUE_SAMPLES: usize = CHUNK_FRAMES * 32;

/// How often a blocked write re-checks the stream failure flag.
const STATUS_POLL: Duration = Duration::from_millis(200);

/// Longest close() waits for queued audio to finish playing.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Speaker playback via cpal's default output device.
///
/// Writes enqueue samples one by one into a bounded queue the device
/// callback drains; when the queue is full the write blocks until the
/// device catches up. The stream itself lives on a dedicated holder thread
/// because cpal streams must stay on the thread that created them.
pub struct CpalPlaybackSink {
    sample_tx: Option<Sender<f32>>,
    stop_tx: Sender<()>,
    holder: Option<JoinHandle<()>>,
    failed: Arc<AtomicBool>,
    starved: Arc<AtomicU64>,
}

impl CpalPlaybackSink {
    /// Opens the default output device with the fixed mono stream format.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let (sample_tx, sample_rx) = bounded::<f32>(QUEUE_SAMPLES);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let failed = Arc::new(AtomicBool::new(false));
        let starved = Arc::new(AtomicU64::new(0));
        let failed_flag = failed.clone();
        let starved_count = starved.clone();

        let holder = thread::spawn(move || {
            let stream = match build_output_stream(sample_rx, failed_flag, starved_count) {
                Ok(stream) => stream,
                Err(message) => {
                    let _ = ready_tx.send(Err(message));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start playback stream: {e}")));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            // Park until close; dropping the stream releases the device.
            let _ = stop_rx.recv();
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                let _ = holder.join();
                return Err(message.into());
            }
            Err(_) => {
                let _ = holder.join();
                return Err("playback thread exited during startup".into());
            }
        }

        Ok(Self {
            sample_tx: Some(sample_tx),
            stop_tx,
            holder: Some(holder),
            failed,
            starved,
        })
    }

    fn shut_down(&mut self) {
        if let Some(sender) = self.sample_tx.take() {
            if !self.failed.load(Ordering::Relaxed) {
                let deadline = Instant::now() + DRAIN_TIMEOUT;
                while !sender.is_empty() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        let _ = self.stop_tx.send(());
        if let Some(holder) = self.holder.take() {
            if holder.join().is_err() {
                log::warn!("playback thread panicked during close");
            }
            let starved = self.starved.load(Ordering::Relaxed);
            if starved > 0 {
                log::warn!("playback starved for {starved} samples");
            }
        }
    }
}

fn build_output_stream(
    sample_rx: Receiver<f32>,
    failed: Arc<AtomicBool>,
    starved: Arc<AtomicU64>,
) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("no default output device")?;
    let config = cpal::StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };
    // Starvation is counted only once audio has started flowing.
    let playing = AtomicBool::new(false);
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    match sample_rx.try_recv() {
                        Ok(sample) => {
                            playing.store(true, Ordering::Relaxed);
                            *slot = sample;
                        }
                        Err(TryRecvError::Empty) => {
                            if playing.load(Ordering::Relaxed) {
                                starved.fetch_add(1, Ordering::Relaxed);
                            }
                            *slot = 0.0;
                        }
                        Err(TryRecvError::Disconnected) => *slot = 0.0,
                    }
                }
            },
            move |err| {
                log::error!("playback stream error: {err}");
                failed.store(true, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| format!("failed to open playback stream: {e}"))
}

impl PlaybackSink for CpalPlaybackSink {
    fn write(&mut self, samples: &[f32]) -> Result<(), Box<dyn std::error::Error>> {
        let sender = self.sample_tx.as_ref().ok_or("playback sink is closed")?;
        for &sample in samples {
            loop {
                if self.failed.load(Ordering::Relaxed) {
                    return Err("playback stream failed".into());
                }
                match sender.send_timeout(sample, STATUS_POLL) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(_)) => {}
                    Err(SendTimeoutError::Disconnected(_)) => {
                        return Err("playback stream closed".into());
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.shut_down();
        Ok(())
    }
}

impl Drop for CpalPlaybackSink {
    fn drop(&mut self) {
        self.shut_down();
    }
}
