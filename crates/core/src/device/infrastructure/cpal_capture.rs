use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::device::domain::capture_source::CaptureSource;
use crate::shared::chunk::AudioChunk;
use crate::shared::constants::{CHANNELS, CHUNK_FRAMES, SAMPLE_RATE};

/// Device blocks the capture queue may hold before new data is dropped.
const QUEUE_BLOCKS: usize = 32;

/// How often a blocked read re-checks the stream failure flag.
const STATUS_POLL: Duration = Duration::from_millis(200);

/// Microphone capture via cpal's default input device.
///
/// cpal streams must stay on the thread that created them, so the stream
/// lives its whole life on a dedicated holder thread; captured blocks cross
/// to the caller over a bounded channel and are reassembled into exact
/// [`CHUNK_FRAMES`] chunks regardless of device callback granularity.
pub struct CpalCaptureSource {
    data_rx: Receiver<Vec<f32>>,
    stop_tx: Sender<()>,
    holder: Option<JoinHandle<()>>,
    failed: Arc<AtomicBool>,
    pending: Vec<f32>,
}

impl CpalCaptureSource {
    /// Opens the default input device with the fixed mono stream format.
    ///
    /// Fails if there is no input device or the device rejects mono f32 at
    /// the fixed sample rate; format negotiation is deliberately absent.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let (data_tx, data_rx) = bounded::<Vec<f32>>(QUEUE_BLOCKS);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let failed = Arc::new(AtomicBool::new(false));
        let failed_flag = failed.clone();

        let holder = thread::spawn(move || {
            let stream = match build_input_stream(data_tx, failed_flag) {
                Ok(stream) => stream,
                Err(message) => {
                    let _ = ready_tx.send(Err(message));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start capture stream: {e}")));
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
                return Err("capture thread exited during startup".into());
            }
        }

        Ok(Self {
            data_rx,
            stop_tx,
            holder: Some(holder),
            failed,
            pending: Vec::with_capacity(CHUNK_FRAMES * 2),
        })
    }
}

fn build_input_stream(
    data_tx: Sender<Vec<f32>>,
    failed: Arc<AtomicBool>,
) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or("no default input device")?;
    let config = cpal::StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };
    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if data_tx.try_send(data.to_vec()).is_err() {
                    log::warn!("capture queue full, dropping {} samples", data.len());
                }
            },
            move |err| {
                log::error!("capture stream error: {err}");
                failed.store(true, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| format!("failed to open capture stream: {e}"))
}

impl CaptureSource for CpalCaptureSource {
    fn read_chunk(&mut self) -> Result<AudioChunk, Box<dyn std::error::Error>> {
        while self.pending.len() < CHUNK_FRAMES {
            if self.failed.load(Ordering::Relaxed) {
                return Err("capture stream failed".into());
            }
            match self.data_rx.recv_timeout(STATUS_POLL) {
                Ok(block) => self.pending.extend_from_slice(&block),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err("capture stream closed".into());
                }
            }
        }
        let samples: Vec<f32> = self.pending.drain(..CHUNK_FRAMES).collect();
        Ok(AudioChunk::new(samples, SAMPLE_RATE))
    }

    fn close(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(holder) = self.holder.take() {
            if holder.join().is_err() {
                log::warn!("capture thread panicked during close");
            }
        }
    }
}

impl Drop for CpalCaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}
