use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::profiles::voice_preset::VoicePreset;

/// Creates the control channel that carries live voice selections from the
/// menu thread to the audio thread.
pub fn selection_channel() -> (SelectionSender, SelectionReceiver) {
    let (tx, rx) = unbounded();
    (SelectionSender { tx }, SelectionReceiver { rx })
}

/// Sending half held by the menu thread.
#[derive(Clone)]
pub struct SelectionSender {
    tx: Sender<VoicePreset>,
}

impl SelectionSender {
    /// Hands a new selection to the audio thread. Never blocks; a selection
    /// sent after the audio thread has stopped is silently discarded.
    pub fn select(&self, preset: VoicePreset) {
        if self.tx.send(preset).is_err() {
            log::debug!("selection '{preset}' dropped, audio thread has stopped");
        }
    }
}

/// Receiving half polled by the audio thread between chunks.
pub struct SelectionReceiver {
    rx: Receiver<VoicePreset>,
}

impl SelectionReceiver {
    /// Drains every pending selection and returns the newest, if any.
    /// Selections queued behind it are discarded unseen.
    pub fn try_latest(&self) -> Option<VoicePreset> {
        self.rx.try_iter().last()
    }
}
