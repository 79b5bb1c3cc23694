use crate::profiles::voice_preset::VoicePreset;

/// An inclusive range of strictly positive scaling factors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FactorRange {
    min: f32,
    max: f32,
}

impl FactorRange {
    /// Both bounds must be positive and `min` must not exceed `max`.
    pub fn new(min: f32, max: f32) -> Self {
        assert!(
            min > 0.0 && min <= max,
            "invalid factor range [{min}, {max}]"
        );
        Self { min, max }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Pitch and formant factor ranges for one disguise voice.
///
/// Factors below 1.0 deepen the voice, factors above 1.0 raise it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceProfile {
    preset: VoicePreset,
    pitch_range: FactorRange,
    formant_range: FactorRange,
}

impl VoiceProfile {
    pub fn preset(&self) -> VoicePreset {
        self.preset
    }

    pub fn pitch_range(&self) -> FactorRange {
        self.pitch_range
    }

    pub fn formant_range(&self) -> FactorRange {
        self.formant_range
    }
}

/// Immutable registry mapping every preset to its factor ranges.
///
/// Built once at startup and read-only afterwards; lookups are total over
/// [`VoicePreset`].
#[derive(Clone, Debug)]
pub struct ProfileCatalog {
    profiles: Vec<VoiceProfile>,
}

impl ProfileCatalog {
    pub fn new() -> Self {
        let profiles = VoicePreset::ALL
            .iter()
            .map(|&preset| {
                let (pitch_range, formant_range) = factor_ranges(preset);
                VoiceProfile {
                    preset,
                    pitch_range,
                    formant_range,
                }
            })
            .collect();
        Self { profiles }
    }

    pub fn profile(&self, preset: VoicePreset) -> &VoiceProfile {
        &self.profiles[preset.index()]
    }

    /// All profiles in menu order.
    pub fn profiles(&self) -> &[VoiceProfile] {
        &self.profiles
    }
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn factor_ranges(preset: VoicePreset) -> (FactorRange, FactorRange) {
    let ((pitch_min, pitch_max), (formant_min, formant_max)) = match preset {
        VoicePreset::Sophia => ((1.2, 1.4), (1.2, 1.3)),
        VoicePreset::Emma => ((1.3, 1.5), (1.3, 1.4)),
        VoicePreset::Olivia => ((1.4, 1.6), (1.4, 1.5)),
        VoicePreset::Isabella => ((1.5, 1.7), (1.5, 1.6)),
        VoicePreset::Victoria => ((1.6, 1.8), (1.6, 1.7)),
        VoicePreset::Elena => ((1.7, 1.9), (1.7, 1.8)),
        VoicePreset::Ethan => ((0.6, 0.8), (0.7, 0.9)),
        VoicePreset::Noah => ((0.7, 0.9), (0.8, 1.0)),
        VoicePreset::Liam => ((0.5, 0.7), (0.6, 0.8)),
        VoicePreset::Mason => ((0.8, 1.0), (0.9, 1.1)),
        VoicePreset::Jacob => ((0.4, 0.6), (0.5, 0.7)),
        VoicePreset::Oliver => ((0.9, 1.1), (1.0, 1.2)),
        VoicePreset::GrandpaHenry => ((0.4, 0.6), (0.5, 0.7)),
        VoicePreset::Tommy => ((0.9, 1.1), (0.8, 1.0)),
        VoicePreset::Lily => ((1.6, 1.8), (1.5, 1.7)),
    };
    (
        FactorRange::new(pitch_min, pitch_max),
        FactorRange::new(formant_min, formant_max),
    )
}
