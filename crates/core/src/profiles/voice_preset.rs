use std::fmt;

/// The closed set of built-in disguise voices.
///
/// Selection messages and catalog lookups are total over this enum.
/// Free-form names coming from the control surface are resolved (or
/// rejected) up front via [`VoicePreset::from_name`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoicePreset {
    Sophia,
    Emma,
    Olivia,
    Isabella,
    Victoria,
    Elena,
    Ethan,
    Noah,
    Liam,
    Mason,
    Jacob,
    Oliver,
    GrandpaHenry,
    Tommy,
    Lily,
}

/// Menu grouping for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceGroup {
    Female,
    Male,
    Special,
}

impl VoiceGroup {
    pub fn label(self) -> &'static str {
        match self {
            VoiceGroup::Female => "Female voices",
            VoiceGroup::Male => "Male voices",
            VoiceGroup::Special => "Special voices",
        }
    }
}

impl VoicePreset {
    /// Every preset, in menu order.
    pub const ALL: [VoicePreset; 15] = [
        VoicePreset::Sophia,
        VoicePreset::Emma,
        VoicePreset::Olivia,
        VoicePreset::Isabella,
        VoicePreset::Victoria,
        VoicePreset::Elena,
        VoicePreset::Ethan,
        VoicePreset::Noah,
        VoicePreset::Liam,
        VoicePreset::Mason,
        VoicePreset::Jacob,
        VoicePreset::Oliver,
        VoicePreset::GrandpaHenry,
        VoicePreset::Tommy,
        VoicePreset::Lily,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VoicePreset::Sophia => "sophia",
            VoicePreset::Emma => "emma",
            VoicePreset::Olivia => "olivia",
            VoicePreset::Isabella => "isabella",
            VoicePreset::Victoria => "victoria",
            VoicePreset::Elena => "elena",
            VoicePreset::Ethan => "ethan",
            VoicePreset::Noah => "noah",
            VoicePreset::Liam => "liam",
            VoicePreset::Mason => "mason",
            VoicePreset::Jacob => "jacob",
            VoicePreset::Oliver => "oliver",
            VoicePreset::GrandpaHenry => "grandpa_henry",
            VoicePreset::Tommy => "tommy",
            VoicePreset::Lily => "lily",
        }
    }

    /// Resolves a user-supplied name, ignoring case and surrounding space.
    pub fn from_name(name: &str) -> Option<VoicePreset> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }

    /// Menu position, starting at 1.
    pub fn menu_number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// Inverse of [`VoicePreset::menu_number`]; `None` outside 1..=15.
    pub fn from_menu_number(number: u8) -> Option<VoicePreset> {
        if number == 0 {
            return None;
        }
        Self::ALL.get(number as usize - 1).copied()
    }

    pub fn group(self) -> VoiceGroup {
        match self {
            VoicePreset::Sophia
            | VoicePreset::Emma
            | VoicePreset::Olivia
            | VoicePreset::Isabella
            | VoicePreset::Victoria
            | VoicePreset::Elena => VoiceGroup::Female,
            VoicePreset::Ethan
            | VoicePreset::Noah
            | VoicePreset::Liam
            | VoicePreset::Mason
            | VoicePreset::Jacob
            | VoicePreset::Oliver => VoiceGroup::Male,
            VoicePreset::GrandpaHenry | VoicePreset::Tommy | VoicePreset::Lily => {
                VoiceGroup::Special
            }
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl Default for VoicePreset {
    /// The voice active when a session starts.
    fn default() -> Self {
        VoicePreset::Sophia
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
