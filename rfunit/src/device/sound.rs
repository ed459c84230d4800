//! Tones the RF unit can play.

use std::fmt;

/// Built-in tone numbers for the play command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Sound {
    /// Power-on chime.
    PowerOn = 0x00,
    /// Short confirmation "bing".
    Bing = 0x01,
    /// Power-off chime.
    PowerOff = 0x02,
    /// Disc drive tone 1.
    DiscDrive1 = 0x03,
    /// Disc drive tone 2.
    DiscDrive2 = 0x04,
    /// Disc drive tone 3.
    DiscDrive3 = 0x05,
    /// "Plopp".
    Plopp = 0x06,
    /// No disc inserted.
    NoDisc = 0x07,
    /// Louder "plopp".
    PloppLouder = 0x08,
}

impl Sound {
    /// All tones, in tone number order.
    pub const ALL: [Self; 9] = [
        Self::PowerOn,
        Self::Bing,
        Self::PowerOff,
        Self::DiscDrive1,
        Self::DiscDrive2,
        Self::DiscDrive3,
        Self::Plopp,
        Self::NoDisc,
        Self::PloppLouder,
    ];

    /// Tone number sent on the wire.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Get the tone from a string name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace(['-', '_'], "").as_str() {
            "poweron" => Some(Self::PowerOn),
            "bing" => Some(Self::Bing),
            "poweroff" => Some(Self::PowerOff),
            "discdrive1" => Some(Self::DiscDrive1),
            "discdrive2" => Some(Self::DiscDrive2),
            "discdrive3" => Some(Self::DiscDrive3),
            "plopp" => Some(Self::Plopp),
            "nodisc" => Some(Self::NoDisc),
            "plopplouder" => Some(Self::PloppLouder),
            _ => None,
        }
    }
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PowerOn => "power-on",
            Self::Bing => "bing",
            Self::PowerOff => "power-off",
            Self::DiscDrive1 => "disc-drive-1",
            Self::DiscDrive2 => "disc-drive-2",
            Self::DiscDrive3 => "disc-drive-3",
            Self::Plopp => "plopp",
            Self::NoDisc => "no-disc",
            Self::PloppLouder => "plopp-louder",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_sequential() {
        for (i, sound) in Sound::ALL.iter().enumerate() {
            assert_eq!(usize::from(sound.number()), i);
        }
    }

    #[test]
    fn test_from_name_accepts_display_form() {
        for sound in Sound::ALL {
            assert_eq!(Sound::from_name(&sound.to_string()), Some(sound));
        }
        assert_eq!(Sound::from_name("No_Disc"), Some(Sound::NoDisc));
        assert_eq!(Sound::from_name("beep"), None);
    }
}
