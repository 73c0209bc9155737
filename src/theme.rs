use log::debug;
use ratatui::style::Color;

use crate::storage::LocalStore;

pub const THEME_KEY: &str = "theme";
pub const FONT_SIZE_KEY: &str = "fontSize";

// Color palette structure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Base16Palette {
    pub base_00: Color, // Background
    pub base_01: Color, // Lighter background
    pub base_02: Color, // Selection background
    pub base_03: Color, // Comments, invisibles
    pub base_04: Color, // Dark foreground
    pub base_05: Color, // Default foreground
    pub base_06: Color, // Light foreground
    pub base_07: Color, // Light background
    pub base_08: Color, // Red
    pub base_09: Color, // Orange
    pub base_0a: Color, // Yellow
    pub base_0b: Color, // Green
    pub base_0c: Color, // Cyan
    pub base_0d: Color, // Blue
    pub base_0e: Color, // Purple
    pub base_0f: Color, // Brown
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

// Oceanic Next
pub static DARK_PALETTE: Base16Palette = Base16Palette {
    base_00: rgb(0x1B2B34),
    base_01: rgb(0x343D46),
    base_02: rgb(0x4F5B66),
    base_03: rgb(0x65737E),
    base_04: rgb(0xA7ADBA),
    base_05: rgb(0xC0C5CE),
    base_06: rgb(0xCDD3DE),
    base_07: rgb(0xF0F4F8),
    base_08: rgb(0xEC5F67),
    base_09: rgb(0xF99157),
    base_0a: rgb(0xFAC863),
    base_0b: rgb(0x99C794),
    base_0c: rgb(0x5FB3B3),
    base_0d: rgb(0x6699CC),
    base_0e: rgb(0xC594C5),
    base_0f: rgb(0xAB7967),
};

// One Light
pub static LIGHT_PALETTE: Base16Palette = Base16Palette {
    base_00: rgb(0xFAFAFA),
    base_01: rgb(0xF0F0F1),
    base_02: rgb(0xE5E5E6),
    base_03: rgb(0xA0A1A7),
    base_04: rgb(0x696C77),
    base_05: rgb(0x383A42),
    base_06: rgb(0x202227),
    base_07: rgb(0x090A0B),
    base_08: rgb(0xCA1243),
    base_09: rgb(0xD75F00),
    base_0a: rgb(0xC18401),
    base_0b: rgb(0x50A14F),
    base_0c: rgb(0x0184BC),
    base_0d: rgb(0x4078F2),
    base_0e: rgb(0xA626A4),
    base_0f: rgb(0x986801),
};

impl Base16Palette {
    /// (text, border, background) for a popup panel.
    pub fn get_panel_colors(&self, is_focused: bool) -> (Color, Color, Color) {
        if is_focused {
            (self.base_07, self.base_04, self.base_00)
        } else {
            (self.base_03, self.base_03, self.base_00)
        }
    }

    /// (background, foreground) of selected text or list rows.
    pub fn get_selection_colors(&self) -> (Color, Color) {
        (self.base_02, self.base_06)
    }

    /// (background, foreground) for search hits; the current hit stands out.
    pub fn get_highlight_colors(&self, is_current: bool) -> (Color, Color) {
        if is_current {
            (self.base_09, self.base_00)
        } else {
            (self.base_0a, self.base_00)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn palette(&self) -> &'static Base16Palette {
        match self {
            Theme::Light => &LIGHT_PALETTE,
            Theme::Dark => &DARK_PALETTE,
        }
    }

    pub fn all() -> &'static [Theme] {
        &[Theme::Light, Theme::Dark]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "small" => Some(FontSize::Small),
            "medium" => Some(FontSize::Medium),
            "large" => Some(FontSize::Large),
            _ => None,
        }
    }

    pub fn all() -> &'static [FontSize] {
        &[FontSize::Small, FontSize::Medium, FontSize::Large]
    }

    /// Share of the page width given to the text column.
    pub fn column_percent(&self) -> u16 {
        match self {
            FontSize::Small => 100,
            FontSize::Medium => 85,
            FontSize::Large => 70,
        }
    }

    pub fn column_width(&self, available: u16) -> u16 {
        ((available as u32 * self.column_percent() as u32) / 100).max(1) as u16
    }
}

/// Reader appearance. Owned by the app; the store only mirrors it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThemePrefs {
    pub theme: Theme,
    pub font_size: FontSize,
}

impl ThemePrefs {
    /// Unknown stored values fall back to defaults.
    pub fn load(store: &LocalStore) -> Self {
        let prefs = Self {
            theme: store.get(THEME_KEY).and_then(Theme::parse).unwrap_or_default(),
            font_size: store
                .get(FONT_SIZE_KEY)
                .and_then(FontSize::parse)
                .unwrap_or_default(),
        };
        debug!("Theme prefs: {prefs:?}");
        prefs
    }

    pub fn save(&self, store: &mut LocalStore) {
        store.set(THEME_KEY, self.theme.as_str());
        store.set(FONT_SIZE_KEY, self.font_size.as_str());
    }

    pub fn palette(&self) -> &'static Base16Palette {
        self.theme.palette()
    }
}
