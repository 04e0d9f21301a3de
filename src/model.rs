use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-in defaults for omitted arguments.
pub const DEFAULT_PIN_DOUT: f64 = 0.75;
pub const DEFAULT_PIN_DIN: f64 = 0.25;
pub const DEFAULT_WIRE_WIDTH: f64 = 0.375;
pub const DEFAULT_TEXT_HEIGHT: f64 = 0.75;

/// A fully resolved drawing primitive, ready for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Board {
        width: f64,
        height: f64,
        gap: Option<f64>,
    },
    Pin {
        x: f64,
        y: f64,
        dout: f64,
        din: f64,
    },
    Pinq {
        x: f64,
        y: f64,
        dout: f64,
        din: f64,
    },
    Wire {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: f64,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
        height: f64,
    },
}

impl Item {
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Board { .. } => "board",
            Item::Pin { .. } => "pin",
            Item::Pinq { .. } => "pinq",
            Item::Wire { .. } => "wire",
            Item::Text { .. } => "text",
        }
    }

    /// Drawing priority: higher is drawn first (background first, pins last).
    pub fn priority(&self) -> u8 {
        match self {
            Item::Board { .. } => 4,
            Item::Text { .. } => 3,
            Item::Wire { .. } => 2,
            Item::Pin { .. } => 1,
            Item::Pinq { .. } => 0,
        }
    }
}

/// Names accepted by `option NAME=...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    PinDout,
    PinDin,
    WireWidth,
    TextHeight,
    Gap,
}

impl OptionKey {
    pub fn name(self) -> &'static str {
        match self {
            OptionKey::PinDout => "PIN_DOUT",
            OptionKey::PinDin => "PIN_DIN",
            OptionKey::WireWidth => "WIRE_WIDTH",
            OptionKey::TextHeight => "TEXT_HEIGHT",
            OptionKey::Gap => "GAP",
        }
    }
}

impl FromStr for OptionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PIN_DOUT" => Ok(OptionKey::PinDout),
            "PIN_DIN" => Ok(OptionKey::PinDin),
            "WIRE_WIDTH" => Ok(OptionKey::WireWidth),
            "TEXT_HEIGHT" => Ok(OptionKey::TextHeight),
            "GAP" => Ok(OptionKey::Gap),
            other => Err(format!("unknown option `{other}`")),
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Defaults consulted whenever a construct's own argument is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub pin_dout: f64,
    pub pin_din: f64,
    pub wire_width: f64,
    pub text_height: f64,
    /// Clearance drawn around the board; no clearance when absent.
    pub gap: Option<f64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pin_dout: DEFAULT_PIN_DOUT,
            pin_din: DEFAULT_PIN_DIN,
            wire_width: DEFAULT_WIRE_WIDTH,
            text_height: DEFAULT_TEXT_HEIGHT,
            gap: None,
        }
    }
}

impl Options {
    pub fn get(&self, key: OptionKey) -> Option<f64> {
        match key {
            OptionKey::PinDout => Some(self.pin_dout),
            OptionKey::PinDin => Some(self.pin_din),
            OptionKey::WireWidth => Some(self.wire_width),
            OptionKey::TextHeight => Some(self.text_height),
            OptionKey::Gap => self.gap,
        }
    }

    /// Only `GAP` may be cleared; every other key needs a number.
    pub fn set(&mut self, key: OptionKey, value: Option<f64>) -> Result<(), String> {
        let slot = match key {
            OptionKey::Gap => {
                self.gap = value;
                return Ok(());
            }
            OptionKey::PinDout => &mut self.pin_dout,
            OptionKey::PinDin => &mut self.pin_din,
            OptionKey::WireWidth => &mut self.wire_width,
            OptionKey::TextHeight => &mut self.text_height,
        };
        *slot = value.ok_or_else(|| format!("option {key} requires a number"))?;
        Ok(())
    }
}
