//! Input event records
//!
//! Host input arrives as an [`EventData`] payload, is validated at the
//! boundary, and becomes an [`EventRecord`] tagged with the frame it was
//! delivered in.

use crate::{FrameNumber, Millis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected event payloads
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    /// A coordinate or delta was NaN or infinite
    #[error("Non-finite value in field `{0}`")]
    NonFinite(&'static str),

    /// A key event carried an empty key name
    #[error("Key event without a key name")]
    EmptyKey,

    /// A custom event carried an empty name
    #[error("Custom event without a name")]
    EmptyName,
}

/// Pointer button
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
    Other(u8),
}

/// Keyboard modifier flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers {
    bits: u8,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { bits: 0 };
    pub const SHIFT: u8 = 0b0001;
    pub const CTRL: u8 = 0b0010;
    pub const ALT: u8 = 0b0100;
    pub const META: u8 = 0b1000;

    pub const fn new(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Self {
        let mut bits = 0;
        if shift {
            bits |= Self::SHIFT;
        }
        if ctrl {
            bits |= Self::CTRL;
        }
        if alt {
            bits |= Self::ALT;
        }
        if meta {
            bits |= Self::META;
        }
        Self { bits }
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self { bits }
    }

    pub const fn bits(&self) -> u8 {
        self.bits
    }

    pub const fn shift(&self) -> bool {
        self.bits & Self::SHIFT != 0
    }

    pub const fn ctrl(&self) -> bool {
        self.bits & Self::CTRL != 0
    }

    pub const fn alt(&self) -> bool {
        self.bits & Self::ALT != 0
    }

    pub const fn meta(&self) -> bool {
        self.bits & Self::META != 0
    }

    pub const fn any(&self) -> bool {
        self.bits != 0
    }
}

/// Event-specific payload, discriminated by `kind`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventData {
    KeyDown {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
        #[serde(default)]
        repeat: bool,
    },
    KeyUp {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerDown {
        x: f32,
        y: f32,
        #[serde(default)]
        button: PointerButton,
    },
    PointerUp {
        x: f32,
        y: f32,
        #[serde(default)]
        button: PointerButton,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    Wheel {
        delta_x: f32,
        delta_y: f32,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Focus,
    Blur,
    /// Application-defined event with an arbitrary JSON detail
    Custom {
        name: String,
        #[serde(default)]
        detail: serde_json::Value,
    },
}

impl EventData {
    /// The discriminator used in serialized records.
    pub fn kind(&self) -> &'static str {
        match self {
            EventData::KeyDown { .. } => "key_down",
            EventData::KeyUp { .. } => "key_up",
            EventData::PointerDown { .. } => "pointer_down",
            EventData::PointerUp { .. } => "pointer_up",
            EventData::PointerMove { .. } => "pointer_move",
            EventData::Wheel { .. } => "wheel",
            EventData::Resize { .. } => "resize",
            EventData::Focus => "focus",
            EventData::Blur => "blur",
            EventData::Custom { .. } => "custom",
        }
    }

    /// Check the payload before it is recorded.
    pub fn validate(&self) -> Result<(), EventError> {
        match self {
            EventData::KeyDown { key, .. } | EventData::KeyUp { key, .. } => {
                if key.is_empty() {
                    return Err(EventError::EmptyKey);
                }
            }
            EventData::PointerDown { x, y, .. }
            | EventData::PointerUp { x, y, .. }
            | EventData::PointerMove { x, y } => {
                finite("x", *x)?;
                finite("y", *y)?;
            }
            EventData::Wheel { delta_x, delta_y } => {
                finite("delta_x", *delta_x)?;
                finite("delta_y", *delta_y)?;
            }
            EventData::Custom { name, .. } => {
                if name.is_empty() {
                    return Err(EventError::EmptyName);
                }
            }
            EventData::Resize { .. } | EventData::Focus | EventData::Blur => {}
        }
        Ok(())
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), EventError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EventError::NonFinite(field))
    }
}

/// An input event attributed to the frame it was delivered in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub frame_number: FrameNumber,
    pub timestamp: Millis,
    #[serde(flatten)]
    pub data: EventData,
}

impl EventRecord {
    pub fn kind(&self) -> &'static str {
        self.data.kind()
    }
}
