//! Three-valued switch for flags where "never set" differs from "off"

use serde::{Deserialize, Serialize};

/// Explicit tri-state flag.
///
/// Serialized as `true`, `false` or `null` so stored documents keep the
/// optional-boolean shape. Only [`Toggle::On`] counts as enabled; callers that
/// want a different default for `Unset` must ask for it with
/// [`Toggle::is_on_or`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Toggle {
    #[default]
    Unset,
    On,
    Off,
}

impl Toggle {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    pub const fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// Resolve the flag, using `default` when it was never set
    pub const fn is_on_or(self, default: bool) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Unset => default,
        }
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        if value {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl From<Option<bool>> for Toggle {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unset, Self::from)
    }
}

impl From<Toggle> for Option<bool> {
    fn from(value: Toggle) -> Self {
        match value {
            Toggle::On => Some(true),
            Toggle::Off => Some(false),
            Toggle::Unset => None,
        }
    }
}
