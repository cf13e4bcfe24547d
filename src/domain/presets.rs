// ============================================================
// Layer 3 — Model Presets
// ============================================================
// The published SkipNet variants for CIFAR-10 / CIFAR-100.
//
//   name           groups          widths              classes
//   cifar10-18     [2, 2, 2, 2]    64/128/256/512      10
//   cifar10-38     [6, 6, 6]       16/32/64            10
//   cifar10-74     [12, 12, 12]    16/32/64            10
//   cifar10-110    [18, 18, 18]    16/32/64            10
//   cifar10-152    [25, 25, 25]    16/32/64            10
//   cifar100-*     same depths as above (no -18)       100
//
// All presets use a 10-dimensional gate embedding and hidden state.
// The precision profile is supplied by the caller.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::config::{NetworkConfig, PrecisionProfile};
use crate::domain::error::ConfigError;

const NARROW_WIDTHS: [usize; 3] = [16, 32, 64];
const WIDE_WIDTHS:   [usize; 4] = [64, 128, 256, 512];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    Cifar10Gate18,
    Cifar10Gate38,
    Cifar10Gate74,
    Cifar10Gate110,
    Cifar10Gate152,
    Cifar100Gate38,
    Cifar100Gate74,
    Cifar100Gate110,
    Cifar100Gate152,
}

impl Preset {
    pub const ALL: [Preset; 9] = [
        Preset::Cifar10Gate18,
        Preset::Cifar10Gate38,
        Preset::Cifar10Gate74,
        Preset::Cifar10Gate110,
        Preset::Cifar10Gate152,
        Preset::Cifar100Gate38,
        Preset::Cifar100Gate74,
        Preset::Cifar100Gate110,
        Preset::Cifar100Gate152,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Cifar10Gate18   => "cifar10-18",
            Preset::Cifar10Gate38   => "cifar10-38",
            Preset::Cifar10Gate74   => "cifar10-74",
            Preset::Cifar10Gate110  => "cifar10-110",
            Preset::Cifar10Gate152  => "cifar10-152",
            Preset::Cifar100Gate38  => "cifar100-38",
            Preset::Cifar100Gate74  => "cifar100-74",
            Preset::Cifar100Gate110 => "cifar100-110",
            Preset::Cifar100Gate152 => "cifar100-152",
        }
    }

    pub fn num_classes(self) -> usize {
        match self {
            Preset::Cifar100Gate38
            | Preset::Cifar100Gate74
            | Preset::Cifar100Gate110
            | Preset::Cifar100Gate152 => 100,
            _ => 10,
        }
    }

    pub fn blocks_per_group(self) -> Vec<usize> {
        match self {
            Preset::Cifar10Gate18 => vec![2, 2, 2, 2],
            Preset::Cifar10Gate38 | Preset::Cifar100Gate38 => vec![6; 3],
            Preset::Cifar10Gate74 | Preset::Cifar100Gate74 => vec![12; 3],
            Preset::Cifar10Gate110 | Preset::Cifar100Gate110 => vec![18; 3],
            Preset::Cifar10Gate152 | Preset::Cifar100Gate152 => vec![25; 3],
        }
    }

    pub fn group_widths(self) -> Vec<usize> {
        match self {
            Preset::Cifar10Gate18 => WIDE_WIDTHS.to_vec(),
            _ => NARROW_WIDTHS.to_vec(),
        }
    }

    pub fn config(self, precision: PrecisionProfile) -> NetworkConfig {
        NetworkConfig::new(self.blocks_per_group(), self.group_widths(), self.num_classes())
            .with_embed_dim(10)
            .with_hidden_dim(10)
            .with_precision(precision)
    }

    fn known_names() -> String {
        Self::ALL.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string(), Self::known_names()))
    }
}
