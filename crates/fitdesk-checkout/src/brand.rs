//! Card Brand Hint
//!
//! Local prefix matching used for instant card-face feedback while the
//! payment processor's BIN lookup is in flight. The result is cosmetic: the
//! value sent to the processor is always the [`PaymentMethodId`] returned by
//! the lookup, never a [`Brand`].
//!
//! [`PaymentMethodId`]: crate::PaymentMethodId

use serde::{Deserialize, Serialize};

use crate::format::digits;

/// Card network guessed from the leading digits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    #[default]
    Unknown,
}

impl Brand {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
            Self::Unknown => "unknown",
        }
    }

    /// Name shown on the card face
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::Mastercard => "Mastercard",
            Self::Amex => "American Express",
            Self::Discover => "Discover",
            Self::Unknown => "Card",
        }
    }

    /// Maximum security code length for this network
    ///
    /// Unknown brands get the wider cap so a 4-digit code is never cut off
    /// before the card is recognised.
    pub const fn security_code_len(&self) -> usize {
        match self {
            Self::Amex | Self::Unknown => 4,
            Self::Visa | Self::Mastercard | Self::Discover => 3,
        }
    }
}

impl std::fmt::Display for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guess the card brand from the leading digits
///
/// Rules are checked in order: visa (`4`), mastercard (`51`-`55`, `22`-`27`),
/// amex (`34`, `37`), discover (`6011`, `65`). Non-digit characters are
/// ignored.
pub fn detect_brand(card_number: &str) -> Brand {
    let cleaned = digits(card_number);
    let two = cleaned.get(..2).and_then(|p| p.parse::<u8>().ok());

    if cleaned.starts_with('4') {
        Brand::Visa
    } else if matches!(two, Some(51..=55 | 22..=27)) {
        Brand::Mastercard
    } else if matches!(two, Some(34 | 37)) {
        Brand::Amex
    } else if cleaned.starts_with("6011") || cleaned.starts_with("65") {
        Brand::Discover
    } else {
        Brand::Unknown
    }
}
