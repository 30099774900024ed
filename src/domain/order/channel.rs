//! Payment providers and the channels they expose.

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    WalletA,
    WalletB,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::WalletA => "wallet_a",
            Provider::WalletB => "wallet_b",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet_a" => Ok(Provider::WalletA),
            "wallet_b" => Ok(Provider::WalletB),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

/// Device class the order was placed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
}

/// Provider plus sub-flow, fixed on the order at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    /// WalletA scan-to-pay: the intent handle is a QR payload.
    WalletAQr,
    /// WalletA in-browser flow on phones: redirect URL.
    WalletAMobile,
    /// WalletB desktop web checkout: redirect URL.
    WalletBWeb,
    /// WalletB mobile web checkout: redirect URL.
    WalletBMobile,
}

impl PaymentChannel {
    pub const ALL: [PaymentChannel; 4] = [
        PaymentChannel::WalletAQr,
        PaymentChannel::WalletAMobile,
        PaymentChannel::WalletBWeb,
        PaymentChannel::WalletBMobile,
    ];

    pub fn provider(&self) -> Provider {
        match self {
            PaymentChannel::WalletAQr | PaymentChannel::WalletAMobile => Provider::WalletA,
            PaymentChannel::WalletBWeb | PaymentChannel::WalletBMobile => Provider::WalletB,
        }
    }

    pub fn device_type(&self) -> DeviceType {
        match self {
            PaymentChannel::WalletAQr | PaymentChannel::WalletBWeb => DeviceType::Desktop,
            PaymentChannel::WalletAMobile | PaymentChannel::WalletBMobile => DeviceType::Mobile,
        }
    }

    /// Channels usable from the given device class.
    pub fn available_for(device: DeviceType) -> Vec<PaymentChannel> {
        Self::ALL
            .into_iter()
            .filter(|c| c.device_type() == device)
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::WalletAQr => "wallet_a_qr",
            PaymentChannel::WalletAMobile => "wallet_a_mobile",
            PaymentChannel::WalletBWeb => "wallet_b_web",
            PaymentChannel::WalletBMobile => "wallet_b_mobile",
        }
    }
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentChannel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("channel", format!("unknown channel '{}'", s))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_channel_belongs_to_one_provider() {
        assert_eq!(PaymentChannel::WalletAQr.provider(), Provider::WalletA);
        assert_eq!(PaymentChannel::WalletAMobile.provider(), Provider::WalletA);
        assert_eq!(PaymentChannel::WalletBWeb.provider(), Provider::WalletB);
        assert_eq!(PaymentChannel::WalletBMobile.provider(), Provider::WalletB);
    }

    #[test]
    fn desktop_gets_qr_and_web_channels() {
        assert_eq!(
            PaymentChannel::available_for(DeviceType::Desktop),
            vec![PaymentChannel::WalletAQr, PaymentChannel::WalletBWeb]
        );
    }

    #[test]
    fn mobile_gets_mobile_channels() {
        assert_eq!(
            PaymentChannel::available_for(DeviceType::Mobile),
            vec![PaymentChannel::WalletAMobile, PaymentChannel::WalletBMobile]
        );
    }

    #[test]
    fn channel_parses_from_its_name() {
        for channel in PaymentChannel::ALL {
            assert_eq!(channel.as_str().parse::<PaymentChannel>(), Ok(channel));
        }
    }

    #[test]
    fn free_text_payment_method_is_not_a_channel() {
        assert!("wechat".parse::<PaymentChannel>().is_err());
        assert!("wallet_a".parse::<PaymentChannel>().is_err());
    }

    #[test]
    fn channel_deserializes_from_json() {
        let channel: PaymentChannel = serde_json::from_str("\"wallet_b_web\"").unwrap();
        assert_eq!(channel, PaymentChannel::WalletBWeb);
    }
}
