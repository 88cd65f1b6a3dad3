//! The closed action vocabulary understood by the host application.
//!
//! Remote replies carry a free-form `{ action, params }` pair; it is turned
//! into a [`KioskAction`] exactly once, by [`KioskAction::from_wire`].
//! Anything unrecognised becomes [`KioskAction::None`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Screens the host application can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Home,
    ElectricityBill,
    WaterBill,
    GasBill,
    PropertyTax,
    Complaint,
    ComplaintStatus,
    Services,
    Payment,
    Receipt,
    Unknown,
}

impl Screen {
    /// Resolve a screen from a loosely formatted name
    /// (`"electricity_bill"`, `"electricity-bill-screen"`, `"ElectricityBill"`).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let key = squash(name);
        let key = key.strip_suffix("screen").unwrap_or(&key);
        match key {
            "home" | "main" | "menu" => Self::Home,
            "electricitybill" | "electricity" | "power" | "powerbill" => Self::ElectricityBill,
            "waterbill" | "water" => Self::WaterBill,
            "gasbill" | "gas" => Self::GasBill,
            "propertytax" | "tax" => Self::PropertyTax,
            "complaint" | "newcomplaint" | "filecomplaint" => Self::Complaint,
            "complaintstatus" | "trackcomplaint" => Self::ComplaintStatus,
            "services" | "governmentservices" => Self::Services,
            "payment" | "pay" => Self::Payment,
            "receipt" => Self::Receipt,
            _ => Self::Unknown,
        }
    }
}

/// Payment methods offered on the payment screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Upi,
    Card,
    Cash,
    NetBanking,
    Wallet,
    Unknown,
}

impl PaymentMethod {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match squash(name).as_str() {
            "upi" | "qr" | "qrcode" => Self::Upi,
            "card" | "debitcard" | "creditcard" => Self::Card,
            "cash" => Self::Cash,
            "netbanking" | "bank" => Self::NetBanking,
            "wallet" => Self::Wallet,
            _ => Self::Unknown,
        }
    }
}

/// Answer to a yes/no confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
}

/// An action the host application performs after a reply has been spoken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KioskAction {
    /// Switch to a named screen.
    Navigate { screen: Screen },
    /// Answer the confirmation currently on screen.
    Confirm { answer: Answer },
    /// Pick a payment method on the payment screen.
    PaymentMethodSelected { method: PaymentMethod },
    /// Look up bill details, optionally for a spoken consumer number.
    FetchRequested {
        #[serde(rename = "consumerId")]
        consumer_id: Option<String>,
    },
    /// Return to the previous screen.
    GoBack,
    /// End the voice session.
    StopSession,
    /// Nothing to do.
    #[default]
    None,
}

impl KioskAction {
    /// Convert a remote `{ action, params }` pair into the closed vocabulary.
    #[must_use]
    pub fn from_wire(action: &str, params: &Value) -> Self {
        match squash(action).as_str() {
            "navigate" | "navigateto" | "openscreen" | "goto" => {
                match param_str(params, &["screen", "target", "page"]).map(Screen::from_name) {
                    Some(Screen::Unknown) | None => Self::None,
                    Some(screen) => Self::Navigate { screen },
                }
            }
            "confirmyes" | "yes" => Self::Confirm { answer: Answer::Yes },
            "confirmno" | "no" => Self::Confirm { answer: Answer::No },
            "confirm" => match params.get("answer") {
                Some(Value::Bool(true)) => Self::Confirm { answer: Answer::Yes },
                Some(Value::Bool(false)) => Self::Confirm { answer: Answer::No },
                Some(Value::String(s)) if squash(s) == "yes" => Self::Confirm { answer: Answer::Yes },
                Some(Value::String(s)) if squash(s) == "no" => Self::Confirm { answer: Answer::No },
                _ => Self::None,
            },
            "paymentmethodselected" | "selectpaymentmethod" | "paymentmethod" => {
                match param_str(params, &["method", "paymentMethod"]).map(PaymentMethod::from_name) {
                    Some(PaymentMethod::Unknown) | None => Self::None,
                    Some(method) => Self::PaymentMethodSelected { method },
                }
            }
            "fetchrequested" | "fetch" | "fetchbill" => Self::FetchRequested {
                consumer_id: param_str(params, &["consumerId", "consumer_id", "accountNumber"])
                    .map(str::to_owned),
            },
            "goback" | "back" => Self::GoBack,
            "stopsession" | "stop" | "endsession" => Self::StopSession,
            _ => Self::None,
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Confirm { .. } => "confirm",
            Self::PaymentMethodSelected { .. } => "payment_method_selected",
            Self::FetchRequested { .. } => "fetch_requested",
            Self::GoBack => "go_back",
            Self::StopSession => "stop_session",
            Self::None => "none",
        }
    }
}

/// Lower-case and drop everything that is not alphanumeric.
fn squash(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn param_str<'a>(params: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| params.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}
