//! Payment, refund and booking statuses.

use serde::{Deserialize, Serialize};

/// Local payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting the processor's decision.
    Pending,
    /// Funds captured.
    Approved,
    /// Declined by the processor.
    Rejected,
    /// Fully returned to the payer.
    Refunded,
    /// Abandoned or expired before capture.
    Cancelled,
}

impl PaymentStatus {
    /// Database and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "refunded" => Some(Self::Refunded),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Maps the processor's status vocabulary onto ours.
    #[must_use]
    pub fn from_processor(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" | "accredited" => Some(Self::Approved),
            "pending" | "in_process" | "authorized" | "in_mediation" => Some(Self::Pending),
            "rejected" => Some(Self::Rejected),
            "cancelled" | "expired" => Some(Self::Cancelled),
            "refunded" | "charged_back" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Whether the state machine allows moving to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Cancelled | Self::Rejected)
                | (Self::Approved, Self::Refunded)
        )
    }

    /// No transition leaves a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Refunded | Self::Cancelled)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of a payment has been returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    /// Nothing refunded.
    #[default]
    None,
    /// Part of the gross amount refunded.
    Partial,
    /// The whole gross amount refunded.
    Refunded,
}

impl RefundStatus {
    /// Database and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Partial => "partial",
            Self::Refunded => "refunded",
        }
    }

    /// Parses a stored refund status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "partial" => Some(Self::Partial),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created, awaiting payment.
    Pending,
    /// Paid and scheduled.
    Confirmed,
    /// Called off.
    Cancelled,
    /// Service delivered.
    Completed,
}

impl BookingStatus {
    /// Database and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Parses a stored booking status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
