use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Amount, Balance};

/// The closed set of balance operations. Each variant maps to exactly one
/// numeric transition in [`apply_operation`]; transfers are orchestrated by
/// the service as a Decrease/Increase pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Increase,
    Decrease,
    Reserve,
    Release,
    CancelReservation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Increase => "increase",
            OperationKind::Decrease => "decrease",
            OperationKind::Reserve => "reserve",
            OperationKind::Release => "release",
            OperationKind::CancelReservation => "cancel_reservation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "increase" => Some(OperationKind::Increase),
            "decrease" => Some(OperationKind::Decrease),
            "reserve" => Some(OperationKind::Reserve),
            "release" => Some(OperationKind::Release),
            "cancel_reservation" => Some(OperationKind::CancelReservation),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post-operation balance figures. The caller decides how to persist them;
/// nothing here touches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceFigures {
    pub authorized: Amount,
    pub actual: Amount,
}

/// Apply an operation to a balance snapshot and compute the new figures.
///
/// Validation order: the amount must be strictly positive, then the
/// kind-specific numeric check runs against the snapshot. Whether the
/// account may be mutated at all (active status) is the caller's check.
///
/// Reserve may not exceed the available headroom (`actual - authorized`).
/// Release settles a hold into a spend: the held amount leaves both
/// figures. CancelReservation only drops the hold; no money moves. Both
/// require the hold to cover the amount. Release additionally requires
/// `actual` to cover the amount, so a balance never goes negative after
/// earlier decreases consumed unreserved funds.
pub fn apply_operation(
    balance: &Balance,
    kind: OperationKind,
    amount: Amount,
) -> Result<BalanceFigures, OperationError> {
    if amount <= Decimal::ZERO {
        return Err(OperationError::InvalidAmount { amount });
    }

    let (authorized, actual) = match kind {
        OperationKind::Increase => (balance.authorized, balance.actual + amount),
        OperationKind::Decrease => {
            if balance.actual < amount {
                return Err(OperationError::InsufficientFunds {
                    available: balance.actual,
                    requested: amount,
                });
            }
            (balance.authorized, balance.actual - amount)
        }
        OperationKind::Reserve => {
            if balance.available() < amount {
                return Err(OperationError::InsufficientFunds {
                    available: balance.available(),
                    requested: amount,
                });
            }
            (balance.authorized + amount, balance.actual)
        }
        OperationKind::Release => {
            if balance.authorized < amount {
                return Err(OperationError::InvalidReleaseAmount {
                    held: balance.authorized,
                    requested: amount,
                });
            }
            if balance.actual < amount {
                return Err(OperationError::InsufficientFunds {
                    available: balance.actual,
                    requested: amount,
                });
            }
            (balance.authorized - amount, balance.actual - amount)
        }
        OperationKind::CancelReservation => {
            if balance.authorized < amount {
                return Err(OperationError::InvalidReleaseAmount {
                    held: balance.authorized,
                    requested: amount,
                });
            }
            (balance.authorized - amount, balance.actual)
        }
    };

    Ok(BalanceFigures { authorized, actual })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Amounts must be strictly positive.
    InvalidAmount { amount: Amount },
    /// Decrease, Reserve or Release exceeds what the balance can cover.
    InsufficientFunds { available: Amount, requested: Amount },
    /// Release or CancelReservation exceeds the currently held amount.
    InvalidReleaseAmount { held: Amount, requested: Amount },
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationError::InvalidAmount { amount } => {
                write!(f, "Amount must be positive, got {}", amount)
            }
            OperationError::InsufficientFunds {
                available,
                requested,
            } => {
                write!(
                    f,
                    "Insufficient funds: available {}, requested {}",
                    available, requested
                )
            }
            OperationError::InvalidReleaseAmount { held, requested } => {
                write!(
                    f,
                    "Release exceeds held amount: held {}, requested {}",
                    held, requested
                )
            }
        }
    }
}

impl std::error::Error for OperationError {}
