//! EMI (equated monthly installment) math for the listing detail view.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmiQuote {
    pub monthly_payment: f64,
    pub total_payment: f64,
    pub total_interest: f64,
}

/// Standard amortized EMI: `P * r * (1+r)^n / ((1+r)^n - 1)` with `r` the
/// monthly rate. A zero rate degenerates to straight division.
///
/// Returns `None` for a zero principal or tenure, or non-finite inputs.
#[must_use]
pub fn emi_quote(principal: f64, annual_rate_percent: f64, tenure_months: u32) -> Option<EmiQuote> {
    if principal <= 0.0
        || tenure_months == 0
        || !principal.is_finite()
        || !annual_rate_percent.is_finite()
        || annual_rate_percent < 0.0
    {
        return None;
    }

    let n = f64::from(tenure_months);
    let monthly_rate = annual_rate_percent / 12.0 / 100.0;

    let monthly_payment = if monthly_rate == 0.0 {
        principal / n
    } else {
        let factor = (1.0 + monthly_rate).powi(tenure_months.try_into().ok()?);
        principal * monthly_rate * factor / (factor - 1.0)
    };

    if !monthly_payment.is_finite() {
        return None;
    }

    let total_payment = monthly_payment * n;
    Some(EmiQuote {
        monthly_payment,
        total_payment,
        total_interest: total_payment - principal,
    })
}
