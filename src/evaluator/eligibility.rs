use crate::model::{DiscountQuery, OfferRecord};

/// Whether an offer applies to a query: same bank, minimum met, active,
/// matching instrument when one is asked for, and inside its validity window.
/// An absent bound on the window is open on that side.
pub fn is_eligible(offer: &OfferRecord, query: &DiscountQuery) -> bool {
    if !offer.is_active {
        return false;
    }
    if !offer.bank_name.eq_ignore_ascii_case(query.bank_name.trim()) {
        return false;
    }
    if offer.min_amount > query.amount {
        return false;
    }
    if let Some(instrument) = query.payment_instrument {
        if offer.payment_instrument != instrument {
            return false;
        }
    }
    let started = offer.valid_from.is_none_or(|from| from <= query.now);
    let not_expired = offer.valid_to.is_none_or(|to| to >= query.now);
    started && not_expired
}
