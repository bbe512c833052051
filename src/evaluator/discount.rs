use crate::model::{BestOffer, DiscountQuery, DiscountResult, DiscountType, OfferRecord};
use crate::utils::round_money;
use rust_decimal::Decimal;
use tracing::{debug, warn};

pub const NO_APPLICABLE_OFFERS: &str = "No applicable offers found for the given criteria";

/// Trait defining the interface for a discount evaluator.
pub trait Evaluator {
    /// Picks the best discount among candidates that already passed the eligibility filter.
    fn evaluate(&self, query: &DiscountQuery, candidates: &[OfferRecord]) -> DiscountResult;
}

/// Implementation of the discount evaluator.
pub struct EvaluatorImpl;

impl EvaluatorImpl {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for EvaluatorImpl {
    fn evaluate(&self, query: &DiscountQuery, candidates: &[OfferRecord]) -> DiscountResult {
        if candidates.is_empty() {
            return DiscountResult {
                highest_discount_amount: Decimal::ZERO,
                applicable_offers_count: 0,
                best_offer: None,
                message: Some(NO_APPLICABLE_OFFERS.to_string()),
            };
        }

        let best = select_best(candidates, query.amount);
        let highest = best.map(|(_, discount)| discount).unwrap_or(Decimal::ZERO);

        DiscountResult {
            highest_discount_amount: round_money(highest),
            applicable_offers_count: candidates.len(),
            best_offer: best.map(|(offer, _)| BestOffer {
                id: offer.offer_id.clone(),
                title: offer.title.clone(),
                bank_name: offer.bank_name.clone(),
                payment_instrument: offer.payment_instrument,
            }),
            message: None,
        }
    }
}

/// Discount one offer gives on `amount`. Never negative and never fails:
/// arithmetic that overflows counts as no discount.
pub fn compute_discount(offer: &OfferRecord, amount: Decimal) -> Decimal {
    let discount = match offer.discount_type {
        DiscountType::Flat => offer.discount_amount.unwrap_or(Decimal::ZERO),
        DiscountType::Percentage => {
            let percent = offer.discount_percent.unwrap_or(Decimal::ZERO);
            let Some(raw) = amount
                .checked_mul(percent)
                .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            else {
                warn!(
                    "Discount calculation overflowed for offer {}, counting it as 0",
                    offer.offer_id
                );
                return Decimal::ZERO;
            };
            match offer.max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
    };
    discount.max(Decimal::ZERO)
}

/// Strict-greatest-wins scan. Ties keep the earlier candidate, and an offer
/// worth nothing never becomes the best.
pub fn select_best(candidates: &[OfferRecord], amount: Decimal) -> Option<(&OfferRecord, Decimal)> {
    let mut best: Option<(&OfferRecord, Decimal)> = None;
    let mut highest = Decimal::ZERO;

    for offer in candidates {
        let discount = compute_discount(offer, amount);
        debug!("Offer {} gives {}", offer.offer_id, discount);
        if discount > highest {
            highest = discount;
            best = Some((offer, discount));
        }
    }

    best
}
