// Normalizer module: turns one raw vendor payload into canonical offer records.

pub mod rules;

use crate::model::{OfferRecord, SkipReason};
use crate::utils::{datetime_from_value, round_money};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

const DEFAULT_TITLE: &str = "Bank Offer";

/// Records built from one payload plus the reasons for every item left out.
#[derive(Debug, Default)]
pub struct Normalized {
    pub offers: Vec<OfferRecord>,
    pub skipped: Vec<SkipReason>,
}

impl Normalized {
    fn push(&mut self, outcome: Result<OfferRecord, SkipReason>) {
        match outcome {
            Ok(offer) => self.offers.push(offer),
            Err(reason) => {
                debug!("Skipping offer item: {}", reason);
                self.skipped.push(reason);
            }
        }
    }

    fn extend_from(&mut self, items: &[Value], bank_override: Option<&str>) {
        for item in items {
            self.push(parse_offer(item, bank_override));
        }
    }
}

/// Walks every supported payload shape and concatenates the results:
/// a top-level `offers` list, a nested `data.offers` list, and a `bankOffers`
/// map whose keys name the bank. Duplicates across shapes are kept.
pub fn normalize(payload: &Value) -> Normalized {
    let mut result = Normalized::default();

    let Some(root) = payload.as_object() else {
        warn!("Payload is not an object, nothing to normalize");
        return result;
    };

    if let Some(items) = root.get("offers").and_then(Value::as_array) {
        result.extend_from(items, None);
    }

    if let Some(items) = root
        .get("data")
        .and_then(|data| data.get("offers"))
        .and_then(Value::as_array)
    {
        result.extend_from(items, None);
    }

    if let Some(banks) = root.get("bankOffers").and_then(Value::as_object) {
        for (bank, items) in banks {
            match items.as_array() {
                Some(items) => result.extend_from(items, Some(bank)),
                None => debug!("bankOffers[{}] is not a list, ignoring", bank),
            }
        }
    }

    info!(
        "Normalized {} offers ({} skipped)",
        result.offers.len(),
        result.skipped.len()
    );
    result
}

/// Builds one record from one raw item. `bank_override` is the key of a bank-keyed map
/// and beats any bank named inside the item.
pub fn parse_offer(item: &Value, bank_override: Option<&str>) -> Result<OfferRecord, SkipReason> {
    let obj = item.as_object().ok_or(SkipReason::NotAnObject)?;

    let raw_title = text_field(obj, "title");
    let raw_description = text_field(obj, "description");

    let bank_name = bank_override
        .map(str::trim)
        .filter(|bank| !bank.is_empty())
        .map(str::to_uppercase)
        .or_else(|| {
            rules::extract_bank(
                text_field(obj, "bankName").or_else(|| text_field(obj, "bank")),
                raw_title.unwrap_or_default(),
                raw_description.unwrap_or_default(),
            )
        })
        .ok_or(SkipReason::MissingBank)?;

    let offer_id = explicit_id(obj)
        .or_else(|| {
            rules::fingerprint(
                raw_title.unwrap_or_default(),
                raw_description.unwrap_or_default(),
                &bank_name,
            )
        })
        .ok_or(SkipReason::MissingId)?;

    let text = format!(
        "{} {}",
        raw_title.unwrap_or_default(),
        raw_description.unwrap_or_default()
    );

    let payment_instrument =
        rules::extract_instrument(&text, text_field(obj, "paymentInstrument"));

    let discount = rules::discount_terms(obj, &text)?;

    let min_amount = rules::extract_min_amount(obj.get("minAmount"), &text)?;

    let title = raw_title
        .or_else(|| text_field(obj, "summary"))
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    let description = raw_description
        .or_else(|| text_field(obj, "details"))
        .or(raw_title)
        .unwrap_or_default()
        .to_string();

    Ok(OfferRecord {
        offer_id,
        title,
        description,
        bank_name,
        payment_instrument,
        min_amount: round_money(min_amount),
        discount_type: discount.discount_type,
        discount_amount: discount.amount,
        discount_percent: discount.percent,
        max_discount: discount.max_discount,
        valid_from: timestamp_field(obj, "validFrom")?,
        valid_to: timestamp_field(obj, "validTo")?,
        is_active: obj.get("isActive").and_then(Value::as_bool) != Some(false),
    })
}

/// Non-blank string field.
fn text_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Natural id from `id` or `offerId`, as a string or a number.
fn explicit_id(obj: &Map<String, Value>) -> Option<String> {
    ["id", "offerId"].into_iter().find_map(|key| match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn timestamp_field(
    obj: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<DateTime<Utc>>, SkipReason> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => datetime_from_value(value)
            .map(Some)
            .ok_or(SkipReason::InvalidTimestamp(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::discount::compute_discount;
    use crate::model::{DiscountType, PaymentInstrument};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn normalize_payload(payload: &Value) -> Vec<OfferRecord> {
        normalize(payload).offers
    }

    #[test]
    fn all_three_shapes_are_collected() {
        let payload = json!({
            "offers": [
                { "id": "top-1", "title": "HDFC Flat ₹200 off" }
            ],
            "data": {
                "offers": [
                    { "id": "nested-1", "bankName": "icici", "title": "10% off up to ₹500" }
                ]
            },
            "bankOffers": {
                "axis": [
                    { "id": "map-1", "title": "Flat ₹75 cashback" },
                    { "id": "map-2", "title": "Extra ₹50 off" }
                ]
            }
        });

        let offers = normalize_payload(&payload);
        let ids: Vec<&str> = offers.iter().map(|o| o.offer_id.as_str()).collect();
        assert_eq!(ids, vec!["top-1", "nested-1", "map-1", "map-2"]);
        assert_eq!(offers[1].bank_name, "ICICI");
        assert_eq!(offers[2].bank_name, "AXIS");
    }

    #[test]
    fn duplicates_across_shapes_are_kept() {
        let item = json!({ "id": "dup", "bank": "SBI", "title": "Flat ₹10 off" });
        let payload = json!({ "offers": [item.clone()], "data": { "offers": [item] } });
        assert_eq!(normalize_payload(&payload).len(), 2);
    }

    #[test]
    fn map_key_overrides_bank_in_text() {
        let payload = json!({
            "bankOffers": {
                "kotak": [{ "title": "HDFC lookalike offer", "bankName": "HDFC" }]
            }
        });
        let offers = normalize_payload(&payload);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].bank_name, "KOTAK");
    }

    #[test]
    fn items_without_bank_are_rejected() {
        let result = normalize(&json!({
            "offers": [
                { "id": "x1", "title": "Flat ₹150 off" },
                { "title": "", "description": "" },
                "not an object",
                { "id": "ok", "title": "SBI Flat ₹150 off" }
            ]
        }));
        assert_eq!(result.offers.len(), 1);
        assert_eq!(
            result.skipped,
            vec![
                SkipReason::MissingBank,
                SkipReason::MissingBank,
                SkipReason::NotAnObject
            ]
        );
    }

    #[test]
    fn item_with_bank_but_no_text_or_id_is_rejected() {
        assert_eq!(
            parse_offer(&json!({ "bankName": "HDFC" }), None),
            Err(SkipReason::MissingId)
        );
    }

    #[test]
    fn non_object_payload_yields_nothing() {
        assert!(normalize_payload(&json!([1, 2, 3])).is_empty());
        assert!(normalize_payload(&Value::Null).is_empty());
        assert!(normalize_payload(&json!({ "offers": "oops" })).is_empty());
    }

    #[test]
    fn fingerprint_ids_are_idempotent() {
        let payload = json!({
            "offers": [
                { "title": "HDFC 10% off up to ₹500", "description": "On credit cards" },
                { "title": "AXIS Flat ₹100 off" }
            ]
        });
        let first: Vec<String> = normalize_payload(&payload)
            .into_iter()
            .map(|o| o.offer_id)
            .collect();
        let second: Vec<String> = normalize_payload(&payload)
            .into_iter()
            .map(|o| o.offer_id)
            .collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn explicit_fields_bypass_text_heuristics() {
        let offer = parse_offer(
            &json!({
                "offerId": 42,
                "bank": "hdfc",
                "title": "Flat ₹150 off on minimum ₹999",
                "discountType": "PERCENTAGE",
                "discountPercent": 10,
                "maxDiscount": 300,
                "minAmount": 2000,
                "paymentInstrument": "DEBIT",
                "validFrom": "2025-01-01",
                "validTo": "2025-12-31T23:59:59Z",
                "isActive": false
            }),
            None,
        )
        .unwrap();

        assert_eq!(offer.offer_id, "42");
        assert_eq!(offer.bank_name, "HDFC");
        assert_eq!(offer.discount_type, DiscountType::Percentage);
        assert_eq!(offer.discount_percent, Some(dec!(10)));
        assert_eq!(offer.max_discount, Some(dec!(300)));
        assert_eq!(offer.discount_amount, None);
        assert_eq!(offer.min_amount, dec!(2000));
        assert_eq!(offer.payment_instrument, PaymentInstrument::Debit);
        assert_eq!(
            offer.valid_from,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            offer.valid_to,
            Some(Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap())
        );
        assert!(!offer.is_active);
    }

    #[test]
    fn text_heuristics_fill_in_missing_fields() {
        let offer = parse_offer(
            &json!({
                "summary": "ignored when title exists",
                "title": "10% off up to ₹500 on orders",
                "description": "Valid on SBI Debit Cards for a minimum spend of ₹2,500"
            }),
            None,
        )
        .unwrap();

        assert_eq!(offer.bank_name, "SBI");
        assert_eq!(offer.payment_instrument, PaymentInstrument::Debit);
        assert_eq!(offer.discount_type, DiscountType::Percentage);
        assert_eq!(offer.discount_percent, Some(dec!(10)));
        assert_eq!(offer.max_discount, Some(dec!(500)));
        assert_eq!(offer.min_amount, dec!(2500));
        assert!(offer.offer_id.starts_with("fp-"));
        assert!(offer.is_active);
        assert_eq!(offer.valid_from, None);
        assert_eq!(offer.valid_to, None);
    }

    #[test]
    fn flat_and_default_discounts_from_text() {
        let flat =
            parse_offer(&json!({ "bank": "RBL", "title": "Flat ₹150 off" }), None).unwrap();
        assert_eq!(flat.discount_type, DiscountType::Flat);
        assert_eq!(flat.discount_amount, Some(dec!(150)));
        assert_eq!(flat.min_amount, Decimal::ZERO);

        let fallback =
            parse_offer(&json!({ "bank": "RBL", "title": "Cashback on cards" }), None).unwrap();
        assert_eq!(fallback.discount_type, DiscountType::Flat);
        assert_eq!(fallback.discount_amount, Some(dec!(100)));
    }

    #[test]
    fn title_and_description_fallbacks() {
        let offer = parse_offer(&json!({ "id": "a", "bank": "PNB", "summary": "PNB deal" }), None)
            .unwrap();
        assert_eq!(offer.title, "PNB deal");
        assert_eq!(offer.description, "");

        let offer = parse_offer(&json!({ "id": "b", "bank": "PNB" }), None).unwrap();
        assert_eq!(offer.title, "Bank Offer");

        let offer = parse_offer(&json!({ "id": "c", "bank": "PNB", "title": "Only title" }), None)
            .unwrap();
        assert_eq!(offer.description, "Only title");
    }

    #[test]
    fn malformed_fields_skip_only_that_item() {
        let result = normalize(&json!({
            "offers": [
                { "id": "bad-date", "bank": "BOB", "validTo": "someday" },
                { "id": "bad-type", "bank": "BOB", "discountType": "BOGO" },
                { "id": "fine", "bank": "BOB" }
            ]
        }));
        assert_eq!(result.offers.len(), 1);
        assert_eq!(result.offers[0].offer_id, "fine");
        assert_eq!(
            result.skipped,
            vec![
                SkipReason::InvalidTimestamp("validTo"),
                SkipReason::InvalidDiscountType("BOGO".into())
            ]
        );
    }

    #[test]
    fn lone_max_discount_caps_the_text_percentage() {
        let offer = parse_offer(
            &json!({ "bank": "HDFC", "title": "10% off up to ₹500", "maxDiscount": 400 }),
            None,
        )
        .unwrap();
        assert_eq!(offer.discount_type, DiscountType::Percentage);
        assert_eq!(offer.discount_percent, Some(dec!(10)));
        assert_eq!(offer.max_discount, Some(dec!(400)));
        assert_eq!(compute_discount(&offer, dec!(5000)), dec!(400));
    }

    #[test]
    fn unreadable_min_amount_skips_the_item() {
        let result = normalize(&json!({
            "offers": [
                { "id": "words", "bank": "ICICI", "minAmount": "abc" },
                { "id": "flag", "bank": "ICICI", "minAmount": true },
                { "id": "rupees", "bank": "ICICI", "minAmount": "₹5,000" }
            ]
        }));
        assert_eq!(result.offers.len(), 1);
        assert_eq!(result.offers[0].offer_id, "rupees");
        assert_eq!(result.offers[0].min_amount, dec!(5000));
        assert_eq!(
            result.skipped,
            vec![
                SkipReason::InvalidAmount("minAmount"),
                SkipReason::InvalidAmount("minAmount")
            ]
        );
    }
}
