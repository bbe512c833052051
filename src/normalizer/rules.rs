// Text and field heuristics used to build an offer record.
// Every rule here is a pure function; the fallback order lives in `normalizer::parse_offer`.
use crate::model::{DiscountInfo, DiscountType, PaymentInstrument, SkipReason};
use crate::utils::{decimal_from_value, parse_amount, round_money, squash_text};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Flat amount used when neither the percentage nor the currency pattern matches.
pub const DEFAULT_FLAT_DISCOUNT: Decimal = Decimal::ONE_HUNDRED;

static BANK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(AXIS|HDFC|ICICI|SBI|KOTAK|IDFC|CITI|AMEX|RBL|YES|INDUSIND|BOB|PNB|CANARA)")
        .expect("bank pattern is valid")
});

static PERCENT_WITH_CAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(\d+(?:\.\d+)?)\s*%.*?(?:upto|up to|maximum).*?₹\s*(\d[\d,]*(?:\.\d+)?)")
        .expect("percentage pattern is valid")
});

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"₹\s*(\d[\d,]*(?:\.\d+)?)").expect("currency pattern is valid")
});

static MINIMUM_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)minimum.*?₹\s*(\d[\d,]*(?:\.\d+)?)").expect("minimum pattern is valid")
});

/// Explicit bank field first, then the whitelist pattern over the title, then over the description.
pub fn extract_bank(explicit: Option<&str>, title: &str, description: &str) -> Option<String> {
    if let Some(bank) = explicit.map(str::trim).filter(|b| !b.is_empty()) {
        return Some(bank.to_uppercase());
    }
    [title, description].into_iter().find_map(|text| {
        BANK_PATTERN
            .captures(text)
            .map(|caps| caps[1].to_uppercase())
    })
}

/// Keyword scan wins over the explicit field; CREDIT when nothing says otherwise.
pub fn extract_instrument(text: &str, explicit: Option<&str>) -> PaymentInstrument {
    let text = text.to_lowercase();
    if text.contains("emi") || text.contains("installment") {
        return PaymentInstrument::EmiOptions;
    }
    if text.contains("credit") {
        return PaymentInstrument::Credit;
    }
    if text.contains("debit") {
        return PaymentInstrument::Debit;
    }
    explicit
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

/// Explicit terms when the item carries them, else the text heuristics.
/// A lone `maxDiscount` cannot describe a discount, so it only caps what the text yields.
pub fn discount_terms(item: &Map<String, Value>, text: &str) -> Result<DiscountInfo, SkipReason> {
    if let Some(explicit) = explicit_discount(item) {
        return explicit;
    }

    let mut info = extract_discount(text);
    if let Some(cap) = money_field(item, "maxDiscount")? {
        if info.discount_type == DiscountType::Percentage {
            info.max_discount = Some(cap);
        }
    }
    Ok(info)
}

/// Discount terms carried by the item itself. `None` unless the item names
/// a type, an amount or a percent.
pub fn explicit_discount(
    item: &Map<String, Value>,
) -> Option<Result<DiscountInfo, SkipReason>> {
    let present = |key: &str| item.get(key).is_some_and(|v| !v.is_null());
    if !["discountType", "discountAmount", "discountPercent"]
        .into_iter()
        .any(present)
    {
        return None;
    }
    Some(read_explicit_discount(item))
}

fn read_explicit_discount(item: &Map<String, Value>) -> Result<DiscountInfo, SkipReason> {
    let amount = money_field(item, "discountAmount")?;
    let percent = money_field(item, "discountPercent")?;
    let max_discount = money_field(item, "maxDiscount")?;

    let discount_type = match item.get("discountType") {
        Some(Value::String(raw)) => raw
            .parse()
            .map_err(|_| SkipReason::InvalidDiscountType(raw.clone()))?,
        Some(Value::Null) | None if percent.is_some() => DiscountType::Percentage,
        Some(Value::Null) | None => DiscountType::Flat,
        Some(other) => return Err(SkipReason::InvalidDiscountType(other.to_string())),
    };

    Ok(DiscountInfo {
        discount_type,
        amount,
        percent,
        max_discount,
    })
}

fn money_field(
    item: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<Decimal>, SkipReason> {
    match explicit_money(item.get(key), key)? {
        Some(d) if d < Decimal::ZERO => Err(SkipReason::InvalidAmount(key)),
        other => Ok(other.map(round_money)),
    }
}

/// Present, non-blank field as a decimal; a leading `₹` is allowed on strings.
/// Anything present that does not parse is an error, never a silent miss.
fn explicit_money(value: Option<&Value>, key: &'static str) -> Result<Option<Decimal>, SkipReason> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => parse_amount(s.trim().trim_start_matches('₹')),
        Some(other) => decimal_from_value(other),
    };
    parsed.map(Some).ok_or(SkipReason::InvalidAmount(key))
}

/// Percentage-with-cap, then a currency amount, then the flat default.
pub fn extract_discount(text: &str) -> DiscountInfo {
    if let Some(caps) = PERCENT_WITH_CAP.captures(text) {
        if let (Some(percent), Some(cap)) = (parse_amount(&caps[1]), parse_amount(&caps[2])) {
            return DiscountInfo {
                discount_type: DiscountType::Percentage,
                amount: None,
                percent: Some(round_money(percent)),
                max_discount: Some(round_money(cap)),
            };
        }
    }

    let amount = CURRENCY_AMOUNT
        .captures(text)
        .and_then(|caps| parse_amount(&caps[1]))
        .map(round_money)
        .unwrap_or(DEFAULT_FLAT_DISCOUNT);

    DiscountInfo {
        discount_type: DiscountType::Flat,
        amount: Some(amount),
        percent: None,
        max_discount: None,
    }
}

/// Explicit minimum when it is a positive number, else the "minimum ... ₹N" phrase, else zero.
/// An explicit value that does not parse, or is negative, rejects the item.
pub fn extract_min_amount(explicit: Option<&Value>, text: &str) -> Result<Decimal, SkipReason> {
    if let Some(value) = explicit_money(explicit, "minAmount")? {
        if value < Decimal::ZERO {
            return Err(SkipReason::InvalidAmount("minAmount"));
        }
        if value > Decimal::ZERO {
            return Ok(round_money(value));
        }
    }

    Ok(MINIMUM_AMOUNT
        .captures(text)
        .and_then(|caps| parse_amount(&caps[1]))
        .map(round_money)
        .unwrap_or(Decimal::ZERO))
}

/// Content hash standing in for a missing offer id. Same text in, same id out.
pub fn fingerprint(title: &str, description: &str, bank: &str) -> Option<String> {
    let content = squash_text(&format!("{title}{description}"));
    if content.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(squash_text(bank).as_bytes());
    let digest = hex::encode(hasher.finalize());
    Some(format!("fp-{}", &digest[..16]))
}
