// Core structs: OfferRecord, DiscountQuery, DiscountResult and the error enums
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentInstrument {
    #[default]
    Credit,
    Debit,
    EmiOptions,
}

impl PaymentInstrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentInstrument::Credit => "CREDIT",
            PaymentInstrument::Debit => "DEBIT",
            PaymentInstrument::EmiOptions => "EMI_OPTIONS",
        }
    }
}

impl fmt::Display for PaymentInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentInstrument {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CREDIT" => Ok(PaymentInstrument::Credit),
            "DEBIT" => Ok(PaymentInstrument::Debit),
            "EMI_OPTIONS" | "EMI" => Ok(PaymentInstrument::EmiOptions),
            _ => Err(UnknownVariant::new("payment instrument", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Flat,
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Flat => "FLAT",
            DiscountType::Percentage => "PERCENTAGE",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FLAT" => Ok(DiscountType::Flat),
            "PERCENTAGE" | "PERCENT" => Ok(DiscountType::Percentage),
            _ => Err(UnknownVariant::new("discount type", s)),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Canonical, store-ready bank payment offer.
///
/// Exactly one of `discount_amount` / `discount_percent` is meaningful,
/// selected by `discount_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
    pub offer_id: String,
    pub title: String,
    pub description: String,
    pub bank_name: String,
    pub payment_instrument: PaymentInstrument,
    pub min_amount: Decimal,
    pub discount_type: DiscountType,
    pub discount_amount: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Discount terms pulled out of a raw item, before they are folded into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountInfo {
    pub discount_type: DiscountType,
    pub amount: Option<Decimal>,
    pub percent: Option<Decimal>,
    pub max_discount: Option<Decimal>,
}

/// Why a single raw item did not become a record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SkipReason {
    #[error("offer item is not an object")]
    NotAnObject,
    #[error("no bank name could be derived")]
    MissingBank,
    #[error("no offer id could be derived")]
    MissingId,
    #[error("unrecognised discount type {0:?}")]
    InvalidDiscountType(String),
    #[error("invalid amount in field {0}")]
    InvalidAmount(&'static str),
    #[error("invalid timestamp in field {0}")]
    InvalidTimestamp(&'static str),
}

/// Preconditions the evaluator assumes are already satisfied.
#[derive(Debug, Clone)]
pub struct DiscountQuery {
    pub amount: Decimal,
    pub bank_name: String,
    pub payment_instrument: Option<PaymentInstrument>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestOffer {
    pub id: String,
    pub title: String,
    pub bank_name: String,
    pub payment_instrument: PaymentInstrument,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountResult {
    pub highest_discount_amount: Decimal,
    pub applicable_offers_count: usize,
    pub best_offer: Option<BestOffer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub identified: usize,
    pub newly_created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct OfferFilter {
    pub bank_name: Option<String>,
    pub payment_instrument: Option<PaymentInstrument>,
    pub is_active: bool,
}

impl Default for OfferFilter {
    fn default() -> Self {
        Self {
            bank_name: None,
            payment_instrument: None,
            is_active: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    InvalidResponse(u16),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Client errors raised before a discount query reaches the evaluator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Missing required parameters: amountToPay and bankName are required")]
    MissingParameters,
    #[error("amountToPay must be a positive number")]
    InvalidAmount,
    #[error(transparent)]
    UnknownInstrument(#[from] UnknownVariant),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Missing flipkartOfferApiResponse in request body")]
    MissingPayload,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
