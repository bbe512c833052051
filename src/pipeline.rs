// Orchestration: ingestion (normalize + upsert) and discount queries against the store.
use crate::evaluator::Evaluator;
use crate::model::{
    DiscountQuery, DiscountResult, IngestError, IngestReport, OfferFilter, OfferRecord,
    PaymentInstrument, QueryError, StorageError,
};
use crate::normalizer::normalize;
use crate::storage::SqliteStorage;
use crate::utils::parse_amount;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Vendors sometimes wrap the payload in this field.
const WRAPPER_FIELD: &str = "flipkartOfferApiResponse";

/// Raw discount query parameters as they arrive from the caller.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub amount_to_pay: Option<String>,
    pub bank_name: Option<String>,
    pub payment_instrument: Option<String>,
}

/// Validates caller input into a query the evaluator can trust.
pub fn build_query(params: &QueryParams, now: DateTime<Utc>) -> Result<DiscountQuery, QueryError> {
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let (Some(amount), Some(bank_name)) = (
        non_blank(&params.amount_to_pay),
        non_blank(&params.bank_name),
    ) else {
        return Err(QueryError::MissingParameters);
    };

    let amount = parse_amount(&amount)
        .filter(|a| *a > Decimal::ZERO)
        .ok_or(QueryError::InvalidAmount)?;

    let payment_instrument = non_blank(&params.payment_instrument)
        .map(|raw| raw.parse::<PaymentInstrument>())
        .transpose()?;

    Ok(DiscountQuery {
        amount,
        bank_name: bank_name.to_uppercase(),
        payment_instrument,
        now,
    })
}

/// Takes the payload out of the request body, unwrapping the vendor envelope if present.
pub fn extract_payload(body: &Value) -> Result<&Value, IngestError> {
    let payload = match body.get(WRAPPER_FIELD) {
        Some(inner) => inner,
        None => body,
    };
    if payload.is_null() {
        return Err(IngestError::MissingPayload);
    }
    Ok(payload)
}

/// Normalizes one payload and upserts every record concurrently by `offer_id`.
pub async fn ingest(
    body: &Value,
    storage: Arc<Mutex<SqliteStorage>>,
) -> Result<IngestReport, IngestError> {
    let payload = extract_payload(body)?;
    let normalized = normalize(payload);

    let mut report = IngestReport {
        identified: normalized.offers.len(),
        newly_created: 0,
        skipped: normalized.skipped.len(),
    };

    if normalized.offers.is_empty() {
        warn!("No offers found in the provided payload");
        return Ok(report);
    }

    let writes = normalized.offers.iter().map(|offer| {
        let storage = storage.clone();
        async move { storage.lock().await.find_or_create(offer) }
    });

    let mut first_error = None;
    for outcome in join_all(writes).await {
        match outcome {
            Ok((_, true)) => report.newly_created += 1,
            Ok((_, false)) => {}
            Err(e) => {
                warn!("Offer upsert failed: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e.into());
    }

    info!(
        "Ingested {} offers, {} new, {} skipped",
        report.identified, report.newly_created, report.skipped
    );
    Ok(report)
}

/// Loads the eligible candidates for a query and picks the best discount.
pub async fn best_discount<E: Evaluator>(
    query: &DiscountQuery,
    storage: Arc<Mutex<SqliteStorage>>,
    evaluator: &E,
) -> Result<DiscountResult, StorageError> {
    let candidates = storage.lock().await.query_eligible(query)?;
    info!(
        "{} candidate offers for {} at {}",
        candidates.len(),
        query.bank_name,
        query.amount
    );
    Ok(evaluator.evaluate(query, &candidates))
}

pub async fn list_offers(
    filter: &OfferFilter,
    storage: Arc<Mutex<SqliteStorage>>,
) -> Result<Vec<OfferRecord>, StorageError> {
    storage.lock().await.list_all(filter)
}
