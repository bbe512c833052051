use crate::evaluator::is_eligible;
use crate::model::{DiscountQuery, OfferFilter, OfferRecord, StorageError};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use rust_decimal::Decimal;
use std::str::FromStr;

const OFFER_COLUMNS: &str = "offer_id, title, description, bank_name, payment_instrument,
    min_amount, discount_type, discount_amount, discount_percent, max_discount,
    valid_from, valid_to, is_active";

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database file and creates the schema if needed.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    fn migrate(conn: &Connection) -> Result<(), StorageError> {
        // Money columns are TEXT so decimals round-trip exactly.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS offers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                offer_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                bank_name TEXT NOT NULL,
                payment_instrument TEXT NOT NULL,
                min_amount TEXT NOT NULL DEFAULT '0',
                discount_type TEXT NOT NULL,
                discount_amount TEXT,
                discount_percent TEXT,
                max_discount TEXT,
                valid_from TEXT,
                valid_to TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_offers_bank_instrument
                ON offers (bank_name, payment_instrument);
            CREATE INDEX IF NOT EXISTS idx_offers_discount_type ON offers (discount_type);
            CREATE INDEX IF NOT EXISTS idx_offers_is_active ON offers (is_active);
            ",
        )?;
        Ok(())
    }

    /// Inserts the record unless its `offer_id` is already stored.
    /// Returns the stored row and whether this call created it.
    pub fn find_or_create(&self, offer: &OfferRecord) -> Result<(OfferRecord, bool), StorageError> {
        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO offers ({OFFER_COLUMNS}, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                &offer.offer_id,
                &offer.title,
                &offer.description,
                &offer.bank_name,
                offer.payment_instrument.as_str(),
                offer.min_amount.to_string(),
                offer.discount_type.as_str(),
                offer.discount_amount.map(|d| d.to_string()),
                offer.discount_percent.map(|d| d.to_string()),
                offer.max_discount.map(|d| d.to_string()),
                &offer.valid_from,
                &offer.valid_to,
                offer.is_active,
                Utc::now(),
            ],
        )?;

        let stored = self.find_by_offer_id(&offer.offer_id)?.ok_or_else(|| {
            StorageError::Corrupt(format!("offer {} vanished after insert", offer.offer_id))
        })?;
        Ok((stored, inserted == 1))
    }

    pub fn find_by_offer_id(&self, offer_id: &str) -> Result<Option<OfferRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE offer_id = ?1"))?;
        Ok(stmt.query_row(params![offer_id], Self::map_offer).optional()?)
    }

    /// Candidates for a discount query, in insertion order.
    /// SQL narrows by bank, instrument and active flag; the amount and
    /// validity checks run on the decoded records.
    pub fn query_eligible(&self, query: &DiscountQuery) -> Result<Vec<OfferRecord>, StorageError> {
        let bank = query.bank_name.trim().to_uppercase();
        let instrument = query.payment_instrument.map(|i| i.as_str());

        let mut sql =
            format!("SELECT {OFFER_COLUMNS} FROM offers WHERE bank_name = ?1 AND is_active = 1");
        let mut bind: Vec<&dyn ToSql> = vec![&bank];
        if let Some(instrument) = &instrument {
            sql.push_str(" AND payment_instrument = ?2");
            bind.push(instrument);
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(bind.as_slice(), Self::map_offer)?;

        let mut offers = Vec::new();
        for offer in rows {
            let offer = offer?;
            if is_eligible(&offer, query) {
                offers.push(offer);
            }
        }
        Ok(offers)
    }

    /// All offers matching the filter, newest first.
    pub fn list_all(&self, filter: &OfferFilter) -> Result<Vec<OfferRecord>, StorageError> {
        let bank = filter.bank_name.as_ref().map(|b| b.trim().to_uppercase());
        let instrument = filter.payment_instrument.map(|i| i.as_str());

        let mut sql = format!("SELECT {OFFER_COLUMNS} FROM offers WHERE is_active = ?");
        let mut bind: Vec<&dyn ToSql> = vec![&filter.is_active];
        if let Some(bank) = &bank {
            sql.push_str(" AND bank_name = ?");
            bind.push(bank);
        }
        if let Some(instrument) = &instrument {
            sql.push_str(" AND payment_instrument = ?");
            bind.push(instrument);
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(bind.as_slice(), Self::map_offer)?;
        let mut offers = Vec::new();
        for offer in rows {
            offers.push(offer?);
        }
        Ok(offers)
    }

    fn map_offer(row: &Row) -> Result<OfferRecord, rusqlite::Error> {
        Ok(OfferRecord {
            offer_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            bank_name: row.get(3)?,
            payment_instrument: parse_column(row, 4)?,
            min_amount: parse_column(row, 5)?,
            discount_type: parse_column(row, 6)?,
            discount_amount: parse_optional_column(row, 7)?,
            discount_percent: parse_optional_column(row, 8)?,
            max_discount: parse_optional_column(row, 9)?,
            valid_from: row.get(10)?,
            valid_to: row.get(11)?,
            is_active: row.get(12)?,
        })
    }
}

/// Reads a TEXT column through `FromStr`, reporting bad values as conversion failures.
fn parse_column<T>(row: &Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_column(row: &Row, idx: usize) -> Result<Option<Decimal>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        Decimal::from_str(&value)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscountType, PaymentInstrument};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn record(id: &str, bank: &str, min: Decimal) -> OfferRecord {
        OfferRecord {
            offer_id: id.into(),
            title: format!("{bank} offer {id}"),
            description: "desc".into(),
            bank_name: bank.into(),
            payment_instrument: PaymentInstrument::Credit,
            min_amount: min,
            discount_type: DiscountType::Percentage,
            discount_amount: None,
            discount_percent: Some(dec!(10.5)),
            max_discount: Some(dec!(300)),
            valid_from: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            valid_to: None,
            is_active: true,
        }
    }

    fn query(amount: Decimal, bank: &str) -> DiscountQuery {
        DiscountQuery {
            amount,
            bank_name: bank.into(),
            payment_instrument: None,
            now: Utc::now(),
        }
    }

    #[test]
    fn find_or_create_is_idempotent_by_offer_id() {
        let storage = SqliteStorage::in_memory().unwrap();
        let offer = record("o-1", "HDFC", dec!(1000));

        let (stored, created) = storage.find_or_create(&offer).unwrap();
        assert!(created);
        assert_eq!(stored, offer);

        let changed = OfferRecord {
            title: "something else".into(),
            ..offer.clone()
        };
        let (stored, created) = storage.find_or_create(&changed).unwrap();
        assert!(!created);
        assert_eq!(stored.title, offer.title);
    }

    #[test]
    fn query_eligible_applies_every_filter() {
        let storage = SqliteStorage::in_memory().unwrap();
        let now = Utc::now();
        let offers = vec![
            record("cheap", "HDFC", dec!(100)),
            record("too-high", "HDFC", dec!(9000)),
            record("other-bank", "AXIS", dec!(100)),
            OfferRecord {
                is_active: false,
                ..record("inactive", "HDFC", dec!(100))
            },
            OfferRecord {
                valid_to: Some(now - Duration::hours(1)),
                ..record("expired", "HDFC", dec!(100))
            },
            OfferRecord {
                payment_instrument: PaymentInstrument::Debit,
                ..record("debit", "HDFC", dec!(100))
            },
        ];
        for offer in &offers {
            storage.find_or_create(offer).unwrap();
        }

        let ids: Vec<String> = storage
            .query_eligible(&query(dec!(5000), "hdfc"))
            .unwrap()
            .into_iter()
            .map(|o| o.offer_id)
            .collect();
        assert_eq!(ids, vec!["cheap", "debit"]);

        let debit_only = DiscountQuery {
            payment_instrument: Some(PaymentInstrument::Debit),
            ..query(dec!(5000), "HDFC")
        };
        let ids: Vec<String> = storage
            .query_eligible(&debit_only)
            .unwrap()
            .into_iter()
            .map(|o| o.offer_id)
            .collect();
        assert_eq!(ids, vec!["debit"]);
    }

    #[test]
    fn list_all_filters_and_defaults_to_active() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.find_or_create(&record("a", "HDFC", dec!(0))).unwrap();
        storage.find_or_create(&record("b", "SBI", dec!(0))).unwrap();
        storage
            .find_or_create(&OfferRecord {
                is_active: false,
                ..record("c", "HDFC", dec!(0))
            })
            .unwrap();

        assert_eq!(storage.list_all(&OfferFilter::default()).unwrap().len(), 2);

        let hdfc = storage
            .list_all(&OfferFilter {
                bank_name: Some("hdfc".into()),
                ..OfferFilter::default()
            })
            .unwrap();
        assert_eq!(hdfc.len(), 1);
        assert_eq!(hdfc[0].offer_id, "a");

        let inactive = storage
            .list_all(&OfferFilter {
                is_active: false,
                ..OfferFilter::default()
            })
            .unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].offer_id, "c");
    }
}
