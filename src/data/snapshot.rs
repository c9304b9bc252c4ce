use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Invalid spot price on {date}: {price}")]
    InvalidSpotPrice { date: NaiveDate, price: f64 },
    #[error("Invalid futures price on {date}: {price}")]
    InvalidFuturesPrice { date: NaiveDate, price: f64 },
    #[error("Invalid ETF quote on {date}: price {price:?}, nav {nav:?}")]
    InvalidEtfQuote {
        date: NaiveDate,
        price: Option<f64>,
        nav: Option<f64>,
    },
    #[error("Out-of-order date {date}: previous accepted date is {previous}")]
    OutOfOrder { date: NaiveDate, previous: NaiveDate },
}

//raw observation as supplied by a loader, not yet validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub date: NaiveDate,
    pub spot_price: f64,
    pub futures_price: f64,
    pub futures_expiry: NaiveDate,
    #[serde(default)]
    pub etf_price: Option<f64>,
    #[serde(default)]
    pub etf_nav: Option<f64>,
}

impl SnapshotRecord {
    pub fn new(
        date: NaiveDate,
        spot_price: f64,
        futures_price: f64,
        futures_expiry: NaiveDate,
    ) -> Self {
        SnapshotRecord {
            date,
            spot_price,
            futures_price,
            futures_expiry,
            etf_price: None,
            etf_nav: None,
        }
    }

    pub fn with_etf(mut self, etf_price: f64, etf_nav: f64) -> Self {
        self.etf_price = Some(etf_price);
        self.etf_nav = Some(etf_nav);
        self
    }
}

//a validated spot/futures observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub spot_price: f64,
    pub futures_price: f64,
    pub futures_expiry: NaiveDate,
    pub etf_price: Option<f64>,
    pub etf_nav: Option<f64>,
}

impl MarketSnapshot {
    //validates a raw record
    pub fn new(record: SnapshotRecord) -> Result<Self, SnapshotError> {
        let date = record.date;

        if !is_positive_price(record.spot_price) {
            return Err(SnapshotError::InvalidSpotPrice {
                date,
                price: record.spot_price,
            });
        }

        if !is_positive_price(record.futures_price) {
            return Err(SnapshotError::InvalidFuturesPrice {
                date,
                price: record.futures_price,
            });
        }

        //etf quote is optional but must be whole and positive when present
        let etf_ok = match (record.etf_price, record.etf_nav) {
            (None, None) => true,
            (Some(price), Some(nav)) => is_positive_price(price) && is_positive_price(nav),
            _ => false,
        };
        if !etf_ok {
            return Err(SnapshotError::InvalidEtfQuote {
                date,
                price: record.etf_price,
                nav: record.etf_nav,
            });
        }

        Ok(MarketSnapshot {
            date,
            spot_price: record.spot_price,
            futures_price: record.futures_price,
            futures_expiry: record.futures_expiry,
            etf_price: record.etf_price,
            etf_nav: record.etf_nav,
        })
    }

    //validates a raw record that must come strictly after the previous accepted date
    pub fn after(record: SnapshotRecord, previous: Option<NaiveDate>) -> Result<Self, SnapshotError> {
        if let Some(previous) = previous {
            if record.date <= previous {
                return Err(SnapshotError::OutOfOrder {
                    date: record.date,
                    previous,
                });
            }
        }
        MarketSnapshot::new(record)
    }

    //same observation quoted against a different contract expiry
    pub fn with_expiry(&self, futures_expiry: NaiveDate) -> Self {
        MarketSnapshot {
            futures_expiry,
            ..self.clone()
        }
    }

    //etf premium (positive) or discount (negative) to nav
    pub fn etf_discount_premium(&self) -> Option<f64> {
        match (self.etf_price, self.etf_nav) {
            (Some(price), Some(nav)) => Some((price - nav) / nav),
            _ => None,
        }
    }
}

fn is_positive_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}
