//! Ledger read routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use clinipay_core::ledger::{EntryType, LedgerEntry, LedgerFilter};
use clinipay_shared::AppError;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// Creates the ledger routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/ledger/entries", get(list_entries))
}

/// Query parameters for listing entries.
#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    /// `DEBIT` or `CREDIT`, case-insensitive.
    pub entry_type: Option<String>,
    /// Account code.
    pub account_code: Option<String>,
    /// Inclusive lower bound (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339).
    pub to: Option<DateTime<Utc>>,
}

impl TryFrom<LedgerQuery> for LedgerFilter {
    type Error = ApiError;

    fn try_from(query: LedgerQuery) -> Result<Self, Self::Error> {
        let entry_type = query
            .entry_type
            .as_deref()
            .map(|raw| {
                EntryType::parse(raw.trim()).ok_or_else(|| {
                    ApiError::from(AppError::Validation(format!("invalid entry_type '{raw}'")))
                })
            })
            .transpose()?;

        if let (Some(from), Some(to)) = (query.from, query.to)
            && from > to
        {
            return Err(AppError::Validation("from must not be after to".to_string()).into());
        }

        Ok(Self {
            entry_type,
            account_code: query.account_code.filter(|c| !c.is_empty()),
            from: query.from,
            to: query.to,
        })
    }
}

/// Ledger entries response.
#[derive(Debug, Serialize)]
pub struct LedgerEntriesResponse {
    /// Entries, oldest first.
    pub entries: Vec<LedgerEntry>,
}

/// GET `/ledger/entries?entry_type&account_code&from&to`
async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerEntriesResponse>, ApiError> {
    let filter = LedgerFilter::try_from(query)?;
    let entries = state.ledger.list_entries(&filter).await?;
    Ok(Json(LedgerEntriesResponse { entries }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_maps_to_filter() {
        let query = LedgerQuery {
            entry_type: Some("credit".to_string()),
            account_code: Some("revenue-service".to_string()),
            ..LedgerQuery::default()
        };
        let filter = LedgerFilter::try_from(query).unwrap();
        assert_eq!(filter.entry_type, Some(EntryType::Credit));
        assert_eq!(filter.account_code.as_deref(), Some("revenue-service"));
    }

    #[test]
    fn test_unknown_entry_type_is_rejected() {
        let query = LedgerQuery {
            entry_type: Some("refund".to_string()),
            ..LedgerQuery::default()
        };
        assert!(LedgerFilter::try_from(query).is_err());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let now = Utc::now();
        let query = LedgerQuery {
            from: Some(now),
            to: Some(now - chrono::TimeDelta::hours(1)),
            ..LedgerQuery::default()
        };
        assert!(LedgerFilter::try_from(query).is_err());
    }
}
