use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::{
    config::CollectionConfig,
    error::OraError,
    models::{
        api::{OrasQuery, OrasResponse, Pagination},
        ora::Ora,
    },
    services::{ens::is_hex_address, ownership::PageOptions},
    AppState,
};

const SUMMARY_LIMIT: usize = 10;
const MAX_LIMIT: i64 = 100;
const ORAS_CACHE_CONTROL: &str = "public, s-maxage=30, stale-while-revalidate=300";

/// Handler for GET /api/oras
/// Stateless: resolves the input and returns one normalized page
pub async fn get_oras(
    State(state): State<AppState>,
    Query(query): Query<OrasQuery>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, OraError> {
    // `wallet` is the legacy name of `address`
    let input = [query.address.as_deref(), query.wallet.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .ok_or_else(|| {
            OraError::InvalidInput("Please provide a wallet address or ENS name".to_string())
        })?;

    let summary = match query.format.as_deref() {
        None | Some("detailed") => false,
        Some("summary") => true,
        Some(other) => {
            return Err(OraError::InvalidInput(format!(
                "format must be 'detailed' or 'summary', got '{}'",
                other
            )));
        }
    };
    let include_traits = query.include_traits.unwrap_or(true);
    let cursor = query.cursor.as_deref().filter(|c| !c.is_empty());
    let limit = query.limit.map(|n| n.clamp(1, MAX_LIMIT) as u32);
    let contracts = token_overrides(&params)?;
    let slug = match query.collection.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(slug) => Some(known_slug(state.loader.collection(), slug)?),
    };

    tracing::info!("Fetching oras for {} (cursor: {:?})", input, cursor);

    let resolved = state.loader.resolve(input).await?;
    let options = PageOptions {
        slug,
        contracts: (!contracts.is_empty()).then_some(contracts.as_slice()),
        limit,
    };
    let page = state
        .loader
        .load_page_with(&resolved.address, cursor, options)
        .await?;

    let oras = shape_oras(page.oras, summary, include_traits);

    tracing::info!("Returning {} oras for {}", oras.len(), resolved.address);

    let body = OrasResponse {
        oras,
        resolved_from: resolved.source_label,
        resolved_address: resolved.address,
        pagination: Pagination {
            cursor: page.next_cursor,
            page_size: limit.unwrap_or_else(|| state.loader.page_size()),
            collection: page.collection_slug,
        },
        report: page.report,
    };

    Ok(([(header::CACHE_CONTROL, ORAS_CACHE_CONTROL)], Json(body)))
}

/// Repeated `token` params replace the contract allowlist for one call
fn token_overrides(params: &[(String, String)]) -> Result<Vec<String>, OraError> {
    params
        .iter()
        .filter(|(key, _)| key == "token")
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| {
            if is_hex_address(value) {
                Ok(value.to_lowercase())
            } else {
                Err(OraError::InvalidInput(format!(
                    "token must be a contract address, got '{}'",
                    value
                )))
            }
        })
        .collect()
}

fn known_slug<'a>(collection: &'a CollectionConfig, slug: &str) -> Result<&'a str, OraError> {
    std::iter::once(&collection.slug)
        .chain(&collection.alternate_slugs)
        .find(|known| known.as_str() == slug)
        .map(String::as_str)
        .ok_or_else(|| OraError::InvalidInput(format!("Unknown collection '{}'", slug)))
}

fn shape_oras(mut oras: Vec<Ora>, summary: bool, include_traits: bool) -> Vec<Ora> {
    if summary {
        oras.truncate(SUMMARY_LIMIT);
    }
    if !include_traits {
        for ora in &mut oras {
            ora.traits.clear();
        }
    }
    oras
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn oras(n: usize) -> Vec<Ora> {
        (0..n)
            .map(|i| {
                let id = i.to_string();
                Ora::new(
                    "0xd564c25b760cb278a55bdd98831f4ff4b6c97b38",
                    &id,
                    id.clone(),
                    format!("Ora #{}", id),
                    String::new(),
                    BTreeMap::from([("Hat".to_string(), "Cap".to_string())]),
                )
            })
            .collect()
    }

    #[test]
    fn test_summary_truncates_to_ten() {
        assert_eq!(shape_oras(oras(25), true, true).len(), 10);
        assert_eq!(shape_oras(oras(25), false, true).len(), 25);
        assert_eq!(shape_oras(oras(3), true, true).len(), 3);
    }

    #[test]
    fn test_token_overrides() {
        let params = vec![
            ("token".to_string(), "0xAbC0000000000000000000000000000000000001".to_string()),
            ("address".to_string(), "vitalik.eth".to_string()),
            ("token".to_string(), " ".to_string()),
        ];
        assert_eq!(
            token_overrides(&params).unwrap(),
            vec!["0xabc0000000000000000000000000000000000001"]
        );

        let bad = vec![("token".to_string(), "sugartown".to_string())];
        assert!(matches!(token_overrides(&bad), Err(OraError::InvalidInput(_))));
    }

    #[test]
    fn test_known_slug() {
        let collection = CollectionConfig::default();
        assert_eq!(known_slug(&collection, "sugartown-ora").unwrap(), "sugartown-ora");
        assert!(known_slug(&collection, "cryptopunks").is_err());
    }

    #[test]
    fn test_exclude_traits() {
        let shaped = shape_oras(oras(2), false, false);
        assert!(shaped.iter().all(|o| o.traits.is_empty()));
        assert_eq!(shaped[1].name, "Ora #1");
    }
}
