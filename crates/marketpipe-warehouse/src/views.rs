//! Per-asset materialized views over the candle table.

use ::duckdb::Connection;

use crate::migrations::escape_sql_string;
use crate::WarehouseError;

/// Rebuild the per-asset view `vw_ohlc_<asset_id>`.
///
/// The view is a pure projection of `ohlc_bars` for one asset: recreating it
/// is equivalent to dropping and redefining it, and an asset with no rows
/// yet yields a valid empty view. Returns the view name.
///
/// The identifier is derived only from the charset-validated asset id, with
/// `-` mapped to `_` to form a plain SQL identifier; anything outside the
/// id charset is rejected before any SQL is assembled.
pub fn rebuild_asset_view(
    connection: &Connection,
    asset_id: &str,
) -> Result<String, WarehouseError> {
    let identifier = view_identifier(asset_id)?;
    let view_name = format!("vw_ohlc_{identifier}");

    let sql = format!(
        "CREATE OR REPLACE VIEW {view_name} AS \
         SELECT asset_id, bucket_ts, open, high, low, close \
         FROM ohlc_bars WHERE asset_id = '{filter}' \
         ORDER BY bucket_ts",
        view_name = view_name,
        filter = escape_sql_string(asset_id),
    );
    connection.execute_batch(sql.as_str())?;

    Ok(view_name)
}

fn view_identifier(asset_id: &str) -> Result<String, WarehouseError> {
    if asset_id.is_empty() {
        return Err(WarehouseError::InvalidAssetId {
            value: asset_id.to_owned(),
        });
    }

    let mut identifier = String::with_capacity(asset_id.len());
    for ch in asset_id.chars() {
        match ch {
            'a'..='z' | '0'..='9' | '_' => identifier.push(ch),
            '-' => identifier.push('_'),
            _ => {
                return Err(WarehouseError::InvalidAssetId {
                    value: asset_id.to_owned(),
                })
            }
        }
    }
    Ok(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_hyphens_to_underscores() {
        assert_eq!(
            view_identifier("matic-network").expect("valid id"),
            "matic_network"
        );
    }

    #[test]
    fn rejects_identifiers_outside_the_asset_charset() {
        let err = view_identifier("btc; drop table ohlc_bars").expect_err("must fail");
        assert!(matches!(err, WarehouseError::InvalidAssetId { .. }));
    }

    #[test]
    fn rejects_empty_identifier() {
        assert!(view_identifier("").is_err());
    }
}
