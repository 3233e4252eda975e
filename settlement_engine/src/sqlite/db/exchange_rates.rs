use sqlx::SqliteConnection;

use crate::{db_types::ExchangeRate, traits::ExchangeRateError};

pub async fn fetch_last_rate(currency: &str, conn: &mut SqliteConnection) -> Result<ExchangeRate, ExchangeRateError> {
    let result: ExchangeRate = sqlx::query_as(
        r#"SELECT currency, rate, decimals, updated_at FROM exchange_rates
        WHERE currency = $1 ORDER BY id DESC LIMIT 1"#,
    )
    .bind(currency)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ExchangeRateError::RateDoesNotExist(currency.to_string()))?;
    Ok(result)
}

pub async fn set_exchange_rate(rate: &ExchangeRate, conn: &mut SqliteConnection) -> Result<(), ExchangeRateError> {
    if rate.rate <= 0 || rate.decimals < 0 {
        return Err(ExchangeRateError::InvalidRate(rate.to_string()));
    }
    sqlx::query("INSERT INTO exchange_rates (currency, rate, decimals, updated_at) VALUES ($1, $2, $3, $4)")
        .bind(&rate.currency)
        .bind(rate.rate)
        .bind(rate.decimals)
        .bind(rate.updated_at)
        .execute(conn)
        .await?;
    Ok(())
}
