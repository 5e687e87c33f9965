use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::cancel::CancellationToken;
use crate::core::error::RateError;
use crate::core::rates::{RateSource, RateTable};

/// Rate tables from the `@fawazahmed0/currency-api` JSON files.
pub struct CurrencyApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl CurrencyApiProvider {
    pub fn new(base_url: &str) -> Result<Self, RateError> {
        let client = reqwest::Client::builder().user_agent("fxconv/1.0").build()?;
        Ok(CurrencyApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Deserialize, Debug)]
struct CurrencyApiResponse {
    #[serde(default)]
    date: String,
    #[serde(flatten)]
    currencies: HashMap<String, Value>,
}

fn parse_rate_table(base: &str, body: &str) -> Result<RateTable, RateError> {
    let base_key = base.to_lowercase();
    let base_code = base.to_uppercase();

    let data: CurrencyApiResponse =
        serde_json::from_str(body).map_err(|e| RateError::Parse {
            base: base_code.clone(),
            reason: e.to_string(),
        })?;

    // Disabled or deprecated codes come back as a plain string.
    let Some(Value::Object(raw_rates)) = data.currencies.get(&base_key) else {
        return Err(RateError::MissingBaseData { base: base_code });
    };

    let rates = raw_rates.iter().filter_map(|(code, value)| {
        let rate = value.as_f64();
        if rate.is_none() {
            debug!(code = %code, value = %value, "Skipping non-numeric rate");
        }
        rate.map(|r| (code.as_str(), r))
    });

    Ok(RateTable::new(data.date, &base_code, rates))
}

#[async_trait]
impl RateSource for CurrencyApiProvider {
    #[instrument(
        name = "CurrencyApiFetch",
        skip(self, base, cancel),
        fields(base = %base)
    )]
    async fn fetch_rates(
        &self,
        base: &str,
        cancel: &CancellationToken,
    ) -> Result<RateTable, RateError> {
        cancel.check_cancelled()?;

        let base_key = base.trim().to_lowercase();
        let url = format!("{}/v1/currencies/{}.json", self.base_url, base_key);
        debug!("Requesting rate table from {}", url);

        let response = self.client.get(&url).send().await?;
        debug!(status = %response.status(), "Received rate response");
        cancel.check_cancelled()?;

        if !response.status().is_success() {
            return Err(RateError::Http {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        cancel.check_cancelled()?;

        parse_rate_table(&base_key, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(base: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v1/currencies/{base}.json");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let body = r#"{
            "date": "2024-03-01",
            "usd": { "inr": 83.1, "eur": 0.92, "btc": 0.0000161 }
        }"#;
        let mock_server = create_mock_server("usd", 200, body).await;
        let provider = CurrencyApiProvider::new(&mock_server.uri()).unwrap();

        let table = provider
            .fetch_rates("USD", &CancellationToken::new())
            .await
            .expect("Failed to get rates");
        assert_eq!(table.base, "USD");
        assert_eq!(table.as_of, "2024-03-01");
        assert_eq!(table.rate("INR"), Some(83.1));
        assert_eq!(table.rate("EUR"), Some(0.92));
        assert_eq!(table.rates.len(), 3);
        assert!(table.rates.keys().all(|k| k.chars().all(|c| !c.is_lowercase())));
    }

    #[tokio::test]
    async fn test_http_error_response() {
        let mock_server = create_mock_server("usd", 500, "").await;
        let provider = CurrencyApiProvider::new(&mock_server.uri()).unwrap();

        let result = provider.fetch_rates("usd", &CancellationToken::new()).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Failed to fetch currency rates (HTTP 500)"
        );
    }

    #[tokio::test]
    async fn test_base_returned_as_string() {
        let body = r#"{ "date": "2024-03-01", "xyz": "deprecated" }"#;
        let mock_server = create_mock_server("xyz", 200, body).await;
        let provider = CurrencyApiProvider::new(&mock_server.uri()).unwrap();

        let result = provider.fetch_rates("XYZ", &CancellationToken::new()).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Currency data missing for base XYZ"
        );
    }

    #[tokio::test]
    async fn test_base_absent_from_body() {
        let body = r#"{ "date": "2024-03-01", "eur": { "usd": 1.08 } }"#;
        let mock_server = create_mock_server("usd", 200, body).await;
        let provider = CurrencyApiProvider::new(&mock_server.uri()).unwrap();

        let result = provider.fetch_rates("usd", &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(RateError::MissingBaseData { ref base }) if base == "USD"
        ));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = create_mock_server("usd", 200, "<html>oops</html>").await;
        let provider = CurrencyApiProvider::new(&mock_server.uri()).unwrap();

        let result = provider.fetch_rates("usd", &CancellationToken::new()).await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse rate response for USD")
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(0)
            .mount(&mock_server)
            .await;
        let provider = CurrencyApiProvider::new(&mock_server.uri()).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let result = provider.fetch_rates("usd", &token).await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_while_in_flight() {
        let body = r#"{ "date": "2024-03-01", "usd": { "inr": 83.1 } }"#;
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/currencies/usd.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&mock_server)
            .await;
        let provider = CurrencyApiProvider::new(&mock_server.uri()).unwrap();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = provider.fetch_rates("usd", &token).await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_parse_accepts_missing_date() {
        let body = r#"{ "usd": { "inr": 83.1 } }"#;
        let table = parse_rate_table("usd", body).unwrap();
        assert_eq!(table.as_of, "");
        assert!(table.as_of_date().is_none());
        assert_eq!(table.rate("INR"), Some(83.1));
    }

    #[test]
    fn test_parse_skips_non_numeric_rates() {
        let body = r#"{ "date": "2024-03-01", "usd": { "inr": 83.1, "bad": "n/a", "nil": null } }"#;
        let table = parse_rate_table("usd", body).unwrap();
        assert_eq!(table.rates.len(), 1);
        assert_eq!(table.rate("INR"), Some(83.1));
    }
}
