use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, DATE};
use reqwest::Client;
use serde_json::{Map, Value};
use url::Url;

use super::retry::RetryPolicy;
use crate::error::{OcorrenciasError, Result};

const USER_AGENT: &str = "ocorrencias-etl/0.1.0";
const ACCEPT_LANGUAGE_VALUE: &str = "pt-BR,pt;q=0.5";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// A decoded API answer paired with the server clock at the time it answered.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub fetched_at: DateTime<Utc>,
    pub body: Map<String, Value>,
}

pub struct DadosRioClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl DadosRioClient {
    pub fn new(base_url: &Url, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| OcorrenciasError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    /// Construct `{base}/{method}/` with an optional pre-encoded query string
    fn method_url(&self, method: &str, query: Option<&str>) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("{method}/"))
            .map_err(|e| OcorrenciasError::Config(format!("Invalid method URL '{method}': {e}")))?;
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }

    /// GET a method, retrying transport failures, and decode its JSON body.
    pub async fn fetch(&self, method: &str, query: Option<&str>) -> Result<ApiResponse> {
        let url = self.method_url(method, query)?;

        let (date, payload) = self
            .retry
            .run(method, || self.fetch_once(url.clone()))
            .await?;

        let fetched_at = parse_response_date(date.as_deref())?;
        let body: Map<String, Value> = serde_json::from_slice(&payload)?;
        debug!("JSON response from {method}: {}", Value::Object(body.clone()));

        Ok(ApiResponse { fetched_at, body })
    }

    async fn fetch_once(&self, url: Url) -> Result<(Option<String>, Vec<u8>)> {
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcorrenciasError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let date = response
            .headers()
            .get(DATE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let payload = response.bytes().await?.to_vec();

        Ok((date, payload))
    }
}

/// HTTP dates (`Tue, 15 Oct 2024 12:00:00 GMT`) are RFC 2822 compatible.
fn parse_response_date(raw: Option<&str>) -> Result<DateTime<Utc>> {
    let raw = raw.ok_or_else(|| {
        OcorrenciasError::ResponseDate("response carries no Date header".to_string())
    })?;

    DateTime::parse_from_rfc2822(raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| OcorrenciasError::ResponseDate(format!("'{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use mockito::Matcher;

    use super::*;

    const SERVER_DATE: &str = "Tue, 15 Oct 2024 12:00:00 GMT";

    fn client_for(server: &mockito::Server, retries: u32) -> DadosRioClient {
        let base_url = Url::parse(&server.url()).unwrap();
        DadosRioClient::new(&base_url, RetryPolicy::new(retries, Duration::ZERO)).unwrap()
    }

    #[test]
    fn test_method_url_appends_method_and_query() {
        let base_url = Url::parse("https://api.dados.rio/v2/adm_cor_comando").unwrap();
        let client = DadosRioClient::new(&base_url, RetryPolicy::new(0, Duration::ZERO)).unwrap();

        let url = client
            .method_url("procedimento_operacional_padrao_orgaos_responsaveis", Some("popId=7"))
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.dados.rio/v2/adm_cor_comando/procedimento_operacional_padrao_orgaos_responsaveis/?popId=7"
        );
    }

    #[test]
    fn test_method_url_without_query() {
        let base_url = Url::parse("https://api.dados.rio/v2/adm_cor_comando/").unwrap();
        let client = DadosRioClient::new(&base_url, RetryPolicy::new(0, Duration::ZERO)).unwrap();

        let url = client.method_url("pops", None).unwrap();

        assert_eq!(url.as_str(), "https://api.dados.rio/v2/adm_cor_comando/pops/");
    }

    #[test]
    fn test_parse_response_date() {
        let parsed = parse_response_date(Some(SERVER_DATE)).unwrap();

        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_response_date_rejects_missing_and_garbage() {
        assert!(matches!(
            parse_response_date(None),
            Err(OcorrenciasError::ResponseDate(_))
        ));
        assert!(matches!(
            parse_response_date(Some("yesterday")),
            Err(OcorrenciasError::ResponseDate(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_sends_language_header_and_returns_date() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pops/")
            .match_header("accept-language", "pt-BR,pt;q=0.5")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("date", SERVER_DATE)
            .with_body(r#"{"retorno": "OK", "objeto": []}"#)
            .expect(1)
            .create_async()
            .await;

        let response = client_for(&server, 0).fetch("pops", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            response.fetched_at,
            Utc.with_ymd_and_hms(2024, 10, 15, 12, 0, 0).unwrap()
        );
        assert_eq!(response.body["retorno"], "OK");
    }

    #[tokio::test]
    async fn test_fetch_passes_query_string() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/procedimento_operacional_padrao_orgaos_responsaveis/")
            .match_query(Matcher::UrlEncoded("popId".into(), "7".into()))
            .with_status(200)
            .with_header("date", SERVER_DATE)
            .with_body(r#"{"pop": "Bloqueio", "atividades": []}"#)
            .create_async()
            .await;

        let response = client_for(&server, 0)
            .fetch(
                "procedimento_operacional_padrao_orgaos_responsaveis",
                Some("popId=7"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.body["pop"], "Bloqueio");
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ocorrencias_abertas/")
            .with_status(500)
            .with_header("date", SERVER_DATE)
            .with_body("internal error")
            .expect(5)
            .create_async()
            .await;

        let result = client_for(&server, 4)
            .fetch("ocorrencias_abertas", None)
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(OcorrenciasError::Http { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_invalid_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ocorrencias_abertas/")
            .with_status(200)
            .with_header("date", SERVER_DATE)
            .with_body("<html>maintenance</html>")
            .expect(1)
            .create_async()
            .await;

        let result = client_for(&server, 4)
            .fetch("ocorrencias_abertas", None)
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(OcorrenciasError::Json(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_object_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pops/")
            .with_status(200)
            .with_header("date", SERVER_DATE)
            .with_body("[1, 2, 3]")
            .create_async()
            .await;

        let result = client_for(&server, 0).fetch("pops", None).await;

        assert!(matches!(result, Err(OcorrenciasError::Json(_))));
    }
}
