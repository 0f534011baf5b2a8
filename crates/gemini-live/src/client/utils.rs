use crate::client::config::Config;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

/// The Live endpoint authenticates with the API key as a query parameter.
pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    format!("{}?key={}", config.base_url(), config.api_key().expose_secret()).into_client_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_passed_as_query_parameter() {
        let config = Config::builder()
            .with_base_url("wss://example.test/live")
            .with_api_key("secret-key")
            .build();
        let request = build_request(&config).unwrap();
        assert_eq!(request.uri().host(), Some("example.test"));
        assert_eq!(request.uri().query(), Some("key=secret-key"));
    }
}
