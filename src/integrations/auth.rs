use super::{endpoint, http::interpret, AuthGateway, GatewayError, GatewayResult, ReissueRequest};
use crate::data::TokenPair;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Unauthenticated client for the token endpoints.
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReissueBody<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
    client_id: &'a str,
    mobile_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[async_trait]
impl AuthGateway for AuthClient {
    async fn reissue_token(&self, request: ReissueRequest) -> GatewayResult<TokenPair> {
        let body = ReissueBody {
            access_token: &request.tokens.access_token,
            refresh_token: &request.tokens.refresh_token,
            client_id: &request.client_id,
            mobile_type: &request.mobile_type,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "/auth/refresh"))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let tokens: TokenResponse = interpret(status, &text)?
            .ok_or_else(|| GatewayError::Decode("reissue returned no tokens".to_string()))?;
        Ok(TokenPair::new(tokens.access_token, tokens.refresh_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reissue_body_wire_names() {
        let body = ReissueBody {
            access_token: "a",
            refresh_token: "r",
            client_id: "device",
            mobile_type: "ANDROID",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["accessToken"], "a");
        assert_eq!(value["refreshToken"], "r");
        assert_eq!(value["clientId"], "device");
        assert_eq!(value["mobileType"], "ANDROID");
    }
}
