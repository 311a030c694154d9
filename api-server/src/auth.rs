use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::HttpRequest;

use crate::response::ApiError;

pub(crate) const USER_ID_HEADER: &str = "x-user-id";
pub(crate) const DEVICE_ID_HEADER: &str = "x-device-id";

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let authorization = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = authorization.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed)
}

pub(crate) fn is_request_authorized(headers: &HeaderMap, expected_api_key: Option<&str>) -> bool {
    let Some(expected_api_key) = expected_api_key else {
        return true;
    };

    let x_api_key = header_str(headers, "x-api-key");
    if x_api_key == Some(expected_api_key) {
        return true;
    }

    bearer_token(headers).is_some_and(|token| token == expected_api_key)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Identity of the player making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Caller {
    pub(crate) user_id: String,
    pub(crate) device_id: String,
    pub(crate) ip: String,
}

/// The gateway in front of the service authenticates players and forwards
/// the user id; requests without it are rejected.
pub(crate) fn caller_from_request(
    req: &HttpRequest,
    expected_api_key: Option<&str>,
) -> Result<Caller, ApiError> {
    let headers = req.headers();
    if !is_request_authorized(headers, expected_api_key) {
        return Err(ApiError::Unauthenticated("invalid api key".to_string()));
    }

    let user_id = header_str(headers, USER_ID_HEADER)
        .filter(|id| id.len() <= 128)
        .ok_or_else(|| ApiError::Unauthenticated("missing caller identity".to_string()))?;

    let ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let device_id = header_str(headers, DEVICE_ID_HEADER)
        .unwrap_or("unknown")
        .to_string();

    Ok(Caller {
        user_id: user_id.to_string(),
        device_id,
        ip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn api_key_via_header_or_bearer() {
        let req = TestRequest::default()
            .insert_header(("x-api-key", "secret"))
            .to_http_request();
        assert!(is_request_authorized(req.headers(), Some("secret")));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer secret"))
            .to_http_request();
        assert!(is_request_authorized(req.headers(), Some("secret")));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic secret"))
            .to_http_request();
        assert!(!is_request_authorized(req.headers(), Some("secret")));
        assert!(is_request_authorized(req.headers(), None));
    }

    #[test]
    fn caller_requires_user_id() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            caller_from_request(&req, None),
            Err(ApiError::Unauthenticated(_))
        ));

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "player-1"))
            .insert_header((DEVICE_ID_HEADER, "pixel-8"))
            .peer_addr("10.1.2.3:5000".parse().unwrap())
            .to_http_request();
        let caller = caller_from_request(&req, None).unwrap();
        assert_eq!(caller.user_id, "player-1");
        assert_eq!(caller.device_id, "pixel-8");
        assert_eq!(caller.ip, "10.1.2.3");
    }
}
