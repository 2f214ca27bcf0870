use url::Url;

/// Servlet path, relative to the secure base URL
pub const LOGOUT_PATH: &str = "LogoutServlet";

/// Everything the portal needs to close a session.
///
/// Serialized as the logout URL itself, which is what gets persisted while
/// connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutRequest {
    pub csrfhw: String,
    pub username: String,
    /// Empty when only a guess is available
    pub attribute_uuid: String,
    pub wlanuserip: String,
}

impl LogoutRequest {
    pub fn new(
        csrfhw: impl Into<String>,
        username: impl Into<String>,
        attribute_uuid: impl Into<String>,
        wlanuserip: impl Into<String>,
    ) -> Self {
        Self {
            csrfhw: csrfhw.into(),
            username: username.into(),
            attribute_uuid: attribute_uuid.into(),
            wlanuserip: wlanuserip.into(),
        }
    }

    /// Same request with a different attribute UUID
    pub fn with_attribute_uuid(&self, attribute_uuid: impl Into<String>) -> Self {
        Self {
            attribute_uuid: attribute_uuid.into(),
            ..self.clone()
        }
    }

    /// Build `LogoutServlet?CSRFHW=..&username=..&ATTRIBUTE_UUID=..&wlanuserip=..`
    /// under `base`. Values are form-urlencoded.
    pub fn to_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        let mut url = base.join(LOGOUT_PATH)?;
        url.query_pairs_mut()
            .clear()
            .append_pair("CSRFHW", &self.csrfhw)
            .append_pair("username", &self.username)
            .append_pair("ATTRIBUTE_UUID", &self.attribute_uuid)
            .append_pair("wlanuserip", &self.wlanuserip);
        Ok(url)
    }

    /// Parse a persisted logout URL. All four parameters must be present,
    /// though `ATTRIBUTE_UUID` may be empty.
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        let mut csrfhw = None;
        let mut username = None;
        let mut attribute_uuid = None;
        let mut wlanuserip = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "CSRFHW" => csrfhw = Some(value.into_owned()),
                "username" => username = Some(value.into_owned()),
                "ATTRIBUTE_UUID" => attribute_uuid = Some(value.into_owned()),
                "wlanuserip" => wlanuserip = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(Self {
            csrfhw: csrfhw?,
            username: username?,
            attribute_uuid: attribute_uuid?,
            wlanuserip: wlanuserip?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://secure.etecsa.net:8443/").expect("valid base")
    }

    #[test]
    fn test_to_url_layout() {
        let request = LogoutRequest::new("abc", "pepe@nauta.com.cu", "F00D", "10.0.0.7");
        let url = request.to_url(&base()).expect("url");
        assert_eq!(
            url.as_str(),
            "https://secure.etecsa.net:8443/LogoutServlet?CSRFHW=abc&username=pepe%40nauta.com.cu&ATTRIBUTE_UUID=F00D&wlanuserip=10.0.0.7"
        );
    }

    #[test]
    fn test_roundtrip_reproduces_query_string() {
        let request = LogoutRequest::new("a+b/c=", "jose maría@nauta.co.cu", "", "10.0.0.7");
        let written = request.to_url(&base()).expect("url").to_string();

        let parsed = LogoutRequest::from_url(&written).expect("parse back");
        assert_eq!(parsed, request);

        let rebuilt = parsed.to_url(&base()).expect("url");
        assert_eq!(rebuilt.query(), Url::parse(&written).expect("url").query());
        assert_eq!(rebuilt.as_str(), written);
    }

    #[test]
    fn test_with_attribute_uuid() {
        let guess = LogoutRequest::new("abc", "u@d", "", "1.2.3.4");
        let real = guess.with_attribute_uuid("XYZ");
        assert_eq!(real.attribute_uuid, "XYZ");
        assert_eq!(real.csrfhw, guess.csrfhw);
        assert_ne!(real, guess);
    }

    #[test]
    fn test_from_url_rejects_incomplete() {
        assert_eq!(LogoutRequest::from_url("not a url"), None);
        assert_eq!(
            LogoutRequest::from_url("https://h/LogoutServlet?CSRFHW=a&username=b"),
            None
        );
    }
}
