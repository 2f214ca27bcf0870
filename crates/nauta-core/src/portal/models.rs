use std::collections::BTreeMap;

use url::Url;

use super::html;
use super::PortalError;

/// Table with the account summary (state, credit, expiry)
const ACCOUNT_TABLE_ID: &str = "sessioninfo";

/// Table with the history of past connections
const SESSIONS_TABLE_ID: &str = "sesiontraza";

/// Label fragment identifying the expiry row of the account table
const EXPIRY_LABEL: &str = "expiración";

/// The portal's login form, discovered fresh for every session.
///
/// `fields` is the payload template; it carries the CSRF token and the
/// client IP the portal assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub action: Url,
    pub fields: BTreeMap<String, String>,
}

impl LoginForm {
    pub fn csrfhw(&self) -> Option<&str> {
        self.fields.get("CSRFHW").map(String::as_str)
    }

    pub fn wlanuserip(&self) -> Option<&str> {
        self.fields.get("wlanuserip").map(String::as_str)
    }
}

/// Account summary and connection history from the query servlet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountInfo {
    /// `(label, value)` rows in page order
    pub details: Vec<(String, String)>,
    /// Cell texts of each past connection
    pub sessions: Vec<Vec<String>>,
}

impl AccountInfo {
    pub fn from_html(body: &str) -> Result<Self, PortalError> {
        let rows = html::extract_table(body, ACCOUNT_TABLE_ID).ok_or_else(|| {
            PortalError::MalformedResponse("account information table not found".to_string())
        })?;

        let details = rows
            .into_iter()
            .map(|mut cells| {
                let label = cells.first().cloned().unwrap_or_default();
                let value = if cells.len() > 1 {
                    cells.swap_remove(1)
                } else {
                    String::new()
                };
                (label, value)
            })
            .collect();

        let sessions = html::extract_table(body, SESSIONS_TABLE_ID).unwrap_or_default();

        Ok(Self { details, sessions })
    }

    /// Value of the second summary row, where the portal shows the balance
    pub fn credit(&self) -> Option<&str> {
        self.details.get(1).map(|(_, value)| value.as_str())
    }

    pub fn expire_date(&self) -> Option<&str> {
        self.details
            .iter()
            .find(|(label, _)| label.to_lowercase().contains(EXPIRY_LABEL))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_PAGE: &str = r#"
        <table id="sessioninfo">
          <tr><td>Estado de la cuenta:</td><td>Activa</td></tr>
          <tr><td>Crédito:</td><td>3.25 CUC</td></tr>
          <tr><td>Fecha de expiración:</td><td>No especificada</td></tr>
          <tr><td>Área de acceso:</td><td>Acceso Internacional</td></tr>
        </table>"#;

    #[test]
    fn test_account_info_accessors() {
        let info = AccountInfo::from_html(ACCOUNT_PAGE).expect("parse");
        assert_eq!(info.details.len(), 4);
        assert_eq!(info.credit(), Some("3.25 CUC"));
        assert_eq!(info.expire_date(), Some("No especificada"));
        assert!(info.sessions.is_empty());
    }

    #[test]
    fn test_account_info_requires_table() {
        let err = AccountInfo::from_html("<html><body>Error</body></html>").unwrap_err();
        assert!(matches!(err, PortalError::MalformedResponse(_)));
    }

    #[test]
    fn test_expire_date_absent() {
        let info = AccountInfo {
            details: vec![("Estado:".into(), "Activa".into())],
            sessions: vec![],
        };
        assert_eq!(info.expire_date(), None);
        assert_eq!(info.credit(), None);
    }

    #[test]
    fn test_login_form_accessors() {
        let form = LoginForm {
            action: Url::parse("https://secure.etecsa.net:8443/LoginServlet").expect("url"),
            fields: BTreeMap::from([
                ("CSRFHW".to_string(), "tok".to_string()),
                ("wlanuserip".to_string(), "10.0.0.2".to_string()),
            ]),
        };
        assert_eq!(form.csrfhw(), Some("tok"));
        assert_eq!(form.wlanuserip(), Some("10.0.0.2"));
    }
}
