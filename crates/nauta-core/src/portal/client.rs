//! HTTP client for the ETECSA captive portal.
//!
//! `Portal` is the seam the session engine and cache policy talk to;
//! `EtecsaPortal` implements it over a cookie-keeping `reqwest::Client`.
//! One `EtecsaPortal` is one logical portal session: the cookie jar is
//! shared by every call made through it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PortalConfig;

use super::html;
use super::models::{AccountInfo, LoginForm};
use super::PortalError;

// ============================================================================
// Constants
// ============================================================================

/// Query servlet path, relative to the secure base URL
const QUERY_PATH: &str = "EtecsaQueryServlet";

/// Fragment of the post-login URL that only appears on success
const LOGIN_SUCCESS_MARKER: &str = "online.do";

/// Body marker of a confirmed logout, compared case-insensitively
const LOGOUT_SUCCESS_MARKER: &str = "SUCCESS";

/// Selector of the login form on the bootstrap page
const LOGIN_FORM_SELECTOR: &str = "form#formulario";

/// Operations the portal offers.
///
/// Implementations return data only; callers decide what to persist.
#[async_trait]
pub trait Portal: Send + Sync {
    /// Fetch the landing page and walk the bootstrap form to the login form.
    /// Fails with `AlreadyConnected` when the landing page is not intercepted.
    async fn create_session(&self) -> Result<LoginForm, PortalError>;

    /// Submit credentials. `Ok(None)` means the portal accepted the login but
    /// the response carried no attribute UUID.
    async fn login(
        &self,
        form: &LoginForm,
        username: &str,
        password: &str,
    ) -> Result<Option<String>, PortalError>;

    /// GET a logout URL exactly as it was recorded at login
    async fn logout(&self, logout_url: &Url) -> Result<(), PortalError>;

    /// Raw remaining-time answer; callers validate it
    async fn remaining_time(
        &self,
        username: &str,
        csrfhw: Option<&str>,
    ) -> Result<String, PortalError>;

    async fn query_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AccountInfo, PortalError>;

    async fn credit(&self, username: &str, password: &str) -> Result<String, PortalError> {
        let info = self.query_account(username, password).await?;
        info.credit().map(str::to_string).ok_or_else(|| {
            PortalError::MalformedResponse("credit not found in account information".to_string())
        })
    }
}

pub struct EtecsaPortal {
    client: Client,
    landing_url: Url,
    secure_host: String,
    secure_base: Url,
}

impl EtecsaPortal {
    pub fn new(config: &PortalConfig) -> Result<Self, PortalError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            landing_url: Url::parse(&config.landing_url)?,
            secure_host: config.secure_host.clone(),
            secure_base: Url::parse(&config.secure_base_url)?,
        })
    }

    pub fn secure_base(&self) -> &Url {
        &self.secure_base
    }

    fn query_url(&self) -> Result<Url, PortalError> {
        Ok(self.secure_base.join(QUERY_PATH)?)
    }

    /// Read the body, keeping the final URL after redirects
    async fn into_page(response: Response) -> Result<(Url, String), PortalError> {
        let url = response.url().clone();
        let body = response.text().await?;
        Ok((url, body))
    }

    async fn post_form(
        &self,
        action: Url,
        fields: &BTreeMap<String, String>,
    ) -> Result<Response, PortalError> {
        debug!(url = %action, fields = fields.len(), "Submitting portal form");
        Ok(self.client.post(action).form(fields).send().await?)
    }
}

#[async_trait]
impl Portal for EtecsaPortal {
    async fn create_session(&self) -> Result<LoginForm, PortalError> {
        let response = self.client.get(self.landing_url.clone()).send().await?;
        let (landing_url, body) = Self::into_page(response).await?;

        if !body.contains(&self.secure_host) {
            info!(url = %landing_url, "Landing page not intercepted by the portal");
            return Err(PortalError::AlreadyConnected);
        }

        let bootstrap = html::extract_form(&body, "form").ok_or_else(|| {
            PortalError::MalformedResponse("landing page has no bootstrap form".to_string())
        })?;
        let action = landing_url.join(&bootstrap.action)?;

        let response = self.post_form(action, &bootstrap.fields).await?;
        let (page_url, body) = Self::into_page(response).await?;

        let login = html::extract_form(&body, LOGIN_FORM_SELECTOR).ok_or_else(|| {
            PortalError::MalformedResponse("login form not found".to_string())
        })?;

        let form = LoginForm {
            action: page_url.join(&login.action)?,
            fields: login.fields,
        };
        debug!(
            action = %form.action,
            has_csrf = form.csrfhw().is_some(),
            client_ip = ?form.wlanuserip(),
            "Login form discovered"
        );
        Ok(form)
    }

    async fn login(
        &self,
        form: &LoginForm,
        username: &str,
        password: &str,
    ) -> Result<Option<String>, PortalError> {
        let mut fields = form.fields.clone();
        fields.insert("username".to_string(), username.to_string());
        fields.insert("password".to_string(), password.to_string());

        let response = self.post_form(form.action.clone(), &fields).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::LoginFailed(status.to_string()));
        }

        let (final_url, body) = Self::into_page(response).await?;
        if !final_url.as_str().contains(LOGIN_SUCCESS_MARKER) {
            let reason = html::alert_reason(&body).unwrap_or_else(|| "unknown reason".to_string());
            warn!(user = username, %reason, "Portal rejected login");
            return Err(PortalError::LoginFailed(reason));
        }

        let attribute_uuid = html::attribute_uuid(&body);
        if attribute_uuid.is_none() {
            warn!(user = username, "Login page carried no attribute UUID");
        }
        Ok(attribute_uuid)
    }

    async fn logout(&self, logout_url: &Url) -> Result<(), PortalError> {
        let response = self.client.get(logout_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::LogoutFailed(status.to_string()));
        }

        let body = response.text().await?;
        info!(response = %PortalError::snippet(body.trim()), "Logout response");
        if !body.to_uppercase().contains(LOGOUT_SUCCESS_MARKER) {
            return Err(PortalError::LogoutFailed(PortalError::snippet(&body)));
        }
        Ok(())
    }

    async fn remaining_time(
        &self,
        username: &str,
        csrfhw: Option<&str>,
    ) -> Result<String, PortalError> {
        let mut url = self.query_url()?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(csrfhw) = csrfhw {
                query.append_pair("CSRFHW", csrfhw);
            }
            query
                .append_pair("op", "getLeftTime")
                .append_pair("op1", username);
        }

        let response = self.client.get(url).send().await?;
        debug!(user = username, status = %response.status(), "Remaining time queried");
        Ok(response.text().await?)
    }

    async fn query_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AccountInfo, PortalError> {
        let response = self.client.get(self.secure_base.clone()).send().await?;
        let (_, page) = Self::into_page(response).await?;

        let mut fields = html::extract_inputs(&page);
        fields.insert("username".to_string(), username.to_string());
        fields.insert("password".to_string(), password.to_string());

        let response = self.post_form(self.query_url()?, &fields).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::Status(status));
        }

        let body = response.text().await?;
        AccountInfo::from_html(&body)
    }
}
