//! Scripted `Portal` used by unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::portal::{AccountInfo, LoginForm, Portal, PortalError};

/// Failure a scripted call should produce
#[derive(Debug, Clone)]
pub enum Fail {
    Network,
    AlreadyConnected,
    LoginFailed(String),
    LogoutFailed(String),
    Malformed,
}

impl Fail {
    async fn into_error(self) -> PortalError {
        match self {
            // A request that cannot even be built is the cheapest real
            // reqwest::Error available offline.
            Fail::Network => PortalError::Network(
                reqwest::Client::new()
                    .get("http://")
                    .send()
                    .await
                    .expect_err("empty host cannot be requested"),
            ),
            Fail::AlreadyConnected => PortalError::AlreadyConnected,
            Fail::LoginFailed(reason) => PortalError::LoginFailed(reason),
            Fail::LogoutFailed(reason) => PortalError::LogoutFailed(reason),
            Fail::Malformed => PortalError::MalformedResponse("scripted".to_string()),
        }
    }
}

pub type Scripted<T> = Result<T, Fail>;

pub struct FakePortal {
    pub session: Mutex<Scripted<LoginForm>>,
    pub login: Mutex<Scripted<Option<String>>>,
    /// Popped per call; an empty queue means success
    pub logout: Mutex<VecDeque<Scripted<()>>>,
    /// Popped per call; an empty queue means a malformed answer
    pub time_left: Mutex<VecDeque<Scripted<String>>>,
    pub account: Mutex<Scripted<AccountInfo>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub logout_urls: Mutex<Vec<Url>>,
}

pub fn sample_form() -> LoginForm {
    LoginForm {
        action: Url::parse("https://secure.etecsa.net:8443//LoginServlet").unwrap(),
        fields: BTreeMap::from([
            ("CSRFHW".to_string(), "csrf-token".to_string()),
            ("wlanuserip".to_string(), "10.190.20.5".to_string()),
        ]),
    }
}

pub fn account_with_expiry(expiry: &str) -> AccountInfo {
    AccountInfo {
        details: vec![
            ("Estado de la cuenta:".to_string(), "Activa".to_string()),
            ("Crédito:".to_string(), "1.00 CUC".to_string()),
            ("Fecha de expiración:".to_string(), expiry.to_string()),
        ],
        sessions: vec![],
    }
}

impl Default for FakePortal {
    fn default() -> Self {
        Self {
            session: Mutex::new(Ok(sample_form())),
            login: Mutex::new(Ok(Some("UUID1".to_string()))),
            logout: Mutex::new(VecDeque::new()),
            time_left: Mutex::new(VecDeque::new()),
            account: Mutex::new(Ok(account_with_expiry("31/12/2026"))),
            calls: Mutex::new(Vec::new()),
            logout_urls: Mutex::new(Vec::new()),
        }
    }
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, reply: Scripted<LoginForm>) -> Self {
        *self.session.lock().unwrap() = reply;
        self
    }

    pub fn with_login(self, reply: Scripted<Option<String>>) -> Self {
        *self.login.lock().unwrap() = reply;
        self
    }

    pub fn with_logouts(self, replies: impl IntoIterator<Item = Scripted<()>>) -> Self {
        self.logout.lock().unwrap().extend(replies);
        self
    }

    pub fn with_time_left(self, replies: impl IntoIterator<Item = Scripted<String>>) -> Self {
        self.time_left.lock().unwrap().extend(replies);
        self
    }

    pub fn with_account(self, reply: Scripted<AccountInfo>) -> Self {
        *self.account.lock().unwrap() = reply;
        self
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().unwrap().push(op);
    }
}

async fn resolve<T>(reply: Scripted<T>) -> Result<T, PortalError> {
    match reply {
        Ok(value) => Ok(value),
        Err(fail) => Err(fail.into_error().await),
    }
}

#[async_trait]
impl Portal for FakePortal {
    async fn create_session(&self) -> Result<LoginForm, PortalError> {
        self.record("create_session");
        let reply = self.session.lock().unwrap().clone();
        resolve(reply).await
    }

    async fn login(
        &self,
        _form: &LoginForm,
        _username: &str,
        _password: &str,
    ) -> Result<Option<String>, PortalError> {
        self.record("login");
        let reply = self.login.lock().unwrap().clone();
        resolve(reply).await
    }

    async fn logout(&self, logout_url: &Url) -> Result<(), PortalError> {
        self.record("logout");
        self.logout_urls.lock().unwrap().push(logout_url.clone());
        let reply = self.logout.lock().unwrap().pop_front().unwrap_or(Ok(()));
        resolve(reply).await
    }

    async fn remaining_time(
        &self,
        _username: &str,
        _csrfhw: Option<&str>,
    ) -> Result<String, PortalError> {
        self.record("remaining_time");
        let reply = self
            .time_left
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(Fail::Malformed));
        resolve(reply).await
    }

    async fn query_account(
        &self,
        _username: &str,
        _password: &str,
    ) -> Result<AccountInfo, PortalError> {
        self.record("query_account");
        let reply = self.account.lock().unwrap().clone();
        resolve(reply).await
    }
}
