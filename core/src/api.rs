//! Typed endpoints of the docintel backend on top of the request executor.
//!
//! # Design
//! `ApiService` is an injected service object: every piece of process-wide
//! state (token, connectivity, storage, transport, navigation hook) is owned
//! by one instance, so tests and hosts can run isolated clients side by side.
//!
//! The endpoint wrappers add no logic of their own except where the session
//! is concerned: `login` verifies the token before accepting it, `logout`
//! wipes every trace of the session, and a 401 from any endpoint other than
//! the login endpoint forces a logout before the error is returned.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::connectivity::ConnectivityProber;
use crate::error::{ApiError, StorageError};
use crate::executor::{ApiRequest, RequestExecutor, TOKEN_ENDPOINT};
use crate::multipart::MultipartForm;
use crate::navigator::{logout_location, Navigator, TracingNavigator, LANDING_ROUTE};
use crate::preferences::{Preferences, Theme};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::token::TokenStore;
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    ChatCreated, ChatSession, DashboardStats, Document, MessageReply, RegisterRequest, SendMessage,
    TokenResponse, UserProfile,
};

pub const REGISTER_ENDPOINT: &str = "/auth/register";
pub const PROFILE_ENDPOINT: &str = "/auth/users/me";
pub const DOCUMENTS_ENDPOINT: &str = "/documents";
pub const UPLOAD_ENDPOINT: &str = "/documents/upload";
pub const CHAT_ENDPOINT: &str = "/chat";
pub const DASHBOARD_STATS_ENDPOINT: &str = "/dashboard/stats";

/// Multipart field carrying an uploaded document.
pub const UPLOAD_FIELD: &str = "file";

pub struct ApiServiceBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    durable: Option<Arc<dyn Storage>>,
    session: Option<Arc<dyn Storage>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ApiServiceBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn durable_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.durable = Some(storage);
        self
    }

    pub fn session_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.session = Some(storage);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Fails only when the configured durable store cannot be opened.
    pub fn build(self) -> Result<ApiService, StorageError> {
        let durable: Arc<dyn Storage> = match (self.durable, &self.config.storage_path) {
            (Some(storage), _) => storage,
            (None, Some(path)) => Arc::new(FileStorage::open(path)?),
            (None, None) => Arc::new(MemoryStorage::new()),
        };
        let session: Arc<dyn Storage> = match self.session {
            Some(storage) => storage,
            None => Arc::new(MemoryStorage::new()),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(UreqTransport::new()),
        };
        let navigator: Arc<dyn Navigator> = match self.navigator {
            Some(navigator) => navigator,
            None => Arc::new(TracingNavigator),
        };

        let tokens = Arc::new(TokenStore::new(durable.clone(), session));
        let connectivity = Arc::new(ConnectivityProber::new(transport.clone(), &self.config));
        let executor = RequestExecutor::new(
            &self.config,
            transport.clone(),
            tokens.clone(),
            connectivity.clone(),
        );

        Ok(ApiService {
            config: self.config,
            transport,
            tokens,
            preferences: Preferences::new(durable),
            connectivity,
            executor,
            navigator,
        })
    }
}

pub struct ApiService {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    preferences: Preferences,
    connectivity: Arc<ConnectivityProber>,
    executor: RequestExecutor,
    navigator: Arc<dyn Navigator>,
}

impl ApiService {
    pub fn builder(config: ClientConfig) -> ApiServiceBuilder {
        ApiServiceBuilder {
            config,
            transport: None,
            durable: None,
            session: None,
            navigator: None,
        }
    }

    /// Service with the default transport, storage and navigator for `config`.
    pub fn new(config: ClientConfig) -> Result<Self, StorageError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Issue `request`, applying the session-wide 401 policy.
    pub fn request<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let result = self.executor.execute(request);
        if let Err(err) = &result {
            if err.is_unauthorized() && !request.is_login() {
                self.handle_unauthorized(&request.endpoint);
            }
        }
        result
    }

    fn handle_unauthorized(&self, endpoint: &str) {
        warn!(endpoint, "backend rejected the session, logging out");
        self.logout();
    }

    // ---------------------------------------------------------------------
    // Session
    // ---------------------------------------------------------------------

    /// Exchange credentials for a token and verify it against the profile endpoint.
    ///
    /// The token is only kept if the backend accepts it on a follow-up call.
    /// On success the host is reloaded at the landing route.
    pub fn login(&self, identifier: &str, password: &str) -> Result<UserProfile, ApiError> {
        let request = ApiRequest::post(TOKEN_ENDPOINT)
            .form(&[("username", identifier), ("password", password)]);
        let token: TokenResponse = self.request(&request)?;

        self.tokens.set_token(Some(&token.access_token));
        self.tokens.set_username(Some(identifier));

        match self.executor.execute::<UserProfile>(&ApiRequest::get(PROFILE_ENDPOINT)) {
            Ok(profile) => {
                info!(username = identifier, "logged in");
                self.navigator.hard_navigate(LANDING_ROUTE);
                Ok(profile)
            }
            Err(err) => {
                warn!(
                    username = identifier,
                    error = %err,
                    "token rejected during session verification"
                );
                self.tokens.set_token(None);
                self.tokens.set_username(None);
                Err(ApiError::new(
                    err.status,
                    format!("could not verify session: {}", err.message),
                ))
            }
        }
    }

    /// Backend validation messages are returned unchanged.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ApiError> {
        let body = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.request(&ApiRequest::post(REGISTER_ENDPOINT).json(&body)?)
    }

    pub fn get_user_profile(&self) -> Result<UserProfile, ApiError> {
        self.request(&ApiRequest::get(PROFILE_ENDPOINT))
    }

    /// Forget the token, wipe all stored state and cookies, and reload at the login route.
    pub fn logout(&self) {
        self.tokens.set_token(None);
        self.tokens.clear_all();
        self.transport.reset_session();
        info!("logged out");
        self.navigator.hard_navigate(&logout_location());
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.has_token()
    }

    pub fn username(&self) -> Option<String> {
        self.tokens.username()
    }

    pub fn is_admin(&self) -> bool {
        self.tokens.is_admin()
    }

    // ---------------------------------------------------------------------
    // Connectivity
    // ---------------------------------------------------------------------

    pub fn check_connection(&self) -> bool {
        self.connectivity.check_connection()
    }

    pub fn is_available(&self) -> bool {
        self.connectivity.is_available()
    }

    // ---------------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------------

    pub fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        self.request(&ApiRequest::get(DOCUMENTS_ENDPOINT))
    }

    pub fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        self.request(&ApiRequest::get(document_path(id)))
    }

    pub fn upload_document(
        &self,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Document, ApiError> {
        let form = MultipartForm::new().file(UPLOAD_FIELD, filename, content_type, data);
        self.request(&ApiRequest::post(UPLOAD_ENDPOINT).multipart(form))
    }

    pub fn delete_document(&self, id: &str) -> Result<Value, ApiError> {
        self.request(&ApiRequest::delete(document_path(id)))
    }

    // ---------------------------------------------------------------------
    // Chat
    // ---------------------------------------------------------------------

    pub fn create_chat(&self) -> Result<ChatCreated, ApiError> {
        self.request(&ApiRequest::post(CHAT_ENDPOINT))
    }

    pub fn list_chats(&self) -> Result<Vec<ChatSession>, ApiError> {
        self.request(&ApiRequest::get(CHAT_ENDPOINT))
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<ChatSession, ApiError> {
        self.request(&ApiRequest::get(chat_path(chat_id)))
    }

    pub fn send_message(&self, chat_id: &str, message: &str) -> Result<MessageReply, ApiError> {
        let body = SendMessage {
            message: message.to_string(),
        };
        let endpoint = format!("{}/messages", chat_path(chat_id));
        self.request(&ApiRequest::post(endpoint).json(&body)?)
    }

    // ---------------------------------------------------------------------
    // Dashboard & preferences
    // ---------------------------------------------------------------------

    /// Live stats, or the static sample when they cannot be fetched.
    pub fn dashboard_stats(&self) -> DashboardStats {
        match self.request(&ApiRequest::get(DASHBOARD_STATS_ENDPOINT)) {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "dashboard stats unavailable, using sample data");
                DashboardStats::fallback()
            }
        }
    }

    pub fn theme(&self) -> Theme {
        self.preferences.theme()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.preferences.set_theme(theme);
    }
}

fn document_path(id: &str) -> String {
    format!("{DOCUMENTS_ENDPOINT}/{}", urlencoding::encode(id))
}

fn chat_path(id: &str) -> String {
    format!("{CHAT_ENDPOINT}/{}", urlencoding::encode(id))
}
