use serde::{Deserialize, Serialize};

use crate::auth::{
    self, AdminLoginBody, AdminLoginData, AuthFlow, AuthPhase, LogoutBody, SendOtpBody,
    SendOtpData, VerifyOtpBody, VerifyOtpData,
};
use crate::capabilities::{
    Capabilities, HttpError, HttpRequest, HttpResult, KeyNamespace, KvKey, KvOutput,
};
use crate::event::{Event, ReviewAction};
use crate::model::{
    AdminSession, ConfirmAction, DashboardState, Identifier, ListingId, ListingSummary, LocalId,
    Model, RemoteFileId, Route, SellerStats, ToastKind, Token, WhichStore,
};
use crate::session::{encode_session, AdminStore, RestoreOutcome, SessionStore};
use crate::view::{view_model, ViewModel};
use crate::wizard::{
    self, assemble_payload, CreateListingData, ListingDraft, ListingWizard, MediaItem,
    MediaStatus, PickedImage, RemoteImage, UploadImagesData, WizardStep,
};
use crate::{
    api_result, AppError, ErrorKind, CREATE_LISTING_TIMEOUT_MS, FETCH_TIMEOUT_MS,
    SEND_OTP_TIMEOUT_MS, UPLOAD_TIMEOUT_MS, VERIFY_OTP_TIMEOUT_MS,
};

// --- Wire shapes owned by this layer ---

#[derive(Debug, Clone, Deserialize)]
struct SellerListingsData {
    #[serde(default)]
    cars: Vec<ListingSummary>,
}

#[derive(Debug, Clone, Deserialize)]
struct PaginationData {
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchData {
    #[serde(default)]
    cars: Vec<ListingSummary>,
    #[serde(default)]
    pagination: Option<PaginationData>,
}

#[derive(Debug, Clone, Serialize)]
struct ReviewBody<'a> {
    action: ReviewAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Default)]
pub struct App;

impl App {
    fn endpoint(model: &Model, path: &str) -> String {
        format!(
            "{}{}{}",
            model.config.api_base.trim_end_matches('/'),
            crate::API_PREFIX,
            path
        )
    }

    fn theme_key() -> KvKey {
        KvKey::from_static(KeyNamespace::Settings, "theme")
    }

    fn send_request<F>(caps: &Capabilities, request: Result<HttpRequest, HttpError>, make_event: F)
    where
        F: FnOnce(HttpResult) -> Event + Send + 'static,
    {
        match request {
            Ok(request) => caps.http.send(request, make_event),
            // Builder failures mean a programming error, not user input;
            // log loudly instead of surfacing a dead-end dialog.
            Err(e) => tracing::error!(error = %e, "failed to build request"),
        }
    }

    fn bearer(request: Result<HttpRequest, HttpError>, token: Option<&Token>) -> Result<HttpRequest, HttpError> {
        match token {
            Some(token) => request.and_then(|r| r.with_bearer(token)),
            None => request,
        }
    }

    // --- Auth requests ---

    fn send_otp(model: &Model, caps: &Capabilities, identifier: &Identifier) {
        let body = SendOtpBody::for_identifier(identifier);
        let request = HttpRequest::post(Self::endpoint(model, "/auth/send-otp/"))
            .and_then(|r| r.with_json(&body))
            .and_then(|r| r.with_timeout_ms(SEND_OTP_TIMEOUT_MS));
        Self::send_request(caps, request, |result| {
            Event::SendOtpResponse(Box::new(result))
        });
    }

    fn send_verify(model: &Model, caps: &Capabilities, body: &VerifyOtpBody<'_>) {
        let request = HttpRequest::post(Self::endpoint(model, "/auth/verify-otp/"))
            .and_then(|r| r.with_json(body))
            .and_then(|r| r.with_timeout_ms(VERIFY_OTP_TIMEOUT_MS));
        Self::send_request(caps, request, |result| {
            Event::VerifyOtpResponse(Box::new(result))
        });
    }

    fn send_logout(model: &Model, caps: &Capabilities, refresh_token: Option<&str>) {
        let body = LogoutBody { refresh_token };
        let request = Self::bearer(
            HttpRequest::post(Self::endpoint(model, "/auth/logout/")).and_then(|r| r.with_json(&body)),
            model.session.access_token(),
        );
        Self::send_request(caps, request, |result| {
            Event::LogoutResponse(Box::new(result))
        });
    }

    fn send_admin_login(model: &Model, caps: &Capabilities, email: &str, password: &str) {
        let body = AdminLoginBody { email, password };
        let request = HttpRequest::post(Self::endpoint(model, "/auth/admin/login/"))
            .and_then(|r| r.with_json(&body));
        Self::send_request(caps, request, |result| {
            Event::AdminLoginResponse(Box::new(result))
        });
    }

    // --- Wizard requests ---

    fn send_image_upload(model: &Model, caps: &Capabilities, local_id: LocalId, picked: &PickedImage) {
        let request = Self::bearer(
            HttpRequest::post(Self::endpoint(model, "/upload/car-images/"))
                .and_then(|r| {
                    r.with_file(
                        "images",
                        picked.blob.clone(),
                        picked.name.clone(),
                        picked.mime_type.clone(),
                    )
                })
                .and_then(|r| r.with_timeout_ms(UPLOAD_TIMEOUT_MS)),
            model.session.access_token(),
        );
        Self::send_request(caps, request, move |result| Event::ImageUploadResponse {
            local_id,
            result: Box::new(result),
        });
    }

    fn send_image_delete(model: &Model, caps: &Capabilities, local_id: LocalId, remote_id: &RemoteFileId) {
        let request = Self::bearer(
            HttpRequest::delete(Self::endpoint(model, &format!("/upload/files/{remote_id}/"))),
            model.session.access_token(),
        );
        Self::send_request(caps, request, move |result| Event::ImageDeleteResponse {
            local_id,
            result: Box::new(result),
        });
    }

    fn send_create_listing(model: &Model, caps: &Capabilities, body: &wizard::CreateListingBody) {
        let request = Self::bearer(
            HttpRequest::post(Self::endpoint(model, "/sellers/me/cars/create/"))
                .and_then(|r| r.with_json(body))
                .and_then(|r| r.with_timeout_ms(CREATE_LISTING_TIMEOUT_MS)),
            model.session.access_token(),
        );
        Self::send_request(caps, request, |result| {
            Event::SubmitListingResponse(Box::new(result))
        });
    }

    // --- Dashboard / search requests ---

    fn send_seller_stats(model: &Model, caps: &Capabilities) {
        let request = Self::bearer(
            HttpRequest::get(Self::endpoint(model, "/sellers/me/stats/"))
                .and_then(|r| r.with_timeout_ms(FETCH_TIMEOUT_MS)),
            model.session.access_token(),
        );
        Self::send_request(caps, request, |result| {
            Event::SellerStatsResponse(Box::new(result))
        });
    }

    fn send_seller_listings(model: &Model, caps: &Capabilities) {
        let request = Self::bearer(
            HttpRequest::get(Self::endpoint(model, "/sellers/me/cars/"))
                .and_then(|r| r.with_timeout_ms(FETCH_TIMEOUT_MS)),
            model.session.access_token(),
        );
        Self::send_request(caps, request, |result| {
            Event::SellerListingsResponse(Box::new(result))
        });
    }

    fn send_listing_delete(model: &Model, caps: &Capabilities, id: ListingId) {
        let request = Self::bearer(
            HttpRequest::delete(Self::endpoint(model, &format!("/sellers/me/cars/{id}/delete/"))),
            model.session.access_token(),
        );
        Self::send_request(caps, request, move |result| Event::ListingDeleteResponse {
            id,
            result: Box::new(result),
        });
    }

    fn send_search(model: &Model, caps: &Capabilities) {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(model.search.filters.to_query_pairs())
            .finish();
        let url = format!("{}?{query}", Self::endpoint(model, "/cars/search/"));
        let request = Self::bearer(
            HttpRequest::get(url).and_then(|r| r.with_timeout_ms(FETCH_TIMEOUT_MS)),
            model.session.access_token(),
        );
        Self::send_request(caps, request, |result| {
            Event::SearchResponse(Box::new(result))
        });
    }

    fn send_favorite(model: &Model, caps: &Capabilities, id: ListingId, was_favorite: bool) {
        let path = format!("/cars/{id}/favorite/");
        let request = if was_favorite {
            HttpRequest::delete(Self::endpoint(model, &path))
        } else {
            HttpRequest::post(Self::endpoint(model, &path))
                .and_then(|r| r.with_json(&serde_json::json!({})))
        };
        let request = Self::bearer(request, model.session.access_token());
        Self::send_request(caps, request, move |result| Event::FavoriteResponse {
            id,
            was_favorite,
            result: Box::new(result),
        });
    }

    fn send_admin_review(
        model: &Model,
        caps: &Capabilities,
        id: ListingId,
        action: ReviewAction,
        reason: Option<&str>,
    ) {
        let body = ReviewBody { action, reason };
        let request = Self::bearer(
            HttpRequest::post(Self::endpoint(model, &format!("/admin/cars/{id}/review/")))
                .and_then(|r| r.with_json(&body)),
            model.admin.store.token(),
        );
        Self::send_request(caps, request, move |result| Event::AdminReviewResponse {
            id,
            result: Box::new(result),
        });
    }

    // --- Persistence ---

    fn persist_session(model: &mut Model, caps: &Capabilities) {
        let Some(session) = model.session.current() else {
            return;
        };
        match encode_session(session) {
            Ok(bytes) => caps.key_value.set(SessionStore::storage_key(), bytes, |result| {
                Event::StorageWritten {
                    what: WhichStore::Session,
                    result: Box::new(result),
                }
            }),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode session");
                model.toast_error(&e);
            }
        }
    }

    fn persist_admin_session(model: &mut Model, caps: &Capabilities) {
        let Some(session) = model.admin.store.current() else {
            return;
        };
        match encode_session(session) {
            Ok(bytes) => caps
                .key_value
                .set(AdminStore::storage_key(), bytes, |result| {
                    Event::StorageWritten {
                        what: WhichStore::AdminSession,
                        result: Box::new(result),
                    }
                }),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode admin session");
                model.toast_error(&e);
            }
        }
    }

    fn delete_stored(caps: &Capabilities, key: KvKey, what: WhichStore) {
        caps.key_value.delete(key, move |result| Event::StorageWritten {
            what,
            result: Box::new(result),
        });
    }

    /// Central handling for any request rejected as unauthenticated: the
    /// session is cleared (storage included) and the user is sent to the
    /// login flow with a return destination preserved.
    fn handle_unauthenticated(model: &mut Model, caps: &Capabilities, return_to: Route) {
        tracing::warn!("request rejected as unauthenticated, clearing session");
        model.session.clear();
        Self::delete_stored(caps, SessionStore::storage_key(), WhichStore::Session);
        model.auth = AuthFlow::opened(Some(return_to));
        model.show_toast(
            "Your session has expired. Please sign in again.",
            ToastKind::Warning,
        );
        caps.navigate.push(Route::Login);
    }

    fn handle_admin_unauthenticated(model: &mut Model, caps: &Capabilities) {
        tracing::warn!("admin request rejected as unauthenticated");
        model.admin.store.clear();
        Self::delete_stored(caps, AdminStore::storage_key(), WhichStore::AdminSession);
        model.show_toast(
            "Your admin session has expired. Please sign in again.",
            ToastKind::Warning,
        );
        caps.navigate.push(Route::AdminLogin);
    }

    /// Raw success check for ack-style calls whose bodies may be empty.
    fn call_succeeded(result: &HttpResult) -> bool {
        matches!(result, Ok(response) if response.is_success())
    }

    /// Like [`Self::call_succeeded`], but a 404 on a delete means the
    /// resource is already gone, which is the outcome the user asked for.
    fn delete_succeeded(result: &HttpResult) -> bool {
        match result {
            Ok(response) => response.is_success() || response.status() == 404,
            Err(_) => false,
        }
    }

    fn classify_failure(result: &HttpResult) -> AppError {
        match api_result::<serde_json::Value>(result) {
            Err(e) => e,
            Ok(_) => AppError::new(ErrorKind::Unknown, "The request failed"),
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        tracing::debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            "handling event"
        );

        match event {
            Event::Noop => {}

            // --- Lifecycle ---
            Event::AppStarted { config } => {
                model.config = config;
                model.started = true;
                caps.key_value.get(SessionStore::storage_key(), |result| {
                    Event::SessionRestored(Box::new(result))
                });
                caps.key_value.get(AdminStore::storage_key(), |result| {
                    Event::AdminSessionRestored(Box::new(result))
                });
                caps.key_value.get(Self::theme_key(), |result| {
                    Event::ThemeRestored(Box::new(result))
                });
            }

            Event::SessionRestored(result) => match result.as_ref() {
                Ok(KvOutput::Value(bytes)) => {
                    let outcome = model.session.restore_from(bytes.as_deref());
                    if outcome == RestoreOutcome::Corrupted {
                        tracing::warn!("stored session was corrupted, clearing it");
                        Self::delete_stored(caps, SessionStore::storage_key(), WhichStore::Session);
                    }
                }
                Ok(KvOutput::Done) => {}
                Err(e) => tracing::warn!(error = %e, "could not restore session"),
            },

            Event::AdminSessionRestored(result) => match result.as_ref() {
                Ok(KvOutput::Value(bytes)) => {
                    let outcome = model.admin.store.restore_from(bytes.as_deref());
                    if outcome == RestoreOutcome::Corrupted {
                        tracing::warn!("stored admin session was corrupted, clearing it");
                        Self::delete_stored(
                            caps,
                            AdminStore::storage_key(),
                            WhichStore::AdminSession,
                        );
                    }
                }
                Ok(KvOutput::Done) => {}
                Err(e) => tracing::warn!(error = %e, "could not restore admin session"),
            },

            Event::ThemeRestored(result) => {
                if let Ok(KvOutput::Value(Some(bytes))) = result.as_ref() {
                    if let Some(theme) = crate::capabilities::decode_stored(bytes) {
                        model.theme = theme;
                    }
                }
            }

            Event::StorageWritten { what, result } => match result.as_ref() {
                Ok(_) => tracing::debug!(?what, "storage write completed"),
                Err(e) => {
                    tracing::error!(?what, error = %e, "storage write failed");
                    model.toast_error(&AppError::new(
                        ErrorKind::Storage,
                        "Could not save to this device",
                    ));
                }
            },

            // --- OTP authentication ---
            Event::LoginOpened { return_to } => {
                model.auth = AuthFlow::opened(return_to);
            }

            Event::IdentifierEdited { value } => {
                model.auth.identifier_input = value;
            }

            Event::OtpCodeEdited { value } => {
                model.auth.code_input = value;
            }

            Event::SendOtpRequested => {
                if !model.auth.sending {
                    match Identifier::normalize(&model.auth.identifier_input) {
                        Err(e) => model.auth.error = Some(e),
                        Ok(identifier) => {
                            model.auth.error = None;
                            model.auth.sending = true;
                            model.auth.pending_identifier = Some(identifier.clone());
                            Self::send_otp(model, caps, &identifier);
                        }
                    }
                }
            }

            Event::SendOtpResponse(result) => {
                if model.auth.sending {
                    model.auth.sending = false;
                    let target = model.auth.pending_identifier.take();
                    match (api_result::<SendOtpData>(&result), target) {
                        (Ok(data), Some(target)) => {
                            model.auth.phase = AuthPhase::OtpSent {
                                challenge: data.into_challenge(target),
                            };
                            model.auth.code_input.clear();
                            model.auth.error = None;
                            model.show_toast("OTP sent", ToastKind::Success);
                        }
                        (Ok(_), None) => {
                            tracing::warn!("send-otp response arrived with no pending identifier");
                        }
                        (Err(e), _) => {
                            // Stay on the current step; the typed identifier
                            // (and, on resend, the old challenge) survive.
                            tracing::warn!(error = %e, "send-otp failed");
                            model.auth.error = Some(e);
                        }
                    }
                }
            }

            Event::VerifyOtpRequested => {
                if !model.auth.verifying {
                    let challenge = model.auth.phase.challenge().cloned();
                    if let Some(challenge) = challenge {
                        let code = model.auth.code_input.trim().to_string();
                        match auth::validate_otp_code(&code) {
                            Err(e) => model.auth.error = Some(e),
                            Ok(()) => {
                                model.auth.error = None;
                                model.auth.verifying = true;
                                let body = VerifyOtpBody::new(&challenge, &code);
                                Self::send_verify(model, caps, &body);
                            }
                        }
                    }
                }
            }

            Event::VerifyOtpResponse(result) => {
                if model.auth.verifying {
                    model.auth.verifying = false;
                    let session =
                        api_result::<VerifyOtpData>(&result).and_then(auth::session_from_verify);
                    match session {
                        Ok(session) => {
                            model.session.accept(session);
                            Self::persist_session(model, caps);
                            model.auth.phase = AuthPhase::Verified;
                            model.auth.code_input.clear();
                            model.show_toast("Signed in successfully", ToastKind::Success);
                            caps.navigate.push(model.auth.destination());
                        }
                        Err(e) => {
                            // Identifier and challenge stay put so the user
                            // can retry without a fresh OTP.
                            tracing::warn!(error = %e, "verify-otp failed");
                            model.auth.error = Some(e);
                        }
                    }
                }
            }

            Event::ResendOtpRequested => {
                if !model.auth.sending {
                    let target = model.auth.phase.challenge().map(|c| c.target.clone());
                    if let Some(target) = target {
                        model.auth.sending = true;
                        model.auth.code_input.clear();
                        model.auth.error = None;
                        model.auth.pending_identifier = Some(target.clone());
                        Self::send_otp(model, caps, &target);
                    }
                }
            }

            Event::ChangeIdentifierRequested => {
                model.auth.change_identifier();
            }

            Event::LogoutRequested => {
                if model.session.is_authenticated() {
                    let refresh = model
                        .session
                        .current()
                        .map(|s| s.refresh_token.expose().to_string());
                    Self::send_logout(model, caps, refresh.as_deref());
                }
                model.session.clear();
                Self::delete_stored(caps, SessionStore::storage_key(), WhichStore::Session);
                model.auth = AuthFlow::default();
                model.dashboard = DashboardState::default();
                model.show_toast("Signed out", ToastKind::Info);
                caps.navigate.push(Route::Home);
            }

            Event::LogoutResponse(result) => {
                // The session is already gone locally; the server call is
                // best-effort.
                if let Err(e) = result.as_ref() {
                    tracing::debug!(error = %e, "logout call failed");
                }
            }

            // --- Listing wizard ---
            Event::WizardOpened => {
                if model.is_authenticated() {
                    model.wizard = ListingWizard::default();
                } else {
                    model.auth = AuthFlow::opened(Some(Route::Sell));
                    caps.navigate.push(Route::Login);
                }
            }

            Event::StepFormChanged(form) => {
                if !model.wizard.is_terminal() {
                    model.wizard.apply_form(*form);
                }
            }

            Event::NextStepRequested => {
                model.wizard.try_advance();
            }

            Event::BackStepRequested => {
                model.wizard.go_back();
            }

            Event::StepSelected { step } => {
                model.wizard.select_step(step);
            }

            Event::ImagesSelected { files } => {
                if !model.wizard.is_terminal() {
                    for picked in files {
                        let count = model.wizard.draft.media.len();
                        match wizard::check_picked_image(&picked, count) {
                            // Per-file failures stay individually visible.
                            Err(e) => model.toast_error(&e),
                            Ok(()) => {
                                let local_id = LocalId::new(uuid::Uuid::new_v4().to_string());
                                model.wizard.draft.media.push(MediaItem {
                                    local_id: local_id.clone(),
                                    file_name: picked.name.clone(),
                                    preview_url: picked.preview_url.clone(),
                                    status: MediaStatus::Uploading,
                                    remote: None,
                                });
                                Self::send_image_upload(model, caps, local_id, &picked);
                            }
                        }
                    }
                }
            }

            Event::ImageUploadResponse { local_id, result } => {
                // If the item is gone the flow moved on; drop the response.
                if model.wizard.draft.media_item(&local_id).is_some() {
                    match api_result::<UploadImagesData>(&result) {
                        Ok(data) => {
                            let uploaded = data.images.into_iter().next();
                            let mut failed_name = None;
                            if let Some(item) = model.wizard.draft.media_item_mut(&local_id) {
                                if let Some(first) = uploaded {
                                    item.remote = Some(RemoteImage {
                                        id: RemoteFileId::new(first.id),
                                        url: first.url,
                                        thumbnail: first.thumbnail,
                                    });
                                    item.status = MediaStatus::Uploaded;
                                } else {
                                    item.status = MediaStatus::Failed;
                                    failed_name = Some(item.file_name.clone());
                                }
                            }
                            if let Some(name) = failed_name {
                                model.show_toast(
                                    format!("Upload failed for '{name}'"),
                                    ToastKind::Error,
                                );
                            }
                        }
                        Err(e) if e.kind == ErrorKind::Authentication => {
                            Self::handle_unauthenticated(model, caps, Route::Sell);
                        }
                        Err(e) => {
                            let name = model.wizard.draft.media_item_mut(&local_id).map(|item| {
                                item.status = MediaStatus::Failed;
                                item.file_name.clone()
                            });
                            if let Some(name) = name {
                                model.show_toast(
                                    format!(
                                        "Upload failed for '{name}': {}",
                                        e.user_facing_message()
                                    ),
                                    ToastKind::Error,
                                );
                            }
                        }
                    }
                }
            }

            Event::ImageRemoveRequested { local_id } => {
                let status = model
                    .wizard
                    .draft
                    .media_item(&local_id)
                    .map(|item| item.status);
                match status {
                    Some(MediaStatus::Uploaded) => {
                        model.confirm = Some(ConfirmAction::RemoveImage { local_id });
                    }
                    Some(MediaStatus::Failed) => {
                        model.wizard.draft.remove_media(&local_id);
                    }
                    // In-flight one way or the other; nothing sane to do.
                    Some(MediaStatus::Uploading | MediaStatus::Deleting) | None => {}
                }
            }

            Event::ImageDeleteResponse { local_id, result } => {
                model.wizard.deleting.remove(&local_id);
                if model.wizard.draft.media_item(&local_id).is_some() {
                    if Self::delete_succeeded(&result) {
                        model.wizard.draft.remove_media(&local_id);
                        model.show_toast("Photo removed", ToastKind::Info);
                    } else {
                        let error = Self::classify_failure(&result);
                        if error.kind == ErrorKind::Authentication {
                            Self::handle_unauthenticated(model, caps, Route::Sell);
                        } else {
                            // The remote copy still exists: the draft keeps
                            // the image rather than silently desyncing.
                            if let Some(item) = model.wizard.draft.media_item_mut(&local_id) {
                                item.status = MediaStatus::Uploaded;
                            }
                            model.show_toast(
                                "Couldn't delete the photo - it is still attached to your listing",
                                ToastKind::Error,
                            );
                        }
                    }
                }
            }

            Event::SubmitListingRequested => {
                if !model.wizard.is_terminal() && !model.wizard.submit_in_flight {
                    let errors = wizard::validate_all(&model.wizard.draft);
                    if errors.is_empty() {
                        match assemble_payload(&model.wizard.draft) {
                            Ok(body) => {
                                model.wizard.submit_in_flight = true;
                                model.wizard.error = None;
                                Self::send_create_listing(model, caps, &body);
                            }
                            Err(e) => {
                                model.wizard.return_to_rejected_field(e.field_errors);
                            }
                        }
                    } else {
                        model.wizard.return_to_rejected_field(errors);
                    }
                }
            }

            Event::SubmitListingResponse(result) => {
                if model.wizard.submit_in_flight {
                    model.wizard.submit_in_flight = false;
                    match api_result::<CreateListingData>(&result) {
                        Ok(data) => {
                            model.wizard.step = WizardStep::Submitted;
                            model.wizard.submitted_id = Some(ListingId::new(data.id));
                            model.wizard.draft = ListingDraft::default();
                            model.wizard.field_errors.clear();
                            model.wizard.error = None;
                            model.show_toast(
                                "Your car has been submitted for review",
                                ToastKind::Success,
                            );
                        }
                        Err(e) if e.kind == ErrorKind::Authentication => {
                            Self::handle_unauthenticated(model, caps, Route::Sell);
                        }
                        Err(e)
                            if e.kind == ErrorKind::ServerValidation
                                && !e.field_errors.is_empty() =>
                        {
                            // Jump back to the step that owns the first
                            // rejected field.
                            model.wizard.return_to_rejected_field(e.field_errors);
                        }
                        Err(e) => {
                            model.toast_error(&e);
                            model.wizard.error = Some(e);
                        }
                    }
                }
            }

            // --- Seller dashboard ---
            Event::DashboardOpened => {
                if model.is_authenticated() {
                    model.dashboard = DashboardState {
                        stats_pending: true,
                        listings_pending: true,
                        ..DashboardState::default()
                    };
                    // Independent reads, issued together and awaited jointly.
                    Self::send_seller_stats(model, caps);
                    Self::send_seller_listings(model, caps);
                } else {
                    model.auth = AuthFlow::opened(Some(Route::SellerDashboard));
                    caps.navigate.push(Route::Login);
                }
            }

            Event::SellerStatsResponse(result) => {
                if model.dashboard.stats_pending {
                    model.dashboard.stats_pending = false;
                    match api_result::<SellerStats>(&result) {
                        Ok(stats) => model.dashboard.stats = Some(stats),
                        Err(e) if e.kind == ErrorKind::Authentication => {
                            Self::handle_unauthenticated(model, caps, Route::SellerDashboard);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "seller stats failed");
                            model.dashboard.error = Some(e);
                        }
                    }
                }
            }

            Event::SellerListingsResponse(result) => {
                if model.dashboard.listings_pending {
                    model.dashboard.listings_pending = false;
                    match api_result::<SellerListingsData>(&result) {
                        Ok(data) => model.dashboard.listings = Some(data.cars),
                        Err(e) if e.kind == ErrorKind::Authentication => {
                            Self::handle_unauthenticated(model, caps, Route::SellerDashboard);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "seller listings failed");
                            model.dashboard.error = Some(e);
                        }
                    }
                }
            }

            Event::ListingDeleteRequested { id } => {
                if model.is_authenticated() && !model.dashboard.deleting.contains(&id) {
                    model.confirm = Some(ConfirmAction::DeleteListing { id });
                }
            }

            Event::ListingDeleteResponse { id, result } => {
                model.dashboard.deleting.remove(&id);
                if Self::delete_succeeded(&result) {
                    if let Some(listings) = model.dashboard.listings.as_mut() {
                        listings.retain(|l| l.id != id);
                    }
                    model.show_toast("Listing deleted", ToastKind::Success);
                } else {
                    let error = Self::classify_failure(&result);
                    if error.kind == ErrorKind::Authentication {
                        Self::handle_unauthenticated(model, caps, Route::SellerDashboard);
                    } else {
                        model.toast_error(&error);
                    }
                }
            }

            // --- Public search & favorites ---
            Event::SearchFiltersChanged(filters) => {
                model.search.filters = *filters;
            }

            Event::SearchRequested => {
                if !model.search.loading {
                    model.search.loading = true;
                    model.search.error = None;
                    Self::send_search(model, caps);
                }
            }

            Event::SearchResponse(result) => {
                if model.search.loading {
                    model.search.loading = false;
                    match api_result::<SearchData>(&result) {
                        Ok(data) => {
                            model.search.total = data.pagination.and_then(|p| p.total);
                            model.search.results = data.cars;
                        }
                        Err(e) => {
                            if e.is_retryable() {
                                model.toast_error(&e);
                            }
                            model.search.error = Some(e);
                        }
                    }
                }
            }

            Event::FavoriteToggled { id } => {
                if !model.is_authenticated() {
                    model.auth = AuthFlow::opened(Some(Route::Home));
                    caps.navigate.push(Route::Login);
                } else if !model.search.favorite_pending.contains(&id) {
                    // Optimistic flip, rolled back if the call fails.
                    let was_favorite = model.search.favorites.contains(&id);
                    if was_favorite {
                        model.search.favorites.remove(&id);
                    } else {
                        model.search.favorites.insert(id.clone());
                    }
                    model.search.favorite_pending.insert(id.clone());
                    Self::send_favorite(model, caps, id, was_favorite);
                }
            }

            Event::FavoriteResponse {
                id,
                was_favorite,
                result,
            } => {
                model.search.favorite_pending.remove(&id);
                if !Self::call_succeeded(&result) {
                    let error = Self::classify_failure(&result);
                    // Roll the optimistic flip back.
                    if was_favorite {
                        model.search.favorites.insert(id);
                    } else {
                        model.search.favorites.remove(&id);
                    }
                    if error.kind == ErrorKind::Authentication {
                        Self::handle_unauthenticated(model, caps, Route::Home);
                    } else {
                        model.toast_error(&error);
                    }
                }
            }

            // --- Admin ---
            Event::AdminLoginRequested { email, password } => {
                if !model.admin.logging_in {
                    match auth::validate_admin_credentials(&email, &password) {
                        Err(e) => model.admin.error = Some(e),
                        Ok(()) => {
                            model.admin.error = None;
                            model.admin.logging_in = true;
                            Self::send_admin_login(model, caps, &email, &password);
                        }
                    }
                }
            }

            Event::AdminLoginResponse(result) => {
                if model.admin.logging_in {
                    model.admin.logging_in = false;
                    match api_result::<AdminLoginData>(&result) {
                        Ok(data) if !data.token.is_empty() && !data.user.id.is_empty() => {
                            let session = AdminSession {
                                user: data.user,
                                token: Token::new(data.token),
                            };
                            model.admin.store.accept(session);
                            Self::persist_admin_session(model, caps);
                            model.show_toast("Welcome back", ToastKind::Success);
                            caps.navigate.push(Route::AdminDashboard);
                        }
                        Ok(_) => {
                            model.admin.error = Some(AppError::new(
                                ErrorKind::Serialization,
                                "The sign-in response was incomplete",
                            ));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "admin login failed");
                            model.admin.error = Some(e);
                        }
                    }
                }
            }

            Event::AdminReviewRequested { id, action, reason } => {
                if !model.admin.store.is_authenticated() {
                    Self::handle_admin_unauthenticated(model, caps);
                } else if action == ReviewAction::Reject
                    && reason.as_deref().map_or(true, |r| r.trim().is_empty())
                {
                    model.admin.error = Some(
                        AppError::validation("A reason is required when rejecting a listing")
                            .with_field("reason", "Enter a rejection reason"),
                    );
                } else if !model.admin.review_pending.contains(&id) {
                    model.admin.error = None;
                    model.admin.review_pending.insert(id.clone());
                    Self::send_admin_review(model, caps, id, action, reason.as_deref());
                }
            }

            Event::AdminReviewResponse { id, result } => {
                model.admin.review_pending.remove(&id);
                if Self::call_succeeded(&result) {
                    model.show_toast("Review submitted", ToastKind::Success);
                } else {
                    let error = Self::classify_failure(&result);
                    if error.kind == ErrorKind::Authentication {
                        Self::handle_admin_unauthenticated(model, caps);
                    } else {
                        tracing::warn!(error = %error, "admin review failed");
                        model.toast_error(&error);
                    }
                }
            }

            Event::AdminLogoutRequested => {
                model.admin.store.clear();
                Self::delete_stored(caps, AdminStore::storage_key(), WhichStore::AdminSession);
                model.show_toast("Signed out", ToastKind::Info);
                caps.navigate.push(Route::AdminLogin);
            }

            // --- Presentation ---
            Event::ConfirmAccepted => match model.confirm.take() {
                Some(ConfirmAction::RemoveImage { local_id }) => {
                    let remote_id = model
                        .wizard
                        .draft
                        .media_item(&local_id)
                        .and_then(|item| item.remote.as_ref())
                        .map(|remote| remote.id.clone());
                    if let Some(remote_id) = remote_id {
                        if let Some(item) = model.wizard.draft.media_item_mut(&local_id) {
                            item.status = MediaStatus::Deleting;
                        }
                        model.wizard.deleting.insert(local_id.clone());
                        Self::send_image_delete(model, caps, local_id, &remote_id);
                    } else {
                        model.wizard.draft.remove_media(&local_id);
                    }
                }
                Some(ConfirmAction::DeleteListing { id }) => {
                    model.dashboard.deleting.insert(id.clone());
                    Self::send_listing_delete(model, caps, id);
                }
                None => {}
            },

            Event::ConfirmDismissed => {
                model.confirm = None;
            }

            Event::ToastDismissed { id } => {
                model.toasts.dismiss(id);
            }

            Event::DismissError => {
                model.auth.error = None;
                model.wizard.error = None;
                model.admin.error = None;
                model.search.error = None;
                model.dashboard.error = None;
            }

            Event::ThemeToggled => {
                model.theme = model.theme.toggled();
                match crate::capabilities::encode_stored(&model.theme) {
                    Ok(bytes) => caps.key_value.set(Self::theme_key(), bytes, |result| {
                        Event::StorageWritten {
                            what: WhichStore::Theme,
                            result: Box::new(result),
                        }
                    }),
                    Err(e) => tracing::error!(error = %e, "failed to encode theme"),
                }
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        view_model(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_path() {
        let model = Model::default();
        assert_eq!(
            App::endpoint(&model, "/auth/send-otp/"),
            "https://api.bharatautobazaar.com/api/v1/auth/send-otp/"
        );

        let model = Model {
            config: crate::model::AppConfig {
                api_base: "http://staging.example.com/".into(),
            },
            ..Model::default()
        };
        assert_eq!(
            App::endpoint(&model, "/cars/search/"),
            "http://staging.example.com/api/v1/cars/search/"
        );
    }
}
