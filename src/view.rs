//! Shell-facing view model. Everything here is plain serializable data;
//! shells render it and send events back.

use serde::{Deserialize, Serialize};

use crate::auth::AuthPhase;
use crate::model::{
    ConfirmAction, ListingSummary, Model, SellerStats, Theme, ToastKind, ToastMessage,
};
use crate::wizard::{ContactForm, DetailsForm, MediaStatus, PricingForm, WizardStep};
use crate::{AppError, ErrorSeverity, FieldError};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
    pub field_errors: Vec<FieldError>,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
            field_errors: e.field_errors.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            id: t.id,
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfirmView {
    pub prompt: String,
    pub confirm_label: String,
}

impl From<&ConfirmAction> for ConfirmView {
    fn from(action: &ConfirmAction) -> Self {
        Self {
            prompt: action.prompt().to_string(),
            confirm_label: action.confirm_label().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AuthPhaseView {
    EnteringIdentifier,
    OtpSent {
        masked_target: Option<String>,
        dev_hint: Option<String>,
    },
    Verified,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthView {
    pub phase: AuthPhaseView,
    pub identifier: String,
    pub code: String,
    pub sending: bool,
    pub verifying: bool,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MediaItemView {
    pub local_id: String,
    pub file_name: String,
    /// The remote URL once uploaded, the local preview until then.
    pub display_url: String,
    pub status: MediaStatus,
    pub can_remove: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WizardView {
    pub step: WizardStep,
    pub step_title: String,
    pub details: DetailsForm,
    pub pricing: PricingForm,
    pub contact: ContactForm,
    pub media: Vec<MediaItemView>,
    pub field_errors: Vec<FieldError>,
    pub submit_in_flight: bool,
    pub can_submit: bool,
    pub submitted_id: Option<String>,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardView {
    pub loading: bool,
    pub ready: bool,
    pub stats: Option<SellerStats>,
    pub listings: Vec<ListingSummary>,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchView {
    pub loading: bool,
    pub results: Vec<ListingSummary>,
    pub total: Option<u64>,
    pub favorites: Vec<String>,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdminView {
    pub logged_in: bool,
    pub admin_name: Option<String>,
    pub logging_in: bool,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub is_authenticated: bool,
    pub user_name: Option<String>,
    pub theme: Theme,
    pub auth: AuthView,
    pub wizard: WizardView,
    pub dashboard: DashboardView,
    pub search: SearchView,
    pub admin: AdminView,
    pub toasts: Vec<ToastView>,
    pub confirm: Option<ConfirmView>,
}

#[must_use]
pub fn view_model(model: &Model) -> ViewModel {
    let auth = AuthView {
        phase: match &model.auth.phase {
            AuthPhase::EnteringIdentifier => AuthPhaseView::EnteringIdentifier,
            AuthPhase::OtpSent { challenge } => AuthPhaseView::OtpSent {
                masked_target: challenge.masked_target.clone(),
                dev_hint: challenge.dev_hint.clone(),
            },
            AuthPhase::Verified => AuthPhaseView::Verified,
        },
        identifier: model.auth.identifier_input.clone(),
        code: model.auth.code_input.clone(),
        sending: model.auth.sending,
        verifying: model.auth.verifying,
        error: model.auth.error.as_ref().map(UserFacingError::from),
    };

    let wizard = &model.wizard;
    let media = wizard
        .draft
        .media
        .iter()
        .map(|item| MediaItemView {
            local_id: item.local_id.as_str().to_string(),
            file_name: item.file_name.clone(),
            display_url: item
                .remote
                .as_ref()
                .map_or_else(|| item.preview_url.clone(), |r| r.url.clone()),
            status: item.status,
            can_remove: !matches!(item.status, MediaStatus::Deleting | MediaStatus::Uploading),
        })
        .collect();

    let can_submit = wizard.step == WizardStep::Media
        && !wizard.submit_in_flight
        && !wizard.draft.uploaded_images().is_empty()
        && !wizard.draft.has_upload_in_flight();

    let wizard_view = WizardView {
        step: wizard.step,
        step_title: wizard.step.title().to_string(),
        details: wizard.draft.details.clone(),
        pricing: wizard.draft.pricing.clone(),
        contact: wizard.draft.contact.clone(),
        media,
        field_errors: wizard.field_errors.clone(),
        submit_in_flight: wizard.submit_in_flight,
        can_submit,
        submitted_id: wizard.submitted_id.as_ref().map(|id| id.as_str().to_string()),
        error: wizard.error.as_ref().map(UserFacingError::from),
    };

    ViewModel {
        is_authenticated: model.is_authenticated(),
        user_name: model
            .session
            .user()
            .and_then(|u| u.name.clone().or_else(|| u.phone_number.clone())),
        theme: model.theme,
        auth,
        wizard: wizard_view,
        dashboard: DashboardView {
            loading: model.dashboard.is_loading(),
            ready: model.dashboard.is_ready(),
            stats: model.dashboard.stats.clone(),
            listings: model.dashboard.listings.clone().unwrap_or_default(),
            error: model.dashboard.error.as_ref().map(UserFacingError::from),
        },
        search: SearchView {
            loading: model.search.loading,
            results: model.search.results.clone(),
            total: model.search.total,
            favorites: model
                .search
                .favorites
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
            error: model.search.error.as_ref().map(UserFacingError::from),
        },
        admin: AdminView {
            logged_in: model.admin.store.is_authenticated(),
            admin_name: model
                .admin
                .store
                .current()
                .and_then(|s| s.user.name.clone()),
            logging_in: model.admin.logging_in,
            error: model.admin.error.as_ref().map(UserFacingError::from),
        },
        toasts: model.toasts.iter().map(ToastView::from).collect(),
        confirm: model.confirm.as_ref().map(ConfirmView::from),
    }
}
