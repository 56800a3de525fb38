use crate::capabilities::{HttpResult, KvResult};
use crate::model::{AppConfig, ListingId, LocalId, Route, SearchFilters, WhichStore};
use crate::wizard::{PickedImage, StepForm, WizardStep};

use serde::{Deserialize, Serialize};

/// Moderation verdicts an admin can hand down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Noop,

    // Lifecycle
    AppStarted {
        config: AppConfig,
    },
    SessionRestored(Box<KvResult>),
    AdminSessionRestored(Box<KvResult>),
    ThemeRestored(Box<KvResult>),
    StorageWritten {
        what: WhichStore,
        result: Box<KvResult>,
    },

    // OTP authentication
    LoginOpened {
        return_to: Option<Route>,
    },
    IdentifierEdited {
        value: String,
    },
    SendOtpRequested,
    SendOtpResponse(Box<HttpResult>),
    OtpCodeEdited {
        value: String,
    },
    VerifyOtpRequested,
    VerifyOtpResponse(Box<HttpResult>),
    ResendOtpRequested,
    ChangeIdentifierRequested,
    LogoutRequested,
    LogoutResponse(Box<HttpResult>),

    // Listing wizard
    WizardOpened,
    StepFormChanged(Box<StepForm>),
    NextStepRequested,
    BackStepRequested,
    StepSelected {
        step: WizardStep,
    },
    ImagesSelected {
        files: Vec<PickedImage>,
    },
    ImageUploadResponse {
        local_id: LocalId,
        result: Box<HttpResult>,
    },
    ImageRemoveRequested {
        local_id: LocalId,
    },
    ImageDeleteResponse {
        local_id: LocalId,
        result: Box<HttpResult>,
    },
    SubmitListingRequested,
    SubmitListingResponse(Box<HttpResult>),

    // Seller dashboard
    DashboardOpened,
    SellerStatsResponse(Box<HttpResult>),
    SellerListingsResponse(Box<HttpResult>),
    ListingDeleteRequested {
        id: ListingId,
    },
    ListingDeleteResponse {
        id: ListingId,
        result: Box<HttpResult>,
    },

    // Public search & favorites
    SearchFiltersChanged(Box<SearchFilters>),
    SearchRequested,
    SearchResponse(Box<HttpResult>),
    FavoriteToggled {
        id: ListingId,
    },
    FavoriteResponse {
        id: ListingId,
        was_favorite: bool,
        result: Box<HttpResult>,
    },

    // Admin
    AdminLoginRequested {
        email: String,
        password: String,
    },
    AdminLoginResponse(Box<HttpResult>),
    AdminReviewRequested {
        id: ListingId,
        action: ReviewAction,
        reason: Option<String>,
    },
    AdminReviewResponse {
        id: ListingId,
        result: Box<HttpResult>,
    },
    AdminLogoutRequested,

    // Presentation
    ConfirmAccepted,
    ConfirmDismissed,
    ToastDismissed {
        id: u64,
    },
    DismissError,
    ThemeToggled,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted { .. } => "app_started",
            Self::SessionRestored(_) => "session_restored",
            Self::AdminSessionRestored(_) => "admin_session_restored",
            Self::ThemeRestored(_) => "theme_restored",
            Self::StorageWritten { .. } => "storage_written",
            Self::LoginOpened { .. } => "login_opened",
            Self::IdentifierEdited { .. } => "identifier_edited",
            Self::SendOtpRequested => "send_otp_requested",
            Self::SendOtpResponse(_) => "send_otp_response",
            Self::OtpCodeEdited { .. } => "otp_code_edited",
            Self::VerifyOtpRequested => "verify_otp_requested",
            Self::VerifyOtpResponse(_) => "verify_otp_response",
            Self::ResendOtpRequested => "resend_otp_requested",
            Self::ChangeIdentifierRequested => "change_identifier_requested",
            Self::LogoutRequested => "logout_requested",
            Self::LogoutResponse(_) => "logout_response",
            Self::WizardOpened => "wizard_opened",
            Self::StepFormChanged(_) => "step_form_changed",
            Self::NextStepRequested => "next_step_requested",
            Self::BackStepRequested => "back_step_requested",
            Self::StepSelected { .. } => "step_selected",
            Self::ImagesSelected { .. } => "images_selected",
            Self::ImageUploadResponse { .. } => "image_upload_response",
            Self::ImageRemoveRequested { .. } => "image_remove_requested",
            Self::ImageDeleteResponse { .. } => "image_delete_response",
            Self::SubmitListingRequested => "submit_listing_requested",
            Self::SubmitListingResponse(_) => "submit_listing_response",
            Self::DashboardOpened => "dashboard_opened",
            Self::SellerStatsResponse(_) => "seller_stats_response",
            Self::SellerListingsResponse(_) => "seller_listings_response",
            Self::ListingDeleteRequested { .. } => "listing_delete_requested",
            Self::ListingDeleteResponse { .. } => "listing_delete_response",
            Self::SearchFiltersChanged(_) => "search_filters_changed",
            Self::SearchRequested => "search_requested",
            Self::SearchResponse(_) => "search_response",
            Self::FavoriteToggled { .. } => "favorite_toggled",
            Self::FavoriteResponse { .. } => "favorite_response",
            Self::AdminLoginRequested { .. } => "admin_login_requested",
            Self::AdminLoginResponse(_) => "admin_login_response",
            Self::AdminReviewRequested { .. } => "admin_review_requested",
            Self::AdminReviewResponse { .. } => "admin_review_response",
            Self::AdminLogoutRequested => "admin_logout_requested",
            Self::ConfirmAccepted => "confirm_accepted",
            Self::ConfirmDismissed => "confirm_dismissed",
            Self::ToastDismissed { .. } => "toast_dismissed",
            Self::DismissError => "dismiss_error",
            Self::ThemeToggled => "theme_toggled",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::LoginOpened { .. }
                | Self::SendOtpRequested
                | Self::VerifyOtpRequested
                | Self::ResendOtpRequested
                | Self::ChangeIdentifierRequested
                | Self::LogoutRequested
                | Self::WizardOpened
                | Self::NextStepRequested
                | Self::BackStepRequested
                | Self::StepSelected { .. }
                | Self::ImagesSelected { .. }
                | Self::ImageRemoveRequested { .. }
                | Self::SubmitListingRequested
                | Self::DashboardOpened
                | Self::ListingDeleteRequested { .. }
                | Self::SearchRequested
                | Self::FavoriteToggled { .. }
                | Self::AdminLoginRequested { .. }
                | Self::AdminReviewRequested { .. }
                | Self::AdminLogoutRequested
                | Self::ConfirmAccepted
                | Self::ConfirmDismissed
                | Self::ToastDismissed { .. }
                | Self::DismissError
                | Self::ThemeToggled
        )
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::Noop
    }
}
