use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::auth::AuthFlow;
use crate::session::{AdminStore, SessionStore};
use crate::wizard::ListingWizard;
use crate::{AppError, DEFAULT_API_BASE, DEFAULT_COUNTRY_CODE, MAX_TOASTS};

// --- Secret wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Token(String);

impl Token {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(ListingId);
typed_id!(ChallengeId);
typed_id!(LocalId);
typed_id!(RemoteFileId);

// --- Login identifier: validated, canonical ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identifier {
    /// Canonical `+<country><number>` form.
    Phone(String),
    /// Trimmed, lower-cased.
    Email(String),
}

impl Identifier {
    /// Normalize raw user input into a canonical identifier.
    ///
    /// Phone numbers lose separators and gain the default country code when
    /// entered as a bare 10-digit number (a leading `0` is stripped first).
    /// Emails are trimmed and lower-cased, with only a minimal shape check.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for empty input or input matching
    /// neither shape; the message names what was wrong.
    pub fn normalize(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation(
                "Enter your phone number or email address",
            ));
        }

        if trimmed.contains('@') {
            return Self::normalize_email(trimmed);
        }
        Self::normalize_phone(trimmed)
    }

    fn normalize_email(trimmed: &str) -> Result<Self, AppError> {
        let email = trimmed.to_lowercase();
        let mut parts = email.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();

        let domain_ok = {
            let mut labels = domain.split('.');
            domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && labels.all(|l| !l.is_empty())
        };

        if local.is_empty() || !domain_ok || domain.contains('@') {
            return Err(AppError::validation("Enter a valid email address"));
        }
        Ok(Self::Email(email))
    }

    fn normalize_phone(trimmed: &str) -> Result<Self, AppError> {
        let cleaned: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();

        let (has_plus, digits) = match cleaned.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::validation("Enter a valid phone number"));
        }

        if has_plus {
            if !(8..=15).contains(&digits.len()) {
                return Err(AppError::validation("Enter a valid phone number"));
            }
            return Ok(Self::Phone(format!("+{digits}")));
        }

        let national = digits.strip_prefix('0').unwrap_or(digits);
        match national.len() {
            10 => Ok(Self::Phone(format!("{DEFAULT_COUNTRY_CODE}{national}"))),
            12 if national.starts_with("91") => Ok(Self::Phone(format!("+{national}"))),
            _ => Err(AppError::validation("Enter a valid phone number")),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Phone(s) | Self::Email(s) => s,
        }
    }

    #[must_use]
    pub const fn is_phone(&self) -> bool {
        matches!(self, Self::Phone(_))
    }

    /// Masked form for display, e.g. `+91****3210` or `r***@example.com`.
    #[must_use]
    pub fn masked(&self) -> String {
        match self {
            Self::Phone(s) if s.len() > 7 => {
                format!("{}****{}", &s[..3], &s[s.len() - 4..])
            }
            Self::Phone(s) => s.clone(),
            Self::Email(s) => {
                let mut parts = s.splitn(2, '@');
                let local = parts.next().unwrap_or_default();
                let domain = parts.next().unwrap_or_default();
                let head = local.chars().next().map(String::from).unwrap_or_default();
                format!("{head}***@{domain}")
            }
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Domain enums matching the backend vocabulary ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Petrol,
    Diesel,
    Cng,
    Electric,
    Hybrid,
    Lpg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transmission {
    Manual,
    Automatic,
    Cvt,
    Amt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerCount {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
    #[serde(rename = "4th+")]
    FourthPlus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
    VeryUrgent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Excellent,
    Good,
    Average,
    Poor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Sold,
    Inactive,
    #[serde(other)]
    Unknown,
}

impl ListingStatus {
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Approved)
    }
}

// --- Users & sessions ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    pub access_token: Token,
    pub refresh_token: Token,
}

impl Session {
    /// A session is only trustworthy when the user record and both tokens
    /// are present; anything less is treated as corrupted storage.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user.id.as_str().is_empty()
            && !self.access_token.is_empty()
            && !self.refresh_token.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminSession {
    pub user: AdminProfile,
    pub token: Token,
}

impl AdminSession {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user.id.is_empty() && !self.token.is_empty()
    }
}

/// An OTP challenge issued by the server. Replaced wholesale on resend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub id: ChallengeId,
    pub target: Identifier,
    pub masked_target: Option<String>,
    pub dev_hint: Option<String>,
}

// --- Routing ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Home,
    Login,
    Sell,
    SellerDashboard,
    Listing { id: ListingId },
    AdminLogin,
    AdminDashboard,
}

impl Route {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".into(),
            Self::Login => "/login".into(),
            Self::Sell => "/sell".into(),
            Self::SellerDashboard => "/seller/dashboard".into(),
            Self::Listing { id } => format!("/listing/{id}"),
            Self::AdminLogin => "/admin/login".into(),
            Self::AdminDashboard => "/admin".into(),
        }
    }
}

// --- App configuration ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
        }
    }
}

/// Which durable value a storage acknowledgement refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhichStore {
    Session,
    AdminSession,
    Theme,
}

// --- Theme ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

// --- Toasts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

/// Bounded FIFO queue; the oldest toast is evicted once the queue is full.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastQueue {
    items: VecDeque<ToastMessage>,
    next_id: u64,
}

impl ToastQueue {
    pub fn push(&mut self, message: impl Into<String>, kind: ToastKind) {
        if self.items.len() >= MAX_TOASTS {
            self.items.pop_front();
        }
        self.next_id += 1;
        self.items.push_back(ToastMessage {
            id: self.next_id,
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        });
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|t| t.id != id);
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &ToastMessage> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// --- Confirmation modal ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConfirmAction {
    RemoveImage { local_id: LocalId },
    DeleteListing { id: ListingId },
}

impl ConfirmAction {
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::RemoveImage { .. } => "Remove this photo from your listing?",
            Self::DeleteListing { .. } => {
                "Delete this listing? This cannot be undone."
            }
        }
    }

    #[must_use]
    pub const fn confirm_label(&self) -> &'static str {
        match self {
            Self::RemoveImage { .. } => "Remove",
            Self::DeleteListing { .. } => "Delete",
        }
    }
}

// --- Listings as returned by search / seller endpoints ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: ListingId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub original_price: Option<u64>,
    #[serde(default)]
    pub fuel_type: Option<FuelType>,
    #[serde(default)]
    pub transmission: Option<Transmission>,
    #[serde(default)]
    pub km_driven: Option<u64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub status: Option<ListingStatus>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub views_count: Option<u64>,
    #[serde(default)]
    pub inquiries_count: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerStats {
    #[serde(default)]
    pub total_listings: u64,
    #[serde(default)]
    pub active_listings: u64,
    #[serde(default)]
    pub pending_listings: u64,
    #[serde(default)]
    pub total_views: u64,
    #[serde(default)]
    pub total_inquiries: u64,
}

// --- Seller dashboard: stats and listings fetched jointly ---

#[derive(Default)]
pub struct DashboardState {
    pub stats_pending: bool,
    pub listings_pending: bool,
    pub stats: Option<SellerStats>,
    pub listings: Option<Vec<ListingSummary>>,
    pub error: Option<AppError>,
    pub deleting: std::collections::BTreeSet<ListingId>,
}

impl DashboardState {
    /// The combined view is ready only once both responses have landed; no
    /// ordering between the two is assumed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.stats.is_some() && self.listings.is_some()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.stats_pending || self.listings_pending
    }
}

// --- Public search ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    YearDesc,
    KmAsc,
}

impl SortBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "created_at",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::YearDesc => "year_desc",
            Self::KmAsc => "km_asc",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub q: Option<String>,
    pub brand: Option<String>,
    pub fuel_type: Option<FuelType>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub city: Option<String>,
    pub year: Option<u32>,
    pub transmission: Option<Transmission>,
    pub sort_by: SortBy,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SearchFilters {
    /// Query pairs in the API's parameter vocabulary. Page is clamped to at
    /// least 1 and limit to the server maximum.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = self.q.as_ref().filter(|q| !q.trim().is_empty()) {
            pairs.push(("q", q.trim().to_string()));
        }
        if let Some(brand) = &self.brand {
            pairs.push(("brand", brand.clone()));
        }
        if let Some(fuel) = self.fuel_type {
            pairs.push(("fuel_type", enum_str(&fuel)));
        }
        if let Some(min) = self.min_price {
            pairs.push(("min_price", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("max_price", max.to_string()));
        }
        if let Some(city) = &self.city {
            pairs.push(("city", city.clone()));
        }
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        if let Some(transmission) = self.transmission {
            pairs.push(("transmission", enum_str(&transmission)));
        }
        pairs.push(("sort_by", self.sort_by.as_str().to_string()));
        pairs.push(("page", self.page.unwrap_or(1).max(1).to_string()));
        pairs.push((
            "limit",
            self.limit
                .unwrap_or(crate::DEFAULT_PAGE_SIZE)
                .clamp(1, crate::MAX_PAGE_SIZE)
                .to_string(),
        ));
        pairs
    }
}

/// Serialize a unit-variant enum to its wire string ("petrol", "manual", ...).
fn enum_str<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

#[derive(Default)]
pub struct SearchState {
    pub filters: SearchFilters,
    pub loading: bool,
    pub results: Vec<ListingSummary>,
    pub total: Option<u64>,
    pub error: Option<AppError>,
    pub favorites: std::collections::BTreeSet<ListingId>,
    pub favorite_pending: std::collections::BTreeSet<ListingId>,
}

// --- Admin surface ---

#[derive(Default)]
pub struct AdminState {
    pub store: AdminStore,
    pub logging_in: bool,
    pub error: Option<AppError>,
    pub review_pending: std::collections::BTreeSet<ListingId>,
}

// --- The model ---

#[derive(Default)]
pub struct Model {
    pub config: AppConfig,
    pub started: bool,

    pub session: SessionStore,
    pub auth: AuthFlow,
    pub wizard: ListingWizard,
    pub dashboard: DashboardState,
    pub search: SearchState,
    pub admin: AdminState,

    pub theme: Theme,
    pub toasts: ToastQueue,
    pub confirm: Option<ConfirmAction>,
}

impl Model {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toasts.push(message, kind);
    }

    /// Surface an error: toast for transient problems, otherwise the owning
    /// flow keeps it inline. Either way it is never dropped silently.
    pub fn toast_error(&mut self, error: &AppError) {
        self.toasts.push(error.user_facing_message(), ToastKind::Error);
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn ten_digit_numbers_normalize_to_a_fixed_point(digits in "[1-9][0-9]{9}") {
            let id = Identifier::normalize(&digits).unwrap();
            prop_assert!(id.is_phone());
            let phone = id.as_str().to_string();
            prop_assert!(phone.starts_with("+91"));
            prop_assert_eq!(phone.len(), 13);

            // Normalizing the canonical form is a no-op.
            let again = Identifier::normalize(&phone).unwrap();
            prop_assert_eq!(again.as_str(), phone.as_str());
        }

        #[test]
        fn separators_never_change_the_normalized_number(digits in "[1-9][0-9]{9}") {
            let spaced = format!("{} {}-{}", &digits[..4], &digits[4..7], &digits[7..]);
            let plain = Identifier::normalize(&digits).unwrap();
            let formatted = Identifier::normalize(&spaced).unwrap();
            prop_assert_eq!(plain, formatted);
        }
    }
}
