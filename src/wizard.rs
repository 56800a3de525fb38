//! The four-step seller listing wizard: a linear state machine with
//! per-step validation gates, a staged media sub-flow, and a guarded final
//! submission.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::capabilities::BlobRef;
use crate::model::{
    Condition, FuelType, ListingId, LocalId, OwnerCount, RemoteFileId, Transmission, Urgency,
};
use crate::{
    AppError, FieldError, MAX_IMAGE_BYTES, MAX_LISTING_IMAGES, MAX_LISTING_PRICE,
    MIN_LISTING_PRICE, MIN_LISTING_YEAR,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Details,
    Pricing,
    ContactLocation,
    Media,
    Submitted,
}

impl WizardStep {
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Details => 0,
            Self::Pricing => 1,
            Self::ContactLocation => 2,
            Self::Media => 3,
            Self::Submitted => 4,
        }
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Details => Some(Self::Pricing),
            Self::Pricing => Some(Self::ContactLocation),
            Self::ContactLocation => Some(Self::Media),
            Self::Media | Self::Submitted => None,
        }
    }

    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        match self {
            Self::Details | Self::Submitted => None,
            Self::Pricing => Some(Self::Details),
            Self::ContactLocation => Some(Self::Pricing),
            Self::Media => Some(Self::ContactLocation),
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Details => "Car details",
            Self::Pricing => "Set your price",
            Self::ContactLocation => "Contact & location",
            Self::Media => "Add photos",
            Self::Submitted => "Submitted",
        }
    }
}

// --- Step forms (each step edits only its own fields) ---

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailsForm {
    pub brand: String,
    pub model: String,
    pub variant: String,
    pub year: String,
    pub fuel_type: Option<FuelType>,
    pub transmission: Option<Transmission>,
    pub km_driven: String,
    pub owner_number: Option<OwnerCount>,
    pub exterior_condition: Option<Condition>,
    pub interior_condition: Option<Condition>,
    pub engine_condition: Option<Condition>,
    pub accident_history: String,
    pub features: Vec<String>,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingForm {
    pub price: String,
    pub urgency: Urgency,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactForm {
    pub city: String,
    pub state: String,
    pub area: String,
    pub address: String,
    pub seller_name: String,
    pub seller_phone: String,
    pub seller_email: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StepForm {
    Details(DetailsForm),
    Pricing(PricingForm),
    ContactLocation(ContactForm),
}

// --- Media items ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Uploading,
    Uploaded,
    Failed,
    Deleting,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteImage {
    pub id: RemoteFileId,
    pub url: String,
    pub thumbnail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub local_id: LocalId,
    pub file_name: String,
    /// Revocable local preview owned by the shell.
    pub preview_url: String,
    pub status: MediaStatus,
    pub remote: Option<RemoteImage>,
}

impl MediaItem {
    #[must_use]
    pub const fn is_uploaded(&self) -> bool {
        matches!(self.status, MediaStatus::Uploaded)
    }
}

/// A file the shell picked: metadata plus a blob handle. The core never
/// sees the bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickedImage {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub preview_url: String,
    pub blob: BlobRef,
}

// --- The draft ---

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub details: DetailsForm,
    pub pricing: PricingForm,
    pub contact: ContactForm,
    pub media: Vec<MediaItem>,
}

impl ListingDraft {
    #[must_use]
    pub fn uploaded_images(&self) -> Vec<&MediaItem> {
        self.media.iter().filter(|m| m.is_uploaded()).collect()
    }

    #[must_use]
    pub fn has_upload_in_flight(&self) -> bool {
        self.media
            .iter()
            .any(|m| matches!(m.status, MediaStatus::Uploading))
    }

    #[must_use]
    pub fn media_item(&self, local_id: &LocalId) -> Option<&MediaItem> {
        self.media.iter().find(|m| &m.local_id == local_id)
    }

    pub fn media_item_mut(&mut self, local_id: &LocalId) -> Option<&mut MediaItem> {
        self.media.iter_mut().find(|m| &m.local_id == local_id)
    }

    pub fn remove_media(&mut self, local_id: &LocalId) {
        self.media.retain(|m| &m.local_id != local_id);
    }
}

// --- Validation ---

fn require(errors: &mut Vec<FieldError>, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, message));
    }
}

/// Details gate: every vehicle attribute present, year numeric and sane.
#[must_use]
pub fn validate_details(draft: &ListingDraft) -> Vec<FieldError> {
    let d = &draft.details;
    let mut errors = Vec::new();

    require(&mut errors, "brand_name", &d.brand, "Select your car's brand");
    require(&mut errors, "model_name", &d.model, "Select the model");
    require(&mut errors, "variant_name", &d.variant, "Select the variant");
    require(&mut errors, "km_driven", &d.km_driven, "Enter the kilometres driven");

    if d.year.trim().is_empty() {
        errors.push(FieldError::new("year", "Enter the registration year"));
    } else {
        match d.year.trim().parse::<u32>() {
            Ok(year) if year >= MIN_LISTING_YEAR => {}
            _ => errors.push(FieldError::new(
                "year",
                format!("Year must be {MIN_LISTING_YEAR} or later"),
            )),
        }
    }

    if !d.km_driven.trim().is_empty() && d.km_driven.trim().parse::<u64>().is_err() {
        errors.push(FieldError::new("km_driven", "Kilometres must be a number"));
    }

    if d.fuel_type.is_none() {
        errors.push(FieldError::new("fuel_type", "Select the fuel type"));
    }
    if d.transmission.is_none() {
        errors.push(FieldError::new("transmission", "Select the transmission"));
    }
    if d.owner_number.is_none() {
        errors.push(FieldError::new("owner_number", "Select the owner count"));
    }

    errors
}

/// Pricing gate: price must parse and sit inside the accepted band,
/// boundaries included.
#[must_use]
pub fn validate_pricing(draft: &ListingDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let raw = draft.pricing.price.trim();

    if raw.is_empty() {
        errors.push(FieldError::new("price", "Enter your expected price"));
        return errors;
    }

    match raw.parse::<u64>() {
        Ok(price) if price < MIN_LISTING_PRICE => errors.push(FieldError::new(
            "price",
            format!("Price must be at least \u{20b9}{MIN_LISTING_PRICE}"),
        )),
        Ok(price) if price > MAX_LISTING_PRICE => errors.push(FieldError::new(
            "price",
            format!("Price cannot exceed \u{20b9}{MAX_LISTING_PRICE}"),
        )),
        Ok(_) => {}
        Err(_) => errors.push(FieldError::new("price", "Price must be a number")),
    }

    errors
}

/// Contact gate: city, seller name, and a plausible phone number.
#[must_use]
pub fn validate_contact(draft: &ListingDraft) -> Vec<FieldError> {
    let c = &draft.contact;
    let mut errors = Vec::new();

    require(&mut errors, "city_name", &c.city, "Select your city");
    require(
        &mut errors,
        "contact.sellerName",
        &c.seller_name,
        "Enter your name",
    );

    if c.seller_phone.trim().is_empty() {
        errors.push(FieldError::new(
            "contact.phoneNumber",
            "Enter your phone number",
        ));
    } else if crate::model::Identifier::normalize(c.seller_phone.trim())
        .map(|id| !id.is_phone())
        .unwrap_or(true)
    {
        errors.push(FieldError::new(
            "contact.phoneNumber",
            "Enter a valid phone number",
        ));
    }

    errors
}

/// Media gate: at least one uploaded image, and nothing still uploading.
#[must_use]
pub fn validate_media(draft: &ListingDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if draft.uploaded_images().is_empty() {
        errors.push(FieldError::new(
            "images",
            "Add at least one photo of your car",
        ));
    } else if draft.has_upload_in_flight() {
        errors.push(FieldError::new(
            "images",
            "Wait for photos to finish uploading",
        ));
    }
    errors
}

#[must_use]
pub fn validate_step(step: WizardStep, draft: &ListingDraft) -> Vec<FieldError> {
    match step {
        WizardStep::Details => validate_details(draft),
        WizardStep::Pricing => validate_pricing(draft),
        WizardStep::ContactLocation => validate_contact(draft),
        WizardStep::Media => validate_media(draft),
        WizardStep::Submitted => Vec::new(),
    }
}

/// Validate every step in order; used by the final submission gate.
#[must_use]
pub fn validate_all(draft: &ListingDraft) -> Vec<FieldError> {
    [
        WizardStep::Details,
        WizardStep::Pricing,
        WizardStep::ContactLocation,
        WizardStep::Media,
    ]
    .into_iter()
    .flat_map(|step| validate_step(step, draft))
    .collect()
}

/// Which step owns a (possibly dotted) server field name. Unknown fields
/// land on Media, where the submit action lives.
#[must_use]
pub fn step_owning_field(field: &str) -> WizardStep {
    let leaf = field.rsplit('.').next().unwrap_or(field);
    match leaf {
        "brand_name" | "brand" | "model_name" | "model" | "variant_name" | "variant" | "year"
        | "fuel_type" | "transmission" | "km_driven" | "owner_number" | "exterior_condition"
        | "interior_condition" | "engine_condition" | "accident_history" | "features"
        | "description" => WizardStep::Details,
        "price" | "urgency" => WizardStep::Pricing,
        "city_name" | "city" | "state_name" | "state" | "area" | "address" | "contact"
        | "sellerName" | "phoneNumber" | "email" | "seller_name" | "seller_phone"
        | "seller_email" => WizardStep::ContactLocation,
        _ => WizardStep::Media,
    }
}

/// The earliest step owning any of the given errors; `None` when the list
/// is empty.
#[must_use]
pub fn first_step_with_errors(errors: &[FieldError]) -> Option<WizardStep> {
    errors
        .iter()
        .map(|fe| step_owning_field(&fe.field))
        .min_by_key(|step| step.index())
}

// --- Image intake checks (mirror the upload API's own limits) ---

/// Check one picked file against the client-side limits. The index is the
/// number of images already in the draft plus already-accepted files from
/// the same batch.
///
/// # Errors
///
/// A `Validation` error naming the file, so batch failures stay
/// individually attributable.
pub fn check_picked_image(picked: &PickedImage, existing_count: usize) -> Result<(), AppError> {
    if existing_count >= MAX_LISTING_IMAGES {
        return Err(AppError::validation(format!(
            "'{}' skipped: a listing can have at most {MAX_LISTING_IMAGES} photos",
            picked.name
        )));
    }
    if !picked.mime_type.starts_with("image/") {
        return Err(AppError::validation(format!(
            "'{}' is not an image",
            picked.name
        )));
    }
    if picked.size_bytes > MAX_IMAGE_BYTES {
        return Err(AppError::validation(format!(
            "'{}' is larger than {} MB",
            picked.name,
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

// --- Wire types ---

#[derive(Debug, Clone, Serialize)]
pub struct ContactPayload {
    #[serde(rename = "sellerName")]
    pub seller_name: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateListingBody {
    pub brand_name: String,
    pub model_name: String,
    pub variant_name: String,
    pub year: u32,
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    pub km_driven: u64,
    pub owner_number: OwnerCount,
    pub price: u64,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exterior_condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interior_condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_condition: Option<Condition>,
    pub accident_history: String,
    pub features: Vec<String>,
    pub city_name: String,
    pub state_name: String,
    pub area: String,
    pub address: String,
    pub description: String,
    pub contact: ContactPayload,
    pub image_ids: Vec<String>,
}

/// Assemble the submission payload, coercing numeric-looking string inputs
/// to numbers. Call only after [`validate_all`] passes; a draft that fails
/// coercion here reports the owning field rather than panicking.
///
/// # Errors
///
/// `Validation` with the offending field when coercion fails.
pub fn assemble_payload(draft: &ListingDraft) -> Result<CreateListingBody, AppError> {
    let d = &draft.details;

    let year = d
        .year
        .trim()
        .parse::<u32>()
        .map_err(|_| AppError::validation("Year must be a number").with_field("year", "Year must be a number"))?;
    let km_driven = d.km_driven.trim().parse::<u64>().map_err(|_| {
        AppError::validation("Kilometres must be a number")
            .with_field("km_driven", "Kilometres must be a number")
    })?;
    let price = draft.pricing.price.trim().parse::<u64>().map_err(|_| {
        AppError::validation("Price must be a number").with_field("price", "Price must be a number")
    })?;

    let missing = |field: &str, message: &str| {
        AppError::validation(message.to_string()).with_field(field, message)
    };

    let fuel_type = d
        .fuel_type
        .ok_or_else(|| missing("fuel_type", "Select the fuel type"))?;
    let transmission = d
        .transmission
        .ok_or_else(|| missing("transmission", "Select the transmission"))?;
    let owner_number = d
        .owner_number
        .ok_or_else(|| missing("owner_number", "Select the owner count"))?;

    let seller_phone = crate::model::Identifier::normalize(draft.contact.seller_phone.trim())
        .map_err(|e| e.with_field("contact.phoneNumber", "Enter a valid phone number"))?;

    let accident_history = if d.accident_history.trim().is_empty() {
        "No Accident".to_string()
    } else {
        d.accident_history.trim().to_string()
    };

    let email = draft.contact.seller_email.trim();

    Ok(CreateListingBody {
        brand_name: d.brand.trim().to_string(),
        model_name: d.model.trim().to_string(),
        variant_name: d.variant.trim().to_string(),
        year,
        fuel_type,
        transmission,
        km_driven,
        owner_number,
        price,
        urgency: draft.pricing.urgency,
        exterior_condition: d.exterior_condition,
        interior_condition: d.interior_condition,
        engine_condition: d.engine_condition,
        accident_history,
        features: d.features.clone(),
        city_name: draft.contact.city.trim().to_string(),
        state_name: draft.contact.state.trim().to_string(),
        area: draft.contact.area.trim().to_string(),
        address: draft.contact.address.trim().to_string(),
        description: d.description.trim().to_string(),
        contact: ContactPayload {
            seller_name: draft.contact.seller_name.trim().to_string(),
            phone_number: seller_phone.as_str().to_string(),
            email: if email.is_empty() {
                None
            } else {
                Some(email.to_string())
            },
        },
        image_ids: draft
            .uploaded_images()
            .iter()
            .filter_map(|m| m.remote.as_ref())
            .map(|r| r.id.as_str().to_string())
            .collect(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateListingData {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "estimatedApprovalTime")]
    pub estimated_approval_time: Option<String>,
    #[serde(default, rename = "listingUrl")]
    pub listing_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImageData {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadImagesData {
    #[serde(default)]
    pub images: Vec<UploadedImageData>,
}

// --- Wizard state ---

#[derive(Default)]
pub struct ListingWizard {
    pub step: WizardStep,
    pub draft: ListingDraft,
    pub field_errors: Vec<FieldError>,
    pub submit_in_flight: bool,
    /// Retryable submission error shown on the Media step.
    pub error: Option<AppError>,
    pub submitted_id: Option<ListingId>,
    /// Local ids with a delete call outstanding.
    pub deleting: BTreeSet<LocalId>,
}

impl ListingWizard {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.step, WizardStep::Submitted)
    }

    pub fn apply_form(&mut self, form: StepForm) {
        match form {
            StepForm::Details(details) => self.draft.details = details,
            StepForm::Pricing(pricing) => self.draft.pricing = pricing,
            StepForm::ContactLocation(contact) => self.draft.contact = contact,
        }
        self.field_errors.clear();
        self.error = None;
    }

    /// Advance past the current step when its gate passes; otherwise record
    /// the failures and stay put.
    pub fn try_advance(&mut self) -> bool {
        let errors = validate_step(self.step, &self.draft);
        if errors.is_empty() {
            if let Some(next) = self.step.next() {
                self.step = next;
                self.field_errors.clear();
                return true;
            }
            return false;
        }
        self.field_errors = errors;
        false
    }

    pub fn go_back(&mut self) {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
            self.field_errors.clear();
        }
    }

    /// Backward jumps only; forward movement goes through [`Self::try_advance`].
    pub fn select_step(&mut self, step: WizardStep) {
        if !self.is_terminal() && step.index() < self.step.index() {
            self.step = step;
            self.field_errors.clear();
        }
    }

    /// Mark the submission outcome where the server rejected named fields:
    /// jump to the earliest owning step with the errors attached.
    pub fn return_to_rejected_field(&mut self, errors: Vec<FieldError>) {
        if let Some(step) = first_step_with_errors(&errors) {
            self.step = step;
        }
        self.field_errors = errors;
    }
}
