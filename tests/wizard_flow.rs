use autobazaar_core::capabilities::{BlobRef, HttpError, HttpHeaders, HttpResponse, HttpResult};
use autobazaar_core::event::Event;
use autobazaar_core::model::{
    Condition, FuelType, OwnerCount, Session, Token, Transmission, UserId, UserProfile,
};
use autobazaar_core::wizard::{
    ContactForm, DetailsForm, MediaStatus, PickedImage, PricingForm, StepForm, WizardStep,
};
use autobazaar_core::{App, Effect, Model};
use crux_core::testing::AppTester;

fn http_ok(body: &str) -> Box<HttpResult> {
    Box::new(Ok(HttpResponse::new(
        200,
        HttpHeaders::new(),
        body.as_bytes().to_vec(),
        "req-test".into(),
    )))
}

fn http_status(status: u16, body: &str) -> Box<HttpResult> {
    Box::new(Ok(HttpResponse::new(
        status,
        HttpHeaders::new(),
        body.as_bytes().to_vec(),
        "req-test".into(),
    )))
}

fn http_offline() -> Box<HttpResult> {
    Box::new(Err(HttpError::Network {
        message: "connection refused".into(),
    }))
}

fn session() -> Session {
    Session {
        user: UserProfile {
            id: UserId::new("user_1"),
            phone_number: Some("+919999999999".into()),
            email: None,
            name: Some("Ravi".into()),
            city: Some("Pune".into()),
            is_verified: true,
        },
        access_token: Token::new("jwt_access"),
        refresh_token: Token::new("jwt_refresh"),
    }
}

fn details_form() -> DetailsForm {
    DetailsForm {
        brand: "Maruti Suzuki".into(),
        model: "Swift".into(),
        variant: "VXI".into(),
        year: "2019".into(),
        fuel_type: Some(FuelType::Petrol),
        transmission: Some(Transmission::Manual),
        km_driven: "42000".into(),
        owner_number: Some(OwnerCount::First),
        exterior_condition: Some(Condition::Good),
        interior_condition: Some(Condition::Good),
        engine_condition: Some(Condition::Excellent),
        accident_history: String::new(),
        features: vec!["Airbags".into()],
        description: "Single owner, full service history.".into(),
    }
}

fn pricing_form() -> PricingForm {
    PricingForm {
        price: "450000".into(),
        urgency: autobazaar_core::model::Urgency::Normal,
    }
}

fn contact_form() -> ContactForm {
    ContactForm {
        city: "Pune".into(),
        state: "Maharashtra".into(),
        area: "Baner".into(),
        address: String::new(),
        seller_name: "Ravi".into(),
        seller_phone: "9876543210".into(),
        seller_email: String::new(),
    }
}

fn picked_image(name: &str) -> PickedImage {
    PickedImage {
        name: name.into(),
        mime_type: "image/jpeg".into(),
        size_bytes: 512 * 1024,
        preview_url: format!("blob:{name}"),
        blob: BlobRef {
            uri: format!("blob:{name}"),
            size_bytes: Some(512 * 1024),
        },
    }
}

fn upload_ok(id: &str) -> Box<HttpResult> {
    http_ok(&format!(
        r#"{{"success":true,"data":{{"images":[{{"id":"{id}","url":"https://cdn.example.com/{id}.jpg","thumbnail":null,"size":524288}}]}}}}"#
    ))
}

/// Drive an authenticated wizard to the Media step with the three form
/// steps filled and validated.
fn wizard_at_media(app: &AppTester<App, Effect>, model: &mut Model) {
    model.session.accept(session());
    app.update(Event::WizardOpened, model);

    app.update(
        Event::StepFormChanged(Box::new(StepForm::Details(details_form()))),
        model,
    );
    app.update(Event::NextStepRequested, model);
    assert_eq!(model.wizard.step, WizardStep::Pricing);

    app.update(
        Event::StepFormChanged(Box::new(StepForm::Pricing(pricing_form()))),
        model,
    );
    app.update(Event::NextStepRequested, model);
    assert_eq!(model.wizard.step, WizardStep::ContactLocation);

    app.update(
        Event::StepFormChanged(Box::new(StepForm::ContactLocation(contact_form()))),
        model,
    );
    app.update(Event::NextStepRequested, model);
    assert_eq!(model.wizard.step, WizardStep::Media);
}

fn local_id(model: &Model, index: usize) -> autobazaar_core::model::LocalId {
    model.wizard.draft.media[index].local_id.clone()
}

#[test]
fn step_gates_block_until_their_fields_are_valid() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    model.session.accept(session());
    app.update(Event::WizardOpened, &mut model);

    // Empty details: advancing is refused with field messages.
    app.update(Event::NextStepRequested, &mut model);
    assert_eq!(model.wizard.step, WizardStep::Details);
    assert!(!model.wizard.field_errors.is_empty());

    app.update(
        Event::StepFormChanged(Box::new(StepForm::Details(details_form()))),
        &mut model,
    );
    app.update(Event::NextStepRequested, &mut model);
    assert_eq!(model.wizard.step, WizardStep::Pricing);

    // Price below the minimum is refused with a price-specific message.
    app.update(
        Event::StepFormChanged(Box::new(StepForm::Pricing(PricingForm {
            price: "49999".into(),
            urgency: autobazaar_core::model::Urgency::Normal,
        }))),
        &mut model,
    );
    app.update(Event::NextStepRequested, &mut model);
    assert_eq!(model.wizard.step, WizardStep::Pricing);
    assert!(model
        .wizard
        .field_errors
        .iter()
        .any(|fe| fe.field == "price"));
}

#[test]
fn backward_navigation_is_lossless() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::StepSelected {
            step: WizardStep::Details,
        },
        &mut model,
    );
    assert_eq!(model.wizard.step, WizardStep::Details);
    assert_eq!(model.wizard.draft.pricing.price, "450000");
    assert_eq!(model.wizard.draft.contact.city, "Pune");
}

#[test]
fn media_gate_blocks_submission_without_an_uploaded_image() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    let update = app.update(Event::SubmitListingRequested, &mut model);

    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
    assert_ne!(model.wizard.step, WizardStep::Submitted);
    assert!(model
        .wizard
        .field_errors
        .iter()
        .any(|fe| fe.field == "images"));
}

#[test]
fn upload_reconciles_the_local_preview_with_the_remote_reference() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    let update = app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
    assert_eq!(model.wizard.draft.media.len(), 1);
    assert_eq!(model.wizard.draft.media[0].status, MediaStatus::Uploading);

    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );

    let item = &model.wizard.draft.media[0];
    assert_eq!(item.status, MediaStatus::Uploaded);
    assert_eq!(item.remote.as_ref().unwrap().id.as_str(), "file-1");
}

#[test]
fn failed_upload_is_reported_per_file() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg"), picked_image("rear.jpg")],
        },
        &mut model,
    );

    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 1),
            result: http_offline(),
        },
        &mut model,
    );

    assert_eq!(model.wizard.draft.media[0].status, MediaStatus::Uploaded);
    assert_eq!(model.wizard.draft.media[1].status, MediaStatus::Failed);
    // The failure toast names the file.
    assert!(model
        .toasts
        .iter()
        .any(|t| t.message.contains("rear.jpg")));
}

#[test]
fn oversized_and_non_image_files_are_rejected_individually() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    let mut huge = picked_image("huge.jpg");
    huge.size_bytes = autobazaar_core::MAX_IMAGE_BYTES + 1;
    let mut video = picked_image("clip.mp4");
    video.mime_type = "video/mp4".into();

    let update = app.update(
        Event::ImagesSelected {
            files: vec![huge, video, picked_image("ok.jpg")],
        },
        &mut model,
    );

    // Only the acceptable file starts an upload.
    let calls = update
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::Http(_)))
        .count();
    assert_eq!(calls, 1);
    assert_eq!(model.wizard.draft.media.len(), 1);
    assert!(model.toasts.iter().any(|t| t.message.contains("huge.jpg")));
    assert!(model.toasts.iter().any(|t| t.message.contains("clip.mp4")));
}

#[test]
fn submit_is_idempotent_while_in_flight() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );

    let first = app.update(Event::SubmitListingRequested, &mut model);
    let second = app.update(Event::SubmitListingRequested, &mut model);

    let first_calls = first
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::Http(_)))
        .count();
    let second_calls = second
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::Http(_)))
        .count();
    assert_eq!(first_calls, 1);
    assert_eq!(second_calls, 0);
    assert!(model.wizard.submit_in_flight);
}

#[test]
fn successful_submission_is_terminal_and_discards_the_draft() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );
    app.update(Event::SubmitListingRequested, &mut model);
    app.update(
        Event::SubmitListingResponse(http_ok(
            r#"{"success":true,"data":{"id":"car_42","status":"pending","estimatedApprovalTime":"24-48 hours"}}"#,
        )),
        &mut model,
    );

    assert_eq!(model.wizard.step, WizardStep::Submitted);
    assert_eq!(model.wizard.submitted_id.as_ref().unwrap().as_str(), "car_42");
    assert!(model.wizard.draft.media.is_empty());
    assert!(model.wizard.draft.details.brand.is_empty());

    // The terminal step accepts no further mutation.
    let update = app.update(Event::SubmitListingRequested, &mut model);
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
    app.update(
        Event::StepFormChanged(Box::new(StepForm::Pricing(pricing_form()))),
        &mut model,
    );
    assert!(model.wizard.draft.pricing.price.is_empty());

    // A fresh wizard starts from a clean draft.
    app.update(Event::WizardOpened, &mut model);
    assert_eq!(model.wizard.step, WizardStep::Details);
    assert!(model.wizard.submitted_id.is_none());
}

#[test]
fn server_price_rejection_returns_to_the_pricing_step() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );
    app.update(Event::SubmitListingRequested, &mut model);
    app.update(
        Event::SubmitListingResponse(http_status(
            400,
            r#"{"success":false,"error":{"code":"VALIDATION_ERROR","message":"Invalid data","details":{"price":["Price is unrealistic for this model"]}}}"#,
        )),
        &mut model,
    );

    assert_eq!(model.wizard.step, WizardStep::Pricing);
    assert!(model
        .wizard
        .field_errors
        .iter()
        .any(|fe| fe.field == "price"));
    assert!(!model.wizard.submit_in_flight);
}

#[test]
fn network_failure_leaves_a_retryable_submission() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );
    app.update(Event::SubmitListingRequested, &mut model);
    app.update(Event::SubmitListingResponse(http_offline()), &mut model);

    assert_eq!(model.wizard.step, WizardStep::Media);
    let error = model.wizard.error.as_ref().expect("retryable error");
    assert!(error.is_retryable());
    assert!(!model.wizard.submit_in_flight);

    // The user may retry manually and succeed.
    let retry = app.update(Event::SubmitListingRequested, &mut model);
    assert!(retry.effects.iter().any(|e| matches!(e, Effect::Http(_))));
}

#[test]
fn removing_an_uploaded_image_requires_confirmation_and_a_remote_delete() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );

    let id = local_id(&model, 0);
    let update = app.update(
        Event::ImageRemoveRequested {
            local_id: id.clone(),
        },
        &mut model,
    );
    // No network call before the user confirms.
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
    assert!(model.confirm.is_some());

    let update = app.update(Event::ConfirmAccepted, &mut model);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
    assert_eq!(model.wizard.draft.media[0].status, MediaStatus::Deleting);

    app.update(
        Event::ImageDeleteResponse {
            local_id: id,
            result: http_status(204, ""),
        },
        &mut model,
    );
    assert!(model.wizard.draft.media.is_empty());
}

#[test]
fn failed_remote_delete_keeps_the_image_and_says_so() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );

    let id = local_id(&model, 0);
    app.update(
        Event::ImageRemoveRequested {
            local_id: id.clone(),
        },
        &mut model,
    );
    app.update(Event::ConfirmAccepted, &mut model);
    app.update(
        Event::ImageDeleteResponse {
            local_id: id,
            result: http_status(500, ""),
        },
        &mut model,
    );

    // Still in the draft, back to its settled state, with a distinct
    // notification.
    assert_eq!(model.wizard.draft.media.len(), 1);
    assert_eq!(model.wizard.draft.media[0].status, MediaStatus::Uploaded);
    assert!(model
        .toasts
        .iter()
        .any(|t| t.message.contains("still attached")));
}

#[test]
fn dismissing_the_confirmation_issues_no_call() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );

    app.update(
        Event::ImageRemoveRequested {
            local_id: local_id(&model, 0),
        },
        &mut model,
    );
    let update = app.update(Event::ConfirmDismissed, &mut model);

    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
    assert!(model.confirm.is_none());
    assert_eq!(model.wizard.draft.media.len(), 1);
}

#[test]
fn submit_is_blocked_while_an_upload_is_still_in_flight() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    wizard_at_media(&app, &mut model);

    app.update(
        Event::ImagesSelected {
            files: vec![picked_image("front.jpg"), picked_image("rear.jpg")],
        },
        &mut model,
    );
    app.update(
        Event::ImageUploadResponse {
            local_id: local_id(&model, 0),
            result: upload_ok("file-1"),
        },
        &mut model,
    );

    // One image uploaded, one still in flight: submission must wait.
    let update = app.update(Event::SubmitListingRequested, &mut model);
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
    assert!(model
        .wizard
        .field_errors
        .iter()
        .any(|fe| fe.field == "images"));
}
