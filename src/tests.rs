use super::*;
use crate::contact::{
    config_report, confirmation_email, notification_email, select_backend, to_message, ContactForm,
    ContactResponse, DeliveryBackend, Party, SmtpSink, UnconfiguredSink, FAILURE_MESSAGE,
    INVALID_BODY_MESSAGE, INVALID_EMAIL_MESSAGE, REQUIRED_FIELDS_MESSAGE, SUCCESS_MESSAGE,
};
use crate::loader::{LoadHandle, Liveness};
use crate::render::LiveUpdate;
use crate::server::{respond_to, route, ServerContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tiny_http::Method;

/// Succeeds for every reference except the ones listed as failing
#[derive(Default)]
struct FakeLoader {
    failing: Vec<String>,
}

impl ImageLoader for FakeLoader {
    fn load(&self, source: &ImageSource) -> Result<()> {
        if self.failing.iter().any(|f| f == &source.reference) {
            Err(PanelError::InvalidImageSource(source.reference.clone()))
        } else {
            Ok(())
        }
    }
}

fn panel_config(interval_ms: i64) -> PanelConfig {
    PanelConfig {
        auto_play_interval_ms: interval_ms,
        preload_delay_ms: 100,
    }
}

fn simulation(references: &[&str], interval_ms: i64, failing: &[&str]) -> Simulation {
    let loader = FakeLoader {
        failing: failing.iter().map(|s| s.to_string()).collect(),
    };
    Simulation::mount(
        ImageSet::from_references(references),
        panel_config(interval_ms),
        Arc::new(loader),
    )
}

fn started_epoch(effects: &[Effect]) -> Option<u64> {
    effects.iter().find_map(|e| match e {
        Effect::StartTimer { epoch, .. } => Some(*epoch),
        _ => None,
    })
}

fn write_png(path: &Path) {
    image::RgbImage::new(2, 2)
        .save(path)
        .expect("Failed to write test image");
}

#[test]
fn test_empty_set_renders_fallback() {
    let sim = simulation(&[], 1000, &[]);
    let snapshot = sim.snapshot();

    assert!(snapshot.layers.is_empty());
    assert_eq!(snapshot.current_index, None);
    assert!(!sim.has_timer());
    assert!(sim.pending_loads().is_empty());

    let html = render_panel(&snapshot, "<h1>Welcome</h1>", &RenderOptions::default());
    assert!(!html.contains("hero-layer"));
    assert!(html.contains("hero-scrim"));
    assert!(html.contains("z-index: 10;\"><h1>Welcome</h1>"));
}

#[test]
fn test_single_image_never_rotates() {
    let (_, effects) = RotatingPanel::mount(ImageSet::from_references(["a.jpg"]), panel_config(1000));

    // Only the first image is requested; no preload and no timer
    assert_eq!(effects.len(), 2);
    assert!(matches!(&effects[0], Effect::Load(r) if r.ticket.index == 0));
    assert_eq!(effects[1], Effect::StopTimer);

    let mut sim = simulation(&["a.jpg"], 1000, &[]);
    assert_eq!(sim.snapshot().visible_layer(), None);

    sim.settle();
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.current_index, Some(0));
    assert_eq!(snapshot.visible_layer().map(|l| l.index), Some(0));
    assert!(!sim.tick(), "A single image must not arm a timer");
}

#[test]
fn test_three_images_rotate_in_order() {
    let mut sim = simulation(&["a.jpg", "b.jpg", "c.jpg"], 1000, &[]);
    sim.settle();
    assert_eq!(sim.snapshot().current_index, Some(0));

    let mut seen = Vec::new();
    for _ in 0..3 {
        sim.run_ticks(1);
        seen.push(sim.snapshot().current_index);
    }
    assert_eq!(seen, vec![Some(1), Some(2), Some(0)]);
    assert_eq!(sim.snapshot().loaded, vec![0, 1, 2]);
}

#[test]
fn test_current_index_after_k_ticks() {
    let mut sim = simulation(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"], 250, &[]);
    sim.settle();

    for k in 1..=10 {
        sim.run_ticks(1);
        assert_eq!(sim.snapshot().current_index, Some(k % 4));
    }
}

#[test]
fn test_unloaded_current_image_stays_hidden() {
    let mut sim = simulation(&["a.jpg", "b.jpg"], 1000, &["b.jpg"]);
    sim.settle();
    sim.run_ticks(1);

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.current_index, Some(1));
    assert_eq!(snapshot.loaded, vec![0]);
    assert_eq!(snapshot.visible_layer(), None);

    // The current layer is on top but fully transparent
    assert_eq!(snapshot.layers[1].z_index, 1);
    assert_eq!(snapshot.layers[1].opacity, 0.0);
    assert_eq!(snapshot.layers[0].opacity, 0.0);
}

#[test]
fn test_failed_load_is_requested_again_on_tick() {
    let mut sim = simulation(&["a.jpg", "b.jpg"], 1000, &["b.jpg"]);
    sim.settle();
    assert!(sim.pending_loads().is_empty());

    assert!(sim.tick());
    assert_eq!(sim.pending_loads(), vec![1]);
}

#[test]
fn test_unmount_ignores_late_completions() {
    let mut sim = simulation(&["a.jpg", "b.jpg", "c.jpg"], 1000, &[]);
    let request = sim.drop_load(0).expect("First image should be requested on mount");

    sim.unmount();
    assert!(!sim.deliver_loaded(&request));

    let snapshot = sim.snapshot();
    assert!(!snapshot.mounted);
    assert!(!snapshot.rotating);
    assert!(snapshot.loaded.is_empty());
    assert!(!sim.tick(), "Unmount must clear the timer");
}

#[test]
fn test_unmount_is_final() {
    let (mut panel, _) = RotatingPanel::mount(ImageSet::from_references(["a", "b"]), panel_config(1000));
    let generation = panel.generation();

    assert_eq!(panel.unmount(), vec![Effect::StopTimer]);
    assert!(panel.unmount().is_empty());
    assert!(panel.set_images(ImageSet::from_references(["c"])).is_empty());
    assert!(panel.set_interval(5).is_empty());
    assert!(panel.on_background_preload(generation).is_empty());
    assert!(!panel.is_mounted());
}

#[test]
fn test_tick_loads_next_image_just_in_time() {
    let mut sim = simulation(&["a.jpg", "b.jpg", "c.jpg"], 1000, &[]);
    sim.complete_loads();

    assert!(sim.tick());
    assert_eq!(sim.pending_loads(), vec![1]);
    assert_eq!(sim.snapshot().current_index, Some(1));
    assert_eq!(sim.snapshot().visible_layer(), None);

    sim.complete_loads();
    assert_eq!(sim.snapshot().visible_layer().map(|l| l.index), Some(1));
}

#[test]
fn test_background_preload_requests_remaining_in_order() {
    let mut sim = simulation(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"], 1000, &[]);
    assert_eq!(sim.pending_loads(), vec![0]);

    sim.run_background_preload();
    assert_eq!(sim.pending_loads(), vec![0, 1, 2, 3]);
}

#[test]
fn test_in_flight_loads_are_not_requested_twice() {
    let mut sim = simulation(&["a.jpg", "b.jpg"], 1000, &[]);

    assert!(sim.tick());
    sim.run_background_preload();
    assert_eq!(sim.pending_loads(), vec![0, 1]);
    assert_eq!(sim.panel().in_flight().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_duplicate_completion_is_idempotent() {
    let (mut panel, effects) = RotatingPanel::mount(ImageSet::from_references(["a", "b"]), panel_config(1000));
    let Some(Effect::Load(request)) = effects.into_iter().next() else {
        panic!("Mount should request the first image");
    };

    assert!(panel.on_loaded(request.ticket));
    assert!(!panel.on_loaded(request.ticket));
    assert_eq!(panel.state().loaded_count(), 1);
}

#[test]
fn test_interval_change_restarts_timer() {
    let (mut panel, effects) = RotatingPanel::mount(ImageSet::from_references(["a", "b"]), panel_config(1000));
    let old_epoch = started_epoch(&effects).expect("Two images should start a timer");

    let effects = panel.set_interval(2000);
    let new_epoch = started_epoch(&effects).expect("A new interval should start a timer");
    assert_ne!(old_epoch, new_epoch);
    assert!(effects.contains(&Effect::StartTimer {
        epoch: new_epoch,
        interval: Duration::from_millis(2000),
    }));

    // Ticks from the replaced timer do nothing
    assert!(panel.on_tick(old_epoch).is_empty());
    assert_eq!(panel.state().current_index(), Some(0));

    panel.on_tick(new_epoch);
    assert_eq!(panel.state().current_index(), Some(1));
}

#[test]
fn test_non_positive_interval_disables_rotation() {
    let (panel, effects) = RotatingPanel::mount(ImageSet::from_references(["a", "b"]), panel_config(-5));
    assert_eq!(started_epoch(&effects), None);
    assert!(!panel.snapshot().rotating);

    let mut sim = simulation(&["a", "b"], 1000, &[]);
    assert!(sim.has_timer());
    sim.set_interval(0);
    assert!(!sim.has_timer());
    assert!(!sim.tick());

    sim.set_interval(500);
    assert!(sim.has_timer());
    assert_eq!(sim.snapshot().interval_ms, 500);
}

#[test]
fn test_set_images_resets_state() {
    let mut sim = simulation(&["a", "b", "c"], 1000, &[]);
    sim.settle();
    sim.run_ticks(2);
    let generation = sim.snapshot().generation;

    // An identical set keeps everything
    sim.set_images(ImageSet::from_references(["a", "b", "c"]));
    assert_eq!(sim.snapshot().generation, generation);
    assert_eq!(sim.snapshot().current_index, Some(2));

    sim.set_images(ImageSet::from_references(["x", "y"]));
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.generation, generation + 1);
    assert_eq!(snapshot.current_index, Some(0));
    assert!(snapshot.loaded.is_empty());
    assert_eq!(sim.pending_loads(), vec![0]);
}

#[test]
fn test_stale_ticket_after_reset_is_ignored() {
    let (mut panel, _) = RotatingPanel::mount(ImageSet::from_references(["a", "b"]), panel_config(1000));
    let old = LoadTicket {
        generation: panel.generation(),
        index: 1,
    };

    panel.set_images(ImageSet::from_references(["c", "d"]));
    assert!(!panel.on_loaded(old));
    assert!(!panel.state().is_loaded(1));
}

#[test]
fn test_display_state() {
    let mut state = DisplayState::new(3);
    assert_eq!(state.current_index(), Some(0));
    assert_eq!(state.visible_index(), None);

    assert!(state.mark_loaded(0));
    assert!(!state.mark_loaded(0));
    assert!(!state.mark_loaded(7));
    assert_eq!(state.visible_index(), Some(0));
    assert_eq!(state.layer_opacity(0), 1.0);

    assert_eq!(state.advance(), Some(1));
    assert_eq!(state.layer_opacity(0), 0.0);
    assert_eq!(state.layer_z_index(1), 1);
    assert_eq!(state.layer_z_index(0), 0);
    assert_eq!(state.advance(), Some(2));
    assert_eq!(state.advance(), Some(0));

    let empty = DisplayState::new(0);
    assert_eq!(empty.current_index(), None);
    assert_eq!(empty.next_index(), None);
}

#[test]
fn test_liveness_and_load_handles() {
    let liveness = Arc::new(Liveness::new(1));
    let handle = LoadHandle::new(LoadTicket { generation: 1, index: 0 }, liveness.clone());
    assert!(!handle.is_stale());

    liveness.set_generation(2);
    assert!(handle.is_stale());

    liveness.dispose();
    liveness.set_generation(1);
    assert!(liveness.is_disposed());
    assert!(handle.is_stale());
}

#[test]
fn test_image_source_remote_detection() {
    assert!(ImageSource::new("https://example.com/hero.jpg").is_remote);
    assert!(ImageSource::new("http://example.com/hero.jpg").is_remote);
    assert!(!ImageSource::new("photos/hero.jpg").is_remote);
    assert!(!ImageSource::new("ftp://example.com/hero.jpg").is_remote);
    assert_eq!(ImageSource::new("photos/hero.jpg").public_url, "photos/hero.jpg");
}

#[test]
fn test_find_images_sorted_with_prefix() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_png(&temp_dir.path().join("b.png"));
    write_png(&temp_dir.path().join("a.png"));
    std::fs::write(temp_dir.path().join("notes.txt"), "not an image").expect("Failed to write file");

    let sources = find_images(temp_dir.path(), "*", "/images/").expect("Failed to find images");
    let urls: Vec<&str> = sources.iter().map(|s| s.public_url.as_str()).collect();
    assert_eq!(urls, vec!["/images/a.png", "/images/b.png"]);
    assert!(sources.iter().all(|s| !s.is_remote));
}

#[test]
fn test_find_images_errors() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert!(matches!(
        find_images(temp_dir.path(), "*", "/images"),
        Err(PanelError::NoImagesFoundError(_))
    ));
    assert!(matches!(
        find_images(&temp_dir.path().join("missing"), "*", "/images"),
        Err(PanelError::PathNotFoundError(_))
    ));

    let config = WatchConfig {
        image_dir: temp_dir.path().to_path_buf(),
        ..WatchConfig::default()
    };
    let set = watch::scan_image_set(&config).expect("An empty directory is not an error");
    assert!(set.is_empty());
}

#[test]
fn test_fetching_loader_local_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let good = temp_dir.path().join("good.png");
    let bad = temp_dir.path().join("bad.png");
    write_png(&good);
    std::fs::write(&bad, b"definitely not a png").expect("Failed to write file");

    let loader = FetchingLoader::new(Duration::from_secs(5)).expect("Failed to build loader");
    assert!(loader.load(&ImageSource::local(&good, "/images/good.png")).is_ok());
    assert!(matches!(
        loader.load(&ImageSource::local(&bad, "/images/bad.png")),
        Err(PanelError::DecodeError { .. })
    ));
    assert!(matches!(
        loader.load(&ImageSource::new(&temp_dir.path().join("gone.png").to_string_lossy())),
        Err(PanelError::PathNotFoundError(_))
    ));
}

#[test]
fn test_config_from_vars() {
    let vars: HashMap<&str, &str> = [
        ("HERO_INTERVAL_MS", "2500"),
        ("HERO_FADE_MS", "abc"),
        ("PORT", "9000"),
        ("BREVO_API_KEY", "  "),
        ("CONTACT_EMAIL", "owner@example.com"),
        ("CONTACT_EXPOSE_ERRORS", "true"),
    ]
    .into_iter()
    .collect();

    let config = Config::from_vars(|key| vars.get(key).map(|v| v.to_string()));
    assert_eq!(config.auto_play_interval_ms, 2500);
    assert_eq!(config.fade_duration_ms, config::DEFAULT_FADE_MS);
    assert_eq!(config.port, 9000);
    assert_eq!(config.contact.brevo_api_key, None);
    assert_eq!(config.contact.contact_email.as_deref(), Some("owner@example.com"));
    assert!(config.contact.expose_errors);
    assert!(!config.contact.is_complete());

    assert_eq!(config.get_panel_config(None).auto_play_interval_ms, 2500);
    assert_eq!(config.get_panel_config(Some(-1)).rotation_interval(), None);
}

#[test]
fn test_render_layers() {
    let mut sim = simulation(&["a.jpg", "b.jpg"], 1000, &[]);
    sim.settle();
    let html = render_panel(&sim.snapshot(), "<p>Hi</p>", &RenderOptions::default());

    assert_eq!(html.matches("class=\"hero-layer\"").count(), 2);
    assert!(html.contains("background-image: url('a.jpg')"));
    assert!(html.contains("transition: opacity 1000ms ease-in-out; opacity: 1; z-index: 1;"));
    assert!(html.contains("transition: opacity 1000ms ease-in-out; opacity: 0; z-index: 0;"));
    assert!(html.contains("background-color: rgba(15, 23, 42, 0.7); z-index: 2;"));
    assert!(html.contains("z-index: 3;\"><p>Hi</p>"));
}

#[test]
fn test_generate_page() {
    let sim = simulation(&["a.jpg"], 1000, &[]);
    let live = LiveUpdate {
        snapshot_url: "/api/panel".to_string(),
        poll_interval_ms: 250,
    };

    let page = generate_page(&sim.snapshot(), "Tom & Co", "", &RenderOptions::default(), Some(&live));
    assert!(page.contains("<!DOCTYPE html>"));
    assert!(page.contains("<title>Tom &amp; Co</title>"));
    assert!(page.contains("fetch('/api/panel')"));

    let page = generate_page(&sim.snapshot(), "Hero", "", &RenderOptions::default(), None);
    assert!(!page.contains("<script>"));
}

/// Records deliveries, or fails every one of them
#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<ContactSubmission>>,
    fail: bool,
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, submission: &ContactSubmission) -> Result<()> {
        if self.fail {
            return Err(PanelError::DeliveryError("Brevo API error: unauthorized".to_string()));
        }
        self.delivered.lock().push(submission.clone());
        Ok(())
    }
}

fn form(name: &str, email: &str, phone: &str, company: &str) -> ContactForm {
    ContactForm {
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        phone: Some(phone.to_string()),
        company: Some(company.to_string()),
        message: None,
    }
}

#[test]
fn test_contact_form_validation() {
    let submission = form("  Ada ", "ada@example.com ", "555", "Analytical")
        .validate()
        .expect("Form should be valid");
    assert_eq!(submission.name, "Ada");
    assert_eq!(submission.email, "ada@example.com");
    assert_eq!(submission.message, None);

    let err = form("Ada", "ada@example.com", "   ", "Analytical")
        .validate()
        .unwrap_err();
    assert_eq!(err.to_string(), REQUIRED_FIELDS_MESSAGE);

    let err = form("Ada", "not-an-email", "555", "Analytical")
        .validate()
        .unwrap_err();
    assert_eq!(err.to_string(), INVALID_EMAIL_MESSAGE);
}

#[test]
fn test_handle_submission() {
    let sink = RecordingSink::default();
    let body = r#"{"name":"Ada","email":"ada@example.com","phone":"555","company":"Analytical","message":"Hello"}"#;

    let (status, response) = handle_submission(body, &sink, false);
    assert_eq!(status, 200);
    assert_eq!(response.message, SUCCESS_MESSAGE);
    assert_eq!(sink.delivered.lock().len(), 1);
    assert_eq!(sink.delivered.lock()[0].message.as_deref(), Some("Hello"));

    let (status, response) = handle_submission("{not json", &sink, false);
    assert_eq!(status, 400);
    assert_eq!(response.message, INVALID_BODY_MESSAGE);

    let (status, response) = handle_submission(r#"{"name":"Ada"}"#, &sink, false);
    assert_eq!(status, 400);
    assert_eq!(response.message, REQUIRED_FIELDS_MESSAGE);
    assert_eq!(sink.delivered.lock().len(), 1);
}

#[test]
fn test_handle_submission_delivery_failure() {
    let sink = RecordingSink {
        fail: true,
        ..RecordingSink::default()
    };
    let body = r#"{"name":"Ada","email":"ada@example.com","phone":"555","company":"Analytical"}"#;

    let (status, response) = handle_submission(body, &sink, false);
    assert_eq!(status, 500);
    assert!(!response.success);
    assert_eq!(response.message, FAILURE_MESSAGE);
    assert_eq!(response.error, None);

    let (_, response) = handle_submission(body, &sink, true);
    assert_eq!(
        response.error.as_deref(),
        Some("Email sending failed: Brevo API error: unauthorized")
    );
}

#[test]
fn test_email_payloads() {
    let sender = Party {
        email: "noreply@example.com".to_string(),
        name: Some("Progreso Consultants".to_string()),
    };
    let submission = form("Ada", "ada@example.com", "555", "Analytical")
        .validate()
        .expect("Form should be valid");

    let notification = serde_json::to_value(notification_email(&sender, "owner@example.com", &submission))
        .expect("Failed to serialize email");
    assert_eq!(notification["to"][0]["email"], "owner@example.com");
    assert!(notification["to"][0].get("name").is_none());
    assert_eq!(notification["replyTo"]["email"], "ada@example.com");
    assert_eq!(notification["subject"], "New Discovery Call Request from Ada");
    assert!(notification["textContent"]
        .as_str()
        .unwrap_or_default()
        .contains("Company: Analytical"));

    let confirmation = serde_json::to_value(confirmation_email(&sender, &submission))
        .expect("Failed to serialize email");
    assert_eq!(confirmation["to"][0]["email"], "ada@example.com");
    assert!(confirmation.get("replyTo").is_none());
}

#[test]
fn test_config_report_hides_secrets() {
    let config = ContactConfig {
        brevo_api_key: Some("xkeysib-secret".to_string()),
        ..ContactConfig::default()
    };
    let report = config_report(&config);

    assert_eq!(report["config"]["BREVO_API_KEY"], "SET (hidden)");
    assert_eq!(report["config"]["BREVO_SENDER_EMAIL"], "not set");
    assert_eq!(report["config"]["CONTACT_EMAIL"], "not set");
    assert!(!report.to_string().contains("xkeysib-secret"));
}

fn server_context(image_dir: Option<&Path>) -> ServerContext {
    let sim = simulation(&["/images/a.png", "/images/b.png"], 1000, &[]);
    ServerContext {
        panel: PanelReader::new(sim.snapshot()),
        image_dir: image_dir.map(Path::to_path_buf),
        title: "Hero".to_string(),
        foreground: "<h1>Hello</h1>".to_string(),
        render: RenderOptions::default(),
        poll_interval_ms: 500,
        contact: ContactConfig::default(),
        sink: Arc::new(UnconfiguredSink),
    }
}

#[test]
fn test_server_routes() {
    let ctx = server_context(None);

    let reply = route(&ctx, &Method::Get, "/", "");
    assert_eq!(reply.status, 200);
    let page = String::from_utf8_lossy(&reply.body);
    assert!(page.contains("<h1>Hello</h1>"));
    assert!(page.contains("hero-layer"));

    let reply = route(&ctx, &Method::Get, "/api/panel?t=1", "");
    assert_eq!(reply.status, 200);
    let snapshot: serde_json::Value = serde_json::from_slice(&reply.body).expect("Snapshot should be JSON");
    assert_eq!(snapshot["layers"].as_array().map(|l| l.len()), Some(2));

    let reply = route(&ctx, &Method::Options, "/api/contact", "");
    assert_eq!(reply.status, 200);
    assert!(reply.cors);

    let reply = route(&ctx, &Method::Get, "/api/contact", "");
    assert_eq!(reply.status, 405);

    let body = r#"{"name":"Ada","email":"ada@example.com","phone":"555","company":"Analytical"}"#;
    let reply = route(&ctx, &Method::Post, "/api/contact", body);
    assert_eq!(reply.status, 500);
    let response: serde_json::Value = serde_json::from_slice(&reply.body).expect("Response should be JSON");
    assert_eq!(response["success"], false);

    let reply = route(&ctx, &Method::Get, "/api/test-email-config", "");
    assert_eq!(reply.status, 200);

    assert_eq!(route(&ctx, &Method::Get, "/missing", "").status, 404);
}

#[test]
fn test_server_images_stay_in_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let image_dir = temp_dir.path().join("images");
    std::fs::create_dir(&image_dir).expect("Failed to create image dir");
    write_png(&image_dir.join("a.png"));
    std::fs::write(temp_dir.path().join("secret.txt"), "secret").expect("Failed to write file");

    let ctx = server_context(Some(&image_dir));

    let reply = route(&ctx, &Method::Get, "/images/a.png", "");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.content_type, "image/png");

    assert_eq!(route(&ctx, &Method::Get, "/images/../secret.txt", "").status, 404);
    assert_eq!(route(&ctx, &Method::Get, "/imagesa.png", "").status, 404);
    assert_eq!(route(&ctx, &Method::Get, "/images/", "").status, 404);
}

#[test]
fn test_contact_response_omits_missing_error() {
    let response = ContactResponse {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
        error: None,
    };
    let json = serde_json::to_string(&response).expect("Failed to serialize response");
    assert!(!json.contains("error"));
}

#[test]
fn test_find_images_encodes_file_names() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_png(&temp_dir.path().join("hero 1.png"));
    write_png(&temp_dir.path().join("café.png"));

    let sources = find_images(temp_dir.path(), "*", "/images").expect("Failed to find images");
    let urls: Vec<&str> = sources.iter().map(|s| s.public_url.as_str()).collect();
    assert_eq!(urls, vec!["/images/caf%C3%A9.png", "/images/hero%201.png"]);

    // The loader still reads the file by its real name
    assert!(sources[1].reference.ends_with("hero 1.png"));
}

#[test]
fn test_server_serves_encoded_file_names() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let image_dir = temp_dir.path().join("images");
    std::fs::create_dir(&image_dir).expect("Failed to create image dir");
    write_png(&image_dir.join("hero 1.png"));
    write_png(&image_dir.join("café.png"));
    std::fs::write(temp_dir.path().join("secret.txt"), "secret").expect("Failed to write file");

    let ctx = server_context(Some(&image_dir));
    for source in find_images(&image_dir, "*", "/images").expect("Failed to find images") {
        let reply = route(&ctx, &Method::Get, &source.public_url, "");
        assert_eq!(reply.status, 200, "Failed to serve {}", source.public_url);
        assert_eq!(reply.content_type, "image/png");
    }

    assert_eq!(route(&ctx, &Method::Get, "/images/%2e%2e/secret.txt", "").status, 404);
    assert_eq!(route(&ctx, &Method::Get, "/images/..%2Fsecret.txt", "").status, 404);
    assert_eq!(route(&ctx, &Method::Get, "/images/%FF.png", "").status, 404);
}

#[test]
fn test_unreadable_body_is_invalid() {
    let ctx = server_context(None);
    let mut body: &[u8] = &[0xff, 0xfe, 0x7b];

    let reply = respond_to(&ctx, &Method::Post, "/api/contact", &mut body);
    assert_eq!(reply.status, 400);
    assert!(reply.cors);
    let response: serde_json::Value = serde_json::from_slice(&reply.body).expect("Response should be JSON");
    assert_eq!(response["message"], INVALID_BODY_MESSAGE);

    let mut empty: &[u8] = &[];
    assert_eq!(respond_to(&ctx, &Method::Get, "/api/panel", &mut empty).status, 200);
}

fn smtp_config() -> ContactConfig {
    ContactConfig {
        smtp_user: Some("site@example.com".to_string()),
        smtp_password: Some("app-password".to_string()),
        contact_email: Some("owner@example.com".to_string()),
        ..ContactConfig::default()
    }
}

#[test]
fn test_select_backend() {
    assert_eq!(select_backend(&ContactConfig::default()), DeliveryBackend::Unconfigured);
    assert_eq!(select_backend(&smtp_config()), DeliveryBackend::Smtp);

    let both = ContactConfig {
        brevo_api_key: Some("xkeysib-secret".to_string()),
        brevo_sender_email: Some("noreply@example.com".to_string()),
        ..smtp_config()
    };
    assert_eq!(select_backend(&both), DeliveryBackend::Brevo);

    // SMTP credentials without a destination are not enough
    let no_destination = ContactConfig {
        contact_email: None,
        ..smtp_config()
    };
    assert_eq!(select_backend(&no_destination), DeliveryBackend::Unconfigured);
}

#[test]
fn test_smtp_sink_from_config() {
    assert!(SmtpSink::from_config(&smtp_config()).is_ok());

    let implicit_tls = ContactConfig {
        smtp_port: 465,
        ..smtp_config()
    };
    assert!(SmtpSink::from_config(&implicit_tls).is_ok());

    assert!(matches!(
        SmtpSink::from_config(&ContactConfig::default()),
        Err(PanelError::ConfigError(_))
    ));
}

#[test]
fn test_smtp_message_headers() {
    let sender = Party {
        email: "site@example.com".to_string(),
        name: Some("Progreso Consultants".to_string()),
    };
    let submission = form("Ada", "ada@example.com", "555", "Analytical")
        .validate()
        .expect("Form should be valid");

    let message = to_message(&notification_email(&sender, "owner@example.com", &submission))
        .expect("Failed to build message");
    let raw = String::from_utf8_lossy(&message.formatted()).to_string();
    assert!(raw.contains("To: owner@example.com"));
    assert!(raw.contains("Reply-To: Ada <ada@example.com>"));
    assert!(raw.contains("Subject: New Discovery Call Request from Ada"));

    let message = to_message(&confirmation_email(&sender, &submission)).expect("Failed to build message");
    let raw = String::from_utf8_lossy(&message.formatted()).to_string();
    assert!(raw.contains("To: Ada <ada@example.com>"));
    assert!(!raw.contains("Reply-To:"));
}

#[test]
fn test_smtp_config_report() {
    let config = Config::from_vars(|key| match key {
        "SMTP_USER" => Some("site@example.com".to_string()),
        "SMTP_PASSWORD" => Some("app-password".to_string()),
        "SMTP_PORT" => Some("465".to_string()),
        _ => None,
    });
    assert_eq!(config.contact.smtp_port, 465);
    assert_eq!(config.contact.smtp_host, "smtp.gmail.com");

    let report = config_report(&config.contact);
    assert_eq!(report["config"]["SMTP_HOST"], "smtp.gmail.com");
    assert_eq!(report["config"]["SMTP_PORT"], "465");
    assert_eq!(report["config"]["SMTP_USER"], "SET (hidden)");
    assert_eq!(report["config"]["SMTP_PASSWORD"], "SET (hidden)");
    assert!(!report.to_string().contains("app-password"));

    let report = config_report(&ContactConfig::default());
    assert_eq!(report["config"]["SMTP_USER"], "MISSING");
    assert_eq!(report["config"]["SMTP_PASSWORD"], "MISSING");
}
