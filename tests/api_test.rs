// Integration tests for API endpoints
// Each test runs against its own SQLite file; outbound integrations are stubbed.
// Run with: cargo test --test api_test

use actix_web::{http::StatusCode, test, web, App};
use agrisocial_backend::{
    api,
    auth::create_token_pair,
    config::{
        Config, DatabaseConfig, DiscordConfig, JobsConfig, JwtConfig, KafkaConfig, MediaConfig,
        OpenAiConfig, ServerConfig,
    },
    db::{create_pool, DbPool},
    entities::{
        category, cart, follow, login_code, plant_disease, post, post_like, post_saved, post_view,
        product,
        product::{ApprovalStatus, ProductStatus},
        profile::{self, IdCardValidationStatus, ProfileType},
        report, user, vendor,
        vendor::ReviewStatus,
    },
    jobs::{Job, JobQueue, JobRunner, VendorNotice},
    services::{
        moderation::{ClassifierError, ContentClassifier},
        notification::{NotifyError, WebhookNotifier},
        plant_disease::{
            AnalysisOutcome, AnalyzerError, PlantDiseaseAnalysis, PlantDiseaseAnalyzer,
            TokenUsage,
        },
        storage::FileStorage,
    },
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const CODES_WEBHOOK: &str = "https://discord.test/codes";
const VENDORS_WEBHOOK: &str = "https://discord.test/vendors";

/// Queue that keeps jobs for inspection instead of running them.
#[derive(Default)]
struct RecordingQueue {
    jobs: Mutex<Vec<Job>>,
}

impl RecordingQueue {
    fn take(&self) -> Vec<Job> {
        std::mem::take(&mut *self.jobs.lock().unwrap())
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: Job) -> Result<(), anyhow::Error> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Flags any text mentioning a scam.
struct KeywordClassifier;

#[async_trait]
impl ContentClassifier for KeywordClassifier {
    async fn is_potentially_harmful(&self, content: &str) -> Result<bool, ClassifierError> {
        Ok(content.to_lowercase().contains("scam"))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl WebhookNotifier for RecordingNotifier {
    async fn send(&self, webhook_url: &str, payload: &Value) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((webhook_url.to_string(), payload.clone()));
        Ok(())
    }
}

/// Answers with a fixed diagnosis; images whose bytes are `broken` fail upstream.
struct CannedAnalyzer;

#[async_trait]
impl PlantDiseaseAnalyzer for CannedAnalyzer {
    async fn analyze(&self, image_base64: &str) -> Result<AnalysisOutcome, AnalyzerError> {
        if image_base64 == STANDARD.encode(b"broken") {
            return Err(AnalyzerError::Rejected(502));
        }
        Ok(AnalysisOutcome {
            analysis: PlantDiseaseAnalysis {
                disease_name: "Hawar daun".to_string(),
                confidence: 0.87,
                symptoms: vec!["Bercak coklat pada daun".to_string()],
                severity: plant_disease::Severity::Medium,
                treatment_recommendations: vec!["Semprot fungisida".to_string()],
                preventive_measures: vec!["Rotasi tanaman".to_string()],
                mini_article: "Hawar daun disebabkan oleh jamur.".to_string(),
            },
            usage: TokenUsage {
                input_tokens: 120,
                output_tokens: 80,
                total_tokens: 200,
            },
        })
    }
}

struct TestContext {
    _dir: TempDir,
    media_root: PathBuf,
    config: Config,
    db: DbPool,
    queue: Arc<RecordingQueue>,
    notifier: Arc<RecordingNotifier>,
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            debug: true,
        },
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
            access_expiration_minutes: 5,
            refresh_expiration_days: 1,
        },
        database: DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
            max_connections: 5,
        },
        media: MediaConfig {
            root: dir.path().join("media").display().to_string(),
            url_prefix: "/media/".to_string(),
        },
        discord: DiscordConfig {
            codes_webhook_url: CODES_WEBHOOK.to_string(),
            vendors_webhook_url: VENDORS_WEBHOOK.to_string(),
        },
        openai: OpenAiConfig {
            base_url: "http://localhost:9".to_string(),
            moderation_api_key: String::new(),
            plant_disease_api_key: String::new(),
            plant_disease_model: "gpt-4o".to_string(),
        },
        jobs: JobsConfig {
            broker: "local".to_string(),
            moderation_max_retries: 0,
            moderation_backoff_max_secs: 1,
            webhook_max_retries: 0,
            webhook_backoff_max_secs: 1,
        },
        kafka: KafkaConfig {
            brokers: String::new(),
            group_id: String::new(),
            topic: String::new(),
        },
    }
}

impl TestContext {
    async fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(&dir);
        let db = create_pool(&config)
            .await
            .expect("Failed to open SQLite database");

        TestContext {
            media_root: PathBuf::from(&config.media.root),
            _dir: dir,
            config,
            db,
            queue: Arc::new(RecordingQueue::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    /// Helper function to create a test app
    fn app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let queue: Arc<dyn JobQueue> = self.queue.clone();
        let analyzer: Arc<dyn PlantDiseaseAnalyzer> = Arc::new(CannedAnalyzer);

        App::new()
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.db.clone()))
            .app_data(web::Data::from(queue))
            .app_data(web::Data::from(analyzer))
            .app_data(web::Data::new(FileStorage::new(&self.config.media)))
            .configure(api::configure)
    }

    fn runner(&self) -> JobRunner {
        JobRunner::new(
            self.db.clone(),
            self.config.clone(),
            Arc::new(KeywordClassifier),
            self.notifier.clone(),
        )
    }

    fn bearer(&self, user_id: i64) -> (&'static str, String) {
        let tokens = create_token_pair(user_id, &self.config.jwt).expect("Failed to sign token");
        ("Authorization", format!("Bearer {}", tokens.access))
    }

    /// Active account with its profile, as left behind by a confirmed registration.
    async fn create_user(&self, phone_number: &str, is_staff: bool) -> (user::Model, profile::Model) {
        let now = Utc::now();
        let account = user::ActiveModel {
            username: Set(phone_number.to_string()),
            email: Set(format!("{}@example.com", phone_number)),
            name: Set(format!("Farmer {}", phone_number)),
            is_active: Set(true),
            is_staff: Set(is_staff),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert user");

        let profile = profile::ActiveModel {
            user_id: Set(account.id),
            full_name: Set(account.name.clone()),
            email: Set(account.email.clone()),
            phone_number: Set(phone_number.to_string()),
            profile_type: Set(ProfileType::Farmer),
            id_card_file: Set(None),
            id_card_validation_status: Set(IdCardValidationStatus::Pending),
            headline: Set(None),
            farmer_community: Set(None),
            country: Set(None),
            city: Set(None),
            profile_picture_url: Set(None),
            cover_picture_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert profile");

        (account, profile)
    }

    async fn create_product(&self, owner_id: i64, stock: i32) -> product::Model {
        let now = Utc::now();
        let category = category::ActiveModel {
            name: Set(format!("Sayuran {}", owner_id)),
            slug: Set(format!("sayuran-{}", owner_id)),
            description: Set(None),
            parent_id: Set(None),
            meta_title: Set(String::new()),
            meta_description: Set(String::new()),
            is_active: Set(true),
            is_featured: Set(false),
            sort_order: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert category");

        let uuid = uuid::Uuid::new_v4();
        product::ActiveModel {
            uuid: Set(uuid),
            user_id: Set(owner_id),
            category_id: Set(category.id),
            subcategory_id: Set(None),
            name: Set("Cabai Merah".to_string()),
            slug: Set(format!("cabai-merah-{}", &uuid.simple().to_string()[..8])),
            description: Set("Segar dari kebun".to_string()),
            available_stock: Set(stock),
            status: Set(ProductStatus::Active),
            approval_status: Set(ApprovalStatus::Approved),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert product")
    }
}

fn upload(filename: &str, bytes: &[u8]) -> Value {
    json!({
        "filename": filename,
        "content_base64": STANDARD.encode(bytes),
    })
}

#[actix_web::test]
async fn test_register_and_confirm_with_debug_code() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/accounts/register")
        .set_json(json!({
            "name": "Budi Santoso",
            "email": "budi@example.com",
            "phone_number": "081234567890"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let jobs = ctx.queue.take();
    assert!(matches!(jobs.as_slice(), [Job::SendVerificationCode { .. }]));

    // Same phone number again
    let req = test::TestRequest::post()
        .uri("/api/accounts/register")
        .set_json(json!({
            "name": "Budi Lain",
            "email": "budi2@example.com",
            "phone_number": "081234567890"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["phone_number"][0], "Phone number already exists");

    let req = test::TestRequest::post()
        .uri("/api/accounts/register/confirm")
        .set_json(json!({"phone_number": "081234567890", "code": "0000"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User activated successfully");
    assert!(body["data"]["access"].as_str().is_some());
    assert!(body["data"]["refresh"].as_str().is_some());

    let req = test::TestRequest::post()
        .uri("/api/accounts/register/confirm")
        .set_json(json!({"phone_number": "081234567890", "code": "0000"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["phone_number"][0], "User already activated");
}

#[actix_web::test]
async fn test_login_code_flow() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (account, _) = ctx.create_user("081111111111", false).await;

    let req = test::TestRequest::post()
        .uri("/api/accounts/login")
        .set_json(json!({"phone_number": "081111111111"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let code_id = match ctx.queue.take().as_slice() {
        [Job::SendLoginCode { code_id }] => *code_id,
        other => panic!("Unexpected jobs: {:?}", other),
    };
    let issued = login_code::Entity::find_by_id(code_id)
        .one(&ctx.db)
        .await
        .unwrap()
        .expect("Login code was not stored");
    assert_eq!(issued.user_id, account.id);
    assert_eq!(issued.code.len(), 4);

    // The login job delivers the code to the codes webhook
    ctx.runner()
        .run(&Job::SendLoginCode { code_id })
        .await
        .expect("Login code delivery failed");
    let sent = ctx.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, CODES_WEBHOOK);

    let wrong = if issued.code == "9999" { "1111" } else { "9999" };
    let req = test::TestRequest::post()
        .uri("/api/accounts/login/confirm")
        .set_json(json!({"phone_number": "081111111111", "code": wrong}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"][0], "Invalid code");

    let req = test::TestRequest::post()
        .uri("/api/accounts/login/confirm")
        .set_json(json!({"phone_number": "081111111111", "code": issued.code}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["access"].as_str().is_some());
}

#[actix_web::test]
async fn test_login_unknown_phone_number() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/accounts/login")
        .set_json(json!({"phone_number": "089999999999"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["phone_number"][0], "User not found");
    assert!(ctx.queue.take().is_empty());
}

#[actix_web::test]
async fn test_missing_and_invalid_tokens() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;

    let req = test::TestRequest::get()
        .uri("/api/accounts/profile")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/accounts/profile")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid token");
}

#[actix_web::test]
async fn test_follow_once_and_friendship_visibility() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (alice, _) = ctx.create_user("081000000001", false).await;
    let (bob, _) = ctx.create_user("081000000002", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(bob.id))
        .set_json(json!({"content": "Panen jagung minggu ini", "privacy": "friends"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/accounts/users/{}/follow", bob.id))
        .insert_header(ctx.bearer(alice.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri(&format!("/api/accounts/users/{}/follow", bob.id))
        .insert_header(ctx.bearer(alice.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Already following this user");
    assert_eq!(follow::Entity::find().count(&ctx.db).await.unwrap(), 1);

    // One-way follow is not friendship
    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .insert_header(ctx.bearer(alice.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/api/accounts/users/{}/follow", alice.id))
        .insert_header(ctx.bearer(bob.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .insert_header(ctx.bearer(alice.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Anonymous viewers never see friends-only posts
    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_cannot_follow_yourself() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (alice, _) = ctx.create_user("081000000003", false).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/accounts/users/{}/follow", alice.id))
        .insert_header(ctx.bearer(alice.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(follow::Entity::find().count(&ctx.db).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_only_me_post_is_private() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000011", false).await;
    let (other, _) = ctx.create_user("081000000012", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Catatan pupuk pribadi", "privacy": "only_me"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();
    assert_eq!(created["privacy"], "only_me");

    let post_id = post::Entity::find().one(&ctx.db).await.unwrap().unwrap().id;
    assert_eq!(ctx.queue.take(), vec![Job::ModeratePost { post_id }]);

    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .insert_header(ctx.bearer(other.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(other.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .insert_header(ctx.bearer(author.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        ctx.queue.take(),
        vec![Job::RecordPostView {
            post_id,
            user_id: author.id
        }]
    );
}

#[actix_web::test]
async fn test_invalid_privacy_rejected() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000013", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Halo", "privacy": "everyone"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["privacy"][0],
        "Invalid privacy option. Valid choices are: public, friends, only_me"
    );
    assert_eq!(post::Entity::find().count(&ctx.db).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_moderation_hides_post_and_comments() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000021", false).await;
    let (reader, _) = ctx.create_user("081000000022", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Investasi bibit untung 10x, bukan scam!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();
    assert_eq!(created["privacy"], "public");

    let req = test::TestRequest::post()
        .uri(&format!("/api/social-media/posts/{}/comments", slug))
        .insert_header(ctx.bearer(reader.id))
        .set_json(json!({"content": "Benarkah?"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let job = ctx
        .queue
        .take()
        .into_iter()
        .find(|job| matches!(job, Job::ModeratePost { .. }))
        .expect("Moderation was not scheduled");
    // Flag-only saves do not schedule another moderation pass
    let follow_ups = ctx.runner().run(&job).await.expect("Moderation failed");
    assert!(follow_ups.is_empty());

    let flagged = post::Entity::find().one(&ctx.db).await.unwrap().unwrap();
    assert!(flagged.is_potentially_harmful);

    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .insert_header(ctx.bearer(reader.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}/comments", slug))
        .insert_header(ctx.bearer(reader.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
    assert!(body["next"].is_null());
    assert!(body["previous"].is_null());
}

#[actix_web::test]
async fn test_harmless_post_passes_moderation() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000023", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Tips menanam padi organik"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    for job in ctx.queue.take() {
        ctx.runner().run(&job).await.expect("Job failed");
    }
    let checked = post::Entity::find().one(&ctx.db).await.unwrap().unwrap();
    assert!(!checked.is_potentially_harmful);

    let req = test::TestRequest::get()
        .uri("/api/social-media/posts")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_duplicate_reactions_rejected() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000031", false).await;
    let (reader, _) = ctx.create_user("081000000032", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Harga pupuk naik"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();

    for action in ["like", "save", "view"] {
        let uri = format!("/api/social-media/posts/{}/{}", slug, action);
        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(ctx.bearer(reader.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED, "first {}", action);

        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(ctx.bearer(reader.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "second {}", action);
    }

    assert_eq!(post_like::Entity::find().count(&ctx.db).await.unwrap(), 1);
    assert_eq!(post_saved::Entity::find().count(&ctx.db).await.unwrap(), 1);
    assert_eq!(post_view::Entity::find().count(&ctx.db).await.unwrap(), 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .insert_header(ctx.bearer(reader.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["likes_count"], 1);
    assert_eq!(body["views_count"], 1);
    assert_eq!(body["is_liked"], true);
    assert_eq!(body["is_saved"], true);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/social-media/posts/{}/like", slug))
        .insert_header(ctx.bearer(reader.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/social-media/posts/{}/like", slug))
        .insert_header(ctx.bearer(reader.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(post_like::Entity::find().count(&ctx.db).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_replies_are_single_level() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000041", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Diskusi irigasi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();
    let comments_uri = format!("/api/social-media/posts/{}/comments", slug);

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Pakai tetes"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let top: Value = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Setuju", "parent": top["id"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let reply: Value = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Balasan dari balasan", "parent": reply["id"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri(&comments_uri)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["replies_count"], 1);
}

fn individual_vendor() -> Value {
    json!({
        "name": "Tani Makmur",
        "phone_number": "081222333444",
        "address": "Jl. Sawah No. 1",
        "full_name": "Siti Aminah",
        "id_card_photo": upload("ktp.jpg", b"id card bytes"),
        "latitude": -6.2,
        "longitude": 106.8
    })
}

#[actix_web::test]
async fn test_vendor_documents_depend_on_type() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (owner, _) = ctx.create_user("081000000051", false).await;

    let req = test::TestRequest::post()
        .uri("/api/vendors/create/individual")
        .insert_header(ctx.bearer(owner.id))
        .set_json(json!({
            "name": "Tani Makmur",
            "phone_number": "081222333444",
            "address": "Jl. Sawah No. 1"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["full_name"][0],
        "Full name is required for individual vendors."
    );
    assert_eq!(
        body["id_card_photo"][0],
        "ID card photo is required for individual vendors."
    );
    assert!(body.get("npwp").is_none());

    let req = test::TestRequest::post()
        .uri("/api/vendors/create/company")
        .insert_header(ctx.bearer(owner.id))
        .set_json(json!({
            "name": "PT Tani",
            "phone_number": "081222333444",
            "address": "Jl. Sawah No. 2",
            "business_name": "PT Tani Sejahtera"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body.get("business_name").is_none());
    assert!(body.get("business_number").is_some());
    assert!(body.get("business_nib").is_some());
    assert!(body.get("npwp").is_some());
    assert!(body.get("full_name").is_none());
    assert_eq!(vendor::Entity::find().count(&ctx.db).await.unwrap(), 0);

    let req = test::TestRequest::post()
        .uri("/api/vendors/create/individual")
        .insert_header(ctx.bearer(owner.id))
        .set_json(individual_vendor())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["vendor_type"], "individual");
    assert_eq!(body["review_status"], "pending");

    let req = test::TestRequest::post()
        .uri("/api/vendors/create/individual")
        .insert_header(ctx.bearer(owner.id))
        .set_json(individual_vendor())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "User already has a vendor profile.");
}

#[actix_web::test]
async fn test_vendor_review_notifies_on_status_change() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (owner, _) = ctx.create_user("081000000061", false).await;
    let (staff, _) = ctx.create_user("081000000062", true).await;

    let req = test::TestRequest::post()
        .uri("/api/vendors/create/individual")
        .insert_header(ctx.bearer(owner.id))
        .set_json(individual_vendor())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let vendor_id = created["id"].as_i64().unwrap();
    assert_eq!(
        ctx.queue.take(),
        vec![Job::VendorNotification {
            vendor_id,
            notice: VendorNotice::Created
        }]
    );

    let review_uri = format!("/api/vendors/{}/review", vendor_id);
    let req = test::TestRequest::patch()
        .uri(&review_uri)
        .insert_header(ctx.bearer(owner.id))
        .set_json(json!({"review_status": "approved"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&review_uri)
        .insert_header(ctx.bearer(staff.id))
        .set_json(json!({"review_status": "approved", "review_notes": "Dokumen lengkap"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let jobs = ctx.queue.take();
    let expected = Job::VendorNotification {
        vendor_id,
        notice: VendorNotice::StatusChanged {
            old_status: ReviewStatus::Pending,
        },
    };
    assert_eq!(jobs, vec![expected.clone()]);

    ctx.runner().run(&expected).await.expect("Notification failed");
    let sent = ctx.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, VENDORS_WEBHOOK);
    assert!(sent[0].1["embeds"].is_array());

    // Saving the same status again stays quiet
    let req = test::TestRequest::patch()
        .uri(&review_uri)
        .insert_header(ctx.bearer(staff.id))
        .set_json(json!({"review_status": "approved"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(ctx.queue.take().is_empty());
}

#[actix_web::test]
async fn test_cart_respects_stock() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (seller, _) = ctx.create_user("081000000071", false).await;
    let (buyer, _) = ctx.create_user("081000000072", false).await;
    let listed = ctx.create_product(seller.id, 5).await;

    let req = test::TestRequest::post()
        .uri("/api/ecommerce/carts")
        .insert_header(ctx.bearer(buyer.id))
        .set_json(json!({"product_uuid": listed.uuid, "quantity": 10}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["quantity"][0], "Quantity exceeds available stock (5).");

    let req = test::TestRequest::post()
        .uri("/api/ecommerce/carts")
        .insert_header(ctx.bearer(buyer.id))
        .set_json(json!({"product_uuid": listed.uuid, "quantity": 0}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/ecommerce/carts")
        .insert_header(ctx.bearer(buyer.id))
        .set_json(json!({"product_uuid": listed.uuid, "quantity": 3}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/ecommerce/carts")
        .insert_header(ctx.bearer(buyer.id))
        .set_json(json!({"product_uuid": listed.uuid, "quantity": 2}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["quantity"], 2);

    let items = cart::Entity::find().all(&ctx.db).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);

    // Another shopper cannot touch the item
    let req = test::TestRequest::get()
        .uri(&format!("/api/ecommerce/carts/{}", items[0].id))
        .insert_header(ctx.bearer(seller.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_product_requires_approved_vendor() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (seller, _) = ctx.create_user("081000000081", false).await;
    let listed = ctx.create_product(seller.id, 1).await;

    let req = test::TestRequest::post()
        .uri("/api/ecommerce/products")
        .insert_header(ctx.bearer(seller.id))
        .set_json(json!({
            "category_id": listed.category_id,
            "name": "Tomat",
            "available_stock": 10,
            "images": [upload("tomat.jpg", b"tomato")]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(product::Entity::find().count(&ctx.db).await.unwrap(), 1);
}

#[actix_web::test]
async fn test_plant_disease_analysis() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/thinkflow/plant-disease/analyzer")
        .set_json(json!({"image": upload("daun.jpg", b"leaf pixels")}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["disease_name"], "Hawar daun");
    assert_eq!(body["severity"], "medium");
    assert_eq!(body["total_tokens"], 200);
    assert_eq!(body["symptoms"][0], "Bercak coklat pada daun");
    assert!(body["image"]
        .as_str()
        .unwrap()
        .starts_with("/media/plant_diseases/"));
    assert_eq!(plant_disease::Entity::find().count(&ctx.db).await.unwrap(), 1);
}

#[actix_web::test]
async fn test_plant_disease_failure_discards_upload() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/thinkflow/plant-disease/analyzer")
        .set_json(json!({"image": upload("daun.jpg", b"broken")}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(plant_disease::Entity::find().count(&ctx.db).await.unwrap(), 0);

    let leftovers = std::fs::read_dir(ctx.media_root.join("plant_diseases"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

/// Counts calls and always fails with a transient transport error.
#[derive(Default)]
struct UnreachableClassifier {
    attempts: AtomicU32,
}

#[async_trait]
impl ContentClassifier for UnreachableClassifier {
    async fn is_potentially_harmful(&self, _content: &str) -> Result<bool, ClassifierError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ClassifierError::Transport("connection refused".to_string()))
    }
}

fn count_files(dir: PathBuf) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[actix_web::test]
async fn test_unfollow_ends_friendship_visibility() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (alice, _) = ctx.create_user("081000000101", false).await;
    let (bob, _) = ctx.create_user("081000000102", false).await;
    let (carol, _) = ctx.create_user("081000000103", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(bob.id))
        .set_json(json!({"content": "Bibit cabai siap tanam", "privacy": "friends"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();

    for (follower, following) in [(alice.id, bob.id), (bob.id, alice.id)] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/accounts/users/{}/follow", following))
            .insert_header(ctx.bearer(follower))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let visible_to = |viewer: i64| {
        test::TestRequest::get()
            .uri("/api/social-media/posts")
            .insert_header(ctx.bearer(viewer))
            .to_request()
    };
    let resp = test::call_service(&app, visible_to(alice.id)).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["slug"], slug.as_str());

    let resp = test::call_service(&app, visible_to(carol.id)).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/accounts/users/{}/follow", alice.id))
        .insert_header(ctx.bearer(bob.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, visible_to(alice.id)).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/social-media/posts/{}", slug))
        .insert_header(ctx.bearer(alice.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_only_content_edits_schedule_moderation() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000111", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Tips pupuk kompos"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();
    let post_id = post::Entity::find().one(&ctx.db).await.unwrap().unwrap().id;
    ctx.queue.take();

    let edit = |changes: Value| {
        test::TestRequest::patch()
            .uri(&format!("/api/social-media/posts/{}", slug))
            .insert_header(ctx.bearer(author.id))
            .set_json(changes)
            .to_request()
    };

    let resp = test::call_service(&app, edit(json!({"content": "Tips pupuk kompos organik"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(ctx.queue.take(), vec![Job::ModeratePost { post_id }]);

    let resp = test::call_service(&app, edit(json!({"privacy": "friends"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(ctx.queue.take().is_empty());

    let resp =
        test::call_service(&app, edit(json!({"content": "Tips pupuk kompos organik  "}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(ctx.queue.take().is_empty());
}

#[actix_web::test]
async fn test_moderation_retries_are_bounded() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000121", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Jual traktor bekas"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let post_id = post::Entity::find().one(&ctx.db).await.unwrap().unwrap().id;

    let mut config = ctx.config.clone();
    config.jobs.moderation_max_retries = 2;
    config.jobs.moderation_backoff_max_secs = 1;
    let classifier = Arc::new(UnreachableClassifier::default());
    let runner = JobRunner::new(
        ctx.db.clone(),
        config,
        classifier.clone(),
        ctx.notifier.clone(),
    );

    let follow_ups = runner.execute(&Job::ModeratePost { post_id }).await;
    assert!(follow_ups.is_empty());
    assert_eq!(classifier.attempts.load(Ordering::SeqCst), 3);

    let unchanged = post::Entity::find_by_id(post_id).one(&ctx.db).await.unwrap().unwrap();
    assert!(!unchanged.is_potentially_harmful);
}

#[actix_web::test]
async fn test_post_reported_once_per_user() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000131", false).await;
    let (reader, _) = ctx.create_user("081000000132", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({"content": "Promo benih murah"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let created: Value = test::read_body_json(resp).await;
    let slug = created["slug"].as_str().unwrap().to_string();

    let submit = || {
        test::TestRequest::post()
            .uri(&format!("/api/social-media/posts/{}/report", slug))
            .insert_header(ctx.bearer(reader.id))
            .set_json(json!({"reason": "SP"}))
            .to_request()
    };
    let resp = test::call_service(&app, submit()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, submit()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "You have already reported this post");
    assert_eq!(report::Entity::find().count(&ctx.db).await.unwrap(), 1);
}

#[actix_web::test]
async fn test_concurrent_vendor_applications_keep_one_profile() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (farmer, _) = ctx.create_user("081000000141", false).await;

    let apply = || {
        test::TestRequest::post()
            .uri("/api/vendors/create/individual")
            .insert_header(ctx.bearer(farmer.id))
            .set_json(individual_vendor())
            .to_request()
    };
    let (first, second) = tokio::join!(
        test::call_service(&app, apply()),
        test::call_service(&app, apply())
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![201, 400]);
    let rejected = if first.status() == StatusCode::BAD_REQUEST { first } else { second };
    let body: Value = test::read_body_json(rejected).await;
    assert_eq!(body["error"], "User already has a vendor profile.");

    assert_eq!(vendor::Entity::find().count(&ctx.db).await.unwrap(), 1);
    assert_eq!(count_files(ctx.media_root.join("vendors/individual")), 1);
}

#[actix_web::test]
async fn test_concurrent_cart_adds_keep_one_line() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (seller, _) = ctx.create_user("081000000151", false).await;
    let (buyer, _) = ctx.create_user("081000000152", false).await;
    let listed = ctx.create_product(seller.id, 5).await;

    let add = |quantity: i32| {
        test::TestRequest::post()
            .uri("/api/ecommerce/carts")
            .insert_header(ctx.bearer(buyer.id))
            .set_json(json!({"product_uuid": listed.uuid, "quantity": quantity}))
            .to_request()
    };
    let (first, second) = tokio::join!(
        test::call_service(&app, add(2)),
        test::call_service(&app, add(3))
    );
    assert!(first.status().is_success());
    assert!(second.status().is_success());

    let items = cart::Entity::find().all(&ctx.db).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!([2, 3].contains(&items[0].quantity));
}

#[actix_web::test]
async fn test_rejected_post_images_are_not_kept() {
    let ctx = TestContext::new().await;
    let app = test::init_service(ctx.app()).await;
    let (author, _) = ctx.create_user("081000000161", false).await;

    let req = test::TestRequest::post()
        .uri("/api/social-media/posts")
        .insert_header(ctx.bearer(author.id))
        .set_json(json!({
            "content": "Foto kebun",
            "images": [
                upload("kebun.jpg", b"garden pixels"),
                {"filename": "rusak.jpg", "content_base64": "not base64!"}
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["images"][0], "The submitted file is not valid base64.");

    assert_eq!(post::Entity::find().count(&ctx.db).await.unwrap(), 0);
    assert_eq!(count_files(ctx.media_root.join("post_images")), 0);
}
