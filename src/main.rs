use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use agrisocial_backend::api::{self, ApiDoc};
use agrisocial_backend::config::Config;
use agrisocial_backend::db::create_pool;
use agrisocial_backend::jobs::queue::{spawn_local_worker, LocalQueue};
use agrisocial_backend::jobs::{JobQueue, JobRunner};
use agrisocial_backend::services::moderation::OpenAiModerator;
use agrisocial_backend::services::notification::DiscordNotifier;
use agrisocial_backend::services::plant_disease::{OpenAiPlantDiseaseChecker, PlantDiseaseAnalyzer};
use agrisocial_backend::services::storage::FileStorage;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn startup_error(context: &str, e: anyhow::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {:?}", context, e))
}

#[cfg(feature = "kafka")]
fn kafka_queue(
    config: &Config,
    runner: Arc<JobRunner>,
) -> Result<Arc<dyn JobQueue>, anyhow::Error> {
    use agrisocial_backend::kafka::{KafkaConsumer, KafkaJobQueue};

    let queue: Arc<dyn JobQueue> = Arc::new(KafkaJobQueue::new(&config.kafka)?);
    KafkaConsumer::new(&config.kafka)?.start(runner, Arc::clone(&queue));
    log::info!("Kafka job consumer started on {}", config.kafka.topic);
    Ok(queue)
}

#[cfg(not(feature = "kafka"))]
fn kafka_queue(
    _config: &Config,
    _runner: Arc<JobRunner>,
) -> Result<Arc<dyn JobQueue>, anyhow::Error> {
    Err(anyhow::anyhow!(
        "JOB_BROKER=kafka requires building with the `kafka` feature"
    ))
}

fn local_queue(runner: Arc<JobRunner>) -> Arc<dyn JobQueue> {
    let (queue, receiver) = LocalQueue::channel();
    let queue: Arc<dyn JobQueue> = Arc::new(queue);
    spawn_local_worker(runner, Arc::clone(&queue), receiver);
    log::info!("Local job worker started");
    queue
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| startup_error("Failed to load configuration", e))?;

    log::info!(
        "Starting server on {}:{}",
        config.server.host,
        config.server.port
    );
    let pool = create_pool(&config)
        .await
        .map_err(|e| startup_error("Failed to connect to the database", e))?;
    log::info!("Database connection established");

    let moderator = OpenAiModerator::new(&config.openai.base_url, &config.openai.moderation_api_key)
        .map_err(|e| startup_error("Failed to create moderation client", e))?;
    let notifier =
        DiscordNotifier::new().map_err(|e| startup_error("Failed to create webhook client", e))?;
    let analyzer: Arc<dyn PlantDiseaseAnalyzer> = Arc::new(
        OpenAiPlantDiseaseChecker::new(
            &config.openai.base_url,
            &config.openai.plant_disease_api_key,
            &config.openai.plant_disease_model,
        )
        .map_err(|e| startup_error("Failed to create plant disease client", e))?,
    );

    let runner = Arc::new(JobRunner::new(
        pool.clone(),
        config.clone(),
        Arc::new(moderator),
        Arc::new(notifier),
    ));
    let queue = match config.jobs.broker.as_str() {
        "kafka" => kafka_queue(&config, runner)
            .map_err(|e| startup_error("Failed to start Kafka job queue", e))?,
        _ => local_queue(runner),
    };

    let storage = FileStorage::new(&config.media);
    let openapi = ApiDoc::openapi();

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(Arc::clone(&queue)))
            .app_data(web::Data::from(Arc::clone(&analyzer)))
            .app_data(web::Data::new(storage.clone()))
            .route(
                "/api/docs",
                web::get().to(|| async {
                    actix_web::HttpResponse::PermanentRedirect()
                        .append_header(("Location", "/api/docs/"))
                        .finish()
                }),
            )
            .service(
                SwaggerUi::new("/api/docs/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .configure(api::configure)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
