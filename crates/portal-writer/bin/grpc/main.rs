mod cli;

use crate::cli::{GeneratorArg, StorageBackendArg, CLI};
use clap::Parser;
use portal_core::{Clock, Repository, SystemClock};
use portal_generator::{Generator, RandomGenerator, SeqGenerator};
use portal_proto_schema::v1::links_service_server::LinksServiceServer;
use portal_storage::{DynamoRepository, DynamoSettings, InMemoryRepository};
use portal_writer::grpc::WriterGrpcServer;
use portal_writer::{WriterService, WriterSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Server;
use tracing::info;

type Service<R> = WriterGrpcServer<WriterService<R, Box<dyn Generator>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;
    portal_telemetry::init(config.log_format.into())?;

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        generator = %config.generator,
        "starting writer gRPC server"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let settings = WriterSettings::builder()
        .base_url(config.base_url.clone())
        .clock(Arc::clone(&clock))
        .max_code_attempts(config.max_code_attempts)
        .build();

    let generator: Box<dyn Generator> = match config.generator {
        GeneratorArg::Random => Box::new(RandomGenerator::new()),
        GeneratorArg::Sequential => Box::new(SeqGenerator::new()),
    };

    match config.storage {
        StorageBackendArg::InMemory => {
            let repository = Arc::new(InMemoryRepository::new());
            let sweeper = Arc::clone(&repository).spawn_ttl_sweeper(
                clock,
                Duration::from_secs(config.ttl_sweep_interval_secs),
            );
            let service = WriterService::from_shared(repository, Arc::new(generator), settings);
            let result = run_server(config.listen_addr, service).await;
            sweeper.abort();
            result?;
        }
        StorageBackendArg::DynamoDb => {
            let dynamo = DynamoSettings::builder()
                .region(config.dynamodb_region)
                .table_name(config.table_name);
            let dynamo = match config.dynamodb_endpoint {
                Some(endpoint) => dynamo.endpoint(endpoint).build(),
                None => dynamo.build(),
            };
            let repository = DynamoRepository::connect(dynamo).await;
            if config.ensure_table {
                repository.ensure_table().await?;
            }
            let service = WriterService::new(repository, generator, settings);
            run_server(config.listen_addr, service).await?;
        }
    }

    info!("writer gRPC server stopped");
    Ok(())
}

async fn run_server<R: Repository>(
    listen_addr: SocketAddr,
    service: WriterService<R, Box<dyn Generator>>,
) -> Result<(), tonic::transport::Error> {
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<LinksServiceServer<Service<R>>>()
        .await;

    Server::builder()
        .add_service(health_service)
        .add_service(LinksServiceServer::new(WriterGrpcServer::new(service)))
        .serve_with_shutdown(listen_addr, shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
