use crate::error::Result;
use futures::stream::BoxStream;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::service::Interceptor;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};

/// Liveness responder for the gRPC health protocol.
///
/// `Check` always reports SERVING while the process is up; the streaming
/// `Watch` variant is intentionally left unimplemented.
#[derive(Debug, Default, Clone)]
pub struct Healthz;

#[tonic::async_trait]
impl Health for Healthz {
    async fn check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> std::result::Result<Response<HealthCheckResponse>, Status> {
        Ok(Response::new(HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        }))
    }

    type WatchStream = BoxStream<'static, std::result::Result<HealthCheckResponse, Status>>;

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> std::result::Result<Response<Self::WatchStream>, Status> {
        Err(Status::unimplemented("unimplemented"))
    }
}

/// The health service, ready to be added to a gRPC server.
pub fn health_service() -> HealthServer<Healthz> {
    HealthServer::new(Healthz)
}

/// Spawn the health server on `0.0.0.0:port` as an independent task.
///
/// The listener runs unaffected by pipeline state and shuts down gracefully
/// when the token is cancelled.
pub fn spawn_healthz_server(port: u16, shutdown: CancellationToken) -> JoinHandle<Result<()>> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    tokio::spawn(async move {
        tracing::info!("healthz server listening on {addr}");
        Server::builder()
            .add_service(health_service())
            .serve_with_shutdown(addr, shutdown.cancelled_owned())
            .await?;
        Ok(())
    })
}

/// Same as [`spawn_healthz_server`], with a request interceptor hook.
pub fn spawn_healthz_server_with_interceptor<I>(
    port: u16,
    shutdown: CancellationToken,
    interceptor: I,
) -> JoinHandle<Result<()>>
where
    I: Interceptor + Clone + Send + Sync + 'static,
{
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    tokio::spawn(async move {
        tracing::info!("healthz server listening on {addr}");
        Server::builder()
            .add_service(HealthServer::with_interceptor(Healthz, interceptor))
            .serve_with_shutdown(addr, shutdown.cancelled_owned())
            .await?;
        Ok(())
    })
}
