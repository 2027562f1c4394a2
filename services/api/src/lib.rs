mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use safety_checklist::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
