use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe error: {0}")]
    Stripe(String),

    #[error("Webhook signature rejected: {0}")]
    Signature(String),

    #[error("Teemill API error: {0}")]
    Teemill(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type AppResult<T> = Result<T, AppError>;
