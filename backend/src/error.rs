//! Error handling for the fresh-produce inventory service
//!
//! Provides consistent error responses in Indonesian and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::allocation::AllocationError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_id: String,
    },

    #[error("Stock change must be non-zero")]
    InvalidDelta,

    #[error("Shelf life is required when increasing stock")]
    MissingShelfLife,

    #[error("Unknown product: {0}")]
    UnknownProduct(Uuid),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    // Business logic errors
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Concurrent update on product {0}, retry the request")]
    ConcurrencyConflict(Uuid),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field validation failure
    pub fn validation(field: &str, message: &str, message_id: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_id: message_id.to_string(),
        }
    }

    /// Whether the caller may safely retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InvalidDelta => AppError::InvalidDelta,
            AllocationError::MissingShelfLife => AppError::MissingShelfLife,
            AllocationError::InsufficientStock {
                requested,
                available,
            } => AppError::InsufficientStock {
                requested,
                available,
            },
            AllocationError::InvalidShelfLife(_) => AppError::validation(
                "masaSimpanHari",
                &err.to_string(),
                "Masa simpan harus antara 1 dan 3650 hari",
            ),
            AllocationError::QuantityOutOfRange(_) => AppError::validation(
                "perubahan",
                &err.to_string(),
                "Jumlah melebihi batas yang dapat disimpan",
            ),
            AllocationError::ValueOverflow => AppError::validation(
                "hargaBeli",
                &err.to_string(),
                "Nilai melebihi batas perhitungan",
            ),
            AllocationError::InvalidQuantity { .. } => AppError::validation(
                "perubahan",
                &err.to_string(),
                "Jumlah tidak valid untuk tipe produk ini",
            ),
            AllocationError::KindCannotIncrease(_) | AllocationError::KindCannotDecrease(_) => {
                AppError::validation(
                    "jenis",
                    &err.to_string(),
                    "Jenis perubahan tidak sesuai dengan arah perubahan stok",
                )
            }
            AllocationError::MissingLossCategory => AppError::validation(
                "tipeKerugian",
                &err.to_string(),
                "Tipe kerugian wajib diisi untuk penghapusan stok",
            ),
            AllocationError::UnexpectedLossCategory => AppError::validation(
                "tipeKerugian",
                &err.to_string(),
                "Tipe kerugian hanya berlaku untuk pengurangan stok",
            ),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: errors.to_string(),
            message_id: format!("Data tidak valid: {}", field),
            field,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    /// Indonesian message
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, code, message_en, message_id, field) = match &self {
            AppError::Validation {
                field,
                message,
                message_id,
            } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message.clone(),
                message_id.clone(),
                Some(field.clone()),
            ),
            AppError::InvalidDelta => (
                StatusCode::BAD_REQUEST,
                "INVALID_DELTA",
                "Stock change must be non-zero".to_string(),
                "Perubahan stok tidak boleh nol".to_string(),
                Some("perubahan".to_string()),
            ),
            AppError::MissingShelfLife => (
                StatusCode::BAD_REQUEST,
                "MISSING_SHELF_LIFE",
                "Shelf life is required when increasing stock".to_string(),
                "Masa simpan wajib diisi saat menambah stok".to_string(),
                Some("masaSimpanHari".to_string()),
            ),
            AppError::UnknownProduct(id) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_PRODUCT",
                format!("Product {} not found", id),
                format!("Produk {} tidak ditemukan", id),
                Some("produkId".to_string()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
                format!("Data dengan {} ini sudah ada", field),
                Some(field.clone()),
            ),
            AppError::InsufficientStock {
                requested,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INSUFFICIENT_STOCK",
                format!(
                    "Insufficient stock: requested {}, available {}",
                    requested, available
                ),
                format!(
                    "Stok tidak mencukupi: diminta {}, tersedia {}",
                    requested, available
                ),
                Some("perubahan".to_string()),
            ),
            AppError::ConcurrencyConflict(id) => (
                StatusCode::CONFLICT,
                "CONCURRENCY_CONFLICT",
                format!("Product {} is being updated, please retry", id),
                format!("Produk {} sedang diperbarui, silakan coba lagi", id),
                None,
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "A storage error occurred".to_string(),
                "Terjadi kesalahan penyimpanan data".to_string(),
                None,
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
                "Terjadi kesalahan pada server".to_string(),
                None,
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                "Terjadi kesalahan pada server".to_string(),
                None,
            ),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message_en,
                message_id,
                field,
                retryable,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
