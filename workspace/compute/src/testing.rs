//! Test doubles and fixtures shared by the unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{CandidateTransaction, ImportMethod, TransactionKind};
use image::{GrayImage, ImageFormat, Luma};
use migration::{Migrator, MigratorTrait};
use model::entities::{transaction, user};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ai::{AiError, LanguageModel, StructuringTask};
use crate::import::{ImportError, ImportStrategy, PdfTextSource, StatementDocument, StrategyOutcome, statement_candidate};
use crate::receipt::{OcrEngine, OcrOutput, ReceiptError};
use crate::records::TransactionRecord;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// A stored-transaction view with a whole-unit amount.
pub fn record(
    kind: TransactionKind,
    amount: i64,
    occurred_on: NaiveDate,
    merchant: Option<&str>,
    category: Option<&str>,
) -> TransactionRecord {
    TransactionRecord {
        id: NEXT_ID.fetch_add(1, Ordering::SeqCst) as i32,
        kind,
        amount: Decimal::new(amount * 100, 2),
        occurred_on,
        merchant: merchant.map(str::to_string),
        note: None,
        payment_method: None,
        category: category.map(str::to_string),
    }
}

/// The candidate a statement strategy produces for this row.
pub fn candidate(
    occurred_on: NaiveDate,
    amount: Decimal,
    kind: TransactionKind,
    description: &str,
) -> CandidateTransaction {
    statement_candidate(occurred_on, amount, kind, description)
}

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("Failed to open database");
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

pub async fn create_user(db: &DatabaseConnection, email: &str) -> user::Model {
    user::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set("hash".to_string()),
        display_name: Set("Test".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

pub async fn insert_transaction(
    db: &DatabaseConnection,
    user_id: i32,
    kind: TransactionKind,
    amount: Decimal,
    occurred_on: NaiveDate,
    merchant: Option<&str>,
) -> transaction::Model {
    transaction::ActiveModel {
        user_id: Set(user_id),
        kind: Set(kind.into()),
        amount: Set(amount),
        occurred_on: Set(occurred_on),
        merchant: Set(merchant.map(str::to_string)),
        note: Set(None),
        payment_method: Set(None),
        category_id: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create transaction")
}

/// A small valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let image = GrayImage::from_pixel(8, 8, Luma([255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes.into_inner()
}

/// Counts how often the wrapped strategy runs.
pub struct CountingStrategy {
    inner: Box<dyn ImportStrategy>,
    calls: AtomicUsize,
}

impl CountingStrategy {
    pub fn wrap(inner: impl ImportStrategy + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImportStrategy for CountingStrategy {
    fn method(&self) -> ImportMethod {
        self.inner.method()
    }

    async fn extract(&self, document: &StatementDocument) -> StrategyOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.extract(document).await
    }
}

/// A language model with canned answers.
pub struct ScriptedModel {
    summary: Result<String, AiError>,
    structured: Result<Value, AiError>,
    summarize_calls: AtomicUsize,
    structure_calls: AtomicUsize,
    document_calls: AtomicUsize,
}

impl ScriptedModel {
    fn scripted(summary: Result<String, AiError>, structured: Result<Value, AiError>) -> Self {
        Self {
            summary,
            structured,
            summarize_calls: AtomicUsize::new(0),
            structure_calls: AtomicUsize::new(0),
            document_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let error = AiError::Network("connection refused".to_string());
        Self::scripted(Err(error.clone()), Err(error))
    }

    pub fn structuring(value: Value) -> Self {
        Self::scripted(Err(AiError::NotConfigured), Ok(value))
    }

    pub fn summarizing(answer: &str) -> Self {
        Self::scripted(Ok(answer.to_string()), Err(AiError::NotConfigured))
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn structure_calls(&self) -> usize {
        self.structure_calls.load(Ordering::SeqCst)
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn summarize(&self, _query: &str, _: &[TransactionRecord]) -> Result<String, AiError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.summary.clone()
    }

    async fn structure(&self, _task: StructuringTask, _text: &str) -> Result<Value, AiError> {
        self.structure_calls.fetch_add(1, Ordering::SeqCst);
        self.structured.clone()
    }

    async fn structure_document(
        &self,
        _task: StructuringTask,
        _mime_type: &str,
        _bytes: &[u8],
    ) -> Result<Value, AiError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.structured.clone()
    }
}

/// A PDF whose text layer is fixed.
pub struct StaticPdf {
    text: String,
}

impl StaticPdf {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

#[async_trait]
impl PdfTextSource for StaticPdf {
    async fn extract_text(&self, _bytes: &[u8]) -> Result<String, ImportError> {
        Ok(self.text.clone())
    }
}

/// A PDF that cannot be read.
pub struct FailingPdf;

#[async_trait]
impl PdfTextSource for FailingPdf {
    async fn extract_text(&self, _bytes: &[u8]) -> Result<String, ImportError> {
        Err(ImportError::Pdf("unreadable".to_string()))
    }
}

/// OCR that "reads" fixed text.
pub struct StaticOcr {
    output: OcrOutput,
}

impl StaticOcr {
    pub fn new(text: &str, confidence: f64) -> Self {
        Self {
            output: OcrOutput {
                text: text.to_string(),
                confidence,
            },
        }
    }
}

#[async_trait]
impl OcrEngine for StaticOcr {
    async fn recognize(&self, _image: &GrayImage) -> Result<OcrOutput, ReceiptError> {
        Ok(self.output.clone())
    }
}
