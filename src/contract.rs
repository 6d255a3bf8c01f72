#![allow(unused)]

//! # contract: collaborator interfaces of the SLI pipeline
//!
//! The pipeline talks to three external services, each behind a trait so the
//! orchestration can run against real backends, the local reference
//! implementations in [`crate::local`] and [`crate::pdf`], or mocks.
//!
//! - [`OrderQuery`] fetches the orders consolidated into a bulk.
//! - [`FilePersistence`] stores a generated document and hands back its id.
//! - [`PdfConverter`] turns rendered markup into a stream of PDF bytes.
//!
//! ## Mocking & Testing
//! - Traits are annotated for `mockall`; the mocks are exported with the
//!   `test-export-mocks` feature so integration tests can use them.
//!
//! ## Errors
//! - Collaborators return boxed errors; the pipeline wraps them into
//!   [`crate::error::SliError`] variants that keep the original cause.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use mockall::{automock, predicate::*};

use crate::error::BoxError;
use crate::model::{BulkContent, Order};

/// Stream of PDF byte chunks. Ends after the last chunk; an `Err` item
/// aborts the conversion.
pub type PdfStream = BoxStream<'static, Result<Vec<u8>, BoxError>>;

/// Fetches the orders belonging to a bulk.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait OrderQuery: Send + Sync {
    /// Return every order referenced by the bulk content. An empty list is
    /// a valid answer; deciding whether that is an error is up to the caller.
    async fn get_all_orders_in_bulk(&self, content: &BulkContent)
        -> Result<Vec<Order>, BoxError>;
}

/// Stores generated documents.
///
/// Implementations must fail atomically: on `Err` no partial file is visible.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FilePersistence: Send + Sync {
    /// Persist `data` under `filename`, grouped by `ref_collection` and the
    /// owning bulk. Returns the id the file can be fetched by.
    async fn persist_file(
        &self,
        filename: &str,
        data: Vec<u8>,
        ref_collection: &str,
        bulk_id: &str,
    ) -> Result<String, BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Portrait width and height in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "Letter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "Portrait",
            Orientation::Landscape => "Landscape",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PdfOptions {
    #[serde(default)]
    pub size: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
}

impl PdfOptions {
    /// Page width and height in millimetres, orientation applied.
    pub fn page_mm(&self) -> (f32, f32) {
        let (w, h) = self.size.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// Converts rendered HTML into PDF bytes.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait PdfConverter: Send + Sync {
    fn convert(&self, html: String, options: PdfOptions) -> PdfStream;
}

impl<T: PdfConverter + ?Sized> PdfConverter for Box<T> {
    fn convert(&self, html: String, options: PdfOptions) -> PdfStream {
        (**self).convert(html, options)
    }
}
