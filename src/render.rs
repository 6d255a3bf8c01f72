//! HTML templating of the SLI document and collection of the converted PDF.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use handlebars::Handlebars;
use tracing::{debug, error, info};

use crate::contract::{PdfConverter, PdfOptions, PdfStream};
use crate::error::{SliError, SliResult};
use crate::model::DocumentModel;

pub const SLI_FILENAME_PREFIX: &str = "SLI_";

/// A rendered SLI ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSli {
    pub filename: String,
    pub data: Vec<u8>,
}

/// `SLI_<unix millis>.pdf`
pub fn sli_filename(created_at: DateTime<Utc>) -> String {
    format!("{SLI_FILENAME_PREFIX}{}.pdf", created_at.timestamp_millis())
}

/// Renders the SLI HTML template against a [`DocumentModel`].
pub struct TemplateRenderer {
    template_path: PathBuf,
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new(template_path: impl Into<PathBuf>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_helper("fixed", Box::new(fixed_helper));

        Self {
            template_path: template_path.into(),
            handlebars,
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Read the template source from disk.
    pub async fn load_template(&self) -> SliResult<String> {
        tokio::fs::read_to_string(&self.template_path)
            .await
            .map_err(|e| {
                error!(path = %self.template_path.display(), error = ?e, "Failed to read SLI template");
                SliError::TemplateRead {
                    path: self.template_path.clone(),
                    source: e,
                }
            })
    }

    /// Render `template` with the model as context.
    pub fn render_html(&self, template: &str, model: &DocumentModel) -> SliResult<String> {
        self.handlebars
            .render_template(template, model)
            .map_err(|e| {
                error!(error = %e, "Failed to render SLI template");
                SliError::Render(format!("template: {e}"))
            })
    }

    /// Read the template and render it.
    pub async fn render(&self, model: &DocumentModel) -> SliResult<String> {
        let template = self.load_template().await?;
        let html = self.render_html(&template, model)?;
        debug!(bytes = html.len(), "Rendered SLI markup");
        Ok(html)
    }
}

/// Drain a PDF stream into one buffer. The first error aborts; an empty
/// stream is treated as a failed conversion.
pub async fn collect_pdf(mut stream: PdfStream) -> SliResult<Vec<u8>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => buffer.extend_from_slice(&bytes),
            Err(e) => {
                error!(error = %e, received = buffer.len(), "PDF conversion stream failed");
                return Err(SliError::Render(e.to_string()));
            }
        }
    }

    if buffer.is_empty() {
        error!("PDF conversion produced no output");
        return Err(SliError::Render("converter produced no output".into()));
    }
    Ok(buffer)
}

/// Render the model to markup, convert it and wrap the bytes with their filename.
pub async fn render_sli<C>(
    renderer: &TemplateRenderer,
    converter: &C,
    model: &DocumentModel,
    options: PdfOptions,
    created_at: DateTime<Utc>,
) -> SliResult<RenderedSli>
where
    C: PdfConverter + ?Sized,
{
    let html = renderer.render(model).await?;
    let data = collect_pdf(converter.convert(html, options)).await?;
    let filename = sli_filename(created_at);
    info!(
        filename = %filename,
        size = data.len(),
        page_size = options.size.as_str(),
        orientation = options.orientation.as_str(),
        "Rendered SLI PDF"
    );
    Ok(RenderedSli { filename, data })
}

/// `{{fixed value 2}}`: a number with a fixed count of decimals.
fn fixed_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_f64()).unwrap_or(0.0);
    let digits = h.param(1).and_then(|v| v.value().as_u64()).unwrap_or(2) as usize;
    out.write(&format!("{value:.digits$}"))?;
    Ok(())
}
