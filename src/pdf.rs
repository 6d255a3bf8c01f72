//! HTML → PDF converters.
//!
//! [`PrintPdfConverter`] lays the text content of the markup out on plain
//! pages with printpdf's builtin Helvetica, in process. [`WkhtmltopdfConverter`]
//! pipes the markup through an installed `wkhtmltopdf` and streams its stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures::channel::mpsc;
use futures::{stream, SinkExt, StreamExt};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Point, Pt, TextItem,
};
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::contract::{PdfConverter, PdfOptions, PdfStream};
use crate::error::BoxError;

const PT_PER_MM: f32 = 2.834_646;
const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct PrintPdfConverter {
    pub title: String,
    pub font_size_pt: f32,
    pub margin_mm: f32,
}

impl Default for PrintPdfConverter {
    fn default() -> Self {
        Self {
            title: "Shipper's Letter of Instruction".into(),
            font_size_pt: 9.0,
            margin_mm: 15.0,
        }
    }
}

impl PrintPdfConverter {
    fn line_height_pt(&self) -> f32 {
        self.font_size_pt * 1.35
    }

    /// Characters that fit one line; Helvetica averages about half an em.
    fn chars_per_line(&self, page_width_mm: f32) -> usize {
        let usable_pt = (page_width_mm - 2.0 * self.margin_mm) * PT_PER_MM;
        ((usable_pt / (self.font_size_pt * 0.55)) as usize).max(20)
    }

    fn lines_per_page(&self, page_height_mm: f32) -> usize {
        let usable_pt = (page_height_mm - 2.0 * self.margin_mm) * PT_PER_MM;
        ((usable_pt / self.line_height_pt()) as usize).max(1)
    }

    /// Lay `html` out on pages of the requested size and save the document.
    pub fn render_bytes(&self, html: &str, options: PdfOptions) -> Result<Vec<u8>, BoxError> {
        let (width, height) = options.page_mm();
        let lines: Vec<String> = html_to_lines(html)
            .into_iter()
            .flat_map(|line| wrap_line(&line, self.chars_per_line(width)))
            .collect();

        let per_page = self.lines_per_page(height);
        let mut pages = Vec::new();
        for chunk in lines.chunks(per_page) {
            pages.push(self.page(chunk, width, height));
        }
        if pages.is_empty() {
            warn!("Rendered markup has no text content, emitting a blank page");
            pages.push(self.page(&[], width, height));
        }
        let page_count = pages.len();

        let mut warnings = Vec::new();
        let bytes = PdfDocument::new(&self.title)
            .with_pages(pages)
            .save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "printpdf reported warnings");
        }
        debug!(pages = page_count, lines = lines.len(), size = bytes.len(), "Laid out PDF");
        Ok(bytes)
    }

    fn page(&self, lines: &[String], width_mm: f32, height_mm: f32) -> PdfPage {
        let mut ops = vec![
            Op::StartTextSection,
            Op::SetTextCursor {
                pos: Point::new(
                    Mm(self.margin_mm),
                    Mm(height_mm - self.margin_mm - self.font_size_pt / PT_PER_MM),
                ),
            },
            Op::SetFontSizeBuiltinFont {
                size: Pt(self.font_size_pt),
                font: BuiltinFont::Helvetica,
            },
            Op::SetLineHeight {
                lh: Pt(self.line_height_pt()),
            },
        ];
        for line in lines {
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line.clone())],
                font: BuiltinFont::Helvetica,
            });
            ops.push(Op::AddLineBreak);
        }
        ops.push(Op::EndTextSection);
        PdfPage::new(Mm(width_mm), Mm(height_mm), ops)
    }
}

impl PdfConverter for PrintPdfConverter {
    fn convert(&self, html: String, options: PdfOptions) -> PdfStream {
        let layout = self.clone();
        stream::once(async move {
            tokio::task::spawn_blocking(move || layout.render_bytes(&html, options))
                .await
                .map_err(|e| -> BoxError { Box::new(e) })?
        })
        .boxed()
    }
}

/// Visible text of `html`, one entry per block-level line.
pub fn html_to_lines(html: &str) -> Vec<String> {
    let hidden = Regex::new(r"(?is)<head\b.*?</head\s*>|<style\b.*?</style\s*>|<script\b.*?</script\s*>")
        .expect("valid regex");
    let line_breaks =
        Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|h[1-6]|li|table|title)\s*>").expect("valid regex");
    let cell_ends = Regex::new(r"(?i)</t[dh]\s*>").expect("valid regex");
    let tags = Regex::new(r"<[^>]*>").expect("valid regex");
    let spaces = Regex::new(r"\s+").expect("valid regex");

    let text = hidden.replace_all(html, "");
    let text = line_breaks.replace_all(&text, "\n");
    let text = cell_ends.replace_all(&text, "  ");
    let text = tags.replace_all(&text, "");

    text.lines()
        .map(|line| spaces.replace_all(&decode_entities(line), " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#x3D;", "=")
        .replace("&#x60;", "`")
        .replace("&amp;", "&")
}

/// Break `line` at word boundaries so no piece exceeds `max_chars`.
fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
        // Words longer than a line are hard-split.
        while current.chars().count() > max_chars {
            let split_at = current
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(current.len());
            let rest = current.split_off(split_at);
            wrapped.push(std::mem::replace(&mut current, rest));
        }
    }
    if !current.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

/// Converter backed by the external `wkhtmltopdf` binary.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfConverter {
    binary: PathBuf,
}

impl Default for WkhtmltopdfConverter {
    fn default() -> Self {
        Self::new("wkhtmltopdf")
    }
}

impl WkhtmltopdfConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl PdfConverter for WkhtmltopdfConverter {
    fn convert(&self, html: String, options: PdfOptions) -> PdfStream {
        let (mut tx, rx) = mpsc::channel::<Result<Vec<u8>, BoxError>>(16);
        let binary = self.binary.clone();

        tokio::spawn(async move {
            if let Err(e) = pipe_through_wkhtmltopdf(&binary, html, options, &mut tx).await {
                error!(binary = %binary.display(), error = %e, "wkhtmltopdf conversion failed");
                let _ = tx.send(Err(e)).await;
            }
        });

        rx.boxed()
    }
}

async fn pipe_through_wkhtmltopdf(
    binary: &Path,
    html: String,
    options: PdfOptions,
    tx: &mut mpsc::Sender<Result<Vec<u8>, BoxError>>,
) -> Result<(), BoxError> {
    info!(
        binary = %binary.display(),
        page_size = options.size.as_str(),
        orientation = options.orientation.as_str(),
        "Starting wkhtmltopdf"
    );
    let mut child = Command::new(binary)
        .args([
            "--quiet",
            "--page-size",
            options.size.as_str(),
            "--orientation",
            options.orientation.as_str(),
            "-",
            "-",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdin = child.stdin.take().ok_or("wkhtmltopdf stdin unavailable")?;
    let mut stdout = child.stdout.take().ok_or("wkhtmltopdf stdout unavailable")?;

    let writer = tokio::spawn(async move {
        stdin.write_all(html.as_bytes()).await?;
        stdin.shutdown().await
    });

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
            debug!("PDF stream receiver dropped, stopping wkhtmltopdf");
            return Ok(());
        }
    }
    writer.await??;

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(format!(
            "wkhtmltopdf exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Orientation, PageSize};
    use crate::render::collect_pdf;

    #[test]
    fn html_to_lines_keeps_visible_text_only() {
        let html = r#"<html><head><title>T</title><style>td { color: red; }</style></head>
<body><h1>Title</h1><p>A &amp; B</p><table><tr><td>x</td><td>y</td></tr></table>line<br/>two</body></html>"#;
        let lines = html_to_lines(html);
        assert_eq!(lines, vec!["Title", "A & B", "x y", "line", "two"]);
    }

    #[test]
    fn wrap_line_respects_width() {
        let wrapped = wrap_line("aaa bbb ccc ddd", 7);
        assert_eq!(wrapped, vec!["aaa bbb", "ccc ddd"]);
        let long = wrap_line("abcdefghij", 4);
        assert_eq!(long, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn renders_a_pdf_document() {
        let bytes = PrintPdfConverter::default()
            .render_bytes("<p>Hello SLI</p>", PdfOptions::default())
            .unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[test]
    fn long_documents_span_several_pages() {
        let converter = PrintPdfConverter::default();
        let per_page = converter.lines_per_page(297.0);
        assert!(per_page > 10);
        let html: String = (0..per_page * 2 + 1).map(|i| format!("<p>line {i}</p>")).collect();
        let bytes = converter.render_bytes(&html, PdfOptions::default()).unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[test]
    fn landscape_swaps_page_dimensions() {
        let options = PdfOptions {
            size: PageSize::A4,
            orientation: Orientation::Landscape,
        };
        assert_eq!(options.page_mm(), (297.0, 210.0));
        assert_eq!(PdfOptions::default().page_mm(), (210.0, 297.0));
    }

    #[tokio::test]
    async fn printpdf_converter_streams_pdf_bytes() {
        let stream = PrintPdfConverter::default().convert("<p>stream</p>".into(), PdfOptions::default());
        let bytes = collect_pdf(stream).await.unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[tokio::test]
    async fn missing_wkhtmltopdf_binary_fails_the_stream() {
        let converter = WkhtmltopdfConverter::new("/nonexistent/bin/wkhtmltopdf");
        let result = collect_pdf(converter.convert("<p>x</p>".into(), PdfOptions::default())).await;
        assert!(matches!(result, Err(crate::error::SliError::Render(_))));
    }
}
