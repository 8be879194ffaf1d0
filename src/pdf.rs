//! PDF rendering of analysis results
//!
//! Emphasis follows a single-delimiter convention: after `**` is folded into
//! `*`, the text is split on `*` and every odd segment is bold. An unmatched
//! trailing delimiter keeps bold on until the end of the text.

use crate::lexicon;
use crate::runtime::{PdfRenderer, RenderedPdf};
use async_trait::async_trait;
use genpdf::elements::{Break, Paragraph};
use genpdf::style::Style;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOFT_HYPHEN: char = '\u{00ad}';
const FONT_SIZE: u8 = 11;
const MARGIN_MM: i32 = 15;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to load font family {family} from {dir}: {source}")]
    Font {
        family: String,
        dir: PathBuf,
        #[source]
        source: genpdf::error::Error,
    },
    #[error("Failed to render PDF: {0}")]
    Render(#[from] genpdf::error::Error),
    #[error("PDF output directory unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A stretch of text with uniform weight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

impl Run {
    fn new(text: impl Into<String>, bold: bool) -> Self {
        Self {
            text: text.into(),
            bold,
        }
    }
}

/// Split text into bold and regular runs, dropping soft hyphens
pub fn bold_runs(text: &str) -> Vec<Run> {
    let cleaned = text.replace(SOFT_HYPHEN, "").replace("**", "*");
    cleaned
        .split('*')
        .enumerate()
        .filter(|(_, segment)| !segment.is_empty())
        .map(|(i, segment)| Run::new(segment, i % 2 == 1))
        .collect()
}

/// Break runs into lines; a run spanning a newline continues on the next line
/// with the same weight
pub fn layout_lines(runs: &[Run]) -> Vec<Vec<Run>> {
    let mut lines = vec![Vec::new()];
    for run in runs {
        for (i, piece) in run.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Vec::new());
            }
            if !piece.is_empty() {
                if let Some(line) = lines.last_mut() {
                    line.push(Run::new(piece, run.bold));
                }
            }
        }
    }
    lines
}

/// File name shown to the user, `<participant>_analysis.pdf`
pub fn pdf_file_name(participant: &str) -> String {
    let stem: String = participant
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { "analysis" } else { stem.as_str() };
    format!("{stem}_analysis.pdf")
}

/// Renders with genpdf using a TTF family loaded from disk
#[derive(Debug, Clone)]
pub struct GenPdfRenderer {
    font_dir: PathBuf,
    font_family: String,
    output_dir: PathBuf,
}

impl GenPdfRenderer {
    pub fn new(font_dir: PathBuf, font_family: String, output_dir: PathBuf) -> Self {
        Self {
            font_dir,
            font_family,
            output_dir,
        }
    }

    fn render_blocking(&self, text: &str, title: &str, path: &Path) -> Result<(), PdfError> {
        let fonts = genpdf::fonts::from_files(&self.font_dir, &self.font_family, None).map_err(
            |source| PdfError::Font {
                family: self.font_family.clone(),
                dir: self.font_dir.clone(),
                source,
            },
        )?;

        let mut doc = genpdf::Document::new(fonts);
        doc.set_title(title);
        doc.set_font_size(FONT_SIZE);
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(MARGIN_MM);
        doc.set_page_decorator(decorator);

        for line in layout_lines(&bold_runs(text)) {
            if line.is_empty() {
                doc.push(Break::new(1));
                continue;
            }
            let mut paragraph = Paragraph::default();
            for run in line {
                if run.bold {
                    paragraph.push_styled(run.text, Style::new().bold());
                } else {
                    paragraph.push(run.text);
                }
            }
            doc.push(paragraph);
        }

        doc.render_to_file(path)?;
        Ok(())
    }
}

#[async_trait]
impl PdfRenderer for GenPdfRenderer {
    async fn render(&self, text: &str, participant: &str) -> Result<RenderedPdf, PdfError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{}.pdf", uuid::Uuid::new_v4()));
        let file_name = pdf_file_name(participant);
        let title = format!("{}: {}", lexicon::PDF_TITLE, participant);

        let renderer = self.clone();
        let text = text.to_string();
        let target = path.clone();
        tokio::task::spawn_blocking(move || renderer.render_blocking(&text, &title, &target))
            .await??;

        tracing::debug!(path = %path.display(), "Rendered PDF");
        Ok(RenderedPdf { path, file_name })
    }
}
