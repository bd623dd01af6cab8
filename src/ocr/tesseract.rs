//! Tesseract OCR engine adapter.
//!
//! Shells out to the system `tesseract` binary (TSV output for word-level
//! geometry and confidence) and to poppler's `pdftoppm`/`pdftotext` for
//! PDF handling. PDFs with embedded text take the native-text path;
//! image-only PDFs are rasterized page by page and OCRed.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::engine::{EngineError, OcrEngine, Recognition};
use crate::config::TesseractConfig;
use crate::models::{BoundingBox, TextRegion};

/// Synthetic line geometry for text that did not come from a raster.
/// Native PDF text has no pixel boxes, so lines get nominal ones.
const SYNTHETIC_LINE_HEIGHT: u32 = 16;
const SYNTHETIC_CHAR_WIDTH: u32 = 8;

/// Check whether a binary is on PATH.
fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Map a supported MIME type to a scratch-file extension.
fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/tiff" => "tif",
        _ => "bin",
    }
}

/// Handle command output, extracting stdout on success.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
) -> Result<String, EngineError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(EngineError::Failed(format!("{tool_name}: {stderr}")))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::NotAvailable(
            format!("{tool_name} not found on PATH"),
        )),
        Err(e) => Err(EngineError::Io(e)),
    }
}

/// Parse tesseract TSV output into line-level text regions.
///
/// Word rows (level 5) with non-negative confidence are grouped by
/// (page, block, paragraph, line); each group becomes one region whose
/// box is the union of its word boxes and whose confidence is the mean
/// word confidence rescaled from tesseract's 0-100 to [0, 1].
fn parse_tsv(tsv: &str) -> Vec<TextRegion> {
    struct LineAcc {
        key: (u32, u32, u32, u32),
        words: Vec<String>,
        confs: Vec<f64>,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    }

    let mut lines: Vec<LineAcc> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let conf: f64 = match cols[10].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        if conf < 0.0 {
            continue;
        }

        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }

        let parse_u32 = |s: &str| s.parse::<u32>().ok();
        let (Some(page), Some(block), Some(par), Some(line)) = (
            parse_u32(cols[1]),
            parse_u32(cols[2]),
            parse_u32(cols[3]),
            parse_u32(cols[4]),
        ) else {
            continue;
        };
        let (Some(left), Some(top), Some(width), Some(height)) = (
            parse_u32(cols[6]),
            parse_u32(cols[7]),
            parse_u32(cols[8]),
            parse_u32(cols[9]),
        ) else {
            continue;
        };

        let key = (page, block, par, line);
        let right = left + width;
        let bottom = top + height;

        match lines.last_mut() {
            Some(acc) if acc.key == key => {
                acc.words.push(text.to_string());
                acc.confs.push(conf);
                acc.left = acc.left.min(left);
                acc.top = acc.top.min(top);
                acc.right = acc.right.max(right);
                acc.bottom = acc.bottom.max(bottom);
            }
            _ => lines.push(LineAcc {
                key,
                words: vec![text.to_string()],
                confs: vec![conf],
                left,
                top,
                right,
                bottom,
            }),
        }
    }

    lines
        .into_iter()
        .map(|acc| {
            let confidence =
                acc.confs.iter().sum::<f64>() / acc.confs.len() as f64 / 100.0;
            TextRegion::new(
                BoundingBox::new(
                    acc.left,
                    acc.top,
                    acc.right - acc.left,
                    acc.bottom - acc.top,
                ),
                acc.words.join(" "),
                confidence,
            )
        })
        .collect()
}

/// Build synthetic regions for text without raster geometry, one region
/// per non-empty line, confidence 1.0 (the text is exact, not recognized).
fn synthesize_regions(text: &str) -> Vec<TextRegion> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let trimmed = line.trim();
            TextRegion::new(
                BoundingBox::new(
                    0,
                    idx as u32 * SYNTHETIC_LINE_HEIGHT,
                    trimmed.chars().count() as u32 * SYNTHETIC_CHAR_WIDTH,
                    SYNTHETIC_LINE_HEIGHT,
                ),
                trimmed,
                1.0,
            )
        })
        .collect()
}

/// Tesseract-backed OCR engine.
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Run tesseract in TSV mode on an image file.
    fn run_tesseract_tsv(&self, image_path: &Path) -> Result<Vec<TextRegion>, EngineError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .arg("tsv")
            .output();

        let tsv = handle_cmd_output(output, "tesseract")?;
        Ok(parse_tsv(&tsv))
    }

    /// Extract embedded text from a PDF with pdftotext.
    fn run_pdftotext(&self, pdf_path: &Path) -> Result<String, EngineError> {
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(pdf_path)
            .arg("-")
            .output();

        handle_cmd_output(output, "pdftotext")
    }

    /// Rasterize every page of a PDF, returning image paths in page order.
    fn rasterize_pdf(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let dpi = self.config.dpi.to_string();
        let prefix = out_dir.join("page");

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi])
            .arg(pdf_path)
            .arg(&prefix)
            .status();

        match status {
            Ok(s) if s.success() => {}
            Ok(_) => {
                return Err(EngineError::Failed(
                    "pdftoppm could not rasterize the document".to_string(),
                ))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::NotAvailable(
                    "pdftoppm not found on PATH".to_string(),
                ))
            }
            Err(e) => return Err(EngineError::Io(e)),
        }

        let mut pages: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("page-") && n.ends_with(".png"))
            })
            .collect();
        pages.sort();
        Ok(pages)
    }

    fn recognize_pdf(&self, pdf_path: &Path, scratch: &Path) -> Result<Recognition, EngineError> {
        // Native text path: image-only scans yield little or nothing here.
        if let Ok(text) = self.run_pdftotext(pdf_path) {
            if text.trim().chars().count() >= self.config.min_chars_per_page {
                tracing::debug!("using embedded pdf text");
                let regions = synthesize_regions(&text);
                let page_count = text.matches('\u{c}').count() as u32 + 1;
                return Ok(Recognition {
                    regions,
                    page_count: Some(page_count),
                });
            }
        }

        let pages = self.rasterize_pdf(pdf_path, scratch)?;
        if pages.is_empty() {
            return Err(EngineError::Failed(
                "document produced no pages".to_string(),
            ));
        }

        let mut regions = Vec::new();
        for page in &pages {
            regions.extend(self.run_tesseract_tsv(page)?);
        }

        Ok(Recognition {
            regions,
            page_count: Some(pages.len() as u32),
        })
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(TesseractConfig::default())
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else if !check_binary("pdftoppm") || !check_binary("pdftotext") {
            "poppler tools not installed. Install with: apt install poppler-utils".to_string()
        } else {
            "tesseract is available".to_string()
        }
    }

    fn recognize(&self, payload: &[u8], media_type: &str) -> Result<Recognition, EngineError> {
        let scratch = TempDir::new()?;
        let input = scratch
            .path()
            .join(format!("input.{}", extension_for(media_type)));
        std::fs::write(&input, payload)?;

        if media_type == "application/pdf" {
            self.recognize_pdf(&input, scratch.path())
        } else {
            let regions = self.run_tesseract_tsv(&input)?;
            Ok(Recognition::single_page(regions))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV_HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_groups_words_into_lines() {
        let tsv = format!(
            "{TSV_HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t600\t800\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t20\t80\t14\t96\tInvoice\n\
             5\t1\t1\t1\t1\t2\t100\t20\t40\t14\t92\tNo:\n\
             5\t1\t1\t1\t2\t1\t10\t40\t120\t14\t88\tTotal\n"
        );
        let regions = parse_tsv(&tsv);
        assert_eq!(regions.len(), 2);

        assert_eq!(regions[0].text, "Invoice No:");
        assert!((regions[0].confidence - 0.94).abs() < 1e-9);
        assert_eq!(regions[0].bounding_box, BoundingBox::new(10, 20, 130, 14));

        assert_eq!(regions[1].text, "Total");
        assert!((regions[1].confidence - 0.88).abs() < 1e-9);
    }

    #[test]
    fn test_parse_tsv_skips_nonword_and_empty_rows() {
        let tsv = format!(
            "{TSV_HEADER}\n\
             4\t1\t1\t1\t1\t0\t10\t20\t200\t14\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t20\t80\t14\t95\t \n\
             5\t1\t1\t1\t1\t2\t100\t20\t40\t14\t-1\tghost\n"
        );
        assert!(parse_tsv(&tsv).is_empty());
    }

    #[test]
    fn test_synthesize_regions_skips_blank_lines() {
        let regions = synthesize_regions("Invoice No: 42\n\n  Total: $10\n");
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text, "Invoice No: 42");
        assert_eq!(regions[0].confidence, 1.0);
        assert_eq!(regions[1].text, "Total: $10");
        // Line index, not region index, drives vertical placement.
        assert_eq!(regions[1].bounding_box.y, 2 * SYNTHETIC_LINE_HEIGHT);
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
