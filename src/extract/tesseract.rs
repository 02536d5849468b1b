//! Tesseract OCR, run as an external process with TSV output

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::ExtractionError;

use super::traits::{ExtractedText, RecognizedWord, TextExtractor};

/// Columns in a tesseract TSV row; the last one is the text
const TSV_COLUMNS: usize = 12;
const CONF_COLUMN: usize = 10;

pub struct TesseractOcr {
    binary: String,
    languages: String,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        let languages = if config.languages.is_empty() {
            "eng".to_string()
        } else {
            config.languages.join("+")
        };
        Self {
            binary: config.binary.clone(),
            languages,
        }
    }

    /// True if the binary can be executed
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Parse `tesseract ... tsv` output.
///
/// Rows with confidence <= 0 or blank text are dropped; confidence is scaled
/// from percent to [0, 1].
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(TSV_COLUMNS, '\t').collect();
            if cols.len() < TSV_COLUMNS {
                return None;
            }
            let conf: f32 = cols[CONF_COLUMN].trim().parse().ok()?;
            let text = cols[TSV_COLUMNS - 1].trim();
            (conf > 0.0 && !text.is_empty()).then(|| RecognizedWord {
                text: text.to_string(),
                confidence: (conf / 100.0).clamp(0.0, 1.0),
            })
        })
        .collect()
}

#[async_trait]
impl TextExtractor for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn extract_text(&self, path: &Path) -> Result<ExtractedText, ExtractionError> {
        let output = Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("tsv")
            .stdin(Stdio::null())
            // a caller timeout drops this future; the child must not outlive it
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::Tool {
                tool: self.binary.clone(),
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ExtractionError::Tool {
                tool: self.binary.clone(),
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let words = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!("OCR found {} words in {:?}", words.len(), path);
        Ok(ExtractedText::from_words(words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
4\t1\t1\t1\t1\t0\t10\t10\t200\t30\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t80\t30\t96.5\tHello
5\t1\t1\t1\t1\t2\t100\t10\t90\t30\t88\tWorld!
5\t1\t1\t1\t1\t3\t200\t10\t5\t30\t0\tnoise
5\t1\t1\t1\t1\t4\t210\t10\t5\t30\t40\t   
";

    #[test]
    fn test_parse_tsv() {
        let words = parse_tsv(SAMPLE);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Hello");
        assert!((words[0].confidence - 0.965).abs() < 1e-6);
        assert_eq!(words[1].text, "World!");

        let text = ExtractedText::from_words(words);
        assert_eq!(text.full_text, "Hello World!");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("level\tpage_num\n").is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let config = OcrConfig {
            binary: "imgdex-no-such-ocr-binary".to_string(),
            ..Default::default()
        };
        let ocr = TesseractOcr::new(&config);
        assert!(!ocr.is_available().await);

        let err = ocr.extract_text(Path::new("x.png")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Tool { .. }));
    }

    /// True while `pid` is a live (not zombie) process
    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat.contains(") Z "),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timed_out_extraction_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-ocr.sh");
        std::fs::write(&script, "echo $$ > \"$0.pid\"\nexec sleep 30\n").unwrap();

        // `sh <script> stdout -l eng tsv` runs the script in place of tesseract
        let config = OcrConfig {
            binary: "sh".to_string(),
            ..Default::default()
        };
        let ocr = TesseractOcr::new(&config);

        let pid_file = dir.path().join("slow-ocr.sh.pid");
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            ocr.extract_text(&script),
        )
        .await;
        assert!(result.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let mut running = true;
        for _ in 0..50 {
            running = is_running(&pid);
            if !running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(!running, "OCR process {} still running", pid);
    }
}
