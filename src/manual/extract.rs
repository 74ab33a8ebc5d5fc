use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ExtractionError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLine {
    pub text: String,
    pub page: u32,
}

impl ExtractedLine {
    pub fn new(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
        }
    }
}

/// What the extraction collaborator hands the parser: either ordered lines or
/// the reason no text is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Lines(Vec<ExtractedLine>),
    Failed(String),
}

pub trait TextExtractor {
    fn name(&self) -> &'static str;

    fn extract(&self, path: &Path) -> Result<Vec<ExtractedLine>, ExtractionError>;
}

/// Runs the extractor and folds any error into `ExtractionOutcome::Failed`.
pub fn extract_outcome(extractor: &dyn TextExtractor, path: &Path) -> ExtractionOutcome {
    match extractor.extract(path) {
        Ok(lines) => {
            info!(
                extractor = extractor.name(),
                path = %path.display(),
                lines = lines.len(),
                "text extraction completed"
            );
            ExtractionOutcome::Lines(lines)
        }
        Err(err) => {
            warn!(
                extractor = extractor.name(),
                path = %path.display(),
                error = %err,
                "text extraction failed"
            );
            ExtractionOutcome::Failed(err.to_string())
        }
    }
}

pub fn extractor_for(
    path: &Path,
    timeout: Duration,
    max_pages: Option<usize>,
) -> Box<dyn TextExtractor> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        Box::new(PdftotextExtractor { timeout, max_pages })
    } else {
        Box::new(PlainTextExtractor)
    }
}

/// Pre-extracted text; pages are separated by form feeds as `pdftotext` emits.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain_text"
    }

    fn extract(&self, path: &Path) -> Result<Vec<ExtractedLine>, ExtractionError> {
        let raw = fs::read(path).map_err(|source| ExtractionError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let text = String::from_utf8_lossy(&raw);
        Ok(lines_from_pages(&split_form_feed_pages(&text)))
    }
}

#[derive(Debug, Clone)]
pub struct PdftotextExtractor {
    pub timeout: Duration,
    pub max_pages: Option<usize>,
}

impl TextExtractor for PdftotextExtractor {
    fn name(&self) -> &'static str {
        "pdftotext"
    }

    fn extract(&self, path: &Path) -> Result<Vec<ExtractedLine>, ExtractionError> {
        let mut command = Command::new("pdftotext");
        command.arg("-layout").arg("-enc").arg("UTF-8").arg("-f").arg("1");
        if let Some(max_pages) = self.max_pages {
            command.arg("-l").arg(max_pages.to_string());
        }
        command.arg(path).arg("-");

        let stdout = run_with_timeout("pdftotext", command, self.timeout)?;
        let raw = String::from_utf8_lossy(&stdout);
        Ok(lines_from_pages(&split_form_feed_pages(&raw)))
    }
}

pub fn split_form_feed_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

pub fn lines_from_pages(pages: &[String]) -> Vec<ExtractedLine> {
    pages
        .iter()
        .enumerate()
        .flat_map(|(index, page)| {
            let page_number = (index + 1) as u32;
            page.lines()
                .map(move |line| ExtractedLine::new(line.trim_end(), page_number))
        })
        .collect()
}

fn run_with_timeout(
    program: &'static str,
    mut command: Command,
    timeout: Duration,
) -> Result<Vec<u8>, ExtractionError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExtractionError::Spawn { program, source })?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = thread::spawn(move || read_pipe(stdout_pipe));
    let stderr_reader = thread::spawn(move || read_pipe(stderr_pipe));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child
            .try_wait()
            .map_err(|source| ExtractionError::Wait { program, source })?
        {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                if let Err(error) = child.kill() {
                    warn!(program, error = %error, "failed to kill timed out extractor");
                }
                if let Err(error) = child.wait() {
                    warn!(program, error = %error, "failed to reap timed out extractor");
                }
                return Err(ExtractionError::TimedOut {
                    program,
                    seconds: timeout.as_secs(),
                });
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let stdout = collect_output(program, stdout_reader)?;
    let stderr = collect_output(program, stderr_reader)?;

    if !status.success() {
        return Err(ExtractionError::NonZeroExit {
            program,
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(stdout)
}

fn read_pipe<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}

fn collect_output(
    program: &'static str,
    reader: thread::JoinHandle<io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ExtractionError> {
    reader
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("output reader panicked")))
        .map_err(|source| ExtractionError::Output { program, source })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn split_form_feed_pages_drops_trailing_blank_pages() {
        let pages = split_form_feed_pages("first\u{000C}second\u{0000}\u{000C} \n\u{000C}");
        assert_eq!(pages, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn lines_from_pages_numbers_pages_from_one() {
        let pages = vec!["a\nb  ".to_string(), "c".to_string()];
        let lines = lines_from_pages(&pages);
        assert_eq!(
            lines,
            vec![
                ExtractedLine::new("a", 1),
                ExtractedLine::new("b", 1),
                ExtractedLine::new("c", 2),
            ]
        );
    }

    #[test]
    fn plain_text_extractor_reads_form_feed_pages() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "6.4 Airworthiness Directives\nbody\u{000C}6.4.1 Next").expect("write");

        let lines = PlainTextExtractor.extract(file.path()).expect("extract");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], ExtractedLine::new("6.4.1 Next", 2));
    }

    #[test]
    fn missing_file_becomes_failed_outcome() {
        let outcome = extract_outcome(&PlainTextExtractor, Path::new("/nonexistent/manual.txt"));
        assert!(matches!(
            outcome,
            ExtractionOutcome::Failed(reason) if reason.contains("failed to read")
        ));
    }

    struct BrokenPipe;

    impl Read for BrokenPipe {
        fn read(&mut self, _buffer: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }
    }

    #[test]
    fn pipe_read_errors_are_reported() {
        assert!(read_pipe(Some(BrokenPipe)).is_err());
        assert_eq!(read_pipe(None::<BrokenPipe>).expect("no pipe"), Vec::<u8>::new());

        let reader = thread::spawn(|| read_pipe(Some(BrokenPipe)));
        let err = collect_output("pdftotext", reader).expect_err("read failure");
        assert!(matches!(err, ExtractionError::Output { program: "pdftotext", .. }));
        assert!(err.to_string().contains("pipe closed"));
    }

    #[cfg(unix)]
    #[test]
    fn run_with_timeout_kills_hung_process() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let started = Instant::now();
        let result = run_with_timeout("sleep", command, Duration::from_millis(100));
        assert!(matches!(result, Err(ExtractionError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
