use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    DownloadOutcome, DownloadRequest, ExtractError, Result, VideoExtractor, VideoInfo,
};
use crate::progress::{ProgressEvent, ProgressSink, RawProgress};

const PROGRESS_PREFIX: &str = "tubefetch:progress:";
const FILE_PREFIX: &str = "tubefetch:file:";
const POSTPROCESSOR_TAGS: [&str; 4] = ["[Merger]", "[ExtractAudio]", "[VideoConvertor]", "[FixupM3u8]"];
const STDERR_TAIL: usize = 20;

/// One meaningful line of extractor output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressEvent),
    File(PathBuf),
}

/// Classify a line printed by `yt-dlp` under the templates set in
/// [`YtDlpExtractor::download_args`]. Anything unrecognised is `None`.
pub fn parse_output_line(line: &str) -> Option<OutputLine> {
    let line = line.trim();

    if let Some(json) = line.strip_prefix(PROGRESS_PREFIX) {
        return match serde_json::from_str::<RawProgress>(json) {
            Ok(raw) => raw.into_event().map(OutputLine::Progress),
            Err(err) => {
                debug!(error = %err, "Skipping malformed progress line");
                None
            }
        };
    }

    if let Some(path) = line.strip_prefix(FILE_PREFIX) {
        let path = path.trim();
        return (!path.is_empty() && path != "NA").then(|| OutputLine::File(PathBuf::from(path)));
    }

    if POSTPROCESSOR_TAGS.iter().any(|tag| line.starts_with(tag)) {
        return Some(OutputLine::Progress(ProgressEvent::Finished { filename: None }));
    }

    None
}

/// Pick the most useful message out of the tail of stderr: the last
/// `ERROR:` line, else the last non-empty line.
fn failure_message(stderr: &VecDeque<String>) -> Option<String> {
    stderr
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.iter().rev().find(|line| !line.trim().is_empty()))
        .cloned()
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// [`VideoExtractor`] backed by the `yt-dlp` command line tool
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> ExtractError {
        ExtractError::Spawn {
            program: self.binary.clone(),
            source,
        }
    }

    /// Run `--version` to check the binary is usable; returns the version
    pub async fn probe(&self) -> Result<String> {
        let output = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ExtractError::Failed {
                code: output.status.code(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn metadata_args(url: &str) -> Vec<String> {
        [
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
            "--no-progress",
            "--",
            url,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Arguments for a download that prints one JSON progress object per
    /// line and the final file path once post-processing is done.
    pub fn download_args(request: &DownloadRequest) -> Vec<String> {
        let template = request.output_dir.join("%(title)s.%(ext)s");

        vec![
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--no-playlist".to_string(),
            "--format".to_string(),
            request.format.clone(),
            "--merge-output-format".to_string(),
            request.merge_output_format.clone(),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--progress-template".to_string(),
            format!("download:{PROGRESS_PREFIX}%(progress)j"),
            "--print".to_string(),
            format!("after_move:{FILE_PREFIX}%(filepath)s"),
            "--".to_string(),
            request.url.clone(),
        ]
    }
}

fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::Sender<(Stream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send((stream, line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(?stream, error = %err, "Error reading extractor output");
                    break;
                }
            }
        }
    });
}

#[async_trait]
impl VideoExtractor for YtDlpExtractor {
    async fn extract_metadata(&self, url: &str) -> Result<VideoInfo> {
        debug!(url, "Extracting metadata");

        let output = self
            .command()
            .args(Self::metadata_args(url))
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr: VecDeque<String> = String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_owned)
                .collect();
            return Err(ExtractError::Failed {
                code: output.status.code(),
                message: failure_message(&stderr)
                    .unwrap_or_else(|| "Failed to retrieve video information".to_string()),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome> {
        info!(url = %request.url, format = %request.format, "Starting download");

        let mut child = self
            .command()
            .args(Self::download_args(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let (tx, mut rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, Stream::Stderr, tx);
        } else {
            drop(tx);
        }

        let mut outcome = DownloadOutcome::default();
        let mut stderr_tail = VecDeque::with_capacity(STDERR_TAIL);

        while let Some((stream, line)) = rx.recv().await {
            match parse_output_line(&line) {
                Some(OutputLine::Progress(event)) => sink.report(event),
                Some(OutputLine::File(path)) => outcome.filepath = Some(path),
                None => {
                    if let Stream::Stderr = stream {
                        debug!(line = %line, "extractor stderr");
                        if stderr_tail.len() == STDERR_TAIL {
                            stderr_tail.pop_front();
                        }
                        stderr_tail.push_back(line);
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(ExtractError::Failed {
                code: status.code(),
                message: failure_message(&stderr_tail)
                    .unwrap_or_else(|| format!("{} exited with {}", self.binary, status)),
            });
        }

        info!(url = %request.url, file = ?outcome.filepath, "Download finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::DownloadProgress;

    #[test]
    fn test_parse_progress_line() {
        let line = r#"tubefetch:progress:{"status":"downloading","downloaded_bytes":10,"total_bytes":100,"speed":null,"eta":null}"#;
        assert_eq!(
            parse_output_line(line),
            Some(OutputLine::Progress(ProgressEvent::Downloading(
                DownloadProgress {
                    downloaded_bytes: Some(10),
                    total_bytes: Some(100),
                    ..DownloadProgress::default()
                }
            )))
        );
    }

    #[test]
    fn test_parse_file_and_postprocessor_lines() {
        assert_eq!(
            parse_output_line("tubefetch:file:/srv/downloads/Clip.mp4\n"),
            Some(OutputLine::File(PathBuf::from("/srv/downloads/Clip.mp4")))
        );
        assert_eq!(parse_output_line("tubefetch:file:NA"), None);
        assert_eq!(
            parse_output_line("[Merger] Merging formats into \"Clip.mp4\""),
            Some(OutputLine::Progress(ProgressEvent::Finished { filename: None }))
        );
    }

    #[test]
    fn test_parse_noise() {
        assert_eq!(parse_output_line("[youtube] abc123: Downloading webpage"), None);
        assert_eq!(parse_output_line("tubefetch:progress:{not json"), None);
        assert_eq!(parse_output_line(""), None);
    }

    #[test]
    fn test_failure_message_prefers_error_lines() {
        let stderr: VecDeque<String> = [
            "WARNING: something",
            "ERROR: [youtube] abc123: Video unavailable",
            "",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(
            failure_message(&stderr).as_deref(),
            Some("ERROR: [youtube] abc123: Video unavailable")
        );

        let stderr: VecDeque<String> = ["first", "last"].into_iter().map(String::from).collect();
        assert_eq!(failure_message(&stderr).as_deref(), Some("last"));
        assert_eq!(failure_message(&VecDeque::new()), None);
    }

    #[test]
    fn test_download_args() {
        let request = DownloadRequest {
            url: "https://youtu.be/abc123".into(),
            format: "best".into(),
            output_dir: PathBuf::from("/srv/downloads"),
            merge_output_format: "mp4".into(),
        };
        let args = YtDlpExtractor::download_args(&request);

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("--format") + 1], "best");
        assert_eq!(args[pos("--merge-output-format") + 1], "mp4");
        assert_eq!(args[pos("--output") + 1], "/srv/downloads/%(title)s.%(ext)s");
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc123"));
        assert_eq!(args[args.len() - 2], "--");
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let extractor = YtDlpExtractor::new("/nonexistent/tubefetch-yt-dlp");
        let err = extractor.probe().await.unwrap_err();
        assert!(matches!(err, ExtractError::Spawn { .. }));
    }
}
