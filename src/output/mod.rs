use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::api::TranscriptResponse;
use crate::cli::OutputFormat;
use crate::compose::Article;
use crate::providers::Transcript;
use crate::utils::{format_clock, format_subtitle_timestamp, sanitize_filename};

/// Render a transcript response in the requested format.
///
/// JSON carries the whole response; the other formats render the refined
/// transcript when there is one, the raw captions otherwise.
pub fn format_transcript_response(
    response: &TranscriptResponse,
    format: &OutputFormat,
    include_timestamps: bool,
) -> Result<String> {
    if let OutputFormat::Json = format {
        return serde_json::to_string_pretty(response).context("Failed to serialize transcript");
    }

    let transcript = response
        .refined
        .as_ref()
        .map(|r| r.to_transcript())
        .unwrap_or_else(|| response.raw.clone());

    format_transcript(&transcript, format, include_timestamps)
}

pub fn format_transcript(
    transcript: &Transcript,
    format: &OutputFormat,
    include_timestamps: bool,
) -> Result<String> {
    // Placeholder timing means nothing, so only its message is rendered.
    if transcript.is_unavailable_message && !matches!(format, OutputFormat::Json) {
        return Ok(transcript.full_text());
    }

    let content = match format {
        OutputFormat::Text => format_as_text(transcript, include_timestamps),
        OutputFormat::Json => {
            serde_json::to_string_pretty(transcript).context("Failed to serialize transcript")?
        }
        OutputFormat::Srt => format_as_srt(transcript),
        OutputFormat::Vtt => format_as_vtt(transcript),
    };

    Ok(content)
}

/// One line per segment, optionally prefixed with `[mm:ss]`
pub fn format_as_text(transcript: &Transcript, include_timestamps: bool) -> String {
    transcript
        .segments
        .iter()
        .map(|segment| {
            if include_timestamps {
                format!("[{}] {}", format_clock(segment.start), segment.text.trim())
            } else {
                segment.text.trim().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_as_srt(transcript: &Transcript) -> String {
    let mut out = String::new();

    for (i, segment) in transcript.segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_subtitle_timestamp(segment.start, ','),
            format_subtitle_timestamp(segment.start + segment.duration, ','),
            segment.text.trim()
        ));
    }

    out
}

pub fn format_as_vtt(transcript: &Transcript) -> String {
    let mut out = String::from("WEBVTT\n\n");

    for segment in &transcript.segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_subtitle_timestamp(segment.start, '.'),
            format_subtitle_timestamp(segment.start + segment.duration, '.'),
            segment.text.trim()
        ));
    }

    out
}

/// Article as Markdown with a small front matter block
pub fn format_article_markdown(article: &Article) -> String {
    format!(
        "---\ntitle: \"{}\"\nvideo: https://www.youtube.com/watch?v={}\ngenerated: {}\nwords: {}\nreading_time: {} min\n---\n\n{}\n",
        article.title.replace('"', "\\\""),
        article.video_id,
        article.generated_at.to_rfc3339(),
        article.word_count,
        article.reading_time,
        article.content.trim_end()
    )
}

/// Total span covered by a transcript's segments, in seconds
pub fn transcript_duration(transcript: &Transcript) -> f64 {
    transcript
        .segments
        .iter()
        .map(|s| s.start + s.duration)
        .fold(0.0, f64::max)
}

/// Resolve where an article goes: a directory gets a file named after the title
pub fn article_path(target: &Path, article: &Article) -> PathBuf {
    if target.is_dir() {
        let stem = sanitize_filename(&article.title);
        let stem = if stem.is_empty() {
            article.video_id.clone()
        } else {
            stem
        };
        target.join(format!("{}.md", stem))
    } else {
        target.to_path_buf()
    }
}

/// Save rendered content to file
pub async fn save_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content)?;
    Ok(())
}

/// Print rendered content to console
pub fn print_to_console(content: &str) {
    println!("{}", content.trim_end());
}
