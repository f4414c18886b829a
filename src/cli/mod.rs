use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcriptor",
    about = "Transcript Composer - Fetch YouTube transcripts, refine them and turn them into articles",
    version,
    long_about = "Fetches captions for a YouTube video through fallback transcript providers, optionally corrects them with a generative-text service and composes long-form articles from them. The `api` subcommand exposes the same JSON surface an HTTP front end would serve."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a configuration file
    #[arg(long, global = true, value_name = "FILE", env = "TRANSCRIPTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript of a video
    Transcript {
        /// YouTube URL (watch, youtu.be, embed, shorts...)
        #[arg(value_name = "URL")]
        url: String,

        /// Preferred caption language (defaults to the configured language)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Return the captions without the correction pass
        #[arg(long)]
        skip_refinement: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include timestamps in text output (srt/vtt formats always include timestamps)
        #[arg(long)]
        timestamps: bool,
    },

    /// Compose an article from transcript text
    Blog(BlogArgs),

    /// Run the full pipeline and print the combined JSON result
    Process {
        #[arg(value_name = "URL")]
        url: String,

        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        #[arg(long)]
        skip_refinement: bool,

        /// Also compose an article
        #[arg(long)]
        generate_blog: bool,

        /// Return a placeholder transcript instead of failing when no captions exist
        #[arg(long)]
        fallback_message: bool,

        /// Try the alternative transcript provider first
        #[arg(long)]
        prefer_alternative: bool,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Send a raw request through the JSON API dispatcher
    Api {
        /// HTTP method, e.g. GET or POST
        method: String,

        /// Request path, e.g. /api/process
        path: String,

        /// JSON request body
        body: Option<String>,
    },

    /// Report service health
    Health,

    /// Show the effective configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List transcript providers in fallback order
    Providers,
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["input", "text"])))]
pub struct BlogArgs {
    /// Identifier of the video the transcript belongs to
    #[arg(long, value_name = "ID")]
    pub video_id: String,

    /// File holding transcript text, or the JSON output of `transcript -f json`
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Transcript text given inline
    #[arg(long, value_name = "TEXT")]
    pub text: Option<String>,

    /// Video title used when none can be extracted from the article
    #[arg(long)]
    pub title: Option<String>,

    /// Output file or directory (prints to console if not specified)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with timestamps
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_flags() {
        let cli = Cli::try_parse_from([
            "transcriptor",
            "process",
            "https://youtu.be/dQw4w9WgXcQ",
            "--generate-blog",
            "--fallback-message",
            "-l",
            "es",
        ])
        .unwrap();

        match cli.command {
            Commands::Process {
                url,
                language,
                generate_blog,
                fallback_message,
                prefer_alternative,
                ..
            } => {
                assert_eq!(url, "https://youtu.be/dQw4w9WgXcQ");
                assert_eq!(language.as_deref(), Some("es"));
                assert!(generate_blog && fallback_message);
                assert!(!prefer_alternative);
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_blog_requires_a_source() {
        let missing = Cli::try_parse_from(["transcriptor", "blog", "--video-id", "abc"]);
        assert!(missing.is_err());

        let both = Cli::try_parse_from([
            "transcriptor", "blog", "--video-id", "abc", "--text", "t", "--input", "f.txt",
        ]);
        assert!(both.is_err());

        let ok = Cli::try_parse_from(["transcriptor", "blog", "--video-id", "abc", "--text", "t"]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["transcriptor", "health", "--quiet", "--json-logs"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Health));
    }
}
