use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcript_composer::api::{self, BlogRequest, BlogTranscript, ProcessRequest, TranscriptRequest};
use transcript_composer::api::{ProcessResponse, TranscriptResponse};
use transcript_composer::cli::{BlogArgs, Cli, Commands};
use transcript_composer::config::Config;
use transcript_composer::output;
use transcript_composer::transcribe::TranscriptionPipeline;
use transcript_composer::utils::format_duration;
use transcript_composer::TranscriptorError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Transcript {
            url,
            language,
            skip_refinement,
            format,
            output,
            timestamps,
        } => {
            let pipeline = TranscriptionPipeline::from_config(config);
            tracing::info!("Starting transcript for URL: {}", url);

            let progress = spinner(cli.quiet, "Fetching transcript...")?;
            let result = pipeline
                .transcript(TranscriptRequest {
                    url,
                    language,
                    skip_refinement,
                })
                .await;
            progress.finish_and_clear();
            let response = result?;

            if !cli.quiet {
                eprintln!(
                    "{} {} segments, {}",
                    style("Transcript:").green().bold(),
                    response.raw.len(),
                    duration_label(&response)
                );
            }

            let content = output::format_transcript_response(&response, &format, timestamps)?;
            match output {
                Some(path) => {
                    output::save_to_file(&content, &path).await?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => output::print_to_console(&content),
            }
        }
        Commands::Blog(args) => {
            let pipeline = TranscriptionPipeline::from_config(config);
            let transcript = read_blog_transcript(&args)?;

            let progress = spinner(cli.quiet, "Composing article...")?;
            let result = pipeline
                .blog(BlogRequest {
                    transcript,
                    video_id: args.video_id.clone(),
                    title: args.title.clone(),
                })
                .await;
            progress.finish_and_clear();
            let article = result?;

            let content = output::format_article_markdown(&article);
            match args.output {
                Some(target) => {
                    let path = output::article_path(&target, &article);
                    output::save_to_file(&content, &path).await?;
                    println!("Article saved to: {}", path.display());
                }
                None => output::print_to_console(&content),
            }
        }
        Commands::Process {
            url,
            language,
            skip_refinement,
            generate_blog,
            fallback_message,
            prefer_alternative,
            output,
        } => {
            let pipeline = TranscriptionPipeline::from_config(config);
            let request = ProcessRequest {
                url,
                language,
                skip_refinement,
                generate_blog,
                fallback_message,
                prefer_alternative_service: prefer_alternative.then_some(true),
            };

            let progress = spinner(cli.quiet, "Processing video...")?;
            let result = pipeline.process(request).await;
            progress.finish_and_clear();

            let response = match result {
                Ok(response) => response,
                Err(TranscriptorError::Composition {
                    message,
                    partial: Some(partial),
                }) => {
                    // Keep the transcript that was already fetched.
                    output::print_to_console(&serde_json::to_string_pretty(&partial)?);
                    anyhow::bail!("{}", message);
                }
                Err(e) => return Err(e.into()),
            };

            let content = serde_json::to_string_pretty(&response)?;
            match output {
                Some(path) => {
                    output::save_to_file(&content, &path).await?;
                    println!("Result saved to: {}", path.display());
                }
                None => output::print_to_console(&content),
            }
        }
        Commands::Api { method, path, body } => {
            let pipeline = TranscriptionPipeline::from_config(config);
            let response =
                api::handle(&pipeline, &method, &path, body.as_deref().unwrap_or("")).await;

            println!("{}", response.status);
            output::print_to_console(&serde_json::to_string_pretty(&response.body)?);

            if !response.is_success() {
                anyhow::bail!("Request failed with status {}", response.status);
            }
        }
        Commands::Health => {
            let pipeline = TranscriptionPipeline::from_config(config);
            let response = api::handle(&pipeline, "GET", "/api/health", "").await;
            output::print_to_console(&serde_json::to_string(&response.body)?);
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", config_location(cli.config.as_deref())?);
                println!("Run with --show to print the effective settings.");
            }
        }
        Commands::Providers => {
            let pipeline = TranscriptionPipeline::from_config(config);
            let prefer_alternative = pipeline.config().providers.prefer_alternative;

            println!("Transcript providers (fallback order):");
            for (i, name) in pipeline
                .acquisition()
                .provider_order(prefer_alternative)
                .into_iter()
                .enumerate()
            {
                println!("  {}. {}", i + 1, style(name).cyan());
            }
            println!("  Placeholder transcripts are available with --fallback-message");
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose {
        "transcript_composer=debug"
    } else if cli.quiet {
        "transcript_composer=warn"
    } else {
        "transcript_composer=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so JSON results on stdout stay parseable.
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn spinner(quiet: bool, message: &'static str) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}

fn config_location(explicit: Option<&Path>) -> Result<String> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    Ok(path.display().to_string())
}

/// Transcript text for `blog`: inline text, a plain file, or saved JSON results
fn read_blog_transcript(args: &BlogArgs) -> Result<BlogTranscript> {
    if let Some(text) = &args.text {
        return Ok(BlogTranscript::Text(text.clone()));
    }

    let path = args
        .input
        .as_ref()
        .context("Either --input or --text is required")?;
    let content = fs_err::read_to_string(path)?;

    if let Ok(response) = serde_json::from_str::<TranscriptResponse>(&content) {
        let transcript = response
            .refined
            .map(|r| r.to_transcript())
            .unwrap_or(response.raw);
        return Ok(BlogTranscript::Document(transcript));
    }

    if let Ok(response) = serde_json::from_str::<ProcessResponse>(&content) {
        return Ok(BlogTranscript::Document(response.refined.to_transcript()));
    }

    Ok(BlogTranscript::Text(content))
}

fn duration_label(response: &TranscriptResponse) -> String {
    if response.raw.is_unavailable_message {
        "no captions".to_string()
    } else {
        format_duration(output::transcript_duration(&response.raw))
    }
}
