use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::json;
use std::path::PathBuf;

use arxiv_assist::convert::{MarkdownConverter, Pandoc};
use arxiv_assist::llm::{Dispatcher, Message, ModelCatalog, Params, Vendor};
use arxiv_assist::search::{search_papers, DEFAULT_MAX_RESULTS};
use arxiv_assist::{arxiv_to_markdown, FlattenOptions, Settings};

/// Research assistant: arXiv sources to Markdown, arXiv search, LLM chat
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a paper's TeX source, flatten it and convert it to Markdown
    Markdown {
        /// arXiv URL (e.g., https://arxiv.org/abs/2407.16741) or paper ID
        paper: String,
        /// Directory for the .tex and .md outputs
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Keep the preamble around the flattened body
        #[arg(long)]
        keep_preamble: bool,
        /// Fail on circular inclusions instead of dropping them
        #[arg(long)]
        strict: bool,
        /// Only write the flattened .tex file
        #[arg(long)]
        tex_only: bool,
        /// Converter executable
        #[arg(long, default_value = "pandoc")]
        pandoc: PathBuf,
    },
    /// Search arXiv papers through Google Custom Search
    Search {
        query: String,
        /// Maximum number of Google results to inspect
        #[arg(short, long, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask one or more models the same question
    Chat {
        /// Model names; several models are queried concurrently
        #[arg(short, long = "model", required = true)]
        models: Vec<String>,
        /// User prompt
        #[arg(short, long)]
        prompt: String,
        /// System instruction
        #[arg(short, long)]
        system: Option<String>,
        /// Vendor serving the models, skips model discovery
        #[arg(long)]
        vendor: Option<Vendor>,
        #[arg(long)]
        max_tokens: Option<u64>,
        #[arg(long)]
        temperature: Option<f64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let settings = Settings::from_env().context("Failed to read settings from the environment")?;

    match args.command {
        Command::Markdown {
            paper,
            output_dir,
            keep_preamble,
            strict,
            tex_only,
            pandoc,
        } => {
            let options = FlattenOptions {
                keep_preamble,
                strict_cycles: strict,
            };
            let pandoc = Pandoc::new(pandoc);
            let converter: Option<&dyn MarkdownConverter> = if tex_only { None } else { Some(&pandoc) };
            let output = arxiv_to_markdown(&settings, &paper, &output_dir, converter, &options)
                .with_context(|| format!("Failed to convert {}", paper))?;

            if !output.diagnostics.is_empty() {
                warn!("{} warning(s) while flattening {}", output.diagnostics.len(), output.paper_id);
            }
            info!("TeX written to {:?}", output.tex_path);
            if let Some(markdown_path) = &output.markdown_path {
                info!("Markdown written to {:?}", markdown_path);
            }
        }
        Command::Search { query, max_results, json } => {
            let papers = search_papers(&settings, &query, max_results)
                .with_context(|| format!("Search failed for {:?}", query))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&papers)?);
            } else {
                for paper in &papers {
                    println!("{} {}", paper.metadata.arxiv_id, paper.metadata.title);
                    println!("  {}", paper.metadata.abstract_url);
                    for snippet in &paper.snippets {
                        println!("  > {}", snippet.replace('\n', " "));
                    }
                    println!();
                }
            }
        }
        Command::Chat {
            models,
            prompt,
            system,
            vendor,
            max_tokens,
            temperature,
        } => {
            let mut params = Params::new();
            if let Some(max_tokens) = max_tokens {
                params.insert("max_tokens".to_string(), json!(max_tokens));
            }
            if let Some(temperature) = temperature {
                params.insert("temperature".to_string(), json!(temperature));
            }
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(Message::system(system));
            }
            messages.push(Message::user(prompt));

            let runtime = tokio::runtime::Runtime::new()?;
            let responses = runtime.block_on(async {
                let dispatcher = match vendor {
                    Some(vendor) => Dispatcher::from_settings(
                        &settings,
                        ModelCatalog::new().with_models(vendor, models.iter().cloned()),
                    )?,
                    None => Dispatcher::discover(&settings).await?,
                };
                dispatcher.gather(&models, &params, &messages).await
            })?;

            for (model, response) in models.iter().zip(responses) {
                if models.len() > 1 {
                    println!("--- {} ---", model);
                }
                println!("{}", response);
            }
        }
    }

    Ok(())
}
