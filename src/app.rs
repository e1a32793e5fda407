use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::RecvTimeoutError;

use crate::bluesky;
use crate::config;
use crate::data::{BlueskyThreadService, ThreadService};
use crate::render;
use crate::widget::{CommentSection, CommentSectionOptions, PostSource, State};

#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub identifier: Option<String>,
    pub author: Option<String>,
    pub page_url: Option<String>,
    pub show_more: usize,
}

pub fn run(args: &[String]) -> Result<()> {
    let cli = parse_args(args)?;
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;

    let source = post_source(&cli, &cfg)?;
    let filters = cfg.widget.filters.build();

    let client = bluesky::Client::new(bluesky::ClientConfig {
        user_agent: cfg.bluesky.user_agent.clone(),
        base_url: Some(cfg.bluesky.service_url.clone()),
        timeout: Some(cfg.bluesky.http_timeout),
        http_client: None,
    })
    .context("build bluesky client")?;
    let service: Arc<dyn ThreadService> = Arc::new(BlueskyThreadService::new(Arc::new(client)));

    let section = CommentSection::new(CommentSectionOptions {
        source,
        filters,
        on_empty: Some(Arc::new(|notice| {
            eprintln!("bsky-comments: {} ({})", notice.message, notice.code);
        })),
    });

    let rx = section.load_in_background(service);
    let mut section = match rx.recv_timeout(Duration::from_millis(200)) {
        Ok(section) => section,
        Err(RecvTimeoutError::Timeout) => {
            println!("Loading comments...");
            rx.recv().context("comment loader disconnected")?
        }
        Err(RecvTimeoutError::Disconnected) => bail!("comment loader disconnected"),
    };

    for _ in 0..cli.show_more {
        section.show_more();
    }

    let stdout = io::stdout();
    render::render(&section, &mut stdout.lock()).context("write output")?;

    if section.state() == State::Errored {
        bail!("comments unavailable");
    }
    Ok(())
}

fn post_source(cli: &CliOptions, cfg: &config::Config) -> Result<PostSource> {
    let identifier = cli
        .identifier
        .clone()
        .or_else(|| non_empty(&cfg.widget.uri));
    if let Some(identifier) = identifier {
        return Ok(PostSource::Identifier(identifier));
    }

    let author = cli.author.clone().or_else(|| non_empty(&cfg.widget.author));
    let page_url = cli
        .page_url
        .clone()
        .or_else(|| non_empty(&cfg.widget.page_url));
    match (author, page_url) {
        (Some(author), Some(page_url)) => Ok(PostSource::Discover { author, page_url }),
        _ => bail!("a post URL/at:// identifier, or --author together with --page, is required"),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_args(args: &[String]) -> Result<CliOptions> {
    let mut opts = CliOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--author" => opts.author = Some(flag_value(&mut iter, "--author")?),
            "--page" => opts.page_url = Some(flag_value(&mut iter, "--page")?),
            "--show-more" => {
                let value = flag_value(&mut iter, "--show-more")?;
                opts.show_more = value
                    .parse()
                    .with_context(|| format!("--show-more expects a count, got {value:?}"))?;
            }
            _ if arg.starts_with('-') => bail!("unknown flag {arg}"),
            _ => opts.identifier = Some(arg.clone()),
        }
    }
    Ok(opts)
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<String> {
    match iter.next() {
        Some(value) => Ok(value.clone()),
        None => bail!("{flag} expects a value"),
    }
}
