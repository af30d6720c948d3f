use crate::error::{PipelineError, PipelineResult};
use crate::feed::{has_usable_title, FeedSource};
use crate::publisher::Publisher;
use crate::summarizer::Summarizer;

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub titles: Vec<String>,
    pub report: String,
    pub published: bool,
}

/// Fetch → summarize → publish, stopping at the first fatal error.
///
/// With no publisher (a dry run) the report is returned unpublished.
pub async fn run<F, S, P>(
    feed: &F,
    summarizer: &S,
    publisher: Option<&P>,
    max_items: usize,
) -> PipelineResult<RunOutcome>
where
    F: FeedSource,
    S: Summarizer,
    P: Publisher,
{
    tracing::info!(max_items, "fetching feed");
    let titles = feed.fetch_titles(max_items).await?;
    if !has_usable_title(&titles) {
        return Err(PipelineError::EmptyContent);
    }
    tracing::info!(count = titles.len(), "collected titles");

    let report = summarizer.summarize(&titles).await?;

    let published = match publisher {
        Some(publisher) => {
            publisher.publish(&report).await?;
            true
        }
        None => {
            tracing::info!("dry run, skipping publish");
            false
        }
    };

    Ok(RunOutcome {
        titles,
        report,
        published,
    })
}
