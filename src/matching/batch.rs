use std::num::NonZeroUsize;
use std::thread;

use tracing::debug;

use crate::model::Question;

use super::ranking::{RankOptions, SuggestionReport};
use super::scoring::{Matcher, PreparedCorpus};

pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Ranks every question against the same prepared manuals. Work is split into
/// contiguous chunks so the output keeps the input order.
pub fn suggest_batch(
    matcher: &Matcher,
    questions: &[Question],
    manuals: &[PreparedCorpus],
    options: RankOptions,
    workers: usize,
) -> Vec<SuggestionReport> {
    let workers = workers.clamp(1, questions.len().max(1));
    if workers == 1 {
        return suggest_chunk(matcher, questions, manuals, options);
    }

    let chunk_size = questions.len().div_ceil(workers);
    debug!(
        questions = questions.len(),
        workers,
        chunk_size,
        "scoring question batch"
    );

    thread::scope(|scope| {
        let handles = questions
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || suggest_chunk(matcher, chunk, manuals, options)))
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(reports) => reports,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

fn suggest_chunk(
    matcher: &Matcher,
    questions: &[Question],
    manuals: &[PreparedCorpus],
    options: RankOptions,
) -> Vec<SuggestionReport> {
    questions
        .iter()
        .map(|question| {
            let prepared = matcher.prepare_question(question);
            matcher.suggest(&prepared, manuals, options)
        })
        .collect()
}
