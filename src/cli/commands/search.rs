use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_search(
    config: Config,
    query: &str,
    max_results: Option<u32>,
) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    println!("Searching YouTube for: {query}");
    let outcome = state.orchestrator.search(query, max_results).await?;

    if outcome.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    if outcome.offline {
        println!("YouTube unreachable, showing stored results.");
    }

    println!();
    println!("{:<4} {:<50} {:<25} {:>12}", "#", "Title", "Channel", "Views");
    println!("{:-<94}", "");

    for (i, video) in outcome.results.iter().enumerate() {
        println!(
            "{:<4} {:<50} {:<25} {:>12}",
            i + 1,
            truncate(&video.title, 48),
            truncate(&video.channel, 23),
            video.view_count
        );
    }

    for (i, video) in outcome.results.iter().enumerate() {
        println!();
        println!("{}. {}", i + 1, video.title);
        println!("   {}", video.url);
        println!("   {}", video.summary);
        if !video.topics.is_empty() {
            println!("   Topics: {}", video.topics.join(", "));
        }
    }

    if !outcome.missing_ids.is_empty() {
        println!();
        println!(
            "⚠ {} video(s) could not be fetched: {}",
            outcome.missing_ids.len(),
            outcome
                .missing_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    if let Some(id) = outcome.search_id {
        println!();
        println!("Saved as search {id}. Export with: topicscout export {id}");
    }

    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars - 3).collect::<String>())
    } else {
        s.to_string()
    }
}
