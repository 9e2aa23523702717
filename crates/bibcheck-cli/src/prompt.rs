//! Terminal chooser for entries with several plausible DBLP records.

use bibcheck_core::{BibEntry, Candidate, Choice, Chooser};

const NONE_OF_THESE: &str = "None of these (flag for manual review)";

/// Asks on the terminal which candidate is the right record.
pub struct TerminalChooser;

impl Chooser for TerminalChooser {
    fn choose(&mut self, entry: &BibEntry, candidates: &[Candidate]) -> Choice {
        // The prompt blocks on stdin; keep it off the async worker's budget.
        tokio::task::block_in_place(|| ask(entry, candidates))
    }
}

fn ask(entry: &BibEntry, candidates: &[Candidate]) -> Choice {
    let prompt = format!(
        "{}: {} records match \"{}\"",
        entry.key(),
        candidates.len(),
        entry.title().unwrap_or("(untitled)")
    );
    let items = menu_items(candidates);

    match dialoguer::Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact_opt()
    {
        Ok(Some(i)) => choice_for(i, candidates.len()),
        Ok(None) => Choice::NoneOfThese,
        Err(e) => {
            tracing::warn!(key = %entry.key(), "prompt failed: {}", e);
            Choice::NoneOfThese
        }
    }
}

/// One line per candidate, best first, then the escape hatch.
fn menu_items(candidates: &[Candidate]) -> Vec<String> {
    let mut items: Vec<String> = candidates
        .iter()
        .map(|c| format!("{} (score {:.2})", c.summary(), c.score.combined))
        .collect();
    items.push(NONE_OF_THESE.to_string());
    items
}

fn choice_for(selected: usize, candidates: usize) -> Choice {
    if selected < candidates {
        Choice::Pick(selected)
    } else {
        Choice::NoneOfThese
    }
}
