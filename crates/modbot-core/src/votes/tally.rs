use std::fmt::Write as _;

use crate::votes::model::VoteOption;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionCount {
    pub option: VoteOption,
    pub votes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TallyResult {
    NoVotes,
    /// Index into [`Tally::counts`].
    Winner(usize),
    Tie(Vec<usize>),
    /// The leading option stayed below `win_threshold`; the default option stands.
    ThresholdNotReached,
    /// Reactors could not be fetched when the vote closed.
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    pub counts: Vec<OptionCount>,
    pub result: TallyResult,
}

impl Tally {
    pub fn compute(counts: Vec<OptionCount>, win_threshold: u32) -> Self {
        let max = counts.iter().map(|c| c.votes).max().unwrap_or(0);

        let result = if max == 0 {
            TallyResult::NoVotes
        } else if win_threshold > 0 && max < win_threshold as usize {
            TallyResult::ThresholdNotReached
        } else {
            let leaders: Vec<usize> = counts
                .iter()
                .enumerate()
                .filter(|(_, c)| c.votes == max)
                .map(|(i, _)| i)
                .collect();
            match leaders.as_slice() {
                [single] => TallyResult::Winner(*single),
                _ => TallyResult::Tie(leaders),
            }
        };

        Self { counts, result }
    }

    pub fn unavailable() -> Self {
        Self {
            counts: Vec::new(),
            result: TallyResult::Unavailable,
        }
    }

    pub fn total_votes(&self) -> usize {
        self.counts.iter().map(|c| c.votes).sum()
    }

    /// Plain-text result block appended to the vote message.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for c in &self.counts {
            let _ = writeln!(out, "{} {}: {}", c.option.emoji, c.option.label, c.votes);
        }
        let verdict = match &self.result {
            TallyResult::NoVotes => "No votes were cast.".to_string(),
            TallyResult::Winner(i) => format!("Winner: {}", self.counts[*i].option.label),
            TallyResult::Tie(idx) => format!(
                "Tie between: {}",
                idx.iter()
                    .map(|i| self.counts[*i].option.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            TallyResult::ThresholdNotReached => {
                "No option reached the required number of votes.".to_string()
            }
            TallyResult::Unavailable => "Results could not be counted.".to_string(),
        };
        out.push_str(&verdict);
        out
    }
}
