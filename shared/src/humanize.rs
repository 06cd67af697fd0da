use chrono::TimeDelta;
use chrono_humanize::{Accuracy, HumanTime, Tense};

/// Rough length of a span, e.g. `3 days`, `a week`. The sign is ignored.
pub fn natural_delta(delta: TimeDelta) -> String {
    HumanTime::from(delta).to_text_en(Accuracy::Rough, Tense::Present)
}

/// How long ago something happened, e.g. `3 days ago`.
pub fn natural_time(elapsed: TimeDelta) -> String {
    HumanTime::from(elapsed).to_text_en(Accuracy::Rough, Tense::Past)
}
