//! Document-level record filtering: skip lists, aliases, the metric check.

use super::Record;
use crate::error::{ExtractionError, ExtractionResult};
use crate::rules::{Action, ParserDefinition};

/// Apply skip lists and aliases, then check `available_metrics`.
///
/// A metric is skipped when either its raw or its aliased name is listed in
/// `metrics_to_skip`. The metric check runs on aliased names.
pub fn post_process(definition: &ParserDefinition, records: Vec<Record>) -> ExtractionResult<Vec<Record>> {
    let mut kept = Vec::with_capacity(records.len());

    for mut record in records {
        let canonical = definition.canonical_metric(&record.metric).to_string();
        if definition.metrics_to_skip.contains(&record.metric)
            || definition.metrics_to_skip.contains(&canonical)
        {
            continue;
        }
        if let Some(title) = &record.title {
            if definition.titles_to_skip.contains(title) {
                continue;
            }
        }

        record.metric = canonical;
        for (name, _) in &mut record.dimensions {
            let renamed = definition.canonical_dimension(name).to_string();
            *name = renamed;
        }

        if let Some(available) = &definition.available_metrics {
            if !available.contains(&record.metric) {
                match definition.on_metric_check_failed {
                    Action::Skip => continue,
                    Action::Pass => {}
                    action @ (Action::Fail | Action::Stop) => {
                        return Err(ExtractionError::MetricCheck {
                            metric: record.metric,
                            available: available.join(", "),
                            action,
                        })
                    }
                }
            }
        }

        kept.push(record);
    }

    Ok(kept)
}
