use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::connector::Parameters;
use crate::constants::{defaults, request};
use crate::helpers::{parse_date, parse_ts};
use crate::registry::{Mode, Template};

/// Splits a `"<start>/<end>"` period into its bounds.
///
/// Bounds may contain `/` themselves (`2021/03/01 00:00:00`), so the split is
/// taken at the first `/` where both halves are dates. Otherwise the first `/`
/// separates two leniently parsed bounds, such as epoch numbers.
fn parse_period(period: &str) -> Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let splits: Vec<_> = period
        .match_indices('/')
        .map(|(i, _)| (&period[..i], &period[i + 1..]))
        .collect();
    let dates = splits.iter().find_map(|(start, end)| {
        let (start, end) = (parse_date(start)?, parse_date(end)?);
        Some((Some(start), Some(end)))
    });
    dates.or_else(|| {
        splits.first().map(|(start, end)| {
            (
                parse_ts(&Value::String((*start).to_owned())),
                parse_ts(&Value::String((*end).to_owned())),
            )
        })
    })
}

/// Classifies the request as latest, history or prediction and normalizes the
/// range bounds. The parameters are stored on the returned template.
pub fn interpret(mut template: Template, mut parameters: Parameters) -> Template {
    let reference = template.timestamp.unwrap_or_else(Utc::now);
    template.mode = Mode::Latest;

    if parameters.start.is_none() {
        let period = parameters.extra.get(request::PERIOD).and_then(Value::as_str);
        if let Some((start, end)) = period.and_then(parse_period) {
            parameters.start = start;
            if end.is_some() {
                parameters.end = end;
            }
        }
    }

    match (parameters.start, parameters.end) {
        (Some(start), Some(end)) => {
            if end < start {
                parameters.start = Some(end);
                parameters.end = Some(start);
            }
            template.mode = Mode::History;
        }
        _ => {
            parameters.start = Some(reference - TimeDelta::hours(defaults::TIME_RANGE_HOURS));
            parameters.default_start = true;
        }
    }

    if parameters.end.is_some_and(|end| end > reference) {
        template.mode = Mode::Prediction;
    }

    if template.mode == Mode::Latest {
        if let Some(query) = template.general_config.query.as_mut() {
            if let Some(limit) = query.limit.clone() {
                query.properties.push(limit);
            }
        }
    }

    log::debug!("{}: {} request", template.label(), template.mode);
    template.parameters = parameters;
    template
}
