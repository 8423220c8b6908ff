//! Narrows a candidate batch to the items whose scheduled moment has
//! arrived. Pure filtering; all tracker mutations happen downstream.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::model::WorkItem;

/// Keep the items whose scheduled date+time is at or before `now`.
///
/// Items missing either schedule field are not yet processable and are
/// dropped silently. A malformed field drops only the offending item;
/// the rest of the batch is unaffected. Input order is preserved.
pub fn filter_due(
    items: Vec<WorkItem>,
    date_field: &str,
    time_field: &str,
    now: NaiveDateTime,
) -> Vec<WorkItem> {
    items
        .into_iter()
        .filter(|item| is_due(item, date_field, time_field, now))
        .collect()
}

fn is_due(item: &WorkItem, date_field: &str, time_field: &str, now: NaiveDateTime) -> bool {
    let (date, time) = match (item.field_value(date_field), item.field_value(time_field)) {
        (Some(date), Some(time)) => (date, time),
        _ => {
            debug!(gid = %item.gid, "schedule fields incomplete; not due yet");
            return false;
        }
    };

    match parse_schedule(date, time) {
        Ok(scheduled_at) => scheduled_at <= now,
        Err(err) => {
            warn!(gid = %item.gid, date, time, %err, "unparseable schedule; skipping item");
            false
        }
    }
}

fn parse_schedule(date: &str, time: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))?;
    Ok(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomField, DateValue};

    const DATE_FIELD: &str = "f-date";
    const TIME_FIELD: &str = "f-time";

    fn item(gid: &str, date: Option<&str>, time: Option<&str>) -> WorkItem {
        let mut custom_fields = Vec::new();
        if let Some(date) = date {
            custom_fields.push(CustomField {
                gid: DATE_FIELD.into(),
                date_value: Some(DateValue {
                    date: Some(date.to_string()),
                }),
                ..Default::default()
            });
        }
        if let Some(time) = time {
            custom_fields.push(CustomField {
                gid: TIME_FIELD.into(),
                text_value: Some(time.to_string()),
                ..Default::default()
            });
        }
        WorkItem {
            gid: gid.into(),
            name: String::new(),
            notes: String::new(),
            completed: false,
            custom_fields,
        }
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_time(NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap())
    }

    fn gids(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(|i| i.gid.as_str()).collect()
    }

    #[test]
    fn past_item_is_due() {
        let due = filter_due(
            vec![item("a", Some("2024-01-01"), Some("09:00"))],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-01-01", "10:00:00"),
        );
        assert_eq!(gids(&due), ["a"]);
    }

    #[test]
    fn equal_time_is_due() {
        let due = filter_due(
            vec![item("a", Some("2024-01-01"), Some("09:00"))],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-01-01", "09:00:00"),
        );
        assert_eq!(gids(&due), ["a"]);
    }

    #[test]
    fn future_item_is_not_due() {
        let due = filter_due(
            vec![item("a", Some("2024-01-01"), Some("09:00"))],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-01-01", "08:59:59"),
        );
        assert!(due.is_empty());
    }

    #[test]
    fn seconds_precision_time_accepted() {
        let due = filter_due(
            vec![item("a", Some("2024-01-01"), Some("09:00:30"))],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-01-01", "09:00:30"),
        );
        assert_eq!(gids(&due), ["a"]);
    }

    #[test]
    fn missing_date_never_due() {
        let due = filter_due(
            vec![item("a", None, Some("09:00"))],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-06-01", "12:00:00"),
        );
        assert!(due.is_empty());
    }

    #[test]
    fn missing_time_never_due() {
        let due = filter_due(
            vec![item("a", Some("2024-01-01"), None)],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-06-01", "12:00:00"),
        );
        assert!(due.is_empty());
    }

    #[test]
    fn malformed_schedule_skips_only_that_item() {
        let due = filter_due(
            vec![
                item("a", Some("2024-01-01"), Some("09:00")),
                item("b", Some("not-a-date"), Some("09:00")),
                item("c", Some("2024-01-01"), Some("25:99")),
                item("d", Some("2024-01-02"), Some("08:00")),
            ],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-01-03", "00:00:00"),
        );
        assert_eq!(gids(&due), ["a", "d"]);
    }

    #[test]
    fn input_order_preserved() {
        let due = filter_due(
            vec![
                item("late", Some("2024-01-02"), Some("09:00")),
                item("early", Some("2024-01-01"), Some("09:00")),
            ],
            DATE_FIELD,
            TIME_FIELD,
            at("2024-01-03", "00:00:00"),
        );
        assert_eq!(gids(&due), ["late", "early"]);
    }
}
