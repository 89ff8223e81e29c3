//! Accessors for loosely-typed FHIR JSON.
//!
//! Nothing here fails: absent or oddly-shaped elements read as `None`.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// Trimmed, non-empty string at `key`.
pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).and_then(clean)
}

pub(crate) fn clean(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// `coding[]` of a CodeableConcept.
pub(crate) fn codings(concept: &Value) -> &[Value] {
    array(concept, "coding")
}

/// Human-readable label of a CodeableConcept: `text`, then the first coding
/// display.
pub(crate) fn concept_label(concept: &Value) -> Option<String> {
    if let Some(text) = str_field(concept, "text") {
        return Some(text);
    }
    codings(concept)
        .iter()
        .find_map(|coding| str_field(coding, "display"))
}

/// Label of a CodeableConcept falling back to its first code, the way status
/// and category elements are usually read.
pub(crate) fn concept_text(concept: &Value) -> Option<String> {
    concept_label(concept).or_else(|| {
        codings(concept)
            .iter()
            .find_map(|coding| str_field(coding, "code"))
    })
}

/// First code inside a CodeableConcept.
pub(crate) fn first_code(concept: &Value) -> Option<String> {
    codings(concept)
        .iter()
        .find_map(|coding| str_field(coding, "code"))
}

/// Reads a status element that may be a plain code or a CodeableConcept.
pub(crate) fn status_code(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if let Some(text) = value.as_str() {
        return clean(text);
    }
    first_code(value).or_else(|| concept_label(value))
}

/// `display` of a Reference, falling back to its `reference` string.
pub(crate) fn reference_display(value: &Value) -> Option<String> {
    str_field(value, "display").or_else(|| str_field(value, "reference"))
}

pub(crate) fn number(value: &Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    field
        .as_f64()
        .or_else(|| field.as_str().and_then(|text| text.trim().parse().ok()))
}

pub(crate) fn unsigned(value: &Value, key: &str) -> Option<u32> {
    number(value, key)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as u32)
}

/// Parses FHIR `dateTime`, `instant` and partial `date` values.
///
/// Partial dates (`YYYY`, `YYYY-MM`, `YYYY-MM-DD`) resolve to midnight UTC
/// of their first day.
pub(crate) fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    parse_date(value).and_then(|date| date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()))
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.split('T').next().unwrap_or(value);
    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(date);
    }
    let mut parts = date_part.split('-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(month) => month.parse::<u32>().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// First parseable timestamp among `fields`. Period elements contribute their
/// `start`, then their `end`.
pub(crate) fn extract_datetime(resource: &Value, fields: &[&str]) -> Option<DateTime<Utc>> {
    for field in fields {
        let Some(value) = resource.get(*field) else {
            continue;
        };

        if let Some(text) = value.as_str() {
            if let Some(dt) = parse_datetime(text) {
                return Some(dt);
            }
        }

        if let Some(obj) = value.as_object() {
            if let Some(start) = obj.get("start").and_then(Value::as_str) {
                if let Some(dt) = parse_datetime(start) {
                    return Some(dt);
                }
            }
            if let Some(end) = obj.get("end").and_then(Value::as_str) {
                if let Some(dt) = parse_datetime(end) {
                    return Some(dt);
                }
            }
        }
    }
    None
}

/// `(start, end)` of a Period element.
pub(crate) fn period(value: Option<&Value>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let Some(value) = value else {
        return (None, None);
    };
    let read = |key: &str| value.get(key).and_then(Value::as_str).and_then(parse_datetime);
    (read("start"), read("end"))
}

/// Amount of a Money element; tolerates a bare number.
pub(crate) fn money(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value.as_f64().or_else(|| number(value, "value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parses_partial_dates() {
        assert_eq!(
            parse_datetime("2024-12-15"),
            Some(Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_datetime("2024-03"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_datetime("2023"),
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_datetime("2024-12-15T10:30:00-05:00"),
            Some(Utc.with_ymd_and_hms(2024, 12, 15, 15, 30, 0).unwrap())
        );
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn concept_label_prefers_text() {
        let concept = json!({
            "text": "  Hemoglobin A1c ",
            "coding": [{ "code": "4548-4", "display": "HbA1c" }]
        });
        assert_eq!(concept_label(&concept).as_deref(), Some("Hemoglobin A1c"));

        let concept = json!({ "coding": [{ "code": "4548-4" }, { "display": "HbA1c" }] });
        assert_eq!(concept_label(&concept).as_deref(), Some("HbA1c"));
        assert_eq!(first_code(&concept).as_deref(), Some("4548-4"));
    }

    #[test]
    fn period_start_wins_over_end() {
        let resource = json!({ "period": { "start": "2024-01-01", "end": "2024-01-03" } });
        assert_eq!(
            extract_datetime(&resource, &["period"]),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn status_code_reads_both_shapes() {
        assert_eq!(status_code(Some(&json!("final"))).as_deref(), Some("final"));
        let concept = json!({ "coding": [{ "code": "active" }] });
        assert_eq!(status_code(Some(&concept)).as_deref(), Some("active"));
        assert_eq!(status_code(None), None);
    }
}
