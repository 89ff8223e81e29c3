//! Patient → `Patient`.

use recon_core::{Address, Gender, Patient};
use serde_json::Value;

use crate::fhir::{array, clean, parse_date, str_field};

use super::resource_id;

pub(super) fn build(resource: &Value, source: &str) -> Patient {
    let name = preferred_name(resource).map(read_name).unwrap_or_default();

    Patient {
        id: resource_id(resource),
        source: source.to_string(),
        first_name: name.first,
        last_name: name.last,
        full_name: name.full,
        birth_date: resource
            .get("birthDate")
            .and_then(Value::as_str)
            .and_then(parse_date),
        gender: resource
            .get("gender")
            .and_then(Value::as_str)
            .map(Gender::from_fhir)
            .unwrap_or_default(),
        email: telecom(resource, "email"),
        phone: telecom(resource, "phone"),
        address: preferred_address(resource).map(read_address),
        raw: resource.clone(),
    }
}

#[derive(Default)]
struct PersonName {
    first: Option<String>,
    last: Option<String>,
    full: Option<String>,
}

fn preferred_name(resource: &Value) -> Option<&Value> {
    let names = array(resource, "name");
    ["official", "usual"]
        .iter()
        .find_map(|wanted| {
            names
                .iter()
                .find(|name| name.get("use").and_then(Value::as_str) == Some(*wanted))
        })
        .or_else(|| names.first())
}

fn read_name(name: &Value) -> PersonName {
    let given: Vec<String> = array(name, "given")
        .iter()
        .filter_map(Value::as_str)
        .filter_map(clean)
        .collect();
    // STU2 carries `family` as an array.
    let family = match name.get("family") {
        Some(Value::Array(parts)) => {
            let joined = parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            clean(&joined)
        }
        Some(Value::String(family)) => clean(family),
        _ => None,
    };
    let text = str_field(name, "text");

    if given.is_empty() && family.is_none() {
        return text.map(|text| split_text(&text)).unwrap_or_default();
    }

    let full = text.or_else(|| {
        let parts: Vec<&str> = given
            .iter()
            .map(String::as_str)
            .chain(family.as_deref())
            .collect();
        clean(&parts.join(" "))
    });

    PersonName {
        first: given.into_iter().next(),
        last: family,
        full,
    }
}

/// Splits a free-text name written either as `LAST, FIRST` or `FIRST LAST`.
fn split_text(text: &str) -> PersonName {
    let (first, last) = match text.split_once(',') {
        Some((last, first)) => (clean(first), clean(last)),
        None => match text.split_once(char::is_whitespace) {
            Some((first, last)) => (clean(first), clean(last)),
            None => (clean(text), None),
        },
    };
    PersonName {
        first,
        last,
        full: clean(text),
    }
}

fn telecom(resource: &Value, system: &str) -> Option<String> {
    array(resource, "telecom")
        .iter()
        .filter(|contact| contact.get("system").and_then(Value::as_str) == Some(system))
        .find_map(|contact| str_field(contact, "value"))
}

fn preferred_address(resource: &Value) -> Option<&Value> {
    let addresses = array(resource, "address");
    addresses
        .iter()
        .find(|address| address.get("use").and_then(Value::as_str) == Some("home"))
        .or_else(|| addresses.first())
}

fn read_address(address: &Value) -> Address {
    Address {
        lines: array(address, "line")
            .iter()
            .filter_map(Value::as_str)
            .filter_map(clean)
            .collect(),
        city: str_field(address, "city"),
        state: str_field(address, "state"),
        postal_code: str_field(address, "postalCode"),
        country: str_field(address, "country"),
        text: str_field(address, "text"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn structured_official_name_wins() {
        let resource = json!({
            "resourceType": "Patient",
            "id": "pat-1",
            "name": [
                { "use": "nickname", "given": ["Johnny"] },
                { "use": "official", "given": ["John", "Quincy"], "family": "Doe" }
            ],
            "birthDate": "1970-05-20",
            "gender": "male",
            "telecom": [
                { "system": "phone", "value": "555-0100" },
                { "system": "email", "value": "john@example.com" }
            ],
            "address": [
                { "use": "work", "city": "Boston" },
                { "use": "home", "line": ["1 Main St"], "city": "Springfield", "state": "IL", "postalCode": "62701" }
            ]
        });
        let patient = build(&resource, "epic");
        assert_eq!(patient.first_name.as_deref(), Some("John"));
        assert_eq!(patient.last_name.as_deref(), Some("Doe"));
        assert_eq!(patient.full_name.as_deref(), Some("John Quincy Doe"));
        assert_eq!(patient.birth_date, NaiveDate::from_ymd_opt(1970, 5, 20));
        assert_eq!(patient.gender, Gender::Male);
        assert_eq!(patient.email.as_deref(), Some("john@example.com"));
        assert_eq!(patient.phone.as_deref(), Some("555-0100"));

        let address = patient.address.unwrap();
        assert_eq!(address.city.as_deref(), Some("Springfield"));
        assert_eq!(address.lines, vec!["1 Main St".to_string()]);
    }

    #[test]
    fn text_names_in_both_conventions() {
        let comma = build(&json!({ "name": [{ "text": "Doe, Jane" }] }), "humana");
        assert_eq!(comma.first_name.as_deref(), Some("Jane"));
        assert_eq!(comma.last_name.as_deref(), Some("Doe"));
        assert_eq!(comma.full_name.as_deref(), Some("Doe, Jane"));

        let spaced = build(&json!({ "name": [{ "text": "Jane Mary Doe" }] }), "humana");
        assert_eq!(spaced.first_name.as_deref(), Some("Jane"));
        assert_eq!(spaced.last_name.as_deref(), Some("Mary Doe"));
    }

    #[test]
    fn stu2_family_array() {
        let patient = build(
            &json!({ "name": [{ "given": ["Ana"], "family": ["de", "la Cruz"] }] }),
            "legacy",
        );
        assert_eq!(patient.last_name.as_deref(), Some("de la Cruz"));
        assert_eq!(patient.full_name.as_deref(), Some("Ana de la Cruz"));
    }

    #[test]
    fn empty_patient() {
        let patient = build(&json!({ "resourceType": "Patient" }), "epic");
        assert_eq!(patient.first_name, None);
        assert_eq!(patient.birth_date, None);
        assert_eq!(patient.gender, Gender::Unknown);
        assert_eq!(patient.address, None);
    }
}
