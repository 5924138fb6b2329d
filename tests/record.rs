//! Tests for record-to-line serialization.

use splitseal::record::{CsvLine, Serializable};
use splitseal::serializable;
use splitseal::testing::{DemoRecord, seed_records};

struct Person {
    name: String,
    age: u32,
    nick: Option<String>,
    score: f64,
}
serializable!(Person { name, age, nick, score });

struct Reordered {
    b: &'static str,
    a: i64,
}
serializable!(Reordered { b, a });

#[test]
fn fields_follow_listed_order() {
    let p = Person {
        name: "Ada".into(),
        age: 36,
        nick: Some("countess".into()),
        score: 1.5,
    };
    assert_eq!(CsvLine::default().render(&p), "Ada,36,countess,1.5");

    let r = Reordered { b: "x", a: -4 };
    assert_eq!(CsvLine::default().render(&r), "x,-4");
}

#[test]
fn missing_value_is_empty_field() {
    let p = Person {
        name: "Bob".into(),
        age: 7,
        nick: None,
        score: 0.0,
    };
    assert_eq!(p.to_fields()[2], None);
    assert_eq!(CsvLine::default().render(&p), "Bob,7,,0");
}

#[test]
fn custom_delimiter() {
    let r = Reordered { b: "left", a: 2 };
    let line = CsvLine::with_delimiter(';');
    assert_eq!(line.delimiter(), ';');
    assert_eq!(line.render(&r), "left;2");
}

#[test]
fn delimiter_in_value_is_not_escaped() {
    let r = Reordered { b: "a,b", a: 1 };
    let line = CsvLine::default().render(&r);
    assert_eq!(line, "a,b,1");
    assert_eq!(line.split(',').count(), 3);
}

#[test]
fn rendering_is_deterministic() {
    let record = DemoRecord::numbered(42);
    let line = CsvLine::default();
    assert_eq!(line.render(&record), line.render(&record));
    assert_eq!(line.render(&&record), line.render(&record));
}

#[test]
fn demo_records_have_twenty_fields() {
    let records = seed_records(3);
    assert_eq!(records.len(), 3);

    let line = CsvLine::default().render(&records[0]);
    let fields: Vec<&str> = line.split(',').collect();
    assert_eq!(fields.len(), 20);
    assert_eq!(fields[0], "Name1");
    assert_eq!(fields[1], "5");
    assert_eq!(fields[2], "Field3_1");
    assert_eq!(fields[19], "Field20_1");
}
