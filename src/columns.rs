use chrono::{DateTime, NaiveDate, Utc};
use derive_setters::Setters;
use std::cmp::Ordering;
use std::fmt;

use crate::events::Event;

/// How dates are shown in the table, e.g. `Tue Jan 05 2021`.
pub const DISPLAY_DATE_FORMAT: &str = "%a %b %d %Y";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Missing,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Missing => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

pub type Accessor<R> = fn(&R) -> CellValue;
pub type Comparator = fn(&CellValue, &CellValue) -> Ordering;
pub type Formatter = fn(&CellValue) -> String;
pub type Emphasis = fn(&CellValue) -> bool;

/// Declares how one table column is derived from a row, compared and filtered.
#[derive(Setters)]
pub struct ColumnSpec<R> {
    #[setters(skip)]
    pub key: &'static str,
    #[setters(skip)]
    pub label: &'static str,
    #[setters(skip)]
    pub accessor: Accessor<R>,
    pub filterable: bool,
    pub sortable: bool,
    #[setters(strip_option)]
    pub comparator: Option<Comparator>,
    #[setters(strip_option)]
    pub formatter: Option<Formatter>,
    #[setters(strip_option)]
    pub emphasis: Option<Emphasis>,
}

impl<R> ColumnSpec<R> {
    pub fn new(key: &'static str, label: &'static str, accessor: Accessor<R>) -> Self {
        Self {
            key,
            label,
            accessor,
            filterable: true,
            sortable: true,
            comparator: None,
            formatter: None,
            emphasis: None,
        }
    }

    pub fn value(&self, row: &R) -> CellValue {
        (self.accessor)(row)
    }

    pub fn render(&self, value: &CellValue) -> String {
        match self.formatter {
            Some(format) => format(value),
            None => value.to_string(),
        }
    }

    pub fn is_emphasized(&self, value: &CellValue) -> bool {
        self.emphasis.is_some_and(|emphasize| emphasize(value))
    }

    pub fn compare(&self, a: &CellValue, b: &CellValue) -> Ordering {
        self.comparator.unwrap_or(default_compare)(a, b)
    }
}

pub fn find_column<'a, R>(specs: &'a [ColumnSpec<R>], key: &str) -> Option<&'a ColumnSpec<R>> {
    specs.iter().find(|spec| spec.key == key)
}

/// Numbers compare numerically, missing values go last, everything else
/// compares by its string form.
pub fn default_compare(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Missing, CellValue::Missing) => Ordering::Equal,
        (CellValue::Missing, _) => Ordering::Greater,
        (_, CellValue::Missing) => Ordering::Less,
        (CellValue::Number(x), CellValue::Number(y)) => x.total_cmp(y),
        (CellValue::Text(x), CellValue::Text(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

/// Seconds since the epoch for a displayed or RFC 3339 date.
pub fn parse_timestamp(value: &CellValue) -> Option<i64> {
    match value {
        CellValue::Text(s) => NaiveDate::parse_from_str(s, DISPLAY_DATE_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp())),
        CellValue::Number(n) if n.is_finite() => Some(n.floor() as i64),
        CellValue::Number(_) => None,
        CellValue::Missing => None,
    }
}

/// Orders dates by timestamp. Displayed dates are never compared as strings;
/// `Mon Feb 01 2021` comes after `Tue Jan 05 2021`.
pub fn compare_dates(a: &CellValue, b: &CellValue) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn format_display_date(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format(DISPLAY_DATE_FORMAT).to_string())
}

fn event_id(event: &Event) -> CellValue {
    event.id.as_str().into()
}

fn event_title(event: &Event) -> CellValue {
    event.title.as_str().into()
}

fn event_status(event: &Event) -> CellValue {
    event.closed.as_deref().unwrap_or("open").into()
}

fn event_category(event: &Event) -> CellValue {
    event
        .categories
        .first()
        .map(|c| c.title.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or("unknown")
        .into()
}

fn event_date(event: &Event) -> CellValue {
    event
        .geometry
        .first()
        .and_then(|g| g.date.as_deref())
        .and_then(format_display_date)
        .map(CellValue::Text)
        .unwrap_or(CellValue::Missing)
}

fn event_link(event: &Event) -> CellValue {
    event.link.as_str().into()
}

fn is_open(value: &CellValue) -> bool {
    matches!(value, CellValue::Text(s) if s == "open")
}

fn missing_as_unknown(value: &CellValue) -> String {
    match value {
        CellValue::Missing => "unknown".to_string(),
        v => v.to_string(),
    }
}

/// The columns of the event table, in display order.
pub fn event_columns() -> Vec<ColumnSpec<Event>> {
    vec![
        ColumnSpec::new("id", "Events Id", event_id)
            .sortable(false)
            .filterable(false),
        ColumnSpec::new("title", "Title", event_title).filterable(false),
        ColumnSpec::new("status", "Status", event_status).emphasis(is_open),
        ColumnSpec::new("categories", "Categories", event_category),
        ColumnSpec::new("date", "Date", event_date)
            .comparator(compare_dates)
            .formatter(missing_as_unknown),
        ColumnSpec::new("link", "Link", event_link)
            .sortable(false)
            .filterable(false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::tests::fixture_events;
    use std::collections::HashSet;

    #[test]
    fn column_keys_are_unique() {
        let columns = event_columns();
        let keys: HashSet<_> = columns.iter().map(|c| c.key).collect();
        assert_eq!(keys.len(), columns.len());
    }

    #[test]
    fn accessors_project_event_fields() {
        let events = fixture_events();
        let columns = event_columns();
        let values: Vec<String> = columns
            .iter()
            .map(|c| c.render(&c.value(&events[1])))
            .collect();
        assert_eq!(
            values,
            vec![
                "EONET_5002",
                "Tropical Storm Alpha",
                "2021-02-10T00:00:00Z",
                "Severe Storms",
                "Mon Feb 01 2021",
                "https://eonet.gsfc.nasa.gov/api/v3/events/EONET_5002",
            ]
        );
    }

    #[test]
    fn accessors_default_missing_nested_fields() {
        let event = crate::events::parse_feed(r#"{"events":[{"id":"E1"}]}"#).unwrap();
        let columns = event_columns();
        let status = find_column(&columns, "status").unwrap();
        let category = find_column(&columns, "categories").unwrap();
        let date = find_column(&columns, "date").unwrap();

        assert_eq!(status.value(&event[0]), CellValue::from("open"));
        assert_eq!(category.value(&event[0]), CellValue::from("unknown"));
        assert_eq!(date.value(&event[0]), CellValue::Missing);
        assert_eq!(date.render(&CellValue::Missing), "unknown");
    }

    #[test]
    fn open_status_is_emphasized() {
        let columns = event_columns();
        let status = find_column(&columns, "status").unwrap();
        assert!(status.is_emphasized(&"open".into()));
        assert!(!status.is_emphasized(&"2021-02-10T00:00:00Z".into()));

        let title = find_column(&columns, "title").unwrap();
        assert!(!title.is_emphasized(&"open".into()));
    }

    #[test]
    fn dates_compare_by_timestamp_not_by_text() {
        let jan = CellValue::from("Tue Jan 05 2021");
        let feb = CellValue::from("Mon Feb 01 2021");
        let dec = CellValue::from("Wed Dec 01 2021");

        // Lexically "Mon ..." < "Tue ..." but February is later
        assert_eq!(default_compare(&feb, &jan), Ordering::Less);
        assert_eq!(compare_dates(&jan, &feb), Ordering::Less);
        assert_eq!(compare_dates(&jan, &dec), Ordering::Less);
        assert_eq!(compare_dates(&dec, &feb), Ordering::Greater);
        assert_eq!(compare_dates(&jan, &jan.clone()), Ordering::Equal);
    }

    #[test]
    fn unparseable_dates_sort_last() {
        let jan = CellValue::from("Tue Jan 05 2021");
        assert_eq!(compare_dates(&jan, &CellValue::Missing), Ordering::Less);
        assert_eq!(compare_dates(&"garbage".into(), &jan), Ordering::Greater);
        assert_eq!(
            compare_dates(&CellValue::Missing, &"garbage".into()),
            Ordering::Equal
        );
    }

    #[test]
    fn non_finite_numbers_are_not_dates() {
        assert_eq!(parse_timestamp(&CellValue::Number(f64::NAN)), None);
        assert_eq!(parse_timestamp(&CellValue::Number(f64::INFINITY)), None);
        assert_eq!(parse_timestamp(&CellValue::Number(-1.5)), Some(-2));

        let early = CellValue::Number(-10.0);
        assert_eq!(compare_dates(&CellValue::Number(f64::NAN), &early), Ordering::Greater);
        assert_eq!(compare_dates(&early, &CellValue::Number(0.0)), Ordering::Less);
    }

    #[test]
    fn rfc3339_dates_are_accepted() {
        assert_eq!(
            parse_timestamp(&"2021-01-05T00:00:00Z".into()),
            parse_timestamp(&"Tue Jan 05 2021".into())
        );
    }

    #[test]
    fn default_compare_orders_numbers_numerically() {
        assert_eq!(default_compare(&9.0.into(), &10.0.into()), Ordering::Less);
        assert_eq!(default_compare(&"9".into(), &"10".into()), Ordering::Greater);
        assert_eq!(default_compare(&CellValue::Missing, &"a".into()), Ordering::Greater);
        assert_eq!(default_compare(&"a".into(), &"a".into()), Ordering::Equal);
    }

    #[test]
    fn numbers_coerce_to_short_strings() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Missing.to_string(), "");
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub(crate) struct Item {
        pub id: &'static str,
        pub title: &'static str,
        pub group: &'static str,
        pub score: f64,
    }

    pub(crate) fn item(id: &'static str, title: &'static str, group: &'static str, score: f64) -> Item {
        Item {
            id,
            title,
            group,
            score,
        }
    }

    fn item_id(item: &Item) -> CellValue {
        item.id.into()
    }

    fn item_title(item: &Item) -> CellValue {
        item.title.into()
    }

    fn item_group(item: &Item) -> CellValue {
        item.group.into()
    }

    fn item_score(item: &Item) -> CellValue {
        item.score.into()
    }

    pub(crate) fn item_columns() -> Vec<ColumnSpec<Item>> {
        vec![
            ColumnSpec::new("id", "Id", item_id)
                .sortable(false)
                .filterable(false),
            ColumnSpec::new("title", "Title", item_title),
            ColumnSpec::new("group", "Group", item_group),
            ColumnSpec::new("score", "Score", item_score),
        ]
    }

    pub(crate) fn items() -> Vec<Item> {
        vec![
            item("A", "X", "red", 3.0),
            item("B", "Y", "blue", 1.0),
            item("C", "Z", "red", 2.0),
        ]
    }
}
