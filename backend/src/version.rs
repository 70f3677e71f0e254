//! Maven version helpers: snapshot detection and ordering.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

pub const SNAPSHOT: &str = "SNAPSHOT";

/// `<base>-yyyyMMdd.HHmmss-<build>`
static UNIQUE_SNAPSHOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)-([0-9]{8}\.[0-9]{6})-([0-9]+)$").expect("valid regex"));

/// Parts of a unique (timestamped) snapshot version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueSnapshot {
    pub base: String,
    pub timestamp: String,
    pub build_number: u32,
}

/// Split a timestamped snapshot version into its parts.
pub fn parse_unique_snapshot(version: &str) -> Option<UniqueSnapshot> {
    let caps = UNIQUE_SNAPSHOT.captures(version)?;
    let build_number = caps[3].parse().ok()?;
    Some(UniqueSnapshot {
        base: caps[1].to_string(),
        timestamp: caps[2].to_string(),
        build_number,
    })
}

pub fn is_unique_snapshot(version: &str) -> bool {
    UNIQUE_SNAPSHOT.is_match(version)
}

pub fn is_generic_snapshot(version: &str) -> bool {
    version.ends_with(SNAPSHOT)
}

pub fn is_snapshot(version: &str) -> bool {
    is_generic_snapshot(version) || is_unique_snapshot(version)
}

/// Version directory name: unique snapshots collapse to `<base>-SNAPSHOT`.
pub fn base_version(version: &str) -> String {
    match parse_unique_snapshot(version) {
        Some(snap) => format!("{}-{}", snap.base, SNAPSHOT),
        None => version.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Number(String),
    Qualifier(String),
}

/// Rank of well-known qualifiers; unknown qualifiers sort after all of them.
fn qualifier_rank(q: &str) -> usize {
    match q {
        "alpha" | "a" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => 5,
        "sp" => 6,
        _ => 7,
    }
}

const RELEASE_RANK: usize = 5;

fn tokenize(version: &str) -> Vec<Item> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut digits = false;

    let flush = |current: &mut String, digits: bool, items: &mut Vec<Item>| {
        if current.is_empty() {
            return;
        }
        if digits {
            let trimmed = current.trim_start_matches('0');
            items.push(Item::Number(if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            }));
        } else {
            items.push(Item::Qualifier(current.to_lowercase()));
        }
        current.clear();
    };

    for c in version.chars() {
        if c == '.' || c == '-' || c == '_' {
            flush(&mut current, digits, &mut items);
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != digits {
            flush(&mut current, digits, &mut items);
        }
        digits = is_digit;
        current.push(c);
    }
    flush(&mut current, digits, &mut items);

    // Trailing zeros and release qualifiers carry no ordering weight.
    while let Some(last) = items.last() {
        let padding = match last {
            Item::Number(n) => n == "0",
            Item::Qualifier(q) => qualifier_rank(q) == RELEASE_RANK,
        };
        if padding && items.len() > 1 {
            items.pop();
        } else {
            break;
        }
    }
    items
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    let (ra, rb) = (qualifier_rank(a), qualifier_rank(b));
    if ra == 7 && rb == 7 {
        a.cmp(b)
    } else {
        ra.cmp(&rb)
    }
}

fn compare_items(a: Option<&Item>, b: Option<&Item>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Item::Number(x)), Some(Item::Number(y))) => compare_numbers(x, y),
        (Some(Item::Qualifier(x)), Some(Item::Qualifier(y))) => compare_qualifiers(x, y),
        (Some(Item::Number(_)), Some(Item::Qualifier(_))) => Ordering::Greater,
        (Some(Item::Qualifier(_)), Some(Item::Number(_))) => Ordering::Less,
        // A missing item pads as 0 against numbers and as a release against qualifiers.
        (None, Some(Item::Number(y))) => compare_numbers("0", y),
        (Some(Item::Number(x)), None) => compare_numbers(x, "0"),
        (None, Some(Item::Qualifier(y))) => RELEASE_RANK.cmp(&qualifier_rank(y)),
        (Some(Item::Qualifier(x)), None) => qualifier_rank(x).cmp(&RELEASE_RANK),
    }
}

/// Maven-style version ordering.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (ta, tb) = (tokenize(a), tokenize(b));
    let len = ta.len().max(tb.len());
    for i in 0..len {
        match compare_items(ta.get(i), tb.get(i)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    // Equal by ordering rules; keep the comparison total over distinct strings.
    a.cmp(b)
}

/// Sort and de-duplicate a version list.
pub fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by(|a, b| compare_versions(a, b));
    versions.dedup();
}
