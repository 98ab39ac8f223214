//! Floor-plan analysis post-processing.
//!
//! The vision model is asked for a bare JSON object but sometimes wraps it
//! in prose or code fences; [`salvage_json`] recovers the object by slicing
//! from the first `{` to the last `}`. [`synthesize_overview`] then derives
//! a deterministic one-paragraph overview from the parsed fields so the
//! dashboard always has something readable even when the model returns only
//! raw quantities.

use serde_json::Value;

/// Recover a JSON object from model output that may carry stray text
/// around it. Returns `None` when no object can be parsed at all; the
/// caller reports the raw text instead of failing.
pub fn salvage_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Append a deterministic `summary` paragraph to a parsed blueprint
/// analysis.
///
/// Derived fields: room count, best-available total square footage
/// (flooring, then drywall, then paint), openings in either array or map
/// form, the trade list, and the grand total. Duration uses a rough crew
/// heuristic of one week per 300 sq ft (800 sq ft assumed when unknown),
/// with a two-week floor. A malformed analysis gets an empty summary
/// rather than an error.
pub fn synthesize_overview(analysis: &mut Value) {
    let summary = match build_summary(analysis) {
        Some(s) => s,
        None => String::new(),
    };
    if let Some(obj) = analysis.as_object_mut() {
        obj.insert("summary".to_string(), Value::String(summary));
    }
}

fn build_summary(analysis: &Value) -> Option<String> {
    let obj = analysis.as_object()?;

    let trades = obj.get("trades").and_then(|t| t.as_object());
    let trade_names: Vec<&str> = trades
        .map(|t| t.keys().map(|k| k.as_str()).collect())
        .unwrap_or_default();

    let total_sqft = trades
        .and_then(|t| {
            trade_number(t.get("flooring"), "sqft")
                .or_else(|| trade_number(t.get("drywall"), "qty_sqft"))
                .or_else(|| trade_number(t.get("paint"), "qty_sqft"))
        })
        .unwrap_or(0.0);

    let total_rooms = obj
        .get("rooms")
        .and_then(|r| r.as_array())
        .map(|r| r.len())
        .unwrap_or(0);

    let total_cost = obj
        .get("grand_total_usd")
        .and_then(|c| c.as_f64())
        .unwrap_or(0.0);

    // One week per 300 sq ft with a standard crew, two-week minimum.
    let sqft_for_duration = if total_sqft > 0.0 { total_sqft } else { 800.0 };
    let est_weeks = ((sqft_for_duration / 300.0).round() as i64).max(2);

    let mut parts = Vec::new();
    parts.push(format!(
        "Overview: Plan includes {} room{} totaling ~{} sq ft.",
        total_rooms,
        if total_rooms == 1 { "" } else { "s" },
        total_sqft.round() as i64
    ));

    let openings = describe_openings(obj.get("openings"));
    if !openings.is_empty() {
        parts.push(format!("Openings: {}.", openings));
    }
    if !trade_names.is_empty() {
        parts.push(format!("Trades involved: {}.", trade_names.join(", ")));
    }

    if total_cost > 0.0 {
        parts.push(format!("Estimated total cost: ${}.", group_thousands(total_cost)));
    } else {
        parts.push("No cost breakdown returned; provide unit rates to generate a budget.".to_string());
    }

    parts.push(format!(
        "Projected duration: about {} week{} with a standard crew.",
        est_weeks,
        if est_weeks == 1 { "" } else { "s" }
    ));

    let materials_empty = obj
        .get("materials")
        .and_then(|m| m.as_array())
        .map(|m| m.is_empty())
        .unwrap_or(true);
    if materials_empty {
        parts.push(
            "Materials list is empty; specify preferred products and finish standards for procurement."
                .to_string(),
        );
    }

    parts.push(
        "This summary was auto-generated from extracted blueprint data and should be verified by the estimating team."
            .to_string(),
    );

    Some(parts.join(" "))
}

fn trade_number(trade: Option<&Value>, key: &str) -> Option<f64> {
    trade?.get(key)?.as_f64()
}

/// Render openings from either the array form
/// (`[{ "type": "door", "count": 3 }]`) or the map form (`{"door": 3}`).
fn describe_openings(openings: Option<&Value>) -> String {
    match openings {
        Some(Value::Array(items)) => items
            .iter()
            .map(|o| {
                let kind = o
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("opening");
                match o.get("count").and_then(|c| c.as_i64()) {
                    Some(n) => format!("{} x{}", kind, n),
                    None => kind.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| match v.as_i64() {
                Some(n) => format!("{} x{}", k, n),
                None => k.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// `1234567.0` renders as `1,234,567`.
fn group_thousands(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if whole < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salvages_object_wrapped_in_prose() {
        let text = "Sure! Here is the JSON:\n```json\n{\"rooms\": []}\n```\nLet me know.";
        let json = salvage_json(text).unwrap();
        assert_eq!(json["rooms"], serde_json::json!([]));
    }

    #[test]
    fn salvage_fails_on_no_object() {
        assert!(salvage_json("no braces here").is_none());
        assert!(salvage_json("} backwards {").is_none());
    }

    #[test]
    fn overview_covers_rooms_sqft_trades_and_cost() {
        let mut analysis = serde_json::json!({
            "rooms": [ { "name": "kitchen" }, { "name": "bath" } ],
            "openings": [ { "type": "door", "count": 3 }, { "type": "window", "count": 5 } ],
            "trades": { "flooring": { "sqft": 900.0 }, "paint": { "qty_sqft": 2100.0 } },
            "materials": [ { "name": "LVP flooring" } ],
            "grand_total_usd": 42500.0,
        });
        synthesize_overview(&mut analysis);
        let summary = analysis["summary"].as_str().unwrap();
        assert!(summary.contains("2 rooms"));
        assert!(summary.contains("~900 sq ft"));
        assert!(summary.contains("door x3, window x5"));
        assert!(summary.contains("flooring"));
        assert!(summary.contains("$42,500"));
        // 900 / 300 = 3 weeks.
        assert!(summary.contains("about 3 weeks"));
        assert!(!summary.contains("Materials list is empty"));
    }

    #[test]
    fn overview_falls_back_when_fields_missing() {
        let mut analysis = serde_json::json!({});
        synthesize_overview(&mut analysis);
        let summary = analysis["summary"].as_str().unwrap();
        assert!(summary.contains("0 rooms"));
        assert!(summary.contains("No cost breakdown returned"));
        // Unknown sqft assumes 800, so 800 / 300 rounds to 3 weeks.
        assert!(summary.contains("about 3 weeks"));
        assert!(summary.contains("Materials list is empty"));
    }

    #[test]
    fn overview_duration_has_two_week_floor() {
        let mut analysis = serde_json::json!({
            "trades": { "flooring": { "sqft": 120.0 } },
        });
        synthesize_overview(&mut analysis);
        let summary = analysis["summary"].as_str().unwrap();
        assert!(summary.contains("about 2 weeks"));
    }

    #[test]
    fn overview_reads_openings_in_map_form() {
        let mut analysis = serde_json::json!({
            "openings": { "door": 2, "window": 6 },
        });
        synthesize_overview(&mut analysis);
        let summary = analysis["summary"].as_str().unwrap();
        assert!(summary.contains("door x2"));
        assert!(summary.contains("window x6"));
    }

    #[test]
    fn non_object_analysis_is_left_alone() {
        let mut analysis = serde_json::json!("raw text");
        synthesize_overview(&mut analysis);
        assert_eq!(analysis, serde_json::json!("raw text"));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(950.0), "950");
        assert_eq!(group_thousands(42500.0), "42,500");
        assert_eq!(group_thousands(1234567.0), "1,234,567");
    }
}
