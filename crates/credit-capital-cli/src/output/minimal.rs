use serde_json::Value;

/// Headline figures, most specific first. Issuer breakdowns nest the charge
/// under `capital`.
const HEADLINE_PATHS: [&[&str]; 4] = [
    &["capital_charge"],
    &["capital", "capital_charge"],
    &["irc_charge"],
    &["drc_charge"],
];

/// Print just the capital charge from the output.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    for path in HEADLINE_PATHS {
        let found = path.iter().try_fold(result, |v, key| v.get(*key));
        if let Some(val) = found.filter(|v| !v.is_null()) {
            println!("{}", format_minimal(val));
            return;
        }
    }

    if let Value::Array(rows) = result {
        for row in rows {
            if let Some(name) = row.get("name") {
                println!("{}", format_minimal(name));
            }
        }
        return;
    }
    println!("{}", format_minimal(result));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
