use serde_json::Value;

use credit_capital_core::capital::list_transition_matrices;

pub fn run_matrices() -> Result<Value, Box<dyn std::error::Error>> {
    let listings = list_transition_matrices()?;
    let rows: Vec<Value> = listings
        .iter()
        .map(|m| {
            let mut row = serde_json::Map::new();
            row.insert("name".into(), Value::String(m.name.clone()));
            row.insert("aliases".into(), Value::String(m.aliases.join(", ")));
            for (rating, pd) in &m.default_probabilities {
                row.insert(format!("pd_{}", rating.as_str().to_lowercase()), serde_json::json!(pd));
            }
            Value::Object(row)
        })
        .collect();
    Ok(Value::Array(rows))
}
