//! Declarative response postprocessing example.
//!
//! Shows how a key-name rule rewrites leaf values throughout an
//! arbitrarily nested response document, without touching the
//! document offline: the same walker is available standalone via
//! `svc_client::postprocess`.

use regex::Regex;
use serde_json::{json, Value};
use svc_client::{postprocess, PostprocessRule};

fn to_number(value: Value) -> Value {
    match &value {
        Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or(value),
        _ => value,
    }
}

fn main() -> anyhow::Result<()> {
    let rules = vec![PostprocessRule::new(Regex::new("amount$").unwrap(), to_number)];

    let document = json!({
        "amount": "12.50",
        "lines": [
            {"amount": "1.10", "label": "base"},
            {"amount": "2.20", "label": "tax"},
        ],
        // An object under a matched key is not transformed as a whole;
        // its own keys re-match.
        "refund_amount": {"pending": "3.30"},
    });

    let rewritten = postprocess(&rules, document);
    println!("{}", serde_json::to_string_pretty(&rewritten)?);

    Ok(())
}
