use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format. Object fields of
/// `data` are merged into the JSON envelope.
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(fields)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(fields);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output labelled values; text mode prints one `key: value` line each
pub fn output_fields(output_format: &OutputFormat, message: &str, fields: &[(&str, Value)]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let data: serde_json::Map<String, Value> =
                fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
            output_success(output_format, message, Some(Value::Object(data)))
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            for (key, value) in fields {
                match value {
                    Value::String(s) => println!("{}: {}", key, s),
                    other => println!("{}: {}", key, other),
                }
            }
            Ok(())
        }
    }
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}
