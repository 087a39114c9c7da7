use mongodb::bson::{doc, Document};

use super::error::FilterError;

pub struct FilterWhere;

impl FilterWhere {
    /// Field names may contain letters, digits, `_` and `.`, and never start with `$`.
    pub fn validate_field(field: &str) -> Result<(), FilterError> {
        let valid = !field.is_empty()
            && field.len() <= 64
            && !field.starts_with('.')
            && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if valid {
            Ok(())
        } else {
            Err(FilterError::InvalidField(field.to_string()))
        }
    }

    /// Case-insensitive match of `term` in any of `fields`.
    pub fn search(fields: &[&str], term: &str) -> Option<Document> {
        let term = term.trim();
        if term.is_empty() || fields.is_empty() {
            return None;
        }
        let pattern = escape_regex(term);
        let clauses: Vec<Document> = fields
            .iter()
            .map(|field| doc! { *field: { "$regex": &pattern, "$options": "i" } })
            .collect();
        Some(doc! { "$or": clauses })
    }

    /// `{field: value}` unless `value` is absent or blank
    pub fn equals(field: &str, value: Option<&str>) -> Option<Document> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| doc! { field: v })
    }
}

/// AND two filters, keeping the result flat when either side is empty.
pub fn and_filters(left: Document, right: Document) -> Document {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right,
        (_, true) => left,
        _ => doc! { "$and": [left, right] },
    }
}

pub fn escape_regex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_builds_case_insensitive_or() {
        let filter = FilterWhere::search(&["title", "description"], "c++").unwrap();
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);
        let first = clauses[0].as_document().unwrap().get_document("title").unwrap();
        assert_eq!(first.get_str("$regex").unwrap(), "c\\+\\+");
        assert_eq!(first.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn blank_search_is_none() {
        assert!(FilterWhere::search(&["title"], "   ").is_none());
        assert!(FilterWhere::equals("status", Some(" ")).is_none());
        assert_eq!(FilterWhere::equals("status", Some("open")), Some(doc! { "status": "open" }));
    }

    #[test]
    fn and_filters_stays_flat() {
        let scope = doc! { "franchise_code": "NORTH" };
        assert_eq!(and_filters(Document::new(), scope.clone()), scope);
        assert_eq!(and_filters(scope.clone(), Document::new()), scope);

        let both = and_filters(doc! { "status": "open" }, scope);
        assert_eq!(both.get_array("$and").unwrap().len(), 2);
    }

    #[test]
    fn field_validation() {
        assert!(FilterWhere::validate_field("created_at").is_ok());
        assert!(FilterWhere::validate_field("address.city").is_ok());
        assert!(FilterWhere::validate_field("$where").is_err());
        assert!(FilterWhere::validate_field("").is_err());
    }
}
