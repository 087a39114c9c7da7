use mongodb::bson::Document;

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"-created_at,title"` and `"created_at desc, title asc"`.
    pub fn parse(spec: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in spec.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }

            let mut it = trimmed.split_whitespace();
            let Some(token) = it.next() else { continue };

            let (field, mut sort) = match token.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (token.strip_prefix('+').unwrap_or(token), SortDirection::Asc),
            };
            if let Some(dir) = it.next() {
                sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
            }

            FilterWhere::validate_field(field)?;
            out.push(FilterOrderInfo { field: field.to_string(), sort });
        }
        Ok(out)
    }

    pub fn to_document(infos: &[FilterOrderInfo]) -> Document {
        let mut sort = Document::new();
        for info in infos {
            sort.insert(info.field.clone(), info.sort.to_mongo());
        }
        sort
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn parses_prefix_and_word_directions() {
        let infos = FilterOrder::parse("-created_at, title , order desc").unwrap();
        assert_eq!(
            FilterOrder::to_document(&infos),
            doc! { "created_at": -1, "title": 1, "order": -1 }
        );
    }

    #[test]
    fn rejects_operator_fields() {
        assert!(FilterOrder::parse("$where").is_err());
        assert!(FilterOrder::parse("title;drop").is_err());
    }

    #[test]
    fn empty_spec_is_empty() {
        assert!(FilterOrder::parse(" , ").unwrap().is_empty());
    }
}
