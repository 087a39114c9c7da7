use mongodb::bson::{doc, Document};
use mongodb::options::FindOptions;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{and_filters, FilterWhere};
use super::types::{FilterOrderInfo, ListQuery};

/// Resolved list query: MongoDB filter plus paging and ordering.
#[derive(Debug, Clone)]
pub struct Filter {
    where_data: Document,
    order_data: Vec<FilterOrderInfo>,
    page: u32,
    limit: u32,
}

impl Filter {
    pub fn new() -> Self {
        let api = &crate::config::CONFIG.api;
        Self {
            where_data: Document::new(),
            order_data: vec![],
            page: 1,
            limit: api.default_page_size,
        }
    }

    /// Apply page/limit/sort/search/status from the query string.
    /// `search_fields` lists the text fields `search` may match.
    pub fn from_query(query: &ListQuery, search_fields: &[&str]) -> Result<Self, FilterError> {
        let api = &crate::config::CONFIG.api;
        let mut filter = Self::new();
        filter.paginate(query.page, query.limit, api.default_page_size, api.max_page_size)?;

        if let Some(sort) = query.sort.as_deref() {
            filter.order(sort)?;
        }
        if let Some(search) = query.search.as_deref().and_then(|s| FilterWhere::search(search_fields, s)) {
            filter.and_where(search);
        }
        if let Some(status) = FilterWhere::equals("status", query.status.as_deref()) {
            filter.and_where(status);
        }
        Ok(filter)
    }

    pub fn paginate(
        &mut self,
        page: Option<u32>,
        limit: Option<u32>,
        default_limit: u32,
        max_limit: u32,
    ) -> Result<&mut Self, FilterError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(FilterError::InvalidPage("Page numbers start at 1".to_string()));
        }
        let limit = limit.unwrap_or(default_limit);
        if limit == 0 {
            return Err(FilterError::InvalidLimit("Limit must be positive".to_string()));
        }
        let applied_limit = if limit > max_limit {
            tracing::debug!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            max_limit
        } else {
            limit
        };

        self.page = page;
        self.limit = applied_limit;
        Ok(self)
    }

    pub fn order(&mut self, spec: &str) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::parse(spec)?;
        Ok(self)
    }

    pub fn and_where(&mut self, condition: Document) -> &mut Self {
        let current = std::mem::take(&mut self.where_data);
        self.where_data = and_filters(current, condition);
        self
    }

    /// Order used when the caller gave none
    pub fn default_order(&mut self, spec: &str) -> &mut Self {
        if self.order_data.is_empty() {
            if let Ok(order) = FilterOrder::parse(spec) {
                self.order_data = order;
            }
        }
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    pub fn where_document(&self) -> &Document {
        &self.where_data
    }

    pub fn sort_document(&self) -> Document {
        if self.order_data.is_empty() {
            doc! { "_id": -1 }
        } else {
            FilterOrder::to_document(&self.order_data)
        }
    }

    pub fn find_options(&self) -> FindOptions {
        FindOptions::builder()
            .sort(self.sort_document())
            .skip(self.skip())
            .limit(self.limit as i64)
            .build()
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_caps_limit_and_computes_skip() {
        let mut filter = Filter::new();
        filter.paginate(Some(3), Some(500), 20, 100).unwrap();
        assert_eq!(filter.limit(), 100);
        assert_eq!(filter.skip(), 200);
    }

    #[test]
    fn paginate_rejects_zero() {
        let mut filter = Filter::new();
        assert!(matches!(
            filter.paginate(Some(0), None, 20, 100),
            Err(FilterError::InvalidPage(_))
        ));
        assert!(matches!(
            filter.paginate(None, Some(0), 20, 100),
            Err(FilterError::InvalidLimit(_))
        ));
    }

    #[test]
    fn from_query_combines_search_and_status() {
        let query = ListQuery {
            search: Some("rust".into()),
            status: Some("open".into()),
            sort: Some("-created_at".into()),
            ..Default::default()
        };
        let filter = Filter::from_query(&query, &["title"]).unwrap();
        assert_eq!(filter.where_document().get_array("$and").unwrap().len(), 2);
        assert_eq!(filter.sort_document(), doc! { "created_at": -1 });
        assert_eq!(filter.page(), 1);
    }

    #[test]
    fn default_order_only_applies_when_unsorted() {
        let mut filter = Filter::new();
        filter.default_order("order");
        assert_eq!(filter.sort_document(), doc! { "order": 1 });

        filter.order("-title").unwrap();
        filter.default_order("order");
        assert_eq!(filter.sort_document(), doc! { "title": -1 });
    }
}
