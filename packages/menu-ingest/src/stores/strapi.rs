//! Strapi REST adapter for the product store.
//!
//! Talks to the CMS collections `source-websites`, `products` and
//! `categories`. Accepts both the flattened v5 response shape and the v4
//! `{id, attributes: {...}}` shape. Record ids are `documentId` when the
//! server provides one, else the numeric id.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::extractors::util::json_string;
use crate::traits::store::ProductStore;
use crate::types::{
    ExtractionMode, IdentityKey, IngestStatus, ProductDraft, ProductFilter, RuleSet, Source,
    StoredProduct,
};

const MAX_ERROR_BODY: usize = 200;

/// Product store backed by a Strapi instance.
pub struct StrapiStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl StrapiStore {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    async fn send_json(&self, builder: RequestBuilder) -> StoreResult<Value> {
        let response = self.send(builder).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Entries of a `{ data: [...] }` collection response, flattened.
    fn entries(body: &Value) -> StoreResult<Vec<Value>> {
        match body.get("data") {
            Some(Value::Array(items)) => Ok(items.iter().map(flatten).collect()),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(StoreError::Decode(format!(
                "expected data array, got {}",
                type_name(other)
            ))),
        }
    }

    /// Id of a single-entry `{ data: {...} }` response.
    fn created_id(body: &Value) -> StoreResult<String> {
        body.get("data")
            .map(flatten)
            .as_ref()
            .and_then(record_id)
            .ok_or_else(|| StoreError::Decode("created entry has no id".to_string()))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Merge a v4 `{id, attributes}` entry into one flat object. Relations
/// wrapped as `{data: {...}}` are unwrapped too.
fn flatten(entry: &Value) -> Value {
    let Some(object) = entry.as_object() else {
        return entry.clone();
    };

    let mut flat = Map::new();
    for (key, value) in object {
        if key == "attributes" {
            continue;
        }
        flat.insert(key.clone(), value.clone());
    }
    if let Some(Value::Object(attributes)) = object.get("attributes") {
        for (key, value) in attributes {
            let value = match value.get("data") {
                Some(inner @ Value::Object(_)) => flatten(inner),
                Some(Value::Null) => Value::Null,
                _ => value.clone(),
            };
            flat.insert(key.clone(), value);
        }
    }
    Value::Object(flat)
}

fn record_id(entry: &Value) -> Option<String> {
    entry
        .get("documentId")
        .and_then(json_string)
        .or_else(|| entry.get("id").and_then(json_string))
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

/// Relation filter key for a business reference.
fn business_filter(business_id: &str) -> (&'static str, String) {
    if is_numeric_id(business_id) {
        ("filters[business][id][$eq]", business_id.to_string())
    } else {
        ("filters[business][documentId][$eq]", business_id.to_string())
    }
}

fn parse_source(entry: &Value) -> Option<Source> {
    let id = entry.get("id").and_then(json_string)?;
    let base_url = entry.get("baseUrl").and_then(json_string)?;

    let mut source = Source::new(id, base_url);

    source.entry_paths = entry
        .get("entryPaths")
        .and_then(Value::as_array)
        .map(|paths| paths.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    source.mode = entry
        .get("mode")
        .or_else(|| entry.get("extractionMode"))
        .and_then(Value::as_str)
        .and_then(ExtractionMode::parse)
        .unwrap_or_default();

    source.rules = match entry.get("rules") {
        Some(Value::Null) | None => None,
        Some(raw) => match serde_json::from_value::<RuleSet>(raw.clone()) {
            Ok(rules) => Some(rules),
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "Ignoring malformed rule set");
                None
            }
        },
    };

    source.headers = entry
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(k, v)| json_string(v).map(|v| (k.clone(), v)))
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();

    source.status = entry
        .get("ingestStatus")
        .and_then(Value::as_str)
        .and_then(IngestStatus::parse)
        .unwrap_or_default();

    if let Some(business) = entry.get("business").filter(|b| b.is_object()) {
        source.business_id = record_id(business);
        source.business_category = business
            .get("primaryCategory")
            .or_else(|| business.get("category"))
            .and_then(json_string);
    }

    Some(source)
}

fn parse_product(entry: &Value, business_id: &str) -> Option<StoredProduct> {
    Some(StoredProduct {
        id: record_id(entry)?,
        business_id: entry
            .get("business")
            .and_then(record_id)
            .unwrap_or_else(|| business_id.to_string()),
        title: entry.get("title").and_then(json_string)?,
        source_url: entry.get("sourceUrl").and_then(json_string).unwrap_or_default(),
        description: entry.get("description").and_then(json_string),
        price: entry.get("price").and_then(|p| match p {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }),
        currency: entry.get("currency").and_then(json_string),
        image_url: entry.get("image").and_then(json_string),
        primary_category: entry.get("primaryCategory").and_then(json_string),
        secondary_category_ids: Vec::new(),
        auto_imported: entry.get("autoImported").and_then(Value::as_bool).unwrap_or(false),
        override_lock: entry.get("overrideLock").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// `{data: {...}}` body for create/update.
fn product_body(draft: &ProductDraft) -> Value {
    let business = if is_numeric_id(&draft.business_id) {
        draft
            .business_id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(draft.business_id.clone()))
    } else {
        Value::from(draft.business_id.clone())
    };

    json!({
        "data": {
            "title": draft.title,
            "description": draft.description,
            "price": draft.price,
            "currency": draft.currency,
            "image": draft.image_url,
            "productUrl": draft.product_url,
            "sourceUrl": draft.source_url,
            "primaryCategory": draft.primary_category,
            "secondaryCategories": draft.secondary_category_ids,
            "autoImported": draft.auto_imported,
            "business": business,
            "sourceSnapshot": draft.snapshot,
        }
    })
}

/// Update body: like [`product_body`] without `autoImported`, so an update
/// never changes whether a product counts as pipeline-created.
fn update_body(draft: &ProductDraft) -> Value {
    let mut body = product_body(draft);
    if let Some(data) = body.get_mut("data").and_then(Value::as_object_mut) {
        data.remove("autoImported");
    }
    body
}

#[async_trait]
impl ProductStore for StrapiStore {
    async fn list_active_sources(&self, only_id: Option<&str>) -> StoreResult<Vec<Source>> {
        let mut query = vec![
            ("filters[ingestStatus][$eq]", "active".to_string()),
            ("populate", "business".to_string()),
        ];
        if let Some(id) = only_id {
            query.push(("filters[id][$eq]", id.to_string()));
        }

        let body = self
            .send_json(self.request(Method::GET, "/api/source-websites").query(&query))
            .await?;

        let entries = Self::entries(&body)?;
        let sources: Vec<Source> = entries
            .iter()
            .filter_map(|entry| {
                let parsed = parse_source(entry);
                if parsed.is_none() {
                    warn!(entry = %entry, "Skipping source entry without id or baseUrl");
                }
                parsed
            })
            .collect();

        debug!(count = sources.len(), "Loaded sources from Strapi");
        Ok(sources)
    }

    async fn list_existing_products(
        &self,
        filter: &ProductFilter,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<StoredProduct>> {
        let mut query = vec![
            business_filter(&filter.business_id),
            ("filters[overrideLock][$ne]", "true".to_string()),
            ("pagination[page]", page.to_string()),
            ("pagination[pageSize]", page_size.to_string()),
            ("sort", "id:asc".to_string()),
        ];
        if filter.auto_imported_only {
            query.push(("filters[autoImported][$eq]", "true".to_string()));
        }
        if let Some(prefix) = &filter.source_url_prefix {
            query.push(("filters[sourceUrl][$startsWithi]", prefix.clone()));
        }

        let body = self
            .send_json(self.request(Method::GET, "/api/products").query(&query))
            .await?;

        Ok(Self::entries(&body)?
            .iter()
            .filter_map(|entry| parse_product(entry, &filter.business_id))
            .collect())
    }

    async fn find_product(&self, key: &IdentityKey) -> StoreResult<Option<StoredProduct>> {
        let query = vec![
            business_filter(&key.business_id),
            ("filters[sourceUrl][$eqi]", key.source_url.clone()),
            ("filters[title][$eqi]", key.title.clone()),
            ("pagination[pageSize]", "1".to_string()),
        ];

        let body = self
            .send_json(self.request(Method::GET, "/api/products").query(&query))
            .await?;

        Ok(Self::entries(&body)?
            .iter()
            .find_map(|entry| parse_product(entry, &key.business_id)))
    }

    async fn create_product(&self, draft: &ProductDraft) -> StoreResult<String> {
        let body = self
            .send_json(
                self.request(Method::POST, "/api/products")
                    .json(&product_body(draft)),
            )
            .await?;
        Self::created_id(&body)
    }

    async fn update_product(&self, id: &str, draft: &ProductDraft) -> StoreResult<()> {
        self.send(
            self.request(Method::PUT, &format!("/api/products/{}", id))
                .json(&update_body(draft)),
        )
        .await?;
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> StoreResult<()> {
        match self
            .send(self.request(Method::DELETE, &format!("/api/products/{}", id)))
            .await
        {
            Err(StoreError::Status { status: 404, .. }) => Err(StoreError::NotFound { id: id.to_string() }),
            other => other.map(|_| ()),
        }
    }

    async fn ensure_category(&self, name: &str) -> StoreResult<String> {
        let query = [("filters[name][$eqi]", name)];
        let body = self
            .send_json(self.request(Method::GET, "/api/categories").query(&query))
            .await?;
        if let Some(id) = Self::entries(&body)?.iter().find_map(record_id) {
            return Ok(id);
        }

        let body = self
            .send_json(
                self.request(Method::POST, "/api/categories")
                    .json(&json!({ "data": { "name": name } })),
            )
            .await?;
        Self::created_id(&body)
    }

    fn name(&self) -> &str {
        "strapi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v4_source() {
        let entry = flatten(&json!({
            "id": 7,
            "attributes": {
                "baseUrl": "https://joes.example.com",
                "entryPaths": ["/menu", "/specials"],
                "mode": "rules_css",
                "rules": {"list": ".item", "title": ".name", "price": ".price@data-p"},
                "headers": {"Cookie": "age=21"},
                "ingestStatus": "active",
                "business": {"data": {"id": 3, "attributes": {"name": "Joe's", "primaryCategory": "BBQ"}}}
            }
        }));

        let source = parse_source(&entry).unwrap();
        assert_eq!(source.id, "7");
        assert_eq!(source.entry_paths, vec!["/menu", "/specials"]);
        assert_eq!(source.mode, ExtractionMode::RuleBased);
        assert!(source.rules.as_ref().unwrap().has_list());
        assert_eq!(source.headers.get("Cookie").map(String::as_str), Some("age=21"));
        assert_eq!(source.business_id.as_deref(), Some("3"));
        assert_eq!(source.business_category.as_deref(), Some("BBQ"));
    }

    #[test]
    fn test_parse_v5_source_without_business() {
        let entry = flatten(&json!({
            "id": 9,
            "documentId": "abc",
            "baseUrl": "https://x.example.com",
            "mode": "jsonld",
            "business": null
        }));

        let source = parse_source(&entry).unwrap();
        assert_eq!(source.mode, ExtractionMode::StructuredOnly);
        assert!(source.business_id.is_none());
        assert!(source.entry_paths.is_empty());
    }

    #[test]
    fn test_parse_product_prefers_document_id() {
        let entry = json!({
            "id": 12,
            "documentId": "doc-12",
            "title": "Brisket Plate",
            "sourceUrl": "https://joes.example.com/menu",
            "price": "14.50",
            "autoImported": true,
            "overrideLock": null
        });

        let product = parse_product(&entry, "biz").unwrap();
        assert_eq!(product.id, "doc-12");
        assert_eq!(product.business_id, "biz");
        assert_eq!(product.price, Some(14.5));
        assert!(product.auto_imported);
        assert!(!product.override_lock);
    }

    #[test]
    fn test_product_body_shape() {
        let draft = ProductDraft {
            business_id: "42".into(),
            title: "Ribs".into(),
            description: None,
            price: Some(21.0),
            currency: "USD".into(),
            image_url: None,
            product_url: Some("https://e.com/ribs".into()),
            source_url: "https://e.com/menu".into(),
            primary_category: "Food".into(),
            secondary_category_ids: vec!["c1".into()],
            auto_imported: true,
            snapshot: json!({"provenance": "structured"}),
        };

        let body = product_body(&draft);
        assert_eq!(body["data"]["business"], json!(42));
        assert_eq!(body["data"]["autoImported"], json!(true));
        assert_eq!(body["data"]["sourceSnapshot"]["provenance"], "structured");
        assert_eq!(body["data"]["secondaryCategories"], json!(["c1"]));

        let update = update_body(&draft);
        assert!(update["data"].get("autoImported").is_none());
        assert_eq!(update["data"]["title"], "Ribs");
    }

    #[test]
    fn test_business_filter_key() {
        assert_eq!(business_filter("12").0, "filters[business][id][$eq]");
        assert_eq!(business_filter("k2j3").0, "filters[business][documentId][$eq]");
    }

    #[test]
    fn test_entries_rejects_non_array() {
        assert!(StrapiStore::entries(&json!({"data": {"id": 1}})).is_err());
        assert!(StrapiStore::entries(&json!({"meta": {}})).unwrap().is_empty());
    }
}
