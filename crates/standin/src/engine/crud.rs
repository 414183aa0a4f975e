//! Per-verb CRUD semantics against a named collection.
//!
//! Each handler is a pure function of the request bundle apart from the
//! mutations it performs on its collection. Policy outcomes (conflict,
//! id mismatch, missing item) are ordinary response values, never errors;
//! only genuinely unexpected failures propagate for the dispatcher's 500
//! safety net.

use hyper::header::LOCATION;
use hyper::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::engine::types::{EngineError, GenIdHook, RequestInfo, ResponseDescriptor};
use crate::query::apply_query;
use crate::store;

/// GET: by id, by query, or the whole collection.
pub(crate) fn get(
    info: &RequestInfo,
    collection: &[Value],
    config: &Config,
) -> Result<ResponseDescriptor, EngineError> {
    if let Some(id) = &info.id {
        return Ok(match find(collection, id.to_value()) {
            Some(ix) => ok_body(info, bodify(collection[ix].clone(), config)),
            None => ResponseDescriptor::error(
                StatusCode::NOT_FOUND,
                &info.url,
                format!("'{}' with id='{id}' not found", info.collection_name),
            ),
        });
    }
    if !info.query.is_empty() {
        let rows = apply_query(collection, &info.query, config.case_sensitive_search)?;
        if rows.is_empty() {
            return Ok(ResponseDescriptor::error(
                StatusCode::NOT_FOUND,
                &info.url,
                format!("no '{}' items matched the query", info.collection_name),
            ));
        }
        let body = Value::Array(rows.into_iter().cloned().collect());
        return Ok(ok_body(info, bodify(body, config)));
    }
    Ok(ok_body(info, bodify(Value::Array(collection.to_vec()), config)))
}

/// POST: create, or replace/conflict when the id already exists.
pub(crate) fn post(
    info: &RequestInfo,
    collection: &mut Vec<Value>,
    config: &Config,
    gen_id: Option<&GenIdHook>,
) -> Result<ResponseDescriptor, EngineError> {
    let mut item = info.body.clone().unwrap_or_else(|| Value::Object(Default::default()));

    let body_id = item.get("id").filter(|v| !v.is_null()).cloned();
    let id = match body_id {
        Some(body_id) => {
            if let Some(url_id) = &info.id {
                if !url_id.matches(&body_id) {
                    return Ok(ResponseDescriptor::error(
                        StatusCode::BAD_REQUEST,
                        &info.url,
                        format!("Request id does not match item.id in '{}'", info.collection_name),
                    ));
                }
            }
            body_id
        }
        None => match &info.id {
            Some(url_id) => url_id.to_value(),
            None => match store::next_id(collection, &info.collection_name, gen_id) {
                Ok(id) => id,
                Err(EngineError::NonNumericId(_)) => {
                    // Expected at this call site: the client asked for an id
                    // the collection cannot generate.
                    return Ok(ResponseDescriptor::error(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        &info.url,
                        format!(
                            "Failed to generate new id for '{}': id type is non-numeric",
                            info.collection_name
                        ),
                    ));
                }
                Err(e) => return Err(e),
            },
        },
    };

    if let Some(map) = item.as_object_mut() {
        map.insert("id".to_string(), id.clone());
    }

    match find(collection, id.clone()) {
        None => {
            collection.push(item.clone());
            debug!("created '{}' item id={}", info.collection_name, id);
            let mut resp = ResponseDescriptor::new(StatusCode::CREATED, &info.url)
                .with_body(bodify(item, config));
            let location = format!("{}/{}", info.resource_url, value_display(&id));
            if let Ok(value) = location.parse() {
                resp.headers.insert(LOCATION, value);
            }
            Ok(resp)
        }
        Some(_) if config.post_409 => {
            Ok(ResponseDescriptor::error(
                StatusCode::CONFLICT,
                &info.url,
                format!(
                    "'{}' item with id='{}' exists and may not be updated with POST; use PUT instead.",
                    info.collection_name,
                    value_display(&id)
                ),
            ))
        }
        Some(ix) => {
            collection[ix] = item.clone();
            Ok(if config.post_204 {
                ResponseDescriptor::new(StatusCode::NO_CONTENT, &info.url)
            } else {
                ok_body(info, bodify(item, config))
            })
        }
    }
}

/// PUT: replace by id, or create/refuse per the `put404` policy.
pub(crate) fn put(
    info: &RequestInfo,
    collection: &mut Vec<Value>,
    config: &Config,
) -> ResponseDescriptor {
    let item = info.body.clone().unwrap_or_else(|| Value::Object(Default::default()));

    let Some(id) = item.get("id").filter(|v| !v.is_null()).cloned() else {
        return ResponseDescriptor::error(
            StatusCode::NOT_FOUND,
            &info.url,
            format!("Missing '{}' id", info.collection_name),
        );
    };
    if let Some(url_id) = &info.id {
        if !url_id.matches(&id) {
            return ResponseDescriptor::error(
                StatusCode::BAD_REQUEST,
                &info.url,
                format!(
                    "Request for '{}' id does not match item.id",
                    info.collection_name
                ),
            );
        }
    }

    match find(collection, id.clone()) {
        Some(ix) => {
            collection[ix] = item.clone();
            if config.put_204 {
                ResponseDescriptor::new(StatusCode::NO_CONTENT, &info.url)
            } else {
                ok_body(info, bodify(item, config))
            }
        }
        None if config.put_404 => ResponseDescriptor::error(
            StatusCode::NOT_FOUND,
            &info.url,
            format!(
                "'{}' item with id='{}' not found and may not be created with PUT; use POST instead.",
                info.collection_name,
                value_display(&id)
            ),
        ),
        None => {
            collection.push(item.clone());
            debug!("created '{}' item id={} via PUT", info.collection_name, value_display(&id));
            ResponseDescriptor::new(StatusCode::CREATED, &info.url).with_body(bodify(item, config))
        }
    }
}

/// DELETE: remove by id; a missing item is fine unless `delete404` says not.
pub(crate) fn delete(
    info: &RequestInfo,
    collection: &mut Vec<Value>,
    config: &Config,
) -> ResponseDescriptor {
    let Some(id) = &info.id else {
        return ResponseDescriptor::error(
            StatusCode::NOT_FOUND,
            &info.url,
            format!("Missing '{}' id", info.collection_name),
        );
    };

    let before = collection.len();
    collection.retain(|row| !id.matches(row.get("id").unwrap_or(&Value::Null)));
    let removed = collection.len() != before;

    if removed || !config.delete_404 {
        ResponseDescriptor::new(StatusCode::NO_CONTENT, &info.url)
    } else {
        ResponseDescriptor::error(
            StatusCode::NOT_FOUND,
            &info.url,
            format!("'{}' item with id='{id}' not found", info.collection_name),
        )
    }
}

/// Position of the item whose `id` field equals `id`.
fn find(collection: &[Value], id: Value) -> Option<usize> {
    collection.iter().position(|row| row.get("id") == Some(&id))
}

/// Wrap a response body per the `dataEncapsulation` policy.
fn bodify(body: Value, config: &Config) -> Value {
    if config.data_encapsulation {
        serde_json::json!({ "data": body })
    } else {
        body
    }
}

fn ok_body(info: &RequestInfo, body: Value) -> ResponseDescriptor {
    ResponseDescriptor::new(StatusCode::OK, &info.url).with_body(body)
}

/// Id rendering for messages and Location headers: bare string content for
/// text ids, JSON rendering otherwise.
fn value_display(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::ItemId;
    use hyper::{HeaderMap, Method};
    use serde_json::json;

    fn info(method: Method, id: Option<ItemId>, body: Option<Value>) -> RequestInfo {
        RequestInfo {
            method,
            url: "api/widgets".to_string(),
            api_base: "api/".to_string(),
            collection_name: "widgets".to_string(),
            id,
            query: Default::default(),
            resource_url: "api/widgets/".to_string(),
            headers: HeaderMap::new(),
            body,
        }
    }

    fn widgets() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "wrench"}),
            json!({"id": 2, "name": "hammer"}),
        ]
    }

    #[test]
    fn test_get_by_id() {
        let config = Config::default();
        let resp = get(
            &info(Method::GET, Some(ItemId::Number(2)), None),
            &widgets(),
            &config,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, Some(json!({"id": 2, "name": "hammer"})));
    }

    #[test]
    fn test_get_missing_id_is_404() {
        let config = Config::default();
        let resp = get(
            &info(Method::GET, Some(ItemId::Number(9)), None),
            &widgets(),
            &config,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.status_text, "Not Found");
    }

    #[test]
    fn test_get_whole_collection() {
        let config = Config::default();
        let resp = get(&info(Method::GET, None, None), &widgets(), &config).unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body.unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_get_with_data_encapsulation() {
        let config = Config {
            data_encapsulation: true,
            ..Config::default()
        };
        let resp = get(
            &info(Method::GET, Some(ItemId::Number(1)), None),
            &widgets(),
            &config,
        )
        .unwrap();
        assert_eq!(resp.body, Some(json!({"data": {"id": 1, "name": "wrench"}})));
    }

    #[test]
    fn test_get_empty_query_result_is_404() {
        let config = Config::default();
        let mut req = info(Method::GET, None, None);
        req.query = [("name".to_string(), vec!["^z".to_string()])].into();
        let resp = get(&req, &widgets(), &config).unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_post_without_id_generates_fresh_id() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = post(
            &info(Method::POST, None, Some(json!({"name": "saw"}))),
            &mut rows,
            &config,
            None,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(resp.body, Some(json!({"name": "saw", "id": 3})));
        assert_eq!(
            resp.headers.get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("api/widgets//3")
        );
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_post_on_empty_collection_starts_at_one() {
        let config = Config::default();
        let mut rows = Vec::new();
        let resp = post(
            &info(Method::POST, None, Some(json!({"name": "x"}))),
            &mut rows,
            &config,
            None,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(resp.body, Some(json!({"name": "x", "id": 1})));
    }

    #[test]
    fn test_post_non_numeric_ids_is_422() {
        let config = Config::default();
        let mut rows = vec![json!({"id": "a1"})];
        let resp = post(
            &info(Method::POST, None, Some(json!({"name": "x"}))),
            &mut rows,
            &config,
            None,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_post_id_mismatch_is_400() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = post(
            &info(
                Method::POST,
                Some(ItemId::Number(1)),
                Some(json!({"id": 2, "name": "x"})),
            ),
            &mut rows,
            &config,
            None,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_post_existing_id_default_replaces_with_204() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = post(
            &info(Method::POST, None, Some(json!({"id": 1, "name": "spanner"}))),
            &mut rows,
            &config,
            None,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert!(resp.body.is_none());
        assert_eq!(rows[0], json!({"id": 1, "name": "spanner"}));
    }

    #[test]
    fn test_post_existing_id_with_post409_conflicts() {
        let config = Config {
            post_409: true,
            ..Config::default()
        };
        let mut rows = widgets();
        let resp = post(
            &info(Method::POST, None, Some(json!({"id": 1, "name": "spanner"}))),
            &mut rows,
            &config,
            None,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::CONFLICT);
        assert_eq!(rows[0]["name"], json!("wrench"));
    }

    #[test]
    fn test_post_existing_id_without_post204_returns_body() {
        let config = Config {
            post_204: false,
            ..Config::default()
        };
        let mut rows = widgets();
        let resp = post(
            &info(Method::POST, None, Some(json!({"id": 1, "name": "spanner"}))),
            &mut rows,
            &config,
            None,
        )
        .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, Some(json!({"id": 1, "name": "spanner"})));
    }

    #[test]
    fn test_put_missing_body_id_is_404() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = put(
            &info(Method::PUT, Some(ItemId::Number(1)), Some(json!({"name": "x"}))),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_put_replaces_in_place_with_204() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = put(
            &info(
                Method::PUT,
                Some(ItemId::Number(2)),
                Some(json!({"id": 2, "name": "mallet"})),
            ),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert_eq!(rows[1], json!({"id": 2, "name": "mallet"}));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_put_is_idempotent() {
        let config = Config::default();
        let mut rows = widgets();
        let req = info(
            Method::PUT,
            Some(ItemId::Number(2)),
            Some(json!({"id": 2, "name": "mallet"})),
        );
        put(&req, &mut rows, &config);
        let once = rows.clone();
        put(&req, &mut rows, &config);
        assert_eq!(rows, once);
    }

    #[test]
    fn test_put_missing_item_creates_by_default() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = put(
            &info(
                Method::PUT,
                Some(ItemId::Number(5)),
                Some(json!({"id": 5, "name": "file"})),
            ),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_put_missing_item_with_put404_refuses() {
        let config = Config {
            put_404: true,
            ..Config::default()
        };
        let mut rows = widgets();
        let resp = put(
            &info(
                Method::PUT,
                Some(ItemId::Number(5)),
                Some(json!({"id": 5, "name": "file"})),
            ),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_put_id_mismatch_is_400() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = put(
            &info(
                Method::PUT,
                Some(ItemId::Number(1)),
                Some(json!({"id": 2, "name": "x"})),
            ),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_delete_removes_item() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = delete(
            &info(Method::DELETE, Some(ItemId::Number(1)), None),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_delete_missing_id_is_404() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = delete(&info(Method::DELETE, None, None), &mut rows, &config);
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_delete_absent_item_defaults_to_204() {
        let config = Config::default();
        let mut rows = widgets();
        let resp = delete(
            &info(Method::DELETE, Some(ItemId::Number(9)), None),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_delete_absent_item_with_delete404() {
        let config = Config {
            delete_404: true,
            ..Config::default()
        };
        let mut rows = widgets();
        let resp = delete(
            &info(Method::DELETE, Some(ItemId::Number(9)), None),
            &mut rows,
            &config,
        );
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }
}
