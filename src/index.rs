//! Vector-index adapter — typed operations over a Qdrant collection.
//!
//! All memories live in a single cosine collection named `memories`, whose
//! vector width is fixed by the first insert. Reads against an absent
//! collection degrade to none/empty/zero instead of failing, so a fresh
//! deployment behaves like an empty memory. Payloads cross this boundary as
//! [`serde_json::Map`]; the conversion to and from Qdrant's tagged value kinds
//! lives at the bottom of this module.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::condition::ConditionOneOf;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::r#match::MatchValue;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DatetimeRange, DeletePointsBuilder,
    Distance, FieldCondition, Filter, GetPointsBuilder, ListValue, Match, PointId, PointStruct,
    PointsIdsList, QueryPointsBuilder, ScrollPointsBuilder, SetPayloadPointsBuilder, Struct,
    Timestamp, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Map;

/// Name of the collection holding all memories.
pub const COLLECTION: &str = "memories";

/// Throwaway collection used by the connectivity check.
const CHECK_COLLECTION: &str = "clawbrain_check";

/// Page size for filtered scrolls. Decay candidate sets can be large.
const SCROLL_PAGE: u32 = 100;

/// One stored point: identity, similarity score, and metadata payload.
#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, serde_json::Value>,
}

/// Handle on the Qdrant collection. Owned by a single invocation.
pub struct Index {
    client: Qdrant,
    collection: String,
}

impl Index {
    /// Connect to Qdrant. The timeout applies to every call made through
    /// this handle.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .timeout(timeout)
            .build()
            .with_context(|| format!("connect to qdrant at {url}"))?;
        Ok(Self {
            client,
            collection: COLLECTION.to_string(),
        })
    }

    /// Whether the memories collection exists yet.
    pub async fn exists(&self) -> Result<bool> {
        self.client
            .collection_exists(&self.collection)
            .await
            .context("check collection")
    }

    /// Create the collection with the given vector width if it is absent.
    /// Idempotent; the width is fixed for the life of the collection.
    pub async fn ensure_collection(&self, width: u64) -> Result<()> {
        if self.exists().await? {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(width, Distance::Cosine)),
            )
            .await
            .context("create collection")?;
        Ok(())
    }

    /// Replace-or-insert a point. Any existing payload at that id is
    /// discarded wholesale.
    pub async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        payload: Map<String, serde_json::Value>,
    ) -> Result<()> {
        let point = PointStruct::new(id.to_string(), vector, map_to_payload(payload));
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .context("upsert")?;
        Ok(())
    }

    /// Fetch a single point by id. `None` when the point or the whole
    /// collection is absent.
    pub async fn get(&self, id: &str) -> Result<Option<Point>> {
        if !self.exists().await? {
            return Ok(None);
        }
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![id.to_string().into()])
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .context("get point")?;
        Ok(response.result.into_iter().next().map(|point| Point {
            id: point_id_to_string(point.id.as_ref()),
            score: 0.0,
            payload: payload_to_map(point.payload),
        }))
    }

    /// Similarity query: up to `limit` points with cosine similarity at or
    /// above `min_score`, score-descending. Empty when the collection is
    /// absent.
    pub async fn query(&self, vector: Vec<f32>, min_score: f32, limit: u64) -> Result<Vec<Point>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .query(
                QueryPointsBuilder::new(&self.collection)
                    .query(vector)
                    .score_threshold(min_score)
                    .limit(limit)
                    .with_payload(true),
            )
            .await
            .context("query")?;
        Ok(response
            .result
            .into_iter()
            .map(|point| Point {
                id: point_id_to_string(point.id.as_ref()),
                score: point.score,
                payload: payload_to_map(point.payload),
            })
            .collect())
    }

    /// Filter for decay candidates: `last_accessed < cutoff` and not pinned.
    /// The cutoff is evaluated server-side against the stored RFC 3339
    /// timestamps, never against client state.
    pub fn stale_filter(cutoff: DateTime<Utc>) -> Filter {
        Filter {
            must: vec![datetime_before("last_accessed", cutoff)],
            must_not: vec![match_bool("pinned", true)],
            ..Default::default()
        }
    }

    /// Collect the ids of every point matching the filter, paging through
    /// the collection. Empty when the collection is absent.
    pub async fn scroll_ids(&self, filter: Filter) -> Result<Vec<String>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .filter(filter.clone())
                .limit(SCROLL_PAGE)
                .with_payload(false)
                .with_vectors(false);
            if let Some(from) = offset.take() {
                request = request.offset(from);
            }
            let response = self.client.scroll(request).await.context("scroll")?;
            for point in response.result {
                if let Some(id) = point.id {
                    ids.push(point_id_to_string(Some(&id)));
                }
            }
            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }

    /// Delete the listed points. Ids that do not exist are ignored.
    pub async fn delete(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<PointId> = ids.into_iter().map(PointId::from).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await
            .context("delete points")?;
        Ok(())
    }

    /// Merge a partial payload into a point, leaving the vector and all
    /// other payload fields untouched.
    pub async fn patch_payload(
        &self,
        id: &str,
        partial: Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.collection, map_to_payload(partial))
                    .points_selector(PointsIdsList {
                        ids: vec![id.to_string().into()],
                    })
                    .wait(true),
            )
            .await
            .context("set payload")?;
        Ok(())
    }

    /// Drop the whole collection. No-op when absent.
    pub async fn delete_collection(&self) -> Result<()> {
        if !self.exists().await? {
            return Ok(());
        }
        self.client
            .delete_collection(&self.collection)
            .await
            .context("delete collection")?;
        Ok(())
    }

    /// Approximate number of stored points. Zero when the collection is
    /// absent.
    pub async fn count(&self) -> Result<u64> {
        if !self.exists().await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection))
            .await
            .context("count")?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    /// End-to-end round trip against a throwaway collection: create with
    /// width 4, upsert a sentinel, query it back, drop the collection.
    pub async fn check(&self) -> Result<()> {
        // A crashed earlier run may have left the collection behind.
        if self
            .client
            .collection_exists(CHECK_COLLECTION)
            .await
            .context("check collection exists")?
        {
            self.client
                .delete_collection(CHECK_COLLECTION)
                .await
                .context("cleanup leftover check collection")?;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(CHECK_COLLECTION)
                    .vectors_config(VectorParamsBuilder::new(4, Distance::Cosine)),
            )
            .await
            .context("create check collection")?;

        let mut payload = Map::new();
        payload.insert("test".to_string(), serde_json::Value::Bool(true));
        let point = PointStruct::new(1u64, vec![0.1, 0.2, 0.3, 0.4], map_to_payload(payload));
        self.client
            .upsert_points(UpsertPointsBuilder::new(CHECK_COLLECTION, vec![point]).wait(true))
            .await
            .context("upsert check vector")?;

        let response = self
            .client
            .query(
                QueryPointsBuilder::new(CHECK_COLLECTION)
                    .query(vec![0.1, 0.2, 0.3, 0.4])
                    .with_payload(true),
            )
            .await
            .context("query check vector")?;
        ensure!(!response.result.is_empty(), "check query returned no results");

        self.client
            .delete_collection(CHECK_COLLECTION)
            .await
            .context("cleanup check collection")?;
        Ok(())
    }
}

/// `field < cutoff` as a server-side datetime range condition.
fn datetime_before(field: &str, cutoff: DateTime<Utc>) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: field.to_string(),
            datetime_range: Some(DatetimeRange {
                lt: Some(Timestamp {
                    seconds: cutoff.timestamp(),
                    nanos: cutoff.timestamp_subsec_nanos() as i32,
                }),
                ..Default::default()
            }),
            ..Default::default()
        })),
    }
}

/// `field = value` as an exact boolean match condition.
fn match_bool(field: &str, value: bool) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: field.to_string(),
            r#match: Some(Match {
                match_value: Some(MatchValue::Boolean(value)),
            }),
            ..Default::default()
        })),
    }
}

fn point_id_to_string(id: Option<&PointId>) -> String {
    match id.and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn map_to_payload(map: Map<String, serde_json::Value>) -> Payload {
    let fields: HashMap<String, Value> = map
        .into_iter()
        .map(|(key, value)| (key, json_to_value(value)))
        .collect();
    Payload::from(fields)
}

fn payload_to_map(payload: HashMap<String, Value>) -> Map<String, serde_json::Value> {
    payload
        .into_iter()
        .map(|(key, value)| (key, value_to_json(value)))
        .collect()
}

/// Convert a JSON value into Qdrant's tagged value type. The two type
/// systems admit the same variants, so the mapping is structural.
fn json_to_value(value: serde_json::Value) -> Value {
    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(flag) => Kind::BoolValue(flag),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(integer) => Kind::IntegerValue(integer),
            None => Kind::DoubleValue(number.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(text) => Kind::StringValue(text),
        serde_json::Value::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(json_to_value).collect(),
        }),
        serde_json::Value::Object(fields) => Kind::StructValue(Struct {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key, json_to_value(value)))
                .collect(),
        }),
    };
    Value { kind: Some(kind) }
}

/// Convert a Qdrant tagged value back into JSON.
fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(flag)) => serde_json::Value::Bool(flag),
        Some(Kind::IntegerValue(integer)) => serde_json::Value::from(integer),
        Some(Kind::DoubleValue(double)) => serde_json::Number::from_f64(double)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(text)) => serde_json::Value::String(text),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(fields)) => {
            let mut map = Map::new();
            for (key, value) in fields.fields {
                map.insert(key, value_to_json(value));
            }
            serde_json::Value::Object(map)
        }
    }
}
