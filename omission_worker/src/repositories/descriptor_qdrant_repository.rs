use std::collections::HashMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::helper::error_chain_fmt;
use qdrant_client::{
    prelude::QdrantClient,
    qdrant::{
        self, condition::ConditionOneOf, point_id::PointIdOptions,
        points_selector::PointsSelectorOneOf, r#match::MatchValue, value::Kind,
        vectors_config::Config, with_payload_selector::SelectorOptions, Condition,
        CreateCollection, Distance, FieldCondition, Filter, ListValue, Match, PointId, PointStruct,
        PointsIdsList, PointsSelector, ScrollPoints, SearchPoints, Struct, VectorParams,
        VectorsConfig, WithPayloadSelector,
    },
};
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::entities::descriptor::{DescriptorPayload, Embeddings, QueryMatch},
    ports::descriptor_storage::{DescriptorStorage, DescriptorStorageError},
};

/// Label marking image descriptors; their payload carries the raw bytes.
pub const IMAGE_LABEL: &str = "image";

const IMAGE_BYTES_KEY: &str = "image_b64";

/// Repository for page descriptors persisted in Qdrant.
///
/// Qdrant point ids must be integers or UUIDs, while descriptor ids are
/// free-form strings (`page_4`, `img_2`): the point id is the UUIDv5 of the
/// descriptor id, which also makes ingestion an idempotent upsert-by-id. The
/// original id stays in the payload.
///
/// The active collection must be declared with `set_collection` before any
/// ingest or query call; every operation is one synchronous remote call with
/// no retry or backoff.
pub struct DescriptorQdrantRepository {
    client: QdrantClient,
    collection_name: Option<String>,
    collection_dimensions: u64,
}

impl DescriptorQdrantRepository {
    pub fn new(client: QdrantClient) -> Self {
        Self {
            client,
            collection_name: None,
            collection_dimensions: 0,
        }
    }

    fn collection(&self) -> Result<&str, DescriptorStorageError> {
        self.collection_name
            .as_deref()
            .ok_or(DescriptorStorageError::CollectionNotSet)
    }

    /// Upserts one `image`-labeled descriptor carrying the raw bytes in its
    /// payload. Without an embedding the point gets a zero vector, which the
    /// L2 metric ranks last for any realistic query.
    async fn upsert_image(
        &self,
        id: &str,
        bytes: Vec<u8>,
        embedding: Option<Embeddings>,
        mut payload: DescriptorPayload,
    ) -> Result<(), DescriptorStorageError> {
        let collection_name = self.collection()?.to_string();

        let vector =
            embedding.unwrap_or_else(|| vec![0.0; self.collection_dimensions as usize]);

        payload.insert("id".into(), JsonValue::from(id));
        payload.insert("label".into(), JsonValue::from(IMAGE_LABEL));
        payload.insert(IMAGE_BYTES_KEY.into(), JsonValue::from(BASE64.encode(bytes)));

        let point = PointStruct {
            id: Some(point_id_for(id)),
            vectors: Some(vector.into()),
            payload: to_store_payload(payload),
        };

        self.client
            .upsert_points(&collection_name, vec![point], None)
            .await
            .map_err(|e| DescriptorStorageError::StoreError(e.to_string()))?;

        info!(id, "Saved image descriptor");
        Ok(())
    }
}

#[async_trait]
impl DescriptorStorage for DescriptorQdrantRepository {
    #[tracing::instrument(name = "Declaring the descriptor collection", skip(self))]
    async fn set_collection(
        &mut self,
        name: &str,
        dimensions: u64,
    ) -> Result<(), DescriptorStorageError> {
        // Not idempotent on the remote side: an "already exists" answer is
        // the expected signal on every run after the first
        match self
            .client
            .create_collection(&CreateCollection {
                collection_name: name.to_string(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: dimensions,
                        distance: Distance::Euclid as i32,
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
        {
            Ok(_) => info!(name, dimensions, "Created descriptor collection"),
            Err(error) => {
                // Qdrant client only returns anyhow errors for now
                if !error.to_string().contains("already exists") {
                    return Err(DescriptorStorageError::StoreError(error.to_string()));
                }
                info!(name, "Descriptor collection already exists");
            }
        };

        self.collection_name = Some(name.to_string());
        self.collection_dimensions = dimensions;
        Ok(())
    }

    #[tracing::instrument(name = "Saving descriptors to Qdrant", skip(self, vectors, payloads))]
    async fn ingest_embeddings(
        &self,
        vectors: Vec<Embeddings>,
        ids: Vec<String>,
        payloads: Vec<DescriptorPayload>,
    ) -> Result<(), DescriptorStorageError> {
        let collection_name = self.collection()?.to_string();

        if ids.len() != vectors.len() || payloads.len() != vectors.len() {
            return Err(DescriptorStorageError::MismatchedBatch {
                vectors: vectors.len(),
                ids: ids.len(),
                payloads: payloads.len(),
            });
        }

        let points: Vec<PointStruct> = vectors
            .into_iter()
            .zip(ids)
            .zip(payloads)
            .map(|((vector, id), mut payload)| {
                if !payload.contains_key("label") {
                    payload.insert("label".into(), JsonValue::from("unknown"));
                }
                payload.insert("id".into(), JsonValue::from(id.as_str()));

                PointStruct {
                    id: Some(point_id_for(&id)),
                    vectors: Some(vector.into()),
                    payload: to_store_payload(payload),
                }
            })
            .collect();

        let nb_points = points.len();
        self.client
            .upsert_points(&collection_name, points, None)
            .await
            .map_err(|e| DescriptorStorageError::StoreError(e.to_string()))?;

        info!(nb_points, "Saved descriptors");
        Ok(())
    }

    #[tracing::instrument(name = "Querying nearest descriptors", skip(self, vector))]
    async fn query_embeddings(
        &self,
        vector: Embeddings,
        top_k: u64,
        include_images: bool,
    ) -> Result<Vec<QueryMatch>, DescriptorStorageError> {
        let collection_name = self.collection()?.to_string();

        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name,
                vector,
                limit: top_k,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| DescriptorStorageError::StoreError(e.to_string()))?;

        let matches = response
            .result
            .into_iter()
            .map(|scored| {
                let mut payload = from_store_payload(scored.payload);

                let id = payload
                    .get("id")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                let label = payload
                    .get("label")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("unknown")
                    .to_string();

                // The follow-up fetch for image hits: decode the stored
                // bytes only when the caller asked for them
                let image = if include_images && label == IMAGE_LABEL {
                    payload
                        .remove(IMAGE_BYTES_KEY)
                        .and_then(|value| value.as_str().map(str::to_string))
                        .and_then(|encoded| BASE64.decode(encoded).ok())
                } else {
                    payload.remove(IMAGE_BYTES_KEY);
                    None
                };

                QueryMatch {
                    id,
                    label,
                    score: scored.score,
                    payload,
                    image,
                }
            })
            .collect();

        Ok(matches)
    }

    async fn add_image(
        &self,
        id: &str,
        bytes: Vec<u8>,
        payload: DescriptorPayload,
    ) -> Result<(), DescriptorStorageError> {
        self.upsert_image(id, bytes, None, payload).await
    }

    async fn add_image_with_embedding(
        &self,
        id: &str,
        bytes: Vec<u8>,
        embedding: Embeddings,
        payload: DescriptorPayload,
    ) -> Result<(), DescriptorStorageError> {
        self.upsert_image(id, bytes, Some(embedding), payload).await
    }

    #[tracing::instrument(name = "Fetching a stored image", skip(self))]
    async fn find_image(&self, id: &str) -> Result<Option<Vec<u8>>, DescriptorStorageError> {
        let collection_name = self.collection()?.to_string();

        let response = self
            .client
            .scroll(&ScrollPoints {
                collection_name,
                filter: Some(Filter {
                    must: vec![match_condition("id", id)],
                    ..Default::default()
                }),
                limit: Some(1),
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| DescriptorStorageError::StoreError(e.to_string()))?;

        let bytes = response.result.into_iter().next().and_then(|point| {
            from_store_payload(point.payload)
                .remove(IMAGE_BYTES_KEY)
                .and_then(|value| value.as_str().map(str::to_string))
                .and_then(|encoded| BASE64.decode(encoded).ok())
        });

        Ok(bytes)
    }

    #[tracing::instrument(name = "Deleting descriptors", skip(self))]
    async fn delete_descriptors(
        &self,
        ids: &[String],
        confirm: bool,
    ) -> Result<(), DescriptorStorageError> {
        if !confirm {
            return Err(DescriptorStorageError::MissingConfirmation(format!(
                "{} descriptors",
                ids.len()
            )));
        }
        let collection_name = self.collection()?.to_string();

        let selector = PointsSelector {
            points_selector_one_of: Some(PointsSelectorOneOf::Points(PointsIdsList {
                ids: ids.iter().map(|id| point_id_for(id)).collect(),
            })),
        };

        self.client
            .delete_points(&collection_name, &selector, None)
            .await
            .map_err(|e| DescriptorStorageError::StoreError(e.to_string()))?;

        info!(nb_ids = ids.len(), "Deleted descriptors");
        Ok(())
    }

    #[tracing::instrument(name = "Deleting the descriptor collection", skip(self))]
    async fn delete_descriptor_set(&self, confirm: bool) -> Result<(), DescriptorStorageError> {
        if !confirm {
            return Err(DescriptorStorageError::MissingConfirmation(
                "the whole descriptor set".into(),
            ));
        }
        let collection_name = self.collection()?.to_string();

        self.client
            .delete_collection(&collection_name)
            .await
            .map_err(|e| DescriptorStorageError::StoreError(e.to_string()))?;

        info!(%collection_name, "Deleted descriptor collection");
        Ok(())
    }
}

/// Deterministic point id for a descriptor id: same id, same point.
fn point_id_for(id: &str) -> PointId {
    PointId {
        point_id_options: Some(PointIdOptions::Uuid(
            Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string(),
        )),
    }
}

fn match_condition(field: &str, keyword: &str) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: field.to_string(),
            r#match: Some(Match {
                match_value: Some(MatchValue::Keyword(keyword.to_string())),
            }),
            ..Default::default()
        })),
    }
}

fn to_store_payload(payload: DescriptorPayload) -> HashMap<String, qdrant::Value> {
    payload
        .into_iter()
        .map(|(key, value)| (key, to_store_value(value)))
        .collect()
}

fn to_store_value(value: JsonValue) -> qdrant::Value {
    let kind = match value {
        JsonValue::Null => Kind::NullValue(0),
        JsonValue::Bool(flag) => Kind::BoolValue(flag),
        JsonValue::Number(number) => match number.as_i64() {
            Some(integer) => Kind::IntegerValue(integer),
            None => Kind::DoubleValue(number.as_f64().unwrap_or(0.0)),
        },
        JsonValue::String(text) => Kind::StringValue(text),
        JsonValue::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(to_store_value).collect(),
        }),
        JsonValue::Object(fields) => Kind::StructValue(Struct {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key, to_store_value(value)))
                .collect(),
        }),
    };

    qdrant::Value { kind: Some(kind) }
}

fn from_store_payload(payload: HashMap<String, qdrant::Value>) -> DescriptorPayload {
    payload
        .into_iter()
        .map(|(key, value)| (key, from_store_value(value)))
        .collect()
}

fn from_store_value(value: qdrant::Value) -> JsonValue {
    match value.kind {
        Some(Kind::BoolValue(flag)) => JsonValue::from(flag),
        Some(Kind::IntegerValue(integer)) => JsonValue::from(integer),
        Some(Kind::DoubleValue(double)) => JsonValue::from(double),
        Some(Kind::StringValue(text)) => JsonValue::from(text),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(from_store_value).collect())
        }
        Some(Kind::StructValue(fields)) => JsonValue::Object(
            fields
                .fields
                .into_iter()
                .map(|(key, value)| (key, from_store_value(value)))
                .collect(),
        ),
        Some(Kind::NullValue(_)) | None => JsonValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_deterministic_per_descriptor_id() {
        assert_eq!(point_id_for("page_4"), point_id_for("page_4"));
        assert_ne!(point_id_for("page_4"), point_id_for("page_5"));
    }

    #[test]
    fn payloads_round_trip_through_the_store_representation() {
        let payload: DescriptorPayload = [
            ("text".to_string(), JsonValue::from("some page text")),
            ("page_number".to_string(), JsonValue::from(4)),
            (
                "tags".to_string(),
                JsonValue::from(vec!["safety", "label"]),
            ),
        ]
        .into_iter()
        .collect();

        let round_tripped = from_store_payload(to_store_payload(payload.clone()));

        assert_eq!(round_tripped, payload);
    }
}
