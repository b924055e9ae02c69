//! Catalog discovery from entity metadata
//!
//! Only the configured entity becomes a stream. Its schema is derived from the
//! EDMX property types; entities with a `modifiedon` column replicate incrementally.

use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::{Map, Value, json};

use crate::api::DynamicsClient;
use crate::api::metadata::{EntityDefinition, EntityTypeMetadata};
use crate::sync::ENTITY_SET_METADATA;
use crate::sync::catalog::{Catalog, CatalogEntry, FULL_TABLE, INCREMENTAL, MetadataEntry};

pub const REPLICATION_KEY: &str = "modifiedon";

/// Entities the Web API lists but cannot be read as collections
pub const EXCLUDED_ENTITIES: &[&str] = &[
    "MetadataBase",
    "calendarrule",
    "complexcontrol",
    "dataperformance",
    "knowledgearticlescategories",
    "languageprovisioningstate",
    "managedproperty",
    "msdyn_nonrelationalds",
    "officegraphdocument",
    "optionset",
    "organizationdatasyncsubscription",
    "postregarding",
    "ribbonmetadatatoprocess",
    "runtimedependency",
    "similarityrule",
    "subscriptionmanuallytrackedobject",
    "subscriptionstatisticsoutlook",
    "subscriptionsyncentryoffline",
    "subscriptionsyncentryoutlook",
    "systemusersyncmappingprofiles",
    "teamsyncattributemappingprofiles",
    "timestampdatemapping",
    "lookupmapping",
    "msdyn_casesuggestion",
    "msdyn_knowledgearticlesuggestion",
];

/// Discover the catalog for `object`
pub async fn discover(client: &DynamicsClient, object: &str) -> Result<Catalog> {
    let definition = client
        .entity_definition(object)
        .await
        .with_context(|| format!("Failed to look up entity definition for '{}'", object))?;
    let entity_types = client
        .entity_types()
        .await
        .context("Failed to read service metadata")?;

    let catalog = build_catalog(&definition, &entity_types);
    info!("There are {} valid streams in MS Dynamics", catalog.streams.len());
    Ok(catalog)
}

/// Build catalog entries for the entity types matching `definition`
pub fn build_catalog(definition: &EntityDefinition, entity_types: &[EntityTypeMetadata]) -> Catalog {
    let streams = entity_types
        .iter()
        .filter(|entity| entity.name == definition.logical_name)
        .filter_map(|entity| build_entry(entity, &definition.entity_set_name))
        .collect();

    Catalog { streams }
}

fn build_entry(entity: &EntityTypeMetadata, entity_set: &str) -> Option<CatalogEntry> {
    let name = entity.name.as_str();

    if name.is_empty() || EXCLUDED_ENTITIES.contains(&name) {
        debug!("Skipping excluded entity {}", name);
        return None;
    }

    let schema = build_schema(entity);
    let properties = schema.get("properties").and_then(Value::as_object)?;
    if properties.is_empty() {
        debug!("Skipping {}: no properties", name);
        return None;
    }

    let key = entity.key.as_deref()?;
    if !properties.contains_key(key) {
        debug!("Skipping {}: key {} is not a property", name, key);
        return None;
    }

    let replication_key = entity
        .property(REPLICATION_KEY)
        .map(|_| REPLICATION_KEY.to_string());
    let replication_method = if replication_key.is_some() {
        INCREMENTAL
    } else {
        FULL_TABLE
    };

    let metadata = build_metadata(
        properties,
        key,
        replication_method,
        replication_key.as_deref(),
        entity_set,
    );

    Some(CatalogEntry {
        stream: name.to_string(),
        tap_stream_id: name.to_string(),
        schema,
        key_properties: vec![key.to_string()],
        replication_method: Some(replication_method.to_string()),
        replication_key,
        metadata,
    })
}

/// JSON schema for an entity's scalar properties
pub fn build_schema(entity: &EntityTypeMetadata) -> Value {
    let mut properties = Map::new();

    for property in &entity.properties {
        properties.insert(property.name.clone(), property_schema(&property.edm_type));
    }

    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": properties,
    })
}

fn property_schema(edm_type: &str) -> Value {
    let (json_type, format) = match edm_type {
        "Edm.DateTimeOffset" | "Edm.Date" => ("string", Some("date-time")),
        "Edm.Int32" | "Edm.Int64" => ("integer", None),
        "Edm.Decimal" | "Edm.Double" => ("number", None),
        "Edm.Boolean" => ("boolean", None),
        "Edm.Binary" | "mscrm.BooleanManagedProperty" => {
            return json!({
                "inclusion": "unsupported",
                "description": "Unsupported column type",
            });
        }
        // Edm.String, Edm.Guid and anything unrecognised
        _ => ("string", None),
    };

    let mut schema = json!({ "type": ["null", json_type] });
    if let Some(format) = format {
        schema["format"] = Value::from(format);
    }
    schema
}

fn build_metadata(
    properties: &Map<String, Value>,
    key: &str,
    replication_method: &str,
    replication_key: Option<&str>,
    entity_set: &str,
) -> Vec<MetadataEntry> {
    let mut stream = Map::new();
    stream.insert("table-key-properties".to_string(), json!([key]));
    stream.insert("forced-replication-method".to_string(), json!(replication_method));
    if let Some(replication_key) = replication_key {
        stream.insert("valid-replication-keys".to_string(), json!([replication_key]));
    }
    stream.insert("inclusion".to_string(), json!("available"));
    stream.insert(ENTITY_SET_METADATA.to_string(), json!(entity_set));

    let mut metadata = vec![MetadataEntry::stream(stream)];

    for (name, schema) in properties {
        let unsupported = schema.get("inclusion").and_then(Value::as_str) == Some("unsupported");
        let inclusion = if unsupported {
            "unsupported"
        } else if name == key || Some(name.as_str()) == replication_key {
            "automatic"
        } else {
            "available"
        };

        let mut property = Map::new();
        property.insert("inclusion".to_string(), json!(inclusion));
        metadata.push(MetadataEntry::property(name, property));
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::metadata::PropertyMetadata;

    fn entity(name: &str, key: Option<&str>, properties: &[(&str, &str)]) -> EntityTypeMetadata {
        EntityTypeMetadata {
            name: name.to_string(),
            key: key.map(|k| k.to_string()),
            properties: properties
                .iter()
                .map(|(n, t)| PropertyMetadata {
                    name: n.to_string(),
                    edm_type: t.to_string(),
                })
                .collect(),
        }
    }

    fn definition(logical_name: &str, entity_set: &str) -> EntityDefinition {
        EntityDefinition {
            metadata_id: None,
            logical_name: logical_name.to_string(),
            entity_set_name: entity_set.to_string(),
        }
    }

    fn account() -> EntityTypeMetadata {
        entity(
            "account",
            Some("accountid"),
            &[
                ("accountid", "Edm.Guid"),
                ("name", "Edm.String"),
                ("numberofemployees", "Edm.Int32"),
                ("revenue", "Edm.Decimal"),
                ("donotemail", "Edm.Boolean"),
                ("modifiedon", "Edm.DateTimeOffset"),
                ("entityimage", "Edm.Binary"),
                ("address1_geo", "mscrm.Geo"),
            ],
        )
    }

    #[test]
    fn test_type_mapping() {
        let schema = build_schema(&account());
        let props = &schema["properties"];

        assert_eq!(props["accountid"], json!({"type": ["null", "string"]}));
        assert_eq!(props["numberofemployees"], json!({"type": ["null", "integer"]}));
        assert_eq!(props["revenue"], json!({"type": ["null", "number"]}));
        assert_eq!(props["donotemail"], json!({"type": ["null", "boolean"]}));
        assert_eq!(
            props["modifiedon"],
            json!({"type": ["null", "string"], "format": "date-time"})
        );
        assert_eq!(props["entityimage"]["inclusion"], "unsupported");
        assert_eq!(props["address1_geo"], json!({"type": ["null", "string"]}));
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_incremental_entry() {
        let catalog = build_catalog(
            &definition("account", "accounts"),
            &[account(), entity("contact", Some("contactid"), &[("contactid", "Edm.Guid")])],
        );

        assert_eq!(catalog.streams.len(), 1);
        let entry = &catalog.streams[0];

        assert_eq!(entry.tap_stream_id, "account");
        assert_eq!(entry.key_properties, ["accountid"]);
        assert_eq!(entry.replication_method.as_deref(), Some(INCREMENTAL));
        assert_eq!(entry.replication_key.as_deref(), Some("modifiedon"));

        let stream = entry.stream_metadata().unwrap();
        assert_eq!(stream["entity-set-name"], "accounts");
        assert_eq!(stream["valid-replication-keys"], json!(["modifiedon"]));

        assert_eq!(entry.property_metadata("modifiedon").unwrap()["inclusion"], "automatic");
        assert_eq!(entry.property_metadata("accountid").unwrap()["inclusion"], "automatic");
        assert_eq!(entry.property_metadata("name").unwrap()["inclusion"], "available");
        assert_eq!(entry.property_metadata("entityimage").unwrap()["inclusion"], "unsupported");

        assert_eq!(
            entry.property_names(),
            [
                "accountid",
                "name",
                "numberofemployees",
                "revenue",
                "donotemail",
                "modifiedon",
                "entityimage",
                "address1_geo"
            ]
        );
        let property_crumbs: Vec<&str> = entry.metadata[1..]
            .iter()
            .map(|m| m.breadcrumb[1].as_str())
            .collect();
        assert_eq!(property_crumbs, entry.property_names());
    }

    #[test]
    fn test_full_table_without_modifiedon() {
        let note = entity(
            "annotation",
            Some("annotationid"),
            &[("annotationid", "Edm.Guid"), ("subject", "Edm.String")],
        );
        let catalog = build_catalog(&definition("annotation", "annotations"), &[note]);

        let entry = &catalog.streams[0];
        assert_eq!(entry.replication_method.as_deref(), Some(FULL_TABLE));
        assert_eq!(entry.replication_key, None);
        assert!(!entry.is_incremental());
    }

    #[test]
    fn test_skip_rules() {
        let excluded = entity("optionset", Some("optionsetid"), &[("optionsetid", "Edm.Guid")]);
        assert!(build_catalog(&definition("optionset", "optionsets"), &[excluded]).streams.is_empty());

        let empty = entity("widget", Some("widgetid"), &[]);
        assert!(build_catalog(&definition("widget", "widgets"), &[empty]).streams.is_empty());

        let keyless = entity("gadget", Some("gadgetid"), &[("name", "Edm.String")]);
        assert!(build_catalog(&definition("gadget", "gadgets"), &[keyless]).streams.is_empty());

        let no_key = entity("gizmo", None, &[("name", "Edm.String")]);
        assert!(build_catalog(&definition("gizmo", "gizmos"), &[no_key]).streams.is_empty());
    }
}
