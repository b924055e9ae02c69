use log::debug;
use roxmltree::Document;
use serde::Deserialize;

use super::client::DynamicsClient;
use super::error::DynamicsError;
use super::request::RequestContext;

/// Addressing information for one entity from `EntityDefinitions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityDefinition {
    #[serde(default)]
    pub metadata_id: Option<String>,
    pub logical_name: String,
    pub entity_set_name: String,
}

/// An `EntityType` element from the EDMX `$metadata` document
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTypeMetadata {
    pub name: String,
    pub key: Option<String>,
    pub properties: Vec<PropertyMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMetadata {
    pub name: String,
    pub edm_type: String,
}

impl EntityTypeMetadata {
    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Parse every `EntityType` with its key and scalar properties
pub fn parse_metadata_xml(metadata_xml: &str) -> Result<Vec<EntityTypeMetadata>, DynamicsError> {
    let doc = Document::parse(metadata_xml).map_err(|e| {
        DynamicsError::Unclassified(format!("Failed to parse metadata XML: {}", e))
    })?;

    let mut entities = Vec::new();

    for entity_type in doc.descendants().filter(|n| n.has_tag_name("EntityType")) {
        let Some(name) = entity_type.attribute("Name") else {
            continue;
        };

        // <Key><PropertyRef Name="accountid"/></Key>
        let key = entity_type
            .children()
            .filter(|n| n.has_tag_name("Key"))
            .flat_map(|k| k.children())
            .find(|n| n.has_tag_name("PropertyRef"))
            .and_then(|n| n.attribute("Name"))
            .map(|s| s.to_string());

        let properties: Vec<PropertyMetadata> = entity_type
            .children()
            .filter(|n| n.has_tag_name("Property"))
            .filter_map(|property| {
                let name = property.attribute("Name")?;
                Some(PropertyMetadata {
                    name: name.to_string(),
                    edm_type: property.attribute("Type").unwrap_or("unknown").to_string(),
                })
            })
            .collect();

        debug!(
            "Found EntityType {} (key: {:?}, {} properties)",
            name,
            key,
            properties.len()
        );

        entities.push(EntityTypeMetadata {
            name: name.to_string(),
            key,
            properties,
        });
    }

    Ok(entities)
}

impl DynamicsClient {
    /// Resolve a logical entity name to its definition
    pub async fn entity_definition(&self, logical_name: &str) -> Result<EntityDefinition, DynamicsError> {
        let endpoint = format!(
            "EntityDefinitions(LogicalName='{}')",
            logical_name.replace('\'', "''")
        );
        let request = RequestContext::get(endpoint).with_params(vec![(
            "$select".to_string(),
            "MetadataId,LogicalName,EntitySetName".to_string(),
        )]);

        let body = self.get(&request).await?;
        serde_json::from_value(body).map_err(|e| {
            DynamicsError::Unclassified(format!(
                "Unexpected EntityDefinitions response for '{}': {}",
                logical_name, e
            ))
        })
    }

    /// Fetch and parse the service `$metadata` document
    pub async fn entity_types(&self) -> Result<Vec<EntityTypeMetadata>, DynamicsError> {
        let body = self.get(&RequestContext::get("$metadata")).await?;
        let xml = body.as_str().ok_or_else(|| {
            DynamicsError::Unclassified("$metadata response was not an XML document".to_string())
        })?;

        parse_metadata_xml(xml)
    }
}
