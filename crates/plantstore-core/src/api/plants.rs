use anyhow::{Context, Result};
use reqwest::Method;

use crate::models::{Plant, PlantDraft};

use super::{ApiClient, ApiError};

const PLANTS_PATH: &str = "plants";

impl ApiClient {
    // ===== Plants =====

    /// Fetch every plant record
    pub async fn list_plants(&self) -> Result<Vec<Plant>> {
        let response = self.send(Method::GET, PLANTS_PATH, None).await?;
        response
            .json()
            .await
            .context("Failed to parse plant list")
    }

    /// Create a plant. The frequency is validated before anything is sent.
    pub async fn add_plant(&self, title: &str, description: &str, frequency: &str) -> Result<Plant> {
        let draft = PlantDraft::new(title, description, frequency)?;
        let response = self
            .send(Method::POST, PLANTS_PATH, Some(serde_json::to_value(&draft)?))
            .await?;
        response.json().await.context("Failed to parse created plant")
    }

    /// Replace a plant record with the given fields
    pub async fn update_plant(
        &self,
        id: &str,
        title: &str,
        description: &str,
        frequency: &str,
    ) -> Result<Plant> {
        let path = Self::plant_path(id)?;
        let draft = PlantDraft::new(title, description, frequency)?;
        let response = self
            .send(Method::PUT, &path, Some(serde_json::to_value(&draft)?))
            .await?;
        response.json().await.context("Failed to parse updated plant")
    }

    /// Delete a plant record. Any response body is ignored.
    pub async fn remove_plant(&self, id: &str) -> Result<()> {
        let path = Self::plant_path(id)?;
        self.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Item endpoint for a record id; the id must be a single path segment.
    fn plant_path(id: &str) -> Result<String, ApiError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ApiError::Validation("Plant id is required".to_string()));
        }
        if id == "." || id == ".." || id.chars().any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace()) {
            return Err(ApiError::Validation(format!("Invalid plant id: {}", id)));
        }
        Ok(format!("{}/{}", PLANTS_PATH, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_path() {
        assert_eq!(ApiClient::plant_path("65f0c1").expect("valid"), "plants/65f0c1");
        assert_eq!(ApiClient::plant_path(" 42 ").expect("trimmed"), "plants/42");

        for bad in ["", "   ", "a/b", "..", "x?y=1", "a b", "%2e"] {
            assert!(
                matches!(ApiClient::plant_path(bad), Err(ApiError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
